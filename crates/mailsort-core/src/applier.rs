//! Carries out a classification decision against the mailbox

use crate::classifier::{Action, Decision};
use crate::folders::FolderResolver;
use crate::logger::SharedLogger;
use crate::{CoreError, CoreResult};
use mailsort_graph::{GraphMessage, MailboxApi};
use std::sync::Arc;

/// Folder used by the `archive` action
pub const ARCHIVE_FOLDER: &str = "Archive";

pub struct DecisionApplier {
    mailbox: Arc<dyn MailboxApi>,
    resolver: Arc<FolderResolver>,
    logger: SharedLogger,
}

impl DecisionApplier {
    pub fn new(
        mailbox: Arc<dyn MailboxApi>,
        resolver: Arc<FolderResolver>,
        logger: SharedLogger,
    ) -> Self {
        Self {
            mailbox,
            resolver,
            logger,
        }
    }

    /// Apply `decision` to `email`.
    ///
    /// An email that disappeared between listing and applying is not an
    /// error: the not-found signal is logged and swallowed wherever it shows up.
    pub async fn apply(&self, decision: &Decision, email: &GraphMessage) -> CoreResult<()> {
        match self.try_apply(decision, email).await {
            Err(e) if e.is_item_not_found() => {
                self.logger.warn(&format!(
                    "Email {} no longer exists, skipping",
                    email.short_id()
                ));
                Ok(())
            }
            other => other,
        }
    }

    async fn try_apply(&self, decision: &Decision, email: &GraphMessage) -> CoreResult<()> {
        if !self.mailbox.message_exists(&email.id).await? {
            self.logger.warn(&format!(
                "Email {} no longer exists, skipping",
                email.short_id()
            ));
            return Ok(());
        }

        match (decision.action, decision.folder.as_deref()) {
            (Action::Move, Some(folder)) => self.move_to(email, folder).await,
            (Action::Archive, _) => self.move_to(email, ARCHIVE_FOLDER).await,
            (Action::MarkRead, _) => {
                self.tolerate_not_found(email, self.mailbox.mark_read(&email.id).await)?;
                self.logger
                    .debug(&format!("Marked {} as read", email.short_id()));
                Ok(())
            }
            (Action::Move, None) | (Action::Ignore, _) => Ok(()),
        }
    }

    async fn move_to(&self, email: &GraphMessage, folder: &str) -> CoreResult<()> {
        let dest_id = self.resolver.ensure_folder(folder).await?;

        if email.parent_folder_id.as_deref() == Some(dest_id.as_str()) {
            self.logger.warn(&format!(
                "Email {} already in destination {}",
                email.short_id(),
                folder
            ));
        } else {
            self.logger
                .debug(&format!("Moving {} to {}", email.short_id(), folder));
        }

        let moved = self.mailbox.move_message(&email.id, &dest_id).await;
        self.tolerate_not_found(email, moved.map(|_| ()))
    }

    fn tolerate_not_found(
        &self,
        email: &GraphMessage,
        result: mailsort_graph::GraphResult<()>,
    ) -> CoreResult<()> {
        match result {
            Err(e) if e.is_item_not_found() => {
                self.logger.warn(&format!(
                    "Email {} vanished before it could be updated",
                    email.short_id()
                ));
                Ok(())
            }
            other => other.map_err(CoreError::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Category;
    use crate::testing::{folder, message, FakeMailbox, RecordingLogger};
    use mailsort_graph::GraphError;
    use tracing::Level;

    fn decision(action: Action, folder: Option<&str>) -> Decision {
        Decision {
            category: Category::Orders,
            action,
            folder: folder.map(str::to_string),
            confidence: 0.9,
        }
    }

    fn applier(mailbox: &Arc<FakeMailbox>) -> (DecisionApplier, Arc<RecordingLogger>) {
        let logger = RecordingLogger::new();
        let resolver = Arc::new(FolderResolver::new(mailbox.clone(), logger.clone()));
        (
            DecisionApplier::new(mailbox.clone(), resolver, logger.clone()),
            logger,
        )
    }

    #[tokio::test]
    async fn test_move_to_resolved_folder() {
        let mailbox = FakeMailbox::with_inbox_children(vec![folder("f-orders", "Orders")]);
        let (applier, logger) = applier(&mailbox);

        applier
            .apply(&decision(Action::Move, Some("Orders")), &message("m1", "inbox"))
            .await
            .unwrap();

        assert_eq!(
            *mailbox.moves.lock().unwrap(),
            vec![("m1".to_string(), "f-orders".to_string())]
        );
        assert!(logger.contains(Level::DEBUG, "Moving"));
        assert!(!logger.contains(Level::WARN, "already in"));
    }

    #[tokio::test]
    async fn test_same_parent_warns_and_moves_once() {
        let mailbox = FakeMailbox::with_inbox_children(vec![folder("f-orders", "Orders")]);
        let (applier, logger) = applier(&mailbox);

        applier
            .apply(&decision(Action::Move, Some("Orders")), &message("m1", "f-orders"))
            .await
            .unwrap();

        assert_eq!(mailbox.moves.lock().unwrap().len(), 1);
        assert!(logger.contains(Level::WARN, "already in destination"));
    }

    #[tokio::test]
    async fn test_missing_email_makes_no_changes() {
        let mailbox = FakeMailbox::with_inbox_children(vec![folder("f-orders", "Orders")]);
        mailbox.missing_messages.lock().unwrap().insert("m1".to_string());
        let (applier, logger) = applier(&mailbox);

        for action in [Action::Move, Action::MarkRead, Action::Archive] {
            applier
                .apply(&decision(action, Some("Orders")), &message("m1", "inbox"))
                .await
                .unwrap();
        }

        assert_eq!(mailbox.mutation_count(), 0);
        assert_eq!(mailbox.remote_folder_calls(), 0);
        assert_eq!(logger.count(Level::WARN), 3);
    }

    #[tokio::test]
    async fn test_ignore_and_folderless_move_do_nothing() {
        let mailbox = FakeMailbox::new();
        let (applier, _) = applier(&mailbox);
        let email = message("m1", "inbox");

        applier.apply(&decision(Action::Ignore, Some("Orders")), &email).await.unwrap();
        applier.apply(&decision(Action::Move, None), &email).await.unwrap();

        assert_eq!(mailbox.mutation_count(), 0);
        assert_eq!(mailbox.remote_folder_calls(), 0);
    }

    #[tokio::test]
    async fn test_move_not_found_is_swallowed() {
        let mailbox = FakeMailbox::with_inbox_children(vec![folder("f-orders", "Orders")]);
        mailbox.failures.lock().unwrap().move_not_found = true;
        let (applier, logger) = applier(&mailbox);

        applier
            .apply(&decision(Action::Move, Some("Orders")), &message("m1", "inbox"))
            .await
            .unwrap();
        assert!(logger.contains(Level::WARN, "vanished"));
    }

    #[tokio::test]
    async fn test_other_move_errors_propagate() {
        let mailbox = FakeMailbox::with_inbox_children(vec![folder("f-orders", "Orders")]);
        mailbox.failures.lock().unwrap().move_error = true;
        let (applier, _) = applier(&mailbox);

        let err = applier
            .apply(&decision(Action::Move, Some("Orders")), &message("m1", "inbox"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::Graph(GraphError::ApiError { status: 500, .. })
        ));
    }

    #[tokio::test]
    async fn test_archive_moves_to_archive_folder() {
        let mailbox = FakeMailbox::new();
        *mailbox.root_folders.lock().unwrap() = vec![folder("f-archive", "Archive")];
        let (applier, _) = applier(&mailbox);

        applier
            .apply(&decision(Action::Archive, Some("Orders")), &message("m1", "inbox"))
            .await
            .unwrap();
        assert_eq!(
            *mailbox.moves.lock().unwrap(),
            vec![("m1".to_string(), "f-archive".to_string())]
        );
    }

    #[tokio::test]
    async fn test_mark_read() {
        let mailbox = FakeMailbox::new();
        let (applier, _) = applier(&mailbox);

        applier
            .apply(&decision(Action::MarkRead, Some("Orders")), &message("m1", "inbox"))
            .await
            .unwrap();
        assert_eq!(*mailbox.marked_read.lock().unwrap(), vec!["m1".to_string()]);
        assert!(mailbox.moves.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mark_read_not_found_is_swallowed() {
        let mailbox = FakeMailbox::new();
        mailbox.failures.lock().unwrap().mark_read_not_found = true;
        let (applier, _) = applier(&mailbox);

        applier
            .apply(&decision(Action::MarkRead, None), &message("m1", "inbox"))
            .await
            .unwrap();
        assert_eq!(mailbox.mutation_count(), 0);
    }
}
