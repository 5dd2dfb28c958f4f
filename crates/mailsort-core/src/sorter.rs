//! One sorting pass over the inbox

use crate::applier::DecisionApplier;
use crate::body::BodyNormalizer;
use crate::classifier::{Classifier, Decision, EmailSummary};
use crate::logger::SharedLogger;
use crate::CoreResult;
use mailsort_graph::{GraphMessage, MailboxApi};
use std::sync::Arc;

pub const DEFAULT_EMAIL_LIMIT: u32 = 20;
const UNKNOWN_SENDER: &str = "Unknown sender";
const NO_SUBJECT: &str = "No subject";

/// Which inbox messages a run picks up
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortMode {
    /// Only unread messages
    #[default]
    Unread,
    /// Every inbox message, read or not
    AllInbox,
}

#[derive(Debug, Clone)]
pub struct SortOptions {
    pub email_limit: u32,
    pub dry_run: bool,
    pub mode: SortMode,
}

impl Default for SortOptions {
    fn default() -> Self {
        Self {
            email_limit: DEFAULT_EMAIL_LIMIT,
            dry_run: false,
            mode: SortMode::default(),
        }
    }
}

/// Counts reported at the end of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub fetched: usize,
    pub applied: usize,
    pub skipped_dry_run: usize,
    pub failed: usize,
}

pub struct Sorter {
    mailbox: Arc<dyn MailboxApi>,
    classifier: Arc<dyn Classifier>,
    applier: DecisionApplier,
    normalizer: BodyNormalizer,
    logger: SharedLogger,
    options: SortOptions,
}

impl Sorter {
    pub fn new(
        mailbox: Arc<dyn MailboxApi>,
        classifier: Arc<dyn Classifier>,
        applier: DecisionApplier,
        normalizer: BodyNormalizer,
        logger: SharedLogger,
        options: SortOptions,
    ) -> Self {
        Self {
            mailbox,
            classifier,
            applier,
            normalizer,
            logger,
            options,
        }
    }

    /// Fetch one batch and process it email by email.
    ///
    /// Only a failed listing aborts the run. Per-email failures are
    /// logged and counted.
    pub async fn run(&self) -> CoreResult<RunSummary> {
        let unread_only = self.options.mode == SortMode::Unread;
        let emails = self
            .mailbox
            .list_inbox_messages(unread_only, self.options.email_limit)
            .await?;

        let mut summary = RunSummary {
            fetched: emails.len(),
            ..Default::default()
        };

        if emails.is_empty() {
            self.logger.info("No emails to process, nothing to do");
            return Ok(summary);
        }

        self.logger.info(&format!(
            "Processing {} {}email(s){}",
            emails.len(),
            if unread_only { "unread " } else { "" },
            if self.options.dry_run { " (dry run)" } else { "" }
        ));

        for email in &emails {
            match self.process(email).await {
                Ok(Outcome::Applied) => summary.applied += 1,
                Ok(Outcome::DryRun) => summary.skipped_dry_run += 1,
                Err(e) => {
                    summary.failed += 1;
                    self.logger
                        .error(&format!("Error processing email {}: {}", email.short_id(), e));
                }
            }
        }

        self.logger.info(&format!(
            "Run complete: {} fetched, {} applied, {} dry-run, {} failed",
            summary.fetched, summary.applied, summary.skipped_dry_run, summary.failed
        ));
        Ok(summary)
    }

    async fn process(&self, email: &GraphMessage) -> CoreResult<Outcome> {
        let summary = EmailSummary {
            from: email.sender_address().unwrap_or(UNKNOWN_SENDER).to_string(),
            subject: email
                .subject
                .as_deref()
                .filter(|s| !s.is_empty())
                .unwrap_or(NO_SUBJECT)
                .to_string(),
            content: self.normalizer.normalize_message(email),
        };

        self.logger.debug(&format!(
            "Classifying {} from {}: {}",
            email.short_id(),
            summary.from,
            summary.subject
        ));
        let decision = self.classifier.classify(&summary).await?;
        self.log_decision(email, &summary, &decision);

        if self.options.dry_run {
            return Ok(Outcome::DryRun);
        }

        self.applier.apply(&decision, email).await?;
        Ok(Outcome::Applied)
    }

    fn log_decision(&self, email: &GraphMessage, summary: &EmailSummary, decision: &Decision) {
        self.logger.info(&format!(
            "{} \"{}\" -> {} ({:?}, confidence {:.2}){}",
            email.short_id(),
            summary.subject,
            decision.category,
            decision.action,
            decision.confidence,
            if self.options.dry_run { " [dry run]" } else { "" }
        ));
    }
}

enum Outcome {
    Applied,
    DryRun,
}
