//! Folder name to folder id resolution with a process-lifetime cache

use crate::logger::SharedLogger;
use crate::CoreResult;
use mailsort_graph::{GraphFolder, MailboxApi};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Cache key for a folder name
pub fn normalize_folder_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Resolves display names to folder ids, creating folders that don't exist.
///
/// Entries are never evicted. Resolution is check-then-create, so two
/// processes racing on the same name can still end up with duplicates.
pub struct FolderResolver {
    mailbox: Arc<dyn MailboxApi>,
    logger: SharedLogger,
    cache: Mutex<HashMap<String, String>>,
}

impl FolderResolver {
    pub fn new(mailbox: Arc<dyn MailboxApi>, logger: SharedLogger) -> Self {
        Self {
            mailbox,
            logger,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Id of the folder called `name`, found or created
    pub async fn ensure_folder(&self, name: &str) -> CoreResult<String> {
        let key = normalize_folder_name(name);

        if let Some(id) = self.cache.lock().await.get(&key) {
            return Ok(id.clone());
        }

        match self.lookup_or_create(name, &key).await {
            Ok(id) => {
                self.remember(key, &id).await;
                Ok(id)
            }
            Err(err) => {
                self.logger
                    .warn(&format!("Issue with folder {}, attempting fallback", name));
                match self.fallback(&key).await {
                    Some(folder) => {
                        self.logger
                            .debug(&format!("Using folder: {}", folder.display_name));
                        self.remember(key, &folder.id).await;
                        Ok(folder.id)
                    }
                    None => {
                        self.logger
                            .warn(&format!("No available target folder for {}", name));
                        Err(err)
                    }
                }
            }
        }
    }

    async fn remember(&self, key: String, id: &str) {
        self.cache.lock().await.insert(key, id.to_string());
    }

    async fn lookup_or_create(&self, name: &str, key: &str) -> CoreResult<String> {
        let matches = |f: &GraphFolder| normalize_folder_name(&f.display_name) == key;

        let inbox_children = self.mailbox.list_inbox_child_folders().await?;
        if let Some(folder) = inbox_children.into_iter().find(matches) {
            self.logger.debug(&format!("Folder found: {}", name));
            return Ok(folder.id);
        }

        let root_folders = self.mailbox.list_folders().await?;
        if let Some(folder) = root_folders.into_iter().find(matches) {
            self.logger.debug(&format!("Folder found (root): {}", name));
            return Ok(folder.id);
        }

        // Last look for an exact name anywhere before creating a duplicate
        let existing = self.mailbox.find_folders_by_name(name).await?;
        if let Some(folder) = existing.into_iter().next() {
            self.logger.debug(&format!("Folder found (filter): {}", name));
            return Ok(folder.id);
        }

        let created = self.mailbox.create_inbox_child_folder(name).await?;
        self.logger.debug(&format!("Folder created: {}", name));
        Ok(created.id)
    }

    /// First inbox child whose name contains the first four characters of `key`
    async fn fallback(&self, key: &str) -> Option<GraphFolder> {
        let prefix: String = key.chars().take(4).collect();
        let inbox_children = self.mailbox.list_inbox_child_folders().await.ok()?;
        inbox_children
            .into_iter()
            .find(|f| normalize_folder_name(&f.display_name).contains(&prefix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{folder, FakeMailbox, RecordingLogger};
    use crate::CoreError;
    use mailsort_graph::GraphError;
    use std::sync::atomic::Ordering;

    fn resolver(mailbox: &Arc<FakeMailbox>) -> FolderResolver {
        FolderResolver::new(mailbox.clone(), RecordingLogger::new())
    }

    #[tokio::test]
    async fn test_second_lookup_is_a_cache_hit() {
        let mailbox = FakeMailbox::with_inbox_children(vec![folder("f-orders", "Orders")]);
        let resolver = resolver(&mailbox);

        assert_eq!(resolver.ensure_folder("Orders").await.unwrap(), "f-orders");
        let calls = mailbox.remote_folder_calls();

        assert_eq!(resolver.ensure_folder("Orders").await.unwrap(), "f-orders");
        assert_eq!(mailbox.remote_folder_calls(), calls);
    }

    #[tokio::test]
    async fn test_names_are_matched_normalized() {
        let mailbox = FakeMailbox::with_inbox_children(vec![folder("f-travel", " Hotels and Travel ")]);
        let resolver = resolver(&mailbox);

        assert_eq!(
            resolver.ensure_folder("hotels AND travel").await.unwrap(),
            "f-travel"
        );
        // Same key, different spelling: served from cache
        let calls = mailbox.remote_folder_calls();
        assert_eq!(
            resolver.ensure_folder("  Hotels and Travel").await.unwrap(),
            "f-travel"
        );
        assert_eq!(mailbox.remote_folder_calls(), calls);
    }

    #[tokio::test]
    async fn test_root_folder_match() {
        let mailbox = FakeMailbox::new();
        *mailbox.root_folders.lock().unwrap() = vec![folder("f-archive", "Archive")];
        let resolver = resolver(&mailbox);

        assert_eq!(resolver.ensure_folder("Archive").await.unwrap(), "f-archive");
        assert_eq!(mailbox.create_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_exact_name_recheck_before_create() {
        let mailbox = FakeMailbox::new();
        *mailbox.nested_folders.lock().unwrap() = vec![folder("f-deep", "Bills")];
        let resolver = resolver(&mailbox);

        assert_eq!(resolver.ensure_folder("Bills").await.unwrap(), "f-deep");
        assert_eq!(mailbox.create_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_folder_is_created_once() {
        let mailbox = FakeMailbox::new();
        let resolver = resolver(&mailbox);

        let id = resolver.ensure_folder("Tech").await.unwrap();
        assert_eq!(id, "created-1");
        assert_eq!(resolver.ensure_folder("tech").await.unwrap(), "created-1");
        assert_eq!(mailbox.create_calls.load(Ordering::SeqCst), 1);

        let children = mailbox.inbox_children.lock().unwrap().clone();
        assert_eq!(children, vec![folder("created-1", "Tech")]);
    }

    #[tokio::test]
    async fn test_fallback_on_prefix() {
        let mailbox = FakeMailbox::with_inbox_children(vec![
            folder("f-bills", "Bills"),
            folder("f-history", "Order History"),
        ]);
        mailbox.failures.lock().unwrap().list_root = true;
        let logger = RecordingLogger::new();
        let resolver = FolderResolver::new(mailbox.clone(), logger.clone());

        assert_eq!(resolver.ensure_folder("Orders").await.unwrap(), "f-history");
        assert!(logger.contains(tracing::Level::WARN, "attempting fallback"));

        // The fallback result is cached under the requested name
        let calls = mailbox.remote_folder_calls();
        assert_eq!(resolver.ensure_folder("Orders").await.unwrap(), "f-history");
        assert_eq!(mailbox.remote_folder_calls(), calls);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_original_error() {
        let mailbox = FakeMailbox::with_inbox_children(vec![folder("f-bills", "Bills")]);
        mailbox.failures.lock().unwrap().create = true;
        let resolver = resolver(&mailbox);

        let err = resolver.ensure_folder("Personal").await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::Graph(GraphError::ApiError { status: 500, .. })
        ));
        assert!(resolver.cache.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_fallback_listing_keeps_original_error() {
        let mailbox = FakeMailbox::new();
        mailbox.failures.lock().unwrap().list_inbox_children = true;
        let resolver = resolver(&mailbox);

        let err = resolver.ensure_folder("Orders").await.unwrap_err();
        assert!(matches!(err, CoreError::Graph(GraphError::ApiError { status: 500, .. })));
    }

    #[test]
    fn test_normalize_folder_name() {
        assert_eq!(normalize_folder_name("  Hotels and Travel "), "hotels and travel");
        assert_eq!(normalize_folder_name("ÉTÉ"), "été");
    }
}
