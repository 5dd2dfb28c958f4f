//! The mailbox operations the sorter needs, as a trait so the folder
//! resolver and decision applier can run against an in-memory mailbox.

use crate::client::GraphMailClient;
use crate::error::GraphResult;
use crate::types::{GraphFolder, GraphMessage};
use async_trait::async_trait;

#[async_trait]
pub trait MailboxApi: Send + Sync {
    /// Inbox messages, newest first, at most `limit`
    async fn list_inbox_messages(&self, unread_only: bool, limit: u32)
        -> GraphResult<Vec<GraphMessage>>;

    /// Top-level folders
    async fn list_folders(&self) -> GraphResult<Vec<GraphFolder>>;

    /// Immediate children of the inbox
    async fn list_inbox_child_folders(&self) -> GraphResult<Vec<GraphFolder>>;

    /// Folders named exactly `name`, anywhere the provider's filter query reaches
    async fn find_folders_by_name(&self, name: &str) -> GraphResult<Vec<GraphFolder>>;

    /// Create a child folder of the inbox with display name `name`
    async fn create_inbox_child_folder(&self, name: &str) -> GraphResult<GraphFolder>;

    /// Move a message; returns the id the message has in its new folder
    async fn move_message(&self, message_id: &str, dest_folder_id: &str) -> GraphResult<String>;

    async fn mark_read(&self, message_id: &str) -> GraphResult<()>;

    async fn message_exists(&self, message_id: &str) -> GraphResult<bool>;
}

#[async_trait]
impl MailboxApi for GraphMailClient {
    async fn list_inbox_messages(
        &self,
        unread_only: bool,
        limit: u32,
    ) -> GraphResult<Vec<GraphMessage>> {
        GraphMailClient::list_inbox_messages(self, unread_only, limit).await
    }

    async fn list_folders(&self) -> GraphResult<Vec<GraphFolder>> {
        GraphMailClient::list_folders(self).await
    }

    async fn list_inbox_child_folders(&self) -> GraphResult<Vec<GraphFolder>> {
        GraphMailClient::list_inbox_child_folders(self).await
    }

    async fn find_folders_by_name(&self, name: &str) -> GraphResult<Vec<GraphFolder>> {
        GraphMailClient::find_folders_by_name(self, name).await
    }

    async fn create_inbox_child_folder(&self, name: &str) -> GraphResult<GraphFolder> {
        GraphMailClient::create_inbox_child_folder(self, name).await
    }

    async fn move_message(&self, message_id: &str, dest_folder_id: &str) -> GraphResult<String> {
        GraphMailClient::move_message(self, message_id, dest_folder_id).await
    }

    async fn mark_read(&self, message_id: &str) -> GraphResult<()> {
        self.set_read(message_id, true).await
    }

    async fn message_exists(&self, message_id: &str) -> GraphResult<bool> {
        GraphMailClient::message_exists(self, message_id).await
    }
}
