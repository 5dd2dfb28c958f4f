//! In-memory collaborators for unit tests

use crate::logger::Logger;
use async_trait::async_trait;
use mailsort_graph::{GraphError, GraphFolder, GraphMessage, GraphResult, MailboxApi};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::Level;

#[derive(Default)]
pub(crate) struct RecordingLogger {
    entries: Mutex<Vec<(Level, String)>>,
}

impl RecordingLogger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn entries(&self) -> Vec<(Level, String)> {
        self.entries.lock().unwrap().clone()
    }

    pub fn contains(&self, level: Level, needle: &str) -> bool {
        self.entries()
            .iter()
            .any(|(l, m)| *l == level && m.contains(needle))
    }

    pub fn count(&self, level: Level) -> usize {
        self.entries().iter().filter(|(l, _)| *l == level).count()
    }
}

impl Logger for RecordingLogger {
    fn log(&self, level: Level, message: &str) {
        self.entries.lock().unwrap().push((level, message.to_string()));
    }
}

pub(crate) fn folder(id: &str, name: &str) -> GraphFolder {
    GraphFolder {
        id: id.to_string(),
        display_name: name.to_string(),
    }
}

pub(crate) fn not_found() -> GraphError {
    GraphError::api(
        404,
        r#"{"error":{"code":"ErrorItemNotFound","message":"The specified object was not found in the store."}}"#
            .to_string(),
    )
}

pub(crate) fn server_error() -> GraphError {
    GraphError::api(500, r#"{"error":{"code":"ErrorInternalServerError"}}"#.to_string())
}

/// Which operations should fail, and how
#[derive(Default)]
pub(crate) struct Failures {
    pub list_inbox_children: bool,
    pub list_root: bool,
    pub create: bool,
    pub move_not_found: bool,
    pub move_error: bool,
    pub mark_read_not_found: bool,
}

/// Mailbox held in memory with a call counter per operation
#[derive(Default)]
pub(crate) struct FakeMailbox {
    pub messages: Mutex<Vec<GraphMessage>>,
    pub inbox_children: Mutex<Vec<GraphFolder>>,
    pub root_folders: Mutex<Vec<GraphFolder>>,
    /// Nested deeper than the inbox, only reachable through the name filter
    pub nested_folders: Mutex<Vec<GraphFolder>>,
    pub missing_messages: Mutex<HashSet<String>>,
    pub failures: Mutex<Failures>,
    pub moves: Mutex<Vec<(String, String)>>,
    pub marked_read: Mutex<Vec<String>>,
    pub list_calls: AtomicUsize,
    pub create_calls: AtomicUsize,
    pub last_list_unread_only: Mutex<Option<bool>>,
}

impl FakeMailbox {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_inbox_children(folders: Vec<GraphFolder>) -> Arc<Self> {
        let mailbox = Self::default();
        *mailbox.inbox_children.lock().unwrap() = folders;
        Arc::new(mailbox)
    }

    pub fn mutation_count(&self) -> usize {
        self.moves.lock().unwrap().len() + self.marked_read.lock().unwrap().len()
    }

    /// Folder listings plus creations, the calls a cache hit must avoid
    pub fn remote_folder_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst) + self.create_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MailboxApi for FakeMailbox {
    async fn list_inbox_messages(
        &self,
        unread_only: bool,
        limit: u32,
    ) -> GraphResult<Vec<GraphMessage>> {
        *self.last_list_unread_only.lock().unwrap() = Some(unread_only);
        let messages = self.messages.lock().unwrap();
        Ok(messages
            .iter()
            .filter(|m| !unread_only || !m.is_read)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn list_folders(&self) -> GraphResult<Vec<GraphFolder>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.failures.lock().unwrap().list_root {
            return Err(server_error());
        }
        Ok(self.root_folders.lock().unwrap().clone())
    }

    async fn list_inbox_child_folders(&self) -> GraphResult<Vec<GraphFolder>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.failures.lock().unwrap().list_inbox_children {
            return Err(server_error());
        }
        Ok(self.inbox_children.lock().unwrap().clone())
    }

    async fn find_folders_by_name(&self, name: &str) -> GraphResult<Vec<GraphFolder>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let root = self.root_folders.lock().unwrap();
        let children = self.inbox_children.lock().unwrap();
        let nested = self.nested_folders.lock().unwrap();
        Ok(root
            .iter()
            .chain(children.iter())
            .chain(nested.iter())
            .filter(|f| f.display_name == name)
            .cloned()
            .collect())
    }

    async fn create_inbox_child_folder(&self, name: &str) -> GraphResult<GraphFolder> {
        let n = self.create_calls.fetch_add(1, Ordering::SeqCst);
        if self.failures.lock().unwrap().create {
            return Err(server_error());
        }
        let created = folder(&format!("created-{}", n + 1), name);
        self.inbox_children.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn move_message(&self, message_id: &str, dest_folder_id: &str) -> GraphResult<String> {
        {
            let failures = self.failures.lock().unwrap();
            if failures.move_not_found {
                return Err(not_found());
            }
            if failures.move_error {
                return Err(server_error());
            }
        }
        self.moves
            .lock()
            .unwrap()
            .push((message_id.to_string(), dest_folder_id.to_string()));
        Ok(format!("{}-moved", message_id))
    }

    async fn mark_read(&self, message_id: &str) -> GraphResult<()> {
        if self.failures.lock().unwrap().mark_read_not_found {
            return Err(not_found());
        }
        self.marked_read.lock().unwrap().push(message_id.to_string());
        Ok(())
    }

    async fn message_exists(&self, message_id: &str) -> GraphResult<bool> {
        Ok(!self.missing_messages.lock().unwrap().contains(message_id))
    }
}

pub(crate) fn message(id: &str, parent: &str) -> GraphMessage {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "subject": "Hello",
        "from": {"emailAddress": {"name": "Sender", "address": "sender@example.com"}},
        "bodyPreview": "preview text",
        "body": {"contentType": "text", "content": "plain body"},
        "isRead": false,
        "parentFolderId": parent,
    }))
    .unwrap()
}
