use crate::error::{GraphError, GraphResult};
use crate::types::*;
use tracing::{debug, info};

const GRAPH_BASE: &str = "https://graph.microsoft.com/v1.0";

/// Message fields to select in list queries (keeps payload small)
const MESSAGE_SELECT: &str = "id,subject,from,bodyPreview,body,isRead,parentFolderId";

const FOLDER_SELECT: &str = "id,displayName";

/// Escape a value for a single-quoted OData string literal
pub fn escape_odata_literal(value: &str) -> String {
    value.replace('\'', "''")
}

pub struct GraphMailClient {
    client: reqwest::Client,
    access_token: String,
}

impl GraphMailClient {
    pub fn new(access_token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            access_token,
        }
    }

    async fn api_error(response: reqwest::Response) -> GraphError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        GraphError::api(status, body)
    }

    /// List inbox messages, most recent first
    pub async fn list_inbox_messages(
        &self,
        unread_only: bool,
        top: u32,
    ) -> GraphResult<Vec<GraphMessage>> {
        let url = format!("{}/me/mailFolders/inbox/messages", GRAPH_BASE);
        debug!("Graph: listing inbox messages unread_only={} top={}", unread_only, top);

        let top = top.to_string();
        let mut query = vec![
            ("$select", MESSAGE_SELECT),
            ("$top", top.as_str()),
            ("$orderby", "receivedDateTime desc"),
        ];
        if unread_only {
            query.push(("$filter", "isRead eq false"));
        }

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(&query)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        let list: GraphListResponse<GraphMessage> = response
            .json()
            .await
            .map_err(|e| GraphError::ParseError(e.to_string()))?;

        info!("Graph: found {} inbox messages", list.value.len());
        Ok(list.value)
    }

    /// List top-level mail folders
    pub async fn list_folders(&self) -> GraphResult<Vec<GraphFolder>> {
        let url = format!("{}/me/mailFolders", GRAPH_BASE);
        debug!("Graph: listing folders");

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(&[("$select", FOLDER_SELECT), ("$top", "100")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        let list: GraphListResponse<GraphFolder> = response
            .json()
            .await
            .map_err(|e| GraphError::ParseError(e.to_string()))?;

        debug!("Graph: found {} folders", list.value.len());
        Ok(list.value)
    }

    /// Resolve the inbox folder id
    pub async fn get_inbox_id(&self) -> GraphResult<String> {
        let url = format!("{}/me/mailFolders/inbox", GRAPH_BASE);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(&[("$select", "id")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        let inbox: GraphId = response
            .json()
            .await
            .map_err(|e| GraphError::ParseError(e.to_string()))?;

        Ok(inbox.id)
    }

    /// List the immediate child folders of the inbox
    pub async fn list_inbox_child_folders(&self) -> GraphResult<Vec<GraphFolder>> {
        let inbox_id = self.get_inbox_id().await?;
        let url = format!("{}/me/mailFolders/{}/childFolders", GRAPH_BASE, inbox_id);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(&[("$select", FOLDER_SELECT), ("$top", "100")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        let list: GraphListResponse<GraphFolder> = response
            .json()
            .await
            .map_err(|e| GraphError::ParseError(e.to_string()))?;

        debug!(
            "Graph: inbox subfolders: {}",
            list.value
                .iter()
                .map(|f| f.display_name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(list.value)
    }

    /// Find folders whose display name is exactly `name`
    pub async fn find_folders_by_name(&self, name: &str) -> GraphResult<Vec<GraphFolder>> {
        let url = format!("{}/me/mailFolders", GRAPH_BASE);
        let filter = format!("displayName eq '{}'", escape_odata_literal(name));
        debug!("Graph: searching folders with {}", filter);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(&[("$filter", filter.as_str()), ("$select", FOLDER_SELECT)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        let list: GraphListResponse<GraphFolder> = response
            .json()
            .await
            .map_err(|e| GraphError::ParseError(e.to_string()))?;

        Ok(list.value)
    }

    /// Create a child folder of the inbox. Returns the new folder.
    pub async fn create_inbox_child_folder(&self, name: &str) -> GraphResult<GraphFolder> {
        let inbox_id = self.get_inbox_id().await?;
        let url = format!("{}/me/mailFolders/{}/childFolders", GRAPH_BASE, inbox_id);
        debug!("Graph: creating inbox subfolder '{}'", name);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&CreateFolderRequest {
                display_name: name.to_string(),
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        let folder: GraphFolder = response
            .json()
            .await
            .map_err(|e| GraphError::ParseError(e.to_string()))?;

        info!("Graph: created folder '{}', id={}", folder.display_name, folder.id);
        Ok(folder)
    }

    /// Set read/unread status
    pub async fn set_read(&self, message_id: &str, is_read: bool) -> GraphResult<()> {
        let url = format!("{}/me/messages/{}", GRAPH_BASE, message_id);
        debug!("Graph: setting isRead={} for {}", is_read, short_id(message_id));

        let response = self
            .client
            .patch(&url)
            .bearer_auth(&self.access_token)
            .json(&serde_json::json!({ "isRead": is_read }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        Ok(())
    }

    /// Move a message to a different folder. Returns the new message ID.
    pub async fn move_message(
        &self,
        message_id: &str,
        dest_folder_id: &str,
    ) -> GraphResult<String> {
        let url = format!("{}/me/messages/{}/move", GRAPH_BASE, message_id);
        debug!("Graph: moving {} to {}", short_id(message_id), dest_folder_id);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&MoveRequest {
                destination_id: dest_folder_id.to_string(),
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::api_error(response).await);
        }

        let moved: MoveResponse = response
            .json()
            .await
            .map_err(|e| GraphError::ParseError(e.to_string()))?;

        debug!("Graph: moved message, new id={}", short_id(&moved.id));
        Ok(moved.id)
    }

    /// Whether a message still exists. Not-found maps to `false`.
    pub async fn message_exists(&self, message_id: &str) -> GraphResult<bool> {
        let url = format!("{}/me/messages/{}", GRAPH_BASE, message_id);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(&[("$select", "id")])
            .send()
            .await?;

        if !response.status().is_success() {
            let err = Self::api_error(response).await;
            if err.is_item_not_found() {
                return Ok(false);
            }
            return Err(err);
        }

        Ok(true)
    }
}
