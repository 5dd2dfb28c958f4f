use serde::{Deserialize, Serialize};

/// Response wrapper for Graph API list endpoints
#[derive(Debug, Deserialize)]
pub struct GraphListResponse<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
    #[serde(rename = "@odata.nextLink")]
    pub next_link: Option<String>,
}

/// A mail folder from Graph API
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GraphFolder {
    pub id: String,
    #[serde(rename = "displayName", default)]
    pub display_name: String,
}

/// A message as fetched for classification
#[derive(Debug, Clone, Deserialize)]
pub struct GraphMessage {
    pub id: String,
    pub subject: Option<String>,
    pub from: Option<GraphEmailWrapper>,
    #[serde(rename = "bodyPreview")]
    pub body_preview: Option<String>,
    pub body: Option<GraphBody>,
    #[serde(rename = "isRead", default)]
    pub is_read: bool,
    #[serde(rename = "parentFolderId")]
    pub parent_folder_id: Option<String>,
}

impl GraphMessage {
    /// Sender address, if Graph returned one
    pub fn sender_address(&self) -> Option<&str> {
        self.from
            .as_ref()
            .and_then(|f| f.email_address.address.as_deref())
            .filter(|a| !a.is_empty())
    }

    /// Last 8 characters of the id, for log lines
    pub fn short_id(&self) -> &str {
        short_id(&self.id)
    }
}

/// Last 8 characters of a Graph id
pub fn short_id(id: &str) -> &str {
    let start = id
        .char_indices()
        .rev()
        .nth(7)
        .map(|(i, _)| i)
        .unwrap_or(0);
    &id[start..]
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GraphBody {
    #[serde(rename = "contentType", default)]
    pub content_type: String,
    #[serde(default)]
    pub content: String,
}

impl GraphBody {
    pub fn is_html(&self) -> bool {
        self.content_type.eq_ignore_ascii_case("html")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphEmailWrapper {
    #[serde(rename = "emailAddress")]
    pub email_address: GraphEmailAddress,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphEmailAddress {
    pub name: Option<String>,
    pub address: Option<String>,
}

/// Identifier returned by single-item lookups
#[derive(Debug, Deserialize)]
pub struct GraphId {
    pub id: String,
}

/// Request body for moving a message
#[derive(Debug, Serialize)]
pub struct MoveRequest {
    #[serde(rename = "destinationId")]
    pub destination_id: String,
}

/// Response from move operation
#[derive(Debug, Deserialize)]
pub struct MoveResponse {
    pub id: String,
}

/// Request body for creating a child folder
#[derive(Debug, Serialize)]
pub struct CreateFolderRequest {
    #[serde(rename = "displayName")]
    pub display_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_deserialization() {
        let json = r#"{
            "id": "AAMkAGI2TG93AAA=",
            "subject": "Your order has shipped",
            "from": {"emailAddress": {"name": "Shop", "address": "orders@shop.example"}},
            "bodyPreview": "Good news",
            "body": {"contentType": "html", "content": "<p>Good news</p>"},
            "isRead": false,
            "parentFolderId": "inbox-id"
        }"#;
        let msg: GraphMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.sender_address(), Some("orders@shop.example"));
        assert!(msg.body.as_ref().unwrap().is_html());
        assert_eq!(msg.parent_folder_id.as_deref(), Some("inbox-id"));
        assert_eq!(msg.short_id(), "TG93AAA=");
    }

    #[test]
    fn test_sparse_message() {
        let msg: GraphMessage = serde_json::from_str(r#"{"id": "abc"}"#).unwrap();
        assert_eq!(msg.sender_address(), None);
        assert!(msg.body.is_none());
        assert!(!msg.is_read);
        assert_eq!(msg.short_id(), "abc");
    }

    #[test]
    fn test_list_without_value() {
        let list: GraphListResponse<GraphFolder> = serde_json::from_str("{}").unwrap();
        assert!(list.value.is_empty());
    }
}
