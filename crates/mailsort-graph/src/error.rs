use serde::Deserialize;
use thiserror::Error;

/// Graph error code for a message or folder that no longer exists
pub const ITEM_NOT_FOUND: &str = "ErrorItemNotFound";

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Graph API error {status} ({}): {body}", .code.as_deref().unwrap_or("no code"))]
    ApiError {
        status: u16,
        code: Option<String>,
        body: String,
    },

    #[error("Failed to parse response: {0}")]
    ParseError(String),
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    code: Option<String>,
}

impl GraphError {
    /// Build an API error from a non-success status and its raw body,
    /// pulling `error.code` out of the Graph error envelope when present.
    pub fn api(status: u16, body: String) -> Self {
        let code = serde_json::from_str::<ErrorEnvelope>(&body)
            .ok()
            .and_then(|envelope| envelope.error.code);
        GraphError::ApiError { status, code, body }
    }

    /// Whether the provider reported that the referenced item is gone
    pub fn is_item_not_found(&self) -> bool {
        match self {
            GraphError::ApiError { status, code, .. } => {
                code.as_deref() == Some(ITEM_NOT_FOUND) || *status == 404
            }
            _ => false,
        }
    }
}

pub type GraphResult<T> = Result<T, GraphError>;
