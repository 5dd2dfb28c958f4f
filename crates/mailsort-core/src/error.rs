//! Error types for the core module

use crate::classifier::ClassifyError;
use mailsort_graph::GraphError;
use thiserror::Error;

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur while sorting
#[derive(Debug, Error)]
pub enum CoreError {
    /// Mailbox API error
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    /// Classifier error
    #[error("Classifier error: {0}")]
    Classify(#[from] ClassifyError),
}

impl CoreError {
    /// Whether this is the provider's benign "item is gone" signal
    pub fn is_item_not_found(&self) -> bool {
        matches!(self, CoreError::Graph(e) if e.is_item_not_found())
    }
}
