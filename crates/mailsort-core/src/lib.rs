//! Core sorting logic for mailsort
//!
//! Turns inbox messages into classifier input, asks the model for a
//! decision, and applies it through the mailbox API.

mod applier;
mod body;
mod classifier;
mod error;
mod folders;
mod logger;
mod sorter;

#[cfg(test)]
mod testing;

pub use applier::{DecisionApplier, ARCHIVE_FOLDER};
pub use body::{html_to_text, BodyError, BodyNormalizer, MAX_BODY_CHARS, MAX_HTML_INPUT_CHARS};
pub use classifier::{
    build_prompt, extract_json_object, parse_decision, validate_decision, Action, Category,
    Classifier, ClassifyError, Decision, EmailSummary, OllamaClassifier, DEFAULT_MODEL,
    DEFAULT_OLLAMA_HOST,
};
pub use error::{CoreError, CoreResult};
pub use folders::{normalize_folder_name, FolderResolver};
pub use logger::{Logger, SharedLogger, TracingLogger};
pub use sorter::{RunSummary, SortMode, SortOptions, Sorter, DEFAULT_EMAIL_LIMIT};
