pub mod client;
pub mod error;
pub mod mailbox;
pub mod types;

pub use client::{escape_odata_literal, GraphMailClient};
pub use error::{GraphError, GraphResult};
pub use mailbox::MailboxApi;
pub use types::*;
