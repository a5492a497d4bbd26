// Publicly export key modules and types
pub mod client;
pub mod error;
pub mod session;
pub mod types;

pub use client::{ImapClient, ImapConnector};
pub use error::ImapError;
pub use session::{MailConnector, MailboxSession};
pub use types::{Credentials, MailboxInfo, MessageDescriptor};
