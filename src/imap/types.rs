use std::fmt;

use serde::{Deserialize, Serialize};

use crate::extract::headers::HeaderBlock;
use crate::utils::mime_decoder::decode_header_text;

pub const DEFAULT_IMAP_PORT: u16 = 993;
pub const DEFAULT_FOLDER: &str = "INBOX";

/// Where and as whom to connect.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(host: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_IMAP_PORT,
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

// Keep the password out of logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Folder state reported by the server on selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailboxInfo {
    pub name: String,
    pub exists: u32,
}

/// Just enough of a message to classify it as a duplicate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDescriptor {
    pub uid: u32,
    pub message_id: String,
    pub subject: String,
    pub from: String,
}

impl MessageDescriptor {
    pub fn new(uid: u32, message_id: &str, subject: &str, from: &str) -> Self {
        Self {
            uid,
            message_id: message_id.to_string(),
            subject: subject.to_string(),
            from: from.to_string(),
        }
    }

    /// Builds a descriptor from a header block (or a whole raw message).
    /// Missing headers become empty strings; the subject is decoded.
    pub fn from_header_block(uid: u32, raw: &[u8]) -> Self {
        let headers = HeaderBlock::from_raw_message(raw);
        Self {
            uid,
            message_id: headers.get("Message-ID").unwrap_or_default(),
            subject: headers
                .get("Subject")
                .map(|s| decode_header_text(Some(&s)))
                .unwrap_or_default(),
            from: headers.get("From").unwrap_or_default(),
        }
    }
}
