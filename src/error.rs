// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::time::Duration;

use thiserror::Error;

use crate::extract::archive::ArchiveError;
use crate::imap::error::ImapError;

/// Run-level failures. Per-message problems never surface here; they only
/// lower the output count.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("IMAP connection error: {0}")]
    Connection(String),

    #[error("IMAP authentication error: {0}")]
    Auth(String),

    #[error("Could not select folder '{folder}': {reason}")]
    FolderSelect { folder: String, reason: String },

    #[error("IMAP error: {0}")]
    Protocol(String),

    #[error("Fetching UID {uid} timed out twice (limit {limit:?})")]
    Timeout { uid: u32, limit: Duration },

    #[error("No emails found in folder '{0}'")]
    NoMessages(String),

    #[error("All {0} selected emails were duplicates")]
    AllDuplicates(usize),

    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExtractError {
    /// Empty-result conditions: reported, but not failures of the run.
    pub fn is_informational(&self) -> bool {
        matches!(self, ExtractError::NoMessages(_) | ExtractError::AllDuplicates(_))
    }
}

impl From<ImapError> for ExtractError {
    fn from(err: ImapError) -> Self {
        match err {
            ImapError::Auth(msg) => ExtractError::Auth(msg),
            ImapError::Connection(msg) | ImapError::Tls(msg) | ImapError::Timeout(msg) => {
                ExtractError::Connection(msg)
            }
            ImapError::FolderSelect(reason) => ExtractError::FolderSelect {
                folder: String::new(),
                reason,
            },
            other => ExtractError::Protocol(other.to_string()),
        }
    }
}
