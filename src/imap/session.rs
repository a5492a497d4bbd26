// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use async_trait::async_trait;

use crate::imap::{
    error::ImapError,
    types::{Credentials, MailboxInfo},
};

/// Read-only operations on one authenticated, stateful mailbox session.
///
/// A session is driven by a single task at a time; every method takes
/// `&mut self` because each call is one protocol round trip.
#[async_trait]
pub trait MailboxSession: Send {
    /// Opens `name` read-only.
    async fn select_folder(&mut self, name: &str) -> Result<MailboxInfo, ImapError>;

    /// Identifiers of every message in the selected folder, ascending.
    async fn list_uids(&mut self) -> Result<Vec<u32>, ImapError>;

    /// Header block only, without the body.
    async fn fetch_header(&mut self, uid: u32) -> Result<Vec<u8>, ImapError>;

    /// The complete message, exactly as the server stores it.
    async fn fetch_raw_message(&mut self, uid: u32) -> Result<Vec<u8>, ImapError>;

    /// Logs out the current session
    async fn logout(&mut self) -> Result<(), ImapError>;
}

/// Opens authenticated sessions.
#[async_trait]
pub trait MailConnector: Send + Sync {
    async fn connect(&self, credentials: &Credentials) -> Result<Box<dyn MailboxSession>, ImapError>;
}
