//! Library core for mailsift: read-only IMAP extraction into text or ZIP payloads.

// --- Modules ---
pub mod config;
pub mod error;
pub mod extract;
pub mod imap;
pub mod utils;

// CONSOLIDATED PRELUDE
pub mod prelude {
    // Config
    pub use crate::config::Settings;

    // Errors
    pub use crate::error::ExtractError;
    pub use crate::imap::error::ImapError;

    // IMAP
    pub use crate::imap::client::ImapConnector;
    pub use crate::imap::session::{MailConnector, MailboxSession};
    pub use crate::imap::types::{Credentials, MailboxInfo, MessageDescriptor};

    // Extraction
    pub use crate::extract::archive::Payload;
    pub use crate::extract::rewrite::RewriteOptions;
    pub use crate::extract::{
        ExportShape, ExtractionEvent, ExtractionOutcome, ExtractionRequest, ExtractionSummary,
        Extractor, MessageRange, OutputMode, RunState,
    };

    // Common Libs
    pub use log::{debug, error, info, trace, warn};
}
