// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Extraction pipeline: one session, one folder, one pass over the
//! requested messages.
//!
//! ```text
//! Idle -> Connected -> FolderSelected -> Listed -> [Deduplicating] -> Processing -> Finalized
//!   \__________\______________\____________\_____________\________________\--> Failed
//! ```

pub mod archive;
pub mod body;
pub mod dedupe;
pub mod headers;
pub mod rewrite;

use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::error::ExtractError;
use crate::imap::{
    error::ImapError,
    session::{MailConnector, MailboxSession},
    types::{Credentials, MessageDescriptor, DEFAULT_FOLDER},
};
use crate::utils::mime_decoder::decode_header_text;

use archive::{entry_name, Packager, Payload, MERGED_FILE_NAME, RAW_ARCHIVE_NAME, SEPARATE_ARCHIVE_NAME};
use body::extract_body_text;
use dedupe::{detect_duplicates, DuplicateRecord};
use headers::HeaderBlock;
use rewrite::{RewriteOptions, TransformSet};

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Share of the progress bar taken by the duplicate scan, when it runs.
const DEDUPE_PROGRESS_SHARE: f32 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportShape {
    #[default]
    Separate,
    Merged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputMode {
    /// Body text only.
    PlainText(ExportShape),
    /// Full raw messages with rewritten headers.
    Original(RewriteOptions),
}

impl OutputMode {
    pub fn file_name(&self) -> &'static str {
        match self {
            OutputMode::PlainText(ExportShape::Merged) => MERGED_FILE_NAME,
            OutputMode::PlainText(ExportShape::Separate) => SEPARATE_ARCHIVE_NAME,
            OutputMode::Original(_) => RAW_ARCHIVE_NAME,
        }
    }
}

impl Default for OutputMode {
    fn default() -> Self {
        OutputMode::Original(RewriteOptions::default())
    }
}

/// 1-based inclusive message numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRange {
    pub start: u32,
    pub end: u32,
}

impl MessageRange {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn validate(&self) -> Result<(), ExtractError> {
        if self.start < 1 || self.end < 1 {
            return Err(ExtractError::Validation(
                "Email numbers start at 1".to_string(),
            ));
        }
        if self.start > self.end {
            return Err(ExtractError::Validation(
                "Start number must be less than or equal to end number".to_string(),
            ));
        }
        Ok(())
    }

    /// Clamps both bounds into `[1, total]`. `None` for an empty folder.
    pub fn resolve(&self, total: usize) -> Option<(usize, usize)> {
        if total == 0 {
            return None;
        }
        let clamp = |n: u32| (n as usize).clamp(1, total);
        let (first, last) = (clamp(self.start), clamp(self.end));
        (first <= last).then_some((first, last))
    }
}

impl Default for MessageRange {
    fn default() -> Self {
        Self::new(1, 20)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionRequest {
    pub folder: String,
    pub range: MessageRange,
    pub mode: OutputMode,
    pub remove_duplicates: bool,
    pub name_by_subject: bool,
}

impl Default for ExtractionRequest {
    fn default() -> Self {
        Self {
            folder: DEFAULT_FOLDER.to_string(),
            range: MessageRange::default(),
            mode: OutputMode::default(),
            remove_duplicates: true,
            name_by_subject: true,
        }
    }
}

impl ExtractionRequest {
    pub fn validate(&self) -> Result<(), ExtractError> {
        if self.folder.trim().is_empty() {
            return Err(ExtractError::Validation("Folder name is empty".to_string()));
        }
        self.range.validate()
    }
}

fn validate_credentials(credentials: &Credentials) -> Result<(), ExtractError> {
    if credentials.host.trim().is_empty()
        || credentials.username.trim().is_empty()
        || credentials.password.is_empty()
    {
        return Err(ExtractError::Validation(
            "Please fill in all connection fields (server, username, password)".to_string(),
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunState {
    Idle,
    Connected,
    FolderSelected,
    Listed,
    Deduplicating,
    Processing,
    Finalized,
    Failed,
}

impl RunState {
    pub fn can_advance_to(self, next: RunState) -> bool {
        use RunState::*;
        match (self, next) {
            (Finalized | Failed, _) => false,
            (_, Failed) => true,
            (Idle, Connected)
            | (Connected, FolderSelected)
            | (FolderSelected, Listed)
            | (Listed, Deduplicating)
            | (Listed, Processing)
            | (Deduplicating, Processing) => true,
            // Empty folders and all-duplicate selections finish early.
            (Listed | Deduplicating | Processing, Finalized) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionEvent {
    State(RunState),
    Status(String),
    /// Fraction in `[0, 1]`, never decreasing within a run.
    Progress(f32),
    Duplicates {
        unique: usize,
        duplicates: Vec<DuplicateRecord>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionSummary {
    pub folder_total: usize,
    pub selected: usize,
    pub duplicates_removed: usize,
    pub processed: usize,
    pub written: usize,
    /// Messages without usable text (plain-text mode).
    pub empty_bodies: usize,
    /// Messages whose fetch failed.
    pub failed: usize,
    pub cancelled: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionOutcome {
    pub payload: Payload,
    pub file_name: &'static str,
    pub summary: ExtractionSummary,
}

impl ExtractionOutcome {
    /// Writes the payload into `dir` under its suggested name.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf, ExtractError> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name);
        std::fs::write(&path, self.payload.as_bytes())?;
        info!("Wrote {} bytes to {}", self.payload.byte_len(), path.display());
        Ok(path)
    }
}

#[derive(Debug, Clone, Copy)]
enum FetchKind {
    Header,
    Full,
}

/// Runs extractions against sessions opened by `C`.
pub struct Extractor<C> {
    connector: C,
    fetch_timeout: Duration,
    events: Option<UnboundedSender<ExtractionEvent>>,
    cancel: CancellationToken,
}

impl<C> Extractor<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            events: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_fetch_timeout(mut self, limit: Duration) -> Self {
        self.fetch_timeout = limit;
        self
    }

    pub fn with_events(mut self, events: UnboundedSender<ExtractionEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// One fetch round trip. A per-message error is `Ok(None)`; a timeout is
    /// retried once and fatal the second time.
    async fn fetch(
        &self,
        session: &mut dyn MailboxSession,
        uid: u32,
        kind: FetchKind,
    ) -> Result<Option<Vec<u8>>, ExtractError> {
        let mut retried = false;
        loop {
            let call = async {
                match kind {
                    FetchKind::Header => session.fetch_header(uid).await,
                    FetchKind::Full => session.fetch_raw_message(uid).await,
                }
            };
            match timeout(self.fetch_timeout, call).await {
                Ok(Ok(bytes)) => return Ok(Some(bytes)),
                Ok(Err(e)) => {
                    warn!("Skipping UID {}: {}", uid, e);
                    return Ok(None);
                }
                Err(_) if !retried => {
                    warn!("Fetch of UID {} timed out after {:?}, retrying once", uid, self.fetch_timeout);
                    retried = true;
                }
                Err(_) => {
                    return Err(ExtractError::Timeout {
                        uid,
                        limit: self.fetch_timeout,
                    })
                }
            }
        }
    }
}

impl<C: MailConnector> Extractor<C> {
    /// Connects, extracts, and signs off. The session is logged out exactly
    /// once whenever it was opened, including on failure.
    #[tracing::instrument(skip(self, credentials, request), fields(host = %credentials.host, folder = %request.folder))]
    pub async fn run(
        &self,
        credentials: &Credentials,
        request: &ExtractionRequest,
    ) -> Result<ExtractionOutcome, ExtractError> {
        validate_credentials(credentials)?;
        request.validate()?;

        let mut run = Run::new(self);
        run.status("Connecting to IMAP server...");

        let mut session = match self.connector.connect(credentials).await {
            Ok(session) => session,
            Err(e) => {
                error!("Could not open IMAP session: {}", e);
                run.enter(RunState::Failed);
                return Err(e.into());
            }
        };
        run.enter(RunState::Connected);

        let result = run.drive(session.as_mut(), request).await;

        if let Err(e) = session.logout().await {
            warn!("IMAP logout failed: {}", e);
        }

        match &result {
            Ok(_) => run.enter(RunState::Finalized),
            Err(e) if e.is_informational() => {
                run.status(e.to_string());
                run.enter(RunState::Finalized);
            }
            Err(e) => {
                error!("Extraction failed: {}", e);
                run.enter(RunState::Failed);
            }
        }
        result
    }
}

struct ProgressMeter {
    base: f32,
    span: f32,
    total: usize,
    done: usize,
}

impl ProgressMeter {
    fn new(base: f32, span: f32, total: usize) -> Self {
        Self {
            base,
            span,
            total,
            done: 0,
        }
    }

    fn advance(&mut self) -> f32 {
        self.done += 1;
        if self.total == 0 {
            return self.base + self.span;
        }
        self.base + self.span * (self.done.min(self.total) as f32 / self.total as f32)
    }
}

/// Per-run bookkeeping: current state and the last reported progress.
struct Run<'a, C> {
    extractor: &'a Extractor<C>,
    state: RunState,
    last_progress: f32,
}

impl<'a, C> Run<'a, C> {
    fn new(extractor: &'a Extractor<C>) -> Self {
        Self {
            extractor,
            state: RunState::Idle,
            last_progress: 0.0,
        }
    }

    fn emit(&self, event: ExtractionEvent) {
        if let Some(events) = &self.extractor.events {
            // A dropped receiver only means nobody is watching.
            let _ = events.send(event);
        }
    }

    fn enter(&mut self, next: RunState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "invalid transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!("Extraction state {:?} -> {:?}", self.state, next);
        self.state = next;
        self.emit(ExtractionEvent::State(next));
    }

    fn status(&self, message: impl Into<String>) {
        let message = message.into();
        info!("{}", message);
        self.emit(ExtractionEvent::Status(message));
    }

    fn progress(&mut self, fraction: f32) {
        if fraction > self.last_progress {
            self.last_progress = fraction;
            self.emit(ExtractionEvent::Progress(fraction));
        }
    }

    fn cancelled(&self) -> bool {
        self.extractor.cancel.is_cancelled()
    }

    async fn drive(
        &mut self,
        session: &mut dyn MailboxSession,
        request: &ExtractionRequest,
    ) -> Result<ExtractionOutcome, ExtractError> {
        let folder = request.folder.as_str();

        self.status(format!("Selecting folder: {}", folder));
        let mailbox = session
            .select_folder(folder)
            .await
            .map_err(|e| folder_error(folder, e))?;
        self.enter(RunState::FolderSelected);

        self.status("Searching for emails...");
        let uids = session.list_uids().await?;
        debug!("'{}' reports {} messages, search returned {}", mailbox.name, mailbox.exists, uids.len());
        self.enter(RunState::Listed);

        let (first, last) = request
            .range
            .resolve(uids.len())
            .ok_or_else(|| ExtractError::NoMessages(folder.to_string()))?;
        let mut working: Vec<u32> = uids[first - 1..last].to_vec();

        let mut summary = ExtractionSummary {
            folder_total: uids.len(),
            selected: working.len(),
            ..Default::default()
        };
        self.status(format!(
            "Found {} emails. Processing {} emails (#{} to #{})",
            uids.len(),
            working.len(),
            first,
            last
        ));

        let mut progress_base = 0.0;
        if request.remove_duplicates && working.len() > 1 {
            working = self.deduplicate(session, working, &mut summary).await?;
            progress_base = DEDUPE_PROGRESS_SHARE;
        }

        self.enter(RunState::Processing);
        let mut packager = match request.mode {
            OutputMode::PlainText(ExportShape::Merged) => Packager::merged(),
            _ => Packager::archive(),
        };
        let transforms = match &request.mode {
            OutputMode::Original(options) => Some(TransformSet::from_options(options)),
            OutputMode::PlainText(_) => None,
        };

        let mut meter = ProgressMeter::new(progress_base, 1.0 - progress_base, working.len());
        for (index, &uid) in working.iter().enumerate() {
            if summary.cancelled || self.cancelled() {
                info!("Cancellation requested; stopping after {} emails", summary.processed);
                summary.cancelled = true;
                break;
            }
            // Numbering follows the working set, so skipped messages leave gaps.
            let position = index + 1;
            summary.processed += 1;

            match self.extractor.fetch(session, uid, FetchKind::Full).await? {
                None => summary.failed += 1,
                Some(raw) => {
                    let name = if request.name_by_subject {
                        entry_name(position, Some(&subject_of(&raw)))
                    } else {
                        entry_name(position, None)
                    };
                    let content = match &transforms {
                        Some(set) => Some(set.rewrite(&raw)),
                        None => {
                            let text = extract_body_text(&raw);
                            (!text.is_empty()).then(|| text.into_bytes())
                        }
                    };
                    match content {
                        Some(content) => packager.add(name, content)?,
                        None => {
                            debug!("UID {} has no usable text, skipping", uid);
                            summary.empty_bodies += 1;
                        }
                    }
                }
            }
            self.progress(meter.advance());
        }

        summary.written = packager.entry_count();
        let payload = packager.finish()?;
        summary.message = summary_message(&request.mode, &summary);
        self.status(summary.message.clone());

        Ok(ExtractionOutcome {
            payload,
            file_name: request.mode.file_name(),
            summary,
        })
    }

    /// Scans header blocks and narrows `working` to the unique messages.
    async fn deduplicate(
        &mut self,
        session: &mut dyn MailboxSession,
        working: Vec<u32>,
        summary: &mut ExtractionSummary,
    ) -> Result<Vec<u32>, ExtractError> {
        self.enter(RunState::Deduplicating);
        self.status("Checking for duplicates...");

        let mut meter = ProgressMeter::new(0.0, DEDUPE_PROGRESS_SHARE, working.len());
        let mut descriptors = Vec::with_capacity(working.len());
        for &uid in &working {
            if self.cancelled() {
                info!("Cancellation requested during duplicate scan");
                summary.cancelled = true;
                return Ok(Vec::new());
            }
            match self.extractor.fetch(session, uid, FetchKind::Header).await? {
                Some(header) => descriptors.push(MessageDescriptor::from_header_block(uid, &header)),
                None => summary.failed += 1,
            }
            self.progress(meter.advance());
        }

        let outcome = detect_duplicates(descriptors);
        summary.duplicates_removed = outcome.duplicates.len();
        if outcome.duplicates.is_empty() {
            self.status("No duplicates found!");
        } else {
            self.status(format!(
                "Found {} duplicate(s). Processing {} unique emails.",
                outcome.duplicates.len(),
                outcome.unique.len()
            ));
        }
        self.emit(ExtractionEvent::Duplicates {
            unique: outcome.unique.len(),
            duplicates: outcome.duplicates.clone(),
        });

        // Nothing survived the scan, whether through duplicates or failed header fetches.
        if outcome.unique.is_empty() {
            return Err(ExtractError::AllDuplicates(summary.selected));
        }
        Ok(outcome.unique_uids())
    }
}

fn folder_error(folder: &str, err: ImapError) -> ExtractError {
    match ExtractError::from(err) {
        ExtractError::FolderSelect { reason, .. } => ExtractError::FolderSelect {
            folder: folder.to_string(),
            reason,
        },
        other => other,
    }
}

/// Decoded Subject of a raw message, or the `no_subject` placeholder.
fn subject_of(raw: &[u8]) -> String {
    decode_header_text(HeaderBlock::from_raw_message(raw).get("Subject").as_deref())
}

fn summary_message(mode: &OutputMode, summary: &ExtractionSummary) -> String {
    if summary.cancelled {
        return format!(
            "Cancelled after {} emails; kept {} finished entries.",
            summary.processed, summary.written
        );
    }
    match mode {
        OutputMode::PlainText(ExportShape::Merged) => {
            format!("Extracted {} emails into 1 merged file!", summary.written)
        }
        OutputMode::PlainText(ExportShape::Separate) => {
            format!("Extracted {} emails into separate files!", summary.written)
        }
        OutputMode::Original(_) => format!("Download complete! Packed {} emails.", summary.written),
    }
}
