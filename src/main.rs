// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! mailsift: extract emails from one IMAP folder.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Error
//!   2 - Nothing to extract (empty folder or only duplicates)

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info, warn};
use tokio::sync::mpsc;

use mailsift::config::Settings;
use mailsift::error::ExtractError;
use mailsift::extract::dedupe::DuplicateRecord;
use mailsift::extract::rewrite::RewriteOptions;
use mailsift::extract::{
    ExportShape, ExtractionEvent, ExtractionRequest, Extractor, MessageRange, OutputMode,
};
use mailsift::imap::ImapConnector;

/// How many duplicate entries are listed before summarising the rest.
const DUPLICATE_LIST_LIMIT: usize = 20;

#[derive(Parser, Debug)]
#[command(name = "mailsift", version, about = "Extract emails from an IMAP folder into text or ZIP")]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long)]
    config: Option<String>,

    #[arg(long, env = "IMAP_HOST")]
    host: Option<String>,

    /// IMAP port. `IMAP_PORT` is read by the settings layer, not here.
    #[arg(long)]
    port: Option<u16>,

    #[arg(long, env = "IMAP_USER")]
    user: Option<String>,

    #[arg(long, env = "IMAP_PASS", hide_env_values = true)]
    password: Option<String>,

    /// Folder to open (read-only).
    #[arg(long)]
    folder: Option<String>,

    /// First message number, 1-based.
    #[arg(long, default_value_t = 1)]
    start: u32,

    /// Last message number, inclusive.
    #[arg(long, default_value_t = 20)]
    end: u32,

    /// Export body text instead of original messages.
    #[arg(long)]
    plain_text: bool,

    /// With --plain-text, write one merged file instead of a ZIP.
    #[arg(long, requires = "plain_text")]
    merged: bool,

    /// Keep duplicate messages.
    #[arg(long)]
    no_dedupe: bool,

    /// Name archive entries email_<n>.txt instead of by subject.
    #[arg(long)]
    number_files: bool,

    /// Replace the domain of addresses in From.
    #[arg(long, value_name = "DOMAIN")]
    replace_domain: Option<String>,

    /// Set To and Date to fixed placeholders.
    #[arg(long)]
    standardize_headers: bool,

    /// `Key: value` lines to set on every message.
    #[arg(long, conflicts_with = "custom_headers_file")]
    custom_headers: Option<String>,

    /// Read custom `Key: value` lines from a file.
    #[arg(long, value_name = "PATH")]
    custom_headers_file: Option<PathBuf>,

    /// Insert a marker before the @ of Message-ID.
    #[arg(long)]
    tag_message_id: bool,

    /// Remove DKIM, ARC, SPF and Received headers.
    #[arg(long)]
    strip_auth_headers: bool,

    /// Directory to write the result into.
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Print the run summary as JSON on stdout.
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn output_mode(&self) -> Result<OutputMode, ExtractError> {
        if self.plain_text {
            let shape = if self.merged { ExportShape::Merged } else { ExportShape::Separate };
            return Ok(OutputMode::PlainText(shape));
        }
        let custom_headers = match &self.custom_headers_file {
            Some(path) => Some(std::fs::read_to_string(path)?),
            None => self.custom_headers.clone(),
        };
        Ok(OutputMode::Original(RewriteOptions {
            replace_domain: self.replace_domain.clone(),
            standardize_headers: self.standardize_headers,
            custom_headers,
            tag_message_id: self.tag_message_id,
            strip_auth_headers: self.strip_auth_headers,
        }))
    }

    /// Command-line values win over configured ones.
    fn apply_to(&self, settings: &mut Settings) {
        if let Some(host) = &self.host {
            settings.imap_host = host.clone();
        }
        if let Some(port) = self.port {
            settings.imap_port = port;
        }
        if let Some(user) = &self.user {
            settings.imap_user = user.clone();
        }
        if let Some(password) = &self.password {
            settings.imap_pass = password.clone();
        }
        if let Some(folder) = &self.folder {
            settings.folder = folder.clone();
        }
    }
}

fn log_duplicates(unique: usize, duplicates: &[DuplicateRecord]) {
    info!("{} unique emails, {} duplicates", unique, duplicates.len());
    for record in duplicates.iter().take(DUPLICATE_LIST_LIMIT) {
        info!("  #{} {} ({})", record.position, record.subject_preview(), record.reason);
    }
    if duplicates.len() > DUPLICATE_LIST_LIMIT {
        info!("  ... and {} more", duplicates.len() - DUPLICATE_LIST_LIMIT);
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut settings = match Settings::new(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::from(1);
        }
    };
    cli.apply_to(&mut settings);

    env_logger::init_from_env(env_logger::Env::new().default_filter_or(settings.log.level.as_str()));

    let mode = match cli.output_mode() {
        Ok(mode) => mode,
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(1);
        }
    };
    let request = ExtractionRequest {
        folder: settings.folder.clone(),
        range: MessageRange::new(cli.start, cli.end),
        mode,
        remove_duplicates: !cli.no_dedupe,
        name_by_subject: !cli.number_files,
    };

    let (tx, mut rx) = mpsc::unbounded_channel();
    let extractor = Extractor::new(ImapConnector::default())
        .with_fetch_timeout(settings.fetch_timeout())
        .with_events(tx);

    let cancel = extractor.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; finishing with what has been extracted so far");
            cancel.cancel();
        }
    });

    let reporter = tokio::spawn(async move {
        let mut last_step = 0;
        while let Some(event) = rx.recv().await {
            match event {
                ExtractionEvent::Duplicates { unique, duplicates } => log_duplicates(unique, &duplicates),
                ExtractionEvent::Progress(fraction) => {
                    let step = (fraction * 10.0) as u32;
                    if step > last_step {
                        last_step = step;
                        info!("Progress: {:.0}%", fraction * 100.0);
                    }
                }
                // Status lines are already logged by the extractor.
                ExtractionEvent::State(_) | ExtractionEvent::Status(_) => {}
            }
        }
    });

    let result = extractor.run(&settings.credentials(), &request).await;
    drop(extractor);
    let _ = reporter.await;

    match result {
        Ok(outcome) => {
            if let Err(e) = outcome.write_to(&cli.output) {
                error!("{}", e);
                return ExitCode::from(1);
            }
            if cli.json {
                match serde_json::to_string_pretty(&outcome.summary) {
                    Ok(json) => println!("{}", json),
                    Err(e) => warn!("Could not serialise summary: {}", e),
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) if e.is_informational() => {
            info!("{}", e);
            ExitCode::from(2)
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::from(1)
        }
    }
}
