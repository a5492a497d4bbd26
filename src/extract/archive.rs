// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::collections::HashSet;
use std::io::{Cursor, Write};

use log::debug;
use thiserror::Error;
use zip::write::FileOptions;
use zip::ZipWriter;

use crate::utils::mime_decoder::sanitize_filename;

pub const MERGED_SEPARATOR: &str = "\n__SEP__\n";

pub const MERGED_FILE_NAME: &str = "emails_bodies_merged.txt";
pub const SEPARATE_ARCHIVE_NAME: &str = "emails_bodies_separate.zip";
pub const RAW_ARCHIVE_NAME: &str = "emails_raw_pack.zip";

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("ZIP error: {0}")]
    ZipError(#[from] zip::result::ZipError),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Duplicate archive entry: {0}")]
    DuplicateEntry(String),
}

/// The finished download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    MergedText(String),
    Archive(Vec<u8>),
}

impl Payload {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Payload::MergedText(text) => text.as_bytes(),
            Payload::Archive(bytes) => bytes,
        }
    }

    pub fn byte_len(&self) -> usize {
        self.as_bytes().len()
    }
}

/// `email_<n>.txt`, or `<n>_<subject>.txt` when a decoded subject is given.
pub fn entry_name(position: usize, subject: Option<&str>) -> String {
    match subject {
        Some(subject) => format!("{}_{}.txt", position, sanitize_filename(subject)),
        None => format!("email_{}.txt", position),
    }
}

/// Joins bodies with [`MERGED_SEPARATOR`], without a trailing separator.
pub fn merge_bodies<S: AsRef<str>>(bodies: &[S]) -> String {
    let mut merged = String::new();
    for (i, body) in bodies.iter().enumerate() {
        if i > 0 {
            merged.push_str(MERGED_SEPARATOR);
        }
        merged.push_str(body.as_ref());
    }
    merged
}

/// In-memory deflate ZIP with unique entry names.
pub struct ZipPackager {
    writer: ZipWriter<Cursor<Vec<u8>>>,
    options: FileOptions,
    names: HashSet<String>,
}

impl ZipPackager {
    pub fn new() -> Self {
        Self {
            writer: ZipWriter::new(Cursor::new(Vec::new())),
            options: FileOptions::default()
                .compression_method(zip::CompressionMethod::Deflated)
                .unix_permissions(0o644),
            names: HashSet::new(),
        }
    }

    pub fn add_entry(&mut self, name: String, content: &[u8]) -> Result<(), ArchiveError> {
        if self.names.contains(&name) {
            return Err(ArchiveError::DuplicateEntry(name));
        }
        self.writer.start_file(name.as_str(), self.options)?;
        self.writer.write_all(content)?;
        debug!("Added {} ({} bytes) to ZIP archive", name, content.len());
        self.names.insert(name);
        Ok(())
    }

    pub fn entry_count(&self) -> usize {
        self.names.len()
    }

    pub fn finish(mut self) -> Result<Vec<u8>, ArchiveError> {
        let cursor = self.writer.finish()?;
        Ok(cursor.into_inner())
    }
}

impl Default for ZipPackager {
    fn default() -> Self {
        Self::new()
    }
}

/// Accumulates per-message outputs in processing order.
pub enum Packager {
    Merged(Vec<String>),
    Archive(ZipPackager),
}

impl Packager {
    pub fn merged() -> Self {
        Packager::Merged(Vec::new())
    }

    pub fn archive() -> Self {
        Packager::Archive(ZipPackager::new())
    }

    /// Adds one output. Merged output ignores `name`.
    pub fn add(&mut self, name: String, content: Vec<u8>) -> Result<(), ArchiveError> {
        match self {
            Packager::Merged(bodies) => {
                let text = String::from_utf8(content)
                    .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned());
                bodies.push(text);
                Ok(())
            }
            Packager::Archive(zip) => zip.add_entry(name, &content),
        }
    }

    pub fn entry_count(&self) -> usize {
        match self {
            Packager::Merged(bodies) => bodies.len(),
            Packager::Archive(zip) => zip.entry_count(),
        }
    }

    pub fn finish(self) -> Result<Payload, ArchiveError> {
        match self {
            Packager::Merged(bodies) => Ok(Payload::MergedText(merge_bodies(&bodies))),
            Packager::Archive(zip) => zip.finish().map(Payload::Archive),
        }
    }
}
