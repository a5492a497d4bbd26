// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use crate::imap::types::MessageDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DuplicateReason {
    MessageId,
    SubjectFrom,
}

impl fmt::Display for DuplicateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DuplicateReason::MessageId => f.write_str("Duplicate Message-ID"),
            DuplicateReason::SubjectFrom => f.write_str("Duplicate Subject+From"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateRecord {
    /// 1-based position in the scanned list.
    pub position: usize,
    pub subject: String,
    pub reason: DuplicateReason,
}

/// Characters of the subject shown when listing duplicates.
pub const SUBJECT_PREVIEW_CHARS: usize = 50;

impl DuplicateRecord {
    /// Subject cut to [`SUBJECT_PREVIEW_CHARS`] characters for listings.
    pub fn subject_preview(&self) -> String {
        self.subject.chars().take(SUBJECT_PREVIEW_CHARS).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupeOutcome {
    pub unique: Vec<MessageDescriptor>,
    pub duplicates: Vec<DuplicateRecord>,
}

impl DedupeOutcome {
    pub fn unique_uids(&self) -> Vec<u32> {
        self.unique.iter().map(|d| d.uid).collect()
    }
}

/// Splits `descriptors` into unique and duplicate entries, keeping order.
///
/// A repeated non-empty Message-ID is a duplicate; otherwise a repeated
/// (subject, from) pair is. Empty Message-IDs never collide with each other.
pub fn detect_duplicates(descriptors: Vec<MessageDescriptor>) -> DedupeOutcome {
    let mut seen_ids: HashSet<String> = HashSet::new();
    let mut seen_pairs: HashSet<(String, String)> = HashSet::new();
    let mut outcome = DedupeOutcome::default();

    for (idx, descriptor) in descriptors.into_iter().enumerate() {
        let pair = (descriptor.subject.clone(), descriptor.from.clone());

        let reason = if !descriptor.message_id.is_empty() && seen_ids.contains(&descriptor.message_id) {
            Some(DuplicateReason::MessageId)
        } else if seen_pairs.contains(&pair) {
            Some(DuplicateReason::SubjectFrom)
        } else {
            None
        };

        match reason {
            Some(reason) => outcome.duplicates.push(DuplicateRecord {
                position: idx + 1,
                subject: descriptor.subject,
                reason,
            }),
            None => {
                if !descriptor.message_id.is_empty() {
                    seen_ids.insert(descriptor.message_id.clone());
                }
                seen_pairs.insert(pair);
                outcome.unique.push(descriptor);
            }
        }
    }

    outcome
}
