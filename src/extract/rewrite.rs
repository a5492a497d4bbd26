// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Header-only rewriting of raw messages. Bodies pass through as the exact
//! bytes the server returned.

use regex::{NoExpand, Regex};
use serde::{Deserialize, Serialize};

use crate::extract::headers::{split_raw_message, HeaderBlock};

pub const TO_PLACEHOLDER: &str = "[*to]";
pub const DATE_PLACEHOLDER: &str = "[*date]";
pub const MESSAGE_ID_MARKER: &str = "[EID]";

/// Trust and transport headers dropped by [`HeaderTransform::StripAuthHeaders`].
pub const AUTH_HEADERS: [&str; 7] = [
    "DKIM-Signature",
    "Authentication-Results",
    "Received",
    "Received-SPF",
    "ARC-Authentication-Results",
    "ARC-Message-Signature",
    "ARC-Seal",
];

lazy_static::lazy_static! {
    static ref ADDRESS_DOMAIN_RE: Regex = Regex::new(r"@[a-zA-Z0-9.-]+").unwrap();
}

/// Which rewrites to apply in original-format mode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewriteOptions {
    pub replace_domain: Option<String>,
    pub standardize_headers: bool,
    /// `Key: value` lines.
    pub custom_headers: Option<String>,
    pub tag_message_id: bool,
    pub strip_auth_headers: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderTransform {
    ReplaceDomain(String),
    StandardizeHeaders,
    CustomHeaders(Vec<(String, String)>),
    TagMessageId,
    StripAuthHeaders,
}

impl HeaderTransform {
    /// Applies the transform. Finding nothing to act on is a no-op.
    pub fn apply(&self, headers: HeaderBlock) -> HeaderBlock {
        match self {
            HeaderTransform::ReplaceDomain(domain) => match headers.get("From") {
                Some(from) => {
                    let replacement = format!("@{}", domain);
                    let rewritten = ADDRESS_DOMAIN_RE.replace_all(&from, NoExpand(&replacement));
                    headers.replace("From", &rewritten)
                }
                None => headers,
            },
            HeaderTransform::StandardizeHeaders => headers
                .replace("To", TO_PLACEHOLDER)
                .replace("Date", DATE_PLACEHOLDER),
            HeaderTransform::CustomHeaders(pairs) => pairs
                .iter()
                .fold(headers, |acc, (name, value)| acc.replace(name, value)),
            HeaderTransform::TagMessageId => match headers.get("Message-ID") {
                Some(id) if id.contains('@') => {
                    let tagged = id.replacen('@', &format!("{}@", MESSAGE_ID_MARKER), 1);
                    headers.replace("Message-ID", &tagged)
                }
                _ => headers,
            },
            HeaderTransform::StripAuthHeaders => AUTH_HEADERS
                .iter()
                .fold(headers, |acc, name| acc.remove_all(name)),
        }
    }
}

/// Parses a block of `Key: value` lines, splitting on the first colon.
/// Lines without a colon or with an empty key are ignored; an empty value
/// is kept as an empty value.
pub fn parse_custom_headers(text: &str) -> Vec<(String, String)> {
    text.lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(k, _)| !k.is_empty())
        .collect()
}

/// The ordered transforms derived from [`RewriteOptions`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformSet {
    transforms: Vec<HeaderTransform>,
}

impl TransformSet {
    pub fn new(transforms: Vec<HeaderTransform>) -> Self {
        Self { transforms }
    }

    /// Order: domain, standardize, custom, Message-ID tag, auth strip.
    pub fn from_options(options: &RewriteOptions) -> Self {
        let mut transforms = Vec::new();

        if let Some(domain) = options.replace_domain.as_deref().map(str::trim) {
            if !domain.is_empty() {
                transforms.push(HeaderTransform::ReplaceDomain(domain.to_string()));
            }
        }
        if options.standardize_headers {
            transforms.push(HeaderTransform::StandardizeHeaders);
        }
        if let Some(text) = &options.custom_headers {
            let pairs = parse_custom_headers(text);
            if !pairs.is_empty() {
                transforms.push(HeaderTransform::CustomHeaders(pairs));
            }
        }
        if options.tag_message_id {
            transforms.push(HeaderTransform::TagMessageId);
        }
        if options.strip_auth_headers {
            transforms.push(HeaderTransform::StripAuthHeaders);
        }

        Self { transforms }
    }

    pub fn transforms(&self) -> &[HeaderTransform] {
        &self.transforms
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    pub fn apply(&self, headers: HeaderBlock) -> HeaderBlock {
        self.transforms
            .iter()
            .fold(headers, |acc, transform| transform.apply(acc))
    }

    /// Rewrites the header region of `raw` and reattaches the original body.
    pub fn rewrite(&self, raw: &[u8]) -> Vec<u8> {
        let parts = split_raw_message(raw);
        let headers = HeaderBlock::parse(parts.header, parts.line_ending());
        parts.reassemble(&self.apply(headers))
    }
}
