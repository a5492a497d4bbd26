// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine as _,
};
use encoding_rs::Encoding;
use regex::Regex;

/// Placeholder used wherever a subject is missing or sanitizes to nothing.
pub const NO_SUBJECT: &str = "no_subject";

/// Longest file-name fragment derived from a subject, in characters.
pub const MAX_FILENAME_CHARS: usize = 60;

// Encoded words in the wild often drop their base64 padding.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

lazy_static::lazy_static! {
    static ref ENCODED_WORD_RE: Regex = Regex::new(
        r"=\?([^?\s]+)\?([BbQq])\?([^?\s]*)\?="
    ).unwrap();
}

/// Decodes a header value for display, mapping a missing or empty value to
/// [`NO_SUBJECT`]. A malformed encoded word yields the raw value unchanged.
pub fn decode_header_text(value: Option<&str>) -> String {
    match value {
        Some(raw) if !raw.is_empty() => decode_mime_header(raw).unwrap_or_else(|| raw.to_string()),
        _ => NO_SUBJECT.to_string(),
    }
}

/// Decode MIME encoded-word headers (RFC 2047)
/// Supports both Q-encoding and B-encoding
/// Format: =?charset?encoding?encoded-text?=
///
/// Returns `None` when an encoded word cannot be decoded.
pub fn decode_mime_header(input: &str) -> Option<String> {
    let mut result = String::with_capacity(input.len());
    let mut last_end = 0;
    let mut previous_was_word = false;

    for cap in ENCODED_WORD_RE.captures_iter(input) {
        let (full_match, [charset, encoding, encoded_text]) = cap.extract();
        let start = cap.get(0)?.start();

        // Whitespace between two adjacent encoded words is not displayed.
        let gap = &input[last_end..start];
        if !(previous_was_word && gap.chars().all(char::is_whitespace)) {
            result.push_str(gap);
        }

        let bytes = match encoding {
            "B" | "b" => LENIENT_BASE64.decode(encoded_text).ok()?,
            _ => decode_q(encoded_text)?,
        };
        result.push_str(&decode_charset(charset, &bytes));

        last_end = start + full_match.len();
        previous_was_word = true;
    }

    result.push_str(&input[last_end..]);
    Some(result)
}

/// Decodes `bytes` in the named charset, falling back to lossy UTF-8 when the
/// label is unknown or the bytes are invalid for it.
fn decode_charset(charset: &str, bytes: &[u8]) -> String {
    // RFC 2231 allows a language suffix: "utf-8*en".
    let label = charset.split('*').next().unwrap_or(charset).trim();
    Encoding::for_label(label.as_bytes())
        .and_then(|enc| enc.decode_without_bom_handling_and_without_replacement(bytes))
        .map(|text| text.into_owned())
        .unwrap_or_else(|| String::from_utf8_lossy(bytes).into_owned())
}

fn decode_q(encoded: &str) -> Option<Vec<u8>> {
    let bytes = encoded.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'=' => {
                let hex = bytes.get(i + 1..i + 3)?;
                let hex = std::str::from_utf8(hex).ok()?;
                result.push(u8::from_str_radix(hex, 16).ok()?);
                i += 3;
            }
            // In Q-encoding, underscore represents space
            b'_' => {
                result.push(b' ');
                i += 1;
            }
            b => {
                result.push(b);
                i += 1;
            }
        }
    }

    Some(result)
}

fn is_filename_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || c.is_whitespace()
        || c == '_'
        || c == '-'
        || ('\u{00C0}'..='\u{017F}').contains(&c)
}

/// Turns a decoded subject into a file-name fragment: disallowed characters
/// are dropped, whitespace runs become one underscore, and the result is cut
/// to [`MAX_FILENAME_CHARS`].
pub fn sanitize_filename(subject: &str) -> String {
    let kept: String = subject.chars().filter(|&c| is_filename_char(c)).collect();

    let mut clean = String::with_capacity(kept.len());
    let mut in_whitespace = false;
    for c in kept.trim().chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                clean.push('_');
            }
            in_whitespace = true;
        } else {
            clean.push(c);
            in_whitespace = false;
        }
    }

    let clean: String = clean.chars().take(MAX_FILENAME_CHARS).collect();
    if clean.is_empty() {
        NO_SUBJECT.to_string()
    } else {
        clean
    }
}
