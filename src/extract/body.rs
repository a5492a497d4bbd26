// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::borrow::Cow;

use mail_parser::{Message, MessagePart, MimeHeaders, PartType};
use regex::Regex;

lazy_static::lazy_static! {
    static ref HTML_TAG_RE: Regex = Regex::new(r"<[^>]+>").unwrap();
    static ref WHITESPACE_RE: Regex = Regex::new(r"\s+").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextKind {
    Plain,
    Html,
}

/// Parses `raw` and returns its best plain-text body, or an empty string when
/// the message has no usable text (or does not parse at all).
pub fn extract_body_text(raw: &[u8]) -> String {
    match Message::parse(raw) {
        Some(message) => body_text(&message),
        None => String::new(),
    }
}

/// Depth-first search for the first non-empty `text/plain` part, skipping
/// attachments and descending into embedded `message/rfc822` parts. The
/// first `text/html` part, stripped to text, is kept as a fallback in case
/// no plain part turns up.
pub fn body_text(message: &Message<'_>) -> String {
    let mut html_fallback = String::new();
    match walk(message, 0, &mut html_fallback) {
        Some(plain) => plain,
        None => html_fallback,
    }
}

fn walk(message: &Message<'_>, part_id: usize, html_fallback: &mut String) -> Option<String> {
    let part = message.parts.get(part_id)?;

    match &part.body {
        PartType::Multipart(children) => {
            return children
                .iter()
                .find_map(|&child| walk(message, child, html_fallback));
        }
        // Embedded messages are searched even when attached, as forwards usually are.
        PartType::Message(inner) => return walk(inner, 0, html_fallback),
        _ => {}
    }

    if is_attachment(part) {
        return None;
    }

    let (kind, text) = part_text(part)?;
    if text.is_empty() {
        return None;
    }

    match kind {
        TextKind::Plain => Some(text.into_owned()),
        TextKind::Html => {
            if html_fallback.is_empty() {
                *html_fallback = html_to_text(&text);
            }
            None
        }
    }
}

fn is_attachment(part: &MessagePart<'_>) -> bool {
    part.content_disposition()
        .map_or(false, |cd| cd.ctype().eq_ignore_ascii_case("attachment"))
}

fn declared_kind(part: &MessagePart<'_>) -> Option<TextKind> {
    let Some(ct) = part.content_type() else {
        // No Content-Type means text/plain.
        return Some(TextKind::Plain);
    };
    if !ct.ctype().eq_ignore_ascii_case("text") {
        return None;
    }
    match ct.subtype() {
        Some(sub) if sub.eq_ignore_ascii_case("plain") => Some(TextKind::Plain),
        Some(sub) if sub.eq_ignore_ascii_case("html") => Some(TextKind::Html),
        None => Some(TextKind::Plain),
        Some(_) => None,
    }
}

fn part_text<'a>(part: &'a MessagePart<'_>) -> Option<(TextKind, Cow<'a, str>)> {
    let kind = declared_kind(part)?;
    let text = match &part.body {
        PartType::Text(text) | PartType::Html(text) => Cow::Borrowed(text.as_ref()),
        PartType::Binary(bytes) | PartType::InlineBinary(bytes) => String::from_utf8_lossy(bytes),
        _ => return None,
    };
    Some((kind, text))
}

/// Replaces every tag with a space, then collapses whitespace runs.
pub fn html_to_text(html: &str) -> String {
    let untagged = HTML_TAG_RE.replace_all(html, " ");
    WHITESPACE_RE.replace_all(&untagged, " ").trim().to_string()
}
