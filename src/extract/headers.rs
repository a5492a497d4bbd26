// Copyright (c) 2025 TexasFortress.AI
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Raw message splitting and an order-preserving header collection.
//!
//! Header fields keep the exact bytes they arrived with (folding included) so
//! that a block that passes through untouched serializes byte-for-byte.

const CRLF_DELIMITER: &[u8] = b"\r\n\r\n";
const LF_DELIMITER: &[u8] = b"\n\n";

/// A raw message cut at its first blank line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawParts<'a> {
    pub header: &'a [u8],
    /// The blank-line delimiter as found; empty when the message has none.
    pub delimiter: &'a [u8],
    pub body: &'a [u8],
}

impl<'a> RawParts<'a> {
    pub fn line_ending(&self) -> LineEnding {
        if self.delimiter == LF_DELIMITER {
            LineEnding::Lf
        } else {
            LineEnding::Crlf
        }
    }

    /// Reassembles `headers` with the original delimiter and the untouched body.
    pub fn reassemble(&self, headers: &HeaderBlock) -> Vec<u8> {
        let delimiter = if self.delimiter.is_empty() {
            CRLF_DELIMITER
        } else {
            self.delimiter
        };
        let mut out = headers.to_bytes();
        out.reserve(delimiter.len() + self.body.len());
        out.extend_from_slice(delimiter);
        out.extend_from_slice(self.body);
        out
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Splits at the earliest `\r\n\r\n` or `\n\n`. Without either, everything
/// is header and the body is empty.
pub fn split_raw_message(raw: &[u8]) -> RawParts<'_> {
    let crlf = find(raw, CRLF_DELIMITER);
    let lf = find(raw, LF_DELIMITER);

    let (at, delimiter) = match (crlf, lf) {
        (Some(c), Some(l)) if l < c => (l, LF_DELIMITER),
        (Some(c), _) => (c, CRLF_DELIMITER),
        (None, Some(l)) => (l, LF_DELIMITER),
        (None, None) => {
            return RawParts {
                header: raw,
                delimiter: &[],
                body: &[],
            }
        }
    };

    RawParts {
        header: &raw[..at],
        delimiter: &raw[at..at + delimiter.len()],
        body: &raw[at + delimiter.len()..],
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineEnding {
    #[default]
    Crlf,
    Lf,
}

impl LineEnding {
    pub fn as_bytes(self) -> &'static [u8] {
        match self {
            LineEnding::Crlf => b"\r\n",
            LineEnding::Lf => b"\n",
        }
    }
}

/// One header field, possibly spanning several folded lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderField {
    name: String,
    lines: Vec<Vec<u8>>,
}

impl HeaderField {
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            lines: vec![format!("{}: {}", name, value).into_bytes()],
        }
    }

    fn from_first_line(line: &[u8]) -> Self {
        let name = match line.iter().position(|&b| b == b':') {
            Some(colon) => String::from_utf8_lossy(&line[..colon]).trim().to_string(),
            None => String::new(),
        };
        Self {
            name,
            lines: vec![line.to_vec()],
        }
    }

    pub fn is_named(&self, name: &str) -> bool {
        !self.name.is_empty() && self.name.eq_ignore_ascii_case(name)
    }

    /// Unfolded, trimmed value.
    pub fn value(&self) -> String {
        let mut unfolded = Vec::new();
        for (i, line) in self.lines.iter().enumerate() {
            if i == 0 {
                if let Some(colon) = line.iter().position(|&b| b == b':') {
                    unfolded.extend_from_slice(&line[colon + 1..]);
                }
            } else {
                unfolded.extend_from_slice(line);
            }
        }
        String::from_utf8_lossy(&unfolded).trim().to_string()
    }
}

/// Ordered header collection that allows repeated names.
///
/// Mutating operations consume the block and hand back the new one, so a
/// chain of transforms reads as a pipeline of values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderBlock {
    fields: Vec<HeaderField>,
    line_ending: LineEnding,
}

impl HeaderBlock {
    pub fn parse(header: &[u8], line_ending: LineEnding) -> Self {
        let mut fields: Vec<HeaderField> = Vec::new();

        if !header.is_empty() {
            for line in header.split(|&b| b == b'\n') {
                let line = line.strip_suffix(b"\r").unwrap_or(line);
                let continues = matches!(line.first(), Some(b' ') | Some(b'\t'));
                match fields.last_mut() {
                    Some(field) if continues => field.lines.push(line.to_vec()),
                    _ => fields.push(HeaderField::from_first_line(line)),
                }
            }
        }

        Self {
            fields,
            line_ending,
        }
    }

    /// Parses the header region of a full raw message.
    pub fn from_raw_message(raw: &[u8]) -> Self {
        let parts = split_raw_message(raw);
        Self::parse(parts.header, parts.line_ending())
    }

    /// Number of fields, folded continuations included in their field.
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.is_named(name))
    }

    /// Value of the first field called `name`.
    pub fn get(&self, name: &str) -> Option<String> {
        self.fields.iter().find(|f| f.is_named(name)).map(HeaderField::value)
    }

    pub fn count(&self, name: &str) -> usize {
        self.fields.iter().filter(|f| f.is_named(name)).count()
    }

    pub fn remove_all(mut self, name: &str) -> Self {
        self.fields.retain(|f| !f.is_named(name));
        self
    }

    pub fn append(mut self, name: &str, value: &str) -> Self {
        self.fields.push(HeaderField::new(name, value));
        self
    }

    /// Drops every `name` field and appends a single new one.
    pub fn replace(self, name: &str, value: &str) -> Self {
        self.remove_all(name).append(name, value)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let eol = self.line_ending.as_bytes();
        let mut out = Vec::new();
        for (i, line) in self.fields.iter().flat_map(|f| f.lines.iter()).enumerate() {
            if i > 0 {
                out.extend_from_slice(eol);
            }
            out.extend_from_slice(line);
        }
        out
    }
}
