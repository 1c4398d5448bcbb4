//! Text encoding of the index file.
//!
//! Format:
//! ```text
//! # v4 <comment>
//! <name> <loc> [scope=<scope>] [<key>[=<value>]...]
//! ```
//!
//! Fields are separated by a single space. A field that is empty or contains
//! whitespace or `"` is wrapped in double quotes with inner quotes doubled.
//! Inside quotes, `\`, line feed and carriage return are written as `\\`,
//! `\n` and `\r`, so every record stays on one line.
//! After `scope`, attributes are written in key order, so encoding an index
//! is deterministic and a plain line sort of the records agrees with the
//! canonical entry order for entries of distinct names.

use std::io::{BufRead, Write};

use super::models::{attr_to_string, Attrs, Entry, Location, SCOPE_ATTR};
use super::Index;
use crate::error::{IndexFormatError, Result};

/// Compatibility token on the first line of every index file.
pub const VERSION_MARKER: &str = "# v4";

pub fn header_line(comment: &str) -> String {
    if comment.is_empty() {
        VERSION_MARKER.to_string()
    } else {
        format!("{} {}", VERSION_MARKER, comment)
    }
}

fn is_header(line: &str) -> bool {
    line == VERSION_MARKER
        || line
            .strip_prefix(VERSION_MARKER)
            .is_some_and(|rest| rest.starts_with(' '))
}

fn needs_quotes(field: &str) -> bool {
    field.is_empty() || field.chars().any(|c| c.is_whitespace() || c == '"')
}

fn push_field(out: &mut String, field: &str) {
    if !out.is_empty() {
        out.push(' ');
    }

    if needs_quotes(field) {
        out.push('"');
        for c in field.chars() {
            match c {
                '"' => out.push_str("\"\""),
                '\\' => out.push_str("\\\\"),
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                c => out.push(c),
            }
        }
        out.push('"');
    } else {
        out.push_str(field);
    }
}

/// Encodes one entry as an index record, without a trailing newline.
pub fn encode_entry(entry: &Entry) -> String {
    let mut out = String::new();

    push_field(&mut out, &entry.name);
    push_field(&mut out, &entry.loc.to_string());

    if let Some(scope) = entry.attrs.get(SCOPE_ATTR) {
        push_field(&mut out, &attr_to_string(SCOPE_ATTR, scope));
    }

    for (k, v) in entry.attrs.iter().filter(|(k, _)| k.as_str() != SCOPE_ATTR) {
        push_field(&mut out, &attr_to_string(k, v));
    }

    out
}

fn split_fields(line: &str) -> std::result::Result<Vec<String>, String> {
    let mut fields = Vec::new();
    let mut chars = line.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}

        let Some(&first) = chars.peek() else {
            break;
        };

        let mut field = String::new();

        if first == '"' {
            chars.next();

            loop {
                match chars.next() {
                    Some('"') if chars.peek() == Some(&'"') => {
                        chars.next();
                        field.push('"');
                    }
                    Some('"') => break,
                    Some('\\') => match chars.next() {
                        Some('\\') => field.push('\\'),
                        Some('n') => field.push('\n'),
                        Some('r') => field.push('\r'),
                        Some(c) => return Err(format!("unknown escape \\{} in quoted field", c)),
                        None => return Err("unterminated quoted field".to_string()),
                    },
                    Some(c) => field.push(c),
                    None => return Err("unterminated quoted field".to_string()),
                }
            }

            if chars.peek().is_some_and(|c| !c.is_whitespace()) {
                return Err("extraneous character after quoted field".to_string());
            }
        } else {
            while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
                if c == '"' {
                    return Err("bare quote in unquoted field".to_string());
                }
                field.push(c);
            }
        }

        fields.push(field);
    }

    Ok(fields)
}

/// Decodes one index record. The error is a human readable reason.
pub fn decode_entry(line: &str) -> std::result::Result<Entry, String> {
    let fields = split_fields(line)?;

    if fields.len() < 2 {
        return Err("invalid record".to_string());
    }

    let loc = Location::parse(&fields[1]).map_err(|e| format!("loc: {}", e))?;

    let mut attrs = Attrs::new();

    for field in &fields[2..] {
        let (k, v) = field.split_once('=').unwrap_or((field.as_str(), ""));

        if k.is_empty() {
            return Err(format!("empty attribute name in {:?}", field));
        }

        if attrs.insert(k.to_string(), v.to_string()).is_some() {
            return Err(format!("duplicate attribute {:?}", k));
        }
    }

    Ok(Entry {
        name: fields[0].clone(),
        attrs,
        loc,
    })
}

/// Writes the header line followed by one record per entry.
pub fn write_index<W: Write>(w: &mut W, index: &Index, comment: &str) -> Result<()> {
    writeln!(w, "{}", header_line(comment))?;

    for entry in index.iter() {
        writeln!(w, "{}", encode_entry(entry))?;
    }

    w.flush()?;

    Ok(())
}

pub fn serialize(index: &Index, comment: &str) -> String {
    let mut out = header_line(comment);
    out.push('\n');

    for entry in index.iter() {
        out.push_str(&encode_entry(entry));
        out.push('\n');
    }

    out
}

/// Parses a whole serialized index. Entries are re-sorted.
pub fn deserialize(text: &str) -> Result<Index> {
    IndexReader::new(text.as_bytes()).collect()
}

/// Streams entries out of a serialized index, one line at a time.
///
/// Blank lines are skipped. The first non-blank line must be the version
/// header. Entries are yielded in file order; iteration stops after the first
/// error.
pub struct IndexReader<R> {
    reader: R,
    line_no: usize,
    seen_header: bool,
    failed: bool,
    buf: String,
}

impl<R: BufRead> IndexReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_no: 0,
            seen_header: false,
            failed: false,
            buf: String::new(),
        }
    }

    fn next_entry(&mut self) -> Result<Option<Entry>> {
        loop {
            self.buf.clear();
            if self.reader.read_line(&mut self.buf)? == 0 {
                if !self.seen_header {
                    return Err(IndexFormatError::MissingVersionMarker.into());
                }
                return Ok(None);
            }

            self.line_no += 1;

            let text = self.buf.trim();
            if text.is_empty() {
                continue;
            }

            if !self.seen_header {
                if !is_header(text) {
                    return Err(IndexFormatError::MissingVersionMarker.into());
                }
                self.seen_header = true;
                continue;
            }

            return decode_entry(text).map(Some).map_err(|reason| {
                IndexFormatError::MalformedRecord {
                    line: self.line_no,
                    reason,
                }
                .into()
            });
        }
    }
}

impl<R: BufRead> Iterator for IndexReader<R> {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        match self.next_entry() {
            Ok(entry) => entry.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
