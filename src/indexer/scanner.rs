//! Finds bracketed tags in text files.
//!
//! Every non-overlapping `left ... right` occurrence on a line is one raw
//! element. Elements whose text starts with `%` are pragmas that control the
//! scan itself:
//!
//! - `%stop` suspends reporting until the next `%cont`.
//! - `%stop!` ends scanning of the file.

use std::fs;
use std::io::{BufRead, Cursor};
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ResolveError, Result, TagrefError};
use crate::index::Location;

/// Amount of leading bytes inspected to tell text from binary files.
const SNIFF_LEN: usize = 128;

/// Comment bracket delimiters around tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BracketConfig {
    pub left: String,
    pub right: String,
}

impl Default for BracketConfig {
    fn default() -> Self {
        Self {
            left: "[#".to_string(),
            right: "#]".to_string(),
        }
    }
}

impl BracketConfig {
    /// Fills in the defaults when neither delimiter was configured.
    pub fn or_default(self) -> Self {
        if self.left.is_empty() && self.right.is_empty() {
            Self::default()
        } else {
            self
        }
    }

    pub fn regex(&self) -> Result<Regex> {
        if self.left.is_empty() || self.right.is_empty() {
            return Err(TagrefError::Config(format!(
                "invalid bracket {:?} {:?}: both delimiters are required",
                self.left, self.right
            )));
        }

        Regex::new(&format!(
            "{}.+?{}",
            regex::escape(&self.left),
            regex::escape(&self.right)
        ))
        .map_err(|e| TagrefError::Config(format!("invalid bracket: {}", e)))
    }
}

/// Tag text as found in a file, before parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawElement {
    pub text: String,
    pub loc: Location,
}

fn looks_binary(head: &[u8]) -> bool {
    if head.contains(&0) {
        return true;
    }

    // A multi-byte character cut by the sniff window is still text.
    matches!(std::str::from_utf8(head), Err(e) if e.error_len().is_some())
}

/// Scans `reader` line by line, attributing elements to `path`.
pub fn scan_reader<R: BufRead>(
    bracket: &BracketConfig,
    mut reader: R,
    path: &str,
) -> Result<Vec<RawElement>> {
    let re = bracket.regex()?;

    let mut elems = Vec::new();
    let mut stopped = false;
    let mut buf = Vec::new();
    let mut line_no: usize = 0;

    'lines: loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        line_no += 1;

        if buf.last() == Some(&b'\n') {
            buf.pop();
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
        }

        let line = String::from_utf8_lossy(&buf);

        for m in re.find_iter(&line) {
            let text = m
                .as_str()
                .strip_prefix(bracket.left.as_str())
                .unwrap_or(m.as_str());
            let text = text.strip_suffix(bracket.right.as_str()).unwrap_or(text).trim();

            if let Some(pragma) = text.strip_prefix('%') {
                let fail = |message: &str| TagrefError::Scan {
                    path: path.to_string(),
                    line: line_no,
                    message: message.to_string(),
                };

                match pragma {
                    "stop!" => {
                        tracing::debug!(path, line = line_no, "hard stop");
                        break 'lines;
                    }
                    "stop" if stopped => return Err(fail("already stopped")),
                    "stop" => stopped = true,
                    "cont" if !stopped => return Err(fail("not stopped")),
                    "cont" => stopped = false,
                    _ => return Err(fail(&format!("unknown pragma: {}", text))),
                }

                continue;
            }

            if stopped {
                continue;
            }

            elems.push(RawElement {
                text: text.to_string(),
                loc: Location::new(
                    path,
                    line_no as u32,
                    m.start() as u32 + 1,
                    m.end() as u32,
                ),
            });
        }
    }

    Ok(elems)
}

/// Scans the file at `path`, reporting locations under `display_path`.
///
/// Binary files yield no elements.
pub fn scan_file(bracket: &BracketConfig, path: &Path, display_path: &str) -> Result<Vec<RawElement>> {
    let bytes = fs::read(path)?;

    if looks_binary(&bytes[..bytes.len().min(SNIFF_LEN)]) {
        tracing::debug!(path = %path.display(), "not a text file, ignoring");
        return Ok(Vec::new());
    }

    scan_reader(bracket, Cursor::new(bytes), display_path)
}

/// Returns the single element covering the cursor at `loc`.
pub fn element_at(bracket: &BracketConfig, loc: &Location) -> Result<RawElement> {
    let mut hits = scan_file(bracket, Path::new(&loc.path), &loc.path)?
        .into_iter()
        .filter(|e| e.loc.contains(loc));

    let first = hits
        .next()
        .ok_or_else(|| ResolveError::NoTagAtLocation(loc.to_string()))?;

    if hits.next().is_some() {
        return Err(ResolveError::AmbiguousLocation(loc.to_string()).into());
    }

    Ok(first)
}
