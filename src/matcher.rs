//! String pattern matchers used by search tags, index filters and config globs.
//!
//! Three pattern kinds are supported:
//! - `exact`: the candidate must equal the pattern
//! - `glob`: gitignore-style path globs, matched segment by segment
//! - `regexp`: unanchored regular expression search

use std::fmt;
use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::MatchError;

/// Separator used to split glob patterns and candidates into segments.
pub const SEPARATOR: char = '/';

/// Compiles a pattern string into a [`Matcher`].
pub type Compiler = fn(&str) -> Result<Matcher, MatchError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternKind {
    Exact,
    Glob,
    Regexp,
}

impl PatternKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternKind::Exact => "exact",
            PatternKind::Glob => "glob",
            PatternKind::Regexp => "regexp",
        }
    }

    pub fn compiler(self) -> Compiler {
        match self {
            PatternKind::Exact => compile_exact,
            PatternKind::Glob => compile_glob,
            PatternKind::Regexp => compile_regexp,
        }
    }

    pub fn compile(self, pattern: &str) -> Result<Matcher, MatchError> {
        (self.compiler())(pattern)
    }
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PatternKind {
    type Err = MatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exact" => Ok(PatternKind::Exact),
            "glob" => Ok(PatternKind::Glob),
            "regexp" => Ok(PatternKind::Regexp),
            other => Err(MatchError::UnknownPatternType(other.to_string())),
        }
    }
}

/// A compiled predicate over strings.
#[derive(Debug, Clone)]
pub enum Matcher {
    Exact(String),
    Glob(GlobPattern),
    Regexp(Regex),
}

impl Matcher {
    pub fn is_match(&self, text: &str) -> bool {
        match self {
            Matcher::Exact(pattern) => pattern == text,
            Matcher::Glob(glob) => glob.is_match(text),
            Matcher::Regexp(re) => re.is_match(text),
        }
    }
}

pub fn compile_exact(pattern: &str) -> Result<Matcher, MatchError> {
    Ok(Matcher::Exact(pattern.to_string()))
}

pub fn compile_glob(pattern: &str) -> Result<Matcher, MatchError> {
    GlobPattern::new(pattern).map(Matcher::Glob)
}

pub fn compile_regexp(pattern: &str) -> Result<Matcher, MatchError> {
    Regex::new(pattern)
        .map(Matcher::Regexp)
        .map_err(|e| MatchError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })
}

/// A list of matchers with conjunction and disjunction combinators.
#[derive(Debug, Clone, Default)]
pub struct Matchers(Vec<Matcher>);

impl Matchers {
    pub fn new<S: AsRef<str>>(compile: Compiler, patterns: &[S]) -> Result<Self, MatchError> {
        patterns
            .iter()
            .map(|p| compile(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()
            .map(Matchers)
    }

    /// True if every matcher accepts `text`. Vacuously true when empty.
    pub fn all(&self, text: &str) -> bool {
        self.0.iter().all(|m| m.is_match(text))
    }

    /// True if at least one matcher accepts `text`.
    pub fn any(&self, text: &str) -> bool {
        self.0.iter().any(|m| m.is_match(text))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Matcher> {
        self.0.iter()
    }
}

#[derive(Debug, Clone)]
enum Segment {
    /// Empty component, e.g. from a leading separator.
    Root,
    /// `**`: zero or more directories.
    AnyDirs,
    /// A component with `**` mixed into other text, which never matches.
    Never,
    Pattern(glob::Pattern),
}

/// A gitignore-style path glob.
///
/// Patterns without a separator match any single path component
/// ("simple name" patterns). Patterns with a separator are matched component
/// by component from the start of the candidate, with `**` spanning any
/// number of components. A trailing separator on the pattern restricts it to
/// directory candidates, which are recognized by their own trailing separator.
/// A leading `!` is accepted and ignored.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    source: String,
    segments: Vec<Segment>,
    dir_only: bool,
    simple: bool,
}

impl GlobPattern {
    pub fn new(pattern: &str) -> Result<Self, MatchError> {
        let mut p = pattern.strip_prefix('!').unwrap_or(pattern);

        if !p.ends_with("\\ ") {
            p = p.trim_end_matches(' ');
        }

        let dir_only = p.ends_with(SEPARATOR);
        if dir_only {
            p = &p[..p.len() - 1];
        }

        let simple = !p.contains(SEPARATOR);

        let compile = |seg: &str| {
            glob::Pattern::new(seg).map_err(|e| MatchError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })
        };

        let segments = if simple {
            // A lone component never spans directories, so `**` degrades to `*`.
            vec![Segment::Pattern(compile(&p.replace("**", "*"))?)]
        } else {
            p.split(SEPARATOR)
                .map(|seg| match seg {
                    "" => Ok(Segment::Root),
                    "**" => Ok(Segment::AnyDirs),
                    s if s.contains("**") => Ok(Segment::Never),
                    s => compile(s).map(Segment::Pattern),
                })
                .collect::<Result<Vec<_>, _>>()?
        };

        Ok(Self {
            source: pattern.to_string(),
            segments,
            dir_only,
            simple,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, candidate: &str) -> bool {
        let parts: Vec<&str> = candidate.split(SEPARATOR).collect();
        let is_dir = candidate.ends_with(SEPARATOR);

        if self.simple {
            self.simple_match(&parts, is_dir)
        } else {
            self.segments_match(&parts, is_dir)
        }
    }

    fn simple_match(&self, parts: &[&str], is_dir: bool) -> bool {
        let Some(Segment::Pattern(p)) = self.segments.first() else {
            return false;
        };

        for (i, part) in parts.iter().enumerate() {
            if !p.matches(part) {
                continue;
            }

            if self.dir_only && !is_dir && i == parts.len() - 1 {
                return false;
            }

            return true;
        }

        false
    }

    fn segments_match(&self, mut parts: &[&str], is_dir: bool) -> bool {
        let mut matched = false;
        let mut can_traverse = false;

        for (i, seg) in self.segments.iter().enumerate() {
            let p = match seg {
                Segment::Root => {
                    can_traverse = false;
                    continue;
                }
                Segment::AnyDirs => {
                    if i == self.segments.len() - 1 {
                        break;
                    }
                    can_traverse = true;
                    continue;
                }
                Segment::Never => return false,
                Segment::Pattern(p) => p,
            };

            if parts.is_empty() {
                return false;
            }

            if can_traverse {
                can_traverse = false;

                while let Some((first, rest)) = parts.split_first() {
                    parts = rest;

                    if p.matches(first) {
                        matched = true;
                        break;
                    } else if parts.is_empty() {
                        matched = false;
                    }
                }
            } else {
                if !p.matches(parts[0]) {
                    return false;
                }

                matched = true;
                parts = &parts[1..];
            }
        }

        if matched && self.dir_only && !is_dir && parts.is_empty() {
            matched = false;
        }

        matched
    }
}
