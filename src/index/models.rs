use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{LocationError, MatchError};
use crate::matcher::{Matcher, PatternKind, SEPARATOR};

/// Attribute marking an entry as a search pattern instead of a tag occurrence.
pub const SEARCH_ATTR: &str = "search";

/// Attribute restricting which locations may refer to an entry.
pub const SCOPE_ATTR: &str = "scope";

/// Pseudo-attribute exposing an entry's location to search patterns.
pub const LOC_ATTR: &str = "loc";

pub type Attrs = BTreeMap<String, String>;

static LOCATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+):([0-9]+)\.([0-9]+)(?:-([0-9]+))?$").expect("valid regex"));

/// Position of a tag in a source file. Lines and columns are 1-based and the
/// column range is half-open.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Location {
    pub path: String,
    pub line: u32,
    pub start_column: u32,
    pub end_column: u32,
}

impl Location {
    pub fn new(path: impl Into<String>, line: u32, start_column: u32, end_column: u32) -> Self {
        Self {
            path: path.into(),
            line,
            start_column,
            end_column,
        }
    }

    /// Parses `path:line.start-end`, or `path:line.column` which is read as a
    /// one column wide range.
    pub fn parse(text: &str) -> Result<Self, LocationError> {
        let caps = LOCATION_RE
            .captures(text)
            .ok_or_else(|| LocationError::Malformed(text.to_string()))?;

        let number = |i: usize, what: &'static str| -> Result<u32, LocationError> {
            caps[i].parse().map_err(|_| LocationError::OutOfRange {
                text: text.to_string(),
                reason: what,
            })
        };

        let line = number(2, "invalid line number")?;
        let start_column = number(3, "invalid start column")?;
        let end_column = match caps.get(4) {
            Some(_) => number(4, "invalid end column")?,
            None => start_column.saturating_add(1),
        };

        let out_of_range = |reason| LocationError::OutOfRange {
            text: text.to_string(),
            reason,
        };

        if line == 0 {
            return Err(out_of_range("line numbers start at 1"));
        }

        if start_column == 0 {
            return Err(out_of_range("columns start at 1"));
        }

        if end_column <= start_column {
            return Err(out_of_range("end column must be after start column"));
        }

        Ok(Self::new(&caps[1], line, start_column, end_column))
    }

    /// True if `other` lies on the same line of the same file within this
    /// location's column range.
    pub fn contains(&self, other: &Location) -> bool {
        self.path == other.path
            && self.line == other.line
            && other.start_column >= self.start_column
            && other.end_column <= self.end_column
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}.{}-{}",
            self.path, self.line, self.start_column, self.end_column
        )
    }
}

impl FromStr for Location {
    type Err = LocationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Location::parse(s)
    }
}

/// Renders an attribute as `key`, or `key=value` when the value is non-empty.
pub fn attr_to_string(key: &str, value: &str) -> String {
    if value.is_empty() {
        key.to_string()
    } else {
        format!("{}={}", key, value)
    }
}

/// One tag occurrence, or a search pattern when it carries a `search` attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entry {
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: Attrs,
    pub loc: Location,
}

impl Entry {
    pub fn new(name: impl Into<String>, loc: Location) -> Self {
        Self {
            name: name.into(),
            attrs: Attrs::new(),
            loc,
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(String::as_str)
    }

    /// Scope attribute, empty when the entry is global.
    pub fn scope(&self) -> &str {
        self.attr(SCOPE_ATTR).unwrap_or("")
    }

    /// Returns the raw pattern kind if this is a search entry.
    pub fn is_search(&self) -> Option<&str> {
        self.attr(SEARCH_ATTR)
    }

    /// Looks up an attribute, with `loc` answering the rendered location.
    pub fn attr_or_loc(&self, key: &str) -> Option<Cow<'_, str>> {
        if key == LOC_ATTR {
            return Some(Cow::Owned(self.loc.to_string()));
        }

        self.attr(key).map(Cow::Borrowed)
    }

    /// Attributes with the `loc` pseudo-attribute injected.
    pub fn attrs_with_loc(&self) -> Attrs {
        let mut attrs = self.attrs.clone();
        attrs.insert(LOC_ATTR.to_string(), self.loc.to_string());
        attrs
    }

    /// Orders entries by name, then location.
    pub fn canonical_cmp(&self, other: &Entry) -> Ordering {
        self.name
            .cmp(&other.name)
            .then_with(|| self.loc.cmp(&other.loc))
    }

    /// Compiles a search entry into a predicate over other entries.
    ///
    /// The name is compiled as a pattern of the entry's kind (an empty name
    /// matches every name) and every other attribute value becomes a pattern
    /// the candidate's attribute of the same key must satisfy. `loc` can be
    /// used as a key to match on the candidate's location.
    pub fn matcher(&self) -> Result<EntryMatcher, MatchError> {
        let kind: PatternKind = self.is_search().unwrap_or("").parse()?;

        let name = if self.name.is_empty() {
            None
        } else {
            Some(kind.compile(&self.name)?)
        };

        let attrs = self
            .attrs
            .iter()
            .filter(|(k, _)| k.as_str() != SEARCH_ATTR)
            .map(|(k, v)| Ok((k.clone(), kind.compile(v)?)))
            .collect::<Result<Vec<_>, MatchError>>()?;

        Ok(EntryMatcher { name, attrs })
    }

    /// Whether `them`, an instance referring to this entry's name, can see
    /// this entry given both scopes.
    ///
    /// A scope ending with a separator is a directory prefix, any other
    /// non-empty scope is an exact file path. When this entry is scoped, an
    /// unscoped `them` is judged by its own path.
    pub fn is_referred_by(&self, them: &Entry) -> bool {
        let mine = self.scope();
        let theirs = them.scope();

        if mine.is_empty() {
            if theirs.is_empty() {
                return true;
            }

            if theirs.ends_with(SEPARATOR) {
                return self.loc.path.starts_with(theirs);
            }

            return self.loc.path == theirs;
        }

        let theirs = if theirs.is_empty() {
            them.loc.path.as_str()
        } else {
            theirs
        };

        if mine.ends_with(SEPARATOR) {
            theirs.starts_with(mine)
        } else {
            mine == theirs
        }
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&super::codec::encode_entry(self))
    }
}

/// Predicate built from a search entry by [`Entry::matcher`].
#[derive(Debug, Clone)]
pub struct EntryMatcher {
    name: Option<Matcher>,
    attrs: Vec<(String, Matcher)>,
}

impl EntryMatcher {
    pub fn matches(&self, other: &Entry) -> bool {
        // Search entries are queries, never results.
        if other.is_search().is_some() {
            return false;
        }

        if let Some(name) = &self.name {
            if !name.is_match(&other.name) {
                return false;
            }
        }

        self.attrs.iter().all(|(key, m)| {
            other
                .attr_or_loc(key)
                .map(|v| m.is_match(&v))
                .unwrap_or(false)
        })
    }
}

/// Read-only view of an entry handed to lint rule executors.
pub trait EntryView {
    fn name(&self) -> &str;
    fn path(&self) -> &str;
    fn attribute(&self, key: &str) -> Option<&str>;
    fn attribute_keys(&self) -> Vec<&str>;
}

impl EntryView for Entry {
    fn name(&self) -> &str {
        &self.name
    }

    fn path(&self) -> &str {
        &self.loc.path
    }

    fn attribute(&self, key: &str) -> Option<&str> {
        self.attr(key)
    }

    fn attribute_keys(&self) -> Vec<&str> {
        self.attrs.keys().map(String::as_str).collect()
    }
}
