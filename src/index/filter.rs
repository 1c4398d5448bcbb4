use super::models::{attr_to_string, Entry};
use crate::error::MatchError;
use crate::matcher::{Compiler, Matchers};

/// Filters entries by name patterns and attribute patterns.
///
/// An entry passes if its name matches any of the name patterns (or no name
/// patterns were given), and every attribute pattern matches at least one of
/// the entry's rendered attributes (`key` or `key=value`, including `loc`).
pub struct EntryFilter {
    names: Matchers,
    attrs: Matchers,
}

impl EntryFilter {
    pub fn new<S: AsRef<str>>(
        compile: Compiler,
        names: &[S],
        attrs: &[S],
    ) -> Result<Self, MatchError> {
        Ok(Self {
            names: Matchers::new(compile, names)?,
            attrs: Matchers::new(compile, attrs)?,
        })
    }

    pub fn matches(&self, entry: &Entry) -> bool {
        if !self.names.is_empty() && !self.names.any(&entry.name) {
            return false;
        }

        if self.attrs.is_empty() {
            return true;
        }

        let rendered: Vec<String> = entry
            .attrs_with_loc()
            .iter()
            .map(|(k, v)| attr_to_string(k, v))
            .collect();

        self.attrs
            .iter()
            .all(|m| rendered.iter().any(|a| m.is_match(a)))
    }
}
