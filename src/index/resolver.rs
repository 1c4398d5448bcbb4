//! Resolving a tag instance against an index.
//!
//! Resolution runs in two phases: a single pass over the index in canonical
//! order collects every matching entry, then navigation (next/previous with
//! optional wrap-around) picks from that list relative to the instance's own
//! location.

use super::models::{Entry, Location};
use super::Index;
use crate::error::ResolveError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    /// Every match.
    #[default]
    All,
    /// The match following the instance.
    Next,
    /// The match preceding the instance.
    Prev,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    pub next: bool,
    pub prev: bool,
    /// Wrap around to the first (next) or last (prev) match when navigation
    /// runs off either end.
    pub cyclic: bool,
}

impl ResolveOptions {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn next(cyclic: bool) -> Self {
        Self {
            next: true,
            cyclic,
            ..Self::default()
        }
    }

    pub fn prev(cyclic: bool) -> Self {
        Self {
            prev: true,
            cyclic,
            ..Self::default()
        }
    }

    pub fn mode(&self) -> Result<Mode, ResolveError> {
        match (self.next, self.prev) {
            (true, true) => Err(ResolveError::ConflictingNavigationFlags),
            (true, false) => Ok(Mode::Next),
            (false, true) => Ok(Mode::Prev),
            (false, false) => Ok(Mode::All),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub entries: Vec<Entry>,
    /// Non-fatal diagnostics, e.g. navigation ignored for search tags.
    pub warnings: Vec<String>,
}

/// Resolves `what` against `index`.
///
/// A concrete tag matches entries of the same name that it can refer to
/// (see [`Entry::is_referred_by`]). A search tag matches through its
/// [`Entry::matcher`]; navigation is not defined for search tags, so a
/// requested next/prev is dropped with a warning and all matches returned.
pub fn resolve(
    what: &Entry,
    index: &Index,
    opts: ResolveOptions,
) -> Result<Resolution, ResolveError> {
    let mut mode = opts.mode()?;
    let mut warnings = Vec::new();

    let matches: Vec<&Entry> = if what.is_search().is_some() {
        if mode != Mode::All {
            let msg = "--next and --prev are ignored when resolving a search tag";
            tracing::warn!("{}", msg);
            warnings.push(msg.to_string());
            mode = Mode::All;
        }

        let matcher = what.matcher()?;
        index.iter().filter(|e| matcher.matches(e)).collect()
    } else {
        index
            .iter()
            .filter(|e| e.name == what.name && e.is_referred_by(what))
            .collect()
    };

    tracing::debug!(what = %what, matches = matches.len(), ?mode, "resolving");

    let entries = navigate(&matches, &what.loc, mode, opts.cyclic)?
        .into_iter()
        .cloned()
        .collect();

    Ok(Resolution { entries, warnings })
}

/// Picks from an ordered match list relative to the location `at`.
pub fn navigate<'a>(
    matches: &[&'a Entry],
    at: &Location,
    mode: Mode,
    cyclic: bool,
) -> Result<Vec<&'a Entry>, ResolveError> {
    if mode == Mode::All {
        return Ok(matches.to_vec());
    }

    let mut found = matches
        .iter()
        .enumerate()
        .filter(|(_, e)| &e.loc == at)
        .map(|(i, _)| i);

    let pos = found.next();
    if found.next().is_some() {
        return Err(ResolveError::AmbiguousLocation(at.to_string()));
    }

    let picked = match (mode, pos) {
        (Mode::Next, Some(i)) => matches.get(i + 1),
        (Mode::Prev, Some(i)) if i > 0 => matches.get(i - 1),
        _ => None,
    };

    let picked = match picked {
        Some(e) => Some(*e),
        None if cyclic => {
            tracing::debug!(?mode, "wrapping around");
            match mode {
                Mode::Next => matches.first().copied(),
                _ => matches.last().copied(),
            }
        }
        None => None,
    };

    Ok(picked.into_iter().collect())
}
