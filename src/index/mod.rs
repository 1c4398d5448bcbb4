pub mod codec;
pub mod filter;
pub mod models;
pub mod resolver;
pub mod store;

pub use codec::{deserialize, serialize, IndexReader, VERSION_MARKER};
pub use filter::EntryFilter;
pub use models::*;
pub use resolver::{resolve, Mode, Resolution, ResolveOptions};
pub use store::{read_index, write_index};

/// Entries kept in canonical order: by name, then location.
///
/// Duplicates are kept. Sorting is stable, so entries with equal keys stay in
/// insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Index {
    entries: Vec<Entry>,
}

impl Index {
    pub fn new(entries: Vec<Entry>) -> Self {
        let mut index = Self::default();
        index.add(entries);
        index
    }

    /// Appends entries and restores canonical order.
    pub fn add(&mut self, entries: impl IntoIterator<Item = Entry>) -> &mut Self {
        self.entries.extend(entries);
        self.entries.sort_by(Entry::canonical_cmp);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Entry> {
        self.entries.iter()
    }

    pub fn into_entries(self) -> Vec<Entry> {
        self.entries
    }

    /// Returns the entries accepted by `pred`, in canonical order.
    pub fn filter<F>(&self, mut pred: F) -> Index
    where
        F: FnMut(&Entry) -> bool,
    {
        Index {
            entries: self.entries.iter().filter(|e| pred(e)).cloned().collect(),
        }
    }
}

impl FromIterator<Entry> for Index {
    fn from_iter<I: IntoIterator<Item = Entry>>(iter: I) -> Self {
        Index::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Index {
    type Item = &'a Entry;
    type IntoIter = std::slice::Iter<'a, Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
