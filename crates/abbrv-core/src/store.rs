use crate::error::{AbbrvError, Result};
use crate::models::Entry;
use crate::trie::Trie;
use tracing::{debug, warn};

/// Authoritative entry list plus the trie built over its abbreviations.
///
/// The store does no I/O. Any edit that can move or remove an entry
/// rebuilds the trie wholesale under a new generation, which invalidates
/// every handle a tracker still holds.
#[derive(Debug)]
pub struct PatternStore {
    entries: Vec<Entry>,
    trie: Trie,
    generation: u64,
}

impl Default for PatternStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternStore {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            trie: Trie::new(0),
            generation: 0,
        }
    }

    pub fn from_entries(entries: Vec<Entry>) -> Self {
        let mut store = Self::new();
        store.entries = entries;
        store.rebuild();
        store
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn entry(&self, index: usize) -> Option<&Entry> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn trie(&self) -> &Trie {
        &self.trie
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Append an entry and thread its abbreviation into the live trie.
    pub fn insert(&mut self, entry: Entry) -> Result<usize> {
        entry.validate()?;
        let index = self.entries.len();
        self.trie.insert(&entry.abbreviation, index)?;
        debug!("Inserted abbreviation {:?} at {}", entry.abbreviation, index);
        self.entries.push(entry);
        Ok(index)
    }

    /// Throw the trie away and build a fresh one from the entry list, in
    /// list order so that later duplicates win.
    pub fn rebuild(&mut self) {
        self.generation += 1;
        self.trie = Trie::new(self.generation);

        for (index, entry) in self.entries.iter().enumerate() {
            if entry.abbreviation.is_empty() {
                continue;
            }
            if let Err(e) = entry.validate() {
                warn!("Skipping entry {}: {}", index, e);
                continue;
            }
            if let Err(e) = self.trie.insert(&entry.abbreviation, index) {
                warn!("Skipping entry {}: {}", index, e);
            }
        }

        debug!(
            "Rebuilt trie generation {} with {} nodes",
            self.generation,
            self.trie.node_count()
        );
    }

    pub fn delete(&mut self, index: usize) -> Result<Entry> {
        if index >= self.entries.len() {
            return Err(AbbrvError::IndexOutOfRange(index));
        }
        let removed = self.entries.remove(index);
        self.rebuild();
        Ok(removed)
    }

    pub fn update(&mut self, index: usize, entry: Entry) -> Result<()> {
        entry.validate()?;
        let slot = self
            .entries
            .get_mut(index)
            .ok_or(AbbrvError::IndexOutOfRange(index))?;
        *slot = entry;
        self.rebuild();
        Ok(())
    }

    // Flags do not touch the trie.
    pub fn set_multiline(&mut self, index: usize, multiline: bool) -> Result<()> {
        self.entry_mut(index)?.multiline = multiline;
        Ok(())
    }

    pub fn set_hidden(&mut self, index: usize, hidden: bool) -> Result<()> {
        self.entry_mut(index)?.hidden = hidden;
        Ok(())
    }

    pub fn replace_all(&mut self, entries: Vec<Entry>) {
        self.entries = entries;
        self.rebuild();
    }

    pub fn contains(&self, abbreviation: &str) -> bool {
        self.trie.contains(abbreviation)
    }

    /// Index of the entry that owns `abbreviation` in the trie.
    pub fn find(&self, abbreviation: &str) -> Option<usize> {
        self.trie.payload(abbreviation)
    }

    fn entry_mut(&mut self, index: usize) -> Result<&mut Entry> {
        self.entries
            .get_mut(index)
            .ok_or(AbbrvError::IndexOutOfRange(index))
    }
}
