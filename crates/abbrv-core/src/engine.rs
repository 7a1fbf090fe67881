use crate::config::Settings;
use crate::error::Result;
use crate::models::Entry;
use crate::store::PatternStore;
use crate::tracker::LiveMatchTracker;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

/// Engine shared between the keyboard hook thread and whoever edits the
/// entries.
pub type SharedEngine = Arc<Mutex<ExpansionEngine>>;

/// An expansion ready to be replayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expansion {
    pub entry: usize,
    pub abbreviation: String,
    /// Characters to erase.
    pub abbreviation_len: usize,
    pub text: String,
}

/// Pattern store and live tracker kept under one lock, so an edit and the
/// tracker reset it requires happen as one step for the hook callback.
#[derive(Debug)]
pub struct ExpansionEngine {
    store: PatternStore,
    tracker: LiveMatchTracker,
    reset_after_expansion: bool,
}

impl ExpansionEngine {
    pub fn new(store: PatternStore, settings: &Settings) -> Self {
        Self {
            store,
            tracker: LiveMatchTracker::new(settings.tie_break),
            reset_after_expansion: settings.reset_after_expansion,
        }
    }

    pub fn shared(self) -> SharedEngine {
        Arc::new(Mutex::new(self))
    }

    pub fn store(&self) -> &PatternStore {
        &self.store
    }

    pub fn living_count(&self) -> usize {
        self.tracker.living_count()
    }

    /// Advance on one typed character and report the expansion it completes.
    pub fn on_char(&mut self, c: char) -> Option<Expansion> {
        self.tracker.advance(&self.store, c);
        let completion = self.tracker.check_for_completions(&self.store)?;
        let entry = self.store.entry(completion.entry)?;

        let expansion = Expansion {
            entry: completion.entry,
            abbreviation: entry.abbreviation.clone(),
            abbreviation_len: completion.depth,
            text: entry.expansion.clone(),
        };
        info!("Matched abbreviation {:?}", expansion.abbreviation);

        if self.reset_after_expansion {
            self.tracker.reset();
        }
        Some(expansion)
    }

    /// A key that cannot be part of any abbreviation (arrows, clicks).
    pub fn on_break(&mut self) {
        if self.tracker.living_count() > 0 {
            debug!("Break key, dropping {} live matches", self.tracker.living_count());
        }
        self.tracker.reset();
    }

    pub fn replace_entries(&mut self, entries: Vec<Entry>) {
        self.store.replace_all(entries);
        self.tracker.reset();
        info!("Loaded {} abbreviations", self.store.len());
    }

    /// Apply an edit to the store; the tracker is reset whatever the outcome.
    pub fn edit<T>(&mut self, f: impl FnOnce(&mut PatternStore) -> Result<T>) -> Result<T> {
        let result = f(&mut self.store);
        self.tracker.reset();
        result
    }

    pub fn apply_settings(&mut self, settings: &Settings) {
        self.tracker.set_tie_break(settings.tie_break);
        self.reset_after_expansion = settings.reset_after_expansion;
    }
}
