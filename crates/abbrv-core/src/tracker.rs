use crate::store::PatternStore;
use crate::trie::{code_unit, Completion, NodeRef};
use serde::{Deserialize, Serialize};

/// Which candidate fires when several living matches are terminal on the
/// same keystroke (e.g. "ab" and "xab" after typing "xab").
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Deepest node wins; equal depth falls back to the earlier entry.
    #[default]
    Longest,
    /// Lowest entry index wins.
    FirstRegistered,
    /// The most recently started candidate wins.
    MostRecent,
}

/// Streaming matcher holding every abbreviation prefix still consistent
/// with what has been typed.
#[derive(Debug, Default)]
pub struct LiveMatchTracker {
    living: Vec<NodeRef>,
    tie_break: TieBreak,
}

impl LiveMatchTracker {
    pub fn new(tie_break: TieBreak) -> Self {
        Self {
            living: Vec::new(),
            tie_break,
        }
    }

    pub fn tie_break(&self) -> TieBreak {
        self.tie_break
    }

    pub fn set_tie_break(&mut self, tie_break: TieBreak) {
        self.tie_break = tie_break;
    }

    pub fn living_count(&self) -> usize {
        self.living.len()
    }

    pub fn reset(&mut self) {
        self.living.clear();
    }

    /// Feed one keystroke. Survivors step one node deeper, everything else
    /// (including stale handles from an older trie) is dropped, and a new
    /// candidate starts at depth one if the root knows `c`.
    pub fn advance(&mut self, store: &PatternStore, c: char) {
        let trie = store.trie();
        let unit = code_unit(c);

        // back to front so swap_remove only moves already-visited slots
        for slot in (0..self.living.len()).rev() {
            match unit.and_then(|u| trie.child(self.living[slot], u)) {
                Some(next) => self.living[slot] = next,
                None => {
                    self.living.swap_remove(slot);
                }
            }
        }

        if let Some(first) = unit.and_then(|u| trie.child(trie.root(), u)) {
            self.living.push(first);
        }
    }

    /// Pop at most one terminal candidate, chosen by the tie-break policy.
    /// Any other terminal candidates stay alive.
    pub fn check_for_completions(&mut self, store: &PatternStore) -> Option<Completion> {
        let trie = store.trie();
        let mut terminals = self
            .living
            .iter()
            .enumerate()
            .filter_map(|(slot, &at)| trie.terminal(at).map(|done| (slot, done)));

        let (slot, completion) = match self.tie_break {
            TieBreak::Longest => terminals.max_by(|(_, a), (_, b)| {
                a.depth.cmp(&b.depth).then_with(|| b.entry.cmp(&a.entry))
            }),
            TieBreak::FirstRegistered => terminals.min_by_key(|(_, done)| done.entry),
            TieBreak::MostRecent => terminals.last(),
        }?;

        self.living.swap_remove(slot);
        Some(completion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Entry;

    fn store(pairs: &[(&str, &str)]) -> PatternStore {
        PatternStore::from_entries(pairs.iter().map(|(a, e)| Entry::new(*a, *e)).collect())
    }

    /// Type `text` and collect the abbreviation of every completion.
    fn type_text(tracker: &mut LiveMatchTracker, store: &PatternStore, text: &str) -> Vec<String> {
        let mut fired = Vec::new();
        for c in text.chars() {
            tracker.advance(store, c);
            if let Some(done) = tracker.check_for_completions(store) {
                fired.push(store.entry(done.entry).unwrap().abbreviation.clone());
            }
        }
        fired
    }

    #[test]
    fn fires_once_on_last_character() {
        let store = store(&[("btw", "by the way")]);
        let mut tracker = LiveMatchTracker::default();

        tracker.advance(&store, 'b');
        assert_eq!(tracker.check_for_completions(&store), None);
        tracker.advance(&store, 't');
        assert_eq!(tracker.check_for_completions(&store), None);
        tracker.advance(&store, 'w');
        assert_eq!(
            tracker.check_for_completions(&store),
            Some(Completion { entry: 0, depth: 3 })
        );
        assert_eq!(tracker.check_for_completions(&store), None);
    }

    #[test]
    fn matches_inside_running_text() {
        let store = store(&[("btw", "by the way")]);
        let mut tracker = LiveMatchTracker::default();
        assert_eq!(type_text(&mut tracker, &store, "ok bbtw"), vec!["btw"]);
    }

    #[test]
    fn shortest_prefix_fires_first() {
        let store = store(&[("btw", "by the way"), ("b", "bold")]);
        let mut tracker = LiveMatchTracker::default();

        tracker.advance(&store, 'b');
        assert_eq!(tracker.living_count(), 1);
        let done = tracker.check_for_completions(&store).unwrap();
        assert_eq!(store.entry(done.entry).unwrap().expansion, "bold");
        // the "b" branch was consumed, so "btw" can never finish from here
        assert_eq!(type_text(&mut tracker, &store, "tw"), Vec::<String>::new());
    }

    #[test]
    fn non_matching_stream_never_fires() {
        let store = store(&[("btw", "x"), ("omw", "y")]);
        let mut tracker = LiveMatchTracker::default();
        assert!(type_text(&mut tracker, &store, "bt w om w bbbttt owm").is_empty());
    }

    #[test]
    fn out_of_range_character_breaks_matches() {
        let store = store(&[("btw", "by the way")]);
        let mut tracker = LiveMatchTracker::default();
        assert!(type_text(&mut tracker, &store, "bt€w").is_empty());
        assert_eq!(tracker.living_count(), 0);
    }

    #[test]
    fn longest_wins_by_default() {
        let store = store(&[("ab", "short"), ("xab", "long")]);
        let mut tracker = LiveMatchTracker::default();
        assert_eq!(type_text(&mut tracker, &store, "xab"), vec!["xab"]);
        // the shorter candidate is still alive and terminal
        let done = tracker.check_for_completions(&store).unwrap();
        assert_eq!(done.depth, 2);
    }

    #[test]
    fn first_registered_policy() {
        let store = store(&[("ab", "short"), ("xab", "long")]);
        let mut tracker = LiveMatchTracker::new(TieBreak::FirstRegistered);
        assert_eq!(type_text(&mut tracker, &store, "xab"), vec!["ab"]);
    }

    #[test]
    fn most_recent_policy() {
        let store = store(&[("xab", "long"), ("ab", "short")]);
        let mut tracker = LiveMatchTracker::new(TieBreak::MostRecent);
        // "ab" started after "xab", so it sits later in the living set
        assert_eq!(type_text(&mut tracker, &store, "xab"), vec!["ab"]);
    }

    #[test]
    fn rebuild_drops_stale_handles() {
        let mut store = store(&[("btw", "by the way")]);
        let mut tracker = LiveMatchTracker::default();
        type_text(&mut tracker, &store, "bt");
        assert_eq!(tracker.living_count(), 1);

        store.rebuild();
        tracker.advance(&store, 'w');
        assert_eq!(tracker.living_count(), 0);
        assert_eq!(tracker.check_for_completions(&store), None);
    }

    #[test]
    fn living_set_bounded_by_overlap_not_entry_count() {
        let mut entries: Vec<Entry> = (0..500).map(|i| Entry::new(format!("zq{i}"), "x")).collect();
        entries.push(Entry::new("aaaa", "y"));
        let store = PatternStore::from_entries(entries);
        let mut tracker = LiveMatchTracker::default();

        for c in "hello world ".chars() {
            tracker.advance(&store, c);
            assert!(tracker.living_count() <= 1);
        }
        // every 'a' opens a new overlapping candidate, capped by the depth
        for c in "aaa".chars() {
            tracker.advance(&store, c);
        }
        assert_eq!(tracker.living_count(), 3);
        tracker.advance(&store, 'a');
        assert_eq!(tracker.living_count(), 4);
        assert!(tracker.check_for_completions(&store).is_some());
        tracker.advance(&store, 'a');
        assert!(tracker.living_count() <= 4);
    }
}
