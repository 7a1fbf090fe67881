//! Prefix trie over abbreviation code units.
//!
//! Nodes live in an arena and are addressed by index. Every handle handed
//! out carries the generation of the trie that produced it, so a handle kept
//! across a rebuild is recognised as stale instead of pointing into a
//! different tree.

use crate::config::ALPHABET_SIZE;
use crate::error::{AbbrvError, Result};
use std::collections::HashMap;

type NodeId = u32;

const ROOT: NodeId = 0;

/// Generation-tagged position in a [`Trie`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeRef {
    generation: u64,
    node: NodeId,
}

impl NodeRef {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// A terminal node reached by a living match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    /// Index of the owning entry in the store's entry list.
    pub entry: usize,
    /// Characters consumed from the root, i.e. the abbreviation length.
    pub depth: usize,
}

#[derive(Debug)]
struct Node {
    children: HashMap<u8, NodeId>,
    // terminal iff Some
    payload: Option<usize>,
    depth: usize,
}

impl Node {
    fn new(depth: usize) -> Self {
        Self {
            children: HashMap::new(),
            payload: None,
            depth,
        }
    }
}

/// Map a character onto the child index domain, or `None` if it falls
/// outside it.
pub fn code_unit(c: char) -> Option<u8> {
    let value = c as u32;
    if value < ALPHABET_SIZE as u32 {
        Some(value as u8)
    } else {
        None
    }
}

#[derive(Debug)]
pub struct Trie {
    nodes: Vec<Node>,
    generation: u64,
}

impl Trie {
    pub fn new(generation: u64) -> Self {
        Self {
            nodes: vec![Node::new(0)],
            generation,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn root(&self) -> NodeRef {
        self.handle(ROOT)
    }

    /// Walk or create one node per character of `key` and mark the last one
    /// terminal for `payload`. A later insert of the same key overwrites the
    /// payload.
    pub fn insert(&mut self, key: &str, payload: usize) -> Result<()> {
        if key.is_empty() {
            return Err(AbbrvError::InvalidAbbreviation {
                abbreviation: String::new(),
                reason: "abbreviation is empty",
            });
        }
        let units = key
            .chars()
            .map(code_unit)
            .collect::<Option<Vec<u8>>>()
            .ok_or_else(|| AbbrvError::InvalidAbbreviation {
                abbreviation: key.to_string(),
                reason: "characters must be ASCII",
            })?;

        let mut current = ROOT;
        for unit in units {
            current = match self.nodes[current as usize].children.get(&unit) {
                Some(&child) => child,
                None => {
                    let depth = self.nodes[current as usize].depth + 1;
                    let child = self.nodes.len() as NodeId;
                    self.nodes.push(Node::new(depth));
                    self.nodes[current as usize].children.insert(unit, child);
                    child
                }
            };
        }

        self.nodes[current as usize].payload = Some(payload);
        Ok(())
    }

    /// Exact lookup: true iff `key` ends on a terminal node.
    pub fn contains(&self, key: &str) -> bool {
        self.payload(key).is_some()
    }

    pub fn payload(&self, key: &str) -> Option<usize> {
        let mut current = self.root();
        for c in key.chars() {
            current = self.child(current, code_unit(c)?)?;
        }
        self.nodes[current.node as usize].payload
    }

    /// True if the handle was produced by this trie.
    pub fn is_current(&self, at: NodeRef) -> bool {
        at.generation == self.generation && (at.node as usize) < self.nodes.len()
    }

    /// Step from `at` along `unit`. Stale handles have no children.
    pub fn child(&self, at: NodeRef, unit: u8) -> Option<NodeRef> {
        if !self.is_current(at) {
            return None;
        }
        self.nodes[at.node as usize]
            .children
            .get(&unit)
            .map(|&child| self.handle(child))
    }

    pub fn terminal(&self, at: NodeRef) -> Option<Completion> {
        if !self.is_current(at) {
            return None;
        }
        let node = &self.nodes[at.node as usize];
        node.payload.map(|entry| Completion {
            entry,
            depth: node.depth,
        })
    }

    pub fn depth(&self, at: NodeRef) -> Option<usize> {
        if self.is_current(at) {
            Some(self.nodes[at.node as usize].depth)
        } else {
            None
        }
    }

    fn handle(&self, node: NodeId) -> NodeRef {
        NodeRef {
            generation: self.generation,
            node,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_only_whole_keys() {
        let mut trie = Trie::new(1);
        trie.insert("btw", 0).unwrap();
        trie.insert("b", 1).unwrap();

        assert!(trie.contains("btw"));
        assert!(trie.contains("b"));
        assert!(!trie.contains("bt"));
        assert!(!trie.contains("btwx"));
        assert!(!trie.contains(""));
    }

    #[test]
    fn shared_prefixes_share_nodes() {
        let mut trie = Trie::new(1);
        trie.insert("abc", 0).unwrap();
        trie.insert("abd", 1).unwrap();
        // root + a + b + c + d
        assert_eq!(trie.node_count(), 5);
    }

    #[test]
    fn later_insert_overwrites_payload() {
        let mut trie = Trie::new(1);
        trie.insert("sig", 0).unwrap();
        trie.insert("sig", 3).unwrap();
        assert_eq!(trie.payload("sig"), Some(3));
    }

    #[test]
    fn rejects_out_of_range_characters() {
        let mut trie = Trie::new(1);
        assert!(trie.insert("naïve", 0).is_err());
        assert!(trie.insert("", 0).is_err());
        assert_eq!(trie.node_count(), 1);
        assert!(!trie.contains("naïve"));
    }

    #[test]
    fn stale_handles_are_inert() {
        let mut old = Trie::new(1);
        old.insert("ab", 0).unwrap();
        let a = old.child(old.root(), b'a').unwrap();

        let mut fresh = Trie::new(2);
        fresh.insert("ab", 0).unwrap();

        assert!(!fresh.is_current(a));
        assert_eq!(fresh.child(a, b'b'), None);
        assert_eq!(fresh.terminal(a), None);
        assert_eq!(fresh.depth(a), None);
    }

    #[test]
    fn terminal_reports_depth() {
        let mut trie = Trie::new(1);
        trie.insert("ok", 5).unwrap();
        let o = trie.child(trie.root(), b'o').unwrap();
        let k = trie.child(o, b'k').unwrap();
        assert_eq!(trie.terminal(o), None);
        assert_eq!(trie.terminal(k), Some(Completion { entry: 5, depth: 2 }));
    }
}
