//! Reading and writing `config.abbrv`.
//!
//! Current layout: a version line, an entry count line, then one block per
//! entry. Every token in a block ends with [`DELIMITER`], so values may hold
//! newlines and colons:
//!
//! ```text
//! abbrv-v2
//! 1
//! {␟	hidden:0␟	multiline:0␟	abbreviation:btw␟	expansion:by the way␟}␟
//! ```
//!
//! Files without the version line are in the older unversioned layout
//! (`<multiline> <abbreviation>␟<expansion>` records joined by the
//! delimiter). They are backed up and rewritten on first load.

use crate::config::{backup_path_for, DELIMITER, FORMAT_VERSION, LEGACY_RECORD_LIMIT};
use crate::error::{AbbrvError, Result};
use crate::models::Entry;
use crate::store::PatternStore;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const OPEN: &str = "{";
const CLOSE: &str = "}";

#[derive(Debug, Default)]
pub struct LoadOutcome {
    pub entries: Vec<Entry>,
    /// The file was in the legacy layout and has been rewritten.
    pub migrated: bool,
}

pub fn serialize_entries(entries: &[Entry]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", FORMAT_VERSION);
    let _ = writeln!(out, "{}", entries.len());
    for entry in entries {
        out.push_str(OPEN);
        out.push(DELIMITER);
        write_field(&mut out, "hidden", if entry.hidden { "1" } else { "0" });
        write_field(&mut out, "multiline", if entry.multiline { "1" } else { "0" });
        write_field(&mut out, "abbreviation", &entry.abbreviation);
        write_field(&mut out, "expansion", &entry.expansion);
        out.push_str(CLOSE);
        out.push(DELIMITER);
        out.push('\n');
    }
    out
}

fn write_field(out: &mut String, label: &str, value: &str) {
    out.push('\t');
    out.push_str(label);
    out.push(':');
    out.push_str(value);
    out.push(DELIMITER);
}

fn has_current_header(text: &str) -> bool {
    text.lines().next().map(str::trim_end) == Some(FORMAT_VERSION)
}

/// Parse the current, versioned layout.
pub fn parse_entries(text: &str) -> Result<Vec<Entry>> {
    let mut lines = text.splitn(3, '\n');
    let header = lines.next().unwrap_or_default().trim_end();
    if header != FORMAT_VERSION {
        return Err(AbbrvError::Format(format!(
            "expected header {:?}, found {:?}",
            FORMAT_VERSION, header
        )));
    }
    let declared: usize = lines
        .next()
        .unwrap_or_default()
        .trim()
        .parse()
        .map_err(|_| AbbrvError::Format("missing or invalid entry count".to_string()))?;
    let body = lines.next().unwrap_or_default();

    let mut entries = Vec::with_capacity(declared);
    let mut current: Option<Entry> = None;

    for token in body.split(DELIMITER) {
        let token = token.trim_start();
        if token.is_empty() {
            continue;
        }
        match token {
            OPEN => {
                if current.is_some() {
                    return Err(AbbrvError::Format("nested entry block".to_string()));
                }
                current = Some(Entry::default());
            }
            CLOSE => {
                let entry = current
                    .take()
                    .ok_or_else(|| AbbrvError::Format("unmatched closing brace".to_string()))?;
                entries.push(entry);
            }
            _ => {
                let entry = current.as_mut().ok_or_else(|| {
                    AbbrvError::Format(format!("field outside an entry block: {:?}", token))
                })?;
                let (label, value) = token
                    .split_once(':')
                    .ok_or_else(|| AbbrvError::Format(format!("unlabelled field {:?}", token)))?;
                match label {
                    "hidden" => entry.hidden = parse_flag(value)?,
                    "multiline" => entry.multiline = parse_flag(value)?,
                    "abbreviation" => entry.abbreviation = value.to_string(),
                    "expansion" => entry.expansion = value.to_string(),
                    other => debug!("Ignoring unknown field {:?}", other),
                }
            }
        }
    }

    if current.is_some() {
        return Err(AbbrvError::Format("unterminated entry block".to_string()));
    }
    if entries.len() != declared {
        warn!(
            "Data file declares {} entries but holds {}",
            declared,
            entries.len()
        );
    }
    Ok(entries)
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.trim() {
        "1" | "true" => Ok(true),
        "0" | "false" => Ok(false),
        other => Err(AbbrvError::Format(format!("invalid flag {:?}", other))),
    }
}

/// Parse the unversioned layout. Gives up after [`LEGACY_RECORD_LIMIT`]
/// tokens rather than trusting a file that never ends.
pub fn parse_legacy_entries(text: &str) -> Result<Vec<Entry>> {
    let mut entries = Vec::new();
    if text.trim().is_empty() {
        return Ok(entries);
    }

    let mut tokens = text.split(DELIMITER);
    let mut read = 0usize;

    while let Some(head) = tokens.next() {
        read += 1;
        if read > LEGACY_RECORD_LIMIT {
            return Err(AbbrvError::Format(format!(
                "legacy file exceeds {} records",
                LEGACY_RECORD_LIMIT
            )));
        }

        let head = head.trim_start();
        if head.is_empty() {
            // trailing delimiter
            continue;
        }
        let mut chars = head.chars();
        let multiline = match chars.next() {
            Some('0') => false,
            Some('1') => true,
            _ => {
                return Err(AbbrvError::Format(format!(
                    "legacy record does not start with a flag: {:?}",
                    head
                )))
            }
        };
        let abbreviation = chars.as_str().trim_start().to_string();
        let expansion = tokens.next().unwrap_or_default().to_string();
        read += 1;

        if abbreviation.is_empty() {
            continue;
        }
        entries.push(Entry {
            abbreviation,
            expansion,
            multiline,
            hidden: false,
        });
    }

    Ok(entries)
}

pub fn save_entries(path: &Path, entries: &[Entry]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, serialize_entries(entries))?;
    debug!("Saved {} entries to {}", entries.len(), path.display());
    Ok(())
}

/// Load entries from `path`.
///
/// A missing file is an empty set. A legacy file is copied to its backup
/// path first, then parsed and rewritten; if it cannot be parsed the set is
/// empty and the file is left as it was. A malformed current-format file is
/// an error so that nobody saves over it.
pub fn load_entries(path: &Path) -> Result<LoadOutcome> {
    if !path.exists() {
        warn!("No data file at {}, starting empty", path.display());
        return Ok(LoadOutcome::default());
    }

    let text = fs::read_to_string(path)?;
    if text.trim().is_empty() {
        return Ok(LoadOutcome::default());
    }

    if has_current_header(&text) {
        let entries = parse_entries(&text)?;
        debug!("Loaded {} entries from {}", entries.len(), path.display());
        return Ok(LoadOutcome {
            entries,
            migrated: false,
        });
    }

    let backup = backup_path_for(path);
    fs::copy(path, &backup)?;
    info!("Backed up legacy data file to {}", backup.display());

    match parse_legacy_entries(&text) {
        Ok(entries) => {
            save_entries(path, &entries)?;
            info!("Migrated {} entries to {}", entries.len(), FORMAT_VERSION);
            Ok(LoadOutcome {
                entries,
                migrated: true,
            })
        }
        Err(e) => {
            warn!("Could not migrate {}: {}", path.display(), e);
            Ok(LoadOutcome::default())
        }
    }
}

/// The entry list bound to its data file. Every mutation goes through the
/// pattern store and is saved before returning.
#[derive(Debug)]
pub struct Library {
    store: PatternStore,
    path: PathBuf,
}

impl Library {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let outcome = load_entries(&path)?;
        Ok(Self {
            store: PatternStore::from_entries(outcome.entries),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn store(&self) -> &PatternStore {
        &self.store
    }

    pub fn entries(&self) -> &[Entry] {
        self.store.entries()
    }

    /// Position of the row owning `abbreviation` (the last one wins).
    pub fn position(&self, abbreviation: &str) -> Option<usize> {
        self.store
            .entries()
            .iter()
            .rposition(|entry| entry.abbreviation == abbreviation)
    }

    pub fn find(&self, abbreviation: &str) -> Option<&Entry> {
        self.position(abbreviation)
            .and_then(|index| self.store.entry(index))
    }

    pub fn add(&mut self, entry: Entry) -> Result<()> {
        if self.position(&entry.abbreviation).is_some() {
            return Err(AbbrvError::DuplicateAbbreviation(entry.abbreviation));
        }
        self.store.insert(entry)?;
        self.save()
    }

    pub fn update(&mut self, abbreviation: &str, expansion: String) -> Result<()> {
        let index = self.require(abbreviation)?;
        let mut entry = self.store.entries()[index].clone();
        entry.expansion = expansion;
        self.store.update(index, entry)?;
        self.save()
    }

    pub fn delete(&mut self, abbreviation: &str) -> Result<Entry> {
        let index = self.require(abbreviation)?;
        let removed = self.store.delete(index)?;
        self.save()?;
        Ok(removed)
    }

    pub fn set_multiline(&mut self, abbreviation: &str, multiline: bool) -> Result<()> {
        let index = self.require(abbreviation)?;
        self.store.set_multiline(index, multiline)?;
        self.save()
    }

    pub fn set_hidden(&mut self, abbreviation: &str, hidden: bool) -> Result<()> {
        let index = self.require(abbreviation)?;
        self.store.set_hidden(index, hidden)?;
        self.save()
    }

    /// Flip the multiline flag, returning the new value.
    pub fn toggle_multiline(&mut self, abbreviation: &str) -> Result<bool> {
        let value = !self.require_entry(abbreviation)?.multiline;
        self.set_multiline(abbreviation, value)?;
        Ok(value)
    }

    pub fn toggle_hidden(&mut self, abbreviation: &str) -> Result<bool> {
        let value = !self.require_entry(abbreviation)?.hidden;
        self.set_hidden(abbreviation, value)?;
        Ok(value)
    }

    pub fn save(&self) -> Result<()> {
        save_entries(&self.path, self.store.entries())
    }

    fn require(&self, abbreviation: &str) -> Result<usize> {
        self.position(abbreviation)
            .ok_or_else(|| AbbrvError::EntryNotFound(abbreviation.to_string()))
    }

    fn require_entry(&self, abbreviation: &str) -> Result<&Entry> {
        self.find(abbreviation)
            .ok_or_else(|| AbbrvError::EntryNotFound(abbreviation.to_string()))
    }
}
