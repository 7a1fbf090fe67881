use crate::error::Result;
use crate::tracker::TieBreak;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const DATA_FILENAME: &str = "config.abbrv";
pub const BACKUP_SUFFIX: &str = ".bak";
pub const PID_FILENAME: &str = "abbrv-daemon.pid";
pub const SETTINGS_FILENAME: &str = "settings.json";
pub const LOG_FILENAME: &str = "daemon_log.txt";

/// Trie children are indexed by 7-bit code unit.
pub const ALPHABET_SIZE: usize = 128;
pub const ABBREVIATION_MAX_LEN: usize = 1023;
pub const EXPANSION_MAX_LEN: usize = 4095;

/// Unit separator. Ordinary typed text never contains it, so abbreviations
/// and expansions can hold newlines and colons.
pub const DELIMITER: char = '\x1f';
pub const FORMAT_VERSION: &str = "abbrv-v2";
pub const LEGACY_RECORD_LIMIT: usize = 100_000;

/// Runtime knobs read from `settings.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Which terminal candidate fires when several complete on one keystroke.
    pub tie_break: TieBreak,
    /// Pause between injected key actions.
    pub key_delay_ms: u64,
    /// Forget every partial match once an expansion has been typed.
    pub reset_after_expansion: bool,
    /// How often the daemon checks the data file for edits.
    pub reload_interval_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tie_break: TieBreak::default(),
            key_delay_ms: 2,
            reset_after_expansion: true,
            reload_interval_ms: 1000,
        }
    }
}

/// Get the abbrv configuration directory
pub fn get_config_dir() -> PathBuf {
    env::var("HOME")
        .map(|home| PathBuf::from(home).join(".abbrv"))
        .unwrap_or_else(|_| PathBuf::from(".abbrv"))
}

/// Ensure the configuration directory exists
pub fn ensure_config_dir() -> Result<PathBuf> {
    let config_dir = get_config_dir();
    if !config_dir.exists() {
        info!("Creating config directory at {}", config_dir.display());
        fs::create_dir_all(&config_dir)?;
    }
    Ok(config_dir)
}

/// Get the path to the abbreviation data file
pub fn get_data_file_path() -> PathBuf {
    get_config_dir().join(DATA_FILENAME)
}

/// Get the path to the PID file
pub fn get_pid_file_path() -> PathBuf {
    get_config_dir().join(PID_FILENAME)
}

pub fn get_settings_file_path() -> PathBuf {
    get_config_dir().join(SETTINGS_FILENAME)
}

pub fn get_log_file_path() -> PathBuf {
    get_config_dir().join(LOG_FILENAME)
}

/// Where a migrated data file keeps its pre-migration contents.
pub fn backup_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(BACKUP_SUFFIX);
    PathBuf::from(name)
}

/// Load settings, falling back to defaults when the file does not exist.
pub fn load_settings(path: &Path) -> Result<Settings> {
    if !path.exists() {
        debug!("No settings at {}, using defaults", path.display());
        return Ok(Settings::default());
    }

    let content = fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(Settings::default());
    }

    Ok(serde_json::from_str(&content)?)
}

pub fn save_settings(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let serialized = serde_json::to_string_pretty(settings)?;
    fs::write(path, serialized)?;
    Ok(())
}

/// Check if daemon is running
pub fn is_daemon_running() -> Result<Option<u32>> {
    read_pid_file(&get_pid_file_path())
}

/// Read a PID file, cleaning it up when it is unreadable or garbled.
pub fn read_pid_file(pid_file: &Path) -> Result<Option<u32>> {
    if !pid_file.exists() {
        return Ok(None);
    }

    match fs::read_to_string(pid_file) {
        Ok(contents) => match contents.trim().parse::<u32>() {
            Ok(pid) => Ok(Some(pid)),
            Err(_) => {
                // Invalid PID, treat as not running and clean up
                let _ = fs::remove_file(pid_file);
                Ok(None)
            }
        },
        Err(_) => {
            let _ = fs::remove_file(pid_file);
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_settings_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings(&dir.path().join("settings.json")).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.tie_break, TieBreak::Longest);
    }

    #[test]
    fn partial_settings_fill_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "tie_break": "most_recent", "key_delay_ms": 0 }"#).unwrap();

        let settings = load_settings(&path).unwrap();
        assert_eq!(settings.tie_break, TieBreak::MostRecent);
        assert_eq!(settings.key_delay_ms, 0);
        assert!(settings.reset_after_expansion);
        assert_eq!(settings.reload_interval_ms, 1000);
    }

    #[test]
    fn malformed_settings_are_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ tie_break").unwrap();
        assert!(load_settings(&path).is_err());
    }

    #[test]
    fn settings_survive_a_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let settings = Settings {
            tie_break: TieBreak::FirstRegistered,
            key_delay_ms: 7,
            reset_after_expansion: false,
            reload_interval_ms: 250,
        };
        save_settings(&path, &settings).unwrap();
        assert_eq!(load_settings(&path).unwrap(), settings);
    }

    #[test]
    fn garbled_pid_file_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PID_FILENAME);
        fs::write(&path, "not-a-pid").unwrap();
        assert_eq!(read_pid_file(&path).unwrap(), None);
        assert!(!path.exists());

        fs::write(&path, "4242\n").unwrap();
        assert_eq!(read_pid_file(&path).unwrap(), Some(4242));
    }

    #[test]
    fn backup_path_appends_suffix() {
        let path = Path::new("/tmp/x/config.abbrv");
        assert_eq!(backup_path_for(path), PathBuf::from("/tmp/x/config.abbrv.bak"));
    }
}
