use crate::cli::Commands;
use crate::utils::preview;
use abbrv_core::config::{get_settings_file_path, load_settings};
use abbrv_core::{
    AbbrvError, Entry, ExpansionEngine, Library, PatternStore, ReplayEncoder, Result, Settings,
    UsLayout,
};
use abbrv_daemon::{daemon_status, daemon_worker_entry, start_daemon, stop_daemon, DaemonStatus};
use std::io::Write;
use std::path::Path;

const PREVIEW_WIDTH: usize = 48;

pub fn handle_command(
    command: Option<Commands>,
    data_file: &Path,
    out: &mut dyn Write,
) -> Result<()> {
    match command {
        Some(command) => handle_subcommand(command, data_file, out),
        // Default: list entries when no command provided
        None => list_entries(&Library::open(data_file)?, out),
    }
}

fn handle_subcommand(command: Commands, data_file: &Path, out: &mut dyn Write) -> Result<()> {
    match command {
        Commands::Add {
            abbreviation,
            expansion,
            multiline,
            hidden,
        } => {
            let mut library = Library::open(data_file)?;
            library.add(
                Entry::new(abbreviation.clone(), expansion)
                    .multiline(multiline)
                    .hidden(hidden),
            )?;
            writeln!(out, "Added {:?}", abbreviation)?;
        }
        Commands::Update {
            abbreviation,
            expansion,
        } => {
            Library::open(data_file)?.update(&abbreviation, expansion)?;
            writeln!(out, "Updated {:?}", abbreviation)?;
        }
        Commands::Delete { abbreviation } => {
            Library::open(data_file)?.delete(&abbreviation)?;
            writeln!(out, "Deleted {:?}", abbreviation)?;
        }
        Commands::ToggleMultiline { abbreviation } => {
            let value = Library::open(data_file)?.toggle_multiline(&abbreviation)?;
            writeln!(out, "{:?} multiline: {}", abbreviation, on_off(value))?;
        }
        Commands::ToggleHidden { abbreviation } => {
            let value = Library::open(data_file)?.toggle_hidden(&abbreviation)?;
            writeln!(out, "{:?} hidden: {}", abbreviation, on_off(value))?;
        }
        Commands::List => list_entries(&Library::open(data_file)?, out)?,
        Commands::Check { text } => {
            let settings = load_settings(&get_settings_file_path()).unwrap_or_default();
            check_text(&Library::open(data_file)?, &settings, &text, out)?;
        }
        Commands::Start => {
            let pid = start_daemon()?;
            writeln!(out, "Daemon started with PID {}.", pid)?;
        }
        Commands::Stop => {
            let pid = stop_daemon()?;
            writeln!(out, "Daemon with PID {} stopped.", pid)?;
        }
        Commands::Status => match daemon_status()? {
            DaemonStatus::Running(pid) => writeln!(out, "abbrv daemon is running with PID {}", pid)?,
            DaemonStatus::Stale(pid) => {
                writeln!(out, "PID file exists but process {} is not running", pid)?;
                writeln!(out, "Run 'abbrv stop' followed by 'abbrv start'")?;
            }
            DaemonStatus::Stopped => writeln!(out, "abbrv daemon is not running")?,
        },
        Commands::DaemonWorker => daemon_worker_entry()?,
    }
    Ok(())
}

fn on_off(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}

pub fn list_entries(library: &Library, out: &mut dyn Write) -> Result<()> {
    let entries = library.entries();
    if entries.is_empty() {
        writeln!(out, "No abbreviations in {}", library.path().display())?;
        return Ok(());
    }

    let width = entries
        .iter()
        .map(Entry::abbreviation_len)
        .max()
        .unwrap_or(0);
    for entry in entries {
        let mut flags = String::new();
        if entry.multiline {
            flags.push_str(" [multiline]");
        }
        if entry.hidden {
            flags.push_str(" [hidden]");
        }
        writeln!(
            out,
            "{:<width$}  {}{}",
            entry.abbreviation,
            preview(&entry.display_expansion(), PREVIEW_WIDTH),
            flags,
            width = width
        )?;
    }
    Ok(())
}

/// Run `text` through a fresh engine and report what would be typed.
pub fn check_text(
    library: &Library,
    settings: &Settings,
    text: &str,
    out: &mut dyn Write,
) -> Result<()> {
    let store = PatternStore::from_entries(library.entries().to_vec());
    let mut engine = ExpansionEngine::new(store, settings);
    let encoder = ReplayEncoder::<UsLayout>::default();

    let mut fired = 0;
    for (position, c) in text.chars().enumerate() {
        let Some(expansion) = engine.on_char(c) else {
            continue;
        };
        fired += 1;
        let shown = engine
            .store()
            .entry(expansion.entry)
            .map(Entry::display_expansion)
            .ok_or(AbbrvError::IndexOutOfRange(expansion.entry))?;
        writeln!(
            out,
            "at {}: {:?} -> {:?} ({} key events)",
            position + 1,
            expansion.abbreviation,
            preview(&shown, PREVIEW_WIDTH),
            encoder.expected_len(expansion.abbreviation_len, &expansion.text)
        )?;
    }

    if fired == 0 {
        writeln!(out, "No expansions")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn run(dir: &TempDir, command: Commands) -> Result<String> {
        let mut out = Vec::new();
        handle_command(Some(command), &dir.path().join("config.abbrv"), &mut out)?;
        Ok(String::from_utf8(out).unwrap())
    }

    fn add(dir: &TempDir, abbreviation: &str, expansion: &str, hidden: bool) {
        run(
            dir,
            Commands::Add {
                abbreviation: abbreviation.to_string(),
                expansion: expansion.to_string(),
                multiline: false,
                hidden,
            },
        )
        .unwrap();
    }

    #[test]
    fn list_masks_hidden_expansions() {
        let dir = tempfile::tempdir().unwrap();
        add(&dir, "btw", "by the way", false);
        add(&dir, "pw", "hunter2", true);

        let listing = run(&dir, Commands::List).unwrap();
        assert!(listing.contains("btw  by the way"));
        assert!(listing.contains("pw   ******* [hidden]"));
        assert!(!listing.contains("hunter2"));
    }

    #[test]
    fn edit_commands_persist() {
        let dir = tempfile::tempdir().unwrap();
        add(&dir, "ok", "OK", false);
        run(
            &dir,
            Commands::Update {
                abbreviation: "ok".to_string(),
                expansion: "okay".to_string(),
            },
        )
        .unwrap();
        let toggled = run(
            &dir,
            Commands::ToggleMultiline {
                abbreviation: "ok".to_string(),
            },
        )
        .unwrap();
        assert_eq!(toggled, "\"ok\" multiline: on\n");

        let library = Library::open(dir.path().join("config.abbrv")).unwrap();
        assert_eq!(library.entries(), &[Entry::new("ok", "okay").multiline(true)]);

        run(
            &dir,
            Commands::Delete {
                abbreviation: "ok".to_string(),
            },
        )
        .unwrap();
        assert!(run(&dir, Commands::List).unwrap().starts_with("No abbreviations"));
    }

    #[test]
    fn unknown_abbreviation_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = run(
            &dir,
            Commands::Delete {
                abbreviation: "nope".to_string(),
            },
        );
        assert!(matches!(result, Err(AbbrvError::EntryNotFound(_))));
    }

    #[test]
    fn check_reports_expansions_and_event_counts() {
        let dir = tempfile::tempdir().unwrap();
        add(&dir, "ok", "OK", false);
        add(&dir, "pw", "hunter2", true);

        let library = Library::open(dir.path().join("config.abbrv")).unwrap();
        let mut out = Vec::new();
        check_text(&library, &Settings::default(), "so ok, pw", &mut out).unwrap();
        let report = String::from_utf8(out).unwrap();

        assert_eq!(
            report,
            "at 5: \"ok\" -> \"OK\" (12 key events)\nat 9: \"pw\" -> \"*******\" (18 key events)\n"
        );
    }

    #[test]
    fn check_without_matches() {
        let dir = tempfile::tempdir().unwrap();
        let library = Library::open(dir.path().join("config.abbrv")).unwrap();
        let mut out = Vec::new();
        check_text(&library, &Settings::default(), "hello", &mut out).unwrap();
        assert_eq!(out, b"No expansions\n");
    }
}
