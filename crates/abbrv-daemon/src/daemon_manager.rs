use crate::keyboard_listener::start_keyboard_listener;
use crate::process::{spawn_detached, terminate_process, verify_process_running};
use abbrv_core::config::{
    ensure_config_dir, get_data_file_path, get_log_file_path, get_pid_file_path,
    get_settings_file_path, load_settings,
};
use abbrv_core::{
    is_daemon_running, load_entries, AbbrvError, ExpansionEngine, ListenerSwitch, PatternStore,
    Result, SharedEngine,
};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant, SystemTime};
use tracing::{error, info, warn};

const TICK: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonStatus {
    Running(u32),
    /// A PID file exists but its process is gone.
    Stale(u32),
    Stopped,
}

/// Start the daemon process
pub fn start_daemon() -> Result<u32> {
    if let Some(pid) = is_daemon_running()? {
        if verify_process_running(pid) {
            return Err(AbbrvError::DaemonAlreadyRunning(pid));
        }
        warn!("Found stale PID file for {}, removing it", pid);
        let _ = fs::remove_file(get_pid_file_path());
    }

    ensure_config_dir()?;
    let log_file = get_log_file_path();
    let current_exe = std::env::current_exe()?;
    spawn_detached(&current_exe, &["daemon-worker"], &log_file)?;

    // Wait for the worker to write its PID file
    for _ in 0..20 {
        thread::sleep(TICK);
        if let Some(pid) = is_daemon_running()? {
            if verify_process_running(pid) {
                info!("Daemon started with PID {}", pid);
                return Ok(pid);
            }
        }
    }

    Err(AbbrvError::Other(format!(
        "Daemon failed to start. Check logs at {}",
        log_file.display()
    )))
}

/// Stop the daemon if it's running
pub fn stop_daemon() -> Result<u32> {
    let pid_file = get_pid_file_path();
    if !pid_file.exists() {
        return Err(AbbrvError::DaemonNotRunning);
    }

    let pid = match fs::read_to_string(&pid_file)?.trim().parse::<u32>() {
        Ok(pid) => pid,
        Err(_) => {
            let _ = fs::remove_file(&pid_file);
            return Err(AbbrvError::InvalidPid);
        }
    };

    let result = terminate_process(pid);
    // The worker cannot clean up after a kill, so the PID file goes either way
    let _ = fs::remove_file(&pid_file);
    result?;

    info!("Daemon with PID {} stopped", pid);
    Ok(pid)
}

/// Check daemon status
pub fn daemon_status() -> Result<DaemonStatus> {
    Ok(match is_daemon_running()? {
        Some(pid) if verify_process_running(pid) => DaemonStatus::Running(pid),
        Some(pid) => DaemonStatus::Stale(pid),
        None => DaemonStatus::Stopped,
    })
}

/// Watches a file's modification time.
#[derive(Debug)]
pub struct FileWatcher {
    path: PathBuf,
    last_modified: Option<SystemTime>,
}

impl FileWatcher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let last_modified = modified(&path);
        Self {
            path,
            last_modified,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True once per change of the modification time. A file that vanishes
    /// is not a change.
    pub fn changed(&mut self) -> bool {
        let current = modified(&self.path);
        if current == self.last_modified {
            return false;
        }
        self.last_modified = current;
        current.is_some()
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|meta| meta.modified()).ok()
}

/// Read the data file and swap its entries into the engine.
///
/// The file is read before the lock is taken; the swap and the tracker
/// reset happen under it.
pub fn reload_entries(engine: &SharedEngine, path: &Path) -> Result<usize> {
    let outcome = load_entries(path)?;
    let count = outcome.entries.len();
    engine.lock().replace_entries(outcome.entries);
    Ok(count)
}

pub fn reload_settings(engine: &SharedEngine, path: &Path) -> Result<()> {
    let settings = load_settings(path)?;
    engine.lock().apply_settings(&settings);
    info!("Applied settings from {}", path.display());
    Ok(())
}

/// The actual daemon worker process.
///
/// Runs until the keyboard listener gives up; `abbrv stop` ends it with a
/// signal instead.
pub fn run_daemon_worker() -> Result<()> {
    run_worker(&get_data_file_path(), &get_settings_file_path())
}

fn run_worker(data_path: &Path, settings_path: &Path) -> Result<()> {
    let settings = load_settings(settings_path).unwrap_or_else(|e| {
        warn!("Ignoring unreadable settings: {}", e);
        Default::default()
    });

    let entries = match load_entries(data_path) {
        Ok(outcome) => outcome.entries,
        Err(e) => {
            error!("Could not read {}: {}", data_path.display(), e);
            Vec::new()
        }
    };
    info!("Loaded {} abbreviations", entries.len());

    let engine = ExpansionEngine::new(PatternStore::from_entries(entries), &settings).shared();
    let switch = Arc::new(ListenerSwitch::new());

    let keyboard_thread = start_keyboard_listener(
        Arc::clone(&engine),
        switch,
        Duration::from_millis(settings.key_delay_ms),
    );

    let mut data_watcher = FileWatcher::new(data_path);
    let mut settings_watcher = FileWatcher::new(settings_path);
    let check_interval = Duration::from_millis(settings.reload_interval_ms.max(1));
    let mut last_check = Instant::now();

    // rdev::listen never returns while the hook works
    while !keyboard_thread.is_finished() {
        thread::sleep(TICK);
        if last_check.elapsed() < check_interval {
            continue;
        }
        last_check = Instant::now();

        if data_watcher.changed() {
            match reload_entries(&engine, data_watcher.path()) {
                Ok(count) => info!("Reloaded {} abbreviations", count),
                // keep matching with what we had
                Err(e) => warn!("Reload of {} failed: {}", data_watcher.path().display(), e),
            }
        }
        if settings_watcher.changed() {
            if let Err(e) = reload_settings(&engine, settings_watcher.path()) {
                warn!("Reload of settings failed: {}", e);
            }
        }
    }

    if let Err(e) = keyboard_thread.join() {
        error!("Error joining keyboard thread: {:?}", e);
    }
    Err(AbbrvError::Keyboard("keyboard listener stopped".to_string()))
}

/// This function runs as a separate daemon process
pub fn daemon_worker_entry() -> Result<()> {
    ensure_config_dir()?;
    let pid_file = get_pid_file_path();
    let mut file = File::create(&pid_file)?;
    write!(file, "{}", process::id())?;
    info!("Daemon worker running as PID {}", process::id());

    let result = run_daemon_worker();

    // Clean up PID file on exit
    let _ = fs::remove_file(&pid_file);

    result
}
