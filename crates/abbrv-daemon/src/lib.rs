pub mod daemon_manager;
pub mod keyboard_listener;
pub mod process;

pub use daemon_manager::{
    daemon_status, daemon_worker_entry, run_daemon_worker, start_daemon, stop_daemon,
    DaemonStatus, FileWatcher,
};
pub use keyboard_listener::{classify, start_keyboard_listener};
pub use process::verify_process_running;
