pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod guard;
pub mod keyboard;
pub mod models;
pub mod replay;
pub mod storage;
pub mod store;
pub mod tracker;
pub mod trie;

// Re-export common items for convenience
pub use config::{get_config_dir, is_daemon_running, Settings};
pub use dispatch::{Dispatch, KeyDispatcher, TypedKey};
pub use engine::{Expansion, ExpansionEngine, SharedEngine};
pub use error::{AbbrvError, Result};
pub use guard::{ListenerState, ListenerSwitch, SuspendGuard, ECHO_GRACE};
pub use keyboard::{spawn_injector, EnigoInjector, InjectionJob, InjectionQueue, KeyInjector};
pub use models::Entry;
pub use replay::{KeyAction, KeyboardLayout, ReplayEncoder, UsLayout, VirtualKey};
pub use storage::{load_entries, save_entries, Library, LoadOutcome};
pub use store::PatternStore;
pub use tracker::{LiveMatchTracker, TieBreak};
