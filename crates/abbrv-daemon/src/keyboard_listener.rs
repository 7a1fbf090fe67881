use abbrv_core::{
    spawn_injector, EnigoInjector, KeyDispatcher, ListenerSwitch, ReplayEncoder, Result,
    SharedEngine, TypedKey, UsLayout,
};
use rdev::{self, EventType, Key as RdevKey};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

const MAX_RETRIES: u32 = 5;

/// Decide what a raw hook event means to the matcher.
///
/// `name` is the text the platform reports for the key press, already
/// shifted. Modifier presses return `None`: holding shift or ctrl must not
/// break a match in progress.
///
/// Matching runs on key press, since rdev only names press events and
/// fast typing releases keys out of order. The replay for a completed
/// abbreviation is queued to the injector thread and the callback returns
/// at once, so the completing press is already in the input stream ahead
/// of the synthetic backspaces.
pub fn classify(event_type: &EventType, name: Option<&str>) -> Option<TypedKey> {
    let key = match event_type {
        EventType::KeyPress(key) => key,
        EventType::ButtonPress(_) => return Some(TypedKey::Break),
        _ => return None,
    };

    match key {
        RdevKey::ShiftLeft
        | RdevKey::ShiftRight
        | RdevKey::ControlLeft
        | RdevKey::ControlRight
        | RdevKey::Alt
        | RdevKey::AltGr
        | RdevKey::MetaLeft
        | RdevKey::MetaRight
        | RdevKey::CapsLock
        | RdevKey::NumLock
        | RdevKey::ScrollLock
        | RdevKey::Function => None,
        RdevKey::Space => Some(TypedKey::Char(' ')),
        RdevKey::Tab => Some(TypedKey::Char('\t')),
        RdevKey::Return | RdevKey::KpReturn => Some(TypedKey::Char('\n')),
        _ => Some(single_char(name).map_or(TypedKey::Break, TypedKey::Char)),
    }
}

fn single_char(name: Option<&str>) -> Option<char> {
    let mut chars = name?.chars();
    let c = chars.next()?;
    if chars.next().is_some() || c.is_control() {
        return None;
    }
    Some(c)
}

fn connect_injector(key_delay: Duration) -> Result<EnigoInjector> {
    let mut attempt = 1;
    loop {
        match EnigoInjector::new(key_delay) {
            Ok(injector) => return Ok(injector),
            Err(e) if attempt < MAX_RETRIES => {
                warn!("{}, retrying ({}/{})", e, attempt, MAX_RETRIES);
                attempt += 1;
                thread::sleep(Duration::from_secs(1));
            }
            Err(e) => return Err(e),
        }
    }
}

/// Start the global keyboard hook on its own thread.
///
/// Expansions are typed by a second thread that owns the `enigo` handle,
/// so the hook callback only matches and queues.
pub fn start_keyboard_listener(
    engine: SharedEngine,
    switch: Arc<ListenerSwitch>,
    key_delay: Duration,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let queue = match spawn_injector(Arc::clone(&switch), move || {
            connect_injector(key_delay)
        }) {
            Ok((queue, _injector)) => queue,
            Err(e) => {
                error!("Could not start the injector thread: {}", e);
                return;
            }
        };

        let mut retry_count = 0;
        while retry_count < MAX_RETRIES {
            let dispatcher = KeyDispatcher::new(
                Arc::clone(&engine),
                Arc::clone(&switch),
                ReplayEncoder::<UsLayout>::default(),
                queue.clone(),
            );
            let callback = move |event: rdev::Event| {
                if let Some(key) = classify(&event.event_type, event.name.as_deref()) {
                    let outcome = dispatcher.handle(key);
                    debug!("{:?} -> {:?}", key, outcome);
                }
            };

            info!("Keyboard listener started");
            match rdev::listen(callback) {
                // listen() only returns on failure
                Ok(()) => break,
                Err(e) => {
                    retry_count += 1;
                    warn!(
                        "Keyboard listener failed: {:?}, retrying ({}/{})",
                        e, retry_count, MAX_RETRIES
                    );
                    thread::sleep(Duration::from_secs(1));
                }
            }
        }

        if retry_count >= MAX_RETRIES {
            error!(
                "Failed to start keyboard listener after {} attempts",
                MAX_RETRIES
            );
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use abbrv_core::{
        Dispatch, Entry, ExpansionEngine, KeyAction, KeyInjector, PatternStore, Settings,
        VirtualKey,
    };
    use rdev::Button;
    use std::sync::mpsc;

    fn press(key: RdevKey, name: Option<&str>) -> Option<TypedKey> {
        classify(&EventType::KeyPress(key), name)
    }

    #[test]
    fn printable_keys_use_the_reported_name() {
        assert_eq!(press(RdevKey::KeyA, Some("a")), Some(TypedKey::Char('a')));
        assert_eq!(press(RdevKey::KeyA, Some("A")), Some(TypedKey::Char('A')));
        assert_eq!(press(RdevKey::Num1, Some("!")), Some(TypedKey::Char('!')));
    }

    #[test]
    fn whitespace_keys_are_characters() {
        assert_eq!(press(RdevKey::Space, Some(" ")), Some(TypedKey::Char(' ')));
        assert_eq!(press(RdevKey::Return, Some("\r")), Some(TypedKey::Char('\n')));
        assert_eq!(press(RdevKey::Tab, None), Some(TypedKey::Char('\t')));
    }

    #[test]
    fn modifiers_are_ignored() {
        assert_eq!(press(RdevKey::ShiftLeft, None), None);
        assert_eq!(press(RdevKey::ControlLeft, None), None);
        assert_eq!(press(RdevKey::Alt, None), None);
    }

    #[test]
    fn navigation_and_clicks_break() {
        assert_eq!(press(RdevKey::LeftArrow, None), Some(TypedKey::Break));
        assert_eq!(press(RdevKey::Backspace, Some("\u{8}")), Some(TypedKey::Break));
        assert_eq!(press(RdevKey::Escape, Some("\u{1b}")), Some(TypedKey::Break));
        assert_eq!(
            classify(&EventType::ButtonPress(Button::Left), None),
            Some(TypedKey::Break)
        );
    }

    #[test]
    fn releases_are_ignored() {
        assert_eq!(classify(&EventType::KeyRelease(RdevKey::KeyA), Some("a")), None);
    }

    /// Hands each batch to the test once the gate opens.
    struct Gated {
        gate: mpsc::Receiver<()>,
        batches: mpsc::Sender<Vec<KeyAction>>,
    }

    impl KeyInjector for Gated {
        fn inject(&mut self, actions: &[KeyAction]) -> Result<()> {
            let _ = self.gate.recv();
            let _ = self.batches.send(actions.to_vec());
            Ok(())
        }
    }

    /// The hook event our own action produces.
    fn hook_event(action: KeyAction) -> (EventType, Option<String>) {
        let (key, name) = match action {
            KeyAction::Down(key) | KeyAction::Up(key) => match key {
                VirtualKey::Backspace => (RdevKey::Backspace, Some("\u{8}".to_string())),
                VirtualKey::Shift => (RdevKey::ShiftLeft, None),
                VirtualKey::Return => (RdevKey::Return, Some("\r".to_string())),
                VirtualKey::Tab => (RdevKey::Tab, Some("\t".to_string())),
                VirtualKey::Space => (RdevKey::Space, Some(" ".to_string())),
                VirtualKey::Char(c) => (RdevKey::Unknown(0), Some(c.to_string())),
            },
        };
        match action {
            KeyAction::Down(_) => (EventType::KeyPress(key), name),
            KeyAction::Up(_) => (EventType::KeyRelease(key), None),
        }
    }

    #[test]
    fn press_expands_and_the_replay_is_swallowed() {
        let switch = Arc::new(ListenerSwitch::new());
        let (open, gate) = mpsc::channel();
        let (batches, typed) = mpsc::channel();
        let (queue, _injector) =
            spawn_injector(Arc::clone(&switch), move || Ok(Gated { gate, batches })).unwrap();
        let store = PatternStore::from_entries(vec![Entry::new("ok", "OK")]);
        let dispatcher = KeyDispatcher::new(
            ExpansionEngine::new(store, &Settings::default()).shared(),
            Arc::clone(&switch),
            ReplayEncoder::<UsLayout>::default(),
            queue,
        );
        let hook = |event_type: EventType, name: Option<&str>| {
            classify(&event_type, name).map(|key| dispatcher.handle(key))
        };

        assert_eq!(
            hook(EventType::KeyPress(RdevKey::KeyO), Some("o")),
            Some(Dispatch::Advanced)
        );
        // the callback for the completing press returns before anything is typed
        assert!(matches!(
            hook(EventType::KeyPress(RdevKey::KeyK), Some("k")),
            Some(Dispatch::Expanded { .. })
        ));
        assert_eq!(hook(EventType::KeyRelease(RdevKey::KeyK), None), None);
        assert!(typed.try_recv().is_err());

        open.send(()).unwrap();
        let actions = typed.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(actions.len(), 12);
        for action in actions {
            let (event_type, name) = hook_event(action);
            let outcome = hook(event_type, name.as_deref());
            assert!(
                matches!(outcome, None | Some(Dispatch::Suppressed)),
                "{:?} reached the matcher as {:?}",
                action,
                outcome
            );
        }

        let start = std::time::Instant::now();
        while !switch.is_armed() {
            assert!(start.elapsed() < Duration::from_secs(5));
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(
            hook(EventType::KeyPress(RdevKey::KeyO), Some("o")),
            Some(Dispatch::Advanced)
        );
    }
}
