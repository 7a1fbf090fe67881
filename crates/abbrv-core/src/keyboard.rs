use crate::error::{AbbrvError, Result};
use crate::guard::ListenerSwitch;
use crate::replay::{KeyAction, VirtualKey};
use enigo::{Direction, Enigo, Key, Keyboard, Settings};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Sink for synthetic key actions.
pub trait KeyInjector {
    fn inject(&mut self, actions: &[KeyAction]) -> Result<()>;
}

/// One expansion waiting to be typed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectionJob {
    pub abbreviation: String,
    pub actions: Vec<KeyAction>,
}

/// Sending half of the injector thread's queue.
#[derive(Debug, Clone)]
pub struct InjectionQueue {
    sender: mpsc::Sender<InjectionJob>,
}

impl InjectionQueue {
    /// Queue a job and return at once.
    pub fn submit(&self, job: InjectionJob) -> Result<()> {
        self.sender
            .send(job)
            .map_err(|_| AbbrvError::Injection("injector thread has stopped".to_string()))
    }
}

/// Start the thread that types expansions.
///
/// The injector is built on that thread by `make`, so it need not be
/// `Send`. Each job runs under a [`SuspendGuard`](crate::SuspendGuard);
/// a failed job drops the echoes the listener was told to expect. The
/// thread ends when every [`InjectionQueue`] is gone.
pub fn spawn_injector<I, F>(
    switch: Arc<ListenerSwitch>,
    make: F,
) -> Result<(InjectionQueue, JoinHandle<()>)>
where
    I: KeyInjector + 'static,
    F: FnOnce() -> Result<I> + Send + 'static,
{
    let (sender, receiver) = mpsc::channel::<InjectionJob>();
    let handle = thread::Builder::new()
        .name("abbrv-injector".into())
        .spawn(move || {
            let mut injector = match make() {
                Ok(injector) => injector,
                Err(e) => {
                    error!("Injector unavailable: {}", e);
                    drop(receiver);
                    switch.clear_echo();
                    return;
                }
            };

            for job in receiver {
                let _suspended = switch.suspend();
                match injector.inject(&job.actions) {
                    Ok(()) => info!(
                        "Expanded {:?} with {} key actions",
                        job.abbreviation,
                        job.actions.len()
                    ),
                    Err(e) => {
                        warn!("Expansion of {:?} failed: {}", job.abbreviation, e);
                        switch.clear_echo();
                    }
                }
            }
            debug!("Injector thread exiting");
        })?;

    Ok((InjectionQueue { sender }, handle))
}

/// Create a keyboard controller
pub fn create_keyboard_controller() -> Result<Enigo> {
    let settings = Settings::default();
    Enigo::new(&settings).map_err(|err| {
        AbbrvError::Injection(format!("Failed to create keyboard controller: {}", err))
    })
}

/// Injects actions through the OS with `enigo`.
pub struct EnigoInjector {
    keyboard: Enigo,
    delay: Duration,
}

impl EnigoInjector {
    pub fn new(delay: Duration) -> Result<Self> {
        Ok(Self {
            keyboard: create_keyboard_controller()?,
            delay,
        })
    }
}

impl KeyInjector for EnigoInjector {
    fn inject(&mut self, actions: &[KeyAction]) -> Result<()> {
        debug!("Injecting {} key actions", actions.len());
        for action in actions {
            let (key, direction) = match *action {
                KeyAction::Down(key) => (key, Direction::Press),
                KeyAction::Up(key) => (key, Direction::Release),
            };
            self.keyboard
                .key(to_enigo_key(key), direction)
                .map_err(|err| {
                    AbbrvError::Injection(format!("Failed to send {:?}: {}", action, err))
                })?;

            if !self.delay.is_zero() {
                thread::sleep(self.delay);
            }
        }
        Ok(())
    }
}

fn to_enigo_key(key: VirtualKey) -> Key {
    match key {
        VirtualKey::Backspace => Key::Backspace,
        VirtualKey::Shift => Key::Shift,
        VirtualKey::Return => Key::Return,
        VirtualKey::Tab => Key::Tab,
        VirtualKey::Space => Key::Space,
        VirtualKey::Char(c) => char_key(key, c),
    }
}

// Windows takes the virtual-key code so the held shift applies; elsewhere
// enigo maps the base character onto the current keymap.
#[cfg(windows)]
fn char_key(key: VirtualKey, _c: char) -> Key {
    Key::Other(key.code() as u32)
}

#[cfg(not(windows))]
fn char_key(_key: VirtualKey, c: char) -> Key {
    Key::Unicode(c)
}
