use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// How long injected keys may trail the end of an injection.
pub const ECHO_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Armed,
    Suspended,
}

/// Synthetic key presses still expected back from the hook.
#[derive(Debug, Default)]
struct EchoBudget {
    remaining: usize,
    /// `None` while injection is queued or running.
    expires: Option<Instant>,
}

impl EchoBudget {
    fn clear(&mut self) {
        self.remaining = 0;
        self.expires = None;
    }

    fn expired(&self, now: Instant) -> bool {
        self.expires.is_some_and(|at| now >= at)
    }
}

/// Gate between the keyboard hook and the matcher.
///
/// The hook reports our own synthetic keys after they are sent, which can
/// be well after the injector is done. Before queuing an injection the
/// dispatcher announces how many presses it will produce with
/// [`expect_echo`](Self::expect_echo); the listener swallows that many
/// and stays suspended until they are back, or until [`ECHO_GRACE`] has
/// passed since the last [`SuspendGuard`] was dropped. Keys are also
/// discarded while the entry editor has focus.
#[derive(Debug)]
pub struct ListenerSwitch {
    holds: AtomicUsize,
    editor_focus: AtomicBool,
    echo: Mutex<EchoBudget>,
    grace: Duration,
}

impl Default for ListenerSwitch {
    fn default() -> Self {
        Self::with_echo_grace(ECHO_GRACE)
    }
}

impl ListenerSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_echo_grace(grace: Duration) -> Self {
        Self {
            holds: AtomicUsize::new(0),
            editor_focus: AtomicBool::new(false),
            echo: Mutex::new(EchoBudget::default()),
            grace,
        }
    }

    pub fn state(&self) -> ListenerState {
        if self.holds.load(Ordering::SeqCst) == 0
            && !self.editor_has_focus()
            && self.pending_echo() == 0
        {
            ListenerState::Armed
        } else {
            ListenerState::Suspended
        }
    }

    pub fn is_armed(&self) -> bool {
        self.state() == ListenerState::Armed
    }

    pub fn set_editor_focus(&self, focused: bool) {
        if self.editor_focus.swap(focused, Ordering::SeqCst) != focused {
            debug!("Editor focus: {}", focused);
        }
    }

    pub fn editor_has_focus(&self) -> bool {
        self.editor_focus.load(Ordering::SeqCst)
    }

    /// Suspend until the returned guard is dropped. Guards nest.
    pub fn suspend(&self) -> SuspendGuard<'_> {
        if self.holds.fetch_add(1, Ordering::SeqCst) == 0 {
            // the grace period restarts when the last guard goes
            self.echo.lock().expires = None;
        }
        debug!("Keyboard listener suspended");
        SuspendGuard { switch: self }
    }

    /// Announce `presses` synthetic key presses that the hook will report.
    pub fn expect_echo(&self, presses: usize) {
        if presses == 0 {
            return;
        }
        let mut echo = self.echo.lock();
        echo.remaining += presses;
        echo.expires = None;
    }

    /// Presses still expected back, not counting an expired budget.
    pub fn pending_echo(&self) -> usize {
        let echo = self.echo.lock();
        if echo.expired(Instant::now()) {
            0
        } else {
            echo.remaining
        }
    }

    /// Consume one expected press. False when none is outstanding.
    pub fn take_echo(&self) -> bool {
        let mut echo = self.echo.lock();
        if echo.remaining == 0 {
            return false;
        }
        if echo.expired(Instant::now()) {
            warn!("{} injected key presses never reached the hook", echo.remaining);
            echo.clear();
            return false;
        }
        echo.remaining -= 1;
        if echo.remaining == 0 {
            echo.expires = None;
            debug!("Injected keys drained");
        }
        true
    }

    pub fn clear_echo(&self) {
        self.echo.lock().clear();
    }

    /// Decide whether a key from the hook reaches the matcher. Our own
    /// echoes are consumed here.
    pub fn admit(&self) -> bool {
        if self.take_echo() {
            return false;
        }
        self.holds.load(Ordering::SeqCst) == 0 && !self.editor_has_focus()
    }
}

/// Re-arms the listener on drop, including during unwinding.
///
/// Expected echoes keep it suspended past the drop, for at most the grace
/// period.
#[must_use = "the listener re-arms as soon as the guard is dropped"]
#[derive(Debug)]
pub struct SuspendGuard<'a> {
    switch: &'a ListenerSwitch,
}

impl Drop for SuspendGuard<'_> {
    fn drop(&mut self) {
        if self.switch.holds.fetch_sub(1, Ordering::SeqCst) != 1 {
            return;
        }
        let mut echo = self.switch.echo.lock();
        if echo.remaining > 0 {
            echo.expires = Some(Instant::now() + self.switch.grace);
            debug!("Waiting for {} injected key presses", echo.remaining);
        } else {
            debug!("Keyboard listener re-armed");
        }
    }
}
