use crate::engine::SharedEngine;
use crate::guard::ListenerSwitch;
use crate::keyboard::{InjectionJob, InjectionQueue};
use crate::replay::{KeyAction, KeyboardLayout, ReplayEncoder, UsLayout, VirtualKey};
use std::sync::Arc;
use tracing::{debug, warn};

/// A physical key press after platform resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypedKey {
    Char(char),
    /// Cursor movement and similar keys that end every partial match.
    Break,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Dropped because the listener is suspended or the key was our own.
    Suppressed,
    Advanced,
    /// The replay was queued; it is typed after `handle` returns.
    Expanded { abbreviation: String, actions: usize },
}

/// Presses in `actions` that come back through the hook as typed keys.
/// Shift is a modifier and never reaches the dispatcher.
pub fn echo_count(actions: &[KeyAction]) -> usize {
    actions
        .iter()
        .filter(|action| matches!(action, KeyAction::Down(key) if *key != VirtualKey::Shift))
        .count()
}

/// What the keyboard hook calls for every key press.
///
/// Holds its collaborators explicitly: the shared engine, the listener
/// switch, the encoder and the queue of the injector thread. `handle`
/// never types anything itself.
pub struct KeyDispatcher<L = UsLayout> {
    engine: SharedEngine,
    switch: Arc<ListenerSwitch>,
    encoder: ReplayEncoder<L>,
    queue: InjectionQueue,
}

impl<L: KeyboardLayout> KeyDispatcher<L> {
    pub fn new(
        engine: SharedEngine,
        switch: Arc<ListenerSwitch>,
        encoder: ReplayEncoder<L>,
        queue: InjectionQueue,
    ) -> Self {
        Self {
            engine,
            switch,
            encoder,
            queue,
        }
    }

    pub fn switch(&self) -> &Arc<ListenerSwitch> {
        &self.switch
    }

    pub fn handle(&self, key: TypedKey) -> Dispatch {
        if !self.switch.admit() {
            debug!("Listener suspended, dropping {:?}", key);
            return Dispatch::Suppressed;
        }

        let expansion = {
            let mut engine = self.engine.lock();
            match key {
                TypedKey::Char(c) => engine.on_char(c),
                TypedKey::Break => {
                    engine.on_break();
                    None
                }
            }
        };
        let Some(expansion) = expansion else {
            return Dispatch::Advanced;
        };

        let actions = self
            .encoder
            .build(expansion.abbreviation_len, &expansion.text);
        let count = actions.len();

        // announced before queuing so no echo can arrive first
        self.switch.expect_echo(echo_count(&actions));
        let job = InjectionJob {
            abbreviation: expansion.abbreviation.clone(),
            actions,
        };
        if let Err(e) = self.queue.submit(job) {
            warn!("Expansion of {:?} dropped: {}", expansion.abbreviation, e);
            self.switch.clear_echo();
        }

        Dispatch::Expanded {
            abbreviation: expansion.abbreviation,
            actions: count,
        }
    }
}
