//! Turns a completed match into the key actions that erase the typed
//! abbreviation and type the expansion.

use tracing::warn;

/// A key the injector knows how to press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VirtualKey {
    Backspace,
    Shift,
    Return,
    Tab,
    Space,
    /// A printable key, named by the character it produces unshifted.
    Char(char),
}

impl VirtualKey {
    /// Windows virtual-key code for this key on a US layout.
    pub fn code(&self) -> u16 {
        match self {
            VirtualKey::Backspace => 0x08,
            VirtualKey::Tab => 0x09,
            VirtualKey::Return => 0x0D,
            VirtualKey::Shift => 0xA0,
            VirtualKey::Space => 0x20,
            VirtualKey::Char(c) => match c {
                'a'..='z' => c.to_ascii_uppercase() as u16,
                '0'..='9' => *c as u16,
                ';' => 0xBA,
                '=' => 0xBB,
                ',' => 0xBC,
                '-' => 0xBD,
                '.' => 0xBE,
                '/' => 0xBF,
                '`' => 0xC0,
                '[' => 0xDB,
                '\\' => 0xDC,
                ']' => 0xDD,
                '\'' => 0xDE,
                _ => 0,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Down(VirtualKey),
    Up(VirtualKey),
}

/// How one character is produced on a layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyStroke {
    pub key: VirtualKey,
    pub shift: bool,
}

impl KeyStroke {
    fn plain(key: VirtualKey) -> Self {
        Self { key, shift: false }
    }

    fn shifted(key: VirtualKey) -> Self {
        Self { key, shift: true }
    }

    /// Actions needed to type this stroke once.
    pub fn action_count(&self) -> usize {
        if self.shift {
            4
        } else {
            2
        }
    }
}

pub trait KeyboardLayout {
    /// Resolve a character to a key and shift state, or `None` when the
    /// layout cannot type it.
    fn resolve(&self, ch: char) -> Option<KeyStroke>;
}

/// US QWERTY, printable ASCII plus newline and tab.
#[derive(Debug, Clone, Copy, Default)]
pub struct UsLayout;

impl KeyboardLayout for UsLayout {
    fn resolve(&self, ch: char) -> Option<KeyStroke> {
        let stroke = match ch {
            'a'..='z' | '0'..='9' => KeyStroke::plain(VirtualKey::Char(ch)),
            'A'..='Z' => KeyStroke::shifted(VirtualKey::Char(ch.to_ascii_lowercase())),
            ' ' => KeyStroke::plain(VirtualKey::Space),
            '\n' => KeyStroke::plain(VirtualKey::Return),
            '\t' => KeyStroke::plain(VirtualKey::Tab),
            '-' | '=' | '[' | ']' | '\\' | ';' | '\'' | ',' | '.' | '/' | '`' => {
                KeyStroke::plain(VirtualKey::Char(ch))
            }
            _ => KeyStroke::shifted(VirtualKey::Char(us_unshifted(ch)?)),
        };
        Some(stroke)
    }
}

fn us_unshifted(ch: char) -> Option<char> {
    let base = match ch {
        ')' => '0',
        '!' => '1',
        '@' => '2',
        '#' => '3',
        '$' => '4',
        '%' => '5',
        '^' => '6',
        '&' => '7',
        '*' => '8',
        '(' => '9',
        '_' => '-',
        '+' => '=',
        '{' => '[',
        '}' => ']',
        '|' => '\\',
        ':' => ';',
        '"' => '\'',
        '<' => ',',
        '>' => '.',
        '?' => '/',
        '~' => '`',
        _ => return None,
    };
    Some(base)
}

#[derive(Debug, Clone, Default)]
pub struct ReplayEncoder<L = UsLayout> {
    layout: L,
}

impl<L: KeyboardLayout> ReplayEncoder<L> {
    pub fn new(layout: L) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &L {
        &self.layout
    }

    /// Exact number of actions [`build`](Self::build) will emit.
    pub fn expected_len(&self, abbreviation_len: usize, expansion: &str) -> usize {
        let typed: usize = expansion
            .chars()
            .filter_map(|ch| self.layout.resolve(ch))
            .map(|stroke| stroke.action_count())
            .sum();
        2 * abbreviation_len + typed
    }

    /// One backspace press/release per abbreviation character, then each
    /// expansion character with shift held around that character only.
    /// Characters the layout cannot type are skipped.
    pub fn build(&self, abbreviation_len: usize, expansion: &str) -> Vec<KeyAction> {
        let mut actions = Vec::with_capacity(self.expected_len(abbreviation_len, expansion));

        for _ in 0..abbreviation_len {
            actions.push(KeyAction::Down(VirtualKey::Backspace));
            actions.push(KeyAction::Up(VirtualKey::Backspace));
        }

        for ch in expansion.chars() {
            let Some(stroke) = self.layout.resolve(ch) else {
                warn!("No key for {:?} on the active layout, skipping it", ch);
                continue;
            };
            if stroke.shift {
                actions.push(KeyAction::Down(VirtualKey::Shift));
            }
            actions.push(KeyAction::Down(stroke.key));
            actions.push(KeyAction::Up(stroke.key));
            if stroke.shift {
                actions.push(KeyAction::Up(VirtualKey::Shift));
            }
        }

        actions
    }
}
