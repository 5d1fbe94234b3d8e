//! Key events and textual key patterns.
//!
//! A `KeyEvent` is a platform-agnostic key code plus a modifier mask and a
//! press/release flag. Binding triggers and targets are written as textual
//! patterns ("Control+Return", "period", "a") and chord output is replayed
//! from a `KeySequence` string ("abc{Left}{Shift+Tab}").

use bitflags::bitflags;
use std::fmt;

bitflags! {
    /// Keyboard modifier flags, combinable when several are held at once.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u8 {
        const SHIFT   = 0b001;
        const CONTROL = 0b010;
        const ALT     = 0b100;
    }
}

/// Platform-agnostic key codes.
///
/// Hosts map their native key events to these codes. Printable keys are
/// `Char`; everything else the binding table can name is a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    /// A printable character key (lowercase unless Shift is reported).
    Char(char),
    BackSpace,
    Return,
    Escape,
    Tab,
    Delete,
    Home,
    End,
    Left,
    Right,
    Up,
    Down,
    PageUp,
    PageDown,
}

/// Named keys understood by the pattern parser, beyond bare characters.
const NAMED_KEYS: &[(&str, KeyCode)] = &[
    ("BackSpace", KeyCode::BackSpace),
    ("Return", KeyCode::Return),
    ("Escape", KeyCode::Escape),
    ("Tab", KeyCode::Tab),
    ("Delete", KeyCode::Delete),
    ("Home", KeyCode::Home),
    ("End", KeyCode::End),
    ("Left", KeyCode::Left),
    ("Right", KeyCode::Right),
    ("Up", KeyCode::Up),
    ("Down", KeyCode::Down),
    ("Page_Up", KeyCode::PageUp),
    ("Page_Down", KeyCode::PageDown),
    ("space", KeyCode::Char(' ')),
    ("exclam", KeyCode::Char('!')),
    ("quotedbl", KeyCode::Char('"')),
    ("apostrophe", KeyCode::Char('\'')),
    ("comma", KeyCode::Char(',')),
    ("minus", KeyCode::Char('-')),
    ("period", KeyCode::Char('.')),
    ("slash", KeyCode::Char('/')),
    ("semicolon", KeyCode::Char(';')),
    ("equal", KeyCode::Char('=')),
    ("bracketleft", KeyCode::Char('[')),
    ("backslash", KeyCode::Char('\\')),
    ("bracketright", KeyCode::Char(']')),
    ("grave", KeyCode::Char('`')),
];

/// A key press or release with its modifier mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyEvent {
    /// The key itself.
    pub code: KeyCode,
    /// Modifiers held while the key changed state.
    pub mods: Modifiers,
    /// True for key-up, false for key-down.
    pub release: bool,
}

impl KeyEvent {
    /// A key-down event with no modifiers.
    pub fn down(code: KeyCode) -> Self {
        Self {
            code,
            mods: Modifiers::empty(),
            release: false,
        }
    }

    /// A key-up event with no modifiers.
    pub fn up(code: KeyCode) -> Self {
        Self {
            code,
            mods: Modifiers::empty(),
            release: true,
        }
    }

    /// A key-down event with the given modifier mask.
    pub fn with_mods(code: KeyCode, mods: Modifiers) -> Self {
        Self {
            code,
            mods,
            release: false,
        }
    }

    /// Whether any of Shift/Control/Alt is held.
    pub fn is_modified(&self) -> bool {
        !self.mods.is_empty()
    }

    /// The character this event types, for unmodified printable key-downs.
    pub fn literal(&self) -> Option<char> {
        match self.code {
            KeyCode::Char(ch) if !self.release && !self.is_modified() => Some(ch),
            _ => None,
        }
    }

    /// Parse a textual key pattern such as `"Control+Shift+Return"`,
    /// `"period"` or `"a"`.
    ///
    /// Modifier prefixes are `Shift+`, `Control+` (or `Ctrl+`), `Alt+` and
    /// `Release+`; the final token is a named key or a single printable
    /// character. Returns `None` for anything else.
    pub fn parse(pattern: &str) -> Option<Self> {
        let mut mods = Modifiers::empty();
        let mut release = false;
        let mut tokens = pattern.split('+');
        let mut last = tokens.next()?;
        for token in tokens {
            match last {
                "Shift" => mods |= Modifiers::SHIFT,
                "Control" | "Ctrl" => mods |= Modifiers::CONTROL,
                "Alt" => mods |= Modifiers::ALT,
                "Release" => release = true,
                _ => return None,
            }
            last = token;
        }
        let code = Self::parse_key_name(last)?;
        Some(Self {
            code,
            mods,
            release,
        })
    }

    fn parse_key_name(name: &str) -> Option<KeyCode> {
        let mut chars = name.chars();
        if let (Some(ch), None) = (chars.next(), chars.next()) {
            return Some(KeyCode::Char(ch));
        }
        NAMED_KEYS
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, code)| *code)
    }

    fn key_name(code: KeyCode) -> String {
        if let Some((name, _)) = NAMED_KEYS.iter().find(|(_, c)| *c == code) {
            return (*name).to_string();
        }
        match code {
            KeyCode::Char(ch) => ch.to_string(),
            other => format!("{:?}", other),
        }
    }
}

impl fmt::Display for KeyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.mods.contains(Modifiers::SHIFT) {
            write!(f, "Shift+")?;
        }
        if self.mods.contains(Modifiers::CONTROL) {
            write!(f, "Control+")?;
        }
        if self.mods.contains(Modifiers::ALT) {
            write!(f, "Alt+")?;
        }
        if self.release {
            write!(f, "Release+")?;
        }
        write!(f, "{}", Self::key_name(self.code))
    }
}

/// A parsed sequence of key-down events, used to replay chord output
/// through the dispatcher.
///
/// Plain characters become unmodified character events; `{spec}` embeds a
/// named or modified key pattern; `{{` is a literal `{`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySequence {
    events: Vec<KeyEvent>,
}

impl KeySequence {
    /// Parse a replay string. Returns `None` on an unterminated brace or an
    /// unparseable embedded pattern.
    pub fn parse(repr: &str) -> Option<Self> {
        let mut events = Vec::new();
        let mut chars = repr.chars().peekable();
        while let Some(ch) = chars.next() {
            if ch != '{' {
                events.push(KeyEvent::down(KeyCode::Char(ch)));
                continue;
            }
            if chars.peek() == Some(&'{') {
                chars.next();
                events.push(KeyEvent::down(KeyCode::Char('{')));
                continue;
            }
            let mut spec = String::new();
            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(c) => spec.push(c),
                    None => return None,
                }
            }
            events.push(KeyEvent::parse(&spec)?);
        }
        Some(Self { events })
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, KeyEvent> {
        self.events.iter()
    }
}

impl<'a> IntoIterator for &'a KeySequence {
    type Item = &'a KeyEvent;
    type IntoIter = std::slice::Iter<'a, KeyEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}
