#![forbid(unsafe_code)]

//! Canonical input event types.
//!
//! The tour runner only needs a small keyboard vocabulary (arrows, space,
//! enter, escape), but hosts hand us whatever their key handling produces,
//! so the types mirror a conventional key event shape: code + modifiers +
//! press/repeat/release kind. All types derive `Clone`, `PartialEq`, and
//! `Eq` for use in tests and pattern matching.

use bitflags::bitflags;

/// A keyboard event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    /// The key code that was pressed.
    pub code: KeyCode,
    /// Modifier keys held during the event.
    pub modifiers: Modifiers,
    /// The type of key event (press, repeat, or release).
    pub kind: KeyEventKind,
}

impl KeyEvent {
    /// Create a new key event with default modifiers and Press kind.
    #[must_use]
    pub const fn new(code: KeyCode) -> Self {
        Self {
            code,
            modifiers: Modifiers::NONE,
            kind: KeyEventKind::Press,
        }
    }

    /// Create a key event with modifiers.
    #[must_use]
    pub const fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Create a key event with a specific kind.
    #[must_use]
    pub const fn with_kind(mut self, kind: KeyEventKind) -> Self {
        self.kind = kind;
        self
    }

    /// Check if this is a plain press (no modifiers, `Press` kind).
    ///
    /// Tour shortcuts only react to plain presses so they never swallow
    /// host-level chords like Ctrl+Arrow.
    #[must_use]
    pub const fn is_plain_press(&self) -> bool {
        self.modifiers.is_empty() && matches!(self.kind, KeyEventKind::Press)
    }
}

/// Key codes relevant to tour navigation, plus a `Char` escape hatch so
/// hosts can forward anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    /// A regular character key. Space arrives as `Char(' ')`.
    Char(char),
    /// Enter/Return key.
    Enter,
    /// Escape key.
    Escape,
    /// Left arrow.
    ArrowLeft,
    /// Right arrow.
    ArrowRight,
    /// Up arrow.
    ArrowUp,
    /// Down arrow.
    ArrowDown,
    /// Tab key.
    Tab,
}

/// The kind of key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyEventKind {
    /// Key was pressed.
    #[default]
    Press,
    /// Key is being held (auto-repeat).
    Repeat,
    /// Key was released.
    Release,
}

bitflags! {
    /// Modifier keys held during a key event.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Modifiers: u8 {
        /// No modifiers.
        const NONE  = 0;
        /// Shift key.
        const SHIFT = 1 << 0;
        /// Control key.
        const CTRL  = 1 << 1;
        /// Alt/Option key.
        const ALT   = 1 << 2;
        /// Super/Meta/Cmd key.
        const SUPER = 1 << 3;
    }
}
