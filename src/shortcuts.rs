//! Keyboard shortcuts, independent of the windowing backend.
//!
//! `modifier` is the platform's command key, see [`ModifierStyle`].

use crate::raster::Color;
use crate::tools::{self, Tool};

/// Which physical keys count as the command modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModifierStyle {
    Ctrl,
    Cmd,
    /// Browsers cannot tell a Mac keyboard reliably; either key works.
    CtrlOrCmd,
}

impl ModifierStyle {
    pub const fn host() -> Self {
        if cfg!(target_arch = "wasm32") {
            ModifierStyle::CtrlOrCmd
        } else if cfg!(target_os = "macos") {
            ModifierStyle::Cmd
        } else {
            ModifierStyle::Ctrl
        }
    }

    pub fn is_command(self, control: bool, super_key: bool) -> bool {
        match self {
            ModifierStyle::Ctrl => control,
            ModifierStyle::Cmd => super_key,
            ModifierStyle::CtrlOrCmd => control || super_key,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyName {
    Char(char),
    Enter,
    Backspace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPress {
    pub key: KeyName,
    pub modifier: bool,
    pub shift: bool,
}

impl KeyPress {
    pub fn plain(key: KeyName) -> Self {
        Self { key, modifier: false, shift: false }
    }

    pub fn with_modifier(key: KeyName) -> Self {
        Self { key, modifier: true, shift: false }
    }

    pub fn shifted(mut self) -> Self {
        self.shift = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Undo,
    Redo,
    ExportImage,
    ExtractText,
    CopyText,
    SaveText,
    PasteImage,
    ClearAll,
    OpenImage,
    SelectTool(Tool),
    IncreaseSize,
    DecreaseSize,
    SetColor(Color),
    /// Base opacity in [0, 1].
    SetOpacity(f32),
    IncreaseOpacity,
    DecreaseOpacity,
}

pub fn command_for(press: &KeyPress) -> Option<Command> {
    let KeyPress { key, modifier, shift } = *press;
    if modifier {
        let command = match key {
            KeyName::Char(c) => match (c.to_ascii_lowercase(), shift) {
                ('z', false) => Command::Undo,
                ('z', true) | ('y', _) => Command::Redo,
                ('s', false) => Command::ExportImage,
                ('s', true) => Command::SaveText,
                ('c', true) => Command::CopyText,
                ('v', _) => Command::PasteImage,
                ('o', _) => Command::OpenImage,
                _ => return None,
            },
            KeyName::Enter => Command::ExtractText,
            KeyName::Backspace => Command::ClearAll,
        };
        return Some(command);
    }

    match key {
        KeyName::Char('[') => Some(Command::DecreaseSize),
        KeyName::Char(']') => Some(Command::IncreaseSize),
        KeyName::Char('-') => Some(Command::DecreaseOpacity),
        KeyName::Char('=' | '+') => Some(Command::IncreaseOpacity),
        KeyName::Char(c) if c.is_ascii_digit() => tools::palette_color(c).map(Command::SetColor),
        KeyName::Char(c) => Tool::from_key(c).map(Command::SelectTool),
        _ => None,
    }
}
