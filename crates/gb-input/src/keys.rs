//! Engine key codes and host button layout

use bitflags::bitflags;
use gb_core::DeviceFamily;

bitflags! {
    /// Game Boy key bits as the engine stores them
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct GbKeys: u32 {
        const A      = 1 << 0;
        const B      = 1 << 1;
        const SELECT = 1 << 2;
        const START  = 1 << 3;
        const RIGHT  = 1 << 4;
        const LEFT   = 1 << 5;
        const UP     = 1 << 6;
        const DOWN   = 1 << 7;
    }
}

bitflags! {
    /// Game Boy Advance key bits as the engine stores them
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct GbaKeys: u32 {
        const A      = 1 << 0;
        const B      = 1 << 1;
        const SELECT = 1 << 2;
        const START  = 1 << 3;
        const RIGHT  = 1 << 4;
        const LEFT   = 1 << 5;
        const UP     = 1 << 6;
        const DOWN   = 1 << 7;
        const R      = 1 << 8;
        const L      = 1 << 9;
    }
}

/// Logical buttons in host contract order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum HostButton {
    Up = 0,
    Down,
    Left,
    Right,
    A,
    B,
    Select,
    Start,
    /// Game Boy Advance only
    L,
    /// Game Boy Advance only
    R,
}

impl HostButton {
    pub const ALL: [HostButton; 10] = [
        Self::Up,
        Self::Down,
        Self::Left,
        Self::Right,
        Self::A,
        Self::B,
        Self::Select,
        Self::Start,
        Self::L,
        Self::R,
    ];

    /// Position in the host's button bitfield
    pub fn index(self) -> usize {
        self as usize
    }

    /// Whether the button exists for a device family
    pub fn available_on(self, family: DeviceFamily) -> bool {
        self.index() < family.button_count()
    }
}

/// Host button bitfield for one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputSnapshot {
    /// Bit `n` set when button `n` is held
    pub buttons: u32,
}

impl InputSnapshot {
    pub fn new(buttons: u32) -> Self {
        Self { buttons }
    }

    pub fn from_buttons(buttons: &[HostButton]) -> Self {
        let buttons = buttons.iter().fold(0, |acc, b| acc | 1 << b.index());
        Self { buttons }
    }

    pub fn is_pressed(&self, button: HostButton) -> bool {
        self.buttons & (1 << button.index()) != 0
    }

    pub fn set_button(&mut self, button: HostButton, pressed: bool) {
        if pressed {
            self.buttons |= 1 << button.index();
        } else {
            self.buttons &= !(1 << button.index());
        }
    }
}
