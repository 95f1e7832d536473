//! Per-frame input events.
//!
//! Key state is indexed by USB HID usage codes so modules see a stable key
//! space regardless of the windowing backend.

use winit::VirtualKeyCode;

/// Size of the key-held bitmap.
pub const KEY_COUNT: usize = 512;

/// Snapshot of windowing events for one frame, shared by reference with
/// every system `process` call.
#[repr(C)]
pub struct Events {
    /// Milliseconds elapsed since the previous poll.
    pub delta_time: f32,
    /// Indexed by USB HID usage code; `true` while the key is held down.
    pub keys_held: [bool; KEY_COUNT],
}

impl Default for Events {
    fn default() -> Events {
        Events {
            delta_time: 0.0,
            keys_held: [false; KEY_COUNT],
        }
    }
}

/// Translates a winit key code into its USB HID usage index.
pub(crate) fn hid_usage(key: VirtualKeyCode) -> Option<usize> {
    let usage = match key {
        VirtualKeyCode::A => 0x04,
        VirtualKeyCode::B => 0x05,
        VirtualKeyCode::C => 0x06,
        VirtualKeyCode::D => 0x07,
        VirtualKeyCode::E => 0x08,
        VirtualKeyCode::F => 0x09,
        VirtualKeyCode::G => 0x0A,
        VirtualKeyCode::H => 0x0B,
        VirtualKeyCode::I => 0x0C,
        VirtualKeyCode::J => 0x0D,
        VirtualKeyCode::K => 0x0E,
        VirtualKeyCode::L => 0x0F,
        VirtualKeyCode::M => 0x10,
        VirtualKeyCode::N => 0x11,
        VirtualKeyCode::O => 0x12,
        VirtualKeyCode::P => 0x13,
        VirtualKeyCode::Q => 0x14,
        VirtualKeyCode::R => 0x15,
        VirtualKeyCode::S => 0x16,
        VirtualKeyCode::T => 0x17,
        VirtualKeyCode::U => 0x18,
        VirtualKeyCode::V => 0x19,
        VirtualKeyCode::W => 0x1A,
        VirtualKeyCode::X => 0x1B,
        VirtualKeyCode::Y => 0x1C,
        VirtualKeyCode::Z => 0x1D,
        VirtualKeyCode::Key1 => 0x1E,
        VirtualKeyCode::Key2 => 0x1F,
        VirtualKeyCode::Key3 => 0x20,
        VirtualKeyCode::Key4 => 0x21,
        VirtualKeyCode::Key5 => 0x22,
        VirtualKeyCode::Key6 => 0x23,
        VirtualKeyCode::Key7 => 0x24,
        VirtualKeyCode::Key8 => 0x25,
        VirtualKeyCode::Key9 => 0x26,
        VirtualKeyCode::Key0 => 0x27,
        VirtualKeyCode::Return => 0x28,
        VirtualKeyCode::Escape => 0x29,
        VirtualKeyCode::Back => 0x2A,
        VirtualKeyCode::Tab => 0x2B,
        VirtualKeyCode::Space => 0x2C,
        VirtualKeyCode::F1 => 0x3A,
        VirtualKeyCode::F2 => 0x3B,
        VirtualKeyCode::F3 => 0x3C,
        VirtualKeyCode::F4 => 0x3D,
        VirtualKeyCode::F5 => 0x3E,
        VirtualKeyCode::F6 => 0x3F,
        VirtualKeyCode::F7 => 0x40,
        VirtualKeyCode::F8 => 0x41,
        VirtualKeyCode::F9 => 0x42,
        VirtualKeyCode::F10 => 0x43,
        VirtualKeyCode::F11 => 0x44,
        VirtualKeyCode::F12 => 0x45,
        VirtualKeyCode::Right => 0x4F,
        VirtualKeyCode::Left => 0x50,
        VirtualKeyCode::Down => 0x51,
        VirtualKeyCode::Up => 0x52,
        VirtualKeyCode::LControl => 0xE0,
        VirtualKeyCode::LShift => 0xE1,
        VirtualKeyCode::LAlt => 0xE2,
        VirtualKeyCode::RControl => 0xE4,
        VirtualKeyCode::RShift => 0xE5,
        VirtualKeyCode::RAlt => 0xE6,
        _ => return None,
    };

    Some(usage)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letters_cover_the_hid_alphabet_block() {
        assert_eq!(hid_usage(VirtualKeyCode::A), Some(0x04));
        assert_eq!(hid_usage(VirtualKeyCode::Z), Some(0x1D));
    }

    #[test]
    fn unmapped_keys_are_dropped() {
        assert_eq!(hid_usage(VirtualKeyCode::Compose), None);
    }

    #[test]
    fn usages_stay_inside_the_bitmap() {
        // Exhaustively checking every variant is impractical; spot-check the
        // highest mapped block.
        assert!(hid_usage(VirtualKeyCode::RAlt).unwrap() < KEY_COUNT);
    }
}
