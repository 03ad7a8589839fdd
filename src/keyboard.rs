use fixedbitset::FixedBitSet;

const NUM_KEYS: usize = 16;

/// Key's variants are the 16 keys from the CHIP-8's hexadecimal keyboard, laid out as
///
/// ```text
/// +-+-+-+-+
/// |1|2|3|C|
/// +-+-+-+-+
/// |4|5|6|D|
/// +-+-+-+-+
/// |7|8|9|E|
/// +-+-+-+-+
/// |A|0|B|F|
/// +-+-+-+-+
/// ```
///
/// Each variant's discriminant is the value a program sees for that key.
#[derive(Debug, Eq, PartialEq, Hash, Copy, Clone)]
#[repr(u8)]
pub enum Key {
    Key0 = 0x0,
    Key1 = 0x1,
    Key2 = 0x2,
    Key3 = 0x3,
    Key4 = 0x4,
    Key5 = 0x5,
    Key6 = 0x6,
    Key7 = 0x7,
    Key8 = 0x8,
    Key9 = 0x9,
    A = 0xA,
    B = 0xB,
    C = 0xC,
    D = 0xD,
    E = 0xE,
    F = 0xF,
}

impl Key {
    /// Every key, ordered by value
    pub const ALL: [Key; NUM_KEYS] = [
        Key::Key0,
        Key::Key1,
        Key::Key2,
        Key::Key3,
        Key::Key4,
        Key::Key5,
        Key::Key6,
        Key::Key7,
        Key::Key8,
        Key::Key9,
        Key::A,
        Key::B,
        Key::C,
        Key::D,
        Key::E,
        Key::F,
    ];

    /// Only the low nibble of `value` is considered, the same way the interpreter treats a
    /// register holding a key.
    pub fn from_value(value: u8) -> Key {
        Self::ALL[(value & 0xF) as usize]
    }

    pub fn value(self) -> u8 {
        self as u8
    }
}

/// Implemented by the host to report which keys are currently held down. Mapping physical keys
/// onto the hex keypad is left to the implementor.
pub trait AsKeyboard {
    fn keys_down(&self) -> Vec<Key>;
}

/// Contains the state (up or down) of the CHIP-8's 16 keys
pub struct Keyboard {
    key_input: FixedBitSet, // one bit per key, set while the key is held
}

impl Keyboard {
    pub fn new() -> Self {
        Keyboard {
            key_input: FixedBitSet::with_capacity(NUM_KEYS),
        }
    }

    /// Handle the key down event for one of the 16 possible keys
    pub fn handle_key_down(&mut self, k: Key) {
        self.key_input.insert(k.value() as usize);
    }

    /// Handle the key up event for one of the 16 possible keys
    pub fn handle_key_up(&mut self, k: Key) {
        self.key_input.set(k.value() as usize, false);
    }

    /// Given the keys held down on the host keyboard, bring every key's state in line with it
    pub fn update_keyboard_with_keys(&mut self, keys: &[Key]) {
        self.key_input.clear();
        for k in keys {
            self.handle_key_down(*k);
        }
    }

    pub fn is_pressed(&self, k: Key) -> bool {
        self.key_input[k.value() as usize]
    }

    /// The lowest valued key currently held down, if any
    pub fn poll_any_pressed(&self) -> Option<Key> {
        self.key_input.ones().next().map(|idx| Key::ALL[idx])
    }
}

impl Default for Keyboard {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_values_round_trip() {
        for (value, k) in Key::ALL.iter().enumerate() {
            assert_eq!(k.value() as usize, value);
            assert_eq!(Key::from_value(value as u8), *k);
        }
    }

    #[test]
    fn from_value_masks_high_nibble() {
        assert_eq!(Key::from_value(0x1A), Key::A);
        assert_eq!(Key::from_value(0xFF), Key::F);
    }

    #[test]
    fn key_down_and_up() {
        let mut keyboard = Keyboard::new();
        assert!(!keyboard.is_pressed(Key::C));

        keyboard.handle_key_down(Key::C);
        assert!(keyboard.is_pressed(Key::C));
        assert!(!keyboard.is_pressed(Key::D));

        keyboard.handle_key_up(Key::C);
        assert!(!keyboard.is_pressed(Key::C));
    }

    #[test]
    fn poll_returns_lowest_key() {
        let mut keyboard = Keyboard::new();
        assert_eq!(keyboard.poll_any_pressed(), None);

        keyboard.handle_key_down(Key::E);
        keyboard.handle_key_down(Key::Key3);

        assert_eq!(keyboard.poll_any_pressed(), Some(Key::Key3));
    }

    #[test]
    fn update_releases_keys_no_longer_down() {
        let mut keyboard = Keyboard::new();
        keyboard.update_keyboard_with_keys(&[Key::Key1, Key::C]);
        assert!(keyboard.is_pressed(Key::Key1));
        assert!(keyboard.is_pressed(Key::C));

        keyboard.update_keyboard_with_keys(&[Key::C]);
        assert!(!keyboard.is_pressed(Key::Key1));
        assert!(keyboard.is_pressed(Key::C));

        keyboard.update_keyboard_with_keys(&[]);
        assert_eq!(keyboard.poll_any_pressed(), None);
    }
}
