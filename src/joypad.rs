/// A physical button. Directions occupy the high nibble of the internal
/// pressed mask and actions the low nibble, matching the P1 wiring.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    Right,
    Left,
    Up,
    Down,
    A,
    B,
    Select,
    Start,
}

impl Key {
    fn mask(self) -> u8 {
        match self {
            Key::A => 0x01,
            Key::B => 0x02,
            Key::Select => 0x04,
            Key::Start => 0x08,
            Key::Right => 0x10,
            Key::Left => 0x20,
            Key::Up => 0x40,
            Key::Down => 0x80,
        }
    }
}

/// Joypad port (P1, 0xFF00). The register multiplexes two four-key groups
/// through the select bits written by software; key lines read low while
/// pressed.
pub struct Joypad {
    pressed: u8,
    select: u8,
}

impl Joypad {
    pub fn new() -> Self {
        Self {
            pressed: 0,
            select: 0x30,
        }
    }

    /// Record a key press. Returns true when the key was not already down,
    /// in which case the caller raises the joypad interrupt. Repeats while
    /// held do not produce further edges.
    pub fn press(&mut self, key: Key) -> bool {
        let fresh = self.pressed & key.mask() == 0;
        self.pressed |= key.mask();
        fresh
    }

    /// Record a key release. Releases never raise an interrupt.
    pub fn release(&mut self, key: Key) {
        self.pressed &= !key.mask();
    }

    pub fn write(&mut self, val: u8) {
        self.select = val & 0x30;
    }

    pub fn read(&self) -> u8 {
        match self.select {
            // Action group selected (select bit 5 low).
            0x10 => 0xDF ^ (self.pressed & 0x0F),
            // Direction group selected (select bit 4 low).
            0x20 => 0xEF ^ (self.pressed >> 4),
            _ => 0xCF,
        }
    }
}

impl Default for Joypad {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_edge_fires_once() {
        let mut pad = Joypad::new();
        assert!(pad.press(Key::Start));
        assert!(!pad.press(Key::Start));
        pad.release(Key::Start);
        assert!(pad.press(Key::Start));
    }

    #[test]
    fn action_group_readout() {
        let mut pad = Joypad::new();
        pad.press(Key::A);
        pad.press(Key::Start);
        pad.write(0x10);
        // Pressed lines read low: A (bit 0) and Start (bit 3).
        assert_eq!(pad.read(), 0xDF ^ 0x09);
    }

    #[test]
    fn direction_group_readout() {
        let mut pad = Joypad::new();
        pad.press(Key::Left);
        pad.write(0x20);
        assert_eq!(pad.read(), 0xEF ^ 0x02);
    }

    #[test]
    fn deselected_port_reads_idle() {
        let mut pad = Joypad::new();
        pad.press(Key::A);
        pad.write(0x30);
        assert_eq!(pad.read(), 0xCF);
    }
}
