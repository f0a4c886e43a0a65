//! Keyboard, pointer and screen saver settings
//!
//! The server has one core keyboard and one core pointer. Their mappings
//! and controls are plain state that clients read and replace; only the
//! modifier map and pointer map feed back into input routing.

use crate::protocol::*;

use super::{MAX_KEYCODE, MIN_KEYCODE};

/// Keysyms stored per keycode (unshifted, shifted)
pub const DEFAULT_KEYSYMS_PER_KEYCODE: u8 = 2;

/// Number of buttons on the core pointer
pub const POINTER_BUTTONS: usize = 5;

/// Reply status of SetModifierMapping / SetPointerMapping
pub mod mapping_status {
    pub const SUCCESS: u8 = 0;
    pub const BUSY: u8 = 1;
    pub const FAILED: u8 = 2;
}

/// Bits of the ChangeKeyboardControl value mask
pub mod kb {
    pub const KEY_CLICK_PERCENT: u32 = 1 << 0;
    pub const BELL_PERCENT: u32 = 1 << 1;
    pub const BELL_PITCH: u32 = 1 << 2;
    pub const BELL_DURATION: u32 = 1 << 3;
    pub const LED: u32 = 1 << 4;
    pub const LED_MODE: u32 = 1 << 5;
    pub const KEY: u32 = 1 << 6;
    pub const AUTO_REPEAT_MODE: u32 = 1 << 7;

    pub const ALL: u32 = (1 << 8) - 1;
}

const NO_SYMBOL: u32 = 0;

/// US layout on evdev keycodes: (keycode, unshifted, shifted)
const US_LAYOUT: &[(u8, u32, u32)] = &[
    (9, 0xff1b, 0xff1b),   // Escape
    (10, 0x31, 0x21),      // 1 !
    (11, 0x32, 0x40),      // 2 @
    (12, 0x33, 0x23),      // 3 #
    (13, 0x34, 0x24),      // 4 $
    (14, 0x35, 0x25),      // 5 %
    (15, 0x36, 0x5e),      // 6 ^
    (16, 0x37, 0x26),      // 7 &
    (17, 0x38, 0x2a),      // 8 *
    (18, 0x39, 0x28),      // 9 (
    (19, 0x30, 0x29),      // 0 )
    (20, 0x2d, 0x5f),      // - _
    (21, 0x3d, 0x2b),      // = +
    (22, 0xff08, 0xff08),  // BackSpace
    (23, 0xff09, 0xfe20),  // Tab, ISO_Left_Tab
    (34, 0x5b, 0x7b),      // [ {
    (35, 0x5d, 0x7d),      // ] }
    (36, 0xff0d, 0xff0d),  // Return
    (37, 0xffe3, 0xffe3),  // Control_L
    (47, 0x3b, 0x3a),      // ; :
    (48, 0x27, 0x22),      // ' "
    (49, 0x60, 0x7e),      // ` ~
    (50, 0xffe1, 0xffe1),  // Shift_L
    (51, 0x5c, 0x7c),      // \ |
    (59, 0x2c, 0x3c),      // , <
    (60, 0x2e, 0x3e),      // . >
    (61, 0x2f, 0x3f),      // / ?
    (62, 0xffe2, 0xffe2),  // Shift_R
    (63, 0xffaa, 0xffaa),  // KP_Multiply
    (64, 0xffe9, 0xffe7),  // Alt_L, Meta_L
    (65, 0x20, 0x20),      // space
    (66, 0xffe5, 0xffe5),  // Caps_Lock
    (77, 0xff7f, 0xff7f),  // Num_Lock
    (95, 0xffc8, 0xffc8),  // F11
    (96, 0xffc9, 0xffc9),  // F12
    (105, 0xffe4, 0xffe4), // Control_R
    (108, 0xffea, 0xffea), // Alt_R
    (110, 0xff50, 0xff50), // Home
    (111, 0xff52, 0xff52), // Up
    (112, 0xff55, 0xff55), // Prior
    (113, 0xff51, 0xff51), // Left
    (114, 0xff53, 0xff53), // Right
    (115, 0xff57, 0xff57), // End
    (116, 0xff54, 0xff54), // Down
    (117, 0xff56, 0xff56), // Next
    (118, 0xff63, 0xff63), // Insert
    (119, 0xffff, 0xffff), // Delete
    (133, 0xffeb, 0xffeb), // Super_L
];

/// Letter rows: first keycode and the letters on it
const LETTER_ROWS: &[(u8, &[u8])] = &[(24, b"qwertyuiop"), (38, b"asdfghjkl"), (52, b"zxcvbnm")];

/// Default modifier map: Shift, Lock, Control, Mod1, Mod2, Mod3, Mod4, Mod5
const DEFAULT_MODIFIERS: [[u8; 2]; 8] = [
    [50, 62],
    [66, 0],
    [37, 105],
    [64, 108],
    [77, 0],
    [0, 0],
    [133, 0],
    [0, 0],
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyboardControl {
    pub key_click_percent: u8,
    pub bell_percent: u8,
    pub bell_pitch: u16,
    pub bell_duration: u16,
    pub led_mask: u32,
    pub global_auto_repeat: bool,
    /// One bit per keycode
    pub auto_repeats: [u8; 32],
}

impl Default for KeyboardControl {
    fn default() -> Self {
        KeyboardControl {
            key_click_percent: 0,
            bell_percent: 50,
            bell_pitch: 400,
            bell_duration: 100,
            led_mask: 0,
            global_auto_repeat: true,
            auto_repeats: [0xff; 32],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerControl {
    pub accel_numerator: u16,
    pub accel_denominator: u16,
    pub threshold: u16,
}

impl Default for PointerControl {
    fn default() -> Self {
        PointerControl {
            accel_numerator: 2,
            accel_denominator: 1,
            threshold: 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenSaver {
    pub timeout: i16,
    pub interval: i16,
    pub prefer_blanking: u8,
    pub allow_exposures: u8,
    pub active: bool,
}

impl Default for ScreenSaver {
    fn default() -> Self {
        ScreenSaver {
            timeout: 600,
            interval: 600,
            prefer_blanking: 1,
            allow_exposures: 1,
            active: false,
        }
    }
}

/// Core keyboard and pointer state that clients can query and change
#[derive(Debug, Clone)]
pub struct DeviceState {
    pub keysyms_per_keycode: u8,
    /// `keysyms_per_keycode` entries per keycode, starting at MIN_KEYCODE
    keymap: Vec<u32>,
    pub keycodes_per_modifier: u8,
    /// 8 rows of `keycodes_per_modifier` keycodes
    modifier_map: Vec<u8>,
    /// Logical button for each physical button (0 disables it)
    pub pointer_map: Vec<u8>,
    pub keyboard: KeyboardControl,
    pub pointer: PointerControl,
    pub screen_saver: ScreenSaver,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceState {
    pub fn new() -> Self {
        let per = DEFAULT_KEYSYMS_PER_KEYCODE as usize;
        let count = (MAX_KEYCODE - MIN_KEYCODE) as usize + 1;
        let mut keymap = vec![NO_SYMBOL; count * per];
        let mut set = |keycode: u8, lower: u32, upper: u32| {
            let base = (keycode - MIN_KEYCODE) as usize * per;
            keymap[base] = lower;
            keymap[base + 1] = upper;
        };
        for &(keycode, lower, upper) in US_LAYOUT {
            set(keycode, lower, upper);
        }
        for &(first, letters) in LETTER_ROWS {
            for (i, letter) in letters.iter().enumerate() {
                let lower = *letter as u32;
                set(first + i as u8, lower, lower - 0x20);
            }
        }
        // F1..F10
        for i in 0..10u8 {
            let keysym = 0xffbe + i as u32;
            set(67 + i, keysym, keysym);
        }

        DeviceState {
            keysyms_per_keycode: DEFAULT_KEYSYMS_PER_KEYCODE,
            keymap,
            keycodes_per_modifier: 2,
            modifier_map: DEFAULT_MODIFIERS.iter().flatten().copied().collect(),
            pointer_map: (1..=POINTER_BUTTONS as u8).collect(),
            keyboard: KeyboardControl::default(),
            pointer: PointerControl::default(),
            screen_saver: ScreenSaver::default(),
        }
    }

    fn check_keycode_range(first: u8, count: usize) -> X11Result<()> {
        if first < MIN_KEYCODE || first as usize + count > MAX_KEYCODE as usize + 1 {
            return Err(X11Error::bad_value(first as u32));
        }
        Ok(())
    }

    /// GetKeyboardMapping
    pub fn keysyms(&self, first: u8, count: u8) -> X11Result<&[u32]> {
        Self::check_keycode_range(first, count as usize)?;
        let per = self.keysyms_per_keycode as usize;
        let start = (first - MIN_KEYCODE) as usize * per;
        Ok(&self.keymap[start..start + count as usize * per])
    }

    /// ChangeKeyboardMapping. A different width resizes the whole map;
    /// keycodes outside the changed range keep their leading keysyms.
    pub fn change_keyboard_mapping(
        &mut self,
        first: u8,
        per_keycode: u8,
        keysyms: &[u32],
    ) -> X11Result<()> {
        if per_keycode == 0 {
            return Err(X11Error::bad_value(0));
        }
        let count = keysyms.len() / per_keycode as usize;
        Self::check_keycode_range(first, count)?;

        if per_keycode != self.keysyms_per_keycode {
            let old = self.keysyms_per_keycode as usize;
            let new = per_keycode as usize;
            let keycodes = self.keymap.len() / old;
            let mut resized = vec![NO_SYMBOL; keycodes * new];
            for k in 0..keycodes {
                let n = old.min(new);
                resized[k * new..k * new + n].copy_from_slice(&self.keymap[k * old..k * old + n]);
            }
            self.keymap = resized;
            self.keysyms_per_keycode = per_keycode;
        }
        let start = (first - MIN_KEYCODE) as usize * per_keycode as usize;
        let len = count * per_keycode as usize;
        self.keymap[start..start + len].copy_from_slice(&keysyms[..len]);
        Ok(())
    }

    pub fn modifier_map(&self) -> &[u8] {
        &self.modifier_map
    }

    /// Modifier bit a key contributes to the state, 0 for ordinary keys
    pub fn modifier_bit(&self, keycode: u8) -> u16 {
        if keycode == 0 || self.keycodes_per_modifier == 0 {
            return 0;
        }
        let per = self.keycodes_per_modifier as usize;
        self.modifier_map
            .chunks(per)
            .enumerate()
            .filter(|(_, row)| row.contains(&keycode))
            .fold(0, |acc, (i, _)| acc | 1 << i)
    }

    /// SetModifierMapping. Fails with Busy while a key whose role changes
    /// is held down.
    pub fn set_modifier_mapping(
        &mut self,
        per_modifier: u8,
        keycodes: &[u8],
        keys_down: &[u8; 32],
    ) -> X11Result<u8> {
        if keycodes.len() != 8 * per_modifier as usize {
            return Err(X11Error::bad_length());
        }
        if let Some(bad) = keycodes
            .iter()
            .find(|k| **k != 0 && (**k < MIN_KEYCODE || **k > MAX_KEYCODE))
        {
            return Err(X11Error::bad_value(*bad as u32));
        }
        let is_down = |k: u8| keys_down[k as usize / 8] & (1 << (k % 8)) != 0;
        let changed = |k: &u8| *k != 0 && !self.modifier_map.contains(k);
        let removed = |k: &u8| *k != 0 && !keycodes.contains(k);
        if keycodes.iter().filter(|k| changed(k)).any(|k| is_down(*k))
            || self.modifier_map.iter().filter(|k| removed(k)).any(|k| is_down(*k))
        {
            return Ok(mapping_status::BUSY);
        }
        self.keycodes_per_modifier = per_modifier;
        self.modifier_map = keycodes.to_vec();
        Ok(mapping_status::SUCCESS)
    }

    /// Translate a physical button through the pointer map
    pub fn logical_button(&self, physical: u8) -> u8 {
        match physical {
            1..=5 => self.pointer_map[physical as usize - 1],
            other => other,
        }
    }

    /// SetPointerMapping. Fails with Busy while a button whose mapping
    /// changes is held down.
    pub fn set_pointer_mapping(&mut self, map: &[u8], buttons_down: u16) -> X11Result<u8> {
        if map.len() != self.pointer_map.len() {
            return Err(X11Error::bad_value(map.len() as u32));
        }
        let mut seen = [false; 256];
        for &b in map.iter().filter(|b| **b != 0) {
            if seen[b as usize] {
                return Err(X11Error::bad_value(b as u32));
            }
            seen[b as usize] = true;
        }
        let busy = map.iter().zip(&self.pointer_map).enumerate().any(|(i, (new, old))| {
            new != old && buttons_down & (modifier_mask::BUTTON1 << i) != 0
        });
        if busy {
            return Ok(mapping_status::BUSY);
        }
        self.pointer_map = map.to_vec();
        Ok(mapping_status::SUCCESS)
    }

    /// ChangeKeyboardControl
    pub fn change_keyboard_control(&mut self, mask: u32, values: &[u32]) -> X11Result<()> {
        if mask & !kb::ALL != 0 {
            return Err(X11Error::bad_value(mask));
        }
        if values.len() < mask.count_ones() as usize {
            return Err(X11Error::bad_length());
        }
        let mut values = values.iter().copied();
        let mut next = |flag: u32| if mask & flag != 0 { values.next() } else { None };
        let percent = |v: u32| -> X11Result<Option<u8>> {
            match v as i32 {
                -1 => Ok(None),
                p @ 0..=100 => Ok(Some(p as u8)),
                _ => Err(X11Error::bad_value(v)),
            }
        };

        let mut control = self.keyboard.clone();
        if let Some(v) = next(kb::KEY_CLICK_PERCENT) {
            control.key_click_percent = percent(v)?.unwrap_or(0);
        }
        if let Some(v) = next(kb::BELL_PERCENT) {
            control.bell_percent = percent(v)?.unwrap_or(50);
        }
        if let Some(v) = next(kb::BELL_PITCH) {
            control.bell_pitch = match v as i32 {
                -1 => 400,
                p if p >= 0 => p as u16,
                _ => return Err(X11Error::bad_value(v)),
            };
        }
        if let Some(v) = next(kb::BELL_DURATION) {
            control.bell_duration = match v as i32 {
                -1 => 100,
                d if d >= 0 => d as u16,
                _ => return Err(X11Error::bad_value(v)),
            };
        }
        let led = next(kb::LED);
        let led_mode = next(kb::LED_MODE);
        if led.is_some() && led_mode.is_none() {
            return Err(X11Error::bad_match());
        }
        if let Some(mode) = led_mode {
            if mode > 1 {
                return Err(X11Error::bad_value(mode));
            }
            let bits = match led {
                Some(l) if (1..=32).contains(&l) => 1u32 << (l - 1),
                Some(l) => return Err(X11Error::bad_value(l)),
                None => u32::MAX,
            };
            if mode == 1 {
                control.led_mask |= bits;
            } else {
                control.led_mask &= !bits;
            }
        }
        let key = next(kb::KEY);
        let repeat_mode = next(kb::AUTO_REPEAT_MODE);
        if key.is_some() && repeat_mode.is_none() {
            return Err(X11Error::bad_match());
        }
        if let Some(mode) = repeat_mode {
            if mode > 2 {
                return Err(X11Error::bad_value(mode));
            }
            match key {
                Some(k) if (MIN_KEYCODE as u32..=MAX_KEYCODE as u32).contains(&k) => {
                    let (byte, bit) = (k as usize / 8, 1u8 << (k % 8));
                    match mode {
                        0 => control.auto_repeats[byte] &= !bit,
                        1 => control.auto_repeats[byte] |= bit,
                        _ => control.auto_repeats[byte] |= bit,
                    }
                }
                Some(k) => return Err(X11Error::bad_value(k)),
                None => control.global_auto_repeat = mode != 0,
            }
        }
        self.keyboard = control;
        Ok(())
    }

    /// ChangePointerControl; -1 restores a default
    pub fn change_pointer_control(
        &mut self,
        accel: Option<(i16, i16)>,
        threshold: Option<i16>,
    ) -> X11Result<()> {
        let defaults = PointerControl::default();
        let mut control = self.pointer;
        if let Some((num, den)) = accel {
            control.accel_numerator = match num {
                -1 => defaults.accel_numerator,
                n if n > 0 => n as u16,
                n => return Err(X11Error::bad_value(n as u32)),
            };
            control.accel_denominator = match den {
                -1 => defaults.accel_denominator,
                d if d > 0 => d as u16,
                d => return Err(X11Error::bad_value(d as u32)),
            };
        }
        if let Some(t) = threshold {
            control.threshold = match t {
                -1 => defaults.threshold,
                t if t >= 0 => t as u16,
                t => return Err(X11Error::bad_value(t as u32)),
            };
        }
        self.pointer = control;
        Ok(())
    }

    /// SetScreenSaver; -1 restores a default
    pub fn set_screen_saver(
        &mut self,
        timeout: i16,
        interval: i16,
        prefer_blanking: u8,
        allow_exposures: u8,
    ) -> X11Result<()> {
        if timeout < -1 {
            return Err(X11Error::bad_value(timeout as u32));
        }
        if interval < -1 {
            return Err(X11Error::bad_value(interval as u32));
        }
        if prefer_blanking > 2 {
            return Err(X11Error::bad_value(prefer_blanking as u32));
        }
        if allow_exposures > 2 {
            return Err(X11Error::bad_value(allow_exposures as u32));
        }
        let defaults = ScreenSaver::default();
        let saver = &mut self.screen_saver;
        saver.timeout = if timeout == -1 { defaults.timeout } else { timeout };
        saver.interval = if interval == -1 { defaults.interval } else { interval };
        // 2 means Default
        if prefer_blanking != 2 {
            saver.prefer_blanking = prefer_blanking;
        }
        if allow_exposures != 2 {
            saver.allow_exposures = allow_exposures;
        }
        Ok(())
    }

    /// ForceScreenSaver: 0 resets, 1 activates
    pub fn force_screen_saver(&mut self, mode: u8) -> X11Result<()> {
        match mode {
            0 => self.screen_saver.active = false,
            1 => self.screen_saver.active = true,
            _ => return Err(X11Error::bad_value(mode as u32)),
        }
        log::debug!("Screen saver {}", if self.screen_saver.active { "activated" } else { "reset" });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_keymap() {
        let devices = DeviceState::new();
        // keycode 38 is 'a'
        assert_eq!(devices.keysyms(38, 1).unwrap(), &[0x61, 0x41]);
        assert_eq!(devices.keysyms(9, 1).unwrap(), &[0xff1b, 0xff1b]);
        assert_eq!(devices.keysyms(MIN_KEYCODE, 248).unwrap().len(), 496);
        assert!(devices.keysyms(7, 1).is_err());
        assert!(devices.keysyms(250, 10).is_err());
    }

    #[test]
    fn test_change_keyboard_mapping_resizes() {
        let mut devices = DeviceState::new();
        devices
            .change_keyboard_mapping(38, 3, &[0x61, 0x41, 0xe1])
            .unwrap();
        assert_eq!(devices.keysyms_per_keycode, 3);
        assert_eq!(devices.keysyms(38, 1).unwrap(), &[0x61, 0x41, 0xe1]);
        assert_eq!(devices.keysyms(39, 1).unwrap(), &[0x73, 0x53, 0]);
    }

    #[test]
    fn test_modifier_bits() {
        let devices = DeviceState::new();
        assert_eq!(devices.modifier_bit(50), modifier_mask::SHIFT);
        assert_eq!(devices.modifier_bit(105), modifier_mask::CONTROL);
        assert_eq!(devices.modifier_bit(38), 0);
        assert_eq!(devices.modifier_bit(0), 0);
    }

    #[test]
    fn test_set_modifier_mapping_busy() {
        let mut devices = DeviceState::new();
        let mut down = [0u8; 32];
        down[38 / 8] |= 1 << (38 % 8);
        let mut map = [0u8; 8];
        map[0] = 38;
        assert_eq!(
            devices.set_modifier_mapping(1, &map, &down).unwrap(),
            mapping_status::BUSY
        );
        assert_eq!(
            devices.set_modifier_mapping(1, &map, &[0; 32]).unwrap(),
            mapping_status::SUCCESS
        );
        assert_eq!(devices.modifier_bit(38), modifier_mask::SHIFT);
        assert_eq!(devices.modifier_bit(50), 0);
    }

    #[test]
    fn test_pointer_mapping() {
        let mut devices = DeviceState::new();
        assert!(devices.set_pointer_mapping(&[1, 2, 3], 0).is_err());
        assert!(devices.set_pointer_mapping(&[1, 1, 3, 4, 5], 0).is_err());
        assert_eq!(
            devices
                .set_pointer_mapping(&[3, 2, 1, 4, 5], modifier_mask::BUTTON1)
                .unwrap(),
            mapping_status::BUSY
        );
        assert_eq!(
            devices.set_pointer_mapping(&[3, 2, 1, 4, 5], 0).unwrap(),
            mapping_status::SUCCESS
        );
        assert_eq!(devices.logical_button(1), 3);
    }

    #[test]
    fn test_keyboard_control() {
        let mut devices = DeviceState::new();
        devices
            .change_keyboard_control(kb::BELL_PERCENT | kb::LED | kb::LED_MODE, &[80, 2, 1])
            .unwrap();
        assert_eq!(devices.keyboard.bell_percent, 80);
        assert_eq!(devices.keyboard.led_mask, 0b10);
        assert!(devices.change_keyboard_control(kb::LED, &[1]).is_err());
        assert!(devices.change_keyboard_control(kb::BELL_PERCENT, &[101]).is_err());
        devices
            .change_keyboard_control(kb::AUTO_REPEAT_MODE, &[0])
            .unwrap();
        assert!(!devices.keyboard.global_auto_repeat);
    }

    #[test]
    fn test_screen_saver() {
        let mut devices = DeviceState::new();
        devices.set_screen_saver(-1, 30, 0, 2).unwrap();
        assert_eq!(devices.screen_saver.timeout, 600);
        assert_eq!(devices.screen_saver.interval, 30);
        assert_eq!(devices.screen_saver.prefer_blanking, 0);
        assert!(devices.set_screen_saver(-2, 0, 0, 0).is_err());
        devices.force_screen_saver(1).unwrap();
        assert!(devices.screen_saver.active);
        assert!(devices.force_screen_saver(2).is_err());
    }
}
