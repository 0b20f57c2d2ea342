//! Front panel buttons: two-sample debounce and the shared pin port.

/// The four front panel buttons.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Button {
    Power,
    Select,
    Up,
    Down,
}

impl Button {
    // Bit of the current sample in the low nibble and of the previous one in the high nibble
    fn mask(self) -> u8 {
        match self {
            Button::Power => 0x88,
            Button::Select => 0x44,
            Button::Up => 0x22,
            Button::Down => 0x11,
        }
    }
}

/// State of one button over the last two samples.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ButtonState {
    Idle,       // up in both samples
    Pressed,    // down now, up before
    Held,       // down in both samples
    Released,   // up now, down before
}

/// One raw sample, `true` = pressed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RawButtons {
    pub power: bool,
    pub select: bool,
    pub up: bool,
    pub down: bool,
}

impl RawButtons {
    fn bits(&self) -> u8 {
        (self.power as u8) << 3 | (self.select as u8) << 2 | (self.up as u8) << 1 | self.down as u8
    }
}

/// The last two samples of all buttons packed in one byte.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct ButtonHistory(u8);

impl ButtonHistory {
    pub fn new() -> ButtonHistory {
        ButtonHistory(0)
    }

    /// Shift in a new sample, the current one becomes the previous.
    pub fn shift(&mut self, raw: RawButtons) {
        self.0 = (self.0 << 4) | raw.bits();
    }

    pub fn state(&self, button: Button) -> ButtonState {
        let m = button.mask();
        let v = self.0 & m;
        if v == 0 {
            ButtonState::Idle
        } else if v == m & 0x0f {
            ButtonState::Pressed
        } else if v == m {
            ButtonState::Held
        } else {
            ButtonState::Released
        }
    }

    pub fn is(&self, button: Button, state: ButtonState) -> bool {
        self.state(button) == state
    }

    /// Down in the previous sample, whatever it does now.
    pub fn held_or_released(&self, button: Button) -> bool {
        self.0 & button.mask() & 0xf0 != 0
    }

    /// Every button is up now and at least one was down before. Any such
    /// release silences an alarm.
    pub fn any_released_none_down(&self) -> bool {
        (self.0 & 0x0f) == 0 && (self.0 & 0xf0) != 0
    }
}

/// The display lines the buttons are wired to. Reading them means taking the
/// lines away from the display for a moment.
pub trait ButtonPort {
    /// Whatever is needed to put the lines back as they were.
    type Saved;

    /// Blank the display and turn the shared lines into pulled-up inputs.
    fn enter_input_mode(&mut self) -> Self::Saved;
    fn read(&mut self) -> RawButtons;
    /// Give the lines back to the display.
    fn restore(&mut self, saved: Self::Saved);
}

/// Holds the port in input mode, restores it on drop.
pub struct InputGuard<'a, P: ButtonPort> {
    port: &'a mut P,
    saved: Option<P::Saved>,
}

impl<'a, P: ButtonPort> InputGuard<'a, P> {
    pub fn new(port: &'a mut P) -> InputGuard<'a, P> {
        let saved = port.enter_input_mode();
        InputGuard { port, saved: Some(saved) }
    }

    pub fn read(&mut self) -> RawButtons {
        self.port.read()
    }
}

impl<'a, P: ButtonPort> Drop for InputGuard<'a, P> {
    fn drop(&mut self) {
        if let Some(saved) = self.saved.take() {
            self.port.restore(saved);
        }
    }
}

/// One button sample, display lines restored afterwards.
pub fn sample_buttons<P: ButtonPort>(port: &mut P) -> RawButtons {
    let mut guard = InputGuard::new(port);
    guard.read()
}

#[cfg(test)]
mod tests {
    use super::*;

    const NONE: RawButtons = RawButtons { power: false, select: false, up: false, down: false };
    const UP: RawButtons = RawButtons { power: false, select: false, up: true, down: false };
    const SELECT: RawButtons = RawButtons { power: false, select: true, up: false, down: false };

    #[test]
    fn press_hold_release_sequence() {
        let mut h = ButtonHistory::new();
        assert_eq!(h.state(Button::Up), ButtonState::Idle);
        h.shift(UP);
        assert_eq!(h.state(Button::Up), ButtonState::Pressed);
        h.shift(UP);
        assert_eq!(h.state(Button::Up), ButtonState::Held);
        assert!(h.held_or_released(Button::Up));
        h.shift(NONE);
        assert_eq!(h.state(Button::Up), ButtonState::Released);
        assert!(h.held_or_released(Button::Up));
        h.shift(NONE);
        assert_eq!(h.state(Button::Up), ButtonState::Idle);
    }

    #[test]
    fn one_sample_glitch_never_counts_as_held() {
        let mut h = ButtonHistory::new();
        h.shift(SELECT);
        h.shift(NONE);
        assert_eq!(h.state(Button::Select), ButtonState::Released);
        h.shift(NONE);
        assert_eq!(h.state(Button::Select), ButtonState::Idle);
    }

    #[test]
    fn buttons_are_independent() {
        let mut h = ButtonHistory::new();
        h.shift(UP);
        h.shift(RawButtons { up: true, down: true, ..NONE });
        assert_eq!(h.state(Button::Up), ButtonState::Held);
        assert_eq!(h.state(Button::Down), ButtonState::Pressed);
        assert_eq!(h.state(Button::Power), ButtonState::Idle);
        assert_eq!(h.0, 0x23);
    }

    #[test]
    fn release_acknowledges_only_when_all_up() {
        let mut h = ButtonHistory::new();
        h.shift(RawButtons { up: true, down: true, ..NONE });
        h.shift(UP);
        assert!(!h.any_released_none_down());
        h.shift(NONE);
        assert!(h.any_released_none_down());
        h.shift(NONE);
        assert!(!h.any_released_none_down());
        assert_eq!(h.0, 0);
    }

    #[derive(Default)]
    struct FakePort {
        input: bool,
        enters: u32,
        restores: u32,
        raw: RawButtons,
    }

    impl ButtonPort for FakePort {
        type Saved = u8;

        fn enter_input_mode(&mut self) -> u8 {
            self.input = true;
            self.enters += 1;
            0x5a
        }
        fn read(&mut self) -> RawButtons {
            assert!(self.input, "read while driving the display");
            self.raw
        }
        fn restore(&mut self, saved: u8) {
            assert_eq!(saved, 0x5a);
            self.input = false;
            self.restores += 1;
        }
    }

    #[test]
    fn sampling_restores_the_display_lines() {
        let mut port = FakePort { raw: UP, ..FakePort::default() };
        assert_eq!(sample_buttons(&mut port), UP);
        assert!(!port.input);
        assert_eq!((port.enters, port.restores), (1, 1));
    }
}
