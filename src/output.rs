use embedded_hal::digital::v2::OutputPin;

use crate::display::Extras;
use crate::state::ControllerState;

// Ticks per duty cycle. Output 0..100 is heating duty, 100..200 cooling duty.
pub const TOP: u8 = 100;

// Buzzer sounds for the last quarter of each cycle while the alarm is up
const ALARM_ON_FROM: u8 = 75;

/// How the pump line is driven.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PumpDrive {
    Off,        // line released, pump idle
    Manual,     // line driven, pump runs
}

/// Actuator levels for one fast tick.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OutputSignals {
    pub heat: bool,
    pub cool: bool,
    pub buzzer: bool,
    pub pause_blink: bool,
    pub pump: PumpDrive,
}

/// Time-proportioned relay drive from the 0..200 output value.
pub struct OutputController {
    counter: u8,    // 0..TOP-1, position in the current cycle
    latched: u8,    // output captured at the start of the cycle
}

impl OutputController {
    pub fn new() -> OutputController {
        OutputController {
            counter: 0,
            latched: 0,
        }
    }

    /// Advance one fast tick. A new `output` only takes effect at the start of a cycle.
    pub fn tick(&mut self, s: &ControllerState) -> OutputSignals {
        if self.counter == 0 {
            self.latched = s.output;
        }
        let counter = self.counter;
        self.counter += 1;
        if self.counter == TOP {
            self.counter = 0;
        }

        let buzzer = s.alarm && counter >= ALARM_ON_FROM;
        let pause_blink = !s.alarm && s.pause && !s.off && (counter & 1) == 1;

        if s.pause || s.off {
            return OutputSignals {
                heat: false,
                cool: false,
                buzzer,
                pause_blink,
                pump: PumpDrive::Off,
            };
        }

        // Below TOP is heating duty, above it cooling duty, TOP itself is idle
        let o = self.latched;
        OutputSignals {
            heat: o < TOP && o > counter,
            cool: o > TOP && o - TOP > counter,
            buzzer,
            pause_blink,
            pump: if s.pump { PumpDrive::Manual } else { PumpDrive::Off },
        }
    }

    pub fn get_counter(&self) -> u8 {
        self.counter
    }
}

impl Default for OutputController {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputSignals {
    /// Mirror the relays and the pause blink on the indicator group.
    pub fn show(&self, extras: &mut Extras) {
        extras.heat = self.heat;
        extras.cool = self.cool;
        extras.point = self.pause_blink;
    }
}

/// A pump line that can be released or driven.
pub trait PumpLine {
    fn release(&mut self);
    fn drive(&mut self);
}

/// Heat and cool relays, buzzer and pump.
pub struct Actuators<H: OutputPin, C: OutputPin, B: OutputPin, P: PumpLine> {
    heat: H,
    cool: C,
    buzzer: B,
    pump: P,
}

impl<H: OutputPin, C: OutputPin, B: OutputPin, P: PumpLine> Actuators<H, C, B, P> {
    pub fn new(heat: H, cool: C, buzzer: B, pump: P) -> Actuators<H, C, B, P> {
        Actuators {
            heat,
            cool,
            buzzer,
            pump,
        }
    }

    pub fn apply(&mut self, signals: &OutputSignals) {
        set_level(&mut self.heat, signals.heat);
        set_level(&mut self.cool, signals.cool);
        set_level(&mut self.buzzer, signals.buzzer);
        match signals.pump {
            PumpDrive::Off => self.pump.release(),
            PumpDrive::Manual => self.pump.drive(),
        }
    }

    /// Everything off, used before the first tick.
    pub fn all_off(&mut self) {
        self.apply(&OutputSignals {
            heat: false,
            cool: false,
            buzzer: false,
            pause_blink: false,
            pump: PumpDrive::Off,
        });
    }
}

// GPIO writes on the targets used here cannot fail
fn set_level<O: OutputPin>(pin: &mut O, high: bool) {
    let _ = if high { pin.set_high() } else { pin.set_low() };
}
