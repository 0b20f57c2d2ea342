use serde::Serialize;

use crate::display::{chars, text, Text};
use crate::program::ProgramState;

/// Operating mode selected through the synthetic menu item.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    Off,
    Program,
    Thermostat,
    ConstantOutput,
}

impl Mode {
    /// Mode code as shown and edited in the menu (0..3).
    pub fn code(self) -> i16 {
        match self {
            Mode::Off => 0,
            Mode::Program => 1,
            Mode::Thermostat => 2,
            Mode::ConstantOutput => 3,
        }
    }

    // Anything past 3 is constant output, the menu never produces it
    pub fn from_code(code: i16) -> Mode {
        match code {
            0 => Mode::Off,
            1 => Mode::Program,
            2 => Mode::Thermostat,
            _ => Mode::ConstantOutput,
        }
    }
}

/// What raised the alarm. Selects the label that alternates with the temperature.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AlarmSource {
    StrikeReached,
    MashDone,
    HopAddition(u8),
    BoilDone,
}

impl AlarmSource {
    pub fn label(self) -> Text {
        match self {
            AlarmSource::StrikeReached => text::STRIKE,
            AlarmSource::MashDone => text::MASH_DONE,
            AlarmSource::HopAddition(n) => [chars::H_LOWER, chars::D_LOWER, chars::digit(n)],
            AlarmSource::BoilDone => text::BOIL_DONE,
        }
    }
}

/// Flags and values shared by the menu, the brew program and the output stage.
/// One instance lives in the controller for the whole uptime.
#[derive(Debug, Clone)]
pub struct ControllerState {
    // ----- Mode flags
    pub off: bool,
    pub pause: bool,
    pub run_prg: bool,
    pub alarm: bool,
    pub thermostat: bool,
    pub pump: bool,
    pub menu_idle: bool,

    // ----- Process values
    pub temperature: i16,       // tenths of a degree
    pub setpoint: i16,          // tenths of a degree
    pub output: u8,             // 0..100 heat, 100..200 cool
    pub thermostat_output: u8,  // output used while below setpoint in thermostat mode
    pub countdown: u16,         // minutes
    pub prg_state: ProgramState,
    pub alarm_source: Option<AlarmSource>,
}

impl ControllerState {
    /// Power-on state: OFF set, everything else cleared.
    pub fn new() -> ControllerState {
        ControllerState {
            off: true,
            pause: false,
            run_prg: false,
            alarm: false,
            thermostat: false,
            pump: false,
            menu_idle: false,
            temperature: 0,
            setpoint: 0,
            output: 0,
            thermostat_output: 0,
            countdown: 0,
            prg_state: ProgramState::Off,
            alarm_source: None,
        }
    }

    pub fn mode(&self) -> Mode {
        if self.off {
            Mode::Off
        } else if self.run_prg {
            Mode::Program
        } else if self.thermostat {
            Mode::Thermostat
        } else {
            Mode::ConstantOutput
        }
    }

    /// Apply a mode chosen in the menu. Only the flags the mode owns are touched.
    pub fn set_mode(&mut self, mode: Mode) {
        match mode {
            Mode::Off => {
                self.off = true;
                self.run_prg = false;
                self.pump = false;
                self.thermostat = false;
            }
            Mode::Program => {
                self.off = false;
                self.run_prg = true;
            }
            Mode::Thermostat => {
                self.off = false;
                self.run_prg = false;
                self.thermostat = true;
            }
            Mode::ConstantOutput => {
                self.off = false;
                self.run_prg = false;
                self.thermostat = false;
            }
        }
    }

    pub fn raise_alarm(&mut self, source: AlarmSource) {
        self.alarm = true;
        self.alarm_source = Some(source);
    }

    pub fn acknowledge_alarm(&mut self) {
        self.alarm = false;
    }
}

impl Default for ControllerState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_off_with_everything_cleared() {
        let s = ControllerState::new();
        assert!(s.off);
        assert!(!s.pause && !s.run_prg && !s.alarm && !s.thermostat && !s.pump);
        assert_eq!(s.mode(), Mode::Off);
        assert_eq!(s.prg_state, ProgramState::Off);
    }

    #[test]
    fn mode_round_trips_through_flags() {
        let mut s = ControllerState::new();
        for mode in [Mode::Program, Mode::Thermostat, Mode::ConstantOutput, Mode::Off] {
            s.set_mode(mode);
            assert_eq!(s.mode(), mode);
            assert_eq!(Mode::from_code(mode.code()), mode);
        }
    }

    #[test]
    fn switching_to_program_keeps_thermostat_flag() {
        // The program clears THERMOSTAT itself once it starts
        let mut s = ControllerState::new();
        s.set_mode(Mode::Thermostat);
        s.set_mode(Mode::Program);
        assert!(s.thermostat);
        assert_eq!(s.mode(), Mode::Program);
    }

    #[test]
    fn hop_alarm_label_carries_number() {
        let label = AlarmSource::HopAddition(3).label();
        assert_eq!(label, [chars::H_LOWER, chars::D_LOWER, chars::digit(3)]);
        assert_eq!(AlarmSource::StrikeReached.label(), text::STRIKE);
    }

    #[test]
    fn off_clears_pump() {
        let mut s = ControllerState::new();
        s.set_mode(Mode::ConstantOutput);
        s.pump = true;
        s.set_mode(Mode::Off);
        assert!(!s.pump);
    }
}
