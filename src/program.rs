//! Automatic brew program: strike, up to four mash steps, hotbreak and boil.
//!
//! Runs once a second. Every setpoint, output and duration is read from the
//! configuration store when it is used, so edits made during a brew apply at
//! once. A phase that does not reach its temperature before the countdown
//! runs out switches the controller off.

use heapless::Vec;
use serde::Serialize;

use crate::config::{ConfigStore, Slot, SlotStorage};
use crate::state::{AlarmSource, ControllerState};

// Ticks per countdown minute
const SECONDS_PER_MINUTE: u8 = 60;

// Hop alarms only fire during the first seconds of the matching minute
const HOP_ALARM_SECONDS: u8 = 3;

const MASH_STEPS: u8 = 4;
const HOP_TIMERS: u8 = 4;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ProgramState {
    Off = 0,
    WaitStrike,
    Strike,
    StrikeWaitAlarm,
    InitMashStep,
    Mash,
    WaitBoilAlarm,
    InitBoilUp,
    Hotbreak,
    Boil,
}

impl ProgramState {
    /// States where the remaining countdown is worth showing.
    pub fn has_countdown(self) -> bool {
        matches!(
            self,
            ProgramState::WaitStrike | ProgramState::Mash | ProgramState::Hotbreak | ProgramState::Boil
        )
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProgramEvent {
    Entered(ProgramState),
    Alarm(AlarmSource),
    Aborted(ProgramState),  // countdown ran out before the phase completed
    Finished,
}

pub type ProgramEvents = Vec<ProgramEvent, 4>;

pub struct ProgramController {
    mash_step: u8,
    sec_countdown: u8,  // seconds left of the current countdown minute
}

impl ProgramController {
    pub fn new() -> ProgramController {
        ProgramController {
            mash_step: 0,
            sec_countdown: SECONDS_PER_MINUTE,
        }
    }

    pub fn get_mash_step(&self) -> u8 {
        self.mash_step
    }

    pub fn get_seconds(&self) -> u8 {
        self.sec_countdown
    }

    /// One second of the brew program.
    pub fn tick<S: SlotStorage>(&mut self, s: &mut ControllerState, config: &ConfigStore<S>) -> ProgramEvents {
        let mut events = ProgramEvents::new();

        if s.off {
            if s.prg_state != ProgramState::Off {
                self.goto(s, ProgramState::Off, &mut events);
            }
            return events;
        }

        // Pause freezes the program and its clock
        if s.pause {
            return events;
        }

        if s.countdown > 0 {
            self.sec_countdown -= 1;
            if self.sec_countdown == 0 {
                self.sec_countdown = SECONDS_PER_MINUTE;
                s.countdown -= 1;
            }
        }

        match s.prg_state {
            ProgramState::Off => {
                if s.run_prg {
                    self.load_countdown(s, config, Slot::StrikeDelay);
                    self.goto(s, ProgramState::WaitStrike, &mut events);
                } else {
                    // Plain thermostat or constant output
                    if s.thermostat {
                        s.setpoint = config.read(Slot::ConstantSetpoint);
                        s.thermostat_output = config.read_percentage(Slot::ConstantOutput);
                    } else {
                        s.output = config.read_percentage(Slot::ConstantOutput);
                    }
                    s.pump = config.read_flag(Slot::ConstantPump);
                }
            }
            ProgramState::WaitStrike => {
                s.output = 0;
                s.thermostat = false;
                s.pump = false;
                if s.countdown == 0 {
                    self.load_countdown(s, config, Slot::AlarmTimeout);
                    self.goto(s, ProgramState::Strike, &mut events);
                }
            }
            ProgramState::Strike => {
                s.setpoint = config.read(Slot::StrikeTemp);
                s.output = config.read_percentage(Slot::StrikeOutput);
                s.pump = true;
                if s.temperature >= s.setpoint {
                    // Hold strike temperature while waiting for the user
                    s.thermostat = true;
                    s.thermostat_output = config.read_percentage(Slot::MashOutput);
                    self.alarm(s, AlarmSource::StrikeReached, &mut events);
                    self.load_countdown(s, config, Slot::AlarmTimeout);
                    self.goto(s, ProgramState::StrikeWaitAlarm, &mut events);
                } else if s.countdown == 0 {
                    self.abort(s, &mut events);
                }
            }
            ProgramState::StrikeWaitAlarm => {
                if !s.alarm {
                    // Hold until the grain is in and the user resumes
                    s.pause = true;
                    self.mash_step = 0;
                    self.load_countdown(s, config, Slot::AlarmTimeout);
                    self.goto(s, ProgramState::InitMashStep, &mut events);
                } else if s.countdown == 0 {
                    self.abort(s, &mut events);
                }
            }
            ProgramState::InitMashStep => {
                s.setpoint = config.read(Slot::mash_temp(self.mash_step));
                s.output = config.read_percentage(Slot::StrikeOutput);
                s.thermostat = false;
                s.pump = true;
                if s.temperature >= s.setpoint {
                    s.thermostat = true;
                    s.thermostat_output = config.read_percentage(Slot::MashOutput);
                    self.load_countdown(s, config, Slot::mash_duration(self.mash_step));
                    self.goto(s, ProgramState::Mash, &mut events);
                } else if s.countdown == 0 {
                    self.abort(s, &mut events);
                }
            }
            ProgramState::Mash => {
                if s.countdown == 0 {
                    self.mash_step += 1;
                    if self.mash_step < MASH_STEPS {
                        self.load_countdown(s, config, Slot::AlarmTimeout);
                        self.goto(s, ProgramState::InitMashStep, &mut events);
                    } else {
                        self.alarm(s, AlarmSource::MashDone, &mut events);
                        self.load_countdown(s, config, Slot::AlarmTimeout);
                        self.goto(s, ProgramState::WaitBoilAlarm, &mut events);
                    }
                }
            }
            ProgramState::WaitBoilAlarm => {
                if !s.alarm {
                    s.pause = true;
                    self.load_countdown(s, config, Slot::AlarmTimeout);
                    self.goto(s, ProgramState::InitBoilUp, &mut events);
                } else if s.countdown == 0 {
                    self.abort(s, &mut events);
                }
            }
            ProgramState::InitBoilUp => {
                s.thermostat = false;
                s.pump = false;
                s.output = config.read_percentage(Slot::StrikeOutput);
                if s.temperature >= config.read(Slot::HotbreakTemp) {
                    self.load_countdown(s, config, Slot::HotbreakDuration);
                    self.goto(s, ProgramState::Hotbreak, &mut events);
                } else if s.countdown == 0 {
                    self.abort(s, &mut events);
                }
            }
            ProgramState::Hotbreak => {
                s.output = config.read_percentage(Slot::HotbreakOutput);
                if s.countdown == 0 {
                    self.load_countdown(s, config, Slot::BoilDuration);
                    self.goto(s, ProgramState::Boil, &mut events);
                }
            }
            ProgramState::Boil => {
                s.output = config.read_percentage(Slot::BoilOutput);
                if self.sec_countdown > SECONDS_PER_MINUTE - HOP_ALARM_SECONDS {
                    for n in 0..HOP_TIMERS {
                        if s.countdown as i32 == config.read(Slot::hop_timer(n)) as i32 {
                            self.alarm(s, AlarmSource::HopAddition(n + 1), &mut events);
                            break;
                        }
                    }
                }
                if s.countdown == 0 {
                    s.output = 0;
                    s.thermostat = false;
                    s.off = true;
                    s.run_prg = false;
                    self.alarm(s, AlarmSource::BoilDone, &mut events);
                    self.goto(s, ProgramState::Off, &mut events);
                    info!("Brew program finished");
                    let _ = events.push(ProgramEvent::Finished);
                }
            }
        }

        events
    }

    // Every countdown load restarts the minute
    fn load_countdown<S: SlotStorage>(&mut self, s: &mut ControllerState, config: &ConfigStore<S>, slot: Slot) {
        s.countdown = config.read_minutes(slot);
        self.sec_countdown = SECONDS_PER_MINUTE;
    }

    fn goto(&mut self, s: &mut ControllerState, next: ProgramState, events: &mut ProgramEvents) {
        debug!("Program {:?} -> {:?}, countdown {:?}", s.prg_state, next, s.countdown);
        s.prg_state = next;
        let _ = events.push(ProgramEvent::Entered(next));
    }

    // Only report a new alarm, not the same one held over several ticks
    fn alarm(&mut self, s: &mut ControllerState, source: AlarmSource, events: &mut ProgramEvents) {
        let already = s.alarm && s.alarm_source == Some(source);
        s.raise_alarm(source);
        if !already {
            info!("Alarm {:?}", source);
            let _ = events.push(ProgramEvent::Alarm(source));
        }
    }

    fn abort(&mut self, s: &mut ControllerState, events: &mut ProgramEvents) {
        warn!("Program timed out in {:?}, switching off", s.prg_state);
        s.off = true;
        let _ = events.push(ProgramEvent::Aborted(s.prg_state));
    }
}

impl Default for ProgramController {
    fn default() -> Self {
        Self::new()
    }
}

/// Thermostat comparator, run after the program each second.
pub fn thermostat_control(s: &mut ControllerState) {
    if s.thermostat {
        s.output = if s.temperature < s.setpoint { s.thermostat_output } else { 0 };
    }
}
