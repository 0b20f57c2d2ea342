//! Owns the whole control core and runs it from the three periodic ticks.
//!
//! The firmware calls [`Controller::menu_tick`] every [`Controller::menu_period`]
//! and [`Controller::fast_tick`] every [`crate::FAST_TICK`]. Every 16th fast tick
//! also converts the temperature, advances the brew program and, while the
//! menu is idle, paints the temperature or the alarm reason.

use fugit::MicrosDurationU32;

use crate::buttons::RawButtons;
use crate::config::{ConfigStore, Slot, SlotStorage};
use crate::display::Frame;
use crate::menu::{MenuAction, MenuController};
use crate::output::{OutputController, OutputSignals};
use crate::program::{thermostat_control, ProgramController, ProgramEvents};
use crate::sensor::{self, AdcFilter};
use crate::state::ControllerState;
use crate::telemetry::StatusReport;
use crate::FAST_TICKS_PER_SECOND;

// Fast tick counter bit that flips every second, alternates alarm label and temperature
const ALARM_BLINK_BIT: u16 = FAST_TICKS_PER_SECOND;

pub struct Controller<S: SlotStorage> {
    state: ControllerState,
    config: ConfigStore<S>,
    menu: MenuController,
    program: ProgramController,
    output: OutputController,
    filter: AdcFilter,
    frame: Frame,
    events: ProgramEvents,  // from the last once-a-second tick
    fast_ticks: u16,    // wraps
}

impl<S: SlotStorage> Controller<S> {
    pub fn new(storage: S) -> Controller<S> {
        Controller {
            state: ControllerState::new(),
            config: ConfigStore::new(storage),
            menu: MenuController::new(),
            program: ProgramController::new(),
            output: OutputController::new(),
            filter: AdcFilter::new(),
            frame: Frame::new(),
            events: ProgramEvents::new(),
            fast_ticks: 0,
        }
    }

    // ----- Ticks
    pub fn menu_tick(&mut self, raw: RawButtons) -> Option<MenuAction> {
        self.menu.tick(raw, &mut self.state, &mut self.config, &mut self.frame)
    }

    /// Filter one ADC code and drive the outputs. Returns the actuator levels for this tick.
    pub fn fast_tick(&mut self, adc: u16) -> OutputSignals {
        self.fast_ticks = self.fast_ticks.wrapping_add(1);
        self.filter.push(adc);

        let signals = self.output.tick(&self.state);
        signals.show(&mut self.frame.extras);

        if self.fast_ticks % FAST_TICKS_PER_SECOND == 0 {
            self.slow_tick();
        }
        signals
    }

    fn slow_tick(&mut self) {
        let correction = self.config.read(Slot::TempCorrection);
        self.state.temperature = sensor::to_temperature(self.filter.get_value(), correction);

        self.events = self.program.tick(&mut self.state, &self.config);
        thermostat_control(&mut self.state);

        // Menu screens take priority
        if self.state.menu_idle {
            match self.state.alarm_source {
                Some(source) if self.state.alarm && self.fast_ticks & ALARM_BLINK_BIT != 0 => {
                    self.frame.show_text(source.label());
                }
                _ => self.frame.show_temperature(self.state.temperature),
            }
        }
    }

    // ----- Accessors
    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn menu_period(&self) -> MicrosDurationU32 {
        self.menu.menu_period()
    }

    /// What the brew program did on the last second tick.
    pub fn program_events(&self) -> &ProgramEvents {
        &self.events
    }

    pub fn status(&self) -> StatusReport {
        StatusReport::from_state(&self.state)
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    /// True on the fast tick that also ran the once-a-second work.
    pub fn is_second_tick(&self) -> bool {
        self.fast_ticks % FAST_TICKS_PER_SECOND == 0
    }
}
