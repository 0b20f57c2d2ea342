//! Button driven menu.
//!
//! From idle the user can acknowledge the alarm, toggle pause, peek at the
//! output (hold UP) or the program phase and countdown (hold DOWN), or press
//! S to browse the configuration slots. The last item, after the slots,
//! selects the operating mode.

use fugit::MicrosDurationU32;

use crate::buttons::{Button, ButtonHistory, ButtonState, RawButtons};
use crate::config::{check_value, ConfigStore, Slot, SlotStorage, MODE_ITEM};
use crate::display::{text, Frame, Text};
use crate::program::ProgramState;
use crate::state::{ControllerState, Mode};
use crate::MENU_TICK;

// Auto-exit from item browsing and value editing, in menu ticks
const ITEM_TIMEOUT: u8 = 110;
// Time between phase and countdown when peeking at the program
const STATE_TIMEOUT: u8 = 20;

// ----- Poll rate. The menu tick is MENU_TICK * poll_period / DEFAULT_POLL_PERIOD.
pub const DEFAULT_POLL_PERIOD: u8 = 250;
const POLL_PERIOD_FLOOR: u8 = 30;
const POLL_PERIOD_STEP: u8 = 8;

// Values above this scroll ten at a time
const FAST_SCROLL_ABOVE: i16 = 1000;
const FAST_SCROLL_EXTRA: i16 = 9;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MenuState {
    Idle,
    ShowOutput,
    ShowState,
    ShowCountdown,
    ShowItem,
    SetItem,
    ShowValue,
    SetValue,
}

/// Side effects of a menu tick the rest of the controller may care about.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MenuAction {
    AlarmAcknowledged,
    PauseToggled(bool),
    SlotCommitted(Slot, i16),
    ModeSelected(Mode),
}

pub struct MenuController {
    state: MenuState,
    item: u8,           // 0..=MODE_ITEM
    value: i16,         // value being edited
    countdown: u8,      // ticks until the current screen times out
    buttons: ButtonHistory,
    poll_period: u8,
}

impl MenuController {
    pub fn new() -> MenuController {
        MenuController {
            state: MenuState::Idle,
            item: 0,
            value: 0,
            countdown: 0,
            buttons: ButtonHistory::new(),
            poll_period: DEFAULT_POLL_PERIOD,
        }
    }

    pub fn get_state(&self) -> MenuState {
        self.state
    }

    pub fn get_item(&self) -> u8 {
        self.item
    }

    pub fn get_value(&self) -> i16 {
        self.value
    }

    pub fn get_poll_period(&self) -> u8 {
        self.poll_period
    }

    /// Delay until the next menu tick. Shrinks while a value is scrolled.
    pub fn menu_period(&self) -> MicrosDurationU32 {
        let per_step = MENU_TICK.to_micros() / DEFAULT_POLL_PERIOD as u32;
        MicrosDurationU32::micros(per_step * self.poll_period as u32)
    }

    /// One menu tick with a fresh button sample.
    pub fn tick<S: SlotStorage>(
        &mut self,
        raw: RawButtons,
        s: &mut ControllerState,
        config: &mut ConfigStore<S>,
        frame: &mut Frame,
    ) -> Option<MenuAction> {
        self.buttons.shift(raw);
        if self.countdown > 0 {
            self.countdown -= 1;
        }

        let b = self.buttons;
        let mut action = None;

        match self.state {
            MenuState::Idle => {
                if s.alarm && b.any_released_none_down() {
                    s.acknowledge_alarm();
                    info!("Alarm acknowledged");
                    action = Some(MenuAction::AlarmAcknowledged);
                } else if b.is(Button::Power, ButtonState::Released) {
                    s.pause = !s.pause;
                    info!("Pause {:?}", s.pause);
                    action = Some(MenuAction::PauseToggled(s.pause));
                } else if b.is(Button::Select, ButtonState::Released) {
                    self.state = MenuState::ShowItem;
                } else if b.is(Button::Up, ButtonState::Held) {
                    self.state = MenuState::ShowOutput;
                } else if b.is(Button::Down, ButtonState::Held) {
                    self.countdown = STATE_TIMEOUT;
                    self.state = MenuState::ShowState;
                }
            }
            MenuState::ShowOutput => {
                if s.off {
                    frame.show_text(text::OFF);
                } else if s.pause {
                    frame.show_text(text::PAUSED);
                } else if s.thermostat {
                    frame.show_temperature(s.setpoint);
                } else {
                    frame.show_int(s.output as i16);
                }
                if !b.is(Button::Up, ButtonState::Held) {
                    self.state = MenuState::Idle;
                }
            }
            MenuState::ShowState => {
                frame.show_text(state_text(s));
                if self.countdown == 0 {
                    self.countdown = STATE_TIMEOUT;
                    if s.prg_state.has_countdown() {
                        self.state = MenuState::ShowCountdown;
                    }
                }
                if !b.is(Button::Down, ButtonState::Held) {
                    self.state = MenuState::Idle;
                }
            }
            MenuState::ShowCountdown => {
                frame.show_int(s.countdown.min(i16::MAX as u16) as i16);
                if self.countdown == 0 {
                    self.countdown = STATE_TIMEOUT;
                    self.state = MenuState::ShowState;
                }
                if !b.is(Button::Down, ButtonState::Held) {
                    self.state = MenuState::Idle;
                }
            }
            MenuState::ShowItem => {
                frame.show_text(item_label(self.item));
                self.countdown = ITEM_TIMEOUT;
                self.state = MenuState::SetItem;
            }
            MenuState::SetItem => {
                if self.countdown == 0 || b.is(Button::Power, ButtonState::Released) {
                    self.state = MenuState::Idle;
                } else if b.is(Button::Up, ButtonState::Released) {
                    self.item += 1;
                    if self.item > MODE_ITEM {
                        self.item = 0;
                    }
                    self.state = MenuState::ShowItem;
                } else if b.is(Button::Down, ButtonState::Released) {
                    self.item = self.item.wrapping_sub(1);
                    if self.item > MODE_ITEM {
                        self.item = MODE_ITEM;
                    }
                    self.state = MenuState::ShowItem;
                } else if b.is(Button::Select, ButtonState::Released) {
                    self.value = match Slot::from_index(self.item) {
                        Some(slot) => config.read(slot),
                        None => s.mode().code(),
                    };
                    self.state = MenuState::ShowValue;
                }
            }
            MenuState::ShowValue => {
                match Slot::from_index(self.item) {
                    Some(slot) => frame.show_value(self.value, slot.kind().is_temperature()),
                    None => frame.show_text(mode_label(Mode::from_code(self.value))),
                }
                self.countdown = ITEM_TIMEOUT;
                self.state = MenuState::SetValue;
            }
            MenuState::SetValue => {
                if self.countdown == 0 {
                    self.state = MenuState::Idle;
                } else if b.is(Button::Power, ButtonState::Released) {
                    // Leave without saving
                    self.state = MenuState::ShowItem;
                } else if b.held_or_released(Button::Up) {
                    self.step(1);
                } else if b.held_or_released(Button::Down) {
                    self.step(-1);
                } else if b.is(Button::Select, ButtonState::Released) {
                    action = Some(self.commit(s, config));
                    self.state = MenuState::ShowItem;
                } else {
                    self.poll_period = DEFAULT_POLL_PERIOD;
                }
            }
        }

        s.menu_idle = self.state == MenuState::Idle;
        action
    }

    // One scroll step, speeding up the poll rate while a button stays down
    fn step(&mut self, direction: i16) {
        let mut v = self.value.saturating_add(direction);
        if v > FAST_SCROLL_ABOVE {
            v = v.saturating_add(direction * FAST_SCROLL_EXTRA);
        }
        self.value = check_value(self.item, v);
        if self.poll_period > POLL_PERIOD_FLOOR {
            self.poll_period -= POLL_PERIOD_STEP;
        }
        self.state = MenuState::ShowValue;
    }

    fn commit<S: SlotStorage>(&mut self, s: &mut ControllerState, config: &mut ConfigStore<S>) -> MenuAction {
        match Slot::from_index(self.item) {
            Some(slot) => {
                if config.write(slot, self.value) {
                    info!("Slot {:?} set to {:?}", slot, self.value);
                }
                MenuAction::SlotCommitted(slot, self.value)
            }
            None => {
                let mode = Mode::from_code(self.value);
                s.set_mode(mode);
                info!("Mode {:?}", mode);
                MenuAction::ModeSelected(mode)
            }
        }
    }
}

impl Default for MenuController {
    fn default() -> Self {
        Self::new()
    }
}

fn item_label(item: u8) -> Text {
    Slot::from_index(item).map(Slot::label).unwrap_or(text::RUN_MODE)
}

fn mode_label(mode: Mode) -> Text {
    match mode {
        Mode::Off => text::OFF,
        Mode::Program => text::PROGRAM,
        Mode::Thermostat => text::CONSTANT_TEMP,
        Mode::ConstantOutput => text::CONSTANT_OUTPUT,
    }
}

// Two letter phase code shown while DOWN is held
fn state_text(s: &ControllerState) -> Text {
    match s.mode() {
        Mode::Off => text::OFF,
        Mode::Program => match s.prg_state {
            ProgramState::Off
            | ProgramState::WaitStrike
            | ProgramState::Strike
            | ProgramState::StrikeWaitAlarm => text::STRIKE,
            ProgramState::InitMashStep | ProgramState::Mash => text::MASH,
            ProgramState::WaitBoilAlarm | ProgramState::InitBoilUp | ProgramState::Hotbreak => {
                text::HOTBREAK
            }
            ProgramState::Boil => text::BOIL,
        },
        Mode::Thermostat => text::THERMOSTAT,
        Mode::ConstantOutput => text::CONSTANT_OUTPUT,
    }
}
