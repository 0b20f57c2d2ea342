use heapless::String;
use serde::Serialize;

use crate::program::ProgramState;
use crate::state::{ControllerState, Mode};

// Room for the longest report, all fields at their widest
pub const STATUS_JSON_LEN: usize = 160;

/// Snapshot of the controller sent out once a second.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub mode: Mode,
    pub prg: ProgramState,
    pub temp: i16,      // tenths of a degree
    pub sp: i16,        // setpoint, tenths of a degree
    pub out: u8,        // 0..200
    pub cd: u16,        // countdown, minutes
    pub alarm: bool,
    pub pause: bool,
    pub pump: bool,
}

impl StatusReport {
    pub fn from_state(s: &ControllerState) -> StatusReport {
        StatusReport {
            mode: s.mode(),
            prg: s.prg_state,
            temp: s.temperature,
            sp: s.setpoint,
            out: s.output,
            cd: s.countdown,
            alarm: s.alarm,
            pause: s.pause,
            pump: s.pump,
        }
    }

    pub fn to_json(&self) -> Result<String<STATUS_JSON_LEN>, serde_json_core::ser::Error> {
        serde_json_core::to_string(self)
    }
}
