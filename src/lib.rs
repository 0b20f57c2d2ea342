#![cfg_attr(not(test), no_std)]

// Must come first so the logging macros are visible in every module below
mod fmt;

pub mod buttons;
pub mod config;
pub mod controller;
pub mod display;
pub mod menu;
pub mod output;
pub mod program;
pub mod sensor;
pub mod state;
pub mod telemetry;

use fugit::MicrosDurationU32;

// Menu and button polling period at the default poll rate (~8.9 Hz)
pub const MENU_TICK: MicrosDurationU32 = MicrosDurationU32::micros(112_000);

// Output control and ADC filter period (16 Hz)
pub const FAST_TICK: MicrosDurationU32 = MicrosDurationU32::micros(62_500);

// Temperature conversion, brew program and display run on every 16th fast tick
pub const FAST_TICKS_PER_SECOND: u16 = 16;

// Display multiplexing period, one digit per interrupt
pub const DISPLAY_TICK: MicrosDurationU32 = MicrosDurationU32::micros(1_000);
