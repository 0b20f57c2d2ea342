// Pico wiring: 8 segment lines (GPIO0..7, active low) shared with the four
// buttons, 4 common anodes (GPIO8..11) and a pump line that is either
// driven high or left floating. The configuration sits in the last sector
// of the 2 MB QSPI flash.

use embedded_hal::digital::v2::{InputPin, OutputPin};
use embedded_storage::nor_flash::{
    check_erase, check_read, check_write, ErrorType, NorFlash, NorFlashErrorKind, ReadNorFlash,
};
use rp_pico::hal::gpio::DynPin;
use rp_pico::hal::rom_data;

use brew_controller::buttons::{ButtonPort, RawButtons};
use brew_controller::output::PumpLine;

pub const SEGMENT_LINES: usize = 8;
pub const DIGITS: usize = 4;

// Segment lines that double as button inputs, pressed pulls the line low
const POWER_LINE: usize = 7;
const SELECT_LINE: usize = 4;
const UP_LINE: usize = 6;
const DOWN_LINE: usize = 3;
const BUTTON_LINES: [usize; 4] = [POWER_LINE, SELECT_LINE, UP_LINE, DOWN_LINE];

pub struct LedPort {
    segments: [DynPin; SEGMENT_LINES],
    digits: [DynPin; DIGITS],
    current: usize,     // digit lit right now
    levels: u8,         // what the segment lines carry
}

impl LedPort {
    pub fn new(segments: [DynPin; SEGMENT_LINES], digits: [DynPin; DIGITS]) -> LedPort {
        let mut port = LedPort {
            segments,
            digits,
            current: 0,
            levels: 0xff,
        };
        for d in port.digits.iter_mut() {
            let _ = d.set_low();
        }
        port.write_levels(0xff);
        port
    }

    /// Light the next digit with its byte from `raw`.
    pub fn refresh(&mut self, raw: &[u8; DIGITS]) {
        let _ = self.digits[self.current].set_low();
        self.current = (self.current + 1) % DIGITS;
        self.write_levels(raw[self.current]);
        let _ = self.digits[self.current].set_high();
    }

    fn write_levels(&mut self, levels: u8) {
        for (n, line) in self.segments.iter_mut().enumerate() {
            let _ = if levels & (1 << n) != 0 { line.set_high() } else { line.set_low() };
        }
        self.levels = levels;
    }

    fn is_pressed(&self, line: usize) -> bool {
        self.segments[line].is_low().unwrap_or(false)
    }
}

impl ButtonPort for LedPort {
    // Segment levels to put back
    type Saved = u8;

    fn enter_input_mode(&mut self) -> u8 {
        let _ = self.digits[self.current].set_low();
        for line in BUTTON_LINES {
            self.segments[line].into_pull_up_input();
        }
        self.levels
    }

    fn read(&mut self) -> RawButtons {
        RawButtons {
            power: self.is_pressed(POWER_LINE),
            select: self.is_pressed(SELECT_LINE),
            up: self.is_pressed(UP_LINE),
            down: self.is_pressed(DOWN_LINE),
        }
    }

    fn restore(&mut self, levels: u8) {
        for line in BUTTON_LINES {
            self.segments[line].into_push_pull_output();
        }
        self.write_levels(levels);
        let _ = self.digits[self.current].set_high();
    }
}

/// Pump output: driven high to run, floating when off.
pub struct PumpPin {
    pin: DynPin,
    driven: bool,
}

impl PumpPin {
    pub fn new(mut pin: DynPin) -> PumpPin {
        pin.into_floating_input();
        PumpPin { pin, driven: false }
    }
}

impl PumpLine for PumpPin {
    fn release(&mut self) {
        if self.driven {
            self.pin.into_floating_input();
            self.driven = false;
        }
    }

    fn drive(&mut self) {
        if !self.driven {
            self.pin.into_push_pull_output();
            let _ = self.pin.set_high();
            self.driven = true;
        }
    }
}

// ----- Flash
const XIP_BASE: u32 = 0x1000_0000;
const FLASH_SIZE: usize = 2 * 1024 * 1024;
const SECTOR_SIZE: usize = 4096;
const PAGE_SIZE: usize = 256;

// Flash offset of the configuration sector, well past the firmware image
pub const CONFIG_SECTOR: u32 = (FLASH_SIZE - SECTOR_SIZE) as u32;

// 64k block erase, used by the ROM when a range covers a whole block
const BLOCK_SIZE: u32 = 65536;
const BLOCK_ERASE_CMD: u8 = 0xd8;

// Bootrom entry points, looked up while XIP still works
#[derive(Copy, Clone)]
struct RomFlash {
    connect_internal_flash: unsafe extern "C" fn(),
    flash_exit_xip: unsafe extern "C" fn(),
    flash_range_erase: unsafe extern "C" fn(u32, usize, u32, u8),
    flash_range_program: unsafe extern "C" fn(u32, *const u8, usize),
    flash_flush_cache: unsafe extern "C" fn(),
    flash_enter_cmd_xip: unsafe extern "C" fn(),
}

/// The Pico's QSPI flash through the bootrom routines.
pub struct OnboardFlash {
    rom: RomFlash,
}

impl OnboardFlash {
    pub fn new() -> OnboardFlash {
        OnboardFlash {
            rom: RomFlash {
                connect_internal_flash: rom_data::connect_internal_flash::ptr(),
                flash_exit_xip: rom_data::flash_exit_xip::ptr(),
                flash_range_erase: rom_data::flash_range_erase::ptr(),
                flash_range_program: rom_data::flash_range_program::ptr(),
                flash_flush_cache: rom_data::flash_flush_cache::ptr(),
                flash_enter_cmd_xip: rom_data::flash_enter_cmd_xip::ptr(),
            },
        }
    }

    // Nothing may run from flash while XIP is down, so interrupts stay off
    fn run(&self, erase: bool, offset: u32, data: *const u8, len: usize) {
        let rom = self.rom;
        cortex_m::interrupt::free(|_| unsafe { flash_op(&rom, erase, offset, data, len) });
    }
}

// Lives in RAM: flash is not readable between exit_xip and enter_cmd_xip
#[inline(never)]
#[link_section = ".data.ram_func"]
unsafe fn flash_op(rom: &RomFlash, erase: bool, offset: u32, data: *const u8, len: usize) {
    (rom.connect_internal_flash)();
    (rom.flash_exit_xip)();
    if erase {
        (rom.flash_range_erase)(offset, len, BLOCK_SIZE, BLOCK_ERASE_CMD);
    } else {
        (rom.flash_range_program)(offset, data, len);
    }
    (rom.flash_flush_cache)();
    (rom.flash_enter_cmd_xip)();
}

impl ErrorType for OnboardFlash {
    type Error = NorFlashErrorKind;
}

impl ReadNorFlash for OnboardFlash {
    const READ_SIZE: usize = 1;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        check_read(self, offset, bytes.len())?;
        let src = (XIP_BASE + offset) as *const u8;
        unsafe { core::ptr::copy_nonoverlapping(src, bytes.as_mut_ptr(), bytes.len()) };
        Ok(())
    }

    fn capacity(&self) -> usize {
        FLASH_SIZE
    }
}

impl NorFlash for OnboardFlash {
    const WRITE_SIZE: usize = PAGE_SIZE;
    const ERASE_SIZE: usize = SECTOR_SIZE;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        check_erase(self, from, to)?;
        self.run(true, from, core::ptr::null(), (to - from) as usize);
        Ok(())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        check_write(self, offset, bytes.len())?;
        self.run(false, offset, bytes.as_ptr(), bytes.len());
        Ok(())
    }
}
