//! Persisted configuration: 26 named 16-bit slots.
//!
//! Slot `n` lives at word address `n` of a [`SlotStorage`]. The last word holds
//! the layout version; a mismatch at start-up resets every slot to its default.

use embedded_storage::nor_flash::NorFlash;

use crate::display::chars::*;
use crate::display::Text;

// Bumped whenever the slot layout changes
pub const CONFIG_VERSION: u16 = 10;

// Word capacity of the backing storage (256 bytes of EEPROM)
pub const STORAGE_WORDS: usize = 128;
const VERSION_ADDRESS: u8 = (STORAGE_WORDS - 1) as u8;

// ----- Limits, tenths of a degree
#[cfg(not(feature = "fahrenheit"))]
mod limits {
    pub const MIN_TEMP: i16 = -400;
    pub const MAX_TEMP: i16 = 1400;
    pub const MIN_TEMP_DIFF: i16 = -50;
    pub const MAX_TEMP_DIFF: i16 = 50;
    pub const DEFAULT_STRIKE_TEMP: i16 = 345;
    pub const DEFAULT_MASH_TEMP: i16 = 345;
}

#[cfg(feature = "fahrenheit")]
mod limits {
    pub const MIN_TEMP: i16 = -400;
    pub const MAX_TEMP: i16 = 2500;
    pub const MIN_TEMP_DIFF: i16 = -100;
    pub const MAX_TEMP_DIFF: i16 = 100;
    pub const DEFAULT_STRIKE_TEMP: i16 = 690;
    pub const DEFAULT_MASH_TEMP: i16 = 670;
}

pub use limits::*;

pub const MAX_DURATION: i16 = 999;
pub const MAX_PERCENTAGE: i16 = 200;

/// How a slot value is interpreted, displayed and bounded.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SlotKind {
    Temperature,
    TempDelta,
    Duration,
    Percentage,
    Boolean,
}

impl SlotKind {
    /// Inclusive (min, max) for values of this kind.
    pub fn bounds(self) -> (i16, i16) {
        match self {
            SlotKind::Temperature => (MIN_TEMP, MAX_TEMP),
            SlotKind::TempDelta => (MIN_TEMP_DIFF, MAX_TEMP_DIFF),
            SlotKind::Duration => (0, MAX_DURATION),
            SlotKind::Percentage => (0, MAX_PERCENTAGE),
            SlotKind::Boolean => (0, 1),
        }
    }

    /// Shown with a decimal point and degree indicator.
    pub fn is_temperature(self) -> bool {
        matches!(self, SlotKind::Temperature | SlotKind::TempDelta)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Slot {
    StrikeDelay = 0,        // Sd
    StrikeTemp,             // St
    StrikeOutput,           // SO
    MashTemp1,              // Pt1
    MashDuration1,          // Pd1
    MashTemp2,              // Pt2
    MashDuration2,          // Pd2
    MashTemp3,              // Pt3
    MashDuration3,          // Pd3
    MashTemp4,              // Pt4
    MashDuration4,          // Pd4
    MashOutput,             // PO
    HotbreakTemp,           // Ht
    HotbreakOutput,         // HO
    HotbreakDuration,       // Hd
    BoilOutput,             // bO
    BoilDuration,           // bd
    HopTimer1,              // hd1
    HopTimer2,              // hd2
    HopTimer3,              // hd3
    HopTimer4,              // hd4
    TempCorrection,         // tc
    ConstantOutput,         // cO
    ConstantPump,           // cP
    ConstantSetpoint,       // cSP
    AlarmTimeout,           // ASd
}

/// Number of real slots. Menu item `SLOT_COUNT` is the synthetic mode item.
pub const SLOT_COUNT: u8 = 26;
pub const MODE_ITEM: u8 = SLOT_COUNT;

impl Slot {
    pub const ALL: [Slot; SLOT_COUNT as usize] = [
        Slot::StrikeDelay,
        Slot::StrikeTemp,
        Slot::StrikeOutput,
        Slot::MashTemp1,
        Slot::MashDuration1,
        Slot::MashTemp2,
        Slot::MashDuration2,
        Slot::MashTemp3,
        Slot::MashDuration3,
        Slot::MashTemp4,
        Slot::MashDuration4,
        Slot::MashOutput,
        Slot::HotbreakTemp,
        Slot::HotbreakOutput,
        Slot::HotbreakDuration,
        Slot::BoilOutput,
        Slot::BoilDuration,
        Slot::HopTimer1,
        Slot::HopTimer2,
        Slot::HopTimer3,
        Slot::HopTimer4,
        Slot::TempCorrection,
        Slot::ConstantOutput,
        Slot::ConstantPump,
        Slot::ConstantSetpoint,
        Slot::AlarmTimeout,
    ];

    pub fn from_index(index: u8) -> Option<Slot> {
        Slot::ALL.get(index as usize).copied()
    }

    pub fn index(self) -> u8 {
        self as u8
    }

    /// Temperature slot of mash step 0..3.
    pub fn mash_temp(step: u8) -> Slot {
        [Slot::MashTemp1, Slot::MashTemp2, Slot::MashTemp3, Slot::MashTemp4][(step & 3) as usize]
    }

    /// Duration slot of mash step 0..3.
    pub fn mash_duration(step: u8) -> Slot {
        [Slot::MashDuration1, Slot::MashDuration2, Slot::MashDuration3, Slot::MashDuration4]
            [(step & 3) as usize]
    }

    pub fn hop_timer(n: u8) -> Slot {
        [Slot::HopTimer1, Slot::HopTimer2, Slot::HopTimer3, Slot::HopTimer4][(n & 3) as usize]
    }

    pub fn kind(self) -> SlotKind {
        use Slot::*;
        match self {
            StrikeTemp | MashTemp1 | MashTemp2 | MashTemp3 | MashTemp4 | HotbreakTemp
            | ConstantSetpoint => SlotKind::Temperature,
            TempCorrection => SlotKind::TempDelta,
            StrikeOutput | MashOutput | HotbreakOutput | BoilOutput | ConstantOutput => {
                SlotKind::Percentage
            }
            ConstantPump => SlotKind::Boolean,
            StrikeDelay | MashDuration1 | MashDuration2 | MashDuration3 | MashDuration4
            | HotbreakDuration | BoilDuration | HopTimer1 | HopTimer2 | HopTimer3 | HopTimer4
            | AlarmTimeout => SlotKind::Duration,
        }
    }

    pub fn default_value(self) -> i16 {
        use Slot::*;
        match self {
            StrikeDelay => 0,
            StrikeTemp => DEFAULT_STRIKE_TEMP,
            StrikeOutput => 200,
            MashTemp1 | MashTemp2 | MashTemp3 | MashTemp4 => DEFAULT_MASH_TEMP,
            MashDuration1 => 15,
            MashDuration2 => 30,
            MashDuration3 => 15,
            MashDuration4 => 0,
            MashOutput => 50,
            HotbreakTemp => 985,
            HotbreakOutput => 0,
            HotbreakDuration => 0,
            BoilOutput => 0,
            BoilDuration => 0,
            HopTimer1 => 60,
            HopTimer2 => 45,
            HopTimer3 => 15,
            HopTimer4 => 5,
            TempCorrection => 0,
            ConstantOutput => 80,
            ConstantPump => 0,
            ConstantSetpoint => 0,
            AlarmTimeout => 90,
        }
    }

    /// Three character menu label.
    pub fn label(self) -> Text {
        use Slot::*;
        let d = digit;
        match self {
            StrikeDelay => [S, D_LOWER, BLANK],
            StrikeTemp => [S, T_LOWER, BLANK],
            StrikeOutput => [S, O, BLANK],
            MashTemp1 => [P, T_LOWER, d(1)],
            MashDuration1 => [P, D_LOWER, d(1)],
            MashTemp2 => [P, T_LOWER, d(2)],
            MashDuration2 => [P, D_LOWER, d(2)],
            MashTemp3 => [P, T_LOWER, d(3)],
            MashDuration3 => [P, D_LOWER, d(3)],
            MashTemp4 => [P, T_LOWER, d(4)],
            MashDuration4 => [P, D_LOWER, d(4)],
            MashOutput => [P, O, BLANK],
            HotbreakTemp => [H, T_LOWER, BLANK],
            HotbreakOutput => [H, O, BLANK],
            HotbreakDuration => [H, D_LOWER, BLANK],
            BoilOutput => [B_LOWER, O, BLANK],
            BoilDuration => [B_LOWER, D_LOWER, BLANK],
            HopTimer1 => [H_LOWER, D_LOWER, d(1)],
            HopTimer2 => [H_LOWER, D_LOWER, d(2)],
            HopTimer3 => [H_LOWER, D_LOWER, d(3)],
            HopTimer4 => [H_LOWER, D_LOWER, d(4)],
            TempCorrection => [T_LOWER, C_LOWER, BLANK],
            ConstantOutput => [C_LOWER, O, BLANK],
            ConstantPump => [C_LOWER, P, BLANK],
            ConstantSetpoint => [C_LOWER, S, P],
            AlarmTimeout => [A, S, D_LOWER],
        }
    }
}

// Values past one end come back in at the other, so scrolling wraps around
fn range(x: i16, min: i16, max: i16) -> i16 {
    if x > max {
        return min;
    }
    if x < min {
        return max;
    }
    x
}

/// Bring a menu value inside the bounds of item `item`. Items past the last
/// slot (the mode item) take 0..3.
pub fn check_value(item: u8, value: i16) -> i16 {
    match Slot::from_index(item) {
        Some(slot) => {
            let (min, max) = slot.kind().bounds();
            range(value, min, max)
        }
        None => range(value, 0, 3),
    }
}

/// Word storage behind the configuration, one 16-bit word per address.
pub trait SlotStorage {
    fn read_word(&self, address: u8) -> u16;
    fn write_word(&mut self, address: u8, word: u16);
}

/// Storage held in RAM. Starts erased (all ones) and counts physical writes.
pub struct RamStorage {
    words: [u16; STORAGE_WORDS],
    writes: u32,
}

impl RamStorage {
    pub fn new() -> RamStorage {
        RamStorage {
            words: [0xffff; STORAGE_WORDS],
            writes: 0,
        }
    }

    pub fn get_write_count(&self) -> u32 {
        self.writes
    }
}

impl Default for RamStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl SlotStorage for RamStorage {
    fn read_word(&self, address: u8) -> u16 {
        self.words[address as usize % STORAGE_WORDS]
    }

    fn write_word(&mut self, address: u8, word: u16) {
        self.words[address as usize % STORAGE_WORDS] = word;
        self.writes += 1;
    }
}

// Bytes of one storage image, little endian words
const IMAGE_BYTES: usize = STORAGE_WORDS * 2;

/// Storage kept in one erase sector of a NOR flash, cached in RAM.
///
/// Every physical write rewrites the whole sector, so callers should skip
/// writes that do not change a word. An unreadable sector reads as erased.
pub struct FlashStorage<F: NorFlash> {
    flash: F,
    offset: u32,            // start of the reserved sector
    words: [u16; STORAGE_WORDS],
}

impl<F: NorFlash> FlashStorage<F> {
    pub fn new(mut flash: F, offset: u32) -> FlashStorage<F> {
        let mut image = [0xff; IMAGE_BYTES];
        if flash.read(offset, &mut image).is_err() {
            warn!("Config sector unreadable at {:?}", offset);
            image = [0xff; IMAGE_BYTES];
        }
        let mut words = [0xffff; STORAGE_WORDS];
        for (word, bytes) in words.iter_mut().zip(image.chunks_exact(2)) {
            *word = u16::from_le_bytes([bytes[0], bytes[1]]);
        }
        FlashStorage { flash, offset, words }
    }

    fn commit(&mut self) {
        let mut image = [0xff; IMAGE_BYTES];
        for (bytes, word) in image.chunks_exact_mut(2).zip(self.words.iter()) {
            bytes.copy_from_slice(&word.to_le_bytes());
        }
        let end = self.offset + F::ERASE_SIZE as u32;
        let result = self
            .flash
            .erase(self.offset, end)
            .and_then(|_| self.flash.write(self.offset, &image));
        if result.is_err() {
            warn!("Config sector write failed at {:?}", self.offset);
        }
    }
}

impl<F: NorFlash> SlotStorage for FlashStorage<F> {
    fn read_word(&self, address: u8) -> u16 {
        self.words[address as usize % STORAGE_WORDS]
    }

    fn write_word(&mut self, address: u8, word: u16) {
        self.words[address as usize % STORAGE_WORDS] = word;
        self.commit();
    }
}

/// The configuration slots on top of a word storage.
pub struct ConfigStore<S: SlotStorage> {
    storage: S,
}

impl<S: SlotStorage> ConfigStore<S> {
    /// Open the store, resetting all slots to defaults if the stored layout
    /// version does not match.
    pub fn new(storage: S) -> ConfigStore<S> {
        let mut store = ConfigStore { storage };
        let version = store.storage.read_word(VERSION_ADDRESS);
        if version != CONFIG_VERSION {
            warn!("Config version {:?} != {:?}, loading defaults", version, CONFIG_VERSION);
            store.reset_to_defaults();
        }
        store
    }

    pub fn reset_to_defaults(&mut self) {
        for slot in Slot::ALL {
            self.write(slot, slot.default_value());
        }
        if self.storage.read_word(VERSION_ADDRESS) != CONFIG_VERSION {
            self.storage.write_word(VERSION_ADDRESS, CONFIG_VERSION);
        }
    }

    pub fn read(&self, slot: Slot) -> i16 {
        self.storage.read_word(slot.index()) as i16
    }

    /// Store a value. Returns false, and leaves the storage alone, if the slot
    /// already holds it.
    pub fn write(&mut self, slot: Slot, value: i16) -> bool {
        if self.read(slot) == value {
            return false;
        }
        self.storage.write_word(slot.index(), value as u16);
        true
    }

    // ----- Typed reads for the brew program
    /// Minutes, never negative.
    pub fn read_minutes(&self, slot: Slot) -> u16 {
        self.read(slot).max(0) as u16
    }

    /// Output percentage, 0..200.
    pub fn read_percentage(&self, slot: Slot) -> u8 {
        self.read(slot).clamp(0, MAX_PERCENTAGE) as u8
    }

    pub fn read_flag(&self, slot: Slot) -> bool {
        self.read(slot) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_storage::nor_flash::{
        check_erase, check_read, check_write, ErrorType, NorFlashErrorKind, ReadNorFlash,
    };

    const SECTOR: usize = 4096;

    // Two sectors of NOR flash, config lives in the second
    struct FakeFlash {
        bytes: [u8; 2 * SECTOR],
        erases: u32,
        broken: bool,
    }

    impl FakeFlash {
        fn new() -> FakeFlash {
            FakeFlash { bytes: [0xff; 2 * SECTOR], erases: 0, broken: false }
        }
    }

    impl ErrorType for FakeFlash {
        type Error = NorFlashErrorKind;
    }

    impl ReadNorFlash for FakeFlash {
        const READ_SIZE: usize = 1;

        fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
            check_read(self, offset, bytes.len())?;
            if self.broken {
                return Err(NorFlashErrorKind::Other);
            }
            let start = offset as usize;
            bytes.copy_from_slice(&self.bytes[start..start + bytes.len()]);
            Ok(())
        }

        fn capacity(&self) -> usize {
            self.bytes.len()
        }
    }

    impl NorFlash for FakeFlash {
        const WRITE_SIZE: usize = 256;
        const ERASE_SIZE: usize = SECTOR;

        fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
            check_erase(self, from, to)?;
            self.bytes[from as usize..to as usize].fill(0xff);
            self.erases += 1;
            Ok(())
        }

        fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
            check_write(self, offset, bytes.len())?;
            let start = offset as usize;
            // NOR programming only clears bits
            for (cell, b) in self.bytes[start..start + bytes.len()].iter_mut().zip(bytes) {
                *cell &= *b;
            }
            Ok(())
        }
    }

    #[test]
    fn fresh_storage_gets_defaults_and_version() {
        let store = ConfigStore::new(RamStorage::new());
        for slot in Slot::ALL {
            assert_eq!(store.read(slot), slot.default_value());
        }
        assert_eq!(store.storage.read_word(VERSION_ADDRESS), CONFIG_VERSION);
    }

    #[test]
    fn matching_version_keeps_stored_values() {
        let mut store = ConfigStore::new(RamStorage::new());
        store.write(Slot::BoilDuration, 70);
        let storage = store.storage;
        let store = ConfigStore::new(storage);
        assert_eq!(store.read(Slot::BoilDuration), 70);
    }

    #[test]
    fn version_mismatch_resets_everything() {
        let mut storage = RamStorage::new();
        storage.write_word(Slot::BoilDuration.index(), 70);
        storage.write_word(VERSION_ADDRESS, CONFIG_VERSION - 1);
        let store = ConfigStore::new(storage);
        assert_eq!(store.read(Slot::BoilDuration), 0);
    }

    #[test]
    fn write_then_read_returns_value() {
        let mut store = ConfigStore::new(RamStorage::new());
        assert!(store.write(Slot::TempCorrection, -12));
        assert_eq!(store.read(Slot::TempCorrection), -12);
    }

    #[test]
    fn unchanged_write_is_skipped() {
        let mut store = ConfigStore::new(RamStorage::new());
        let before = store.storage.get_write_count();
        assert!(store.write(Slot::StrikeTemp, 700));
        assert!(!store.write(Slot::StrikeTemp, 700));
        assert_eq!(store.storage.get_write_count(), before + 1);
    }

    #[test]
    fn flash_config_survives_power_cycle() {
        let store = ConfigStore::new(FlashStorage::new(FakeFlash::new(), SECTOR as u32));
        let mut store = ConfigStore::new(FlashStorage::new(store.storage.flash, SECTOR as u32));
        assert!(store.write(Slot::BoilDuration, 70));
        assert!(store.write(Slot::TempCorrection, -12));

        // Power cycle: only the flash contents carry over
        let flash = store.storage.flash;
        let erases = flash.erases;
        let store = ConfigStore::new(FlashStorage::new(flash, SECTOR as u32));
        assert_eq!(store.read(Slot::BoilDuration), 70);
        assert_eq!(store.read(Slot::TempCorrection), -12);
        assert_eq!(store.read(Slot::StrikeTemp), Slot::StrikeTemp.default_value());
        assert_eq!(store.storage.flash.erases, erases);
    }

    #[test]
    fn flash_first_boot_loads_defaults_once() {
        let store = ConfigStore::new(FlashStorage::new(FakeFlash::new(), SECTOR as u32));
        let flash = store.storage.flash;
        let erases = flash.erases;
        assert!(erases > 0);
        // Nothing outside the reserved sector is touched
        assert_eq!(&flash.bytes[..SECTOR], &[0xff; SECTOR][..]);

        let store = ConfigStore::new(FlashStorage::new(flash, SECTOR as u32));
        assert_eq!(store.storage.flash.erases, erases);
        assert_eq!(store.read(Slot::AlarmTimeout), 90);
    }

    #[test]
    fn unchanged_flash_write_does_not_erase() {
        let mut store = ConfigStore::new(FlashStorage::new(FakeFlash::new(), SECTOR as u32));
        let erases = store.storage.flash.erases;
        assert!(!store.write(Slot::MashOutput, Slot::MashOutput.default_value()));
        assert_eq!(store.storage.flash.erases, erases);
        assert!(store.write(Slot::MashOutput, 60));
        assert_eq!(store.storage.flash.erases, erases + 1);
    }

    #[test]
    fn unreadable_flash_falls_back_to_defaults() {
        let mut flash = FakeFlash::new();
        flash.broken = true;
        let store = ConfigStore::new(FlashStorage::new(flash, SECTOR as u32));
        assert_eq!(store.read(Slot::MashDuration2), 30);
    }

    #[test]
    fn check_value_stays_in_bounds_and_is_idempotent() {
        let samples = [i16::MIN, -1000, -401, -400, -51, -1, 0, 1, 2, 3, 4, 200, 201, 999, 1000, 1400, 1401, 2501, i16::MAX];
        for item in 0..=MODE_ITEM {
            let (min, max) = match Slot::from_index(item) {
                Some(slot) => slot.kind().bounds(),
                None => (0, 3),
            };
            for v in samples {
                let c = check_value(item, v);
                assert!(c >= min && c <= max, "item {} value {} -> {}", item, v, c);
                assert_eq!(check_value(item, c), c);
            }
        }
    }

    #[test]
    fn check_value_rolls_over() {
        let item = Slot::StrikeOutput.index();
        assert_eq!(check_value(item, 201), 0);
        assert_eq!(check_value(item, -1), 200);
        assert_eq!(check_value(Slot::ConstantPump.index(), 2), 0);
        assert_eq!(check_value(MODE_ITEM, -1), 3);
        assert_eq!(check_value(MODE_ITEM, 4), 0);
    }

    #[test]
    fn slot_helpers_follow_layout() {
        assert_eq!(Slot::mash_temp(2).index(), Slot::MashTemp1.index() + 4);
        assert_eq!(Slot::mash_duration(3), Slot::MashDuration4);
        assert_eq!(Slot::hop_timer(1), Slot::HopTimer2);
        assert_eq!(Slot::from_index(25), Some(Slot::AlarmTimeout));
        assert_eq!(Slot::from_index(MODE_ITEM), None);
    }

    #[test]
    fn typed_reads_saturate() {
        let mut store = ConfigStore::new(RamStorage::new());
        store.write(Slot::StrikeDelay, -5);
        assert_eq!(store.read_minutes(Slot::StrikeDelay), 0);
        store.write(Slot::StrikeOutput, 300);
        assert_eq!(store.read_percentage(Slot::StrikeOutput), 200);
    }
}
