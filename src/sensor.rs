// Thermistor acquisition: exponential filter on raw ADC codes and
// conversion of the filtered value to tenths of a degree.

// Filter weight is 1/2^AD_FILTER_SHIFT. The filtered value settles at raw << AD_FILTER_SHIFT.
pub const AD_FILTER_SHIFT: u16 = 4;

// Starting point of the filter, mid scale
pub const AD_FILTER_INIT: u16 = 0x7fff >> (6 - AD_FILTER_SHIFT);

// Temperature in tenths of a degree at 32 equally spaced points of the 10 bit ADC range
#[cfg(not(feature = "fahrenheit"))]
pub const AD_LOOKUP: [i16; 32] = [
    0, -486, -355, -270, -205, -151, -104, -61, -21, 16, 51, 85, 119, 152, 184, 217, 250, 284,
    318, 354, 391, 431, 473, 519, 569, 624, 688, 763, 856, 977, 1154, 1482,
];

#[cfg(feature = "fahrenheit")]
pub const AD_LOOKUP: [i16; 32] = [
    0, -555, -319, -167, -49, 48, 134, 211, 282, 348, 412, 474, 534, 593, 652, 711, 770, 831,
    893, 957, 1025, 1096, 1172, 1253, 1343, 1444, 1559, 1694, 1860, 2078, 2397, 2987,
];

/// Exponential moving average of the raw ADC codes, run every fast tick.
#[derive(Debug, Copy, Clone)]
pub struct AdcFilter {
    value: u16,
}

impl AdcFilter {
    pub fn new() -> AdcFilter {
        AdcFilter { value: AD_FILTER_INIT }
    }

    /// Push one raw sample and return the new filtered value.
    pub fn push(&mut self, raw: u16) -> u16 {
        self.value = read_filtered_sample(self.value, raw);
        self.value
    }

    pub fn get_value(&self) -> u16 {
        self.value
    }
}

impl Default for AdcFilter {
    fn default() -> Self {
        Self::new()
    }
}

/// `filtered - filtered/16 + raw`. Raw codes above 10 bits are masked off.
pub fn read_filtered_sample(filtered: u16, raw: u16) -> u16 {
    (filtered - (filtered >> AD_FILTER_SHIFT)).wrapping_add(raw & 0x3ff)
}

/// Filtered value to tenths of a degree, uncalibrated.
///
/// Bits above the filter shift give a 5 bit table index and a 6 bit fraction.
/// The result is the table entry interpolated toward the next one, rounded to
/// nearest (bias of 32 before the shift).
pub fn convert(filtered: u16) -> i16 {
    let a = ((filtered >> (AD_FILTER_SHIFT - 1)) & 0x3f) as i32; // fraction
    let b = ((filtered >> (AD_FILTER_SHIFT + 5)) & 0x1f) as usize; // table index

    let lo = AD_LOOKUP[b] as i32;
    // Top of the table has no next point
    let hi = AD_LOOKUP[(b + 1).min(AD_LOOKUP.len() - 1)] as i32;

    // Same as adding lo for each i in a..64 and hi for each i in 0..a
    let sum = 32 + (64 - a) * lo + a * hi;
    (sum >> 6) as i16
}

/// Filtered value to a calibrated temperature.
pub fn to_temperature(filtered: u16, correction: i16) -> i16 {
    convert(filtered).saturating_add(correction)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Reference: add one table entry per step, 64 steps
    fn convert_by_accumulation(filtered: u16) -> i16 {
        let a = ((filtered >> (AD_FILTER_SHIFT - 1)) & 0x3f) as usize;
        let b = ((filtered >> (AD_FILTER_SHIFT + 5)) & 0x1f) as usize;
        let next = (b + 1).min(31);
        let mut temp: i32 = 32;
        for i in 0..64 {
            if a <= i {
                temp += AD_LOOKUP[b] as i32;
            } else {
                temp += AD_LOOKUP[next] as i32;
            }
        }
        (temp >> 6) as i16
    }

    #[test]
    fn closed_form_matches_accumulation() {
        for filtered in (0..=u16::MAX).step_by(7) {
            assert_eq!(convert(filtered), convert_by_accumulation(filtered), "filtered {}", filtered);
        }
    }

    #[test]
    fn filter_settles_at_sixteen_times_raw() {
        let mut f = AdcFilter::new();
        for _ in 0..400 {
            f.push(512);
        }
        assert_eq!(f.get_value(), 512 << AD_FILTER_SHIFT);
    }

    #[test]
    fn filter_step_is_exponential() {
        assert_eq!(read_filtered_sample(1600, 0), 1500);
        assert_eq!(read_filtered_sample(1600, 100), 1600);
    }

    #[test]
    fn table_points_are_exact() {
        // Raw code 32*b with no fraction lands on table entry b
        for b in 1..31u16 {
            let filtered = (32 * b) << AD_FILTER_SHIFT;
            assert_eq!(convert(filtered), AD_LOOKUP[b as usize]);
        }
    }

    #[test]
    fn halfway_interpolates() {
        // Fraction 32/64 between entries 16 and 17
        let filtered = ((16 * 32 + 16) as u16) << AD_FILTER_SHIFT;
        let expected = ((32 + 32 * AD_LOOKUP[16] as i32 + 32 * AD_LOOKUP[17] as i32) >> 6) as i16;
        assert_eq!(convert(filtered), expected);
    }

    #[test]
    fn top_of_range_does_not_overrun_table() {
        assert_eq!(convert(1023 << AD_FILTER_SHIFT), AD_LOOKUP[31]);
    }

    #[test]
    fn correction_is_added() {
        let filtered = (32 * 16) << AD_FILTER_SHIFT;
        assert_eq!(to_temperature(filtered, -15), AD_LOOKUP[16] - 15);
    }
}
