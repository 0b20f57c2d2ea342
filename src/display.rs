//! What the three 7-segment digits and the indicator group show.
//!
//! The core only fills in a [`Frame`]. The multiplexer in the firmware takes
//! the bytes from [`Frame::encode`] and refreshes one common anode per interrupt.

/// One 7-segment digit plus its decimal point. `true` = segment lit.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Glyph {
    pub top: bool,          // a
    pub upper_right: bool,  // b
    pub lower_right: bool,  // c
    pub bottom: bool,       // d
    pub lower_left: bool,   // e
    pub upper_left: bool,   // f
    pub middle: bool,       // g
    pub point: bool,
}

impl Glyph {
    pub const BLANK: Glyph = Glyph {
        top: false,
        upper_right: false,
        lower_right: false,
        bottom: false,
        lower_left: false,
        upper_left: false,
        middle: false,
        point: false,
    };

    /// Build a glyph from the usual segment letters, e.g. `b"bc"` for a one.
    pub const fn lit(segments: &[u8]) -> Glyph {
        let mut g = Glyph::BLANK;
        let mut i = 0;
        while i < segments.len() {
            match segments[i] {
                b'a' => g.top = true,
                b'b' => g.upper_right = true,
                b'c' => g.lower_right = true,
                b'd' => g.bottom = true,
                b'e' => g.lower_left = true,
                b'f' => g.upper_left = true,
                b'g' => g.middle = true,
                b'.' => g.point = true,
                _ => {}
            }
            i += 1;
        }
        g
    }

    pub fn with_point(mut self) -> Glyph {
        self.point = true;
        self
    }

    /// Raw byte for the segment port. Active low, bit 0 is the decimal point.
    pub fn encode(&self) -> u8 {
        let mut lit = 0u8;
        if self.point { lit |= 1 << 0; }
        if self.middle { lit |= 1 << 1; }
        if self.upper_left { lit |= 1 << 2; }
        if self.lower_right { lit |= 1 << 3; }
        if self.bottom { lit |= 1 << 4; }
        if self.lower_left { lit |= 1 << 5; }
        if self.upper_right { lit |= 1 << 6; }
        if self.top { lit |= 1 << 7; }
        !lit
    }
}

// ----- Character set
pub mod chars {
    use super::Glyph;

    pub const BLANK: Glyph = Glyph::BLANK;
    pub const DIGITS: [Glyph; 10] = [
        Glyph::lit(b"abcdef"),
        Glyph::lit(b"bc"),
        Glyph::lit(b"abdeg"),
        Glyph::lit(b"abcdg"),
        Glyph::lit(b"bcfg"),
        Glyph::lit(b"acdfg"),
        Glyph::lit(b"acdefg"),
        Glyph::lit(b"abc"),
        Glyph::lit(b"abcdefg"),
        Glyph::lit(b"abcdfg"),
    ];
    pub const A: Glyph = Glyph::lit(b"abcefg");
    pub const B_LOWER: Glyph = Glyph::lit(b"cdefg");
    pub const C: Glyph = Glyph::lit(b"adef");
    pub const C_LOWER: Glyph = Glyph::lit(b"deg");
    pub const D_LOWER: Glyph = Glyph::lit(b"bcdeg");
    pub const E: Glyph = Glyph::lit(b"adefg");
    pub const F: Glyph = Glyph::lit(b"aefg");
    pub const H: Glyph = Glyph::lit(b"bcefg");
    pub const H_LOWER: Glyph = Glyph::lit(b"cefg");
    pub const N_LOWER: Glyph = Glyph::lit(b"ceg");
    pub const O: Glyph = DIGITS[0];
    pub const P: Glyph = Glyph::lit(b"abefg");
    pub const R_LOWER: Glyph = Glyph::lit(b"eg");
    pub const S: Glyph = DIGITS[5];
    pub const T_LOWER: Glyph = Glyph::lit(b"defg");
    pub const U: Glyph = Glyph::lit(b"bcdef");

    pub fn digit(n: u8) -> Glyph {
        DIGITS[(n % 10) as usize]
    }
}

/// Three characters of text, left to right.
pub type Text = [Glyph; 3];

pub mod text {
    use super::chars::*;
    use super::Text;

    pub const OFF: Text = [O, F, F];
    pub const PAUSED: Text = [P, S, E];

    // Label of the mode item and of anything past the last slot
    pub const RUN_MODE: Text = [R_LOWER, U, N_LOWER];

    // Mode values
    pub const PROGRAM: Text = [P, R_LOWER, BLANK];
    pub const CONSTANT_TEMP: Text = [C_LOWER, T_LOWER, BLANK];
    pub const CONSTANT_OUTPUT: Text = [C_LOWER, O, BLANK];

    // Program phases
    pub const STRIKE: Text = [S, T_LOWER, BLANK];
    pub const MASH: Text = [P, BLANK, BLANK];
    pub const HOTBREAK: Text = [H, B_LOWER, BLANK];
    pub const BOIL: Text = [B_LOWER, BLANK, BLANK];
    pub const THERMOSTAT: Text = [T_LOWER, H_LOWER, BLANK];

    // Alarm reasons
    pub const MASH_DONE: Text = [B_LOWER, U, BLANK];
    pub const BOIL_DONE: Text = [C, H_LOWER, BLANK];
}

/// Indicator group on the fourth common anode. `true` = lit.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Extras {
    pub point: bool,
    pub celsius: bool,
    pub heat: bool,
    pub negative: bool,
    pub degree: bool,
    pub set: bool,
    pub cool: bool,
}

impl Extras {
    pub fn encode(&self) -> u8 {
        let mut lit = 0u8;
        if self.point { lit |= 1 << 1; }
        if self.celsius { lit |= 1 << 2; }
        if self.heat { lit |= 1 << 3; }
        if self.negative { lit |= 1 << 4; }
        if self.degree { lit |= 1 << 5; }
        if self.set { lit |= 1 << 6; }
        if self.cool { lit |= 1 << 7; }
        !lit
    }
}

/// Everything the multiplexer puts on the display.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Frame {
    pub hundreds: Glyph,
    pub tens: Glyph,
    pub units: Glyph,
    pub extras: Extras,
}

impl Frame {
    pub fn new() -> Frame {
        Frame::default()
    }

    /// Show a signed value. With `decimal` the value is in tenths of a degree:
    /// degree (and C) indicators are lit and a decimal point goes in front of
    /// the last digit, unless the magnitude needs all three digits. Integers
    /// leave the degree and C indicators as they were.
    pub fn show_value(&mut self, value: i16, decimal: bool) {
        let mut v = value as i32;
        let mut decimal = decimal;

        self.extras.negative = v < 0;
        v = v.abs();

        if decimal {
            self.extras.degree = true;
            self.extras.celsius = !cfg!(feature = "fahrenheit");
        }

        // Temperatures of 100.0 and above lose the decimal
        if v >= 1000 {
            v /= 10;
            decimal = false;
        }

        // Leading zeros are blanked, except the one in front of the decimal point
        self.hundreds = if v >= 100 {
            chars::digit((v / 100) as u8)
        } else {
            chars::BLANK
        };
        v %= 100;
        self.tens = if v >= 10 || decimal || self.hundreds != chars::BLANK {
            let g = chars::digit((v / 10) as u8);
            if decimal { g.with_point() } else { g }
        } else {
            chars::BLANK
        };
        self.units = chars::digit((v % 10) as u8);
    }

    pub fn show_temperature(&mut self, tenths: i16) {
        self.show_value(tenths, true);
    }

    pub fn show_int(&mut self, value: i16) {
        self.show_value(value, false);
    }

    /// Show three characters with the sign, degree, C and point indicators dark.
    pub fn show_text(&mut self, text: Text) {
        self.hundreds = text[0];
        self.tens = text[1];
        self.units = text[2];
        self.extras.negative = false;
        self.extras.degree = false;
        self.extras.celsius = false;
        self.extras.point = false;
    }

    /// Raw bytes in multiplex order: hundreds, tens, units, extras.
    pub fn encode(&self) -> [u8; 4] {
        [
            self.hundreds.encode(),
            self.tens.encode(),
            self.units.encode(),
            self.extras.encode(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::chars::*;
    use super::*;

    #[test]
    fn digit_bytes_match_segment_wiring() {
        let expected = [0x03, 0xb7, 0x0d, 0x25, 0xb1, 0x61, 0x41, 0x37, 0x01, 0x21];
        for (n, raw) in expected.iter().enumerate() {
            assert_eq!(digit(n as u8).encode(), *raw, "digit {}", n);
        }
    }

    #[test]
    fn letter_bytes_match_segment_wiring() {
        assert_eq!(A.encode(), 0x11);
        assert_eq!(B_LOWER.encode(), 0xc1);
        assert_eq!(C.encode(), 0x4b);
        assert_eq!(C_LOWER.encode(), 0xcd);
        assert_eq!(D_LOWER.encode(), 0x85);
        assert_eq!(E.encode(), 0x49);
        assert_eq!(F.encode(), 0x59);
        assert_eq!(H.encode(), 0x91);
        assert_eq!(H_LOWER.encode(), 0xd1);
        assert_eq!(N_LOWER.encode(), 0xd5);
        assert_eq!(P.encode(), 0x19);
        assert_eq!(R_LOWER.encode(), 0xdd);
        assert_eq!(T_LOWER.encode(), 0xc9);
        assert_eq!(U.encode(), 0x83);
        assert_eq!(BLANK.encode(), 0xff);
    }

    #[test]
    fn dark_extras_encode_all_high() {
        assert_eq!(Extras::default().encode(), 0xff);
        let e = Extras { heat: true, ..Extras::default() };
        assert_eq!(e.encode(), 0xf7);
    }

    #[test]
    fn temperature_keeps_one_leading_zero() {
        let mut f = Frame::new();
        f.show_temperature(5);
        assert_eq!(f.hundreds, BLANK);
        assert_eq!(f.tens, digit(0).with_point());
        assert_eq!(f.units, digit(5));
        assert!(f.extras.degree);
        assert!(!f.extras.negative);
    }

    #[test]
    fn temperature_above_hundred_drops_decimal() {
        let mut f = Frame::new();
        f.show_temperature(1234);
        assert_eq!(f.hundreds, digit(1));
        assert_eq!(f.tens, digit(2));
        assert_eq!(f.units, digit(3));
    }

    #[test]
    fn negative_temperature_lights_sign() {
        let mut f = Frame::new();
        f.show_temperature(-123);
        assert!(f.extras.negative);
        assert_eq!(f.hundreds, digit(1));
        assert_eq!(f.tens, digit(2).with_point());
        assert_eq!(f.units, digit(3));
    }

    #[test]
    fn integers_blank_leading_zeros() {
        let mut f = Frame::new();
        f.show_int(7);
        assert_eq!([f.hundreds, f.tens, f.units], [BLANK, BLANK, digit(7)]);
        f.show_int(40);
        assert_eq!([f.hundreds, f.tens, f.units], [BLANK, digit(4), digit(0)]);
        f.show_int(105);
        assert_eq!([f.hundreds, f.tens, f.units], [digit(1), digit(0), digit(5)]);
        assert!(!f.extras.degree);
    }

    #[test]
    fn integers_keep_unit_indicators() {
        let mut f = Frame::new();
        f.show_temperature(-12);
        f.show_int(80);
        assert!(f.extras.degree);
        assert_eq!(f.extras.celsius, !cfg!(feature = "fahrenheit"));
        assert!(!f.extras.negative);
        assert_eq!(f.tens, digit(8));
    }

    #[test]
    fn text_clears_value_indicators_but_not_relays() {
        let mut f = Frame::new();
        f.show_temperature(-50);
        f.extras.heat = true;
        f.show_text(text::OFF);
        assert!(!f.extras.negative && !f.extras.degree);
        assert!(f.extras.heat);
        assert_eq!(f.encode()[0], O.encode());
    }
}
