//! Fixed-width Unicode representation used on the Unicode side of every session
//!
//! The conversion primitive only understands bytes, so text crosses the
//! boundary as a run of fixed-width code units (`UCS-2` or `UCS-4`) in a
//! specific byte order. The form is chosen once, usually at startup through
//! [`UnicodeForm::native`], and handed to every session explicitly.

use serde::{Deserialize, Serialize};

/// Width of one code unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitWidth {
    /// Two bytes per unit, Basic Multilingual Plane only
    Ucs2,
    /// Four bytes per unit, the full code point range
    Ucs4,
}

/// Byte order of a code unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ByteOrder {
    /// Least significant byte first
    Little,
    /// Most significant byte first
    Big,
}

/// A fixed-width Unicode encoding: unit width plus byte order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnicodeForm {
    /// Width of one code unit
    pub width: UnitWidth,
    /// Byte order of each unit
    pub order: ByteOrder,
}

impl Default for UnicodeForm {
    fn default() -> Self {
        Self::native()
    }
}

impl UnicodeForm {
    /// Create a form from its parts
    pub const fn new(width: UnitWidth, order: ByteOrder) -> Self {
        Self { width, order }
    }

    /// The form matching this process: wide enough for every `char` and in
    /// the target's native byte order.
    pub fn native() -> Self {
        // `char` always spans the full code point range.
        let width = if char::MAX as u32 > 0xFFFF {
            UnitWidth::Ucs4
        } else {
            UnitWidth::Ucs2
        };
        let order = if cfg!(target_endian = "little") {
            ByteOrder::Little
        } else {
            ByteOrder::Big
        };
        Self { width, order }
    }

    /// Codeset name the conversion primitive knows this form by
    pub fn codeset(self) -> &'static str {
        match (self.width, self.order) {
            (UnitWidth::Ucs2, ByteOrder::Little) => "UCS-2LE",
            (UnitWidth::Ucs2, ByteOrder::Big) => "UCS-2BE",
            (UnitWidth::Ucs4, ByteOrder::Little) => "UCS-4LE",
            (UnitWidth::Ucs4, ByteOrder::Big) => "UCS-4BE",
        }
    }

    /// Number of bytes in one code unit
    #[inline]
    pub fn unit_bytes(self) -> usize {
        match self.width {
            UnitWidth::Ucs2 => 2,
            UnitWidth::Ucs4 => 4,
        }
    }

    /// Largest code point a single unit can carry
    pub fn max_code_point(self) -> u32 {
        match self.width {
            UnitWidth::Ucs2 => 0xFFFF,
            UnitWidth::Ucs4 => char::MAX as u32,
        }
    }

    /// Whether `ch` fits in one unit of this form
    #[inline]
    pub fn can_represent(self, ch: char) -> bool {
        ch as u32 <= self.max_code_point()
    }

    /// Length of the leading run of `text` this form can represent
    pub fn representable_prefix(self, text: &[char]) -> usize {
        match self.width {
            UnitWidth::Ucs4 => text.len(),
            UnitWidth::Ucs2 => text
                .iter()
                .position(|&ch| !self.can_represent(ch))
                .unwrap_or(text.len()),
        }
    }

    /// Append the units for `text` to `out`.
    ///
    /// Every character must be representable; callers cut the input with
    /// [`representable_prefix`](Self::representable_prefix) first.
    pub fn write_units(self, text: &[char], out: &mut Vec<u8>) {
        out.reserve(text.len() * self.unit_bytes());
        for &ch in text {
            let cp = ch as u32;
            debug_assert!(cp <= self.max_code_point());
            match (self.width, self.order) {
                (UnitWidth::Ucs2, ByteOrder::Little) => {
                    out.extend_from_slice(&(cp as u16).to_le_bytes())
                }
                (UnitWidth::Ucs2, ByteOrder::Big) => {
                    out.extend_from_slice(&(cp as u16).to_be_bytes())
                }
                (UnitWidth::Ucs4, ByteOrder::Little) => out.extend_from_slice(&cp.to_le_bytes()),
                (UnitWidth::Ucs4, ByteOrder::Big) => out.extend_from_slice(&cp.to_be_bytes()),
            }
        }
    }

    /// Decode whole units from `bytes` into `out`.
    ///
    /// Surrogates and out-of-range values become `U+FFFD`; a trailing
    /// partial unit is ignored.
    pub fn read_units(self, bytes: &[u8], out: &mut String) {
        out.reserve(bytes.len() / self.unit_bytes());
        for unit in bytes.chunks_exact(self.unit_bytes()) {
            let cp = match (self.width, self.order) {
                (UnitWidth::Ucs2, ByteOrder::Little) => {
                    u32::from(u16::from_le_bytes([unit[0], unit[1]]))
                }
                (UnitWidth::Ucs2, ByteOrder::Big) => {
                    u32::from(u16::from_be_bytes([unit[0], unit[1]]))
                }
                (UnitWidth::Ucs4, ByteOrder::Little) => {
                    u32::from_le_bytes([unit[0], unit[1], unit[2], unit[3]])
                }
                (UnitWidth::Ucs4, ByteOrder::Big) => {
                    u32::from_be_bytes([unit[0], unit[1], unit[2], unit[3]])
                }
            };
            out.push(char::from_u32(cp).unwrap_or(char::REPLACEMENT_CHARACTER));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_form() {
        let form = UnicodeForm::native();
        assert_eq!(form.width, UnitWidth::Ucs4);
        assert_eq!(form.unit_bytes(), 4);
        if cfg!(target_endian = "little") {
            assert_eq!(form.codeset(), "UCS-4LE");
        } else {
            assert_eq!(form.codeset(), "UCS-4BE");
        }
    }

    #[test]
    fn test_codeset_names() {
        let ucs2be = UnicodeForm::new(UnitWidth::Ucs2, ByteOrder::Big);
        assert_eq!(ucs2be.codeset(), "UCS-2BE");
        assert_eq!(ucs2be.unit_bytes(), 2);
        assert_eq!(ucs2be.max_code_point(), 0xFFFF);
    }

    #[test]
    fn test_ucs4_units() {
        let form = UnicodeForm::new(UnitWidth::Ucs4, ByteOrder::Little);
        let mut units = Vec::new();
        form.write_units(&['A', '🌍'], &mut units);
        assert_eq!(units, [0x41, 0, 0, 0, 0x0D, 0xF3, 0x01, 0x00]);

        let mut text = String::new();
        form.read_units(&units, &mut text);
        assert_eq!(text, "A🌍");
    }

    #[test]
    fn test_ucs2_stops_at_supplementary_plane() {
        let form = UnicodeForm::new(UnitWidth::Ucs2, ByteOrder::Big);
        let text: Vec<char> = "ab🌍c".chars().collect();
        assert_eq!(form.representable_prefix(&text), 2);

        let mut units = Vec::new();
        form.write_units(&text[..2], &mut units);
        assert_eq!(units, [0x00, 0x61, 0x00, 0x62]);
    }

    #[test]
    fn test_read_units_replaces_surrogates() {
        let form = UnicodeForm::new(UnitWidth::Ucs2, ByteOrder::Little);
        let mut text = String::new();
        // 0xD800 is a lone surrogate; the final byte is a partial unit.
        form.read_units(&[0x41, 0x00, 0x00, 0xD8, 0x42], &mut text);
        assert_eq!(text, "A\u{FFFD}");
    }

    #[test]
    fn test_form_serde() {
        let form = UnicodeForm::new(UnitWidth::Ucs2, ByteOrder::Little);
        let json = serde_json::to_string(&form).unwrap();
        assert_eq!(json, r#"{"width":"ucs2","order":"little"}"#);
        let back: UnicodeForm = serde_json::from_str(&json).unwrap();
        assert_eq!(back, form);
    }
}
