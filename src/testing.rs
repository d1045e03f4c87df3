//! In-memory conversion primitive for tests
//!
//! `TOY-SHIFT` is a small stateful codeset shaped like the ISO-2022 family:
//!
//! - `U+0000..=U+007F` (except `U+000E`, `U+000F`) map to the same byte.
//! - Greek small letters `U+03B1..=U+03C9` live in the shifted set: `SO`
//!   (0x0E) switches to it, then each letter is `0x21 + offset`. `SI` (0x0F)
//!   switches back and is the trailer after shifted text.
//! - `U+4E00..=U+4EFF` are double-byte: lead `0x81 | 0x82`, trail `0x80..=0xFF`.
//!
//! Everything else is unmappable. A backend built with
//! [`ToyBackend::stingy`] writes at most a few bytes per call regardless of
//! the buffer it is given, to force output-too-small paths. One built with
//! [`ToyBackend::faulty`] misbehaves in a fixed way to reach the fatal paths.

use crate::backend::{Backend, Converter, Interrupt, Progress, Stall};
use crate::unicode::{ByteOrder, UnicodeForm, UnitWidth};
use crate::{Error, Result};

pub(crate) const TOY: &str = "TOY-SHIFT";
pub(crate) const SO: u8 = 0x0E;
pub(crate) const SI: u8 = 0x0F;

/// Ways a faulty converter breaks the conversion contract
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Fault {
    /// Encoding reports an incomplete sequence before the first unit
    Truncated,
    /// Encoding stops one byte into the first code unit
    SplitUnit,
    /// Computing the shift-out trailer fails
    Trailer,
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ToyBackend {
    max_output: Option<usize>,
    fault: Option<Fault>,
}

impl ToyBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn stingy(max_output: usize) -> Self {
        Self {
            max_output: Some(max_output),
            fault: None,
        }
    }

    pub(crate) fn faulty(fault: Fault) -> Self {
        Self {
            max_output: None,
            fault: Some(fault),
        }
    }
}

impl Backend for ToyBackend {
    fn open(&self, to: &str, from: &str) -> Result<Box<dyn Converter>> {
        let (form, encode) = match (parse_form(from), parse_form(to)) {
            (Some(form), None) if to == TOY => (form, true),
            (None, Some(form)) if from == TOY => (form, false),
            _ => {
                return Err(Error::UnsupportedConversion {
                    from: from.to_string(),
                    to: to.to_string(),
                    status: libc::EINVAL,
                });
            }
        };
        Ok(Box::new(ToyConverter {
            form,
            encode,
            shifted: false,
            max_output: self.max_output,
            fault: self.fault,
        }))
    }
}

fn parse_form(name: &str) -> Option<UnicodeForm> {
    let form = match name {
        "UCS-2LE" => UnicodeForm::new(UnitWidth::Ucs2, ByteOrder::Little),
        "UCS-2BE" => UnicodeForm::new(UnitWidth::Ucs2, ByteOrder::Big),
        "UCS-4LE" => UnicodeForm::new(UnitWidth::Ucs4, ByteOrder::Little),
        "UCS-4BE" => UnicodeForm::new(UnitWidth::Ucs4, ByteOrder::Big),
        _ => return None,
    };
    Some(form)
}

#[derive(Debug, Clone, Copy)]
enum Mapping {
    Single(u8),
    Shifted(u8),
    Double(u8, u8),
}

fn map_code_point(cp: u32) -> Option<Mapping> {
    match cp {
        0x0E | 0x0F => None,
        0x00..=0x7F => Some(Mapping::Single(cp as u8)),
        0x03B1..=0x03C9 => Some(Mapping::Shifted(0x21 + (cp - 0x03B1) as u8)),
        0x4E00..=0x4EFF => {
            let offset = cp - 0x4E00;
            Some(Mapping::Double(
                0x81 + (offset >> 7) as u8,
                0x80 | (offset & 0x7F) as u8,
            ))
        }
        _ => None,
    }
}

fn stall(read: usize, written: usize, kind: Interrupt) -> Stall {
    let status = match kind {
        Interrupt::OutputTooSmall => libc::E2BIG,
        Interrupt::IncompleteSequence => libc::EINVAL,
        Interrupt::InvalidSequence => libc::EILSEQ,
        Interrupt::Failed => libc::EBADF,
    };
    Stall {
        read,
        written,
        kind,
        status,
    }
}

struct ToyConverter {
    form: UnicodeForm,
    encode: bool,
    shifted: bool,
    max_output: Option<usize>,
    fault: Option<Fault>,
}

impl ToyConverter {
    fn unit_value(&self, unit: &[u8]) -> u32 {
        match (self.form.width, self.form.order) {
            (UnitWidth::Ucs2, ByteOrder::Little) => u32::from(u16::from_le_bytes([unit[0], unit[1]])),
            (UnitWidth::Ucs2, ByteOrder::Big) => u32::from(u16::from_be_bytes([unit[0], unit[1]])),
            (UnitWidth::Ucs4, ByteOrder::Little) => {
                u32::from_le_bytes([unit[0], unit[1], unit[2], unit[3]])
            }
            (UnitWidth::Ucs4, ByteOrder::Big) => {
                u32::from_be_bytes([unit[0], unit[1], unit[2], unit[3]])
            }
        }
    }

    fn flush(&mut self, output: &mut [u8], limit: usize) -> std::result::Result<Progress, Stall> {
        if self.encode && self.shifted {
            if limit < 1 {
                return Err(stall(0, 0, Interrupt::OutputTooSmall));
            }
            output[0] = SI;
            self.shifted = false;
            return Ok(Progress {
                read: 0,
                written: 1,
            });
        }
        self.shifted = false;
        Ok(Progress::default())
    }

    fn encode_units(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        limit: usize,
    ) -> std::result::Result<Progress, Stall> {
        let width = self.form.unit_bytes();
        let (mut read, mut written) = (0, 0);
        while read < input.len() {
            if input.len() - read < width {
                return Err(stall(read, written, Interrupt::IncompleteSequence));
            }
            let cp = self.unit_value(&input[read..read + width]);
            let Some(mapping) = map_code_point(cp) else {
                return Err(stall(read, written, Interrupt::InvalidSequence));
            };

            let mut bytes = [0u8; 3];
            let mut n = 0;
            match mapping {
                Mapping::Shifted(b) => {
                    if !self.shifted {
                        bytes[n] = SO;
                        n += 1;
                    }
                    bytes[n] = b;
                    n += 1;
                }
                Mapping::Single(b) => {
                    if self.shifted {
                        bytes[n] = SI;
                        n += 1;
                    }
                    bytes[n] = b;
                    n += 1;
                }
                Mapping::Double(lead, trail) => {
                    if self.shifted {
                        bytes[n] = SI;
                        n += 1;
                    }
                    bytes[n] = lead;
                    bytes[n + 1] = trail;
                    n += 2;
                }
            }

            if written + n > limit {
                return Err(stall(read, written, Interrupt::OutputTooSmall));
            }
            output[written..written + n].copy_from_slice(&bytes[..n]);
            written += n;
            read += width;
            self.shifted = matches!(mapping, Mapping::Shifted(_));
        }
        Ok(Progress { read, written })
    }

    fn decode_bytes(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        limit: usize,
    ) -> std::result::Result<Progress, Stall> {
        let width = self.form.unit_bytes();
        let (mut read, mut written) = (0, 0);
        while read < input.len() {
            let b = input[read];
            let (cp, len) = if self.shifted {
                match b {
                    SI => {
                        self.shifted = false;
                        read += 1;
                        continue;
                    }
                    SO => {
                        read += 1;
                        continue;
                    }
                    0x21..=0x39 => (0x03B1 + u32::from(b - 0x21), 1),
                    _ => return Err(stall(read, written, Interrupt::InvalidSequence)),
                }
            } else {
                match b {
                    SO => {
                        self.shifted = true;
                        read += 1;
                        continue;
                    }
                    SI => {
                        read += 1;
                        continue;
                    }
                    0x00..=0x7F => (u32::from(b), 1),
                    0x81 | 0x82 => {
                        let Some(&trail) = input.get(read + 1) else {
                            return Err(stall(read, written, Interrupt::IncompleteSequence));
                        };
                        if trail < 0x80 {
                            return Err(stall(read, written, Interrupt::InvalidSequence));
                        }
                        (
                            0x4E00 + (u32::from(b - 0x81) << 7) + u32::from(trail & 0x7F),
                            2,
                        )
                    }
                    _ => return Err(stall(read, written, Interrupt::InvalidSequence)),
                }
            };

            if written + width > limit {
                return Err(stall(read, written, Interrupt::OutputTooSmall));
            }
            let ch = char::from_u32(cp).unwrap_or(char::REPLACEMENT_CHARACTER);
            let mut unit = Vec::with_capacity(width);
            self.form.write_units(&[ch], &mut unit);
            output[written..written + width].copy_from_slice(&unit);
            written += width;
            read += len;
        }
        Ok(Progress { read, written })
    }
}

impl Converter for ToyConverter {
    fn convert(
        &mut self,
        input: Option<&[u8]>,
        output: &mut [u8],
    ) -> std::result::Result<Progress, Stall> {
        match (self.fault, input) {
            (Some(Fault::Trailer), None) => return Err(stall(0, 0, Interrupt::Failed)),
            (Some(Fault::Truncated), Some(_)) if self.encode => {
                return Err(stall(0, 0, Interrupt::IncompleteSequence));
            }
            (Some(Fault::SplitUnit), Some(input)) if self.encode && !input.is_empty() => {
                return Err(stall(1, 0, Interrupt::InvalidSequence));
            }
            _ => {}
        }

        let limit = self
            .max_output
            .map_or(output.len(), |max| max.min(output.len()));
        match input {
            None => self.flush(output, limit),
            Some(input) if self.encode => self.encode_units(input, output, limit),
            Some(input) => self.decode_bytes(input, output, limit),
        }
    }

    fn reset(&mut self) {
        self.shifted = false;
    }
}
