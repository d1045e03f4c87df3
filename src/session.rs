//! Conversion sessions: one directional context plus its shift state

use std::fmt;

use tracing::debug;

use crate::backend::{Backend, Converter, Interrupt, Stall};
use crate::unicode::UnicodeForm;
use crate::{Error, Result};

/// Which way a session converts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Unicode text to codeset bytes
    Encode,
    /// Codeset bytes to Unicode text
    Decode,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Encode => f.write_str("encode"),
            Direction::Decode => f.write_str("decode"),
        }
    }
}

/// A conversion call that stopped before consuming its whole input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interruption<T> {
    /// Why the call stopped
    pub kind: Interrupt,
    /// Output produced before stopping
    pub output: T,
    /// Input units consumed before stopping: characters when encoding,
    /// bytes when decoding or converting raw bytes
    pub consumed: usize,
    /// Status code reported by the primitive
    pub status: i32,
}

/// One open conversion context between a codeset and a [`UnicodeForm`].
///
/// Shift state survives between calls until [`reset_state`](Self::reset_state)
/// or [`discard_state`](Self::discard_state). A session is not safe for
/// concurrent use; share it behind a lock if needed.
pub struct Session {
    converter: Box<dyn Converter>,
    form: UnicodeForm,
    direction: Direction,
    codeset: String,
    scratch: Vec<u8>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("codeset", &self.codeset)
            .field("direction", &self.direction)
            .field("form", &self.form)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Open a session converting between `codeset` and `form` in `direction`
    pub fn open(
        backend: &dyn Backend,
        codeset: &str,
        direction: Direction,
        form: UnicodeForm,
    ) -> Result<Self> {
        let converter = match direction {
            Direction::Encode => backend.open(codeset, form.codeset())?,
            Direction::Decode => backend.open(form.codeset(), codeset)?,
        };
        debug!(codeset, %direction, unicode = form.codeset(), "opened conversion session");
        Ok(Self {
            converter,
            form,
            direction,
            codeset: codeset.to_string(),
            scratch: Vec::new(),
        })
    }

    /// Codeset this session is bound to
    pub fn codeset(&self) -> &str {
        &self.codeset
    }

    /// Conversion direction
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Unicode form on the text side
    pub fn form(&self) -> UnicodeForm {
        self.form
    }

    /// Run one raw conversion call with room for `capacity` output bytes.
    ///
    /// Consumed counts are in input bytes.
    pub fn convert(
        &mut self,
        input: &[u8],
        capacity: usize,
    ) -> std::result::Result<Vec<u8>, Interruption<Vec<u8>>> {
        if self.scratch.len() < capacity {
            self.scratch.resize(capacity, 0);
        }
        match self.converter.convert(Some(input), &mut self.scratch[..capacity]) {
            Ok(progress) => Ok(self.scratch[..progress.written].to_vec()),
            Err(Stall {
                read,
                written,
                kind,
                status,
            }) => Err(Interruption {
                kind,
                output: self.scratch[..written].to_vec(),
                consumed: read,
                status,
            }),
        }
    }

    /// Encode `text` in one call with room for `capacity` output bytes.
    ///
    /// Consumed counts are in characters. A character the Unicode form
    /// cannot carry stops the call with [`Interrupt::InvalidSequence`] at its
    /// position.
    pub fn encode(
        &mut self,
        text: &[char],
        capacity: usize,
    ) -> std::result::Result<Vec<u8>, Interruption<Vec<u8>>> {
        debug_assert_eq!(self.direction, Direction::Encode);
        let representable = self.form.representable_prefix(text);
        let mut units = Vec::new();
        self.form.write_units(&text[..representable], &mut units);

        match self.convert(&units, capacity) {
            Ok(output) if representable == text.len() => Ok(output),
            Ok(output) => Err(Interruption {
                kind: Interrupt::InvalidSequence,
                output,
                consumed: representable,
                status: libc::EILSEQ,
            }),
            Err(stall) => Err(self.units_to_chars(stall)),
        }
    }

    /// Decode `bytes` in one call with room for `capacity` code units.
    ///
    /// Consumed counts are in bytes.
    pub fn decode(
        &mut self,
        bytes: &[u8],
        capacity: usize,
    ) -> std::result::Result<String, Interruption<String>> {
        debug_assert_eq!(self.direction, Direction::Decode);
        let form = self.form;
        let to_text = |units: &[u8]| {
            let mut text = String::new();
            form.read_units(units, &mut text);
            text
        };

        match self.convert(bytes, capacity * form.unit_bytes()) {
            Ok(units) => Ok(to_text(&units)),
            Err(stall) => Err(Interruption {
                kind: stall.kind,
                output: to_text(&stall.output),
                consumed: stall.consumed,
                status: stall.status,
            }),
        }
    }

    /// Return the shift state to its initial value and hand back the bytes
    /// that close out the previous state.
    ///
    /// At most `bound` bytes are collected. Any failure leaves the session
    /// unusable and is reported as [`Error::Internal`].
    pub fn reset_state(&mut self, bound: usize) -> Result<Vec<u8>> {
        let mut trailer = vec![0u8; bound];
        match self.converter.convert(None, &mut trailer) {
            Ok(progress) => {
                trailer.truncate(progress.written);
                Ok(trailer)
            }
            Err(stall) => Err(Error::Internal(format!(
                "cannot compute shift-out sequence for {} ({:?}, status {})",
                self.codeset, stall.kind, stall.status
            ))),
        }
    }

    /// Return the shift state to its initial value, dropping any trailer
    pub fn discard_state(&mut self) {
        self.converter.reset();
    }

    /// Rescale an interruption measured in input bytes to characters
    fn units_to_chars(&self, stall: Interruption<Vec<u8>>) -> Interruption<Vec<u8>> {
        let width = self.form.unit_bytes();
        let kind = if stall.consumed % width == 0 {
            stall.kind
        } else {
            // The primitive stopped inside a code unit.
            Interrupt::IncompleteSequence
        };
        Interruption {
            kind,
            output: stall.output,
            consumed: stall.consumed / width,
            status: stall.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{SI, SO, TOY, ToyBackend};
    use crate::unicode::{ByteOrder, UnitWidth};

    fn encoder() -> Session {
        Session::open(&ToyBackend::new(), TOY, Direction::Encode, UnicodeForm::native()).unwrap()
    }

    fn decoder() -> Session {
        Session::open(&ToyBackend::new(), TOY, Direction::Decode, UnicodeForm::native()).unwrap()
    }

    #[test]
    fn test_open_binds_codeset() {
        let session = encoder();
        assert_eq!(session.codeset(), TOY);
        assert_eq!(session.direction(), Direction::Encode);
        assert_eq!(session.form(), UnicodeForm::native());
    }

    #[test]
    fn test_open_unknown_codeset() {
        let err = Session::open(
            &ToyBackend::new(),
            "NOPE",
            Direction::Decode,
            UnicodeForm::native(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::UnsupportedConversion { .. }));
    }

    #[test]
    fn test_encode_complete() {
        let mut session = encoder();
        let out = session.encode(&['h', 'i'], 16).unwrap();
        assert_eq!(out, b"hi");
    }

    #[test]
    fn test_encode_output_too_small_is_prefix() {
        let mut session = encoder();
        let stall = session.encode(&['a', 'b', 'c'], 2).unwrap_err();
        assert_eq!(stall.kind, Interrupt::OutputTooSmall);
        assert_eq!(stall.output, b"ab");
        assert_eq!(stall.consumed, 2);
    }

    #[test]
    fn test_encode_invalid_reports_char_position() {
        let mut session = encoder();
        let stall = session.encode(&['a', 'b', '€', 'c'], 16).unwrap_err();
        assert_eq!(stall.kind, Interrupt::InvalidSequence);
        assert_eq!(stall.output, b"ab");
        assert_eq!(stall.consumed, 2);
        assert_eq!(stall.status, libc::EILSEQ);
    }

    #[test]
    fn test_encode_supplementary_char_in_ucs2() {
        let form = UnicodeForm::new(UnitWidth::Ucs2, ByteOrder::Little);
        let mut session = Session::open(&ToyBackend::new(), TOY, Direction::Encode, form).unwrap();
        let stall = session.encode(&['o', 'k', '🌍'], 16).unwrap_err();
        assert_eq!(stall.kind, Interrupt::InvalidSequence);
        assert_eq!(stall.output, b"ok");
        assert_eq!(stall.consumed, 2);
    }

    #[test]
    fn test_reset_state_emits_shift_in() {
        let mut session = encoder();
        let out = session.encode(&['α'], 16).unwrap();
        assert_eq!(out, [SO, 0x21]);
        assert_eq!(session.reset_state(100).unwrap(), [SI]);
        // Already in the initial state: nothing more to close.
        assert!(session.reset_state(100).unwrap().is_empty());
    }

    #[test]
    fn test_reset_state_without_room_is_internal_error() {
        let mut session = encoder();
        session.encode(&['β'], 16).unwrap();
        let err = session.reset_state(0).unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }

    #[test]
    fn test_discard_state_drops_trailer() {
        let mut session = encoder();
        session.encode(&['γ'], 16).unwrap();
        session.discard_state();
        assert!(session.reset_state(100).unwrap().is_empty());
        // Shift state is back to initial, so the next Greek letter shifts out again.
        assert_eq!(session.encode(&['α'], 16).unwrap(), [SO, 0x21]);
    }

    #[test]
    fn test_decode_incomplete_tail() {
        let mut session = decoder();
        let stall = session.decode(&[b'x', 0x81], 16).unwrap_err();
        assert_eq!(stall.kind, Interrupt::IncompleteSequence);
        assert_eq!(stall.output, "x");
        assert_eq!(stall.consumed, 1);
    }

    #[test]
    fn test_decode_shift_state_persists_between_calls() {
        let mut session = decoder();
        assert_eq!(session.decode(&[SO], 4).unwrap(), "");
        assert_eq!(session.decode(&[0x21, 0x22], 4).unwrap(), "αβ");
        assert_eq!(session.decode(&[SI, b'z'], 4).unwrap(), "z");
    }
}
