//! Transcoding engine: drives a session until a whole buffer is converted
//!
//! Both directions are loops over an input cursor with an accumulating
//! output buffer. Each pass hands the unconsumed suffix to the session and
//! then decides, from the interruption kind and the error policy, whether to
//! retry with more room, skip a unit, substitute, stop, or fail.

use tracing::{trace, warn};

use crate::backend::{Backend, Interrupt};
use crate::config::TranscoderConfig;
use crate::session::{Direction, Session};
use crate::{Error, ErrorPolicy, Result};

/// Unicode text to codeset bytes
#[derive(Debug)]
pub struct Encoder {
    session: Session,
    output_headroom: usize,
    trailer_capacity: usize,
    substitutes: Vec<char>,
}

impl Encoder {
    /// Open an encoder for `codeset`
    pub fn open(backend: &dyn Backend, codeset: &str, config: &TranscoderConfig) -> Result<Self> {
        config.validate()?;
        let session = Session::open(backend, codeset, Direction::Encode, config.unicode)?;
        Ok(Self {
            session,
            output_headroom: config.output_headroom,
            trailer_capacity: config.trailer_capacity,
            substitutes: config.substitutes.clone(),
        })
    }

    /// Codeset this encoder produces
    pub fn codeset(&self) -> &str {
        self.session.codeset()
    }

    /// Encode `text` from a fresh shift state.
    ///
    /// Returns the bytes, trailer included, and the number of characters
    /// consumed.
    pub fn encode(&mut self, text: &str, policy: ErrorPolicy) -> Result<(Vec<u8>, usize)> {
        let chars: Vec<char> = text.chars().collect();
        self.encode_chars(&chars, policy, true, None)
    }

    /// Encode `text` with full control over the call.
    ///
    /// With `reset_first` the shift state is reset before converting and any
    /// trailer that reset would produce is dropped. `output_hint` is the
    /// initial output buffer size in bytes; `None` starts from the size of
    /// the text in its Unicode form. On success the shift state is closed
    /// out and its trailer appended.
    pub fn encode_chars(
        &mut self,
        text: &[char],
        policy: ErrorPolicy,
        reset_first: bool,
        output_hint: Option<usize>,
    ) -> Result<(Vec<u8>, usize)> {
        if reset_first {
            self.session.discard_state();
        }

        let mut output = Vec::new();
        let consumed = self.encode_body(text, policy, output_hint, &mut output)?;

        let trailer = self.session.reset_state(self.trailer_capacity)?;
        output.extend_from_slice(&trailer);
        Ok((output, consumed))
    }

    fn encode_body(
        &mut self,
        text: &[char],
        policy: ErrorPolicy,
        output_hint: Option<usize>,
        output: &mut Vec<u8>,
    ) -> Result<usize> {
        let form = self.session.form();
        let width = form.unit_bytes();
        let default_capacity = |remaining: usize| output_hint.unwrap_or(remaining * width);

        let mut cursor = 0;
        let mut capacity = default_capacity(text.len());
        let mut units = Vec::new();

        while cursor < text.len() {
            // Serialize the run the Unicode form can carry once, then walk
            // through it by byte offset.
            let run_start = cursor;
            let run_end = run_start + form.representable_prefix(&text[run_start..]);
            units.clear();
            form.write_units(&text[run_start..run_end], &mut units);

            let mut offset = 0;
            while offset < units.len() {
                let stall = match self.session.convert(&units[offset..], capacity) {
                    Ok(bytes) => {
                        output.extend_from_slice(&bytes);
                        break;
                    }
                    Err(stall) => stall,
                };
                output.extend_from_slice(&stall.output);
                offset += stall.consumed;

                match stall.kind {
                    Interrupt::OutputTooSmall => {
                        capacity += self.output_headroom;
                        trace!(
                            codeset = self.session.codeset(),
                            offset, capacity, "encode output full, retrying with more room"
                        );
                    }
                    Interrupt::InvalidSequence if offset % width == 0 && offset < units.len() => {
                        let position = run_start + offset / width;
                        self.recover(text, position, stall.status, policy, output)?;
                        offset += width;
                        capacity = default_capacity(text.len() - position - 1);
                    }
                    Interrupt::InvalidSequence | Interrupt::IncompleteSequence => {
                        return Err(Error::Internal(format!(
                            "{:?} while encoding to {} at byte {offset} of a {}-byte run",
                            stall.kind,
                            self.session.codeset(),
                            units.len()
                        )));
                    }
                    Interrupt::Failed => return Err(Error::Backend { status: stall.status }),
                }
            }

            cursor = run_end;
            if cursor < text.len() {
                // The Unicode form itself cannot carry this character.
                self.recover(text, cursor, libc::EILSEQ, policy, output)?;
                cursor += 1;
                capacity = default_capacity(text.len() - cursor);
            }
        }

        Ok(cursor)
    }

    /// Apply `policy` to the unmappable character at `position`
    fn recover(
        &mut self,
        text: &[char],
        position: usize,
        status: i32,
        policy: ErrorPolicy,
        output: &mut Vec<u8>,
    ) -> Result<()> {
        let character = text[position];
        match policy {
            ErrorPolicy::Strict => Err(Error::Unrepresentable {
                character,
                position,
                status,
            }),
            ErrorPolicy::Replace => {
                trace!(position, ?character, "substituting unmappable character");
                self.substitute(output)
            }
            ErrorPolicy::Ignore => {
                trace!(position, ?character, "skipping unmappable character");
                Ok(())
            }
        }
    }

    /// Emit the first configured substitute the codeset can represent
    fn substitute(&mut self, output: &mut Vec<u8>) -> Result<()> {
        for i in 0..self.substitutes.len() {
            let candidate = self.substitutes[i];
            if self.encode_substitute(candidate, output)? {
                return Ok(());
            }
        }
        warn!(
            codeset = self.session.codeset(),
            "no substitute character is representable, dropping unmappable character"
        );
        Ok(())
    }

    /// Encode one substitute, growing the output until it fits.
    ///
    /// Returns `false` if the codeset cannot represent `candidate`. Bytes
    /// emitted before a stop (a shift sequence, say) are kept since the
    /// session state already reflects them.
    fn encode_substitute(&mut self, candidate: char, output: &mut Vec<u8>) -> Result<bool> {
        let mut capacity = self.output_headroom;
        loop {
            let stall = match self.session.encode(&[candidate], capacity) {
                Ok(bytes) => {
                    output.extend_from_slice(&bytes);
                    return Ok(true);
                }
                Err(stall) => stall,
            };
            output.extend_from_slice(&stall.output);

            match stall.kind {
                Interrupt::OutputTooSmall if stall.consumed == 0 => {
                    capacity += self.output_headroom;
                    trace!(?candidate, capacity, "substitute output full, retrying with more room");
                }
                Interrupt::OutputTooSmall => return Ok(true),
                Interrupt::InvalidSequence => return Ok(false),
                Interrupt::IncompleteSequence | Interrupt::Failed => {
                    return Err(Error::Internal(format!(
                        "cannot encode substitute {candidate:?} to {} ({:?}, status {})",
                        self.session.codeset(),
                        stall.kind,
                        stall.status
                    )));
                }
            }
        }
    }
}

/// Codeset bytes to Unicode text
#[derive(Debug)]
pub struct Decoder {
    session: Session,
    output_headroom: usize,
}

impl Decoder {
    /// Open a decoder for `codeset`
    pub fn open(backend: &dyn Backend, codeset: &str, config: &TranscoderConfig) -> Result<Self> {
        config.validate()?;
        let session = Session::open(backend, codeset, Direction::Decode, config.unicode)?;
        Ok(Self {
            session,
            output_headroom: config.output_headroom,
        })
    }

    /// Codeset this decoder reads
    pub fn codeset(&self) -> &str {
        self.session.codeset()
    }

    /// Return the shift state to its initial value
    pub fn reset(&mut self) {
        self.session.discard_state();
    }

    /// Decode as much of `bytes` as forms complete sequences.
    ///
    /// Returns the text and the number of bytes consumed. A trailing partial
    /// sequence is left unconsumed so it can be retried with more input;
    /// shift state carries over to the next call.
    pub fn decode(&mut self, bytes: &[u8], policy: ErrorPolicy) -> Result<(String, usize)> {
        let mut text = String::new();
        let mut cursor = 0;
        let mut capacity = bytes.len();

        while cursor < bytes.len() {
            let stall = match self.session.decode(&bytes[cursor..], capacity) {
                Ok(chunk) => {
                    text.push_str(&chunk);
                    return Ok((text, bytes.len()));
                }
                Err(stall) => stall,
            };

            text.push_str(&stall.output);
            let position = cursor + stall.consumed;

            match stall.kind {
                Interrupt::OutputTooSmall => {
                    if stall.consumed == 0 && stall.output.is_empty() {
                        capacity += self.output_headroom;
                    } else {
                        capacity = bytes.len() - position;
                    }
                    trace!(
                        codeset = self.session.codeset(),
                        position, capacity, "decode output full, retrying"
                    );
                    cursor = position;
                }
                Interrupt::IncompleteSequence => {
                    trace!(
                        codeset = self.session.codeset(),
                        position,
                        pending = bytes.len() - position,
                        "incomplete sequence at end of input"
                    );
                    return Ok((text, position));
                }
                Interrupt::InvalidSequence => {
                    match policy {
                        ErrorPolicy::Strict => {
                            return Err(Error::IllegalSequence {
                                position,
                                status: stall.status,
                            });
                        }
                        ErrorPolicy::Replace => text.push(char::REPLACEMENT_CHARACTER),
                        ErrorPolicy::Ignore => {}
                    }
                    trace!(position, ?policy, "resynchronizing one byte past invalid input");
                    cursor = position + 1;
                    capacity = bytes.len() - cursor;
                }
                Interrupt::Failed => return Err(Error::Backend { status: stall.status }),
            }
        }

        Ok((text, cursor))
    }
}
