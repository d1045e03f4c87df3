//! Streaming adapters over [`Read`] and [`Write`]
//!
//! Both adapters own their session and keep its shift state across chunks.
//! The state is reset once, when the adapter is created.

use std::io::{self, Read, Write};

use tracing::debug;

use crate::engine::{Decoder, Encoder};
use crate::{Error, ErrorPolicy, Result};

/// Decodes a byte source into text chunk by chunk.
///
/// A multibyte sequence split across two reads is held back and completed
/// by the next read. Positions in strict-mode errors count bytes from the
/// start of the stream.
#[derive(Debug)]
pub struct DecodingReader<R> {
    inner: R,
    decoder: Decoder,
    policy: ErrorPolicy,
    chunk: Vec<u8>,
    pending: Vec<u8>,
    consumed: usize,
    eof: bool,
    // Decoded text not yet handed out through `io::Read`.
    utf8: Vec<u8>,
    utf8_pos: usize,
}

impl<R: Read> DecodingReader<R> {
    /// Wrap `inner`, reading up to `chunk_size` bytes at a time
    pub fn new(inner: R, mut decoder: Decoder, policy: ErrorPolicy, chunk_size: usize) -> Self {
        decoder.reset();
        debug!(codeset = decoder.codeset(), ?policy, chunk_size, "opened decoding reader");
        Self {
            inner,
            decoder,
            policy,
            chunk: vec![0u8; chunk_size.max(1)],
            pending: Vec::new(),
            consumed: 0,
            eof: false,
            utf8: Vec::new(),
            utf8_pos: 0,
        }
    }

    /// Bytes of the source decoded so far
    pub fn position(&self) -> usize {
        self.consumed
    }

    /// Decode the next chunk of text; `None` once the source is exhausted
    pub fn read_chunk(&mut self) -> Result<Option<String>> {
        loop {
            if self.eof {
                return self.finish_tail();
            }

            let n = match self.inner.read(&mut self.chunk) {
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            if n == 0 {
                self.eof = true;
                continue;
            }

            self.pending.extend_from_slice(&self.chunk[..n]);
            let base = self.consumed;
            let (text, used) = self
                .decoder
                .decode(&self.pending, self.policy)
                .map_err(|e| at_stream_offset(e, base))?;
            self.pending.drain(..used);
            self.consumed += used;

            if !text.is_empty() {
                return Ok(Some(text));
            }
        }
    }

    /// Decode everything left in the source
    pub fn read_text(&mut self) -> Result<String> {
        let mut text = String::new();
        while let Some(chunk) = self.read_chunk()? {
            text.push_str(&chunk);
        }
        Ok(text)
    }

    /// Give back the wrapped source
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Handle bytes still undecoded when the source ends
    fn finish_tail(&mut self) -> Result<Option<String>> {
        if self.pending.is_empty() {
            return Ok(None);
        }
        let position = self.consumed;
        let dangling = std::mem::take(&mut self.pending);
        self.consumed += dangling.len();

        match self.policy {
            ErrorPolicy::Strict => Err(Error::IllegalSequence {
                position,
                status: libc::EINVAL,
            }),
            ErrorPolicy::Replace => Ok(Some(char::REPLACEMENT_CHARACTER.to_string())),
            ErrorPolicy::Ignore => Ok(None),
        }
    }
}

fn at_stream_offset(err: Error, base: usize) -> Error {
    match err {
        Error::IllegalSequence { position, status } => Error::IllegalSequence {
            position: base + position,
            status,
        },
        other => other,
    }
}

impl<R: Read> Read for DecodingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.utf8_pos == self.utf8.len() {
            match self.read_chunk()? {
                Some(text) => {
                    self.utf8 = text.into_bytes();
                    self.utf8_pos = 0;
                }
                None => return Ok(0),
            }
        }
        let available = &self.utf8[self.utf8_pos..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.utf8_pos += n;
        Ok(n)
    }
}

/// Encodes text into a byte sink.
///
/// Each [`write_str`](Self::write_str) is one encode call, so every write
/// ends with the codeset's shift-out trailer. Output stays decodable at any
/// write boundary, but a stateful codeset re-enters its shifted set after
/// every write: under [`io::copy`] that is one shift-out and shift-in pair
/// per copied chunk. Write larger pieces to avoid the overhead.
///
/// Through [`io::Write`] the writer accepts UTF-8 and holds back a sequence
/// split across writes. A failed write leaves neither bytes in the sink nor
/// shift state behind, so writing can resume after it.
#[derive(Debug)]
pub struct EncodingWriter<W: Write> {
    inner: W,
    encoder: Encoder,
    policy: ErrorPolicy,
    started: bool,
    carry: Vec<u8>,
}

impl<W: Write> EncodingWriter<W> {
    /// Wrap `inner`
    pub fn new(inner: W, encoder: Encoder, policy: ErrorPolicy) -> Self {
        debug!(codeset = encoder.codeset(), ?policy, "opened encoding writer");
        Self {
            inner,
            encoder,
            policy,
            started: false,
            carry: Vec::new(),
        }
    }

    /// Encode `text` and write it out; returns the characters consumed
    pub fn write_str(&mut self, text: &str) -> Result<usize> {
        if text.is_empty() {
            return Ok(0);
        }
        let chars: Vec<char> = text.chars().collect();
        let encoded = self
            .encoder
            .encode_chars(&chars, self.policy, !self.started, None);
        let (bytes, consumed) = match encoded {
            Ok(done) => done,
            Err(e) => {
                // Nothing reached the sink, so the shift state the failed
                // call left behind must not leak into the next write.
                self.started = false;
                return Err(e);
            }
        };
        self.started = true;
        self.inner.write_all(&bytes)?;
        Ok(consumed)
    }

    /// Borrow the wrapped sink
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Flush and give back the wrapped sink.
    ///
    /// Fails if a UTF-8 sequence written through [`io::Write`] was left
    /// incomplete.
    pub fn finish(mut self) -> Result<W> {
        if !self.carry.is_empty() {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{} bytes of incomplete UTF-8 at end of input", self.carry.len()),
            )));
        }
        self.inner.flush()?;
        Ok(self.inner)
    }
}

impl<W: Write> Write for EncodingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let held = self.carry.len();
        self.carry.extend_from_slice(buf);

        let valid = match std::str::from_utf8(&self.carry) {
            Ok(_) => self.carry.len(),
            // Incomplete sequence at the end: keep it for the next write.
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(e) => {
                self.carry.truncate(held);
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("invalid UTF-8 at byte {}", e.valid_up_to()),
                ));
            }
        };

        let text = match std::str::from_utf8(&self.carry[..valid]) {
            Ok(text) => text.to_string(),
            Err(e) => {
                self.carry.truncate(held);
                return Err(io::Error::new(io::ErrorKind::InvalidData, e));
            }
        };
        if let Err(e) = self.write_str(&text) {
            // The caller still owns `buf`; keep only what was held before.
            self.carry.truncate(held);
            return Err(e.into());
        }
        self.carry.drain(..valid);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
