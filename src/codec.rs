//! Binding a codeset to encoders, decoders and stream adapters
//!
//! [`lookup`] checks that the platform can convert the codeset both ways and
//! returns a [`CodecInfo`], the factory every other handle comes from.

use std::fmt;
use std::io::{Read, Write};
use std::sync::Arc;

use tracing::debug;

use crate::backend::Backend;
use crate::config::TranscoderConfig;
use crate::engine::{Decoder, Encoder};
use crate::stream::{DecodingReader, EncodingWriter};
use crate::{ErrorPolicy, Result};

/// Find the codec for `codeset` using the system iconv
#[cfg(target_os = "linux")]
pub fn lookup(codeset: &str, config: &TranscoderConfig) -> Result<CodecInfo> {
    CodecInfo::with_backend(Arc::new(crate::iconv::Iconv), codeset, config)
}

/// A codeset bound to a backend and configuration
#[derive(Clone)]
pub struct CodecInfo {
    backend: Arc<dyn Backend>,
    codeset: String,
    config: TranscoderConfig,
}

impl fmt::Debug for CodecInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodecInfo")
            .field("codeset", &self.codeset)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl CodecInfo {
    /// Bind `codeset` to `backend`.
    ///
    /// Both directions are opened once up front so an unknown codeset fails
    /// here rather than on first use.
    pub fn with_backend(
        backend: Arc<dyn Backend>,
        codeset: &str,
        config: &TranscoderConfig,
    ) -> Result<Self> {
        let info = Self {
            backend,
            codeset: codeset.to_string(),
            config: config.clone(),
        };
        info.codec()?;
        debug!(codeset, "codec available");
        Ok(info)
    }

    /// Codeset name
    pub fn codeset(&self) -> &str {
        &self.codeset
    }

    /// Configuration every handle is opened with
    pub fn config(&self) -> &TranscoderConfig {
        &self.config
    }

    /// Open a new encoder
    pub fn encoder(&self) -> Result<Encoder> {
        Encoder::open(self.backend.as_ref(), &self.codeset, &self.config)
    }

    /// Open a new decoder
    pub fn decoder(&self) -> Result<Decoder> {
        Decoder::open(self.backend.as_ref(), &self.codeset, &self.config)
    }

    /// Open an encoder and decoder pair
    pub fn codec(&self) -> Result<Codec> {
        Ok(Codec {
            encoder: self.encoder()?,
            decoder: self.decoder()?,
        })
    }

    /// Wrap a byte source in a decoding reader with its own session
    pub fn reader<R: Read>(&self, inner: R, policy: ErrorPolicy) -> Result<DecodingReader<R>> {
        Ok(DecodingReader::new(
            inner,
            self.decoder()?,
            policy,
            self.config.read_chunk_size,
        ))
    }

    /// Wrap a byte sink in an encoding writer with its own session
    pub fn writer<W: Write>(&self, inner: W, policy: ErrorPolicy) -> Result<EncodingWriter<W>> {
        Ok(EncodingWriter::new(inner, self.encoder()?, policy))
    }
}

/// An encoder and decoder for the same codeset
#[derive(Debug)]
pub struct Codec {
    encoder: Encoder,
    decoder: Decoder,
}

impl Codec {
    /// Codeset name
    pub fn codeset(&self) -> &str {
        self.encoder.codeset()
    }

    /// See [`Encoder::encode`]
    pub fn encode(&mut self, text: &str, policy: ErrorPolicy) -> Result<(Vec<u8>, usize)> {
        self.encoder.encode(text, policy)
    }

    /// See [`Encoder::encode_chars`]
    pub fn encode_chars(
        &mut self,
        text: &[char],
        policy: ErrorPolicy,
        reset_first: bool,
        output_hint: Option<usize>,
    ) -> Result<(Vec<u8>, usize)> {
        self.encoder
            .encode_chars(text, policy, reset_first, output_hint)
    }

    /// See [`Decoder::decode`]
    pub fn decode(&mut self, bytes: &[u8], policy: ErrorPolicy) -> Result<(String, usize)> {
        self.decoder.decode(bytes, policy)
    }

    /// Split into the encoder and decoder halves
    pub fn into_parts(self) -> (Encoder, Decoder) {
        (self.encoder, self.decoder)
    }
}
