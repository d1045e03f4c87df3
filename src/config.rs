//! Transcoder configuration
//!
//! Everything here is resolved once, typically at process startup, and then
//! passed by reference to [`lookup`](crate::lookup) and the session factories.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::unicode::UnicodeForm;
use crate::{Error, Result};

/// Tuning knobs shared by every codec opened from a configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscoderConfig {
    /// Fixed-width Unicode form used on the text side.
    ///
    /// Default: [`UnicodeForm::native`]
    pub unicode: UnicodeForm,

    /// Extra output room, in bytes, added each time an encode call runs out
    /// of output space.
    ///
    /// Default: 100
    pub output_headroom: usize,

    /// Output bound, in bytes, for the call that emits the shift-out trailer.
    ///
    /// Default: 100
    pub trailer_capacity: usize,

    /// Bytes pulled from the source per read by
    /// [`DecodingReader`](crate::DecodingReader).
    ///
    /// Default: 8KB
    pub read_chunk_size: usize,

    /// Characters tried in order when the replace policy substitutes an
    /// unmappable character; the first one the codeset can represent wins.
    ///
    /// Default: `U+FFFD`, then `?`
    pub substitutes: Vec<char>,
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            unicode: UnicodeForm::native(),
            output_headroom: 100,
            trailer_capacity: 100,
            read_chunk_size: 8 * 1024,
            substitutes: vec![char::REPLACEMENT_CHARACTER, '?'],
        }
    }
}

impl TranscoderConfig {
    /// Parse a configuration from JSON; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| Error::InvalidConfiguration(format!("malformed configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON configuration file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&json)
    }

    /// Check the sizes and substitute list are usable
    pub fn validate(&self) -> Result<()> {
        let zero = [
            ("output_headroom", self.output_headroom),
            ("trailer_capacity", self.trailer_capacity),
            ("read_chunk_size", self.read_chunk_size),
        ]
        .into_iter()
        .find(|(_, value)| *value == 0);

        if let Some((name, _)) = zero {
            return Err(Error::InvalidConfiguration(format!(
                "{name} must be greater than zero"
            )));
        }
        if self.substitutes.is_empty() {
            return Err(Error::InvalidConfiguration(
                "substitutes must name at least one character".to_string(),
            ));
        }
        if let Some(ch) = self
            .substitutes
            .iter()
            .find(|&&ch| !self.unicode.can_represent(ch))
        {
            return Err(Error::InvalidConfiguration(format!(
                "substitute {ch:?} does not fit in {}",
                self.unicode.codeset()
            )));
        }
        Ok(())
    }
}
