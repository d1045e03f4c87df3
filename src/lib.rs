//! # iconv-codec - Stateful Transcoding on top of iconv
//!
//! Converts between Unicode text and any codeset the platform's iconv knows,
//! including stateful encodings such as ISO-2022-JP that switch character
//! sets with escape sequences.
//!
//! ## Features
//!
//! - **Encoder and decoder sessions** that keep shift state between calls
//! - **Error policies** (`strict`, `replace`, `ignore`) chosen per call
//! - **Exact positions** for unmappable characters and illegal byte sequences
//! - **Streaming adapters** over `std::io::Read` and `std::io::Write`
//! - **Pluggable backend**, with the system iconv used by default on Linux
//!
//! ## Quick Start
//!
//! ```rust
//! # #[cfg(target_os = "linux")]
//! # fn main() -> iconv_codec::Result<()> {
//! use iconv_codec::{ErrorPolicy, TranscoderConfig, lookup};
//!
//! let info = lookup("ISO-8859-1", &TranscoderConfig::default())?;
//! let mut codec = info.codec()?;
//!
//! let (bytes, consumed) = codec.encode("café", ErrorPolicy::Strict)?;
//! assert_eq!(bytes, b"caf\xE9");
//! assert_eq!(consumed, 4);
//!
//! let (text, _) = codec.decode(&bytes, ErrorPolicy::Strict)?;
//! assert_eq!(text, "café");
//! # Ok(())
//! # }
//! # #[cfg(not(target_os = "linux"))]
//! # fn main() {}
//! ```

#![deny(missing_docs)]

use std::fmt;
use std::io;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub mod backend;
pub mod codec;
pub mod config;
pub mod engine;
#[cfg(target_os = "linux")]
pub mod iconv;
pub mod session;
pub mod stream;
pub mod unicode;

#[cfg(test)]
mod testing;

pub use codec::{Codec, CodecInfo};
#[cfg(target_os = "linux")]
pub use codec::lookup;
pub use config::TranscoderConfig;
pub use engine::{Decoder, Encoder};
pub use stream::{DecodingReader, EncodingWriter};
pub use unicode::{ByteOrder, UnicodeForm, UnitWidth};

/// Result type for transcoding operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while transcoding
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Character cannot be encoded in the target codeset
    #[error("cannot encode {character:?} at position {position} (status {status})")]
    Unrepresentable {
        /// The unmappable character
        character: char,
        /// Position of the character in the input, in characters
        position: usize,
        /// Status reported by the primitive
        status: i32,
    },
    /// Input bytes are not a valid sequence in the source codeset
    #[error("illegal byte sequence at position {position} (status {status})")]
    IllegalSequence {
        /// Position of the first offending byte
        position: usize,
        /// Status reported by the primitive
        status: i32,
    },
    /// Configuration or argument rejected before any conversion
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    /// An internal invariant was violated; the operation was aborted
    #[error("internal error: {0}")]
    Internal(String),
    /// The primitive cannot convert between the two codesets
    #[error("unsupported conversion from {from} to {to} (status {status})")]
    UnsupportedConversion {
        /// Source codeset name
        from: String,
        /// Target codeset name
        to: String,
        /// Status reported when opening
        status: i32,
    },
    /// The primitive failed with an unexpected status
    #[error("conversion failed with status {status}")]
    Backend {
        /// Status reported by the primitive
        status: i32,
    },
    /// Reading or writing a stream failed
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(e) => e,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}

/// What to do with a character or byte sequence that cannot be converted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Fail with the position of the offending input
    #[default]
    Strict,
    /// Emit a substitute and carry on
    Replace,
    /// Skip the offending input and carry on
    Ignore,
}

impl ErrorPolicy {
    /// Policy name as accepted by [`FromStr`]
    pub fn name(self) -> &'static str {
        match self {
            ErrorPolicy::Strict => "strict",
            ErrorPolicy::Replace => "replace",
            ErrorPolicy::Ignore => "ignore",
        }
    }
}

impl fmt::Display for ErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ErrorPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "strict" => Ok(ErrorPolicy::Strict),
            "replace" => Ok(ErrorPolicy::Replace),
            "ignore" => Ok(ErrorPolicy::Ignore),
            other => Err(Error::InvalidConfiguration(format!(
                "unknown error policy {other:?} (expected strict, replace or ignore)"
            ))),
        }
    }
}
