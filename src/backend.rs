//! The conversion primitive as seen by sessions
//!
//! A [`Backend`] opens directional converters between two codesets and a
//! [`Converter`] performs one raw call at a time, iconv style: it consumes as
//! much input as it can, writes as much output as fits, and reports why it
//! stopped. [`crate::iconv::Iconv`] is the operating-system implementation.

use crate::Result;

/// Why a raw conversion call stopped before consuming all of its input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interrupt {
    /// The output buffer filled up; what was produced is a valid prefix
    OutputTooSmall,
    /// The input ends in the middle of a multi-unit sequence
    IncompleteSequence,
    /// The unit at the stop position cannot be converted
    InvalidSequence,
    /// Any other status reported by the primitive
    Failed,
}

/// Counters for a raw call that ran to completion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    /// Input bytes consumed
    pub read: usize,
    /// Output bytes written
    pub written: usize,
}

/// Counters and cause for a raw call that stopped early
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stall {
    /// Input bytes consumed before stopping
    pub read: usize,
    /// Output bytes written before stopping
    pub written: usize,
    /// Classified cause
    pub kind: Interrupt,
    /// Status code reported by the primitive (an errno value for iconv)
    pub status: i32,
}

/// One open, directional conversion context.
///
/// The context carries shift state between calls. It is not meant to be
/// shared between threads concurrently.
pub trait Converter: Send {
    /// Convert `input` into `output`.
    ///
    /// `None` as input asks the converter to write the sequence returning its
    /// shift state to the initial state, then reset.
    fn convert(
        &mut self,
        input: Option<&[u8]>,
        output: &mut [u8],
    ) -> std::result::Result<Progress, Stall>;

    /// Return to the initial shift state without emitting anything.
    fn reset(&mut self);
}

/// Factory for converters
pub trait Backend: Send + Sync {
    /// Open a converter from codeset `from` to codeset `to`
    fn open(&self, to: &str, from: &str) -> Result<Box<dyn Converter>>;
}
