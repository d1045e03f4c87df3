//! Conversion primitive backed by the C library's iconv

use std::ffi::CString;
use std::io;
use std::ptr;

use libc::{c_char, iconv_t};
use tracing::debug;

use crate::backend::{Backend, Converter, Interrupt, Progress, Stall};
use crate::{Error, Result};

/// The system iconv implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct Iconv;

impl Backend for Iconv {
    fn open(&self, to: &str, from: &str) -> Result<Box<dyn Converter>> {
        Ok(Box::new(IconvConverter::open(to, from)?))
    }
}

/// An open iconv descriptor, closed on drop
#[derive(Debug)]
pub struct IconvConverter {
    handle: iconv_t,
}

// The descriptor is owned exclusively and only touched through `&mut self`.
unsafe impl Send for IconvConverter {}

impl IconvConverter {
    /// Open a descriptor converting from `from` to `to`
    pub fn open(to: &str, from: &str) -> Result<Self> {
        let to_c = codeset_name(to)?;
        let from_c = codeset_name(from)?;

        // SAFETY: both names are valid NUL-terminated strings.
        let handle = unsafe { libc::iconv_open(to_c.as_ptr(), from_c.as_ptr()) };
        if handle as usize == usize::MAX {
            return Err(Error::UnsupportedConversion {
                from: from.to_string(),
                to: to.to_string(),
                status: last_errno(),
            });
        }

        debug!(from, to, "opened iconv descriptor");
        Ok(Self { handle })
    }
}

impl Converter for IconvConverter {
    fn convert(
        &mut self,
        input: Option<&[u8]>,
        output: &mut [u8],
    ) -> std::result::Result<Progress, Stall> {
        let mut out_ptr = output.as_mut_ptr() as *mut c_char;
        let mut out_left = output.len();

        let (rc, read) = match input {
            Some(input) => {
                let mut in_ptr = input.as_ptr() as *mut c_char;
                let mut in_left = input.len();
                // SAFETY: the pointers and lengths describe live slices; iconv
                // only reads through `in_ptr` and writes within `out_left`.
                let rc = unsafe {
                    libc::iconv(
                        self.handle,
                        &mut in_ptr,
                        &mut in_left,
                        &mut out_ptr,
                        &mut out_left,
                    )
                };
                (rc, input.len() - in_left)
            }
            None => {
                // SAFETY: a null input buffer requests the shift-out sequence.
                let rc = unsafe {
                    libc::iconv(
                        self.handle,
                        ptr::null_mut(),
                        ptr::null_mut(),
                        &mut out_ptr,
                        &mut out_left,
                    )
                };
                (rc, 0)
            }
        };
        let written = output.len() - out_left;

        if rc == usize::MAX {
            let status = last_errno();
            let kind = match status {
                libc::E2BIG => Interrupt::OutputTooSmall,
                libc::EINVAL => Interrupt::IncompleteSequence,
                libc::EILSEQ => Interrupt::InvalidSequence,
                _ => Interrupt::Failed,
            };
            return Err(Stall {
                read,
                written,
                kind,
                status,
            });
        }

        Ok(Progress { read, written })
    }

    fn reset(&mut self) {
        // SAFETY: all-null arguments only reset the descriptor's shift state.
        unsafe {
            libc::iconv(
                self.handle,
                ptr::null_mut(),
                ptr::null_mut(),
                ptr::null_mut(),
                ptr::null_mut(),
            );
        }
    }
}

impl Drop for IconvConverter {
    fn drop(&mut self) {
        // SAFETY: the handle came from a successful iconv_open and is closed once.
        unsafe {
            libc::iconv_close(self.handle);
        }
    }
}

fn codeset_name(name: &str) -> Result<CString> {
    CString::new(name).map_err(|_| {
        Error::InvalidConfiguration(format!("codeset name {:?} contains a NUL byte", name))
    })
}

fn last_errno() -> i32 {
    io::Error::last_os_error().raw_os_error().unwrap_or(0)
}
