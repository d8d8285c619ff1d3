// Copyright 2025 Isobar Contributors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Error types for boot catalog inspection and extraction.

use core::fmt;
use std::io;

/// Errors that can occur while inspecting or extracting a boot image.
///
/// Every variant is terminal for the current run. Sector I/O is assumed
/// atomic at sector granularity, so a short read or write is never retried.
#[derive(Debug)]
pub enum Error {
    /// The volume descriptor at sector 0x11 does not carry the El Torito
    /// signature. No other boot-record formats are recognized.
    NotElTorito,
    /// The boot catalog's key bytes at offsets 0x1E-0x1F are not 0x55, 0xAA.
    InvalidCatalog,
    /// A sector read returned fewer bytes than requested, or failed outright.
    Read(io::Error),
    /// A write to the output sink came up short or failed outright.
    Write(io::Error),
    /// The output destination could not be created for writing.
    SinkCreate(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotElTorito => {
                write!(f, "volume descriptor does not carry the El Torito signature")
            }
            Error::InvalidCatalog => {
                write!(f, "boot catalog key bytes are invalid")
            }
            Error::Read(err) => {
                write!(f, "sector read failed: {err}")
            }
            Error::Write(err) => {
                write!(f, "write to output failed: {err}")
            }
            Error::SinkCreate(err) => {
                write!(f, "cannot create output file: {err}")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::NotElTorito | Error::InvalidCatalog => None,
            Error::Read(err) | Error::Write(err) | Error::SinkCreate(err) => Some(err),
        }
    }
}

/// Result type for boot catalog operations.
pub type Result<T> = core::result::Result<T, Error>;
