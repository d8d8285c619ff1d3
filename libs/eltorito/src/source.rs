// Copyright 2025 Isobar Contributors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Sector-addressable input sources.
//!
//! The whole pipeline reads through a single [`SectorSource`]: logical sector
//! N of a CD-ROM image lives at byte offset N x 2048. Two backends satisfy
//! the same contract, one for ordinary files (and anything else that is
//! `Read + Seek`, such as in-memory buffers) and one for raw block devices
//! on unix. The core pipeline never branches on which backend it was given.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::{Error, Result};

/// Logical sector size of CD-ROM media in bytes.
pub const SECTOR_SIZE: usize = 2048;

/// A source of 2048-byte logical sectors.
pub trait SectorSource {
    /// Reads `buf.len() / SECTOR_SIZE` contiguous sectors starting at
    /// `start_sector` into `buf`.
    ///
    /// `buf.len()` must be a non-zero multiple of [`SECTOR_SIZE`]. Re-reads
    /// of earlier sectors are permitted at any time.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Read`] if the source delivers fewer bytes than
    /// requested for any reason; short reads are never retried.
    fn read_sectors(&mut self, start_sector: u64, buf: &mut [u8]) -> Result<()>;
}

/// Sector source backed by a seekable byte stream.
///
/// Tracks the byte offset at the end of the previous read and skips the seek
/// when a request continues exactly where the last one ended. That is purely
/// an optimization; out-of-order requests reposition and work the same.
pub struct FileSource<R> {
    inner: R,
    /// Byte offset of the end of the previous read.
    pos: u64,
}

impl<R: Read + Seek> FileSource<R> {
    /// Wraps a seekable stream as a sector source.
    pub fn new(inner: R) -> Self {
        Self { inner, pos: 0 }
    }
}

impl FileSource<File> {
    /// Opens an ISO image file for sequential sector reads.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the file cannot be opened.
    pub fn open(path: &Path) -> std::io::Result<Self> {
        Ok(Self::new(File::open(path)?))
    }
}

impl<R: Read + Seek> SectorSource for FileSource<R> {
    fn read_sectors(&mut self, start_sector: u64, buf: &mut [u8]) -> Result<()> {
        debug_assert!(!buf.is_empty() && buf.len() % SECTOR_SIZE == 0);

        let offset = start_sector * SECTOR_SIZE as u64;
        if offset != self.pos {
            self.inner
                .seek(SeekFrom::Start(offset))
                .map_err(Error::Read)?;
        }
        self.inner.read_exact(buf).map_err(Error::Read)?;
        self.pos = offset + buf.len() as u64;

        log::trace!(
            "read {} sector(s) at LBA {start_sector:#x}",
            buf.len() / SECTOR_SIZE
        );
        Ok(())
    }
}

/// Sector source backed by a raw block device.
///
/// Uses positioned reads, so no seek state is kept. The device must present
/// the same 2048-byte logical sector geometry as an image file.
#[cfg(unix)]
pub struct BlockDeviceSource {
    device: File,
}

#[cfg(unix)]
impl BlockDeviceSource {
    /// Opens a block device node (for example `/dev/sr0`) for reading.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the device cannot be opened.
    pub fn open(path: &Path) -> std::io::Result<Self> {
        Ok(Self {
            device: File::open(path)?,
        })
    }
}

#[cfg(unix)]
impl SectorSource for BlockDeviceSource {
    fn read_sectors(&mut self, start_sector: u64, buf: &mut [u8]) -> Result<()> {
        use std::os::unix::fs::FileExt;

        debug_assert!(!buf.is_empty() && buf.len() % SECTOR_SIZE == 0);

        let offset = start_sector * SECTOR_SIZE as u64;
        self.device.read_exact_at(buf, offset).map_err(Error::Read)?;

        log::trace!(
            "read {} sector(s) at LBA {start_sector:#x}",
            buf.len() / SECTOR_SIZE
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn patterned(sectors: usize) -> Vec<u8> {
        (0..sectors * SECTOR_SIZE)
            .map(|i| u8::try_from(i % 251).unwrap())
            .collect()
    }

    #[test]
    fn sequential_reads_skip_repositioning() {
        let data = patterned(4);
        let mut source = FileSource::new(Cursor::new(data.clone()));

        let mut buf = [0u8; SECTOR_SIZE];
        source.read_sectors(0, &mut buf).unwrap();
        assert_eq!(buf[..], data[..SECTOR_SIZE]);

        // Continues at the tracked position without an explicit seek.
        source.read_sectors(1, &mut buf).unwrap();
        assert_eq!(buf[..], data[SECTOR_SIZE..2 * SECTOR_SIZE]);
    }

    #[test]
    fn backward_rereads_return_correct_data() {
        let data = patterned(4);
        let mut source = FileSource::new(Cursor::new(data.clone()));

        let mut buf = [0u8; SECTOR_SIZE];
        source.read_sectors(3, &mut buf).unwrap();
        assert_eq!(buf[..], data[3 * SECTOR_SIZE..]);

        source.read_sectors(1, &mut buf).unwrap();
        assert_eq!(buf[..], data[SECTOR_SIZE..2 * SECTOR_SIZE]);
    }

    #[test]
    fn multi_sector_read() {
        let data = patterned(5);
        let mut source = FileSource::new(Cursor::new(data.clone()));

        let mut buf = vec![0u8; 3 * SECTOR_SIZE];
        source.read_sectors(1, &mut buf).unwrap();
        assert_eq!(buf[..], data[SECTOR_SIZE..4 * SECTOR_SIZE]);
    }

    #[test]
    fn short_read_is_fatal() {
        // One and a half sectors: any full-sector read past sector 0 is short.
        let data = patterned(2)[..SECTOR_SIZE + SECTOR_SIZE / 2].to_vec();
        let mut source = FileSource::new(Cursor::new(data));

        let mut buf = [0u8; SECTOR_SIZE];
        source.read_sectors(0, &mut buf).unwrap();
        assert!(matches!(
            source.read_sectors(1, &mut buf),
            Err(Error::Read(_))
        ));
    }
}
