// Copyright 2025 Isobar Contributors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Streaming the resolved payload out to a sink.

use std::io::Write;

use crate::error::{Error, Result};
use crate::resolve::ResolvedImage;
use crate::source::{SECTOR_SIZE, SectorSource};

/// Default upper bound on sectors transferred per read.
///
/// Bounds peak memory during extraction; it is not a correctness parameter.
pub const DEFAULT_MAX_BATCH: usize = 32;

/// Copies exactly [`ResolvedImage::total_bytes`] bytes starting at the
/// image's start sector into `sink`.
///
/// Reads whole sectors in batches of at most `max_batch` (at least one
/// sector per read even when fewer bytes remain) and writes only the
/// meaningful prefix of the final batch, so trailing sector padding never
/// reaches the sink. Returns the number of bytes written.
///
/// A failed extraction may leave a truncated output file behind; no cleanup
/// is attempted.
///
/// # Errors
///
/// Returns [`Error::Read`] on any short sector read and [`Error::Write`] on
/// any failed or short write. Nothing further is transferred after either.
///
/// # Panics
///
/// Panics if `max_batch` is zero.
pub fn extract<S, W>(
    source: &mut S,
    image: &ResolvedImage,
    sink: &mut W,
    max_batch: usize,
) -> Result<u64>
where
    S: SectorSource + ?Sized,
    W: Write,
{
    assert!(max_batch >= 1, "max_batch must be at least 1 sector");

    let mut buf = vec![0u8; max_batch * SECTOR_SIZE];
    let mut lba = u64::from(image.start_lba);
    let mut remaining = image.total_bytes;
    let mut written = 0u64;

    while remaining > 0 {
        // Whole sectors still needed; anything that overflows usize is
        // beyond the batch bound anyway.
        let sectors = usize::try_from(remaining.div_ceil(SECTOR_SIZE as u64))
            .map_or(max_batch, |whole| whole.min(max_batch));
        let chunk = &mut buf[..sectors * SECTOR_SIZE];
        source.read_sectors(lba, chunk)?;

        let len = usize::try_from(remaining).map_or(chunk.len(), |rest| rest.min(chunk.len()));
        sink.write_all(&chunk[..len]).map_err(Error::Write)?;

        lba += sectors as u64;
        remaining -= len as u64;
        written += len as u64;
    }

    sink.flush().map_err(Error::Write)?;
    log::debug!("extracted {written} bytes");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::FileSource;
    use proptest::prelude::*;
    use std::io::Cursor;

    fn image(start_lba: u32, block_size: u32, sector_count: u64) -> ResolvedImage {
        ResolvedImage {
            start_lba,
            block_size,
            sector_count,
            total_bytes: sector_count * u64::from(block_size),
        }
    }

    /// Backing data large enough for whole-sector reads over the payload.
    fn backing(image: &ResolvedImage) -> Vec<u8> {
        let sectors = u64::from(image.start_lba) + image.total_bytes.div_ceil(SECTOR_SIZE as u64);
        (0..sectors * SECTOR_SIZE as u64)
            .map(|i| u8::try_from(i % 251).unwrap())
            .collect()
    }

    #[test]
    fn extracts_exact_byte_range() {
        let image = image(2, 512, 5); // 2560 bytes, not sector aligned
        let data = backing(&image);
        let mut source = FileSource::new(Cursor::new(data.clone()));

        let mut out = Vec::new();
        let written = extract(&mut source, &image, &mut out, DEFAULT_MAX_BATCH).unwrap();
        assert_eq!(written, 2560);
        let start = 2 * SECTOR_SIZE;
        assert_eq!(out[..], data[start..start + 2560]);
    }

    #[test]
    fn trailing_padding_is_discarded() {
        // One byte payload still requires a full sector read.
        let image = ResolvedImage {
            start_lba: 0,
            block_size: 1,
            sector_count: 1,
            total_bytes: 1,
        };
        let data = vec![0xA5u8; SECTOR_SIZE];
        let mut source = FileSource::new(Cursor::new(data));

        let mut out = Vec::new();
        assert_eq!(extract(&mut source, &image, &mut out, 4).unwrap(), 1);
        assert_eq!(out, [0xA5]);
    }

    #[test]
    fn extraction_is_idempotent() {
        let image = image(1, 512, 100);
        let data = backing(&image);

        let mut first = Vec::new();
        let mut second = Vec::new();
        let mut source = FileSource::new(Cursor::new(data.clone()));
        extract(&mut source, &image, &mut first, 8).unwrap();
        let mut source = FileSource::new(Cursor::new(data));
        extract(&mut source, &image, &mut second, 8).unwrap();

        assert_eq!(first.len() as u64, image.total_bytes);
        assert_eq!(first, second);
    }

    #[test]
    fn truncated_source_writes_nothing_further() {
        // Payload claims 8 sectors but the source only holds 2.
        let image = image(0, 2048, 8);
        let data = vec![0u8; 2 * SECTOR_SIZE];
        let mut source = FileSource::new(Cursor::new(data));

        let mut out = Vec::new();
        let err = extract(&mut source, &image, &mut out, 2).unwrap_err();
        assert!(matches!(err, Error::Read(_)));
        // Only the batch read before the failure made it out.
        assert_eq!(out.len(), 2 * SECTOR_SIZE);
    }

    proptest! {
        #[test]
        fn output_length_always_matches(
            sector_count in 1u64..512,
            block_size in prop::sample::select(vec![512u32, 1024, 2048]),
            max_batch in 1usize..48,
        ) {
            let image = image(0, block_size, sector_count);
            let data = backing(&image);
            let mut source = FileSource::new(Cursor::new(data.clone()));

            let mut out = Vec::new();
            let written = extract(&mut source, &image, &mut out, max_batch).unwrap();
            prop_assert_eq!(written, image.total_bytes);
            prop_assert_eq!(out.len() as u64, image.total_bytes);
            prop_assert_eq!(&out[..], &data[..out.len()]);
        }
    }
}
