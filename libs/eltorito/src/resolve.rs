// Copyright 2025 Isobar Contributors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Boot image size resolution.
//!
//! The catalog's declared sector count is authoritative only for
//! no-emulation images. For every emulated media type the true size lives
//! inside the boot image itself, so the resolver reads the image's first
//! sector and interprets it according to the emulation type: as the
//! partition table of a simulated MBR for hard-disk images, or as a
//! filesystem boot sector with a BIOS Parameter Block for floppy images
//! (and for the drive contents after the MBR of a hard-disk image has been
//! stripped off).
//!
//! The probe sector's contents are not validated beyond field extraction; a
//! non-floppy, non-partitioned image yields a plausible-looking but
//! meaningless size, because the catalog already committed to the emulation
//! type.

use crate::catalog::{CatalogEntry, MediaType, u16_at, u32_at};
use crate::error::Result;
use crate::source::{SECTOR_SIZE, SectorSource};

/// Virtual sector size of emulated BIOS media in bytes.
const VIRTUAL_SECTOR_SIZE: u32 = 512;

/// MBR probe: partition start in 512-byte units, u32 at 0x1C6.
const MBR_PARTITION_START: usize = 0x1C6;
/// MBR probe: total sector count of the embedded disk image, u32 at 0x1CA.
const MBR_TOTAL_SECTORS: usize = 0x1CA;

/// BPB probe: bytes per logical sector, u16 at 11.
const BPB_BYTES_PER_SECTOR: usize = 11;
/// BPB probe: total logical sectors, u16 at 19 (0 means the field overflowed).
const BPB_TOTAL_SECTORS_16: usize = 19;
/// BPB probe: large total sector count, u32 at 32.
const BPB_TOTAL_SECTORS_32: usize = 32;

/// How the true size of a boot image is to be discovered.
///
/// Produced by exactly one decision point on the emulation type (and the
/// caller's MBR-stripping request) and consumed by exactly one interpreter
/// in [`resolve_image_size`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeHint {
    /// No emulation: the catalog's declared count of 512-byte sectors is the
    /// size; no probe read happens.
    Declared {
        /// Declared count of 512-byte virtual sectors.
        sectors: u16,
    },
    /// Hard-disk emulation, MBR kept: the total sector count comes from the
    /// partition table region of the image's first sector.
    PartitionTable,
    /// Hard-disk emulation, MBR stripped: the start advances past the
    /// partition's leading sectors and the size comes from the re-probed
    /// filesystem boot sector.
    StrippedPartition,
    /// Floppy emulation (and unrecognized media types): the size comes from
    /// the BIOS Parameter Block of the image's first sector.
    BiosParameterBlock,
}

impl SizeHint {
    /// The single decision point mapping an entry to its size-resolution
    /// strategy.
    #[must_use]
    pub fn for_entry(entry: &CatalogEntry, strip_mbr: bool) -> Self {
        match entry.media {
            MediaType::NoEmulation => Self::Declared {
                sectors: entry.sector_count,
            },
            MediaType::HardDisk if strip_mbr => Self::StrippedPartition,
            MediaType::HardDisk => Self::PartitionTable,
            _ => Self::BiosParameterBlock,
        }
    }
}

/// Fully resolved location and extent of a boot payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedImage {
    /// First logical sector of the payload (adjusted past the MBR when
    /// stripping was requested).
    pub start_lba: u32,
    /// Size of the payload's own blocks in bytes.
    pub block_size: u32,
    /// Payload length in blocks of `block_size` bytes.
    pub sector_count: u64,
    /// Exact payload length: `sector_count * block_size`.
    pub total_bytes: u64,
}

/// Resolves the exact byte length of the boot payload described by `entry`.
///
/// Performs zero, one, or two single-sector probe reads depending on the
/// emulation type; see [`SizeHint`].
///
/// # Errors
///
/// Returns [`crate::Error::Read`] if a probe sector cannot be read.
pub fn resolve_image_size<S: SectorSource + ?Sized>(
    source: &mut S,
    entry: &CatalogEntry,
    strip_mbr: bool,
) -> Result<ResolvedImage> {
    let hint = SizeHint::for_entry(entry, strip_mbr);
    let mut start_lba = entry.image_lba;
    let mut probe = [0u8; SECTOR_SIZE];

    let (block_size, sector_count) = match hint {
        SizeHint::Declared { sectors } => (VIRTUAL_SECTOR_SIZE, u64::from(sectors)),
        SizeHint::PartitionTable => {
            source.read_sectors(u64::from(start_lba), &mut probe)?;
            (
                VIRTUAL_SECTOR_SIZE,
                u64::from(u32_at(&probe, MBR_TOTAL_SECTORS)),
            )
        }
        SizeHint::StrippedPartition => {
            source.read_sectors(u64::from(start_lba), &mut probe)?;
            // Partition start is counted in 512-byte units; CD sectors are
            // four times as large. Garbage probe fields may carry absurd
            // values; the adjustment wraps rather than aborting.
            start_lba = start_lba.wrapping_add(u32_at(&probe, MBR_PARTITION_START) >> 2);
            source.read_sectors(u64::from(start_lba), &mut probe)?;
            bpb_geometry(&probe)
        }
        SizeHint::BiosParameterBlock => {
            source.read_sectors(u64::from(start_lba), &mut probe)?;
            bpb_geometry(&probe)
        }
    };

    let total_bytes = sector_count * u64::from(block_size);
    log::debug!("resolved image: {total_bytes} bytes starting at LBA {start_lba:#x}");
    Ok(ResolvedImage {
        start_lba,
        block_size,
        sector_count,
        total_bytes,
    })
}

/// Extracts block size and block count from a BIOS Parameter Block, falling
/// back to the 32-bit sector count when the 16-bit field overflowed to zero.
fn bpb_geometry(probe: &[u8]) -> (u32, u64) {
    let block_size = u32::from(u16_at(probe, BPB_BYTES_PER_SECTOR));
    let sector_count = match u16_at(probe, BPB_TOTAL_SECTORS_16) {
        0 => u64::from(u32_at(probe, BPB_TOTAL_SECTORS_32)),
        small => u64::from(small),
    };
    (block_size, sector_count)
}
