// Copyright 2025 Isobar Contributors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Locating and decoding the El Torito boot catalog.
//!
//! A bootable disc carries a boot record volume descriptor at logical sector
//! 0x11 whose signature names the El Torito specification and whose body
//! holds the sector address of the boot catalog. The catalog itself packs a
//! validation entry and the initial/default boot entry into its first 64
//! bytes; this module decodes exactly those two (section entries for
//! additional boot images are not supported).
//!
//! Reference: "El Torito" Bootable CD-ROM Format Specification Version 1.0

use core::fmt;

use crate::error::{Error, Result};
use crate::source::{SECTOR_SIZE, SectorSource};

/// Logical sector of the boot record volume descriptor.
pub const BOOT_RECORD_LBA: u64 = 0x11;

/// Signature a boot record volume descriptor must carry at byte offset 1:
/// the ISO 9660 standard identifier, the descriptor version, and the
/// NUL-terminated El Torito boot system identifier.
const EL_TORITO_SIGNATURE: &[u8; 30] = b"CD001\x01EL TORITO SPECIFICATION\0";

/// Offset of the boot catalog LBA within the boot record volume descriptor.
const CATALOG_LBA_OFFSET: usize = 0x47;

/// Key bytes closing the catalog's validation entry.
const KEY_BYTES: (u8, u8) = (0x55, 0xAA);

/// Boot indicator value marking the default entry as bootable.
const BOOT_INDICATOR_BOOTABLE: u8 = 0x88;

/// Load segment the BIOS substitutes when the catalog field is zero.
pub const DEFAULT_LOAD_SEGMENT: u16 = 0x7C0;

pub(crate) fn u16_at(buf: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([buf[offset], buf[offset + 1]])
}

pub(crate) fn u32_at(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ])
}

/// Platform a boot entry targets, from the validation entry's platform ID.
///
/// Unrecognized IDs are classified, not rejected; "couldn't classify" is a
/// separate concern from "invalid".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformId {
    /// 80x86 (BIOS)
    X86,
    /// PowerPC
    PowerPc,
    /// Mac
    Mac,
    /// Any other platform ID, carried verbatim.
    Unknown(u8),
}

impl PlatformId {
    /// Classifies a raw platform ID byte.
    #[must_use]
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            0x00 => Self::X86,
            0x01 => Self::PowerPc,
            0x02 => Self::Mac,
            other => Self::Unknown(other),
        }
    }

    /// The raw platform ID byte.
    #[must_use]
    pub fn raw(&self) -> u8 {
        match *self {
            Self::X86 => 0x00,
            Self::PowerPc => 0x01,
            Self::Mac => 0x02,
            Self::Unknown(raw) => raw,
        }
    }
}

impl fmt::Display for PlatformId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::X86 => f.write_str("80x86"),
            Self::PowerPc => f.write_str("Power PC"),
            Self::Mac => f.write_str("Mac"),
            Self::Unknown(_) => f.write_str("unknown"),
        }
    }
}

/// What the boot image pretends to be, from the low nibble of the default
/// entry's media byte. Determines how the image's size must be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    /// No emulation; the image is loaded directly.
    NoEmulation,
    /// 1.2 MB floppy emulation
    Floppy1_2M,
    /// 1.44 MB floppy emulation
    Floppy1_44M,
    /// 2.88 MB floppy emulation
    Floppy2_88M,
    /// Hard disk emulation
    HardDisk,
    /// Any other media nibble, carried verbatim.
    Unknown(u8),
}

impl MediaType {
    /// Classifies the low nibble of a raw media byte.
    #[must_use]
    pub fn from_raw(raw: u8) -> Self {
        match raw & 0x0F {
            0 => Self::NoEmulation,
            1 => Self::Floppy1_2M,
            2 => Self::Floppy1_44M,
            3 => Self::Floppy2_88M,
            4 => Self::HardDisk,
            other => Self::Unknown(other),
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoEmulation => f.write_str("no emulation"),
            Self::Floppy1_2M => f.write_str("1.2 meg floppy"),
            Self::Floppy1_44M => f.write_str("1.44 meg floppy"),
            Self::Floppy2_88M => f.write_str("2.88 meg floppy"),
            Self::HardDisk => f.write_str("hard disk"),
            Self::Unknown(_) => f.write_str("unknown"),
        }
    }
}

/// Decoded validation entry and initial/default boot entry of a catalog.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    /// Target platform, from the validation entry.
    pub platform: PlatformId,
    /// Manufacturer/developer ID string of the validation entry, absent when
    /// its first byte is NUL.
    pub id_string: Option<String>,
    /// Raw boot indicator byte (0x88 means bootable).
    pub boot_indicator: u8,
    /// Boot media emulation type (low nibble of the media byte).
    pub media: MediaType,
    /// Raw media byte, including the non-emulation bits.
    pub media_byte: u8,
    /// Load segment as recorded; zero means the BIOS default applies.
    pub load_segment: u16,
    /// System type, copied from the partition table of hard-disk images.
    pub system_type: u8,
    /// Number of 512-byte virtual sectors declared in the catalog.
    pub sector_count: u16,
    /// Logical sector of the boot image.
    pub image_lba: u32,
}

impl CatalogEntry {
    /// Whether the default entry is marked bootable. Any indicator other
    /// than 0x88 means not bootable; it is not itself an error.
    #[must_use]
    pub fn is_bootable(&self) -> bool {
        self.boot_indicator == BOOT_INDICATOR_BOOTABLE
    }

    /// The load segment with the BIOS default substituted for zero.
    ///
    /// Informational only; size resolution never reads it.
    #[must_use]
    pub fn effective_load_segment(&self) -> u16 {
        if self.load_segment == 0 {
            DEFAULT_LOAD_SEGMENT
        } else {
            self.load_segment
        }
    }
}

/// Reads the boot record volume descriptor and returns the boot catalog's
/// sector address.
///
/// Reads exactly one sector at [`BOOT_RECORD_LBA`] and compares bytes
/// [1, 31) against the El Torito signature, byte-exact.
///
/// # Errors
///
/// Returns [`Error::NotElTorito`] on a signature mismatch and
/// [`Error::Read`] if the descriptor sector cannot be read.
pub fn locate_boot_catalog<S: SectorSource + ?Sized>(source: &mut S) -> Result<u32> {
    let mut sector = [0u8; SECTOR_SIZE];
    source.read_sectors(BOOT_RECORD_LBA, &mut sector)?;

    if sector[1..31] != EL_TORITO_SIGNATURE[..] {
        return Err(Error::NotElTorito);
    }

    let catalog_lba = u32_at(&sector, CATALOG_LBA_OFFSET);
    log::debug!("boot catalog at LBA {catalog_lba:#x}");
    Ok(catalog_lba)
}

/// Reads the boot catalog sector and decodes its validation entry and
/// initial/default boot entry.
///
/// Only the two key bytes at offsets 0x1E-0x1F are checked; the catalog's
/// checksum field is intentionally not verified.
///
/// # Errors
///
/// Returns [`Error::InvalidCatalog`] when the key bytes are wrong and
/// [`Error::Read`] if the catalog sector cannot be read.
pub fn parse_catalog<S: SectorSource + ?Sized>(
    source: &mut S,
    catalog_lba: u32,
) -> Result<CatalogEntry> {
    let mut sector = [0u8; SECTOR_SIZE];
    source.read_sectors(u64::from(catalog_lba), &mut sector)?;

    if (sector[0x1E], sector[0x1F]) != KEY_BYTES {
        return Err(Error::InvalidCatalog);
    }

    let id_string = if sector[4] == 0 {
        None
    } else {
        let raw = &sector[4..28];
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        Some(String::from_utf8_lossy(&raw[..end]).into_owned())
    };

    let entry = CatalogEntry {
        platform: PlatformId::from_raw(sector[1]),
        id_string,
        boot_indicator: sector[0x20],
        media: MediaType::from_raw(sector[0x21]),
        media_byte: sector[0x21],
        load_segment: u16_at(&sector, 0x22),
        system_type: sector[0x24],
        sector_count: u16_at(&sector, 0x26),
        image_lba: u32_at(&sector, 0x28),
    };
    log::debug!(
        "default entry: media {}, image at LBA {:#x}, {} declared sector(s)",
        entry.media,
        entry.image_lba,
        entry.sector_count
    );
    Ok(entry)
}
