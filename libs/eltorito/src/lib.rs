// Copyright 2025 Isobar Contributors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! El Torito boot catalog inspection and boot image extraction.
//!
//! Given a bootable CD-ROM image (or a CD-ROM device with the same logical
//! sector geometry), this crate locates the El Torito boot catalog, decodes
//! its validation and default entries, resolves the exact byte length of the
//! boot payload, and can stream that payload out to a file.
//!
//! # Pipeline
//!
//! The four stages run strictly in order, each consuming the previous
//! stage's output, all driven by one [`SectorSource`]:
//!
//! 1. [`locate_boot_catalog`] - verify the El Torito signature in the boot
//!    record volume descriptor and return the catalog's sector address.
//! 2. [`parse_catalog`] - decode the catalog's validation and default
//!    entries into a [`CatalogEntry`].
//! 3. [`resolve_image_size`] - determine the payload's true byte length,
//!    probing the boot image's own first sector where the catalog does not
//!    state the size directly.
//! 4. [`extract`] (optional) - copy the resolved byte range to a sink.
//!
//! # Usage
//!
//! ```rust,ignore
//! use eltorito::{FileSource, locate_boot_catalog, parse_catalog, resolve_image_size};
//!
//! let mut source = FileSource::open(Path::new("boot.iso"))?;
//! let catalog_lba = locate_boot_catalog(&mut source)?;
//! let entry = parse_catalog(&mut source, catalog_lba)?;
//! let image = resolve_image_size(&mut source, &entry, false)?;
//! println!("boot payload is {} bytes", image.total_bytes);
//! ```
//!
//! # Size resolution
//!
//! Only a no-emulation entry states its size in the catalog. Floppy images
//! carry it in the BIOS Parameter Block of their first sector; hard-disk
//! images carry it in the partition table of their simulated MBR, or - when
//! the caller asks for the MBR to be stripped - in the BPB of the partition
//! itself. See [`SizeHint`] for the decision table.
//!
//! # References
//!
//! - [El Torito Specification](https://pdos.csail.mit.edu/6.828/2014/readings/boot-cdrom.pdf):
//!   Bootable CD-ROM Format Specification Version 1.0
//! - ECMA-119: Volume and File Structure of CDROM for Information Interchange

mod catalog;
mod error;
mod extract;
mod resolve;
mod source;

pub use catalog::{
    BOOT_RECORD_LBA, CatalogEntry, DEFAULT_LOAD_SEGMENT, MediaType, PlatformId,
    locate_boot_catalog, parse_catalog,
};
pub use error::{Error, Result};
pub use extract::{DEFAULT_MAX_BATCH, extract};
pub use resolve::{ResolvedImage, SizeHint, resolve_image_size};
#[cfg(unix)]
pub use source::BlockDeviceSource;
pub use source::{FileSource, SECTOR_SIZE, SectorSource};

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Builds a minimal bootable ISO image in memory: boot record volume
    /// descriptor at sector 0x11, catalog at 0x13, 1.44M floppy boot image
    /// at 0x20 whose BPB declares 16 sectors of 512 bytes.
    fn floppy_iso() -> Vec<u8> {
        let mut iso = vec![0u8; 0x25 * SECTOR_SIZE];

        let vd = 0x11 * SECTOR_SIZE;
        iso[vd + 1..vd + 31].copy_from_slice(b"CD001\x01EL TORITO SPECIFICATION\0");
        iso[vd + 0x47..vd + 0x4B].copy_from_slice(&0x13u32.to_le_bytes());

        let cat = 0x13 * SECTOR_SIZE;
        iso[cat] = 0x01;
        iso[cat + 4..cat + 10].copy_from_slice(b"ISOBAR");
        iso[cat + 0x1E] = 0x55;
        iso[cat + 0x1F] = 0xAA;
        iso[cat + 0x20] = 0x88;
        iso[cat + 0x21] = 0x02; // 1.44M floppy
        iso[cat + 0x26..cat + 0x28].copy_from_slice(&1u16.to_le_bytes());
        iso[cat + 0x28..cat + 0x2C].copy_from_slice(&0x20u32.to_le_bytes());

        let img = 0x20 * SECTOR_SIZE;
        for (i, byte) in iso[img..img + 16 * 512].iter_mut().enumerate() {
            *byte = u8::try_from(i % 249).unwrap();
        }
        // BPB goes in after the payload pattern so the geometry survives.
        iso[img + 11..img + 13].copy_from_slice(&512u16.to_le_bytes());
        iso[img + 19..img + 21].copy_from_slice(&16u16.to_le_bytes());
        iso
    }

    #[test]
    fn full_pipeline_on_synthetic_floppy_iso() {
        let iso = floppy_iso();
        let mut source = FileSource::new(Cursor::new(iso.clone()));

        let catalog_lba = locate_boot_catalog(&mut source).unwrap();
        assert_eq!(catalog_lba, 0x13);

        let entry = parse_catalog(&mut source, catalog_lba).unwrap();
        assert!(entry.is_bootable());
        assert_eq!(entry.media, MediaType::Floppy1_44M);
        assert_eq!(entry.id_string.as_deref(), Some("ISOBAR"));

        let image = resolve_image_size(&mut source, &entry, false).unwrap();
        assert_eq!(image.start_lba, 0x20);
        assert_eq!(image.total_bytes, 16 * 512);

        let mut out = Vec::new();
        let written = extract(&mut source, &image, &mut out, DEFAULT_MAX_BATCH).unwrap();
        assert_eq!(written, 16 * 512);
        let img = 0x20 * SECTOR_SIZE;
        assert_eq!(out[..], iso[img..img + 16 * 512]);
    }
}
