mod logger;

use anyhow::{Context, anyhow, bail};
use clap::{ArgAction, Parser, ValueHint};
use eltorito::{
    DEFAULT_MAX_BATCH, Error, FileSource, SectorSource, extract, locate_boot_catalog,
    parse_catalog, resolve_image_size,
};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Device nodes probed when no input is named on the command line.
#[cfg(unix)]
const CDROM_CANDIDATES: &[&str] = &["/dev/cdrom", "/dev/sr0", "/dev/sr1"];

// Stable exit codes so scripts can tell failure modes apart.
const EXIT_NO_MEDIA: u8 = 3;
const EXIT_CREATE: u8 = 4;
const EXIT_ABORTED: u8 = 5;

/// Largest accepted `--max-batch`; caps the transfer buffer at 64 MiB.
const MAX_BATCH_LIMIT: usize = 32 * 1024;

#[derive(Debug, Parser)]
#[clap(version, about = "Extract the boot image (or code) from a bootable CD-ROM or ISO image")]
struct Options {
    /// An image of a bootable CD-ROM, or a CD-ROM device node
    /// (default: the first CD-ROM drive found)
    #[clap(value_hint = ValueHint::FilePath)]
    image: Option<PathBuf>,
    /// Write the boot image (or code) to the specified file
    /// (without this, boot information is only displayed)
    #[clap(short, long, value_hint = ValueHint::FilePath)]
    output: Option<PathBuf>,
    /// For a hard disk image, just write the drive contents (strip the MBR)
    #[clap(short = 'd', long = "strip-mbr")]
    strip_mbr: bool,
    /// Upper bound on sectors transferred per read during extraction
    #[clap(long, default_value_t = DEFAULT_MAX_BATCH)]
    max_batch: usize,
    /// Enables verbose logging
    #[clap(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let opts = Options::parse();
    logger::init(opts.verbose);

    match run(&opts) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err:#}");
            ExitCode::from(exit_code(&err))
        }
    }
}

fn run(opts: &Options) -> anyhow::Result<()> {
    validate_max_batch(opts.max_batch)?;

    let mut source = match &opts.image {
        Some(path) => open_source(path)?,
        None => discover_cdrom()?,
    };

    let catalog_lba = locate_boot_catalog(source.as_mut())?;
    let entry = parse_catalog(source.as_mut(), catalog_lba)?;

    println!("Catalog Sector:\t{catalog_lba:#x}");
    println!("Platform:\t{} ({:02x})", entry.platform, entry.platform.raw());
    println!(
        "ID String:\t{}",
        entry.id_string.as_deref().unwrap_or("not recorded")
    );
    println!(
        "Bootable:\t{} ({:02x})",
        if entry.is_bootable() { "yes" } else { "no" },
        entry.boot_indicator
    );
    println!("Boot Type:\t{} ({:02x})", entry.media, entry.media_byte);
    println!("Load Segment:\t{:04x}", entry.effective_load_segment());
    println!("System Type:\t{:02x}", entry.system_type);
    println!(
        "Sector Count:\t{:02x} ({})",
        entry.sector_count, entry.sector_count
    );
    println!("Image Sector:\t{:#x}", entry.image_lba);

    let image = resolve_image_size(source.as_mut(), &entry, opts.strip_mbr)?;
    println!("Image Size:\t{} bytes", image.total_bytes);

    if let Some(outfile) = &opts.output {
        let sink = File::create(outfile).map_err(Error::SinkCreate)?;
        let mut sink = BufWriter::new(sink);
        extract(source.as_mut(), &image, &mut sink, opts.max_batch)?;
        println!("\nThe output image has been saved in: {}", outfile.display());
    }

    Ok(())
}

/// Opens the named input, picking the backend once: block devices get
/// positioned sector reads, everything else sequential file reads. The core
/// pipeline never learns which it got.
fn open_source(path: &Path) -> anyhow::Result<Box<dyn SectorSource>> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::FileTypeExt;

        let metadata = std::fs::metadata(path)
            .with_context(|| format!("cannot open {}", path.display()))?;
        if metadata.file_type().is_block_device() {
            let source = eltorito::BlockDeviceSource::open(path)
                .with_context(|| format!("cannot open {}", path.display()))?;
            log::debug!("{} opened as a block device", path.display());
            return Ok(Box::new(source));
        }
    }

    let source =
        FileSource::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    Ok(Box::new(source))
}

/// Probes the well-known CD-ROM device nodes and uses the first that opens.
#[cfg(unix)]
fn discover_cdrom() -> anyhow::Result<Box<dyn SectorSource>> {
    for candidate in CDROM_CANDIDATES {
        if let Ok(source) = eltorito::BlockDeviceSource::open(Path::new(candidate)) {
            log::info!("using CD-ROM drive {candidate}");
            return Ok(Box::new(source));
        }
    }
    Err(anyhow!(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        "no CD-ROM drives assigned",
    )))
}

#[cfg(not(unix))]
fn discover_cdrom() -> anyhow::Result<Box<dyn SectorSource>> {
    Err(anyhow!(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        "no input image given",
    )))
}

/// Rejects batch sizes the extractor cannot honor with a bounded buffer.
fn validate_max_batch(max_batch: usize) -> anyhow::Result<()> {
    if !(1..=MAX_BATCH_LIMIT).contains(&max_batch) {
        bail!("--max-batch must be between 1 and {MAX_BATCH_LIMIT} sectors");
    }
    Ok(())
}

/// Maps the error taxonomy onto the stable exit codes.
fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<Error>() {
        Some(Error::NotElTorito | Error::InvalidCatalog) => EXIT_NO_MEDIA,
        Some(Error::Read(_) | Error::Write(_)) => EXIT_ABORTED,
        Some(Error::SinkCreate(_)) => EXIT_CREATE,
        None if err.downcast_ref::<std::io::Error>().is_some() => EXIT_NO_MEDIA,
        None => 1,
    }
}
