//! Cethleann CLI - Command-line tool for Koei Tecmo archive extraction.
//!
//! This is the main entry point for the Cethleann command-line application.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use memmap2::Mmap;
use tracing::{debug, error, warn};
use tracing_subscriber::EnvFilter;

use cethleann::prelude::*;

/// Cethleann - Koei Tecmo game archive extraction tool
#[derive(Parser)]
#[command(name = "cethleann")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List entries of a DATA0 index
    List {
        /// Path to DATA0.bin
        #[arg(long, env = "CETHLEANN_DATA0")]
        data0: PathBuf,

        /// Show offsets and sizes
        #[arg(short, long)]
        detailed: bool,
    },

    /// Extract every entry of a DATA0/DATA1 archive
    Extract {
        /// Path to DATA0.bin
        #[arg(long, env = "CETHLEANN_DATA0")]
        data0: PathBuf,

        /// Path to DATA1.bin
        #[arg(long, env = "CETHLEANN_DATA1")]
        data1: PathBuf,

        /// Output directory
        #[arg(short, long, env = "CETHLEANN_OUTPUT")]
        output: PathBuf,

        /// Also decode entries that are chunked containers themselves
        #[arg(long)]
        decompress_nested: bool,

        /// Maximum bytes one chunk may inflate to
        #[arg(long, default_value_t = cethleann::archive::DEFAULT_INFLATE_LIMIT)]
        inflate_limit: usize,
    },

    /// Extract files listed in a patch INFO0/INFO2 pair from a RomFS
    PatchExtract {
        /// Path to INFO2.bin
        #[arg(long)]
        info2: PathBuf,

        /// Path to INFO0.bin
        #[arg(long)]
        info0: PathBuf,

        /// RomFS root directory
        #[arg(long, env = "CETHLEANN_ROMFS")]
        romfs: PathBuf,

        /// Output directory
        #[arg(short, long, env = "CETHLEANN_OUTPUT")]
        output: PathBuf,

        /// Maximum bytes one chunk may inflate to
        #[arg(long, default_value_t = cethleann::archive::DEFAULT_INFLATE_LIMIT)]
        inflate_limit: usize,
    },

    /// Wrap a file in a chunked container
    Compress {
        /// Input file
        #[arg(short, long)]
        input: PathBuf,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,

        /// Use 128 KiB chunks instead of 64 KiB
        #[arg(long)]
        chonky: bool,
    },

    /// Decode a chunked container
    Decompress {
        /// Input file
        #[arg(short, long)]
        input: PathBuf,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,

        /// Maximum bytes one chunk may inflate to
        #[arg(long, default_value_t = cethleann::archive::DEFAULT_INFLATE_LIMIT)]
        inflate_limit: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::List { data0, detailed } => {
            cmd_list(&data0, detailed)?;
        }
        Commands::Extract {
            data0,
            data1,
            output,
            decompress_nested,
            inflate_limit,
        } => {
            let options = DecodeOptions::with_inflate_limit(inflate_limit);
            cmd_extract(&data0, &data1, &output, options, decompress_nested)?;
        }
        Commands::PatchExtract {
            info2,
            info0,
            romfs,
            output,
            inflate_limit,
        } => {
            let options = DecodeOptions::with_inflate_limit(inflate_limit);
            cmd_patch_extract(&info2, &info0, &romfs, &output, &options)?;
        }
        Commands::Compress {
            input,
            output,
            chonky,
        } => {
            cmd_compress(&input, &output, chonky)?;
        }
        Commands::Decompress {
            input,
            output,
            inflate_limit,
        } => {
            cmd_decompress(&input, &output, inflate_limit)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn progress_bar(len: usize) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

fn cmd_list(data0: &Path, detailed: bool) -> Result<()> {
    let index = ArchiveIndex::open(data0).context("Failed to read DATA0 index")?;

    for (id, entry) in index.iter().enumerate() {
        if detailed {
            println!(
                "{:>6} {:>#12x} {:>12} {:>12} {}",
                id,
                entry.offset(),
                entry.compressed_size(),
                entry.uncompressed_size(),
                if entry.is_compressed() { "C" } else { " " },
            );
        } else {
            println!("{id}");
        }
    }

    println!("\nTotal: {} entries", index.len());

    Ok(())
}

fn cmd_extract(
    data0: &Path,
    data1: &Path,
    output: &Path,
    options: DecodeOptions,
    decompress_nested: bool,
) -> Result<()> {
    println!("Opening archive: {}", data1.display());

    let start = Instant::now();
    let index = ArchiveIndex::open(data0).context("Failed to read DATA0 index")?;
    let file = File::open(data1).context("Failed to open DATA1 blob")?;
    let mmap = unsafe { Mmap::map(&file).context("Failed to map DATA1 blob")? };

    println!("Loaded {} entries in {:?}", index.len(), start.elapsed());

    fs::create_dir_all(output)?;

    let indices: Vec<usize> = (0..index.len()).collect();
    let pb = progress_bar(indices.len())?;
    let errors = AtomicUsize::new(0);

    let start = Instant::now();
    index.extract_parallel(&mmap, &indices, options, |id, result| {
        let written = result
            .map_err(anyhow::Error::from)
            .and_then(|data| write_entry(output, id, data, decompress_nested));
        if let Err(e) = written {
            error!("entry {id}: {e:#}");
            errors.fetch_add(1, Ordering::Relaxed);
        }
        pb.inc(1);
    });

    pb.finish_with_message("Done");
    println!(
        "Extraction completed in {:?} ({} errors)",
        start.elapsed(),
        errors.load(Ordering::Relaxed)
    );

    Ok(())
}

/// Write one extracted entry as `<id>.<ext>`.
fn write_entry(output: &Path, id: usize, data: Vec<u8>, decompress_nested: bool) -> Result<()> {
    let mut data = data;
    let mut kind = DataKind::sniff(&data);

    if decompress_nested
        && kind.is_some_and(DataKind::is_container)
        && ChunkedCodec::is_container(&data)
    {
        let options = nested_options(&data);
        data = ChunkedCodec::decode_with(&data, &options)
            .with_context(|| format!("Failed to decode nested container in entry {id}"))?;
        kind = DataKind::sniff(&data);
        debug!(id, ?kind, "decoded nested container");
    }

    let ext = kind.and_then(DataKind::extension).unwrap_or("bin");
    fs::write(output.join(format!("{id:05}.{ext}")), data)?;
    Ok(())
}

/// Nested containers are decoded with a cap that fits their own chunk size.
fn nested_options(data: &[u8]) -> DecodeOptions {
    let chunk_size = cethleann::archive::CompressionHeader::parse(data)
        .map(|h| h.chunk_size as usize)
        .unwrap_or(0);
    DecodeOptions::with_inflate_limit(chunk_size.max(cethleann::archive::DEFAULT_INFLATE_LIMIT))
}

fn cmd_patch_extract(
    info2: &Path,
    info0: &Path,
    romfs: &Path,
    output: &Path,
    options: &DecodeOptions,
) -> Result<()> {
    println!("Opening patch index: {}", info0.display());

    let overlay = PatchOverlayIndex::open(info2, info0).context("Failed to read patch index")?;
    println!("Loaded {} patch entries", overlay.len());

    let pb = progress_bar(overlay.len())?;
    let mut extracted = 0;

    for entry in overlay.iter() {
        pb.inc(1);

        let Some(relative) = entry.relative_path() else {
            warn!(
                index = entry.index,
                path = %entry.path,
                "skipping patch entry outside the RomFS"
            );
            continue;
        };

        let source = romfs.join(relative);
        let data = PatchOverlayIndex::read_file_entry_with(&source, entry, options)
            .with_context(|| format!("Failed to read patch entry {}", entry.index))?;

        if !data.is_empty() {
            let output_path = output.join(relative);
            if let Some(parent) = output_path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&output_path, data)?;
            extracted += 1;
        }
    }

    pb.finish_with_message("Done");
    println!("Extracted {extracted} patch files");

    Ok(())
}

fn cmd_compress(input: &Path, output: &Path, chonky: bool) -> Result<()> {
    let data = fs::read(input).context("Failed to read input file")?;
    let chunk_size = if chonky {
        ChunkSize::Chonky
    } else {
        ChunkSize::Normal
    };

    let encoded = ChunkedCodec::encode(&data, chunk_size).context("Failed to encode container")?;
    fs::write(output, &encoded).context("Failed to write output file")?;

    println!("Compressed {} -> {} bytes", data.len(), encoded.len());

    Ok(())
}

fn cmd_decompress(input: &Path, output: &Path, inflate_limit: usize) -> Result<()> {
    let data = fs::read(input).context("Failed to read input file")?;

    let options = DecodeOptions::with_inflate_limit(inflate_limit);
    let decoded = ChunkedCodec::decode_with(&data, &options).context("Failed to decode container")?;
    fs::write(output, &decoded).context("Failed to write output file")?;

    println!("Decompressed {} -> {} bytes", data.len(), decoded.len());

    Ok(())
}
