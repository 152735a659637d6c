//! mapzip CLI - inspect, extract, and build indexed ZIP archives.
//!
//! This is the main entry point for the mapzip command-line application.

use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use regex::Regex;
use tracing::warn;
use walkdir::WalkDir;

use mapzip::prelude::*;

/// mapzip - memory-mapped ZIP archives with an embedded fast index
#[derive(Parser)]
#[command(name = "mapzip")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v, -vv, -vvv); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show how an archive was loaded
    Info {
        /// Path to the archive
        #[arg(env = "MAPZIP_ARCHIVE")]
        archive: PathBuf,
    },

    /// List files in an archive
    List {
        /// Path to the archive
        #[arg(env = "MAPZIP_ARCHIVE")]
        archive: PathBuf,

        /// Only list names matching this regular expression
        #[arg(short, long)]
        filter: Option<String>,

        /// Show sizes and compression
        #[arg(short, long)]
        detailed: bool,
    },

    /// Write one file's contents to stdout
    Cat {
        /// Path to the archive
        archive: PathBuf,

        /// Path of the file inside the archive
        path: String,
    },

    /// Extract files from an archive
    Extract {
        /// Path to the archive
        #[arg(env = "MAPZIP_ARCHIVE")]
        archive: PathBuf,

        /// Output directory
        #[arg(short, long, env = "MAPZIP_OUTPUT")]
        output: PathBuf,

        /// Only extract names matching this regular expression
        #[arg(short, long)]
        filter: Option<String>,

        /// Only extract files below this directory
        #[arg(short, long, default_value = "")]
        dir: String,
    },

    /// Build an archive from a directory tree
    Pack {
        /// Directory to pack
        input: PathBuf,

        /// Archive to write
        output: PathBuf,

        /// Embed a fast index
        #[arg(short, long, value_enum)]
        index: Option<IndexArg>,

        /// Deflate file contents (ignored with a size-aware index)
        #[arg(long)]
        deflate: bool,

        /// Always write ZIP64 end records
        #[arg(long)]
        zip64: bool,
    },

    /// Print the path hash used by the fast index
    Hash {
        /// Path to hash
        value: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum IndexArg {
    /// 64-bit keys pointing straight at stored payloads
    SizeAware,
    /// 32-bit keys pointing at local headers
    SizeUnaware,
}

impl From<IndexArg> for IndexMode {
    fn from(arg: IndexArg) -> Self {
        match arg {
            IndexArg::SizeAware => IndexMode::SizeAware,
            IndexArg::SizeUnaware => IndexMode::SizeUnaware,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Info { archive } => {
            cmd_info(&archive)?;
        }
        Commands::List {
            archive,
            filter,
            detailed,
        } => {
            cmd_list(&archive, filter.as_deref(), detailed)?;
        }
        Commands::Cat { archive, path } => {
            cmd_cat(&archive, &path)?;
        }
        Commands::Extract {
            archive,
            output,
            filter,
            dir,
        } => {
            cmd_extract(&archive, &output, filter.as_deref(), &dir)?;
        }
        Commands::Pack {
            input,
            output,
            index,
            deflate,
            zip64,
        } => {
            cmd_pack(&input, &output, index.map(IndexMode::from), deflate, zip64)?;
        }
        Commands::Hash { value } => {
            cmd_hash(&value);
        }
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with_writer(io::stderr)
        .init();
}

fn open(path: &Path) -> Result<Archive> {
    Archive::open(path).with_context(|| format!("Failed to open archive {}", path.display()))
}

fn compile_filter(filter: Option<&str>) -> Result<Option<Regex>> {
    filter
        .map(|pattern| Regex::new(pattern).context("Invalid filter pattern"))
        .transpose()
}

fn cmd_info(path: &Path) -> Result<()> {
    let start = Instant::now();
    let archive = open(path)?;
    let elapsed = start.elapsed();

    println!("Archive:  {}", path.display());
    println!("Variant:  {}", archive.kind());
    println!("Entries:  {}", archive.len());
    println!("Mapped:   {}", archive.is_mapped());
    println!("Opened in {:?}", elapsed);

    if let Some(indexed) = archive.as_indexed() {
        let index = indexed.index();
        println!("Index:    {:?}, {} keys from offset {}", index.mode(), index.len(), index.start());
    }

    Ok(())
}

fn cmd_list(path: &Path, filter: Option<&str>, detailed: bool) -> Result<()> {
    let archive = open(path)?;
    let filter = compile_filter(filter)?;
    let matches = |name: &str| filter.as_ref().map_or(true, |re| re.is_match(name));

    let mut count = 0;
    if let Some(central) = archive.as_central_directory() {
        // The central directory also knows about directories and compressed sizes.
        for entry in central.entries() {
            if !matches(entry.name()) {
                continue;
            }
            if detailed {
                let kind = if entry.is_directory() {
                    "D"
                } else {
                    match entry.compression_method() {
                        Some(CompressionMethod::Store) => "S",
                        Some(CompressionMethod::Deflate) => "C",
                        None => "?",
                    }
                };
                println!(
                    "{:>12} {:>12} {} {}",
                    entry.compressed_size(),
                    entry.uncompressed_size().max(0),
                    kind,
                    entry.name()
                );
            } else {
                println!("{}", entry.name());
            }
            count += 1;
        }
    } else {
        archive.process_resources("", matches, |resource| {
            if detailed {
                println!("{:>12} {}", resource.size(), resource.path());
            } else {
                println!("{}", resource.path());
            }
            count += 1;
            Ok(())
        })?;
    }

    println!("\nTotal: {} entries", count);

    Ok(())
}

fn cmd_cat(path: &Path, member: &str) -> Result<()> {
    let archive = open(path)?;
    let mut reader = archive
        .get_reader(member)?
        .with_context(|| format!("{} not found in {}", member, path.display()))?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    io::copy(&mut reader, &mut out)?;
    out.flush()?;

    Ok(())
}

fn cmd_extract(path: &Path, output: &Path, filter: Option<&str>, dir: &str) -> Result<()> {
    println!("Opening archive: {}", path.display());

    let start = Instant::now();
    let archive = open(path)?;
    println!(
        "Loaded {} archive with {} entries in {:?}",
        archive.kind(),
        archive.len(),
        start.elapsed()
    );

    let filter = compile_filter(filter)?;
    let matches = |name: &str| filter.as_ref().map_or(true, |re| re.is_match(name));

    let mut total = 0u64;
    archive.process_resources(dir, matches, |_| {
        total += 1;
        Ok(())
    })?;

    println!("Extracting {} files...", total);

    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );

    fs::create_dir_all(output)?;

    let start = Instant::now();
    let mut skipped = 0;
    archive.process_resources(dir, matches, |resource| {
        let Some(relative) = safe_relative_path(resource.path()) else {
            warn!("skipping unsafe entry name {}", resource.path());
            skipped += 1;
            pb.inc(1);
            return Ok(());
        };

        let output_path = output.join(relative);
        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = fs::File::create(&output_path)?;
        io::copy(&mut resource.reader()?, &mut file)?;

        pb.inc(1);
        Ok(())
    })?;

    pb.finish_with_message("Done");
    println!(
        "Extraction completed in {:?} ({} skipped)",
        start.elapsed(),
        skipped
    );

    Ok(())
}

/// Entry name as a relative path, or `None` if it would escape the output
/// directory.
fn safe_relative_path(name: &str) -> Option<PathBuf> {
    let path = Path::new(name);
    path.components()
        .all(|c| matches!(c, Component::Normal(_)))
        .then(|| path.to_path_buf())
}

fn cmd_pack(
    input: &Path,
    output: &Path,
    index: Option<IndexMode>,
    deflate: bool,
    zip64: bool,
) -> Result<()> {
    println!("Packing {} -> {}", input.display(), output.display());

    let mut writer = ArchiveWriter::new().with_zip64(zip64);
    if let Some(mode) = index {
        writer = writer.with_index(mode);
    }
    let method = if deflate {
        CompressionMethod::Deflate
    } else {
        CompressionMethod::Store
    };

    let start = Instant::now();
    for entry in WalkDir::new(input).sort_by_file_name() {
        let entry = entry.context("Failed to walk input directory")?;
        let relative = entry.path().strip_prefix(input)?;
        if relative.as_os_str().is_empty() {
            continue;
        }

        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if entry.file_type().is_dir() {
            writer.add_directory(&name)?;
        } else if entry.file_type().is_file() {
            let contents = fs::read(entry.path())
                .with_context(|| format!("Failed to read {}", entry.path().display()))?;
            writer.add_file(&name, &contents, method)?;
        }
    }

    let count = writer.len();
    writer
        .write_to_file(output)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!("Wrote {} entries in {:?}", count, start.elapsed());

    Ok(())
}

fn cmd_hash(value: &str) {
    let hash = hash_str(value);
    println!("xxh3-64: {:#018x}", hash);
    println!("low 32:  {:#010x}", hash as u32);
}
