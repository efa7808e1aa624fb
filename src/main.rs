//! Main entry point for the pzip CLI application.
//!
//! Exit status is 0 on success, 1 when the archive itself cannot be opened
//! or created, and 2 when at least one entry failed or an archive scan did
//! not end cleanly.

use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use pzip::cli::{Command, CreateArgs};
use pzip::{ArchiveEnd, Cli, CreateOptions, Event, ExtractOptions, Stats, ops};

/// Exit status when some entries failed but the archive itself was usable.
const PARTIAL_FAILURE: u8 = 2;

/// Application entry point.
///
/// Parses command-line arguments, runs the subcommand and maps its outcome
/// to an exit status.
fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(PARTIAL_FAILURE),
        Err(e) => {
            eprintln!("pzip: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Dispatch to the subcommand handler.
///
/// # Arguments
///
/// * `cli` - Parsed command-line arguments
///
/// # Returns
///
/// Returns `Ok(true)` when every entry succeeded, `Ok(false)` when some
/// entries failed or the archive did not end cleanly, or an error when the
/// archive itself could not be opened or written.
fn run(cli: &Cli) -> Result<bool> {
    match &cli.command {
        Command::Create(args) => create(cli, args),
        Command::List { archive } => list(cli, archive),
        Command::Extract {
            archive,
            extract_dir,
            overwrite,
        } => {
            let options = ExtractOptions {
                output_dir: extract_dir.clone().unwrap_or_else(|| PathBuf::from(".")),
                overwrite: *overwrite,
            };
            extract(cli, archive, &options)
        }
        Command::Test { archive } => test(cli, archive),
    }
}

/// Create an archive from the given files.
///
/// Writes to a file with header back-patching, or to stdout when the archive
/// path is `-`. All messages go to stderr so stdout stays free for the
/// archive itself when writing to a pipe.
///
/// # Arguments
///
/// * `cli` - Parsed command-line arguments (verbosity)
/// * `args` - Archive path, input files and compression level
///
/// # Returns
///
/// Returns `Ok(true)` if every input was added or deliberately skipped.
fn create(cli: &Cli, args: &CreateArgs) -> Result<bool> {
    let options = CreateOptions {
        level: args.level(),
    };

    // Per-entry progress: sizes in verbose mode, names otherwise
    let observer = |event: Event<'_>| match event {
        Event::Added(entry) if cli.verbose => eprintln!(
            "  adding: {} ({} -> {} bytes, {}%)",
            entry.file_name,
            entry.uncompressed_size(),
            entry.compressed_size(),
            ops::compression_ratio(entry.compressed_size(), entry.uncompressed_size())
        ),
        Event::Added(entry) if !cli.is_quiet() => eprintln!("  adding: {}", entry.file_name),
        Event::SkippedDirectory(path) if cli.verbose => {
            eprintln!("  skipping directory: {}", path.display())
        }
        Event::SkippedArchive(path) if !cli.is_quiet() => {
            eprintln!("  skipping {}: it is the archive being written", path.display())
        }
        Event::Failed { name, error } => warn(cli, name, error),
        _ => {}
    };

    let stats = if args.is_stdout() {
        let stdout = io::stdout().lock();
        ops::create_to_writer(stdout, &args.files, &options, observer)
            .context("writing archive to stdout")?
    } else {
        ops::create(&args.archive, &args.files, &options, observer)
            .with_context(|| format!("creating {}", args.archive.display()))?
    };

    // Summary line with totals
    if !cli.is_quiet() {
        eprintln!(
            "{} files, {} -> {} ({}%)",
            stats.entries,
            format_size(stats.uncompressed_total),
            format_size(stats.compressed_total),
            stats.ratio()
        );
    }
    report_failures(cli, &stats);
    Ok(stats.is_success())
}

/// List archive entries as a table.
///
/// Supports two output formats:
/// - Default: length, compressed size, ratio and name
/// - Verbose (`-v`): the same with the stored CRC-32 added
///
/// # Arguments
///
/// * `cli` - Parsed command-line arguments
/// * `archive` - Path of the archive to read
///
/// # Returns
///
/// Returns `Ok(true)` if the scan reached the end of the archive cleanly.
fn list(cli: &Cli, archive: &Path) -> Result<bool> {
    let listing = ops::list(archive).with_context(|| format!("reading {}", archive.display()))?;

    // Print table header
    if cli.verbose {
        println!(
            "{:>10}  {:>10}  {:>5}  {:>8}  Name",
            "Length", "Size", "Cmpr", "CRC-32"
        );
        println!("{}", "-".repeat(60));
    } else {
        println!("{:>10}  {:>10}  {:>5}  Name", "Length", "Size", "Cmpr");
        println!("{}", "-".repeat(50));
    }

    for entry in &listing.entries {
        let ratio = ops::compression_ratio(entry.compressed_size(), entry.uncompressed_size());
        if cli.verbose {
            println!(
                "{:>10}  {:>10}  {:>4}%  {:08x}  {}",
                entry.uncompressed_size(),
                entry.compressed_size(),
                ratio,
                entry.header.crc32,
                entry.file_name
            );
        } else {
            println!(
                "{:>10}  {:>10}  {:>4}%  {}",
                entry.uncompressed_size(),
                entry.compressed_size(),
                ratio,
                entry.file_name
            );
        }
    }

    // Print summary line
    println!("{}", "-".repeat(if cli.verbose { 60 } else { 50 }));
    println!(
        "{:>10}  {:>10}  {:>4}%  {} files",
        listing.uncompressed_total(),
        listing.compressed_total(),
        listing.ratio(),
        listing.entries.len()
    );

    report_end(cli, listing.end);
    Ok(listing.end.is_clean())
}

/// Extract every entry of the archive.
///
/// Existing files are skipped unless `-o` is given. An entry that fails its
/// size or CRC check is reported and never written under its own name.
///
/// # Arguments
///
/// * `cli` - Parsed command-line arguments
/// * `archive` - Path of the archive to read
/// * `options` - Output directory and overwrite policy
///
/// # Returns
///
/// Returns `Ok(true)` if every entry was extracted or skipped and the
/// archive ended cleanly.
fn extract(cli: &Cli, archive: &Path, options: &ExtractOptions) -> Result<bool> {
    let observer = |event: Event<'_>| match event {
        Event::Extracted { entry, .. } if !cli.is_quiet() => {
            println!("  extracting: {}", entry.file_name)
        }
        Event::Exists { entry, .. } if !cli.is_quiet() => {
            eprintln!("Skipping: {} (use -o to overwrite)", entry.file_name)
        }
        Event::Failed { name, error } => warn(cli, name, error),
        _ => {}
    };

    let stats = ops::extract(archive, options, observer)
        .with_context(|| format!("extracting {}", archive.display()))?;

    if cli.verbose {
        eprintln!(
            "{} files, {} extracted",
            stats.entries,
            format_size(stats.uncompressed_total)
        );
    }
    report_failures(cli, &stats);
    report_end(cli, stats.end.unwrap_or(ArchiveEnd::Clean));
    Ok(stats.is_success())
}

/// Test archive integrity by decompressing every entry without writing it.
///
/// # Arguments
///
/// * `cli` - Parsed command-line arguments
/// * `archive` - Path of the archive to check
///
/// # Returns
///
/// Returns `Ok(true)` if every entry decoded to its stored size and CRC-32.
fn test(cli: &Cli, archive: &Path) -> Result<bool> {
    let observer = |event: Event<'_>| match event {
        Event::Verified(entry) if !cli.is_quiet() => {
            println!("    testing: {:<40} OK", entry.file_name)
        }
        Event::Failed { name, error } => warn(cli, name, error),
        _ => {}
    };

    let stats = ops::verify(archive, observer)
        .with_context(|| format!("testing {}", archive.display()))?;

    // A damaged tail is reported before the verdict
    report_end(cli, stats.end.unwrap_or(ArchiveEnd::Clean));
    if stats.is_success() {
        if !cli.is_quiet() {
            println!("No errors detected in {}", archive.display());
        }
    } else if !cli.is_very_quiet() {
        eprintln!(
            "{} of {} entries failed in {}",
            stats.failures.len(),
            stats.failures.len() as u64 + stats.entries,
            archive.display()
        );
    }
    Ok(stats.is_success())
}

/// Print a per-entry failure unless running with `-qq`.
fn warn(cli: &Cli, name: &str, error: &pzip::Error) {
    if !cli.is_very_quiet() {
        eprintln!("warning: {name}: {error}");
    }
}

fn report_failures(cli: &Cli, stats: &Stats) {
    if !stats.failures.is_empty() && !cli.is_very_quiet() {
        eprintln!("{} entries failed", stats.failures.len());
    }
}

/// The format has no end marker, so a scan that stops anywhere but at the
/// end of the file is the only sign of damage.
fn report_end(cli: &Cli, end: ArchiveEnd) {
    if cli.is_very_quiet() {
        return;
    }
    match end {
        ArchiveEnd::Clean => {}
        ArchiveEnd::Truncated { offset } => {
            eprintln!("warning: archive is truncated (entry at offset {offset} is incomplete)")
        }
        ArchiveEnd::UnrecognizedData { offset } => {
            eprintln!("warning: unrecognized data at offset {offset}, remaining bytes ignored")
        }
    }
}

/// Format a byte size into a human-readable string.
///
/// Automatically selects the appropriate unit (bytes, KB, MB, GB)
/// based on the size magnitude.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(format_size(500), "500 bytes");
/// assert_eq!(format_size(1536), "1.50 KB");
/// assert_eq!(format_size(1048576), "1.00 MB");
/// ```
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}
