//! treedup - find duplicate directory trees, not just duplicate files.
//!
//! Usage:
//!   treedup dirs [PATHS]...    Report whole directories that duplicate each other
//!   treedup files [PATHS]...   Report duplicate files individually
//!   treedup --help             Show help

use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result};

use treedup_analyze::{DedupeConfig, Deduper, TreeMerger};
use treedup_core::SessionConfig;
use treedup_scan::{Census, FileCensus};

#[derive(Parser)]
#[command(
    name = "treedup",
    version,
    about = "Find duplicate directory trees, not just duplicate files",
    long_about = "treedup hashes the files under the given roots, then folds the\n\
                  matches bottom-up so that two fully mirrored directory trees are\n\
                  reported as one pair instead of thousands of file pairs."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Report whole directories whose contents duplicate each other
    Dirs {
        /// Root paths to scan
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Minimum file size to consider (e.g. "4KB", "1MB")
        #[arg(short, long, default_value = "1")]
        min_size: String,

        /// Follow symbolic links while scanning
        #[arg(short = 'L', long)]
        follow_symlinks: bool,

        /// Skip hidden files and directories
        #[arg(long)]
        skip_hidden: bool,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Report duplicate files individually
    Files {
        /// Root paths to scan
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Minimum file size to consider (e.g. "4KB", "1MB")
        #[arg(short, long, default_value = "1")]
        min_size: String,

        /// Maximum number of duplicate groups to show (0 = unlimited)
        #[arg(short = 'n', long, default_value = "0")]
        top: usize,

        /// Follow symbolic links while scanning
        #[arg(short = 'L', long)]
        follow_symlinks: bool,

        /// Skip hidden files and directories
        #[arg(long)]
        skip_hidden: bool,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    match cli.command {
        Command::Dirs {
            paths,
            min_size,
            follow_symlinks,
            skip_hidden,
            format,
        } => run_dirs(paths, &min_size, follow_symlinks, skip_hidden, format),
        Command::Files {
            paths,
            min_size,
            top,
            follow_symlinks,
            skip_hidden,
            format,
        } => run_files(paths, &min_size, top, follow_symlinks, skip_hidden, format),
    }
}

fn session_config(
    paths: Vec<PathBuf>,
    min_size: &str,
    follow_symlinks: bool,
    skip_hidden: bool,
) -> Result<SessionConfig> {
    let min_bytes = parse_size(min_size)?;
    SessionConfig::builder()
        .paths(paths)
        .min_file_size(min_bytes)
        .follow_symlinks(follow_symlinks)
        .include_hidden(!skip_hidden)
        .build()
        .map_err(|e| color_eyre::eyre::eyre!("invalid configuration: {e}"))
}

/// A partial census would silently under-report, so refuse to continue
/// when any root could not be scanned.
fn ensure_roots_scanned(census: &FileCensus) -> Result<()> {
    if census.is_complete() {
        return Ok(());
    }
    for root in &census.failed_roots {
        eprintln!("Cannot scan root: {}", root.display());
    }
    Err(color_eyre::eyre::eyre!(
        "{} root(s) could not be scanned",
        census.failed_roots.len()
    ))
}

/// Report duplicate directory trees.
fn run_dirs(
    paths: Vec<PathBuf>,
    min_size: &str,
    follow_symlinks: bool,
    skip_hidden: bool,
    format: OutputFormat,
) -> Result<()> {
    let config = session_config(paths, min_size, follow_symlinks, skip_hidden)?;

    eprintln!("Counting files under {} root(s)...", config.paths.len());
    let census = Census::new().collect(&config).context("Scan failed")?;
    ensure_roots_scanned(&census)?;
    eprintln!("Hashing {} candidate files...", census.files.len());

    let dedupe_config = DedupeConfig::builder()
        .min_size(config.min_file_size)
        .follow_symlinks(config.follow_symlinks)
        .build()
        .unwrap();
    let matches = Deduper::with_config(dedupe_config).find_matches(&census.files);

    let warning_count = census.warnings.len();
    let mut merger = TreeMerger::with_census(census);
    for file in matches.matches() {
        merger.feed(file)?;
    }
    let report = merger.finish();

    match format {
        OutputFormat::Text => {
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            report.write_to(&mut out)?;
            out.flush()?;

            if report.is_empty() {
                eprintln!("No duplicate directories found.");
            } else {
                eprintln!(
                    "{} duplicate directory group(s), {} directories total.",
                    report.group_count(),
                    report.total_directories()
                );
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    if warning_count > 0 {
        eprintln!("{warning_count} warning(s) during scan");
    }

    Ok(())
}

/// Report duplicate files individually.
fn run_files(
    paths: Vec<PathBuf>,
    min_size: &str,
    top: usize,
    follow_symlinks: bool,
    skip_hidden: bool,
    format: OutputFormat,
) -> Result<()> {
    let config = session_config(paths, min_size, follow_symlinks, skip_hidden)?;

    eprintln!("Counting files under {} root(s)...", config.paths.len());
    let census = Census::new().collect(&config).context("Scan failed")?;
    ensure_roots_scanned(&census)?;
    eprintln!("Hashing {} candidate files...", census.files.len());

    let dedupe_config = DedupeConfig::builder()
        .min_size(config.min_file_size)
        .follow_symlinks(config.follow_symlinks)
        .build()
        .unwrap();
    let mut report = Deduper::with_config(dedupe_config).find_matches(&census.files);
    if top > 0 && report.groups.len() > top {
        report.groups.truncate(top);
    }

    match format {
        OutputFormat::Text => {
            if !report.has_duplicates() {
                println!("No duplicate files found.");
            } else {
                println!(
                    "Found {} duplicate group(s) ({} files), {} reclaimable",
                    report.groups.len(),
                    report.total_duplicate_files(),
                    format_size(report.total_wasted_bytes)
                );
                println!();

                for (i, group) in report.groups.iter().enumerate() {
                    println!(
                        "Group {} ({} files, {} each, {} wasted)  {}",
                        i + 1,
                        group.count(),
                        format_size(group.size),
                        format_size(group.wasted_bytes()),
                        group.digest.to_hex()
                    );
                    for path in &group.paths {
                        println!("  {}", path.display());
                    }
                    println!();
                }
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    if !census.warnings.is_empty() {
        eprintln!("{} warning(s) during scan", census.warnings.len());
    }

    Ok(())
}

/// Format size in human-readable form.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

/// Parse a size string (e.g. "512", "4KB", "10MB", "1GB").
fn parse_size(s: &str) -> Result<u64> {
    let s = s.trim().to_uppercase();

    let (num, multiplier) = if s.ends_with("GB") || s.ends_with('G') {
        let num: f64 = strip_unit(&s).parse()?;
        (num, 1024u64 * 1024 * 1024)
    } else if s.ends_with("MB") || s.ends_with('M') {
        let num: f64 = strip_unit(&s).parse()?;
        (num, 1024 * 1024)
    } else if s.ends_with("KB") || s.ends_with('K') {
        let num: f64 = strip_unit(&s).parse()?;
        (num, 1024)
    } else if s.ends_with('B') {
        let num: f64 = strip_unit(&s).parse()?;
        (num, 1)
    } else {
        let num: f64 = s.parse()?;
        (num, 1)
    };

    Ok((num * multiplier as f64) as u64)
}

fn strip_unit(s: &str) -> &str {
    s.trim_end_matches(|c: char| !c.is_ascii_digit() && c != '.')
}
