//! dwg-forensics - Forensic examination of AutoCAD DWG R18/R21 files
//!
//! Validates the structure of a drawing, extracts its metadata, or shows
//! the distribution of its object handles. A directory is processed file
//! by file in parallel.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use dwg_forensics::{DwgReaderConfiguration, DwgSession};
use rayon::prelude::*;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

/// Forensic parser for AutoCAD DWG R2004 (AC1018) and R2007 (AC1021) files
#[derive(Parser, Debug)]
#[command(name = "dwg-forensics")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check the structural integrity of the file
    Validate(Target),
    /// Print the document metadata
    Metadata(Target),
    /// Print the object type histogram and the gaps in the handle sequence
    Handles(Target),
}

#[derive(Args, Debug)]
struct Target {
    #[command(flatten)]
    input: InputMode,

    /// Abort on the first localized decode error
    #[arg(long)]
    strict: bool,

    /// Skip page checksum and section CRC verification
    #[arg(long)]
    no_checksums: bool,

    /// Upper bound on a declared object size in bytes
    #[arg(long, default_value_t = dwg_forensics::io::dwg::reader::DEFAULT_MAX_OBJECT_SIZE)]
    max_object_size: u64,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct InputMode {
    /// Path to a single DWG file
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Path to a directory of DWG files
    #[arg(short, long)]
    directory: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Validate,
    Metadata,
    Handles,
}

impl Target {
    fn config(&self, operation: Operation) -> DwgReaderConfiguration {
        DwgReaderConfiguration {
            failsafe: !self.strict,
            verify_checksums: !self.no_checksums,
            // metadata does not need the object walk
            decode_objects: operation != Operation::Metadata,
            max_object_size: self.max_object_size,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let (operation, target) = match &cli.command {
        Command::Validate(target) => (Operation::Validate, target),
        Command::Metadata(target) => (Operation::Metadata, target),
        Command::Handles(target) => (Operation::Handles, target),
    };
    let config = target.config(operation);

    if let Some(ref file) = target.input.file {
        process_single_file(file, operation, config)
    } else if let Some(ref directory) = target.input.directory {
        process_directory(directory, operation, config)
    } else {
        bail!("Either --file or --directory must be specified")
    }
}

/// Process one file. Fatal decode errors end the run with a failure.
fn process_single_file(
    file: &Path,
    operation: Operation,
    config: DwgReaderConfiguration,
) -> Result<()> {
    if !file.is_file() {
        bail!("Input path is not a file: {}", file.display());
    }
    let output = run(file, operation, config)?;
    print!("{}", output);
    Ok(())
}

/// Process every `.dwg` file below a directory in parallel. A file that
/// cannot be decoded is reported and skipped.
fn process_directory(
    directory: &Path,
    operation: Operation,
    config: DwgReaderConfiguration,
) -> Result<()> {
    if !directory.is_dir() {
        bail!("Path is not a directory: {}", directory.display());
    }
    info!("Scanning directory: {}", directory.display());

    let files = collect_dwg_files(directory);
    if files.is_empty() {
        warn!("No .dwg files found in {}", directory.display());
        return Ok(());
    }
    debug!(count = files.len(), "processing files");

    let results: Vec<(PathBuf, Result<String>)> = files
        .into_par_iter()
        .map(|path| {
            let result = run(&path, operation, config.clone());
            (path, result)
        })
        .collect();

    let mut failed = 0usize;
    for (path, result) in &results {
        println!("== {}", path.display());
        match result {
            Ok(output) => print!("{}", output),
            Err(err) => {
                failed += 1;
                eprintln!("error: {:#}", err);
            }
        }
        println!();
    }
    info!(files = results.len(), failed, "batch finished");
    Ok(())
}

fn collect_dwg_files(directory: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(directory)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!("Skipping unreadable entry: {}", err);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("dwg"))
        })
        .collect();
    files.sort();
    files
}

/// Decode one file and render the requested operation.
fn run(path: &Path, operation: Operation, config: DwgReaderConfiguration) -> Result<String> {
    let session = DwgSession::open_with(path, config)
        .with_context(|| format!("Failed to decode {}", path.display()))?;
    let mut out = String::new();

    match operation {
        Operation::Validate => {
            let report = session.validate();
            let verdict = if report.is_valid() { "valid" } else { "invalid" };
            writeln!(
                out,
                "{} ({}): {}, {} issues",
                path.display(),
                session.document().version(),
                verdict,
                report.issues().len()
            )?;
            for finding in report.iter() {
                writeln!(out, "  {}", finding)?;
            }
        }
        Operation::Metadata => {
            let metadata = session.extract_metadata();
            if metadata.is_empty() {
                writeln!(out, "no metadata recovered")?;
            } else {
                write!(out, "{}", metadata)?;
            }
        }
        Operation::Handles => {
            let dist = session.handle_distribution();
            write!(out, "{}", dist)?;
        }
    }
    Ok(out)
}
