//! Mach-O Inspect CLI
//!
//! Command-line tool for inspecting Mach-O and universal binaries.

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use macho_inspect::formatter::{
    HumanFormatter, JsonFormatter, Report, ReportFormatter, ShortFormatter,
};
use macho_inspect::{ByteCursor, ParseOptions};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Mach-O and universal binary inspector.
///
/// Prints the headers, load commands, linked libraries, run paths,
/// encryption state and code-signature location of each image.
#[derive(Parser, Debug)]
#[command(name = "macho-inspect")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input file(s) to inspect
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Output format
    #[arg(short, long, default_value = "human")]
    format: OutputFormat,

    /// Only show the slice for this architecture (e.g. arm64, armv7)
    #[arg(short, long)]
    arch: Option<String>,

    /// Do not cross-check load command sizes
    #[arg(long)]
    lenient: bool,

    /// Write the code-signature bytes of the first image to this path
    #[arg(long, value_name = "PATH")]
    dump_signature: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode (only output essential info)
    #[arg(short, long)]
    quiet: bool,
}

/// Output format options.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
    /// One line per image
    Short,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("macho_inspect=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    let options = if args.lenient {
        ParseOptions::lenient()
    } else {
        ParseOptions::new()
    };

    let formatter: Box<dyn ReportFormatter> = match args.format {
        OutputFormat::Human if args.quiet => Box::new(HumanFormatter::quiet()),
        OutputFormat::Human if args.verbose => Box::new(HumanFormatter::verbose()),
        OutputFormat::Human => Box::new(HumanFormatter::new()),
        OutputFormat::Json => Box::new(JsonFormatter::new()),
        OutputFormat::Short => Box::new(ShortFormatter::new()),
    };

    let mut success = true;

    for path in &args.files {
        match inspect_file(path, &options, &args, formatter.as_ref()) {
            Ok(()) => {}
            Err(e) => {
                if !args.quiet {
                    eprintln!("Error: {e:#}");
                }
                success = false;
            }
        }
    }

    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn inspect_file(
    path: &Path,
    options: &ParseOptions,
    args: &Args,
    formatter: &dyn ReportFormatter,
) -> anyhow::Result<()> {
    let data = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let mut cursor = ByteCursor::new(Cursor::new(data.as_slice()));

    let report = Report::read(&mut cursor, options, args.arch.as_deref())
        .with_context(|| format!("parsing {}", path.display()))?;
    if report.images.is_empty() {
        bail!(
            "{}: no image for architecture {}",
            path.display(),
            args.arch.as_deref().unwrap_or("?")
        );
    }

    print!("{}", formatter.format_report(&report, path));

    if let Some(out) = &args.dump_signature {
        let image = &report.images[0];
        let Some(signature) = image
            .code_signature_data(&mut cursor)
            .with_context(|| format!("slicing code signature of {}", path.display()))?
        else {
            bail!("{}: image {} is not signed", path.display(), image.cpu_name());
        };
        std::fs::write(out, &signature)
            .with_context(|| format!("writing {}", out.display()))?;
        tracing::info!(bytes = signature.len(), path = %out.display(), "code signature written");
    }

    Ok(())
}
