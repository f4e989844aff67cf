//! Check dcd trajectories against reference output, within a tolerance.
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use dcdcheck::compare::{DEFAULT_EPSILON, DEFAULT_SCALE};
use dcdcheck::{compare_files, Endianness, FileKind, Overrides, Report, Tolerance};
use tracing::{debug, error, info};
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ByteOrder {
    Little,
    Big,
    /// Decide from the header size word of each file.
    Detect,
}

impl From<ByteOrder> for Endianness {
    fn from(order: ByteOrder) -> Self {
        match order {
            ByteOrder::Little => Endianness::Little,
            ByteOrder::Big => Endianness::Big,
            ByteOrder::Detect => Endianness::Detect,
        }
    }
}

/// Compare generated dcd trajectories against expected ones.
///
/// If both paths are directories, every `.dcd` file in EXPECTED that also exists in ACTUAL is
/// compared. Other shared outputs, such as headers, xtc files, or eigenvectors, are counted but
/// not compared.
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// Expected trajectory, or a directory of expected output.
    expected: PathBuf,

    /// Actual trajectory, or a directory of actual output.
    actual: PathBuf,

    /// Largest absolute difference between two values that still passes.
    #[arg(short, long, default_value_t = DEFAULT_EPSILON)]
    epsilon: f64,

    /// Factor applied to the expected values before comparing.
    #[arg(short, long, default_value_t = DEFAULT_SCALE)]
    scale: f64,

    /// Compare the absolute values only.
    #[arg(long)]
    ignore_sign: bool,

    /// Simulation configuration file with `## epsilon = ...` or `## scaling_factor = ...` lines
    /// that override the tolerance.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Byte order of the trajectories.
    #[arg(long, value_enum, default_value_t = ByteOrder::Little)]
    byte_order: ByteOrder,

    /// Stop at the first failed comparison.
    #[arg(long)]
    error_failure: bool,

    /// Increase verbosity. Repeat to print every differing value.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Print nothing.
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

fn setup_logging(verbosity: u8, quiet: bool) {
    let level_filter = if quiet {
        LevelFilter::OFF
    } else {
        match verbosity {
            0 => LevelFilter::INFO,
            1 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    };

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .compact();

    tracing_subscriber::registry()
        .with(level_filter)
        .with(stderr_layer)
        .init();
}

fn main() -> ExitCode {
    let args = Args::parse();
    setup_logging(args.verbose, args.quiet);
    debug!("parsed arguments: {args:?}");

    match run(&args) {
        Ok(report) => {
            report.log_summary();
            if report.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> dcdcheck::Result<Report> {
    let mut tolerance = Tolerance::new(args.epsilon)
        .with_scale(args.scale)
        .with_ignore_sign(args.ignore_sign);
    if let Some(config) = &args.config {
        let overrides = Overrides::read(config)?;
        tolerance = tolerance.with_overrides(&overrides);
    }
    let endianness = args.byte_order.into();

    let batch = args.expected.is_dir() && args.actual.is_dir();
    let pairs = if batch {
        output_pairs(&args.expected, &args.actual)?
    } else {
        // An explicitly named pair is always compared as a trajectory.
        vec![(args.expected.clone(), args.actual.clone())]
    };

    let mut report = Report::new();
    for (expected, actual) in pairs {
        let kind = FileKind::from_path(&expected);
        if batch && !kind.is_compared() {
            report.record_skipped(&expected, &actual);
            continue;
        }

        info!("testing {} against {}", actual.display(), expected.display());
        match compare_files(&expected, &actual, &tolerance, endianness) {
            Ok(comparison) => report.record(&expected, &actual, &comparison),
            Err(err) => report.record_error(&expected, &actual, &err),
        }

        if args.error_failure && !report.is_success() {
            break;
        }
    }

    Ok(report)
}

/// Pair up every file in `expected` with the file of the same name in `actual`, if it exists.
fn output_pairs(expected: &Path, actual: &Path) -> std::io::Result<Vec<(PathBuf, PathBuf)>> {
    let mut pairs = Vec::new();
    for entry in std::fs::read_dir(expected)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name() else {
            continue;
        };
        let output = actual.join(name);
        if output.is_file() {
            pairs.push((path, output));
        } else {
            debug!("no output for {}", path.display());
        }
    }
    pairs.sort();
    Ok(pairs)
}
