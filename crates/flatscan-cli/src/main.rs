// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Flatscan — command-line document scanner
//
// Entry point. Initialises logging, decodes the input photos, runs the
// scanner and writes the rectified pages.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use flatscan_core::config::ScanConfig;
use flatscan_core::error::Result;
use flatscan_core::human_errors::humanize_error;
use flatscan_core::{Bitmap, OrderedQuad};
use flatscan_document::image::OutputFormat;
use flatscan_document::{DocumentScanner, ImageCodec, ImageCrateCodec, highlight_document};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

/// Outline colour for `--highlight` previews.
const HIGHLIGHT_COLOR: [u8; 3] = [255, 48, 48];

#[derive(Parser)]
#[command(name = "flatscan")]
#[command(about = "Find the document in a photo and flatten it")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect and rectify the document in each input photo.
    Scan {
        /// Input photos. Several are processed in parallel.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Directory for the rectified pages.
        #[arg(long)]
        out_dir: PathBuf,

        /// JSON configuration file (missing fields keep their defaults).
        #[arg(long)]
        config: Option<PathBuf>,

        /// Fill value for output pixels outside the photo.
        #[arg(long)]
        background: Option<u8>,

        /// Output format: png, jpg or jpeg.
        #[arg(long, default_value = "png")]
        format: String,

        /// Also write the photo with the detected outline drawn on it.
        #[arg(long)]
        highlight: bool,

        /// Also write the preprocessed and edge images.
        #[arg(long)]
        dump_stages: bool,
    },

    /// Print the detected document corners as JSON.
    Detect {
        /// Input photo.
        input: PathBuf,

        /// JSON configuration file.
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print the default configuration as JSON.
    Config,
}

/// Options shared by every file in one `scan` invocation.
struct ScanJob {
    scanner: DocumentScanner,
    out_dir: PathBuf,
    format: OutputFormat,
    extension: String,
    highlight: bool,
    dump_stages: bool,
}

#[derive(Serialize)]
struct DetectReport {
    input: String,
    corners: OrderedQuad,
    output_width: u32,
    output_height: u32,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Scan {
            inputs,
            out_dir,
            config,
            background,
            format,
            highlight,
            dump_stages,
        } => run_scan(
            &inputs,
            out_dir,
            config.as_deref(),
            background,
            &format,
            highlight,
            dump_stages,
        ),
        Commands::Detect { input, config } => run_detect(&input, config.as_deref()),
        Commands::Config => run_config(),
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            report_failure(None, &err);
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<ScanConfig> {
    match path {
        Some(path) => {
            info!(path = %path.display(), "Loading configuration");
            ScanConfig::from_json_file(path)
        }
        None => Ok(ScanConfig::default()),
    }
}

fn report_failure(input: Option<&Path>, err: &flatscan_core::FlatscanError) {
    let human = humanize_error(err);
    match input {
        Some(path) => eprintln!("{}: {}", path.display(), human.message),
        None => eprintln!("{}", human.message),
    }
    eprintln!("  {}", human.suggestion);
    debug!(kind = err.kind(), %err, "Underlying error");
}

// -- scan ---------------------------------------------------------------------

fn run_scan(
    inputs: &[PathBuf],
    out_dir: PathBuf,
    config_path: Option<&Path>,
    background: Option<u8>,
    format: &str,
    highlight: bool,
    dump_stages: bool,
) -> Result<ExitCode> {
    let mut config = load_config(config_path)?;
    if let Some(background) = background {
        config.warp.background = background;
    }
    let format = OutputFormat::from_extension(format).ok_or_else(|| {
        flatscan_core::FlatscanError::InvalidInput(format!("unsupported output format {format:?}"))
    })?;
    let extension = match format {
        OutputFormat::Png => "png",
        OutputFormat::Jpeg { .. } => "jpg",
    };
    std::fs::create_dir_all(&out_dir)?;

    let job = ScanJob {
        scanner: DocumentScanner::new(config)?,
        out_dir,
        format,
        extension: extension.into(),
        highlight,
        dump_stages,
    };

    info!(files = inputs.len(), "Scanning");
    let results: Vec<(&PathBuf, Result<PathBuf>)> = inputs
        .par_iter()
        .map(|input| (input, scan_file(&job, input)))
        .collect();

    let mut failed = 0usize;
    for (input, result) in &results {
        match result {
            Ok(output) => println!("{} -> {}", input.display(), output.display()),
            Err(err) => {
                failed += 1;
                report_failure(Some(input), err);
            }
        }
    }

    info!(scanned = results.len() - failed, failed, "Done");
    Ok(if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn scan_file(job: &ScanJob, input: &Path) -> Result<PathBuf> {
    let codec = ImageCrateCodec;
    let bitmap = codec.open(input)?;
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "scan".into());
    let sibling = |suffix: &str, ext: &str| job.out_dir.join(format!("{stem}.{suffix}.{ext}"));

    // Written before detection so a failed scan can still be inspected.
    if job.dump_stages {
        let stages = job.scanner.debug_stages(&bitmap)?;
        codec.save(&stages.preprocessed, &sibling("gray", "png"))?;
        codec.save(&visible_edges(&stages.edges)?, &sibling("edges", "png"))?;
    }

    let outcome = job.scanner.scan(&bitmap)?;

    if job.highlight {
        let preview = highlight_document(&bitmap, &outcome.quad, HIGHLIGHT_COLOR, 3)?;
        codec.save(&preview, &sibling("detected", "png"))?;
    }

    let output = sibling("scan", &job.extension);
    let bytes = codec.encode(&outcome.image, job.format)?;
    std::fs::write(&output, bytes)?;
    Ok(output)
}

/// Stretch a 0/1 edge map to black and white.
fn visible_edges(edges: &Bitmap) -> Result<Bitmap> {
    Bitmap::gray_from_fn(edges.width(), edges.height(), |x, y| {
        if edges.pixel(x, y)[0] != 0 { 255 } else { 0 }
    })
}

// -- detect -------------------------------------------------------------------

fn run_detect(input: &Path, config_path: Option<&Path>) -> Result<ExitCode> {
    let scanner = DocumentScanner::new(load_config(config_path)?)?;
    let bitmap = ImageCrateCodec.open(input)?;
    let corners = scanner.detect(&bitmap)?;
    let (output_width, output_height) = corners.target_size();

    let report = DetectReport {
        input: input.display().to_string(),
        corners,
        output_width,
        output_height,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(ExitCode::SUCCESS)
}

// -- config -------------------------------------------------------------------

fn run_config() -> Result<ExitCode> {
    println!("{}", serde_json::to_string_pretty(&ScanConfig::default())?);
    Ok(ExitCode::SUCCESS)
}
