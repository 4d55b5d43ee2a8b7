use anyhow::{Context, Result, bail};
use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use labelfit::fit::{FitOptions, RotationStrategy};
use labelfit::formats::{Document, DxfOptions, Format, FormatOptions, KmlOptions, output_path};
use labelfit::matching::MatchStrategy;
use labelfit::relabel::{RelabelOptions, RelabelReport, relabel};
use serde::Serialize;
use walkdir::WalkDir;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Fit DXF text labels and KML/KMZ point markers inside their polygons",
    long_about = None
)]
struct Cli {
    /// .dxf, .kml or .kmz files, or directories to search for them
    #[arg(value_name = "INPUT", required = true)]
    inputs: Vec<String>,

    /// Output file (single input only). Defaults to INPUT with --suffix added.
    #[arg(short, long)]
    output: Option<String>,

    /// Suffix added to the file stem of each output
    #[arg(long, default_value = "_fitted")]
    suffix: String,

    /// JSON file with fit options; flags below override it
    #[arg(long, value_name = "JSON")]
    config: Option<String>,

    /// Rotation candidates to try
    #[arg(long, value_enum)]
    strategy: Option<RotationStrategy>,

    #[arg(long)]
    shrink_factor: Option<f64>,

    #[arg(long)]
    max_iterations: Option<usize>,

    /// Floor height (default: 0.3 x the label's own height)
    #[arg(long)]
    min_height: Option<f64>,

    /// Inward margin between text box and polygon edge
    #[arg(long)]
    safety_buffer: Option<f64>,

    /// Only try the centroid, not the eight shifted centers
    #[arg(long)]
    no_search_offsets: bool,

    /// Prefer the polygon containing the label over the nearest centroid
    #[arg(long)]
    containing_first: bool,

    /// Ignore polygons with this area or less (drawing units squared)
    #[arg(long, default_value_t = 1.0)]
    min_polygon_area: f64,

    /// DXF: only LWPOLYLINEs on this layer are polygons
    #[arg(long)]
    polygon_layer: Option<String>,

    /// DXF: only TEXT on this layer is moved
    #[arg(long)]
    text_layer: Option<String>,

    /// DXF: only TEXT with this ACI color is moved
    #[arg(long)]
    text_color: Option<u8>,

    /// DXF: move placed labels to this layer
    #[arg(long)]
    output_layer: Option<String>,

    /// DXF: give placed labels this ACI color
    #[arg(long)]
    output_color: Option<u8>,

    /// KML/KMZ: label height in meters used for fitting
    #[arg(long, default_value_t = 2.5)]
    label_height: f64,

    /// Write a JSON report of every label outcome
    #[arg(long, value_name = "JSON")]
    report: Option<String>,

    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Serialize)]
struct FileReport {
    path: Utf8PathBuf,
    output: Option<Utf8PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<RelabelReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if cli.verbose { "debug" } else { "info" }),
    )
    .init();

    let relabel_options = RelabelOptions {
        fit: fit_options(&cli)?,
        matching: if cli.containing_first {
            MatchStrategy::ContainingFirst
        } else {
            MatchStrategy::NearestCentroid
        },
        min_polygon_area: cli.min_polygon_area,
    };
    let format_options = FormatOptions {
        dxf: DxfOptions {
            polygon_layer: cli.polygon_layer.clone(),
            text_layer: cli.text_layer.clone(),
            text_color: cli.text_color,
            output_layer: cli.output_layer.clone(),
            output_color: cli.output_color,
        },
        kml: KmlOptions {
            label_height: cli.label_height,
        },
    };

    let files = collect_inputs(&cli.inputs, &cli.suffix)?;
    if files.is_empty() {
        bail!("No .dxf, .kml or .kmz files found");
    }
    if cli.output.is_some() && files.len() != 1 {
        bail!("--output needs exactly one input file, got {}", files.len());
    }

    let mut reports = Vec::with_capacity(files.len());
    let mut failed = 0usize;
    for path in &files {
        let output = match &cli.output {
            Some(o) => Utf8PathBuf::from(o),
            None => output_path(path, &cli.suffix)?,
        };
        match process_file(path, &output, &format_options, &relabel_options) {
            Ok(report) => reports.push(FileReport {
                path: path.clone(),
                output: Some(output),
                report: Some(report),
                error: None,
            }),
            Err(e) => {
                log::error!("{}: {:#}", path, e);
                failed += 1;
                reports.push(FileReport {
                    path: path.clone(),
                    output: None,
                    report: None,
                    error: Some(format!("{:#}", e)),
                });
            }
        }
    }

    if let Some(report_path) = &cli.report {
        let json = serde_json::to_string_pretty(&reports)?;
        std::fs::write(report_path, json)
            .with_context(|| format!("Failed to write report {}", report_path))?;
    }

    if failed > 0 {
        bail!("{} of {} files failed", failed, files.len());
    }
    Ok(())
}

fn fit_options(cli: &Cli) -> Result<FitOptions> {
    let mut options = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path))?;
            serde_json::from_str::<FitOptions>(&text)
                .with_context(|| format!("Failed to parse config {}", path))?
        }
        None => FitOptions::default(),
    };
    if let Some(s) = cli.strategy {
        options.rotation_strategy = Some(s);
    }
    if let Some(v) = cli.shrink_factor {
        options.shrink_factor = v;
    }
    if let Some(v) = cli.max_iterations {
        options.max_iterations = v;
    }
    if let Some(v) = cli.min_height {
        options.min_height = Some(v);
    }
    if let Some(v) = cli.safety_buffer {
        options.safety_buffer = v;
    }
    if cli.no_search_offsets {
        options.search_offsets = false;
    }
    options.validate()?;
    Ok(options)
}

/// Expand directories into the supported files below them, skipping our own
/// earlier outputs.
fn collect_inputs(inputs: &[String], suffix: &str) -> Result<Vec<Utf8PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        let path = Utf8PathBuf::from(input);
        if !path.is_dir() {
            files.push(path);
            continue;
        }
        for entry in WalkDir::new(&path).sort_by_file_name() {
            let entry = entry.with_context(|| format!("Failed to walk {}", path))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(p) = Utf8PathBuf::from_path_buf(entry.into_path()) else {
                log::warn!("Skipping non-UTF8 path under {}", path);
                continue;
            };
            let is_output =
                !suffix.is_empty() && p.file_stem().is_some_and(|s| s.ends_with(suffix));
            if Format::from_path(&p).is_some() && !is_output {
                files.push(p);
            }
        }
    }
    Ok(files)
}

fn process_file(
    path: &Utf8Path,
    output: &Utf8Path,
    format_options: &FormatOptions,
    options: &RelabelOptions,
) -> Result<RelabelReport> {
    let mut doc = Document::open(path, format_options)?;
    let report = relabel(&mut doc, options);
    doc.save(output)?;
    log::info!(
        "{}: {} labels in {} polygons: {} placed, {} fallback, {} unmatched, {} failed -> {}",
        path,
        report.labels,
        report.polygons,
        report.placed,
        report.fallback,
        report.unmatched,
        report.failed,
        output
    );
    Ok(report)
}
