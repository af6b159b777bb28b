use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use geo_types::{Geometry, Point};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::config::{RuntimeConfig, SearchConfig};
use crate::search::{Feature, OnUnsupported, SearchMatcher, SearchRequest, par_search};
use crate::sinks::{DataSink, GeoJsonSink, GeoJsonlSink};
use crate::sources::read_features;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Input features (.geojson, .geojsonl, or - for stdin)
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output file (.geojson, .geojsonl, or - for stdout)
    #[arg(short, long)]
    pub output: PathBuf,

    /// Output format (auto-detected if omitted)
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Search request file (YAML, JSON or TOML)
    #[arg(short, long, env = "MAPQUERY_REQUEST")]
    pub request: Option<PathBuf>,

    /// Filter expression, e.g. "type = 'road' AND maxspeed > 50"
    #[arg(long)]
    pub filter: Option<String>,

    /// Regular expression that some property value must match in full
    #[arg(long)]
    pub regex: Option<String>,

    /// Search around a point given as x,y in the request projection
    #[arg(long, allow_hyphen_values = true)]
    pub near: Option<Position>,

    /// Search radius in meters
    #[arg(long)]
    pub radius: Option<f32>,

    /// Projection of the search geometry and the input (epsg:4326, epsg:3857)
    #[arg(long)]
    pub projection: Option<String>,

    /// Layer name given to every input feature
    #[arg(long)]
    pub layer: Option<String>,

    /// Number of threads (default: all cores)
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Skip features with unsupported geometries instead of failing
    #[arg(long)]
    pub skip_unsupported: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum OutputFormat {
    #[value(name = "geojson")]
    GeoJson,
    #[value(name = "geojsonl", alias = "jsonl")]
    GeoJsonl,
}

/// A coordinate pair given on the command line as `x,y`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl FromStr for Position {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (x, y) = value
            .split_once(',')
            .ok_or_else(|| format!("expected x,y but got '{value}'"))?;
        let parse = |part: &str| {
            part.trim()
                .parse::<f64>()
                .map_err(|e| format!("invalid coordinate '{part}': {e}"))
        };
        Ok(Position {
            x: parse(x)?,
            y: parse(y)?,
        })
    }
}

pub fn output_format_label(format: &OutputFormat) -> &'static str {
    match format {
        OutputFormat::GeoJson => "geojson",
        OutputFormat::GeoJsonl => "geojsonl",
    }
}

/// Explicit format, or the one implied by the output extension.
pub fn detect_format(format: Option<OutputFormat>, output: &Path) -> Result<OutputFormat> {
    if output == Path::new("-") {
        return Ok(format.unwrap_or(OutputFormat::GeoJsonl));
    }
    format
        .or_else(|| {
            let ext = output.extension()?.to_str()?;
            match ext.to_lowercase().as_str() {
                "geojson" => Some(OutputFormat::GeoJson),
                "geojsonl" | "jsonl" | "ndjson" | "json" => Some(OutputFormat::GeoJsonl),
                _ => None,
            }
        })
        .context("CLI: Could not detect output format from extension; use --format")
}

pub fn init_sink(format: &OutputFormat, output: &Path) -> Result<Box<dyn DataSink + Send>> {
    let to_stdout = output == Path::new("-");
    if to_stdout {
        tracing::info!("Sink: {} -> stdout", output_format_label(format));
    } else {
        tracing::info!("Sink: {} -> {:?}", output_format_label(format), output);
    }
    let sink: Box<dyn DataSink + Send> = match (format, to_stdout) {
        (OutputFormat::GeoJson, true) => Box::new(GeoJsonSink::stdout()?),
        (OutputFormat::GeoJson, false) => Box::new(GeoJsonSink::new(output)?),
        (OutputFormat::GeoJsonl, true) => Box::new(GeoJsonlSink::stdout()?),
        (OutputFormat::GeoJsonl, false) => Box::new(GeoJsonlSink::new(output)?),
    };
    Ok(sink)
}

/// Request file settings with command line overrides applied.
pub fn load_search_config(cli: &Cli) -> Result<SearchConfig> {
    let mut config = match &cli.request {
        Some(path) => SearchConfig::load(path)?,
        None => SearchConfig::default(),
    };
    if let Some(filter) = &cli.filter {
        config.filter = Some(filter.clone());
    }
    if let Some(regex) = &cli.regex {
        config.regex = Some(regex.clone());
    }
    if let Some(projection) = &cli.projection {
        config.projection = projection.clone();
    }
    if let Some(radius) = cli.radius {
        config.radius = radius;
    }
    if let Some(layer) = &cli.layer {
        config.layer = Some(layer.clone());
    }
    Ok(config)
}

pub fn build_request(cli: &Cli, config: &SearchConfig) -> Result<SearchRequest> {
    let request = config.to_request()?;
    if let Some(near) = cli.near {
        request.set_geometry(Some(Geometry::Point(Point::new(near.x, near.y))));
    }
    Ok(request)
}

/// Search `features` and write the accepted ones. Returns the number written.
pub fn run_search(
    features: &[Feature],
    request: &SearchRequest,
    runtime: &RuntimeConfig,
    sink: &mut dyn DataSink,
) -> Result<usize> {
    let matcher = SearchMatcher::compile(request).context("CLI: Invalid search request")?;
    let on_unsupported = if runtime.skip_unsupported {
        OnUnsupported::Skip
    } else {
        OnUnsupported::Fail
    };

    let projection = request.projection();
    let accepted = par_search(features, &matcher, projection.as_ref(), on_unsupported)
        .context("Search: Failed to search features")?;

    for feature in &accepted {
        sink.add_feature(feature)
            .context("Sink: Failed to write feature")?;
    }
    Ok(accepted.len())
}

/// Load input, search and write output for a parsed command line.
pub fn run(cli: &Cli, runtime: &RuntimeConfig) -> Result<usize> {
    let format = detect_format(cli.format, &cli.output)?;
    let config = load_search_config(cli)?;
    let request = build_request(cli, &config)?;
    tracing::info!("{}", request);

    let features = read_features(&cli.input, config.layer.as_deref())?;

    let mut sink = init_sink(&format, &cli.output)?;
    let count = run_search(&features, &request, runtime, sink.as_mut())?;
    sink.finish().context("Sink: Failed to finalize sink")?;
    Ok(count)
}
