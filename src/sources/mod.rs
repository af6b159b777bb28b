//! Feature readers for GeoJSON and line-delimited GeoJSON input.

use anyhow::{Context, Result};
use geojson::GeoJson;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use crate::search::Feature;
use crate::value::Value;

/// Read all features from `path` (`-` for stdin).
///
/// `.geojsonl`, `.jsonl` and `.ndjson` files hold one GeoJSON object per line;
/// anything else is parsed as one GeoJSON document, falling back to lines.
/// Every feature gets `layer` as its layer name.
pub fn read_features(path: &Path, layer: Option<&str>) -> Result<Vec<Feature>> {
    let features = if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Source: Failed to read stdin")?;
        parse_text(&text)?
    } else if is_line_delimited(path) {
        let file = File::open(path).with_context(|| format!("Source: Failed to open {:?}", path))?;
        parse_lines(BufReader::new(file))?
    } else {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Source: Failed to read {:?}", path))?;
        parse_text(&text)?
    };

    tracing::info!("Source: {} features from {:?}", features.len(), path);
    Ok(match layer {
        Some(layer) => features.into_iter().map(|f| f.with_layer(layer)).collect(),
        None => features,
    })
}

fn is_line_delimited(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            matches!(
                ext.to_lowercase().as_str(),
                "geojsonl" | "geojsonseq" | "jsonl" | "ndjson"
            )
        })
}

/// Parse a whole GeoJSON document, or line-delimited GeoJSON if that fails.
pub fn parse_text(text: &str) -> Result<Vec<Feature>> {
    match text.parse::<GeoJson>() {
        Ok(geojson) => convert(geojson),
        Err(document_err) => parse_lines(text.as_bytes()).with_context(|| {
            format!("Source: Input is neither GeoJSON nor GeoJSONL ({document_err})")
        }),
    }
}

/// Parse line-delimited GeoJSON. Blank lines are ignored.
pub fn parse_lines<R: BufRead>(reader: R) -> Result<Vec<Feature>> {
    let mut features = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line.context("Source: Failed to read line")?;
        let line = line.trim_start_matches('\u{1e}').trim();
        if line.is_empty() {
            continue;
        }
        let geojson = line
            .parse::<GeoJson>()
            .with_context(|| format!("Source: Invalid GeoJSON on line {}", i + 1))?;
        features.extend(convert(geojson)?);
    }
    Ok(features)
}

fn convert(geojson: GeoJson) -> Result<Vec<Feature>> {
    match geojson {
        GeoJson::FeatureCollection(collection) => {
            let mut features = Vec::with_capacity(collection.features.len());
            for feature in collection.features {
                features.extend(convert_feature(feature)?);
            }
            Ok(features)
        }
        GeoJson::Feature(feature) => Ok(convert_feature(feature)?.into_iter().collect()),
        GeoJson::Geometry(geometry) => {
            let geometry = geo_types::Geometry::<f64>::try_from(geometry)
                .context("Source: Unsupported geometry")?;
            Ok(vec![Feature::new(geometry, Value::Object(Default::default()))])
        }
    }
}

/// Features without a geometry cannot be searched and are dropped.
fn convert_feature(feature: geojson::Feature) -> Result<Option<Feature>> {
    let Some(geometry) = feature.geometry else {
        tracing::debug!("Source: Skipping feature without geometry");
        return Ok(None);
    };
    let geometry =
        geo_types::Geometry::<f64>::try_from(geometry).context("Source: Unsupported geometry")?;
    let properties = feature
        .properties
        .map(|props| Value::from(serde_json::Value::Object(props)))
        .unwrap_or_else(|| Value::Object(Default::default()));
    Ok(Some(Feature::new(geometry, properties)))
}
