use anyhow::{Context, Result};
use geo_types::Geometry;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use crate::geometry::{Projection, projection_from_name};
use crate::search::SearchRequest;

/// Search request file (YAML, JSON or TOML, chosen by extension).
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SearchConfig {
    #[serde(default)]
    pub filter: Option<String>,
    #[serde(default)]
    pub regex: Option<String>,
    /// Projection of `geometry`.
    #[serde(default = "default_projection")]
    pub projection: String,
    /// Search radius in meters.
    #[serde(default)]
    pub radius: f32,
    /// Search geometry as a GeoJSON geometry object.
    #[serde(default)]
    pub geometry: Option<serde_json::Value>,
    /// Layer name given to every input feature.
    #[serde(default)]
    pub layer: Option<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            filter: None,
            regex: None,
            projection: default_projection(),
            radius: 0.0,
            geometry: None,
            layer: None,
        }
    }
}

fn default_projection() -> String {
    "epsg:4326".to_string()
}

impl SearchConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path))
            .build()
            .with_context(|| format!("Config: Failed to read {:?}", path))?;
        settings
            .try_deserialize()
            .with_context(|| format!("Config: Invalid search request in {:?}", path))
    }

    pub fn projection(&self) -> Result<Arc<dyn Projection>> {
        projection_from_name(&self.projection)
            .with_context(|| format!("Config: Unknown projection '{}'", self.projection))
    }

    pub fn search_geometry(&self) -> Result<Option<Geometry<f64>>> {
        let Some(value) = &self.geometry else {
            return Ok(None);
        };
        let geometry = geojson::Geometry::from_json_value(value.clone())
            .context("Config: Search geometry is not a GeoJSON geometry")?;
        let geometry = Geometry::<f64>::try_from(geometry)
            .context("Config: Unsupported search geometry")?;
        Ok(Some(geometry))
    }

    /// Build a search request from this configuration.
    pub fn to_request(&self) -> Result<SearchRequest> {
        let request = SearchRequest::new(self.projection()?);
        request.set_filter_expression(self.filter.clone().unwrap_or_default());
        request.set_regex_filter(self.regex.clone().unwrap_or_default());
        request.set_geometry(self.search_geometry()?);
        request.set_search_radius(self.radius);
        Ok(request)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct RuntimeConfig {
    /// Worker threads for the search; all cores when unset.
    pub threads: Option<usize>,
    /// Skip features with unsupported geometries instead of failing.
    pub skip_unsupported: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::with_suffix(suffix).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_yaml_request() {
        let file = write_config(
            ".yaml",
            r#"
filter: "type = 'road' AND maxspeed > 50"
regex: "caf.*"
radius: 250.0
geometry:
  type: Point
  coordinates: [24.75, 59.43]
layer: poi
"#,
        );
        let config = SearchConfig::load(file.path()).unwrap();
        assert_eq!(config.projection, "epsg:4326");
        assert_eq!(config.layer.as_deref(), Some("poi"));

        let request = config.to_request().unwrap();
        assert_eq!(request.filter_expression(), "type = 'road' AND maxspeed > 50");
        assert_eq!(request.regex_filter(), "caf.*");
        assert_eq!(request.search_radius(), 250.0);
        assert!(matches!(request.geometry(), Some(Geometry::Point(_))));
    }

    #[test]
    fn loads_json_request_with_defaults() {
        let file = write_config(".json", r#"{"projection": "EPSG:3857"}"#);
        let config = SearchConfig::load(file.path()).unwrap();
        let request = config.to_request().unwrap();
        assert_eq!(request.projection().name(), "EPSG:3857");
        assert!(request.filter_expression().is_empty());
        assert!(request.geometry().is_none());
    }

    #[test]
    fn rejects_unknown_projection() {
        let config = SearchConfig {
            projection: "epsg:2154".into(),
            ..SearchConfig::default()
        };
        let err = config.to_request().unwrap_err();
        assert!(err.to_string().contains("Unknown projection"));
    }

    #[test]
    fn rejects_invalid_geometry() {
        let config = SearchConfig {
            geometry: Some(serde_json::json!({"type": "Blob"})),
            ..SearchConfig::default()
        };
        assert!(config.search_geometry().is_err());
    }
}
