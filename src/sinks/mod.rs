use anyhow::Result;
use serde_json::{Map, Value};

use crate::search::Feature;

pub mod geojson;
pub mod geojsonl;

pub use self::geojson::GeoJsonSink;
pub use self::geojsonl::GeoJsonlSink;

pub trait DataSink: Send {
    fn add_feature(&mut self, feature: &Feature) -> Result<()>;
    fn finish(&mut self) -> Result<()>;
}

/// GeoJSON form of a feature. Non-object properties are wrapped as `{"value": ...}`;
/// the layer name, if any, becomes a `layer` member next to `properties`.
pub fn to_geojson(feature: &Feature) -> ::geojson::Feature {
    let properties = match Value::from(feature.properties.clone()) {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => Map::from_iter([("value".to_string(), other)]),
    };
    let foreign_members = feature
        .layer
        .as_ref()
        .map(|layer| Map::from_iter([("layer".to_string(), Value::String(layer.clone()))]));

    ::geojson::Feature {
        bbox: None,
        geometry: Some(::geojson::Geometry::from(&feature.geometry)),
        id: None,
        properties: Some(properties),
        foreign_members,
    }
}
