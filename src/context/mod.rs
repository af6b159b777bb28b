//! Evaluation contexts: how expression variables resolve to values.
//!
//! A context borrows the data it exposes for the duration of one evaluation and
//! owns nothing. Besides plain property lookup, feature and style contexts answer
//! a few reserved names computed from the geometry:
//!
//! | name                 | feature context | style context |
//! |----------------------|-----------------|---------------|
//! | `layer::name`        | string          | -             |
//! | `geometry::type`     | string          | string        |
//! | `geometry::vertices` | integer         | double        |
//! | `view::zoom`         | -               | double        |

use geo_types::Geometry;
use std::collections::{BTreeMap, HashMap};

use crate::geometry::{geometry_type_name, vertex_count};
use crate::value::Value;

pub const LAYER_NAME: &str = "layer::name";
pub const GEOMETRY_TYPE: &str = "geometry::type";
pub const GEOMETRY_VERTICES: &str = "geometry::vertices";
pub const VIEW_ZOOM: &str = "view::zoom";
/// Name under which a scalar (non-object) property bag is exposed.
pub const SCALAR_VALUE: &str = "value";

/// Resolves variable names to values. A missing name evaluates as null.
pub trait Context {
    fn lookup(&self, name: &str) -> Option<Value>;

    /// Whether a string compared against a number is read as a number.
    fn coerces_numeric_strings(&self) -> bool {
        false
    }
}

impl Context for HashMap<String, Value> {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl Context for BTreeMap<String, Value> {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

/// A bare property value: objects expose their keys, scalars answer to `value`,
/// arrays and null expose nothing.
impl Context for Value {
    fn lookup(&self, name: &str) -> Option<Value> {
        match self {
            Value::Object(map) => map.get(name).cloned(),
            Value::Null | Value::Array(_) => None,
            scalar => (name == SCALAR_VALUE).then(|| scalar.clone()),
        }
    }
}

/// Context of one feature during search.
#[derive(Debug, Clone, Copy)]
pub struct FeatureContext<'a> {
    pub geometry: &'a Geometry<f64>,
    pub properties: &'a Value,
    pub layer_name: Option<&'a str>,
}

impl<'a> FeatureContext<'a> {
    pub fn new(
        geometry: &'a Geometry<f64>,
        properties: &'a Value,
        layer_name: Option<&'a str>,
    ) -> Self {
        Self {
            geometry,
            properties,
            layer_name,
        }
    }
}

impl Context for FeatureContext<'_> {
    fn lookup(&self, name: &str) -> Option<Value> {
        match name {
            LAYER_NAME if self.layer_name.is_some() => self.layer_name.map(Value::from),
            GEOMETRY_TYPE => Some(Value::from(geometry_type_name(self.geometry))),
            GEOMETRY_VERTICES => Some(Value::Int(vertex_count(self.geometry) as i64)),
            _ => self.properties.lookup(name),
        }
    }
}

/// Context of a feature being styled: string metadata plus view and geometry
/// variables. Numbers are exposed as doubles.
#[derive(Debug, Clone, Copy)]
pub struct StyleContext<'a> {
    pub zoom: f32,
    pub geometry: Option<&'a Geometry<f64>>,
    pub metadata: &'a HashMap<String, String>,
}

impl<'a> StyleContext<'a> {
    pub fn new(
        zoom: f32,
        geometry: Option<&'a Geometry<f64>>,
        metadata: &'a HashMap<String, String>,
    ) -> Self {
        Self {
            zoom,
            geometry,
            metadata,
        }
    }
}

impl Context for StyleContext<'_> {
    fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.metadata.get(name) {
            return Some(Value::from(value.as_str()));
        }
        match name {
            VIEW_ZOOM => Some(Value::Double(f64::from(self.zoom))),
            GEOMETRY_TYPE => Some(Value::from(
                self.geometry.map_or("unknown", geometry_type_name),
            )),
            GEOMETRY_VERTICES => Some(Value::Double(
                self.geometry.map_or(0, vertex_count) as f64,
            )),
            _ => None,
        }
    }

    /// Metadata values are always strings, so numeric rules compare them as numbers.
    fn coerces_numeric_strings(&self) -> bool {
        true
    }
}
