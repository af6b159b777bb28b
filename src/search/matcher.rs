//! Compiled search: regex, expression and proximity tests for one request.

use geo::BoundingRect;
use geo_types::{Coord, Geometry, LineString, Polygon, Rect, coord};
use regex::Regex;

use super::request::{RequestState, SearchRequest};
use crate::context::FeatureContext;
use crate::dsl::{Expression, anchored_regex, evaluate, parse_expression};
use crate::error::{GeometryError, ParseError};
use crate::geometry::{
    Epsg3857, Projection, center, coord_to_working, expand_bounds, min_distance, to_working,
    working_projection,
};
use crate::value::Value;

/// Search bounds never reach the antimeridian of the working projection.
const WORLD_X_FRACTION: f64 = 0.9999;
/// Latitude beyond which the radius correction stops growing.
const MAX_CORRECTION_LATITUDE: f64 = 89.9;

/// Immutable snapshot of a [`SearchRequest`], ready to test features.
///
/// Geometry, radius and bounds are all in the working projection.
#[derive(Debug, Clone)]
pub struct SearchMatcher {
    regex: Option<Regex>,
    expression: Option<Expression>,
    geometry: Option<Geometry<f64>>,
    radius: f64,
    search_bounds: Rect<f64>,
}

impl SearchMatcher {
    /// Compile a request. Without a search geometry the search bounds cover the world.
    pub fn compile(request: &SearchRequest) -> Result<Self, ParseError> {
        Self::from_state(&request.snapshot(), working_projection().bounds())
    }

    /// Compile a request whose data covers `extent` (in `extent_projection`).
    /// Without a search geometry the search bounds are that extent.
    pub fn compile_within(
        request: &SearchRequest,
        extent: Rect<f64>,
        extent_projection: &dyn Projection,
    ) -> Result<Self, ParseError> {
        let extent = crate::geometry::bounds_to_working(extent, extent_projection);
        Self::from_state(&request.snapshot(), extent)
    }

    fn from_state(state: &RequestState, default_bounds: Rect<f64>) -> Result<Self, ParseError> {
        let regex = if state.regex_filter.is_empty() {
            None
        } else {
            let regex = anchored_regex(&state.regex_filter, false).map_err(|e| {
                ParseError::new(
                    format!("Invalid regular expression: {e}"),
                    state.regex_filter.clone(),
                )
            })?;
            Some(regex)
        };

        let expression = if state.filter_expression.trim().is_empty() {
            None
        } else {
            Some(parse_expression(&state.filter_expression)?)
        };

        let mut radius = f64::from(state.search_radius);
        let mut search_bounds = default_bounds;
        let geometry = match &state.geometry {
            Some(geometry) => {
                let geometry = normalize(geometry);
                let projection = state.projection.as_ref();

                if let Some(pos) = center(&geometry) {
                    let lat = projection.to_wgs84(pos).y.abs().min(MAX_CORRECTION_LATITUDE);
                    radius /= lat.to_radians().cos();
                }

                let working = to_working(&geometry, projection)
                    .map_err(|e| ParseError::new(e.to_string(), state.to_string()))?;
                if let Some(bounds) = working.bounding_rect() {
                    search_bounds = clamp_x(expand_bounds(bounds, radius));
                }
                Some(working)
            }
            None => None,
        };

        tracing::debug!(
            "Compiled {} (effective radius {:.1} m, bounds {:?})",
            state,
            radius,
            search_bounds
        );

        Ok(Self {
            regex,
            expression,
            geometry,
            radius,
            search_bounds,
        })
    }

    pub fn expression(&self) -> Option<&Expression> {
        self.expression.as_ref()
    }

    pub fn regex(&self) -> Option<&Regex> {
        self.regex.as_ref()
    }

    /// Search geometry in the working projection.
    pub fn geometry(&self) -> Option<&Geometry<f64>> {
        self.geometry.as_ref()
    }

    /// Latitude-corrected search radius in working projection units.
    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Area worth visiting, in the working projection.
    pub fn search_bounds(&self) -> Rect<f64> {
        self.search_bounds
    }

    /// Test one feature: regex over all property values, then the filter
    /// expression, then the distance to the search geometry.
    pub fn accepts(
        &self,
        geometry: &Geometry<f64>,
        projection: &dyn Projection,
        layer_name: Option<&str>,
        properties: &Value,
    ) -> Result<bool, GeometryError> {
        if let Some(regex) = &self.regex
            && !regex_matches(regex, properties)
        {
            return Ok(false);
        }

        if let Some(expression) = &self.expression {
            let ctx = FeatureContext::new(geometry, properties, layer_name);
            if !evaluate(expression, &ctx) {
                return Ok(false);
            }
        }

        if let Some(search_geometry) = &self.geometry {
            let working = to_working(geometry, projection)?;
            if min_distance(&working, search_geometry)? > self.radius {
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// True if no feature inside `bounds` (in `projection`) can be within the
    /// search radius, so the whole area can be skipped.
    pub fn rejects_bounds(&self, bounds: Rect<f64>, projection: &dyn Projection) -> bool {
        let Some(search_geometry) = &self.geometry else {
            return false;
        };

        let (min, max) = (bounds.min(), bounds.max());
        let corners: Vec<Coord<f64>> = [
            min,
            coord! { x: max.x, y: min.y },
            max,
            coord! { x: min.x, y: max.y },
            min,
        ]
        .into_iter()
        .map(|pos| coord_to_working(pos, projection))
        .collect();
        let area = Geometry::Polygon(Polygon::new(LineString::from(corners), vec![]));

        // Search geometries are normalized at compile time, so this cannot fail.
        min_distance(&area, search_geometry).is_ok_and(|distance| distance > self.radius)
    }
}

/// Full-string regex match against a property value tree.
/// Containers match if any member does; null never matches.
fn regex_matches(regex: &Regex, value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Array(items) => items.iter().any(|item| regex_matches(regex, item)),
        Value::Object(map) => map.values().any(|item| regex_matches(regex, item)),
        scalar => scalar.as_text().is_some_and(|text| regex.is_match(&text)),
    }
}

/// Replace shapes the distance predicate cannot measure with equivalent polygons.
fn normalize(geometry: &Geometry<f64>) -> Geometry<f64> {
    match geometry {
        Geometry::Rect(rect) => Geometry::Polygon(rect.to_polygon()),
        Geometry::Triangle(triangle) => Geometry::Polygon(triangle.to_polygon()),
        Geometry::GeometryCollection(gc) => {
            Geometry::GeometryCollection(gc.iter().map(normalize).collect())
        }
        other => other.clone(),
    }
}

fn clamp_x(bounds: Rect<f64>) -> Rect<f64> {
    let world = Epsg3857.bounds();
    let (lo, hi) = (world.min().x * WORLD_X_FRACTION, world.max().x * WORLD_X_FRACTION);
    let (min, max) = (bounds.min(), bounds.max());
    Rect::new(
        coord! { x: min.x.clamp(lo, hi), y: min.y },
        coord! { x: max.x.clamp(lo, hi), y: max.y },
    )
}
