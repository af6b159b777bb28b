//! Geometry support for search: projections, introspection and proximity.
//!
//! Feature geometries are plain `geo_types::Geometry<f64>` values in their source
//! projection. Before any distance is measured they are reprojected into the
//! working projection (spherical Mercator), whose units are meters at the equator.

mod distance;
mod projection;

pub use distance::min_distance;
pub use projection::{
    Epsg3857, Epsg4326, Projection, bounds_from_working, bounds_to_working, coord_to_working,
    projection_from_name, to_working, working_projection,
};

use geo::{BoundingRect, Centroid};
use geo_types::{Coord, Geometry, LineString, Polygon, Rect, coord};

use crate::error::GeometryError;

/// Fail for geometry kinds that cannot be reprojected or measured.
pub fn ensure_supported(geometry: &Geometry<f64>) -> Result<(), GeometryError> {
    match geometry {
        Geometry::Rect(_) => Err(GeometryError::Unsupported { kind: "rect" }),
        Geometry::Triangle(_) => Err(GeometryError::Unsupported { kind: "triangle" }),
        Geometry::GeometryCollection(gc) => gc.iter().try_for_each(ensure_supported),
        _ => Ok(()),
    }
}

/// Name reported through the `geometry::type` variable.
pub fn geometry_type_name(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "point",
        Geometry::Line(_) | Geometry::LineString(_) => "linestring",
        Geometry::Polygon(_) => "polygon",
        Geometry::MultiPoint(_) => "multipoint",
        Geometry::MultiLineString(_) => "multilinestring",
        Geometry::MultiPolygon(_) => "multipolygon",
        Geometry::GeometryCollection(_) => "multigeometry",
        Geometry::Rect(_) | Geometry::Triangle(_) => "geometry",
    }
}

/// Vertices of a ring, not counting the closing coordinate.
fn ring_vertices(ring: &LineString<f64>) -> usize {
    let n = ring.0.len();
    if n > 1 && ring.is_closed() { n - 1 } else { n }
}

fn polygon_vertices(poly: &Polygon<f64>) -> usize {
    ring_vertices(poly.exterior()) + poly.interiors().iter().map(ring_vertices).sum::<usize>()
}

/// Number of vertices reported through the `geometry::vertices` variable.
/// Polygons count their outer ring plus all holes.
pub fn vertex_count(geometry: &Geometry<f64>) -> usize {
    match geometry {
        Geometry::Point(_) => 1,
        Geometry::Line(_) => 2,
        Geometry::LineString(ls) => ls.0.len(),
        Geometry::Polygon(poly) => polygon_vertices(poly),
        Geometry::MultiPoint(mp) => mp.0.len(),
        Geometry::MultiLineString(mls) => mls.iter().map(|ls| ls.0.len()).sum(),
        Geometry::MultiPolygon(mp) => mp.iter().map(polygon_vertices).sum(),
        Geometry::GeometryCollection(gc) => gc.iter().map(vertex_count).sum(),
        Geometry::Rect(_) | Geometry::Triangle(_) => 0,
    }
}

/// Center used for the latitude correction of the search radius: the centroid,
/// or the bounding box center for degenerate geometries.
pub fn center(geometry: &Geometry<f64>) -> Option<Coord<f64>> {
    geometry
        .centroid()
        .map(|point| point.0)
        .or_else(|| geometry.bounding_rect().map(|rect| rect.center()))
}

/// Grow bounds by `amount` on every side.
pub fn expand_bounds(bounds: Rect<f64>, amount: f64) -> Rect<f64> {
    let (min, max) = (bounds.min(), bounds.max());
    Rect::new(
        coord! { x: min.x - amount, y: min.y - amount },
        coord! { x: max.x + amount, y: max.y + amount },
    )
}
