//! Map projections and reprojection into the working projection.

use geo::MapCoords;
use geo_types::{Coord, Geometry, Rect, coord};
use std::f64::consts::PI;
use std::fmt;
use std::sync::Arc;

use crate::error::GeometryError;

const EARTH_RADIUS: f64 = 6_378_137.0;
const MAX_MERCATOR_LATITUDE: f64 = 85.051_128_779_806_59;

/// A planar map projection with conversions to and from WGS84 longitude/latitude.
pub trait Projection: Send + Sync + fmt::Debug {
    /// Short identifier, e.g. `EPSG:3857`.
    fn name(&self) -> &str;

    /// Extent of the projected world.
    fn bounds(&self) -> Rect<f64>;

    /// Convert a projected coordinate to WGS84 (x = longitude, y = latitude).
    fn to_wgs84(&self, pos: Coord<f64>) -> Coord<f64>;

    /// Convert a WGS84 coordinate (x = longitude, y = latitude) into this projection.
    fn from_wgs84(&self, pos: Coord<f64>) -> Coord<f64>;

    /// True if this projection is the working projection itself.
    fn is_working(&self) -> bool {
        false
    }
}

/// Spherical (web) Mercator, the working projection. Units are meters at the equator.
#[derive(Debug, Clone, Copy, Default)]
pub struct Epsg3857;

/// Plain WGS84 longitude/latitude in degrees.
#[derive(Debug, Clone, Copy, Default)]
pub struct Epsg4326;

impl Projection for Epsg3857 {
    fn name(&self) -> &str {
        "EPSG:3857"
    }

    fn bounds(&self) -> Rect<f64> {
        let extent = PI * EARTH_RADIUS;
        Rect::new(coord! { x: -extent, y: -extent }, coord! { x: extent, y: extent })
    }

    fn to_wgs84(&self, pos: Coord<f64>) -> Coord<f64> {
        let lon = (pos.x / EARTH_RADIUS).to_degrees();
        let lat = (2.0 * (pos.y / EARTH_RADIUS).exp().atan() - PI / 2.0).to_degrees();
        coord! { x: lon, y: lat }
    }

    fn from_wgs84(&self, pos: Coord<f64>) -> Coord<f64> {
        let lat = pos.y.clamp(-MAX_MERCATOR_LATITUDE, MAX_MERCATOR_LATITUDE);
        let x = pos.x.to_radians() * EARTH_RADIUS;
        let y = (PI / 4.0 + lat.to_radians() / 2.0).tan().ln() * EARTH_RADIUS;
        coord! { x: x, y: y }
    }

    fn is_working(&self) -> bool {
        true
    }
}

impl Projection for Epsg4326 {
    fn name(&self) -> &str {
        "EPSG:4326"
    }

    fn bounds(&self) -> Rect<f64> {
        Rect::new(coord! { x: -180.0, y: -90.0 }, coord! { x: 180.0, y: 90.0 })
    }

    fn to_wgs84(&self, pos: Coord<f64>) -> Coord<f64> {
        pos
    }

    fn from_wgs84(&self, pos: Coord<f64>) -> Coord<f64> {
        pos
    }
}

/// Resolve a projection by name (`epsg:3857`, `epsg:4326`, `wgs84`, ...), case-insensitively.
pub fn projection_from_name(name: &str) -> Option<Arc<dyn Projection>> {
    match name.trim().to_ascii_lowercase().as_str() {
        "epsg:3857" | "3857" | "epsg:900913" | "webmercator" => Some(Arc::new(Epsg3857)),
        "epsg:4326" | "4326" | "wgs84" => Some(Arc::new(Epsg4326)),
        _ => None,
    }
}

/// The working projection all distance math happens in.
pub fn working_projection() -> Epsg3857 {
    Epsg3857
}

/// Convert a single coordinate into the working projection.
pub fn coord_to_working(pos: Coord<f64>, projection: &dyn Projection) -> Coord<f64> {
    if projection.is_working() {
        return pos;
    }
    Epsg3857.from_wgs84(projection.to_wgs84(pos))
}

/// Reproject a geometry into the working projection.
///
/// Fails for geometry kinds the distance predicate cannot measure.
pub fn to_working(
    geometry: &Geometry<f64>,
    projection: &dyn Projection,
) -> Result<Geometry<f64>, GeometryError> {
    super::ensure_supported(geometry)?;
    if projection.is_working() {
        return Ok(geometry.clone());
    }
    Ok(geometry.map_coords(|pos| coord_to_working(pos, projection)))
}

/// Reproject bounds into the working projection via their four corners.
pub fn bounds_to_working(bounds: Rect<f64>, projection: &dyn Projection) -> Rect<f64> {
    if projection.is_working() {
        return bounds;
    }
    let (min, max) = (bounds.min(), bounds.max());
    let corners = [
        min,
        coord! { x: min.x, y: max.y },
        max,
        coord! { x: max.x, y: min.y },
    ]
    .map(|pos| coord_to_working(pos, projection));
    rect_of(&corners)
}

/// Reproject working-projection bounds back into `projection` via their four corners.
pub fn bounds_from_working(bounds: Rect<f64>, projection: &dyn Projection) -> Rect<f64> {
    if projection.is_working() {
        return bounds;
    }
    let (min, max) = (bounds.min(), bounds.max());
    let corners = [
        min,
        coord! { x: min.x, y: max.y },
        max,
        coord! { x: max.x, y: min.y },
    ]
    .map(|pos| projection.from_wgs84(Epsg3857.to_wgs84(pos)));
    rect_of(&corners)
}

fn rect_of(points: &[Coord<f64>]) -> Rect<f64> {
    let mut min = points[0];
    let mut max = points[0];
    for p in &points[1..] {
        min.x = min.x.min(p.x);
        min.y = min.y.min(p.y);
        max.x = max.x.max(p.x);
        max.y = max.y.max(p.y);
    }
    Rect::new(min, max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::Point;

    fn close(a: f64, b: f64, eps: f64) -> bool {
        (a - b).abs() < eps
    }

    #[test]
    fn mercator_round_trip() {
        let wgs = coord! { x: 24.7536, y: 59.4370 };
        let projected = Epsg3857.from_wgs84(wgs);
        let back = Epsg3857.to_wgs84(projected);
        assert!(close(back.x, wgs.x, 1e-9));
        assert!(close(back.y, wgs.y, 1e-9));
    }

    #[test]
    fn mercator_known_values() {
        let origin = Epsg3857.from_wgs84(coord! { x: 0.0, y: 0.0 });
        assert!(close(origin.x, 0.0, 1e-9) && close(origin.y, 0.0, 1e-9));

        let east = Epsg3857.from_wgs84(coord! { x: 180.0, y: 0.0 });
        assert!(close(east.x, 20_037_508.342_789_244, 1e-6));
    }

    #[test]
    fn reprojects_geometry_from_wgs84() {
        let point = Geometry::Point(Point::new(180.0, 0.0));
        let projected = to_working(&point, &Epsg4326).unwrap();
        let Geometry::Point(p) = projected else {
            panic!("expected point");
        };
        assert!(close(p.x(), 20_037_508.342_789_244, 1e-6));
    }

    #[test]
    fn working_projection_is_identity() {
        let point = Geometry::Point(Point::new(1.0, 2.0));
        assert_eq!(to_working(&point, &Epsg3857).unwrap(), point);
    }

    #[test]
    fn resolves_projection_names() {
        assert_eq!(projection_from_name("EPSG:3857").unwrap().name(), "EPSG:3857");
        assert_eq!(projection_from_name("wgs84").unwrap().name(), "EPSG:4326");
        assert!(projection_from_name("epsg:2154").is_none());
    }

    #[test]
    fn bounds_round_trip_through_working() {
        let bounds = Rect::new(coord! { x: 10.0, y: 50.0 }, coord! { x: 11.0, y: 51.0 });
        let working = bounds_to_working(bounds, &Epsg4326);
        let back = bounds_from_working(working, &Epsg4326);
        assert!(close(back.min().x, 10.0, 1e-9));
        assert!(close(back.max().y, 51.0, 1e-9));
    }
}
