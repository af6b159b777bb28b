//! Minimum planar distance between geometries.

use geo::{Distance, Euclidean};
use geo_types::{Geometry, Line, LineString, Point, Polygon};
use std::borrow::Cow;

use crate::error::GeometryError;

/// A simple (non-collection) geometry the distance predicate can measure.
#[derive(Debug, Clone)]
enum Shape<'a> {
    Point(&'a Point<f64>),
    LineString(Cow<'a, LineString<f64>>),
    Polygon(&'a Polygon<f64>),
}

impl Shape<'_> {
    fn rank(&self) -> u8 {
        match self {
            Shape::Point(_) => 0,
            Shape::LineString(_) => 1,
            Shape::Polygon(_) => 2,
        }
    }
}

fn line_to_linestring(line: &Line<f64>) -> LineString<f64> {
    LineString::from(vec![line.start, line.end])
}

/// Flatten a geometry into its simple components.
fn collect_shapes<'a>(
    geometry: &'a Geometry<f64>,
    shapes: &mut Vec<Shape<'a>>,
) -> Result<(), GeometryError> {
    match geometry {
        Geometry::Point(p) => shapes.push(Shape::Point(p)),
        Geometry::Line(l) => shapes.push(Shape::LineString(Cow::Owned(line_to_linestring(l)))),
        Geometry::LineString(ls) => shapes.push(Shape::LineString(Cow::Borrowed(ls))),
        Geometry::Polygon(p) => shapes.push(Shape::Polygon(p)),
        Geometry::MultiPoint(mp) => shapes.extend(mp.iter().map(Shape::Point)),
        Geometry::MultiLineString(mls) => {
            shapes.extend(mls.iter().map(|ls| Shape::LineString(Cow::Borrowed(ls))))
        }
        Geometry::MultiPolygon(mp) => shapes.extend(mp.iter().map(Shape::Polygon)),
        Geometry::GeometryCollection(gc) => {
            for member in gc.iter() {
                collect_shapes(member, shapes)?;
            }
        }
        Geometry::Rect(_) => return Err(GeometryError::Unsupported { kind: "rect" }),
        Geometry::Triangle(_) => return Err(GeometryError::Unsupported { kind: "triangle" }),
    }
    Ok(())
}

fn shape_distance(a: &Shape<'_>, b: &Shape<'_>) -> f64 {
    // Distance is symmetric; order the pair so only one direction is needed.
    let (a, b) = if a.rank() <= b.rank() { (a, b) } else { (b, a) };
    match (a, b) {
        (Shape::Point(p1), Shape::Point(p2)) => Euclidean.distance(*p1, *p2),
        (Shape::Point(p), Shape::LineString(ls)) => Euclidean.distance(*p, &**ls),
        (Shape::Point(p), Shape::Polygon(poly)) => Euclidean.distance(*p, *poly),
        (Shape::LineString(l1), Shape::LineString(l2)) => Euclidean.distance(&**l1, &**l2),
        (Shape::LineString(ls), Shape::Polygon(poly)) => Euclidean.distance(&**ls, *poly),
        (Shape::Polygon(p1), Shape::Polygon(p2)) => Euclidean.distance(*p1, *p2),
        _ => unreachable!("pair is ordered by rank"),
    }
}

/// Minimum Euclidean distance between two geometries in the same planar projection.
///
/// Collections measure as the minimum over their members; an empty collection is
/// infinitely far from everything. Polygons include their interior, so anything
/// inside a polygon is at distance zero.
pub fn min_distance(a: &Geometry<f64>, b: &Geometry<f64>) -> Result<f64, GeometryError> {
    let mut shapes_a = Vec::new();
    collect_shapes(a, &mut shapes_a)?;
    let mut shapes_b = Vec::new();
    collect_shapes(b, &mut shapes_b)?;

    let mut dist = f64::INFINITY;
    for sa in &shapes_a {
        for sb in &shapes_b {
            dist = dist.min(shape_distance(sa, sb));
        }
    }
    Ok(dist)
}
