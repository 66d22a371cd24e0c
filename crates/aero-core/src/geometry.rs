//! Geometry capability used by conflict analysis.
//!
//! The analysis pipeline only talks to [`GeometryEngine`]; [`PlanarEngine`]
//! backs it with the `geo` and `geojson` crates. Coordinates are treated as
//! planar (lon/lat degrees), which is what protection areas are drawn in.

use std::panic::{self, AssertUnwindSafe};

use geo::algorithm::line_intersection::{line_intersection, LineIntersection};
use geo::{
    BooleanOps, Buffer, Coord, Geometry, GeometryCollection, Intersects, LineString,
    MultiLineString, MultiPoint, MultiPolygon, Point, Polygon, Validation,
};
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum GeometryError {
    #[error("invalid GeoJSON geometry: {0}")]
    Parse(String),
    #[error("{0} geometries cannot be repaired by a zero-distance buffer")]
    NotAreal(&'static str),
    #[error("zero-distance buffer produced an empty geometry")]
    EmptyRepair,
    #[error("zero-distance buffer produced an invalid {0}")]
    StillInvalid(&'static str),
    #[error("geometry library panicked during {op}: {message}")]
    Panicked { op: &'static str, message: String },
    #[error("failed to export geometry: {0}")]
    Export(#[from] serde_json::Error),
}

/// Operations the conflict pipeline needs from a 2D geometry library.
pub trait GeometryEngine: Send + Sync {
    /// Parse a GeoJSON geometry object (not a Feature).
    fn parse(&self, value: &Value) -> Result<Geometry<f64>, GeometryError>;

    fn is_valid(&self, geometry: &Geometry<f64>) -> bool;

    /// Zero-distance buffer repair. The result is valid or an error.
    fn repair(&self, geometry: &Geometry<f64>) -> Result<Geometry<f64>, GeometryError>;

    fn intersects(&self, a: &Geometry<f64>, b: &Geometry<f64>) -> Result<bool, GeometryError>;

    /// Shared region of `a` and `b`, `None` when nothing of positive
    /// dimension (or no point) could be extracted.
    fn intersection(
        &self,
        a: &Geometry<f64>,
        b: &Geometry<f64>,
    ) -> Result<Option<Geometry<f64>>, GeometryError>;

    /// Export as GeoJSON geometry text.
    fn to_geojson(&self, geometry: &Geometry<f64>) -> Result<String, GeometryError>;
}

/// `geo`-backed planar geometry engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanarEngine;

impl PlanarEngine {
    pub fn new() -> Self {
        Self
    }
}

impl GeometryEngine for PlanarEngine {
    fn parse(&self, value: &Value) -> Result<Geometry<f64>, GeometryError> {
        let geometry = geojson::Geometry::from_json_value(value.clone())
            .map_err(|err| GeometryError::Parse(err.to_string()))?;
        Geometry::<f64>::try_from(geometry).map_err(|err| GeometryError::Parse(err.to_string()))
    }

    fn is_valid(&self, geometry: &Geometry<f64>) -> bool {
        guarded("validation", || geometry.is_valid()).unwrap_or(false)
    }

    fn repair(&self, geometry: &Geometry<f64>) -> Result<Geometry<f64>, GeometryError> {
        let area = match Shape::of(geometry) {
            Shape::Areal(area) => area,
            _ => return Err(GeometryError::NotAreal(geometry_kind(geometry))),
        };
        let buffered = guarded("repair", || area.buffer(0.0))?;
        let fixed = polygons(buffered).ok_or(GeometryError::EmptyRepair)?;
        if !self.is_valid(&fixed) {
            return Err(GeometryError::StillInvalid(geometry_kind(&fixed)));
        }
        Ok(fixed)
    }

    fn intersects(&self, a: &Geometry<f64>, b: &Geometry<f64>) -> Result<bool, GeometryError> {
        guarded("intersects", || a.intersects(b))
    }

    fn intersection(
        &self,
        a: &Geometry<f64>,
        b: &Geometry<f64>,
    ) -> Result<Option<Geometry<f64>>, GeometryError> {
        let mut parts = guarded("intersection", || overlay(a, b))?;
        Ok(match parts.len() {
            0 => None,
            1 => parts.pop(),
            _ => Some(Geometry::GeometryCollection(GeometryCollection(parts))),
        })
    }

    fn to_geojson(&self, geometry: &Geometry<f64>) -> Result<String, GeometryError> {
        let value = geojson::Value::from(geometry);
        Ok(serde_json::to_string(&geojson::Geometry::new(value))?)
    }
}

/// GeoJSON-style name of a geometry, for diagnostics.
pub fn geometry_kind(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

fn guarded<T>(op: &'static str, f: impl FnOnce() -> T) -> Result<T, GeometryError> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        GeometryError::Panicked { op, message }
    })
}

/// Geometry grouped by topological dimension.
enum Shape {
    Puntal(Vec<Point<f64>>),
    Lineal(MultiLineString<f64>),
    Areal(MultiPolygon<f64>),
    Mixed(Vec<Geometry<f64>>),
}

impl Shape {
    fn of(geometry: &Geometry<f64>) -> Shape {
        match geometry {
            Geometry::Point(point) => Shape::Puntal(vec![*point]),
            Geometry::MultiPoint(points) => Shape::Puntal(points.0.clone()),
            Geometry::Line(line) => {
                Shape::Lineal(MultiLineString(vec![LineString(vec![line.start, line.end])]))
            }
            Geometry::LineString(line) => Shape::Lineal(MultiLineString(vec![line.clone()])),
            Geometry::MultiLineString(lines) => Shape::Lineal(lines.clone()),
            Geometry::Polygon(polygon) => Shape::Areal(MultiPolygon(vec![polygon.clone()])),
            Geometry::MultiPolygon(polygons) => Shape::Areal(polygons.clone()),
            Geometry::Rect(rect) => Shape::Areal(MultiPolygon(vec![rect.to_polygon()])),
            Geometry::Triangle(triangle) => Shape::Areal(MultiPolygon(vec![triangle.to_polygon()])),
            Geometry::GeometryCollection(collection) => Shape::Mixed(collection.0.clone()),
        }
    }
}

fn overlay(a: &Geometry<f64>, b: &Geometry<f64>) -> Vec<Geometry<f64>> {
    match (Shape::of(a), Shape::of(b)) {
        (Shape::Mixed(members), _) => members.iter().flat_map(|member| overlay(member, b)).collect(),
        (_, Shape::Mixed(members)) => members.iter().flat_map(|member| overlay(a, member)).collect(),
        (Shape::Puntal(points), _) => covered_points(points, b),
        (_, Shape::Puntal(points)) => covered_points(points, a),
        (Shape::Areal(left), Shape::Areal(right)) => {
            polygons(left.intersection(&right)).into_iter().collect()
        }
        (Shape::Areal(area), Shape::Lineal(lines)) | (Shape::Lineal(lines), Shape::Areal(area)) => {
            linestrings(area.clip(&lines, false)).into_iter().collect()
        }
        (Shape::Lineal(left), Shape::Lineal(right)) => crossings(&left, &right),
    }
}

fn covered_points(points: Vec<Point<f64>>, other: &Geometry<f64>) -> Vec<Geometry<f64>> {
    let mut covered: Vec<Point<f64>> = points
        .into_iter()
        .filter(|point| point.intersects(other))
        .collect();
    match covered.len() {
        0 => Vec::new(),
        1 => covered.pop().map(Geometry::Point).into_iter().collect(),
        _ => vec![Geometry::MultiPoint(MultiPoint(covered))],
    }
}

fn crossings(left: &MultiLineString<f64>, right: &MultiLineString<f64>) -> Vec<Geometry<f64>> {
    let mut points: Vec<Coord<f64>> = Vec::new();
    let mut overlaps: Vec<LineString<f64>> = Vec::new();

    for a in left.0.iter().flat_map(|line| line.lines()) {
        for b in right.0.iter().flat_map(|line| line.lines()) {
            match line_intersection(a, b) {
                Some(LineIntersection::SinglePoint { intersection, .. }) => {
                    if !points.contains(&intersection) {
                        points.push(intersection);
                    }
                }
                Some(LineIntersection::Collinear { intersection }) => {
                    overlaps.push(LineString(vec![intersection.start, intersection.end]));
                }
                None => {}
            }
        }
    }

    // Points already covered by an overlapping segment carry no extra information.
    points.retain(|coord| {
        !overlaps
            .iter()
            .any(|segment| segment.intersects(&Point::from(*coord)))
    });

    let mut parts = Vec::new();
    if let Some(lines) = linestrings(MultiLineString(overlaps)) {
        parts.push(lines);
    }
    match points.len() {
        0 => {}
        1 => parts.push(Geometry::Point(Point::from(points[0]))),
        _ => parts.push(Geometry::MultiPoint(MultiPoint(
            points.into_iter().map(Point::from).collect(),
        ))),
    }
    parts
}

fn polygons(area: MultiPolygon<f64>) -> Option<Geometry<f64>> {
    let mut parts: Vec<Polygon<f64>> = area
        .0
        .into_iter()
        .filter(|polygon| !polygon.exterior().0.is_empty())
        .collect();
    match parts.len() {
        0 => None,
        1 => parts.pop().map(Geometry::Polygon),
        _ => Some(Geometry::MultiPolygon(MultiPolygon(parts))),
    }
}

fn linestrings(lines: MultiLineString<f64>) -> Option<Geometry<f64>> {
    let mut parts: Vec<LineString<f64>> = lines
        .0
        .into_iter()
        .filter(|line| line.0.len() >= 2)
        .collect();
    match parts.len() {
        0 => None,
        1 => parts.pop().map(Geometry::LineString),
        _ => Some(Geometry::MultiLineString(MultiLineString(parts))),
    }
}
