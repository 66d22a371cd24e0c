//! GeoJSON normalization.
//!
//! Turns a `FeatureCollection`, a `Feature` or a bare geometry into a lazy
//! sequence of parsed geometries. Malformed entries are skipped with a
//! diagnostic; only a payload that is not JSON at all is a hard failure.

use geo::{Geometry, MultiPolygon};
use serde_json::Value;

use crate::geometry::{geometry_kind, GeometryEngine};

#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// A parsed geometry and the position of the feature it came from.
///
/// Skipped features leave gaps: indices are never renumbered.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedGeometry {
    pub index: usize,
    pub geometry: Geometry<f64>,
}

enum Source {
    Features(std::iter::Enumerate<std::vec::IntoIter<Value>>),
    Single(Option<Value>),
}

/// Lazy, single-pass iterator returned by [`normalize`].
pub struct Normalized<'a, E: ?Sized> {
    engine: &'a E,
    source: Source,
}

/// Normalize an already parsed GeoJSON payload.
pub fn normalize<E: GeometryEngine + ?Sized>(engine: &E, payload: Value) -> Normalized<'_, E> {
    let source = match payload_type(&payload) {
        Some("FeatureCollection") => {
            let features = match payload {
                Value::Object(mut object) => match object.remove("features") {
                    Some(Value::Array(features)) => features,
                    _ => {
                        tracing::warn!("FeatureCollection has no features array");
                        Vec::new()
                    }
                },
                _ => Vec::new(),
            };
            Source::Features(features.into_iter().enumerate())
        }
        _ => Source::Single(Some(payload)),
    };
    Normalized { engine, source }
}

/// Normalize GeoJSON text. Fails only when the text is not JSON.
pub fn normalize_str<'a, E: GeometryEngine + ?Sized>(
    engine: &'a E,
    text: &str,
) -> Result<Normalized<'a, E>, NormalizeError> {
    let payload: Value = serde_json::from_str(text)?;
    Ok(normalize(engine, payload))
}

impl<E: GeometryEngine + ?Sized> Iterator for Normalized<'_, E> {
    type Item = IndexedGeometry;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.source {
            Source::Features(features) => {
                for (index, feature) in features.by_ref() {
                    let Some(geometry) = feature_geometry(feature, index) else {
                        continue;
                    };
                    if let Some(parsed) = parse_geometry(self.engine, &geometry, index) {
                        return Some(parsed);
                    }
                }
                None
            }
            Source::Single(payload) => {
                let payload = payload.take()?;
                let geometry = feature_geometry(payload, 0)?;
                parse_geometry(self.engine, &geometry, 0)
            }
        }
    }
}

fn payload_type(value: &Value) -> Option<&str> {
    value.get("type").and_then(Value::as_str)
}

/// Unwrap (possibly nested) Features down to their geometry object.
fn feature_geometry(mut value: Value, index: usize) -> Option<Value> {
    while payload_type(&value) == Some("Feature") {
        match value.get_mut("geometry").map(Value::take) {
            Some(Value::Null) => {
                tracing::warn!("Feature {} has a null geometry, skipping", index);
                return None;
            }
            Some(geometry) => value = geometry,
            None => {
                tracing::warn!("Feature {} missing geometry, skipping", index);
                return None;
            }
        }
    }
    Some(value)
}

fn parse_geometry<E: GeometryEngine + ?Sized>(
    engine: &E,
    value: &Value,
    index: usize,
) -> Option<IndexedGeometry> {
    match engine.parse(value) {
        Ok(geometry) => {
            tracing::debug!(
                "Parsed geometry {} of type {}",
                index,
                geometry_kind(&geometry)
            );
            Some(IndexedGeometry { index, geometry })
        }
        Err(err) => {
            tracing::warn!("Failed to parse geometry {}: {}", index, err);
            None
        }
    }
}

/// Normalize a protection-zone payload into a single geometry.
///
/// A `FeatureCollection` is merged into one `MultiPolygon` built from its
/// polygonal members; anything else yields its first parsed geometry.
pub fn zone_geometry<E: GeometryEngine + ?Sized>(engine: &E, payload: Value) -> Option<Geometry<f64>> {
    if payload_type(&payload) != Some("FeatureCollection") {
        return normalize(engine, payload).next().map(|item| item.geometry);
    }

    let mut polygons = Vec::new();
    for item in normalize(engine, payload) {
        match item.geometry {
            Geometry::Polygon(polygon) => polygons.push(polygon),
            Geometry::MultiPolygon(multi) => polygons.extend(multi.0),
            other => tracing::debug!(
                "Ignoring non-polygonal {} in protection area (feature {})",
                geometry_kind(&other),
                item.index
            ),
        }
    }

    if polygons.is_empty() {
        None
    } else {
        Some(Geometry::MultiPolygon(MultiPolygon(polygons)))
    }
}
