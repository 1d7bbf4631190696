//! Reading street lines and house points out of a `GeoJSON`
//! `FeatureCollection`.

use geo::BoundingRect;
use geojson::{Feature, GeoJson, feature::Id};
use house_locator_models::{FeatureId, LineFeature, LonLat, PointFeature};
use serde_json::Value;

use crate::SpatialError;

/// Features extracted from one collection.
#[derive(Debug, Default)]
pub struct ParsedFeatures {
    pub lines: Vec<LineFeature>,
    pub points: Vec<PointFeature>,
}

/// Numeric id of a feature, from its `id` member or an `id` property.
///
/// String ids such as `"way/123"` keep their trailing number.
fn explicit_id(feature: &Feature) -> Option<u64> {
    feature
        .id
        .as_ref()
        .and_then(|id| match id {
            Id::Number(n) => n.as_u64(),
            Id::String(s) => parse_id(s),
        })
        .or_else(|| match feature.property("id")? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => parse_id(s),
            _ => None,
        })
}

fn parse_id(s: &str) -> Option<u64> {
    s.rsplit('/').next()?.trim().parse().ok()
}

fn string_property(feature: &Feature, key: &str) -> Option<String> {
    match feature.property(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn house_number(feature: &Feature) -> Option<String> {
    string_property(feature, "addr:housenumber").or_else(|| string_property(feature, "housenumber"))
}

/// Anything tagged with a house number counts as a building unless it is
/// explicitly tagged `building = "no"`.
fn is_building(feature: &Feature) -> bool {
    !matches!(feature.property("building"), Some(Value::String(s)) if s == "no")
}

fn to_points(line: &geo::LineString<f64>) -> Vec<LonLat> {
    line.coords().map(|c| LonLat::new(c.x, c.y)).collect()
}

/// Parses a `GeoJSON` document into line and point features.
///
/// Named `LineString`s become lines; every part of a named
/// `MultiLineString` becomes its own line. `Point`, `Polygon`, and
/// `MultiPolygon` features with a house number become points at the centre
/// of their bounding box. Features without a usable id, and all but the
/// first part of a multi-line, get fresh ids above the largest explicit one.
///
/// # Errors
///
/// Returns an error if the document is not valid `GeoJSON` or not a
/// `FeatureCollection`.
pub fn parse_feature_collection(json: &str) -> Result<ParsedFeatures, SpatialError> {
    let GeoJson::FeatureCollection(collection) = json.parse::<GeoJson>()? else {
        return Err(SpatialError::NotFeatureCollection);
    };

    let ids: Vec<Option<u64>> = collection.features.iter().map(explicit_id).collect();
    let mut next_id = ids.iter().flatten().max().map_or(0, |max| max + 1);
    let mut fresh_id = || {
        let id = next_id;
        next_id += 1;
        FeatureId(id)
    };

    let mut parsed = ParsedFeatures::default();
    let mut skipped = 0_usize;

    for (mut feature, id) in collection.features.into_iter().zip(ids) {
        let Some(geometry) = feature.geometry.take() else {
            skipped += 1;
            continue;
        };
        let geometry: geo::Geometry<f64> = match geometry.try_into() {
            Ok(geometry) => geometry,
            Err(e) => {
                log::warn!("Skipping feature with invalid geometry: {e}");
                skipped += 1;
                continue;
            }
        };

        match &geometry {
            geo::Geometry::LineString(line) => {
                let Some(name) = string_property(&feature, "name") else {
                    continue;
                };
                parsed.lines.push(LineFeature {
                    id: id.map_or_else(&mut fresh_id, FeatureId),
                    name: Some(name),
                    points: to_points(line),
                });
            }
            geo::Geometry::MultiLineString(lines) => {
                let Some(name) = string_property(&feature, "name") else {
                    continue;
                };
                for (i, line) in lines.iter().enumerate() {
                    let id = match id {
                        Some(id) if i == 0 => FeatureId(id),
                        _ => fresh_id(),
                    };
                    parsed.lines.push(LineFeature {
                        id,
                        name: Some(name.clone()),
                        points: to_points(line),
                    });
                }
            }
            geo::Geometry::Point(_) | geo::Geometry::Polygon(_) | geo::Geometry::MultiPolygon(_) => {
                let Some(number) = house_number(&feature) else {
                    continue;
                };
                let Some(rect) = geometry.bounding_rect() else {
                    skipped += 1;
                    continue;
                };
                let center = rect.center();
                parsed.points.push(PointFeature {
                    id: id.map_or_else(&mut fresh_id, FeatureId),
                    house_number: Some(number),
                    position: LonLat::new(center.x, center.y),
                    is_building: is_building(&feature),
                });
            }
            _ => {}
        }
    }

    if skipped > 0 {
        log::warn!("Skipped {skipped} features without usable geometry");
    }
    log::debug!(
        "Parsed {} lines and {} points",
        parsed.lines.len(),
        parsed.points.len()
    );
    Ok(parsed)
}
