#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! In-memory feature index for the house locator.
//!
//! Loads street lines and house points from a `GeoJSON` file, builds
//! R-tree indexes over them, and serves them to a
//! [`HouseDetector`](house_locator::HouseDetector) through the
//! [`FeatureSource`] trait. Also answers the street-selection queries a
//! caller needs before it can ask for a house number.

pub mod loader;

use std::collections::BTreeMap;
use std::path::Path;

use geo::{BoundingRect, Coord, LineString, Rect};
use house_locator::geometry::METERS_PER_DEGREE;
use house_locator::street_name::street_name_key;
use house_locator::{FeatureSource, FeatureSourceError};
use house_locator_models::{FeatureId, LineFeature, LonLat, PointFeature};
use rstar::{AABB, RTree, RTreeObject};

pub use loader::{ParsedFeatures, parse_feature_collection};

/// Errors that can occur while loading features.
#[derive(Debug, thiserror::Error)]
pub enum SpatialError {
    /// I/O error (file read).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The document is not valid `GeoJSON`.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// The document is valid `GeoJSON` but not a `FeatureCollection`.
    #[error("Expected a GeoJSON FeatureCollection")]
    NotFeatureCollection,
}

/// A street line stored in the R-tree by its bounding box.
struct LineEntry {
    id: FeatureId,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for LineEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// A house point stored in the R-tree.
struct PointEntry(PointFeature);

impl RTreeObject for PointEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.0.position.lon, self.0.position.lat])
    }
}

fn line_envelope(line: &LineFeature) -> Option<AABB<[f64; 2]>> {
    let coords: LineString<f64> = line
        .points
        .iter()
        .map(|p| Coord { x: p.lon, y: p.lat })
        .collect();
    coords
        .bounding_rect()
        .map(|rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]))
}

fn rect_envelope(rect: &Rect<f64>) -> AABB<[f64; 2]> {
    AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y])
}

/// Square search area of `radius_m` metres around `center` (WGS84).
#[must_use]
pub fn rect_around(center: LonLat, radius_m: f64) -> Rect<f64> {
    let dlat = radius_m / METERS_PER_DEGREE;
    let dlon = dlat / center.lat.to_radians().cos().max(1e-6);
    Rect::new(
        Coord {
            x: center.lon - dlon,
            y: center.lat - dlat,
        },
        Coord {
            x: center.lon + dlon,
            y: center.lat + dlat,
        },
    )
}

/// R-tree indexes over street lines and house points.
pub struct FeatureIndex {
    lines: BTreeMap<FeatureId, LineFeature>,
    line_tree: RTree<LineEntry>,
    points: RTree<PointEntry>,
}

impl FeatureIndex {
    /// Builds the index from already parsed features.
    ///
    /// Lines without coordinates are dropped; a later line with the same
    /// id replaces an earlier one.
    #[must_use]
    pub fn new(features: ParsedFeatures) -> Self {
        let mut lines = BTreeMap::new();
        for line in features.lines {
            if line.points.is_empty() {
                log::warn!("Skipping line {} without coordinates", line.id);
                continue;
            }
            lines.insert(line.id, line);
        }

        let line_entries: Vec<LineEntry> = lines
            .values()
            .filter_map(|line| {
                line_envelope(line).map(|envelope| LineEntry {
                    id: line.id,
                    envelope,
                })
            })
            .collect();
        let points: Vec<PointEntry> = features.points.into_iter().map(PointEntry).collect();

        Self {
            lines,
            line_tree: RTree::bulk_load(line_entries),
            points: RTree::bulk_load(points),
        }
    }

    /// Parses a `GeoJSON` `FeatureCollection` and indexes it.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be parsed.
    pub fn from_geojson_str(json: &str) -> Result<Self, SpatialError> {
        Ok(Self::new(parse_feature_collection(json)?))
    }

    /// Reads and indexes a `GeoJSON` file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, SpatialError> {
        let data = std::fs::read_to_string(path)?;
        let index = Self::from_geojson_str(&data)?;
        log::info!(
            "Indexed {} lines and {} points from {}",
            index.line_count(),
            index.point_count(),
            path.display()
        );
        Ok(index)
    }

    #[must_use]
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn point_count(&self) -> usize {
        self.points.size()
    }

    #[must_use]
    pub fn line(&self, id: FeatureId) -> Option<&LineFeature> {
        self.lines.get(&id)
    }

    /// Every line id, ascending.
    #[must_use]
    pub fn line_ids(&self) -> Vec<FeatureId> {
        self.lines.keys().copied().collect()
    }

    /// Ids of lines whose bounding box intersects `rect`, ascending.
    #[must_use]
    pub fn line_ids_in_rect(&self, rect: &Rect<f64>) -> Vec<FeatureId> {
        let mut ids: Vec<FeatureId> = self
            .line_tree
            .locate_in_envelope_intersecting(&rect_envelope(rect))
            .map(|entry| entry.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Ids of lines whose name has the same street key as `name`,
    /// ascending. `"Main St"` finds `"Main Street"`.
    #[must_use]
    pub fn line_ids_named(&self, name: &str) -> Vec<FeatureId> {
        let key = street_name_key(name);
        self.lines
            .values()
            .filter(|line| {
                line.name
                    .as_deref()
                    .is_some_and(|n| street_name_key(n) == key)
            })
            .map(|line| line.id)
            .collect()
    }
}

impl FeatureSource for FeatureIndex {
    fn load_lines(&self, ids: &[FeatureId]) -> Result<Vec<LineFeature>, FeatureSourceError> {
        Ok(ids
            .iter()
            .filter_map(|id| {
                let line = self.lines.get(id);
                if line.is_none() {
                    log::debug!("Line {id} not in index");
                }
                line.cloned()
            })
            .collect())
    }

    fn points_in_rect(&self, rect: &Rect<f64>) -> Result<Vec<PointFeature>, FeatureSourceError> {
        let mut points: Vec<PointFeature> = self
            .points
            .locate_in_envelope(&rect_envelope(rect))
            .map(|entry| entry.0.clone())
            .collect();
        points.sort_by_key(|p| p.id);
        Ok(points)
    }
}

#[cfg(test)]
mod tests {
    use house_locator::{HouseDetector, HouseLocatorConfig, MatchSlot};

    use super::*;

    /// Two fragments of "Main Street" along the equator, 0.001 degrees
    /// (about 111 m) each, and a parallel "Elm St" 0.002 degrees north.
    const TOWN: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature", "id": 1,
                "properties": { "name": "Main St" },
                "geometry": { "type": "LineString", "coordinates": [[0.0, 0.0], [0.001, 0.0]] }
            },
            {
                "type": "Feature", "id": 2,
                "properties": { "name": "Main Street" },
                "geometry": { "type": "LineString", "coordinates": [[0.001, 0.0], [0.002, 0.0]] }
            },
            {
                "type": "Feature", "id": 3,
                "properties": { "name": "Elm St" },
                "geometry": { "type": "LineString", "coordinates": [[0.0, 0.002], [0.002, 0.002]] }
            },
            {
                "type": "Feature", "id": 100,
                "properties": { "addr:housenumber": "2" },
                "geometry": { "type": "Point", "coordinates": [0.0002, 0.0001] }
            },
            {
                "type": "Feature", "id": 101,
                "properties": { "addr:housenumber": "4" },
                "geometry": { "type": "Point", "coordinates": [0.0006, 0.0001] }
            },
            {
                "type": "Feature", "id": 102,
                "properties": { "addr:housenumber": "6" },
                "geometry": { "type": "Point", "coordinates": [0.0012, 0.0001] }
            },
            {
                "type": "Feature", "id": 103,
                "properties": { "addr:housenumber": "6" },
                "geometry": { "type": "Point", "coordinates": [0.0012, 0.0019] }
            }
        ]
    }"#;

    fn town() -> FeatureIndex {
        FeatureIndex::from_geojson_str(TOWN).unwrap()
    }

    #[test]
    fn indexes_lines_and_points() {
        let index = town();
        assert_eq!(index.line_count(), 3);
        assert_eq!(index.point_count(), 4);
        assert_eq!(index.line(FeatureId(3)).unwrap().name.as_deref(), Some("Elm St"));
    }

    #[test]
    fn selects_lines_by_name_key() {
        let index = town();
        assert_eq!(
            index.line_ids_named("main street"),
            vec![FeatureId(1), FeatureId(2)]
        );
        assert_eq!(index.line_ids_named("Elm Street"), vec![FeatureId(3)]);
        assert!(index.line_ids_named("Oak St").is_empty());
    }

    #[test]
    fn selects_lines_by_area() {
        let index = town();
        let near_start = rect_around(LonLat::new(0.0, 0.0), 50.0);
        assert_eq!(index.line_ids_in_rect(&near_start), vec![FeatureId(1)]);

        let everything = rect_around(LonLat::new(0.001, 0.001), 500.0);
        assert_eq!(
            index.line_ids_in_rect(&everything),
            vec![FeatureId(1), FeatureId(2), FeatureId(3)]
        );
    }

    #[test]
    fn serves_features_to_the_detector() {
        let index = town();
        let lines = index
            .load_lines(&[FeatureId(2), FeatureId(99), FeatureId(1)])
            .unwrap();
        assert_eq!(
            lines.iter().map(|l| l.id).collect::<Vec<_>>(),
            vec![FeatureId(2), FeatureId(1)]
        );

        let rect = rect_around(LonLat::new(0.0012, 0.0001), 20.0);
        let points = index.points_in_rect(&rect).unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].id, FeatureId(102));
    }

    #[test]
    fn locates_house_on_named_street() {
        let index = town();
        let mut detector = HouseDetector::new(HouseLocatorConfig::default());

        let results = detector
            .locate(&index.line_ids_named("Main St"), "6", &index)
            .unwrap();
        assert_eq!(results[0].house_id, FeatureId(102));
        assert_eq!(results[0].best_slot, MatchSlot::Exact);
        assert_eq!(results[0].street_fragments, vec![FeatureId(1), FeatureId(2)]);

        let results = detector
            .locate(&index.line_ids_named("Elm St"), "6", &index)
            .unwrap();
        assert_eq!(results[0].house_id, FeatureId(103));
        assert_eq!(results[0].street_id, FeatureId(3));
    }
}
