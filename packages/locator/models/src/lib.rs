#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared types for the house-number locator.
//!
//! This crate contains only data types, configuration structs, and simple
//! conversions. It has no geometry or index dependencies, so it can be
//! shared by the engine, the spatial index, and any caller that only
//! needs to read match results.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Identity of a source map feature (street line or building).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct FeatureId(pub u64);

impl std::fmt::Display for FeatureId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A WGS84 position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LonLat {
    /// Longitude.
    pub lon: f64,
    /// Latitude.
    pub lat: f64,
}

impl LonLat {
    #[must_use]
    pub const fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }
}

/// A named line feature (street fragment) as delivered by a feature source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineFeature {
    /// Source feature id.
    pub id: FeatureId,
    /// Default-language street name. Unnamed lines are never merged.
    pub name: Option<String>,
    /// Ordered polyline points.
    pub points: Vec<LonLat>,
}

/// A point or area feature that may carry a house number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointFeature {
    /// Source feature id.
    pub id: FeatureId,
    /// Raw `addr:housenumber` value, if any.
    pub house_number: Option<String>,
    /// Representative point (the bounding-box centre for areas).
    pub position: LonLat,
    /// Whether the feature is classified as a building.
    pub is_building: bool,
}

/// Scoring slot that produced a match, strongest first.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchSlot {
    /// The house number text equals the query.
    Exact,
    /// Same leading number and parity, different text (e.g. `12a`).
    SameParity,
    /// Same leading number, accepted on the hypothesised side only.
    SameSide,
    /// Within the nearby numeric distance of the query.
    Nearby,
}

impl MatchSlot {
    pub const ALL: [Self; 4] = [Self::Exact, Self::SameParity, Self::SameSide, Self::Nearby];

    /// Slot rank, `0` for [`MatchSlot::Exact`].
    #[must_use]
    pub const fn rank(self) -> usize {
        self as usize
    }

    /// Vote weight contributed by this slot: 8, 4, 2, 1.
    #[must_use]
    pub const fn vote(self) -> u32 {
        1 << (3 - self.rank())
    }
}

/// A resolved house on a merged street.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    /// Feature id of the matched building.
    pub house_id: FeatureId,
    /// House number as tagged on the building.
    pub house_number: String,
    /// Representative position of the building.
    pub position: LonLat,
    /// Feature id of the first fragment of the merged street.
    pub street_id: FeatureId,
    /// Display name of the merged street.
    pub street_name: String,
    /// All fragments of the merged street, in along-street order.
    pub street_fragments: Vec<FeatureId>,
    /// Vote total, higher is better.
    pub score: u32,
    /// Strongest slot this house occupied on the street.
    pub best_slot: MatchSlot,
}

/// Tuning parameters for the house detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HouseLocatorConfig {
    /// Maximum gap between fragment endpoints that may still be joined.
    #[serde(default = "default_connection_length")]
    pub street_connection_length_m: f64,

    /// Fragments turning by this angle or more are never joined.
    #[serde(default = "default_max_angle")]
    pub street_connection_max_angle_deg: f64,

    /// Numeric distance under which two house numbers are "nearby".
    /// Ranges spanning `2 * nearby_distance` or more are discarded.
    #[serde(default = "default_nearby_distance")]
    pub nearby_distance: u32,

    /// Houses further apart than this never join the same chain.
    #[serde(default = "default_max_connection_dist")]
    pub max_connection_dist_m: f64,

    /// How many closest houses vote on which side carries which parity.
    #[serde(default = "default_count_for_odd_test")]
    pub count_for_odd_test: usize,

    /// Search radius ladder, in metres, tried in order.
    #[serde(default = "default_offsets")]
    pub offsets_m: Vec<f64>,

    /// Radius around each street that houses are loaded from.
    #[serde(default = "default_read_offset")]
    pub read_offset_m: f64,

    /// Unused streets are evicted once the cache exceeds the input by
    /// this factor.
    #[serde(default = "default_cache_shrink_ratio")]
    pub cache_shrink_ratio: f64,

    /// Fold `block-house` numbers (`12-34`) into `1234`.
    #[serde(default)]
    pub american_numbers: bool,
}

const fn default_connection_length() -> f64 {
    100.0
}

const fn default_max_angle() -> f64 {
    90.0
}

const fn default_nearby_distance() -> u32 {
    4
}

const fn default_max_connection_dist() -> f64 {
    300.0
}

const fn default_count_for_odd_test() -> usize {
    16
}

fn default_offsets() -> Vec<f64> {
    vec![25.0, 50.0, 100.0, 200.0, 500.0]
}

const fn default_read_offset() -> f64 {
    500.0
}

const fn default_cache_shrink_ratio() -> f64 {
    1.2
}

impl Default for HouseLocatorConfig {
    fn default() -> Self {
        Self {
            street_connection_length_m: default_connection_length(),
            street_connection_max_angle_deg: default_max_angle(),
            nearby_distance: default_nearby_distance(),
            max_connection_dist_m: default_max_connection_dist(),
            count_for_odd_test: default_count_for_odd_test(),
            offsets_m: default_offsets(),
            read_offset_m: default_read_offset(),
            cache_shrink_ratio: default_cache_shrink_ratio(),
            american_numbers: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_votes_halve_by_rank() {
        let votes: Vec<u32> = MatchSlot::ALL.iter().map(|s| s.vote()).collect();
        assert_eq!(votes, vec![8, 4, 2, 1]);
    }

    #[test]
    fn slot_round_trips_through_strum() {
        assert_eq!(MatchSlot::SameParity.to_string(), "SAME_PARITY");
        assert_eq!(
            "NEARBY".parse::<MatchSlot>().unwrap(),
            MatchSlot::Nearby
        );
    }

    #[test]
    fn partial_config_fills_defaults() {
        let config: HouseLocatorConfig =
            toml::from_str("american_numbers = true\nnearby_distance = 6\n").unwrap();
        assert!(config.american_numbers);
        assert_eq!(config.nearby_distance, 6);
        assert!((config.street_connection_length_m - 100.0).abs() < f64::EPSILON);
        assert_eq!(config.offsets_m, vec![25.0, 50.0, 100.0, 200.0, 500.0]);
    }
}
