//! Streets, houses, and their projections.
//!
//! Streets and houses live in the detector's caches keyed by
//! [`FeatureId`]. Everything derived from them ([`MergedStreet`],
//! [`HouseProjection`]) refers back by id, so evicting a feature never
//! leaves a dangling reference behind.

use geo::{Coord, Rect};
use house_locator_models::{FeatureId, LineFeature, MatchSlot, PointFeature};

use crate::geometry;
use crate::number::{NumberRules, ParsedNumber, is_house_number};
use crate::street_name::street_name_key;

/// A single street fragment as loaded from the feature source.
#[derive(Debug, Clone)]
pub struct Street {
    id: FeatureId,
    name: String,
    key: String,
    points: Vec<Coord<f64>>,
    reversed: bool,
    /// Merge group this fragment has been assigned to.
    pub(crate) group: Option<usize>,
}

impl Street {
    /// Builds a street from a named line with at least two points.
    #[must_use]
    pub fn from_feature(feature: &LineFeature) -> Option<Self> {
        let name = feature.name.as_deref()?.trim();
        if name.is_empty() || feature.points.len() < 2 {
            return None;
        }

        Some(Self {
            id: feature.id,
            name: name.to_string(),
            key: street_name_key(name),
            points: feature
                .points
                .iter()
                .copied()
                .map(geometry::to_mercator)
                .collect(),
            reversed: false,
            group: None,
        })
    }

    #[must_use]
    pub const fn id(&self) -> FeatureId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name key used to decide which fragments belong together.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn points(&self) -> &[Coord<f64>] {
        &self.points
    }

    #[must_use]
    pub fn front(&self) -> Coord<f64> {
        self.points[0]
    }

    #[must_use]
    pub fn back(&self) -> Coord<f64> {
        self.points[self.points.len() - 1]
    }

    /// The point next to the given end, defining the end segment's
    /// direction.
    #[must_use]
    pub fn inner_point(&self, at_front: bool) -> Coord<f64> {
        if at_front {
            self.points[1]
        } else {
            self.points[self.points.len() - 2]
        }
    }

    #[must_use]
    pub fn end(&self, at_front: bool) -> Coord<f64> {
        if at_front { self.front() } else { self.back() }
    }

    /// Whether the points run opposite to the source feature.
    #[must_use]
    pub const fn is_reversed(&self) -> bool {
        self.reversed
    }

    pub(crate) fn reverse(&mut self) {
        self.points.reverse();
        self.reversed = !self.reversed;
    }

    #[must_use]
    pub fn is_same_street(&self, other: &Self) -> bool {
        self.key == other.key
    }

    /// Search rectangle around the street in WGS84 degrees.
    #[must_use]
    pub fn limit_rect(&self, offset_m: f64) -> Option<Rect<f64>> {
        geometry::limit_rect(&self.points, offset_m)
    }
}

/// A building with a house number.
#[derive(Debug, Clone)]
pub struct House {
    id: FeatureId,
    raw_number: String,
    number: ParsedNumber,
    position: Coord<f64>,
}

impl House {
    /// Builds a house from a building feature with a usable number.
    #[must_use]
    pub fn from_feature(feature: &PointFeature, rules: NumberRules) -> Option<Self> {
        if !feature.is_building {
            return None;
        }
        let raw = feature.house_number.as_deref()?.trim();
        if !is_house_number(raw) {
            return None;
        }

        Some(Self {
            id: feature.id,
            raw_number: raw.to_string(),
            number: ParsedNumber::parse(raw, rules),
            position: geometry::to_mercator(feature.position),
        })
    }

    #[must_use]
    pub const fn id(&self) -> FeatureId {
        self.id
    }

    /// House number as tagged on the feature.
    #[must_use]
    pub fn raw_number(&self) -> &str {
        &self.raw_number
    }

    #[must_use]
    pub const fn number(&self) -> &ParsedNumber {
        &self.number
    }

    #[must_use]
    pub const fn position(&self) -> Coord<f64> {
        self.position
    }

    /// Classifies this house against a query number.
    ///
    /// `None` when the leading numbers do not overlap at all.
    #[must_use]
    pub fn get_match(&self, query: &ParsedNumber) -> Option<MatchSlot> {
        if !self.number.intersects(query, 0) {
            return None;
        }
        if self.number.full() == query.full() {
            return Some(MatchSlot::Exact);
        }
        if self.number.is_odd() == query.is_odd() {
            return Some(MatchSlot::SameParity);
        }
        Some(MatchSlot::SameSide)
    }

    /// Whether the query is within `nearby_distance` of this number.
    #[must_use]
    pub fn nearby_match(&self, query: &ParsedNumber, nearby_distance: u32) -> bool {
        self.number.intersects(query, nearby_distance)
    }
}

/// Closest point of a house on a street polyline.
#[derive(Debug, Clone, PartialEq)]
pub struct HouseProjection {
    /// Projected house.
    pub house: FeatureId,
    /// Closest point on the street.
    pub point: Coord<f64>,
    /// Perpendicular distance in metres.
    pub distance: f64,
    /// Planar distance along the street from its start.
    pub street_distance: f64,
    /// `true` when the house lies left of the street direction.
    pub sign: bool,
}

/// A continuous road assembled from one or more fragments.
#[derive(Debug, Clone)]
pub struct MergedStreet {
    pub(crate) group: usize,
    pub(crate) streets: Vec<FeatureId>,
    pub(crate) name: String,
    pub(crate) length_m: f64,
    /// Merged projections, sorted by along-street distance.
    pub(crate) houses: Vec<HouseProjection>,
    /// Offset the projection list was built at, if built.
    pub(crate) houses_offset_m: Option<f64>,
}

impl MergedStreet {
    /// Merge group shared by all fragments of this street.
    #[must_use]
    pub const fn group(&self) -> usize {
        self.group
    }

    /// Display name (that of the first fragment).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fragment ids in along-street order.
    #[must_use]
    pub fn fragments(&self) -> &[FeatureId] {
        &self.streets
    }

    #[must_use]
    pub fn first_fragment(&self) -> FeatureId {
        self.streets[0]
    }

    /// Straight-line distance between the two free ends, in metres.
    #[must_use]
    pub const fn approx_length_m(&self) -> f64 {
        self.length_m
    }

    #[must_use]
    pub fn houses(&self) -> &[HouseProjection] {
        &self.houses
    }

    #[must_use]
    pub fn contains(&self, id: FeatureId) -> bool {
        self.streets.contains(&id)
    }
}
