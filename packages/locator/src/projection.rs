//! Projecting houses onto streets.

use std::collections::BTreeMap;

use geo::Coord;
use house_locator_models::FeatureId;

use crate::geometry;
use crate::street::{House, HouseProjection, MergedStreet};

/// Projects points onto one street polyline.
pub struct StreetProjector<'a> {
    points: &'a [Coord<f64>],
    offset_m: f64,
    /// Planar length of the street before segment `i`.
    cumulative: Vec<f64>,
}

impl<'a> StreetProjector<'a> {
    #[must_use]
    pub fn new(points: &'a [Coord<f64>], offset_m: f64) -> Self {
        debug_assert!(points.len() > 1, "street needs at least two points");
        let mut cumulative = Vec::with_capacity(points.len());
        let mut length = 0.0;
        cumulative.push(length);
        for pair in points.windows(2) {
            length += geometry::planar_distance(pair[0], pair[1]);
            cumulative.push(length);
        }
        Self {
            points,
            offset_m,
            cumulative,
        }
    }

    /// Total planar length of the street.
    #[must_use]
    pub fn length(&self) -> f64 {
        self.cumulative.last().copied().unwrap_or(0.0)
    }

    /// Projects `house` onto the closest segment.
    ///
    /// Returns `None` when the house is further than the offset, or when
    /// every segment is degenerate.
    #[must_use]
    pub fn project(&self, house: &House) -> Option<HouseProjection> {
        let pt = house.position();

        let mut best: Option<(usize, Coord<f64>, f64)> = None;
        for (i, pair) in self.points.windows(2).enumerate() {
            let Some(proj) = geometry::project_to_segment(pair[0], pair[1], pt) else {
                continue;
            };
            let distance = geometry::distance_meters(pt, proj);
            if best.is_none_or(|(_, _, d)| distance < d) {
                best = Some((i, proj, distance));
            }
        }

        let (i, proj, distance) = best?;
        if distance > self.offset_m {
            return None;
        }

        let (a, b) = (self.points[i], self.points[i + 1]);
        Some(HouseProjection {
            house: house.id(),
            point: proj,
            distance,
            street_distance: self.cumulative[i] + geometry::planar_distance(a, proj),
            sign: geometry::orientation(a, b, pt) >= 0.0,
        })
    }
}

/// Projections of one street fragment, as read at some offset.
#[derive(Debug, Clone)]
pub struct StreetProjections {
    /// Offset the houses were read at.
    pub offset_m: f64,
    /// Street orientation at read time; a reversed street invalidates the
    /// cache.
    pub reversed: bool,
    /// Planar street length.
    pub length: f64,
    /// Projections sorted by along-street distance.
    pub houses: Vec<HouseProjection>,
}

impl StreetProjections {
    pub fn sort(&mut self) {
        self.houses.sort_by(|a, b| {
            a.street_distance
                .total_cmp(&b.street_distance)
                .then_with(|| a.house.cmp(&b.house))
        });
    }
}

/// Builds the merged projection list of a street from its fragments.
///
/// Along-street distances of later fragments are shifted by the length of
/// the fragments before them; a house projected on several fragments keeps
/// only its closest projection.
pub fn finish_merged_street(
    street: &mut MergedStreet,
    fragments: &BTreeMap<FeatureId, StreetProjections>,
    offset_m: f64,
) {
    let mut closest: BTreeMap<FeatureId, HouseProjection> = BTreeMap::new();
    let mut length = 0.0;

    for id in &street.streets {
        let Some(projections) = fragments.get(id) else {
            continue;
        };
        for p in &projections.houses {
            let mut p = p.clone();
            p.street_distance += length;
            match closest.get(&p.house) {
                Some(existing) if existing.distance <= p.distance => {}
                _ => {
                    closest.insert(p.house, p);
                }
            }
        }
        length += projections.length;
    }

    let mut houses: Vec<HouseProjection> = closest.into_values().collect();
    houses.sort_by(|a, b| {
        a.street_distance
            .total_cmp(&b.street_distance)
            .then_with(|| a.house.cmp(&b.house))
    });

    street.houses = houses;
    street.houses_offset_m = Some(offset_m);
}

/// A projection paired with the house it refers to.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub projection: &'a HouseProjection,
    pub house: &'a House,
}

impl Candidate<'_> {
    #[must_use]
    pub const fn distance(&self) -> f64 {
        self.projection.distance
    }

    #[must_use]
    pub const fn sign(&self) -> bool {
        self.projection.sign
    }

    #[must_use]
    pub const fn int_number(&self) -> u32 {
        self.house.number().int_number()
    }

    #[must_use]
    pub fn full_number(&self) -> &str {
        self.house.number().full()
    }

    #[must_use]
    pub const fn is_odd(&self) -> bool {
        self.house.number().is_odd()
    }
}
