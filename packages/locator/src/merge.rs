//! Joining street fragments into continuous streets.
//!
//! Map data splits one road into many line features. Fragments are joined
//! end to end when they share a name key, their endpoints are close, and
//! the road does not turn too sharply at the joint. The last rule keeps a
//! road from swallowing a perpendicular side street of the same name.

use std::collections::{BTreeMap, VecDeque};

use geo::Coord;
use house_locator_models::FeatureId;
use rstar::RTree;
use rstar::primitives::GeomWithData;

use crate::geometry;
use crate::street::{MergedStreet, Street};

type Endpoint = GeomWithData<[f64; 2], FeatureId>;

/// R-tree over both endpoints of every cached street.
#[derive(Default)]
pub struct EndpointIndex {
    tree: RTree<Endpoint>,
}

impl EndpointIndex {
    /// Rebuilds the index from scratch.
    #[must_use]
    pub fn build<'a>(streets: impl IntoIterator<Item = &'a Street>) -> Self {
        let entries: Vec<Endpoint> = streets
            .into_iter()
            .flat_map(|s| [endpoint(s.front(), s.id()), endpoint(s.back(), s.id())])
            .collect();
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    pub fn insert(&mut self, street: &Street) {
        self.tree.insert(endpoint(street.front(), street.id()));
        self.tree.insert(endpoint(street.back(), street.id()));
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    fn within(&self, p: Coord<f64>, radius: f64) -> impl Iterator<Item = FeatureId> + '_ {
        self.tree
            .locate_within_distance([p.x, p.y], radius * radius)
            .map(|e| e.data)
    }
}

fn endpoint(p: Coord<f64>, id: FeatureId) -> Endpoint {
    GeomWithData::new([p.x, p.y], id)
}

/// Turning angle and gap between the `at_front` end of `street` and the
/// nearer end of `other`.
///
/// Returns `(angle, square_distance, other_attaches_at_front)`.
fn connection_angle_and_distance(
    street: &Street,
    at_front: bool,
    other: &Street,
) -> (f64, f64, bool) {
    let p1 = street.end(at_front);
    let p0 = street.inner_point(at_front);

    let d_front = geometry::square_distance(p1, other.front());
    let d_back = geometry::square_distance(p1, other.back());
    let other_front = d_front < d_back;
    let p2 = other.inner_point(other_front);

    let angle = geometry::shortest_angle(geometry::angle_to(p0, p1), geometry::angle_to(p1, p2));
    (angle, d_front.min(d_back), other_front)
}

/// Merges fragments held in a street cache.
pub struct StreetMerger<'a> {
    streets: &'a mut BTreeMap<FeatureId, Street>,
    endpoints: &'a EndpointIndex,
    /// Connection radius in planar units.
    radius: f64,
    /// Maximum turning angle in radians.
    max_angle: f64,
}

impl<'a> StreetMerger<'a> {
    #[must_use]
    pub const fn new(
        streets: &'a mut BTreeMap<FeatureId, Street>,
        endpoints: &'a EndpointIndex,
        radius: f64,
        max_angle: f64,
    ) -> Self {
        Self {
            streets,
            endpoints,
            radius,
            max_angle,
        }
    }

    /// Finds the fragment continuing `id` at the given end.
    ///
    /// Returns the candidate and whether it attaches with its front.
    fn find_connection(
        &self,
        id: FeatureId,
        at_front: bool,
        group: usize,
    ) -> Option<(FeatureId, bool)> {
        let street = self.streets.get(&id)?;
        let pt = street.end(at_front);

        let mut best: Option<(FeatureId, bool, f64)> = None;
        for candidate_id in self.endpoints.within(pt, self.radius) {
            if candidate_id == id {
                continue;
            }
            let Some(candidate) = self.streets.get(&candidate_id) else {
                continue;
            };
            // Unmerged fragments, or parts of the street being built.
            if candidate.group.is_some_and(|g| g != group) || !street.is_same_street(candidate) {
                continue;
            }

            let (angle, distance, attach_front) =
                connection_angle_and_distance(street, at_front, candidate);
            if angle.abs() >= self.max_angle {
                continue;
            }
            let better = best.is_none_or(|(best_id, _, best_distance)| {
                distance < best_distance || (distance == best_distance && candidate_id < best_id)
            });
            if better {
                best = Some((candidate_id, attach_front, distance));
            }
        }

        // Reaching a part of our own street means the road loops back.
        best.filter(|(candidate_id, ..)| {
            self.streets
                .get(candidate_id)
                .is_some_and(|s| s.group.is_none())
        })
        .map(|(candidate_id, attach_front, _)| (candidate_id, attach_front))
    }

    /// Grows a merged street from `start`, first at its front end, then at
    /// its back end.
    pub fn merge_from(&mut self, start: FeatureId, group: usize) -> Option<MergedStreet> {
        let first = self.streets.get_mut(&start)?;
        debug_assert!(first.group.is_none(), "street {start} merged twice");
        first.group = Some(group);

        let mut chain = VecDeque::from([start]);
        let mut at_front = true;

        loop {
            let mut found = None;
            if at_front {
                found = chain.front().and_then(|&id| self.find_connection(id, true, group));
            }
            if found.is_none() {
                at_front = false;
                found = chain.back().and_then(|&id| self.find_connection(id, false, group));
            }
            let Some((next, attach_front)) = found else {
                break;
            };

            let Some(street) = self.streets.get_mut(&next) else {
                break;
            };
            // Extending the front needs the fragment's back at the joint,
            // and the other way round.
            if at_front == attach_front {
                street.reverse();
            }
            street.group = Some(group);

            if at_front {
                chain.push_front(next);
            } else {
                chain.push_back(next);
            }
        }

        let streets: Vec<FeatureId> = chain.into_iter().collect();
        let head = self.streets.get(&streets[0])?;
        let tail = self.streets.get(&streets[streets.len() - 1])?;

        Some(MergedStreet {
            group,
            name: head.name().to_string(),
            length_m: geometry::distance_meters(head.front(), tail.back()),
            streets,
            houses: Vec::new(),
            houses_offset_m: None,
        })
    }

    /// Merges every fragment not yet assigned to a group.
    ///
    /// Group numbers are taken from `next_group`, which is advanced.
    pub fn merge_unmerged(&mut self, next_group: &mut usize) -> Vec<MergedStreet> {
        let pending: Vec<FeatureId> = self
            .streets
            .values()
            .filter(|s| s.group.is_none())
            .map(Street::id)
            .collect();

        let mut merged = Vec::new();
        for id in pending {
            // Earlier iterations may have absorbed this fragment.
            if self.streets.get(&id).is_some_and(|s| s.group.is_none()) {
                if let Some(street) = self.merge_from(id, *next_group) {
                    merged.push(street);
                }
                *next_group += 1;
            }
        }
        merged
    }
}

/// Orders merged streets longest first, ties by first fragment.
pub fn sort_by_length(streets: &mut [MergedStreet]) {
    streets.sort_by(|a, b| {
        b.length_m
            .total_cmp(&a.length_m)
            .then_with(|| a.first_fragment().cmp(&b.first_fragment()))
    });
}

#[cfg(test)]
mod tests {
    use house_locator_models::LineFeature;

    use super::*;
    use crate::geometry::DEFAULT_METRES_TO_UNITS;
    use crate::geometry::test_support::lon_lat_m;

    fn street(id: u64, name: &str, points_m: &[(f64, f64)]) -> Street {
        Street::from_feature(&LineFeature {
            id: FeatureId(id),
            name: Some(name.to_string()),
            points: points_m.iter().map(|&(x, y)| lon_lat_m(x, y)).collect(),
        })
        .unwrap()
    }

    fn merge(streets: Vec<Street>) -> (Vec<MergedStreet>, BTreeMap<FeatureId, Street>) {
        let mut map: BTreeMap<FeatureId, Street> =
            streets.into_iter().map(|s| (s.id(), s)).collect();
        let endpoints = EndpointIndex::build(map.values());
        let mut next_group = 0;
        let mut merged = StreetMerger::new(
            &mut map,
            &endpoints,
            100.0 * DEFAULT_METRES_TO_UNITS,
            std::f64::consts::FRAC_PI_2,
        )
        .merge_unmerged(&mut next_group);
        sort_by_length(&mut merged);
        (merged, map)
    }

    #[test]
    fn merges_collinear_fragments() {
        let (merged, _) = merge(vec![
            street(1, "Main St", &[(0.0, 0.0), (100.0, 0.0)]),
            street(2, "Main Street", &[(100.0, 0.0), (200.0, 0.0)]),
        ]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].fragments(), &[FeatureId(1), FeatureId(2)]);
        assert!((merged[0].approx_length_m() - 200.0).abs() < 0.5);
    }

    #[test]
    fn merges_across_small_gap_and_reverses() {
        // Fragment 2 is drawn the wrong way and starts 30 m after fragment 1.
        let (merged, map) = merge(vec![
            street(1, "Main St", &[(0.0, 0.0), (100.0, 0.0)]),
            street(2, "Main St", &[(250.0, 0.0), (130.0, 0.0)]),
        ]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].fragments(), &[FeatureId(1), FeatureId(2)]);
        let second = &map[&FeatureId(2)];
        assert!(second.front().x < second.back().x);
    }

    #[test]
    fn extends_both_ends() {
        let (merged, _) = merge(vec![
            street(2, "Main St", &[(100.0, 0.0), (200.0, 0.0)]),
            street(1, "Main St", &[(0.0, 0.0), (100.0, 0.0)]),
            street(3, "Main St", &[(200.0, 0.0), (300.0, 10.0)]),
        ]);
        assert_eq!(merged.len(), 1);
        assert_eq!(
            merged[0].fragments(),
            &[FeatureId(1), FeatureId(2), FeatureId(3)]
        );
    }

    #[test]
    fn refuses_sharp_turns() {
        // Perpendicular side street sharing the name.
        let (merged, _) = merge(vec![
            street(1, "Main St", &[(0.0, 0.0), (100.0, 0.0)]),
            street(2, "Main St", &[(100.0, 0.0), (100.0, 100.0)]),
        ]);
        assert_eq!(merged.len(), 2);

        // Doubling back is sharper still.
        let (merged, _) = merge(vec![
            street(1, "Main St", &[(0.0, 0.0), (100.0, 0.0)]),
            street(2, "Main St", &[(100.0, 0.0), (20.0, 5.0)]),
        ]);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn refuses_different_names_and_far_ends() {
        let (merged, _) = merge(vec![
            street(1, "Main St", &[(0.0, 0.0), (100.0, 0.0)]),
            street(2, "Elm St", &[(100.0, 0.0), (200.0, 0.0)]),
            street(3, "Main St", &[(350.0, 0.0), (450.0, 0.0)]),
        ]);
        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn prefers_closest_continuation() {
        let (merged, _) = merge(vec![
            street(1, "Main St", &[(0.0, 0.0), (100.0, 0.0)]),
            street(2, "Main St", &[(160.0, 0.0), (260.0, 0.0)]),
            street(3, "Main St", &[(105.0, 2.0), (150.0, 40.0)]),
        ]);
        let first = merged
            .iter()
            .find(|m| m.contains(FeatureId(1)))
            .unwrap();
        assert_eq!(first.fragments()[..2], [FeatureId(1), FeatureId(3)]);
    }

    #[test]
    fn sorts_longest_first() {
        let (merged, _) = merge(vec![
            street(1, "Short St", &[(0.0, 0.0), (50.0, 0.0)]),
            street(2, "Long St", &[(0.0, 500.0), (400.0, 500.0)]),
        ]);
        assert_eq!(merged[0].name(), "Long St");
        assert_eq!(merged[1].name(), "Short St");
    }
}
