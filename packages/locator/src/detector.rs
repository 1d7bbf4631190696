//! The house detector: street cache, merging, house reading, and the
//! per-street search that turns a house number into scored buildings.

use std::collections::{BTreeMap, BTreeSet};

use house_locator_models::{FeatureId, HouseLocatorConfig, MatchResult};

use crate::HouseLocatorError;
use crate::accumulator::{ResultAccumulator, SearchRules, produce_voting};
use crate::geometry;
use crate::merge::{EndpointIndex, StreetMerger, sort_by_length};
use crate::number::{NumberRules, ParsedNumber};
use crate::projection::{Candidate, StreetProjections, StreetProjector, finish_merged_street};
use crate::source::FeatureSource;
use crate::street::{House, MergedStreet, Street};

/// Locates buildings by house number along a set of streets.
///
/// A detector is reused across queries: streets and houses stay cached by
/// feature id and are only reloaded when a query's street set differs
/// substantially from the cached one. Typical use is
/// [`load_streets`](Self::load_streets), [`merge_streets`](Self::merge_streets),
/// [`read_all_houses`](Self::read_all_houses), then
/// [`get_house_for_name`](Self::get_house_for_name), or all four at once
/// through [`locate`](Self::locate).
pub struct HouseDetector {
    config: HouseLocatorConfig,
    rules: NumberRules,
    streets: BTreeMap<FeatureId, Street>,
    houses: BTreeMap<FeatureId, House>,
    endpoints: EndpointIndex,
    merged: Vec<MergedStreet>,
    projections: BTreeMap<FeatureId, StreetProjections>,
    next_group: usize,
    metres_to_units: f64,
    house_offset_m: f64,
}

impl HouseDetector {
    #[must_use]
    pub fn new(config: HouseLocatorConfig) -> Self {
        let rules = NumberRules {
            nearby_distance: config.nearby_distance,
            american: config.american_numbers,
        };
        Self {
            config,
            rules,
            streets: BTreeMap::new(),
            houses: BTreeMap::new(),
            endpoints: EndpointIndex::default(),
            merged: Vec::new(),
            projections: BTreeMap::new(),
            next_group: 0,
            metres_to_units: geometry::DEFAULT_METRES_TO_UNITS,
            house_offset_m: 0.0,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &HouseLocatorConfig {
        &self.config
    }

    /// Merged streets, longest first.
    #[must_use]
    pub fn merged_streets(&self) -> &[MergedStreet] {
        &self.merged
    }

    #[must_use]
    pub fn street(&self, id: FeatureId) -> Option<&Street> {
        self.streets.get(&id)
    }

    #[must_use]
    pub fn cached_streets(&self) -> usize {
        self.streets.len()
    }

    #[must_use]
    pub fn cached_houses(&self) -> usize {
        self.houses.len()
    }

    /// Loads the given streets into the cache.
    ///
    /// When the cache shares too little with `ids` it is dropped
    /// entirely; when it is much larger than `ids`, streets absent from
    /// `ids` are evicted. Returns the number of newly loaded streets.
    ///
    /// # Errors
    ///
    /// Returns [`HouseLocatorError::Source`] if the source fails.
    pub fn load_streets(
        &mut self,
        ids: &[FeatureId],
        source: &impl FeatureSource,
    ) -> Result<usize, HouseLocatorError> {
        let ids: BTreeSet<FeatureId> = ids.iter().copied().collect();

        if !self.streets.is_empty() {
            let common = ids.iter().filter(|id| self.streets.contains_key(id)).count();
            let cache = self.streets.len();

            #[allow(clippy::cast_precision_loss)]
            let shrink = cache as f64 > ids.len() as f64 * self.config.cache_shrink_ratio;

            if common < cache.min(ids.len()) {
                log::debug!(
                    "Clearing street cache: common={common} cache={cache} input={}",
                    ids.len()
                );
                self.clear_caches();
            } else if shrink {
                log::debug!("Evicting unused streets: cache={cache} input={}", ids.len());
                self.clear_unused_streets(&ids);
            }
        }

        let missing: Vec<FeatureId> = ids
            .iter()
            .filter(|id| !self.streets.contains_key(id))
            .copied()
            .collect();
        if missing.is_empty() {
            return Ok(0);
        }

        let mut count = 0;
        for feature in source.load_lines(&missing)? {
            if self.streets.contains_key(&feature.id) {
                continue;
            }
            let Some(street) = Street::from_feature(&feature) else {
                log::trace!("Skipping line {} without usable name or geometry", feature.id);
                continue;
            };

            if self.endpoints.is_empty() {
                self.measure_units(&street);
            }
            self.endpoints.insert(&street);
            self.streets.insert(street.id(), street);
            count += 1;
        }

        log::debug!("Loaded {count} streets ({} cached)", self.streets.len());
        Ok(count)
    }

    /// Derives the metres-to-plane factor from a street's end points.
    fn measure_units(&mut self, street: &Street) {
        let metres = geometry::distance_meters(street.front(), street.back());
        if metres > 0.0 {
            self.metres_to_units = geometry::planar_distance(street.front(), street.back()) / metres;
            log::debug!(
                "Street join radius: {}",
                self.metres_to_units * self.config.street_connection_length_m
            );
        }
    }

    /// Drops every cached street, house, and merge result.
    pub fn clear_caches(&mut self) {
        self.streets.clear();
        self.houses.clear();
        self.endpoints = EndpointIndex::default();
        self.merged.clear();
        self.projections.clear();
        self.next_group = 0;
    }

    /// Evicts streets not in `keep`.
    ///
    /// Merged streets that lose a fragment are dropped, and their
    /// remaining fragments go back to the unmerged pool.
    fn clear_unused_streets(&mut self, keep: &BTreeSet<FeatureId>) {
        let removed: BTreeSet<FeatureId> = self
            .streets
            .keys()
            .filter(|id| !keep.contains(id))
            .copied()
            .collect();

        for id in &removed {
            self.streets.remove(id);
            self.projections.remove(id);
        }

        let streets = &mut self.streets;
        self.merged.retain(|m| {
            if !m.fragments().iter().any(|id| removed.contains(id)) {
                return true;
            }
            for id in m.fragments() {
                if let Some(street) = streets.get_mut(id) {
                    street.group = None;
                }
            }
            false
        });

        self.endpoints = EndpointIndex::build(self.streets.values());
    }

    /// Joins unmerged fragments into merged streets. Returns the number of
    /// merged streets.
    pub fn merge_streets(&mut self) -> usize {
        let radius = self.config.street_connection_length_m * self.metres_to_units;
        let max_angle = self.config.street_connection_max_angle_deg.to_radians();

        let merged = StreetMerger::new(&mut self.streets, &self.endpoints, radius, max_angle)
            .merge_unmerged(&mut self.next_group);
        self.merged.extend(merged);
        sort_by_length(&mut self.merged);

        log::debug!(
            "Merged {} fragments into {} streets",
            self.streets.len(),
            self.merged.len()
        );
        self.merged.len()
    }

    /// Reads houses within `offset_m` metres of every cached street.
    ///
    /// Streets already read at an offset at least as large, and not
    /// reversed since, keep their projections.
    ///
    /// # Errors
    ///
    /// Returns [`HouseLocatorError::Source`] if the source fails.
    pub fn read_all_houses(
        &mut self,
        offset_m: f64,
        source: &impl FeatureSource,
    ) -> Result<(), HouseLocatorError> {
        self.house_offset_m = offset_m;

        let mut reread = BTreeSet::new();
        for street in self.streets.values() {
            let fresh = self
                .projections
                .get(&street.id())
                .is_some_and(|p| p.offset_m >= offset_m && p.reversed == street.is_reversed());
            if fresh {
                continue;
            }

            let Some(rect) = street.limit_rect(offset_m) else {
                continue;
            };
            let projector = StreetProjector::new(street.points(), offset_m);

            let mut houses = Vec::new();
            for feature in source.points_in_rect(&rect)? {
                let projection = match self.houses.get(&feature.id) {
                    Some(house) => projector.project(house),
                    None => {
                        let Some(house) = House::from_feature(&feature, self.rules) else {
                            continue;
                        };
                        let projection = projector.project(&house);
                        if projection.is_some() {
                            self.houses.insert(house.id(), house);
                        }
                        projection
                    }
                };
                houses.extend(projection);
            }

            let mut projections = StreetProjections {
                offset_m,
                reversed: street.is_reversed(),
                length: projector.length(),
                houses,
            };
            projections.sort();
            log::trace!(
                "Street {} ({}): {} houses",
                street.id(),
                street.name(),
                projections.houses.len()
            );
            self.projections.insert(street.id(), projections);
            reread.insert(street.id());
        }

        for merged in &mut self.merged {
            let stale = merged.houses_offset_m != Some(offset_m)
                || merged.fragments().iter().any(|id| reread.contains(id));
            if stale {
                finish_merged_street(merged, &self.projections, offset_m);
            }
        }

        log::debug!(
            "Read houses for {} streets ({} houses cached)",
            reread.len(),
            self.houses.len()
        );
        Ok(())
    }

    /// Finds the buildings best matching `house_number` on each merged
    /// street.
    ///
    /// Results are ordered by descending score, then house id, then street
    /// id, with at most one entry per (house, street) pair.
    #[must_use]
    pub fn get_house_for_name(&self, house_number: &str) -> Vec<MatchResult> {
        let query = ParsedNumber::parse(house_number, self.rules);
        if query.int_number() == 0 {
            log::debug!("Unusable house number {house_number:?}");
            return Vec::new();
        }

        let rules = SearchRules {
            nearby_distance: self.config.nearby_distance,
            max_connection_dist_m: self.config.max_connection_dist_m,
        };
        let offsets: Vec<f64> = self
            .config
            .offsets_m
            .iter()
            .copied()
            .take_while(|offset| *offset <= self.house_offset_m)
            .collect();

        let mut accumulators = [
            ResultAccumulator::new(&query, rules),
            ResultAccumulator::new(&query, rules),
            ResultAccumulator::new(&query, rules),
        ];

        let mut results = Vec::new();
        for street in &self.merged {
            let candidates: Vec<Candidate<'_>> = street
                .houses()
                .iter()
                .filter_map(|projection| {
                    self.houses
                        .get(&projection.house)
                        .map(|house| Candidate { projection, house })
                })
                .collect();

            accumulators[0].set_street(&candidates, self.config.count_for_odd_test);
            accumulators[1].set_side(true);
            accumulators[2].set_side(false);

            search_ladder(&mut accumulators, &candidates, &offsets);

            for vote in produce_voting(&accumulators) {
                let Some(house) = self.houses.get(&vote.house) else {
                    continue;
                };
                results.push(MatchResult {
                    house_id: house.id(),
                    house_number: house.raw_number().to_string(),
                    position: geometry::to_lon_lat(house.position()),
                    street_id: street.first_fragment(),
                    street_name: street.name().to_string(),
                    street_fragments: street.fragments().to_vec(),
                    score: vote.score,
                    best_slot: vote.best_slot,
                });
            }

            for acc in &mut accumulators {
                acc.reset();
            }
        }

        results.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| a.house_id.cmp(&b.house_id))
                .then_with(|| a.street_id.cmp(&b.street_id))
        });
        let mut seen = BTreeSet::new();
        results.retain(|r| seen.insert((r.house_id, r.street_id)));

        log::debug!(
            "House {house_number:?}: {} results on {} streets",
            results.len(),
            self.merged.len()
        );
        results
    }

    /// Loads, merges, reads houses, and searches in one call.
    ///
    /// # Errors
    ///
    /// Returns [`HouseLocatorError::Source`] if the source fails.
    pub fn locate(
        &mut self,
        street_ids: &[FeatureId],
        house_number: &str,
        source: &impl FeatureSource,
    ) -> Result<Vec<MatchResult>, HouseLocatorError> {
        self.load_streets(street_ids, source)?;
        self.merge_streets();
        self.read_all_houses(self.config.read_offset_m, source)?;
        Ok(self.get_house_for_name(house_number))
    }
}

/// Widens the search radius until some accumulator finds an exact match.
fn search_ladder(
    accumulators: &mut [ResultAccumulator<'_>],
    candidates: &[Candidate<'_>],
    offsets: &[f64],
) {
    for &offset in offsets {
        for acc in accumulators.iter_mut() {
            acc.search(candidates, offset);
            if acc.has_best_match() {
                return;
            }
        }
    }
}
