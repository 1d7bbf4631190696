//! Scoring houses of one street under a numbering hypothesis.
//!
//! The detector runs three accumulators per street. One assumes that odd
//! and even numbers sit on opposite sides and works out which side is
//! which from the closest houses. The other two ignore parity and only
//! look at the left or the right side. Each accumulator keeps the closest
//! house per [`MatchSlot`]; their slots are then merged by voting.

use std::collections::BinaryHeap;

use house_locator_models::{FeatureId, MatchSlot};

use crate::chain::{ChainRules, build_chains};
use crate::number::ParsedNumber;
use crate::projection::Candidate;

/// How an accumulator decides which side of the street it looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hypothesis {
    /// Only houses with the query's parity, on the side that parity was
    /// found to occupy.
    Parity { is_odd: bool, sign: bool },
    /// Every house on one side.
    Side(bool),
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    house: FeatureId,
    distance: f64,
}

/// Accumulated vote of one house on one street.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vote {
    pub house: FeatureId,
    pub score: u32,
    /// Strongest slot the house filled in any accumulator.
    pub best_slot: MatchSlot,
}

/// Numeric and distance limits shared by all accumulators.
#[derive(Debug, Clone, Copy)]
pub struct SearchRules {
    pub nearby_distance: u32,
    pub max_connection_dist_m: f64,
}

/// Closest-house-per-slot tracker for one hypothesis.
#[derive(Debug, Clone)]
pub struct ResultAccumulator<'q> {
    query: &'q ParsedNumber,
    rules: SearchRules,
    hypothesis: Hypothesis,
    slots: [Option<Slot>; 4],
}

/// A projection ordered by distance, farthest on top of the heap.
struct ByDistance<'a, 'c>(&'c Candidate<'a>);

impl PartialEq for ByDistance<'_, '_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for ByDistance<'_, '_> {}

impl PartialOrd for ByDistance<'_, '_> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ByDistance<'_, '_> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0
            .distance()
            .total_cmp(&other.0.distance())
            .then_with(|| self.0.house.id().cmp(&other.0.house.id()))
    }
}

impl<'q> ResultAccumulator<'q> {
    #[must_use]
    pub const fn new(query: &'q ParsedNumber, rules: SearchRules) -> Self {
        Self {
            query,
            rules,
            hypothesis: Hypothesis::Side(false),
            slots: [None; 4],
        }
    }

    #[must_use]
    pub const fn hypothesis(&self) -> Hypothesis {
        self.hypothesis
    }

    pub fn reset(&mut self) {
        self.slots = [None; 4];
    }

    /// Switches to the parity hypothesis for a street.
    ///
    /// The side of the query's parity is inferred from the
    /// `count_for_odd_test` projections closest to the street, each
    /// weighted by the inverse of its distance. Returns whether a house
    /// with the query's parity lies on the inferred side.
    pub fn set_street(&mut self, candidates: &[Candidate<'_>], count_for_odd_test: usize) -> bool {
        self.reset();

        // Keep the closest `count_for_odd_test` projections.
        let mut heap = BinaryHeap::with_capacity(count_for_odd_test + 1);
        for c in candidates {
            heap.push(ByDistance(c));
            if heap.len() > count_for_odd_test {
                heap.pop();
            }
        }

        // even-left, odd-left, even-right, odd-right
        let mut counter = [0.0_f64; 4];
        for ByDistance(c) in &heap {
            let index = usize::from(c.is_odd()) + if c.sign() { 2 } else { 0 };
            counter[index] += 1.0 / c.distance().max(0.01);
        }

        let is_odd = self.query.is_odd();
        let sign = if counter[0] + counter[3] > counter[1] + counter[2] {
            is_odd
        } else {
            !is_odd
        };
        self.hypothesis = Hypothesis::Parity { is_odd, sign };

        let pivot = heap
            .iter()
            .any(|ByDistance(c)| c.sign() == sign && c.is_odd() == is_odd);
        log::trace!("set_street: counters={counter:?} sign={sign} pivot={pivot}");
        pivot
    }

    /// Switches to a parity-blind hypothesis looking at one side.
    pub fn set_side(&mut self, sign: bool) {
        self.reset();
        self.hypothesis = Hypothesis::Side(sign);
    }

    #[must_use]
    pub const fn is_our_side(&self, candidate: &Candidate<'_>) -> bool {
        match self.hypothesis {
            Hypothesis::Parity { is_odd, sign } => {
                candidate.sign() == sign && candidate.is_odd() == is_odd
            }
            Hypothesis::Side(sign) => candidate.sign() == sign,
        }
    }

    /// Classifies a candidate if it lies on our side.
    pub fn process_candidate(&mut self, candidate: &Candidate<'_>) {
        if self.is_our_side(candidate) {
            self.match_candidate(candidate, false);
        }
    }

    /// Classifies a candidate and keeps it if it is the closest in its
    /// slot so far.
    pub fn match_candidate(&mut self, candidate: &Candidate<'_>, check_nearby: bool) {
        let slot = match candidate.house.get_match(self.query) {
            Some(slot) => slot,
            None if check_nearby
                && candidate
                    .house
                    .nearby_match(self.query, self.rules.nearby_distance) =>
            {
                MatchSlot::Nearby
            }
            None => return,
        };

        let entry = &mut self.slots[slot.rank()];
        if entry.is_none_or(|s| s.distance > candidate.distance()) {
            *entry = Some(Slot {
                house: candidate.house.id(),
                distance: candidate.distance(),
            });
        }
    }

    #[must_use]
    pub const fn has_best_match(&self) -> bool {
        self.slots[0].is_some()
    }

    /// The house held in a slot, if any.
    #[must_use]
    pub fn slot(&self, slot: MatchSlot) -> Option<FeatureId> {
        self.slots[slot.rank()].map(|s| s.house)
    }

    /// Searches the projections of a street within `offset_m` metres.
    ///
    /// Houses on our side are grouped into chains around the exact
    /// matches. The best chain, and every chain whose numbers do not
    /// overlap it, are replayed into the slots. Without any exact match
    /// no chain can be seeded and the slots are left untouched.
    pub fn search(&mut self, candidates: &[Candidate<'_>], offset_m: f64) {
        let ours: Vec<Candidate<'_>> = candidates
            .iter()
            .filter(|c| c.distance() <= offset_m && self.is_our_side(c))
            .copied()
            .collect();

        let step = match self.hypothesis {
            Hypothesis::Parity { .. } => 2,
            Hypothesis::Side(_) => 1,
        };
        let chains = build_chains(
            &ours,
            self.query,
            ChainRules {
                step,
                nearby_distance: self.rules.nearby_distance,
                max_connection_dist_m: self.rules.max_connection_dist_m,
            },
        );

        let Some(best) = chains.first() else {
            return;
        };

        for (i, chain) in chains.iter().enumerate() {
            if (i == 0 || !best.intersects(chain)) && chain.matches(self.query) {
                for c in chain.houses() {
                    self.match_candidate(c, true);
                }
            }
        }
    }

    /// Adds this accumulator's votes to `votes`.
    ///
    /// `Nearby` only votes when there is no exact match.
    pub fn flush(&self, votes: &mut Vec<Vote>) {
        for slot in MatchSlot::ALL {
            let Some(hit) = self.slots[slot.rank()] else {
                continue;
            };
            if slot == MatchSlot::Nearby && self.has_best_match() {
                continue;
            }

            if let Some(vote) = votes.iter_mut().find(|v| v.house == hit.house) {
                vote.score += slot.vote();
                if slot.rank() < vote.best_slot.rank() {
                    vote.best_slot = slot;
                }
            } else {
                votes.push(Vote {
                    house: hit.house,
                    score: slot.vote(),
                    best_slot: slot,
                });
            }
        }
    }
}

/// Merges the votes of every accumulator of one street and keeps the
/// houses sharing the highest score.
#[must_use]
pub fn produce_voting(accumulators: &[ResultAccumulator<'_>]) -> Vec<Vote> {
    let mut votes = Vec::new();
    for acc in accumulators {
        acc.flush(&mut votes);
    }

    votes.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.house.cmp(&b.house)));
    let Some(top) = votes.first().map(|v| v.score) else {
        return votes;
    };
    votes.retain(|v| v.score == top);
    votes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::number::NumberRules;
    use crate::projection::test_support::Fixture;

    const RULES: SearchRules = SearchRules {
        nearby_distance: 4,
        max_connection_dist_m: 300.0,
    };

    fn query(s: &str) -> ParsedNumber {
        ParsedNumber::parse(s, NumberRules::default())
    }

    #[test]
    fn exact_outranks_same_parity_at_equal_distance() {
        let fixture = Fixture::new(&[("12", 100.0, 10.0), ("12a", 200.0, 10.0)]);
        let candidates = fixture.candidates();
        let q = query("12");

        let mut acc = ResultAccumulator::new(&q, RULES);
        acc.set_side(true);
        acc.search(&candidates, 25.0);

        assert_eq!(acc.slot(MatchSlot::Exact), Some(FeatureId(1)));
        assert_eq!(acc.slot(MatchSlot::SameParity), Some(FeatureId(2)));

        let votes = produce_voting(&[acc]);
        assert_eq!(
            votes,
            vec![Vote {
                house: FeatureId(1),
                score: 8,
                best_slot: MatchSlot::Exact,
            }]
        );
    }

    #[test]
    fn keeps_closest_house_per_slot() {
        let fixture = Fixture::new(&[("12", 100.0, 20.0), ("12", 400.0, 5.0)]);
        let candidates = fixture.candidates();
        let q = query("12");

        let mut acc = ResultAccumulator::new(&q, RULES);
        acc.set_side(true);
        acc.search(&candidates, 25.0);
        assert_eq!(acc.slot(MatchSlot::Exact), Some(FeatureId(2)));
    }

    #[test]
    fn ignores_the_other_side_and_far_houses() {
        let fixture = Fixture::new(&[("12", 100.0, -10.0), ("12", 300.0, 40.0)]);
        let candidates = fixture.candidates();
        let q = query("12");

        let mut acc = ResultAccumulator::new(&q, RULES);
        acc.set_side(true);
        acc.search(&candidates, 25.0);
        assert!(!acc.has_best_match());

        acc.search(&candidates, 50.0);
        assert_eq!(acc.slot(MatchSlot::Exact), Some(FeatureId(2)));
    }

    #[test]
    fn infers_side_of_parity() {
        // Even numbers north (left), odd numbers south (right).
        let fixture = Fixture::new(&[
            ("2", 0.0, 10.0),
            ("4", 20.0, 10.0),
            ("6", 40.0, 10.0),
            ("1", 0.0, -10.0),
            ("3", 20.0, -10.0),
            ("5", 40.0, -10.0),
        ]);
        let candidates = fixture.candidates();

        let q = query("3");
        let mut acc = ResultAccumulator::new(&q, RULES);
        assert!(acc.set_street(&candidates, 16));
        assert_eq!(
            acc.hypothesis(),
            Hypothesis::Parity {
                is_odd: true,
                sign: false
            }
        );
        acc.search(&candidates, 25.0);
        assert_eq!(acc.slot(MatchSlot::Exact), Some(FeatureId(5)));

        let q = query("4");
        let mut acc = ResultAccumulator::new(&q, RULES);
        assert!(acc.set_street(&candidates, 16));
        assert_eq!(
            acc.hypothesis(),
            Hypothesis::Parity {
                is_odd: false,
                sign: true
            }
        );
    }

    #[test]
    fn process_candidate_skips_the_other_side() {
        let fixture = Fixture::new(&[("12", 100.0, -5.0), ("12", 200.0, 10.0)]);
        let candidates = fixture.candidates();
        let q = query("12");

        let mut acc = ResultAccumulator::new(&q, RULES);
        acc.set_side(true);
        for c in &candidates {
            acc.process_candidate(c);
        }
        assert_eq!(acc.slot(MatchSlot::Exact), Some(FeatureId(2)));
    }

    #[test]
    fn nearby_votes_only_without_exact_match() {
        let fixture = Fixture::new(&[("8", 100.0, 10.0), ("6", 120.0, 10.0)]);
        let candidates = fixture.candidates();
        let q = query("6");

        let mut acc = ResultAccumulator::new(&q, RULES);
        acc.set_side(true);
        acc.match_candidate(&candidates[0], false);
        assert_eq!(acc.slot(MatchSlot::Nearby), None);
        acc.match_candidate(&candidates[0], true);
        assert_eq!(acc.slot(MatchSlot::Nearby), Some(FeatureId(1)));

        let mut votes = Vec::new();
        acc.flush(&mut votes);
        assert_eq!(votes.len(), 1);
        assert_eq!(votes[0].score, 1);

        acc.match_candidate(&candidates[1], true);
        let mut votes = Vec::new();
        acc.flush(&mut votes);
        assert_eq!(votes.len(), 1);
        assert_eq!(votes[0].house, FeatureId(2));
        assert_eq!(votes[0].score, 8);
    }

    #[test]
    fn street_without_exact_number_gets_no_votes() {
        let fixture = Fixture::new(&[("42a", 100.0, 10.0), ("11-13", 150.0, 10.0)]);
        let candidates = fixture.candidates();
        let q = query("42");

        let mut acc = ResultAccumulator::new(&q, RULES);
        acc.set_side(true);
        acc.search(&candidates, 25.0);
        assert!(MatchSlot::ALL.iter().all(|&slot| acc.slot(slot).is_none()));

        acc.set_street(&candidates, 16);
        acc.search(&candidates, 25.0);
        assert!(produce_voting(&[acc]).is_empty());
    }

    #[test]
    fn voting_sums_across_accumulators_and_keeps_ties() {
        let fixture = Fixture::new(&[("12", 100.0, 10.0), ("12", 100.0, -10.0)]);
        let candidates = fixture.candidates();
        let q = query("12");

        let mut left = ResultAccumulator::new(&q, RULES);
        left.set_side(true);
        left.search(&candidates, 25.0);
        let mut right = ResultAccumulator::new(&q, RULES);
        right.set_side(false);
        right.search(&candidates, 25.0);

        let votes = produce_voting(&[left.clone(), right]);
        assert_eq!(votes.len(), 2);
        assert!(votes.iter().all(|v| v.score == 8));

        let votes = produce_voting(&[left.clone(), left]);
        assert_eq!(votes.len(), 1);
        assert_eq!(votes[0].score, 16);
    }
}
