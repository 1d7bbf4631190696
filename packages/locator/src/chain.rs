//! Clustering house projections into numeric chains.
//!
//! A chain is a run of houses that plausibly continue one numbering
//! sequence along one side of a street. Chains grow over the numbers, not
//! the geometry: starting from the houses carrying the queried number, the
//! builder looks for the neighbouring numbers (`n ± step`, `n ± 2·step`)
//! and attaches each one to the closest chain that already holds a nearby
//! number. Houses that no chain can claim start chains of their own.

use std::cmp::Ordering;
use std::collections::{BTreeSet, BinaryHeap, VecDeque};

use crate::geometry;
use crate::number::ParsedNumber;
use crate::projection::Candidate;

/// Number of closest houses averaged into a chain score.
const SCORE_HOUSES: usize = 3;

/// A growing cluster of houses believed to share one number sequence.
#[derive(Debug, Clone)]
pub struct HouseChain<'a> {
    houses: Vec<Candidate<'a>>,
    numbers: BTreeSet<&'a str>,
    min_number: u32,
    max_number: u32,
    score: f64,
}

impl<'a> HouseChain<'a> {
    fn new(seed: Candidate<'a>) -> Self {
        let n = seed.int_number();
        let mut chain = Self {
            houses: Vec::new(),
            numbers: BTreeSet::new(),
            min_number: n,
            max_number: n,
            score: f64::MAX,
        };
        chain.add(seed);
        chain
    }

    fn add(&mut self, candidate: Candidate<'a>) {
        if self.numbers.insert(candidate.house.number().full()) {
            let n = candidate.int_number();
            self.min_number = self.min_number.min(n);
            self.max_number = self.max_number.max(n);
            self.houses.push(candidate);
        }
    }

    fn contains(&self, full_number: &str) -> bool {
        self.numbers.contains(full_number)
    }

    /// Mean perpendicular distance of the closest houses.
    fn count_score(&mut self) {
        self.houses
            .sort_by(|a, b| a.distance().total_cmp(&b.distance()));
        let closest = &self.houses[..self.houses.len().min(SCORE_HOUSES)];
        #[allow(clippy::cast_precision_loss)]
        let count = closest.len() as f64;
        self.score = closest.iter().map(Candidate::distance).sum::<f64>() / count;
    }

    #[must_use]
    pub fn houses(&self) -> &[Candidate<'a>] {
        &self.houses
    }

    /// Lower is better.
    #[must_use]
    pub const fn score(&self) -> f64 {
        self.score
    }

    /// Whether the number intervals of two chains overlap.
    #[must_use]
    pub const fn intersects(&self, other: &Self) -> bool {
        self.min_number < other.max_number && other.min_number < self.max_number
    }

    /// Whether any member of the chain matches the query at all.
    #[must_use]
    pub fn matches(&self, query: &ParsedNumber) -> bool {
        self.houses
            .iter()
            .any(|c| c.house.get_match(query).is_some())
    }
}

/// A pending claim of a candidate house by a chain.
#[derive(Debug, Clone, Copy)]
struct Competitor {
    distance: f64,
    candidate: usize,
    chain: usize,
}

impl PartialEq for Competitor {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Competitor {}

impl PartialOrd for Competitor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Competitor {
    // Reversed so that `BinaryHeap` pops the closest claim first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .distance
            .total_cmp(&self.distance)
            .then_with(|| other.candidate.cmp(&self.candidate))
            .then_with(|| other.chain.cmp(&self.chain))
    }
}

/// Parameters of one chain-building run.
#[derive(Debug, Clone, Copy)]
pub struct ChainRules {
    /// 2 when only one parity is considered, else 1.
    pub step: u32,
    /// Members within this numeric distance anchor a connection.
    pub nearby_distance: u32,
    /// Houses further apart than this are never connected.
    pub max_connection_dist_m: f64,
}

fn enqueue_neighbours(number: u32, step: u32, queue: &mut VecDeque<u32>) {
    for i in 1..=2 {
        let delta = step * i;
        queue.push_back(number.saturating_add(delta));
        if number > delta {
            queue.push_back(number - delta);
        }
    }
}

struct ChainBuilder<'a, 'c> {
    candidates: &'c [Candidate<'a>],
    used: Vec<bool>,
    remaining: usize,
    chains: Vec<HouseChain<'a>>,
    queue: VecDeque<u32>,
    rules: ChainRules,
}

impl<'a> ChainBuilder<'a, '_> {
    fn claim(&mut self, index: usize, chain: usize) {
        self.used[index] = true;
        self.remaining -= 1;
        self.chains[chain].add(self.candidates[index]);
    }

    /// Distance from a candidate to the nearest member of a chain whose
    /// number is close enough to anchor it.
    fn connection_distance(&self, candidate: &Candidate<'a>, chain: &HouseChain<'a>) -> f64 {
        chain
            .houses
            .iter()
            .filter(|h| h.int_number().abs_diff(candidate.int_number()) <= self.rules.nearby_distance)
            .map(|h| geometry::distance_meters(h.house.position(), candidate.house.position()))
            .fold(f64::MAX, f64::min)
    }

    /// Attaches houses carrying `number` to competing chains, closest
    /// claim first. Returns whether anything was attached.
    fn assign_number(&mut self, number: u32) -> bool {
        let mut heap = BinaryHeap::new();
        for (index, candidate) in self.candidates.iter().enumerate() {
            if self.used[index] || candidate.int_number() != number {
                continue;
            }
            for (chain_index, chain) in self.chains.iter().enumerate() {
                if chain.contains(candidate.full_number()) {
                    continue;
                }
                let distance = self.connection_distance(candidate, chain);
                if distance < self.rules.max_connection_dist_m {
                    heap.push(Competitor {
                        distance,
                        candidate: index,
                        chain: chain_index,
                    });
                }
            }
        }

        let mut assigned = false;
        while let Some(c) = heap.pop() {
            if self.used[c.candidate] {
                continue;
            }
            if self.chains[c.chain].contains(self.candidates[c.candidate].full_number()) {
                continue;
            }
            self.claim(c.candidate, c.chain);
            assigned = true;
        }
        assigned
    }

    fn run(mut self) -> Vec<HouseChain<'a>> {
        while self.remaining > 0 {
            if let Some(number) = self.queue.pop_front() {
                if self.assign_number(number) {
                    enqueue_neighbours(number, self.rules.step, &mut self.queue);
                }
                continue;
            }

            let Some(index) = self.used.iter().position(|u| !u) else {
                break;
            };
            self.used[index] = true;
            self.remaining -= 1;
            let seed = self.candidates[index];
            self.chains.push(HouseChain::new(seed));
            enqueue_neighbours(seed.int_number(), self.rules.step, &mut self.queue);
        }
        self.chains
    }
}

/// Clusters `candidates` into chains around the houses numbered exactly
/// like `query`.
///
/// Returns no chains when no candidate carries the query's number text.
/// Chains come back scored and ordered best first.
#[must_use]
pub fn build_chains<'a>(
    candidates: &[Candidate<'a>],
    query: &ParsedNumber,
    rules: ChainRules,
) -> Vec<HouseChain<'a>> {
    let mut used = vec![false; candidates.len()];
    let mut chains = Vec::new();

    for (index, candidate) in candidates.iter().enumerate() {
        if candidate.full_number() == query.full() {
            chains.push(HouseChain::new(*candidate));
            used[index] = true;
        }
    }
    let Some(first) = chains.first() else {
        return Vec::new();
    };

    let mut queue = VecDeque::new();
    enqueue_neighbours(first.houses[0].int_number(), rules.step, &mut queue);

    let builder = ChainBuilder {
        candidates,
        remaining: used.iter().filter(|u| !**u).count(),
        used,
        chains,
        queue,
        rules,
    };

    let mut chains = builder.run();
    for chain in &mut chains {
        chain.count_score();
    }
    chains.sort_by(|a, b| a.score.total_cmp(&b.score));
    chains
}
