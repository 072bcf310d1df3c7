// SPDX-License-Identifier: Apache-2.0

//! Search engines over boundary decision vectors, and the pieces they share.

pub mod mct;
pub mod sa;

pub use mct::MonteCarloTreeSearch;
pub use sa::SimulatedAnnealing;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::decision_state::FanoutPoint;
use crate::map_record::{Cost, MapRecord};

/// Common surface of the search strategies.
pub trait SearchEngine {
    /// Runs the search with an iteration budget of `limit` (per temperature
    /// level for annealing).
    fn run(&mut self, limit: usize);

    /// Best mapping found so far. Before `run` this is the mapping of the
    /// initial decision vector.
    fn best_record(&self) -> &MapRecord;

    fn best_cost(&self) -> Cost;

    fn lower_bound(&self) -> usize;

    fn stats(&self) -> &SearchStats;

    /// Installs a flag that stops the search at the next outer iteration once
    /// it is set.
    fn set_cancel_flag(&mut self, flag: Arc<AtomicBool>);
}

fn default_exploration() -> f64 {
    0.3
}

fn default_t0() -> f64 {
    5.0
}

fn default_t_end() -> f64 {
    0.001
}

fn default_decay() -> f64 {
    0.9
}

/// Engine-level options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchOptions {
    /// Seed of the engine's private PRNG.
    #[serde(default)]
    pub seed: u64,
    /// Log per-iteration progress at `info` instead of `trace`.
    #[serde(default)]
    pub verbose: bool,
    /// UCB1 exploration constant.
    #[serde(default = "default_exploration")]
    pub exploration: f64,
    /// Initial annealing temperature.
    #[serde(default = "default_t0")]
    pub t0: f64,
    /// Cooling stops once the temperature drops to this value.
    #[serde(default = "default_t_end")]
    pub t_end: f64,
    /// Geometric cooling factor per temperature level.
    #[serde(default = "default_decay")]
    pub decay: f64,
}

impl Default for SearchOptions {
    fn default() -> Self {
        SearchOptions {
            seed: 0,
            verbose: false,
            exploration: default_exploration(),
            t0: default_t0(),
            t_end: default_t_end(),
            decay: default_decay(),
        }
    }
}

/// Counters collected over one engine's lifetime.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchStats {
    pub evaluations: usize,
    pub best_updates: usize,
    /// Annealing trials accepted (including ties).
    pub accepted: usize,
    pub rejected_metro: usize,
    pub tree_nodes: usize,
    pub solved_nodes: usize,
    /// Best LUT count after each outer iteration.
    pub best_luts_trace: Vec<usize>,
}

/// Best-so-far mapping. The record is copied on improvement, never aliased.
#[derive(Debug, Clone)]
pub struct Best {
    pub cost: Cost,
    pub record: MapRecord,
}

impl Best {
    pub fn new(cost: Cost, record: &MapRecord) -> Self {
        Best {
            cost,
            record: record.clone(),
        }
    }

    /// Replaces the best if `cost` has fewer LUTs. Returns `true` on update.
    pub fn try_update(&mut self, cost: Cost, record: &MapRecord) -> bool {
        if cost.luts < self.cost.luts {
            self.cost = cost;
            self.record.clone_from(record);
            true
        } else {
            false
        }
    }
}

/// Normalized reward of a mapping: `lower_bound / luts`, in `(0, 1]` when the
/// bound is positive.
pub fn score(lower_bound: usize, luts: usize) -> f64 {
    if luts == 0 {
        1.0
    } else {
        lower_bound as f64 / luts as f64
    }
}

/// UCB1 score of a child with `visits` visits and mean reward `mean`.
pub fn ucb1(mean: f64, visits: usize, ln_total: f64, exploration: f64) -> f64 {
    if visits == 0 {
        return f64::INFINITY;
    }
    mean + exploration * (ln_total.max(0.0) / visits as f64).sqrt()
}

/// Metropolis acceptance for a move from `current_metric` to `new_metric`
/// (lower is better). Improvements and ties are always accepted, anything
/// worse with probability `exp((current - new) / temp)`.
pub fn metropolis_accept<R: RngCore + ?Sized>(
    current_metric: f64,
    new_metric: f64,
    temp: f64,
    rng: &mut R,
) -> bool {
    if new_metric <= current_metric {
        return true;
    }
    let accept_prob = ((current_metric - new_metric) / temp).exp();
    // Top 53 bits scaled by 2^-53 lands in [0, 1); never exactly 1.0.
    let u01 = (rng.next_u64() >> 11) as f64 * 2.0_f64.powi(-53);
    u01 < accept_prob
}

/// Sampling weights for the tree search's random playouts.
pub trait SampleWeight {
    fn boundary_weight(&self, point: &FanoutPoint) -> f64;

    /// Weight of finishing the vector, given the weights of the boundary
    /// candidates offered alongside it.
    fn finish_weight(&self, boundary_weights: &[f64]) -> f64 {
        if boundary_weights.is_empty() {
            1.0
        } else {
            boundary_weights.iter().sum::<f64>() / boundary_weights.len() as f64
        }
    }
}

/// `2^(w-1) * 2 * fanout` where `w` is the point's largest cut size: favours
/// structurally larger, higher-fanout points.
#[derive(Debug, Clone, Copy, Default)]
pub struct FanoutCutWeight;

impl SampleWeight for FanoutCutWeight {
    fn boundary_weight(&self, point: &FanoutPoint) -> f64 {
        let w = point.max_cut_leaves.max(1) as i32;
        2.0_f64.powi(w - 1) * 2.0 * point.fanout as f64
    }
}

pub(crate) fn is_cancelled(flag: &Option<Arc<AtomicBool>>) -> bool {
    flag.as_ref().map_or(false, |f| f.load(Ordering::Relaxed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sbj_graph::SbjRef;

    struct FixedU64Rng {
        v: u64,
    }

    impl RngCore for FixedU64Rng {
        fn next_u32(&mut self) -> u32 {
            (self.v >> 32) as u32
        }

        fn next_u64(&mut self) -> u64 {
            self.v
        }

        fn fill_bytes(&mut self, dest: &mut [u8]) {
            for (i, b) in dest.iter_mut().enumerate() {
                *b = (self.v >> ((i % 8) * 8)) as u8;
            }
        }

        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
            self.fill_bytes(dest);
            Ok(())
        }
    }

    #[test]
    fn test_metropolis_accepts_ties_and_improvements() {
        let mut rng = FixedU64Rng { v: u64::MAX };
        assert!(metropolis_accept(5.0, 5.0, 0.001, &mut rng));
        assert!(metropolis_accept(5.0, 4.0, 0.001, &mut rng));
    }

    #[test]
    fn test_metropolis_worse_move_depends_on_draw() {
        // exp(-1/5) ~= 0.82
        let mut low = FixedU64Rng { v: 0 };
        assert!(metropolis_accept(4.0, 5.0, 5.0, &mut low));
        let mut high = FixedU64Rng { v: u64::MAX };
        assert!(!metropolis_accept(4.0, 5.0, 5.0, &mut high));
        // At a tiny temperature nothing worse gets through.
        let mut low = FixedU64Rng { v: 1 << 11 };
        assert!(!metropolis_accept(4.0, 5.0, 0.001, &mut low));
    }

    #[test]
    fn u01_conversion_never_reaches_one() {
        let raw = FixedU64Rng { v: u64::MAX }.next_u64();
        let u01 = (raw >> 11) as f64 * 2.0_f64.powi(-53);
        assert!(u01 < 1.0, "u01 must be in [0,1), got {u01}");
    }

    #[test]
    fn test_ucb1() {
        assert!(ucb1(0.0, 0, 1.0, 0.3).is_infinite());
        // Same mean, fewer visits explores more.
        assert!(ucb1(0.5, 1, 4.0, 0.3) > ucb1(0.5, 10, 4.0, 0.3));
        assert_eq!(ucb1(0.5, 3, 0.0, 0.3), 0.5);
    }

    #[test]
    fn test_score() {
        assert_eq!(score(2, 4), 0.5);
        assert_eq!(score(3, 3), 1.0);
        assert_eq!(score(0, 0), 1.0);
    }

    #[test]
    fn test_fanout_cut_weight() {
        let p = FanoutPoint {
            node: SbjRef::new(7),
            fanout: 3,
            max_cut_leaves: 4,
            drives_output: false,
        };
        let w = FanoutCutWeight;
        assert_eq!(w.boundary_weight(&p), 48.0);
        assert_eq!(w.finish_weight(&[48.0, 16.0]), 32.0);
        assert_eq!(w.finish_weight(&[]), 1.0);
    }

    #[test]
    fn test_best_only_improves_on_luts() {
        let mut a = MapRecord::new(2);
        let mut best = Best::new(Cost { luts: 3, depth: 1 }, &a);
        a.init(3);
        assert!(!best.try_update(Cost { luts: 3, depth: 0 }, &a));
        assert_eq!(best.record.node_count(), 2);
        assert!(best.try_update(Cost { luts: 2, depth: 5 }, &a));
        assert_eq!(best.record.node_count(), 3);
        assert_eq!(best.cost, Cost { luts: 2, depth: 5 });
    }

    #[test]
    fn test_options_defaults() {
        let o = SearchOptions::default();
        assert_eq!(o.seed, 0);
        assert_eq!(o.exploration, 0.3);
        assert_eq!((o.t0, o.t_end, o.decay), (5.0, 0.001, 0.9));
    }
}
