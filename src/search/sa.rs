// SPDX-License-Identifier: Apache-2.0

//! Simulated annealing over the full boundary decision vector.

use std::marker::PhantomData;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;

use crate::area_cover::CoverMode;
use crate::cut::CutHolder;
use crate::decision_state::{DecisionState, FanoutAnalysis, FlatDecisions};
use crate::error::PreconditionError;
use crate::evaluator::{CoverEvaluator, Evaluator};
use crate::lower_bound::lower_bound;
use crate::map_record::{Cost, MapRecord};
use crate::sbj_graph::SubjectGraph;
use crate::search::{
    is_cancelled, metropolis_accept, Best, SearchEngine, SearchOptions, SearchStats,
};

pub struct SimulatedAnnealing<'a, G: SubjectGraph + ?Sized, E = CoverEvaluator<'a, G>> {
    evaluator: E,
    state: FlatDecisions,
    rng: Pcg64Mcg,
    options: SearchOptions,
    lower_bound: usize,
    current: Cost,
    best: Best,
    stats: SearchStats,
    cancel: Option<Arc<AtomicBool>>,
    _graph: PhantomData<&'a G>,
}

impl<'a, G: SubjectGraph + ?Sized> SimulatedAnnealing<'a, G> {
    /// Validates the inputs and evaluates the starting vector (every free
    /// point duplicated), which becomes the first best.
    pub fn new(
        graph: &'a G,
        cuts: &'a CutHolder,
        cut_size_limit: usize,
        mode: CoverMode,
        options: SearchOptions,
    ) -> Result<Self, PreconditionError> {
        let evaluator = CoverEvaluator::new(graph, cuts, cut_size_limit, mode);
        Self::with_evaluator(graph, cuts, cut_size_limit, options, evaluator)
    }
}

impl<'a, G: SubjectGraph + ?Sized, E: Evaluator> SimulatedAnnealing<'a, G, E> {
    /// Anneals with a caller-supplied evaluator over `graph.fanout_points()`.
    pub fn with_evaluator(
        graph: &'a G,
        cuts: &'a CutHolder,
        cut_size_limit: usize,
        options: SearchOptions,
        mut evaluator: E,
    ) -> Result<Self, PreconditionError> {
        cuts.validate(graph, Some(cut_size_limit))?;
        let lower_bound = lower_bound(graph, cuts)?;
        let analysis = FanoutAnalysis::new(graph, cuts, cut_size_limit);
        if evaluator.decision_len() != analysis.len() {
            return Err(PreconditionError::DecisionLenMismatch {
                evaluator: evaluator.decision_len(),
                fanout_points: analysis.len(),
            });
        }
        let mut state = FlatDecisions::new(analysis);

        state.reset();
        let forced = state.apply_forced_moves();
        let current = evaluator.evaluate(state.decisions());
        let best = Best::new(current, evaluator.record());
        log::info!(
            "sa: {} fanout points ({} forced), lower bound {}, initial {} luts / depth {}",
            evaluator.decision_len(),
            forced,
            lower_bound,
            current.luts,
            current.depth
        );
        Ok(SimulatedAnnealing {
            evaluator,
            state,
            rng: Pcg64Mcg::seed_from_u64(options.seed),
            options,
            lower_bound,
            current,
            best,
            stats: SearchStats {
                evaluations: 1,
                ..SearchStats::default()
            },
            cancel: None,
            _graph: PhantomData,
        })
    }

    pub fn evaluator(&self) -> &E {
        &self.evaluator
    }

    /// Cools from `t0` to `t_end`, running `limit` Metropolis trials per
    /// temperature level. Returns a copy of the best record.
    pub fn search(&mut self, limit: usize, verbose: bool) -> MapRecord {
        if self.state.free_points().is_empty() {
            log::debug!("sa: no free fanout points, keeping the initial mapping");
            return self.best.record.clone();
        }
        let verbose = verbose || self.options.verbose;
        let mut temp = self.options.t0;
        let mut level = 0;
        while temp > self.options.t_end {
            if is_cancelled(&self.cancel) {
                log::info!("sa: cancelled at level {} (T={:.4})", level, temp);
                break;
            }
            for _ in 0..limit {
                self.trial(temp);
            }
            self.stats.best_luts_trace.push(self.best.cost.luts);
            if verbose {
                log::info!(
                    "sa level {}: T={:.4} current {} best {} luts",
                    level,
                    temp,
                    self.current.luts,
                    self.best.cost.luts
                );
            } else {
                log::trace!("sa level {}: T={:.4} best {}", level, temp, self.best.cost.luts);
            }
            temp *= self.options.decay;
            level += 1;
        }
        log::info!(
            "sa: best {} luts / depth {} after {} evaluations ({} accepted, {} rejected, lower bound {})",
            self.best.cost.luts,
            self.best.cost.depth,
            self.stats.evaluations,
            self.stats.accepted,
            self.stats.rejected_metro,
            self.lower_bound
        );
        self.best.record.clone()
    }

    fn trial(&mut self, temp: f64) {
        let i = match self.state.free_points().choose(&mut self.rng) {
            Some(&i) => i,
            None => return,
        };
        self.state.flip(i);
        let cost = self.evaluator.evaluate(self.state.decisions());
        self.stats.evaluations += 1;
        if self.best.try_update(cost, self.evaluator.record()) {
            self.stats.best_updates += 1;
            log::debug!("sa: new best {} luts / depth {} at T={:.4}", cost.luts, cost.depth, temp);
        }
        if metropolis_accept(self.current.luts as f64, cost.luts as f64, temp, &mut self.rng) {
            self.stats.accepted += 1;
            self.current = cost;
        } else {
            self.stats.rejected_metro += 1;
            self.state.flip(i);
        }
    }

    pub fn best_record(&self) -> &MapRecord {
        &self.best.record
    }
}

impl<'a, G: SubjectGraph + ?Sized, E: Evaluator> SearchEngine for SimulatedAnnealing<'a, G, E> {
    fn run(&mut self, limit: usize) {
        self.search(limit, false);
    }

    fn best_record(&self) -> &MapRecord {
        &self.best.record
    }

    fn best_cost(&self) -> Cost {
        self.best.cost
    }

    fn lower_bound(&self) -> usize {
        self.lower_bound
    }

    fn stats(&self) -> &SearchStats {
        &self.stats
    }

    fn set_cancel_flag(&mut self, flag: Arc<AtomicBool>) {
        self.cancel = Some(flag);
    }
}
