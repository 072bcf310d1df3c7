// SPDX-License-Identifier: Apache-2.0

//! Monte-Carlo tree search over step-wise boundary decisions.
//!
//! The tree lives in an arena owned by the engine: nodes refer to their
//! parent and children by index, so the whole history is kept across
//! iterations and released when the engine is dropped.

use std::marker::PhantomData;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use rand::distributions::{Distribution, WeightedIndex};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;

use crate::area_cover::CoverMode;
use crate::cut::CutHolder;
use crate::decision_state::{Candidate, DecisionState, FanoutAnalysis, IncrementalDecisions};
use crate::error::PreconditionError;
use crate::evaluator::{CoverEvaluator, Evaluator};
use crate::lower_bound::lower_bound;
use crate::map_record::{Cost, MapRecord};
use crate::sbj_graph::SubjectGraph;
use crate::search::{
    is_cancelled, score, ucb1, Best, FanoutCutWeight, SampleWeight, SearchEngine, SearchOptions,
    SearchStats,
};

#[derive(Debug, Clone)]
pub struct SearchTreeNode {
    parent: Option<usize>,
    children: Vec<usize>,
    /// Step that led here from the parent; `None` for the root.
    decision: Option<Candidate>,
    /// Steps not expanded into children yet, popped from the back.
    worklist: Vec<Candidate>,
    depth: usize,
    visits: usize,
    reward_sum: f64,
    mean: f64,
    /// Every playout through this node is already in the tree.
    solved: bool,
}

impl SearchTreeNode {
    fn new(
        parent: Option<usize>,
        decision: Option<Candidate>,
        mut worklist: Vec<Candidate>,
        depth: usize,
        terminal: bool,
    ) -> Self {
        worklist.reverse();
        SearchTreeNode {
            parent,
            children: Vec::new(),
            decision,
            worklist,
            depth,
            visits: 0,
            reward_sum: 0.0,
            mean: 0.0,
            solved: terminal,
        }
    }

    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    /// Children ranked by UCB1 at the last update, best first.
    pub fn children(&self) -> &[usize] {
        &self.children
    }

    pub fn decision(&self) -> Option<Candidate> {
        self.decision
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn visits(&self) -> usize {
        self.visits
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn is_solved(&self) -> bool {
        self.solved
    }
}

pub struct MonteCarloTreeSearch<
    'a,
    G: SubjectGraph + ?Sized,
    W = FanoutCutWeight,
    E = CoverEvaluator<'a, G>,
> {
    evaluator: E,
    state: IncrementalDecisions,
    tree: Vec<SearchTreeNode>,
    weight: W,
    rng: Pcg64Mcg,
    options: SearchOptions,
    lower_bound: usize,
    best: Best,
    total_trials: usize,
    stats: SearchStats,
    cancel: Option<Arc<AtomicBool>>,
    _graph: PhantomData<&'a G>,
}

impl<'a, G: SubjectGraph + ?Sized> MonteCarloTreeSearch<'a, G> {
    /// Validates the inputs, computes the lower bound and evaluates the
    /// initial decision vector, which becomes the first best.
    pub fn new(
        graph: &'a G,
        cuts: &'a CutHolder,
        cut_size_limit: usize,
        options: SearchOptions,
    ) -> Result<Self, PreconditionError> {
        Self::with_sample_weight(graph, cuts, cut_size_limit, options, FanoutCutWeight)
    }
}

impl<'a, G: SubjectGraph + ?Sized, W: SampleWeight> MonteCarloTreeSearch<'a, G, W> {
    pub fn with_sample_weight(
        graph: &'a G,
        cuts: &'a CutHolder,
        cut_size_limit: usize,
        options: SearchOptions,
        weight: W,
    ) -> Result<Self, PreconditionError> {
        let evaluator = CoverEvaluator::new(graph, cuts, cut_size_limit, CoverMode::default());
        Self::with_evaluator(graph, cuts, cut_size_limit, options, weight, evaluator)
    }
}

impl<'a, G, W, E> MonteCarloTreeSearch<'a, G, W, E>
where
    G: SubjectGraph + ?Sized,
    W: SampleWeight,
    E: Evaluator,
{
    /// Searches with a caller-supplied evaluator, which must accept vectors
    /// over `graph.fanout_points()`.
    pub fn with_evaluator(
        graph: &'a G,
        cuts: &'a CutHolder,
        cut_size_limit: usize,
        options: SearchOptions,
        weight: W,
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
        let mut state = IncrementalDecisions::new(analysis);

        state.reset();
        let forced = state.apply_forced_moves();
        let cost = evaluator.evaluate(state.decisions());
        let best = Best::new(cost, evaluator.record());
        let root = SearchTreeNode::new(None, None, state.pending_candidates(), 0, state.is_complete());
        let stats = SearchStats {
            evaluations: 1,
            tree_nodes: 1,
            solved_nodes: usize::from(root.solved),
            ..SearchStats::default()
        };
        log::info!(
            "mct: {} fanout points ({} forced), lower bound {}, initial {} luts / depth {}",
            evaluator.decision_len(),
            forced,
            lower_bound,
            cost.luts,
            cost.depth
        );
        Ok(MonteCarloTreeSearch {
            evaluator,
            state,
            tree: vec![root],
            weight,
            rng: Pcg64Mcg::seed_from_u64(options.seed),
            options,
            lower_bound,
            best,
            total_trials: 0,
            stats,
            cancel: None,
            _graph: PhantomData,
        })
    }

    pub fn evaluator(&self) -> &E {
        &self.evaluator
    }

    /// Runs `limit` select / expand / simulate / back-up iterations. Stops
    /// early once every playout is in the tree.
    pub fn search(&mut self, limit: usize) {
        for iter in 0..limit {
            if is_cancelled(&self.cancel) {
                log::info!("mct: cancelled after {} iterations", iter);
                break;
            }
            if self.tree[0].solved {
                log::debug!("mct: search tree exhausted after {} iterations", iter);
                break;
            }
            self.state.reset();
            self.state.apply_forced_moves();
            let node = self.tree_policy();
            let val = self.default_policy();
            self.back_up(node, val);
            self.stats.best_luts_trace.push(self.best.cost.luts);
            if self.options.verbose {
                log::info!(
                    "mct iter {}: val {:.3} best {} luts, {} tree nodes",
                    iter,
                    val,
                    self.best.cost.luts,
                    self.tree.len()
                );
            } else {
                log::trace!("mct iter {}: node {} val {:.3}", iter, node, val);
            }
        }
        log::info!(
            "mct: best {} luts / depth {} after {} evaluations (lower bound {})",
            self.best.cost.luts,
            self.best.cost.depth,
            self.stats.evaluations,
            self.lower_bound
        );
    }

    pub fn best_record(&self) -> &MapRecord {
        &self.best.record
    }

    pub fn tree(&self) -> &[SearchTreeNode] {
        &self.tree
    }

    /// Descends from the root, expanding the first node that still has
    /// unexpanded steps. The decision state follows the descent.
    fn tree_policy(&mut self) -> usize {
        let mut v = 0;
        loop {
            if let Some(c) = self.tree[v].worklist.pop() {
                self.state.advance(c);
                return self.add_child(v, c);
            }
            let next = self.tree[v]
                .children
                .iter()
                .copied()
                .find(|&c| !self.tree[c].solved);
            match next {
                Some(c) => {
                    if let Some(d) = self.tree[c].decision {
                        self.state.advance(d);
                    }
                    v = c;
                }
                // Terminal, or every child already solved.
                None => return v,
            }
        }
    }

    fn add_child(&mut self, parent: usize, decision: Candidate) -> usize {
        let idx = self.tree.len();
        let terminal = self.state.is_complete();
        let node = SearchTreeNode::new(
            Some(parent),
            Some(decision),
            self.state.pending_candidates(),
            self.tree[parent].depth + 1,
            terminal,
        );
        self.tree.push(node);
        self.tree[parent].children.push(idx);
        self.stats.tree_nodes += 1;
        if terminal {
            self.stats.solved_nodes += 1;
        }
        idx
    }

    /// Completes the current state by weighted random steps, evaluates it and
    /// returns the normalized score.
    fn default_policy(&mut self) -> f64 {
        let mut weights: Vec<f64> = Vec::new();
        while !self.state.is_complete() {
            let candidates = self.state.pending_candidates();
            let points = self.state.analysis().points();
            weights.clear();
            weights.extend(candidates.iter().filter_map(|c| match c {
                Candidate::Boundary(p) => Some(self.weight.boundary_weight(&points[*p])),
                Candidate::Finish => None,
            }));
            let finish = self.weight.finish_weight(&weights);
            weights.push(finish);
            debug_assert_eq!(candidates.last(), Some(&Candidate::Finish));
            let pick = match WeightedIndex::new(&weights) {
                Ok(dist) => dist.sample(&mut self.rng),
                Err(e) => {
                    log::warn!("mct: invalid sample weights ({}), drawing uniformly", e);
                    self.rng.gen_range(0..candidates.len())
                }
            };
            self.state.advance(candidates[pick]);
        }
        let cost = self.evaluator.evaluate(self.state.decisions());
        self.stats.evaluations += 1;
        if self.best.try_update(cost, self.evaluator.record()) {
            self.stats.best_updates += 1;
            log::debug!(
                "mct: new best {} luts / depth {} ({:?})",
                cost.luts,
                cost.depth,
                self.state.decisions()
            );
        }
        score(self.lower_bound, cost.luts)
    }

    /// Propagates `val` from `node` to the root, re-ranking each parent's
    /// children and marking subtrees solved.
    fn back_up(&mut self, node: usize, val: f64) {
        self.total_trials += 1;
        let ln_total = (self.total_trials as f64).ln();
        let mut cur = Some(node);
        while let Some(i) = cur {
            let all_children_solved = self.tree[i].children.iter().all(|&c| self.tree[c].solved);
            let n = &mut self.tree[i];
            n.visits += 1;
            n.reward_sum += val;
            n.mean = n.reward_sum / n.visits as f64;
            if !n.solved && n.worklist.is_empty() && all_children_solved {
                n.solved = true;
                self.stats.solved_nodes += 1;
            }
            cur = self.tree[i].parent;
            if let Some(p) = cur {
                self.rerank_children(p, ln_total);
            }
        }
    }

    fn rerank_children(&mut self, p: usize, ln_total: f64) {
        let c = self.options.exploration;
        let mut ranked: Vec<(f64, usize)> = self.tree[p]
            .children
            .iter()
            .map(|&ch| (ucb1(self.tree[ch].mean, self.tree[ch].visits, ln_total, c), ch))
            .collect();
        // Stable: ties keep their previous order.
        ranked.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        let children = &mut self.tree[p].children;
        children.clear();
        children.extend(ranked.into_iter().map(|(_, ch)| ch));
    }
}

impl<'a, G, W, E> SearchEngine for MonteCarloTreeSearch<'a, G, W, E>
where
    G: SubjectGraph + ?Sized,
    W: SampleWeight,
    E: Evaluator,
{
    fn run(&mut self, limit: usize) {
        self.search(limit);
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
