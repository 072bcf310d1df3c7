// SPDX-License-Identifier: Apache-2.0

//! Boundary decisions over the fanout points of a subject graph.
//!
//! Two realizations share the [`DecisionState`] contract:
//!
//! * [`IncrementalDecisions`] fixes points one step at a time, which is what
//!   tree search needs. A step either picks the next boundary point (every
//!   undecided point skipped over becomes duplicated) or finishes the vector.
//!   Every subset of free points is reached by exactly one step sequence, so
//!   the search tree never holds two nodes for the same vector.
//! * [`FlatDecisions`] is a plain bit vector that is always complete; a
//!   "decision" flips one free bit. Used for local search.
//!
//! Both realizations force a point to be a boundary when it drives a primary
//! output, or when no admissible cut could absorb it into a consumer's LUT.

use bitvec::slice::BitSlice;
use bitvec::vec::BitVec;

use crate::cut::{ConeScratch, CutHolder};
use crate::sbj_graph::{SbjRef, SubjectGraph};

/// One explicit decision step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Candidate {
    /// Make fanout point `i` (index into the point list) a boundary.
    Boundary(usize),
    /// Duplicate every point that is still undecided.
    Finish,
}

pub trait DecisionState {
    /// Clears every decision. Forced moves are not applied.
    fn reset(&mut self);

    /// The legal next steps in a stable order; empty when complete.
    fn pending_candidates(&self) -> Vec<Candidate>;

    /// Fixes every point that has a single legal decision. Returns how many
    /// points were fixed.
    fn apply_forced_moves(&mut self) -> usize;

    /// Applies one step returned by `pending_candidates`.
    fn commit(&mut self, candidate: Candidate);

    fn is_complete(&self) -> bool;

    /// Current decision vector; bit `i` set = point `i` is a boundary.
    fn decisions(&self) -> &BitSlice;

    /// Commits `candidate` and then settles the forced moves it implies.
    fn advance(&mut self, candidate: Candidate) {
        self.commit(candidate);
        self.apply_forced_moves();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanoutPoint {
    pub node: SbjRef,
    pub fanout: usize,
    /// Largest leaf count among the node's cuts within the cut-size limit.
    pub max_cut_leaves: usize,
    pub drives_output: bool,
}

/// Static facts about the fanout points that both realizations need.
#[derive(Debug, Clone)]
pub struct FanoutAnalysis {
    points: Vec<FanoutPoint>,
    /// Per point, every cut within the limit that covers the point as an
    /// interior node and has no output driver inside, listed as the other
    /// fanout points that cut covers.
    absorbing: Vec<Vec<Vec<usize>>>,
}

impl FanoutAnalysis {
    pub fn new<G: SubjectGraph + ?Sized>(graph: &G, cuts: &CutHolder, cut_size: usize) -> Self {
        let nodes = graph.fanout_points();
        let mut index_of: Vec<Option<usize>> = vec![None; graph.node_count()];
        for (i, r) in nodes.iter().enumerate() {
            index_of[r.id] = Some(i);
        }
        let points: Vec<FanoutPoint> = nodes
            .iter()
            .map(|&r| {
                let node = graph.node(r);
                FanoutPoint {
                    node: r,
                    fanout: node.fanout_count(),
                    max_cut_leaves: cuts
                        .cuts_of(r)
                        .iter()
                        .map(|c| c.leaf_count())
                        .filter(|&l| l <= cut_size)
                        .max()
                        .unwrap_or(1),
                    drives_output: node.drives_output(),
                }
            })
            .collect();

        let mut absorbing: Vec<Vec<Vec<usize>>> = vec![Vec::new(); points.len()];
        let mut scratch = ConeScratch::new(graph.node_count());
        let mut covered: Vec<SbjRef> = Vec::new();
        for i in 0..graph.logic_count() {
            let root = graph.logic(i);
            for cut in cuts.cuts_of(root) {
                if cut.leaf_count() > cut_size {
                    continue;
                }
                scratch.covered_nodes(graph, cut, &mut covered);
                let interior = &covered[1..];
                if interior.iter().any(|r| graph.node(*r).drives_output()) {
                    continue;
                }
                let inner_points: Vec<usize> =
                    interior.iter().filter_map(|r| index_of[r.id]).collect();
                for &p in &inner_points {
                    let others = inner_points.iter().copied().filter(|&q| q != p).collect();
                    absorbing[p].push(others);
                }
            }
        }
        FanoutAnalysis { points, absorbing }
    }

    pub fn points(&self) -> &[FanoutPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// True if some admissible cut can absorb point `i` given which other
    /// points are boundaries.
    pub fn absorbable(&self, i: usize, is_boundary: impl Fn(usize) -> bool) -> bool {
        self.absorbing[i]
            .iter()
            .any(|others| others.iter().all(|&q| !is_boundary(q)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointState {
    Undecided,
    Boundary,
    Duplicated,
}

/// Step-wise decisions with a cursor; see the module docs.
#[derive(Debug, Clone)]
pub struct IncrementalDecisions {
    analysis: FanoutAnalysis,
    state: Vec<PointState>,
    bits: BitVec,
    cursor: usize,
    undecided: usize,
}

impl IncrementalDecisions {
    pub fn new(analysis: FanoutAnalysis) -> Self {
        let n = analysis.len();
        IncrementalDecisions {
            analysis,
            state: vec![PointState::Undecided; n],
            bits: BitVec::repeat(false, n),
            cursor: 0,
            undecided: n,
        }
    }

    pub fn analysis(&self) -> &FanoutAnalysis {
        &self.analysis
    }

    pub fn state(&self, i: usize) -> PointState {
        self.state[i]
    }

    fn set(&mut self, i: usize, s: PointState) {
        debug_assert_eq!(self.state[i], PointState::Undecided);
        self.state[i] = s;
        self.bits.set(i, s == PointState::Boundary);
        self.undecided -= 1;
    }
}

impl DecisionState for IncrementalDecisions {
    fn reset(&mut self) {
        self.state.fill(PointState::Undecided);
        self.bits.fill(false);
        self.cursor = 0;
        self.undecided = self.state.len();
    }

    fn pending_candidates(&self) -> Vec<Candidate> {
        if self.is_complete() {
            return Vec::new();
        }
        let mut out: Vec<Candidate> = (self.cursor..self.state.len())
            .filter(|&i| self.state[i] == PointState::Undecided)
            .map(Candidate::Boundary)
            .collect();
        out.push(Candidate::Finish);
        out
    }

    fn apply_forced_moves(&mut self) -> usize {
        let mut forced = 0;
        loop {
            let mut changed = false;
            for i in self.cursor..self.state.len() {
                if self.state[i] != PointState::Undecided {
                    continue;
                }
                let state = &self.state;
                let must_share = self.analysis.points[i].drives_output
                    || !self
                        .analysis
                        .absorbable(i, |q| state[q] == PointState::Boundary);
                if must_share {
                    self.set(i, PointState::Boundary);
                    forced += 1;
                    changed = true;
                }
            }
            // A new boundary can only remove absorbing cuts.
            if !changed {
                break;
            }
        }
        forced
    }

    fn commit(&mut self, candidate: Candidate) {
        match candidate {
            Candidate::Boundary(p) => {
                assert!(
                    p >= self.cursor && p < self.state.len() && self.state[p] == PointState::Undecided,
                    "Boundary({}) is not a pending candidate (cursor {})",
                    p,
                    self.cursor
                );
                for q in self.cursor..p {
                    if self.state[q] == PointState::Undecided {
                        self.set(q, PointState::Duplicated);
                    }
                }
                self.set(p, PointState::Boundary);
                self.cursor = p + 1;
            }
            Candidate::Finish => {
                for q in self.cursor..self.state.len() {
                    if self.state[q] == PointState::Undecided {
                        self.set(q, PointState::Duplicated);
                    }
                }
                self.cursor = self.state.len();
            }
        }
    }

    fn is_complete(&self) -> bool {
        self.undecided == 0
    }

    fn decisions(&self) -> &BitSlice {
        &self.bits
    }
}

/// Always-complete bit vector of decisions.
#[derive(Debug, Clone)]
pub struct FlatDecisions {
    analysis: FanoutAnalysis,
    bits: BitVec,
    forced: BitVec,
    free: Vec<usize>,
}

impl FlatDecisions {
    pub fn new(analysis: FanoutAnalysis) -> Self {
        let n = analysis.len();
        let mut forced: BitVec = BitVec::repeat(false, n);
        for i in 0..n {
            if analysis.points[i].drives_output || !analysis.absorbable(i, |_| false) {
                forced.set(i, true);
            }
        }
        let free = forced.iter_zeros().collect();
        FlatDecisions {
            analysis,
            bits: BitVec::repeat(false, n),
            forced,
            free,
        }
    }

    pub fn analysis(&self) -> &FanoutAnalysis {
        &self.analysis
    }

    /// Indices of the points the search may flip.
    pub fn free_points(&self) -> &[usize] {
        &self.free
    }

    pub fn flip(&mut self, i: usize) {
        assert!(!self.forced[i], "point {} is forced to be a boundary", i);
        let v = self.bits[i];
        self.bits.set(i, !v);
    }
}

impl DecisionState for FlatDecisions {
    fn reset(&mut self) {
        self.bits.fill(false);
    }

    fn pending_candidates(&self) -> Vec<Candidate> {
        self.free.iter().map(|&i| Candidate::Boundary(i)).collect()
    }

    fn apply_forced_moves(&mut self) -> usize {
        let mut forced = 0;
        for i in self.forced.iter_ones() {
            if !self.bits[i] {
                self.bits.set(i, true);
                forced += 1;
            }
        }
        forced
    }

    fn commit(&mut self, candidate: Candidate) {
        match candidate {
            Candidate::Boundary(i) => self.flip(i),
            Candidate::Finish => {}
        }
    }

    fn is_complete(&self) -> bool {
        true
    }

    fn decisions(&self) -> &BitSlice {
        &self.bits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cut::{enumerate_cuts, EnumerateCutsOptions};
    use crate::sbj_graph::{SbjGraph, SbjGraphBuilder};
    use crate::test_utils::shared_blocks;
    use bitvec::order::Lsb0;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    fn incremental(g: &SbjGraph, k: usize) -> IncrementalDecisions {
        let cuts = enumerate_cuts(g, k, &EnumerateCutsOptions::default());
        IncrementalDecisions::new(FanoutAnalysis::new(g, &cuts, k))
    }

    #[test]
    fn test_analysis_of_shared_point() {
        let g = shared_blocks(1);
        let cuts = enumerate_cuts(&g, 4, &EnumerateCutsOptions::default());
        let a = FanoutAnalysis::new(&g, &cuts, 4);
        assert_eq!(
            a.points(),
            &[FanoutPoint {
                node: SbjRef::new(4),
                fanout: 2,
                max_cut_leaves: 2,
                drives_output: false,
            }]
        );
        assert!(a.absorbable(0, |_| false));

        // With 2-input LUTs nothing can swallow x.
        let a = FanoutAnalysis::new(&g, &cuts, 2);
        assert!(!a.absorbable(0, |_| false));
    }

    #[test]
    fn test_single_point_steps() {
        let g = shared_blocks(1);
        let mut s = incremental(&g, 4);
        s.reset();
        assert_eq!(s.apply_forced_moves(), 0);
        assert!(!s.is_complete());
        assert_eq!(
            s.pending_candidates(),
            vec![Candidate::Boundary(0), Candidate::Finish]
        );
        s.advance(Candidate::Boundary(0));
        assert!(s.is_complete());
        assert!(s.pending_candidates().is_empty());
        assert_eq!(s.decisions().to_bitvec(), bitvec::bitvec![1]);

        s.reset();
        s.advance(Candidate::Finish);
        assert!(s.is_complete());
        assert_eq!(s.state(0), PointState::Duplicated);
        assert_eq!(s.decisions().to_bitvec(), bitvec::bitvec![0]);
    }

    #[test]
    fn test_output_driver_is_forced() {
        let mut b = SbjGraphBuilder::new("po_fanout");
        let i0 = b.add_input("i0");
        let i1 = b.add_input("i1");
        let i2 = b.add_input("i2");
        let x = b.add_logic(i0, i1);
        let y = b.add_logic(x, i2);
        b.add_output(x);
        b.add_output(y);
        let g = b.build();
        let mut s = incremental(&g, 4);
        s.reset();
        assert_eq!(s.apply_forced_moves(), 1);
        assert!(s.is_complete());
        assert_eq!(s.state(0), PointState::Boundary);
    }

    #[test]
    fn test_unabsorbable_point_is_forced() {
        let g = shared_blocks(1);
        let mut s = incremental(&g, 2);
        s.reset();
        assert_eq!(s.apply_forced_moves(), 1);
        assert!(s.is_complete());
        assert_eq!(s.decisions().to_bitvec(), bitvec::bitvec![1]);
    }

    /// Walks every step sequence from the reset state.
    fn collect_vectors(s: &mut IncrementalDecisions, path: &mut Vec<Candidate>, out: &mut Vec<BitVec>) {
        s.reset();
        s.apply_forced_moves();
        for &c in path.iter() {
            s.advance(c);
        }
        if s.is_complete() {
            out.push(s.decisions().to_bitvec());
            return;
        }
        for c in s.pending_candidates() {
            path.push(c);
            collect_vectors(s, path, out);
            path.pop();
        }
    }

    #[test]
    fn test_every_subset_reached_exactly_once() {
        let g = shared_blocks(3);
        let mut s = incremental(&g, 4);
        let mut out = Vec::new();
        collect_vectors(&mut s, &mut Vec::new(), &mut out);
        assert_eq!(out.len(), 8);
        let distinct: HashSet<BitVec> = out.into_iter().collect();
        assert_eq!(distinct.len(), 8);
    }

    #[test]
    fn test_boundary_skips_mark_duplicated() {
        let g = shared_blocks(3);
        let mut s = incremental(&g, 4);
        s.reset();
        s.apply_forced_moves();
        s.advance(Candidate::Boundary(2));
        assert_eq!(s.state(0), PointState::Duplicated);
        assert_eq!(s.state(1), PointState::Duplicated);
        assert_eq!(s.state(2), PointState::Boundary);
        assert!(s.is_complete());
    }

    #[test]
    #[should_panic(expected = "not a pending candidate")]
    fn test_commit_behind_cursor_panics() {
        let g = shared_blocks(2);
        let mut s = incremental(&g, 4);
        s.reset();
        s.advance(Candidate::Boundary(1));
        s.commit(Candidate::Boundary(0));
    }

    #[test]
    fn test_flat_decisions_flip_free_points() {
        let mut b = SbjGraphBuilder::new("mixed");
        let i0 = b.add_input("i0");
        let i1 = b.add_input("i1");
        let i2 = b.add_input("i2");
        let x = b.add_logic(i0, i1);
        let w = b.add_logic(i1, i2);
        let y = b.add_logic(x, w);
        let z = b.add_logic(x, i2);
        b.add_output(w);
        b.add_output(y);
        b.add_output(z);
        let g = b.build();
        let cuts = enumerate_cuts(&g, 4, &EnumerateCutsOptions::default());
        let mut s = FlatDecisions::new(FanoutAnalysis::new(&g, &cuts, 4));
        // x is free, w drives an output.
        assert_eq!(s.analysis().points().len(), 2);
        assert_eq!(s.free_points(), &[0]);
        s.reset();
        assert_eq!(s.apply_forced_moves(), 1);
        assert_eq!(s.decisions().to_bitvec(), bitvec::bitvec![0, 1]);
        assert_eq!(s.pending_candidates(), vec![Candidate::Boundary(0)]);
        s.advance(Candidate::Boundary(0));
        assert_eq!(s.decisions().to_bitvec(), bitvec::bitvec![1, 1]);
        s.advance(Candidate::Boundary(0));
        assert_eq!(s.decisions().to_bitvec(), bitvec::bitvec![0, 1]);
        assert!(s.is_complete());
    }
}
