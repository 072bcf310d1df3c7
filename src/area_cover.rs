// SPDX-License-Identifier: Apache-2.0

//! Boundary-aware area cover: turns a boundary set into a MapRecord.
//!
//! Boundary nodes (primary inputs, output drivers and the fanout points the
//! search marked as boundaries) are implemented exactly once and are free to
//! reference. A cut is admissible for a node when no boundary node lies
//! strictly inside it; every other node may be absorbed, and thereby
//! duplicated, into as many LUTs as need it.

use bitvec::vec::BitVec;
use serde::{Deserialize, Serialize};

use crate::cut::{ConeScratch, Cut, CutHolder};
use crate::map_record::MapRecord;
use crate::sbj_graph::{SbjRef, SubjectGraph};

const COST_EPSILON: f64 = 1e-9;

/// How a non-boundary leaf is charged when costing a cut.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CoverMode {
    /// Area flow: the leaf's cost is split among its consumers.
    #[default]
    Flow,
    /// Tree covering: the leaf's full cost is charged to every consumer.
    Tree,
}

/// Records one cut per logic node given a boundary set.
pub trait CutRecorder<G: SubjectGraph + ?Sized> {
    /// Fills `record` with a cut for every logic node of `graph`.
    ///
    /// `blocked` nodes should not be used as cut leaves; a recorder may fall
    /// back to them when a node has no other admissible cut.
    fn record_cuts(
        &mut self,
        graph: &G,
        cuts: &CutHolder,
        boundary: &[SbjRef],
        blocked: Option<&[SbjRef]>,
        record: &mut MapRecord,
    );
}

pub struct AreaCover {
    mode: CoverMode,
    cut_size: usize,
    is_boundary: BitVec,
    is_blocked: BitVec,
    cost: Vec<f64>,
    scratch: ConeScratch,
    covered: Vec<SbjRef>,
}

#[derive(Clone, Copy)]
struct Choice {
    cost: f64,
    leaf_count: usize,
    index: usize,
}

impl Choice {
    fn better_than(&self, other: &Option<Choice>) -> bool {
        match other {
            None => true,
            Some(o) => {
                self.cost < o.cost - COST_EPSILON
                    || ((self.cost - o.cost).abs() <= COST_EPSILON && self.leaf_count < o.leaf_count)
            }
        }
    }
}

impl AreaCover {
    /// Cuts with more than `cut_size` leaves are ignored.
    pub fn new(mode: CoverMode, cut_size: usize) -> Self {
        AreaCover {
            mode,
            cut_size,
            is_boundary: BitVec::new(),
            is_blocked: BitVec::new(),
            cost: Vec::new(),
            scratch: ConeScratch::new(0),
            covered: Vec::new(),
        }
    }

    pub fn mode(&self) -> CoverMode {
        self.mode
    }

    fn prepare<G: SubjectGraph + ?Sized>(
        &mut self,
        graph: &G,
        boundary: &[SbjRef],
        blocked: Option<&[SbjRef]>,
    ) {
        let n = graph.node_count();
        self.is_boundary.clear();
        self.is_boundary.resize(n, false);
        self.is_blocked.clear();
        self.is_blocked.resize(n, false);
        self.cost.clear();
        self.cost.resize(n, 0.0);
        if self.scratch.node_count() != n {
            self.scratch = ConeScratch::new(n);
        }
        for id in 0..n {
            let node = graph.node(SbjRef::new(id));
            if node.is_input() || node.drives_output() {
                self.is_boundary.set(id, true);
            }
        }
        for b in boundary {
            self.is_boundary.set(b.id, true);
        }
        for b in blocked.into_iter().flatten() {
            self.is_blocked.set(b.id, true);
        }
    }

    /// True if no boundary node is covered by `cut` other than its root.
    fn admissible<G: SubjectGraph + ?Sized>(&mut self, graph: &G, cut: &Cut) -> bool {
        self.scratch.covered_nodes(graph, cut, &mut self.covered);
        self.covered
            .iter()
            .skip(1)
            .all(|r| !self.is_boundary[r.id])
    }

    fn leaf_cost<G: SubjectGraph + ?Sized>(&self, graph: &G, leaf: SbjRef) -> f64 {
        if self.is_boundary[leaf.id] {
            return 0.0;
        }
        match self.mode {
            CoverMode::Tree => self.cost[leaf.id],
            CoverMode::Flow => {
                let fanout = graph.node(leaf).fanout_count().max(1);
                self.cost[leaf.id] / fanout as f64
            }
        }
    }
}

impl<G: SubjectGraph + ?Sized> CutRecorder<G> for AreaCover {
    fn record_cuts(
        &mut self,
        graph: &G,
        cuts: &CutHolder,
        boundary: &[SbjRef],
        blocked: Option<&[SbjRef]>,
        record: &mut MapRecord,
    ) {
        self.prepare(graph, boundary, blocked);
        record.init(graph.node_count());

        for i in 0..graph.logic_count() {
            let node = graph.logic(i);
            // Preference order: admissible and unblocked, admissible, any.
            let mut strict: Option<Choice> = None;
            let mut relaxed: Option<Choice> = None;
            let mut fallback: Option<Choice> = None;
            for (index, cut) in cuts.cuts_of(node).iter().enumerate() {
                if cut.leaf_count() > self.cut_size {
                    continue;
                }
                let cost = 1.0
                    + cut
                        .leaves()
                        .iter()
                        .map(|&l| self.leaf_cost(graph, l))
                        .sum::<f64>();
                let choice = Choice {
                    cost,
                    leaf_count: cut.leaf_count(),
                    index,
                };
                if choice.better_than(&fallback) {
                    fallback = Some(choice);
                }
                if !self.admissible(graph, cut) {
                    continue;
                }
                if choice.better_than(&relaxed) {
                    relaxed = Some(choice);
                }
                let uses_blocked = cut
                    .leaves()
                    .iter()
                    .any(|l| self.is_blocked[l.id] && graph.node(*l).is_logic());
                if !uses_blocked && choice.better_than(&strict) {
                    strict = Some(choice);
                }
            }
            let chosen = strict.or(relaxed).or_else(|| {
                log::debug!("{}: no admissible cut, ignoring boundaries", node);
                fallback
            });
            let chosen = chosen.unwrap_or_else(|| {
                panic!(
                    "logic node {} has no cut with at most {} leaves",
                    node, self.cut_size
                )
            });
            self.cost[node.id] = chosen.cost;
            record.set_cut(node, &cuts.cuts_of(node)[chosen.index]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cut::{enumerate_cuts, EnumerateCutsOptions};
    use crate::estimate::{LutEstimator, MapEstimator};
    use crate::map_record::Cost;
    use crate::sbj_graph::{SbjGraph, SbjGraphBuilder};
    use test_case::test_case;

    /// x = i0&i1 is shared by y = x&i2 and z = x&i3.
    fn shared_and() -> (SbjGraph, SbjRef) {
        let mut b = SbjGraphBuilder::new("shared");
        let i0 = b.add_input("i0");
        let i1 = b.add_input("i1");
        let i2 = b.add_input("i2");
        let i3 = b.add_input("i3");
        let x = b.add_logic(i0, i1);
        let y = b.add_logic(x, i2);
        let z = b.add_logic(x, i3);
        b.add_output(y);
        b.add_output(z);
        (b.build(), x)
    }

    fn cover_cost(mode: CoverMode, boundary: &[SbjRef]) -> Cost {
        let (g, _) = shared_and();
        let cuts = enumerate_cuts(&g, 4, &EnumerateCutsOptions::default());
        let mut cover = AreaCover::new(mode, 4);
        let mut record = MapRecord::new(0);
        cover.record_cuts(&g, &cuts, boundary, None, &mut record);
        MapEstimator::new().estimate(&g, &record)
    }

    #[test_case(CoverMode::Flow; "flow")]
    #[test_case(CoverMode::Tree; "tree")]
    fn test_boundary_forces_shared_lut(mode: CoverMode) {
        let (_, x) = shared_and();
        assert_eq!(cover_cost(mode, &[x]), Cost { luts: 3, depth: 2 });
        assert_eq!(cover_cost(mode, &[]), Cost { luts: 2, depth: 1 });
    }

    #[test]
    fn test_cut_size_limit_is_honored() {
        let (g, x) = shared_and();
        let cuts = enumerate_cuts(&g, 4, &EnumerateCutsOptions::default());
        let mut cover = AreaCover::new(CoverMode::Flow, 2);
        let mut record = MapRecord::new(g.node_count());
        cover.record_cuts(&g, &cuts, &[], None, &mut record);
        for r in record.lut_roots(&g) {
            assert!(record.cut_leaves(r).unwrap().len() <= 2);
        }
        assert!(record.lut_roots(&g).contains(&x));
    }

    #[test]
    fn test_blocked_leaf_is_avoided() {
        // x = i0&i1 (boundary), w = x&i2, y = w&i3. Unblocked, y prefers the
        // free boundary leaf x; blocking x pushes y onto {w, i3}.
        let mut b = SbjGraphBuilder::new("blocked");
        let i0 = b.add_input("i0");
        let i1 = b.add_input("i1");
        let i2 = b.add_input("i2");
        let i3 = b.add_input("i3");
        let x = b.add_logic(i0, i1);
        let w = b.add_logic(x, i2);
        let y = b.add_logic(w, i3);
        b.add_output(y);
        let g = b.build();
        let cuts = enumerate_cuts(&g, 4, &EnumerateCutsOptions::default());
        let mut cover = AreaCover::new(CoverMode::Tree, 4);
        let mut record = MapRecord::new(g.node_count());

        cover.record_cuts(&g, &cuts, &[x], None, &mut record);
        assert_eq!(record.cut_leaves(y), Some(&[i2, i3, x][..]));

        cover.record_cuts(&g, &cuts, &[x], Some(&[x]), &mut record);
        assert_eq!(record.cut_leaves(y), Some(&[i3, w][..]));
        // w has no cut avoiding x, so it still uses it.
        assert_eq!(record.cut_leaves(w), Some(&[i2, x][..]));
    }

    #[test]
    fn test_falls_back_when_no_cut_is_admissible() {
        let mut b = SbjGraphBuilder::new("fallback");
        let i0 = b.add_input("i0");
        let i1 = b.add_input("i1");
        let i2 = b.add_input("i2");
        let x = b.add_logic(i0, i1);
        let y = b.add_logic(x, i2);
        b.add_output(y);
        let g = b.build();
        let mut cuts = CutHolder::new(g.node_count());
        cuts.add_cut(Cut::new(x, vec![i0, i1]));
        cuts.add_cut(Cut::new(y, vec![i0, i1, i2]));
        let mut cover = AreaCover::new(CoverMode::Flow, 4);
        let mut record = MapRecord::new(g.node_count());
        cover.record_cuts(&g, &cuts, &[x], None, &mut record);
        assert_eq!(record.cut_leaves(y), Some(&[i0, i1, i2][..]));
    }
}
