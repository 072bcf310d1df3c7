// SPDX-License-Identifier: Apache-2.0

//! Covering lower bound on the LUT count of any mapping built from a cut set.
//!
//! Every live logic node ends up inside the covered closure of at least one
//! instantiated LUT, which gives two bounds:
//!
//! * fractional: a LUT whose cut covers `v` nodes pays at most `1/v` per node,
//!   so `ceil(sum 1/max_value[n])` LUTs are needed;
//! * structural: nodes never covered together by one cut need separate LUTs,
//!   so any independent set of the conflict graph is a bound.

pub mod dependency_graph;

pub use dependency_graph::{DependencyGraph, DgNode};

use bitvec::slice::BitSlice;
use bitvec::vec::BitVec;

use crate::cut::{ConeScratch, CutHolder};
use crate::error::PreconditionError;
use crate::sbj_graph::{SbjRef, SubjectGraph};

/// Per-node cover values and both partial bounds of one cut set.
#[derive(Debug, Clone)]
pub struct LowerBoundEstimator {
    /// Largest covered-closure size over the cuts covering each node; zero for
    /// nodes no cut covers.
    max_value: Vec<usize>,
    live: BitVec,
    fractional: usize,
    independent_set: usize,
}

impl LowerBoundEstimator {
    pub fn new<G: SubjectGraph + ?Sized>(
        graph: &G,
        cuts: &CutHolder,
    ) -> Result<Self, PreconditionError> {
        cuts.validate(graph, None)?;
        let n = graph.node_count();
        let mut live = graph.live_nodes();
        for id in 0..n {
            if !graph.node(SbjRef::new(id)).is_logic() {
                live.set(id, false);
            }
        }

        let mut dg = DependencyGraph::new(n);
        let mut max_value = vec![0usize; n];
        let mut scratch = ConeScratch::new(n);
        let mut covered: Vec<SbjRef> = Vec::new();
        let mut members: Vec<SbjRef> = Vec::new();
        for id in 0..n {
            for cut in cuts.cuts_of(SbjRef::new(id)) {
                scratch.covered_nodes(graph, cut, &mut covered);
                let value = covered.len();
                for r in &covered {
                    max_value[r.id] = max_value[r.id].max(value);
                }
                members.clear();
                members.extend(covered.iter().filter(|r| live[r.id]));
                dg.add_clique(&members);
            }
        }
        for id in 0..n {
            dg.set_active(SbjRef::new(id), live[id]);
        }

        let fractional = fractional_cover(&live, &max_value)?;
        let independent_set = dg.greedy_independent_set();
        log::debug!(
            "lower bound: {} live logic nodes, {} conflict edges, fractional={} mis={}",
            live.count_ones(),
            dg.edge_count(),
            fractional,
            independent_set
        );
        Ok(LowerBoundEstimator {
            max_value,
            live,
            fractional,
            independent_set,
        })
    }

    pub fn max_value(&self, node: SbjRef) -> usize {
        self.max_value[node.id]
    }

    /// True for logic nodes in the transitive fanin of an output.
    pub fn is_live(&self, node: SbjRef) -> bool {
        self.live[node.id]
    }

    pub fn fractional_bound(&self) -> usize {
        self.fractional
    }

    pub fn independent_set_bound(&self) -> usize {
        self.independent_set
    }

    pub fn value(&self) -> usize {
        self.fractional.max(self.independent_set)
    }
}

/// `ceil(sum 1/max_value[n])` over the live nodes. A live node with a zero
/// value cannot be implemented by any LUT.
fn fractional_cover(live: &BitSlice, max_value: &[usize]) -> Result<usize, PreconditionError> {
    if let Some(id) = live.iter_ones().find(|&id| max_value[id] == 0) {
        return Err(PreconditionError::UncoveredNode {
            node: SbjRef::new(id),
        });
    }
    let sum: f64 = live.iter_ones().map(|id| 1.0 / max_value[id] as f64).sum();
    // Guard against 2.0000000001 from float accumulation.
    Ok((sum - 1e-9).ceil().max(0.0) as usize)
}

/// Lower bound on the LUT count of any mapping that only uses cuts from
/// `cuts`.
pub fn lower_bound<G: SubjectGraph + ?Sized>(
    graph: &G,
    cuts: &CutHolder,
) -> Result<usize, PreconditionError> {
    Ok(LowerBoundEstimator::new(graph, cuts)?.value())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cut::{enumerate_cuts, Cut, EnumerateCutsOptions};
    use crate::sbj_graph::{SbjGraph, SbjGraphBuilder};

    fn shared_and() -> SbjGraph {
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
        b.build()
    }

    #[test]
    fn test_shared_and_bound() {
        let _ = env_logger::builder().is_test(true).try_init();
        let g = shared_and();
        let cuts = enumerate_cuts(&g, 4, &EnumerateCutsOptions::default());
        let est = LowerBoundEstimator::new(&g, &cuts).unwrap();
        // x is covered by {x} and by the big cuts of y and z.
        assert_eq!(est.max_value(SbjRef::new(4)), 2);
        assert_eq!(est.max_value(SbjRef::new(5)), 2);
        assert_eq!(est.fractional_bound(), 2);
        // y and z are never covered together.
        assert_eq!(est.independent_set_bound(), 2);
        assert_eq!(lower_bound(&g, &cuts), Ok(2));
    }

    #[test]
    fn test_dead_logic_does_not_count() {
        let mut b = SbjGraphBuilder::new("dead");
        let i0 = b.add_input("i0");
        let i1 = b.add_input("i1");
        let used = b.add_logic(i0, i1);
        let dead = b.add_logic(i0, i1);
        b.add_output(used);
        let g = b.build();
        let cuts = enumerate_cuts(&g, 4, &EnumerateCutsOptions::default());
        let est = LowerBoundEstimator::new(&g, &cuts).unwrap();
        assert!(!est.is_live(dead));
        assert_eq!(est.value(), 1);
    }

    #[test]
    fn test_extra_cut_never_decreases_max_value() {
        // Chain a = i0&i1, b = a&i2, c = b&i3 with only 2-leaf cuts first.
        let mut bld = SbjGraphBuilder::new("chain");
        let i0 = bld.add_input("i0");
        let i1 = bld.add_input("i1");
        let i2 = bld.add_input("i2");
        let i3 = bld.add_input("i3");
        let a = bld.add_logic(i0, i1);
        let b = bld.add_logic(a, i2);
        let c = bld.add_logic(b, i3);
        bld.add_output(c);
        let g = bld.build();

        let mut cuts = CutHolder::new(g.node_count());
        cuts.add_cut(Cut::new(a, vec![i0, i1]));
        cuts.add_cut(Cut::new(b, vec![a, i2]));
        cuts.add_cut(Cut::new(c, vec![b, i3]));
        let before = LowerBoundEstimator::new(&g, &cuts).unwrap();
        assert_eq!(before.fractional_bound(), 3);

        cuts.add_cut(Cut::new(c, vec![a, i2, i3]));
        let after = LowerBoundEstimator::new(&g, &cuts).unwrap();
        for r in [a, b, c] {
            assert!(after.max_value(r) >= before.max_value(r), "{}", r);
        }
        assert_eq!(after.max_value(b), 2);
        assert!(after.fractional_bound() <= before.fractional_bound());
        assert_eq!(after.fractional_bound(), 2);
    }

    #[test]
    fn test_degenerate_cut_is_rejected() {
        let mut b = SbjGraphBuilder::new("one_gate");
        let i0 = b.add_input("i0");
        let i1 = b.add_input("i1");
        let x = b.add_logic(i0, i1);
        b.add_output(x);
        let g = b.build();
        let mut cuts = CutHolder::new(g.node_count());
        cuts.add_cut(Cut::new(x, vec![x, i0]));
        assert_eq!(
            lower_bound(&g, &cuts),
            Err(PreconditionError::RootAsLeaf { root: x })
        );
    }

    #[test]
    fn test_uncovered_live_node_is_an_error() {
        let live: BitVec = [false, true, true].iter().copied().collect();
        assert_eq!(
            fractional_cover(&live, &[0, 2, 0]),
            Err(PreconditionError::UncoveredNode {
                node: SbjRef::new(2)
            })
        );
        assert_eq!(fractional_cover(&live, &[0, 2, 2]), Ok(1));
        assert_eq!(fractional_cover(&live, &[0, 1, 2]), Ok(2));
    }

    #[test]
    fn test_missing_cut_is_reported() {
        let g = shared_and();
        let mut cuts = CutHolder::new(g.node_count());
        cuts.add_cut(Cut::new(SbjRef::new(4), vec![SbjRef::new(0), SbjRef::new(1)]));
        assert_eq!(
            lower_bound(&g, &cuts),
            Err(PreconditionError::MissingCut {
                node: SbjRef::new(5)
            })
        );
    }
}
