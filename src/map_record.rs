// SPDX-License-Identifier: Apache-2.0

use bitvec::vec::BitVec;
use serde::{Deserialize, Serialize};

use crate::cut::Cut;
use crate::sbj_graph::{SbjRef, SubjectGraph};

/// LUT count / depth of one mapping.
///
/// Ordered lexicographically: fewer LUTs first, then shallower.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Cost {
    pub luts: usize,
    pub depth: usize,
}

/// Per-node selected cut, stored as the cut's leaf list.
///
/// An empty leaf list means "no cut recorded" (always the case for primary
/// inputs). Recorders overwrite a record in place, so anything that needs to
/// outlive the next evaluation must be cloned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MapRecord {
    leaves: Vec<Vec<SbjRef>>,
}

impl MapRecord {
    pub fn new(node_count: usize) -> Self {
        MapRecord {
            leaves: vec![Vec::new(); node_count],
        }
    }

    /// Clears every recorded cut and sizes the record for `node_count` nodes.
    /// Existing allocations are reused.
    pub fn init(&mut self, node_count: usize) {
        self.leaves.resize_with(node_count, Vec::new);
        for l in self.leaves.iter_mut() {
            l.clear();
        }
    }

    pub fn node_count(&self) -> usize {
        self.leaves.len()
    }

    pub fn set_cut(&mut self, node: SbjRef, cut: &Cut) {
        assert_eq!(
            cut.root(),
            node,
            "recording cut rooted at {} for node {}",
            cut.root(),
            node
        );
        let slot = &mut self.leaves[node.id];
        slot.clear();
        slot.extend_from_slice(cut.leaves());
    }

    pub fn cut_leaves(&self, node: SbjRef) -> Option<&[SbjRef]> {
        let l = &self.leaves[node.id];
        if l.is_empty() {
            None
        } else {
            Some(l)
        }
    }

    /// Back-traces the LUTs this mapping instantiates: every logic output
    /// driver, and recursively every logic leaf of an instantiated LUT.
    /// Returned in topological order.
    ///
    /// Panics if an instantiated node has no recorded cut.
    pub fn lut_roots<G: SubjectGraph + ?Sized>(&self, graph: &G) -> Vec<SbjRef> {
        assert_eq!(
            self.node_count(),
            graph.node_count(),
            "map record sized for a different subject graph"
        );
        let mut required: BitVec = BitVec::repeat(false, graph.node_count());
        for i in 0..graph.output_count() {
            let o = graph.output(i);
            if graph.node(o).is_logic() {
                required.set(o.id, true);
            }
        }
        let mut roots = Vec::new();
        for i in (0..graph.logic_count()).rev() {
            let node = graph.logic(i);
            if !required[node.id] {
                continue;
            }
            let leaves = self
                .cut_leaves(node)
                .unwrap_or_else(|| panic!("map record has no cut for required node {}", node));
            for leaf in leaves {
                if graph.node(*leaf).is_logic() {
                    required.set(leaf.id, true);
                }
            }
            roots.push(node);
        }
        roots.reverse();
        roots
    }
}
