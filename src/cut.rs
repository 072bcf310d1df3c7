// SPDX-License-Identifier: Apache-2.0

//! Cuts, the per-node cut holder, and exhaustive K-feasible cut enumeration.
//!
//! A cut `(root, leaves)` states that the root's function can be expressed
//! purely in terms of the leaves, so one K-input LUT with those leaves as
//! inputs implements every logic node between the root and the leaves. That
//! set of logic nodes is what the cut *covers*; [`ConeScratch`] computes it.

use bitvec::vec::BitVec;
use serde::{Deserialize, Serialize};

use crate::error::PreconditionError;
use crate::sbj_graph::{SbjRef, SubjectGraph};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cut {
    root: SbjRef,
    /// Sorted by id, no duplicates.
    leaves: Vec<SbjRef>,
}

impl Cut {
    pub fn new(root: SbjRef, mut leaves: Vec<SbjRef>) -> Self {
        leaves.sort();
        leaves.dedup();
        Cut { root, leaves }
    }

    pub fn root(&self) -> SbjRef {
        self.root
    }

    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
    }

    pub fn leaf(&self, i: usize) -> SbjRef {
        self.leaves[i]
    }

    pub fn leaves(&self) -> &[SbjRef] {
        &self.leaves
    }
}

/// Cuts stored per root node id.
#[derive(Debug, Clone, Default)]
pub struct CutHolder {
    cuts: Vec<Vec<Cut>>,
}

impl CutHolder {
    pub fn new(node_count: usize) -> Self {
        CutHolder {
            cuts: vec![Vec::new(); node_count],
        }
    }

    pub fn node_count(&self) -> usize {
        self.cuts.len()
    }

    /// Appends `cut` to the list of its root. Returns the index of the cut
    /// within that list.
    pub fn add_cut(&mut self, cut: Cut) -> usize {
        let list = &mut self.cuts[cut.root().id];
        list.push(cut);
        list.len() - 1
    }

    pub fn cuts_of(&self, node: SbjRef) -> &[Cut] {
        &self.cuts[node.id]
    }

    pub fn total_cuts(&self) -> usize {
        self.cuts.iter().map(|c| c.len()).sum()
    }

    /// Checks the holder against `graph`: sizes agree, every cut is filed
    /// under its root and does not list that root as a leaf, leaves are in
    /// range, and every logic node has at least one cut with at most
    /// `cut_size_limit` leaves (any size when `None`).
    pub fn validate<G: SubjectGraph + ?Sized>(
        &self,
        graph: &G,
        cut_size_limit: Option<usize>,
    ) -> Result<(), PreconditionError> {
        if cut_size_limit == Some(0) {
            return Err(PreconditionError::ZeroCutSize);
        }
        if self.node_count() != graph.node_count() {
            return Err(PreconditionError::HolderSizeMismatch {
                holder_nodes: self.node_count(),
                graph_nodes: graph.node_count(),
            });
        }
        for (id, list) in self.cuts.iter().enumerate() {
            for cut in list {
                if cut.root().id != id {
                    return Err(PreconditionError::MisfiledCut {
                        holder_node: SbjRef::new(id),
                        root: cut.root(),
                    });
                }
                if cut.leaves().contains(&cut.root()) {
                    return Err(PreconditionError::RootAsLeaf { root: cut.root() });
                }
                if let Some(&leaf) = cut.leaves().iter().find(|l| l.id >= graph.node_count()) {
                    return Err(PreconditionError::LeafOutOfRange {
                        root: cut.root(),
                        leaf,
                        node_count: graph.node_count(),
                    });
                }
            }
        }
        for i in 0..graph.logic_count() {
            let node = graph.logic(i);
            let has_cut = self
                .cuts_of(node)
                .iter()
                .any(|c| cut_size_limit.map_or(true, |k| c.leaf_count() <= k));
            if !has_cut {
                return Err(PreconditionError::MissingCut { node });
            }
        }
        Ok(())
    }
}

/// Reusable scratch space for computing the nodes a cut covers.
///
/// The visited marks are cleared after every query, so a single instance can
/// be used for any number of cuts over the same graph.
pub struct ConeScratch {
    visited: BitVec,
    stack: Vec<SbjRef>,
}

impl ConeScratch {
    pub fn new(node_count: usize) -> Self {
        ConeScratch {
            visited: BitVec::repeat(false, node_count),
            stack: Vec::new(),
        }
    }

    pub fn node_count(&self) -> usize {
        self.visited.len()
    }

    /// Writes into `out` the root of `cut` plus every logic node reachable
    /// fanin-ward from it without crossing a leaf. The root comes first.
    pub fn covered_nodes<G: SubjectGraph + ?Sized>(
        &mut self,
        graph: &G,
        cut: &Cut,
        out: &mut Vec<SbjRef>,
    ) {
        out.clear();
        for leaf in cut.leaves() {
            self.visited.set(leaf.id, true);
        }
        self.stack.push(cut.root());
        while let Some(r) = self.stack.pop() {
            if self.visited[r.id] {
                continue;
            }
            let node = graph.node(r);
            if !node.is_logic() {
                continue;
            }
            self.visited.set(r.id, true);
            out.push(r);
            for fanin in node.fanins().into_iter().flatten() {
                if !self.visited[fanin.id] {
                    self.stack.push(fanin);
                }
            }
        }
        for leaf in cut.leaves() {
            self.visited.set(leaf.id, false);
        }
        for r in out.iter() {
            self.visited.set(r.id, false);
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumerateCutsOptions {
    /// Keeps at most this many cuts per node (smallest first). `None` keeps
    /// every cut.
    pub max_cuts_per_node: Option<usize>,
}

/// Enumerates every cut with at most `k` leaves for every logic node.
///
/// The trivial cut `{root}` is not stored. Cuts of a node are ordered by leaf
/// count, then by leaf ids.
pub fn enumerate_cuts<G: SubjectGraph + ?Sized>(
    graph: &G,
    k: usize,
    options: &EnumerateCutsOptions,
) -> CutHolder {
    assert!(k >= 2, "cut enumeration needs k >= 2 to cover 2-input logic, got {}", k);
    let mut holder = CutHolder::new(graph.node_count());
    // Leaf sets per node including the trivial one.
    let mut leaf_sets: Vec<Vec<Vec<SbjRef>>> = vec![Vec::new(); graph.node_count()];
    for id in 0..graph.node_count() {
        let r = SbjRef::new(id);
        if graph.node(r).is_input() {
            leaf_sets[id].push(vec![r]);
        }
    }

    for i in 0..graph.logic_count() {
        let root = graph.logic(i);
        let node = graph.node(root);
        let (a, b) = (node.fanin(0), node.fanin(1));
        let mut found: Vec<Vec<SbjRef>> = Vec::new();
        for lhs in &leaf_sets[a.id] {
            for rhs in &leaf_sets[b.id] {
                if let Some(merged) = merge_leaves(lhs, rhs, k) {
                    found.push(merged);
                }
            }
        }
        found.sort_by(|x, y| x.len().cmp(&y.len()).then_with(|| x.cmp(y)));
        found.dedup();
        if let Some(cap) = options.max_cuts_per_node {
            found.truncate(cap.max(1));
        }
        log::trace!("{}: {} cuts (k={})", root, found.len(), k);
        for leaves in &found {
            holder.add_cut(Cut::new(root, leaves.clone()));
        }
        found.push(vec![root]);
        leaf_sets[root.id] = found;
    }
    log::debug!(
        "enumerated {} cuts over {} logic nodes (k={})",
        holder.total_cuts(),
        graph.logic_count(),
        k
    );
    holder
}

/// Sorted union of two sorted leaf lists, or `None` if it exceeds `k`.
fn merge_leaves(lhs: &[SbjRef], rhs: &[SbjRef], k: usize) -> Option<Vec<SbjRef>> {
    let mut merged = Vec::with_capacity(lhs.len() + rhs.len());
    let (mut i, mut j) = (0, 0);
    while i < lhs.len() || j < rhs.len() {
        let next = match (lhs.get(i), rhs.get(j)) {
            (Some(&l), Some(&r)) if l == r => {
                i += 1;
                j += 1;
                l
            }
            (Some(&l), Some(&r)) if l < r => {
                i += 1;
                l
            }
            (Some(_), Some(&r)) => {
                j += 1;
                r
            }
            (Some(&l), None) => {
                i += 1;
                l
            }
            (None, Some(&r)) => {
                j += 1;
                r
            }
            (None, None) => unreachable!(),
        };
        merged.push(next);
        if merged.len() > k {
            return None;
        }
    }
    Some(merged)
}
