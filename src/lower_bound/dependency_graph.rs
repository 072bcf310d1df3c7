// SPDX-License-Identifier: Apache-2.0

//! Conflict graph over subject nodes: `u -- v` iff some cut covers both.
//!
//! Two nodes that are not adjacent can never be implemented by the same LUT,
//! so any independent set needs one LUT per member.

use std::collections::HashSet;

use crate::sbj_graph::SbjRef;

#[derive(Debug, Clone)]
pub struct DgNode {
    pub id: SbjRef,
    /// Participates in the bound; cleared transiently by the MIS pass.
    pub active: bool,
    neighbors: Vec<usize>,
}

impl DgNode {
    pub fn degree(&self) -> usize {
        self.neighbors.len()
    }

    pub fn neighbors(&self) -> impl Iterator<Item = SbjRef> + '_ {
        self.neighbors.iter().map(|&i| SbjRef::new(i))
    }
}

#[derive(Debug, Clone)]
pub struct DependencyGraph {
    nodes: Vec<DgNode>,
    edges: HashSet<(usize, usize)>,
}

impl DependencyGraph {
    /// Creates a graph with one active node per subject node and no edges.
    pub fn new(node_count: usize) -> Self {
        DependencyGraph {
            nodes: (0..node_count)
                .map(|id| DgNode {
                    id: SbjRef::new(id),
                    active: true,
                    neighbors: Vec::new(),
                })
                .collect(),
            edges: HashSet::new(),
        }
    }

    pub fn node(&self, r: SbjRef) -> &DgNode {
        &self.nodes[r.id]
    }

    pub fn set_active(&mut self, r: SbjRef, active: bool) {
        self.nodes[r.id].active = active;
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn has_edge(&self, a: SbjRef, b: SbjRef) -> bool {
        self.edges.contains(&(a.id.min(b.id), a.id.max(b.id)))
    }

    /// Adds `a -- b` unless it is a self loop or already present.
    pub fn add_edge(&mut self, a: SbjRef, b: SbjRef) {
        if a == b {
            return;
        }
        let key = (a.id.min(b.id), a.id.max(b.id));
        if self.edges.insert(key) {
            self.nodes[key.0].neighbors.push(key.1);
            self.nodes[key.1].neighbors.push(key.0);
        }
    }

    /// Connects every pair in `members`.
    pub fn add_clique(&mut self, members: &[SbjRef]) {
        for (i, &a) in members.iter().enumerate() {
            for &b in &members[i + 1..] {
                self.add_edge(a, b);
            }
        }
    }

    /// Greedy maximal independent set over the active nodes: visit them by
    /// ascending degree (ties by id) and take every node still active,
    /// deactivating its neighbours. Returns the number of nodes taken.
    ///
    /// Consumes the `active` flags.
    pub fn greedy_independent_set(&mut self) -> usize {
        let mut order: Vec<usize> = (0..self.nodes.len())
            .filter(|&i| self.nodes[i].active)
            .collect();
        order.sort_by_key(|&i| (self.nodes[i].degree(), i));

        let mut taken = 0;
        for i in order {
            if !self.nodes[i].active {
                continue;
            }
            taken += 1;
            self.nodes[i].active = false;
            for k in 0..self.nodes[i].neighbors.len() {
                let n = self.nodes[i].neighbors[k];
                self.nodes[n].active = false;
            }
        }
        taken
    }
}
