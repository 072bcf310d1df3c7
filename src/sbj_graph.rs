// SPDX-License-Identifier: Apache-2.0

//! Subject graph: the 2-input logic network that LUT mapping covers.
//!
//! The search engines only ever read the graph through the [`SubjectGraph`]
//! trait. [`SbjGraph`] is a plain in-memory implementation that is built with
//! [`SbjGraphBuilder`]; logic nodes can only refer to nodes that already exist,
//! so creation order is a topological order.

use std::fmt;

use bitvec::vec::BitVec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct SbjRef {
    pub id: usize,
}

impl SbjRef {
    pub fn new(id: usize) -> Self {
        SbjRef { id }
    }
}

impl fmt::Display for SbjRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SbjNodeKind {
    Input { name: String },
    Logic { fanins: [SbjRef; 2] },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SbjNode {
    id: SbjRef,
    kind: SbjNodeKind,
    /// Logic consumers plus primary-output references.
    fanout_count: usize,
    output_refs: usize,
}

impl SbjNode {
    pub fn id(&self) -> SbjRef {
        self.id
    }

    pub fn kind(&self) -> &SbjNodeKind {
        &self.kind
    }

    pub fn is_logic(&self) -> bool {
        matches!(self.kind, SbjNodeKind::Logic { .. })
    }

    pub fn is_input(&self) -> bool {
        matches!(self.kind, SbjNodeKind::Input { .. })
    }

    pub fn fanout_count(&self) -> usize {
        self.fanout_count
    }

    /// True if some primary output is driven directly by this node.
    pub fn drives_output(&self) -> bool {
        self.output_refs > 0
    }

    /// Returns fanin `k` (0 or 1) of a logic node.
    ///
    /// Panics when called on a primary input or with `k > 1`.
    pub fn fanin(&self, k: usize) -> SbjRef {
        match &self.kind {
            SbjNodeKind::Logic { fanins } => fanins[k],
            SbjNodeKind::Input { name } => {
                panic!("fanin({}) requested on primary input '{}' ({})", k, name, self.id)
            }
        }
    }

    pub fn fanins(&self) -> Option<[SbjRef; 2]> {
        match &self.kind {
            SbjNodeKind::Logic { fanins } => Some(*fanins),
            SbjNodeKind::Input { .. } => None,
        }
    }
}

/// Read-only view of a subject graph.
///
/// `logic(i)` must enumerate the logic nodes in a topological order (fanins
/// before fanouts); the decision space and all dynamic programming passes
/// rely on it.
pub trait SubjectGraph {
    fn node_count(&self) -> usize;
    fn node(&self, id: SbjRef) -> &SbjNode;
    fn logic_count(&self) -> usize;
    fn logic(&self, i: usize) -> SbjRef;
    fn output_count(&self) -> usize;
    fn output(&self, i: usize) -> SbjRef;

    /// Logic nodes with more than one consumer, in topological order.
    fn fanout_points(&self) -> Vec<SbjRef> {
        (0..self.logic_count())
            .map(|i| self.logic(i))
            .filter(|&r| self.node(r).fanout_count() > 1)
            .collect()
    }

    /// Marks every node in the transitive fanin of a primary output.
    fn live_nodes(&self) -> BitVec {
        let mut live: BitVec = BitVec::repeat(false, self.node_count());
        let mut worklist: Vec<SbjRef> = (0..self.output_count()).map(|i| self.output(i)).collect();
        while let Some(r) = worklist.pop() {
            if live[r.id] {
                continue;
            }
            live.set(r.id, true);
            if let Some(fanins) = self.node(r).fanins() {
                worklist.extend(fanins.iter().filter(|f| !live[f.id]));
            }
        }
        live
    }
}

#[derive(Debug, Clone)]
pub struct SbjGraph {
    pub name: String,
    nodes: Vec<SbjNode>,
    inputs: Vec<SbjRef>,
    logic: Vec<SbjRef>,
    outputs: Vec<SbjRef>,
}

impl SbjGraph {
    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    pub fn input(&self, i: usize) -> SbjRef {
        self.inputs[i]
    }

    pub fn nodes(&self) -> &[SbjNode] {
        &self.nodes
    }
}

impl SubjectGraph for SbjGraph {
    fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn node(&self, id: SbjRef) -> &SbjNode {
        &self.nodes[id.id]
    }

    fn logic_count(&self) -> usize {
        self.logic.len()
    }

    fn logic(&self, i: usize) -> SbjRef {
        self.logic[i]
    }

    fn output_count(&self) -> usize {
        self.outputs.len()
    }

    fn output(&self, i: usize) -> SbjRef {
        self.outputs[i]
    }
}

impl fmt::Display for SbjGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "sbj {} {{", self.name)?;
        for node in &self.nodes {
            match node.kind() {
                SbjNodeKind::Input { name } => {
                    writeln!(f, "  {} = input({}) fo={}", node.id(), name, node.fanout_count())?
                }
                SbjNodeKind::Logic { fanins } => writeln!(
                    f,
                    "  {} = logic({}, {}) fo={}",
                    node.id(),
                    fanins[0],
                    fanins[1],
                    node.fanout_count()
                )?,
            }
        }
        for (i, o) in self.outputs.iter().enumerate() {
            writeln!(f, "  output[{}] = {}", i, o)?;
        }
        write!(f, "}}")
    }
}

pub struct SbjGraphBuilder {
    name: String,
    nodes: Vec<SbjNode>,
    inputs: Vec<SbjRef>,
    logic: Vec<SbjRef>,
    outputs: Vec<SbjRef>,
}

impl SbjGraphBuilder {
    pub fn new(name: &str) -> Self {
        SbjGraphBuilder {
            name: name.to_string(),
            nodes: Vec::new(),
            inputs: Vec::new(),
            logic: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn add_input(&mut self, name: &str) -> SbjRef {
        let id = SbjRef::new(self.nodes.len());
        self.nodes.push(SbjNode {
            id,
            kind: SbjNodeKind::Input {
                name: name.to_string(),
            },
            fanout_count: 0,
            output_refs: 0,
        });
        self.inputs.push(id);
        id
    }

    /// Adds a 2-input logic node. Both fanins must already exist.
    pub fn add_logic(&mut self, a: SbjRef, b: SbjRef) -> SbjRef {
        let id = SbjRef::new(self.nodes.len());
        assert!(
            a.id < id.id && b.id < id.id,
            "logic node {} refers to a fanin that does not exist yet: ({}, {})",
            id,
            a,
            b
        );
        self.nodes.push(SbjNode {
            id,
            kind: SbjNodeKind::Logic { fanins: [a, b] },
            fanout_count: 0,
            output_refs: 0,
        });
        self.nodes[a.id].fanout_count += 1;
        self.nodes[b.id].fanout_count += 1;
        self.logic.push(id);
        id
    }

    pub fn add_output(&mut self, node: SbjRef) {
        assert!(
            node.id < self.nodes.len(),
            "output refers to unknown node {}",
            node
        );
        let n = &mut self.nodes[node.id];
        n.fanout_count += 1;
        n.output_refs += 1;
        self.outputs.push(node);
    }

    pub fn build(self) -> SbjGraph {
        log::trace!(
            "built subject graph '{}': {} inputs, {} logic, {} outputs",
            self.name,
            self.inputs.len(),
            self.logic.len(),
            self.outputs.len()
        );
        SbjGraph {
            name: self.name,
            nodes: self.nodes,
            inputs: self.inputs,
            logic: self.logic,
            outputs: self.outputs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reconvergent() -> SbjGraph {
        let mut b = SbjGraphBuilder::new("reconv");
        let i0 = b.add_input("i0");
        let i1 = b.add_input("i1");
        let i2 = b.add_input("i2");
        let x = b.add_logic(i0, i1);
        let y = b.add_logic(x, i2);
        let z = b.add_logic(x, y);
        b.add_output(z);
        b.build()
    }

    #[test]
    fn test_fanout_counts_include_outputs() {
        let g = reconvergent();
        assert_eq!(g.node(SbjRef::new(3)).fanout_count(), 2);
        assert_eq!(g.node(SbjRef::new(4)).fanout_count(), 1);
        assert_eq!(g.node(SbjRef::new(5)).fanout_count(), 1);
        assert!(g.node(SbjRef::new(5)).drives_output());
        assert!(!g.node(SbjRef::new(3)).drives_output());
    }

    #[test]
    fn test_fanout_points_are_logic_only() {
        let mut b = SbjGraphBuilder::new("pi_fanout");
        let i0 = b.add_input("i0");
        let i1 = b.add_input("i1");
        let x = b.add_logic(i0, i1);
        let y = b.add_logic(i0, x);
        b.add_output(y);
        let g = b.build();
        // i0 has two consumers but is a primary input.
        assert_eq!(g.node(i0).fanout_count(), 2);
        assert!(g.fanout_points().is_empty());

        let g = reconvergent();
        assert_eq!(g.fanout_points(), vec![SbjRef::new(3)]);
    }

    #[test]
    fn test_live_nodes_skip_dead_logic() {
        let mut b = SbjGraphBuilder::new("dead");
        let i0 = b.add_input("i0");
        let i1 = b.add_input("i1");
        let used = b.add_logic(i0, i1);
        let dead = b.add_logic(i0, i1);
        b.add_output(used);
        let g = b.build();
        let live = g.live_nodes();
        assert!(live[used.id]);
        assert!(!live[dead.id]);
        assert!(live[i0.id] && live[i1.id]);
    }

    #[test]
    #[should_panic(expected = "primary input")]
    fn test_fanin_of_input_panics() {
        let g = reconvergent();
        g.node(SbjRef::new(0)).fanin(0);
    }

    #[test]
    fn test_display_lists_every_node() {
        let g = reconvergent();
        let text = g.to_string();
        assert!(text.contains("n3 = logic(n0, n1) fo=2"));
        assert!(text.contains("output[0] = n5"));
    }
}
