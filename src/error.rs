// SPDX-License-Identifier: Apache-2.0

use crate::sbj_graph::SbjRef;

/// Violated input precondition detected before a search or bound computation
/// starts.
///
/// None of these are transient: the caller handed over a subject graph / cut
/// set combination that the search cannot work on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreconditionError {
    /// A logic node has no cut (within the active cut-size limit).
    MissingCut { node: SbjRef },
    /// A cut refers to a node id that is not in the subject graph.
    LeafOutOfRange {
        root: SbjRef,
        leaf: SbjRef,
        node_count: usize,
    },
    /// A cut lists its own root among its leaves.
    RootAsLeaf { root: SbjRef },
    /// A live logic node lies inside no cut, so no LUT can implement it.
    UncoveredNode { node: SbjRef },
    /// A cut is stored under a node that is not its root.
    MisfiledCut { holder_node: SbjRef, root: SbjRef },
    /// The cut holder was built for a graph of a different size.
    HolderSizeMismatch {
        holder_nodes: usize,
        graph_nodes: usize,
    },
    /// A cut-size limit of zero admits no LUT at all.
    ZeroCutSize,
    /// A supplied evaluator scores vectors of a different length than the
    /// graph has fanout points.
    DecisionLenMismatch {
        evaluator: usize,
        fanout_points: usize,
    },
}

impl std::fmt::Display for PreconditionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PreconditionError::MissingCut { node } => {
                write!(f, "logic node {} has no cut within the cut-size limit", node)
            }
            PreconditionError::LeafOutOfRange {
                root,
                leaf,
                node_count,
            } => write!(
                f,
                "cut rooted at {} has leaf {} but the subject graph only has {} nodes",
                root, leaf, node_count
            ),
            PreconditionError::RootAsLeaf { root } => {
                write!(f, "cut rooted at {} lists its root as a leaf", root)
            }
            PreconditionError::UncoveredNode { node } => {
                write!(f, "live logic node {} is not covered by any cut", node)
            }
            PreconditionError::MisfiledCut { holder_node, root } => write!(
                f,
                "cut rooted at {} is stored under node {}",
                root, holder_node
            ),
            PreconditionError::HolderSizeMismatch {
                holder_nodes,
                graph_nodes,
            } => write!(
                f,
                "cut holder covers {} nodes but the subject graph has {}",
                holder_nodes, graph_nodes
            ),
            PreconditionError::ZeroCutSize => write!(f, "cut-size limit must be at least 1"),
            PreconditionError::DecisionLenMismatch {
                evaluator,
                fanout_points,
            } => write!(
                f,
                "evaluator expects {} decisions but the subject graph has {} fanout points",
                evaluator, fanout_points
            ),
        }
    }
}

impl std::error::Error for PreconditionError {}
