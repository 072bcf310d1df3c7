// SPDX-License-Identifier: Apache-2.0

//! LUT count / depth estimation for a recorded mapping.

use crate::map_record::{Cost, MapRecord};
use crate::sbj_graph::SubjectGraph;

/// Derives the objective of a mapping from its record.
pub trait LutEstimator<G: SubjectGraph + ?Sized> {
    fn estimate(&mut self, graph: &G, record: &MapRecord) -> Cost;
}

/// Counts the distinct LUTs reachable from the outputs and the longest chain
/// of LUTs between a primary input and an output.
#[derive(Debug, Default)]
pub struct MapEstimator {
    levels: Vec<usize>,
}

impl MapEstimator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<G: SubjectGraph + ?Sized> LutEstimator<G> for MapEstimator {
    fn estimate(&mut self, graph: &G, record: &MapRecord) -> Cost {
        let roots = record.lut_roots(graph);
        self.levels.clear();
        self.levels.resize(graph.node_count(), 0);
        for &root in &roots {
            let leaves = record
                .cut_leaves(root)
                .expect("lut_roots only returns nodes with a recorded cut");
            let level = leaves.iter().map(|l| self.levels[l.id]).max().unwrap_or(0) + 1;
            self.levels[root.id] = level;
        }
        let depth = (0..graph.output_count())
            .map(|i| self.levels[graph.output(i).id])
            .max()
            .unwrap_or(0);
        Cost {
            luts: roots.len(),
            depth,
        }
    }
}
