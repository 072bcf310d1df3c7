// SPDX-License-Identifier: Apache-2.0

//! Scores a boundary decision vector by building the mapping it implies.

use bitvec::slice::BitSlice;

use crate::area_cover::{AreaCover, CoverMode, CutRecorder};
use crate::cut::CutHolder;
use crate::estimate::{LutEstimator, MapEstimator};
use crate::map_record::{Cost, MapRecord};
use crate::sbj_graph::{SbjRef, SubjectGraph};

/// Opaque scoring function shared by the search engines.
pub trait Evaluator {
    /// Length of the decision vectors this evaluator accepts.
    fn decision_len(&self) -> usize;

    /// Builds the mapping for `decisions` (bit `i` set = fanout point `i` is a
    /// boundary) and returns its cost. The mapping is available through
    /// [`Evaluator::record`] until the next call.
    fn evaluate(&mut self, decisions: &BitSlice) -> Cost;

    fn record(&self) -> &MapRecord;

    /// Number of `evaluate` calls so far.
    fn evaluations(&self) -> usize;
}

/// Evaluator composed of a cut recorder and a LUT estimator.
///
/// Boundary points are passed to the recorder as boundaries, the remaining
/// points as blocked nodes so that they are preferably absorbed (duplicated)
/// rather than used as LUT inputs. Points that drive a primary output are
/// always implemented, so their bit has no effect.
pub struct CoverEvaluator<'a, G: SubjectGraph + ?Sized, R = AreaCover, E = MapEstimator> {
    graph: &'a G,
    cuts: &'a CutHolder,
    points: Vec<SbjRef>,
    recorder: R,
    estimator: E,
    record: MapRecord,
    boundary: Vec<SbjRef>,
    blocked: Vec<SbjRef>,
    evaluations: usize,
}

impl<'a, G: SubjectGraph + ?Sized> CoverEvaluator<'a, G> {
    /// Evaluator over `graph.fanout_points()` backed by [`AreaCover`] and
    /// [`MapEstimator`].
    pub fn new(graph: &'a G, cuts: &'a CutHolder, cut_size: usize, mode: CoverMode) -> Self {
        let points = graph.fanout_points();
        Self::with_parts(
            graph,
            cuts,
            points,
            AreaCover::new(mode, cut_size),
            MapEstimator::new(),
        )
    }
}

impl<'a, G, R, E> CoverEvaluator<'a, G, R, E>
where
    G: SubjectGraph + ?Sized,
    R: CutRecorder<G>,
    E: LutEstimator<G>,
{
    pub fn with_parts(
        graph: &'a G,
        cuts: &'a CutHolder,
        points: Vec<SbjRef>,
        recorder: R,
        estimator: E,
    ) -> Self {
        CoverEvaluator {
            graph,
            cuts,
            points,
            recorder,
            estimator,
            record: MapRecord::new(graph.node_count()),
            boundary: Vec::new(),
            blocked: Vec::new(),
            evaluations: 0,
        }
    }

    pub fn points(&self) -> &[SbjRef] {
        &self.points
    }
}

impl<'a, G, R, E> Evaluator for CoverEvaluator<'a, G, R, E>
where
    G: SubjectGraph + ?Sized,
    R: CutRecorder<G>,
    E: LutEstimator<G>,
{
    fn decision_len(&self) -> usize {
        self.points.len()
    }

    fn evaluate(&mut self, decisions: &BitSlice) -> Cost {
        assert_eq!(
            decisions.len(),
            self.points.len(),
            "decision vector length does not match the fanout point count"
        );
        self.boundary.clear();
        self.blocked.clear();
        for (i, &p) in self.points.iter().enumerate() {
            if decisions[i] {
                self.boundary.push(p);
            } else if !self.graph.node(p).drives_output() {
                self.blocked.push(p);
            }
        }
        self.recorder.record_cuts(
            self.graph,
            self.cuts,
            &self.boundary,
            Some(self.blocked.as_slice()),
            &mut self.record,
        );
        self.evaluations += 1;
        let cost = self.estimator.estimate(self.graph, &self.record);
        log::trace!(
            "evaluate #{}: {} boundaries -> {} luts, depth {}",
            self.evaluations,
            self.boundary.len(),
            cost.luts,
            cost.depth
        );
        cost
    }

    fn record(&self) -> &MapRecord {
        &self.record
    }

    fn evaluations(&self) -> usize {
        self.evaluations
    }
}
