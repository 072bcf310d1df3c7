// SPDX-License-Identifier: Apache-2.0

//! LUT technology-mapping search.
//!
//! Given a subject graph of 2-input logic and a set of K-feasible cuts per
//! node, decide for every fanout point whether its value is implemented once
//! (a boundary) or duplicated into each consumer's LUT, so that the resulting
//! mapping uses as few LUTs as possible.
//!
//! * [`lower_bound`] computes a covering lower bound used to normalize
//!   search rewards.
//! * [`MonteCarloTreeSearch`] and [`SimulatedAnnealing`] search the decision
//!   space; both implement [`SearchEngine`].
//! * [`CoverEvaluator`] turns a decision vector into a [`MapRecord`] through
//!   an [`AreaCover`] recorder and a [`MapEstimator`].

pub mod area_cover;
pub mod cut;
pub mod decision_state;
pub mod error;
pub mod estimate;
pub mod evaluator;
pub mod lower_bound;
pub mod map_record;
pub mod sbj_graph;
pub mod search;
pub mod test_utils;

pub use crate::area_cover::{AreaCover, CoverMode, CutRecorder};
pub use crate::cut::{enumerate_cuts, Cut, CutHolder, EnumerateCutsOptions};
pub use crate::decision_state::{Candidate, DecisionState, FlatDecisions, IncrementalDecisions};
pub use crate::error::PreconditionError;
pub use crate::estimate::{LutEstimator, MapEstimator};
pub use crate::evaluator::{CoverEvaluator, Evaluator};
pub use crate::lower_bound::lower_bound;
pub use crate::map_record::{Cost, MapRecord};
pub use crate::sbj_graph::{SbjGraph, SbjGraphBuilder, SbjNode, SbjRef, SubjectGraph};
pub use crate::search::{
    FanoutCutWeight, MonteCarloTreeSearch, SampleWeight, SearchEngine, SearchOptions, SearchStats,
    SimulatedAnnealing,
};
