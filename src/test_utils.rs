// SPDX-License-Identifier: Apache-2.0

//! Small subject graphs and exhaustive reference helpers for tests and
//! benchmarks.

use bitvec::vec::BitVec;
use rand::Rng;

use crate::evaluator::Evaluator;
use crate::map_record::{Cost, MapRecord};
use crate::sbj_graph::{SbjGraph, SbjGraphBuilder, SbjRef};

pub struct SharedAndGraph {
    pub g: SbjGraph,
    pub i: [SbjRef; 4],
    pub x: SbjRef,
    pub y: SbjRef,
    pub z: SbjRef,
}

/// `x = i0 & i1` feeds both `y = x & i2` and `z = x & i3`; `y` and `z` are
/// outputs. `x` is the only fanout point.
///
/// With 4-input LUTs, sharing `x` costs 3 LUTs at depth 2 and duplicating it
/// costs 2 LUTs at depth 1.
pub fn setup_shared_and() -> SharedAndGraph {
    let mut b = SbjGraphBuilder::new("shared_and");
    let i0 = b.add_input("i0");
    let i1 = b.add_input("i1");
    let i2 = b.add_input("i2");
    let i3 = b.add_input("i3");
    let x = b.add_logic(i0, i1);
    let y = b.add_logic(x, i2);
    let z = b.add_logic(x, i3);
    b.add_output(y);
    b.add_output(z);
    SharedAndGraph {
        g: b.build(),
        i: [i0, i1, i2, i3],
        x,
        y,
        z,
    }
}

/// `blocks` independent copies of the shared-and pattern over four common
/// inputs: one free fanout point per block.
pub fn shared_blocks(blocks: usize) -> SbjGraph {
    let mut b = SbjGraphBuilder::new("shared_blocks");
    let inputs: Vec<SbjRef> = (0..4).map(|i| b.add_input(&format!("i{}", i))).collect();
    for _ in 0..blocks {
        let x = b.add_logic(inputs[0], inputs[1]);
        let y = b.add_logic(x, inputs[2]);
        let z = b.add_logic(x, inputs[3]);
        b.add_output(y);
        b.add_output(z);
    }
    b.build()
}

/// A single chain `n_k = n_{k-1} & i_k` of `len` logic nodes; no fanout
/// points.
pub fn setup_chain(len: usize) -> SbjGraph {
    assert!(len >= 1, "chain needs at least one logic node");
    let mut b = SbjGraphBuilder::new("chain");
    let mut acc = b.add_input("i0");
    for k in 1..=len {
        let input = b.add_input(&format!("i{}", k));
        acc = b.add_logic(acc, input);
    }
    b.add_output(acc);
    b.build()
}

/// Random subject graph with `inputs` primary inputs and `logic` 2-input
/// nodes over distinct fanins. Every logic node without a consumer becomes an
/// output, and occasionally an internal node is exported too.
pub fn random_sbj_graph<R: Rng>(rng: &mut R, inputs: usize, logic: usize) -> SbjGraph {
    assert!(inputs >= 2, "need two inputs to build 2-input logic");
    let mut b = SbjGraphBuilder::new("random");
    let mut consumed = vec![false; inputs + logic];
    for i in 0..inputs {
        b.add_input(&format!("i{}", i));
    }
    for k in 0..logic {
        let existing = inputs + k;
        let a = rng.gen_range(0..existing);
        let mut c = rng.gen_range(0..existing - 1);
        if c >= a {
            c += 1;
        }
        b.add_logic(SbjRef::new(a), SbjRef::new(c));
        consumed[a] = true;
        consumed[c] = true;
    }
    for id in inputs..inputs + logic {
        if !consumed[id] || rng.gen_bool(0.15) {
            b.add_output(SbjRef::new(id));
        }
    }
    b.build()
}

/// Evaluates every decision vector and returns the one with the fewest LUTs
/// (first in counting order on ties) together with its cost and mapping.
pub fn brute_force_optimum<E: Evaluator>(eval: &mut E) -> (Cost, BitVec, MapRecord) {
    let n = eval.decision_len();
    assert!(n < 20, "brute force over {} fanout points", n);
    let mut bits: BitVec = BitVec::repeat(false, n);
    let mut best: Option<(Cost, BitVec, MapRecord)> = None;
    for mask in 0u32..(1u32 << n) {
        for i in 0..n {
            bits.set(i, (mask >> i) & 1 == 1);
        }
        let cost = eval.evaluate(&bits);
        if best.as_ref().map_or(true, |(c, _, _)| cost.luts < c.luts) {
            best = Some((cost, bits.clone(), eval.record().clone()));
        }
    }
    match best {
        Some(b) => b,
        None => unreachable!("at least the empty vector is evaluated"),
    }
}
