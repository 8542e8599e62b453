/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::fmt::Debug;
use std::fmt::Display;
use std::hash::Hash;

use crate::datatype::Interval;
use crate::datatype::LinearConstraintSystem;
use crate::datatype::LinearExpression;
use crate::datatype::Number;
use crate::datatype::Thresholds;

pub trait AbstractDomain: Clone + Eq {
    fn bottom() -> Self;
    fn top() -> Self;
    fn is_bottom(&self) -> bool;
    fn is_top(&self) -> bool;

    /// Partial-order test. Implementations may be incomplete but must be
    /// sound: a `true` result implies `self` is subsumed by `rhs`.
    fn leq(&self, rhs: &Self) -> bool;

    fn join(mut self, rhs: Self) -> Self {
        self.join_with(rhs);
        self
    }

    fn meet(mut self, rhs: Self) -> Self {
        self.meet_with(rhs);
        self
    }

    fn widen(mut self, rhs: Self) -> Self {
        self.widen_with(rhs);
        self
    }

    fn narrow(mut self, rhs: Self) -> Self {
        self.narrow_with(rhs);
        self
    }

    fn join_with(&mut self, rhs: Self);
    fn meet_with(&mut self, rhs: Self);

    /// Extrapolation. Not commutative: `self` is the accumulated state, `rhs`
    /// the incoming one. Any ascending chain folded through `widen_with` must
    /// stabilize in finitely many steps.
    fn widen_with(&mut self, rhs: Self);
    fn narrow_with(&mut self, rhs: Self);

    /// Widening that jumps to the nearest threshold before giving a bound
    /// up. Domains without a notion of thresholds fall back to plain
    /// widening.
    fn widen_with_thresholds(&mut self, rhs: Self, _thresholds: &Thresholds) {
        self.widen_with(rhs);
    }
}

/// Binary functors over numerical values.
///
/// The arithmetic group (`Add` through `Div`) is the one every numerical
/// domain is expected to interpret; the bitwise group may be declined with a
/// sound over-approximation.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Op {
    Add,
    Sub,
    Mul,
    Div,
    And,
    Or,
    Xor,
    Shl,
    Lshr,
    Ashr,
}

impl Op {
    pub fn is_bitwise(self) -> bool {
        matches!(
            self,
            Op::And | Op::Or | Op::Xor | Op::Shl | Op::Lshr | Op::Ashr
        )
    }
}

impl Display for Op {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Op::Add => "+",
            Op::Sub => "-",
            Op::Mul => "*",
            Op::Div => "/",
            Op::And => "&",
            Op::Or => "|",
            Op::Xor => "^",
            Op::Shl => "<<",
            Op::Lshr => ">>u",
            Op::Ashr => ">>",
        };
        f.write_str(s)
    }
}

/// The transfer-function contract of a numerical abstract domain.
///
/// Unsupported transfers never fail; they warn through the `log` facade and
/// keep a sound state. A transfer mentioning a variable the domain has never
/// seen treats that variable as unconstrained.
pub trait NumericalDomain: AbstractDomain {
    type Var: Clone + Eq + Hash + Ord + Debug;

    /// `x := e`.
    fn assign(&mut self, x: Self::Var, e: &LinearExpression<Self::Var>);

    /// `x := y op z`.
    fn apply(&mut self, op: Op, x: Self::Var, y: &Self::Var, z: &Self::Var);

    /// `x := y op k`.
    fn apply_constant(&mut self, op: Op, x: Self::Var, y: &Self::Var, k: Number);

    /// Refine with a constraint system; the state becomes bottom if the
    /// conjunction is infeasible.
    fn assume(&mut self, csts: &LinearConstraintSystem<Self::Var>);

    /// Drop all knowledge about `v`.
    fn forget(&mut self, v: &Self::Var);

    /// `y` becomes a copy of `x`.
    fn expand(&mut self, x: &Self::Var, y: Self::Var);

    /// Substitute `from[i]` by `to[i]`. Both slices have the same length and
    /// the target names are fresh.
    fn rename(&mut self, from: &[Self::Var], to: &[Self::Var]);

    /// Forget everything outside `vars`.
    fn project(&mut self, vars: &[Self::Var]);

    /// Constrain `v` to an interval, replacing previous knowledge about it.
    fn set(&mut self, v: Self::Var, value: Interval);

    /// Interval approximation of `v`.
    fn get(&self, v: &Self::Var) -> Interval;

    /// Export the state as linear constraints over the domain's variables.
    fn to_constraints(&self) -> LinearConstraintSystem<Self::Var>;
}
