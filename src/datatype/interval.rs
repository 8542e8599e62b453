/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::collections::HashMap;
use std::fmt::Debug;
use std::fmt::Display;
use std::hash::Hash;

use crate::datatype::AbstractDomain;
use crate::datatype::ConstraintKind;
use crate::datatype::LinearConstraint;
use crate::datatype::LinearConstraintSystem;
use crate::datatype::LinearExpression;
use crate::datatype::Number;
use crate::datatype::NumericalDomain;
use crate::datatype::Op;
use crate::datatype::Thresholds;

/// An interval endpoint.
///
/// The derived order is `NegInf < Finite(_) < PosInf`, with finite bounds
/// ordered by value.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Bound {
    NegInf,
    Finite(Number),
    PosInf,
}

impl Bound {
    pub fn number(self) -> Option<Number> {
        match self {
            Bound::Finite(n) => Some(n),
            _ => None,
        }
    }

    /// Clamp an exact lower bound into the representable range. Rounding a
    /// too-large value down to `Number::MAX` only loosens the bound.
    fn lb_from_i128(v: i128) -> Bound {
        if v < Number::MIN as i128 {
            Bound::NegInf
        } else if v > Number::MAX as i128 {
            Bound::Finite(Number::MAX)
        } else {
            Bound::Finite(v as Number)
        }
    }

    fn ub_from_i128(v: i128) -> Bound {
        if v > Number::MAX as i128 {
            Bound::PosInf
        } else if v < Number::MIN as i128 {
            Bound::Finite(Number::MIN)
        } else {
            Bound::Finite(v as Number)
        }
    }
}

impl Display for Bound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Bound::NegInf => write!(f, "-oo"),
            Bound::Finite(n) => write!(f, "{}", n),
            Bound::PosInf => write!(f, "+oo"),
        }
    }
}

/// Extended values used for corner arithmetic, wide enough that products of
/// finite bounds never overflow.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Ext {
    NegInf,
    Val(i128),
    PosInf,
}

impl From<Bound> for Ext {
    fn from(b: Bound) -> Ext {
        match b {
            Bound::NegInf => Ext::NegInf,
            Bound::Finite(n) => Ext::Val(n as i128),
            Bound::PosInf => Ext::PosInf,
        }
    }
}

impl Ext {
    fn signum(self) -> i128 {
        match self {
            Ext::NegInf => -1,
            Ext::Val(v) => v.signum(),
            Ext::PosInf => 1,
        }
    }

    fn mul(self, other: Ext) -> Ext {
        if let (Ext::Val(a), Ext::Val(b)) = (self, other) {
            return Ext::Val(a * b);
        }
        // A zero corner pins the product at zero regardless of the other end.
        match self.signum() * other.signum() {
            0 => Ext::Val(0),
            s if s > 0 => Ext::PosInf,
            _ => Ext::NegInf,
        }
    }

    /// Truncated division; the divisor corner is never zero.
    fn div(self, other: Ext) -> Ext {
        match (self, other) {
            (Ext::Val(a), Ext::Val(b)) => Ext::Val(a / b),
            // Finite over infinite truncates to zero.
            (Ext::Val(_), _) => Ext::Val(0),
            _ => {
                if self.signum() * other.signum() > 0 {
                    Ext::PosInf
                } else {
                    Ext::NegInf
                }
            }
        }
    }

    fn min_lb(corners: &[Ext]) -> Bound {
        match corners.iter().min().copied().unwrap() {
            Ext::NegInf => Bound::NegInf,
            Ext::Val(v) => Bound::lb_from_i128(v),
            Ext::PosInf => Bound::Finite(Number::MAX),
        }
    }

    fn max_ub(corners: &[Ext]) -> Bound {
        match corners.iter().max().copied().unwrap() {
            Ext::PosInf => Bound::PosInf,
            Ext::Val(v) => Bound::ub_from_i128(v),
            Ext::NegInf => Bound::Finite(Number::MIN),
        }
    }
}

fn floor_div(a: i128, b: i128) -> i128 {
    let q = a / b;
    if a % b != 0 && (a < 0) != (b < 0) {
        q - 1
    } else {
        q
    }
}

fn ceil_div(a: i128, b: i128) -> i128 {
    let q = a / b;
    if a % b != 0 && (a < 0) == (b < 0) {
        q + 1
    } else {
        q
    }
}

/// A (possibly unbounded) integer interval.
///
/// Non-bottom values satisfy `lb <= ub`, with `lb != PosInf` and
/// `ub != NegInf`; bottom is the canonical pair `(PosInf, NegInf)`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Interval {
    lb: Bound,
    ub: Bound,
}

impl Interval {
    pub fn range(lb: Bound, ub: Bound) -> Interval {
        if lb > ub || lb == Bound::PosInf || ub == Bound::NegInf {
            Interval::bottom()
        } else {
            Interval { lb, ub }
        }
    }

    pub fn finite(lb: Number, ub: Number) -> Interval {
        Interval::range(Bound::Finite(lb), Bound::Finite(ub))
    }

    pub fn constant(n: Number) -> Interval {
        Interval::finite(n, n)
    }

    pub fn at_least(lb: Number) -> Interval {
        Interval::range(Bound::Finite(lb), Bound::PosInf)
    }

    pub fn at_most(ub: Number) -> Interval {
        Interval::range(Bound::NegInf, Bound::Finite(ub))
    }

    pub fn lb(&self) -> Bound {
        self.lb
    }

    pub fn ub(&self) -> Bound {
        self.ub
    }

    pub fn singleton(&self) -> Option<Number> {
        match (self.lb, self.ub) {
            (Bound::Finite(l), Bound::Finite(u)) if l == u => Some(l),
            _ => None,
        }
    }

    pub fn contains(&self, n: Number) -> bool {
        self.lb <= Bound::Finite(n) && Bound::Finite(n) <= self.ub
    }

    pub fn add(self, other: Interval) -> Interval {
        if self.is_bottom() || other.is_bottom() {
            return Interval::bottom();
        }
        let lb = match (self.lb, other.lb) {
            (Bound::Finite(a), Bound::Finite(b)) => Bound::lb_from_i128(a as i128 + b as i128),
            _ => Bound::NegInf,
        };
        let ub = match (self.ub, other.ub) {
            (Bound::Finite(a), Bound::Finite(b)) => Bound::ub_from_i128(a as i128 + b as i128),
            _ => Bound::PosInf,
        };
        Interval::range(lb, ub)
    }

    pub fn neg(self) -> Interval {
        if self.is_bottom() {
            return Interval::bottom();
        }
        let neg = |b: Bound| match b {
            Bound::NegInf => Bound::PosInf,
            Bound::Finite(n) => Bound::Finite(-n),
            Bound::PosInf => Bound::NegInf,
        };
        Interval::range(neg(self.ub), neg(self.lb))
    }

    pub fn sub(self, other: Interval) -> Interval {
        self.add(other.neg())
    }

    pub fn mul(self, other: Interval) -> Interval {
        if self.is_bottom() || other.is_bottom() {
            return Interval::bottom();
        }
        let (al, au) = (Ext::from(self.lb), Ext::from(self.ub));
        let (bl, bu) = (Ext::from(other.lb), Ext::from(other.ub));
        let corners = [al.mul(bl), al.mul(bu), au.mul(bl), au.mul(bu)];
        Interval::range(Ext::min_lb(&corners), Ext::max_ub(&corners))
    }

    /// Truncated (round toward zero) division.
    pub fn div(self, other: Interval) -> Interval {
        if self.is_bottom() || other.is_bottom() {
            return Interval::bottom();
        }
        // Split the divisor into its sign-constant parts; division by an
        // exact zero is unreachable code, hence bottom.
        let neg_part = other.meet(Interval::at_most(-1));
        let pos_part = other.meet(Interval::at_least(1));
        let mut result = Interval::bottom();
        for part in [neg_part, pos_part] {
            if part.is_bottom() {
                continue;
            }
            let (al, au) = (Ext::from(self.lb), Ext::from(self.ub));
            let (bl, bu) = (Ext::from(part.lb), Ext::from(part.ub));
            let corners = [al.div(bl), al.div(bu), au.div(bl), au.div(bu)];
            result.join_with(Interval::range(Ext::min_lb(&corners), Ext::max_ub(&corners)));
        }
        result
    }

    fn shl(self, other: Interval) -> Interval {
        match (other.lb, other.ub) {
            (Bound::Finite(l), Bound::Finite(u)) if l >= 0 && u <= 62 => {
                self.mul(Interval::finite(1 << l, 1 << u))
            }
            _ => Interval::top(),
        }
    }

    fn is_nonneg(&self) -> bool {
        self.lb >= Bound::Finite(0)
    }

    /// Smallest all-ones mask covering every value of a non-negative bound.
    fn or_mask(a: Bound, b: Bound) -> Bound {
        match (a, b) {
            (Bound::Finite(x), Bound::Finite(y)) => {
                let m = x.max(y) as u64;
                let bits = 64 - m.leading_zeros();
                Bound::ub_from_i128((1i128 << bits) - 1)
            }
            _ => Bound::PosInf,
        }
    }

    /// Sound transfer for `x op y`. Bitwise functors are coarse; they only
    /// retain range information for non-negative operands.
    pub fn apply(op: Op, x: Interval, y: Interval) -> Interval {
        if x.is_bottom() || y.is_bottom() {
            return Interval::bottom();
        }
        match op {
            Op::Add => x.add(y),
            Op::Sub => x.sub(y),
            Op::Mul => x.mul(y),
            Op::Div => x.div(y),
            Op::And => {
                if x.is_nonneg() && y.is_nonneg() {
                    Interval::range(Bound::Finite(0), x.ub.min(y.ub))
                } else {
                    Interval::top()
                }
            }
            Op::Or | Op::Xor => {
                if x.is_nonneg() && y.is_nonneg() {
                    Interval::range(Bound::Finite(0), Interval::or_mask(x.ub, y.ub))
                } else {
                    Interval::top()
                }
            }
            Op::Shl => x.shl(y),
            Op::Lshr | Op::Ashr => {
                if x.is_nonneg() && y.is_nonneg() {
                    Interval::range(Bound::Finite(0), x.ub)
                } else {
                    Interval::top()
                }
            }
        }
    }

}

impl AbstractDomain for Interval {
    fn bottom() -> Interval {
        Interval {
            lb: Bound::PosInf,
            ub: Bound::NegInf,
        }
    }

    fn top() -> Interval {
        Interval {
            lb: Bound::NegInf,
            ub: Bound::PosInf,
        }
    }

    fn is_bottom(&self) -> bool {
        self.lb > self.ub
    }

    fn is_top(&self) -> bool {
        self.lb == Bound::NegInf && self.ub == Bound::PosInf
    }

    fn leq(&self, rhs: &Interval) -> bool {
        self.is_bottom() || (!rhs.is_bottom() && rhs.lb <= self.lb && self.ub <= rhs.ub)
    }

    fn join_with(&mut self, rhs: Interval) {
        if self.is_bottom() {
            *self = rhs;
        } else if !rhs.is_bottom() {
            *self = Interval::range(self.lb.min(rhs.lb), self.ub.max(rhs.ub));
        }
    }

    fn meet_with(&mut self, rhs: Interval) {
        *self = Interval::range(self.lb.max(rhs.lb), self.ub.min(rhs.ub));
    }

    fn widen_with(&mut self, rhs: Interval) {
        if self.is_bottom() {
            *self = rhs;
            return;
        }
        if rhs.is_bottom() {
            return;
        }
        let lb = if rhs.lb < self.lb {
            Bound::NegInf
        } else {
            self.lb
        };
        let ub = if rhs.ub > self.ub {
            Bound::PosInf
        } else {
            self.ub
        };
        *self = Interval::range(lb, ub);
    }

    fn narrow_with(&mut self, rhs: Interval) {
        if self.is_bottom() || rhs.is_bottom() {
            *self = Interval::bottom();
            return;
        }
        let lb = if self.lb == Bound::NegInf {
            rhs.lb
        } else {
            self.lb
        };
        let ub = if self.ub == Bound::PosInf {
            rhs.ub
        } else {
            self.ub
        };
        *self = Interval::range(lb, ub);
    }

    fn widen_with_thresholds(&mut self, rhs: Interval, thresholds: &Thresholds) {
        if self.is_bottom() {
            *self = rhs;
            return;
        }
        if rhs.is_bottom() {
            return;
        }
        let lb = if rhs.lb < self.lb {
            match rhs.lb {
                Bound::Finite(n) => thresholds
                    .next_down(n)
                    .map(Bound::Finite)
                    .unwrap_or(Bound::NegInf),
                _ => Bound::NegInf,
            }
        } else {
            self.lb
        };
        let ub = if rhs.ub > self.ub {
            match rhs.ub {
                Bound::Finite(n) => thresholds
                    .next_up(n)
                    .map(Bound::Finite)
                    .unwrap_or(Bound::PosInf),
                _ => Bound::PosInf,
            }
        } else {
            self.ub
        };
        *self = Interval::range(lb, ub);
    }
}

impl Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_bottom() {
            write!(f, "_|_")
        } else {
            write!(f, "[{}, {}]", self.lb, self.ub)
        }
    }
}

/*
 * An abstract environment mapping program variables to intervals. Bindings
 * are implicit: an unmapped variable is top, and a bottom binding collapses
 * the whole environment to bottom. This is the reference value domain for
 * the fixpoint iterator and the default base of the term domain.
 */

const ASSUME_ROUNDS: usize = 5;

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum IntervalEnvironment<V: Clone + Eq + Hash + Ord + Debug> {
    Value(HashMap<V, Interval>),
    Bottom,
}

impl<V> IntervalEnvironment<V>
where
    V: Clone + Eq + Hash + Ord + Debug,
{
    pub fn bindings(&self) -> Option<&HashMap<V, Interval>> {
        match self {
            IntervalEnvironment::Value(map) => Some(map),
            IntervalEnvironment::Bottom => None,
        }
    }

    /// Interval value of a linear expression in this environment.
    pub fn eval(&self, e: &LinearExpression<V>) -> Interval {
        if self.is_bottom() {
            return Interval::bottom();
        }
        let mut acc = Interval::constant(e.constant_term());
        for (v, c) in e.terms() {
            acc = acc.add(self.get(v).mul(Interval::constant(c)));
        }
        acc
    }

    fn bind(&mut self, v: V, value: Interval) {
        if let IntervalEnvironment::Value(map) = self {
            if value.is_bottom() {
                *self = IntervalEnvironment::Bottom;
            } else if value.is_top() {
                map.remove(&v);
            } else {
                map.insert(v, value);
            }
        }
    }

    /// Evaluate `e` minus its `v` term, i.e. the rest of the expression.
    fn residual(&self, e: &LinearExpression<V>, v: &V) -> Interval {
        let mut acc = Interval::constant(e.constant_term());
        for (w, c) in e.terms() {
            if w != v {
                acc = acc.add(self.get(w).mul(Interval::constant(c)));
            }
        }
        acc
    }

    /// Solutions of `c*v ∈ rhs` for non-zero `c`.
    fn solve(c: Number, rhs: Interval) -> Interval {
        if rhs.is_bottom() {
            return Interval::bottom();
        }
        let c = c as i128;
        let lo = match if c > 0 { rhs.lb() } else { rhs.ub() } {
            Bound::Finite(n) => Bound::lb_from_i128(ceil_div(n as i128, c)),
            _ => Bound::NegInf,
        };
        let hi = match if c > 0 { rhs.ub() } else { rhs.lb() } {
            Bound::Finite(n) => Bound::ub_from_i128(floor_div(n as i128, c)),
            _ => Bound::PosInf,
        };
        Interval::range(lo, hi)
    }

    /// One propagation pass for a single constraint. Returns false when the
    /// constraint is infeasible under the current state.
    fn refine(&mut self, cst: &LinearConstraint<V>, changed: &mut bool) -> bool {
        let e = cst.expression();
        let value = self.eval(e);
        match cst.kind() {
            ConstraintKind::Equality => {
                if !value.contains(0) {
                    return false;
                }
                for (v, c) in e.terms() {
                    let rhs = self.residual(e, v).neg();
                    let refined = self.get(v).meet(Self::solve(c, rhs));
                    if refined.is_bottom() {
                        return false;
                    }
                    if refined != self.get(v) {
                        *changed = true;
                        self.bind(v.clone(), refined);
                    }
                }
            }
            ConstraintKind::Inequality => {
                if value.lb() > Bound::Finite(0) {
                    return false;
                }
                for (v, c) in e.terms() {
                    // c*v <= -rl holds for every feasible valuation, where rl
                    // is the residual's lower bound.
                    let Bound::Finite(rl) = self.residual(e, v).lb() else {
                        continue;
                    };
                    let limit = -rl as i128;
                    let refined = if c > 0 {
                        self.get(v)
                            .meet(Interval::range(
                                Bound::NegInf,
                                Bound::ub_from_i128(floor_div(limit, c as i128)),
                            ))
                    } else {
                        self.get(v)
                            .meet(Interval::range(
                                Bound::lb_from_i128(ceil_div(limit, c as i128)),
                                Bound::PosInf,
                            ))
                    };
                    if refined.is_bottom() {
                        return false;
                    }
                    if refined != self.get(v) {
                        *changed = true;
                        self.bind(v.clone(), refined);
                    }
                }
            }
            ConstraintKind::Disequality => {
                if value.singleton() == Some(0) {
                    return false;
                }
                for (v, c) in e.terms() {
                    let Some(r) = self.residual(e, v).singleton() else {
                        continue;
                    };
                    // c*v != -r; endpoints equal to the forbidden value can
                    // be shaved off.
                    let (neg_r, c_wide) = (-(r as i128), c as i128);
                    if neg_r % c_wide != 0 {
                        continue;
                    }
                    let quotient = neg_r / c_wide;
                    let Ok(forbidden) = Number::try_from(quotient) else {
                        continue;
                    };
                    let cur = self.get(v);
                    if cur.singleton() == Some(forbidden) {
                        return false;
                    }
                    let mut refined = cur;
                    if cur.lb() == Bound::Finite(forbidden) {
                        refined = refined.meet(Interval::at_least(forbidden + 1));
                    }
                    if cur.ub() == Bound::Finite(forbidden) {
                        refined = refined.meet(Interval::at_most(forbidden - 1));
                    }
                    if refined != cur {
                        *changed = true;
                        self.bind(v.clone(), refined);
                    }
                }
            }
        }
        true
    }

    fn join_like_operation(&mut self, rhs: Self, operation: impl Fn(&mut Interval, Interval)) {
        use IntervalEnvironment::*;
        match (&mut *self, rhs) {
            (Value(l_map), Value(mut r_map)) => {
                l_map.retain(|l_k, _| r_map.contains_key(l_k));
                for (l_k, l_v) in l_map.iter_mut() {
                    let r_v = r_map.remove(l_k).unwrap();
                    operation(l_v, r_v);
                }
                l_map.retain(|_, l_v| !l_v.is_top());
            }
            (Bottom, rhs) => *self = rhs,
            (_, Bottom) => {}
        }
    }

    fn meet_like_operation(&mut self, rhs: Self, operation: impl Fn(&mut Interval, Interval)) {
        use IntervalEnvironment::*;
        if self.is_bottom() {
            return;
        }
        match (&mut *self, rhs) {
            (Value(l_map), Value(r_map)) => {
                for (r_k, r_v) in r_map {
                    if let Some(l_v) = l_map.get_mut(&r_k) {
                        operation(l_v, r_v);
                        if l_v.is_bottom() {
                            *self = Bottom;
                            return;
                        }
                    } else {
                        // Top is the identity of meet-like operations.
                        l_map.insert(r_k, r_v);
                    }
                }
            }
            (_, Bottom) => *self = Bottom,
            (Bottom, _) => {}
        }
    }
}

impl<V> AbstractDomain for IntervalEnvironment<V>
where
    V: Clone + Eq + Hash + Ord + Debug,
{
    fn bottom() -> Self {
        IntervalEnvironment::Bottom
    }

    fn top() -> Self {
        IntervalEnvironment::Value(HashMap::new())
    }

    fn is_bottom(&self) -> bool {
        matches!(self, IntervalEnvironment::Bottom)
    }

    fn is_top(&self) -> bool {
        match self {
            IntervalEnvironment::Value(map) => map.is_empty(),
            IntervalEnvironment::Bottom => false,
        }
    }

    fn leq(&self, rhs: &Self) -> bool {
        use IntervalEnvironment::*;
        match (self, rhs) {
            (Bottom, _) => true,
            (_, Bottom) => false,
            (Value(l_map), Value(r_map)) => {
                // Bindings absent from a map are top.
                r_map.iter().all(|(r_k, r_v)| {
                    l_map
                        .get(r_k)
                        .map(|l_v| l_v.leq(r_v))
                        .unwrap_or(false)
                })
            }
        }
    }

    fn join_with(&mut self, rhs: Self) {
        self.join_like_operation(rhs, |l, r| l.join_with(r));
    }

    fn meet_with(&mut self, rhs: Self) {
        self.meet_like_operation(rhs, |l, r| l.meet_with(r));
    }

    fn widen_with(&mut self, rhs: Self) {
        self.join_like_operation(rhs, |l, r| l.widen_with(r));
    }

    fn narrow_with(&mut self, rhs: Self) {
        self.meet_like_operation(rhs, |l, r| l.narrow_with(r));
    }

    fn widen_with_thresholds(&mut self, rhs: Self, thresholds: &Thresholds) {
        self.join_like_operation(rhs, |l, r| l.widen_with_thresholds(r, thresholds));
    }
}

impl<V> NumericalDomain for IntervalEnvironment<V>
where
    V: Clone + Eq + Hash + Ord + Debug,
{
    type Var = V;

    fn assign(&mut self, x: V, e: &LinearExpression<V>) {
        if !self.is_bottom() {
            let value = self.eval(e);
            self.bind(x, value);
        }
    }

    fn apply(&mut self, op: Op, x: V, y: &V, z: &V) {
        if !self.is_bottom() {
            let value = Interval::apply(op, self.get(y), self.get(z));
            self.bind(x, value);
        }
    }

    fn apply_constant(&mut self, op: Op, x: V, y: &V, k: Number) {
        if !self.is_bottom() {
            let value = Interval::apply(op, self.get(y), Interval::constant(k));
            self.bind(x, value);
        }
    }

    fn assume(&mut self, csts: &LinearConstraintSystem<V>) {
        if self.is_bottom() {
            return;
        }
        for _ in 0..ASSUME_ROUNDS {
            let mut changed = false;
            for cst in csts.iter() {
                if !self.refine(cst, &mut changed) {
                    *self = IntervalEnvironment::Bottom;
                    return;
                }
            }
            if !changed {
                break;
            }
        }
    }

    fn forget(&mut self, v: &V) {
        if let IntervalEnvironment::Value(map) = self {
            map.remove(v);
        }
    }

    fn expand(&mut self, x: &V, y: V) {
        if !self.is_bottom() {
            let value = self.get(x);
            self.bind(y, value);
        }
    }

    fn rename(&mut self, from: &[V], to: &[V]) {
        debug_assert_eq!(from.len(), to.len());
        if let IntervalEnvironment::Value(map) = self {
            let values: Vec<Option<Interval>> = from.iter().map(|v| map.remove(v)).collect();
            for (t, value) in to.iter().zip(values) {
                if let Some(value) = value {
                    map.insert(t.clone(), value);
                }
            }
        }
    }

    fn project(&mut self, vars: &[V]) {
        if let IntervalEnvironment::Value(map) = self {
            map.retain(|k, _| vars.contains(k));
        }
    }

    fn set(&mut self, v: V, value: Interval) {
        self.bind(v, value);
    }

    fn get(&self, v: &V) -> Interval {
        match self {
            IntervalEnvironment::Value(map) => map.get(v).copied().unwrap_or_else(Interval::top),
            IntervalEnvironment::Bottom => Interval::bottom(),
        }
    }

    fn to_constraints(&self) -> LinearConstraintSystem<V> {
        let mut sys = LinearConstraintSystem::new();
        let IntervalEnvironment::Value(map) = self else {
            sys.push(LinearConstraint::equality(
                LinearExpression::constant(1),
                LinearExpression::constant(0),
            ));
            return sys;
        };
        for (v, itv) in map {
            if let Some(n) = itv.singleton() {
                sys.push(LinearConstraint::equality(
                    LinearExpression::variable(v.clone()),
                    LinearExpression::constant(n),
                ));
                continue;
            }
            if let Bound::Finite(l) = itv.lb() {
                sys.push(LinearConstraint::greater_or_equal(
                    LinearExpression::variable(v.clone()),
                    LinearExpression::constant(l),
                ));
            }
            if let Bound::Finite(u) = itv.ub() {
                sys.push(LinearConstraint::less_or_equal(
                    LinearExpression::variable(v.clone()),
                    LinearExpression::constant(u),
                ));
            }
        }
        sys
    }
}

impl<V> Display for IntervalEnvironment<V>
where
    V: Clone + Eq + Hash + Ord + Debug + Display,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let IntervalEnvironment::Value(map) = self else {
            return write!(f, "_|_");
        };
        let mut entries: Vec<(&V, &Interval)> = map.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        write!(f, "{{")?;
        let mut first = true;
        for (v, itv) in entries {
            if !first {
                write!(f, ", ")?;
            }
            first = false;
            write!(f, "{} -> {}", v, itv)?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    type Env = IntervalEnvironment<&'static str>;

    #[test]
    fn test_interval_arithmetic() {
        let a = Interval::finite(1, 5);
        let b = Interval::finite(-2, 3);
        assert_eq!(a.add(b), Interval::finite(-1, 8));
        assert_eq!(a.sub(b), Interval::finite(-2, 7));
        assert_eq!(a.mul(b), Interval::finite(-10, 15));
        assert_eq!(
            Interval::finite(10, 20).div(Interval::finite(2, 5)),
            Interval::finite(2, 10)
        );
        assert_eq!(
            Interval::finite(-7, 7).div(Interval::finite(-2, 2)),
            Interval::finite(-7, 7)
        );
        assert!(a.div(Interval::constant(0)).is_bottom());
    }

    #[test]
    fn test_interval_overflow_is_sound() {
        let big = Interval::constant(Number::MAX);
        let sum = big.add(Interval::constant(1));
        assert_eq!(sum.ub(), Bound::PosInf);
        assert!(sum.contains(Number::MAX));
    }

    #[test]
    fn test_interval_widen_narrow() {
        let mut w = Interval::finite(0, 0);
        w.widen_with(Interval::finite(0, 1));
        assert_eq!(w, Interval::at_least(0));
        let mut n = w;
        n.narrow_with(Interval::finite(0, 10));
        assert_eq!(n, Interval::finite(0, 10));
    }

    #[test]
    fn test_interval_threshold_widening() {
        let ts = Thresholds::new([16, 256]);
        let mut w = Interval::finite(0, 10);
        w.widen_with_thresholds(Interval::finite(0, 17), &ts);
        assert_eq!(w, Interval::finite(0, 256));
        w.widen_with_thresholds(Interval::finite(0, 1000), &ts);
        assert_eq!(w, Interval::at_least(0));
    }

    #[test]
    fn test_env_assume_equality() {
        let mut env = Env::top();
        env.set("x", Interval::finite(0, 10));
        env.assume(&LinearConstraint::equality(
            LinearExpression::variable("x"),
            LinearExpression::variable("y"),
        )
        .into());
        assert_eq!(env.get(&"y"), Interval::finite(0, 10));
    }

    #[test]
    fn test_env_assume_infeasible() {
        let mut env = Env::top();
        env.set("x", Interval::finite(0, 4));
        env.assume(&LinearConstraint::greater_or_equal(
            LinearExpression::variable("x"),
            LinearExpression::constant(5),
        )
        .into());
        assert!(env.is_bottom());
    }

    #[test]
    fn test_env_assume_disequality() {
        let mut env = Env::top();
        env.set("x", Interval::constant(3));
        env.set("y", Interval::constant(3));
        env.assume(&LinearConstraint::disequality(
            LinearExpression::variable("x"),
            LinearExpression::variable("y"),
        )
        .into());
        assert!(env.is_bottom());
    }

    fn bound_strategy() -> impl Strategy<Value = Bound> {
        prop_oneof![
            Just(Bound::NegInf),
            (-50i64..50).prop_map(Bound::Finite),
            Just(Bound::PosInf),
        ]
    }

    fn interval_strategy() -> impl Strategy<Value = Interval> {
        (bound_strategy(), bound_strategy()).prop_map(|(a, b)| Interval::range(a, b))
    }

    proptest! {
        #[test]
        fn lattice_laws(a in interval_strategy(), b in interval_strategy()) {
            let join = a.join(b);
            let meet = a.meet(b);
            prop_assert!(a.leq(&join) && b.leq(&join));
            prop_assert!(meet.leq(&a) && meet.leq(&b));
            prop_assert_eq!(a.join(Interval::bottom()), a);
            prop_assert_eq!(a.meet(Interval::top()), a);
            prop_assert!(a.join(Interval::top()).is_top());
            prop_assert!(a.meet(Interval::bottom()).is_bottom());
            prop_assert_eq!(a.join(a), a);
            prop_assert_eq!(a.meet(a), a);
            prop_assert_eq!(a.leq(&b), a.join(b) == b);
        }

        #[test]
        fn widening_covers_join(a in interval_strategy(), b in interval_strategy()) {
            prop_assert!(a.join(b).leq(&a.widen(b)));
        }
    }
}
