/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::marker::PhantomData;

use log::warn;

use crate::datatype::AbstractDomain;
use crate::datatype::Interval;
use crate::datatype::LinearConstraintSystem;
use crate::datatype::LinearExpression;
use crate::datatype::Number;
use crate::datatype::NumericalDomain;
use crate::datatype::Op;
use crate::datatype::Thresholds;

/// Compile-time policy of a [`PowersetDomain`].
pub trait PowersetParams {
    /// Smash once the number of disjuncts exceeds this bound. Termination
    /// relies on this cap, never on redundancy pruning.
    const MAX_DISJUNCTS: usize;
    /// Whether meet is the Cartesian pairwise meet or a smashed meet.
    const EXACT_MEET: bool;
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct DefaultPowersetParams;

impl PowersetParams for DefaultPowersetParams {
    const MAX_DISJUNCTS: usize = 99999;
    const EXACT_MEET: bool = false;
}

/// Lifts a base domain to a bounded disjunction of its elements.
///
/// The disjunct sequence is never empty: bottom is a single bottom disjunct
/// and top a single top one. A disjunct that turns top promotes the whole
/// value to top. There is no generic widening for a disjunction, so widening
/// (and narrowing, leq, inexact meet) smashes both sides and delegates to the
/// base domain.
#[derive(Debug)]
pub struct PowersetDomain<D, P = DefaultPowersetParams>
where
    D: NumericalDomain,
    P: PowersetParams,
{
    disjuncts: Vec<D>,
    params: PhantomData<P>,
}

// Manual impls: the phantom params type plays no role in the value.
impl<D, P> Clone for PowersetDomain<D, P>
where
    D: NumericalDomain,
    P: PowersetParams,
{
    fn clone(&self) -> Self {
        Self {
            disjuncts: self.disjuncts.clone(),
            params: PhantomData,
        }
    }
}

impl<D, P> PartialEq for PowersetDomain<D, P>
where
    D: NumericalDomain,
    P: PowersetParams,
{
    fn eq(&self, other: &Self) -> bool {
        self.disjuncts == other.disjuncts
    }
}

impl<D, P> Eq for PowersetDomain<D, P>
where
    D: NumericalDomain,
    P: PowersetParams,
{
}

impl<D, P> From<D> for PowersetDomain<D, P>
where
    D: NumericalDomain,
    P: PowersetParams,
{
    fn from(dom: D) -> Self {
        Self::from_disjuncts(vec![dom])
    }
}

impl<D, P> PowersetDomain<D, P>
where
    D: NumericalDomain,
    P: PowersetParams,
{
    fn from_disjuncts(disjuncts: Vec<D>) -> Self {
        debug_assert!(!disjuncts.is_empty());
        let mut res = Self {
            disjuncts,
            params: PhantomData,
        };
        res.normalize_if_top();
        if res.disjuncts.len() > P::MAX_DISJUNCTS {
            res.smash();
        }
        res
    }

    pub fn disjuncts(&self) -> &[D] {
        &self.disjuncts
    }

    fn normalize_if_top(&mut self) {
        if self.disjuncts.iter().any(|d| d.is_top()) {
            self.disjuncts = vec![D::top()];
        }
    }

    /// Collapse the sequence into the join of its disjuncts.
    pub fn smash(&mut self) {
        let mut it = std::mem::take(&mut self.disjuncts).into_iter();
        let first = it.next().unwrap();
        self.disjuncts = vec![it.fold(first, |acc, d| acc.join(d))];
    }

    fn smashed(&self) -> D {
        let mut smashed = self.clone();
        smashed.smash();
        smashed.disjuncts.pop().unwrap()
    }

    /// Append a disjunct unless an existing one already subsumes it.
    fn insert(disjuncts: &mut Vec<D>, dom: D) {
        if !disjuncts.iter().any(|d| dom.leq(d)) {
            disjuncts.push(dom);
        }
    }

    fn transform(&mut self, f: impl Fn(&mut D)) {
        for d in &mut self.disjuncts {
            f(d);
        }
        self.normalize_if_top();
    }

    /// Apply a refinement to every disjunct, pruning those that became
    /// unreachable.
    fn refine(&mut self, f: impl Fn(&mut D)) {
        for d in &mut self.disjuncts {
            f(d);
        }
        self.disjuncts.retain(|d| !d.is_bottom());
        if self.disjuncts.is_empty() {
            self.disjuncts.push(D::bottom());
        }
        self.normalize_if_top();
    }
}

impl<D, P> AbstractDomain for PowersetDomain<D, P>
where
    D: NumericalDomain,
    P: PowersetParams,
{
    fn bottom() -> Self {
        Self {
            disjuncts: vec![D::bottom()],
            params: PhantomData,
        }
    }

    fn top() -> Self {
        Self {
            disjuncts: vec![D::top()],
            params: PhantomData,
        }
    }

    fn is_bottom(&self) -> bool {
        self.disjuncts.iter().all(|d| d.is_bottom())
    }

    fn is_top(&self) -> bool {
        self.disjuncts.iter().any(|d| d.is_top())
    }

    fn leq(&self, rhs: &Self) -> bool {
        self.smashed().leq(&rhs.smashed())
    }

    fn join_with(&mut self, rhs: Self) {
        if self.is_top() || rhs.is_bottom() {
            return;
        }
        if self.is_bottom() {
            *self = rhs;
            return;
        }
        if rhs.is_top() {
            *self = Self::top();
            return;
        }
        for d in rhs.disjuncts {
            Self::insert(&mut self.disjuncts, d);
        }
        if self.disjuncts.len() > P::MAX_DISJUNCTS {
            self.smash();
        }
    }

    fn meet_with(&mut self, rhs: Self) {
        if self.is_bottom() || rhs.is_top() {
            return;
        }
        if rhs.is_bottom() || self.is_top() {
            *self = rhs;
            return;
        }
        if P::EXACT_MEET {
            let mut out = Vec::with_capacity(self.disjuncts.len() * rhs.disjuncts.len());
            for l in &self.disjuncts {
                for r in &rhs.disjuncts {
                    let met = l.clone().meet(r.clone());
                    if !met.is_bottom() {
                        out.push(met);
                    }
                }
            }
            if out.is_empty() {
                out.push(D::bottom());
            }
            *self = Self::from_disjuncts(out);
        } else {
            *self = Self::from(self.smashed().meet(rhs.smashed()));
        }
    }

    fn widen_with(&mut self, rhs: Self) {
        *self = Self::from(self.smashed().widen(rhs.smashed()));
    }

    fn narrow_with(&mut self, rhs: Self) {
        *self = Self::from(self.smashed().narrow(rhs.smashed()));
    }

    fn widen_with_thresholds(&mut self, rhs: Self, thresholds: &Thresholds) {
        let mut smashed = self.smashed();
        smashed.widen_with_thresholds(rhs.smashed(), thresholds);
        *self = Self::from(smashed);
    }
}

impl<D, P> NumericalDomain for PowersetDomain<D, P>
where
    D: NumericalDomain,
    P: PowersetParams,
{
    type Var = D::Var;

    fn assign(&mut self, x: D::Var, e: &LinearExpression<D::Var>) {
        self.transform(|d| d.assign(x.clone(), e));
    }

    fn apply(&mut self, op: Op, x: D::Var, y: &D::Var, z: &D::Var) {
        self.transform(|d| d.apply(op, x.clone(), y, z));
    }

    fn apply_constant(&mut self, op: Op, x: D::Var, y: &D::Var, k: Number) {
        self.transform(|d| d.apply_constant(op, x.clone(), y, k));
    }

    fn assume(&mut self, csts: &LinearConstraintSystem<D::Var>) {
        self.refine(|d| d.assume(csts));
    }

    fn forget(&mut self, v: &D::Var) {
        self.transform(|d| d.forget(v));
    }

    fn expand(&mut self, x: &D::Var, y: D::Var) {
        self.transform(|d| d.expand(x, y.clone()));
    }

    fn rename(&mut self, from: &[D::Var], to: &[D::Var]) {
        self.transform(|d| d.rename(from, to));
    }

    fn project(&mut self, vars: &[D::Var]) {
        self.transform(|d| d.project(vars));
    }

    fn set(&mut self, v: D::Var, value: Interval) {
        if value.is_bottom() {
            *self = Self::bottom();
        } else {
            self.transform(|d| d.set(v.clone(), value));
        }
    }

    fn get(&self, v: &D::Var) -> Interval {
        let mut res = Interval::bottom();
        for d in &self.disjuncts {
            res.join_with(d.get(v));
        }
        res
    }

    fn to_constraints(&self) -> LinearConstraintSystem<D::Var> {
        if self.disjuncts.len() > 1 {
            warn!("powerset: exporting constraints smashes the disjunction");
        }
        self.smashed().to_constraints()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatype::IntervalEnvironment;

    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    struct SmallParams;

    impl PowersetParams for SmallParams {
        const MAX_DISJUNCTS: usize = 3;
        const EXACT_MEET: bool = true;
    }

    type Env = IntervalEnvironment<&'static str>;
    type Pow = PowersetDomain<Env, SmallParams>;

    fn env(v: &'static str, lo: Number, hi: Number) -> Pow {
        let mut e = Env::top();
        e.set(v, Interval::finite(lo, hi));
        Pow::from(e)
    }

    #[test]
    fn test_smashing_over_the_cap() {
        let mut p = env("x", 0, 1);
        p.join_with(env("x", 10, 11));
        p.join_with(env("x", 20, 21));
        assert_eq!(p.disjuncts().len(), 3);
        assert_eq!(p.get(&"x"), Interval::finite(0, 21));

        p.join_with(env("x", 30, 31));
        assert_eq!(p.disjuncts().len(), 1);
        assert_eq!(p.get(&"x"), Interval::finite(0, 31));
    }

    #[test]
    fn test_join_drops_subsumed() {
        let mut p = env("x", 0, 10);
        p.join_with(env("x", 2, 5));
        assert_eq!(p.disjuncts().len(), 1);
    }

    #[test]
    fn test_exact_meet_prunes_unreachable_pairs() {
        let mut left = env("x", 0, 1);
        left.join_with(env("x", 10, 11));
        let right = env("x", 1, 10);
        left.meet_with(right);
        assert_eq!(left.disjuncts().len(), 2);
        assert_eq!(left.get(&"x"), Interval::finite(1, 10));
    }

    #[test]
    fn test_refinement_to_bottom() {
        let mut p = env("x", 0, 5);
        p.join_with(env("x", 10, 15));
        p.assume(
            &crate::datatype::LinearConstraint::greater_or_equal(
                LinearExpression::variable("x"),
                LinearExpression::constant(20),
            )
            .into(),
        );
        assert!(p.is_bottom());
    }

    #[test]
    fn test_lattice_constants() {
        assert!(Pow::bottom().is_bottom());
        assert!(Pow::top().is_top());
        assert!(Pow::bottom().leq(&Pow::top()));
        let p = env("x", 0, 1);
        assert_eq!(p.clone().join(Pow::bottom()), p);
    }
}
