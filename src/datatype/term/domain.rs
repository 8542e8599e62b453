/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The term-equivalence (anti-unification) domain.
//!
//! Lifts a numerical value domain with congruence reasoning over symbolic
//! terms: every program variable is bound to a term in a hash-consed table,
//! and every term that carries numeric information owns a surrogate variable
//! in the underlying domain. Two variables bound to the same term are known
//! equal for free; all numeric reasoning is delegated to the underlying
//! domain over the surrogates. Lattice operations first anti-unify the two
//! sides' term shapes, realign the numeric states to the generalized
//! surrogate vocabulary, and only then combine them below.

use std::collections::BTreeSet;
use std::fmt::Debug;
use std::fmt::Display;
use std::hash::Hash;

use im::OrdMap;
use im::OrdSet;
use log::warn;

use crate::datatype::AbstractDomain;
use crate::datatype::GeneralizeMap;
use crate::datatype::Interval;
use crate::datatype::LeqMap;
use crate::datatype::LinearConstraint;
use crate::datatype::LinearConstraintSystem;
use crate::datatype::LinearExpression;
use crate::datatype::Number;
use crate::datatype::NumericalDomain;
use crate::datatype::Op;
use crate::datatype::Term;
use crate::datatype::TermId;
use crate::datatype::TermTable;
use crate::datatype::Thresholds;

/// A variable of the underlying domain standing for one term's value.
///
/// Surrogates compare structurally; the tag partitions the namespace so that
/// names drawn for a combined state can never collide with either ancestor's.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Surrogate {
    tag: u64,
    index: u32,
}

impl Display for Surrogate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "${}.{}", self.tag, self.index)
    }
}

/// Monotonic surrogate allocator.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct SurrogateAlloc {
    tag: u64,
    next: u32,
}

impl SurrogateAlloc {
    pub fn next(&mut self) -> Surrogate {
        let s = Surrogate {
            tag: self.tag,
            index: self.next,
        };
        self.next += 1;
        s
    }

    /// An allocator for a state combined from two operands. Its tag sits
    /// strictly above both, keeping fresh surrogates disjoint from anything
    /// either side has allocated.
    pub fn for_pair(a: &SurrogateAlloc, b: &SurrogateAlloc) -> SurrogateAlloc {
        SurrogateAlloc {
            tag: a.tag.max(b.tag) + 1,
            next: 0,
        }
    }
}

/// The term domain over program variables `V` and value domain `D`.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct TermDomain<V, D>
where
    V: Clone + Eq + Hash + Ord + Debug,
    D: NumericalDomain<Var = Surrogate>,
{
    is_bottom: bool,
    ttbl: TermTable,
    base: D,
    alloc: SurrogateAlloc,
    var_map: OrdMap<V, TermId>,
    term_map: OrdMap<TermId, Surrogate>,
    changed: OrdSet<TermId>,
}

/// The term domain over the interval environment, the default instantiation.
pub type IntervalTermDomain<V> =
    TermDomain<V, crate::datatype::IntervalEnvironment<Surrogate>>;

enum CombineKind<'a> {
    Join,
    Widen(Option<&'a Thresholds>),
    Meet,
}

impl<V, D> TermDomain<V, D>
where
    V: Clone + Eq + Hash + Ord + Debug,
    D: NumericalDomain<Var = Surrogate>,
{
    fn term_of_var(&mut self, v: &V) -> TermId {
        match self.var_map.get(v) {
            Some(&t) => t,
            None => {
                // An unseen variable is unconstrained: bind it to a fresh
                // free term.
                let t = self.ttbl.fresh_var();
                self.var_map.insert(v.clone(), t);
                t
            }
        }
    }

    fn surrogate_of_term(&mut self, t: TermId) -> Surrogate {
        match self.term_map.get(&t) {
            Some(&s) => s,
            None => {
                let s = self.alloc.next();
                self.term_map.insert(t, s);
                s
            }
        }
    }

    fn surrogate_of_var(&mut self, v: &V) -> Surrogate {
        let t = self.term_of_var(v);
        self.surrogate_of_term(t)
    }

    fn rebind_var(&mut self, x: V, t: TermId) {
        self.var_map.insert(x, t);
    }

    fn build_const(&mut self, n: Number) -> TermId {
        if let Some(t) = self.ttbl.find_const(n) {
            return t;
        }
        let t = self.ttbl.make_const(n);
        let s = self.surrogate_of_term(t);
        self.base.assign(s, &LinearExpression::constant(n));
        t
    }

    /// The unique application term for `op(a, b)`. A pre-existing term
    /// already had its surrogate evaluated, so no numeric work is done; on
    /// creation the underlying transfer establishes the surrogate's value.
    fn build_term(&mut self, op: Op, a: TermId, b: TermId) -> TermId {
        if let Some(t) = self.ttbl.find_app(op, a, b) {
            return t;
        }
        let t = self.ttbl.apply_ftor(op, a, b);
        let st = self.surrogate_of_term(t);
        let sa = self.surrogate_of_term(a);
        let sb = self.surrogate_of_term(b);
        self.base.apply(op, st, &sa, &sb);
        t
    }

    fn build_linterm(&mut self, coefficient: Number, v: &V) -> TermId {
        let c = self.build_const(coefficient);
        let t = self.term_of_var(v);
        self.build_term(Op::Mul, c, t)
    }

    /// Term for a linear expression. A constant or a bare variable maps to
    /// its own term; anything else is folded into a sum of scaled terms.
    fn build_linexpr(&mut self, e: &LinearExpression<V>) -> TermId {
        if e.is_constant() {
            return self.build_const(e.constant_term());
        }
        if let Some(v) = e.as_variable() {
            let v = v.clone();
            return self.term_of_var(&v);
        }
        let terms: Vec<(V, Number)> = e.terms().map(|(v, c)| (v.clone(), c)).collect();
        let mut acc = self.build_const(e.constant_term());
        for (v, c) in terms {
            let t = self.build_linterm(c, &v);
            acc = self.build_term(Op::Add, acc, t);
        }
        acc
    }

    /// Term carrying an interval of values; a singleton is a constant.
    fn term_of_interval(&mut self, value: Interval) -> TermId {
        if let Some(n) = value.singleton() {
            return self.build_const(n);
        }
        let t = self.ttbl.fresh_var();
        let s = self.surrogate_of_term(t);
        self.base.set(s, value);
        t
    }

    pub fn is_normalized(&self) -> bool {
        self.changed.is_empty()
    }

    /// Self-check of the binding invariant: every term a variable is bound
    /// to exists in the table. A violation is a bug in the domain, not in
    /// the client, so this only fires in debug builds.
    fn check_terms(&self) {
        debug_assert!(
            self.var_map.values().all(|&t| self.ttbl.contains(t)),
            "variable bound to a term outside the table"
        );
    }

    /// Re-establish the term/value invariant: every term's surrogate agrees
    /// with its functor applied to its children's surrogates. Information
    /// flows from the changed terms first down to their children through
    /// inverse transfers, then up to their parents through forward
    /// transfers; a refinement is adopted only when strictly tighter, so the
    /// propagation terminates.
    pub fn normalize(&mut self) {
        if self.is_bottom || self.changed.is_empty() {
            return;
        }
        let mut changed: BTreeSet<TermId> = self.changed.iter().copied().collect();
        self.changed.clear();

        let mut queue: Vec<Vec<TermId>> = Vec::new();
        for &t in &changed {
            Self::queue_push(&mut queue, self.ttbl.depth(t), t);
        }

        // Downward pass, highest depth first.
        for d in (1..queue.len()).rev() {
            let mut i = 0;
            while i < queue[d].len() {
                let t = queue[d][i];
                i += 1;
                let &Term::App(op, a, b) = self.ttbl.term(t) else {
                    continue;
                };
                let st = self.surrogate_of_term(t);
                let sa = self.surrogate_of_term(a);
                let sb = self.surrogate_of_term(b);
                let mut refined = self.base.clone();
                inverse_transfer(&mut refined, &mut self.alloc, op, st, sa, sb);
                if !self.base.leq(&refined) {
                    self.base = refined;
                    for c in [a, b] {
                        if changed.insert(c) {
                            Self::queue_push(&mut queue, self.ttbl.depth(c), c);
                        }
                    }
                }
            }
        }

        // Upward pass over the parents of everything that changed, lowest
        // depth first.
        let mut up_seen: BTreeSet<TermId> = BTreeSet::new();
        let mut up_queue: Vec<Vec<TermId>> = Vec::new();
        for &t in &changed {
            for p in self.ttbl.parents(t) {
                if up_seen.insert(p) {
                    Self::queue_push(&mut up_queue, self.ttbl.depth(p), p);
                }
            }
        }
        for d in 1..up_queue.len() {
            let mut i = 0;
            while i < up_queue[d].len() {
                let t = up_queue[d][i];
                i += 1;
                let &Term::App(op, a, b) = self.ttbl.term(t) else {
                    continue;
                };
                let st = self.surrogate_of_term(t);
                let sa = self.surrogate_of_term(a);
                let sb = self.surrogate_of_term(b);
                let mut refined = self.base.clone();
                refined.apply(op, st, &sa, &sb);
                if !self.base.leq(&refined) {
                    self.base = refined;
                    let parents: Vec<TermId> = self.ttbl.parents(t).collect();
                    for p in parents {
                        if up_seen.insert(p) {
                            Self::queue_push(&mut up_queue, self.ttbl.depth(p), p);
                        }
                    }
                }
            }
        }

        if self.base.is_bottom() {
            self.is_bottom = true;
        }
    }

    fn queue_push(queue: &mut Vec<Vec<TermId>>, depth: u32, t: TermId) {
        let depth = depth as usize;
        while queue.len() <= depth {
            queue.push(Vec::new());
        }
        queue[depth].push(t);
    }

    /// Generalization-based combination: anti-unify each variable's term
    /// pair into a fresh table, realign both sides' numeric states to the
    /// generalized surrogate vocabulary, and combine them in the underlying
    /// domain. A variable bound on only one side is dropped (top).
    fn combined(&self, rhs: &Self, kind: CombineKind) -> Self {
        let mut lhs = self.clone();
        let mut rhs = rhs.clone();
        match kind {
            CombineKind::Join | CombineKind::Meet => {
                lhs.normalize();
                rhs.normalize();
            }
            // The accumulated side of a widening must stay un-tightened or
            // termination is lost; only the incoming side is normalized.
            CombineKind::Widen(_) => rhs.normalize(),
        }

        if matches!(kind, CombineKind::Meet) {
            if lhs.is_bottom() || rhs.is_bottom() {
                return Self::bottom();
            }
            if lhs.is_top() {
                return rhs;
            }
            if rhs.is_top() {
                return lhs;
            }
        } else {
            if lhs.is_bottom() || rhs.is_top() {
                return rhs;
            }
            if rhs.is_bottom() || lhs.is_top() {
                return lhs;
            }
        }

        let mut out_tbl = TermTable::default();
        let mut gener_map = GeneralizeMap::new();
        let mut out_vmap: OrdMap<V, TermId> = OrdMap::new();
        for (v, &t_l) in lhs.var_map.iter() {
            let Some(&t_r) = rhs.var_map.get(v) else {
                continue;
            };
            let t_out = lhs
                .ttbl
                .generalize(&rhs.ttbl, t_l, t_r, &mut out_tbl, &mut gener_map);
            out_vmap.insert(v.clone(), t_out);
        }

        // Rename the generalized terms' surrogates together, then drop the
        // originals, so both numeric states speak the output vocabulary.
        let mut palloc = SurrogateAlloc::for_pair(&lhs.alloc, &rhs.alloc);
        let mut out_tmap: OrdMap<TermId, Surrogate> = OrdMap::new();
        let mut l_impl = lhs.base.clone();
        let mut r_impl = rhs.base.clone();
        let mut l_olds: Vec<Surrogate> = Vec::new();
        let mut r_olds: Vec<Surrogate> = Vec::new();
        for (&(t_l, t_r), &t_out) in &gener_map {
            let vt = palloc.next();
            out_tmap.insert(t_out, vt);
            if let Some(&s) = lhs.term_map.get(&t_l) {
                l_impl.assign(vt, &LinearExpression::variable(s));
                l_olds.push(s);
            }
            if let Some(&s) = rhs.term_map.get(&t_r) {
                r_impl.assign(vt, &LinearExpression::variable(s));
                r_olds.push(s);
            }
        }
        for s in &l_olds {
            l_impl.forget(s);
        }
        for s in &r_olds {
            r_impl.forget(s);
        }

        let out_impl = match kind {
            CombineKind::Join => l_impl.join(r_impl),
            CombineKind::Widen(None) => l_impl.widen(r_impl),
            CombineKind::Widen(Some(thresholds)) => {
                let mut widened = l_impl;
                widened.widen_with_thresholds(r_impl, thresholds);
                widened
            }
            CombineKind::Meet => l_impl.meet(r_impl),
        };

        TermDomain {
            is_bottom: out_impl.is_bottom(),
            ttbl: out_tbl,
            base: out_impl,
            alloc: palloc,
            var_map: out_vmap,
            term_map: out_tmap,
            changed: OrdSet::new(),
        }
    }
}

/// Inverse transfer of `t := a op b`: refine the children's surrogates from
/// the parent's. Addition and subtraction invert exactly through their
/// defining constraint; a product refines a factor by the quotient when the
/// other factor cannot be zero; division and the bitwise functors do not
/// propagate downward.
fn inverse_transfer<D: NumericalDomain<Var = Surrogate>>(
    dom: &mut D,
    alloc: &mut SurrogateAlloc,
    op: Op,
    st: Surrogate,
    sa: Surrogate,
    sb: Surrogate,
) {
    match op {
        Op::Add => {
            dom.assume(
                &LinearConstraint::equality(
                    LinearExpression::variable(st),
                    LinearExpression::variable(sa) + LinearExpression::variable(sb),
                )
                .into(),
            );
        }
        Op::Sub => {
            dom.assume(
                &LinearConstraint::equality(
                    LinearExpression::variable(st),
                    LinearExpression::variable(sa) - LinearExpression::variable(sb),
                )
                .into(),
            );
        }
        Op::Mul => {
            // t = a*b with b != 0 forces a = t/b exactly, and the truncated
            // quotient hull contains every exact quotient.
            if !dom.get(&sb).contains(0) {
                let u = alloc.next();
                dom.apply(Op::Div, u, &st, &sb);
                dom.assume(
                    &LinearConstraint::equality(
                        LinearExpression::variable(sa),
                        LinearExpression::variable(u),
                    )
                    .into(),
                );
                dom.forget(&u);
            }
            if !dom.get(&sa).contains(0) {
                let u = alloc.next();
                dom.apply(Op::Div, u, &st, &sa);
                dom.assume(
                    &LinearConstraint::equality(
                        LinearExpression::variable(sb),
                        LinearExpression::variable(u),
                    )
                    .into(),
                );
                dom.forget(&u);
            }
        }
        _ => {}
    }
}

impl<V, D> AbstractDomain for TermDomain<V, D>
where
    V: Clone + Eq + Hash + Ord + Debug,
    D: NumericalDomain<Var = Surrogate>,
{
    fn bottom() -> Self {
        TermDomain {
            is_bottom: true,
            ttbl: TermTable::default(),
            base: D::top(),
            alloc: SurrogateAlloc::default(),
            var_map: OrdMap::new(),
            term_map: OrdMap::new(),
            changed: OrdSet::new(),
        }
    }

    fn top() -> Self {
        TermDomain {
            is_bottom: false,
            ttbl: TermTable::default(),
            base: D::top(),
            alloc: SurrogateAlloc::default(),
            var_map: OrdMap::new(),
            term_map: OrdMap::new(),
            changed: OrdSet::new(),
        }
    }

    fn is_bottom(&self) -> bool {
        self.is_bottom || self.base.is_bottom()
    }

    fn is_top(&self) -> bool {
        !self.is_bottom() && self.var_map.is_empty()
    }

    /// Sound but incomplete: embeds `rhs`'s term shapes into ours via
    /// [`TermTable::map_leq`], realigns the two numeric states over the
    /// mapped pairs and compares them below. Any shape mismatch (or a
    /// variable bound only on the right) answers `false`.
    fn leq(&self, rhs: &Self) -> bool {
        if self.is_bottom() {
            return true;
        }
        if rhs.is_bottom() {
            return false;
        }
        let mut lhs = self.clone();
        lhs.normalize();
        if lhs.is_bottom() {
            return true;
        }

        let mut map = LeqMap::new();
        for (v, &t_l) in lhs.var_map.iter() {
            let Some(&t_r) = rhs.var_map.get(v) else {
                continue;
            };
            if !lhs.ttbl.map_leq(&rhs.ttbl, t_l, t_r, &mut map) {
                return false;
            }
        }
        for v in rhs.var_map.keys() {
            if !lhs.var_map.contains_key(v) {
                return false;
            }
        }

        let mut palloc = SurrogateAlloc::for_pair(&lhs.alloc, &rhs.alloc);
        let mut l_impl = lhs.base.clone();
        let mut r_impl = rhs.base.clone();
        let mut l_olds: Vec<Surrogate> = Vec::new();
        let mut r_olds: Vec<Surrogate> = Vec::new();
        for (&t_r, &t_l) in &map {
            let vt = palloc.next();
            if let Some(&s) = lhs.term_map.get(&t_l) {
                l_impl.assign(vt, &LinearExpression::variable(s));
                l_olds.push(s);
            }
            if let Some(&s) = rhs.term_map.get(&t_r) {
                r_impl.assign(vt, &LinearExpression::variable(s));
                r_olds.push(s);
            }
        }
        for s in &l_olds {
            l_impl.forget(s);
        }
        for s in &r_olds {
            r_impl.forget(s);
        }
        l_impl.leq(&r_impl)
    }

    fn join_with(&mut self, rhs: Self) {
        *self = self.combined(&rhs, CombineKind::Join);
    }

    fn meet_with(&mut self, rhs: Self) {
        *self = self.combined(&rhs, CombineKind::Meet);
    }

    fn widen_with(&mut self, rhs: Self) {
        *self = self.combined(&rhs, CombineKind::Widen(None));
    }

    fn widen_with_thresholds(&mut self, rhs: Self, thresholds: &Thresholds) {
        *self = self.combined(&rhs, CombineKind::Widen(Some(thresholds)));
    }

    /// No narrowing is available for term equivalences; the state is kept
    /// unchanged, which is sound because the fixpoint iterator caps its
    /// descending iterations.
    fn narrow_with(&mut self, rhs: Self) {
        if self.is_bottom() || rhs.is_bottom() {
            *self = Self::bottom();
            return;
        }
        if self.is_top() {
            *self = rhs;
            return;
        }
        warn!("term domain: narrowing is not implemented, keeping the left state");
    }
}

impl<V, D> NumericalDomain for TermDomain<V, D>
where
    V: Clone + Eq + Hash + Ord + Debug,
    D: NumericalDomain<Var = Surrogate>,
{
    type Var = V;

    fn assign(&mut self, x: V, e: &LinearExpression<V>) {
        if self.is_bottom() {
            return;
        }
        let t = self.build_linexpr(e);
        self.rebind_var(x, t);
        self.check_terms();
    }

    fn apply(&mut self, op: Op, x: V, y: &V, z: &V) {
        if self.is_bottom() {
            return;
        }
        if op.is_bitwise() {
            // No term structure for bitwise functors; bind a fresh term and
            // let the underlying domain do what it can.
            warn!("term domain: {} has no term structure, binding a fresh term", op);
            let sy = self.surrogate_of_var(y);
            let sz = self.surrogate_of_var(z);
            let t = self.ttbl.fresh_var();
            let s = self.surrogate_of_term(t);
            self.base.apply(op, s, &sy, &sz);
            self.rebind_var(x, t);
            return;
        }
        let ty = self.term_of_var(y);
        let tz = self.term_of_var(z);
        let t = self.build_term(op, ty, tz);
        self.rebind_var(x, t);
        self.check_terms();
    }

    fn apply_constant(&mut self, op: Op, x: V, y: &V, k: Number) {
        if self.is_bottom() {
            return;
        }
        if op.is_bitwise() {
            warn!("term domain: {} has no term structure, binding a fresh term", op);
            let sy = self.surrogate_of_var(y);
            let t = self.ttbl.fresh_var();
            let s = self.surrogate_of_term(t);
            self.base.apply_constant(op, s, &sy, k);
            self.rebind_var(x, t);
            return;
        }
        let ty = self.term_of_var(y);
        let tk = self.build_const(k);
        let t = self.build_term(op, ty, tk);
        self.rebind_var(x, t);
        self.check_terms();
    }

    fn assume(&mut self, csts: &LinearConstraintSystem<V>) {
        if self.is_bottom() {
            return;
        }
        let mut renamed: LinearConstraintSystem<Surrogate> = LinearConstraintSystem::new();
        for cst in csts.iter() {
            let vars: Vec<V> = cst.variables().cloned().collect();
            for v in &vars {
                let t = self.term_of_var(v);
                self.surrogate_of_term(t);
                self.changed.insert(t);
            }
            if let Some(r) = cst.try_rename(|v| {
                self.var_map
                    .get(v)
                    .and_then(|t| self.term_map.get(t))
                    .copied()
            }) {
                renamed.push(r);
            }
        }
        self.base.assume(&renamed);
        self.normalize();
        if self.base.is_bottom() {
            self.is_bottom = true;
        }
    }

    /// Drops the binding; the term's surrogate is only released once no
    /// other variable is bound to the same term, so aliases keep their
    /// value.
    fn forget(&mut self, v: &V) {
        let Some(t) = self.var_map.remove(v) else {
            return;
        };
        if !self.var_map.values().any(|&t2| t2 == t) {
            if let Some(s) = self.term_map.remove(&t) {
                self.base.forget(&s);
            }
        }
    }

    /// Term-level sharing: `y` is bound to `x`'s term, no numeric work.
    fn expand(&mut self, x: &V, y: V) {
        if self.is_bottom() {
            return;
        }
        let t = self.term_of_var(x);
        self.rebind_var(y, t);
    }

    fn rename(&mut self, from: &[V], to: &[V]) {
        debug_assert_eq!(from.len(), to.len());
        let bindings: Vec<Option<TermId>> = from.iter().map(|v| self.var_map.remove(v)).collect();
        for (t, binding) in to.iter().zip(bindings) {
            if let Some(binding) = binding {
                self.var_map.insert(t.clone(), binding);
            }
        }
    }

    fn project(&mut self, vars: &[V]) {
        let dropped: Vec<V> = self
            .var_map
            .keys()
            .filter(|v| !vars.contains(*v))
            .cloned()
            .collect();
        for v in dropped {
            self.forget(&v);
        }
    }

    fn set(&mut self, x: V, value: Interval) {
        if self.is_bottom() {
            return;
        }
        if value.is_bottom() {
            self.is_bottom = true;
            return;
        }
        let t = self.term_of_interval(value);
        self.rebind_var(x, t);
    }

    fn get(&self, v: &V) -> Interval {
        if self.is_bottom() {
            return Interval::bottom();
        }
        if !self.changed.is_empty() {
            // Pending propagation; query a normalized copy for accuracy.
            let mut normalized = self.clone();
            normalized.normalize();
            return normalized.get(v);
        }
        match self
            .var_map
            .get(v)
            .and_then(|t| self.term_map.get(t))
        {
            Some(s) => self.base.get(s),
            None => Interval::top(),
        }
    }

    /// Export in the program-variable vocabulary: project the underlying
    /// state onto the surrogates visible through the variable map, rename
    /// them back, and add one equality per pair of variables sharing a term.
    fn to_constraints(&self) -> LinearConstraintSystem<V> {
        let mut out = LinearConstraintSystem::new();
        if self.is_bottom() {
            out.push(LinearConstraint::equality(
                LinearExpression::constant(1),
                LinearExpression::constant(0),
            ));
            return out;
        }

        let mut rev_map: OrdMap<Surrogate, V> = OrdMap::new();
        let mut seen: OrdMap<TermId, V> = OrdMap::new();
        let mut equivalences: Vec<(V, V)> = Vec::new();
        for (v, &t) in self.var_map.iter() {
            match seen.get(&t) {
                None => {
                    seen.insert(t, v.clone());
                    if let Some(&s) = self.term_map.get(&t) {
                        rev_map.insert(s, v.clone());
                    }
                }
                Some(first) => equivalences.push((first.clone(), v.clone())),
            }
        }

        let live: Vec<Surrogate> = rev_map.keys().copied().collect();
        let mut visible = self.base.clone();
        visible.project(&live);
        for cst in visible.to_constraints() {
            // Constraints mentioning internal surrogates are artifacts.
            if let Some(renamed) = cst.try_rename(|s| rev_map.get(s).cloned()) {
                out.push(renamed);
            }
        }
        for (a, b) in equivalences {
            out.push(LinearConstraint::equality(
                LinearExpression::variable(a),
                LinearExpression::variable(b),
            ));
        }
        out
    }
}

impl<V, D> Display for TermDomain<V, D>
where
    V: Clone + Eq + Hash + Ord + Debug + Display,
    D: NumericalDomain<Var = Surrogate> + Display,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_bottom() {
            return write!(f, "_|_");
        }
        if self.var_map.is_empty() {
            return write!(f, "{{}}");
        }
        write!(f, "{{")?;
        let mut first = true;
        for (v, &t) in self.var_map.iter() {
            if !first {
                write!(f, ", ")?;
            }
            first = false;
            write!(f, "{} -> {}", v, t)?;
            if let Some(s) = self.term_map.get(&t) {
                write!(f, "[{}]", s)?;
            }
        }
        write!(f, "}} {}", self.base)
    }
}
