/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::collections::BTreeMap;
use std::fmt::Display;

use im::OrdSet;
use im::Vector;

use crate::datatype::Number;
use crate::datatype::Op;

/// Identifier of a term within one [`TermTable`]. Ids are arena indices;
/// they are only meaningful relative to their table.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct TermId(u32);

impl TermId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

impl Display for TermId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// A symbolic term: an integer constant, a free variable, or a binary
/// functor application.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Term {
    Const(Number),
    Var,
    App(Op, TermId, TermId),
}

#[derive(Clone, PartialEq, Eq, Debug)]
struct TermData {
    term: Term,
    depth: u32,
    parents: OrdSet<TermId>,
}

/// A hash-consed DAG of terms.
///
/// Constants and applications are interned: building the same shape twice
/// yields the same id, so id equality is term equality. Free variables are
/// never shared. Every term records its parents (the applications referencing
/// it as a child) and its depth, both consumed by the term domain's
/// normalization.
///
/// The arena is backed by persistent vectors: a domain value clones its table
/// on every lattice operation, and the clone shares structure until mutated.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct TermTable {
    terms: Vector<TermData>,
    const_index: im::HashMap<Number, TermId>,
    app_index: im::HashMap<(Op, TermId, TermId), TermId>,
}

/// Mapping extended by [`TermTable::map_leq`]: term of the other table to
/// term of this table.
pub type LeqMap = BTreeMap<TermId, TermId>;

/// Memoization of [`TermTable::generalize`]: pair (mine, other) to the
/// generalized term in the output table.
pub type GeneralizeMap = BTreeMap<(TermId, TermId), TermId>;

impl TermTable {
    pub fn size(&self) -> usize {
        self.terms.len()
    }

    pub fn contains(&self, t: TermId) -> bool {
        t.index() < self.terms.len()
    }

    pub fn term(&self, t: TermId) -> &Term {
        &self.terms[t.index()].term
    }

    pub fn depth(&self, t: TermId) -> u32 {
        self.terms[t.index()].depth
    }

    pub fn parents(&self, t: TermId) -> impl Iterator<Item = TermId> + '_ {
        self.terms[t.index()].parents.iter().copied()
    }

    fn push(&mut self, term: Term, depth: u32) -> TermId {
        let id = TermId(self.terms.len() as u32);
        self.terms.push_back(TermData {
            term,
            depth,
            parents: OrdSet::new(),
        });
        id
    }

    pub fn find_const(&self, n: Number) -> Option<TermId> {
        self.const_index.get(&n).copied()
    }

    pub fn find_app(&self, op: Op, a: TermId, b: TermId) -> Option<TermId> {
        self.app_index.get(&(op, a, b)).copied()
    }

    /// Interned constant.
    pub fn make_const(&mut self, n: Number) -> TermId {
        if let Some(t) = self.find_const(n) {
            return t;
        }
        let t = self.push(Term::Const(n), 0);
        self.const_index.insert(n, t);
        t
    }

    /// A fresh free variable; never shared.
    pub fn fresh_var(&mut self) -> TermId {
        self.push(Term::Var, 0)
    }

    /// Interned application; on creation the new term is registered as a
    /// parent of both children.
    pub fn apply_ftor(&mut self, op: Op, a: TermId, b: TermId) -> TermId {
        if let Some(t) = self.find_app(op, a, b) {
            return t;
        }
        let depth = 1 + self.depth(a).max(self.depth(b));
        let t = self.push(Term::App(op, a, b), depth);
        self.app_index.insert((op, a, b), t);
        self.terms[a.index()].parents.insert(t);
        self.terms[b.index()].parents.insert(t);
        t
    }

    /// Try to extend `map` so that the term rooted at `t_other` in `other`
    /// embeds into this table at `t_mine`.
    ///
    /// A free variable of `other` matches any term of this table; everything
    /// else must match structurally. Bindings are congruent: a term of
    /// `other` already bound must map to the same term again.
    pub fn map_leq(
        &self,
        other: &TermTable,
        t_mine: TermId,
        t_other: TermId,
        map: &mut LeqMap,
    ) -> bool {
        if let Some(&bound) = map.get(&t_other) {
            return bound == t_mine;
        }
        let matches = match (self.term(t_mine), other.term(t_other)) {
            (_, Term::Var) => true,
            (Term::Const(a), Term::Const(b)) => a == b,
            (&Term::App(op_a, a1, a2), &Term::App(op_b, b1, b2)) => {
                op_a == op_b
                    && self.map_leq(other, a1, b1, map)
                    && self.map_leq(other, a2, b2, map)
            }
            _ => false,
        };
        if matches {
            map.insert(t_other, t_mine);
        }
        matches
    }

    /// Anti-unification of `t_mine` (here) and `t_other` (in `other`) into
    /// `out`: equal constants and same-functor applications are kept,
    /// recursing structurally; any disagreement becomes a fresh variable.
    /// `map` memoizes pairs so shared structure stays shared.
    pub fn generalize(
        &self,
        other: &TermTable,
        t_mine: TermId,
        t_other: TermId,
        out: &mut TermTable,
        map: &mut GeneralizeMap,
    ) -> TermId {
        if let Some(&t) = map.get(&(t_mine, t_other)) {
            return t;
        }
        let t_out = match (self.term(t_mine), other.term(t_other)) {
            (&Term::Const(a), &Term::Const(b)) if a == b => out.make_const(a),
            (&Term::App(op_a, a1, a2), &Term::App(op_b, b1, b2)) if op_a == op_b => {
                let c1 = self.generalize(other, a1, b1, out, map);
                let c2 = self.generalize(other, a2, b2, out, map);
                out.apply_ftor(op_a, c1, c2)
            }
            _ => out.fresh_var(),
        };
        map.insert((t_mine, t_other), t_out);
        t_out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_consing() {
        let mut tbl = TermTable::default();
        let c5 = tbl.make_const(5);
        assert_eq!(tbl.make_const(5), c5);
        let v = tbl.fresh_var();
        assert_ne!(tbl.fresh_var(), v);
        let app = tbl.apply_ftor(Op::Add, c5, v);
        assert_eq!(tbl.apply_ftor(Op::Add, c5, v), app);
        assert_ne!(tbl.apply_ftor(Op::Add, v, c5), app);
        assert_eq!(tbl.find_app(Op::Add, c5, v), Some(app));
        assert_eq!(tbl.find_app(Op::Mul, c5, v), None);
    }

    #[test]
    fn test_depth_and_parents() {
        let mut tbl = TermTable::default();
        let a = tbl.fresh_var();
        let b = tbl.fresh_var();
        let sum = tbl.apply_ftor(Op::Add, a, b);
        let prod = tbl.apply_ftor(Op::Mul, sum, a);
        assert_eq!(tbl.depth(a), 0);
        assert_eq!(tbl.depth(sum), 1);
        assert_eq!(tbl.depth(prod), 2);
        let parents_of_a: Vec<_> = tbl.parents(a).collect();
        assert_eq!(parents_of_a, vec![sum, prod]);
        assert_eq!(tbl.parents(prod).count(), 0);
    }

    #[test]
    fn test_map_leq_binds_variables() {
        let mut mine = TermTable::default();
        let x = mine.fresh_var();
        let c2 = mine.make_const(2);
        let mine_term = mine.apply_ftor(Op::Mul, c2, x);

        // The same shape with a free variable in place of the subterm.
        let mut other = TermTable::default();
        let y = other.fresh_var();
        let d2 = other.make_const(2);
        let other_term = other.apply_ftor(Op::Mul, d2, y);

        let mut map = LeqMap::new();
        assert!(mine.map_leq(&other, mine_term, other_term, &mut map));
        assert_eq!(map.get(&y), Some(&x));

        // A variable already bound to x cannot rebind to the constant.
        let clash = other.apply_ftor(Op::Mul, y, y);
        let mine_clash = mine.apply_ftor(Op::Mul, x, c2);
        assert!(!mine.map_leq(&other, mine_clash, clash, &mut map));
    }

    #[test]
    fn test_map_leq_structure_mismatch() {
        let mut mine = TermTable::default();
        let c1 = mine.make_const(1);
        let mut other = TermTable::default();
        let d2 = other.make_const(2);
        let mut map = LeqMap::new();
        assert!(!mine.map_leq(&other, c1, d2, &mut map));
    }

    #[test]
    fn test_generalize_keeps_common_structure() {
        let mut left = TermTable::default();
        let lx = left.fresh_var();
        let lc = left.make_const(3);
        let lsum = left.apply_ftor(Op::Add, lx, lc);

        let mut right = TermTable::default();
        let ry = right.fresh_var();
        let rc = right.make_const(3);
        let rsum = right.apply_ftor(Op::Add, ry, rc);

        let mut out = TermTable::default();
        let mut map = GeneralizeMap::new();
        let g = left.generalize(&right, lsum, rsum, &mut out, &mut map);
        let &Term::App(Op::Add, ga, gb) = out.term(g) else {
            panic!("expected an application");
        };
        assert_eq!(*out.term(ga), Term::Var);
        assert_eq!(*out.term(gb), Term::Const(3));
    }

    #[test]
    fn test_generalize_shares_via_memoization() {
        // x + x against y + y generalizes to v + v with a single fresh v.
        let mut left = TermTable::default();
        let lx = left.fresh_var();
        let lsum = left.apply_ftor(Op::Add, lx, lx);

        let mut right = TermTable::default();
        let ry = right.fresh_var();
        let rsum = right.apply_ftor(Op::Add, ry, ry);

        let mut out = TermTable::default();
        let mut map = GeneralizeMap::new();
        let g = left.generalize(&right, lsum, rsum, &mut out, &mut map);
        let &Term::App(Op::Add, ga, gb) = out.term(g) else {
            panic!("expected an application");
        };
        assert_eq!(ga, gb);
    }

    #[test]
    fn test_generalize_mismatch_is_fresh_var() {
        let mut left = TermTable::default();
        let lc = left.make_const(5);
        let mut right = TermTable::default();
        let ra = right.make_const(8);
        let rb = right.make_const(2);
        let rsum = right.apply_ftor(Op::Add, ra, rb);

        let mut out = TermTable::default();
        let mut map = GeneralizeMap::new();
        let g = left.generalize(&right, lc, rsum, &mut out, &mut map);
        assert_eq!(*out.term(g), Term::Var);
    }
}
