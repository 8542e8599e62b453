/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

use argus::datatype::AbstractDomain;
use argus::datatype::ConstraintKind;
use argus::datatype::Interval;
use argus::datatype::IntervalTermDomain;
use argus::datatype::LinearConstraint;
use argus::datatype::LinearExpression;
use argus::datatype::NumericalDomain;
use argus::datatype::Op;

type Var = &'static str;
type Dom = IntervalTermDomain<Var>;

fn var(v: Var) -> LinearExpression<Var> {
    LinearExpression::variable(v)
}

fn constant(n: i64) -> LinearExpression<Var> {
    LinearExpression::constant(n)
}

/*
 * Left:  ({w = a0, x = a0, y = '+'(a0, a1), z = a1}, {x = 5, w = 5, z = 3, y = 8})
 * Right: ({w = b0, x = '+'(b0, b1), y = b0, z = b1}, {y = 8, w = 8, z = 2, x = 10})
 *
 * Both sides tie the four variables to the same shapes modulo
 * anti-unification, but the numeric states disagree (x = 5 vs x = 10), so
 * the meet is bottom.
 */
#[test_log::test]
fn test_meet_of_inconsistent_equal_shapes_is_bottom() {
    let mut left = Dom::top();
    left.assign("x", &constant(5));
    left.assign("w", &var("x"));
    left.assign("z", &constant(3));
    left.apply(Op::Add, "y", &"x", &"z");
    assert_eq!(left.get(&"y"), Interval::constant(8));

    let mut right = Dom::top();
    right.assign("y", &constant(8));
    right.assign("w", &var("y"));
    right.assign("z", &constant(2));
    right.apply(Op::Add, "x", &"w", &"z");
    assert_eq!(right.get(&"x"), Interval::constant(10));

    let met = left.meet(right);
    assert!(met.is_bottom());
}

/*
 * Left:  x in [5, 8], w := x, z in [1, 10], y := x + z  (y in [6, 18])
 * Right: y in [2, 7], w := y, z in [3, 5],  x := w + z  (x in [5, 12])
 *
 * Meet: x in [5, 8], y in [6, 7], z in [3, 5], w in [5, 7].
 */
#[test]
fn test_meet_refines_intervals() {
    let mut left = Dom::top();
    left.set("x", Interval::finite(5, 8));
    left.assign("w", &var("x"));
    left.set("z", Interval::finite(1, 10));
    left.apply(Op::Add, "y", &"x", &"z");
    assert_eq!(left.get(&"y"), Interval::finite(6, 18));

    let mut right = Dom::top();
    right.set("y", Interval::finite(2, 7));
    right.assign("w", &var("y"));
    right.set("z", Interval::finite(3, 5));
    right.apply(Op::Add, "x", &"w", &"z");
    assert_eq!(right.get(&"x"), Interval::finite(5, 12));

    let met = left.meet(right);
    assert!(!met.is_bottom());
    assert_eq!(met.get(&"x"), Interval::finite(5, 8));
    assert_eq!(met.get(&"y"), Interval::finite(6, 7));
    assert_eq!(met.get(&"z"), Interval::finite(3, 5));
    assert_eq!(met.get(&"w"), Interval::finite(5, 7));
}

/*
 * v0 = 0, v1 = 1, x := v1 + v0, y := v0 + v1. The two sums are distinct
 * terms, yet assuming x == y must keep the state feasible, and assuming
 * x != y afterwards must collapse it.
 */
#[test]
fn test_equality_propagation() {
    let mut dom = Dom::top();
    dom.set("v0", Interval::constant(0));
    dom.set("v1", Interval::constant(1));
    dom.apply(Op::Add, "x", &"v1", &"v0");
    dom.apply(Op::Add, "y", &"v0", &"v1");
    assert_eq!(dom.get(&"x"), Interval::constant(1));
    assert_eq!(dom.get(&"y"), Interval::constant(1));

    dom.assume(&LinearConstraint::equality(var("x"), var("y")).into());
    assert!(!dom.is_bottom());

    dom.assume(&LinearConstraint::disequality(var("x"), var("y")).into());
    assert!(dom.is_bottom());
}

/*
 * y := x shares x's term, so constraining x constrains y. Forgetting y
 * drops only y's binding: the shared term keeps its value through x.
 */
#[test]
fn test_forget_drops_only_the_binding() {
    let mut dom = Dom::top();
    dom.assign("y", &var("x"));
    dom.assume(&LinearConstraint::greater_or_equal(var("x"), constant(10)).into());
    assert_eq!(dom.get(&"y"), Interval::at_least(10));
    assert_eq!(dom.get(&"x"), Interval::at_least(10));

    dom.forget(&"y");
    assert!(dom.get(&"y").is_top());
    assert_eq!(dom.get(&"x"), Interval::at_least(10));
}

/// Re-running the same assignment hits the interned terms and changes
/// nothing at all, not even surrogate names.
#[test]
fn test_assignment_is_deterministic() {
    let mut dom = Dom::top();
    let e = var("a") + constant(7);
    dom.assign("x", &e);
    let snapshot = dom.clone();
    dom.assign("x", &e);
    assert_eq!(dom, snapshot);
    assert_eq!(dom.get(&"x"), snapshot.get(&"x"));
}

/// After y := x and assume(x == z), all three variables answer the same
/// interval.
#[test]
fn test_congruence_after_assume() {
    let mut dom = Dom::top();
    dom.set("x", Interval::finite(5, 10));
    dom.assign("y", &var("x"));
    dom.assume(&LinearConstraint::equality(var("x"), var("z")).into());

    assert_eq!(dom.get(&"x"), Interval::finite(5, 10));
    assert_eq!(dom.get(&"y"), Interval::finite(5, 10));
    assert_eq!(dom.get(&"z"), Interval::finite(5, 10));
}

/// Join generalizes disagreeing constants to a variable but keeps the
/// sharing: both sides bind w to x's term, so the join does too, and the
/// exported constraints carry the equivalence.
#[test]
fn test_join_preserves_shared_structure() {
    let mut left = Dom::top();
    left.assign("x", &constant(3));
    left.assign("w", &var("x"));

    let mut right = Dom::top();
    right.assign("x", &constant(5));
    right.assign("w", &var("x"));

    let joined = left.join(right);
    assert_eq!(joined.get(&"x"), Interval::finite(3, 5));
    assert_eq!(joined.get(&"w"), Interval::finite(3, 5));

    let csts = joined.to_constraints();
    let equivalence = csts.iter().any(|cst| {
        cst.kind() == ConstraintKind::Equality
            && cst.expression().coefficient(&"w") != 0
            && cst.expression().coefficient(&"x") != 0
    });
    assert!(equivalence, "expected a w == x equivalence in {:?}", csts);
}

#[test]
fn test_leq_follows_generality() {
    let mut small = Dom::top();
    small.assign("x", &constant(5));

    let mut large = Dom::top();
    large.set("x", Interval::finite(0, 10));

    assert!(small.leq(&large));
    assert!(!large.leq(&small));
    assert!(Dom::bottom().leq(&small));
    assert!(small.leq(&Dom::top()));
}

#[test]
fn test_widening_stabilizes() {
    let mut a = Dom::top();
    a.set("x", Interval::finite(0, 0));
    let mut b = Dom::top();
    b.set("x", Interval::finite(0, 1));

    let widened = a.widen(b);
    assert_eq!(widened.get(&"x"), Interval::at_least(0));

    // Widening again with a larger state is a no-op.
    let mut c = Dom::top();
    c.set("x", Interval::finite(0, 100));
    let again = widened.clone().widen(c);
    assert_eq!(again.get(&"x"), Interval::at_least(0));
}

/// Narrowing is a sound no-op on the term domain.
#[test_log::test]
fn test_narrowing_keeps_left_state() {
    let mut a = Dom::top();
    a.set("x", Interval::at_least(0));
    let mut b = Dom::top();
    b.set("x", Interval::finite(0, 10));

    let narrowed = a.clone().narrow(b);
    assert_eq!(narrowed.get(&"x"), a.get(&"x"));
}

/// Bitwise functors carry no term structure; the result is bound to a
/// fresh term whose value comes from the underlying domain.
#[test_log::test]
fn test_bitwise_falls_back_to_fresh_term() {
    let mut dom = Dom::top();
    dom.set("y", Interval::finite(0, 12));
    dom.set("z", Interval::finite(0, 6));
    dom.apply(Op::And, "x", &"y", &"z");
    assert!(!dom.is_bottom());
    assert_eq!(dom.get(&"x"), Interval::finite(0, 6));
}

/// Division is an arithmetic functor and builds terms like the others.
#[test]
fn test_division_builds_terms() {
    let mut dom = Dom::top();
    dom.set("y", Interval::finite(10, 20));
    dom.set("z", Interval::finite(2, 2));
    dom.apply(Op::Div, "x", &"y", &"z");
    assert_eq!(dom.get(&"x"), Interval::finite(5, 10));
}

/// Normalization pushes refinements down through a sum: narrowing the sum
/// narrows both addends.
#[test]
fn test_normalize_propagates_downward() {
    let mut dom = Dom::top();
    dom.set("a", Interval::finite(0, 10));
    dom.set("b", Interval::finite(0, 10));
    dom.apply(Op::Add, "s", &"a", &"b");
    assert_eq!(dom.get(&"s"), Interval::finite(0, 20));

    dom.assume(&LinearConstraint::greater_or_equal(var("s"), constant(19)).into());
    assert!(!dom.is_bottom());
    assert_eq!(dom.get(&"s"), Interval::finite(19, 20));
    assert_eq!(dom.get(&"a"), Interval::finite(9, 10));
    assert_eq!(dom.get(&"b"), Interval::finite(9, 10));
}

/// Normalization also flows upward: constraining an addend tightens the
/// sum.
#[test]
fn test_normalize_propagates_upward() {
    let mut dom = Dom::top();
    dom.set("a", Interval::finite(0, 10));
    dom.set("b", Interval::finite(0, 10));
    dom.apply(Op::Add, "s", &"a", &"b");

    dom.assume(&LinearConstraint::less_or_equal(var("a"), constant(1)).into());
    assert_eq!(dom.get(&"a"), Interval::finite(0, 1));
    assert_eq!(dom.get(&"s"), Interval::finite(0, 11));
}

#[test]
fn test_expand_shares_terms() {
    let mut dom = Dom::top();
    dom.set("x", Interval::finite(1, 2));
    dom.expand(&"x", "y");
    assert_eq!(dom.get(&"y"), Interval::finite(1, 2));

    // The copy tracks later refinements of the shared term.
    dom.assume(&LinearConstraint::greater_or_equal(var("x"), constant(2)).into());
    assert_eq!(dom.get(&"y"), Interval::constant(2));
}

#[test]
fn test_project_keeps_only_requested_variables() {
    let mut dom = Dom::top();
    dom.set("x", Interval::finite(0, 1));
    dom.set("y", Interval::finite(2, 3));
    dom.set("z", Interval::finite(4, 5));
    dom.project(&["x", "z"]);

    assert_eq!(dom.get(&"x"), Interval::finite(0, 1));
    assert!(dom.get(&"y").is_top());
    assert_eq!(dom.get(&"z"), Interval::finite(4, 5));
}

#[test]
fn test_rename_rebinds_terms() {
    let mut dom = Dom::top();
    dom.set("x", Interval::finite(7, 9));
    dom.rename(&["x"], &["renamed"]);
    assert!(dom.get(&"x").is_top());
    assert_eq!(dom.get(&"renamed"), Interval::finite(7, 9));
}

#[test]
fn test_lattice_constants() {
    assert!(Dom::bottom().is_bottom());
    assert!(Dom::top().is_top());
    assert!(!Dom::top().is_bottom());
    assert!(Dom::bottom().leq(&Dom::bottom()));

    let mut dom = Dom::top();
    dom.set("x", Interval::finite(0, 1));
    assert_eq!(dom.clone().join(Dom::bottom()), dom);
    assert!(dom.clone().meet(Dom::top()).get(&"x") == Interval::finite(0, 1));
    assert!(dom.join(Dom::top()).is_top());
}

#[test]
fn test_to_constraints_uses_program_vocabulary() {
    let mut dom = Dom::top();
    dom.set("x", Interval::finite(0, 5));
    dom.assign("y", &(var("x") + constant(1)));

    // Every exported constraint mentions only program variables that are
    // still bound; internal surrogates never leak.
    let csts = dom.to_constraints();
    assert!(!csts.is_empty());
    for cst in csts.iter() {
        for v in cst.variables() {
            assert!(["x", "y"].contains(v), "unexpected variable {:?}", v);
        }
    }
}
