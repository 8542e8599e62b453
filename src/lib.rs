/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! An abstract-interpretation engine.
//!
//! The crate provides the two halves of a classical static analyzer core:
//!
//! - an *interleaved forward fixpoint iterator* ([`fixpoint_iter`]) driven by
//!   Bourdoncle's weak topological ordering ([`wto`]) of a client-supplied
//!   control-flow graph ([`graph`]), with widening and narrowing localized at
//!   loop heads;
//! - a family of *abstract domains* ([`datatype`]): the lattice and numerical
//!   transfer contracts, an interval environment, a bounded-disjunction
//!   combinator, and a term-equivalence (anti-unification) domain that lifts
//!   any value domain with congruence reasoning over symbolic terms.

pub mod datatype;
pub mod fixpoint_iter;
pub mod graph;
pub mod wto;
