/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::fmt::Debug;
use std::hash::Hash;

use smallvec::SmallVec;

pub const DEFAULT_CFG_SUCCS_NUM: usize = 4;

/// Control-flow graph contract consumed by the WTO construction and the
/// fixpoint iterator.
///
/// Clients can either maintain their own structure and implement this trait,
/// or wrap a third-party graph crate. The graph is only ever borrowed
/// read-only; node payloads (statement lists) stay on the client side and are
/// reached through the transformer callback.
///
/// The constant generic parameter S is an estimated number of adjacent nodes
/// that is just enough for most nodes. A larger/smaller value will not cause
/// incorrect results, it only affects performance.
// NOTE: due to the status of Rust const generics, we can not define S as an
// associated constant since it is part of the return type of the adjacency
// methods.
pub trait ControlFlowGraph<const S: usize = DEFAULT_CFG_SUCCS_NUM> {
    type NodeId: Copy + Hash + Eq + Debug;

    /// Entry node; the analysis seeds its initial value here.
    fn entry(&self) -> Self::NodeId;

    /// Predecessors of n.
    fn predecessors(&self, n: Self::NodeId) -> SmallVec<[Self::NodeId; S]>;

    /// Successors of n.
    fn successors(&self, n: Self::NodeId) -> SmallVec<[Self::NodeId; S]>;

    /// Number of nodes, used for capacity hints.
    fn size(&self) -> usize;
}
