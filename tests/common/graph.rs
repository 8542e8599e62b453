/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::HashSet;

use argus::graph::ControlFlowGraph;
use argus::graph::DEFAULT_CFG_SUCCS_NUM;
use smallvec::SmallVec;

pub type NodeId = u32;

// A naive CFG for testing. We must use BTreeSet adjacency to make the tests
// consistent (the WTO tests assume the order of successors).
#[derive(Default)]
pub struct SimpleCfg {
    entry: NodeId,
    edges: BTreeMap<NodeId, BTreeSet<NodeId>>,
    pred_edges: BTreeMap<NodeId, BTreeSet<NodeId>>,
}

impl SimpleCfg {
    pub fn new(entry: NodeId) -> Self {
        Self {
            entry,
            ..Default::default()
        }
    }

    pub fn add_edge(&mut self, source: NodeId, target: NodeId) {
        self.edges.entry(source).or_default().insert(target);
        self.pred_edges.entry(target).or_default().insert(source);
    }
}

impl ControlFlowGraph for SimpleCfg {
    type NodeId = NodeId;

    fn entry(&self) -> NodeId {
        self.entry
    }

    fn predecessors(&self, n: NodeId) -> SmallVec<[NodeId; DEFAULT_CFG_SUCCS_NUM]> {
        self.pred_edges
            .get(&n)
            .map(|v| v.iter().copied().collect())
            .unwrap_or_else(SmallVec::new)
    }

    fn successors(&self, n: NodeId) -> SmallVec<[NodeId; DEFAULT_CFG_SUCCS_NUM]> {
        self.edges
            .get(&n)
            .map(|v| v.iter().copied().collect())
            .unwrap_or_else(SmallVec::new)
    }

    fn size(&self) -> usize {
        // We only record edges, so an isolated entry node has to be counted
        // by hand.
        let mut nodes: HashSet<NodeId> = self.edges.keys().copied().collect();
        nodes.extend(self.pred_edges.keys().copied());
        nodes.insert(self.entry);
        nodes.len()
    }
}
