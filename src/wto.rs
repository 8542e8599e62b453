/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Weak topological ordering of a control-flow graph.
//!
//! A WTO is a hierarchical decomposition of the graph into an ordered
//! sequence of components, each either a plain vertex or a cycle with a
//! designated head and a nested component sequence. Iterating components in
//! order and stabilizing every cycle at its head yields a terminating chaotic
//! iteration strategy; see F. Bourdoncle, "Efficient chaotic iteration
//! strategies with widenings", FMPA 1993.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;

use crate::graph::ControlFlowGraph;

pub struct WtoVertex<N> {
    node: N,
}

impl<N: Copy> WtoVertex<N> {
    pub fn node(&self) -> N {
        self.node
    }
}

pub struct WtoCycle<N> {
    head: N,
    components: Vec<WtoComponent<N>>,
}

impl<N: Copy> WtoCycle<N> {
    pub fn head(&self) -> N {
        self.head
    }

    /// The inner components, head excluded.
    pub fn components(&self) -> impl Iterator<Item = &WtoComponent<N>> {
        self.components.iter()
    }
}

pub enum WtoComponent<N> {
    Vertex(WtoVertex<N>),
    Cycle(WtoCycle<N>),
}

impl<N: Copy> WtoComponent<N> {
    pub fn accept<V: WtoComponentVisitor<N> + ?Sized>(&self, visitor: &mut V) {
        match self {
            WtoComponent::Vertex(v) => visitor.visit_vertex(v),
            WtoComponent::Cycle(c) => visitor.visit_cycle(c),
        }
    }
}

/// Traversal hook over WTO components in order.
///
/// `visit_cycle` is handed the whole cycle and decides itself whether (and
/// how often) to re-enter the inner components; the fixpoint iterator uses
/// this to stabilize a cycle before moving past it.
pub trait WtoComponentVisitor<N: Copy> {
    fn visit_vertex(&mut self, vertex: &WtoVertex<N>);
    fn visit_cycle(&mut self, cycle: &WtoCycle<N>);
}

/// The sequence of cycle heads enclosing a node, outermost first. A head is
/// not part of its own nesting.
///
/// Nestings are partially ordered by strict containment: `a > b` holds when
/// `b` is a proper prefix of `a`, i.e. the position of `a` is strictly inside
/// every cycle enclosing the position of `b`.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct WtoNesting<N: Copy + Eq> {
    heads: Vec<N>,
}

impl<N: Copy + Eq> WtoNesting<N> {
    pub fn heads(&self) -> &[N] {
        &self.heads
    }
}

impl<N: Copy + Eq> PartialOrd for WtoNesting<N> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        let common = self
            .heads
            .iter()
            .zip(other.heads.iter())
            .take_while(|(a, b)| a == b)
            .count();
        if common < self.heads.len().min(other.heads.len()) {
            // Diverging nestings are unrelated.
            None
        } else {
            Some(self.heads.len().cmp(&other.heads.len()))
        }
    }
}

pub struct Wto<N: Copy + Hash + Eq> {
    components: Vec<WtoComponent<N>>,
    nesting: HashMap<N, WtoNesting<N>>,
}

impl<N: Copy + Hash + Eq + std::fmt::Debug> Wto<N> {
    /// Build the WTO of `graph` rooted at its entry node.
    pub fn new<G>(graph: &G) -> Self
    where
        G: ControlFlowGraph<NodeId = N>,
    {
        let mut builder = WtoBuilder {
            graph,
            dfn: HashMap::with_capacity(graph.size()),
            stack: Vec::new(),
            num: 0,
        };
        let mut components = Vec::new();
        builder.visit(graph.entry(), &mut components);
        components.reverse();

        let mut wto = Wto {
            components,
            nesting: HashMap::with_capacity(graph.size()),
        };
        let mut heads = Vec::new();
        Self::build_nesting(&wto.components, &mut heads, &mut wto.nesting);
        wto
    }

    pub fn components(&self) -> impl Iterator<Item = &WtoComponent<N>> {
        self.components.iter()
    }

    pub fn accept<V: WtoComponentVisitor<N> + ?Sized>(&self, visitor: &mut V) {
        for c in &self.components {
            c.accept(visitor);
        }
    }

    /// Nesting of `n`. Nodes unreachable from the entry have an empty
    /// nesting.
    pub fn nesting(&self, n: N) -> WtoNesting<N> {
        self.nesting
            .get(&n)
            .cloned()
            .unwrap_or(WtoNesting { heads: Vec::new() })
    }

    fn build_nesting(
        components: &[WtoComponent<N>],
        heads: &mut Vec<N>,
        table: &mut HashMap<N, WtoNesting<N>>,
    ) {
        for c in components {
            match c {
                WtoComponent::Vertex(v) => {
                    table.insert(v.node, WtoNesting {
                        heads: heads.clone(),
                    });
                }
                WtoComponent::Cycle(c) => {
                    table.insert(c.head, WtoNesting {
                        heads: heads.clone(),
                    });
                    heads.push(c.head);
                    Self::build_nesting(&c.components, heads, table);
                    heads.pop();
                }
            }
        }
    }
}

/*
 * Bourdoncle's partitioning: a depth-first search that pops strongly
 * connected subcomponents off the visitation stack as their heads complete,
 * recursing into each cycle to lay out its body. Components are pushed in
 * reverse; the finished sequences are reversed once on the way out.
 */
struct WtoBuilder<'g, G: ControlFlowGraph> {
    graph: &'g G,
    // Depth-first numbers; 0 marks an unvisited node, u32::MAX a node whose
    // component is already emitted.
    dfn: HashMap<G::NodeId, u32>,
    stack: Vec<G::NodeId>,
    num: u32,
}

impl<'g, G> WtoBuilder<'g, G>
where
    G: ControlFlowGraph,
{
    fn dfn_of(&self, n: G::NodeId) -> u32 {
        self.dfn.get(&n).copied().unwrap_or(0)
    }

    fn visit(&mut self, vertex: G::NodeId, partition: &mut Vec<WtoComponent<G::NodeId>>) -> u32 {
        self.stack.push(vertex);
        self.num += 1;
        self.dfn.insert(vertex, self.num);
        let mut head = self.num;
        let mut is_loop = false;

        for succ in self.graph.successors(vertex) {
            let succ_dfn = self.dfn_of(succ);
            let min = if succ_dfn == 0 {
                self.visit(succ, partition)
            } else {
                succ_dfn
            };
            if min <= head {
                head = min;
                is_loop = true;
            }
        }

        if head == self.dfn_of(vertex) {
            self.dfn.insert(vertex, u32::MAX);
            let mut element = self.stack.pop().unwrap();
            if is_loop {
                while element != vertex {
                    // Unmark so the component pass revisits the body.
                    self.dfn.insert(element, 0);
                    element = self.stack.pop().unwrap();
                }
                partition.push(self.component(vertex));
            } else {
                partition.push(WtoComponent::Vertex(WtoVertex { node: vertex }));
            }
        }
        head
    }

    fn component(&mut self, head: G::NodeId) -> WtoComponent<G::NodeId> {
        let mut partition = Vec::new();
        for succ in self.graph.successors(head) {
            if self.dfn_of(succ) == 0 {
                self.visit(succ, &mut partition);
            }
        }
        partition.reverse();
        WtoComponent::Cycle(WtoCycle {
            head,
            components: partition,
        })
    }
}

impl<N: Copy + Display> Display for WtoComponent<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WtoComponent::Vertex(v) => write!(f, "{}", v.node),
            WtoComponent::Cycle(c) => {
                write!(f, "({}", c.head)?;
                for inner in &c.components {
                    write!(f, " {}", inner)?;
                }
                write!(f, ")")
            }
        }
    }
}

impl<N: Copy + Hash + Eq + Display> Display for Wto<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for c in &self.components {
            if !first {
                write!(f, " ")?;
            }
            write!(f, "{}", c)?;
            first = false;
        }
        Ok(())
    }
}
