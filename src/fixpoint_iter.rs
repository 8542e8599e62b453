/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Interleaved forward fixpoint iteration.
//!
//! The iterator runs the chaotic iteration strategy induced by the WTO of the
//! graph, localizing widening and narrowing at cycle heads: each cycle is
//! stabilized by an ascending sequence (join below the widening delay,
//! widening past it), then refined by a bounded descending sequence (meet
//! first, narrowing after). See G. Amato and F. Scozzari, "Localizing
//! widening and narrowing", SAS 2013.

use std::borrow::Cow;
use std::collections::HashMap;

use crate::datatype::AbstractDomain;
use crate::datatype::Thresholds;
use crate::graph::ControlFlowGraph;
use crate::wto::Wto;
use crate::wto::WtoComponentVisitor;
use crate::wto::WtoCycle;
use crate::wto::WtoNesting;
use crate::wto::WtoVertex;

pub const DEFAULT_WIDENING_DELAY: u32 = 1;
pub const DEFAULT_DESCENDING_ITERATIONS: u32 = 2;

/// The per-node transfer function, supplied by the client.
pub trait FixpointTransformer<G: ControlFlowGraph, D: AbstractDomain> {
    /// Apply the node's statements to `state` in place. The iterator always
    /// passes a private copy of the node's entry state.
    ///
    /// Must be monotone in `state`; the engine does not defend against
    /// chaotic transfers.
    fn analyze_node(&mut self, n: G::NodeId, state: &mut D);
}

/// Receives the stabilized invariants, once per node in WTO order.
pub trait FixpointProcessor<G: ControlFlowGraph, D: AbstractDomain> {
    fn process_pre(&mut self, n: G::NodeId, state: &D);
    fn process_post(&mut self, n: G::NodeId, state: &D);
}

pub struct InterleavedFixpointIterator<'g, G, D, T>
where
    G: ControlFlowGraph,
    D: AbstractDomain,
    T: FixpointTransformer<G, D>,
{
    graph: &'g G,
    wto: Wto<G::NodeId>,
    transformer: T,
    widening_delay: u32,
    descending_iterations: u32,
    thresholds: Option<Thresholds>,
    pre: HashMap<G::NodeId, D>,
    post: HashMap<G::NodeId, D>,
}

impl<'g, G, D, T> InterleavedFixpointIterator<'g, G, D, T>
where
    G: ControlFlowGraph,
    D: AbstractDomain,
    T: FixpointTransformer<G, D>,
{
    pub fn new(graph: &'g G, transformer: T) -> Self {
        Self {
            graph,
            wto: Wto::new(graph),
            transformer,
            widening_delay: DEFAULT_WIDENING_DELAY,
            descending_iterations: DEFAULT_DESCENDING_ITERATIONS,
            thresholds: None,
            pre: HashMap::with_capacity(graph.size()),
            post: HashMap::with_capacity(graph.size()),
        }
    }

    /// Number of ascending iterations joined before widening kicks in.
    pub fn with_widening_delay(mut self, delay: u32) -> Self {
        self.widening_delay = delay;
        self
    }

    /// Cap on descending iterations; needed whenever the domain's narrowing
    /// is not a true narrowing operator.
    pub fn with_descending_iterations(mut self, iterations: u32) -> Self {
        self.descending_iterations = iterations;
        self
    }

    /// Landing points for threshold widening during the ascending phase.
    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = Some(thresholds);
        self
    }

    pub fn wto(&self) -> &Wto<G::NodeId> {
        &self.wto
    }

    /// Compute the fixpoint from `init` at the entry node, hand every node's
    /// stabilized pre/post pair to `processor`, then release the invariant
    /// tables.
    pub fn run(&mut self, init: D, processor: &mut impl FixpointProcessor<G, D>) {
        self.pre.clear();
        self.post.clear();
        self.pre.insert(self.graph.entry(), init);

        let Self {
            graph,
            wto,
            transformer,
            widening_delay,
            descending_iterations,
            thresholds,
            pre,
            post,
        } = self;
        let wto: &Wto<G::NodeId> = wto;

        let mut iteration_visitor = WtoIterationVisitor {
            graph: *graph,
            wto,
            transformer: &mut *transformer,
            widening_delay: *widening_delay,
            descending_iterations: *descending_iterations,
            thresholds: thresholds.as_ref(),
            pre: &mut *pre,
            post: &mut *post,
        };
        wto.accept(&mut iteration_visitor);

        let mut processor_visitor = WtoProcessorVisitor {
            pre,
            post,
            processor,
        };
        wto.accept(&mut processor_visitor);

        pre.clear();
        pre.shrink_to_fit();
        post.clear();
        post.shrink_to_fit();
    }
}

fn state_or_bottom<N: Copy + std::hash::Hash + Eq, D: AbstractDomain>(
    table: &HashMap<N, D>,
    n: N,
) -> Cow<'_, D> {
    match table.get(&n) {
        Some(state) => Cow::Borrowed(state),
        None => Cow::Owned(D::bottom()),
    }
}

struct WtoIterationVisitor<'a, G, D, T>
where
    G: ControlFlowGraph,
    D: AbstractDomain,
    T: FixpointTransformer<G, D>,
{
    graph: &'a G,
    wto: &'a Wto<G::NodeId>,
    transformer: &'a mut T,
    widening_delay: u32,
    descending_iterations: u32,
    thresholds: Option<&'a Thresholds>,
    pre: &'a mut HashMap<G::NodeId, D>,
    post: &'a mut HashMap<G::NodeId, D>,
}

impl<'a, G, D, T> WtoIterationVisitor<'a, G, D, T>
where
    G: ControlFlowGraph,
    D: AbstractDomain,
    T: FixpointTransformer<G, D>,
{
    fn analyze(&mut self, n: G::NodeId, pre: &D) -> D {
        let mut state = pre.clone();
        self.transformer.analyze_node(n, &mut state);
        state
    }

    /// Join of predecessor post states. When `outside_of` is given, only the
    /// predecessors not strictly nested in that cycle contribute; this is the
    /// initial head state, accumulated before any back edge has a value.
    fn joined_predecessors(
        &self,
        n: G::NodeId,
        outside_of: Option<&WtoNesting<G::NodeId>>,
    ) -> D {
        let mut result = D::bottom();
        for p in self.graph.predecessors(n) {
            if let Some(head_nesting) = outside_of {
                if &self.wto.nesting(p) > head_nesting {
                    continue;
                }
            }
            result.join_with(state_or_bottom(self.post, p).into_owned());
        }
        result
    }

    fn extrapolate(&self, iteration: u32, accumulated: D, new: D) -> D {
        if iteration <= self.widening_delay {
            accumulated.join(new)
        } else if let Some(thresholds) = self.thresholds {
            let mut widened = accumulated;
            widened.widen_with_thresholds(new, thresholds);
            widened
        } else {
            accumulated.widen(new)
        }
    }

    fn refine(iteration: u32, accumulated: D, new: D) -> D {
        if iteration == 1 {
            accumulated.meet(new)
        } else {
            accumulated.narrow(new)
        }
    }
}

impl<'a, G, D, T> WtoComponentVisitor<G::NodeId> for WtoIterationVisitor<'a, G, D, T>
where
    G: ControlFlowGraph,
    D: AbstractDomain,
    T: FixpointTransformer<G, D>,
{
    fn visit_vertex(&mut self, vertex: &WtoVertex<G::NodeId>) {
        let node = vertex.node();
        let pre = if node == self.graph.entry() {
            // Seeded with the initial value by `run`.
            state_or_bottom(self.pre, node).into_owned()
        } else {
            let pre = self.joined_predecessors(node, None);
            self.pre.insert(node, pre.clone());
            pre
        };
        let post = self.analyze(node, &pre);
        self.post.insert(node, post);
    }

    fn visit_cycle(&mut self, cycle: &WtoCycle<G::NodeId>) {
        let head = cycle.head();
        let head_nesting = self.wto.nesting(head);

        let mut pre = if head == self.graph.entry() {
            state_or_bottom(self.pre, head).into_owned()
        } else {
            D::bottom()
        };
        pre.join_with(self.joined_predecessors(head, Some(&head_nesting)));

        // Ascending sequence with widening.
        let mut iteration = 1;
        loop {
            self.pre.insert(head, pre.clone());
            let post = self.analyze(head, &pre);
            self.post.insert(head, post);
            for c in cycle.components() {
                c.accept(self);
            }
            let new_pre = self.joined_predecessors(head, None);
            if new_pre.leq(&pre) {
                // Post-fixpoint reached.
                self.pre.insert(head, new_pre.clone());
                pre = new_pre;
                break;
            }
            pre = self.extrapolate(iteration, pre, new_pre);
            iteration += 1;
        }

        // Descending sequence with narrowing.
        let mut iteration = 1;
        loop {
            let post = self.analyze(head, &pre);
            self.post.insert(head, post);
            for c in cycle.components() {
                c.accept(self);
            }
            let new_pre = self.joined_predecessors(head, None);
            if pre.leq(&new_pre) {
                // No more refinement possible.
                break;
            }
            if iteration > self.descending_iterations {
                break;
            }
            pre = Self::refine(iteration, pre, new_pre);
            self.pre.insert(head, pre.clone());
            iteration += 1;
        }
    }
}

struct WtoProcessorVisitor<'a, G, D, P>
where
    G: ControlFlowGraph,
    D: AbstractDomain,
    P: FixpointProcessor<G, D>,
{
    pre: &'a HashMap<G::NodeId, D>,
    post: &'a HashMap<G::NodeId, D>,
    processor: &'a mut P,
}

impl<'a, G, D, P> WtoProcessorVisitor<'a, G, D, P>
where
    G: ControlFlowGraph,
    D: AbstractDomain,
    P: FixpointProcessor<G, D>,
{
    fn process(&mut self, node: G::NodeId) {
        self.processor
            .process_pre(node, state_or_bottom(self.pre, node).as_ref());
        self.processor
            .process_post(node, state_or_bottom(self.post, node).as_ref());
    }
}

impl<'a, G, D, P> WtoComponentVisitor<G::NodeId> for WtoProcessorVisitor<'a, G, D, P>
where
    G: ControlFlowGraph,
    D: AbstractDomain,
    P: FixpointProcessor<G, D>,
{
    fn visit_vertex(&mut self, vertex: &WtoVertex<G::NodeId>) {
        self.process(vertex.node());
    }

    fn visit_cycle(&mut self, cycle: &WtoCycle<G::NodeId>) {
        self.process(cycle.head());
        for c in cycle.components() {
            c.accept(self);
        }
    }
}
