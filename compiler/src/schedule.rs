// schedule.rs — Execution chain computation for signal graphs
//
// Orders the nodes a tick must evaluate. Walks backward from each sink (in
// node-id order) depth-first, appending a node after all of its inlet sources.
// The union over all sinks, de-duplicated, is the execution chain.
//
// Preconditions: `graph` came from `build_graph` with no error diagnostics.
// Postconditions: returns an `ExecutionChain` holding every node some sink
//                 transitively depends on, once, dependencies first.
// Failure modes: dependency cycles (E0300) produce `Diagnostic` entries; the
//                chain is then incomplete and must not be emitted.
// Side effects: none.

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::diag::codes;
use crate::diag::Diagnostic;
use crate::graph::*;
use crate::id::NodeId;

// ── Public types ────────────────────────────────────────────────────────────

/// Nodes in evaluation order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionChain {
    pub order: Vec<NodeId>,
}

impl ExecutionChain {
    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.order.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.order.contains(&id)
    }
}

impl fmt::Display for ExecutionChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, id) in self.order.iter().enumerate() {
            if i > 0 {
                write!(f, " -> ")?;
            }
            write!(f, "{}", id)?;
        }
        Ok(())
    }
}

/// Result of scheduling.
#[derive(Debug)]
pub struct ScheduleResult {
    pub chain: ExecutionChain,
    pub diagnostics: Vec<Diagnostic>,
}

// ── Verification ─────────────────────────────────────────────────────────────

/// Machine-checkable evidence for schedule postconditions (S1-S3).
#[derive(Debug, Clone)]
pub struct ScheduleCert {
    /// S1: Every in-chain node's dependencies appear earlier in the chain.
    pub s1_dependencies_first: bool,
    /// S2: No node appears twice.
    pub s2_no_duplicates: bool,
    /// S3: Every sink is in the chain.
    pub s3_all_sinks_scheduled: bool,
}

impl crate::pass::StageCert for ScheduleCert {
    fn all_pass(&self) -> bool {
        self.s1_dependencies_first && self.s2_no_duplicates && self.s3_all_sinks_scheduled
    }

    fn obligations(&self) -> Vec<(&'static str, bool)> {
        vec![
            ("S1_dependencies_first", self.s1_dependencies_first),
            ("S2_no_duplicates", self.s2_no_duplicates),
            ("S3_all_sinks_scheduled", self.s3_all_sinks_scheduled),
        ]
    }
}

/// Verify schedule postconditions against the graph it was computed from.
pub fn verify_schedule(chain: &ExecutionChain, graph: &Graph) -> ScheduleCert {
    ScheduleCert {
        s1_dependencies_first: verify_s1_dependencies_first(chain, graph),
        s2_no_duplicates: verify_s2_no_duplicates(chain),
        s3_all_sinks_scheduled: graph.sinks().all(|sink| chain.contains(sink)),
    }
}

/// S1: each dependency of a scheduled node sits at a strictly smaller position.
fn verify_s1_dependencies_first(chain: &ExecutionChain, graph: &Graph) -> bool {
    let positions: HashMap<NodeId, usize> =
        chain.iter().enumerate().map(|(i, id)| (id, i)).collect();
    chain.iter().enumerate().all(|(pos, id)| {
        graph.get(id).is_some_and(|node| {
            node.dependencies()
                .all(|dep| positions.get(&dep).is_some_and(|&p| p < pos))
        })
    })
}

fn verify_s2_no_duplicates(chain: &ExecutionChain) -> bool {
    let mut seen = HashSet::with_capacity(chain.len());
    chain.iter().all(|id| seen.insert(id))
}

// ── Public entry point ──────────────────────────────────────────────────────

/// Compute the execution chain for a graph.
pub fn schedule(graph: &Graph) -> ScheduleResult {
    let mut walker = Walker::new(graph);

    for sink in graph.sinks() {
        walker.walk(sink, true);
    }

    // Nothing reaches these from a sink. Walk them anyway so a cycle among
    // them is still reported, but keep them out of the chain.
    let dead: Vec<NodeId> = graph
        .nodes
        .iter()
        .map(|n| n.id)
        .filter(|&id| walker.marks[id.index()] == Mark::Unvisited)
        .collect();
    for &id in &dead {
        let node = graph.node(id);
        tracing::debug!(node = %id, kind = %node.kind, "no path to a sink; not emitted");
    }
    for &id in &dead {
        walker.walk(id, false);
    }

    let chain = ExecutionChain {
        order: walker.chain,
    };
    tracing::debug!(scheduled = chain.len(), dead = dead.len(), "execution chain: {}", chain);

    ScheduleResult {
        chain,
        diagnostics: walker.diagnostics,
    }
}

// ── Depth-first walk ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnPath,
    Done,
}

struct Walker<'a> {
    graph: &'a Graph,
    marks: Vec<Mark>,
    chain: Vec<NodeId>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Walker<'a> {
    fn new(graph: &'a Graph) -> Self {
        Walker {
            graph,
            marks: vec![Mark::Unvisited; graph.len()],
            chain: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Post-order walk from `root` over inlet sources, left inlet first.
    /// Each stack frame is (node, next inlet to examine); the frames form the
    /// current path.
    fn walk(&mut self, root: NodeId, emit: bool) {
        if self.marks[root.index()] != Mark::Unvisited {
            return;
        }
        let graph = self.graph;
        self.marks[root.index()] = Mark::OnPath;
        let mut stack: Vec<(NodeId, usize)> = vec![(root, 0)];

        while let Some(frame) = stack.last_mut() {
            let (node, next) = *frame;
            let inlets = &graph.node(node).inlets;

            if next == inlets.len() {
                stack.pop();
                self.marks[node.index()] = Mark::Done;
                if emit {
                    self.chain.push(node);
                }
                continue;
            }

            frame.1 += 1;
            let dep = match inlets[next].source {
                Some(Source::Outlet { node: dep, .. }) => dep,
                Some(Source::Constant(_)) | None => continue,
            };
            match self.marks[dep.index()] {
                Mark::Done => {}
                Mark::OnPath => {
                    let diag = self.cycle_diagnostic(&stack, dep);
                    self.diagnostics.push(diag);
                }
                Mark::Unvisited => {
                    self.marks[dep.index()] = Mark::OnPath;
                    stack.push((dep, 0));
                }
            }
        }
    }

    /// `closing` is on the path and feeds the node on top of the stack.
    fn cycle_diagnostic(&self, stack: &[(NodeId, usize)], closing: NodeId) -> Diagnostic {
        let start = stack
            .iter()
            .position(|&(id, _)| id == closing)
            .unwrap_or(0);
        // Each frame is fed by the one above it, so data flows top-down
        // through the path and from `closing` back to the top.
        let mut flow: Vec<NodeId> = stack[start..].iter().rev().map(|&(id, _)| id).collect();
        flow.rotate_right(1);

        let names: Vec<String> = flow.iter().map(|&id| self.describe(id)).collect();
        let closing_node = self.graph.node(closing);
        let mut diag = Diagnostic::error(
            codes::E0300,
            closing_node.span,
            format!("cyclic dependency: {} -> {}", names.join(" -> "), names[0]),
        )
        .with_hint("signal connections must not form a loop; remove one connection of the cycle");

        for &id in &flow {
            if id != closing {
                diag = diag.with_related(
                    self.graph.node(id).span,
                    format!("{} is on the cycle", self.describe(id)),
                );
            }
        }
        for (i, &from) in flow.iter().enumerate() {
            let to = flow[(i + 1) % flow.len()];
            diag = diag.with_cause(
                format!("{} feeds {}", self.describe(from), self.describe(to)),
                Some(self.graph.node(to).span),
            );
        }
        diag
    }

    fn describe(&self, id: NodeId) -> String {
        format!("`{}` (node {})", self.graph.node(id).kind, id)
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
