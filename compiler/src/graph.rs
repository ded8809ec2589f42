// graph.rs — Signal graph construction for Pure Data patches
//
// Transforms parsed box/connection directives into a dense node arena. Every
// `obj` box becomes a node with the fixed inlet/outlet arity of its operator
// kind; literal parameters bind as constant sources; connections then resolve
// into outlet references on target inlets.
//
// Preconditions: `patch` came from a parse with no error diagnostics.
// Postconditions: returns a `Graph` whose node ids are dense in patch order and
//                 whose every outlet source names an existing node and outlet.
// Failure modes: bad parameters (E0005), out-of-range or non-signal
//                connection endpoints (E0200–E0203) → `Diagnostic` errors.
//                Rebinding an inlet (W0100) and a patch with no sink (W0101)
//                are warnings.
// Side effects: none.

use std::collections::HashMap;
use std::fmt;

use crate::ast::*;
use crate::diag::{codes, Diagnostic};
use crate::id::{IdAllocator, NodeId};
use crate::operator::{OpKind, ValueKind};

// ── Public types ────────────────────────────────────────────────────────────

/// Where an inlet's value comes from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Source {
    /// Output `outlet` of node `node`.
    Outlet { node: NodeId, outlet: usize },
    /// A literal construction parameter.
    Constant(f32),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Inlet {
    pub name: &'static str,
    pub kind: ValueKind,
    /// `None` reads as 0.0.
    pub source: Option<Source>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outlet {
    pub index: usize,
}

/// One operator instance.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub kind: OpKind,
    pub inlets: Vec<Inlet>,
    pub outlets: Vec<Outlet>,
    pub span: Span,
}

impl Node {
    fn new(id: NodeId, kind: OpKind, span: Span) -> Self {
        let inlets = kind
            .inlet_names()
            .iter()
            .map(|&name| Inlet {
                name,
                kind: ValueKind::Signal,
                source: None,
            })
            .collect();
        let outlets = (0..kind.outlet_count())
            .map(|index| Outlet { index })
            .collect();
        Node {
            id,
            kind,
            inlets,
            outlets,
            span,
        }
    }

    /// Nodes feeding this node's inlets, in inlet order (repeats possible).
    pub fn dependencies(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.inlets.iter().filter_map(|inlet| match inlet.source {
            Some(Source::Outlet { node, .. }) => Some(node),
            Some(Source::Constant(_)) | None => None,
        })
    }
}

/// The complete signal graph. `nodes[i].id == NodeId(i)`.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    pub nodes: Vec<Node>,
}

impl Graph {
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Sink nodes in id order.
    pub fn sinks(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .filter(|n| n.kind.is_sink())
            .map(|n| n.id)
    }
}

/// Result of graph construction.
#[derive(Debug)]
pub struct GraphResult {
    pub graph: Graph,
    pub diagnostics: Vec<Diagnostic>,
}

// ── Public entry point ──────────────────────────────────────────────────────

/// Build the signal graph from a parsed patch.
pub fn build_graph(patch: &Patch) -> GraphResult {
    let mut builder = GraphBuilder::new();
    builder.create_nodes(patch);
    builder.resolve_connections(&patch.connections);
    builder.check_sinks();

    GraphResult {
        graph: Graph {
            nodes: builder.nodes,
        },
        diagnostics: builder.diagnostics,
    }
}

// ── Display ─────────────────────────────────────────────────────────────────

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Graph ({} nodes)", self.nodes.len())?;
        for node in &self.nodes {
            write!(f, "  {}: {}", node.id, node.kind)?;
            for (i, inlet) in node.inlets.iter().enumerate() {
                match inlet.source {
                    Some(Source::Outlet { node: src, outlet }) => {
                        write!(f, " [{}<-{}:{}]", i, src, outlet)?
                    }
                    Some(Source::Constant(v)) => write!(f, " [{}={:?}]", i, v)?,
                    None => {}
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

// ── Internal builder ────────────────────────────────────────────────────────

struct GraphBuilder {
    ids: IdAllocator,
    nodes: Vec<Node>,
    /// Patch box index → node id (`None` for message and comment boxes).
    box_table: Vec<Option<NodeId>>,
    /// First connection span seen for each bound inlet.
    bound_inlets: HashMap<(NodeId, usize), Span>,
    diagnostics: Vec<Diagnostic>,
}

impl GraphBuilder {
    fn new() -> Self {
        GraphBuilder {
            ids: IdAllocator::new(),
            nodes: Vec::new(),
            box_table: Vec::new(),
            bound_inlets: HashMap::new(),
            diagnostics: Vec::new(),
        }
    }

    // ── Nodes ───────────────────────────────────────────────────────────

    fn create_nodes(&mut self, patch: &Patch) {
        for decl in &patch.boxes {
            match &decl.kind {
                BoxKind::Object(obj) => {
                    let id = self.ids.alloc_node();
                    let mut node = Node::new(id, obj.op, obj.span);
                    self.bind_params(&mut node, &obj.params);
                    self.nodes.push(node);
                    self.box_table.push(Some(id));
                }
                BoxKind::Message(_) | BoxKind::Text(_) => self.box_table.push(None),
            }
        }
    }

    /// Bind literal parameters to the kind's default-bearing inlets, left to
    /// right. Extra parameters are ignored.
    fn bind_params(&mut self, node: &mut Node, params: &[Field]) {
        for (&inlet, param) in node.kind.param_bindings().iter().zip(params) {
            match parse_param(&param.text) {
                Some(value) => node.inlets[inlet].source = Some(Source::Constant(value)),
                None => self.diagnostics.push(
                    Diagnostic::error(
                        codes::E0005,
                        param.span,
                        format!(
                            "`{}` parameter for inlet `{}` must be a finite number, found `{}`",
                            node.kind, node.inlets[inlet].name, param.text
                        ),
                    )
                    .with_related(node.span, "in this object"),
                ),
            }
        }
    }

    // ── Connections ─────────────────────────────────────────────────────

    fn resolve_connections(&mut self, connections: &[ConnectDecl]) {
        for conn in connections {
            match self.resolve_endpoints(conn) {
                Ok((source, target)) => self.bind_connection(conn, source, target),
                Err(diag) => self.diagnostics.push(diag),
            }
        }
    }

    /// Validate both ends of a connection, returning (source node, target node).
    fn resolve_endpoints(&self, conn: &ConnectDecl) -> Result<(NodeId, NodeId), Diagnostic> {
        let source = self.lookup_box(conn.source, conn.span, "source")?;
        let outlets = self.nodes[source.index()].outlets.len();
        if conn.outlet >= outlets {
            let node = &self.nodes[source.index()];
            return Err(Diagnostic::error(
                codes::E0201,
                conn.span,
                format!(
                    "outlet {} out of range: `{}` (box {}) has {} outlet{}",
                    conn.outlet,
                    node.kind,
                    conn.source,
                    outlets,
                    plural(outlets)
                ),
            )
            .with_related(node.span, "source object here"));
        }

        let target = self.lookup_box(conn.target, conn.span, "target")?;
        let inlets = self.nodes[target.index()].inlets.len();
        if conn.inlet >= inlets {
            let node = &self.nodes[target.index()];
            return Err(Diagnostic::error(
                codes::E0202,
                conn.span,
                format!(
                    "inlet {} out of range: `{}` (box {}) has {} inlet{}",
                    conn.inlet,
                    node.kind,
                    conn.target,
                    inlets,
                    plural(inlets)
                ),
            )
            .with_related(node.span, "target object here"));
        }

        Ok((source, target))
    }

    fn lookup_box(&self, index: usize, span: Span, role: &str) -> Result<NodeId, Diagnostic> {
        match self.box_table.get(index) {
            Some(Some(id)) => Ok(*id),
            Some(None) => Err(Diagnostic::error(
                codes::E0203,
                span,
                format!(
                    "connection {} box {} is a message or comment, not a signal object",
                    role, index
                ),
            )),
            None => Err(Diagnostic::error(
                codes::E0200,
                span,
                format!(
                    "connection {} box {} out of range: patch has {} box{}",
                    role,
                    index,
                    self.box_table.len(),
                    if self.box_table.len() == 1 { "" } else { "es" }
                ),
            )),
        }
    }

    /// Last connection into an inlet wins.
    fn bind_connection(&mut self, conn: &ConnectDecl, source: NodeId, target: NodeId) {
        if let Some(&first) = self.bound_inlets.get(&(target, conn.inlet)) {
            let node = &self.nodes[target.index()];
            self.diagnostics.push(
                Diagnostic::warning(
                    codes::W0100,
                    conn.span,
                    format!(
                        "inlet `{}` of `{}` (box {}) is already connected; this connection replaces it",
                        node.inlets[conn.inlet].name, node.kind, conn.target
                    ),
                )
                .with_related(first, "earlier connection here")
                .with_hint("signal inlets take one source; insert `+~` to sum signals"),
            );
        } else {
            self.bound_inlets.insert((target, conn.inlet), conn.span);
        }

        self.nodes[target.index()].inlets[conn.inlet].source = Some(Source::Outlet {
            node: source,
            outlet: conn.outlet,
        });
    }

    fn check_sinks(&mut self) {
        if self.nodes.iter().any(|n| n.kind.is_sink()) {
            return;
        }
        let span = self
            .nodes
            .first()
            .map_or_else(|| (0..0).into(), |n| n.span);
        self.diagnostics.push(
            Diagnostic::warning(
                codes::W0101,
                span,
                "patch has no `dac~`; the generated program produces no output",
            )
            .with_hint("connect the signal chain to a `dac~` object"),
        );
    }
}

fn parse_param(text: &str) -> Option<f32> {
    text.parse::<f32>().ok().filter(|v| v.is_finite())
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
