// codegen.rs — C code generation for Pure Data signal graphs
//
// Emits one straight-line C99 program from the scheduled graph. Every node in
// the execution chain contributes fragments to four phases: declare
// (persistent state), init (one-time setup), tick (per-sample work, framed by
// empty start/end hooks) and deinit (teardown). Each phase is one exhaustive
// match over `OpKind`.
//
// Preconditions: `chain` is the verified schedule of `graph`.
// Postconditions: returns `CodegenResult` with a complete C translation unit
//                 defining `init`, `dsptick` and `deinit`.
// Failure modes: a node reading an outlet not computed earlier in the chain
//                produces an internal diagnostic (E0601).
// Side effects: none.

use std::collections::HashSet;
use std::fmt::Write as _;

use crate::diag::{codes, Diagnostic};
use crate::graph::*;
use crate::id::NodeId;
use crate::operator::OpKind;
use crate::schedule::ExecutionChain;

// ── Public types ────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct CodegenResult {
    pub generated: GeneratedCode,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug)]
pub struct GeneratedCode {
    pub c_source: String,
}

#[derive(Debug, Clone)]
pub struct CodegenOptions {
    /// Samples per second; `SAMPLE_RATE` in the generated program.
    pub sample_rate: f32,
    /// Hex SHA-256 of the patch, stamped in the banner when present.
    pub source_hash: Option<String>,
}

impl Default for CodegenOptions {
    fn default() -> Self {
        CodegenOptions {
            sample_rate: 44100.0,
            source_hash: None,
        }
    }
}

// ── Public entry point ──────────────────────────────────────────────────────

pub fn codegen(graph: &Graph, chain: &ExecutionChain, options: &CodegenOptions) -> CodegenResult {
    let mut ctx = CodegenCtx::new(graph, chain, options);
    ctx.check_read_order();
    ctx.emit_all();
    ctx.build_result()
}

// ── Internal context ────────────────────────────────────────────────────────

struct CodegenCtx<'a> {
    graph: &'a Graph,
    chain: &'a ExecutionChain,
    options: &'a CodegenOptions,
    out: String,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> CodegenCtx<'a> {
    fn new(graph: &'a Graph, chain: &'a ExecutionChain, options: &'a CodegenOptions) -> Self {
        CodegenCtx {
            graph,
            chain,
            options,
            out: String::with_capacity(4096),
            diagnostics: Vec::new(),
        }
    }

    fn build_result(self) -> CodegenResult {
        CodegenResult {
            generated: GeneratedCode {
                c_source: self.out,
            },
            diagnostics: self.diagnostics,
        }
    }

    fn nodes(&self) -> impl Iterator<Item = &'a Node> + 'a {
        let (graph, chain) = (self.graph, self.chain);
        chain.iter().filter_map(move |id| graph.get(id))
    }

    /// Every outlet read during a tick must already hold this tick's value.
    fn check_read_order(&mut self) {
        let mut computed: HashSet<NodeId> = HashSet::new();
        for node in self.nodes() {
            for inlet in &node.inlets {
                if let Some(Source::Outlet { node: src, .. }) = inlet.source {
                    if !computed.contains(&src) {
                        self.diagnostics.push(Diagnostic::error(
                            codes::E0601,
                            node.span,
                            format!(
                                "inlet `{}` of `{}` (node {}) reads node {} before it is computed",
                                inlet.name, node.kind, node.id, src
                            ),
                        ));
                    }
                }
            }
            computed.insert(node.id);
        }
    }

    // ── Top-level emit ──────────────────────────────────────────────────

    fn emit_all(&mut self) {
        self.emit_preamble();
        self.emit_declarations();
        let setup = [phase(self, init)];
        let per_sample = [
            phase(self, tick_start),
            phase(self, tick),
            phase(self, tick_end),
        ];
        let teardown = [phase(self, deinit)];
        self.emit_routine("init", &setup);
        self.emit_routine("dsptick", &per_sample);
        self.emit_routine("deinit", &teardown);
    }

    fn emit_preamble(&mut self) {
        let _ = writeln!(
            self.out,
            "/* Generated by pdc {}. Do not edit. */",
            env!("CARGO_PKG_VERSION")
        );
        if let Some(hash) = &self.options.source_hash {
            let _ = writeln!(self.out, "/* Source SHA-256: {} */", hash);
        }
        self.out.push_str("#include <math.h>\n");
        self.out.push_str("#include <stdio.h>\n");
        self.out.push('\n');
        let _ = writeln!(
            self.out,
            "static const float SAMPLE_RATE = {};",
            float_literal(self.options.sample_rate)
        );
        let _ = writeln!(
            self.out,
            "static const float TWO_PI = {};",
            float_literal(std::f32::consts::TAU)
        );
        self.out.push('\n');
    }

    fn emit_declarations(&mut self) {
        let lines = phase(self, declare);
        for line in &lines {
            let _ = writeln!(self.out, "{}", line);
        }
        if !lines.is_empty() {
            self.out.push('\n');
        }
    }

    fn emit_routine(&mut self, name: &str, phases: &[Vec<String>]) {
        let _ = writeln!(self.out, "void {}(void) {{", name);
        for line in phases.iter().flatten() {
            let _ = writeln!(self.out, "    {}", line);
        }
        self.out.push_str("}\n");
        if name != "deinit" {
            self.out.push('\n');
        }
    }
}

/// Concatenate one phase's fragments across the whole chain.
fn phase(ctx: &CodegenCtx<'_>, fragments: fn(&Node) -> Vec<String>) -> Vec<String> {
    ctx.nodes().flat_map(fragments).collect()
}

// ── Naming ──────────────────────────────────────────────────────────────────

fn var(id: NodeId, name: &str) -> String {
    format!("n{}_{}", id, name)
}

fn outlet_var(id: NodeId, outlet: usize) -> String {
    format!("n{}_out{}", id, outlet)
}

/// Shortest literal that reads back as the same `f32`.
pub fn float_literal(value: f32) -> String {
    format!("{:?}f", value)
}

/// C expression for an inlet's current value.
fn source_expr(inlet: &Inlet) -> String {
    match inlet.source {
        Some(Source::Outlet { node, outlet }) => outlet_var(node, outlet),
        Some(Source::Constant(value)) => float_literal(value),
        None => float_literal(0.0),
    }
}

fn input(node: &Node, index: usize) -> String {
    source_expr(&node.inlets[index])
}

// ── Declare ─────────────────────────────────────────────────────────────────

fn declare(node: &Node) -> Vec<String> {
    match node.kind {
        OpKind::Dac => vec![format!("static FILE *{} = NULL;", var(node.id, "file"))],
        OpKind::Phasor | OpKind::Osc => {
            vec![format!("static float {} = 0.0f;", var(node.id, "phase"))]
        }
        OpKind::Add
        | OpKind::Sub
        | OpKind::Mul
        | OpKind::Div
        | OpKind::Max
        | OpKind::Min
        | OpKind::Pow
        | OpKind::Log
        | OpKind::Abs
        | OpKind::Exp
        | OpKind::Wrap
        | OpKind::Cos
        | OpKind::Sig
        | OpKind::Clip => Vec::new(),
    }
}

// ── Init ────────────────────────────────────────────────────────────────────

fn init(node: &Node) -> Vec<String> {
    match node.kind {
        OpKind::Dac => vec![format!(
            "{} = fopen(\"dac_{}.f32\", \"wb\");",
            var(node.id, "file"),
            node.id
        )],
        OpKind::Phasor | OpKind::Osc => vec![format!("{} = 0.0f;", var(node.id, "phase"))],
        OpKind::Add
        | OpKind::Sub
        | OpKind::Mul
        | OpKind::Div
        | OpKind::Max
        | OpKind::Min
        | OpKind::Pow
        | OpKind::Log
        | OpKind::Abs
        | OpKind::Exp
        | OpKind::Wrap
        | OpKind::Cos
        | OpKind::Sig
        | OpKind::Clip => Vec::new(),
    }
}

// ── Tick ────────────────────────────────────────────────────────────────────

/// Hook run before any node's main tick. No kind uses it yet.
fn tick_start(node: &Node) -> Vec<String> {
    match node.kind {
        OpKind::Dac
        | OpKind::Phasor
        | OpKind::Osc
        | OpKind::Add
        | OpKind::Sub
        | OpKind::Mul
        | OpKind::Div
        | OpKind::Max
        | OpKind::Min
        | OpKind::Pow
        | OpKind::Log
        | OpKind::Abs
        | OpKind::Exp
        | OpKind::Wrap
        | OpKind::Cos
        | OpKind::Sig
        | OpKind::Clip => Vec::new(),
    }
}

fn tick(node: &Node) -> Vec<String> {
    let id = node.id;
    let out = outlet_var(id, 0);
    match node.kind {
        OpKind::Dac => {
            let frame = var(id, "frame");
            let file = var(id, "file");
            vec![
                format!(
                    "const float {}[2] = {{ {}, {} }};",
                    frame,
                    input(node, 0),
                    input(node, 1)
                ),
                format!("if ({} != NULL) {{", file),
                format!("    fwrite({0}, sizeof({0}), 1, {1});", frame, file),
                "}".to_string(),
            ]
        }
        // The outlet reads the phase before it advances.
        OpKind::Phasor => {
            let phase = var(id, "phase");
            let inc = var(id, "increment");
            vec![
                format!("const float {} = {};", out, phase),
                format!("const float {} = {} / SAMPLE_RATE;", inc, input(node, 0)),
                format!("{0} = fmodf({0} + {1}, 1.0f);", phase, inc),
            ]
        }
        OpKind::Osc => {
            let phase = var(id, "phase");
            let inc = var(id, "increment");
            vec![
                format!("const float {} = cosf({});", out, phase),
                format!(
                    "const float {} = {} * TWO_PI / SAMPLE_RATE;",
                    inc,
                    input(node, 0)
                ),
                format!("{0} = fmodf({0} + {1}, TWO_PI);", phase, inc),
            ]
        }
        OpKind::Add => binop(node, &out, "+"),
        OpKind::Sub => binop(node, &out, "-"),
        OpKind::Mul => binop(node, &out, "*"),
        OpKind::Div => binop(node, &out, "/"),
        OpKind::Max => binfn(node, &out, "fmaxf"),
        OpKind::Min => binfn(node, &out, "fminf"),
        OpKind::Pow => binfn(node, &out, "powf"),
        OpKind::Log => {
            let value = input(node, 0);
            if node.inlets[1].source.is_some() {
                vec![format!(
                    "const float {} = logf({}) / logf({});",
                    out,
                    value,
                    input(node, 1)
                )]
            } else {
                vec![format!("const float {} = logf({});", out, value)]
            }
        }
        OpKind::Abs => vec![format!("const float {} = fabsf({});", out, input(node, 0))],
        OpKind::Exp => vec![format!("const float {} = expf({});", out, input(node, 0))],
        OpKind::Wrap => {
            let x = input(node, 0);
            vec![format!(
                "const float {0} = ({1} > 0.0f) ? ({1} - truncf({1})) : ({1} - (truncf({1}) - 1.0f));",
                out, x
            )]
        }
        OpKind::Cos => vec![format!(
            "const float {} = cosf({} * TWO_PI);",
            out,
            input(node, 0)
        )],
        OpKind::Sig => vec![format!("const float {} = {};", out, input(node, 0))],
        OpKind::Clip => {
            let (x, lo, hi) = (input(node, 0), input(node, 1), input(node, 2));
            vec![format!(
                "const float {0} = ({1} < {2}) ? {2} : (({1} > {3}) ? {3} : {1});",
                out, x, lo, hi
            )]
        }
    }
}

fn binop(node: &Node, out: &str, op: &str) -> Vec<String> {
    vec![format!(
        "const float {} = {} {} {};",
        out,
        input(node, 0),
        op,
        input(node, 1)
    )]
}

fn binfn(node: &Node, out: &str, func: &str) -> Vec<String> {
    vec![format!(
        "const float {} = {}({}, {});",
        out,
        func,
        input(node, 0),
        input(node, 1)
    )]
}

/// Hook run after every node's main tick. No kind uses it yet.
fn tick_end(node: &Node) -> Vec<String> {
    match node.kind {
        OpKind::Dac
        | OpKind::Phasor
        | OpKind::Osc
        | OpKind::Add
        | OpKind::Sub
        | OpKind::Mul
        | OpKind::Div
        | OpKind::Max
        | OpKind::Min
        | OpKind::Pow
        | OpKind::Log
        | OpKind::Abs
        | OpKind::Exp
        | OpKind::Wrap
        | OpKind::Cos
        | OpKind::Sig
        | OpKind::Clip => Vec::new(),
    }
}

// ── Deinit ──────────────────────────────────────────────────────────────────

fn deinit(node: &Node) -> Vec<String> {
    match node.kind {
        OpKind::Dac => {
            let file = var(node.id, "file");
            vec![
                format!("if ({} != NULL) {{", file),
                format!("    fclose({});", file),
                format!("    {} = NULL;", file),
                "}".to_string(),
            ]
        }
        OpKind::Phasor
        | OpKind::Osc
        | OpKind::Add
        | OpKind::Sub
        | OpKind::Mul
        | OpKind::Div
        | OpKind::Max
        | OpKind::Min
        | OpKind::Pow
        | OpKind::Log
        | OpKind::Abs
        | OpKind::Exp
        | OpKind::Wrap
        | OpKind::Cos
        | OpKind::Sig
        | OpKind::Clip => Vec::new(),
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
