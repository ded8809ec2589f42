// pipeline.rs — Compilation state and pass orchestration
//
// Holds every pass artifact and runs the minimal set of passes for a given
// terminal PassId, stopping at the first pass that reports an error.
//
// Preconditions: the patch in `CompilationState` was read without errors.
// Postconditions: all artifacts for required passes are populated, or an error is returned.
// Failure modes: any pass emitting error-level diagnostics; schedule cert failure.
// Side effects: calls on_pass_complete after each pass for immediate display;
//               logs pass timings through `tracing`.

use std::fmt;
use std::time::{Duration, Instant};

use crate::ast::Patch;
use crate::codegen::{CodegenOptions, GeneratedCode};
use crate::diag::codes;
use crate::diag::{has_errors, Diagnostic};
use crate::graph::Graph;
use crate::pass::{descriptor, required_passes, PassId, StageCert};
use crate::schedule::ExecutionChain;

// ── Provenance ─────────────────────────────────────────────────────────────

/// Provenance metadata stamped into generated code.
///
/// `source_hash`: SHA-256 of the raw patch text.
#[derive(Debug, Clone)]
pub struct Provenance {
    pub source_hash: [u8; 32],
}

impl Provenance {
    /// Hex string of the source hash (64 characters).
    pub fn source_hash_hex(&self) -> String {
        bytes_to_hex(&self.source_hash)
    }
}

fn bytes_to_hex(bytes: &[u8; 32]) -> String {
    let mut s = String::with_capacity(64);
    for b in bytes {
        use std::fmt::Write;
        let _ = write!(s, "{:02x}", b);
    }
    s
}

/// Compute provenance from source text.
pub fn compute_provenance(source: &str) -> Provenance {
    use sha2::{Digest, Sha256};

    let source_hash = {
        let mut hasher = Sha256::new();
        hasher.update(source.as_bytes());
        let result = hasher.finalize();
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&result);
        hash
    };

    Provenance { source_hash }
}

// ── Artifact storage ───────────────────────────────────────────────────────

/// Holds all compilation artifacts and accumulated diagnostics.
pub struct CompilationState {
    pub patch: Patch,
    pub graph: Option<Graph>,
    pub chain: Option<ExecutionChain>,
    pub generated: Option<GeneratedCode>,
    pub diagnostics: Vec<Diagnostic>,
    pub provenance: Option<Provenance>,
}

impl CompilationState {
    pub fn new(patch: Patch) -> Self {
        Self {
            patch,
            graph: None,
            chain: None,
            generated: None,
            diagnostics: Vec::new(),
            provenance: None,
        }
    }
}

// ── Error type ─────────────────────────────────────────────────────────────

/// Pipeline execution failed due to error-level diagnostics in a pass.
/// The specific diagnostics are available in `CompilationState.diagnostics`.
#[derive(Debug)]
pub struct PipelineError {
    /// The pass that produced the error.
    pub failing_pass: PassId,
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} pass failed", descriptor(self.failing_pass).name)
    }
}

impl std::error::Error for PipelineError {}

// ── Helpers ────────────────────────────────────────────────────────────────

/// Per-pass post-processing: callback, accumulate, log, error check.
fn finish_pass(
    state: &mut CompilationState,
    pass_id: PassId,
    diags: Vec<Diagnostic>,
    elapsed: Duration,
    on_pass_complete: &mut impl FnMut(PassId, &[Diagnostic]),
) -> Result<(), PipelineError> {
    on_pass_complete(pass_id, &diags);
    let is_err = has_errors(&diags);
    state.diagnostics.extend(diags);
    tracing::debug!(
        pass = descriptor(pass_id).name,
        elapsed_ms = elapsed.as_secs_f64() * 1000.0,
        "pass complete"
    );
    if is_err {
        return Err(PipelineError {
            failing_pass: pass_id,
        });
    }
    Ok(())
}

/// Fetch an artifact an earlier pass must have produced.
fn require<T>(artifact: Option<&T>, pass_id: PassId) -> Result<&T, PipelineError> {
    artifact.ok_or(PipelineError {
        failing_pass: pass_id,
    })
}

fn cert_failure(what: &str, cert: &impl StageCert) -> Diagnostic {
    Diagnostic::error(
        codes::E0600,
        (0..0).into(),
        format!("{} verification failed: {}", what, cert.failed().join(", ")),
    )
}

// ── Pipeline runner ────────────────────────────────────────────────────────

/// Run the minimal set of passes to produce `terminal`.
///
/// Per-pass sequence: execute → on_pass_complete(callback) → log → error check.
///
/// Preconditions: `state.patch` is set.
/// Postconditions: artifacts for all passes in `required_passes(terminal)` are populated,
///   or the failing pass is returned.
/// Failure modes: any pass producing error-level diagnostics; schedule cert failure.
/// Side effects: calls `on_pass_complete` after each pass for immediate diagnostic display.
pub fn run_pipeline(
    state: &mut CompilationState,
    terminal: PassId,
    codegen_options: &CodegenOptions,
    mut on_pass_complete: impl FnMut(PassId, &[Diagnostic]),
) -> Result<(), PipelineError> {
    for pass_id in required_passes(terminal) {
        match pass_id {
            PassId::BuildGraph => {
                let t = Instant::now();
                let result = crate::graph::build_graph(&state.patch);
                let elapsed = t.elapsed();
                state.graph = Some(result.graph);
                finish_pass(
                    state,
                    PassId::BuildGraph,
                    result.diagnostics,
                    elapsed,
                    &mut on_pass_complete,
                )?;
            }
            PassId::Schedule => {
                let t = Instant::now();
                let graph = require(state.graph.as_ref(), PassId::Schedule)?;
                let result = crate::schedule::schedule(graph);
                let mut diags = result.diagnostics;
                // Chain is incomplete after a cycle; only verify clean schedules.
                if !has_errors(&diags) {
                    let cert = crate::schedule::verify_schedule(&result.chain, graph);
                    if !cert.all_pass() {
                        diags.push(cert_failure("schedule", &cert));
                    }
                }
                let elapsed = t.elapsed();
                state.chain = Some(result.chain);
                finish_pass(
                    state,
                    PassId::Schedule,
                    diags,
                    elapsed,
                    &mut on_pass_complete,
                )?;
            }
            PassId::Codegen => {
                let t = Instant::now();
                let graph = require(state.graph.as_ref(), PassId::Codegen)?;
                let chain = require(state.chain.as_ref(), PassId::Codegen)?;
                let result = crate::codegen::codegen(graph, chain, codegen_options);
                let elapsed = t.elapsed();
                state.generated = Some(result.generated);
                finish_pass(
                    state,
                    PassId::Codegen,
                    result.diagnostics,
                    elapsed,
                    &mut on_pass_complete,
                )?;
            }
        }
    }
    Ok(())
}

// ── Tests ──────────────────────────────────────────────────────────────────
