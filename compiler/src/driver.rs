// driver.rs — File boundary: read a patch, compile it, write the C program
//
// Preconditions: none.
// Postconditions: on success the output file holds the complete program; on
//                 any failure no output file is created or modified.
// Failure modes: unreadable input, unwritable output, or error diagnostics
//                from any phase → `DriverError`.
// Side effects: reads the input file; writes a temporary sibling of the
//               output file and renames it into place.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::codegen::CodegenOptions;
use crate::diag::{DiagLevel, Diagnostic};
use crate::pass::PassId;
use crate::pipeline::{compute_provenance, run_pipeline, CompilationState, Provenance};

/// Extension of generated programs.
pub const OUTPUT_EXTENSION: &str = "c";

/// Errors that end a compilation.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Failed to read the patch
    #[error("failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to write the generated program
    #[error("failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Replacing the extension would overwrite the input
    #[error("output path '{0}' is the input file")]
    OutputIsInput(PathBuf),

    /// Some phase reported errors
    #[error("compilation failed with {} error(s)", error_count(.diagnostics))]
    Compile { diagnostics: Vec<Diagnostic> },
}

fn error_count(diagnostics: &[Diagnostic]) -> usize {
    diagnostics
        .iter()
        .filter(|d| d.level == DiagLevel::Error)
        .count()
}

/// A successful in-memory compilation.
#[derive(Debug)]
pub struct Compilation {
    pub c_source: String,
    /// Warnings from every phase, in phase order.
    pub diagnostics: Vec<Diagnostic>,
    pub provenance: Provenance,
}

/// A successful file compilation.
#[derive(Debug)]
pub struct CompiledFile {
    pub output: PathBuf,
    pub diagnostics: Vec<Diagnostic>,
}

/// Input path with its extension replaced by `c`.
pub fn output_path(input: &Path) -> PathBuf {
    input.with_extension(OUTPUT_EXTENSION)
}

/// Compile patch text to C source.
pub fn compile_source(source: &str) -> Result<Compilation, DriverError> {
    let parsed = crate::parser::parse(source);
    if parsed.has_errors() {
        return Err(DriverError::Compile {
            diagnostics: parsed.diagnostics,
        });
    }

    let provenance = compute_provenance(source);
    let options = CodegenOptions {
        source_hash: Some(provenance.source_hash_hex()),
        ..CodegenOptions::default()
    };

    let mut state = CompilationState::new(parsed.patch);
    state.diagnostics = parsed.diagnostics;
    state.provenance = Some(provenance);

    let outcome = run_pipeline(&mut state, PassId::Codegen, &options, |_, _| {});
    let diagnostics = state.diagnostics;
    if let Err(e) = outcome {
        tracing::debug!(error = %e, "pipeline stopped");
        return Err(DriverError::Compile { diagnostics });
    }

    match (state.generated, state.provenance) {
        (Some(generated), Some(provenance)) => Ok(Compilation {
            c_source: generated.c_source,
            diagnostics,
            provenance,
        }),
        _ => Err(DriverError::Compile { diagnostics }),
    }
}

/// Read a patch file.
pub fn read_source(input: &Path) -> Result<String, DriverError> {
    fs::read_to_string(input).map_err(|source| DriverError::Read {
        path: input.to_path_buf(),
        source,
    })
}

/// Compile `input` and write the program next to it.
pub fn compile_file(input: &Path) -> Result<CompiledFile, DriverError> {
    let source = read_source(input)?;
    compile_to_file(input, &source)
}

/// Compile `source`, already read from `input`, and write the program next
/// to `input`. Diagnostic spans refer to `source`.
pub fn compile_to_file(input: &Path, source: &str) -> Result<CompiledFile, DriverError> {
    let output = output_path(input);
    if output == input {
        return Err(DriverError::OutputIsInput(output));
    }

    let compilation = compile_source(source)?;
    write_atomically(&output, &compilation.c_source).map_err(|source| DriverError::Write {
        path: output.clone(),
        source,
    })?;

    tracing::info!(
        input = %input.display(),
        output = %output.display(),
        bytes = compilation.c_source.len(),
        "wrote generated program"
    );

    Ok(CompiledFile {
        output,
        diagnostics: compilation.diagnostics,
    })
}

/// Write to a temporary sibling, then rename over `path`.
fn write_atomically(path: &Path, contents: &str) -> io::Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{}.{}.tmp", file_name, std::process::id()));

    if let Err(e) = fs::write(&tmp, contents) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}
