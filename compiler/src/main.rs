use clap::Parser;
use std::path::PathBuf;

use pdc::diag::{render, DiagLevel, Diagnostic};
use pdc::driver::DriverError;

#[derive(Parser, Debug)]
#[command(
    name = "pdc",
    version,
    about = "Pure Data patch compiler — compiles .pd signal patches to straight-line C",
    long_about = "Compiles a Pure Data signal patch to a C program defining init(), \
                  dsptick() and deinit(). The output is written next to the input with \
                  its extension replaced by .c."
)]
struct Cli {
    /// Input .pd patch file
    source: PathBuf,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    tracing::debug!(source = %cli.source.display(), "starting");

    let source = match pdc::driver::read_source(&cli.source) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("pdc: error: {}", e);
            std::process::exit(2);
        }
    };

    match pdc::driver::compile_to_file(&cli.source, &source) {
        Ok(compiled) => {
            print_diagnostics(&cli.source, &source, &compiled.diagnostics);
        }
        Err(DriverError::Compile { diagnostics }) => {
            print_diagnostics(&cli.source, &source, &diagnostics);
            let errors = diagnostics
                .iter()
                .filter(|d| d.level == DiagLevel::Error)
                .count();
            eprintln!(
                "pdc: {} error{}; no output written",
                errors,
                if errors == 1 { "" } else { "s" }
            );
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("pdc: error: {}", e);
            std::process::exit(2);
        }
    }
}

/// Diagnostics carry byte spans into the compiled source text.
fn print_diagnostics(path: &std::path::Path, source: &str, diagnostics: &[Diagnostic]) {
    let origin = path.display().to_string();
    for diag in diagnostics {
        eprintln!("pdc: {}", render(diag, source, &origin));
    }
}
