// Behavioral tests for pdc at the library and CLI boundary.
//
// Scope:
// - Every operator kind compiles in a minimal patch
// - Default inlet resolution and dead-node elimination
// - Scenarios: phasor → dac, osc → add → dac, inlet out of range,
//   dependency cycles, logarithm base handling
// - Error taxonomy of the reader and graph builder
// - CLI exit codes and output placement

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};

use pdc::diag::{DiagLevel, Diagnostic, ErrorClass};
use pdc::driver::{compile_source, DriverError};
use pdc::operator::ALL_OPS;

fn project_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .expect("workspace root")
        .to_path_buf()
}

fn pdc_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_pdc"))
}

static COUNTER: AtomicUsize = AtomicUsize::new(0);

fn temp_dir(prefix: &str) -> PathBuf {
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let dir = std::env::temp_dir().join(format!("{}_{}_{}", prefix, std::process::id(), n));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn compile_ok(source: &str) -> String {
    match compile_source(source) {
        Ok(c) => c.c_source,
        Err(DriverError::Compile { diagnostics }) => {
            panic!("unexpected diagnostics: {:#?}", diagnostics)
        }
        Err(e) => panic!("unexpected error: {}", e),
    }
}

fn compile_err(source: &str) -> Vec<Diagnostic> {
    match compile_source(source) {
        Ok(_) => panic!("expected compilation to fail:\n{}", source),
        Err(DriverError::Compile { diagnostics }) => diagnostics
            .into_iter()
            .filter(|d| d.level == DiagLevel::Error)
            .collect(),
        Err(e) => panic!("unexpected error: {}", e),
    }
}

fn error_classes(source: &str) -> Vec<ErrorClass> {
    compile_err(source).iter().filter_map(Diagnostic::class).collect()
}

/// Trimmed lines of one routine's body.
fn body(code: &str, routine: &str) -> Vec<String> {
    let header = format!("void {}(void) {{", routine);
    code.lines()
        .skip_while(|l| *l != header)
        .skip(1)
        .take_while(|l| *l != "}")
        .map(|l| l.trim().to_string())
        .collect()
}

// ── Operator coverage ───────────────────────────────────────────────────────

#[test]
fn every_operator_compiles_alone() {
    for op in ALL_OPS {
        let src = if op.is_sink() {
            "#X obj 0 0 dac~;\n".to_string()
        } else {
            format!("#X obj 0 0 {};\n#X obj 0 0 dac~;\n#X connect 0 0 1 0;\n", op)
        };
        let code = compile_ok(&src);
        assert!(
            body(&code, "dsptick").len() >= 2,
            "{} emitted no tick fragment",
            op
        );
    }
}

#[test]
fn every_operator_compiles_with_parameters() {
    for op in ALL_OPS {
        let src = if op.is_sink() {
            "#X obj 0 0 dac~ 1 2;\n".to_string()
        } else {
            format!(
                "#X obj 0 0 {} 2 3;\n#X obj 0 0 dac~;\n#X connect 0 0 1 0;\n",
                op
            )
        };
        compile_ok(&src);
    }
}

#[test]
fn operator_tick_expressions() {
    let cases = [
        ("/~", "const float n1_out0 = n0_out0 / 2.0f;"),
        ("max~", "const float n1_out0 = fmaxf(n0_out0, 2.0f);"),
        ("min~", "const float n1_out0 = fminf(n0_out0, 2.0f);"),
        ("pow~", "const float n1_out0 = powf(n0_out0, 2.0f);"),
        ("abs~", "const float n1_out0 = fabsf(n0_out0);"),
        ("exp~", "const float n1_out0 = expf(n0_out0);"),
        ("cos~", "const float n1_out0 = cosf(n0_out0 * TWO_PI);"),
    ];
    for (op, expected) in cases {
        let code = compile_ok(&format!(
            "#X obj 0 0 sig~ 3;\n#X obj 0 0 {} 2;\n#X obj 0 0 dac~;\n\
             #X connect 0 0 1 0;\n#X connect 1 0 2 0;\n",
            op
        ));
        let tick = body(&code, "dsptick");
        assert_eq!(tick[0], "const float n0_out0 = 3.0f;");
        assert_eq!(tick[1], expected, "{}", op);
    }
}

#[test]
fn unconnected_binary_operators_read_zero() {
    let code = compile_ok("#X obj 0 0 max~;\n#X obj 0 0 dac~;\n#X connect 0 0 1 0;\n");
    assert_eq!(body(&code, "dsptick")[0], "const float n0_out0 = fmaxf(0.0f, 0.0f);");
    let code = compile_ok("#X obj 0 0 cos~;\n#X obj 0 0 dac~;\n#X connect 0 0 1 0;\n");
    assert_eq!(body(&code, "dsptick")[0], "const float n0_out0 = cosf(0.0f * TWO_PI);");
}

// ── Default resolution ──────────────────────────────────────────────────────

#[test]
fn unconnected_inlet_defaults_to_zero() {
    let code = compile_ok("#X obj 0 0 -~;\n#X obj 0 0 dac~;\n#X connect 0 0 1 0;\n");
    assert!(body(&code, "dsptick").contains(&"const float n0_out0 = 0.0f - 0.0f;".to_string()));
}

#[test]
fn parameter_becomes_constant() {
    let code = compile_ok("#X obj 0 0 -~ 0.25;\n#X obj 0 0 dac~;\n#X connect 0 0 1 0;\n");
    assert!(body(&code, "dsptick").contains(&"const float n0_out0 = 0.0f - 0.25f;".to_string()));
}

#[test]
fn dead_node_absent_from_output() {
    let code = compile_ok(
        "#X obj 0 0 osc~ 440;\n#X obj 0 0 phasor~ 3;\n#X obj 0 0 exp~;\n#X obj 0 0 dac~;\n\
         #X connect 1 0 2 0;\n#X connect 0 0 3 0;\n",
    );
    for name in ["n1_", "n2_", "expf", "3.0f"] {
        assert!(!code.contains(name), "dead node leaked `{}`:\n{}", name, code);
    }
}

// ── Scenarios ───────────────────────────────────────────────────────────────

#[test]
fn scenario_phasor_to_left_channel() {
    let code = compile_ok("#X obj 0 0 phasor~ 440;\n#X obj 0 0 dac~;\n#X connect 0 0 1 0;\n");
    assert_eq!(
        body(&code, "dsptick"),
        vec![
            "const float n0_out0 = n0_phase;",
            "const float n0_increment = 440.0f / SAMPLE_RATE;",
            "n0_phase = fmodf(n0_phase + n0_increment, 1.0f);",
            "const float n1_frame[2] = { n0_out0, 0.0f };",
            "if (n1_file != NULL) {",
            "fwrite(n1_frame, sizeof(n1_frame), 1, n1_file);",
            "}",
        ]
    );
}

#[test]
fn scenario_osc_plus_offset() {
    let code = compile_ok(
        "#X obj 0 0 osc~ 220;\n#X obj 0 0 +~ 0.5;\n#X obj 0 0 dac~;\n\
         #X connect 0 0 1 0;\n#X connect 1 0 2 0;\n",
    );
    let tick = body(&code, "dsptick");
    assert_eq!(
        &tick[..5],
        &[
            "const float n0_out0 = cosf(n0_phase);",
            "const float n0_increment = 220.0f * TWO_PI / SAMPLE_RATE;",
            "n0_phase = fmodf(n0_phase + n0_increment, TWO_PI);",
            "const float n1_out0 = n0_out0 + 0.5f;",
            "const float n2_frame[2] = { n1_out0, 0.0f };",
        ]
    );
}

#[test]
fn scenario_inlet_out_of_range() {
    let errors = compile_err("#X obj 0 0 osc~ 440;\n#X obj 0 0 *~;\n#X connect 0 0 1 5;\n");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].class(), Some(ErrorClass::IndexOutOfRange));
    assert!(errors[0].message.contains("inlet 5"), "{}", errors[0].message);
}

#[test]
fn scenario_direct_cycle() {
    let classes = error_classes(
        "#X obj 0 0 +~;\n#X obj 0 0 *~;\n#X obj 0 0 dac~;\n\
         #X connect 0 0 1 0;\n#X connect 1 0 0 0;\n#X connect 1 0 2 0;\n",
    );
    assert_eq!(classes, vec![ErrorClass::CyclicDependency]);
}

#[test]
fn scenario_transitive_cycle() {
    let classes = error_classes(
        "#X obj 0 0 abs~;\n#X obj 0 0 exp~;\n#X obj 0 0 wrap~;\n#X obj 0 0 dac~;\n\
         #X connect 0 0 1 0;\n#X connect 1 0 2 0;\n#X connect 2 0 0 0;\n#X connect 2 0 3 1;\n",
    );
    assert_eq!(classes, vec![ErrorClass::CyclicDependency]);
}

#[test]
fn scenario_log_natural() {
    let code = compile_ok(
        "#X obj 0 0 sig~ 5;\n#X obj 0 0 log~;\n#X obj 0 0 dac~;\n\
         #X connect 0 0 1 0;\n#X connect 1 0 2 0;\n",
    );
    assert!(body(&code, "dsptick").contains(&"const float n1_out0 = logf(n0_out0);".to_string()));
}

#[test]
fn scenario_log_with_base() {
    let code = compile_ok(
        "#X obj 0 0 sig~ 5;\n#X obj 0 0 sig~ 2;\n#X obj 0 0 log~;\n#X obj 0 0 dac~;\n\
         #X connect 0 0 2 0;\n#X connect 1 0 2 1;\n#X connect 2 0 3 0;\n",
    );
    assert!(body(&code, "dsptick")
        .contains(&"const float n2_out0 = logf(n0_out0) / logf(n1_out0);".to_string()));
}

// ── Reader and builder errors ───────────────────────────────────────────────

#[test]
fn unknown_operator_is_fatal() {
    let errors = compile_err("#X obj 0 0 lop~ 1000;\n#X obj 0 0 dac~;\n");
    assert_eq!(errors[0].class(), Some(ErrorClass::UnknownOperator));
    assert!(errors[0].hint.as_deref().is_some_and(|h| h.contains("osc~")));
}

#[test]
fn parse_error_kinds() {
    for src in [
        "#Q obj 0 0 dac~;\n",
        "#X widget 0 0;\n",
        "#X obj 0;\n",
        "#X obj 0 0;\n",
        "#X connect 0 0 1;\n",
        "#X connect 0 zero 1 0;\n",
        "#X connect 0 -1 1 0;\n",
        "#X obj 0 0 osc~ fast;\n#X obj 0 0 dac~;\n",
    ] {
        assert_eq!(
            error_classes(src),
            vec![ErrorClass::Parse],
            "expected one parse error for {:?}",
            src
        );
    }
}

#[test]
fn reader_reports_every_bad_record() {
    let errors = compile_err("#X obj 0 0 foo~;\n#X bogus;\n#X obj 0 0 dac~;\n#X obj 0 0 bar~;\n");
    assert_eq!(errors.len(), 3);
}

#[test]
fn connection_index_errors() {
    for src in [
        "#X obj 0 0 dac~;\n#X connect 3 0 0 0;\n",
        "#X obj 0 0 osc~;\n#X obj 0 0 dac~;\n#X connect 0 1 1 0;\n",
        "#X obj 0 0 osc~;\n#X obj 0 0 dac~;\n#X connect 0 0 1 2;\n",
        "#X msg 0 0 bang;\n#X obj 0 0 dac~;\n#X connect 0 0 1 0;\n",
        "#X obj 0 0 dac~;\n#X connect 99999999999999999999 0 0 0;\n",
    ] {
        assert_eq!(error_classes(src), vec![ErrorClass::IndexOutOfRange], "{:?}", src);
    }
}

#[test]
fn ignored_records_and_boxes() {
    let code = compile_ok(
        "#N canvas 0 0 450 300 10;\n#A 0 0.1 0.2 0.3;\nstray words;\n\
         #X text 0 0 note \\; with escaped separator;\n#X msg 0 0;\n\
         #X obj 0 0 sig~ 1;\n#X obj 0 0 dac~;\n#X connect 2 0 3 0;\n",
    );
    assert!(body(&code, "dsptick").contains(&"const float n0_out0 = 1.0f;".to_string()));
}

#[test]
fn escaped_space_in_comment_compiles() {
    let code = compile_ok(
        "#X text 0 0 file\\ name here;\n#X obj 0 0 sig~ 1;\n#X obj 0 0 dac~;\n\
         #X connect 1 0 2 0;\n",
    );
    assert!(body(&code, "dsptick").contains(&"const float n0_out0 = 1.0f;".to_string()));

    let code = compile_ok("#X msg 0 0 hello \\\n;\n#X obj 0 0 sig~ 1;\n#X obj 0 0 dac~;\n\
                           #X connect 1 0 2 0;\n");
    assert!(code.contains("n2_frame"));
}

#[test]
fn duplicate_connection_last_wins() {
    let compiled = compile_source(
        "#X obj 0 0 sig~ 1;\n#X obj 0 0 sig~ 2;\n#X obj 0 0 dac~;\n\
         #X connect 0 0 2 0;\n#X connect 1 0 2 0;\n",
    )
    .expect("compiles");
    assert!(compiled
        .c_source
        .contains("const float n2_frame[2] = { n1_out0, 0.0f };"));
    assert_eq!(compiled.diagnostics.len(), 1);
    assert_eq!(compiled.diagnostics[0].level, DiagLevel::Warning);
}

#[test]
fn sample_patches_compile() {
    for name in ["saw.pd", "tone.pd", "shaper.pd"] {
        let path = project_root().join("patches").join(name);
        let source = std::fs::read_to_string(&path).expect("read patch");
        let code = compile_ok(&source);
        assert!(code.contains("fopen(\"dac_"), "{} has no sink", name);
    }
}

// ── CLI ─────────────────────────────────────────────────────────────────────

#[test]
fn cli_writes_c_next_to_patch() {
    let dir = temp_dir("pdc_cli_ok");
    let input = dir.join("saw.pd");
    std::fs::copy(project_root().join("patches/saw.pd"), &input).expect("copy patch");

    let output = Command::new(pdc_binary())
        .arg(&input)
        .output()
        .expect("failed to run pdc");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let code = std::fs::read_to_string(dir.join("saw.c")).expect("output written");
    assert!(code.contains("void dsptick(void) {"));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn cli_compile_error_exit_code() {
    let dir = temp_dir("pdc_cli_err");
    let input = dir.join("bad.pd");
    std::fs::write(&input, "#X obj 0 0 osc~ 440;\n#X obj 0 0 *~;\n#X connect 0 0 1 5;\n")
        .expect("write patch");

    let output = Command::new(pdc_binary())
        .arg(&input)
        .output()
        .expect("failed to run pdc");
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error[E0202]"), "stderr: {}", stderr);
    assert!(stderr.contains("bad.pd:3:1:"), "stderr: {}", stderr);
    assert!(!dir.join("bad.c").exists());
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn cli_missing_input_exit_code() {
    let dir = temp_dir("pdc_cli_missing");
    let output = Command::new(pdc_binary())
        .arg(dir.join("absent.pd"))
        .output()
        .expect("failed to run pdc");
    assert_eq!(output.status.code(), Some(2));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn cli_requires_an_argument() {
    let output = Command::new(pdc_binary())
        .output()
        .expect("failed to run pdc");
    assert!(!output.status.success());
}
