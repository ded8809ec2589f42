// Property-based tests for compiler invariants.
//
// Three categories:
// 1. Acyclic patches: generated DAG patches compile, schedule, and verify
// 2. Arbitrary wiring: random connections never panic and always fail with
//    a classified error
// 3. Literals: emitted float constants read back as the same value
//
// Uses proptest with explicit configuration to prevent CI flakiness.

use std::collections::HashSet;

use pdc::driver::{compile_source, DriverError};
use pdc::graph::Source;
use pdc::id::NodeId;
use pdc::operator::{OpKind, ALL_OPS};
use pdc::pass::StageCert;
use proptest::prelude::*;

// ── Patch generator ─────────────────────────────────────────────────────────

/// One generated object box: kind plus literal parameters.
type ArbObject = (OpKind, Vec<f32>);

fn arb_object() -> impl Strategy<Value = ArbObject> {
    (
        prop::sample::select(ALL_OPS.to_vec()),
        prop::collection::vec(-1000.0f32..1000.0f32, 0..=2),
    )
}

fn render_patch(objects: &[ArbObject], edges: &[(usize, usize, usize, usize)]) -> String {
    let mut src = String::from("#N canvas 0 0 450 300 10;\n");
    for (i, (op, params)) in objects.iter().enumerate() {
        src.push_str(&format!("#X obj {} {} {}", i * 10, i * 20, op));
        for p in params {
            src.push_str(&format!(" {:?}", p));
        }
        src.push_str(";\n");
    }
    for (s, o, t, i) in edges {
        src.push_str(&format!("#X connect {} {} {} {};\n", s, o, t, i));
    }
    src
}

/// Patches whose connections only run from lower to higher box index, so the
/// graph is acyclic and every index is in range.
fn arb_dag_patch() -> impl Strategy<Value = String> {
    (
        prop::collection::vec(arb_object(), 1..12),
        prop::collection::vec(any::<(u16, u16, u8)>(), 0..24),
    )
        .prop_map(|(objects, raw_edges)| {
            let n = objects.len();
            let edges: Vec<_> = raw_edges
                .into_iter()
                .filter_map(|(a, b, k)| {
                    let (a, b) = (a as usize % n, b as usize % n);
                    let (src, dst) = (a.min(b), a.max(b));
                    if src == dst || objects[src].0.outlet_count() == 0 {
                        return None;
                    }
                    let inlet = k as usize % objects[dst].0.inlet_names().len();
                    Some((src, 0, dst, inlet))
                })
                .collect();
            render_patch(&objects, &edges)
        })
}

/// Patches with unconstrained wiring: cycles, self-loops, and out-of-range
/// indices all occur.
fn arb_wild_patch() -> impl Strategy<Value = String> {
    (
        prop::collection::vec(arb_object(), 1..8),
        prop::collection::vec((0usize..10, 0usize..3, 0usize..10, 0usize..4), 0..16),
    )
        .prop_map(|(objects, edges)| render_patch(&objects, &edges))
}

// ── Acyclic patches ─────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 100,
        max_shrink_iters: 200,
        .. ProptestConfig::default()
    })]

    #[test]
    fn dag_patches_compile_deterministically(patch in arb_dag_patch()) {
        let first = compile_source(&patch);
        prop_assert!(first.is_ok(), "compile failed for patch:\n{}\n{:?}", patch, first.as_ref().err());
        let second = compile_source(&patch);
        prop_assert_eq!(
            first.map(|c| c.c_source).ok(),
            second.map(|c| c.c_source).ok()
        );
    }

    #[test]
    fn chain_is_backward_closure_of_sinks(patch in arb_dag_patch()) {
        let parsed = pdc::parser::parse(&patch);
        prop_assert!(!parsed.has_errors());
        let built = pdc::graph::build_graph(&parsed.patch);
        prop_assert!(!pdc::diag::has_errors(&built.diagnostics));
        let graph = built.graph;

        let scheduled = pdc::schedule::schedule(&graph);
        prop_assert!(scheduled.diagnostics.is_empty());
        let chain = scheduled.chain;

        let cert = pdc::schedule::verify_schedule(&chain, &graph);
        prop_assert!(cert.all_pass(), "obligations: {:?}", cert.obligations());

        // Every chained node is a sink or feeds a chained node.
        let chained: HashSet<NodeId> = chain.iter().collect();
        let mut feeders: HashSet<NodeId> = HashSet::new();
        for id in chain.iter() {
            for inlet in &graph.node(id).inlets {
                if let Some(Source::Outlet { node, .. }) = inlet.source {
                    feeders.insert(node);
                }
            }
        }
        for id in chain.iter() {
            prop_assert!(
                graph.node(id).kind.is_sink() || feeders.contains(&id),
                "node {} is scheduled but feeds nothing scheduled",
                id
            );
        }
        prop_assert!(feeders.is_subset(&chained));
    }
}

// ── Arbitrary wiring ────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 200,
        max_shrink_iters: 200,
        .. ProptestConfig::default()
    })]

    #[test]
    fn wild_patches_fail_cleanly(patch in arb_wild_patch()) {
        match compile_source(&patch) {
            Ok(compiled) => {
                prop_assert!(compiled.c_source.contains("void dsptick(void) {"), "missing dsptick definition");
            }
            Err(DriverError::Compile { diagnostics }) => {
                let errors: Vec<_> = diagnostics.iter().filter(|d| d.is_error()).collect();
                prop_assert!(!errors.is_empty());
                for e in errors {
                    prop_assert!(e.class().is_some(), "unclassified error: {}", e);
                }
            }
            Err(other) => prop_assert!(false, "unexpected error: {}", other),
        }
    }
}

// ── Literals ────────────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 500,
        .. ProptestConfig::default()
    })]

    #[test]
    fn float_literals_round_trip(value in prop::num::f32::NORMAL | prop::num::f32::ZERO | prop::num::f32::SUBNORMAL) {
        let literal = pdc::codegen::float_literal(value);
        prop_assert!(literal.ends_with('f'));
        let parsed: f32 = literal.trim_end_matches('f').parse().expect("parses");
        prop_assert_eq!(parsed.to_bits(), value.to_bits());
    }
}
