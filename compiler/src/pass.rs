// pass.rs — Pass descriptor module: metadata and dependency resolution
//
// Declares the compiler's semantic passes (reading the patch is outside the
// runner) and their dependency edges. Used by the pipeline runner to compute
// the pass subset for a terminal pass.

use std::collections::HashSet;

// ── Pass identifiers ───────────────────────────────────────────────────────

/// Identifies each compiler pass (parse excluded, handled before the runner).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassId {
    BuildGraph,
    Schedule,
    Codegen,
}

// ── Stage certificates ─────────────────────────────────────────────────────

/// Checkable postconditions a pass hands to the runner.
pub trait StageCert {
    /// True when every obligation holds.
    fn all_pass(&self) -> bool;
    /// Named obligations with their outcome, in a stable order.
    fn obligations(&self) -> Vec<(&'static str, bool)>;

    /// Names of the obligations that failed.
    fn failed(&self) -> Vec<&'static str> {
        self.obligations()
            .into_iter()
            .filter(|(_, ok)| !ok)
            .map(|(name, _)| name)
            .collect()
    }
}

// ── Pass descriptor ────────────────────────────────────────────────────────

/// Static metadata about a compiler pass.
pub struct PassDescriptor {
    /// Human-readable name for diagnostics and logs.
    pub name: &'static str,
    /// Pass dependencies (other passes whose outputs this pass consumes).
    pub inputs: &'static [PassId],
}

/// Return the static descriptor for a given pass.
pub fn descriptor(id: PassId) -> PassDescriptor {
    match id {
        PassId::BuildGraph => PassDescriptor {
            name: "build_graph",
            inputs: &[],
        },
        PassId::Schedule => PassDescriptor {
            name: "schedule",
            inputs: &[PassId::BuildGraph],
        },
        PassId::Codegen => PassDescriptor {
            name: "codegen",
            inputs: &[PassId::Schedule],
        },
    }
}

// ── Dependency resolution ──────────────────────────────────────────────────

/// All pass IDs in declaration order (used for iteration).
pub const ALL_PASSES: [PassId; 3] = [PassId::BuildGraph, PassId::Schedule, PassId::Codegen];

/// Compute the minimal ordered set of passes needed to produce `terminal`.
/// Returns passes in topological (execution) order.
pub fn required_passes(terminal: PassId) -> Vec<PassId> {
    let mut visited = HashSet::new();
    let mut order = Vec::new();
    visit(terminal, &mut visited, &mut order);
    order
}

fn visit(id: PassId, visited: &mut HashSet<PassId>, order: &mut Vec<PassId>) {
    if !visited.insert(id) {
        return;
    }
    for &dep in descriptor(id).inputs {
        visit(dep, visited, order);
    }
    order.push(id);
}

// ── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_passes_codegen_includes_all() {
        assert_eq!(
            required_passes(PassId::Codegen),
            vec![PassId::BuildGraph, PassId::Schedule, PassId::Codegen]
        );
    }

    #[test]
    fn required_passes_schedule_skips_codegen() {
        let passes = required_passes(PassId::Schedule);
        assert_eq!(passes, vec![PassId::BuildGraph, PassId::Schedule]);
        assert!(!passes.contains(&PassId::Codegen));
    }

    #[test]
    fn required_passes_build_graph_is_minimal() {
        assert_eq!(required_passes(PassId::BuildGraph), vec![PassId::BuildGraph]);
    }

    #[test]
    fn descriptor_names_are_distinct() {
        let names: HashSet<_> = ALL_PASSES.iter().map(|p| descriptor(*p).name).collect();
        assert_eq!(names.len(), ALL_PASSES.len());
    }

    #[test]
    fn dependencies_precede_dependents() {
        for pass in &ALL_PASSES {
            let order = required_passes(*pass);
            let self_pos = order.iter().position(|p| p == pass);
            for dep in descriptor(*pass).inputs {
                let dep_pos = order.iter().position(|p| p == dep);
                assert!(
                    dep_pos < self_pos,
                    "{:?} depends on {:?} but it comes later in topological order",
                    pass,
                    dep
                );
            }
        }
    }

    struct Fixed(Vec<(&'static str, bool)>);

    impl StageCert for Fixed {
        fn all_pass(&self) -> bool {
            self.0.iter().all(|(_, ok)| *ok)
        }

        fn obligations(&self) -> Vec<(&'static str, bool)> {
            self.0.clone()
        }
    }

    #[test]
    fn failed_lists_broken_obligations() {
        let cert = Fixed(vec![("A", true), ("B", false), ("C", false)]);
        assert!(!cert.all_pass());
        assert_eq!(cert.failed(), vec!["B", "C"]);
    }
}
