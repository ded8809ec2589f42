// diag.rs — Unified diagnostics model
//
// Provides the shared diagnostic types used across all compiler phases,
// the stable code table, and source-location rendering.
//
// Preconditions: none (types only).
// Postconditions: none (types only).
// Failure modes: none.
// Side effects: none.

use std::fmt;

use crate::ast::Span;

// ── Diagnostic code ──────────────────────────────────────────────────────

/// A stable diagnostic code (e.g., `E0001`, `W0100`).
///
/// Codes are `&'static str` constants defined in the `codes` module.
/// Once assigned, a code must never be reassigned to a different meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiagCode(pub &'static str);

impl fmt::Display for DiagCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Code table.
///
/// `E00xx` reader, `E01xx` operator lookup, `E02xx` connection resolution,
/// `E03xx` scheduling, `E06xx` internal verification, `Wxxxx` warnings.
pub mod codes {
    use super::DiagCode;

    /// Malformed record (lex error).
    pub const E0001: DiagCode = DiagCode("E0001");
    /// Unknown chunk tag after `#`.
    pub const E0002: DiagCode = DiagCode("E0002");
    /// Unknown element keyword after `#X`.
    pub const E0003: DiagCode = DiagCode("E0003");
    /// Missing or malformed required field.
    pub const E0004: DiagCode = DiagCode("E0004");
    /// Construction parameter is not a finite number.
    pub const E0005: DiagCode = DiagCode("E0005");

    /// Object type outside the supported operator set.
    pub const E0100: DiagCode = DiagCode("E0100");

    /// Connection names a box index past the end of the patch.
    pub const E0200: DiagCode = DiagCode("E0200");
    /// Connection names an outlet the source node does not have.
    pub const E0201: DiagCode = DiagCode("E0201");
    /// Connection names an inlet the target node does not have.
    pub const E0202: DiagCode = DiagCode("E0202");
    /// Connection endpoint is a message or comment box, not a signal object.
    pub const E0203: DiagCode = DiagCode("E0203");

    /// Dependency cycle reachable by the backward walk.
    pub const E0300: DiagCode = DiagCode("E0300");

    /// Schedule postcondition check failed.
    pub const E0600: DiagCode = DiagCode("E0600");
    /// Emitter reached a node whose input is not computed earlier in the tick.
    pub const E0601: DiagCode = DiagCode("E0601");

    /// Inlet bound by more than one connection; the last one wins.
    pub const W0100: DiagCode = DiagCode("W0100");
    /// Patch has no sink; the generated program produces no output.
    pub const W0101: DiagCode = DiagCode("W0101");
}

// ── Error taxonomy ───────────────────────────────────────────────────────

/// The failure classes a compilation can end in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Parse,
    UnknownOperator,
    IndexOutOfRange,
    CyclicDependency,
    Internal,
}

impl ErrorClass {
    pub fn of(code: DiagCode) -> Option<ErrorClass> {
        let digits = code.0.strip_prefix('E')?;
        match digits.get(..2)? {
            "00" => Some(ErrorClass::Parse),
            "01" => Some(ErrorClass::UnknownOperator),
            "02" => Some(ErrorClass::IndexOutOfRange),
            "03" => Some(ErrorClass::CyclicDependency),
            "06" => Some(ErrorClass::Internal),
            _ => None,
        }
    }
}

// ── Severity level ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagLevel {
    Error,
    Warning,
}

// ── Related span ─────────────────────────────────────────────────────────

/// A secondary source location providing context for a diagnostic.
#[derive(Debug, Clone)]
pub struct RelatedSpan {
    pub span: Span,
    pub label: String,
}

// ── Cause record ─────────────────────────────────────────────────────────

/// One link in a cause chain (e.g. one edge of a dependency cycle).
#[derive(Debug, Clone)]
pub struct CauseRecord {
    pub message: String,
    pub span: Option<Span>,
}

// ── Diagnostic ───────────────────────────────────────────────────────────

/// A compiler diagnostic emitted by any phase.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub code: Option<DiagCode>,
    pub level: DiagLevel,
    pub span: Span,
    pub message: String,
    pub hint: Option<String>,
    pub related_spans: Vec<RelatedSpan>,
    pub cause_chain: Vec<CauseRecord>,
}

impl Diagnostic {
    /// Create a new diagnostic with no code, hint, related spans, or causes.
    pub fn new(level: DiagLevel, span: Span, message: impl Into<String>) -> Self {
        Self {
            code: None,
            level,
            span,
            message: message.into(),
            hint: None,
            related_spans: Vec::new(),
            cause_chain: Vec::new(),
        }
    }

    pub fn error(code: DiagCode, span: Span, message: impl Into<String>) -> Self {
        Self::new(DiagLevel::Error, span, message).with_code(code)
    }

    pub fn warning(code: DiagCode, span: Span, message: impl Into<String>) -> Self {
        Self::new(DiagLevel::Warning, span, message).with_code(code)
    }

    /// Attach a stable diagnostic code.
    pub fn with_code(mut self, code: DiagCode) -> Self {
        self.code = Some(code);
        self
    }

    /// Attach a remediation hint.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Attach a related span.
    pub fn with_related(mut self, span: Span, label: impl Into<String>) -> Self {
        self.related_spans.push(RelatedSpan {
            span,
            label: label.into(),
        });
        self
    }

    /// Attach a cause record to the chain.
    pub fn with_cause(mut self, message: impl Into<String>, span: Option<Span>) -> Self {
        self.cause_chain.push(CauseRecord {
            message: message.into(),
            span,
        });
        self
    }

    pub fn is_error(&self) -> bool {
        self.level == DiagLevel::Error
    }

    /// Failure class for error diagnostics; `None` for warnings and uncoded errors.
    pub fn class(&self) -> Option<ErrorClass> {
        if !self.is_error() {
            return None;
        }
        self.code.and_then(ErrorClass::of)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            DiagLevel::Error => "error",
            DiagLevel::Warning => "warning",
        };
        if let Some(code) = &self.code {
            write!(f, "{}[{}]: {}", level, code, self.message)?;
        } else {
            write!(f, "{}: {}", level, self.message)?;
        }
        if let Some(hint) = &self.hint {
            write!(f, "\n  hint: {}", hint)?;
        }
        Ok(())
    }
}

pub fn has_errors(diags: &[Diagnostic]) -> bool {
    diags.iter().any(Diagnostic::is_error)
}

// ── Rendering ────────────────────────────────────────────────────────────

/// 1-based line and column of a byte offset. Offsets past the end or inside
/// a character are clamped back to the previous character boundary.
pub fn line_col(source: &str, offset: usize) -> (usize, usize) {
    let mut offset = offset.min(source.len());
    while !source.is_char_boundary(offset) {
        offset -= 1;
    }
    let before = &source[..offset];
    let line = before.matches('\n').count() + 1;
    let col = match before.rfind('\n') {
        Some(nl) => before[nl + 1..].chars().count() + 1,
        None => before.chars().count() + 1,
    };
    (line, col)
}

/// Format a diagnostic as `origin:line:col: level[code]: message`, followed by
/// the hint, related locations, and cause chain on indented lines.
pub fn render(diag: &Diagnostic, source: &str, origin: &str) -> String {
    use chumsky::span::Span as _;

    let (line, col) = line_col(source, diag.span.start());
    let mut out = format!("{}:{}:{}: {}", origin, line, col, diag);
    for related in &diag.related_spans {
        let (l, c) = line_col(source, related.span.start());
        out.push_str(&format!("\n  note: {}:{}:{}: {}", origin, l, c, related.label));
    }
    for cause in &diag.cause_chain {
        out.push_str(&format!("\n  = {}", cause.message));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_span() -> Span {
        use chumsky::span::Span as _;
        Span::new((), 0..1)
    }

    #[test]
    fn display_without_code() {
        let d = Diagnostic::new(DiagLevel::Error, dummy_span(), "something failed");
        assert_eq!(format!("{d}"), "error: something failed");
    }

    #[test]
    fn display_with_code() {
        let d = Diagnostic::warning(codes::W0100, dummy_span(), "inlet bound twice");
        assert_eq!(format!("{d}"), "warning[W0100]: inlet bound twice");
    }

    #[test]
    fn builder_chain() {
        let d = Diagnostic::error(codes::E0300, dummy_span(), "cyclic dependency")
            .with_hint("remove one connection of the loop")
            .with_related(dummy_span(), "node 1 here")
            .with_cause("node 1 feeds node 2", Some(dummy_span()));

        assert_eq!(d.code, Some(codes::E0300));
        assert_eq!(d.hint.as_deref(), Some("remove one connection of the loop"));
        assert_eq!(d.related_spans.len(), 1);
        assert_eq!(d.cause_chain.len(), 1);
    }

    #[test]
    fn codes_map_to_classes() {
        assert_eq!(ErrorClass::of(codes::E0004), Some(ErrorClass::Parse));
        assert_eq!(ErrorClass::of(codes::E0100), Some(ErrorClass::UnknownOperator));
        assert_eq!(ErrorClass::of(codes::E0203), Some(ErrorClass::IndexOutOfRange));
        assert_eq!(ErrorClass::of(codes::E0300), Some(ErrorClass::CyclicDependency));
        assert_eq!(ErrorClass::of(codes::W0100), None);
    }

    #[test]
    fn warnings_have_no_class() {
        let d = Diagnostic::warning(codes::W0101, dummy_span(), "no sink");
        assert_eq!(d.class(), None);
    }

    #[test]
    fn line_col_counts_from_one() {
        let src = "#N canvas;\n#X obj 1 2 foo~;\n";
        assert_eq!(line_col(src, 0), (1, 1));
        assert_eq!(line_col(src, 11), (2, 1));
        assert_eq!(line_col(src, 22), (2, 12));
    }

    #[test]
    fn line_col_clamps_stale_offsets() {
        let src = "é;\n";
        assert_eq!(line_col(src, 1), (1, 1));
        assert_eq!(line_col(src, 2), (1, 2));
        assert_eq!(line_col(src, 100), (2, 1));
    }

    #[test]
    fn render_includes_location_and_hint() {
        use chumsky::span::Span as _;
        let src = "#N canvas;\n#X obj 1 2 foo~;\n";
        let d = Diagnostic::error(codes::E0100, Span::new((), 11..27), "unknown object 'foo~'")
            .with_hint("supported: dac~");
        let text = render(&d, src, "patch.pd");
        assert_eq!(
            text,
            "patch.pd:2:1: error[E0100]: unknown object 'foo~'\n  hint: supported: dac~"
        );
    }
}
