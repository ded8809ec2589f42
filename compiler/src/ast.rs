// Directive types for Pure Data .pd patch files.
//
// The reader produces these from the record stream: one entry per box
// (`obj`, `msg`, `text`) and one per `connect`, in order of appearance.
// Every item carries a `SimpleSpan` for error reporting in downstream phases.
//
// Preconditions: produced by the parser from a classified record stream.
// Postconditions: box order equals patch order; indices in `ConnectDecl`
//                 are unchecked (resolution validates them).
// Failure modes: none (data-only module).
// Side effects: none.

use chumsky::span::SimpleSpan;

use crate::operator::OpKind;

/// Byte-offset span (alias for chumsky's `SimpleSpan`).
pub type Span = SimpleSpan;

// ── Raw records ──

/// One whitespace-delimited field with escapes resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub text: String,
    pub span: Span,
}

/// A `;`-terminated record before classification.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub fields: Vec<Field>,
    pub span: Span,
}

// ── Directives ──

/// A parsed patch: boxes and connections in order of appearance.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Patch {
    pub boxes: Vec<BoxDecl>,
    pub connections: Vec<ConnectDecl>,
}

impl Patch {
    pub fn objects(&self) -> impl Iterator<Item = &ObjectDecl> {
        self.boxes.iter().filter_map(|b| match &b.kind {
            BoxKind::Object(obj) => Some(obj),
            BoxKind::Message(_) | BoxKind::Text(_) => None,
        })
    }
}

/// A box occupies one slot in the patch's connection index space.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxDecl {
    pub kind: BoxKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BoxKind {
    Object(ObjectDecl),
    /// Message box. Not part of the signal graph.
    Message(String),
    /// Comment. Not part of the signal graph.
    Text(String),
}

/// `#X obj x y <type> [param ...]`
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectDecl {
    pub op: OpKind,
    /// Construction parameters, verbatim. Converted to numbers when bound.
    pub params: Vec<Field>,
    pub span: Span,
}

/// `#X connect <src> <outlet> <dst> <inlet>`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectDecl {
    pub source: usize,
    pub outlet: usize,
    pub target: usize,
    pub inlet: usize,
    pub span: Span,
}
