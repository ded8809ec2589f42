// Parser for Pure Data .pd patch files.
//
// Groups the token stream (from the lexer) into `;`-terminated records using
// chumsky combinators, then classifies each structural record by its chunk
// tag and element keyword into box and connection directives.
//
// Preconditions: input is valid UTF-8.
// Postconditions: returns every well-formed directive in order of appearance,
//                 plus one diagnostic per malformed record.
// Failure modes: lex errors (E0001), unknown chunk tags (E0002), unknown
//                element keywords (E0003), missing/malformed fields (E0004),
//                unknown object types (E0100), connection indices too large
//                for any patch (E0200-E0202).
// Side effects: none.

use std::num::{IntErrorKind, ParseIntError};

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;
use chumsky::span::SimpleSpan;

use crate::ast::*;
use crate::diag::{codes, DiagCode, Diagnostic};
use crate::lexer::{unescape, Token};
use crate::operator::{vocabulary, OpKind};

/// Result of parsing: directives plus any diagnostics.
#[derive(Debug)]
pub struct ParseResult {
    pub patch: Patch,
    pub diagnostics: Vec<Diagnostic>,
}

impl ParseResult {
    pub fn has_errors(&self) -> bool {
        crate::diag::has_errors(&self.diagnostics)
    }
}

/// Parse a patch source string. Lexes, groups records, then classifies.
pub fn parse(source: &str) -> ParseResult {
    let (records, mut diagnostics) = read_records(source);

    let mut patch = Patch::default();
    for record in &records {
        match classify(record) {
            Ok(Some(Directive::Box(decl))) => patch.boxes.push(decl),
            Ok(Some(Directive::Connect(decl))) => patch.connections.push(decl),
            Ok(None) => {}
            Err(diag) => diagnostics.push(diag),
        }
    }

    tracing::debug!(
        records = records.len(),
        boxes = patch.boxes.len(),
        connections = patch.connections.len(),
        "patch read"
    );

    ParseResult { patch, diagnostics }
}

/// Split source text into records. Escaped separators stay inside their field.
pub fn read_records(source: &str) -> (Vec<Record>, Vec<Diagnostic>) {
    let lex_result = crate::lexer::lex(source);
    let len = source.len();

    // Convert lexer output to chumsky stream.
    let token_iter = lex_result.tokens.into_iter().map(|(tok, span)| {
        let cspan: SimpleSpan = (span.start..span.end).into();
        (tok, cspan)
    });
    let eoi: SimpleSpan = (len..len).into();
    let stream = Stream::from_iter(token_iter).map(eoi, |(t, s): (_, _)| (t, s));

    let parser = record_parser(source);
    let (records, parse_errors) = parser.parse(stream).into_output_errors();

    // Merge lex errors + grammar errors.
    let mut diagnostics: Vec<Diagnostic> = lex_result
        .errors
        .into_iter()
        .map(|e| Diagnostic::error(codes::E0001, (e.span.start..e.span.end).into(), e.message))
        .collect();
    diagnostics.extend(
        parse_errors
            .into_iter()
            .map(|e| Diagnostic::error(codes::E0001, *e.span(), e.to_string())),
    );

    (records.unwrap_or_default(), diagnostics)
}

// ── Record grammar ──
//
// record := space? field (space field)* space? ';'
// field  := (atom | escape | backslash)+
//
// A trailing record without `;` is kept when it has fields.

fn record_parser<'tokens, 'src: 'tokens, I>(
    source: &'src str,
) -> impl Parser<'tokens, I, Vec<Record>, extra::Err<Rich<'tokens, Token, SimpleSpan>>> + 'src
where
    'tokens: 'src,
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
{
    // Dropped lex errors can leave two spaces side by side.
    let space = just(Token::Space).repeated().at_least(1).ignored();

    let field = select! {
        Token::Atom => (),
        Token::Escaped(_) => (),
        Token::Backslash => (),
    }
    .repeated()
    .at_least(1)
    .map_with(move |_, e| {
        let span: SimpleSpan = e.span();
        Field {
            text: unescape(&source[span.start()..span.end()]),
            span,
        }
    });

    let fields = space.clone().or_not().ignore_then(
        field
            .separated_by(space)
            .allow_trailing()
            .collect::<Vec<_>>(),
    );

    let record = fields
        .clone()
        .then_ignore(just(Token::Semi))
        .map_with(|fields, e| make_record(fields, e.span()));

    let tail = fields.map_with(|fields, e| make_record(fields, e.span()));

    record
        .repeated()
        .collect::<Vec<_>>()
        .then(tail)
        .map(|(mut records, tail)| {
            if !tail.fields.is_empty() {
                records.push(tail);
            }
            records
        })
}

/// Record span starts at its first field rather than at leading whitespace.
fn make_record(fields: Vec<Field>, span: SimpleSpan) -> Record {
    let start = fields.first().map_or(span.start(), |f| f.span.start());
    Record {
        fields,
        span: (start..span.end()).into(),
    }
}

// ── Classification ──

/// A classified structural record.
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    Box(BoxDecl),
    Connect(ConnectDecl),
}

/// Classify one record. Non-structural records and ignored chunk types
/// yield `Ok(None)`.
pub fn classify(record: &Record) -> Result<Option<Directive>, Diagnostic> {
    let Some(head) = record.fields.first() else {
        return Ok(None);
    };
    let Some(tagged) = head.text.strip_prefix('#') else {
        return Ok(None);
    };

    let mut chars = tagged.chars();
    let Some(tag) = chars.next() else {
        return Err(Diagnostic::error(
            codes::E0002,
            head.span,
            "record starts with `#` but has no chunk tag",
        )
        .with_hint("structural records start with `#X`, `#A`, or `#N`"));
    };

    // `#Xobj ...`: text glued to the tag is the first body field.
    let mut body = Vec::with_capacity(record.fields.len());
    let glued = chars.as_str();
    if !glued.is_empty() {
        let start = (head.span.start() + 1 + tag.len_utf8()).min(head.span.end());
        body.push(Field {
            text: glued.to_string(),
            span: (start..head.span.end()).into(),
        });
    }
    body.extend(record.fields[1..].iter().cloned());

    match tag {
        'X' => classify_element(record, &body).map(Some),
        // Array data and frame-set markers have no graph effect.
        'A' | 'N' => Ok(None),
        other => Err(Diagnostic::error(
            codes::E0002,
            head.span,
            format!("unknown chunk tag `#{}`", other),
        )
        .with_hint("structural records start with `#X`, `#A`, or `#N`")),
    }
}

fn classify_element(record: &Record, body: &[Field]) -> Result<Directive, Diagnostic> {
    let Some((keyword, args)) = body.split_first() else {
        return Err(Diagnostic::error(
            codes::E0004,
            record.span,
            "`#X` record has no element keyword",
        ));
    };

    match keyword.text.as_str() {
        "obj" => classify_object(record, keyword, args).map(Directive::Box),
        "msg" => {
            let content = free_text(record, keyword, args)?;
            Ok(Directive::Box(BoxDecl {
                kind: BoxKind::Message(content),
                span: record.span,
            }))
        }
        "text" => {
            let comment = free_text(record, keyword, args)?;
            Ok(Directive::Box(BoxDecl {
                kind: BoxKind::Text(comment),
                span: record.span,
            }))
        }
        "connect" => classify_connect(record, args).map(Directive::Connect),
        other => Err(Diagnostic::error(
            codes::E0003,
            keyword.span,
            format!("unknown element `{}`", other),
        )
        .with_hint("supported elements: obj, msg, text, connect")),
    }
}

/// `obj x y <type> [param ...]`
fn classify_object(
    record: &Record,
    keyword: &Field,
    args: &[Field],
) -> Result<BoxDecl, Diagnostic> {
    require_position(record, keyword, args)?;
    let Some(type_field) = args.get(2) else {
        return Err(Diagnostic::error(
            codes::E0004,
            record.span,
            "object box has no object type",
        ));
    };

    let Some(op) = OpKind::from_keyword(&type_field.text) else {
        return Err(Diagnostic::error(
            codes::E0100,
            type_field.span,
            format!("unknown object type `{}`", type_field.text),
        )
        .with_hint(format!("supported object types: {}", vocabulary())));
    };

    Ok(BoxDecl {
        kind: BoxKind::Object(ObjectDecl {
            op,
            params: args[3..].to_vec(),
            span: record.span,
        }),
        span: record.span,
    })
}

/// `msg x y <text>` / `text x y <text>`. Empty text is allowed.
fn free_text(record: &Record, keyword: &Field, args: &[Field]) -> Result<String, Diagnostic> {
    require_position(record, keyword, args)?;
    Ok(args[2..]
        .iter()
        .map(|f| f.text.as_str())
        .collect::<Vec<_>>()
        .join(" "))
}

fn require_position(record: &Record, keyword: &Field, args: &[Field]) -> Result<(), Diagnostic> {
    if args.len() < 2 {
        return Err(Diagnostic::error(
            codes::E0004,
            record.span,
            format!("`{}` box is missing its x/y position", keyword.text),
        ));
    }
    Ok(())
}

/// `connect <src> <outlet> <dst> <inlet>`
fn classify_connect(record: &Record, args: &[Field]) -> Result<ConnectDecl, Diagnostic> {
    const NAMES: [&str; 4] = ["source", "outlet", "target", "inlet"];
    // Too large to be any index: reported with the range codes, not as malformed.
    const OVERFLOW: [DiagCode; 4] = [codes::E0200, codes::E0201, codes::E0200, codes::E0202];

    if args.len() != NAMES.len() {
        return Err(Diagnostic::error(
            codes::E0004,
            record.span,
            format!(
                "`connect` expects 4 fields (source outlet target inlet), found {}",
                args.len()
            ),
        ));
    }

    let mut values = [0usize; 4];
    for (i, (slot, field)) in values.iter_mut().zip(args).enumerate() {
        *slot = field.text.parse().map_err(|e: ParseIntError| {
            if *e.kind() == IntErrorKind::PosOverflow {
                Diagnostic::error(
                    OVERFLOW[i],
                    field.span,
                    format!("connection {} `{}` is out of range", NAMES[i], field.text),
                )
            } else {
                Diagnostic::error(
                    codes::E0004,
                    field.span,
                    format!(
                        "connection {} must be a non-negative integer, found `{}`",
                        NAMES[i], field.text
                    ),
                )
            }
        })?;
    }

    Ok(ConnectDecl {
        source: values[0],
        outlet: values[1],
        target: values[2],
        inlet: values[3],
        span: record.span,
    })
}

// ── Tests ──
