// Lexer for Pure Data .pd patch files.
//
// Splits patch text into record separators, escape sequences, atoms, and
// whitespace. Uses the `logos` crate for DFA-based lexing.
//
// Preconditions: input is valid UTF-8.
// Postconditions: returns all tokens with byte-offset spans, plus any lex errors.
// Failure modes: none in practice; every byte belongs to some token. An
//                unmatched slice would produce a `LexError` and lexing continues.
// Side effects: none.

use logos::Logos;
use std::fmt;

/// Byte-offset span in source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// A lexer error with location.
#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub span: Span,
    pub message: String,
}

/// Result of lexing: tokens plus any errors (non-fatal).
#[derive(Debug)]
pub struct LexResult {
    pub tokens: Vec<(Token, Span)>,
    pub errors: Vec<LexError>,
}

/// Patch token types.
///
/// Whitespace is significant: it separates fields, while atoms and escapes
/// that touch each other belong to the same field. Atoms carry no value —
/// use the span to retrieve the text from the source.
#[derive(Logos, Debug, Clone, PartialEq)]
pub enum Token {
    /// Record separator.
    #[token(";")]
    Semi,

    /// `\` followed by the character it escapes (`\;` is a literal `;`,
    /// `\ ` a space that stays inside its field).
    #[regex(r"\\[^\r\n]", escaped_char)]
    Escaped(char),

    /// `\` at the end of a line or of the input; kept as text.
    #[token("\\")]
    Backslash,

    /// Run of ordinary characters.
    #[regex(r"[^ \t\r\n;\\]+")]
    Atom,

    #[regex(r"[ \t\r\n]+")]
    Space,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Semi => write!(f, ";"),
            Token::Escaped(c) => write!(f, "\\{c}"),
            Token::Backslash => write!(f, "\\"),
            Token::Atom => write!(f, "<atom>"),
            Token::Space => write!(f, "<space>"),
        }
    }
}

// ── Callbacks ──

fn escaped_char(lex: &mut logos::Lexer<'_, Token>) -> Option<char> {
    lex.slice().chars().nth(1)
}

// ── Public API ──

/// Lex a patch source string into tokens.
///
/// Returns all successfully lexed tokens together with any errors. Lexing is
/// non-fatal: errors are collected and the lexer continues past them.
pub fn lex(source: &str) -> LexResult {
    let lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    let mut errors = Vec::new();

    for (result, range) in lexer.spanned() {
        let span = Span {
            start: range.start,
            end: range.end,
        };
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(()) => errors.push(LexError {
                span,
                message: format!("unrecognized input {:?}", &source[span.start..span.end]),
            }),
        }
    }

    LexResult { tokens, errors }
}

/// Resolve escape sequences in a field's source text (`\;` → `;`).
/// A trailing `\` with nothing to escape is kept.
pub fn unescape(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            result.push(chars.next().unwrap_or('\\'));
        } else {
            result.push(c);
        }
    }
    result
}

// ── Tests ──
