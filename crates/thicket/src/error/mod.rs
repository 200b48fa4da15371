//! # Error Types
//!
//! Errors raised while compiling grammars, lexing input, parsing and
//! persisting compiled grammars.
//!
//! ## Overview
//!
//! - [`GrammarError`]: malformed grammar text or an inconsistent rule table.
//!   Every text-level variant carries the 1-based line and column of the
//!   offending construct.
//! - [`LexerError`]: no token class matches the remaining input.
//! - [`ParseError`]: recognition failed, or the forest came out empty after
//!   disambiguation.
//! - [`PersistError`]: a compiled grammar could not be encoded or restored.
//!
//! All of them propagate straight to the caller of compile or parse. The
//! engine never retries and never produces partial results.
//!
//! ## Diagnostics Support
//!
//! When the `diagnostics` feature is enabled, errors integrate with
//! [`miette`] for rich reporting.

use crate::lexer::Position;
use thiserror::Error;

#[cfg(feature = "diagnostics")]
use miette::Diagnostic;

/// Errors raised while turning grammar text or a rule table into a grammar.
#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum GrammarError {
    #[error("unknown rule <{name}> referenced at line {line}, column {column}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::unknown_rule)))]
    UnknownRule {
        name: String,
        line: u32,
        column: u32,
    },

    #[error("{message} at line {line}, column {column}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::syntax)))]
    Syntax {
        message: String,
        line: u32,
        column: u32,
    },

    #[error("unterminated group opened at line {line}, column {column}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::unterminated_group)))]
    UnterminatedGroup { line: u32, column: u32 },

    #[error("modifier '{modifier}' applied twice at line {line}, column {column}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::double_modifier)))]
    DoubleModifier {
        modifier: char,
        line: u32,
        column: u32,
    },

    #[error("annotation {annotation} must follow a literal (line {line}, column {column})")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::misplaced_annotation)))]
    MisplacedAnnotation {
        annotation: String,
        line: u32,
        column: u32,
    },

    #[error("literal \"{literal}\" has conflicting precedence annotations at line {line}, column {column}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::conflicting_precedence)))]
    ConflictingPrecedence {
        literal: String,
        line: u32,
        column: u32,
    },

    #[error("grammar defines no rules")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::empty)))]
    EmptyGrammar,

    #[error("rule <{name}> has no alternatives")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::no_alternatives)))]
    NoAlternatives { name: String },

    #[error("invalid pattern for {owner}: {source}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::invalid_pattern)))]
    InvalidPattern {
        owner: String,
        #[source]
        source: regex::Error,
    },

    #[error("token class '{name}' declared twice")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::duplicate_token_class)))]
    DuplicateTokenClass { name: String },

    #[error("internal grammar compiler error: {message}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::internal)))]
    Internal { message: String },
}

impl GrammarError {
    /// Create a meta-syntax error at the given location
    #[must_use]
    pub fn syntax(message: impl Into<String>, line: u32, column: u32) -> Self {
        Self::Syntax {
            message: message.into(),
            line,
            column,
        }
    }

    /// Create an internal invariant violation of the table construction
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Source location of the error, when it came from grammar text
    #[must_use]
    pub const fn location(&self) -> Option<(u32, u32)> {
        match self {
            Self::UnknownRule { line, column, .. }
            | Self::Syntax { line, column, .. }
            | Self::UnterminatedGroup { line, column }
            | Self::DoubleModifier { line, column, .. }
            | Self::MisplacedAnnotation { line, column, .. }
            | Self::ConflictingPrecedence { line, column, .. } => Some((*line, *column)),
            Self::EmptyGrammar
            | Self::NoAlternatives { .. }
            | Self::InvalidPattern { .. }
            | Self::DuplicateTokenClass { .. }
            | Self::Internal { .. } => None,
        }
    }
}

/// Lexer error with location information
#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
#[cfg_attr(feature = "diagnostics", diagnostic(code(lexer::no_match)))]
#[error("no token class matches input at line {}, column {}: `{snippet}`", .position.line, .position.column)]
pub struct LexerError {
    pub position: Position,
    /// Up to twenty characters of the unconsumed input
    pub snippet: String,
}

#[derive(Debug, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum ParseError {
    #[error(
        "unexpected {found} at line {}, column {}: near `{near}`{}",
        .position.line,
        .position.column,
        format_expected_list(.expected)
    )]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(parser::unexpected_token)))]
    UnexpectedToken {
        position: Position,
        found: String,
        near: String,
        expected: Vec<String>,
    },

    #[error("parse forest is empty after disambiguation")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(parser::empty_forest)))]
    EmptyForest,

    #[error("graph-structured stack exceeded {limit} nodes")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(parser::stack_limit)))]
    StackLimit { limit: usize },

    #[error("internal parser error: {message}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(parser::internal)))]
    Internal { message: String },

    #[error(transparent)]
    #[cfg_attr(feature = "diagnostics", diagnostic(transparent))]
    Lexer(#[from] LexerError),
}

impl ParseError {
    /// Create an internal invariant violation
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Position of the offending input, if the error is tied to one
    #[must_use]
    pub const fn position(&self) -> Option<Position> {
        match self {
            Self::UnexpectedToken { position, .. } => Some(*position),
            Self::Lexer(err) => Some(err.position),
            Self::EmptyForest | Self::StackLimit { .. } | Self::Internal { .. } => None,
        }
    }
}

/// Errors from saving or restoring a compiled grammar.
#[cfg(feature = "serialize")]
#[derive(Debug, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum PersistError {
    #[error("failed to encode or decode compiled grammar: {0}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(persist::codec)))]
    Codec(#[from] bincode::Error),

    #[error("i/o error: {0}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(persist::io)))]
    Io(#[from] std::io::Error),

    #[error("not a compiled grammar blob")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(persist::bad_magic)))]
    BadMagic,

    #[error("compiled grammar format version {found} is not supported (expected {expected})")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(persist::version)))]
    VersionMismatch { found: u32, expected: u32 },

    #[error("failed to rebuild compiled grammar: {0}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(persist::rebuild)))]
    Rebuild(#[from] GrammarError),
}

/// Render `", expected one of: a, b"`, or nothing for an empty list
#[must_use]
pub fn format_expected_list(expected: &[String]) -> String {
    match expected {
        [] => String::new(),
        [only] => format!(", expected {only}"),
        _ if expected.len() > 8 => format!(
            ", expected one of: {}, ... ({} more)",
            expected[..8].join(", "),
            expected.len() - 8
        ),
        _ => format!(", expected one of: {}", expected.join(", ")),
    }
}

/// Slice up to `radius` characters either side of a byte range.
///
/// Offsets are clamped to char boundaries so this never panics on UTF-8 input.
#[must_use]
pub fn get_context(source: &str, start: usize, end: usize, radius: usize) -> String {
    let start = floor_char_boundary(source, start.min(source.len()));
    let end = floor_char_boundary(source, end.min(source.len())).max(start);

    let before: usize = source[..start]
        .chars()
        .rev()
        .take(radius)
        .map(char::len_utf8)
        .sum();
    let after: usize = source[end..].chars().take(radius).map(char::len_utf8).sum();

    source[start - before..end + after].to_string()
}

fn floor_char_boundary(source: &str, mut index: usize) -> usize {
    while index > 0 && !source.is_char_boundary(index) {
        index -= 1;
    }
    index
}
