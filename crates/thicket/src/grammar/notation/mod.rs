//! # Grammar Notation
//!
//! Readers for the textual grammar formats.
//!
//! ## BNF
//!
//! ```text
//! <Math> ::= <Math> "+" +1+ =left= <Math>
//!          | <Math> "*" +2+ =left= <Math>
//!          | <Token-int>
//! ```
//!
//! Alternatives are space-separated sequences of quoted literals and
//! `<rule>` references. `+N+` sets the precedence of the literal just
//! before it (higher binds tighter) and `=left=` / `=right=` its
//! associativity. `""` is epsilon. `#` starts a comment.
//!
//! ## EBNF
//!
//! Adds grouping `( ... )` and the postfix modifiers `?`, `+` and `*`,
//! desugared into synthetic rules:
//!
//! - `X+` becomes `[LIST X] ::= X | X [LIST X]`
//! - `X?` becomes `[OPT X] ::= X | ""`
//! - `X*` is `(X+)?`
//!
//! Synthetic rule names are derived from their content, so repeating the
//! same expression reuses one rule.

mod bnf;
mod ebnf;
mod meta_lexer;

use super::{Associativity, Grammar, GrammarBuilder, RuleKind, Symbol, TerminalId, START_RULE, TOKEN_RULE_PREFIX};
use crate::error::GrammarError;
use meta_lexer::{MetaKind, MetaToken};

/// Which textual grammar format to read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Notation {
    Bnf,
    #[default]
    Ebnf,
}

/// Read a BNF grammar. `classes` lists the lexer's `(name, pattern)` token
/// classes, spliced in as `Token-<name>` rules.
///
/// # Errors
///
/// Returns a [`GrammarError`] with line and column for malformed text or
/// references to undefined rules.
pub fn parse_bnf(text: &str, classes: &[(&str, &str)]) -> Result<Grammar, GrammarError> {
    parse_grammar(text, Notation::Bnf, builder_with_classes(classes))
}

/// Read an EBNF grammar. See [`parse_bnf`] for `classes`.
///
/// # Errors
///
/// Returns a [`GrammarError`] with line and column for malformed text,
/// unterminated groups, doubled modifiers or undefined rules.
pub fn parse_ebnf(text: &str, classes: &[(&str, &str)]) -> Result<Grammar, GrammarError> {
    parse_grammar(text, Notation::Ebnf, builder_with_classes(classes))
}

/// Read grammar text into `builder` and finish the grammar.
///
/// # Errors
///
/// See [`parse_bnf`] and [`parse_ebnf`].
pub fn parse_grammar(
    text: &str,
    notation: Notation,
    mut builder: GrammarBuilder,
) -> Result<Grammar, GrammarError> {
    let tokens = meta_lexer::tokenize(text)?;
    let mut reader = Reader {
        tokens,
        pos: 0,
        builder: &mut builder,
    };
    reader.read_rules(notation)?;
    builder.build()
}

fn builder_with_classes(classes: &[(&str, &str)]) -> GrammarBuilder {
    let mut builder = GrammarBuilder::new();
    for (name, pattern) in classes {
        builder.token_class(name, pattern);
    }
    builder
}

/// Cursor over meta tokens plus the builder being filled
pub(super) struct Reader<'a> {
    tokens: Vec<MetaToken>,
    pos: usize,
    builder: &'a mut GrammarBuilder,
}

impl Reader<'_> {
    fn read_rules(&mut self, notation: Notation) -> Result<(), GrammarError> {
        while !matches!(self.peek().kind, MetaKind::Eof) {
            let token = self.next();
            let MetaKind::RuleRef(name) = &token.kind else {
                return Err(self.unexpected(&token, "a rule name"));
            };
            if name == START_RULE {
                return Err(GrammarError::syntax(
                    format!("rule name <{START_RULE}> is reserved"),
                    token.line,
                    token.column,
                ));
            }
            let kind = if name.starts_with(TOKEN_RULE_PREFIX) {
                RuleKind::TokenClass
            } else {
                RuleKind::Normal
            };
            let rule = self.builder.rule_id(name, kind);
            if kind == RuleKind::Normal && self.builder.first().is_none() {
                self.builder.set_first(rule);
            }

            let define = self.next();
            if define.kind != MetaKind::Define {
                return Err(self.unexpected(&define, "'::='"));
            }

            let alternatives = match notation {
                Notation::Bnf => bnf::read_alternatives(self)?,
                Notation::Ebnf => ebnf::read_alternatives(self)?,
            };
            for alt in alternatives {
                self.builder.add_alternative(rule, alt);
            }
        }
        Ok(())
    }

    fn peek(&self) -> &MetaToken {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn next(&mut self) -> MetaToken {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    /// True when the upcoming tokens are `<name> ::=`, i.e. a new rule
    fn at_rule_start(&self) -> bool {
        matches!(self.peek().kind, MetaKind::RuleRef(_))
            && self
                .tokens
                .get(self.pos + 1)
                .is_some_and(|t| t.kind == MetaKind::Define)
    }

    /// True when the current alternative sequence has ended
    fn at_sequence_end(&self) -> bool {
        matches!(self.peek().kind, MetaKind::Eof | MetaKind::Pipe) || self.at_rule_start()
    }

    fn unexpected(&self, token: &MetaToken, expected: &str) -> GrammarError {
        GrammarError::syntax(
            format!("expected {expected}, found {}", token.kind.describe()),
            token.line,
            token.column,
        )
    }

    fn reference(&mut self, name: &str, token: &MetaToken) -> Symbol {
        Symbol::Rule(self.builder.reference(name, token.line, token.column))
    }

    /// Consume `+N+` and `=left=`/`=right=` annotations following a literal
    fn read_annotations(&mut self, terminal: TerminalId) -> Result<(), GrammarError> {
        loop {
            let token = self.peek().clone();
            let (precedence, associativity) = match token.kind {
                MetaKind::Precedence(level) => (Some(level), None::<Associativity>),
                MetaKind::Assoc(assoc) => (None, Some(assoc)),
                _ => return Ok(()),
            };
            self.next();
            self.builder
                .annotate(terminal, precedence, associativity, token.line, token.column)?;
        }
    }

    /// Error for an annotation that does not follow a literal
    fn misplaced_annotation(token: &MetaToken) -> GrammarError {
        GrammarError::MisplacedAnnotation {
            annotation: token.kind.describe(),
            line: token.line,
            column: token.column,
        }
    }
}
