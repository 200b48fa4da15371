//! # Compiled Grammars
//!
//! Everything computed once per grammar and shared by every parse: the
//! rule table, the LALR(1) automaton, the epsilon forest, the lexer and the
//! token-to-terminal matcher.
//!
//! ```rust,no_run
//! use thicket::compile::CompiledGrammar;
//! use thicket::lexer::LexerBuilder;
//!
//! let grammar = CompiledGrammar::from_ebnf(
//!     "<List> ::= <Token-word>+",
//!     LexerBuilder::new().token("word", "[a-z]+").skip("ws", r"\s+"),
//! )?;
//! let forest = grammar.parse("a b c")?;
//! assert_eq!(forest.tree_count(), 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::brnglr::Parser;
use crate::epsilon::EpsilonForest;
use crate::error::{GrammarError, LexerError, ParseError};
use crate::grammar::notation::{parse_grammar, Notation};
use crate::grammar::{Grammar, GrammarBuilder, TerminalMatcher};
use crate::lalr::Automaton;
use crate::lexer::{ClassKind, Lexer, LexerBuilder, LexerSpec, TokenStream};
use crate::sppf::Forest;
use std::sync::Arc;

/// A grammar ready to parse with.
///
/// Immutable once built; share it behind an [`Arc`] to parse from several
/// threads.
#[derive(Debug, Clone)]
pub struct CompiledGrammar {
    grammar: Arc<Grammar>,
    automaton: Automaton,
    epsilon: EpsilonForest,
    lexer: Lexer,
    matcher: TerminalMatcher,
}

impl CompiledGrammar {
    /// Read grammar text and build everything needed to parse with it.
    ///
    /// The lexer's token classes become `Token-<name>` rules, and every
    /// literal of the grammar is added to the lexer as an exact-text class.
    ///
    /// # Errors
    ///
    /// Returns a [`GrammarError`] for malformed grammar text or an invalid
    /// lexer pattern.
    pub fn compile(text: &str, notation: Notation, lexer: LexerBuilder) -> Result<Self, GrammarError> {
        let mut builder = GrammarBuilder::new();
        for class in lexer.spec().classes.iter().filter(|c| c.kind == ClassKind::Token) {
            builder.token_class(&class.name, &class.pattern);
        }
        let grammar = parse_grammar(text, notation, builder)?;
        Self::from_grammar(grammar, lexer)
    }

    /// [`CompiledGrammar::compile`] for BNF text
    ///
    /// # Errors
    ///
    /// See [`CompiledGrammar::compile`].
    pub fn from_bnf(text: &str, lexer: LexerBuilder) -> Result<Self, GrammarError> {
        Self::compile(text, Notation::Bnf, lexer)
    }

    /// [`CompiledGrammar::compile`] for EBNF text
    ///
    /// # Errors
    ///
    /// See [`CompiledGrammar::compile`].
    pub fn from_ebnf(text: &str, lexer: LexerBuilder) -> Result<Self, GrammarError> {
        Self::compile(text, Notation::Ebnf, lexer)
    }

    /// Compile a grammar assembled in code.
    ///
    /// # Errors
    ///
    /// Returns a [`GrammarError`] for an invalid lexer or regexp pattern.
    pub fn from_grammar(grammar: Grammar, mut lexer: LexerBuilder) -> Result<Self, GrammarError> {
        for literal in grammar.literals() {
            lexer.add_literal(literal);
        }
        let lexer = lexer.build()?;
        let automaton = Automaton::build(&grammar)?;
        let epsilon = EpsilonForest::build(&grammar);
        Self::assemble(grammar, automaton, epsilon, lexer)
    }

    /// Put a grammar back together from its persisted parts
    pub(crate) fn from_parts(
        grammar: Grammar,
        automaton: Automaton,
        epsilon: EpsilonForest,
        lexer: LexerSpec,
    ) -> Result<Self, GrammarError> {
        let lexer = Lexer::new(lexer)?;
        Self::assemble(grammar, automaton, epsilon, lexer)
    }

    fn assemble(
        grammar: Grammar,
        automaton: Automaton,
        epsilon: EpsilonForest,
        lexer: Lexer,
    ) -> Result<Self, GrammarError> {
        let matcher = TerminalMatcher::new(&grammar)?;
        tracing::debug!(
            rules = grammar.rules().len(),
            terminals = grammar.terminals().len(),
            states = automaton.states().len(),
            conflicts = automaton.conflicts(),
            epsilon_nodes = epsilon.len(),
            "grammar compiled"
        );
        Ok(Self {
            grammar: Arc::new(grammar),
            automaton,
            epsilon,
            lexer,
            matcher,
        })
    }

    #[must_use]
    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    /// The rule table, shared with every forest parsed from it
    #[must_use]
    pub const fn shared_grammar(&self) -> &Arc<Grammar> {
        &self.grammar
    }

    #[must_use]
    pub const fn automaton(&self) -> &Automaton {
        &self.automaton
    }

    #[must_use]
    pub const fn epsilon(&self) -> &EpsilonForest {
        &self.epsilon
    }

    #[must_use]
    pub const fn lexer(&self) -> &Lexer {
        &self.lexer
    }

    #[must_use]
    pub const fn matcher(&self) -> &TerminalMatcher {
        &self.matcher
    }

    /// Run the grammar's lexer over `source`
    ///
    /// # Errors
    ///
    /// Returns a [`LexerError`] where no token class matches.
    pub fn tokenize(&self, source: &str) -> Result<TokenStream, LexerError> {
        self.lexer.tokenize(source)
    }

    /// A parser with the default configuration
    #[must_use]
    pub fn parser(&self) -> Parser<'_> {
        Parser::new(self)
    }

    /// Tokenize and parse `source` with the default configuration
    ///
    /// # Errors
    ///
    /// See [`Parser::parse`].
    pub fn parse(&self, source: &str) -> Result<Forest, ParseError> {
        self.parser().parse(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literals_reach_the_lexer() {
        let grammar = CompiledGrammar::from_bnf(
            "<Let> ::= \"let\" <Token-ident> \"=\" <Token-int>",
            LexerBuilder::new()
                .token("ident", "[a-z]+")
                .token("int", "[0-9]+")
                .skip("ws", r"\s+"),
        )
        .unwrap();
        let tokens = grammar.tokenize("let x = 1").unwrap();
        let classes: Vec<&str> = tokens.iter().map(|t| t.class.as_str()).collect();
        assert_eq!(classes, ["let", "ident", "=", "int", "EOF"]);
        assert_eq!(grammar.parse("let x = 1").unwrap().tree_count(), 1);
    }

    #[test]
    fn test_eof_keyword_literal() {
        let grammar = CompiledGrammar::from_bnf(
            "<Script> ::= <Token-word> \"EOF\"",
            LexerBuilder::new().token("word", "[a-z]+").skip("ws", r"\s+"),
        )
        .unwrap();
        let forest = grammar.parse("stop EOF").unwrap();
        assert_eq!(forest.tree_count(), 1);
        assert_eq!(forest.trees()[0].text(), "stop EOF");
        assert!(grammar.parse("stop").is_err());
    }

    #[test]
    fn test_unknown_token_class() {
        let err = CompiledGrammar::from_bnf("<S> ::= <Token-num>", LexerBuilder::new()).unwrap_err();
        assert!(matches!(err, GrammarError::UnknownRule { .. }));
    }

    #[test]
    fn test_skip_classes_are_not_rules() {
        let grammar = CompiledGrammar::from_bnf(
            "<S> ::= \"a\"",
            LexerBuilder::new().skip("ws", r"\s+"),
        )
        .unwrap();
        assert!(grammar.grammar().rule_by_name("Token-ws").is_none());
    }
}
