//! # BRNGLR Parsing
//!
//! Binarised right-nulled generalized LR parsing, driven by the LALR(1)
//! automaton of a [`CompiledGrammar`].
//!
//! Where the automaton has conflicts the parser follows every action at
//! once over a graph-structured stack, so any context-free grammar is
//! accepted, ambiguous and left-recursive ones included. The result is a
//! [`Forest`] holding every derivation of the input.
//!
//! ## Disambiguation
//!
//! Each new derivation of a node passes through a fixed pipeline before it
//! is kept:
//!
//! 1. operator precedence and associativity from `+N+`, `=left=` and
//!    `=right=` annotations
//! 2. greedy matching of nullable list and optional rules
//! 3. every [`Disambiguator`] registered with
//!    [`Parser::with_disambiguator`], in order
//!
//! ## Example
//!
//! ```rust,no_run
//! use thicket::compile::CompiledGrammar;
//! use thicket::lexer::LexerBuilder;
//!
//! let grammar = CompiledGrammar::from_bnf(
//!     "<Sum> ::= <Sum> \"+\" <Sum> | <Token-int>",
//!     LexerBuilder::new().token("int", "[0-9]+").skip("ws", r"\s+"),
//! )?;
//! let forest = grammar.parser().parse("1 + 2 + 3")?;
//! assert_eq!(forest.tree_count(), 2);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod disambiguation;
mod parser;
mod stack;

pub use disambiguation::{Candidate, Disambiguator};

use crate::compile::CompiledGrammar;
use crate::error::ParseError;
use crate::lexer::TokenStream;
use crate::sppf::Forest;
use disambiguation::Pipeline;
use parser::Engine;
use std::sync::Arc;

/// Parser settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserConfig {
    /// Run the forest passes after a successful parse
    pub run_default_transforms: bool,
    /// Stack node budget; exceeding it fails the parse
    pub max_stack_nodes: usize,
    /// Apply operator precedence and associativity
    pub precedence: bool,
    /// Prefer the longest match through nullable list and optional rules
    pub greedy_lists: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            run_default_transforms: true,
            max_stack_nodes: 1_000_000,
            precedence: true,
            greedy_lists: true,
        }
    }
}

impl ParserConfig {
    #[must_use]
    pub const fn with_default_transforms(mut self, enabled: bool) -> Self {
        self.run_default_transforms = enabled;
        self
    }

    #[must_use]
    pub const fn with_max_stack_nodes(mut self, limit: usize) -> Self {
        self.max_stack_nodes = limit;
        self
    }

    #[must_use]
    pub const fn with_precedence(mut self, enabled: bool) -> Self {
        self.precedence = enabled;
        self
    }

    #[must_use]
    pub const fn with_greedy_lists(mut self, enabled: bool) -> Self {
        self.greedy_lists = enabled;
        self
    }
}

/// A parser over one compiled grammar.
///
/// Cheap to create; the grammar's tables are shared, never copied.
#[derive(Clone)]
pub struct Parser<'g> {
    grammar: &'g CompiledGrammar,
    config: ParserConfig,
    disambiguators: Vec<Arc<dyn Disambiguator>>,
}

impl std::fmt::Debug for Parser<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parser")
            .field("config", &self.config)
            .field("disambiguators", &self.disambiguators.len())
            .finish_non_exhaustive()
    }
}

impl<'g> Parser<'g> {
    #[must_use]
    pub fn new(grammar: &'g CompiledGrammar) -> Self {
        Self {
            grammar,
            config: ParserConfig::default(),
            disambiguators: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: ParserConfig) -> Self {
        self.config = config;
        self
    }

    /// Add a rule run after the built-in disambiguation
    #[must_use]
    pub fn with_disambiguator(mut self, disambiguator: impl Disambiguator + 'static) -> Self {
        self.disambiguators.push(Arc::new(disambiguator));
        self
    }

    #[must_use]
    pub const fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Tokenize and parse `source`.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::Lexer`] if the source cannot be tokenized and
    /// any other [`ParseError`] as for [`Parser::parse_tokens`].
    pub fn parse(&self, source: &str) -> Result<Forest, ParseError> {
        let tokens = self.grammar.tokenize(source)?;
        self.parse_tokens(&tokens)
    }

    /// Parse an already tokenized input. An EOF token is added if the
    /// stream does not end with one.
    ///
    /// # Errors
    ///
    /// - [`ParseError::UnexpectedToken`] at the furthest token no stack
    ///   could get past
    /// - [`ParseError::EmptyForest`] if disambiguation removed every
    ///   derivation
    /// - [`ParseError::StackLimit`] if the stack outgrew
    ///   [`ParserConfig::max_stack_nodes`]
    pub fn parse_tokens(&self, tokens: &TokenStream) -> Result<Forest, ParseError> {
        let mut tokens = tokens.clone();
        tokens.ensure_eof();
        let pipeline = Pipeline {
            precedence: self.config.precedence,
            greedy: self.config.greedy_lists,
            user: &self.disambiguators,
        };
        Engine::new(self.grammar, &self.config, pipeline, &tokens).run()
    }
}
