//! # Thicket
//!
//! Generalized parsing for arbitrary context-free grammars.
//!
//! ## Overview
//!
//! A grammar written in BNF or EBNF is compiled once into an LALR(1)
//! automaton. Parsing runs the automaton with the BRNGLR algorithm, which
//! follows every conflicting action over a graph-structured stack and
//! records the result in a shared packed parse forest (SPPF). Ambiguous,
//! left-recursive and right-recursive grammars all parse in polynomial
//! time and space, and each parse tree can be enumerated from the forest.
//!
//! - **Grammar notation**: `<Rule> ::= ...` BNF, plus `*`, `+`, `?` and
//!   groups in EBNF
//! - **Regex terminals**: lexer classes referenced as `<Token-name>`
//! - **Disambiguation**: operator precedence, associativity, greedy lists
//!   and user-defined filters
//! - **Forest passes**: pruning, deduplication and collapsing of the
//!   forest after a parse
//! - **Persistence**: compiled grammars saved as versioned binary blobs
//!   (feature `serialize`)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use thicket::{CompiledGrammar, LexerBuilder};
//!
//! let grammar = CompiledGrammar::from_bnf(
//!     r#"
//!     <Expr> ::= <Expr> "+" +1+ =left= <Expr>
//!              | <Expr> "*" +2+ =left= <Expr>
//!              | <Token-int>
//!     "#,
//!     LexerBuilder::new().token("int", "[0-9]+").skip("ws", r"\s+"),
//! )?;
//!
//! let forest = grammar.parse("1 + 2 * 3")?;
//! assert_eq!(forest.tree_count(), 1);
//! println!("{}", forest.trees()[0].to_sexpr());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `serialize` (default): serde support and [`CompiledGrammar::save`]
//! - `parallel`: parse batches on rayon's thread pool
//! - `diagnostics`: [`miette`](https://docs.rs/miette) diagnostics for the
//!   error types

pub mod brnglr;
pub mod compile;
pub mod epsilon;
pub mod error;
pub mod grammar;
pub mod lalr;
pub mod lexer;
pub mod parallel;
pub mod sppf;

#[cfg(feature = "serialize")]
pub mod persist;

pub use brnglr::{Candidate, Disambiguator, Parser, ParserConfig};
pub use compile::CompiledGrammar;
pub use error::{GrammarError, LexerError, ParseError};
pub use grammar::notation::Notation;
pub use grammar::{Grammar, GrammarBuilder};
pub use lexer::{LexerBuilder, Token, TokenStream};
pub use parallel::{ParallelParser, ParseBatch, ParseWorker};
pub use sppf::{Forest, ForestPass, ParseStats, ParseTree};

#[cfg(feature = "serialize")]
pub use error::PersistError;
