//! # Lexer
//!
//! A regex-class tokenizer producing the token stream the parser consumes.
//!
//! Each class is a regular expression anchored at the current offset. The
//! longest match wins; ties go to literal classes first, then to the class
//! declared earliest. Skip classes (whitespace, comments) are consumed and
//! dropped. The stream always ends with an EOF token.

mod builder;
mod token;

pub use builder::LexerBuilder;
pub use token::{Position, Token, TokenStream, EOF_CLASS};

use crate::error::{GrammarError, LexerError};
use compact_str::CompactString;
use hashbrown::HashSet;
use regex::Regex;
use std::sync::Arc;

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

const SNIPPET_LEN: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serialize", serde(rename_all = "lowercase"))]
pub enum ClassKind {
    Token,
    Skip,
    Literal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct TokenClass {
    pub name: CompactString,
    pub pattern: String,
    pub kind: ClassKind,
}

/// The declarative part of a lexer: what gets persisted and restored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct LexerSpec {
    pub classes: Vec<TokenClass>,
}

/// A compiled lexer
#[derive(Debug, Clone)]
pub struct Lexer {
    spec: LexerSpec,
    compiled: Vec<Regex>,
}

impl Lexer {
    /// Compile a lexer from its class list.
    ///
    /// # Errors
    ///
    /// Returns [`GrammarError::InvalidPattern`] for a bad regular expression
    /// and [`GrammarError::DuplicateTokenClass`] when two non-literal classes
    /// share a name.
    pub fn new(spec: LexerSpec) -> Result<Self, GrammarError> {
        let mut seen = HashSet::with_hasher(ahash::RandomState::new());
        let mut compiled = Vec::with_capacity(spec.classes.len());
        for class in &spec.classes {
            // literals are keyed by their text, apart from the reserved class
            let reserved = class.kind != ClassKind::Literal && class.name == EOF_CLASS;
            if reserved || (class.kind != ClassKind::Literal && !seen.insert(class.name.clone())) {
                return Err(GrammarError::DuplicateTokenClass {
                    name: class.name.to_string(),
                });
            }
            let anchored = format!(r"\A(?:{})", class.pattern);
            let regex = Regex::new(&anchored).map_err(|source| GrammarError::InvalidPattern {
                owner: format!("token class '{}'", class.name),
                source,
            })?;
            compiled.push(regex);
        }
        Ok(Self { spec, compiled })
    }

    #[must_use]
    pub const fn spec(&self) -> &LexerSpec {
        &self.spec
    }

    /// Names of the pattern classes the grammar may reference as `Token-<name>`
    pub fn token_class_names(&self) -> impl Iterator<Item = &str> {
        self.spec
            .classes
            .iter()
            .filter(|c| c.kind == ClassKind::Token)
            .map(|c| c.name.as_str())
    }

    /// Tokenize `source`, appending an EOF token.
    ///
    /// # Errors
    ///
    /// Returns a [`LexerError`] at the first offset no class matches.
    pub fn tokenize(&self, source: &str) -> Result<TokenStream, LexerError> {
        let mut tokens = Vec::new();
        let mut offset = 0;
        let mut line = 1u32;
        let mut column = 1u32;

        while offset < source.len() {
            let rest = &source[offset..];
            let Some((index, len)) = self.longest_match(rest) else {
                return Err(LexerError {
                    position: Position::new(line, column, offset, 0),
                    snippet: rest.chars().take(SNIPPET_LEN).collect(),
                });
            };
            let text = &rest[..len];
            let class = &self.spec.classes[index];
            if class.kind != ClassKind::Skip {
                tokens.push(Token::new(
                    class.name.clone(),
                    text,
                    Position::new(line, column, offset, len),
                ));
            }
            for ch in text.chars() {
                if ch == '\n' {
                    line += 1;
                    column = 1;
                } else {
                    column += 1;
                }
            }
            offset += len;
        }

        tokens.push(Token::eof(Position::new(line, column, offset, 0)));
        tracing::trace!(tokens = tokens.len(), "tokenized input");
        Ok(TokenStream::from_tokens(tokens).with_source(Arc::<str>::from(source)))
    }

    fn longest_match(&self, rest: &str) -> Option<(usize, usize)> {
        let mut best: Option<(usize, usize)> = None;
        for (index, regex) in self.compiled.iter().enumerate() {
            let Some(found) = regex.find(rest) else {
                continue;
            };
            let len = found.end();
            if len == 0 {
                continue;
            }
            let better = match best {
                None => true,
                Some((best_index, best_len)) => {
                    len > best_len
                        || (len == best_len
                            && self.spec.classes[index].kind == ClassKind::Literal
                            && self.spec.classes[best_index].kind != ClassKind::Literal)
                }
            };
            if better {
                best = Some((index, len));
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calc_lexer() -> Lexer {
        LexerBuilder::new()
            .token("int", "[0-9]+")
            .token("ident", "[a-z]+")
            .skip("ws", r"\s+")
            .literal("+")
            .literal("if")
            .build()
            .unwrap()
    }

    #[test]
    fn test_tokenize_positions() {
        let tokens = calc_lexer().tokenize("12 +\n 3").unwrap();
        let classes: Vec<_> = tokens.iter().map(|t| t.class.as_str()).collect();
        assert_eq!(classes, ["int", "+", "int", "EOF"]);
        let three = tokens.get(2).unwrap();
        assert_eq!((three.position.line, three.position.column), (2, 2));
        assert_eq!(three.position.absolute, 6);
        assert_eq!(tokens.get(3).unwrap().position.absolute, 7);
    }

    #[test]
    fn test_literal_wins_tie() {
        let tokens = calc_lexer().tokenize("if iff").unwrap();
        assert_eq!(tokens.get(0).unwrap().class, "if");
        assert_eq!(tokens.get(1).unwrap().class, "ident");
    }

    #[test]
    fn test_no_match_reports_position() {
        let err = calc_lexer().tokenize("1 + $x").unwrap_err();
        assert_eq!(err.position.column, 5);
        assert_eq!(err.snippet, "$x");
    }

    #[test]
    fn test_bad_pattern() {
        let err = LexerBuilder::new().token("bad", "(").build().unwrap_err();
        assert!(matches!(err, GrammarError::InvalidPattern { .. }));
    }

    #[test]
    fn test_duplicate_class() {
        let err = LexerBuilder::new()
            .token("a", "a")
            .token("a", "b")
            .build()
            .unwrap_err();
        assert!(matches!(err, GrammarError::DuplicateTokenClass { .. }));
    }

    #[test]
    fn test_eof_literal_is_an_ordinary_token() {
        let lexer = LexerBuilder::new()
            .literal("EOF")
            .skip("ws", r"\s+")
            .build()
            .unwrap();
        let tokens = lexer.tokenize("EOF EOF").unwrap();
        assert_eq!(tokens.len(), 3);
        assert!(!tokens.get(0).unwrap().is_eof());
        assert_eq!(tokens.get(1).unwrap().describe(), "\"EOF\"");
        assert!(tokens.get(2).unwrap().is_eof());

        let err = LexerBuilder::new().token("EOF", "x").build().unwrap_err();
        assert!(matches!(err, GrammarError::DuplicateTokenClass { .. }));
    }

    #[test]
    fn test_empty_source_is_just_eof() {
        let tokens = calc_lexer().tokenize("   ").unwrap();
        assert!(tokens.is_blank());
        assert_eq!(tokens.len(), 1);
    }
}
