use super::{ClassKind, Lexer, LexerSpec, TokenClass};
use crate::error::GrammarError;
use compact_str::CompactString;
use smallvec::SmallVec;

/// Declares the token classes of a lexer.
///
/// ```rust,no_run
/// use thicket::lexer::LexerBuilder;
///
/// let lexer = LexerBuilder::new()
///     .token("int", r"[0-9]+")
///     .skip("ws", r"\s+")
///     .literal("+")
///     .build()
///     .expect("valid patterns");
/// let tokens = lexer.tokenize("1 + 2").expect("lexes");
/// assert_eq!(tokens.len(), 4);
/// ```
#[derive(Debug, Clone, Default)]
pub struct LexerBuilder {
    classes: SmallVec<[TokenClass; 16]>,
}

impl LexerBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a token class. Its tokens can be referenced from grammars as
    /// `<Token-name>`.
    #[must_use]
    pub fn token(mut self, name: &str, pattern: &str) -> Self {
        self.push(name, pattern.to_string(), ClassKind::Token);
        self
    }

    /// Add a class whose matches are dropped from the token stream
    #[must_use]
    pub fn skip(mut self, name: &str, pattern: &str) -> Self {
        self.push(name, pattern.to_string(), ClassKind::Skip);
        self
    }

    /// Add an exact-text class. Literal classes win ties against pattern
    /// classes of the same match length.
    #[must_use]
    pub fn literal(mut self, text: &str) -> Self {
        self.add_literal(text);
        self
    }

    pub(crate) fn add_literal(&mut self, text: &str) {
        if text.is_empty() || self.has_literal(text) {
            return;
        }
        self.push(text, regex::escape(text), ClassKind::Literal);
    }

    fn has_literal(&self, text: &str) -> bool {
        self.classes
            .iter()
            .any(|c| c.kind == ClassKind::Literal && c.name == text)
    }

    fn push(&mut self, name: &str, pattern: String, kind: ClassKind) {
        self.classes.push(TokenClass {
            name: CompactString::new(name),
            pattern,
            kind,
        });
    }

    /// Names of the non-skip pattern classes, in declaration order
    pub fn token_class_names(&self) -> impl Iterator<Item = &str> {
        self.classes
            .iter()
            .filter(|c| c.kind == ClassKind::Token)
            .map(|c| c.name.as_str())
    }

    #[must_use]
    pub fn spec(&self) -> LexerSpec {
        LexerSpec {
            classes: self.classes.to_vec(),
        }
    }

    /// Compile every class pattern.
    ///
    /// # Errors
    ///
    /// Returns an error if a pattern is not a valid regular expression or a
    /// pattern class name is declared twice.
    pub fn build(self) -> Result<Lexer, GrammarError> {
        Lexer::new(LexerSpec {
            classes: self.classes.into_vec(),
        })
    }
}

impl From<LexerSpec> for LexerBuilder {
    fn from(spec: LexerSpec) -> Self {
        Self {
            classes: spec.classes.into_iter().collect(),
        }
    }
}
