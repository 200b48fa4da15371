use crate::error::get_context;
use compact_str::CompactString;
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// Class name carried by the synthetic end-of-input token. Lexed tokens
/// are never empty, so a literal spelled `EOF` cannot be mistaken for it.
pub const EOF_CLASS: &str = "EOF";

/// Characters of surrounding source shown in diagnostics.
const NEAR_TEXT_RADIUS: usize = 20;

/// Location of a token in its source text.
///
/// `line` and `column` are 1-based, `column` counts characters. `absolute`
/// and `length` are byte offsets into the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Position {
    pub line: u32,
    pub column: u32,
    pub absolute: usize,
    pub length: usize,
}

impl Position {
    #[must_use]
    pub const fn new(line: u32, column: u32, absolute: usize, length: usize) -> Self {
        Self {
            line,
            column,
            absolute,
            length,
        }
    }

    /// Byte offset one past the end of the token
    #[must_use]
    pub const fn end(&self) -> usize {
        self.absolute + self.length
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A lexed token: its class, its text and where it came from.
///
/// Literal terminals in a grammar match on `text`; token-class terminals
/// match on `class`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Token {
    pub class: CompactString,
    pub text: CompactString,
    pub position: Position,
}

impl Token {
    #[must_use]
    pub fn new(class: impl Into<CompactString>, text: impl Into<CompactString>, position: Position) -> Self {
        Self {
            class: class.into(),
            text: text.into(),
            position,
        }
    }

    /// The synthetic end-of-input token
    #[must_use]
    pub fn eof(position: Position) -> Self {
        Self::new(EOF_CLASS, "", position)
    }

    #[must_use]
    pub fn is_eof(&self) -> bool {
        self.class == EOF_CLASS && self.text.is_empty()
    }

    /// Human-readable form used in error messages
    #[must_use]
    pub fn describe(&self) -> String {
        if self.is_eof() {
            "end of input".to_string()
        } else {
            format!("{:?}", self.text.as_str())
        }
    }
}

/// An ordered token sequence terminated by an EOF token.
///
/// Keeps the source text when there is one so diagnostics can quote it.
#[derive(Debug, Clone, Default)]
pub struct TokenStream {
    tokens: Vec<Token>,
    source: Option<Arc<str>>,
}

impl TokenStream {
    /// Wrap tokens produced elsewhere. An EOF token is appended if missing.
    #[must_use]
    pub fn from_tokens(tokens: Vec<Token>) -> Self {
        let mut stream = Self {
            tokens,
            source: None,
        };
        stream.ensure_eof();
        stream
    }

    #[must_use]
    pub fn with_source(mut self, source: impl Into<Arc<str>>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Append an EOF token positioned just after the last token
    pub fn ensure_eof(&mut self) {
        if self.tokens.last().is_some_and(Token::is_eof) {
            return;
        }
        let position = self.tokens.last().map_or(Position::new(1, 1, 0, 0), |last| {
            let width = u32::try_from(last.text.chars().count()).unwrap_or(u32::MAX);
            Position::new(
                last.position.line,
                last.position.column.saturating_add(width),
                last.position.end(),
                0,
            )
        });
        self.tokens.push(Token::eof(position));
    }

    #[must_use]
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    #[must_use]
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Token> {
        self.tokens.get(index)
    }

    /// Number of tokens, including EOF
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// True when the stream holds nothing but the EOF token
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.tokens.iter().all(Token::is_eof)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Token> {
        self.tokens.iter()
    }

    /// Text surrounding token `index`, for diagnostics.
    ///
    /// Quotes the source when available, otherwise joins neighbouring token
    /// texts.
    #[must_use]
    pub fn near_text(&self, index: usize) -> String {
        let Some(token) = self.tokens.get(index) else {
            return String::new();
        };
        if let Some(source) = &self.source {
            return get_context(
                source,
                token.position.absolute,
                token.position.end(),
                NEAR_TEXT_RADIUS,
            )
            .trim()
            .to_string();
        }
        let from = index.saturating_sub(3);
        let to = (index + 4).min(self.tokens.len());
        self.tokens[from..to]
            .iter()
            .filter(|t| !t.is_eof())
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl<'a> IntoIterator for &'a TokenStream {
    type Item = &'a Token;
    type IntoIter = std::slice::Iter<'a, Token>;

    fn into_iter(self) -> Self::IntoIter {
        self.tokens.iter()
    }
}
