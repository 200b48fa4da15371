use compact_str::CompactString;
use std::fmt;

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// Index of a rule in its grammar's rule table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct RuleId(pub u32);

/// Index of a terminal in its grammar's terminal table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct TerminalId(pub u32);

impl RuleId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl TerminalId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// One position of an alternative's right-hand side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum Symbol {
    Rule(RuleId),
    Terminal(TerminalId),
}

impl Symbol {
    #[must_use]
    pub const fn as_rule(self) -> Option<RuleId> {
        match self {
            Self::Rule(id) => Some(id),
            Self::Terminal(_) => None,
        }
    }

    #[must_use]
    pub const fn as_terminal(self) -> Option<TerminalId> {
        match self {
            Self::Terminal(id) => Some(id),
            Self::Rule(_) => None,
        }
    }
}

/// Operator associativity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum Associativity {
    /// Left-associative: `a + b + c` groups as `(a + b) + c`
    #[default]
    Left,
    /// Right-associative: `a = b = c` groups as `a = (b = c)`
    Right,
    /// Non-associative: `a == b == c` has no valid grouping
    None,
}

/// A literal terminal matched by exact token text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Literal {
    pub value: CompactString,
    /// Binding strength; higher binds tighter
    pub precedence: Option<u32>,
    pub associativity: Associativity,
}

/// A terminal tested by class name or by regular expression.
///
/// `class` is set for the terminals spliced in for lexer token classes and
/// matches on the token's class. Free-standing `/pattern/flags` terminals
/// leave it unset and match when the pattern covers the whole token text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct RegExpTerminal {
    pub pattern: String,
    pub flags: CompactString,
    pub class: Option<CompactString>,
}

impl RegExpTerminal {
    /// The `(?flags)` prefixed, fully anchored form compiled for matching
    #[must_use]
    pub fn anchored_source(&self) -> String {
        if self.flags.is_empty() {
            format!(r"\A(?:{})\z", self.pattern)
        } else {
            format!(r"(?{})\A(?:{})\z", self.flags, self.pattern)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum Terminal {
    Literal(Literal),
    RegExp(RegExpTerminal),
}

impl Terminal {
    #[must_use]
    pub fn literal(value: impl Into<CompactString>) -> Self {
        Self::Literal(Literal {
            value: value.into(),
            precedence: None,
            associativity: Associativity::Left,
        })
    }

    #[must_use]
    pub fn token_class(class: impl Into<CompactString>, pattern: impl Into<String>) -> Self {
        Self::RegExp(RegExpTerminal {
            pattern: pattern.into(),
            flags: CompactString::default(),
            class: Some(class.into()),
        })
    }

    /// The empty literal, which derives epsilon
    #[must_use]
    pub fn is_epsilon(&self) -> bool {
        matches!(self, Self::Literal(lit) if lit.value.is_empty())
    }

    #[must_use]
    pub const fn precedence(&self) -> Option<(u32, Associativity)> {
        match self {
            Self::Literal(Literal {
                precedence: Some(p),
                associativity,
                ..
            }) => Some((*p, *associativity)),
            _ => None,
        }
    }

    pub(crate) fn key(&self) -> TerminalKey {
        match self {
            Self::Literal(lit) => TerminalKey::Literal(lit.value.clone()),
            Self::RegExp(re) => {
                TerminalKey::RegExp(re.pattern.clone(), re.flags.clone(), re.class.clone())
            }
        }
    }
}

impl fmt::Display for Terminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(lit) => write!(f, "{:?}", lit.value.as_str()),
            Self::RegExp(RegExpTerminal {
                class: Some(class), ..
            }) => f.write_str(class),
            Self::RegExp(re) => write!(f, "/{}/{}", re.pattern, re.flags),
        }
    }
}

/// Interning key: literal equality is value equality, regexp equality is
/// pattern plus flags plus class.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum TerminalKey {
    Literal(CompactString),
    RegExp(String, CompactString, Option<CompactString>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_key_ignores_annotations() {
        let plain = Terminal::literal("+");
        let annotated = Terminal::Literal(Literal {
            value: "+".into(),
            precedence: Some(2),
            associativity: Associativity::Right,
        });
        assert_eq!(plain.key(), annotated.key());
        assert_eq!(annotated.precedence(), Some((2, Associativity::Right)));
        assert_eq!(plain.precedence(), None);
    }

    #[test]
    fn test_regexp_anchoring() {
        let re = RegExpTerminal {
            pattern: "[a-z]+".into(),
            flags: "i".into(),
            class: None,
        };
        assert_eq!(re.anchored_source(), r"(?i)\A(?:[a-z]+)\z");
    }

    #[test]
    fn test_display() {
        assert_eq!(Terminal::literal("+").to_string(), "\"+\"");
        assert_eq!(Terminal::token_class("int", "[0-9]+").to_string(), "int");
        assert!(Terminal::literal("").is_epsilon());
    }
}
