use crate::grammar::{Grammar, RuleId, Symbol};
use std::fmt;

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// An LR(0) item: how far alternative `alt` of `rule` has been recognised.
///
/// Ordering is by rule, then alternative, then dot, which gives item sets
/// a canonical sorted form for state merging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Item {
    pub rule: RuleId,
    pub alt: u32,
    pub dot: u32,
}

impl Item {
    #[must_use]
    pub const fn new(rule: RuleId, alt: u32, dot: u32) -> Self {
        Self { rule, alt, dot }
    }

    /// The symbol right after the dot, if any
    #[must_use]
    pub fn next_symbol(&self, grammar: &Grammar) -> Option<Symbol> {
        grammar
            .alternative(self.rule, self.alt as usize)
            .symbols
            .get(self.dot as usize)
            .copied()
    }

    #[must_use]
    pub const fn advance(self) -> Self {
        Self {
            dot: self.dot + 1,
            ..self
        }
    }

    /// True when everything after the dot can derive the empty string, so
    /// the item may reduce here
    #[must_use]
    pub fn is_right_nullable(&self, grammar: &Grammar) -> bool {
        self.dot as usize >= grammar.alternative(self.rule, self.alt as usize).nullable_from
    }

    pub fn display<'a>(&'a self, grammar: &'a Grammar) -> impl fmt::Display + 'a {
        ItemDisplay {
            item: self,
            grammar,
        }
    }
}

struct ItemDisplay<'a> {
    item: &'a Item,
    grammar: &'a Grammar,
}

impl fmt::Display for ItemDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.grammar.display_alternative(
            self.item.rule,
            self.item.alt as usize,
            Some(self.item.dot as usize),
        ))
    }
}
