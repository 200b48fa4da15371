use super::item::Item;
use super::lookahead::{Lookahead, LookaheadSet};
use crate::grammar::{Grammar, RuleId, Symbol, TerminalId};
use std::fmt;

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// Index of a state in its automaton
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct StateId(pub u32);

impl StateId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A reduction available in a state: reduce `length` symbols of
/// alternative `alt` of `rule` when the next token is in `lookahead`.
///
/// `length` is less than the alternative's length for right-nulled
/// reductions; the missing suffix is supplied by the epsilon forest.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Reduction {
    pub rule: RuleId,
    pub alt: u32,
    pub length: u32,
    pub lookahead: LookaheadSet,
}

/// One LALR(1) state.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct ItemSet {
    pub id: StateId,
    /// Sorted kernel items; two states never share a kernel
    pub kernel: Vec<Item>,
    /// Kernel plus closure
    pub items: Vec<Item>,
    /// Sorted by terminal
    pub shifts: Vec<(TerminalId, StateId)>,
    /// Sorted by rule
    pub gotos: Vec<(RuleId, StateId)>,
    pub reductions: Vec<Reduction>,
    /// Contains `#S ::= <first> <Token-EOF> •`
    pub accepting: bool,
}

impl ItemSet {
    pub(crate) fn new(id: StateId, kernel: Vec<Item>, items: Vec<Item>) -> Self {
        Self {
            id,
            kernel,
            items,
            shifts: Vec::new(),
            gotos: Vec::new(),
            reductions: Vec::new(),
            accepting: false,
        }
    }

    #[must_use]
    pub fn shift(&self, terminal: TerminalId) -> Option<StateId> {
        self.shifts
            .binary_search_by_key(&terminal, |(t, _)| *t)
            .ok()
            .map(|i| self.shifts[i].1)
    }

    #[must_use]
    pub fn goto(&self, rule: RuleId) -> Option<StateId> {
        self.gotos
            .binary_search_by_key(&rule, |(r, _)| *r)
            .ok()
            .map(|i| self.gotos[i].1)
    }

    #[must_use]
    pub fn transition(&self, symbol: Symbol) -> Option<StateId> {
        match symbol {
            Symbol::Rule(rule) => self.goto(rule),
            Symbol::Terminal(terminal) => self.shift(terminal),
        }
    }

    /// Every lookahead with some action here, for error reporting
    pub fn expected(&self) -> impl Iterator<Item = Lookahead> + '_ {
        let mut all: Vec<Lookahead> = self
            .shifts
            .iter()
            .map(|(t, _)| Lookahead::Terminal(*t))
            .chain(self.reductions.iter().flat_map(|r| r.lookahead.iter()))
            .collect();
        if self.accepting {
            all.push(Lookahead::End);
        }
        all.sort_unstable();
        all.dedup();
        all.into_iter()
    }

    /// Multi-line dump of the state's items and transitions
    #[must_use]
    pub fn describe(&self, grammar: &Grammar) -> String {
        let mut out = format!("state {}\n", self.id);
        for item in &self.items {
            let marker = if self.kernel.binary_search(item).is_ok() { "" } else { "+" };
            out.push_str(&format!("  {marker}{}\n", item.display(grammar)));
        }
        for (terminal, target) in &self.shifts {
            out.push_str(&format!("  shift {} -> {target}\n", grammar.terminal(*terminal)));
        }
        for (rule, target) in &self.gotos {
            out.push_str(&format!("  goto <{}> -> {target}\n", grammar.rule(*rule).name));
        }
        for reduction in &self.reductions {
            out.push_str(&format!(
                "  reduce {} [{}]\n",
                grammar.display_alternative(reduction.rule, reduction.alt as usize, Some(reduction.length as usize)),
                reduction
                    .lookahead
                    .iter()
                    .map(|la| match la {
                        Lookahead::Terminal(t) => grammar.terminal(t).to_string(),
                        Lookahead::End => "$".to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(" ")
            ));
        }
        if self.accepting {
            out.push_str("  accept\n");
        }
        out
    }
}
