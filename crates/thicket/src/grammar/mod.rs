//! # Grammar
//!
//! The rule table every other component consumes.
//!
//! ## Overview
//!
//! A [`Grammar`] is a flat table of [`Rule`]s and [`Terminal`]s addressed by
//! [`RuleId`] and [`TerminalId`]. Rule `#S` is always present and always
//! has exactly one alternative, `<first> <Token-EOF>`. One `Token-<class>`
//! rule is spliced in per lexer class so grammars can reference lexer
//! output directly.
//!
//! Grammars are normally read from text with [`notation::parse_bnf`] or
//! [`notation::parse_ebnf`]; [`GrammarBuilder`] assembles them in code.

mod analysis;
mod builder;
mod matcher;
pub mod notation;
mod rule;
mod symbol;

pub use analysis::{compute_nullable, nullable_suffix_start, reachable_rules, symbol_nullable};
pub use builder::{token_rule_name, GrammarBuilder};
pub use matcher::TerminalMatcher;
pub use rule::{Alternative, Operator, Rule, RuleIdentity, RuleKind};
pub use symbol::{Associativity, Literal, RegExpTerminal, RuleId, Symbol, Terminal, TerminalId};

use compact_str::CompactString;
use hashbrown::HashMap;

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// Name of the synthetic accept rule
pub const START_RULE: &str = "#S";

/// Prefix of the rules spliced in for lexer token classes
pub const TOKEN_RULE_PREFIX: &str = "Token-";

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Grammar {
    rules: Vec<Rule>,
    terminals: Vec<Terminal>,
    rule_index: HashMap<CompactString, RuleId, ahash::RandomState>,
    start: RuleId,
    first: RuleId,
    eof_rule: RuleId,
    eof: TerminalId,
}

impl Grammar {
    pub(crate) fn from_parts(
        rules: Vec<Rule>,
        terminals: Vec<Terminal>,
        rule_index: HashMap<CompactString, RuleId, ahash::RandomState>,
        start: RuleId,
        first: RuleId,
        eof_rule: RuleId,
        eof: TerminalId,
    ) -> Self {
        Self {
            rules,
            terminals,
            rule_index,
            start,
            first,
            eof_rule,
            eof,
        }
    }

    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    #[must_use]
    pub fn terminals(&self) -> &[Terminal] {
        &self.terminals
    }

    /// Look up a rule by id.
    ///
    /// Ids handed out by this grammar are always valid, so indexing is
    /// direct.
    #[must_use]
    pub fn rule(&self, id: RuleId) -> &Rule {
        &self.rules[id.index()]
    }

    #[must_use]
    pub fn terminal(&self, id: TerminalId) -> &Terminal {
        &self.terminals[id.index()]
    }

    #[must_use]
    pub fn rule_by_name(&self, name: &str) -> Option<RuleId> {
        self.rule_index.get(name).copied()
    }

    /// The synthetic `#S` rule
    #[must_use]
    pub const fn start(&self) -> RuleId {
        self.start
    }

    /// The first user rule, wrapped by `#S`
    #[must_use]
    pub const fn first(&self) -> RuleId {
        self.first
    }

    /// The `Token-EOF` rule
    #[must_use]
    pub const fn eof_rule(&self) -> RuleId {
        self.eof_rule
    }

    #[must_use]
    pub const fn eof_terminal(&self) -> TerminalId {
        self.eof
    }

    #[must_use]
    pub fn is_nullable(&self, rule: RuleId) -> bool {
        self.rules[rule.index()].nullable
    }

    #[must_use]
    pub fn symbol_nullable(&self, symbol: Symbol) -> bool {
        match symbol {
            Symbol::Rule(id) => self.is_nullable(id),
            Symbol::Terminal(_) => false,
        }
    }

    #[must_use]
    pub fn alternative(&self, rule: RuleId, alt: usize) -> &Alternative {
        &self.rules[rule.index()].alternatives[alt]
    }

    /// Literal values, for adding literal classes to a lexer
    pub fn literals(&self) -> impl Iterator<Item = &str> {
        self.terminals.iter().filter_map(|t| match t {
            Terminal::Literal(lit) if !lit.value.is_empty() => Some(lit.value.as_str()),
            _ => None,
        })
    }

    #[must_use]
    pub fn symbol_name(&self, symbol: Symbol) -> String {
        match symbol {
            Symbol::Rule(id) => format!("<{}>", self.rule(id).name),
            Symbol::Terminal(id) => self.terminal(id).to_string(),
        }
    }

    /// Render one alternative as grammar text, with a dot when `dot` is set
    #[must_use]
    pub fn display_alternative(&self, rule: RuleId, alt: usize, dot: Option<usize>) -> String {
        let symbols = &self.alternative(rule, alt).symbols;
        let mut out = format!("<{}> ::=", self.rule(rule).name);
        for (index, sym) in symbols.iter().enumerate() {
            if dot == Some(index) {
                out.push_str(" •");
            }
            out.push(' ');
            out.push_str(&self.symbol_name(*sym));
        }
        if dot == Some(symbols.len()) {
            out.push_str(" •");
        }
        out
    }

    /// Render the whole rule table as BNF text
    #[must_use]
    pub fn to_bnf(&self) -> String {
        let mut out = String::new();
        for (index, rule) in self.rules.iter().enumerate() {
            let id = RuleId(u32::try_from(index).unwrap_or(u32::MAX));
            if id == self.start || rule.kind == RuleKind::TokenClass {
                continue;
            }
            out.push_str(&format!("<{}> ::=", rule.name));
            for (alt_index, alt) in rule.alternatives.iter().enumerate() {
                if alt_index > 0 {
                    out.push_str(" |");
                }
                if alt.is_empty() {
                    out.push_str(" \"\"");
                }
                for sym in &alt.symbols {
                    out.push(' ');
                    out.push_str(&self.symbol_name(*sym));
                }
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::notation::parse_bnf;
    use super::RuleIdentity;

    #[test]
    fn test_identity_stable_across_grammars() {
        let a = parse_bnf("<Expr> ::= \"x\" <Tail>\n<Tail> ::= \"y\" | \"\"", &[]).unwrap();
        let b = parse_bnf("<Top> ::= <Tail>\n<Tail> ::= \"z\"", &[]).unwrap();
        let tail_a = a.rule(a.rule_by_name("Tail").unwrap());
        let tail_b = b.rule(b.rule_by_name("Tail").unwrap());
        assert_eq!(tail_a.identity, tail_b.identity);
        assert_ne!(
            tail_a.identity,
            a.rule(a.rule_by_name("Expr").unwrap()).identity
        );
    }

    #[test]
    fn test_identity_does_not_depend_on_hasher_state() {
        let first = RuleIdentity::of("Tail");
        // fresh per-instance keys would make these disagree
        for _ in 0..8 {
            assert_eq!(RuleIdentity::of("Tail"), first);
        }
        assert_ne!(RuleIdentity::of("Tail"), RuleIdentity::of("tail"));
    }

    #[test]
    fn test_display_alternative_with_dot() {
        let g = parse_bnf("<E> ::= <E> \"+\" \"n\" | \"n\"", &[]).unwrap();
        let e = g.rule_by_name("E").unwrap();
        assert_eq!(g.display_alternative(e, 0, Some(1)), "<E> ::= <E> • \"+\" \"n\"");
        assert_eq!(g.display_alternative(e, 1, Some(1)), "<E> ::= \"n\" •");
    }

    #[test]
    fn test_literals_listed() {
        let g = parse_bnf("<E> ::= <E> \"+\" <E> | \"n\" | \"\"", &[]).unwrap();
        let mut lits: Vec<_> = g.literals().collect();
        lits.sort_unstable();
        assert_eq!(lits, ["+", "n"]);
    }
}
