use super::analysis::{compute_nullable, nullable_suffix_start, reachable_rules};
use super::rule::{Alternative, Operator, Rule, RuleKind};
use super::symbol::{Associativity, RegExpTerminal, RuleId, Symbol, Terminal, TerminalId, TerminalKey};
use super::{Grammar, START_RULE, TOKEN_RULE_PREFIX};
use crate::error::GrammarError;
use crate::lexer::EOF_CLASS;
use compact_str::{format_compact, CompactString};
use hashbrown::HashMap;
use smallvec::SmallVec;

const START_ID: RuleId = RuleId(0);
const TOKEN_EOF_ID: RuleId = RuleId(1);

#[derive(Debug, Clone)]
struct RuleDraft {
    rule: Rule,
    referenced_at: Option<(u32, u32)>,
}

/// Assembles a rule table and finalizes it into a [`Grammar`].
///
/// The BNF and EBNF readers drive this builder; it can also be used
/// directly to construct grammars in code. Rules are interned by name so a
/// rule may be referenced before it is defined, and defining a rule twice
/// unions the alternatives.
#[derive(Debug, Clone)]
pub struct GrammarBuilder {
    drafts: Vec<RuleDraft>,
    rule_index: HashMap<CompactString, RuleId, ahash::RandomState>,
    terminals: Vec<Terminal>,
    terminal_index: HashMap<TerminalKey, TerminalId, ahash::RandomState>,
    explicit_associativity: HashMap<TerminalId, Associativity, ahash::RandomState>,
    token_classes: Vec<(CompactString, String)>,
    first: Option<RuleId>,
}

impl Default for GrammarBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GrammarBuilder {
    #[must_use]
    pub fn new() -> Self {
        let mut builder = Self {
            drafts: Vec::new(),
            rule_index: HashMap::with_hasher(ahash::RandomState::new()),
            terminals: Vec::new(),
            terminal_index: HashMap::with_hasher(ahash::RandomState::new()),
            explicit_associativity: HashMap::with_hasher(ahash::RandomState::new()),
            token_classes: Vec::new(),
            first: None,
        };
        builder.rule_id(START_RULE, RuleKind::Start);
        builder.rule_id(&token_rule_name(EOF_CLASS), RuleKind::TokenClass);
        builder
    }

    /// Declare a lexer token class, spliced in as `Token-<name>`
    #[must_use]
    pub fn with_token_class(mut self, name: &str, pattern: &str) -> Self {
        self.token_class(name, pattern);
        self
    }

    pub fn token_class(&mut self, name: &str, pattern: &str) {
        if !self.token_classes.iter().any(|(n, _)| n == name) {
            self.token_classes
                .push((CompactString::new(name), pattern.to_string()));
        }
    }

    #[must_use]
    pub fn has_token_class(&self, name: &str) -> bool {
        name == EOF_CLASS || self.token_classes.iter().any(|(n, _)| n == name)
    }

    /// Intern a rule by name, creating it empty if it does not exist yet
    pub fn rule_id(&mut self, name: &str, kind: RuleKind) -> RuleId {
        if let Some(id) = self.rule_index.get(name) {
            return *id;
        }
        let id = RuleId(u32::try_from(self.drafts.len()).unwrap_or(u32::MAX));
        self.drafts.push(RuleDraft {
            rule: Rule::new(name, kind),
            referenced_at: None,
        });
        self.rule_index.insert(CompactString::new(name), id);
        id
    }

    /// Intern a rule referenced from grammar text, remembering where the
    /// first reference was so an undefined rule can be reported there.
    pub fn reference(&mut self, name: &str, line: u32, column: u32) -> RuleId {
        let kind = if name.starts_with(TOKEN_RULE_PREFIX) {
            RuleKind::TokenClass
        } else {
            RuleKind::Normal
        };
        let id = self.rule_id(name, kind);
        let draft = &mut self.drafts[id.index()];
        if draft.referenced_at.is_none() {
            draft.referenced_at = Some((line, column));
        }
        id
    }

    #[must_use]
    pub fn is_defined(&self, rule: RuleId) -> bool {
        self.drafts
            .get(rule.index())
            .is_some_and(|d| !d.rule.alternatives.is_empty())
    }

    #[must_use]
    pub fn rule_name(&self, rule: RuleId) -> &str {
        self.drafts
            .get(rule.index())
            .map_or("", |d| d.rule.name.as_str())
    }

    /// Append an alternative. Empty literals are dropped from it and an
    /// alternative identical to an existing one is ignored.
    ///
    /// The first user rule to receive an alternative becomes the grammar's
    /// first rule unless [`GrammarBuilder::set_first`] says otherwise.
    pub fn add_alternative(&mut self, rule: RuleId, symbols: impl IntoIterator<Item = Symbol>) {
        let symbols: SmallVec<[Symbol; 4]> = symbols
            .into_iter()
            .filter(|sym| match sym {
                Symbol::Terminal(t) => !self.terminals[t.index()].is_epsilon(),
                Symbol::Rule(_) => true,
            })
            .collect();
        let Some(draft) = self.drafts.get_mut(rule.index()) else {
            return;
        };
        if draft.rule.kind == RuleKind::Normal && self.first.is_none() {
            self.first = Some(rule);
        }
        if draft.rule.alternatives.iter().any(|alt| alt.symbols == symbols) {
            return;
        }
        draft.rule.alternatives.push(Alternative::new(symbols));
    }

    pub fn set_first(&mut self, rule: RuleId) {
        self.first = Some(rule);
    }

    #[must_use]
    pub const fn first(&self) -> Option<RuleId> {
        self.first
    }

    #[must_use]
    pub fn is_epsilon(&self, terminal: TerminalId) -> bool {
        self.terminals
            .get(terminal.index())
            .is_some_and(Terminal::is_epsilon)
    }

    /// Grammar-text form of a symbol, used to name synthetic rules
    #[must_use]
    pub fn describe(&self, symbol: Symbol) -> String {
        match symbol {
            Symbol::Rule(id) => format!("<{}>", self.rule_name(id)),
            Symbol::Terminal(id) => self
                .terminals
                .get(id.index())
                .map_or_else(String::new, ToString::to_string),
        }
    }

    pub fn literal(&mut self, value: &str) -> TerminalId {
        self.intern_terminal(Terminal::literal(value))
    }

    pub fn regexp(&mut self, pattern: &str, flags: &str) -> TerminalId {
        self.intern_terminal(Terminal::RegExp(RegExpTerminal {
            pattern: pattern.to_string(),
            flags: CompactString::new(flags),
            class: None,
        }))
    }

    fn intern_terminal(&mut self, terminal: Terminal) -> TerminalId {
        let key = terminal.key();
        if let Some(id) = self.terminal_index.get(&key) {
            return *id;
        }
        let id = TerminalId(u32::try_from(self.terminals.len()).unwrap_or(u32::MAX));
        self.terminals.push(terminal);
        self.terminal_index.insert(key, id);
        id
    }

    /// Attach operator metadata to a literal.
    ///
    /// # Errors
    ///
    /// Returns [`GrammarError::ConflictingPrecedence`] when the literal
    /// already carries a different precedence or associativity, and
    /// [`GrammarError::MisplacedAnnotation`] for non-literal terminals.
    pub fn annotate(
        &mut self,
        terminal: TerminalId,
        precedence: Option<u32>,
        associativity: Option<Associativity>,
        line: u32,
        column: u32,
    ) -> Result<(), GrammarError> {
        let explicit = self.explicit_associativity.get(&terminal).copied();
        let Some(Terminal::Literal(lit)) = self.terminals.get_mut(terminal.index()) else {
            return Err(GrammarError::MisplacedAnnotation {
                annotation: "operator annotation".into(),
                line,
                column,
            });
        };
        let conflict = |value: &CompactString| GrammarError::ConflictingPrecedence {
            literal: value.to_string(),
            line,
            column,
        };
        if let Some(p) = precedence {
            match lit.precedence {
                Some(existing) if existing != p => return Err(conflict(&lit.value)),
                _ => lit.precedence = Some(p),
            }
        }
        if let Some(assoc) = associativity {
            match explicit {
                Some(existing) if existing != assoc => return Err(conflict(&lit.value)),
                _ => lit.associativity = assoc,
            }
            self.explicit_associativity.insert(terminal, assoc);
        }
        Ok(())
    }

    /// Splice in token-class rules and the start rule, check that every
    /// referenced rule is defined and compute nullability.
    ///
    /// # Errors
    ///
    /// Returns [`GrammarError::EmptyGrammar`] if no user rule was defined
    /// and [`GrammarError::UnknownRule`] for a rule that is referenced but
    /// never defined.
    pub fn build(mut self) -> Result<Grammar, GrammarError> {
        let first = self.first.ok_or(GrammarError::EmptyGrammar)?;

        let eof = self.intern_terminal(Terminal::token_class(EOF_CLASS, ""));
        self.drafts[TOKEN_EOF_ID.index()].rule.alternatives =
            vec![Alternative::new([Symbol::Terminal(eof)])];

        for (class, pattern) in std::mem::take(&mut self.token_classes) {
            let rule = self.rule_id(&token_rule_name(&class), RuleKind::TokenClass);
            if !self.is_defined(rule) {
                let terminal = self.intern_terminal(Terminal::token_class(class, pattern));
                self.add_alternative(rule, [Symbol::Terminal(terminal)]);
            }
        }

        self.drafts[START_ID.index()].rule.alternatives = vec![Alternative::new([
            Symbol::Rule(first),
            Symbol::Rule(TOKEN_EOF_ID),
        ])];

        for draft in &self.drafts {
            if draft.rule.alternatives.is_empty() {
                return Err(match draft.referenced_at {
                    Some((line, column)) => GrammarError::UnknownRule {
                        name: draft.rule.name.to_string(),
                        line,
                        column,
                    },
                    None => GrammarError::NoAlternatives {
                        name: draft.rule.name.to_string(),
                    },
                });
            }
        }

        let mut rules: Vec<Rule> = self.drafts.into_iter().map(|d| d.rule).collect();
        finalize_rules(&mut rules, &self.terminals);

        for (index, reachable) in reachable_rules(&rules, START_ID).into_iter().enumerate() {
            if !reachable && rules[index].kind != RuleKind::TokenClass {
                tracing::warn!(rule = %rules[index].name, "rule is unreachable from the start rule");
            }
        }

        tracing::debug!(
            rules = rules.len(),
            terminals = self.terminals.len(),
            first = %rules[first.index()].name,
            "grammar built"
        );

        Ok(Grammar::from_parts(
            rules,
            self.terminals,
            self.rule_index,
            START_ID,
            first,
            TOKEN_EOF_ID,
            eof,
        ))
    }
}

/// Fill in nullability, nullable suffixes and operator metadata
fn finalize_rules(rules: &mut [Rule], terminals: &[Terminal]) {
    let nullable = compute_nullable(rules);
    for (rule, is_nullable) in rules.iter_mut().zip(&nullable) {
        rule.nullable = *is_nullable;
        for alt in &mut rule.alternatives {
            alt.nullable_from = nullable_suffix_start(&alt.symbols, &nullable);
            alt.operator = alt.symbols.iter().enumerate().find_map(|(index, sym)| {
                let terminal = &terminals[sym.as_terminal()?.index()];
                let (precedence, associativity) = terminal.precedence()?;
                Some(Operator {
                    index,
                    precedence,
                    associativity,
                })
            });
        }
    }
}

#[must_use]
pub fn token_rule_name(class: &str) -> CompactString {
    format_compact!("{TOKEN_RULE_PREFIX}{class}")
}
