//! Lookahead sets and the DeRemer–Pennello lookahead computation.
//!
//! Lookaheads are computed over the automaton's nonterminal transitions
//! `(p, A)`, plus one virtual transition `(0, #S)` whose follow set is the
//! end of input:
//!
//! - `DR(p, A)`: terminals shiftable from `goto(p, A)`
//! - `(p, A) reads (r, C)`: `r = goto(p, A)` and `C` is nullable
//! - `Read = digraph(reads, DR)`
//! - `(p', B) includes (p, A)`: some `A ::= β B γ` with `γ` nullable
//!   walks from `p` to `p'` over `β`
//! - `Follow = digraph(includes, Read)`
//!
//! A reduction of `A ::= α • β` (with `β` nullable) in state `s` gets the
//! union of `Follow(p, A)` over every `p` that walks to `s` over `α`
//! (its lookback transitions).

use super::digraph::digraph;
use super::item::Item;
use super::state::{ItemSet, Reduction, StateId};
use crate::error::GrammarError;
use crate::grammar::{Grammar, RuleId, Symbol, TerminalId};
use hashbrown::HashMap;
use std::collections::BTreeMap;

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// A reduce lookahead: a terminal, or the end of input after `Token-EOF`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum Lookahead {
    Terminal(TerminalId),
    End,
}

/// Bit set over every terminal plus [`Lookahead::End`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct LookaheadSet {
    bits: Vec<u64>,
    terminals: u32,
}

impl LookaheadSet {
    #[must_use]
    pub fn new(terminals: usize) -> Self {
        Self {
            bits: vec![0; (terminals + 1).div_ceil(64)],
            terminals: u32::try_from(terminals).unwrap_or(u32::MAX),
        }
    }

    const fn slot(&self, lookahead: Lookahead) -> usize {
        match lookahead {
            Lookahead::Terminal(id) => id.index(),
            Lookahead::End => self.terminals as usize,
        }
    }

    pub fn insert(&mut self, lookahead: Lookahead) {
        let slot = self.slot(lookahead);
        self.bits[slot / 64] |= 1 << (slot % 64);
    }

    #[must_use]
    pub fn contains(&self, lookahead: Lookahead) -> bool {
        let slot = self.slot(lookahead);
        self.bits
            .get(slot / 64)
            .is_some_and(|word| word & (1 << (slot % 64)) != 0)
    }

    /// Add every member of `other`; true if anything was new
    pub fn union_with(&mut self, other: &Self) -> bool {
        let mut changed = false;
        for (mine, theirs) in self.bits.iter_mut().zip(&other.bits) {
            let merged = *mine | *theirs;
            changed |= merged != *mine;
            *mine = merged;
        }
        changed
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|w| *w == 0)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = Lookahead> + '_ {
        let terminals = self.terminals as usize;
        self.bits.iter().enumerate().flat_map(move |(word_index, word)| {
            (0..64).filter_map(move |bit| {
                if word & (1 << bit) == 0 {
                    return None;
                }
                let slot = word_index * 64 + bit;
                if slot == terminals {
                    Some(Lookahead::End)
                } else {
                    u32::try_from(slot)
                        .ok()
                        .map(|id| Lookahead::Terminal(TerminalId(id)))
                }
            })
        })
    }
}

/// The nonterminal-transition graph the relations are defined over
struct Transitions {
    list: Vec<(StateId, RuleId)>,
    index: HashMap<(StateId, RuleId), usize, ahash::RandomState>,
}

/// Compute every state's reductions and mark the accepting state.
///
/// # Errors
///
/// Returns an error if the automaton is missing a transition the grammar
/// implies, which would mean the LR(0) construction is inconsistent.
pub(crate) fn assign_reductions(grammar: &Grammar, states: &mut [ItemSet]) -> Result<(), GrammarError> {
    let terminals = grammar.terminals().len();
    let transitions = collect_transitions(grammar, states);
    let count = transitions.list.len();

    let mut direct_reads = vec![LookaheadSet::new(terminals); count];
    let mut reads = vec![Vec::new(); count];
    direct_reads[0].insert(Lookahead::End);
    for (t, &(from, rule)) in transitions.list.iter().enumerate().skip(1) {
        let Some(target) = states[from.index()].goto(rule) else {
            continue;
        };
        let target = &states[target.index()];
        for (terminal, _) in &target.shifts {
            direct_reads[t].insert(Lookahead::Terminal(*terminal));
        }
        for (next, _) in &target.gotos {
            if grammar.is_nullable(*next) {
                if let Some(&r) = transitions.index.get(&(target.id, *next)) {
                    reads[t].push(r);
                }
            }
        }
    }
    let read = digraph(&reads, direct_reads);

    let mut includes = vec![Vec::new(); count];
    let mut lookback: BTreeMap<(StateId, Item), Vec<usize>> = BTreeMap::new();
    for (t, &(from, rule)) in transitions.list.iter().enumerate() {
        for (alt_index, alt) in grammar.rule(rule).alternatives.iter().enumerate() {
            let alt_id = u32::try_from(alt_index).unwrap_or(u32::MAX);
            let mut state = from;
            for (k, symbol) in alt.symbols.iter().enumerate() {
                if k >= alt.nullable_from {
                    let item = Item::new(rule, alt_id, u32::try_from(k).unwrap_or(u32::MAX));
                    lookback.entry((state, item)).or_default().push(t);
                }
                if let Symbol::Rule(inner) = *symbol {
                    if k + 1 >= alt.nullable_from {
                        if let Some(&i) = transitions.index.get(&(state, inner)) {
                            includes[i].push(t);
                        }
                    }
                }
                state = states[state.index()].transition(*symbol).ok_or_else(|| {
                    GrammarError::internal(format!(
                        "automaton has no transition on {} from state {}",
                        grammar.symbol_name(*symbol),
                        state.0
                    ))
                })?;
            }
            let item = Item::new(rule, alt_id, u32::try_from(alt.len()).unwrap_or(u32::MAX));
            lookback.entry((state, item)).or_default().push(t);
        }
    }
    let follow = digraph(&includes, read);

    let mut reduction_count = 0usize;
    for ((state, item), sources) in lookback {
        let target = &mut states[state.index()];
        let complete = item.dot as usize == grammar.alternative(item.rule, item.alt as usize).len();
        if item.rule == grammar.start() && complete {
            target.accepting = true;
            continue;
        }
        let mut lookahead = LookaheadSet::new(terminals);
        for source in sources {
            lookahead.union_with(&follow[source]);
        }
        if lookahead.is_empty() {
            continue;
        }
        target.reductions.push(Reduction {
            rule: item.rule,
            alt: item.alt,
            length: item.dot,
            lookahead,
        });
        reduction_count += 1;
    }

    tracing::debug!(
        nonterminal_transitions = count,
        reductions = reduction_count,
        "lookaheads computed"
    );
    Ok(())
}

/// Index 0 is the virtual `(0, #S)` transition
fn collect_transitions(grammar: &Grammar, states: &[ItemSet]) -> Transitions {
    let mut list = vec![(StateId(0), grammar.start())];
    let mut index = HashMap::with_hasher(ahash::RandomState::new());
    index.insert((StateId(0), grammar.start()), 0);
    for state in states {
        for (rule, _) in &state.gotos {
            index.insert((state.id, *rule), list.len());
            list.push((state.id, *rule));
        }
    }
    Transitions { list, index }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::notation::parse_bnf;
    use crate::lalr::builder::build_states;

    #[test]
    fn test_set_operations() {
        let mut a = LookaheadSet::new(70);
        a.insert(Lookahead::Terminal(TerminalId(3)));
        a.insert(Lookahead::End);
        assert!(a.contains(Lookahead::End));
        assert!(!a.contains(Lookahead::Terminal(TerminalId(4))));

        let mut b = LookaheadSet::new(70);
        b.insert(Lookahead::Terminal(TerminalId(69)));
        assert!(b.union_with(&a));
        assert!(!b.union_with(&a));
        assert_eq!(b.len(), 3);

        let members: Vec<_> = b.iter().collect();
        assert_eq!(
            members,
            vec![
                Lookahead::Terminal(TerminalId(3)),
                Lookahead::Terminal(TerminalId(69)),
                Lookahead::End
            ]
        );
    }

    #[test]
    fn test_missing_transition_is_internal() {
        let grammar = parse_bnf("<S> ::= \"a\" <S> | \"b\"", &[]).unwrap();
        let mut states = build_states(&grammar);
        states[0].gotos.clear();
        let err = assign_reductions(&grammar, &mut states).unwrap_err();
        assert!(matches!(err, GrammarError::Internal { .. }), "{err}");
        assert_eq!(err.location(), None);
    }
}
