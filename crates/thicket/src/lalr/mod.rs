//! # LALR(1) Automaton
//!
//! Builds the parse table the BRNGLR engine drives.
//!
//! ## Construction
//!
//! 1. LR(0) item sets, merged by kernel ([`ItemSet`])
//! 2. DeRemer–Pennello lookaheads over the nonterminal transitions
//! 3. Right-nulled reductions: every item whose remaining suffix is
//!    nullable reduces, not just completed items
//! 4. A flat action table keyed by `(state, lookahead)`
//!
//! Conflicts are kept. A cell may hold any number of shift and reduce
//! actions and the generalized engine follows all of them.

mod builder;
mod digraph;
mod item;
mod lookahead;
mod state;

pub use item::Item;
pub use lookahead::{Lookahead, LookaheadSet};
pub use state::{ItemSet, Reduction, StateId};

use crate::error::GrammarError;
use crate::grammar::{Grammar, RuleId, TerminalId};
use hashbrown::HashMap;
use smallvec::SmallVec;

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// One entry of an action cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum Action {
    Shift(StateId),
    /// Reduce the first `length` symbols of `rule`'s alternative `alt`
    Reduce { rule: RuleId, alt: u32, length: u32 },
    Accept,
}

type ActionCell = SmallVec<[Action; 2]>;

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Automaton {
    states: Vec<ItemSet>,
    actions: HashMap<(StateId, Lookahead), ActionCell, ahash::RandomState>,
}

impl Automaton {
    /// Build the LALR(1) automaton of `grammar`.
    ///
    /// # Errors
    ///
    /// Fails only if the grammar is internally inconsistent (an alternative
    /// that cannot be walked through the LR(0) graph).
    pub fn build(grammar: &Grammar) -> Result<Self, GrammarError> {
        let mut states = builder::build_states(grammar);
        lookahead::assign_reductions(grammar, &mut states)?;

        let mut actions: HashMap<(StateId, Lookahead), ActionCell, ahash::RandomState> =
            HashMap::with_hasher(ahash::RandomState::new());
        for state in &states {
            for (terminal, target) in &state.shifts {
                actions
                    .entry((state.id, Lookahead::Terminal(*terminal)))
                    .or_default()
                    .push(Action::Shift(*target));
            }
            for reduction in &state.reductions {
                for lookahead in reduction.lookahead.iter() {
                    actions
                        .entry((state.id, lookahead))
                        .or_default()
                        .push(Action::Reduce {
                            rule: reduction.rule,
                            alt: reduction.alt,
                            length: reduction.length,
                        });
                }
            }
            if state.accepting {
                actions.entry((state.id, Lookahead::End)).or_default().push(Action::Accept);
            }
        }

        let automaton = Self { states, actions };
        tracing::debug!(
            states = automaton.states.len(),
            cells = automaton.actions.len(),
            conflicts = automaton.conflicts(),
            "LALR(1) automaton built"
        );
        Ok(automaton)
    }

    #[must_use]
    pub fn states(&self) -> &[ItemSet] {
        &self.states
    }

    #[must_use]
    pub fn state(&self, id: StateId) -> &ItemSet {
        &self.states[id.index()]
    }

    #[must_use]
    pub const fn start_state(&self) -> StateId {
        StateId(0)
    }

    /// Every action for `state` on `lookahead`; empty when there is none
    #[must_use]
    pub fn actions(&self, state: StateId, lookahead: Lookahead) -> &[Action] {
        self.actions
            .get(&(state, lookahead))
            .map_or(&[], SmallVec::as_slice)
    }

    #[must_use]
    pub fn goto(&self, state: StateId, rule: RuleId) -> Option<StateId> {
        self.state(state).goto(rule)
    }

    #[must_use]
    pub fn shift(&self, state: StateId, terminal: TerminalId) -> Option<StateId> {
        self.state(state).shift(terminal)
    }

    /// Number of cells holding more than one action
    #[must_use]
    pub fn conflicts(&self) -> usize {
        self.actions.values().filter(|cell| cell.len() > 1).count()
    }

    /// Human-readable dump of every state
    #[must_use]
    pub fn describe(&self, grammar: &Grammar) -> String {
        self.states
            .iter()
            .map(|state| state.describe(grammar))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::notation::parse_bnf;

    fn reductions_of(automaton: &Automaton, rule: RuleId) -> Vec<&Reduction> {
        automaton
            .states()
            .iter()
            .flat_map(|s| s.reductions.iter())
            .filter(|r| r.rule == rule)
            .collect()
    }

    #[test]
    fn test_identical_kernels_merge() {
        let g = parse_bnf("<S> ::= \"a\" <X> | \"b\" <X>\n<X> ::= \"x\"", &[]).unwrap();
        let automaton = Automaton::build(&g).unwrap();
        let find = |text: &str| {
            g.terminals()
                .iter()
                .position(|t| t.to_string() == format!("{text:?}"))
                .map(|i| TerminalId(u32::try_from(i).unwrap()))
                .unwrap()
        };
        let start = automaton.start_state();
        let after_a = automaton.shift(start, find("a")).unwrap();
        let after_b = automaton.shift(start, find("b")).unwrap();
        assert_ne!(after_a, after_b);
        assert_eq!(
            automaton.shift(after_a, find("x")),
            automaton.shift(after_b, find("x"))
        );
    }

    #[test]
    fn test_right_nulled_reductions() {
        let g = parse_bnf(
            "<S> ::= \"a\" <B> <C>\n<B> ::= \"b\" | \"\"\n<C> ::= \"c\" | \"\"",
            &[],
        )
        .unwrap();
        let automaton = Automaton::build(&g).unwrap();
        let s = g.rule_by_name("S").unwrap();
        let lengths: Vec<u32> = {
            let mut l: Vec<u32> = reductions_of(&automaton, s).iter().map(|r| r.length).collect();
            l.sort_unstable();
            l
        };
        assert_eq!(lengths, vec![1, 2, 3]);
        let eof = Lookahead::Terminal(g.eof_terminal());
        assert!(reductions_of(&automaton, s).iter().all(|r| r.lookahead.contains(eof)));
    }

    #[test]
    fn test_accepting_state() {
        let g = parse_bnf("<S> ::= \"a\"", &[]).unwrap();
        let automaton = Automaton::build(&g).unwrap();
        let accepting: Vec<_> = automaton.states().iter().filter(|s| s.accepting).collect();
        assert_eq!(accepting.len(), 1);
        assert_eq!(
            automaton.actions(accepting[0].id, Lookahead::End),
            &[Action::Accept]
        );
        assert!(reductions_of(&automaton, g.start()).is_empty());
    }

    #[test]
    fn test_lookaheads_are_lalr() {
        // <E> ::= <E> "+" <T> | <T>: reductions of T see "+" and EOF, never "n"
        let g = parse_bnf("<E> ::= <E> \"+\" <T> | <T>\n<T> ::= \"n\"", &[]).unwrap();
        let automaton = Automaton::build(&g).unwrap();
        let t = g.rule_by_name("T").unwrap();
        for reduction in reductions_of(&automaton, t) {
            let members: Vec<String> = reduction
                .lookahead
                .iter()
                .map(|la| match la {
                    Lookahead::Terminal(id) => g.terminal(id).to_string(),
                    Lookahead::End => "$".into(),
                })
                .collect();
            assert!(members.contains(&"\"+\"".to_string()));
            assert!(members.contains(&"EOF".to_string()));
            assert!(!members.contains(&"\"n\"".to_string()));
        }
        assert_eq!(automaton.conflicts(), 0);
    }

    #[test]
    fn test_ambiguous_grammar_has_conflicts() {
        let g = parse_bnf("<E> ::= <E> \"+\" <E> | \"n\"", &[]).unwrap();
        let automaton = Automaton::build(&g).unwrap();
        assert!(automaton.conflicts() > 0);
        assert!(automaton.describe(&g).contains("accept"));
    }
}
