use super::item::Item;
use super::state::{ItemSet, StateId};
use crate::grammar::{Grammar, Symbol};
use hashbrown::{HashMap, HashSet};
use std::collections::BTreeMap;

/// Build the LR(0) item-set graph.
///
/// States are identified by their sorted kernel, so any two paths that
/// reach the same kernel share one state. Transitions are filled in on
/// every state; reductions are left for the lookahead pass.
pub(crate) fn build_states(grammar: &Grammar) -> Vec<ItemSet> {
    let start_kernel = vec![Item::new(grammar.start(), 0, 0)];
    let mut states = vec![ItemSet::new(
        StateId(0),
        start_kernel.clone(),
        closure(grammar, &start_kernel),
    )];
    let mut by_kernel: HashMap<Vec<Item>, StateId, ahash::RandomState> =
        HashMap::with_hasher(ahash::RandomState::new());
    by_kernel.insert(start_kernel, StateId(0));

    let mut next = 0;
    while next < states.len() {
        let mut successors: BTreeMap<Symbol, Vec<Item>> = BTreeMap::new();
        for item in &states[next].items {
            if let Some(symbol) = item.next_symbol(grammar) {
                successors.entry(symbol).or_default().push(item.advance());
            }
        }

        // symbol order keeps shifts and gotos sorted
        for (symbol, mut kernel) in successors {
            kernel.sort_unstable();
            kernel.dedup();
            let target = match by_kernel.get(&kernel) {
                Some(id) => *id,
                None => {
                    let id = StateId(u32::try_from(states.len()).unwrap_or(u32::MAX));
                    let items = closure(grammar, &kernel);
                    by_kernel.insert(kernel.clone(), id);
                    states.push(ItemSet::new(id, kernel, items));
                    id
                }
            };
            let state = &mut states[next];
            match symbol {
                Symbol::Terminal(terminal) => state.shifts.push((terminal, target)),
                Symbol::Rule(rule) => state.gotos.push((rule, target)),
            }
        }
        next += 1;
    }

    tracing::trace!(states = states.len(), "LR(0) item sets built");
    states
}

/// Kernel items followed by every `B ::= • γ` item reachable from them
fn closure(grammar: &Grammar, kernel: &[Item]) -> Vec<Item> {
    let mut items = kernel.to_vec();
    let mut seen: HashSet<Item, ahash::RandomState> = HashSet::with_hasher(ahash::RandomState::new());
    seen.extend(kernel.iter().copied());

    let mut cursor = 0;
    while cursor < items.len() {
        if let Some(Symbol::Rule(rule)) = items[cursor].next_symbol(grammar) {
            for alt in 0..grammar.rule(rule).alternatives.len() {
                let item = Item::new(rule, u32::try_from(alt).unwrap_or(u32::MAX), 0);
                if seen.insert(item) {
                    items.push(item);
                }
            }
        }
        cursor += 1;
    }
    items
}
