//! Grammar analyses shared by the automaton builder and the epsilon forest.

use super::rule::Rule;
use super::symbol::{RuleId, Symbol};

/// Least fixed point of "can derive the empty string".
///
/// A rule is nullable iff some alternative consists only of nullable
/// symbols. Terminals are never nullable (the empty literal is stripped
/// from alternatives when they are built, leaving them shorter).
#[must_use]
pub fn compute_nullable(rules: &[Rule]) -> Vec<bool> {
    let mut nullable = vec![false; rules.len()];
    let mut changed = true;
    while changed {
        changed = false;
        for (index, rule) in rules.iter().enumerate() {
            if nullable[index] {
                continue;
            }
            let derives_empty = rule.alternatives.iter().any(|alt| {
                alt.symbols
                    .iter()
                    .all(|sym| symbol_nullable(*sym, &nullable))
            });
            if derives_empty {
                nullable[index] = true;
                changed = true;
            }
        }
    }
    nullable
}

#[must_use]
pub fn symbol_nullable(symbol: Symbol, nullable: &[bool]) -> bool {
    match symbol {
        Symbol::Rule(id) => nullable[id.index()],
        Symbol::Terminal(_) => false,
    }
}

/// Smallest `k` such that `symbols[k..]` is entirely nullable
#[must_use]
pub fn nullable_suffix_start(symbols: &[Symbol], nullable: &[bool]) -> usize {
    symbols
        .iter()
        .rposition(|sym| !symbol_nullable(*sym, nullable))
        .map_or(0, |pos| pos + 1)
}

/// Rules reachable from `start` through alternatives
#[must_use]
pub fn reachable_rules(rules: &[Rule], start: RuleId) -> Vec<bool> {
    let mut reachable = vec![false; rules.len()];
    let mut stack = vec![start];
    reachable[start.index()] = true;
    while let Some(rule) = stack.pop() {
        for alt in &rules[rule.index()].alternatives {
            for sym in &alt.symbols {
                if let Symbol::Rule(child) = *sym {
                    if !reachable[child.index()] {
                        reachable[child.index()] = true;
                        stack.push(child);
                    }
                }
            }
        }
    }
    reachable
}
