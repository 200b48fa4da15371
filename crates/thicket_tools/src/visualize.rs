//! Grammar and forest visualization
//!
//! Both graphs are written in DOT format for Graphviz.

use std::fmt::Write;
use thicket::grammar::{Grammar, RuleKind, Symbol};
use thicket::sppf::{reachable, NodeKind};
use thicket::Forest;

fn quote(text: &str) -> String {
    format!("{:?}", text)
}

/// Rule dependency graph: one ellipse per rule, one box per terminal.
///
/// Synthetic rules from EBNF desugaring are drawn dashed. The start rule
/// and `Token-EOF` are left out.
#[must_use]
pub fn grammar_dot(grammar: &Grammar) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "digraph Grammar {{");
    let _ = writeln!(out, "  rankdir=LR;");
    let _ = writeln!(out, "  node [shape=ellipse];");
    let _ = writeln!(out);

    let hidden = |index: usize| index == grammar.start().index() || index == grammar.eof_rule().index();
    for (index, rule) in grammar.rules().iter().enumerate() {
        if hidden(index) {
            continue;
        }
        let style = match rule.kind {
            RuleKind::Normal => "",
            RuleKind::TokenClass => ", style=filled, fillcolor=lightblue",
            _ => ", style=dashed",
        };
        let _ = writeln!(out, "  r{index} [label={}{style}];", quote(&rule.name));
    }

    let mut used = vec![false; grammar.terminals().len()];
    for (index, rule) in grammar.rules().iter().enumerate() {
        if hidden(index) {
            continue;
        }
        let mut targets: Vec<Symbol> = rule
            .alternatives
            .iter()
            .flat_map(|alt| alt.symbols.iter().copied())
            .collect();
        targets.sort();
        targets.dedup();
        for symbol in targets {
            match symbol {
                Symbol::Rule(id) => {
                    let _ = writeln!(out, "  r{index} -> r{};", id.index());
                }
                Symbol::Terminal(id) => {
                    used[id.index()] = true;
                    let _ = writeln!(out, "  r{index} -> t{} [style=dashed];", id.index());
                }
            }
        }
    }

    let _ = writeln!(out);
    for (index, terminal) in grammar.terminals().iter().enumerate() {
        if used[index] {
            let _ = writeln!(out, "  t{index} [label={}, shape=box];", quote(&terminal.to_string()));
        }
    }
    let _ = writeln!(out, "}}");
    out
}

/// The live part of a forest.
///
/// Symbol nodes are ellipses, packed nodes small points, intermediate and
/// right-nullable nodes boxes and tokens plain text.
#[must_use]
pub fn forest_dot(forest: &Forest) -> String {
    let grammar = forest.grammar();
    let live = reachable(forest.nodes(), forest.root());
    let mut out = String::new();
    let _ = writeln!(out, "digraph Forest {{");
    let _ = writeln!(out, "  ordering=out;");

    for (index, node) in forest.nodes().iter().enumerate() {
        if !live[index] {
            continue;
        }
        let span = node.span.map_or_else(String::new, |(l, r)| format!(" [{l},{r})"));
        let (label, shape) = match node.kind {
            NodeKind::Symbol { rule } => (format!("{}{span}", grammar.rule(rule).name), "ellipse"),
            NodeKind::Packed { .. } => (String::new(), "point"),
            NodeKind::Intermediate { rule, alt, from } => (
                format!("{}{span}", grammar.display_alternative(rule, alt as usize, Some(from as usize))),
                "box",
            ),
            NodeKind::RightNullablePart { rule, alt, from } => (
                grammar.display_alternative(rule, alt as usize, Some(from as usize)),
                "box",
            ),
            NodeKind::Terminal { token } => (
                forest
                    .tokens()
                    .get(token as usize)
                    .map_or_else(|| "?".to_string(), |t| t.text.to_string()),
                "plaintext",
            ),
            NodeKind::Epsilon => ("ε".to_string(), "plaintext"),
        };
        let _ = writeln!(out, "  n{index} [label={}, shape={shape}];", quote(&label));
        for child in &node.children {
            let _ = writeln!(out, "  n{index} -> n{};", child.index());
        }
    }
    let _ = writeln!(out, "}}");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use thicket::{CompiledGrammar, LexerBuilder};

    fn grammar() -> CompiledGrammar {
        CompiledGrammar::from_ebnf(
            "<Args> ::= <Token-int> ( \",\" <Token-int> )*",
            LexerBuilder::new().token("int", "[0-9]+").skip("ws", r"\s+"),
        )
        .unwrap()
    }

    #[test]
    fn test_grammar_dot() {
        let dot = grammar_dot(grammar().grammar());
        assert!(dot.starts_with("digraph Grammar {"));
        assert!(dot.contains("label=\"Args\""));
        assert!(dot.contains("label=\"Token-int\""));
        assert!(dot.contains("style=dashed"));
        assert!(!dot.contains("Token-EOF"));
    }

    #[test]
    fn test_forest_dot() {
        let forest = grammar().parse("1, 2").unwrap();
        let dot = forest_dot(&forest);
        assert!(dot.contains("label=\"Args [0,3)\""));
        assert!(dot.contains("label=\"2\""));
        assert!(dot.trim_end().ends_with('}'));
    }
}
