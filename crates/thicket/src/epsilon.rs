//! Epsilon fragments precomputed once per grammar.
//!
//! Every nullable rule gets a span-less symbol node whose packed children
//! are its all-nullable alternatives, and every alternative with a
//! nullable suffix gets one right-nullable part per suffix start. The
//! parser copies this arena as the prefix of each forest it builds, so
//! fragment ids are valid in every forest of the grammar.

use crate::grammar::{Grammar, RuleId, Symbol};
use crate::sppf::{NodeId, NodeKind, SppfNode};
use hashbrown::HashMap;

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct EpsilonForest {
    nodes: Vec<SppfNode>,
    /// Indexed by rule; set for nullable rules
    symbols: Vec<Option<NodeId>>,
    parts: HashMap<(RuleId, u32, u32), NodeId, ahash::RandomState>,
}

impl EpsilonForest {
    #[must_use]
    pub fn build(grammar: &Grammar) -> Self {
        let mut nodes = vec![SppfNode::new(NodeKind::Epsilon, None)];
        let mut symbols = vec![None; grammar.rules().len()];

        for (index, rule) in grammar.rules().iter().enumerate() {
            if rule.nullable {
                let id = RuleId(u32::try_from(index).unwrap_or(u32::MAX));
                symbols[index] = Some(push(&mut nodes, NodeKind::Symbol { rule: id }));
            }
        }

        let fragment = |symbols: &[Option<NodeId>], symbol: Symbol| -> NodeId {
            symbol
                .as_rule()
                .and_then(|rule| symbols[rule.index()])
                .unwrap_or(NodeId::EPSILON)
        };

        let mut parts = HashMap::with_hasher(ahash::RandomState::new());
        for (index, rule) in grammar.rules().iter().enumerate() {
            let id = RuleId(u32::try_from(index).unwrap_or(u32::MAX));
            for (alt_index, alt) in rule.alternatives.iter().enumerate() {
                let alt_id = u32::try_from(alt_index).unwrap_or(u32::MAX);

                if alt.is_nullable() {
                    if let Some(owner) = symbols[index] {
                        let packed = push(&mut nodes, NodeKind::Packed { rule: id, alt: alt_id });
                        nodes[packed.index()].children = if alt.is_empty() {
                            smallvec::smallvec![NodeId::EPSILON]
                        } else {
                            alt.symbols.iter().map(|s| fragment(&symbols, *s)).collect()
                        };
                        nodes[owner.index()].children.push(packed);
                    }
                }

                for from in alt.nullable_from.max(1)..alt.len() {
                    let from_id = u32::try_from(from).unwrap_or(u32::MAX);
                    let part = push(
                        &mut nodes,
                        NodeKind::RightNullablePart {
                            rule: id,
                            alt: alt_id,
                            from: from_id,
                        },
                    );
                    nodes[part.index()].children = alt.symbols[from..]
                        .iter()
                        .map(|s| fragment(&symbols, *s))
                        .collect();
                    parts.insert((id, alt_id, from_id), part);
                }
            }
        }

        tracing::debug!(
            nullable_rules = symbols.iter().flatten().count(),
            nulled_parts = parts.len(),
            nodes = nodes.len(),
            "epsilon forest built"
        );
        Self {
            nodes,
            symbols,
            parts,
        }
    }

    #[must_use]
    pub fn nodes(&self) -> &[SppfNode] {
        &self.nodes
    }

    /// The fragment deriving `rule` from the empty string
    #[must_use]
    pub fn symbol(&self, rule: RuleId) -> Option<NodeId> {
        self.symbols.get(rule.index()).copied().flatten()
    }

    /// The fragment for symbols `from..` of `rule`'s alternative `alt`
    #[must_use]
    pub fn right_nullable(&self, rule: RuleId, alt: u32, from: u32) -> Option<NodeId> {
        self.parts.get(&(rule, alt, from)).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

fn push(nodes: &mut Vec<SppfNode>, kind: NodeKind) -> NodeId {
    let id = NodeId(u32::try_from(nodes.len()).unwrap_or(u32::MAX));
    nodes.push(SppfNode::new(kind, None));
    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::notation::parse_bnf;

    #[test]
    fn test_nullable_rules_get_fragments() {
        let g = parse_bnf("<A> ::= <B> <C> | \"\"\n<B> ::= \"\"\n<C> ::= \"x\" | \"\"", &[]).unwrap();
        let eps = EpsilonForest::build(&g);
        let a = g.rule_by_name("A").unwrap();
        let b = g.rule_by_name("B").unwrap();
        let c = g.rule_by_name("C").unwrap();
        for rule in [a, b, c] {
            assert!(eps.symbol(rule).is_some(), "{}", g.rule(rule).name);
        }
        assert!(eps.symbol(g.start()).is_none());

        // both alternatives of A derive epsilon, so both are packed
        let a_node = &eps.nodes()[eps.symbol(a).unwrap().index()];
        assert_eq!(a_node.children.len(), 2);
        let first = &eps.nodes()[a_node.children[0].index()];
        assert_eq!(
            first.children.as_slice(),
            &[eps.symbol(b).unwrap(), eps.symbol(c).unwrap()]
        );
        let second = &eps.nodes()[a_node.children[1].index()];
        assert_eq!(second.children.as_slice(), &[NodeId::EPSILON]);

        // C has one nullable alternative only
        let c_node = &eps.nodes()[eps.symbol(c).unwrap().index()];
        assert_eq!(c_node.children.len(), 1);
    }

    #[test]
    fn test_right_nullable_parts() {
        let g = parse_bnf("<S> ::= \"a\" <B> <B>\n<B> ::= \"b\" | \"\"", &[]).unwrap();
        let eps = EpsilonForest::build(&g);
        let s = g.rule_by_name("S").unwrap();
        let b = eps.symbol(g.rule_by_name("B").unwrap()).unwrap();
        assert!(eps.right_nullable(s, 0, 0).is_none());
        let from_one = eps.right_nullable(s, 0, 1).unwrap();
        assert_eq!(eps.nodes()[from_one.index()].children.as_slice(), &[b, b]);
        let from_two = eps.right_nullable(s, 0, 2).unwrap();
        assert_eq!(eps.nodes()[from_two.index()].children.as_slice(), &[b]);
        assert!(eps.right_nullable(s, 0, 3).is_none());
    }

    #[test]
    fn test_cyclic_nullable_rule() {
        let g = parse_bnf("<A> ::= <A> | \"\"", &[]).unwrap();
        let eps = EpsilonForest::build(&g);
        let a = eps.symbol(g.rule_by_name("A").unwrap()).unwrap();
        let packed = eps.nodes()[a.index()].children[0];
        assert_eq!(eps.nodes()[packed.index()].children.as_slice(), &[a]);
    }
}
