//! Disambiguation: pure accept/reject decisions on a candidate packed
//! alternative before it is committed to the forest.
//!
//! The pipeline runs the built-in operator precedence check, then greedy
//! list matching, then every user [`Disambiguator`] in order. A candidate
//! survives only if all of them accept it.
//!
//! Precedence looks at the alternatives of a candidate's operands, so an
//! operator candidate whose operand ends at the parser's current position
//! is held back until that position has no reductions left, then judged
//! with the rest of the pipeline.

use crate::grammar::{Associativity, Grammar, Operator, RuleId};
use crate::lexer::TokenStream;
use crate::sppf::{sequences, NodeId, NodeKind, Sequence, SppfNode};
use std::sync::Arc;

/// Upper bound on the flattened sequences examined per alternative
pub(crate) const SEQUENCE_CAP: usize = 64;

/// A derivation about to be added to a symbol node.
pub struct Candidate<'a> {
    pub(crate) grammar: &'a Grammar,
    pub(crate) tokens: &'a TokenStream,
    pub(crate) nodes: &'a [SppfNode],
    pub(crate) node: NodeId,
    pub(crate) rule: RuleId,
    pub(crate) alt: u32,
    pub(crate) span: (u32, u32),
    pub(crate) sequences: &'a [Sequence],
    /// Operands ending before this position have every derivation they
    /// will get
    pub(crate) level: u32,
}

impl<'a> Candidate<'a> {
    /// The symbol node the derivation would be added to
    #[must_use]
    pub const fn node_id(&self) -> NodeId {
        self.node
    }

    #[must_use]
    pub const fn rule(&self) -> RuleId {
        self.rule
    }

    #[must_use]
    pub fn rule_name(&self) -> &'a str {
        &self.grammar.rule(self.rule).name
    }

    /// Index of the alternative being derived
    #[must_use]
    pub const fn alternative(&self) -> u32 {
        self.alt
    }

    /// Token range `[left, right)` of the node
    #[must_use]
    pub const fn span(&self) -> (u32, u32) {
        self.span
    }

    /// The candidate's children, one node per symbol of the alternative.
    /// More than one sequence means an intermediate node below is itself
    /// ambiguous.
    #[must_use]
    pub const fn sequences(&self) -> &'a [Sequence] {
        self.sequences
    }

    /// Alternatives already accepted on this node, as
    /// `(alternative index, packed node)`
    pub fn existing(&self) -> impl Iterator<Item = (u32, NodeId)> + 'a {
        let nodes = self.nodes;
        nodes[self.node.index()]
            .children
            .iter()
            .filter_map(move |&packed| match nodes[packed.index()].kind {
                NodeKind::Packed { alt, .. } => Some((alt, packed)),
                _ => None,
            })
    }

    /// Flattened child sequences of an existing packed node
    #[must_use]
    pub fn sequences_of(&self, packed: NodeId) -> Vec<Sequence> {
        sequences(self.nodes, packed, SEQUENCE_CAP)
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> &'a SppfNode {
        &self.nodes[id.index()]
    }

    #[must_use]
    pub const fn grammar(&self) -> &'a Grammar {
        self.grammar
    }

    #[must_use]
    pub const fn tokens(&self) -> &'a TokenStream {
        self.tokens
    }

    /// Source text covered by `id`, token texts joined by single spaces
    #[must_use]
    pub fn text(&self, id: NodeId) -> String {
        let Some((left, right)) = self.node(id).span else {
            return String::new();
        };
        (left..right)
            .filter_map(|i| self.tokens.get(i as usize))
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A user-supplied disambiguation rule.
///
/// Implemented for every `Fn(&Candidate) -> bool`, so closures can be
/// passed directly:
///
/// ```rust,no_run
/// use thicket::brnglr::Candidate;
///
/// let reject_empty_lists = |c: &Candidate<'_>| c.span().0 != c.span().1;
/// # let _ = reject_empty_lists;
/// ```
pub trait Disambiguator: Send + Sync {
    /// Return false to discard the candidate
    fn accept(&self, candidate: &Candidate<'_>) -> bool;
}

impl<F> Disambiguator for F
where
    F: Fn(&Candidate<'_>) -> bool + Send + Sync,
{
    fn accept(&self, candidate: &Candidate<'_>) -> bool {
        self(candidate)
    }
}

/// What the pipeline made of a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Verdict {
    Accept,
    Reject,
    /// An operand may still gain derivations; ask again once it cannot
    Defer,
}

/// The fixed pipeline evaluated for every new packed alternative
pub(crate) struct Pipeline<'a> {
    pub(crate) precedence: bool,
    pub(crate) greedy: bool,
    pub(crate) user: &'a [Arc<dyn Disambiguator>],
}

impl Pipeline<'_> {
    pub(crate) fn judge(&self, candidate: &Candidate<'_>) -> Verdict {
        let nodes = candidate.nodes;
        if self.precedence {
            let settled = |id: NodeId| {
                nodes[id.index()]
                    .span
                    .is_none_or(|(_, right)| right < candidate.level)
            };
            let (grammar, rule, alt) = (candidate.grammar, candidate.rule, candidate.alt);
            if operand_pending(grammar, rule, alt, candidate.sequences, &settled) {
                return Verdict::Defer;
            }
            if !precedence_allows(grammar, nodes, rule, alt, candidate.sequences, settled) {
                return Verdict::Reject;
            }
        }
        if self.greedy {
            let existing: Vec<NodeId> = candidate.existing().map(|(_, p)| p).collect();
            if !greedy_allows(candidate.grammar, nodes, candidate.sequences, &existing) {
                return Verdict::Reject;
            }
        }
        if self.user.iter().all(|d| d.accept(candidate)) {
            Verdict::Accept
        } else {
            Verdict::Reject
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

/// Whether the operator has an operand before and after it
const fn shape(op: &Operator, len: usize) -> (bool, bool) {
    (op.index > 0, op.index + 1 < len)
}

/// True if the alternative is an operator expression and one of its
/// operands is not `settled`
fn operand_pending(
    grammar: &Grammar,
    rule: RuleId,
    alt: u32,
    seqs: &[Sequence],
    settled: &impl Fn(NodeId) -> bool,
) -> bool {
    let alternative = grammar.alternative(rule, alt as usize);
    let Some(op) = alternative.operator else {
        return false;
    };
    let (has_left, has_right) = shape(&op, alternative.len());
    let open = |seq: &Sequence, index: usize| seq.get(index).is_some_and(|&c| !settled(c));
    seqs.iter()
        .any(|seq| (has_left && open(seq, op.index - 1)) || (has_right && open(seq, op.index + 1)))
}

/// Operator precedence and associativity check.
///
/// An alternative headed by an operator is rejected when one of its
/// operands is an operator expression that binds looser, or binds equally
/// on the side its associativity forbids. An operand only counts as
/// conflicting when every one of its alternatives conflicts. Operands for
/// which `settled` is false are not judged yet.
pub(crate) fn precedence_allows(
    grammar: &Grammar,
    nodes: &[SppfNode],
    rule: RuleId,
    alt: u32,
    seqs: &[Sequence],
    settled: impl Fn(NodeId) -> bool,
) -> bool {
    let alternative = grammar.alternative(rule, alt as usize);
    let Some(op) = alternative.operator else {
        return true;
    };
    if seqs.is_empty() {
        return true;
    }
    let (has_left, has_right) = shape(&op, alternative.len());
    seqs.iter().any(|seq| {
        let left = has_left
            .then(|| seq.get(op.index - 1))
            .flatten()
            .is_some_and(|&c| settled(c) && operand_conflicts(grammar, nodes, c, &op, Side::Left));
        let right = has_right
            .then(|| seq.get(op.index + 1))
            .flatten()
            .is_some_and(|&c| settled(c) && operand_conflicts(grammar, nodes, c, &op, Side::Right));
        !left && !right
    })
}

fn operand_conflicts(
    grammar: &Grammar,
    nodes: &[SppfNode],
    operand: NodeId,
    parent: &Operator,
    side: Side,
) -> bool {
    let node = &nodes[operand.index()];
    let NodeKind::Symbol { rule } = node.kind else {
        return false;
    };
    let mut conflicts = false;
    for &packed in &node.children {
        let NodeKind::Packed { alt, .. } = nodes[packed.index()].kind else {
            continue;
        };
        let alternative = grammar.alternative(rule, alt as usize);
        let Some(op) = alternative.operator else {
            return false;
        };
        let (open_left, open_right) = shape(&op, alternative.len());
        // only an operand open towards the parent operator can regroup
        let faces_parent = match side {
            Side::Left => open_right,
            Side::Right => open_left,
        };
        if !faces_parent {
            return false;
        }
        let looser = op.precedence < parent.precedence;
        let equal_forbidden = op.precedence == parent.precedence
            && matches!(
                (side, parent.associativity),
                (Side::Left, Associativity::Right | Associativity::None)
                    | (Side::Right, Associativity::Left | Associativity::None)
            );
        if !(looser || equal_forbidden) {
            return false;
        }
        conflicts = true;
    }
    conflicts
}

/// True if sequence `a` takes the longer match than `b` at the first
/// position where they differ, and that position is a nullable
/// repetition rule
pub(crate) fn greedier(grammar: &Grammar, nodes: &[SppfNode], a: &[NodeId], b: &[NodeId]) -> bool {
    let Some(k) = a.iter().zip(b).position(|(x, y)| x != y) else {
        return false;
    };
    let (x, y) = (&nodes[a[k].index()], &nodes[b[k].index()]);
    let (NodeKind::Symbol { rule: rx }, NodeKind::Symbol { rule: ry }) = (x.kind, y.kind) else {
        return false;
    };
    if rx != ry {
        return false;
    }
    let rule = grammar.rule(rx);
    rule.kind.is_repetition() && rule.nullable && x.width() > y.width()
}

/// Greedy list matching: reject a candidate some existing alternative of
/// the same node is greedier than
pub(crate) fn greedy_allows(
    grammar: &Grammar,
    nodes: &[SppfNode],
    candidate: &[Sequence],
    existing: &[NodeId],
) -> bool {
    let Some(mine) = candidate.first() else {
        return true;
    };
    existing.iter().all(|&packed| {
        sequences(nodes, packed, 1)
            .first()
            .is_none_or(|theirs| !greedier(grammar, nodes, theirs, mine))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::notation::parse_bnf;
    use smallvec::smallvec;

    /// Build `Math(0,5)` for `1 op1 2 op2 3` grouped to the left or right,
    /// returning the arena and the two competing child lists
    fn arena(g: &Grammar, op1: u32, op2: u32) -> (Vec<SppfNode>, Sequence, Sequence) {
        let math = g.rule_by_name("Math").unwrap();
        let mut nodes = vec![SppfNode::new(NodeKind::Epsilon, None)];
        let mut push = |nodes: &mut Vec<SppfNode>, kind, span, children: &[NodeId]| {
            let mut n = SppfNode::new(kind, span);
            n.children = children.iter().copied().collect();
            nodes.push(n);
            NodeId(u32::try_from(nodes.len() - 1).unwrap())
        };
        let atom_alt = 2;
        let t: Vec<NodeId> = (0..5)
            .map(|i| push(&mut nodes, NodeKind::Terminal { token: i }, Some((i, i + 1)), &[]))
            .collect();
        let atoms: Vec<NodeId> = [0u32, 2, 4]
            .iter()
            .map(|&i| {
                let p = push(&mut nodes, NodeKind::Packed { rule: math, alt: atom_alt }, None, &[t[i as usize]]);
                push(&mut nodes, NodeKind::Symbol { rule: math }, Some((i, i + 1)), &[p])
            })
            .collect();
        let lp = push(&mut nodes, NodeKind::Packed { rule: math, alt: op1 }, None, &[atoms[0], t[1], atoms[1]]);
        let left = push(&mut nodes, NodeKind::Symbol { rule: math }, Some((0, 3)), &[lp]);
        let rp = push(&mut nodes, NodeKind::Packed { rule: math, alt: op2 }, None, &[atoms[1], t[3], atoms[2]]);
        let right = push(&mut nodes, NodeKind::Symbol { rule: math }, Some((2, 5)), &[rp]);
        let grouped_left: Sequence = smallvec![left, t[3], atoms[2]];
        let grouped_right: Sequence = smallvec![atoms[0], t[1], right];
        (nodes, grouped_left, grouped_right)
    }

    fn grammar() -> Grammar {
        parse_bnf(
            "<Math> ::= <Math> \"+\" +1+ =left= <Math> | <Math> \"*\" +2+ =left= <Math> | <Token-int>\n\
             <Pow> ::= <Pow> \"^\" +3+ =right= <Pow> | <Token-int>",
            &[("int", "[0-9]+")],
        )
        .unwrap()
    }

    #[test]
    fn test_tighter_operator_nests_inside() {
        let g = grammar();
        let math = g.rule_by_name("Math").unwrap();
        // 1 + 2 * 3
        let (nodes, grouped_left, grouped_right) = arena(&g, 0, 1);
        assert!(precedence_allows(&g, &nodes, math, 0, &[grouped_right], |_| true));
        assert!(!precedence_allows(&g, &nodes, math, 1, &[grouped_left], |_| true));
    }

    #[test]
    fn test_left_associativity() {
        let g = grammar();
        let math = g.rule_by_name("Math").unwrap();
        // 1 + 2 + 3
        let (nodes, grouped_left, grouped_right) = arena(&g, 0, 0);
        assert!(precedence_allows(&g, &nodes, math, 0, &[grouped_left], |_| true));
        assert!(!precedence_allows(&g, &nodes, math, 0, &[grouped_right], |_| true));
    }

    #[test]
    fn test_unsettled_operand_not_judged() {
        let g = grammar();
        let math = g.rule_by_name("Math").unwrap();
        let (nodes, _, grouped_right) = arena(&g, 0, 0);
        assert!(precedence_allows(&g, &nodes, math, 0, &[grouped_right], |_| false));
    }

    #[test]
    fn test_closure_disambiguator() {
        let always_no = |_: &Candidate<'_>| false;
        let boxed: Arc<dyn Disambiguator> = Arc::new(always_no);
        let g = grammar();
        let tokens = TokenStream::default();
        let nodes = vec![SppfNode::new(NodeKind::Symbol { rule: g.first() }, Some((0, 0)))];
        let candidate = Candidate {
            grammar: &g,
            tokens: &tokens,
            nodes: &nodes,
            node: NodeId(0),
            rule: g.first(),
            alt: 2,
            span: (0, 0),
            sequences: &[],
            level: 0,
        };
        let user = [boxed];
        let pipeline = Pipeline {
            precedence: true,
            greedy: true,
            user: &user,
        };
        assert_eq!(pipeline.judge(&candidate), Verdict::Reject);
        let pipeline = Pipeline {
            precedence: true,
            greedy: true,
            user: &[],
        };
        assert_eq!(pipeline.judge(&candidate), Verdict::Accept);
    }

    #[test]
    fn test_open_operand_is_deferred() {
        let g = grammar();
        let math = g.rule_by_name("Math").unwrap();
        // 1 + (2 + 3) while the parser still sits right after "3"
        let (nodes, _, grouped_right) = arena(&g, 0, 0);
        let tokens = TokenStream::default();
        let sequences = [grouped_right];
        let candidate = |level| Candidate {
            grammar: &g,
            tokens: &tokens,
            nodes: &nodes,
            node: NodeId::EPSILON,
            rule: math,
            alt: 0,
            span: (0, 5),
            sequences: &sequences,
            level,
        };
        let pipeline = Pipeline {
            precedence: true,
            greedy: false,
            user: &[],
        };
        assert_eq!(pipeline.judge(&candidate(5)), Verdict::Defer);
        assert_eq!(pipeline.judge(&candidate(6)), Verdict::Reject);

        let unordered = Pipeline {
            precedence: false,
            greedy: false,
            user: &[],
        };
        assert_eq!(unordered.judge(&candidate(5)), Verdict::Accept);
    }
}
