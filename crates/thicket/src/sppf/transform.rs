use super::node::{reachable, sequences, NodeId, NodeKind, Sequence, SppfNode};
use crate::brnglr::disambiguation::{greedier, precedence_allows, SEQUENCE_CAP};
use crate::grammar::Grammar;
use hashbrown::{HashMap, HashSet};
use smallvec::SmallVec;

/// What a pass gets to work on
pub struct PassContext<'a> {
    pub nodes: &'a mut Vec<SppfNode>,
    pub root: NodeId,
    pub grammar: &'a Grammar,
}

/// A rewrite over a finished forest.
///
/// Passes may only remove packed alternatives or restructure nodes without
/// changing the set of trees they spell out, except where a pass exists to
/// reject trees.
pub trait ForestPass: Send + Sync {
    fn name(&self) -> &'static str;

    /// Rewrite the forest; returns true if anything changed
    fn run(&self, cx: &mut PassContext<'_>) -> bool;
}

fn node_id(index: usize) -> NodeId {
    NodeId(u32::try_from(index).unwrap_or(u32::MAX))
}

/// Removes packed alternatives that refer to a choice node with no
/// alternatives left, and whatever dies with them.
///
/// Each choice keeps a count of its live alternatives; a choice reaching
/// zero kills every packed node that uses it, so the whole cascade is one
/// walk over the live edges.
#[derive(Debug, Clone, Copy, Default)]
pub struct PruneDead;

impl ForestPass for PruneDead {
    fn name(&self) -> &'static str {
        "prune-dead"
    }

    fn run(&self, cx: &mut PassContext<'_>) -> bool {
        let nodes = &*cx.nodes;
        let live = reachable(nodes, cx.root);
        let mut users: Vec<SmallVec<[NodeId; 2]>> = vec![SmallVec::new(); nodes.len()];
        let mut owners: Vec<SmallVec<[NodeId; 1]>> = vec![SmallVec::new(); nodes.len()];
        let mut remaining = vec![0usize; nodes.len()];
        let mut dying = Vec::new();
        for (index, node) in nodes.iter().enumerate() {
            if !live[index] {
                continue;
            }
            let id = node_id(index);
            if node.is_choice() {
                remaining[index] = node.children.len();
                if node.children.is_empty() {
                    dying.push(id);
                }
                for packed in &node.children {
                    owners[packed.index()].push(id);
                }
            } else if node.is_packed() {
                for child in &node.children {
                    let list = &mut users[child.index()];
                    if nodes[child.index()].is_choice() && list.last() != Some(&id) {
                        list.push(id);
                    }
                }
            }
        }

        let mut dead = vec![false; nodes.len()];
        while let Some(choice) = dying.pop() {
            for &packed in &users[choice.index()] {
                if std::mem::replace(&mut dead[packed.index()], true) {
                    continue;
                }
                for &owner in &owners[packed.index()] {
                    let left = &mut remaining[owner.index()];
                    *left = left.saturating_sub(1);
                    if *left == 0 {
                        dying.push(owner);
                    }
                }
            }
        }

        let edits: Vec<(usize, SmallVec<[NodeId; 2]>)> = nodes
            .iter()
            .enumerate()
            .filter(|(i, n)| live[*i] && n.is_choice() && n.children.iter().any(|p| dead[p.index()]))
            .map(|(i, n)| (i, n.children.iter().copied().filter(|p| !dead[p.index()]).collect()))
            .collect();
        let changed = !edits.is_empty();
        for (index, keep) in edits {
            cx.nodes[index].children = keep;
        }
        changed
    }
}

/// Re-checks operator precedence with every operand complete.
///
/// Symbols are visited narrowest first. An operand is always strictly
/// narrower than the operator alternative it sits in, so by the time a
/// node is judged its operands have lost everything they are going to.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolvePrecedence;

impl ForestPass for ResolvePrecedence {
    fn name(&self) -> &'static str {
        "resolve-precedence"
    }

    fn run(&self, cx: &mut PassContext<'_>) -> bool {
        let grammar = cx.grammar;
        let is_operator = |nodes: &[SppfNode], packed: NodeId| match nodes[packed.index()].kind {
            NodeKind::Packed { rule, alt } => grammar.alternative(rule, alt as usize).operator.is_some(),
            _ => false,
        };
        let nodes = &*cx.nodes;
        let live = reachable(nodes, cx.root);
        let mut order: Vec<usize> = (0..nodes.len())
            .filter(|&i| {
                let node = &nodes[i];
                live[i]
                    && matches!(node.kind, NodeKind::Symbol { .. })
                    && node.children.iter().any(|&p| is_operator(nodes, p))
            })
            .collect();
        order.sort_by_key(|&i| nodes[i].width());

        let mut changed = false;
        for index in order {
            let nodes = &*cx.nodes;
            let node = &nodes[index];
            let NodeKind::Symbol { rule } = node.kind else {
                continue;
            };
            let keep: SmallVec<[NodeId; 2]> = node
                .children
                .iter()
                .copied()
                .filter(|&packed| match nodes[packed.index()].kind {
                    NodeKind::Packed { alt, .. } if is_operator(nodes, packed) => {
                        let seqs = sequences(nodes, packed, SEQUENCE_CAP);
                        precedence_allows(grammar, nodes, rule, alt, &seqs, |_| true)
                    }
                    _ => true,
                })
                .collect();
            if keep.len() != node.children.len() {
                tracing::trace!(node = index, kept = keep.len(), "precedence removed alternatives");
                cx.nodes[index].children = keep;
                changed = true;
            }
        }
        changed
    }
}

/// A child of a packed node as far as equivalence goes: leaves and symbol
/// nodes by identity, intermediates and nulled parts by what they contain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Part {
    Node(NodeId),
    Shape(u32),
}

#[derive(Debug, PartialEq, Eq, Hash)]
struct ShapeKey {
    kind: NodeKind,
    span: Option<(u32, u32)>,
    parts: SmallVec<[Part; 4]>,
}

/// Numbers packed and intermediate nodes so that two of them get the same
/// number exactly when they spell out the same derivations
struct Shapes<'a> {
    nodes: &'a [SppfNode],
    interned: HashMap<ShapeKey, u32, ahash::RandomState>,
    memo: HashMap<NodeId, u32, ahash::RandomState>,
}

impl<'a> Shapes<'a> {
    fn new(nodes: &'a [SppfNode]) -> Self {
        Self {
            nodes,
            interned: HashMap::with_hasher(ahash::RandomState::new()),
            memo: HashMap::with_hasher(ahash::RandomState::new()),
        }
    }

    fn part(&mut self, id: NodeId) -> Part {
        match self.nodes[id.index()].kind {
            NodeKind::Intermediate { .. } | NodeKind::RightNullablePart { .. } => Part::Shape(self.shape(id)),
            _ => Part::Node(id),
        }
    }

    fn shape(&mut self, id: NodeId) -> u32 {
        if let Some(&shape) = self.memo.get(&id) {
            return shape;
        }
        let nodes = self.nodes;
        let node = &nodes[id.index()];
        let parts = match node.kind {
            // alternatives are a set: order and repeats do not matter
            NodeKind::Intermediate { .. } => {
                let mut inner: SmallVec<[u32; 4]> = node.children.iter().map(|&p| self.shape(p)).collect();
                inner.sort_unstable();
                inner.dedup();
                inner.into_iter().map(Part::Shape).collect()
            }
            _ => node.children.iter().map(|&c| self.part(c)).collect(),
        };
        let key = ShapeKey {
            kind: node.kind,
            span: node.span,
            parts,
        };
        let next = u32::try_from(self.interned.len()).unwrap_or(u32::MAX);
        let shape = *self.interned.entry(key).or_insert(next);
        self.memo.insert(id, shape);
        shape
    }
}

/// Drops a packed alternative that spells out the same derivations as an
/// earlier sibling.
///
/// Binarisation can leave the same derivation reachable through two
/// packed nodes that differ only in how intermediate nodes were shared.
/// Packed nodes are compared by their children: symbol nodes and leaves
/// by identity, intermediates by the set of alternatives they hold.
#[derive(Debug, Clone, Copy, Default)]
pub struct DedupeEquivalent;

impl ForestPass for DedupeEquivalent {
    fn name(&self) -> &'static str {
        "dedupe-equivalent"
    }

    fn run(&self, cx: &mut PassContext<'_>) -> bool {
        let nodes = &*cx.nodes;
        let live = reachable(nodes, cx.root);
        let mut shapes = Shapes::new(nodes);
        let mut edits = Vec::new();
        for (index, node) in nodes.iter().enumerate() {
            if !live[index] || !node.is_choice() || node.children.len() < 2 {
                continue;
            }
            let mut seen = HashSet::with_hasher(ahash::RandomState::new());
            let keep: SmallVec<[NodeId; 2]> = node
                .children
                .iter()
                .copied()
                .filter(|&p| seen.insert(shapes.shape(p)))
                .collect();
            if keep.len() != node.children.len() {
                edits.push((index, keep));
            }
        }
        let changed = !edits.is_empty();
        for (index, keep) in edits {
            cx.nodes[index].children = keep;
        }
        changed
    }
}

/// Keeps only the alternatives that take the longest match through a
/// nullable list or optional rule.
#[derive(Debug, Clone, Copy, Default)]
pub struct PreferLongestList;

impl ForestPass for PreferLongestList {
    fn name(&self) -> &'static str {
        "prefer-longest-list"
    }

    fn run(&self, cx: &mut PassContext<'_>) -> bool {
        let nodes = &*cx.nodes;
        let live = reachable(nodes, cx.root);
        let mut edits = Vec::new();
        for (index, node) in nodes.iter().enumerate() {
            if !live[index] || !node.is_choice() || node.children.len() < 2 {
                continue;
            }
            let firsts: Vec<Option<Sequence>> = node
                .children
                .iter()
                .map(|&p| sequences(nodes, p, 1).into_iter().next())
                .collect();
            let beaten: Vec<bool> = firsts
                .iter()
                .enumerate()
                .map(|(j, mine)| {
                    let Some(mine) = mine else { return false };
                    firsts.iter().enumerate().any(|(i, theirs)| {
                        i != j
                            && theirs
                                .as_ref()
                                .is_some_and(|theirs| greedier(cx.grammar, nodes, theirs, mine))
                    })
                })
                .collect();
            if beaten.iter().any(|b| *b) && !beaten.iter().all(|b| *b) {
                let keep: SmallVec<[NodeId; 2]> = node
                    .children
                    .iter()
                    .zip(&beaten)
                    .filter(|(_, b)| !**b)
                    .map(|(p, _)| *p)
                    .collect();
                edits.push((index, keep));
            }
        }
        let changed = !edits.is_empty();
        for (index, keep) in edits {
            cx.nodes[index].children = keep;
        }
        changed
    }
}

/// Splices unambiguous intermediate nodes and right-nullable parts into
/// the packed nodes that use them, so each packed node lists one child per
/// symbol wherever no choice is involved.
#[derive(Debug, Clone, Copy, Default)]
pub struct Collapse;

impl ForestPass for Collapse {
    fn name(&self) -> &'static str {
        "collapse"
    }

    fn run(&self, cx: &mut PassContext<'_>) -> bool {
        let live = reachable(cx.nodes, cx.root);
        let mut changed = false;
        for index in 0..cx.nodes.len() {
            if !live[index] || !cx.nodes[index].is_packed() {
                continue;
            }
            let nodes = &*cx.nodes;
            let original = &nodes[index].children;
            let needs_work = original.iter().any(|c| splice_target(nodes, *c).is_some());
            if !needs_work {
                continue;
            }
            let mut flat: SmallVec<[NodeId; 2]> = SmallVec::new();
            let mut pending: Vec<NodeId> = original.iter().rev().copied().collect();
            while let Some(child) = pending.pop() {
                match splice_target(nodes, child) {
                    Some(inner) => pending.extend(nodes[inner.index()].children.iter().rev().copied()),
                    None => flat.push(child),
                }
            }
            if flat.is_empty() {
                flat.push(NodeId::EPSILON);
            }
            cx.nodes[index].children = flat;
            changed = true;
        }
        changed
    }
}

/// The node whose children replace `child` when it is collapsed
fn splice_target(nodes: &[SppfNode], child: NodeId) -> Option<NodeId> {
    let node = &nodes[child.index()];
    match node.kind {
        NodeKind::Intermediate { .. } if node.children.len() == 1 => Some(node.children[0]),
        NodeKind::RightNullablePart { .. } => Some(child),
        _ => None,
    }
}

/// Fills in `parents` for every live node
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkParents;

impl ForestPass for LinkParents {
    fn name(&self) -> &'static str {
        "link-parents"
    }

    fn run(&self, cx: &mut PassContext<'_>) -> bool {
        let live = reachable(cx.nodes, cx.root);
        for node in cx.nodes.iter_mut() {
            node.parents.clear();
        }
        for index in 0..cx.nodes.len() {
            if !live[index] {
                continue;
            }
            let parent = NodeId(u32::try_from(index).unwrap_or(u32::MAX));
            for child in cx.nodes[index].children.clone() {
                let parents = &mut cx.nodes[child.index()].parents;
                if !parents.contains(&parent) {
                    parents.push(parent);
                }
            }
        }
        false
    }
}

/// The standard pipeline run after an ambiguous or filtered parse
#[must_use]
pub fn default_passes(precedence: bool, greedy_lists: bool) -> Vec<Box<dyn ForestPass>> {
    let mut passes: Vec<Box<dyn ForestPass>> = vec![Box::new(PruneDead)];
    if precedence {
        passes.push(Box::new(ResolvePrecedence));
        passes.push(Box::new(PruneDead));
    }
    passes.push(Box::new(DedupeEquivalent));
    if greedy_lists {
        passes.push(Box::new(PreferLongestList));
    }
    passes.push(Box::new(PruneDead));
    passes.push(Box::new(Collapse));
    passes.push(Box::new(LinkParents));
    passes
}

/// Structural cleanup only, for forests with a single derivation
#[must_use]
pub fn structural_passes() -> Vec<Box<dyn ForestPass>> {
    vec![Box::new(Collapse), Box::new(LinkParents)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::notation::parse_bnf;
    use crate::grammar::RuleId;

    fn push(nodes: &mut Vec<SppfNode>, kind: NodeKind, span: Option<(u32, u32)>, children: &[NodeId]) -> NodeId {
        let mut node = SppfNode::new(kind, span);
        node.children = children.iter().copied().collect();
        nodes.push(node);
        NodeId(u32::try_from(nodes.len() - 1).unwrap())
    }

    #[test]
    fn test_prune_dead_cascades() {
        let g = parse_bnf("<S> ::= <A> | \"x\"\n<A> ::= <B>\n<B> ::= \"y\"", &[]).unwrap();
        let (s, a, b) = (
            g.rule_by_name("S").unwrap(),
            g.rule_by_name("A").unwrap(),
            g.rule_by_name("B").unwrap(),
        );
        let mut nodes = vec![SppfNode::new(NodeKind::Epsilon, None)];
        let t = push(&mut nodes, NodeKind::Terminal { token: 0 }, Some((0, 1)), &[]);
        let dead_b = push(&mut nodes, NodeKind::Symbol { rule: b }, Some((0, 1)), &[]);
        let pa = push(&mut nodes, NodeKind::Packed { rule: a, alt: 0 }, None, &[dead_b]);
        let node_a = push(&mut nodes, NodeKind::Symbol { rule: a }, Some((0, 1)), &[pa]);
        let ps0 = push(&mut nodes, NodeKind::Packed { rule: s, alt: 0 }, None, &[node_a]);
        let ps1 = push(&mut nodes, NodeKind::Packed { rule: s, alt: 1 }, None, &[t]);
        let root = push(&mut nodes, NodeKind::Symbol { rule: s }, Some((0, 1)), &[ps0, ps1]);

        let mut cx = PassContext {
            nodes: &mut nodes,
            root,
            grammar: &g,
        };
        assert!(PruneDead.run(&mut cx));
        assert!(nodes[node_a.index()].children.is_empty());
        assert_eq!(nodes[root.index()].children.as_slice(), &[ps1]);
    }

    #[test]
    fn test_collapse_and_link() {
        let g = parse_bnf("<S> ::= \"a\" \"b\" \"c\"", &[]).unwrap();
        let s = g.rule_by_name("S").unwrap();
        let mut nodes = vec![SppfNode::new(NodeKind::Epsilon, None)];
        let ta = push(&mut nodes, NodeKind::Terminal { token: 0 }, Some((0, 1)), &[]);
        let tb = push(&mut nodes, NodeKind::Terminal { token: 1 }, Some((1, 2)), &[]);
        let tc = push(&mut nodes, NodeKind::Terminal { token: 2 }, Some((2, 3)), &[]);
        let inner = push(&mut nodes, NodeKind::Packed { rule: s, alt: 0 }, None, &[tb, tc]);
        let mid = push(&mut nodes, NodeKind::Intermediate { rule: s, alt: 0, from: 1 }, Some((1, 3)), &[inner]);
        let outer = push(&mut nodes, NodeKind::Packed { rule: s, alt: 0 }, None, &[ta, mid]);
        let root = push(&mut nodes, NodeKind::Symbol { rule: s }, Some((0, 3)), &[outer]);

        let mut cx = PassContext {
            nodes: &mut nodes,
            root,
            grammar: &g,
        };
        assert!(Collapse.run(&mut cx));
        LinkParents.run(&mut cx);
        assert_eq!(nodes[outer.index()].children.as_slice(), &[ta, tb, tc]);
        assert_eq!(nodes[tb.index()].parents.as_slice(), &[outer]);
        assert!(nodes[mid.index()].parents.is_empty());
    }

    #[test]
    fn test_dedupe_identical_alternatives() {
        let rule = RuleId(1);
        let g = parse_bnf("<S> ::= \"a\"", &[]).unwrap();
        let mut nodes = vec![SppfNode::new(NodeKind::Epsilon, None)];
        let t = push(&mut nodes, NodeKind::Terminal { token: 0 }, Some((0, 1)), &[]);
        let p0 = push(&mut nodes, NodeKind::Packed { rule, alt: 0 }, None, &[t]);
        let p1 = push(&mut nodes, NodeKind::Packed { rule, alt: 0 }, None, &[t]);
        let root = push(&mut nodes, NodeKind::Symbol { rule }, Some((0, 1)), &[p0, p1]);
        let mut cx = PassContext {
            nodes: &mut nodes,
            root,
            grammar: &g,
        };
        assert!(DedupeEquivalent.run(&mut cx));
        assert_eq!(nodes[root.index()].children.as_slice(), &[p0]);
    }

    #[test]
    fn test_dedupe_keeps_distinct_wide_alternatives() {
        let rule = RuleId(1);
        let g = parse_bnf("<S> ::= \"a\" \"b\"", &[]).unwrap();
        let mut nodes = vec![SppfNode::new(NodeKind::Epsilon, None)];
        let leaves: Vec<NodeId> = (0..66)
            .map(|i| push(&mut nodes, NodeKind::Terminal { token: i }, Some((0, 1)), &[]))
            .collect();
        let inner = NodeKind::Intermediate { rule, alt: 0, from: 1 };
        let wide = |nodes: &mut Vec<SppfNode>, tokens: &[NodeId]| {
            let packed: Vec<NodeId> = tokens
                .iter()
                .map(|&t| push(nodes, NodeKind::Packed { rule, alt: 0 }, None, &[t]))
                .collect();
            let mid = push(nodes, inner, Some((0, 1)), &packed);
            push(nodes, NodeKind::Packed { rule, alt: 0 }, None, &[mid])
        };
        // 65 alternatives, the same 65 again, and the first 64 plus another
        let first = wide(&mut nodes, &leaves[..65]);
        let copy = wide(&mut nodes, &leaves[..65]);
        let mut other: Vec<NodeId> = leaves[..64].to_vec();
        other.push(leaves[65]);
        let differs = wide(&mut nodes, &other);
        let root = push(&mut nodes, NodeKind::Symbol { rule }, Some((0, 1)), &[first, copy, differs]);

        let mut cx = PassContext {
            nodes: &mut nodes,
            root,
            grammar: &g,
        };
        assert!(DedupeEquivalent.run(&mut cx));
        assert_eq!(nodes[root.index()].children.as_slice(), &[first, differs]);
    }
}
