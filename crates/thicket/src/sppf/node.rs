use crate::grammar::RuleId;
use smallvec::SmallVec;

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// Index of a node in a forest arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct NodeId(pub u32);

impl NodeId {
    /// The shared epsilon leaf, always the first node of every arena
    pub const EPSILON: Self = Self(0);

    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// The closed family of SPPF node kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum NodeKind {
    /// `rule` recognised over the node's span. Children are packed nodes,
    /// one per derivation.
    Symbol { rule: RuleId },
    /// One derivation of its parent using alternative `alt`
    Packed { rule: RuleId, alt: u32 },
    /// Symbols `from..` of alternative `alt`, produced while binarising a
    /// reduction. Children are packed nodes.
    Intermediate { rule: RuleId, alt: u32, from: u32 },
    /// The token at this index of the token stream
    Terminal { token: u32 },
    /// The empty derivation
    Epsilon,
    /// The nullable suffix `from..` of alternative `alt`. Children are the
    /// epsilon fragments of the suffix symbols.
    RightNullablePart { rule: RuleId, alt: u32, from: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct SppfNode {
    pub kind: NodeKind,
    /// Token range `[left, right)`; `None` for epsilon fragments, which
    /// are shared between every position
    pub span: Option<(u32, u32)>,
    pub children: SmallVec<[NodeId; 2]>,
    /// Filled in by the parent-linking pass
    pub parents: SmallVec<[NodeId; 2]>,
}

impl SppfNode {
    #[must_use]
    pub fn new(kind: NodeKind, span: Option<(u32, u32)>) -> Self {
        Self {
            kind,
            span,
            children: SmallVec::new(),
            parents: SmallVec::new(),
        }
    }

    /// Symbol and intermediate nodes, whose children are alternatives
    #[must_use]
    pub const fn is_choice(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Symbol { .. } | NodeKind::Intermediate { .. }
        )
    }

    #[must_use]
    pub const fn is_packed(&self) -> bool {
        matches!(self.kind, NodeKind::Packed { .. })
    }

    #[must_use]
    pub const fn rule(&self) -> Option<RuleId> {
        match self.kind {
            NodeKind::Symbol { rule }
            | NodeKind::Packed { rule, .. }
            | NodeKind::Intermediate { rule, .. }
            | NodeKind::RightNullablePart { rule, .. } => Some(rule),
            NodeKind::Terminal { .. } | NodeKind::Epsilon => None,
        }
    }

    /// Number of tokens covered
    #[must_use]
    pub fn width(&self) -> u32 {
        self.span.map_or(0, |(left, right)| right - left)
    }
}

/// One flattened right-hand side: a node per symbol of the alternative
pub type Sequence = SmallVec<[NodeId; 4]>;

/// Flatten a packed node's children into full symbol sequences.
///
/// Intermediate nodes are expanded (each of their alternatives yields its
/// own sequences) and right-nullable parts are replaced by their epsilon
/// fragments. At most `cap` sequences are produced.
#[must_use]
pub fn sequences(nodes: &[SppfNode], packed: NodeId, cap: usize) -> Vec<Sequence> {
    sequences_of(nodes, &nodes[packed.index()].children, cap)
}

/// [`sequences`] for a child list that has not been packed yet
#[must_use]
pub fn sequences_of(nodes: &[SppfNode], children: &[NodeId], cap: usize) -> Vec<Sequence> {
    let mut partial = vec![Sequence::new()];
    for &child in children {
        partial = extend(nodes, partial, child, cap);
        if partial.is_empty() {
            break;
        }
    }
    partial
}

fn extend(nodes: &[SppfNode], mut partial: Vec<Sequence>, child: NodeId, cap: usize) -> Vec<Sequence> {
    let node = &nodes[child.index()];
    match node.kind {
        NodeKind::Intermediate { .. } => {
            let mut out = Vec::new();
            'outer: for &packed in &node.children {
                for suffix in sequences(nodes, packed, cap) {
                    for prefix in &partial {
                        if out.len() >= cap {
                            break 'outer;
                        }
                        let mut joined = prefix.clone();
                        joined.extend(suffix.iter().copied());
                        out.push(joined);
                    }
                }
            }
            out
        }
        NodeKind::RightNullablePart { .. } => {
            for seq in &mut partial {
                seq.extend(node.children.iter().copied());
            }
            partial
        }
        NodeKind::Epsilon => partial,
        _ => {
            for seq in &mut partial {
                seq.push(child);
            }
            partial
        }
    }
}

/// Nodes reachable from `root`, as a membership vector
#[must_use]
pub fn reachable(nodes: &[SppfNode], root: NodeId) -> Vec<bool> {
    let mut seen = vec![false; nodes.len()];
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        if std::mem::replace(&mut seen[id.index()], true) {
            continue;
        }
        stack.extend(nodes[id.index()].children.iter().copied());
    }
    seen
}
