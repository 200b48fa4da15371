use super::node::{NodeId, NodeKind, SppfNode};
use crate::grammar::{Grammar, RuleId};
use crate::lexer::{Token, TokenStream};
use compact_str::CompactString;
use hashbrown::HashSet;

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum TreeLabel {
    Rule {
        name: CompactString,
        rule: RuleId,
        alternative: u32,
    },
    Token(Token),
}

/// One concrete parse tree read out of a forest.
///
/// Epsilon leaves are dropped: a rule that derived the empty string is a
/// rule node with no children.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct ParseTree {
    pub label: TreeLabel,
    pub children: Vec<ParseTree>,
}

impl ParseTree {
    #[must_use]
    pub fn rule_name(&self) -> Option<&str> {
        match &self.label {
            TreeLabel::Rule { name, .. } => Some(name),
            TreeLabel::Token(_) => None,
        }
    }

    #[must_use]
    pub const fn token(&self) -> Option<&Token> {
        match &self.label {
            TreeLabel::Token(token) => Some(token),
            TreeLabel::Rule { .. } => None,
        }
    }

    /// Token texts of the leaves, in order
    #[must_use]
    pub fn text(&self) -> String {
        let mut words = Vec::new();
        self.collect_text(&mut words);
        words.join(" ")
    }

    fn collect_text<'a>(&'a self, out: &mut Vec<&'a str>) {
        match &self.label {
            TreeLabel::Token(token) => out.push(&token.text),
            TreeLabel::Rule { .. } => self.children.iter().for_each(|c| c.collect_text(out)),
        }
    }

    /// `(Rule child ...)` with tokens as quoted strings
    #[must_use]
    pub fn to_sexpr(&self) -> String {
        let mut out = String::new();
        self.write_sexpr(&mut out);
        out
    }

    fn write_sexpr(&self, out: &mut String) {
        match &self.label {
            TreeLabel::Token(token) => out.push_str(&format!("{:?}", token.text.as_str())),
            TreeLabel::Rule { name, .. } => {
                out.push('(');
                out.push_str(name);
                for child in &self.children {
                    out.push(' ');
                    child.write_sexpr(out);
                }
                out.push(')');
            }
        }
    }
}

/// Per-node tree counts over the acyclic part of a forest.
///
/// A depth-first walk from the root marks every packed node that closes a
/// cycle; those alternatives are left out of counting and enumeration, so
/// the number of trees is always finite.
#[derive(Debug, Clone)]
pub(crate) struct TreeIndex {
    counts: Vec<u64>,
    cyclic: HashSet<NodeId, ahash::RandomState>,
}

impl TreeIndex {
    pub(crate) fn build(nodes: &[SppfNode], root: NodeId) -> Self {
        const UNSEEN: u8 = 0;
        const OPEN: u8 = 1;
        const DONE: u8 = 2;

        let mut counts = vec![0u64; nodes.len()];
        let mut cyclic = HashSet::with_hasher(ahash::RandomState::new());
        let mut mark = vec![UNSEEN; nodes.len()];
        let mut frames: Vec<(NodeId, usize)> = vec![(root, 0)];
        mark[root.index()] = OPEN;

        while let Some(frame) = frames.last_mut() {
            let id = frame.0;
            let node = &nodes[id.index()];
            if let Some(&child) = node.children.get(frame.1) {
                frame.1 += 1;
                match mark[child.index()] {
                    UNSEEN => {
                        mark[child.index()] = OPEN;
                        frames.push((child, 0));
                    }
                    OPEN => {
                        // back edge: drop the innermost packed alternative on the path
                        if let Some(&(packed, _)) = frames
                            .iter()
                            .rev()
                            .find(|(f, _)| nodes[f.index()].is_packed())
                        {
                            cyclic.insert(packed);
                        }
                    }
                    _ => {}
                }
                continue;
            }

            frames.pop();
            mark[id.index()] = DONE;
            let count = match node.kind {
                NodeKind::Symbol { .. } | NodeKind::Intermediate { .. } => node
                    .children
                    .iter()
                    .filter(|p| !cyclic.contains(*p))
                    .fold(0u64, |acc, p| acc.saturating_add(counts[p.index()])),
                NodeKind::Packed { .. } if cyclic.contains(&id) => 0,
                NodeKind::Packed { .. } | NodeKind::RightNullablePart { .. } => node
                    .children
                    .iter()
                    .fold(1u64, |acc, c| acc.saturating_mul(counts[c.index()])),
                NodeKind::Terminal { .. } | NodeKind::Epsilon => 1,
            };
            counts[id.index()] = count;
        }

        Self { counts, cyclic }
    }

    pub(crate) fn count(&self, id: NodeId) -> u64 {
        self.counts.get(id.index()).copied().unwrap_or(0)
    }

    /// Pick the packed alternative of choice node `id` that tree `index`
    /// falls into, and the index within it
    fn choose(&self, nodes: &[SppfNode], id: NodeId, mut index: u64) -> Option<(NodeId, u64)> {
        for &packed in &nodes[id.index()].children {
            if self.cyclic.contains(&packed) {
                continue;
            }
            let count = self.count(packed);
            if index < count {
                return Some((packed, index));
            }
            index -= count;
        }
        None
    }

    /// The symbol-level elements of packed node `packed` for tree `index`,
    /// each paired with its own tree index
    fn elements(
        &self,
        nodes: &[SppfNode],
        packed: NodeId,
        index: u64,
        out: &mut Vec<(NodeId, u64)>,
    ) -> Option<()> {
        let mut rest = index;
        for &child in &nodes[packed.index()].children {
            let count = self.count(child).max(1);
            let own = rest % count;
            rest /= count;
            match nodes[child.index()].kind {
                NodeKind::Intermediate { .. } => {
                    let (inner, inner_index) = self.choose(nodes, child, own)?;
                    self.elements(nodes, inner, inner_index, out)?;
                }
                NodeKind::RightNullablePart { .. } => {
                    self.elements(nodes, child, own, out)?;
                }
                NodeKind::Epsilon => {}
                _ => out.push((child, own)),
            }
        }
        Some(())
    }

    /// Materialise tree `index` rooted at `root`
    pub(crate) fn realize(
        &self,
        nodes: &[SppfNode],
        grammar: &Grammar,
        tokens: &TokenStream,
        root: NodeId,
        index: u64,
    ) -> Option<ParseTree> {
        enum Work {
            Visit(NodeId, u64),
            Close(TreeLabel, usize),
        }

        let mut work = vec![Work::Visit(root, index)];
        let mut built: Vec<ParseTree> = Vec::new();
        while let Some(item) = work.pop() {
            match item {
                Work::Visit(id, index) => match nodes[id.index()].kind {
                    NodeKind::Terminal { token } => built.push(ParseTree {
                        label: TreeLabel::Token(tokens.get(token as usize)?.clone()),
                        children: Vec::new(),
                    }),
                    NodeKind::Symbol { rule } => {
                        let (packed, inner) = self.choose(nodes, id, index)?;
                        let NodeKind::Packed { alt, .. } = nodes[packed.index()].kind else {
                            return None;
                        };
                        let mut elements = Vec::new();
                        self.elements(nodes, packed, inner, &mut elements)?;
                        work.push(Work::Close(
                            TreeLabel::Rule {
                                name: grammar.rule(rule).name.clone(),
                                rule,
                                alternative: alt,
                            },
                            elements.len(),
                        ));
                        work.extend(elements.into_iter().rev().map(|(e, i)| Work::Visit(e, i)));
                    }
                    _ => return None,
                },
                Work::Close(label, arity) => {
                    let children = built.split_off(built.len().checked_sub(arity)?);
                    built.push(ParseTree { label, children });
                }
            }
        }
        built.pop()
    }
}
