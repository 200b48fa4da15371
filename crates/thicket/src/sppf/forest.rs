use super::node::{reachable, NodeId, NodeKind, SppfNode};
use super::transform::{ForestPass, PassContext};
use super::tree::{ParseTree, TreeIndex};
use crate::error::ParseError;
use crate::grammar::Grammar;
use crate::lexer::TokenStream;
use std::fmt::Write as _;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// Counters collected while building a forest
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseStats {
    pub gss_nodes: usize,
    pub gss_edges: usize,
    pub sppf_nodes: usize,
    pub reductions: usize,
    /// Candidates turned down by disambiguation
    pub rejected: usize,
    pub elapsed: Duration,
}

/// The shared packed parse forest of one successful parse.
///
/// Nodes live in an arena owned by the forest; [`NodeId`]s index into it.
/// Trees are enumerated lazily: [`Forest::tree_count`] is cheap once the
/// counting index is built, and [`Forest::tree_at`] materialises any single
/// tree without visiting the others.
#[derive(Debug)]
pub struct Forest {
    nodes: Vec<SppfNode>,
    root: NodeId,
    ambiguous: bool,
    tokens: TokenStream,
    grammar: Arc<Grammar>,
    stats: ParseStats,
    index: OnceLock<TreeIndex>,
    trees: OnceLock<Vec<ParseTree>>,
}

impl Forest {
    pub(crate) fn new(
        nodes: Vec<SppfNode>,
        root: NodeId,
        tokens: TokenStream,
        grammar: Arc<Grammar>,
        stats: ParseStats,
    ) -> Self {
        let mut forest = Self {
            nodes,
            root,
            ambiguous: false,
            tokens,
            grammar,
            stats,
            index: OnceLock::new(),
            trees: OnceLock::new(),
        };
        forest.ambiguous = forest.has_choices();
        forest
    }

    #[must_use]
    pub const fn root(&self) -> NodeId {
        self.root
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> &SppfNode {
        &self.nodes[id.index()]
    }

    /// The whole arena, including nodes no longer reachable from the root
    #[must_use]
    pub fn nodes(&self) -> &[SppfNode] {
        &self.nodes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of nodes reachable from the root
    #[must_use]
    pub fn live_len(&self) -> usize {
        reachable(&self.nodes, self.root).into_iter().filter(|l| *l).count()
    }

    /// True if some node still has more than one derivation
    #[must_use]
    pub const fn is_ambiguous(&self) -> bool {
        self.ambiguous
    }

    #[must_use]
    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    #[must_use]
    pub const fn tokens(&self) -> &TokenStream {
        &self.tokens
    }

    #[must_use]
    pub const fn stats(&self) -> &ParseStats {
        &self.stats
    }

    fn tree_index(&self) -> &TreeIndex {
        self.index.get_or_init(|| TreeIndex::build(&self.nodes, self.root))
    }

    /// Number of distinct trees, saturating at `u64::MAX`. Cyclic
    /// derivations are not counted.
    #[must_use]
    pub fn tree_count(&self) -> u64 {
        self.tree_index().count(self.root)
    }

    /// Tree number `index` in enumeration order
    #[must_use]
    pub fn tree_at(&self, index: u64) -> Option<ParseTree> {
        if index >= self.tree_count() {
            return None;
        }
        self.tree_index()
            .realize(&self.nodes, &self.grammar, &self.tokens, self.root, index)
    }

    /// Iterate over every tree, building each on demand. Calling this again
    /// starts over from the first tree.
    pub fn iter_trees(&self) -> impl Iterator<Item = ParseTree> + '_ {
        let index = self.tree_index();
        (0..index.count(self.root))
            .filter_map(move |i| index.realize(&self.nodes, &self.grammar, &self.tokens, self.root, i))
    }

    /// Every tree, built once and cached.
    ///
    /// Prefer [`Forest::iter_trees`] or [`Forest::tree_at`] when the count
    /// may be large.
    pub fn trees(&self) -> &[ParseTree] {
        self.trees.get_or_init(|| self.iter_trees().collect())
    }

    /// Run `passes` in order over the forest.
    ///
    /// Returns true if any pass changed the forest.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::EmptyForest`] if the root lost every derivation.
    pub fn transform(&mut self, passes: &[&dyn ForestPass]) -> Result<bool, ParseError> {
        let mut changed = false;
        {
            let mut cx = PassContext {
                nodes: &mut self.nodes,
                root: self.root,
                grammar: &self.grammar,
            };
            for pass in passes {
                let did = pass.run(&mut cx);
                tracing::trace!(pass = pass.name(), changed = did, "forest pass");
                changed |= did;
            }
        }

        self.index = OnceLock::new();
        self.trees = OnceLock::new();
        self.ambiguous = self.has_choices();

        let root = &self.nodes[self.root.index()];
        if root.is_choice() && root.children.is_empty() {
            return Err(ParseError::EmptyForest);
        }
        Ok(changed)
    }

    /// Boxed-pass convenience over [`Forest::transform`]
    ///
    /// # Errors
    ///
    /// See [`Forest::transform`].
    pub fn transform_boxed(&mut self, passes: &[Box<dyn ForestPass>]) -> Result<bool, ParseError> {
        let refs: Vec<&dyn ForestPass> = passes.iter().map(AsRef::as_ref).collect();
        self.transform(&refs)
    }

    fn has_choices(&self) -> bool {
        let live = reachable(&self.nodes, self.root);
        self.nodes
            .iter()
            .enumerate()
            .any(|(i, n)| live[i] && n.is_choice() && n.children.len() > 1)
    }

    /// One line per live node, for debugging
    #[must_use]
    pub fn describe(&self) -> String {
        let live = reachable(&self.nodes, self.root);
        let mut out = String::new();
        for (index, node) in self.nodes.iter().enumerate() {
            if !live[index] {
                continue;
            }
            let label = match node.kind {
                NodeKind::Symbol { rule } => format!("<{}>", self.grammar.rule(rule).name),
                NodeKind::Packed { rule, alt } => {
                    format!("packed {}", self.grammar.display_alternative(rule, alt as usize, None))
                }
                NodeKind::Intermediate { rule, alt, from } => format!(
                    "intermediate {}",
                    self.grammar.display_alternative(rule, alt as usize, Some(from as usize))
                ),
                NodeKind::Terminal { token } => self
                    .tokens
                    .get(token as usize)
                    .map_or_else(|| "?".to_string(), |t| t.describe()),
                NodeKind::Epsilon => "ε".to_string(),
                NodeKind::RightNullablePart { rule, alt, from } => format!(
                    "nulled {}",
                    self.grammar.display_alternative(rule, alt as usize, Some(from as usize))
                ),
            };
            let span = node
                .span
                .map_or_else(String::new, |(l, r)| format!(" [{l}, {r})"));
            let children: Vec<String> = node.children.iter().map(|c| c.0.to_string()).collect();
            let _ = writeln!(out, "{index}: {label}{span} -> [{}]", children.join(", "));
        }
        out
    }
}
