//! The BRNGLR driver.
//!
//! Works level by level over the token stream. At each level the reducer
//! drains the pending reductions, then the shifter moves every stack that
//! can consume the current token to the next level. Reductions longer than
//! two symbols are binarised: the walk back along the stack builds an
//! intermediate node per step instead of enumerating whole paths.
//!
//! Operator derivations whose operands end at the current level are held
//! back until the reducer has drained, then judged narrowest first. Only
//! the ones that survive are packed into the forest.

use super::disambiguation::{Candidate, Pipeline, Verdict, SEQUENCE_CAP};
use super::stack::{GraphStack, GssId};
use super::ParserConfig;
use crate::compile::CompiledGrammar;
use crate::error::ParseError;
use crate::grammar::{Grammar, RuleId};
use crate::lalr::{Action, Lookahead, StateId};
use crate::lexer::TokenStream;
use crate::sppf::{sequences_of, Forest, NodeId, NodeKind, ParseStats, SppfNode};
use hashbrown::{HashMap, HashSet};
use smallvec::{smallvec, SmallVec};
use std::time::Instant;

type Children = SmallVec<[NodeId; 2]>;

/// `(parent, alternative, first child, second child)`
type PackedKey = (NodeId, u32, NodeId, Option<NodeId>);

#[derive(Debug)]
enum Pending {
    /// Reduce `rule` to the empty string on top of `node`
    Zero { node: GssId, rule: RuleId },
    /// `remaining` more edges to walk back from `node`; `tail` covers the
    /// symbols after them
    Walk {
        node: GssId,
        rule: RuleId,
        alt: u32,
        remaining: u32,
        tail: NodeId,
    },
    /// Every symbol has been collected; `node` is where the goto starts
    Complete {
        node: GssId,
        rule: RuleId,
        alt: u32,
        children: Children,
    },
}

/// A derivation waiting for the level's reductions to finish
#[derive(Debug)]
struct Deferred {
    symbol: NodeId,
    rule: RuleId,
    alt: u32,
    span: (u32, u32),
    children: Children,
}

pub(crate) struct Engine<'a> {
    compiled: &'a CompiledGrammar,
    grammar: &'a Grammar,
    config: &'a ParserConfig,
    pipeline: Pipeline<'a>,
    tokens: &'a TokenStream,
    gss: GraphStack,
    nodes: Vec<SppfNode>,
    symbols: HashMap<(RuleId, u32, u32), NodeId, ahash::RandomState>,
    intermediates: HashMap<(RuleId, u32, u32, u32, u32), NodeId, ahash::RandomState>,
    /// Derivations packed, or waiting in `deferred`
    packed: HashSet<PackedKey, ahash::RandomState>,
    rejected: HashSet<PackedKey, ahash::RandomState>,
    deferred: Vec<Deferred>,
    /// Symbols whose only derivations so far are in `deferred`
    waiting: HashSet<NodeId, ahash::RandomState>,
    terminals: Vec<Option<NodeId>>,
    pending: Vec<Pending>,
    walks: HashSet<(GssId, RuleId, u32, u32, NodeId), ahash::RandomState>,
    zeros: HashSet<(GssId, RuleId), ahash::RandomState>,
    shifts: Vec<(GssId, StateId)>,
    level: u32,
    lookaheads: SmallVec<[Lookahead; 4]>,
    stats: ParseStats,
}

impl<'a> Engine<'a> {
    pub(crate) fn new(
        compiled: &'a CompiledGrammar,
        config: &'a ParserConfig,
        pipeline: Pipeline<'a>,
        tokens: &'a TokenStream,
    ) -> Self {
        let hasher = ahash::RandomState::new;
        Self {
            compiled,
            grammar: compiled.grammar(),
            config,
            pipeline,
            tokens,
            gss: GraphStack::new(tokens.len() + 1, config.max_stack_nodes),
            nodes: compiled.epsilon().nodes().to_vec(),
            symbols: HashMap::with_hasher(hasher()),
            intermediates: HashMap::with_hasher(hasher()),
            packed: HashSet::with_hasher(hasher()),
            rejected: HashSet::with_hasher(hasher()),
            deferred: Vec::new(),
            waiting: HashSet::with_hasher(hasher()),
            terminals: vec![None; tokens.len()],
            pending: Vec::new(),
            walks: HashSet::with_hasher(hasher()),
            zeros: HashSet::with_hasher(hasher()),
            shifts: Vec::new(),
            level: 0,
            lookaheads: SmallVec::new(),
            stats: ParseStats::default(),
        }
    }

    /// Run the parse to completion
    pub(crate) fn run(mut self) -> Result<Forest, ParseError> {
        let started = Instant::now();
        if self.tokens.is_blank() {
            return self.parse_blank(started);
        }

        let n = u32::try_from(self.tokens.len())
            .map_err(|_| ParseError::internal("token stream too long"))?;
        let automaton = self.compiled.automaton();
        let (start, _) = self.gss.get_or_insert(0, automaton.start_state())?;

        for level in 0..=n {
            self.begin_level(level);
            if level == 0 {
                self.queue_node(start);
            } else {
                let fresh: Vec<GssId> = self.gss.level(level).to_vec();
                for node in fresh {
                    self.queue_node(node);
                    let edges = self.gss.node(node).edges.clone();
                    for (target, label) in edges {
                        self.queue_edge(node, target, label)?;
                    }
                }
            }
            self.reduce()?;
            self.settle();
            if level == n {
                break;
            }
            if self.shifts.is_empty() {
                return Err(self.failure(level));
            }
            self.shift()?;
        }

        let root = self.accepted_root(start, n).ok_or_else(|| self.failure(n - 1))?;
        if self.nodes[root.index()].children.is_empty() {
            tracing::debug!(rejected = self.stats.rejected, "every derivation of the input was rejected");
            return Err(ParseError::EmptyForest);
        }
        self.finish(root, started)
    }

    /// Input with nothing but the EOF token: accepted exactly when the
    /// first rule derives the empty string
    fn parse_blank(self, started: Instant) -> Result<Forest, ParseError> {
        let Some(root) = self.compiled.epsilon().symbol(self.grammar.first()) else {
            let automaton = self.compiled.automaton();
            let expected = self.expected_names(&[automaton.start_state()]);
            let eof = self.tokens.get(0).cloned();
            return Err(ParseError::UnexpectedToken {
                position: eof.as_ref().map(|t| t.position).unwrap_or_default(),
                found: eof.map_or_else(|| "end of input".to_string(), |t| t.describe()),
                near: String::new(),
                expected,
            });
        };
        tracing::debug!("blank input accepted by the nullable first rule");
        self.finish(root, started)
    }

    fn finish(mut self, root: NodeId, started: Instant) -> Result<Forest, ParseError> {
        self.stats.gss_nodes = self.gss.len();
        self.stats.gss_edges = self.gss.edge_count();
        self.stats.sppf_nodes = self.nodes.len();
        self.stats.elapsed = started.elapsed();
        tracing::debug!(
            tokens = self.tokens.len(),
            gss_nodes = self.stats.gss_nodes,
            gss_edges = self.stats.gss_edges,
            sppf_nodes = self.stats.sppf_nodes,
            reductions = self.stats.reductions,
            rejected = self.stats.rejected,
            elapsed_us = u64::try_from(self.stats.elapsed.as_micros()).unwrap_or(u64::MAX),
            "parse finished"
        );

        let rejected = self.stats.rejected;
        let mut forest = Forest::new(
            self.nodes,
            root,
            self.tokens.clone(),
            self.compiled.shared_grammar().clone(),
            self.stats,
        );
        if self.config.run_default_transforms {
            let passes = if forest.is_ambiguous() || rejected > 0 {
                crate::sppf::default_passes(self.config.precedence, self.config.greedy_lists)
            } else {
                crate::sppf::structural_passes()
            };
            forest.transform_boxed(&passes)?;
        }
        Ok(forest)
    }

    fn begin_level(&mut self, level: u32) {
        self.level = level;
        self.walks.clear();
        self.zeros.clear();
        self.lookaheads = match self.tokens.get(level as usize) {
            Some(token) => self
                .compiled
                .matcher()
                .matching(token)
                .into_iter()
                .map(Lookahead::Terminal)
                .collect(),
            None => smallvec![Lookahead::End],
        };
        tracing::trace!(level, lookaheads = self.lookaheads.len(), "level");
    }

    /// Distinct actions of `state` under the current lookaheads
    fn actions(&self, state: StateId) -> SmallVec<[Action; 4]> {
        let automaton = self.compiled.automaton();
        let mut out: SmallVec<[Action; 4]> = SmallVec::new();
        for la in &self.lookaheads {
            for action in automaton.actions(state, *la) {
                if !out.contains(action) {
                    out.push(*action);
                }
            }
        }
        out
    }

    /// Queue the shifts and empty reductions of a node new at this level
    fn queue_node(&mut self, node: GssId) {
        let state = self.gss.node(node).state;
        for action in self.actions(state) {
            match action {
                Action::Shift(target) => {
                    if !self.shifts.contains(&(node, target)) {
                        self.shifts.push((node, target));
                    }
                }
                Action::Reduce { rule, length: 0, .. } => {
                    if self.zeros.insert((node, rule)) {
                        self.pending.push(Pending::Zero { node, rule });
                    }
                }
                Action::Reduce { .. } | Action::Accept => {}
            }
        }
    }

    /// Queue the non-empty reductions that start along the new edge
    /// `node -> target` labelled `label`
    fn queue_edge(&mut self, node: GssId, target: GssId, label: NodeId) -> Result<(), ParseError> {
        let state = self.gss.node(node).state;
        for action in self.actions(state) {
            let Action::Reduce { rule, alt, length } = action else {
                continue;
            };
            if length == 0 {
                continue;
            }
            let nulled = self.nulled_suffix(rule, alt, length)?;
            if length == 1 {
                let mut children: Children = smallvec![label];
                children.extend(nulled);
                self.pending.push(Pending::Complete {
                    node: target,
                    rule,
                    alt,
                    children,
                });
                continue;
            }
            let tail = match nulled {
                Some(part) => {
                    let left = self.gss.node(target).level;
                    self.intermediate(rule, alt, length - 1, left, [label, part])
                }
                None => label,
            };
            self.push_walk(target, rule, alt, length - 1, tail);
        }
        Ok(())
    }

    /// The right-nullable part after the first `length` symbols, if any
    fn nulled_suffix(&self, rule: RuleId, alt: u32, length: u32) -> Result<Option<NodeId>, ParseError> {
        if length as usize >= self.grammar.alternative(rule, alt as usize).len() {
            return Ok(None);
        }
        self.compiled
            .epsilon()
            .right_nullable(rule, alt, length)
            .map(Some)
            .ok_or_else(|| {
                ParseError::internal(format!(
                    "no nulled part for {} at {length}",
                    self.grammar.display_alternative(rule, alt as usize, None)
                ))
            })
    }

    fn push_walk(&mut self, node: GssId, rule: RuleId, alt: u32, remaining: u32, tail: NodeId) {
        if self.walks.insert((node, rule, alt, remaining, tail)) {
            self.pending.push(Pending::Walk {
                node,
                rule,
                alt,
                remaining,
                tail,
            });
        }
    }

    fn reduce(&mut self) -> Result<(), ParseError> {
        while let Some(item) = self.pending.pop() {
            match item {
                Pending::Zero { node, rule } => {
                    self.stats.reductions += 1;
                    self.reduce_empty(node, rule)?;
                }
                Pending::Walk {
                    node,
                    rule,
                    alt,
                    remaining,
                    tail,
                } => {
                    let edges = self.gss.node(node).edges.clone();
                    for (target, label) in edges {
                        if remaining == 1 {
                            self.pending.push(Pending::Complete {
                                node: target,
                                rule,
                                alt,
                                children: smallvec![label, tail],
                            });
                        } else {
                            let left = self.gss.node(target).level;
                            let next = self.intermediate(rule, alt, remaining - 1, left, [label, tail]);
                            self.push_walk(target, rule, alt, remaining - 1, next);
                        }
                    }
                }
                Pending::Complete {
                    node,
                    rule,
                    alt,
                    children,
                } => {
                    self.stats.reductions += 1;
                    self.complete(node, rule, alt, children)?;
                }
            }
        }
        Ok(())
    }

    fn reduce_empty(&mut self, node: GssId, rule: RuleId) -> Result<(), ParseError> {
        let label = self.compiled.epsilon().symbol(rule).ok_or_else(|| {
            ParseError::internal(format!("<{}> reduced to nothing but is not nullable", self.grammar.rule(rule).name))
        })?;
        let goto = self.goto(node, rule)?;
        let (target, created) = self.gss.get_or_insert(self.level, goto)?;
        tracing::trace!(rule = %self.grammar.rule(rule).name, level = self.level, "empty reduction");
        // edges made by empty reductions never start longer reductions
        if self.gss.add_edge(target, node, label) && created {
            self.queue_node(target);
        }
        Ok(())
    }

    fn complete(&mut self, node: GssId, rule: RuleId, alt: u32, children: Children) -> Result<(), ParseError> {
        let left = self.gss.node(node).level;
        let symbol = self.symbol(rule, left);
        self.add_alternative(symbol, rule, alt, (left, self.level), children);
        if self.nodes[symbol.index()].children.is_empty() && !self.waiting.contains(&symbol) {
            return Ok(());
        }

        let goto = self.goto(node, rule)?;
        let (target, created) = self.gss.get_or_insert(self.level, goto)?;
        if self.gss.add_edge(target, node, symbol) {
            tracing::trace!(
                rule = %self.grammar.rule(rule).name,
                left,
                right = self.level,
                "reduction"
            );
            if created {
                self.queue_node(target);
            }
            self.queue_edge(target, node, symbol)?;
        }
        Ok(())
    }

    fn goto(&self, node: GssId, rule: RuleId) -> Result<StateId, ParseError> {
        let state = self.gss.node(node).state;
        self.compiled.automaton().goto(state, rule).ok_or_else(|| {
            ParseError::internal(format!(
                "state {state} has no goto on <{}>",
                self.grammar.rule(rule).name
            ))
        })
    }

    fn shift(&mut self) -> Result<(), ParseError> {
        let index = self.level;
        let label = self.terminal(index);
        for (node, target) in std::mem::take(&mut self.shifts) {
            let (next, _) = self.gss.get_or_insert(index + 1, target)?;
            self.gss.add_edge(next, node, label);
        }
        tracing::trace!(token = index, stacks = self.gss.level(index + 1).len(), "shift");
        Ok(())
    }

    fn push_node(&mut self, kind: NodeKind, span: Option<(u32, u32)>) -> NodeId {
        let id = NodeId(u32::try_from(self.nodes.len()).unwrap_or(u32::MAX));
        self.nodes.push(SppfNode::new(kind, span));
        id
    }

    fn terminal(&mut self, index: u32) -> NodeId {
        if let Some(id) = self.terminals[index as usize] {
            return id;
        }
        let id = self.push_node(NodeKind::Terminal { token: index }, Some((index, index + 1)));
        self.terminals[index as usize] = Some(id);
        id
    }

    fn symbol(&mut self, rule: RuleId, left: u32) -> NodeId {
        let key = (rule, left, self.level);
        if let Some(id) = self.symbols.get(&key) {
            return *id;
        }
        let id = self.push_node(NodeKind::Symbol { rule }, Some((left, self.level)));
        self.symbols.insert(key, id);
        id
    }

    /// The intermediate for symbols `from..` spanning `left..level`, with
    /// `children` packed under it
    fn intermediate(&mut self, rule: RuleId, alt: u32, from: u32, left: u32, children: [NodeId; 2]) -> NodeId {
        let key = (rule, alt, from, left, self.level);
        let id = match self.intermediates.get(&key) {
            Some(id) => *id,
            None => {
                let id = self.push_node(NodeKind::Intermediate { rule, alt, from }, Some((left, self.level)));
                self.intermediates.insert(key, id);
                id
            }
        };
        if self.packed.insert((id, alt, children[0], Some(children[1]))) {
            let packed = self.push_node(NodeKind::Packed { rule, alt }, None);
            self.nodes[packed.index()].children = SmallVec::from_slice(&children);
            self.nodes[id.index()].children.push(packed);
        }
        id
    }

    /// Offer a derivation to `symbol`; it is packed under it, or deferred,
    /// unless it is already there or disambiguation turns it down
    fn add_alternative(&mut self, symbol: NodeId, rule: RuleId, alt: u32, span: (u32, u32), children: Children) {
        let key = (symbol, alt, children[0], children.get(1).copied());
        if self.packed.contains(&key) || self.rejected.contains(&key) {
            return;
        }
        if self.has_dead_child(&children, self.level) {
            self.rejected.insert(key);
            return;
        }

        let sequences = sequences_of(&self.nodes, &children, SEQUENCE_CAP);
        let candidate = Candidate {
            grammar: self.grammar,
            tokens: self.tokens,
            nodes: &self.nodes,
            node: symbol,
            rule,
            alt,
            span,
            sequences: &sequences,
            level: self.level,
        };
        match self.pipeline.judge(&candidate) {
            Verdict::Accept => {
                self.packed.insert(key);
                self.pack(symbol, rule, alt, children);
            }
            Verdict::Defer => {
                self.packed.insert(key);
                self.waiting.insert(symbol);
                self.deferred.push(Deferred {
                    symbol,
                    rule,
                    alt,
                    span,
                    children,
                });
            }
            Verdict::Reject => self.reject(key, rule, alt, span),
        }
    }

    /// Judge the derivations held back at this level, now that no node
    /// ending here can gain another one
    fn settle(&mut self) {
        if self.deferred.is_empty() {
            return;
        }
        let mut deferred = std::mem::take(&mut self.deferred);
        self.waiting.clear();
        // operands are narrower than the expressions built on them
        deferred.sort_by_key(|d| d.span.1 - d.span.0);
        let (count, before) = (deferred.len(), self.stats.rejected);
        for Deferred {
            symbol,
            rule,
            alt,
            span,
            children,
        } in deferred
        {
            let key = (symbol, alt, children[0], children.get(1).copied());
            if self.has_dead_child(&children, self.level + 1) {
                self.packed.remove(&key);
                self.rejected.insert(key);
                continue;
            }
            let sequences = sequences_of(&self.nodes, &children, SEQUENCE_CAP);
            let candidate = Candidate {
                grammar: self.grammar,
                tokens: self.tokens,
                nodes: &self.nodes,
                node: symbol,
                rule,
                alt,
                span,
                sequences: &sequences,
                level: self.level + 1,
            };
            match self.pipeline.judge(&candidate) {
                Verdict::Accept => self.pack(symbol, rule, alt, children),
                Verdict::Reject | Verdict::Defer => {
                    self.packed.remove(&key);
                    self.reject(key, rule, alt, span);
                }
            }
        }
        tracing::trace!(
            level = self.level,
            deferred = count,
            rejected = self.stats.rejected - before,
            "settled operator derivations"
        );
    }

    fn pack(&mut self, symbol: NodeId, rule: RuleId, alt: u32, children: Children) {
        let packed = self.push_node(NodeKind::Packed { rule, alt }, None);
        self.nodes[packed.index()].children = children;
        self.nodes[symbol.index()].children.push(packed);
    }

    fn reject(&mut self, key: PackedKey, rule: RuleId, alt: u32, span: (u32, u32)) {
        tracing::trace!(
            alternative = %self.grammar.display_alternative(rule, alt as usize, None),
            left = span.0,
            right = span.1,
            "alternative rejected"
        );
        self.rejected.insert(key);
        self.stats.rejected += 1;
    }

    /// A child symbol that ended before `level` and has no derivation
    /// left can only lead to dead packed nodes
    fn has_dead_child(&self, children: &[NodeId], level: u32) -> bool {
        children.iter().any(|child| {
            let node = &self.nodes[child.index()];
            matches!(node.kind, NodeKind::Symbol { .. })
                && node.children.is_empty()
                && node.span.is_some_and(|(_, right)| right < level)
        })
    }

    /// Root of the first rule, read off the stack once an accepting state
    /// is reached at the last level
    fn accepted_root(&self, start: GssId, n: u32) -> Option<NodeId> {
        let automaton = self.compiled.automaton();
        let accepting = self
            .gss
            .level(n)
            .iter()
            .find(|id| automaton.state(self.gss.node(**id).state).accepting)?;
        self.gss.node(*accepting).edges.iter().find_map(|(before_eof, _)| {
            self.gss
                .node(*before_eof)
                .edges
                .iter()
                .find(|(target, _)| *target == start)
                .map(|(_, label)| *label)
        })
    }

    /// The error for a parse that could not get past token `index`
    fn failure(&self, index: u32) -> ParseError {
        let states: Vec<StateId> = self
            .gss
            .level(index)
            .iter()
            .map(|id| self.gss.node(*id).state)
            .collect();
        let expected = self.expected_names(&states);
        let token = self.tokens.get(index as usize);
        tracing::debug!(token = index, expected = expected.len(), "parse failed");
        ParseError::UnexpectedToken {
            position: token.map(|t| t.position).unwrap_or_default(),
            found: token.map_or_else(|| "end of input".to_string(), |t| t.describe()),
            near: self.tokens.near_text(index as usize),
            expected,
        }
    }

    fn expected_names(&self, states: &[StateId]) -> Vec<String> {
        let automaton = self.compiled.automaton();
        let eof = self.grammar.eof_terminal();
        let mut names: Vec<String> = states
            .iter()
            .flat_map(|state| automaton.state(*state).expected())
            .filter_map(|la| match la {
                Lookahead::Terminal(id) if id == eof => Some("end of input".to_string()),
                Lookahead::Terminal(id) => Some(self.grammar.terminal(id).to_string()),
                Lookahead::End => None,
            })
            .collect();
        names.sort();
        names.dedup();
        names
    }
}
