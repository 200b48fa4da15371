//! Graph-structured stack.
//!
//! One node per `(input position, automaton state)`. Edges point back
//! towards the start of the input and are labelled with the forest node
//! for the symbol recognised between their ends. Stacks that reach the
//! same state at the same position share a node, which keeps the stack
//! polynomial in the input length.

use crate::error::ParseError;
use crate::lalr::StateId;
use crate::sppf::NodeId;
use hashbrown::HashMap;
use smallvec::SmallVec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct GssId(pub(crate) u32);

impl GssId {
    pub(crate) const fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
pub(crate) struct GssNode {
    pub(crate) state: StateId,
    pub(crate) level: u32,
    /// `(target, label)`, target always at this level or before
    pub(crate) edges: SmallVec<[(GssId, NodeId); 2]>,
}

#[derive(Debug)]
pub(crate) struct GraphStack {
    nodes: Vec<GssNode>,
    index: HashMap<(u32, StateId), GssId, ahash::RandomState>,
    levels: Vec<Vec<GssId>>,
    edges: usize,
    limit: usize,
}

impl GraphStack {
    pub(crate) fn new(levels: usize, limit: usize) -> Self {
        Self {
            nodes: Vec::new(),
            index: HashMap::with_hasher(ahash::RandomState::new()),
            levels: vec![Vec::new(); levels],
            edges: 0,
            limit,
        }
    }

    pub(crate) fn node(&self, id: GssId) -> &GssNode {
        &self.nodes[id.index()]
    }

    pub(crate) fn find(&self, level: u32, state: StateId) -> Option<GssId> {
        self.index.get(&(level, state)).copied()
    }

    /// The node for `state` at `level`, and whether it was just created
    pub(crate) fn get_or_insert(&mut self, level: u32, state: StateId) -> Result<(GssId, bool), ParseError> {
        if let Some(id) = self.find(level, state) {
            return Ok((id, false));
        }
        if self.nodes.len() >= self.limit {
            return Err(ParseError::StackLimit { limit: self.limit });
        }
        let id = GssId(u32::try_from(self.nodes.len()).map_err(|_| ParseError::StackLimit { limit: self.limit })?);
        self.nodes.push(GssNode {
            state,
            level,
            edges: SmallVec::new(),
        });
        self.index.insert((level, state), id);
        let slot = level as usize;
        if slot >= self.levels.len() {
            self.levels.resize(slot + 1, Vec::new());
        }
        self.levels[slot].push(id);
        Ok((id, true))
    }

    /// Add an edge; false if an identical one was already there
    pub(crate) fn add_edge(&mut self, from: GssId, to: GssId, label: NodeId) -> bool {
        let edges = &mut self.nodes[from.index()].edges;
        if edges.contains(&(to, label)) {
            return false;
        }
        edges.push((to, label));
        self.edges += 1;
        true
    }

    /// Nodes created at `level`, in creation order
    pub(crate) fn level(&self, level: u32) -> &[GssId] {
        self.levels.get(level as usize).map_or(&[], Vec::as_slice)
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) const fn edge_count(&self) -> usize {
        self.edges
    }
}
