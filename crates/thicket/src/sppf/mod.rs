//! # Shared Packed Parse Forests
//!
//! The output of a parse. All derivations of the input are kept in one
//! arena-allocated graph:
//!
//! - a **symbol** node says a rule was recognised over a token span; each
//!   of its **packed** children is one way of deriving it
//! - **intermediate** nodes hold the tail of a right-hand side, so packed
//!   nodes never have more than two children while parsing
//! - **terminal** and **epsilon** nodes are the leaves
//! - **right-nullable parts** stand in for a suffix of symbols that derived
//!   nothing
//!
//! Identical sub-derivations are shared, which keeps the forest polynomial
//! in the input length even when the number of trees is exponential.
//!
//! After parsing, [`ForestPass`]es prune and tidy the forest, and
//! [`Forest`] hands out individual [`ParseTree`]s on demand.

mod forest;
mod node;
mod transform;
mod tree;

pub use forest::{Forest, ParseStats};
pub use node::{reachable, sequences, sequences_of, NodeId, NodeKind, Sequence, SppfNode};
pub use transform::{
    default_passes, structural_passes, Collapse, DedupeEquivalent, ForestPass, LinkParents, PassContext,
    PreferLongestList, PruneDead, ResolvePrecedence,
};
pub use tree::{ParseTree, TreeLabel};
