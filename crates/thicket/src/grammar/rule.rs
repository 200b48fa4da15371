use super::symbol::{Associativity, Symbol};
use compact_str::CompactString;
use smallvec::SmallVec;
use std::hash::BuildHasher;

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// Where a rule came from.
///
/// Synthetic kinds are introduced while desugaring EBNF and while splicing
/// lexer classes; disambiguation treats some of them specially.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum RuleKind {
    /// Written by the grammar author
    Normal,
    /// `X+`: `[LIST] ::= X | X [LIST]`
    List,
    /// `X?`: `[OPT] ::= X | ""`
    Optional,
    /// A parenthesised group with more than one alternative
    Group,
    /// `Token-<class>`, one per lexer class
    TokenClass,
    /// The synthetic `#S ::= <first> Token-EOF`
    Start,
}

impl RuleKind {
    #[must_use]
    pub const fn is_synthetic(self) -> bool {
        !matches!(self, Self::Normal)
    }

    /// Rules whose alternatives greedy list matching arbitrates
    #[must_use]
    pub const fn is_repetition(self) -> bool {
        matches!(self, Self::List | Self::Optional)
    }
}

/// The operator an alternative is headed by, if any
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Operator {
    /// Position of the operator terminal in the alternative
    pub index: usize,
    pub precedence: u32,
    pub associativity: Associativity,
}

/// One right-hand side of a rule
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Alternative {
    pub symbols: SmallVec<[Symbol; 4]>,
    /// Smallest index from which every remaining symbol is nullable
    pub nullable_from: usize,
    pub operator: Option<Operator>,
}

impl Alternative {
    #[must_use]
    pub fn new(symbols: impl IntoIterator<Item = Symbol>) -> Self {
        let symbols: SmallVec<[Symbol; 4]> = symbols.into_iter().collect();
        let nullable_from = symbols.len();
        Self {
            symbols,
            nullable_from,
            operator: None,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// True if every symbol can derive the empty string
    #[must_use]
    pub const fn is_nullable(&self) -> bool {
        self.nullable_from == 0
    }
}

/// Content-derived identity of a rule, stable across separately built
/// grammars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct RuleIdentity(pub u64);

/// Fixed keys so identities agree between processes
const IDENTITY_SEEDS: [u64; 4] = [
    0x7468_6963_6b65_7431,
    0x9e37_79b9_7f4a_7c15,
    0xc2b2_ae3d_27d4_eb4f,
    0x1656_67b1_9e37_79f9,
];

impl RuleIdentity {
    #[must_use]
    pub fn of(name: &str) -> Self {
        let [k0, k1, k2, k3] = IDENTITY_SEEDS;
        let state = ahash::RandomState::with_seeds(k0, k1, k2, k3);
        Self(BuildHasher::hash_one(&state, name))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Rule {
    pub name: CompactString,
    pub kind: RuleKind,
    pub alternatives: Vec<Alternative>,
    pub nullable: bool,
    pub identity: RuleIdentity,
}

impl Rule {
    #[must_use]
    pub fn new(name: impl Into<CompactString>, kind: RuleKind) -> Self {
        let name = name.into();
        let identity = RuleIdentity::of(&name);
        Self {
            name,
            kind,
            alternatives: Vec::new(),
            nullable: false,
            identity,
        }
    }

    #[must_use]
    pub fn alternative(&self, index: usize) -> Option<&Alternative> {
        self.alternatives.get(index)
    }
}
