//! # Route Core
//!
//! Core types for the route network.
//!
//! This crate provides the fundamental building blocks:
//! - [`ElementId`] and [`InterestId`] - Type-safe identifiers
//! - [`Version`] - Commit counter of the versioned graph store
//! - [`element`] - Route nodes, route segments and their metadata records
//! - [`interest`] - Interests (claims) registered against the route network
//! - [`RouteNetworkError`] - Error taxonomy with stable codes

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

pub mod element;
pub mod interest;

pub use element::{
    Envelope, LifecycleInfo, MappingInfo, NamingInfo, RouteNetworkElement,
    RouteNetworkElementKind, RouteNode, RouteNodeFunction, RouteNodeInfo, RouteNodeKind,
    RouteSegment, RouteSegmentInfo, RouteSegmentKind, SafetyInfo, ElementMetadata,
    UNCLASSIFIED_FUNCTION_RANK,
};
pub use interest::{InterestKind, InterestRelation, RelationKind, RouteNetworkInterest};

/// Monotonically increasing commit counter of the graph store.
///
/// Version 0 is the empty graph; every committed transaction that changes
/// anything produces the next version.
pub type Version = u64;

// =============================================================================
// Identifiers (Newtypes for type safety)
// =============================================================================

/// Identifier of a route network element (node or segment).
///
/// Nodes and segments share one id space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(pub Uuid);

impl ElementId {
    /// Creates a new random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the wrapped UUID.
    #[inline]
    pub const fn as_uuid(self) -> Uuid {
        self.0
    }

    /// True for the all-zero UUID, which is never a valid element.
    #[inline]
    pub fn is_nil(self) -> bool {
        self.0.is_nil()
    }
}

impl Default for ElementId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for ElementId {
    #[inline]
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// Identifier of an interest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InterestId(pub Uuid);

impl InterestId {
    /// Creates a new random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the wrapped UUID.
    #[inline]
    pub const fn as_uuid(self) -> Uuid {
        self.0
    }

    #[inline]
    pub fn is_nil(self) -> bool {
        self.0.is_nil()
    }
}

impl Default for InterestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InterestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for InterestId {
    #[inline]
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Stable error codes for programmatic handling.
///
/// The string form returned by [`ErrorCode::as_str`] is part of the public
/// contract and never changes between releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    EmptyWalk,
    EmptyId,
    UnknownElement,
    NotAdjacent,
    AmbiguousNodePair,
    SegmentRepeated,
    NotANode,
    InterestAlreadyExists,
    InterestNotFound,
    ElementNotFound,
    StructuralInconsistency,
    InvalidEventLog,
    Transaction,
}

impl ErrorCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EmptyWalk => "INVALID_WALK_EMPTY",
            Self::EmptyId => "INVALID_WALK_EMPTY_ID",
            Self::UnknownElement => "INVALID_WALK_UNKNOWN_ELEMENT",
            Self::NotAdjacent => "INVALID_WALK_NOT_ADJACENT",
            Self::AmbiguousNodePair => "INVALID_WALK_AMBIGUOUS_NODE_PAIR",
            Self::SegmentRepeated => "INVALID_WALK_SEGMENT_REPEATED",
            Self::NotANode => "INVALID_INTEREST_NOT_A_NODE",
            Self::InterestAlreadyExists => "INTEREST_ALREADY_EXISTS",
            Self::InterestNotFound => "INTEREST_NOT_FOUND",
            Self::ElementNotFound => "ELEMENT_NOT_FOUND",
            Self::StructuralInconsistency => "STRUCTURAL_INCONSISTENCY",
            Self::InvalidEventLog => "INVALID_EVENT_LOG",
            Self::Transaction => "TRANSACTION_FAILED",
        }
    }

    /// Human-readable category of the code.
    pub const fn category(self) -> &'static str {
        match self {
            Self::EmptyWalk
            | Self::EmptyId
            | Self::UnknownElement
            | Self::NotAdjacent
            | Self::AmbiguousNodePair
            | Self::SegmentRepeated
            | Self::NotANode
            | Self::InvalidEventLog => "validation",
            Self::InterestNotFound | Self::ElementNotFound => "not_found",
            Self::InterestAlreadyExists => "conflict",
            Self::StructuralInconsistency => "structural",
            Self::Transaction => "internal",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reasons a walk is rejected by the walk validator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalkError {
    #[error("Walk contains no elements")]
    EmptyWalk,

    #[error("Walk contains an empty id at position {0}")]
    EmptyId(usize),

    #[error("Element {0} does not exist in the route network")]
    UnknownElement(ElementId),

    #[error("Elements {0} and {1} are not adjacent")]
    NotAdjacent(ElementId, ElementId),

    #[error("Nodes {0} and {1} are connected by more than one segment")]
    AmbiguousNodePair(ElementId, ElementId),

    #[error("Segment {0} is repeated consecutively")]
    SegmentRepeated(ElementId),
}

impl WalkError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::EmptyWalk => ErrorCode::EmptyWalk,
            Self::EmptyId(_) => ErrorCode::EmptyId,
            Self::UnknownElement(_) => ErrorCode::UnknownElement,
            Self::NotAdjacent(..) => ErrorCode::NotAdjacent,
            Self::AmbiguousNodePair(..) => ErrorCode::AmbiguousNodePair,
            Self::SegmentRepeated(_) => ErrorCode::SegmentRepeated,
        }
    }
}

/// Errors returned by route network commands and queries.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RouteNetworkError {
    /// Walk failed validation; nothing was mutated.
    #[error("Invalid walk: {0}")]
    InvalidWalk(#[from] WalkError),

    /// A node of interest must reference a route node.
    #[error("Element {0} is not a route node")]
    NotANode(ElementId),

    #[error("Interest {0} already exists")]
    InterestAlreadyExists(InterestId),

    #[error("Interest {0} not found")]
    InterestNotFound(InterestId),

    #[error("Route network element {0} not found")]
    ElementNotFound(ElementId),

    /// An event references something the graph does not contain.
    #[error("Structural inconsistency: {0}")]
    StructuralInconsistency(String),

    #[error("Invalid event log: {0}")]
    InvalidEventLog(String),

    #[error("Transaction error: {0}")]
    Transaction(String),
}

impl RouteNetworkError {
    /// Returns the stable error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidWalk(e) => e.code(),
            Self::NotANode(_) => ErrorCode::NotANode,
            Self::InterestAlreadyExists(_) => ErrorCode::InterestAlreadyExists,
            Self::InterestNotFound(_) => ErrorCode::InterestNotFound,
            Self::ElementNotFound(_) => ErrorCode::ElementNotFound,
            Self::StructuralInconsistency(_) => ErrorCode::StructuralInconsistency,
            Self::InvalidEventLog(_) => ErrorCode::InvalidEventLog,
            Self::Transaction(_) => ErrorCode::Transaction,
        }
    }

    /// True for failures caused by the caller's input (nothing was mutated).
    pub fn is_validation(&self) -> bool {
        self.code().category() == "validation"
    }
}

/// Result type for route network operations.
pub type Result<T> = std::result::Result<T, RouteNetworkError>;

// =============================================================================
// Tests
// =============================================================================
