//! # Route Storage
//!
//! Versioned route network graph and everything that mutates or queries it:
//!
//! - [`mvcc`] / [`transaction`] / [`graph_store`] - version chains, buffered
//!   transactions and the snapshot-readable graph store
//! - [`events`] / [`projection`] / [`split`] - domain events, their projection
//!   onto the store and post-commit split repair intents
//! - [`walk`] / [`interest_index`] - walk canonicalization and the interest
//!   registry with its reverse index
//! - [`search`] - nearest-node and shortest-path searches
//! - [`service`] - the command/query facade tying it together
//! - [`config`] / [`logging`] - ambient setup

pub mod config;
pub mod events;
pub mod graph_store;
pub mod interest_index;
pub mod logging;
pub mod mvcc;
pub mod projection;
pub mod search;
pub mod service;
pub mod split;
pub mod transaction;
pub mod walk;

pub use config::RouteNetworkConfig;
pub use events::{EventLogRecord, RouteNetworkEditOperation, RouteNetworkEvent};
pub use graph_store::{
    GraphSnapshot, GraphStats, RouteNetworkGraphStore, RouteNetworkGraphStoreBuilder, StageError,
    StageOutcome, Topology,
};
pub use interest_index::InterestIndex;
pub use projection::{PostCommitObserver, ProjectionRegistry, RouteNetworkProjection};
pub use search::{FindNearestRouteNodesQuery, NearestRouteNodeHit, RoutePath};
pub use service::{
    EditOutcome, RelatedInterestFilter, RepairResult, RouteNetworkDetails,
    RouteNetworkDetailsQuery, RouteNetworkElementDetails, RouteNetworkService, SeedReport,
};
pub use split::{RepairIntent, SegmentSplit, SplitError};
pub use transaction::{GraphMutation, Transaction, TransactionError, TransactionManager, WriteMode};
pub use walk::{ValidatedRouteNetworkWalk, WalkValidator};
