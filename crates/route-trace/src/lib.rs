//! # Route Trace
//!
//! Physical-layer connectivity tracing. Terminal equipment and cables form an
//! overlay graph anchored to the route network; a trace walks that graph from
//! a terminal or span segment and enriches every terminal it passes with
//! names, cable descriptions, lengths and role flags.

pub mod graph;
pub mod model;
pub mod network;
pub mod tracer;
pub mod view;

pub use graph::{UtilityGraph, UtilityGraphElement, UtilityGraphSegmentRef, UtilityGraphTerminal};
pub use model::UtilityNetworkDocument;
pub use network::{TerminalRef, UtilityNetwork};
pub use tracer::{TraceOutcome, UtilityGraphTrace, UtilityGraphTracer};
pub use view::{get_connectivity_trace_view, ConnectivityTraceHop, ConnectivityTraceView};

use route_core::ElementId;
use thiserror::Error;
use uuid::Uuid;

/// Errors raised while assembling the overlay graph.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphBuildError {
    #[error("Element {0} already exists in the utility graph")]
    DuplicateElement(Uuid),

    #[error("Edge {edge} references unknown terminal {terminal}")]
    UnknownTerminal { edge: Uuid, terminal: Uuid },

    #[error("Terminal {terminal} sits in route node {actual}, expected {expected}")]
    TerminalOutsideNode {
        terminal: Uuid,
        expected: ElementId,
        actual: ElementId,
    },
}

/// Errors raised while loading a utility network.
#[derive(Debug, Error)]
pub enum UtilityNetworkError {
    #[error("Invalid utility network document: {0}")]
    InvalidDocument(#[from] serde_json::Error),

    #[error("Graph error: {0}")]
    Graph(#[from] GraphBuildError),

    #[error("Equipment {0} already registered")]
    DuplicateEquipment(Uuid),

    #[error("Unknown equipment: {0}")]
    UnknownEquipment(Uuid),
}

/// Result type for utility network operations.
pub type Result<T> = std::result::Result<T, UtilityNetworkError>;
