//! Turns a raw trace into an ordered, enriched hop list.
//!
//! Enrichment never fails a trace: anything that cannot be resolved (a
//! missing specification, an unnamed node, a cable whose walk is gone)
//! degrades to a blank field and the trace carries on.

use crate::graph::{UtilityGraphElement, UtilityGraphSegmentRef, UtilityGraphTerminal};
use crate::network::{TerminalRef, UtilityNetwork};
use crate::tracer::UtilityGraphTracer;
use route_core::{ElementId, Version};
use route_storage::config::TraceConfig;
use route_storage::{GraphSnapshot, RouteNetworkService};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

/// One terminal-level stop in a connectivity trace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectivityTraceHop {
    /// 1-based position in the trace.
    pub hop_seq_no: usize,
    pub terminal_id: Uuid,
    pub route_node_id: ElementId,
    pub node: String,
    pub equipment: String,
    pub terminal_structure: String,
    pub terminal: String,
    pub connection_info: String,
    /// Meters travelled from the first hop to this one.
    pub total_length: f64,
    pub is_line_termination: bool,
    pub is_customer_splitter: bool,
    pub is_flex_point: bool,
    pub is_central_office: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectivityTraceView {
    pub route_node_id: ElementId,
    pub start_id: Uuid,
    /// Route network version the trace was enriched against.
    pub version: Version,
    pub hops: Vec<ConnectivityTraceHop>,
}

impl ConnectivityTraceView {
    pub fn is_connected(&self) -> bool {
        !self.hops.is_empty()
    }

    pub fn total_length(&self) -> f64 {
        self.hops.last().map_or(0.0, |h| h.total_length)
    }
}

/// Traces from `terminal_or_segment_id` and enriches every terminal passed.
///
/// An unknown start id gives a view with no hops.
pub fn get_connectivity_trace_view(
    service: &RouteNetworkService,
    network: &UtilityNetwork,
    route_node_id: ElementId,
    terminal_or_segment_id: Uuid,
) -> ConnectivityTraceView {
    let config = &service.config().trace;
    let snapshot = service.snapshot();
    let outcome = UtilityGraphTracer::new(network.graph(), snapshot)
        .with_max_hops(config.max_hops)
        .trace(terminal_or_segment_id);

    let enricher = HopEnricher {
        service,
        network,
        snapshot,
        config,
    };
    let elements = outcome.ordered();
    let mut hops = Vec::new();
    let mut total_length = 0.0;
    for (i, id) in elements.iter().enumerate() {
        match network.graph().get(*id) {
            Some(UtilityGraphElement::Terminal(terminal)) => {
                let following = elements.get(i + 1).and_then(|id| network.graph().get(*id));
                hops.push(enricher.hop(hops.len() + 1, terminal, following, total_length));
            }
            Some(edge) => total_length += enricher.edge_length(edge),
            None => {}
        }
    }

    debug!(
        start = %terminal_or_segment_id,
        hops = hops.len(),
        total_length,
        "Connectivity trace built"
    );
    ConnectivityTraceView {
        route_node_id,
        start_id: terminal_or_segment_id,
        version: snapshot.version(),
        hops,
    }
}

struct HopEnricher<'a> {
    service: &'a RouteNetworkService,
    network: &'a UtilityNetwork,
    snapshot: GraphSnapshot<'a>,
    config: &'a TraceConfig,
}

impl HopEnricher<'_> {
    fn hop(
        &self,
        hop_seq_no: usize,
        terminal: &UtilityGraphTerminal,
        following: Option<&UtilityGraphElement>,
        total_length: f64,
    ) -> ConnectivityTraceHop {
        let location = self.network.locate_terminal(terminal.id);
        if location.is_none() && !terminal.is_dummy_end {
            debug!(terminal = %terminal.id, "Terminal has no equipment record");
        }
        let catalog = self.network.catalog();

        let equipment = if terminal.is_dummy_end {
            self.config.loose_end_marker.clone()
        } else {
            location.map(|l| self.equipment_label(l)).unwrap_or_default()
        };
        let terminal_structure = location.map(|l| l.structure.name.clone()).unwrap_or_default();

        let node = self
            .snapshot
            .get_node(terminal.route_node_id)
            .and_then(|n| n.name().map(str::to_string))
            .unwrap_or_else(|| {
                let label = format!("{equipment} {terminal_structure}");
                label.trim().to_string()
            });

        let connection_info = match following {
            Some(UtilityGraphElement::SpanSegment(segment)) => self.cable_description(segment),
            Some(UtilityGraphElement::Link(_)) => self.config.jumper_marker.clone(),
            Some(UtilityGraphElement::Terminal(_)) => String::new(),
            None => location
                .and_then(|l| l.equipment.address.as_ref())
                .and_then(|a| a.display())
                .map(str::to_string)
                .unwrap_or_default(),
        };

        let is_line_termination = location
            .and_then(|l| catalog.terminal_equipment(l.equipment.spec_id))
            .is_some_and(|s| s.is_line_termination);
        let is_customer_splitter = location
            .and_then(|l| catalog.terminal_structure(l.structure.spec_id))
            .is_some_and(|s| s.is_customer_splitter);

        ConnectivityTraceHop {
            hop_seq_no,
            terminal_id: terminal.id,
            route_node_id: terminal.route_node_id,
            node,
            equipment,
            terminal_structure,
            terminal: location.map(|l| l.terminal.name.clone()).unwrap_or_default(),
            connection_info,
            total_length,
            is_line_termination,
            is_customer_splitter,
            is_flex_point: self.is_flex_point(terminal.route_node_id),
            is_central_office: self.is_central_office(terminal.route_node_id),
        }
    }

    fn equipment_label(&self, location: TerminalRef<'_>) -> String {
        location
            .equipment
            .name
            .clone()
            .or_else(|| {
                self.network
                    .catalog()
                    .terminal_equipment(location.equipment.spec_id)
                    .map(|s| s.name.clone())
            })
            .unwrap_or_default()
    }

    fn cable_description(&self, segment: &UtilityGraphSegmentRef) -> String {
        let Some(span) = self.network.span_equipment(segment.span_equipment_id) else {
            debug!(span_equipment = %segment.span_equipment_id, "Unknown span equipment");
            return format!("fiber {}", segment.fiber_number);
        };
        match self.network.catalog().span_equipment(span.spec_id) {
            Some(spec) => format!(
                "{} ({}) fiber {}",
                span.name, spec.fiber_count, segment.fiber_number
            ),
            None => format!("{} fiber {}", span.name, segment.fiber_number),
        }
    }

    fn edge_length(&self, edge: &UtilityGraphElement) -> f64 {
        match edge {
            UtilityGraphElement::SpanSegment(segment) => self.span_length(segment),
            other => other.link_length(),
        }
    }

    /// Sum of route segment lengths between the span segment's end nodes,
    /// along the walk of interest its cable follows.
    fn span_length(&self, segment: &UtilityGraphSegmentRef) -> f64 {
        let Some(span) = self.network.span_equipment(segment.span_equipment_id) else {
            return 0.0;
        };
        let walk = match self.service.get_interest(span.walk_of_interest_id) {
            Ok(interest) => interest.route_network_element_refs,
            Err(e) => {
                debug!(span = %span.id, error = %e, "Cable walk not resolvable");
                return 0.0;
            }
        };
        let from = walk.iter().position(|id| *id == segment.from_route_node_id);
        let to = walk.iter().position(|id| *id == segment.to_route_node_id);
        let (Some(from), Some(to)) = (from, to) else {
            debug!(segment = %segment.id, "Span segment ends not on cable walk");
            return 0.0;
        };
        walk[from.min(to)..=from.max(to)]
            .iter()
            .filter_map(|id| self.snapshot.get_segment(*id))
            .map(|s| s.length())
            .sum()
    }

    fn is_flex_point(&self, route_node_id: ElementId) -> bool {
        let central_kind = self
            .snapshot
            .get_node(route_node_id)
            .and_then(|n| n.kind())
            .is_some_and(|k| k.is_central_office());
        if central_kind {
            return true;
        }
        let catalog = self.network.catalog();
        self.network.rack_equipment(route_node_id).any(|e| {
            e.structures.iter().any(|s| {
                catalog
                    .terminal_structure(s.spec_id)
                    .is_some_and(|spec| spec.is_customer_splitter)
            })
        })
    }

    fn is_central_office(&self, route_node_id: ElementId) -> bool {
        let catalog = self.network.catalog();
        self.network.rack_equipment(route_node_id).any(|e| {
            catalog
                .terminal_equipment(e.spec_id)
                .is_some_and(|spec| spec.is_line_termination)
        })
    }
}
