//! # routenet CLI
//!
//! Replays a route network event log and runs queries against it.
//!
//! ## Usage
//!
//! ```bash
//! routenet stats network.json
//! routenet validate network.json <element-id>...
//! routenet path network.json <from-node> <to-node>
//! routenet nearest network.json <node> [max_hits] [radius]
//! routenet trace network.json utility.json <route-node> <terminal-or-segment>
//! routenet --config routenet.toml stats network.json
//! ```

use colored::Colorize;
use route_core::ElementId;
use route_storage::{logging, RouteNetworkConfig, RouteNetworkService};
use route_trace::{get_connectivity_trace_view, UtilityNetwork};
use std::time::Instant;
use tracing::info;
use uuid::Uuid;

// =============================================================================
// Main Entry Point
// =============================================================================

fn main() {
    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let config_path = take_option(&mut args, "--config");

    let config = match RouteNetworkConfig::load(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => fail(&format!("Failed to load configuration: {e}")),
    };
    logging::init_from_config(&config.logging);

    match args.first().map(String::as_str) {
        Some("stats") => run_stats(&args, config),
        Some("validate") => run_validate(&args, config),
        Some("path") => run_path(&args, config),
        Some("nearest") => run_nearest(&args, config),
        Some("trace") => run_trace(&args, config),
        Some("--help") | Some("-h") | None => print_help(),
        Some(other) => fail(&format!("Unknown command '{other}'. Use --help.")),
    }
}

fn print_help() {
    println!("{}", "routenet".bold().cyan());
    println!("Route network topology, interests and connectivity tracing\n");
    println!("USAGE:");
    println!("    routenet [--config <FILE>] <COMMAND> <EVENT_LOG> [ARGS]\n");
    println!("COMMANDS:");
    println!("    stats <LOG>                            Node/segment counts after replay");
    println!("    validate <LOG> <ID>...                 Validate a walk of interest");
    println!("    path <LOG> <FROM> <TO>                 Shortest path between two route nodes");
    println!("    nearest <LOG> <NODE> [HITS] [RADIUS]   Nearest route nodes within a radius");
    println!("    trace <LOG> <UTILITY> <NODE> <ID>      Connectivity trace from a terminal or span segment");
    println!("\nEnvironment: ROUTENET_LOG sets the log filter, ROUTENET__SECTION__KEY overrides config.");
}

/// Removes `--flag value` from `args` and returns the value.
fn take_option(args: &mut Vec<String>, flag: &str) -> Option<String> {
    let pos = args.iter().position(|a| a == flag)?;
    args.remove(pos);
    if pos < args.len() {
        Some(args.remove(pos))
    } else {
        fail(&format!("{flag} needs a value"))
    }
}

fn fail(message: &str) -> ! {
    eprintln!("{}: {}", "Error".red(), message);
    std::process::exit(1);
}

fn arg<'a>(args: &'a [String], index: usize, usage: &str) -> &'a str {
    match args.get(index) {
        Some(a) => a,
        None => fail(&format!("Usage: routenet {usage}")),
    }
}

fn parse_id(raw: &str) -> Uuid {
    match Uuid::parse_str(raw) {
        Ok(id) => id,
        Err(e) => fail(&format!("'{raw}' is not a valid id: {e}")),
    }
}

fn read_file(path: &str) -> String {
    match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => fail(&format!("Failed to read {path}: {e}")),
    }
}

/// Replays the event log at `path` into a fresh service.
fn load_network(path: &str, config: RouteNetworkConfig) -> RouteNetworkService {
    let json = read_file(path);
    let service = RouteNetworkService::new(config);
    let start = Instant::now();
    match service.seed(&json) {
        Ok(report) => {
            info!(
                operations = report.operations,
                skipped = report.events_skipped,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Event log replayed"
            );
            if report.events_skipped + report.interest_events_skipped > 0 {
                println!(
                    "   {} {} events and {} interest events skipped during replay",
                    "!".yellow(),
                    report.events_skipped,
                    report.interest_events_skipped
                );
            }
        }
        Err(e) => fail(&e.to_string()),
    }
    service
}

// =============================================================================
// Commands
// =============================================================================

fn run_stats(args: &[String], config: RouteNetworkConfig) {
    let service = load_network(arg(args, 1, "stats <LOG>"), config);
    let stats = service.stats();
    println!("{}", "Route network".bold());
    println!("   Version:   {}", stats.version);
    println!("   Nodes:     {}", stats.node_count);
    println!("   Segments:  {}", stats.segment_count);
    println!("   Interests: {}", service.interest_count());
}

fn run_validate(args: &[String], config: RouteNetworkConfig) {
    let usage = "validate <LOG> <ID>...";
    let service = load_network(arg(args, 1, usage), config);
    let ids: Vec<ElementId> = args.iter().skip(2).map(|a| ElementId(parse_id(a))).collect();

    match service.validate_walk_of_interest(&ids) {
        Ok(walk) => {
            println!("{} walk of {} elements", "Valid".green(), walk.len());
            for id in walk.as_slice() {
                println!("   {id}");
            }
        }
        Err(e) => {
            println!("{} [{}] {}", "Invalid".red(), e.code().as_str(), e);
            std::process::exit(2);
        }
    }
}

fn run_path(args: &[String], config: RouteNetworkConfig) {
    let usage = "path <LOG> <FROM> <TO>";
    let service = load_network(arg(args, 1, usage), config);
    let from = ElementId(parse_id(arg(args, 2, usage)));
    let to = ElementId(parse_id(arg(args, 3, usage)));

    match service.shortest_path_between_route_nodes(from, to) {
        Ok(Some(path)) => {
            println!(
                "{} {:.2} m over {} elements",
                "Path".green(),
                path.length_meters,
                path.walk.len()
            );
            for id in path.walk.as_slice() {
                println!("   {id}");
            }
        }
        Ok(None) => println!("{}", "No path".yellow()),
        Err(e) => fail(&e.to_string()),
    }
}

fn run_nearest(args: &[String], config: RouteNetworkConfig) {
    let usage = "nearest <LOG> <NODE> [HITS] [RADIUS]";
    let max_hits = args
        .get(3)
        .and_then(|s| s.parse().ok())
        .unwrap_or(config.search.default_max_hits);
    let radius = args
        .get(4)
        .and_then(|s| s.parse().ok())
        .unwrap_or(config.search.default_radius_meters);
    let service = load_network(arg(args, 1, usage), config);
    let source = ElementId(parse_id(arg(args, 2, usage)));

    let query = route_storage::FindNearestRouteNodesQuery::new(source, max_hits, radius);
    match service.find_nearest_route_nodes(&query) {
        Ok(hits) if hits.is_empty() => println!("{}", "No nodes within radius".yellow()),
        Ok(hits) => {
            let snapshot = service.snapshot();
            for hit in hits {
                let name = snapshot
                    .get_node(hit.route_node_id)
                    .and_then(|n| n.name().map(str::to_string))
                    .unwrap_or_default();
                println!(
                    "   {:>10.2} m  {}  {}",
                    hit.distance_meters,
                    hit.route_node_id,
                    name.cyan()
                );
            }
        }
        Err(e) => fail(&e.to_string()),
    }
}

fn run_trace(args: &[String], config: RouteNetworkConfig) {
    let usage = "trace <LOG> <UTILITY> <NODE> <ID>";
    let service = load_network(arg(args, 1, usage), config);
    let network = match UtilityNetwork::from_json(&read_file(arg(args, 2, usage))) {
        Ok(network) => network,
        Err(e) => fail(&e.to_string()),
    };
    let route_node = ElementId(parse_id(arg(args, 3, usage)));
    let start = parse_id(arg(args, 4, usage));

    let view = get_connectivity_trace_view(&service, &network, route_node, start);
    if !view.is_connected() {
        println!("{}", "Not connected".yellow());
        return;
    }

    for hop in &view.hops {
        let mut flags = Vec::new();
        if hop.is_central_office {
            flags.push("CO");
        }
        if hop.is_flex_point {
            flags.push("FLEX");
        }
        if hop.is_line_termination {
            flags.push("LT");
        }
        if hop.is_customer_splitter {
            flags.push("SPL");
        }
        println!(
            "{:>3}  {:<16} {:<16} {:<14} {:<6} {:>9.1} m  {}  {}",
            hop.hop_seq_no,
            hop.node.bold(),
            hop.equipment,
            hop.terminal_structure,
            hop.terminal,
            hop.total_length,
            hop.connection_info.cyan(),
            flags.join(",").magenta()
        );
    }
    match serde_json::to_string(&view) {
        Ok(json) => info!(trace = %json, "Trace view"),
        Err(e) => info!(error = %e, "Trace view not serializable"),
    }
}
