//! Output module for inspecting and exporting crawl results
//!
//! This module handles:
//! - Printing per-method queue statistics
//! - Exporting the crawled graph as ranking input

mod export;
pub mod stats;

pub use export::{export_graph, export_graph_to_file, ExportSummary};
pub use stats::{load_statistics, print_statistics, QueueStatistics};
