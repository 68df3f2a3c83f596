//! Ranking input export
//!
//! One block per account, in ascending id order:
//!
//! ```text
//! U|uid|followed_id,followed_id,...|fork_owner_id,...
//! P|uid|owner_uid|contributions
//! S|uid|owner_uid
//! W|uid|owner_uid
//! ```
//!
//! `P`, `S` and `W` lines relate the account to the owners of repositories
//! it contributed to, starred and watches.

use crate::storage::GraphStore;
use crate::Result;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Line counts written by an export
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub users: usize,
    pub contributions: usize,
    pub stars: usize,
    pub watches: usize,
}

fn join_ids(ids: &[i64]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Writes the export to any writer
pub fn export_graph<W: Write>(graph: &dyn GraphStore, out: &mut W) -> Result<ExportSummary> {
    let mut summary = ExportSummary::default();

    for uid in graph.user_ids()? {
        let followings = graph.following_ids(uid)?;
        let forks = graph.fork_owners(uid)?;
        writeln!(out, "U|{}|{}|{}", uid, join_ids(&followings), join_ids(&forks))?;
        summary.users += 1;

        for (owner, contributions) in graph.contributed_owners(uid)? {
            writeln!(out, "P|{}|{}|{}", uid, owner, contributions)?;
            summary.contributions += 1;
        }
        for owner in graph.starred_owners(uid)? {
            writeln!(out, "S|{}|{}", uid, owner)?;
            summary.stars += 1;
        }
        for owner in graph.watched_owners(uid)? {
            writeln!(out, "W|{}|{}", uid, owner)?;
            summary.watches += 1;
        }
    }

    out.flush()?;
    Ok(summary)
}

/// Writes the export to a file, replacing it
pub fn export_graph_to_file(graph: &dyn GraphStore, path: &Path) -> Result<ExportSummary> {
    let mut out = BufWriter::new(File::create(path)?);
    let summary = export_graph(graph, &mut out)?;
    tracing::info!(
        "Exported {} account(s) to {}",
        summary.users,
        path.display()
    );
    Ok(summary)
}
