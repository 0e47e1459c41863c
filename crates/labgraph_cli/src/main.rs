//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `labgraph_core` linkage and, given a database path, that the
//!   stored working set loads without invariant violations.
//! - Keep output deterministic for quick local sanity checks.
//!
//! Usage: `labgraph_cli [DB_PATH]`. Logs go to `$LABGRAPH_LOG_DIR` when set.

use labgraph_core::db::open_db;
use labgraph_core::{default_log_level, init_logging, GraphRepository, SqliteGraphRepository};
use log::error;
use std::process::ExitCode;

fn main() -> ExitCode {
    if let Ok(log_dir) = std::env::var("LABGRAPH_LOG_DIR") {
        if let Err(err) = init_logging(default_log_level(), &log_dir) {
            eprintln!("labgraph logging disabled: {err}");
        }
    }

    println!("labgraph_core version={}", labgraph_core::core_version());

    let Some(db_path) = std::env::args().nth(1) else {
        return ExitCode::SUCCESS;
    };
    match load_counts(&db_path) {
        Ok((nodes, edges)) => {
            println!("labgraph_core nodes={nodes} edges={edges}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("event=cli_load module=cli status=error error={err}");
            eprintln!("labgraph_core load failed: {err}");
            ExitCode::FAILURE
        }
    }
}

fn load_counts(db_path: &str) -> Result<(usize, usize), Box<dyn std::error::Error>> {
    let conn = open_db(db_path)?;
    let repo = SqliteGraphRepository::try_new(&conn)?;
    let graph = repo.load_graph()?;
    Ok((graph.node_count(), graph.edge_count()))
}
