use clap::ArgMatches;
use tracing::info;

use medic_core::{HealthLevel, SystemStatus};

use super::{CommandResult, build_engine, exit_code, print_json};
use crate::table::TableFormatter;

pub(crate) fn handle_status_command(matches: &ArgMatches) -> CommandResult {
    let json_output = matches.get_flag("json");
    info!(event = "cli.status_started", json_output = json_output);

    let engine = build_engine()?;
    let status = engine.status();

    if json_output {
        print_json(&status)?;
    } else {
        print_status(&status);
    }

    info!(event = "cli.status_completed", overall = %status.overall);
    Ok(exit_code(status.overall == HealthLevel::Healthy))
}

pub(crate) fn print_status(status: &SystemStatus) {
    if status.clients.is_empty() {
        println!("No clients found.");
        return;
    }

    let rows: Vec<Vec<String>> = status
        .clients
        .iter()
        .map(|c| {
            let degraded = c
                .helpers
                .values()
                .filter(|h| !h.health.is_healthy())
                .count();
            vec![
                c.kind.to_string(),
                c.health.to_string(),
                if c.running { "yes" } else { "no" }.to_string(),
                format!("{}/{}", c.helpers.len() - degraded, c.helpers.len()),
                c.all_errors().count().to_string(),
                c.config_path.display().to_string(),
            ]
        })
        .collect();
    let table = TableFormatter::new(
        &["Client", "Health", "Running", "Helpers OK", "Errors", "Config"],
        &rows,
        60,
    );
    table.print_table(&rows);

    for client in &status.clients {
        for (name, helper) in &client.helpers {
            for error in &helper.errors {
                println!("  {}/{} [{}] {}", client.kind, name, helper.health, error.message);
            }
        }
        for error in &client.unattributed.errors {
            println!("  {} [{}] {}", client.kind, client.unattributed.health, error.message);
        }
    }

    println!(
        "\nOverall: {} (checked {})",
        status.overall,
        status.checked_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
}
