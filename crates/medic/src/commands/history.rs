use clap::ArgMatches;
use std::process::ExitCode;

use medic_core::repair::HistoryOutcome;

use super::{CommandResult, EXIT_OK, build_engine, print_json};
use crate::table::TableFormatter;

pub(crate) fn handle_history_command(matches: &ArgMatches) -> CommandResult {
    let limit = matches.get_one::<usize>("limit").copied();
    let engine = build_engine()?;
    let entries = engine.history(limit)?;

    if matches.get_flag("json") {
        print_json(&entries)?;
        return Ok(ExitCode::from(EXIT_OK));
    }
    if entries.is_empty() {
        println!("No repairs recorded.");
        return Ok(ExitCode::from(EXIT_OK));
    }

    let rows: Vec<Vec<String>> = entries
        .iter()
        .map(|e| {
            let outcome = match e.outcome {
                HistoryOutcome::Succeeded => "succeeded",
                HistoryOutcome::RolledBack => "rolled back",
                HistoryOutcome::Failed if e.manual_intervention => "FAILED (manual)",
                HistoryOutcome::Failed => "failed",
            };
            let fixes: Vec<&str> = e.fixes.iter().map(|f| f.description.as_str()).collect();
            vec![
                e.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                e.client_kind.to_string(),
                outcome.to_string(),
                fixes.join("; "),
                e.reason.clone().unwrap_or_default(),
            ]
        })
        .collect();
    TableFormatter::new(&["When", "Client", "Outcome", "Fixes", "Reason"], &rows, 50)
        .print_table(&rows);
    Ok(ExitCode::from(EXIT_OK))
}
