use clap::ArgMatches;
use std::process::ExitCode;
use tracing::{error, info};

use medic_core::{BackupRecord, Engine};

use super::{CommandResult, EXIT_ERROR, EXIT_OK, build_engine, client_filter, print_json};
use crate::table::TableFormatter;

pub(crate) fn handle_backup_command(matches: &ArgMatches) -> CommandResult {
    let engine = build_engine()?;
    match matches.subcommand() {
        Some(("create", sub_matches)) => create(&engine, sub_matches),
        Some(("list", sub_matches)) => list(&engine, sub_matches),
        Some(("restore", sub_matches)) => restore(&engine, sub_matches),
        Some(("delete", sub_matches)) => delete(&engine, sub_matches),
        _ => {
            error!(event = "cli.backup.command_unknown");
            Err("Unknown backup command".into())
        }
    }
}

fn create(engine: &Engine, matches: &ArgMatches) -> CommandResult {
    let client = client_filter(matches);
    info!(event = "cli.backup.create_started", client = ?client);

    let records = engine.create_backups(client)?;
    if records.is_empty() {
        println!("No clients found.");
    }
    for record in &records {
        println!(
            "Backed up {} -> {} ({})",
            record.source_config_path.display(),
            record.snapshot_path.display(),
            record.short_id()
        );
    }

    info!(event = "cli.backup.create_completed", count = records.len());
    Ok(ExitCode::from(EXIT_OK))
}

fn list(engine: &Engine, matches: &ArgMatches) -> CommandResult {
    let records = engine.list_backups(client_filter(matches))?;
    if matches.get_flag("json") {
        print_json(&records)?;
        return Ok(ExitCode::from(EXIT_OK));
    }
    if records.is_empty() {
        println!("No backups found.");
        return Ok(ExitCode::from(EXIT_OK));
    }

    let rows: Vec<Vec<String>> = records.iter().map(row).collect();
    TableFormatter::new(&["Id", "Client", "Created", "Helpers", "Config"], &rows, 60)
        .print_table(&rows);
    Ok(ExitCode::from(EXIT_OK))
}

fn row(record: &BackupRecord) -> Vec<String> {
    vec![
        record.short_id().to_string(),
        record.client_kind.to_string(),
        record.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        record.helper_processes_snapshot.len().to_string(),
        record.source_config_path.display().to_string(),
    ]
}

fn restore(engine: &Engine, matches: &ArgMatches) -> CommandResult {
    let id = matches.get_one::<String>("id").ok_or("Backup id is required")?;
    info!(event = "cli.backup.restore_started", backup_id = %id);

    let record = engine.restore_backup(id)?;
    println!(
        "Restored {} from backup {} ({})",
        record.source_config_path.display(),
        record.short_id(),
        record.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    Ok(ExitCode::from(EXIT_OK))
}

fn delete(engine: &Engine, matches: &ArgMatches) -> CommandResult {
    let id = matches.get_one::<String>("id").ok_or("Backup id is required")?;
    if engine.delete_backup(id)? {
        println!("Deleted backup {}", id);
        Ok(ExitCode::from(EXIT_OK))
    } else {
        eprintln!("No backup with id '{}'", id);
        Ok(ExitCode::from(EXIT_ERROR))
    }
}
