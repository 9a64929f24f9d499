use std::process::ExitCode;

use clap::ArgMatches;
use tracing::{error, info};

use medic_core::config::MedicConfig;
use medic_core::events;
use medic_core::{ClientKind, Config, Engine, HostContext};

mod backup;
mod diagnose;
mod history;
mod repair;
mod status;
mod watch;

/// Healthy, succeeded, or nothing to do.
pub const EXIT_OK: u8 = 0;
/// Unhealthy status, faults found, or a repair that did not succeed.
pub const EXIT_UNHEALTHY: u8 = 1;
/// Invalid configuration or an operation that could not run.
pub const EXIT_ERROR: u8 = 2;

pub type CommandResult = Result<ExitCode, Box<dyn std::error::Error>>;

pub fn run_command(matches: &ArgMatches) -> CommandResult {
    events::log_app_startup();

    let result = match matches.subcommand() {
        Some(("status", sub_matches)) => status::handle_status_command(sub_matches),
        Some(("diagnose", sub_matches)) => diagnose::handle_diagnose_command(sub_matches),
        Some(("repair", sub_matches)) => repair::handle_repair_command(sub_matches),
        Some(("backup", sub_matches)) => backup::handle_backup_command(sub_matches),
        Some(("history", sub_matches)) => history::handle_history_command(sub_matches),
        Some(("watch", sub_matches)) => watch::handle_watch_command(sub_matches),
        _ => {
            error!(event = "cli.command_unknown");
            Err("Unknown command".into())
        }
    };

    events::log_app_shutdown();
    result
}

/// Load and validate the configuration hierarchy.
///
/// Missing files fall back to defaults; a file that exists but does not
/// parse or validate stops the command.
fn load_config() -> Result<MedicConfig, Box<dyn std::error::Error>> {
    let settings = MedicConfig::load_hierarchy().map_err(|e| {
        error!(event = "cli.config.load_failed", error = %e);
        format!(
            "Could not load config: {}\nTip: Check ~/.medic/config.toml and ./.medic/config.toml for syntax errors.",
            e
        )
    })?;
    settings.validate().map_err(|e| {
        error!(event = "cli.config.validate_failed", error = %e);
        e
    })?;
    Ok(settings)
}

fn build_engine() -> Result<Engine, Box<dyn std::error::Error>> {
    let settings = load_config()?;
    let host = HostContext::detect();
    info!(
        event = "cli.engine.build_completed",
        platform = %host.platform,
        compat = host.is_compat_layer()
    );
    Ok(Engine::new(host, Config::new(), settings))
}

fn client_filter(matches: &ArgMatches) -> Option<ClientKind> {
    matches
        .get_one::<String>("client")
        .and_then(|name| ClientKind::parse(name))
}

fn exit_code(ok: bool) -> ExitCode {
    ExitCode::from(if ok { EXIT_OK } else { EXIT_UNHEALTHY })
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
