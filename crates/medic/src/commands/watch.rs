use clap::ArgMatches;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use medic_core::{Monitor, SystemStatus};

use super::{CommandResult, EXIT_OK, build_engine};

pub(crate) fn handle_watch_command(matches: &ArgMatches) -> CommandResult {
    let engine = build_engine()?;
    let interval = matches
        .get_one::<u64>("interval")
        .copied()
        .unwrap_or_else(|| engine.settings().monitor.interval_secs());
    let json_output = matches.get_flag("json");
    info!(event = "cli.watch_started", interval_secs = interval);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let monitor = Monitor::new(Arc::new(engine));
        let mut subscription = monitor.subscribe();
        monitor.start(Duration::from_secs(interval))?;
        println!("Checking every {}s. Press Ctrl+C to exit.", interval);

        loop {
            tokio::select! {
                status = subscription.receiver.recv() => {
                    let Some(status) = status else { break };
                    print_line(&status, json_output)?;
                }
                _ = tokio::signal::ctrl_c() => break,
            }
        }

        monitor.stop();
        info!(event = "cli.watch_completed");
        Ok::<_, Box<dyn std::error::Error>>(())
    })?;

    Ok(ExitCode::from(EXIT_OK))
}

fn print_line(status: &SystemStatus, json_output: bool) -> Result<(), Box<dyn std::error::Error>> {
    if json_output {
        println!("{}", serde_json::to_string(status)?);
        return Ok(());
    }
    let clients: Vec<String> = status
        .clients
        .iter()
        .map(|c| format!("{}={}", c.kind, c.health))
        .collect();
    println!(
        "{} overall={} {}",
        status.checked_at.format("%H:%M:%S"),
        status.overall,
        clients.join(" ")
    );
    Ok(())
}
