use clap::ArgMatches;
use tracing::info;

use super::status::print_status;
use super::{CommandResult, build_engine, client_filter, exit_code, print_json};

pub(crate) fn handle_diagnose_command(matches: &ArgMatches) -> CommandResult {
    let json_output = matches.get_flag("json");
    let client = client_filter(matches);
    info!(event = "cli.diagnose_started", client = ?client, json_output = json_output);

    let engine = build_engine()?;
    let report = engine.diagnose(client);

    if json_output {
        print_json(&report)?;
    } else {
        println!(
            "Platform: {}{}",
            report.platform,
            if report.is_compat_layer { " (WSL)" } else { "" }
        );
        println!(
            "Helper runtime: {}",
            report
                .helper_runtime_version
                .as_deref()
                .unwrap_or("not found")
        );
        println!();
        print_status(&report.status);

        if !report.isolation.is_empty() {
            println!("\nProbe results:");
            for finding in &report.isolation {
                let verdict = if finding.result.fault {
                    format!("{}: {}", finding.result.kind, finding.result.description)
                } else {
                    "ok".to_string()
                };
                println!(
                    "  {}/{} ({} probes) {}",
                    finding.client, finding.helper, finding.probes_run, verdict
                );
            }
        }

        if !report.warnings.is_empty() {
            println!("\nWarnings:");
            for warning in &report.warnings {
                println!("  {}", warning);
            }
        }
    }

    let faults = report.has_faults();
    info!(event = "cli.diagnose_completed", faults = faults);
    Ok(exit_code(!faults))
}
