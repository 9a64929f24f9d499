use clap::ArgMatches;
use tracing::info;

use medic_core::repair::{RepairFix, RepairReport};
use medic_core::{RepairOutcome, RepairRequest, RepairSummary};

use super::{CommandResult, build_engine, client_filter, exit_code, print_json};

pub(crate) fn handle_repair_command(matches: &ArgMatches) -> CommandResult {
    let request = RepairRequest {
        client: client_filter(matches),
        dry_run: matches.get_flag("dry-run"),
        auto_confirm: matches.get_flag("auto-confirm"),
        ..Default::default()
    };
    let json_output = matches.get_flag("json");
    info!(
        event = "cli.repair_started",
        client = ?request.client,
        dry_run = request.dry_run,
        auto_confirm = request.auto_confirm
    );

    let engine = build_engine()?;
    let summary = engine.repair(&request);

    if json_output {
        print_json(&summary)?;
    } else {
        print_summary(&summary);
    }

    info!(
        event = "cli.repair_completed",
        executed = summary.reports.len(),
        success = summary.is_success()
    );
    Ok(exit_code(summary.is_success()))
}

fn print_summary(summary: &RepairSummary) {
    if summary.plans.is_empty() {
        println!("No clients found.");
        return;
    }

    for client_plan in &summary.plans {
        println!(
            "{} ({}), health {}",
            client_plan.display_name, client_plan.client, client_plan.baseline
        );
        if client_plan.plan.is_empty() {
            println!("  Nothing to repair.");
            continue;
        }
        for fix in &client_plan.plan.fixes {
            print_fix(fix);
        }
        if summary.dry_run && client_plan.plan.requires_confirmation {
            println!("  Some fixes need confirmation (--auto-confirm) or manual steps.");
        }
    }

    if summary.dry_run {
        println!("\nDry run: nothing was changed.");
        return;
    }

    for report in &summary.reports {
        print_report(report);
    }
}

fn print_fix(fix: &RepairFix) {
    let mode = if !fix.is_applicable() {
        "manual"
    } else if fix.automatic {
        "auto"
    } else {
        "confirm"
    };
    let confidence = fix
        .confidence
        .map(|c| format!(" ({:.0}%)", c * 100.0))
        .unwrap_or_default();
    println!("  [{}] {}{}", mode, fix.description, confidence);
    println!("      for: {}", fix.for_error.message);
    for change in &fix.changes {
        match (&change.before_value, &change.after_value) {
            (Some(before), Some(after)) => {
                println!("      {}: {} -> {}", change.kind.as_str(), before, after)
            }
            _ => println!("      {}: {}", change.kind.as_str(), change.description),
        }
    }
    for step in &fix.remediation {
        println!("      step: {}", step);
    }
}

fn print_report(report: &RepairReport) {
    let headline = match &report.outcome {
        RepairOutcome::Succeeded => "Repaired".to_string(),
        RepairOutcome::RolledBack { reason } => format!("Rolled back: {}", reason),
        RepairOutcome::Failed {
            reason,
            manual_intervention,
            ..
        } => {
            if *manual_intervention {
                format!(
                    "FAILED: {}. The configuration may be inconsistent; restore it manually with `medic backup restore`.",
                    reason
                )
            } else {
                format!("Failed: {}", reason)
            }
        }
        RepairOutcome::NothingToApply => "Nothing applied".to_string(),
        RepairOutcome::Rejected { reason } => format!("Rejected: {}", reason),
        RepairOutcome::Cancelled => "Cancelled".to_string(),
    };
    println!("\n{}: {}", report.target, headline);
    if let Some(backup_id) = &report.backup_id {
        println!("  backup: {}", backup_id);
    }
    for fix in &report.applied {
        println!("  applied: {}", fix.description);
    }
    for fix in &report.pending {
        println!("  pending: {}", fix.description);
    }
    if let Some(verification) = &report.verification {
        println!(
            "  verified health: {} ({} error(s) remaining)",
            verification.health,
            verification.remaining.len()
        );
    }
}
