//! Pure health evaluation. No I/O.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::clients::TargetClient;
use crate::diagnostics::{ClassifiedError, ErrorKind};
use crate::health::types::{ClientStatus, HealthLevel, HelperHealth, SystemStatus};

/// Severity of one helper process from the records attributed to it.
///
/// First matching tier wins: process/permission errors are critical,
/// path/config errors major, network errors minor.
pub fn evaluate_helper<'a, I>(errors: I) -> HealthLevel
where
    I: IntoIterator<Item = &'a ClassifiedError>,
{
    let kinds: Vec<ErrorKind> = errors.into_iter().map(|e| e.kind).collect();
    let any = |set: &[ErrorKind]| kinds.iter().any(|k| set.contains(k));

    if any(&[ErrorKind::ProcessError, ErrorKind::PermissionError]) {
        HealthLevel::Critical
    } else if any(&[ErrorKind::PathError, ErrorKind::ConfigError]) {
        HealthLevel::Major
    } else if any(&[ErrorKind::NetworkError]) {
        HealthLevel::Minor
    } else {
        HealthLevel::Healthy
    }
}

/// Client severity from liveness and the levels of its helpers.
///
/// Starts at `Healthy` when running, `Minor` otherwise. A critical helper
/// raises it to `Major`; any other degraded helper raises a healthy client
/// to `Minor`. The level is never lowered.
pub fn evaluate_client<I>(running: bool, helper_levels: I) -> HealthLevel
where
    I: IntoIterator<Item = HealthLevel>,
{
    let worst = helper_levels.into_iter().max().unwrap_or_default();
    let mut health = if running {
        HealthLevel::Healthy
    } else {
        HealthLevel::Minor
    };

    if worst == HealthLevel::Critical {
        health = health.max(HealthLevel::Major);
    } else if worst > HealthLevel::Healthy && health == HealthLevel::Healthy {
        health = HealthLevel::Minor;
    }
    health
}

/// Overall severity: the maximum across clients.
pub fn evaluate_overall<I>(client_levels: I) -> HealthLevel
where
    I: IntoIterator<Item = HealthLevel>,
{
    client_levels.into_iter().max().unwrap_or_default()
}

/// Build the status of one client from its records.
///
/// Records naming a helper the client does not have are treated as
/// unattributed.
pub fn evaluate(
    client: &TargetClient,
    running: bool,
    errors: &[ClassifiedError],
    warnings: Vec<String>,
) -> ClientStatus {
    let mut helpers: BTreeMap<String, HelperHealth> = client
        .helper_processes
        .iter()
        .map(|h| {
            (
                h.name.clone(),
                HelperHealth {
                    health: HealthLevel::Healthy,
                    errors: Vec::new(),
                },
            )
        })
        .collect();
    let mut unattributed = Vec::new();

    for error in errors {
        match error.helper.as_deref().and_then(|name| helpers.get_mut(name)) {
            Some(helper) => helper.errors.push(error.clone()),
            None => unattributed.push(error.clone()),
        }
    }

    for helper in helpers.values_mut() {
        helper.health = evaluate_helper(&helper.errors);
    }
    let unattributed = HelperHealth {
        health: evaluate_helper(&unattributed),
        errors: unattributed,
    };

    let health = evaluate_client(
        running,
        helpers
            .values()
            .map(|h| h.health)
            .chain(std::iter::once(unattributed.health)),
    );

    ClientStatus {
        kind: client.kind,
        display_name: client.display_name.clone(),
        config_path: client.config_path.clone(),
        running,
        health,
        helpers,
        unattributed,
        warnings,
    }
}

pub fn system_status(clients: Vec<ClientStatus>, checked_at: DateTime<Utc>) -> SystemStatus {
    SystemStatus {
        overall: evaluate_overall(clients.iter().map(|c| c.health)),
        clients,
        checked_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::{ClientKind, HelperProcess};
    use std::path::PathBuf;

    const ALL_KINDS: [ErrorKind; 7] = [
        ErrorKind::PathError,
        ErrorKind::EnvironmentError,
        ErrorKind::PermissionError,
        ErrorKind::ConfigError,
        ErrorKind::NetworkError,
        ErrorKind::ProcessError,
        ErrorKind::UnknownError,
    ];

    fn error(kind: ErrorKind, helper: Option<&str>) -> ClassifiedError {
        ClassifiedError {
            kind,
            message: format!("{} happened", kind),
            raw_evidence: String::new(),
            shape: "test".to_string(),
            subject: None,
            helper: helper.map(str::to_string),
            client: None,
            fixable: false,
        }
    }

    fn client(helpers: &[&str]) -> TargetClient {
        TargetClient {
            kind: ClientKind::Cursor,
            display_name: "Cursor".to_string(),
            config_path: PathBuf::from("/home/u/.cursor/mcp.json"),
            log_dirs: vec![],
            process_patterns: vec![],
            helper_processes: helpers
                .iter()
                .map(|n| HelperProcess::new(*n, "node"))
                .collect(),
        }
    }

    #[test]
    fn test_helper_tiers() {
        assert_eq!(evaluate_helper(&[]), HealthLevel::Healthy);
        assert_eq!(
            evaluate_helper(&[error(ErrorKind::NetworkError, None)]),
            HealthLevel::Minor
        );
        assert_eq!(
            evaluate_helper(&[error(ErrorKind::ConfigError, None)]),
            HealthLevel::Major
        );
        assert_eq!(
            evaluate_helper(&[
                error(ErrorKind::NetworkError, None),
                error(ErrorKind::PermissionError, None)
            ]),
            HealthLevel::Critical
        );
        assert_eq!(
            evaluate_helper(&[error(ErrorKind::EnvironmentError, None)]),
            HealthLevel::Healthy
        );
    }

    #[test]
    fn test_client_rule_is_offset_not_max() {
        assert_eq!(evaluate_client(true, []), HealthLevel::Healthy);
        assert_eq!(evaluate_client(false, []), HealthLevel::Minor);
        assert_eq!(
            evaluate_client(true, [HealthLevel::Major]),
            HealthLevel::Minor
        );
        assert_eq!(
            evaluate_client(false, [HealthLevel::Major]),
            HealthLevel::Minor
        );
        assert_eq!(
            evaluate_client(true, [HealthLevel::Critical]),
            HealthLevel::Major
        );
        assert_eq!(
            evaluate_client(true, [HealthLevel::Minor]),
            HealthLevel::Minor
        );
        assert_eq!(
            evaluate_client(false, [HealthLevel::Critical]),
            HealthLevel::Major
        );
    }

    #[test]
    fn test_network_only_scenario() {
        let c = client(&["web", "fs"]);
        let status = evaluate(&c, true, &[error(ErrorKind::NetworkError, Some("web"))], vec![]);
        assert_eq!(status.helpers["web"].health, HealthLevel::Minor);
        assert_eq!(status.helpers["fs"].health, HealthLevel::Healthy);
        assert_eq!(status.health, HealthLevel::Minor);

        let other = evaluate(&client(&[]), true, &[], vec![]);
        assert_eq!(other.health, HealthLevel::Healthy);
        let system = system_status(vec![status, other], Utc::now());
        assert_eq!(system.overall, HealthLevel::Minor);
    }

    #[test]
    fn test_unknown_helper_records_are_unattributed() {
        let c = client(&["fs"]);
        let status = evaluate(
            &c,
            true,
            &[error(ErrorKind::ProcessError, Some("ghost"))],
            vec![],
        );
        assert_eq!(status.unattributed.errors.len(), 1);
        assert_eq!(status.unattributed.health, HealthLevel::Critical);
        assert_eq!(status.health, HealthLevel::Major);
        assert_eq!(status.all_errors().count(), 1);
    }

    #[test]
    fn test_adding_an_error_never_lowers_any_level() {
        for running in [true, false] {
            for base in ALL_KINDS {
                for added in ALL_KINDS {
                    let before = vec![error(base, Some("a"))];
                    let mut after = before.clone();
                    after.push(error(added, Some("a")));

                    let c = client(&["a", "b"]);
                    let s_before = evaluate(&c, running, &before, vec![]);
                    let s_after = evaluate(&c, running, &after, vec![]);

                    assert!(s_after.helpers["a"].health >= s_before.helpers["a"].health);
                    assert!(s_after.health >= s_before.health);

                    let o_before = evaluate_overall([s_before.health, HealthLevel::Minor]);
                    let o_after = evaluate_overall([s_after.health, HealthLevel::Minor]);
                    assert!(o_after >= o_before);
                }
            }
        }
    }

    #[test]
    fn test_overall_is_max() {
        assert_eq!(evaluate_overall([]), HealthLevel::Healthy);
        assert_eq!(
            evaluate_overall([HealthLevel::Minor, HealthLevel::Major, HealthLevel::Healthy]),
            HealthLevel::Major
        );
    }
}
