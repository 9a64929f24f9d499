use clap::{Arg, ArgAction, Command};
use medic_core::clients::valid_client_names;

fn client_arg() -> Arg {
    Arg::new("client")
        .long("client")
        .short('c')
        .help("Only act on this client")
        .value_parser(valid_client_names())
}

fn json_arg() -> Arg {
    Arg::new("json")
        .long("json")
        .help("Output in JSON format")
        .action(ArgAction::SetTrue)
}

pub fn build_cli() -> Command {
    Command::new("medic")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Diagnose and repair the helper servers of desktop clients")
        .long_about("medic finds desktop clients (Claude Desktop, Cursor, Windsurf and custom ones), reads the helper servers they launch, classifies helper logs into typed errors and repairs what it can, always behind a backup it can roll back to.")
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging output")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("status")
                .about("Show health of every detected client")
                .arg(json_arg())
        )
        .subcommand(
            Command::new("diagnose")
                .about("Show status plus root-cause probing of helpers without log evidence")
                .arg(client_arg())
                .arg(json_arg())
        )
        .subcommand(
            Command::new("repair")
                .about("Plan and apply fixes, backing up and verifying each client")
                .arg(client_arg())
                .arg(
                    Arg::new("dry-run")
                        .long("dry-run")
                        .help("Show the plan without changing anything")
                        .action(ArgAction::SetTrue)
                )
                .arg(
                    Arg::new("auto-confirm")
                        .long("auto-confirm")
                        .short('y')
                        .help("Also apply fixes that normally need confirmation")
                        .action(ArgAction::SetTrue)
                )
                .arg(json_arg())
        )
        .subcommand(
            Command::new("backup")
                .about("Manage configuration backups")
                .subcommand_required(true)
                .arg_required_else_help(true)
                .subcommand(
                    Command::new("create")
                        .about("Back up client configuration files now")
                        .arg(client_arg())
                )
                .subcommand(
                    Command::new("list")
                        .about("List backups, newest first")
                        .arg(client_arg())
                        .arg(json_arg())
                )
                .subcommand(
                    Command::new("restore")
                        .about("Copy a backup over its live configuration file")
                        .arg(
                            Arg::new("id")
                                .help("Backup id or unique id prefix")
                                .required(true)
                                .index(1)
                        )
                )
                .subcommand(
                    Command::new("delete")
                        .about("Delete a backup and its snapshot")
                        .arg(
                            Arg::new("id")
                                .help("Backup id or unique id prefix")
                                .required(true)
                                .index(1)
                        )
                )
        )
        .subcommand(
            Command::new("history")
                .about("Show the repair audit log")
                .arg(
                    Arg::new("limit")
                        .long("limit")
                        .short('n')
                        .help("Show only the newest N entries")
                        .value_parser(clap::value_parser!(usize))
                )
                .arg(json_arg())
        )
        .subcommand(
            Command::new("watch")
                .about("Re-check periodically and print each status until Ctrl+C")
                .arg(
                    Arg::new("interval")
                        .long("interval")
                        .short('i')
                        .help("Seconds between checks (overrides config)")
                        .value_parser(clap::value_parser!(u64).range(1..))
                )
                .arg(json_arg())
        )
}
