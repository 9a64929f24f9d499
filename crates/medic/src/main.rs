use std::process::ExitCode;

use medic_core::events;
use medic_core::init_logging;

mod app;
mod commands;
mod table;

fn main() -> ExitCode {
    let app = app::build_cli();
    let matches = app.get_matches();

    // Quiet unless -v/--verbose was given
    let quiet = !matches.get_flag("verbose");
    init_logging(quiet);

    match commands::run_command(&matches) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            events::log_app_error(e.as_ref());
            ExitCode::from(commands::EXIT_ERROR)
        }
    }
}
