pub mod errors;
pub mod operations;
pub mod types;

pub use errors::ProcessError;
pub use operations::{
    command_matches, command_output_with_timeout, find_process, is_process_running,
    process_name_matches, snapshot_processes,
};
pub use types::{Pid, ProcessInfo, ProcessStatus};
