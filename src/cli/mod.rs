//! CLI module for cosmos-sql
//!
//! Provides command-line interface for:
//! - resolve: canonical link and partition key header for a tuple
//! - check-query: validate a query and its bindings
//! - sample: walkthrough against the in-memory emulator

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command, LogLevel};
pub use commands::{check_query, resolve, run_command, sample};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{write_error, write_response};

/// Parse arguments and run the command. Failures are also written to
/// stdout as a JSON error object.
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    let result = run_command(cli.command);
    if let Err(e) = &result {
        write_error(e.code_str(), e.message())?;
    }
    result
}
