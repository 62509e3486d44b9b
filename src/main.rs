//! cosmos-sql CLI entry point
//!
//! All logic is delegated to the CLI module; this only maps failure to a
//! non-zero exit.

use cosmos_sql::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
