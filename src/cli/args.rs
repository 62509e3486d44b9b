//! CLI argument definitions using clap
//!
//! Commands:
//! - cosmos-sql resolve --database <id> --container <id> [--item <id>] [--partition-key <json>]
//! - cosmos-sql check-query <text> [--param name=json ...]
//! - cosmos-sql sample [--config <path>] [--log-level <level>]

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::observability::Severity;

/// cosmos-sql - client SDK core for Cosmos-style SQL API document databases
#[derive(Parser, Debug)]
#[command(name = "cosmos-sql")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the canonical link and partition key header for a resource
    Resolve {
        #[arg(long)]
        database: String,

        #[arg(long)]
        container: String,

        #[arg(long)]
        item: Option<String>,

        /// Partition key value as JSON (e.g. '"a"' or 5)
        #[arg(long)]
        partition_key: Option<String>,
    },

    /// Validate a query and its parameters, then print the parsed plan
    CheckQuery {
        /// Query text
        query: String,

        /// Parameter binding as name=json, repeatable (e.g. @id='"1"')
        #[arg(long = "param", value_name = "NAME=JSON")]
        params: Vec<String>,
    },

    /// Run the walkthrough against the in-memory emulator
    Sample {
        /// Client configuration file; defaults to the emulator account
        #[arg(long)]
        config: Option<PathBuf>,

        /// Minimum severity written to stderr
        #[arg(long, value_enum, default_value_t = LogLevel::Warn)]
        log_level: LogLevel,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Trace,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Severity {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Severity::Trace,
            LogLevel::Info => Severity::Info,
            LogLevel::Warn => Severity::Warn,
            LogLevel::Error => Severity::Error,
        }
    }
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_check_query_params() {
        let cli = Cli::parse_from([
            "cosmos-sql",
            "check-query",
            "SELECT * FROM r WHERE r.id = @id",
            "--param",
            "@id=\"1\"",
        ]);
        match cli.command {
            Command::CheckQuery { query, params } => {
                assert!(query.starts_with("SELECT"));
                assert_eq!(params, vec!["@id=\"1\"".to_string()]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_sample_defaults() {
        let cli = Cli::parse_from(["cosmos-sql", "sample"]);
        assert!(matches!(
            cli.command,
            Command::Sample { config: None, log_level: LogLevel::Warn }
        ));
    }
}
