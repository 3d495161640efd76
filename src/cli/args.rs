//! Command-line argument parsing for the databrain CLI.

use crate::models::GenerationFilters;

/// Parsed CLI command to execute.
#[derive(Debug, Clone, PartialEq)]
pub enum CliCommand {
    /// Show version information
    Version,
    /// Show usage
    Help,
    /// Stream the answer to one question
    Ask {
        query: String,
        filters: GenerationFilters,
    },
    /// Follow a server event stream until interrupted
    Subscribe { url: String },
    /// Probe the backend health endpoint
    Health,
    /// Arguments that could not be understood
    Invalid(String),
}

pub const USAGE: &str = "\
Usage:
  databrain ask [--division NAME] [--department NAME] [--document NAME] [--document-id ID] <question...>
  databrain subscribe <url>
  databrain health
  databrain --version";

/// Parse command-line arguments and return the command to run.
///
/// The first item is the program name and is skipped.
///
/// # Examples
///
/// ```
/// use databrain::cli::args::{parse_args, CliCommand};
///
/// let args = vec!["databrain".to_string(), "--version".to_string()];
/// assert_eq!(parse_args(args.into_iter()), CliCommand::Version);
/// ```
pub fn parse_args<I>(args: I) -> CliCommand
where
    I: Iterator<Item = String>,
{
    let mut args = args.skip(1);
    let Some(first) = args.next() else {
        return CliCommand::Help;
    };

    match first.as_str() {
        "--version" | "-V" => CliCommand::Version,
        "--help" | "-h" | "help" => CliCommand::Help,
        "health" => CliCommand::Health,
        "subscribe" => match (args.next(), args.next()) {
            (Some(url), None) => CliCommand::Subscribe { url },
            (None, _) => CliCommand::Invalid("subscribe needs a url".to_string()),
            (Some(_), Some(extra)) => {
                CliCommand::Invalid(format!("unexpected argument: {}", extra))
            }
        },
        "ask" => parse_ask(args),
        other => CliCommand::Invalid(format!("unknown command: {}", other)),
    }
}

fn parse_ask(mut args: impl Iterator<Item = String>) -> CliCommand {
    let mut filters = GenerationFilters::new();
    let mut words = Vec::new();

    while let Some(arg) = args.next() {
        let flag = arg.as_str();
        if !matches!(
            flag,
            "--division" | "--department" | "--document" | "--document-id"
        ) {
            words.push(arg);
            continue;
        }
        let Some(value) = args.next() else {
            return CliCommand::Invalid(format!("{} needs a value", flag));
        };
        filters = match flag {
            "--division" => filters.with_division(value),
            "--department" => filters.with_department(value),
            "--document" => filters.with_document_name(value),
            _ => filters.with_document_id(value),
        };
    }

    let query = words.join(" ");
    if query.trim().is_empty() {
        return CliCommand::Invalid("ask needs a question".to_string());
    }
    CliCommand::Ask { query, filters }
}
