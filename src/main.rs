use databrain::cli::{parse_args, run_cli_command, version_line, CliCommand};
use databrain::config::ClientConfig;

use color_eyre::Result;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Install the log subscriber. Logs go to stderr so stdout carries only
/// answer text.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "databrain=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn main() -> Result<()> {
    let command = parse_args(std::env::args());

    // Handle --version before any initialization
    if command == CliCommand::Version {
        println!("{}", version_line());
        return Ok(());
    }

    color_eyre::install()?;
    init_tracing();

    let config = ClientConfig::from_env()?;
    tracing::debug!("Using backend {}", config.api_base_url);

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run_cli_command(command, config))
}
