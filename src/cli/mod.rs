//! CLI module for databrain.
//!
//! - Argument parsing
//! - `ask`: stream one answer to stdout, then list its sources
//! - `subscribe`: print events from a reconnecting subscription
//! - `health`: probe the backend
//!
//! ```ignore
//! use databrain::cli::{parse_args, run_cli_command};
//!
//! let command = parse_args(std::env::args());
//! run_cli_command(command, config).await?;
//! ```

pub mod args;
pub mod version;

pub use args::{parse_args, CliCommand, USAGE};
pub use version::{version_line, VERSION};

use std::io::Write;
use std::time::Duration;

use color_eyre::eyre::{eyre, Result};

use crate::assistant::Assistant;
use crate::channel::ChannelState;
use crate::config::ClientConfig;
use crate::error::DataBrainError;
use crate::models::{ContextItem, GenerationFilters};
use crate::session::SessionStatus;
use crate::sse::StreamEvent;

/// Interval at which `ask` copies new answer text to stdout.
const PRINT_INTERVAL: Duration = Duration::from_millis(50);

/// Run a parsed command to completion.
pub async fn run_cli_command(command: CliCommand, config: ClientConfig) -> Result<()> {
    match command {
        CliCommand::Version => {
            println!("{}", version_line());
            Ok(())
        }
        CliCommand::Help => {
            println!("{}", USAGE);
            Ok(())
        }
        CliCommand::Invalid(reason) => Err(eyre!("{}\n\n{}", reason, USAGE)),
        CliCommand::Health => run_health(&Assistant::from_config(config)).await,
        CliCommand::Ask { query, filters } => {
            run_ask(&Assistant::from_config(config), &query, filters).await
        }
        CliCommand::Subscribe { url } => run_subscribe(&Assistant::from_config(config), &url).await,
    }
}

async fn run_health(assistant: &Assistant) -> Result<()> {
    let status = assistant.check_health().await;
    let mode = if assistant.config().use_mocks {
        "mock"
    } else {
        "live"
    };
    match (status.online, status.response_time_ms) {
        (true, Some(ms)) => {
            println!("Backend ONLINE ({} mode, {} ms)", mode, ms);
            Ok(())
        }
        _ => Err(eyre!(
            "Backend OFFLINE at {}",
            assistant.config().api_base_url
        )),
    }
}

async fn run_ask(assistant: &Assistant, query: &str, filters: GenerationFilters) -> Result<()> {
    let pending = assistant.spawn_ask(query, filters)?;
    let sink = assistant.conversation();
    let handle = pending.handle;
    let mut printed = 0;
    let mut ticker = tokio::time::interval(PRINT_INTERVAL);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Some(item) = sink.get(&pending.answer_id) {
                    printed = print_new_text(&item.content, printed)?;
                }
                if handle.is_finished() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                handle.cancel();
                break;
            }
        }
    }

    let outcome = handle.join().await;
    if let Some(item) = sink.get(&pending.answer_id) {
        print_new_text(&item.content, printed)?;
    }
    println!();

    match outcome.status {
        SessionStatus::Completed | SessionStatus::Fallback => {
            print_sources(&outcome.contexts);
            Ok(())
        }
        SessionStatus::Cancelled => {
            eprintln!("(cancelled)");
            Ok(())
        }
        SessionStatus::Failed => match outcome.error {
            Some(err) => {
                let err = DataBrainError::from(err);
                Err(eyre!("{}\n{}", err.user_message(), err.category().recovery_hint()))
            }
            None => Err(eyre!("answer failed")),
        },
    }
}

/// Print the part of `content` beyond `printed` bytes; returns the new offset.
fn print_new_text(content: &str, printed: usize) -> Result<usize> {
    if content.len() <= printed || !content.is_char_boundary(printed) {
        return Ok(printed);
    }
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(content[printed..].as_bytes())?;
    stdout.flush()?;
    Ok(content.len())
}

fn print_sources(contexts: &[ContextItem]) {
    if contexts.is_empty() {
        return;
    }
    println!("\nSources:");
    for (i, context) in contexts.iter().enumerate() {
        println!(
            "  [{}] {} (score {:.2})",
            i + 1,
            context.document_label(),
            context.score
        );
    }
}

async fn run_subscribe(assistant: &Assistant, url: &str) -> Result<()> {
    let mut channel = assistant.subscribe(url);
    let mut state_rx = channel.subscribe();
    let mut last_state = ChannelState::Idle;

    let result = loop {
        tokio::select! {
            event = channel.recv() => match event {
                Some(StreamEvent::AnswerChunk { text }) => println!("answer: {}", text),
                Some(StreamEvent::ContextBatch { query, contexts }) => {
                    println!("contexts for {:?}: {} passages", query, contexts.len());
                }
                Some(StreamEvent::Done) => println!("done"),
                None => break Ok(()),
            },
            changed = state_rx.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let snapshot = state_rx.borrow_and_update().clone();
                if snapshot.state != last_state {
                    eprintln!("[{}]", snapshot.state);
                    last_state = snapshot.state;
                }
                if snapshot.state == ChannelState::ClosedError {
                    break Err(eyre!(snapshot.error.unwrap_or_default()));
                }
            }
            _ = tokio::signal::ctrl_c() => break Ok(()),
        }
    };

    channel.disconnect();
    result
}
