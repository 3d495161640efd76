//! Connection state machine for the reconnecting channel.
//!
//! [`ChannelMachine`] holds no I/O handles and no timers. The driver reports
//! what the transport did and performs the [`ChannelAction`] it gets back.

use std::fmt;
use std::time::Duration;

use serde_json::Value;

use crate::sse::{is_done_sentinel, parse_value, SseParseError, StreamEvent};

use super::policy::ReconnectPolicy;

pub const MSG_CLOSED: &str = "Connection to server was closed. The server might be unavailable.";
pub const MSG_RECONNECTING: &str = "Reconnecting to server...";
pub const MSG_RETRYING: &str = "Connection to server lost. Retrying...";
pub const MSG_LOST: &str = "Connection to server lost. Please refresh the page to try again.";
pub const MSG_PARSE_FAILED: &str = "Failed to parse server response";

/// Lifecycle of the subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Idle,
    Connecting,
    Open,
    /// Waiting out a backoff delay.
    Reconnecting,
    /// Terminal until `connect` or `retry`.
    ClosedError,
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChannelState::Idle => "idle",
            ChannelState::Connecting => "connecting",
            ChannelState::Open => "open",
            ChannelState::Reconnecting => "reconnecting",
            ChannelState::ClosedError => "closed",
        };
        f.write_str(name)
    }
}

/// Transport failures reported by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelErrorKind {
    /// The server ended the stream.
    Closed,
    /// The transport is still establishing the connection.
    WhileConnecting,
    /// Opening failed, or the open stream broke.
    Failed,
}

/// What the driver must do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelAction {
    None,
    /// Sleep for `delay`, then call [`ChannelMachine::begin_reconnect`].
    /// `attempt` counts from 1.
    ScheduleReconnect { attempt: u32, delay: Duration },
    /// Stop the driver; no automatic recovery follows.
    Stop,
}

/// Point-in-time view published to observers.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSnapshot {
    pub state: ChannelState,
    pub error: Option<String>,
    pub attempts: u32,
    pub message_count: usize,
    pub url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ChannelMachine {
    policy: ReconnectPolicy,
    state: ChannelState,
    attempts: u32,
    url: Option<String>,
    messages: Vec<StreamEvent>,
    error: Option<String>,
    generation: u64,
}

impl ChannelMachine {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            state: ChannelState::Idle,
            attempts: 0,
            url: None,
            messages: Vec::new(),
            error: None,
            generation: 0,
        }
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn messages(&self) -> &[StreamEvent] {
        &self.messages
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// Identifies the current connection. Bumped by every `connect`, `retry`
    /// and `disconnect`, so a driver can tell its reports are stale.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Start a fresh subscription to `url`, discarding previous messages.
    pub fn connect(&mut self, url: impl Into<String>) -> u64 {
        let url = url.into();
        tracing::info!("Channel connecting to {}", url);
        self.url = Some(url);
        self.restart()
    }

    /// Reconnect to the last url with a fresh attempt budget.
    ///
    /// Returns the url to open, or `None` after `disconnect` or before any
    /// `connect`.
    pub fn retry(&mut self) -> Option<String> {
        let url = self.url.clone()?;
        tracing::info!("Channel retry requested for {}", url);
        self.restart();
        Some(url)
    }

    fn restart(&mut self) -> u64 {
        self.state = ChannelState::Connecting;
        self.attempts = 0;
        self.messages.clear();
        self.error = None;
        self.generation += 1;
        self.generation
    }

    /// The subscription is established.
    pub fn on_open(&mut self) {
        if self.state != ChannelState::Connecting {
            return;
        }
        tracing::info!("Channel open");
        self.state = ChannelState::Open;
        self.error = None;
        self.attempts = 0;
    }

    /// Handle one inbound payload. Returns the event if it was accepted.
    ///
    /// Empty payloads and payloads without a `type` are dropped silently.
    /// Unparsable JSON records a parse error but keeps the connection.
    pub fn on_message(&mut self, payload: &str) -> Option<StreamEvent> {
        if self.state != ChannelState::Open {
            return None;
        }
        let payload = payload.trim();
        if payload.is_empty() {
            return None;
        }
        if is_done_sentinel(payload) {
            tracing::debug!("Ignoring end-of-answer sentinel on channel");
            return None;
        }

        let value: Value = match serde_json::from_str(payload) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Failed to parse channel message: {}", e);
                self.error = Some(MSG_PARSE_FAILED.to_string());
                return None;
            }
        };

        match parse_value(value) {
            Ok(event) => {
                self.messages.push(event.clone());
                Some(event)
            }
            Err(SseParseError::MissingType) => None,
            Err(SseParseError::UnknownEventType(kind)) => {
                tracing::debug!("Dropping channel message of type {}", kind);
                None
            }
            Err(e) => {
                tracing::warn!("Malformed channel message: {}", e);
                self.error = Some(MSG_PARSE_FAILED.to_string());
                None
            }
        }
    }

    /// Classify a transport failure and decide what happens next.
    pub fn on_error(&mut self, kind: ChannelErrorKind) -> ChannelAction {
        if matches!(self.state, ChannelState::Idle | ChannelState::ClosedError) {
            return ChannelAction::None;
        }

        match kind {
            ChannelErrorKind::Closed => {
                tracing::warn!("Channel closed by server");
                self.state = ChannelState::ClosedError;
                self.error = Some(MSG_CLOSED.to_string());
                ChannelAction::Stop
            }
            ChannelErrorKind::WhileConnecting => {
                self.error = Some(MSG_RECONNECTING.to_string());
                ChannelAction::None
            }
            ChannelErrorKind::Failed if self.policy.allows(self.attempts) => {
                let delay = self.policy.delay_for(self.attempts);
                self.attempts += 1;
                self.state = ChannelState::Reconnecting;
                self.error = Some(MSG_RETRYING.to_string());
                tracing::warn!(
                    "Channel connection lost, reconnect {}/{} in {:?}",
                    self.attempts,
                    self.policy.max_attempts,
                    delay
                );
                ChannelAction::ScheduleReconnect {
                    attempt: self.attempts,
                    delay,
                }
            }
            ChannelErrorKind::Failed => {
                tracing::error!(
                    "Channel gave up after {} reconnect attempts",
                    self.attempts
                );
                self.state = ChannelState::ClosedError;
                self.error = Some(MSG_LOST.to_string());
                ChannelAction::Stop
            }
        }
    }

    /// The backoff delay elapsed. Returns the url to reopen, or `None` if the
    /// channel moved on in the meantime.
    pub fn begin_reconnect(&mut self) -> Option<String> {
        if self.state != ChannelState::Reconnecting {
            return None;
        }
        self.state = ChannelState::Connecting;
        self.url.clone()
    }

    /// Close and forget the current url. Safe to call repeatedly.
    pub fn disconnect(&mut self) {
        if self.state == ChannelState::Idle && self.url.is_none() {
            return;
        }
        tracing::info!("Channel disconnected");
        self.state = ChannelState::Idle;
        self.url = None;
        self.error = None;
        self.attempts = 0;
        self.generation += 1;
    }

    pub fn snapshot(&self) -> ChannelSnapshot {
        ChannelSnapshot {
            state: self.state,
            error: self.error.clone(),
            attempts: self.attempts,
            message_count: self.messages.len(),
            url: self.url.clone(),
        }
    }
}

impl Default for ChannelMachine {
    fn default() -> Self {
        Self::new(ReconnectPolicy::default())
    }
}
