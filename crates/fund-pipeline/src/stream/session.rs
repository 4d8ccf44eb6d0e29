//! Streaming session state machine
//!
//! ```text
//! Idle -> Connecting -> Open -> Streaming -> Terminal -> Closed
//!              \           \         \
//!               +-----------+---------+--> Error
//! ```
//!
//! The session never touches the network itself; the client feeds it
//! transport signals and raw frames.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{PipelineError, Result};
use crate::model::{StreamingEvent, TerminalSpec};

/// Identity of one stage invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    Connecting,
    Open,
    Streaming,
    Terminal,
    Closed,
    Error,
}

/// What happened to one inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// Non-terminal event, appended to the log
    Appended(StreamingEvent),
    /// First valid terminal event; appended and ready for aggregation
    Terminal(StreamingEvent),
    /// Terminal-looking event after the session already completed; appended, not aggregated
    DuplicateTerminal,
    /// Frame did not parse; dropped
    Malformed(String),
    /// Session is closed or failed; frame dropped
    Discarded,
}

#[derive(Debug, Clone)]
pub struct StreamSession {
    id: SessionId,
    terminal: TerminalSpec,
    state: SessionState,
    events: Vec<StreamingEvent>,
    request_sent: bool,
    remote_failure: Option<String>,
}

impl StreamSession {
    pub fn new(terminal: TerminalSpec) -> Self {
        Self::with_id(SessionId::new(), terminal)
    }

    pub fn with_id(id: SessionId, terminal: TerminalSpec) -> Self {
        Self {
            id,
            terminal,
            state: SessionState::Idle,
            events: Vec::new(),
            request_sent: false,
            remote_failure: None,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn terminal_spec(&self) -> TerminalSpec {
        self.terminal
    }

    /// Ordered, append-only log of every parsed frame
    pub fn events(&self) -> &[StreamingEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<StreamingEvent> {
        self.events
    }

    /// Latest failure text the engine reported, if any
    pub fn remote_failure(&self) -> Option<&str> {
        self.remote_failure.as_deref()
    }

    pub fn is_finished(&self) -> bool {
        matches!(
            self.state,
            SessionState::Terminal | SessionState::Closed | SessionState::Error
        )
    }

    pub fn begin_connect(&mut self) -> Result<()> {
        self.expect_state(SessionState::Idle, "connect")?;
        self.state = SessionState::Connecting;
        Ok(())
    }

    /// Transport reported the connection is open
    pub fn mark_open(&mut self) -> Result<()> {
        self.expect_state(SessionState::Connecting, "open")?;
        self.state = SessionState::Open;
        Ok(())
    }

    /// Claim the one initiating send. Only allowed once, and only while open.
    pub fn claim_send(&mut self) -> Result<()> {
        if self.request_sent {
            return Err(PipelineError::InvalidTransition(format!(
                "session {} already sent its request",
                self.id
            )));
        }
        self.expect_state(SessionState::Open, "send")?;
        self.request_sent = true;
        self.state = SessionState::Streaming;
        Ok(())
    }

    /// Parse, log and classify one inbound text frame
    pub fn handle_frame(&mut self, frame: &str) -> FrameOutcome {
        match self.state {
            SessionState::Streaming | SessionState::Terminal => {}
            state => {
                debug!(session_id = %self.id, ?state, "discarding frame outside streaming");
                return FrameOutcome::Discarded;
            }
        }

        let event = match StreamingEvent::parse(frame) {
            Ok(event) => event,
            Err(e) => {
                warn!(session_id = %self.id, error = %e, "dropping malformed frame");
                return FrameOutcome::Malformed(e.to_string());
            }
        };

        if let Some(failure) = event.failure() {
            warn!(session_id = %self.id, failure = %failure, "engine reported failure");
            self.remote_failure = Some(failure);
        }

        let is_terminal = event.event_type == self.terminal.event_type
            && event.field(self.terminal.payload_field).is_some();
        self.events.push(event.clone());

        match (is_terminal, self.state) {
            (true, SessionState::Streaming) => {
                info!(session_id = %self.id, event_type = %event.event_type, "terminal event received");
                self.state = SessionState::Terminal;
                FrameOutcome::Terminal(event)
            }
            (true, _) => {
                warn!(session_id = %self.id, "ignoring duplicate terminal event");
                FrameOutcome::DuplicateTerminal
            }
            (false, _) => FrameOutcome::Appended(event),
        }
    }

    /// Transport closed. A session closed before its terminal event is an
    /// error; the engine's own failure text is preferred when one arrived.
    pub fn close(&mut self) -> Option<PipelineError> {
        match self.state {
            SessionState::Terminal | SessionState::Idle => {
                self.state = SessionState::Closed;
                None
            }
            SessionState::Closed | SessionState::Error => None,
            _ => {
                let err = self.premature_end("connection closed before completion");
                self.state = SessionState::Error;
                Some(err)
            }
        }
    }

    /// Local cancellation: close without treating it as a failure
    pub fn cancel(&mut self) {
        if !matches!(self.state, SessionState::Error) {
            self.state = SessionState::Closed;
        }
    }

    /// Transport-level failure
    pub fn fail(&mut self, reason: impl Into<String>) -> PipelineError {
        let err = self.premature_end(&reason.into());
        if self.state != SessionState::Closed {
            self.state = SessionState::Error;
        }
        err
    }

    fn premature_end(&self, reason: &str) -> PipelineError {
        match &self.remote_failure {
            Some(remote) => PipelineError::Remote(remote.clone()),
            None => PipelineError::Transport(reason.to_string()),
        }
    }

    fn expect_state(&self, expected: SessionState, op: &str) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(PipelineError::InvalidTransition(format!(
                "cannot {op} session {} in state {:?}",
                self.id, self.state
            )))
        }
    }
}
