//! Streaming session client
//!
//! [`StreamingClient::open`] connects, waits for the transport to be open and
//! sends the single initiating request. The returned [`StreamHandle`] is then
//! polled with [`StreamHandle::next_update`], which yields one
//! [`SessionUpdate`] per inbound frame until the session finishes.

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::session::{FrameOutcome, SessionId, SessionState, StreamSession};
use super::transport::{Connector, Transport};
use crate::error::{PipelineError, Result};
use crate::model::{StreamingEvent, TerminalSpec};

/// One step of a live session
#[derive(Debug)]
pub enum SessionUpdate {
    /// Non-terminal event appended to the log
    Event(StreamingEvent),
    /// The terminal event; the transport is already closed
    Terminal(StreamingEvent),
    /// A frame failed to parse and was dropped
    Dropped(String),
    /// Transport failure or close before the terminal event
    Failed(PipelineError),
    /// Closed locally through the cancellation token
    Cancelled,
}

/// Opens streaming sessions over a [`Connector`]
#[derive(Clone)]
pub struct StreamingClient {
    connector: Arc<dyn Connector>,
    idle_timeout: Option<Duration>,
}

impl StreamingClient {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            idle_timeout: None,
        }
    }

    /// Fail a session that receives nothing for `timeout`
    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub async fn open(
        &self,
        url: &str,
        terminal: TerminalSpec,
        request: &Value,
    ) -> Result<StreamHandle> {
        self.open_with_id(SessionId::new(), url, terminal, request)
            .await
    }

    /// Open a session whose id is already part of `url`
    pub async fn open_with_id(
        &self,
        id: SessionId,
        url: &str,
        terminal: TerminalSpec,
        request: &Value,
    ) -> Result<StreamHandle> {
        let mut session = StreamSession::with_id(id, terminal);
        session.begin_connect()?;

        let mut transport = self.connector.connect(url).await?;
        session.mark_open()?;

        let body = serde_json::to_string(request)?;
        session.claim_send()?;
        if let Err(e) = transport.send(body).await {
            if let Err(close_err) = transport.close().await {
                debug!(error = %close_err, "close after failed send");
            }
            return Err(e);
        }

        info!(session_id = %id, url = url, "streaming session started");
        Ok(StreamHandle {
            session,
            transport,
            transport_closed: false,
            cancel: CancellationToken::new(),
            idle_timeout: self.idle_timeout,
        })
    }
}

/// A live session: its transport, its log and its cancellation token
pub struct StreamHandle {
    session: StreamSession,
    transport: Box<dyn Transport>,
    transport_closed: bool,
    cancel: CancellationToken,
    idle_timeout: Option<Duration>,
}

impl StreamHandle {
    pub fn id(&self) -> SessionId {
        self.session.id()
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn session(&self) -> &StreamSession {
        &self.session
    }

    pub fn events(&self) -> &[StreamingEvent] {
        self.session.events()
    }

    /// Token that cancels this session from outside the polling task
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn into_session(self) -> StreamSession {
        self.session
    }

    /// Wait for and classify the next inbound frame.
    ///
    /// Returns `None` once the session has finished. A terminal event closes
    /// the transport before it is returned; nothing after it is read.
    pub async fn next_update(&mut self) -> Option<SessionUpdate> {
        loop {
            if self.session.is_finished() {
                return None;
            }

            let received = tokio::select! {
                biased;
                () = self.cancel.cancelled() => None,
                frame = recv(self.transport.as_mut(), self.idle_timeout) => Some(frame),
            };

            let Some(frame) = received else {
                debug!(session_id = %self.id(), "session cancelled");
                self.session.cancel();
                self.shutdown().await;
                return Some(SessionUpdate::Cancelled);
            };

            match frame {
                None => {
                    self.transport_closed = true;
                    return self.session.close().map(SessionUpdate::Failed);
                }
                Some(Err(e)) => {
                    let err = self.session.fail(e.to_string());
                    self.shutdown().await;
                    return Some(SessionUpdate::Failed(err));
                }
                Some(Ok(text)) => match self.session.handle_frame(&text) {
                    FrameOutcome::Appended(event) => return Some(SessionUpdate::Event(event)),
                    FrameOutcome::Terminal(event) => {
                        self.shutdown().await;
                        self.session.close();
                        return Some(SessionUpdate::Terminal(event));
                    }
                    FrameOutcome::Malformed(reason) => return Some(SessionUpdate::Dropped(reason)),
                    FrameOutcome::DuplicateTerminal | FrameOutcome::Discarded => {}
                },
            }
        }
    }

    /// Close locally. Safe to call in any state and more than once.
    pub async fn close(&mut self) {
        if !self.session.is_finished() {
            info!(session_id = %self.id(), "closing unfinished session");
            self.session.cancel();
        }
        self.cancel.cancel();
        self.shutdown().await;
    }

    async fn shutdown(&mut self) {
        if self.transport_closed {
            return;
        }
        self.transport_closed = true;
        if let Err(e) = self.transport.close().await {
            warn!(session_id = %self.id(), error = %e, "transport close failed");
        }
    }
}

async fn recv(
    transport: &mut dyn Transport,
    idle_timeout: Option<Duration>,
) -> Option<Result<String>> {
    match idle_timeout {
        None => transport.next_frame().await,
        Some(limit) => tokio::time::timeout(limit, transport.next_frame())
            .await
            .unwrap_or_else(|_| {
                Some(Err(PipelineError::transport(format!(
                    "no frame received within {limit:?}"
                ))))
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Stage;
    use crate::stream::testing::{ScriptedConnector, Script};
    use crate::stream::transport::MockConnector;
    use serde_json::json;

    const TERMINAL: &str = r#"{"type":"analysis_complete","result":{"qualified":[{"Company":"A"}]}}"#;

    #[tokio::test]
    async fn test_terminal_closes_exactly_once() {
        let script = Script::frames([
            r#"{"type":"progress"}"#,
            r#"{"type":"progress"}"#,
            TERMINAL,
            TERMINAL,
        ]);
        let probe = script.probe();
        let client = StreamingClient::new(Arc::new(ScriptedConnector::new(script)));

        let mut handle = client
            .open("ws://engine/sourcing", Stage::Sourcing.terminal(), &json!({"additionalProp1": {}}))
            .await
            .unwrap();

        assert!(matches!(handle.next_update().await, Some(SessionUpdate::Event(_))));
        assert!(matches!(handle.next_update().await, Some(SessionUpdate::Event(_))));
        let Some(SessionUpdate::Terminal(event)) = handle.next_update().await else {
            panic!("expected terminal update");
        };
        assert_eq!(event.field("result"), Some(&json!({"qualified": [{"Company": "A"}]})));

        assert!(handle.next_update().await.is_none());
        handle.close().await;

        assert_eq!(handle.events().len(), 3);
        assert_eq!(handle.state(), SessionState::Closed);
        assert_eq!(probe.close_calls(), 1);
        assert_eq!(probe.sent(), vec![r#"{"additionalProp1":{}}"#.to_string()]);
    }

    #[tokio::test]
    async fn test_malformed_frame_keeps_streaming() {
        let script = Script::frames(["not json", r#"{"type":"step_1","content":"hi"}"#]);
        let client = StreamingClient::new(Arc::new(ScriptedConnector::new(script)));
        let mut handle = client
            .open("ws://engine/screen", Stage::Screening.terminal(), &json!({}))
            .await
            .unwrap();

        assert!(matches!(handle.next_update().await, Some(SessionUpdate::Dropped(_))));
        assert!(matches!(handle.next_update().await, Some(SessionUpdate::Event(_))));
        assert_eq!(handle.state(), SessionState::Streaming);

        // script exhausted: remote closed before the terminal event
        assert!(matches!(
            handle.next_update().await,
            Some(SessionUpdate::Failed(PipelineError::Transport(_)))
        ));
        assert_eq!(handle.state(), SessionState::Error);
        assert!(handle.next_update().await.is_none());
    }

    #[tokio::test]
    async fn test_read_error_mid_stream_fails_and_closes() {
        let script = Script::frames([r#"{"type":"progress"}"#]).then_error("connection reset");
        let probe = script.probe();
        let client = StreamingClient::new(Arc::new(ScriptedConnector::new(script)));
        let mut handle = client
            .open("ws://engine/sourcing", Stage::Sourcing.terminal(), &json!({}))
            .await
            .unwrap();

        assert!(matches!(handle.next_update().await, Some(SessionUpdate::Event(_))));
        let Some(SessionUpdate::Failed(PipelineError::Transport(msg))) = handle.next_update().await else {
            panic!("expected transport failure");
        };
        assert!(msg.contains("connection reset"));
        assert_eq!(handle.state(), SessionState::Error);
        assert_eq!(probe.close_calls(), 1);
        assert!(handle.next_update().await.is_none());

        handle.close().await;
        assert_eq!(probe.close_calls(), 1);
    }

    #[tokio::test]
    async fn test_remote_error_surfaces_engine_message() {
        let script = Script::frames([r#"{"type":"error","content":"Invalid request"}"#]);
        let client = StreamingClient::new(Arc::new(ScriptedConnector::new(script)));
        let mut handle = client
            .open("ws://engine/screen", Stage::Screening.terminal(), &json!({}))
            .await
            .unwrap();

        assert!(matches!(handle.next_update().await, Some(SessionUpdate::Event(_))));
        let Some(SessionUpdate::Failed(PipelineError::Remote(msg))) = handle.next_update().await else {
            panic!("expected remote failure");
        };
        assert_eq!(msg, "Invalid request");
    }

    #[tokio::test]
    async fn test_cancellation_closes_transport() {
        let script = Script::frames([r#"{"type":"progress"}"#]).hang_when_empty();
        let probe = script.probe();
        let client = StreamingClient::new(Arc::new(ScriptedConnector::new(script)));
        let mut handle = client
            .open("ws://engine/risk", Stage::RiskAnalysis.terminal(), &json!({}))
            .await
            .unwrap();

        assert!(matches!(handle.next_update().await, Some(SessionUpdate::Event(_))));
        handle.cancellation_token().cancel();
        assert!(matches!(handle.next_update().await, Some(SessionUpdate::Cancelled)));
        assert_eq!(handle.state(), SessionState::Closed);
        assert_eq!(probe.close_calls(), 1);
    }

    #[tokio::test]
    async fn test_idle_timeout_fails_session() {
        let script = Script::frames(Vec::<&str>::new()).hang_when_empty();
        let client = StreamingClient::new(Arc::new(ScriptedConnector::new(script)))
            .with_idle_timeout(Some(Duration::from_millis(20)));
        let mut handle = client
            .open("ws://engine/risk", Stage::RiskAnalysis.terminal(), &json!({}))
            .await
            .unwrap();

        assert!(matches!(
            handle.next_update().await,
            Some(SessionUpdate::Failed(PipelineError::Transport(_)))
        ));
    }

    #[tokio::test]
    async fn test_connect_failure_propagates() {
        let mut connector = MockConnector::new();
        connector
            .expect_connect()
            .returning(|url| Err(PipelineError::transport(format!("refused: {url}"))));
        let client = StreamingClient::new(Arc::new(connector));

        let err = client
            .open("ws://down", Stage::Sourcing.terminal(), &json!({}))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, PipelineError::Transport(msg) if msg.contains("ws://down")));
    }
}
