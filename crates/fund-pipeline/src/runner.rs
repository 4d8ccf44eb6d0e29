//! Pipeline runner
//!
//! Executes the controller's effects against real streaming sessions and
//! feeds every session update back into the controller. Owns at most one live
//! [`StreamHandle`]; opening a new one always closes the previous first.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::aggregate::aggregate;
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::model::Stage;
use crate::stream::{SessionId, SessionUpdate, StreamHandle, StreamingClient, WsConnector};
use crate::wizard::{InitialParameters, WizardAction, WizardController, WizardEffect, WizardSession};

struct LiveStream {
    stage: Stage,
    handle: StreamHandle,
}

pub struct PipelineRunner {
    config: PipelineConfig,
    client: StreamingClient,
    controller: WizardController,
    live: Option<LiveStream>,
}

impl PipelineRunner {
    /// Runner over WebSocket sessions built from `config`
    pub fn new(config: PipelineConfig, initial: InitialParameters) -> Self {
        let client = StreamingClient::new(Arc::new(WsConnector::new(config.connect_timeout)))
            .with_idle_timeout(config.idle_timeout);
        Self::with_client(config, client, initial)
    }

    pub fn with_client(
        config: PipelineConfig,
        client: StreamingClient,
        initial: InitialParameters,
    ) -> Self {
        Self {
            config,
            client,
            controller: WizardController::new(initial),
            live: None,
        }
    }

    pub fn controller(&self) -> &WizardController {
        &self.controller
    }

    pub fn session(&self) -> &WizardSession {
        self.controller.session()
    }

    /// Token of the live session, for cancelling it from another task
    pub fn cancellation_token(&self) -> Option<CancellationToken> {
        self.live.as_ref().map(|live| live.handle.cancellation_token())
    }

    pub fn is_streaming(&self) -> bool {
        self.live.is_some()
    }

    /// Apply a user action and carry out its effects.
    ///
    /// Only errors about the action itself are returned. A session that fails
    /// to open is recorded on the stage instead.
    pub async fn dispatch(&mut self, action: WizardAction) -> Result<()> {
        let effects = self.controller.reduce(action)?;
        for effect in effects {
            self.execute(effect).await;
        }
        Ok(())
    }

    /// Process one update from the live session. Returns whether a session is
    /// still live afterwards.
    pub async fn pump(&mut self) -> bool {
        let Some(live) = self.live.as_mut() else {
            return false;
        };
        let stage = live.stage;

        match live.handle.next_update().await {
            Some(SessionUpdate::Event(event)) => {
                self.feed(WizardAction::StreamEvent { stage, event });
            }
            Some(SessionUpdate::Dropped(reason)) => {
                debug!(stage = %stage, reason = %reason, "frame dropped");
            }
            Some(SessionUpdate::Terminal(terminal)) => {
                let Some(live) = self.live.take() else {
                    return false;
                };
                let outcome = aggregate(stage, &terminal, live.handle.events());
                self.feed(WizardAction::StreamEvent {
                    stage,
                    event: terminal,
                });
                match outcome {
                    Ok(result) => self.feed(WizardAction::StageCompleted { stage, result }),
                    Err(e) => self.feed(WizardAction::StageFailed {
                        stage,
                        reason: e.to_string(),
                    }),
                }
            }
            Some(SessionUpdate::Failed(e)) => {
                self.live = None;
                self.feed(WizardAction::StageFailed {
                    stage,
                    reason: e.to_string(),
                });
            }
            Some(SessionUpdate::Cancelled) | None => {
                self.live = None;
                self.feed(WizardAction::SessionClosed(stage));
            }
        }
        self.live.is_some()
    }

    /// Pump until no session is live
    pub async fn drive(&mut self) {
        while self.pump().await {}
    }

    /// Close whatever session is live
    pub async fn shutdown(&mut self) {
        if let Some(stage) = self.close_live().await {
            self.feed(WizardAction::SessionClosed(stage));
        }
    }

    async fn execute(&mut self, effect: WizardEffect) {
        match effect {
            WizardEffect::CloseStream { stage } => {
                if self.live.as_ref().is_some_and(|live| live.stage == stage) {
                    self.close_live().await;
                }
            }
            WizardEffect::OpenStream { stage, request } => {
                self.close_live().await;

                let id = SessionId::new();
                let url = self.config.stage_url(stage, id);
                match self
                    .client
                    .open_with_id(id, &url, stage.terminal(), &request)
                    .await
                {
                    Ok(handle) => {
                        info!(stage = %stage, session_id = %id, "stage session open");
                        self.live = Some(LiveStream { stage, handle });
                    }
                    Err(e) => {
                        warn!(stage = %stage, url = %url, error = %e, "failed to open stage session");
                        self.feed(WizardAction::StageFailed {
                            stage,
                            reason: e.to_string(),
                        });
                    }
                }
            }
        }
    }

    async fn close_live(&mut self) -> Option<Stage> {
        let mut live = self.live.take()?;
        live.handle.close().await;
        Some(live.stage)
    }

    fn feed(&mut self, action: WizardAction) {
        if let Err(e) = self.controller.reduce(action) {
            warn!(error = %e, "session update rejected by controller");
        }
    }
}
