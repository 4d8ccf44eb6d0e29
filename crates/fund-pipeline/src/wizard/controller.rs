//! Wizard controller
//!
//! A reducer over [`WizardSession`]. Each [`WizardAction`] mutates the
//! session and returns the [`WizardEffect`]s the caller must carry out; the
//! controller itself never performs I/O.

use serde_json::Value;
use tracing::{debug, info, warn};

use super::request::stage_request;
use super::session::{InitialParameters, Notice, StageStatus, WizardSession};
use crate::error::{PipelineError, Result};
use crate::model::{RowId, Stage, StageResult, StreamingEvent};

#[derive(Debug, Clone, PartialEq)]
pub enum WizardAction {
    ToggleParameter { stage: Stage, key: String },
    SelectAllParameters(Stage),
    ClearParameters(Stage),
    ToggleCompany(RowId),
    /// Select every row of this stage's result
    SelectAllCompanies(Stage),
    ClearCompanies(Stage),
    /// The current stage's principal button
    Primary,
    Next,
    Back,
    StreamEvent { stage: Stage, event: StreamingEvent },
    StageCompleted { stage: Stage, result: StageResult },
    StageFailed { stage: Stage, reason: String },
    /// The stage's session ended without completing, e.g. cancelled
    SessionClosed(Stage),
    /// Clear this stage's result and everything derived from it
    Reset(Stage),
    RetryEmpty(Stage),
}

#[derive(Debug, Clone, PartialEq)]
pub enum WizardEffect {
    OpenStream { stage: Stage, request: Value },
    CloseStream { stage: Stage },
}

/// What the principal button of a stage does right now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimaryAction {
    Run,
    Next,
    Inert,
}

#[derive(Debug, Clone)]
pub struct WizardController {
    session: WizardSession,
}

impl WizardController {
    pub fn new(initial: InitialParameters) -> Self {
        Self {
            session: WizardSession::new(initial),
        }
    }

    pub fn session(&self) -> &WizardSession {
        &self.session
    }

    pub fn current_stage(&self) -> Stage {
        self.session.current
    }

    pub fn primary_action(&self, stage: Stage) -> PrimaryAction {
        let slot = self.session.slot(stage);
        match (&slot.result, &slot.status) {
            (_, StageStatus::Running) => PrimaryAction::Inert,
            (None, _) => PrimaryAction::Run,
            (Some(_), _) if stage.is_last() => PrimaryAction::Inert,
            (Some(_), _) => PrimaryAction::Next,
        }
    }

    /// Whether the stage's remote action may start
    pub fn can_run(&self, stage: Stage) -> bool {
        self.primary_action(stage) == PrimaryAction::Run && self.check_run(stage).is_ok()
    }

    /// Whether the current stage may advance
    pub fn can_next(&self) -> bool {
        self.check_next().is_ok()
    }

    /// Apply one action
    pub fn reduce(&mut self, action: WizardAction) -> Result<Vec<WizardEffect>> {
        let result = self.apply(action);
        if let Err(e @ PipelineError::Validation(_)) = &result {
            self.session.notice = Some(Notice::warning(e.to_string()));
        }
        result
    }

    fn apply(&mut self, action: WizardAction) -> Result<Vec<WizardEffect>> {
        match action {
            WizardAction::ToggleParameter { stage, key } => {
                self.session
                    .slot_mut(stage)
                    .parameter_selection
                    .toggle(&key);
                Ok(Vec::new())
            }
            WizardAction::SelectAllParameters(stage) => {
                let slot = self.session.slot_mut(stage);
                let keys: Vec<String> = slot.parameters.keys().map(str::to_string).collect();
                slot.parameter_selection.select_all(&keys);
                Ok(Vec::new())
            }
            WizardAction::ClearParameters(stage) => {
                self.session.slot_mut(stage).parameter_selection.clear();
                Ok(Vec::new())
            }
            WizardAction::ToggleCompany(row) => {
                let stage = self.session.stage_of_row(row).ok_or_else(|| {
                    PipelineError::InvalidTransition(format!("{row} is not part of any result"))
                })?;
                self.session.slot_mut(stage).row_selection.toggle(&row);
                Ok(Vec::new())
            }
            WizardAction::SelectAllCompanies(stage) => {
                let slot = self.session.slot_mut(stage);
                slot.row_selection.select_all(&slot.rows);
                Ok(Vec::new())
            }
            WizardAction::ClearCompanies(stage) => {
                self.session.slot_mut(stage).row_selection.clear();
                Ok(Vec::new())
            }
            WizardAction::Primary => self.primary(),
            WizardAction::Next => self.next(),
            WizardAction::Back => self.back(),
            WizardAction::StreamEvent { stage, event } => {
                if self.session.active == Some(stage) {
                    self.session.slot_mut(stage).panel.push(event);
                } else {
                    debug!(stage = %stage, event_type = %event.event_type, "event for inactive stage ignored");
                }
                Ok(Vec::new())
            }
            WizardAction::StageCompleted { stage, result } => {
                self.complete(stage, result);
                Ok(Vec::new())
            }
            WizardAction::StageFailed { stage, reason } => {
                if self.session.active == Some(stage) {
                    warn!(stage = %stage, reason = %reason, "stage failed");
                    self.session.active = None;
                    self.session.notice = Some(Notice::error(format!("{stage} failed: {reason}")));
                    self.session.slot_mut(stage).status = StageStatus::Failed(reason);
                }
                Ok(Vec::new())
            }
            WizardAction::SessionClosed(stage) => {
                if self.session.active == Some(stage) {
                    info!(stage = %stage, "session closed before completion");
                    self.session.active = None;
                    let slot = self.session.slot_mut(stage);
                    if slot.status == StageStatus::Running {
                        slot.status = StageStatus::Idle;
                    }
                }
                Ok(Vec::new())
            }
            WizardAction::Reset(stage) => self.reset(stage),
            WizardAction::RetryEmpty(stage) => {
                if self.session.status(stage) != &StageStatus::NoResults {
                    return Err(PipelineError::InvalidTransition(format!(
                        "{stage} has results to keep; use reset instead"
                    )));
                }
                self.reset(stage)
            }
        }
    }

    fn primary(&mut self) -> Result<Vec<WizardEffect>> {
        let stage = self.session.current;
        match self.primary_action(stage) {
            PrimaryAction::Next => self.next(),
            PrimaryAction::Inert => Ok(Vec::new()),
            PrimaryAction::Run => self.run(stage),
        }
    }

    fn run(&mut self, stage: Stage) -> Result<Vec<WizardEffect>> {
        self.check_run(stage)?;

        let request = {
            let parameters = self.session.selected_parameters(stage);
            let companies = self.session.selected_companies(stage);
            stage_request(stage, &parameters, &companies)
        };

        let mut effects = Vec::new();
        if let Some(previous) = self.session.active.take() {
            effects.push(WizardEffect::CloseStream { stage: previous });
            self.session.slot_mut(previous).status = StageStatus::Idle;
        }

        let slot = self.session.slot_mut(stage);
        slot.panel.clear();
        slot.status = StageStatus::Running;
        self.session.active = Some(stage);
        self.session.notice = None;

        info!(stage = %stage, "stage started");
        effects.push(WizardEffect::OpenStream { stage, request });
        Ok(effects)
    }

    fn check_run(&self, stage: Stage) -> Result<()> {
        if self.session.selected_parameters(stage).is_empty() {
            return Err(PipelineError::validation(format!(
                "select at least one {} parameter",
                stage.label().to_lowercase()
            )));
        }

        let Some(previous) = stage.previous() else {
            return Ok(());
        };
        let has_rows = self
            .session
            .result(previous)
            .is_some_and(|r| !r.is_empty());
        if !has_rows {
            return Err(PipelineError::validation(format!(
                "{previous} has no results to build on"
            )));
        }
        if self.session.selected_companies(stage).is_empty() {
            return Err(PipelineError::validation(format!(
                "select at least one company from {previous}"
            )));
        }
        Ok(())
    }

    fn next(&mut self) -> Result<Vec<WizardEffect>> {
        self.check_next()?;
        let from = self.session.current;
        if let Some(to) = from.next() {
            self.session.current = to;
            self.session.notice = None;
            info!(from = %from, to = %to, "advanced stage");
        }
        Ok(Vec::new())
    }

    fn check_next(&self) -> Result<()> {
        let stage = self.session.current;
        if stage.is_last() {
            return Err(PipelineError::InvalidTransition(format!(
                "{stage} is the last stage"
            )));
        }
        match self.session.result(stage) {
            Some(result) if !result.is_empty() => Ok(()),
            Some(_) => Err(PipelineError::validation(format!(
                "{stage} returned no results"
            ))),
            None => Err(PipelineError::validation(format!(
                "run {stage} before continuing"
            ))),
        }
    }

    fn back(&mut self) -> Result<Vec<WizardEffect>> {
        let leaving = self.session.current;
        let Some(to) = leaving.previous() else {
            return Err(PipelineError::InvalidTransition(format!(
                "{leaving} is the first stage"
            )));
        };

        let mut effects = Vec::new();
        if self.session.active == Some(leaving) {
            self.session.active = None;
            self.session.slot_mut(leaving).status = StageStatus::Idle;
            effects.push(WizardEffect::CloseStream { stage: leaving });
        }
        self.session.slot_mut(leaving).panel.clear();
        self.session.current = to;
        self.session.notice = None;

        info!(from = %leaving, to = %to, "went back");
        Ok(effects)
    }

    fn complete(&mut self, stage: Stage, result: StageResult) {
        if self.session.active != Some(stage) {
            warn!(stage = %stage, "completion for inactive stage ignored");
            return;
        }
        if result.stage() != stage {
            warn!(stage = %stage, got = %result.stage(), "completion carries another stage's result");
            return;
        }
        self.session.active = None;

        if result.is_empty() {
            warn!(stage = %stage, "stage returned no results");
            self.session.notice = Some(Notice::warning(
                PipelineError::EmptyResult { stage }.to_string(),
            ));
        } else {
            info!(stage = %stage, rows = result.primary_len(), "stage completed");
        }
        self.session.store_result(stage, result);
    }

    /// Only the current stage or an earlier one can be reset, so the wizard
    /// never lands on a stage whose upstream has no result.
    fn reset(&mut self, stage: Stage) -> Result<Vec<WizardEffect>> {
        let current = self.session.current;
        if stage > current {
            return Err(PipelineError::InvalidTransition(format!(
                "cannot reset {stage} while on {current}"
            )));
        }

        // the live session always belongs to a stage at or after `stage`
        let mut effects = Vec::new();
        if let Some(active) = self.session.active.take() {
            effects.push(WizardEffect::CloseStream { stage: active });
        }

        for downstream in Stage::ALL.into_iter().filter(|s| *s >= stage) {
            self.session.slot_mut(downstream).clear_result();
        }
        self.session.current = stage;
        self.session.notice = None;

        info!(stage = %stage, "stage reset");
        Ok(effects)
    }
}
