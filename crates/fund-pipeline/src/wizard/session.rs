//! Wizard session state
//!
//! One [`WizardSession`] value holds everything the controller decides on:
//! the current stage and, per stage, its parameters, result, row selection,
//! status and displayed streaming panel.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::{CompanyRecord, Parameter, ParameterSet, RowId, Stage, StageResult, StreamingEvent};
use crate::selection::SelectionStore;

/// Parameter sets a session starts from, one per stage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitialParameters {
    pub sourcing: ParameterSet,
    pub screening: ParameterSet,
    pub risk: ParameterSet,
}

impl InitialParameters {
    pub fn for_stage(&self, stage: Stage) -> &ParameterSet {
        match stage {
            Stage::Sourcing => &self.sourcing,
            Stage::Screening => &self.screening,
            Stage::RiskAnalysis => &self.risk,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StageStatus {
    #[default]
    Idle,
    Running,
    Completed,
    /// Terminal payload parsed but its primary list was empty
    NoResults,
    Failed(String),
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Running => f.write_str("running"),
            Self::Completed => f.write_str("completed"),
            Self::NoResults => f.write_str("no results"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// Transient user-facing message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Everything owned by one stage
#[derive(Debug, Clone, Default)]
pub(crate) struct StageSlot {
    pub(crate) parameters: ParameterSet,
    pub(crate) parameter_selection: SelectionStore<String>,
    pub(crate) result: Option<StageResult>,
    /// Row ids parallel to `result.company_rows()`
    pub(crate) rows: Vec<RowId>,
    pub(crate) row_selection: SelectionStore<RowId>,
    pub(crate) status: StageStatus,
    pub(crate) panel: Vec<StreamingEvent>,
}

impl StageSlot {
    fn new(parameters: ParameterSet) -> Self {
        let parameter_selection =
            SelectionStore::all_selected(parameters.iter().map(|p| p.key.clone()));
        Self {
            parameters,
            parameter_selection,
            ..Self::default()
        }
    }

    pub(crate) fn clear_result(&mut self) {
        self.result = None;
        self.rows.clear();
        self.row_selection.reset();
        self.status = StageStatus::Idle;
        self.panel.clear();
    }
}

#[derive(Debug, Clone)]
pub struct WizardSession {
    pub(crate) current: Stage,
    pub(crate) slots: [StageSlot; 3],
    pub(crate) active: Option<Stage>,
    pub(crate) notice: Option<Notice>,
    next_row: u64,
}

impl WizardSession {
    pub fn new(initial: InitialParameters) -> Self {
        let InitialParameters {
            sourcing,
            screening,
            risk,
        } = initial;
        Self {
            current: Stage::Sourcing,
            slots: [
                StageSlot::new(sourcing),
                StageSlot::new(screening),
                StageSlot::new(risk),
            ],
            active: None,
            notice: None,
            next_row: 0,
        }
    }

    pub fn current_stage(&self) -> Stage {
        self.current
    }

    /// Stage whose streaming session is live, if any
    pub fn active_stream(&self) -> Option<Stage> {
        self.active
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn parameters(&self, stage: Stage) -> &ParameterSet {
        &self.slot(stage).parameters
    }

    pub fn is_parameter_selected(&self, stage: Stage, key: &str) -> bool {
        self.slot(stage)
            .parameter_selection
            .is_selected(&key.to_string())
    }

    /// Selected parameters in display order
    pub fn selected_parameters(&self, stage: Stage) -> Vec<&Parameter> {
        let slot = self.slot(stage);
        slot.parameter_selection
            .selected(slot.parameters.as_slice(), |p| p.key.clone())
    }

    pub fn result(&self, stage: Stage) -> Option<&StageResult> {
        self.slot(stage).result.as_ref()
    }

    pub fn status(&self, stage: Stage) -> &StageStatus {
        &self.slot(stage).status
    }

    /// Streaming log shown for the stage
    pub fn panel(&self, stage: Stage) -> &[StreamingEvent] {
        &self.slot(stage).panel
    }

    /// Company rows of `stage`'s result with their identities
    pub fn rows(&self, stage: Stage) -> Vec<(RowId, &CompanyRecord)> {
        let slot = self.slot(stage);
        let records = slot.result.as_ref().map_or(&[][..], StageResult::company_rows);
        slot.rows.iter().copied().zip(records).collect()
    }

    pub fn is_row_selected(&self, row: RowId) -> bool {
        self.slots
            .iter()
            .any(|slot| slot.row_selection.is_selected(&row))
    }

    /// Selected rows of `stage`'s own result, in result order
    pub fn selected_rows(&self, stage: Stage) -> Vec<&CompanyRecord> {
        let selection = &self.slot(stage).row_selection;
        self.rows(stage)
            .into_iter()
            .filter(|(id, _)| selection.is_selected(id))
            .map(|(_, record)| record)
            .collect()
    }

    /// Companies that feed `stage`'s request: the selected rows of the
    /// previous stage. Empty for the first stage.
    pub fn selected_companies(&self, stage: Stage) -> Vec<&CompanyRecord> {
        stage
            .previous()
            .map(|prev| self.selected_rows(prev))
            .unwrap_or_default()
    }

    pub(crate) fn slot(&self, stage: Stage) -> &StageSlot {
        &self.slots[stage.index()]
    }

    pub(crate) fn slot_mut(&mut self, stage: Stage) -> &mut StageSlot {
        &mut self.slots[stage.index()]
    }

    /// Stage whose result holds `row`
    pub(crate) fn stage_of_row(&self, row: RowId) -> Option<Stage> {
        Stage::ALL
            .into_iter()
            .find(|stage| self.slot(*stage).rows.contains(&row))
    }

    /// Store a fresh result and seed its row selection with every row selected
    pub(crate) fn store_result(&mut self, stage: Stage, result: StageResult) {
        let count = result.company_rows().len();
        let rows: Vec<RowId> = (0..count).map(|_| self.allocate_row()).collect();

        let slot = self.slot_mut(stage);
        slot.row_selection.reseed(rows.iter().copied());
        slot.rows = rows;
        slot.status = if result.is_empty() {
            StageStatus::NoResults
        } else {
            StageStatus::Completed
        };
        slot.result = Some(result);
    }

    fn allocate_row(&mut self) -> RowId {
        let id = RowId::new(self.next_row);
        self.next_row += 1;
        id
    }
}
