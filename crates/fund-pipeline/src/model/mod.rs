//! Data model shared by every pipeline component

pub mod company;
pub mod event;
pub mod parameter;
pub mod result;
pub mod stage;

pub use company::{CompanyRecord, RowId};
pub use event::StreamingEvent;
pub use parameter::{Parameter, ParameterSet};
pub use result::{
    RiskAnalysisResult, RiskCompany, RiskScore, RiskSummary, ScreeningResult, SourcingResult,
    StageResult,
};
pub use stage::{Stage, TerminalSpec};
