//! Staged fund analysis pipeline
//!
//! This crate drives a three-stage investment workflow against remote
//! analysis engines:
//!
//! - Sourcing: qualify companies from mandate sourcing parameters
//! - Screening: screen the selected companies on financial parameters
//! - Risk Analysis: score the screened companies per risk category
//!
//! Each stage runs as one streaming session. Progress frames are logged as
//! they arrive and the stage's terminal frame is aggregated into a
//! [`StageResult`].
//!
//! # Architecture
//!
//! - [`normalize`]: turns mandate payloads of varying shape into ordered
//!   parameter sets
//! - [`selection`]: select-all-by-default flags over parameters and rows
//! - [`stream`]: session state machine, socket seam and streaming client
//! - [`aggregate`]: terminal payload to [`StageResult`] transforms
//! - [`wizard`]: the stage-gating reducer
//! - [`runner`]: executes wizard effects against live sessions
//! - [`mandate`]: mandate upload and parsing, upstream of the wizard
//! - [`export`]: risk analysis CSV
//!
//! # Example
//!
//! ```rust,ignore
//! use fund_pipeline::{MandateClient, PipelineConfig, PipelineRunner, WizardAction};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = PipelineConfig::from_env()?;
//!     let criteria = MandateClient::new(config.clone())?
//!         .intake("mandate.pdf".as_ref(), None)
//!         .await?;
//!
//!     let mut runner = PipelineRunner::new(config, criteria.initial_parameters());
//!     runner.dispatch(WizardAction::Primary).await?;
//!     runner.drive().await;
//!     runner.dispatch(WizardAction::Next).await?;
//!     Ok(())
//! }
//! ```

pub mod aggregate;
pub mod config;
pub mod error;
pub mod export;
pub mod mandate;
pub mod model;
pub mod normalize;
pub mod runner;
pub mod selection;
pub mod stream;
pub mod wizard;

// Re-export main types for convenience
pub use config::PipelineConfig;
pub use error::{ErrorKind, PipelineError, Result};
pub use export::{risk_csv, write_risk_csv};
pub use mandate::{MandateClient, MandateCriteria, UploadReceipt};
pub use model::{
    CompanyRecord, Parameter, ParameterSet, RiskAnalysisResult, RowId, Stage, StageResult,
    StreamingEvent,
};
pub use normalize::{MandateSection, ParameterChain};
pub use runner::PipelineRunner;
pub use selection::SelectionStore;
pub use stream::{StreamingClient, WsConnector};
pub use wizard::{
    InitialParameters, PrimaryAction, StageStatus, WizardAction, WizardController, WizardEffect,
};
