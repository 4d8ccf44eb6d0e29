//! Stage-gating wizard
//!
//! - [`session`]: the single state value and its read-side queries
//! - [`controller`]: the reducer that gates progression and emits effects
//! - [`request`]: stage request bodies built from the current selection

pub mod controller;
pub mod request;
pub mod session;

pub use controller::{PrimaryAction, WizardAction, WizardController, WizardEffect};
pub use request::stage_request;
pub use session::{InitialParameters, Notice, NoticeLevel, StageStatus, WizardSession};
