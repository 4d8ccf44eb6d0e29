//! Stage identity and per-stage wire constants

use serde::{Deserialize, Serialize};
use std::fmt;

/// Frame type and payload field that mark a session as finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalSpec {
    pub event_type: &'static str,
    pub payload_field: &'static str,
}

/// One of the three dependency-ordered pipeline stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Stage {
    Sourcing,
    Screening,
    RiskAnalysis,
}

impl Stage {
    /// All stages in pipeline order
    pub const ALL: [Stage; 3] = [Stage::Sourcing, Stage::Screening, Stage::RiskAnalysis];

    pub fn index(self) -> usize {
        match self {
            Self::Sourcing => 0,
            Self::Screening => 1,
            Self::RiskAnalysis => 2,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Following stage, `None` for the last one
    pub fn next(self) -> Option<Self> {
        Self::from_index(self.index() + 1)
    }

    /// Preceding stage, `None` for the first one
    pub fn previous(self) -> Option<Self> {
        self.index().checked_sub(1).and_then(Self::from_index)
    }

    pub fn is_last(self) -> bool {
        self.next().is_none()
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Sourcing => "Sourcing",
            Self::Screening => "Screening",
            Self::RiskAnalysis => "Risk Analysis",
        }
    }

    /// The frame that completes a session for this stage
    pub fn terminal(self) -> TerminalSpec {
        match self {
            Self::Sourcing => TerminalSpec {
                event_type: "analysis_complete",
                payload_field: "result",
            },
            Self::Screening => TerminalSpec {
                event_type: "final_result",
                payload_field: "content",
            },
            Self::RiskAnalysis => TerminalSpec {
                event_type: "session_complete",
                payload_field: "results",
            },
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
