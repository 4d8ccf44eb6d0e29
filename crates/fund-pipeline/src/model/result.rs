//! Canonical per-stage results

use serde::{Deserialize, Serialize};

use super::{CompanyRecord, Stage};

/// Output of the sourcing engine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourcingResult {
    pub qualified: Vec<CompanyRecord>,
}

/// Output of the screening engine plus the narrative it streamed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreeningResult {
    pub company_details: Vec<CompanyRecord>,
    pub agent_thinking: Vec<String>,
}

/// Verdict for one risk category of one company
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskScore {
    pub category: String,
    pub status: String,
    pub reason: String,
}

/// Risk verdicts for one company
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskCompany {
    pub company_name: String,
    pub risk_scores: Vec<RiskScore>,
    pub overall_status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall_reason: Option<String>,
}

impl RiskCompany {
    /// Overall status compares case-insensitively against `SAFE`
    pub fn is_safe(&self) -> bool {
        self.overall_status.to_uppercase() == "SAFE"
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskSummary {
    pub total: usize,
    pub passed: usize,
}

impl RiskSummary {
    pub fn from_companies(companies: &[RiskCompany]) -> Self {
        Self {
            total: companies.len(),
            passed: companies.iter().filter(|c| c.is_safe()).count(),
        }
    }

    pub fn failed(&self) -> usize {
        self.total - self.passed
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskAnalysisResult {
    pub companies: Vec<RiskCompany>,
    pub summary: RiskSummary,
}

impl RiskAnalysisResult {
    pub fn new(companies: Vec<RiskCompany>) -> Self {
        let summary = RiskSummary::from_companies(&companies);
        Self { companies, summary }
    }
}

/// Result of one completed stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "camelCase")]
pub enum StageResult {
    Sourcing(SourcingResult),
    Screening(ScreeningResult),
    RiskAnalysis(RiskAnalysisResult),
}

impl StageResult {
    pub fn stage(&self) -> Stage {
        match self {
            Self::Sourcing(_) => Stage::Sourcing,
            Self::Screening(_) => Stage::Screening,
            Self::RiskAnalysis(_) => Stage::RiskAnalysis,
        }
    }

    /// Length of the list that gates progression
    pub fn primary_len(&self) -> usize {
        match self {
            Self::Sourcing(r) => r.qualified.len(),
            Self::Screening(r) => r.company_details.len(),
            Self::RiskAnalysis(r) => r.companies.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.primary_len() == 0
    }

    /// Company rows that feed the next stage's request
    pub fn company_rows(&self) -> &[CompanyRecord] {
        match self {
            Self::Sourcing(r) => &r.qualified,
            Self::Screening(r) => &r.company_details,
            Self::RiskAnalysis(_) => &[],
        }
    }

    pub fn as_risk(&self) -> Option<&RiskAnalysisResult> {
        match self {
            Self::RiskAnalysis(r) => Some(r),
            _ => None,
        }
    }
}
