//! Risk analysis CSV export

use chrono::NaiveDate;
use csv::{QuoteStyle, Terminator, WriterBuilder};
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{PipelineError, Result};
use crate::model::RiskAnalysisResult;

pub const CSV_HEADER: [&str; 6] = [
    "S.No.",
    "Company Name",
    "Overall Status",
    "Category",
    "Status",
    "Reason",
];

/// One row per `(company, risk score)` pair. Fields are quoted only when they
/// contain a comma, a quote or a line break.
pub fn risk_csv(result: &RiskAnalysisResult) -> Result<String> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Necessary)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(CSV_HEADER)?;
    for (index, company) in result.companies.iter().enumerate() {
        let serial = (index + 1).to_string();
        for score in &company.risk_scores {
            writer.write_record([
                serial.as_str(),
                company.company_name.as_str(),
                company.overall_status.as_str(),
                score.category.as_str(),
                score.status.as_str(),
                score.reason.as_str(),
            ])?;
        }
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| PipelineError::Io(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| PipelineError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
}

pub fn risk_csv_filename(date: NaiveDate) -> String {
    format!("risk-analysis-{}.csv", date.format("%Y-%m-%d"))
}

/// Write the export into `dir`, returning the file's path
pub fn write_risk_csv(dir: &Path, result: &RiskAnalysisResult, date: NaiveDate) -> Result<PathBuf> {
    let path = dir.join(risk_csv_filename(date));
    std::fs::write(&path, risk_csv(result)?)?;
    info!(path = %path.display(), companies = result.companies.len(), "risk analysis exported");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RiskCompany, RiskScore};

    fn score(category: &str, status: &str, reason: &str) -> RiskScore {
        RiskScore {
            category: category.to_string(),
            status: status.to_string(),
            reason: reason.to_string(),
        }
    }

    fn sample() -> RiskAnalysisResult {
        RiskAnalysisResult::new(vec![
            RiskCompany {
                company_name: "TestCorp".to_string(),
                risk_scores: vec![
                    score("Governance Quality", "SAFE", "ok, fine"),
                    score("Competitive Position", "SAFE", "fine"),
                ],
                overall_status: "SAFE".to_string(),
                overall_reason: None,
            },
            RiskCompany {
                company_name: "Empty Inc".to_string(),
                risk_scores: Vec::new(),
                overall_status: "UNKNOWN".to_string(),
                overall_reason: None,
            },
            RiskCompany {
                company_name: "FinanceHub".to_string(),
                risk_scores: vec![score("Regulatory / Legal Risk", "UNSAFE", "said \"no\"\nthen left")],
                overall_status: "UNSAFE".to_string(),
                overall_reason: None,
            },
        ])
    }

    #[test]
    fn test_quoting_only_when_needed() {
        let csv = risk_csv(&sample()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines[0], "S.No.,Company Name,Overall Status,Category,Status,Reason");
        assert_eq!(lines[1], r#"1,TestCorp,SAFE,Governance Quality,SAFE,"ok, fine""#);
        assert_eq!(lines[2], "1,TestCorp,SAFE,Competitive Position,SAFE,fine");
        assert!(csv.contains("3,FinanceHub,UNSAFE,Regulatory / Legal Risk,UNSAFE,\"said \"\"no\"\"\nthen left\"\n"));
    }

    #[test]
    fn test_company_without_scores_has_no_rows() {
        let csv = risk_csv(&sample()).unwrap();
        assert!(!csv.contains("Empty Inc"));
    }

    #[test]
    fn test_write_uses_dated_filename() {
        let dir = tempfile::tempdir().unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();

        let path = write_risk_csv(dir.path(), &sample(), date).unwrap();
        assert_eq!(path.file_name().unwrap(), "risk-analysis-2025-03-07.csv");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), risk_csv(&sample()).unwrap());
    }
}
