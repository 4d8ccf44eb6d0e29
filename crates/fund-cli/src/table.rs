//! Terminal tables

use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};
use fund_pipeline::normalize::display_value;
use fund_pipeline::{CompanyRecord, ParameterSet, RiskAnalysisResult};

fn base(header: Vec<String>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

pub fn parameters(params: &ParameterSet) -> Table {
    let mut table = base(vec!["Parameter".to_string(), "Value".to_string()]);
    for param in params {
        table.add_row(vec![param.key.clone(), param.value.clone()]);
    }
    table
}

/// Columns in order of first appearance across all rows
pub fn companies(rows: &[CompanyRecord]) -> Table {
    let mut columns: Vec<&str> = Vec::new();
    for column in rows.iter().flat_map(CompanyRecord::columns) {
        if !columns.contains(&column) {
            columns.push(column);
        }
    }

    let mut table = base(columns.iter().map(|c| c.trim().to_string()).collect());
    for row in rows {
        table.add_row(
            columns
                .iter()
                .map(|c| row.get(c).map(display_value).unwrap_or_default())
                .collect::<Vec<_>>(),
        );
    }
    table
}

pub fn risk(result: &RiskAnalysisResult) -> Table {
    let mut table = base(
        ["Company", "Overall", "Category", "Status", "Reason"]
            .map(String::from)
            .to_vec(),
    );
    for company in &result.companies {
        if company.risk_scores.is_empty() {
            table.add_row(vec![
                company.company_name.clone(),
                company.overall_status.clone(),
                String::new(),
                String::new(),
                company.overall_reason.clone().unwrap_or_default(),
            ]);
        }
        for score in &company.risk_scores {
            table.add_row(vec![
                company.company_name.clone(),
                company.overall_status.clone(),
                score.category.clone(),
                score.status.clone(),
                score.reason.clone(),
            ]);
        }
    }
    table
}
