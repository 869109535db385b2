pub mod assess;
pub mod history;
pub mod schema;
pub mod state;
pub mod validate;

use crate::core::{AssetAcquisition, Company, LineItem, Operation, Period, TaxRule};
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

/// Documents and rules of one company period, as read by the CLI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AssessmentInput {
    pub company: Company,
    pub period: Period,
    #[serde(default)]
    pub items: Vec<LineItem>,
    #[serde(default)]
    pub operations: Vec<Operation>,
    #[serde(default)]
    pub acquisitions: Vec<AssetAcquisition>,
    /// Rules in force for the company's jurisdiction
    #[serde(default)]
    pub rules: Vec<TaxRule>,
}

/// Read an input file (JSON), or stdin with "-"
pub fn read_input(path: &Path) -> anyhow::Result<AssessmentInput> {
    if path.as_os_str() == "-" {
        let mut buffer = Vec::new();
        BufReader::new(io::stdin().lock()).read_to_end(&mut buffer)?;
        if buffer.is_empty() {
            anyhow::bail!("No input received. Provide a file or pipe data to stdin.");
        }
        Ok(serde_json::from_slice(&buffer)?)
    } else {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}

/// Read a JSON list of rules
pub fn read_rules(path: &Path) -> anyhow::Result<Vec<TaxRule>> {
    let reader = BufReader::new(File::open(path)?);
    let rules: Vec<TaxRule> = serde_json::from_reader(reader)?;
    log::info!("Read {} rules from {}", rules.len(), path.display());
    Ok(rules)
}

pub(crate) fn format_brl(amount: Decimal) -> String {
    format!("{:.2}", amount)
}

pub(crate) fn format_pct(rate: Decimal) -> String {
    format!("{}%", rate.normalize())
}
