//! Validate command - surface input problems that would fail an assessment

use crate::cmd::{read_input, AssessmentInput};
use crate::core::{Cfop, Ncm};
use crate::tax::Classified;
use clap::Args;
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct ValidateCommand {
    /// Input JSON. Reads stdin with "-".
    #[arg(short, long, default_value = "-")]
    input: PathBuf,

    /// Output as JSON instead of formatted text
    #[arg(long)]
    json: bool,
}

/// A validation issue for output
#[derive(Debug, Clone, Serialize)]
struct ValidationIssue {
    #[serde(rename = "type")]
    issue_type: &'static str,
    subject: String,
    message: String,
}

#[derive(Debug, Serialize)]
struct ValidationOutput {
    company: String,
    period: String,
    issue_count: usize,
    issues: Vec<ValidationIssue>,
}

impl ValidateCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let input = read_input(&self.input)?;
        let issues = find_issues(&input);

        if self.json {
            let output = ValidationOutput {
                company: input.company.id.clone(),
                period: input.period.to_string(),
                issue_count: issues.len(),
                issues: issues.clone(),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            print_text(&input, &issues);
        }

        // Exit with code 1 if issues found
        if !issues.is_empty() {
            std::process::exit(1);
        }
        Ok(())
    }
}

fn find_issues(input: &AssessmentInput) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    let mut codes = HashSet::new();
    for item in &input.items {
        if !codes.insert(item.code.as_str()) {
            issues.push(ValidationIssue {
                issue_type: "DuplicateItem",
                subject: item.code.clone(),
                message: "item code appears more than once".to_string(),
            });
        }
        if let Err(err) = Classified::of(item) {
            issues.push(ValidationIssue {
                issue_type: "InvalidClassification",
                subject: item.code.clone(),
                message: err.to_string(),
            });
        }
    }

    for operation in &input.operations {
        for code in operation.item_codes.iter().filter(|c| !codes.contains(c.as_str())) {
            issues.push(ValidationIssue {
                issue_type: "UnknownItem",
                subject: operation.id.clone(),
                message: format!("references unknown item {}", code),
            });
        }
    }

    for acquisition in &input.acquisitions {
        let ncm = acquisition.ncm.parse::<Ncm>().err();
        let cfop = acquisition.cfop.parse::<Cfop>().err();
        for err in ncm.into_iter().chain(cfop) {
            issues.push(ValidationIssue {
                issue_type: "InvalidClassification",
                subject: acquisition.asset_id.clone(),
                message: err.to_string(),
            });
        }
    }

    issues
}

fn print_text(input: &AssessmentInput, issues: &[ValidationIssue]) {
    println!();
    println!("VALIDATION RESULTS ({} {})", input.company.id, input.period);
    println!();

    if issues.is_empty() {
        println!("\u{2713} No issues found.");
        return;
    }

    println!("\u{26A0} {} issue(s) found:", issues.len());
    println!();
    for (i, issue) in issues.iter().enumerate() {
        println!("  {}. [{}] {}", i + 1, issue.issue_type, issue.subject);
        println!("     {}", issue.message);
        println!();
    }
}
