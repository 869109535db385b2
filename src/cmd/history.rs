//! History command - list recorded assessments of a company

use crate::cmd::format_brl;
use crate::cmd::state::StateFile;
use crate::core::{AssessmentStatus, Period, PeriodAssessment};
use crate::tax::{AssessmentFilter, AssessmentStore};
use clap::{Args, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use tabled::{
    settings::{object::Columns, Alignment, Modify, Style},
    Table, Tabled,
};

#[derive(Args, Debug)]
pub struct HistoryCommand {
    /// State file holding the assessment history
    #[arg(long)]
    state: PathBuf,

    /// Company id
    #[arg(short, long)]
    company: String,

    /// First period (YYYY-MM, inclusive)
    #[arg(long)]
    from: Option<Period>,

    /// Last period (YYYY-MM, inclusive)
    #[arg(long)]
    to: Option<Period>,

    /// Only assessments with this status
    #[arg(long, value_enum)]
    status: Option<StatusArg>,

    /// Output as JSON instead of a formatted table
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StatusArg {
    Completed,
    Failed,
}

impl From<StatusArg> for AssessmentStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Completed => AssessmentStatus::Completed,
            StatusArg::Failed => AssessmentStatus::Failed,
        }
    }
}

#[derive(Tabled)]
struct HistoryRow {
    #[tabled(rename = "Period")]
    period: String,
    #[tabled(rename = "Run")]
    run: u32,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Tax Due")]
    tax_due: String,
    #[tabled(rename = "Net Surtax")]
    net_surtax: String,
    #[tabled(rename = "Asset Credit")]
    asset_credit: String,
    #[tabled(rename = "Confidence")]
    confidence: u8,
}

#[derive(Serialize)]
struct HistoryOutput<'a> {
    company: &'a str,
    count: usize,
    assessments: &'a [PeriodAssessment],
}

impl HistoryCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let (_, history) = StateFile::load(&self.state)?.into_stores();
        let filter = AssessmentFilter {
            from: self.from,
            to: self.to,
            status: self.status.map(Into::into),
        };
        let assessments = history.list(&self.company, &filter)?;

        if self.json {
            let output = HistoryOutput {
                company: &self.company,
                count: assessments.len(),
                assessments: &assessments,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
            return Ok(());
        }

        if assessments.is_empty() {
            println!("No assessments found for {}", self.company);
            return Ok(());
        }

        let rows: Vec<HistoryRow> = assessments
            .iter()
            .map(|a| HistoryRow {
                period: a.period.to_string(),
                run: a.run,
                status: a.status.to_string(),
                tax_due: format_brl(a.totals.tax_due),
                net_surtax: format_brl(a.totals.net_surtax),
                asset_credit: format_brl(a.totals.asset_credit_recognized),
                confidence: a.confidence_score,
            })
            .collect();

        println!();
        println!("ASSESSMENTS ({})", self.company);
        println!();
        let table = Table::new(rows)
            .with(Style::rounded())
            .with(Modify::new(Columns::new(3..)).with(Alignment::right()))
            .to_string();
        println!("{}", table);
        Ok(())
    }
}
