//! Assess command - run one company period through the engine

use crate::cmd::state::StateFile;
use crate::cmd::{format_brl, format_pct, read_input, read_rules};
use crate::core::{read_line_items_csv, AssessmentStatus, PeriodAssessment};
use crate::tax::{
    AssessmentEngine, EngineConfig, MemoryDocuments, PeriodDocuments, RuleRepository,
    StaticRateTable,
};
use clap::Args;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use tabled::{
    settings::{object::Columns, Alignment, Modify, Style},
    Table, Tabled,
};

#[derive(Args, Debug)]
pub struct AssessCommand {
    /// Input JSON (company, period, items, operations, acquisitions). Reads stdin with "-".
    #[arg(short, long, default_value = "-")]
    input: PathBuf,

    /// Additional rules (JSON list)
    #[arg(long)]
    rules: Option<PathBuf>,

    /// Additional line items (CSV)
    #[arg(long)]
    items: Option<PathBuf>,

    /// State file holding the ledger and assessment history
    #[arg(long)]
    state: Option<PathBuf>,

    /// Engine configuration (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output as JSON instead of formatted tables
    #[arg(long)]
    json: bool,
}

impl AssessCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let mut input = read_input(&self.input)?;
        if let Some(path) = &self.rules {
            input.rules.extend(read_rules(path)?);
        }
        if let Some(path) = &self.items {
            input.items.extend(read_line_items_csv(File::open(path)?)?);
        }
        let config = match &self.config {
            Some(path) => EngineConfig::from_json(File::open(path)?)?,
            None => EngineConfig::default(),
        };
        let state = match &self.state {
            Some(path) => StateFile::load(path)?,
            None => StateFile::default(),
        };

        let (ledger, history) = state.into_stores();
        let ledger = Arc::new(ledger);
        let history = Arc::new(history);
        let documents = Arc::new(MemoryDocuments::new());
        documents.insert(
            &input.company.id,
            input.period,
            PeriodDocuments {
                items: input.items,
                operations: input.operations,
                acquisitions: input.acquisitions,
            },
        )?;
        let engine = AssessmentEngine::new(
            Arc::new(RuleRepository::new(input.rules)),
            Arc::new(StaticRateTable::default()),
            documents,
            ledger.clone(),
            history.clone(),
        )
        .with_config(config);

        let assessment = engine.run_assessment(&input.company, input.period)?;

        if let Some(path) = &self.state {
            if assessment.is_completed() {
                StateFile::from_stores(&ledger, &history)?.save(path)?;
            }
        }

        if self.json {
            println!("{}", serde_json::to_string_pretty(&assessment)?);
        } else {
            print_assessment(&assessment);
        }

        if let Some(failure) = &assessment.failure {
            anyhow::bail!("assessment failed ({:?}): {}", failure.kind, failure.message);
        }
        Ok(())
    }
}

#[derive(Tabled)]
struct TotalRow {
    #[tabled(rename = "")]
    label: &'static str,
    #[tabled(rename = "BRL")]
    amount: String,
}

#[derive(Tabled)]
struct ItemRow {
    #[tabled(rename = "Item")]
    code: String,
    #[tabled(rename = "NCM")]
    ncm: String,
    #[tabled(rename = "CFOP")]
    cfop: String,
    #[tabled(rename = "CST")]
    cst: String,
    #[tabled(rename = "Base")]
    base: String,
    #[tabled(rename = "Adjusted")]
    adjusted: String,
    #[tabled(rename = "Rate")]
    rate: String,
    #[tabled(rename = "Tax")]
    tax: String,
    #[tabled(rename = "Surtax")]
    surtax: String,
    #[tabled(rename = "Rules")]
    rules: String,
}

#[derive(Tabled)]
struct OperationRow {
    #[tabled(rename = "Operation")]
    operation: String,
    #[tabled(rename = "Base")]
    base: String,
    #[tabled(rename = "Items Tax")]
    items_tax: String,
    #[tabled(rename = "DIFAL")]
    differential: String,
    #[tabled(rename = "Total")]
    total: String,
}

#[derive(Tabled)]
struct AssetRow {
    #[tabled(rename = "Asset")]
    asset: String,
    #[tabled(rename = "Months")]
    months: u32,
    #[tabled(rename = "Recognized")]
    recognized: String,
    #[tabled(rename = "Cumulative")]
    cumulative: String,
    #[tabled(rename = "Balance")]
    balance: String,
    #[tabled(rename = "Status")]
    status: String,
}

fn print_table<T: Tabled>(rows: Vec<T>, numeric_from: usize) {
    let table = Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(numeric_from..)).with(Alignment::right()))
        .to_string();
    println!("{}", table);
    println!();
}

fn print_assessment(a: &PeriodAssessment) {
    println!();
    println!(
        "ICMS ASSESSMENT {} {} (run {}) - {}",
        a.company, a.period, a.run, a.status
    );
    println!();

    if a.status == AssessmentStatus::Failed {
        if let Some(failure) = &a.failure {
            println!("Failed: {:?}: {}", failure.kind, failure.message);
        }
        return;
    }

    let t = &a.totals;
    print_table(
        vec![
            TotalRow { label: "Base", amount: format_brl(t.base) },
            TotalRow { label: "Tax due", amount: format_brl(t.tax_due) },
            TotalRow { label: "  of which DIFAL", amount: format_brl(t.differential) },
            TotalRow { label: "Surtax payable", amount: format_brl(t.surtax_payable) },
            TotalRow { label: "Surtax credited", amount: format_brl(t.surtax_credited) },
            TotalRow { label: "Net surtax", amount: format_brl(t.net_surtax) },
            TotalRow { label: "Asset credit", amount: format_brl(t.asset_credit_recognized) },
        ],
        1,
    );

    if !a.item_assessments.is_empty() {
        let rows = a
            .item_assessments
            .iter()
            .map(|i| ItemRow {
                code: i.item.code.clone(),
                ncm: i.item.ncm.clone(),
                cfop: i.item.cfop.clone(),
                cst: i.item.cst.clone(),
                base: format_brl(i.original_base),
                adjusted: format_brl(i.adjusted_base),
                rate: format_pct(i.rate),
                tax: format_brl(i.tax_due),
                surtax: format_brl(i.surtax),
                rules: i
                    .applied_benefits
                    .iter()
                    .map(|b| format!("#{} {}", b.rule, b.kind))
                    .collect::<Vec<_>>()
                    .join(", "),
            })
            .collect();
        print_table::<ItemRow>(rows, 4);
    }

    if !a.operations.is_empty() {
        let rows = a
            .operations
            .iter()
            .map(|o| OperationRow {
                operation: o.operation.clone(),
                base: format_brl(o.adjusted_base),
                items_tax: format_brl(o.items_tax),
                differential: format_brl(o.differential),
                total: format_brl(o.tax_due),
            })
            .collect();
        print_table::<OperationRow>(rows, 1);
    }

    if !a.asset_movements.is_empty() {
        let rows = a
            .asset_movements
            .iter()
            .map(|m| AssetRow {
                asset: m.asset_id.clone(),
                months: m.months_elapsed,
                recognized: format_brl(m.recognized),
                cumulative: format_brl(m.cumulative_recognized),
                balance: format_brl(m.balance_remaining),
                status: format!("{:?}", m.status),
            })
            .collect();
        print_table::<AssetRow>(rows, 1);
    }

    if !a.alerts.is_empty() {
        println!("\u{26A0} {} alert(s):", a.alerts.len());
        for alert in &a.alerts {
            println!("  [{}] {}", alert.name(), alert.message());
        }
        println!();
    }

    println!("Confidence: {}/100", a.confidence_score);
    println!("Input digest: {}", a.input_digest);
}
