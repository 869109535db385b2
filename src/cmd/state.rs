//! Durable CLI state: ledger entries, asset schedules and assessment history
//! kept in one JSON file.

use crate::core::{FixedAssetCreditRecord, Period, PeriodAssessment};
use crate::tax::{MemoryAssessments, MemoryLedger};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub company: String,
    pub period: Period,
    pub payable_surtax: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateFile {
    #[serde(default)]
    pub ledger: Vec<LedgerEntry>,
    #[serde(default)]
    pub asset_records: Vec<FixedAssetCreditRecord>,
    #[serde(default)]
    pub assessments: Vec<PeriodAssessment>,
}

impl StateFile {
    /// Load state; a missing file is an empty state
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            log::info!("No state at {}, starting empty", path.display());
            return Ok(StateFile::default());
        }
        let reader = BufReader::new(File::open(path)?);
        let state: StateFile = serde_json::from_reader(reader)?;
        log::debug!(
            "Loaded state: {} ledger entries, {} asset records, {} assessments",
            state.ledger.len(),
            state.asset_records.len(),
            state.assessments.len()
        );
        Ok(state)
    }

    /// Write to a sibling temp file, then rename over `path`
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let tmp = temp_path(path);
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            serde_json::to_writer_pretty(&mut writer, self)?;
            writer.flush()?;
        }
        fs::rename(&tmp, path)?;
        log::info!("Saved state to {}", path.display());
        Ok(())
    }

    pub fn into_stores(self) -> (MemoryLedger, MemoryAssessments) {
        let ledger = MemoryLedger::with_entries(
            self.ledger
                .into_iter()
                .map(|e| (e.company, e.period, e.payable_surtax)),
            self.asset_records,
        );
        (ledger, MemoryAssessments::with_history(self.assessments))
    }

    pub fn from_stores(ledger: &MemoryLedger, history: &MemoryAssessments) -> anyhow::Result<Self> {
        Ok(StateFile {
            ledger: ledger
                .entries()?
                .into_iter()
                .map(|(company, period, payable_surtax)| LedgerEntry {
                    company,
                    period,
                    payable_surtax,
                })
                .collect(),
            asset_records: ledger.all_asset_records()?,
            assessments: history.all()?,
        })
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
