//! Cross-period regional surtax bookkeeping.
//!
//! Each (company, period) holds the surtax payable assessed for it. A run for
//! period P reads only P-1 and, once the assessment is final, writes only P.

use crate::core::{FixedAssetCreditRecord, LedgerError, Period};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

/// Durable store for ledger entries and fixed-asset schedules.
///
/// `commit` must apply all of `LedgerWrites` or none of it. Runs for
/// different periods of a company may commit in any order, so a committed
/// asset record must never move backwards: a Settled record stays Settled and
/// a record already further along its schedule is kept.
pub trait CreditLedger: Send + Sync {
    /// Surtax payable recorded for `company` in `period`
    fn payable(&self, company: &str, period: Period) -> Result<Option<Decimal>, LedgerError>;

    /// All fixed-asset credit records of `company`
    fn asset_records(&self, company: &str) -> Result<Vec<FixedAssetCreditRecord>, LedgerError>;

    fn commit(&self, writes: LedgerWrites) -> Result<(), LedgerError>;
}

/// Staged mutations of one run, applied atomically at run end
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerWrites {
    pub company: String,
    pub period: Period,
    pub payable_surtax: Decimal,
    /// Records to upsert by asset id
    pub asset_records: Vec<FixedAssetCreditRecord>,
}

/// Surtax position of one period against the previous one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurtaxReconciliation {
    pub current_payable: Decimal,
    pub prior_credit: Decimal,
    /// May be negative; never carried past the next period
    pub net: Decimal,
}

/// Offset this period's surtax with the previous period's payable
pub fn reconcile(current_payable: Decimal, prior_credit: Option<Decimal>) -> SurtaxReconciliation {
    let prior_credit = prior_credit.unwrap_or(Decimal::ZERO);
    SurtaxReconciliation {
        current_payable,
        prior_credit,
        net: current_payable - prior_credit,
    }
}

/// Read the prior period's entry and reconcile against it
pub fn reconcile_with(
    ledger: &dyn CreditLedger,
    company: &str,
    period: Period,
    current_payable: Decimal,
) -> Result<SurtaxReconciliation, LedgerError> {
    let prior = ledger.payable(company, period.prev())?;
    log::debug!(
        "Ledger {} {}: prior payable {:?}, current {}",
        company,
        period.prev(),
        prior,
        current_payable
    );
    Ok(reconcile(current_payable, prior))
}

#[derive(Debug, Default)]
struct LedgerState {
    payable: HashMap<(String, Period), Decimal>,
    // keyed by company, then asset id, to keep a stable order
    assets: HashMap<String, BTreeMap<String, FixedAssetCreditRecord>>,
}

/// In-memory ledger; one lock guards both maps so commits are atomic
#[derive(Debug, Default)]
pub struct MemoryLedger {
    state: RwLock<LedgerState>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger pre-populated with entries and records, e.g. loaded from disk
    pub fn with_entries(
        entries: impl IntoIterator<Item = (String, Period, Decimal)>,
        records: impl IntoIterator<Item = FixedAssetCreditRecord>,
    ) -> Self {
        let mut state = LedgerState::default();
        for (company, period, payable) in entries {
            state.payable.insert((company, period), payable);
        }
        for record in records {
            state
                .assets
                .entry(record.company.clone())
                .or_default()
                .insert(record.asset_id.clone(), record);
        }
        MemoryLedger {
            state: RwLock::new(state),
        }
    }

    /// Every entry, ordered by company and period
    pub fn entries(&self) -> Result<Vec<(String, Period, Decimal)>, LedgerError> {
        let state = self.read()?;
        let mut entries: Vec<_> = state
            .payable
            .iter()
            .map(|((company, period), payable)| (company.clone(), *period, *payable))
            .collect();
        entries.sort_by(|a, b| (&a.0, a.1).cmp(&(&b.0, b.1)));
        Ok(entries)
    }

    /// Every asset record across companies
    pub fn all_asset_records(&self) -> Result<Vec<FixedAssetCreditRecord>, LedgerError> {
        let state = self.read()?;
        let mut companies: Vec<_> = state.assets.keys().collect();
        companies.sort();
        Ok(companies
            .into_iter()
            .flat_map(|c| state.assets[c].values().cloned())
            .collect())
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, LedgerState>, LedgerError> {
        self.state
            .read()
            .map_err(|_| LedgerError("ledger lock poisoned".to_string()))
    }
}

/// Whether `incoming` may replace `stored` without regressing the schedule
fn supersedes(incoming: &FixedAssetCreditRecord, stored: &FixedAssetCreditRecord) -> bool {
    stored.is_active() && incoming.cumulative_recognized >= stored.cumulative_recognized
}

impl CreditLedger for MemoryLedger {
    fn payable(&self, company: &str, period: Period) -> Result<Option<Decimal>, LedgerError> {
        let state = self.read()?;
        Ok(state.payable.get(&(company.to_string(), period)).copied())
    }

    fn asset_records(&self, company: &str) -> Result<Vec<FixedAssetCreditRecord>, LedgerError> {
        let state = self.read()?;
        Ok(state
            .assets
            .get(company)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default())
    }

    fn commit(&self, writes: LedgerWrites) -> Result<(), LedgerError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| LedgerError("ledger lock poisoned".to_string()))?;
        let LedgerWrites {
            company,
            period,
            payable_surtax,
            asset_records,
        } = writes;
        let records = state.assets.entry(company.clone()).or_default();
        for record in asset_records {
            match records.get(&record.asset_id) {
                Some(stored) if !supersedes(&record, stored) => {
                    log::debug!(
                        "Asset {}: keeping stored record (cumulative {}) over stale {}",
                        stored.asset_id,
                        stored.cumulative_recognized,
                        record.cumulative_recognized
                    );
                }
                _ => {
                    records.insert(record.asset_id.clone(), record);
                }
            }
        }
        state.payable.insert((company, period), payable_surtax);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::AssetStatus;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn period(s: &str) -> Period {
        s.parse().unwrap()
    }

    fn writes(p: &str, payable: Decimal) -> LedgerWrites {
        LedgerWrites {
            company: "ACME".to_string(),
            period: period(p),
            payable_surtax: payable,
            asset_records: Vec::new(),
        }
    }

    #[test]
    fn first_period_has_no_prior_credit() {
        let r = reconcile(dec!(100), None);
        assert_eq!(r.prior_credit, Decimal::ZERO);
        assert_eq!(r.net, dec!(100));
    }

    #[test]
    fn net_may_be_negative() {
        let r = reconcile(dec!(80), Some(dec!(100)));
        assert_eq!(r.net, dec!(-20));
    }

    #[test]
    fn reads_only_the_preceding_period() {
        let ledger = MemoryLedger::new();
        ledger.commit(writes("2025-01", dec!(50))).unwrap();
        ledger.commit(writes("2025-02", dec!(100))).unwrap();
        let r = reconcile_with(&ledger, "ACME", period("2025-03"), dec!(120)).unwrap();
        assert_eq!(r.prior_credit, dec!(100));
        assert_eq!(r.net, dec!(20));
    }

    #[test]
    fn commit_overwrites_same_key() {
        let ledger = MemoryLedger::new();
        ledger.commit(writes("2025-02", dec!(100))).unwrap();
        ledger.commit(writes("2025-02", dec!(120))).unwrap();
        assert_eq!(ledger.payable("ACME", period("2025-02")).unwrap(), Some(dec!(120)));
        assert_eq!(ledger.entries().unwrap().len(), 1);
    }

    fn press(cumulative: Decimal) -> FixedAssetCreditRecord {
        let icms = dec!(4800);
        FixedAssetCreditRecord {
            asset_id: "PRESS-01".to_string(),
            company: "ACME".to_string(),
            description: String::new(),
            ncm: "84621000".to_string(),
            category: "machinery".to_string(),
            acquisition_date: NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            acquisition_value: dec!(48000),
            icms_on_acquisition: icms,
            recovery_months: 48,
            monthly_installment: dec!(100),
            cumulative_recognized: cumulative,
            balance_remaining: icms - cumulative,
            status: if cumulative == icms {
                AssetStatus::Settled
            } else {
                AssetStatus::Active
            },
        }
    }

    fn with_record(p: &str, record: FixedAssetCreditRecord) -> LedgerWrites {
        LedgerWrites {
            asset_records: vec![record],
            ..writes(p, Decimal::ZERO)
        }
    }

    #[test]
    fn stale_asset_record_does_not_regress() {
        let ledger = MemoryLedger::new();
        ledger.commit(with_record("2024-11", press(dec!(1000)))).unwrap();
        // an earlier period committing later carries an older schedule
        ledger.commit(with_record("2024-05", press(dec!(400)))).unwrap();

        let records = ledger.asset_records("ACME").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].cumulative_recognized, dec!(1000));
        assert_eq!(records[0].balance_remaining, dec!(3800));
        // the payable entry of the stale run is still written
        assert_eq!(ledger.payable("ACME", period("2024-05")).unwrap(), Some(Decimal::ZERO));

        ledger.commit(with_record("2024-12", press(dec!(1100)))).unwrap();
        assert_eq!(ledger.asset_records("ACME").unwrap()[0].cumulative_recognized, dec!(1100));
    }

    #[test]
    fn settled_asset_record_never_reopens() {
        let ledger = MemoryLedger::new();
        ledger.commit(with_record("2028-01", press(dec!(4800)))).unwrap();
        ledger.commit(with_record("2027-12", press(dec!(4800) - dec!(100)))).unwrap();
        ledger.commit(with_record("2028-02", press(dec!(4800)))).unwrap();

        let record = &ledger.asset_records("ACME").unwrap()[0];
        assert_eq!(record.status, AssetStatus::Settled);
        assert_eq!(record.balance_remaining, Decimal::ZERO);
    }

    #[test]
    fn companies_are_isolated() {
        let ledger = MemoryLedger::new();
        ledger.commit(writes("2025-02", dec!(100))).unwrap();
        assert_eq!(ledger.payable("OTHER", period("2025-02")).unwrap(), None);
        assert!(ledger.asset_records("OTHER").unwrap().is_empty());
    }
}
