//! Fixed-asset ICMS credit recovery (CIAP).
//!
//! Recognition is delta based: each run moves `cumulative_recognized` up to
//! the installments due for the elapsed months, so repeating a run inside the
//! same month window recognises nothing new.

use super::config::EngineConfig;
use super::rules::RuleRepository;
use crate::core::{
    whole_months_between, Alert, AssessmentError, AssetAcquisition, AssetMovement, AssetStatus,
    Cfop, FixedAssetCreditRecord, Jurisdiction, Ncm, RuleKind,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;

/// Outcome of advancing one record
#[derive(Debug, Clone)]
pub struct Recognition {
    pub movement: AssetMovement,
    pub alert: Option<Alert>,
}

pub struct AssetAmortizer<'a> {
    config: &'a EngineConfig,
}

impl<'a> AssetAmortizer<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        AssetAmortizer { config }
    }

    /// Open a schedule for a qualifying acquisition.
    ///
    /// Qualifies when inbound and either the NCM chapter is a fixed-asset
    /// chapter or a FixedAssetCredit rule matches. Returns `None` otherwise.
    pub fn open(
        &self,
        company: &str,
        acquisition: &AssetAcquisition,
        rules: &RuleRepository,
        jurisdiction: &Jurisdiction,
        as_of: NaiveDate,
    ) -> Result<Option<FixedAssetCreditRecord>, AssessmentError> {
        let invalid = |source| AssessmentError::InvalidClassification {
            item: acquisition.asset_id.clone(),
            source,
        };
        let ncm: Ncm = acquisition.ncm.parse().map_err(invalid)?;
        let cfop: Cfop = acquisition.cfop.parse().map_err(invalid)?;

        if !cfop.is_inbound() {
            log::debug!("Asset {} is not an inbound operation", acquisition.asset_id);
            return Ok(None);
        }
        let asset_rules = rules.find_asset_rules(jurisdiction, ncm.as_str(), cfop.as_str(), as_of);
        if asset_rules.is_empty() && !self.config.is_asset_chapter(ncm.as_str()) {
            log::debug!("Asset {} NCM {} does not qualify", acquisition.asset_id, ncm);
            return Ok(None);
        }
        if acquisition.icms_on_acquisition <= Decimal::ZERO {
            log::debug!("Asset {} has no ICMS to recover", acquisition.asset_id);
            return Ok(None);
        }

        let category = self.config.asset_category(ncm.as_str());
        let rule_months = asset_rules.iter().find_map(|r| match r.kind {
            RuleKind::FixedAssetCredit { recovery_months } => recovery_months.filter(|m| *m > 0),
            _ => None,
        });
        let recovery_months = rule_months
            .or(category.map(|c| c.recovery_months))
            .unwrap_or(self.config.default_recovery_months)
            .max(1);

        let record = FixedAssetCreditRecord {
            asset_id: acquisition.asset_id.clone(),
            company: company.to_string(),
            description: acquisition.description.clone(),
            ncm: ncm.to_string(),
            category: category.map_or_else(|| "uncategorized".to_string(), |c| c.name.clone()),
            acquisition_date: acquisition.acquisition_date,
            acquisition_value: acquisition.acquisition_value,
            icms_on_acquisition: acquisition.icms_on_acquisition,
            recovery_months,
            monthly_installment: (acquisition.icms_on_acquisition / Decimal::from(recovery_months))
                .round_dp(2),
            cumulative_recognized: Decimal::ZERO,
            balance_remaining: acquisition.icms_on_acquisition,
            status: AssetStatus::Active,
        };
        log::info!(
            "Opened CIAP schedule for asset {}: {} over {} months",
            record.asset_id,
            record.icms_on_acquisition,
            record.recovery_months
        );
        Ok(Some(record))
    }

    /// Recognise the installments due up to `assessment_date`.
    ///
    /// Settled records are left untouched and yield `None`.
    pub fn advance(&self, record: &mut FixedAssetCreditRecord, assessment_date: NaiveDate) -> Option<Recognition> {
        if !record.is_active() {
            return None;
        }
        let months = whole_months_between(record.acquisition_date, assessment_date);
        let installment = record.icms_on_acquisition / Decimal::from(record.recovery_months.max(1));
        let scheduled = (installment * Decimal::from(months)).round_dp(2);
        let target = scheduled.min(record.icms_on_acquisition);

        let wanted = (scheduled - record.cumulative_recognized).max(Decimal::ZERO);
        let recognized = (target - record.cumulative_recognized)
            .max(Decimal::ZERO)
            .min(record.balance_remaining);

        let alert = if wanted > recognized {
            log::warn!(
                "Asset {}: recognition of {} clamped to {}",
                record.asset_id,
                wanted,
                recognized
            );
            Some(Alert::AssetScheduleOverflow {
                asset_id: record.asset_id.clone(),
                requested: wanted,
                recognized,
            })
        } else {
            None
        };

        record.cumulative_recognized += recognized;
        record.balance_remaining -= recognized;
        if record.balance_remaining <= Decimal::ZERO {
            record.balance_remaining = Decimal::ZERO;
            record.status = AssetStatus::Settled;
        }
        log::debug!(
            "Asset {}: {} months, recognized {} (cumulative {}, balance {})",
            record.asset_id,
            months,
            recognized,
            record.cumulative_recognized,
            record.balance_remaining
        );

        Some(Recognition {
            movement: AssetMovement {
                asset_id: record.asset_id.clone(),
                months_elapsed: months,
                recognized,
                cumulative_recognized: record.cumulative_recognized,
                balance_remaining: record.balance_remaining,
                status: record.status,
                created: false,
            },
            alert,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CodeMatch, TaxRule};
    use rust_decimal_macros::dec;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn acquisition(ncm: &str, cfop: &str, icms: Decimal) -> AssetAcquisition {
        AssetAcquisition {
            asset_id: "PRESS-01".to_string(),
            description: "Hydraulic press".to_string(),
            ncm: ncm.to_string(),
            cfop: cfop.to_string(),
            acquisition_date: date("2024-01-10"),
            acquisition_value: icms * dec!(10),
            icms_on_acquisition: icms,
        }
    }

    fn open(acq: &AssetAcquisition, rules: Vec<TaxRule>) -> Option<FixedAssetCreditRecord> {
        let config = EngineConfig::default();
        let amortizer = AssetAmortizer::new(&config);
        amortizer
            .open(
                "ACME",
                acq,
                &RuleRepository::new(rules),
                &"SP".parse().unwrap(),
                date("2024-01-31"),
            )
            .unwrap()
    }

    #[test]
    fn schedule_from_category_table() {
        let record = open(&acquisition("84621000", "1551", dec!(4800)), vec![]).unwrap();
        assert_eq!(record.recovery_months, 48);
        assert_eq!(record.monthly_installment, dec!(100));
        assert_eq!(record.balance_remaining, dec!(4800));
        assert_eq!(record.status, AssetStatus::Active);
    }

    #[test]
    fn unknown_category_defaults_to_sixty_months() {
        let record = open(&acquisition("89011000", "2551", dec!(6000)), vec![]).unwrap();
        assert_eq!(record.recovery_months, 60);
        assert_eq!(record.category, "uncategorized");
    }

    #[test]
    fn zero_recovery_months_recovers_in_one_installment() {
        let config = EngineConfig {
            default_recovery_months: 0,
            ..EngineConfig::default()
        };
        let amortizer = AssetAmortizer::new(&config);
        let mut record = amortizer
            .open(
                "ACME",
                &acquisition("89011000", "1551", dec!(6000)),
                &RuleRepository::new(vec![]),
                &"SP".parse().unwrap(),
                date("2024-01-31"),
            )
            .unwrap()
            .unwrap();
        assert_eq!(record.recovery_months, 1);
        assert_eq!(record.monthly_installment, dec!(6000));

        amortizer.advance(&mut record, date("2024-02-29"));
        assert_eq!(record.status, AssetStatus::Settled);
    }

    #[test]
    fn outbound_or_non_asset_ncm_does_not_qualify() {
        assert!(open(&acquisition("84621000", "5551", dec!(4800)), vec![]).is_none());
        assert!(open(&acquisition("22030000", "1102", dec!(4800)), vec![]).is_none());
    }

    #[test]
    fn asset_rule_qualifies_and_overrides_months() {
        let rule = TaxRule {
            id: 5,
            jurisdiction: "SP".parse().unwrap(),
            kind: RuleKind::FixedAssetCredit {
                recovery_months: Some(24),
            },
            ncm_match: CodeMatch::prefixes(["7308"]),
            cfop_match: CodeMatch::Any,
            cst_match: CodeMatch::Any,
            valid_from: date("2020-01-01"),
            valid_to: None,
            active: true,
            provenance: String::new(),
        };
        let record = open(&acquisition("73089010", "1551", dec!(2400)), vec![rule]).unwrap();
        assert_eq!(record.recovery_months, 24);
        assert_eq!(record.monthly_installment, dec!(100));
    }

    #[test]
    fn recognition_is_idempotent_within_window() {
        let config = EngineConfig::default();
        let amortizer = AssetAmortizer::new(&config);
        let mut record = open(&acquisition("84621000", "1551", dec!(4800)), vec![]).unwrap();
        for _ in 0..3 {
            amortizer.advance(&mut record, date("2024-11-30"));
        }
        assert_eq!(record.cumulative_recognized, dec!(1000));
        assert_eq!(record.balance_remaining, dec!(3800));
    }

    #[test]
    fn earlier_date_never_reverses_recognition() {
        let config = EngineConfig::default();
        let amortizer = AssetAmortizer::new(&config);
        let mut record = open(&acquisition("84621000", "1551", dec!(4800)), vec![]).unwrap();
        amortizer.advance(&mut record, date("2024-11-30"));
        let r = amortizer.advance(&mut record, date("2024-05-31")).unwrap();
        assert_eq!(r.movement.recognized, Decimal::ZERO);
        assert_eq!(record.cumulative_recognized, dec!(1000));
    }

    #[test]
    fn settles_and_clamps_past_schedule_end() {
        let config = EngineConfig::default();
        let amortizer = AssetAmortizer::new(&config);
        let mut record = open(&acquisition("84621000", "1551", dec!(4800)), vec![]).unwrap();
        let r = amortizer.advance(&mut record, date("2028-06-30")).unwrap();
        assert_eq!(r.movement.recognized, dec!(4800));
        assert_eq!(record.status, AssetStatus::Settled);
        assert!(matches!(r.alert, Some(Alert::AssetScheduleOverflow { .. })));
        assert!(amortizer.advance(&mut record, date("2028-07-31")).is_none());
    }

    #[test]
    fn uneven_installments_settle_exactly() {
        let config = EngineConfig::default();
        let amortizer = AssetAmortizer::new(&config);
        let mut record = open(&acquisition("89011000", "1551", dec!(1000)), vec![]).unwrap();
        amortizer.advance(&mut record, date("2028-12-31"));
        assert_eq!(record.cumulative_recognized, dec!(983.33));
        let r = amortizer.advance(&mut record, date("2029-01-31")).unwrap();
        assert_eq!(r.movement.recognized, dec!(16.67));
        assert_eq!(record.balance_remaining, Decimal::ZERO);
        assert_eq!(record.status, AssetStatus::Settled);
        assert!(r.alert.is_none());
    }
}
