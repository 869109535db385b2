//! Sequential benefit application for a single line item.
//!
//! Steps run strictly in this order, each on the previous step's output:
//! 1. original base (declared, else total less discounts)
//! 2. base reductions
//! 3. rate lookup (default when the table has none)
//! 4. raw tax on the adjusted base
//! 5. presumed credits, then exemptions
//! 6. regional surtax on the *original* base, kept apart from the tax
//! 7. tax due, clamped at zero
//!
//! Rules of the same kind compound in ascending id order.

use super::config::EngineConfig;
use super::rates::RateTable;
use crate::core::{
    Alert, AppliedBenefit, AssessmentError, Cfop, Cst, ItemAssessment, Jurisdiction, LineItem,
    Ncm, RuleKind, TaxRule,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Percentage of an amount
pub(crate) fn pct(amount: Decimal, percent: Decimal) -> Decimal {
    amount * percent / dec!(100)
}

/// Validated classification codes of a line item
#[derive(Debug, Clone)]
pub struct Classified {
    pub ncm: Ncm,
    pub cfop: Cfop,
    pub cst: Cst,
}

impl Classified {
    pub fn of(item: &LineItem) -> Result<Self, AssessmentError> {
        let invalid = |source| AssessmentError::InvalidClassification {
            item: item.code.clone(),
            source,
        };
        Ok(Classified {
            ncm: item.ncm.parse().map_err(invalid)?,
            cfop: item.cfop.parse().map_err(invalid)?,
            cst: item.cst.parse().map_err(invalid)?,
        })
    }
}

/// Result of running the pipeline on one item
#[derive(Debug, Clone)]
pub struct ItemOutcome {
    pub assessment: ItemAssessment,
    pub alerts: Vec<Alert>,
    /// Rate came from the configured default rather than the rate table
    pub default_rate: bool,
}

pub struct BenefitPipeline<'a> {
    jurisdiction: &'a Jurisdiction,
    rates: &'a dyn RateTable,
    config: &'a EngineConfig,
}

impl<'a> BenefitPipeline<'a> {
    pub fn new(jurisdiction: &'a Jurisdiction, rates: &'a dyn RateTable, config: &'a EngineConfig) -> Self {
        BenefitPipeline {
            jurisdiction,
            rates,
            config,
        }
    }

    /// Apply the matched rules to one item. Pure; never touches shared state.
    pub fn assess(&self, item: &LineItem, codes: &Classified, rules: &[&TaxRule]) -> ItemOutcome {
        let rules: Vec<&TaxRule> = rules
            .iter()
            .copied()
            .filter(|r| !matches!(r.kind, RuleKind::FixedAssetCredit { .. }))
            .collect();
        let mut benefits = Vec::new();
        let mut alerts = Vec::new();
        let mut notes = Vec::new();

        let original_base = item.original_base();

        let mut adjusted_base = original_base;
        for rule in &rules {
            if let RuleKind::ReducedBase { reduction_pct } = rule.kind {
                let reduction = pct(adjusted_base, reduction_pct);
                adjusted_base -= reduction;
                benefits.push(applied(rule, reduction));
            }
        }

        let (rate, default_rate) = match self.rates.internal_rate(self.jurisdiction, &codes.cst) {
            Some(rate) => (rate, false),
            None => {
                log::warn!(
                    "No rate for {}/CST {} (item {}), using default {}%",
                    self.jurisdiction,
                    codes.cst,
                    item.code,
                    self.config.default_rate
                );
                alerts.push(Alert::DefaultRateApplied {
                    item: item.code.clone(),
                    jurisdiction: self.jurisdiction.to_string(),
                    cst: codes.cst.to_string(),
                    rate: self.config.default_rate,
                });
                (self.config.default_rate, true)
            }
        };

        let mut raw_tax = pct(adjusted_base, rate);

        for rule in &rules {
            if let RuleKind::PresumedCredit { credit_pct } = rule.kind {
                let credit = pct(raw_tax, credit_pct);
                raw_tax -= credit;
                benefits.push(applied(rule, credit));
            }
        }
        for rule in &rules {
            if let RuleKind::Exemption = rule.kind {
                benefits.push(applied(rule, raw_tax));
                raw_tax = Decimal::ZERO;
            }
        }

        let mut surtax = Decimal::ZERO;
        for rule in &rules {
            if let RuleKind::RegionalSurtax { surtax_pct } = rule.kind {
                let levied = pct(original_base, surtax_pct);
                surtax += levied;
                benefits.push(applied(rule, levied));
            }
        }

        if rules.is_empty() {
            notes.push("no rule matched; tax derived from declared values".to_string());
            alerts.push(Alert::NoRuleMatched {
                item: item.code.clone(),
            });
        }

        let mut tax_due = raw_tax.round_dp(2);
        if tax_due < Decimal::ZERO {
            log::warn!("Item {} tax computed as {}, clamping to 0", item.code, tax_due);
            alerts.push(Alert::NegativeTaxClamped {
                item: item.code.clone(),
                computed: tax_due,
            });
            tax_due = Decimal::ZERO;
        }

        if let Some(declared) = item.declared_tax {
            if (declared - tax_due).abs() > self.config.declared_tax_tolerance {
                notes.push(format!("declared tax {declared} differs from assessed {tax_due}"));
                alerts.push(Alert::DeclaredTaxDivergence {
                    item: item.code.clone(),
                    declared,
                    computed: tax_due,
                });
            }
        }

        log::debug!(
            "Item {}: base {} -> {}, rate {}%, tax {}, surtax {}, {} benefit(s)",
            item.code,
            original_base,
            adjusted_base,
            rate,
            tax_due,
            surtax,
            benefits.len()
        );

        ItemOutcome {
            assessment: ItemAssessment {
                item: item.clone(),
                original_base: original_base.round_dp(2),
                adjusted_base: adjusted_base.round_dp(2),
                rate,
                tax_due,
                surtax: surtax.round_dp(2),
                applied_benefits: benefits,
                notes,
            },
            alerts,
            default_rate,
        }
    }
}

fn applied(rule: &TaxRule, impact: Decimal) -> AppliedBenefit {
    AppliedBenefit {
        rule: rule.id,
        kind: rule.kind.label(),
        amount_impact: impact.round_dp(2),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{BenefitKind, CodeMatch};
    use crate::tax::rates::StaticRateTable;
    use chrono::NaiveDate;

    fn item(base: Decimal) -> LineItem {
        LineItem {
            code: "A1".to_string(),
            description: "Tractor part".to_string(),
            ncm: "84329000".to_string(),
            cfop: "5102".to_string(),
            cst: "020".to_string(),
            quantity: dec!(1),
            unit_value: base,
            total_value: base,
            discount: None,
            declared_base: Some(base),
            declared_tax: None,
        }
    }

    fn rule(id: u64, kind: RuleKind) -> TaxRule {
        TaxRule {
            id,
            jurisdiction: "SP".parse().unwrap(),
            kind,
            ncm_match: CodeMatch::Any,
            cfop_match: CodeMatch::Any,
            cst_match: CodeMatch::Any,
            valid_from: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            valid_to: None,
            active: true,
            provenance: String::new(),
        }
    }

    fn run(item: &LineItem, rules: &[TaxRule], rates: &StaticRateTable) -> ItemOutcome {
        let uf: Jurisdiction = "SP".parse().unwrap();
        let config = EngineConfig::default();
        let pipeline = BenefitPipeline::new(&uf, rates, &config);
        let codes = Classified::of(item).unwrap();
        let refs: Vec<&TaxRule> = rules.iter().collect();
        pipeline.assess(item, &codes, &refs)
    }

    fn sp18() -> StaticRateTable {
        StaticRateTable::empty().with_internal("SP", dec!(18))
    }

    #[test]
    fn reduction_then_credit_compose() {
        let rules = vec![
            rule(1, RuleKind::ReducedBase { reduction_pct: dec!(50) }),
            rule(2, RuleKind::PresumedCredit { credit_pct: dec!(10) }),
        ];
        let out = run(&item(dec!(1000)), &rules, &sp18());
        let a = &out.assessment;
        assert_eq!(a.adjusted_base, dec!(500));
        assert_eq!(a.rate, dec!(18));
        assert_eq!(a.tax_due, dec!(81));
        assert_eq!(a.applied_benefits[0].amount_impact, dec!(500));
        assert_eq!(a.applied_benefits[1].amount_impact, dec!(9));
        assert!(out.alerts.is_empty());
    }

    #[test]
    fn credit_applies_after_reduction_regardless_of_rule_id() {
        let rules = vec![
            rule(1, RuleKind::PresumedCredit { credit_pct: dec!(10) }),
            rule(2, RuleKind::ReducedBase { reduction_pct: dec!(50) }),
        ];
        let out = run(&item(dec!(1000)), &rules, &sp18());
        assert_eq!(out.assessment.tax_due, dec!(81));
        assert_eq!(out.assessment.applied_benefits[0].kind, BenefitKind::ReducedBase);
    }

    #[test]
    fn surtax_uses_pre_reduction_base() {
        let rules = vec![
            rule(1, RuleKind::ReducedBase { reduction_pct: dec!(50) }),
            rule(2, RuleKind::RegionalSurtax { surtax_pct: dec!(2) }),
        ];
        let out = run(&item(dec!(1000)), &rules, &sp18());
        assert_eq!(out.assessment.surtax, dec!(20));
        // surtax stays out of the tax due
        assert_eq!(out.assessment.tax_due, dec!(90));
    }

    #[test]
    fn same_kind_rules_compound() {
        let rules = vec![
            rule(1, RuleKind::ReducedBase { reduction_pct: dec!(50) }),
            rule(2, RuleKind::ReducedBase { reduction_pct: dec!(50) }),
        ];
        let out = run(&item(dec!(1000)), &rules, &sp18());
        assert_eq!(out.assessment.adjusted_base, dec!(250));
        assert_eq!(out.assessment.tax_due, dec!(45));
    }

    #[test]
    fn no_rule_uses_default_rate_and_alerts() {
        let out = run(&item(dec!(1000)), &[], &StaticRateTable::empty());
        assert_eq!(out.assessment.tax_due, dec!(180));
        assert!(out.default_rate);
        assert!(out.alerts.contains(&Alert::NoRuleMatched {
            item: "A1".to_string()
        }));
        assert!(out.alerts.iter().any(|a| a.is_rate_fallback()));
        assert!(!out.assessment.matched_any_rule());
    }

    #[test]
    fn exemption_zeroes_remaining_tax() {
        let rules = vec![
            rule(1, RuleKind::PresumedCredit { credit_pct: dec!(10) }),
            rule(2, RuleKind::Exemption),
        ];
        let out = run(&item(dec!(1000)), &rules, &sp18());
        assert_eq!(out.assessment.tax_due, Decimal::ZERO);
        assert_eq!(out.assessment.applied_benefits[1].amount_impact, dec!(162));
    }

    #[test]
    fn negative_tax_is_clamped() {
        let rules = vec![rule(1, RuleKind::PresumedCredit { credit_pct: dec!(150) })];
        let out = run(&item(dec!(1000)), &rules, &sp18());
        assert_eq!(out.assessment.tax_due, Decimal::ZERO);
        assert!(matches!(out.alerts[0], Alert::NegativeTaxClamped { .. }));
    }

    #[test]
    fn fixed_asset_rules_do_not_count_at_item_level() {
        let rules = vec![rule(1, RuleKind::FixedAssetCredit { recovery_months: None })];
        let out = run(&item(dec!(1000)), &rules, &sp18());
        assert!(out.assessment.applied_benefits.is_empty());
        assert!(matches!(out.alerts[0], Alert::NoRuleMatched { .. }));
    }

    #[test]
    fn declared_tax_divergence_alerts() {
        let mut it = item(dec!(1000));
        it.declared_tax = Some(dec!(170));
        let out = run(&it, &[rule(1, RuleKind::ReducedBase { reduction_pct: dec!(0) })], &sp18());
        assert!(matches!(out.alerts[0], Alert::DeclaredTaxDivergence { .. }));
    }

    #[test]
    fn malformed_code_is_rejected() {
        let mut it = item(dec!(1000));
        it.cfop = "9999".to_string();
        let err = Classified::of(&it).unwrap_err();
        assert_eq!(err.kind(), crate::core::ErrorKind::InvalidClassification);
    }
}
