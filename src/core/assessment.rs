use super::alerts::Alert;
use super::asset::AssetMovement;
use super::error::FailureRecord;
use super::item::LineItem;
use super::period::Period;
use super::rule::{BenefitKind, RuleId};
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One benefit applied to an item, in application order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AppliedBenefit {
    pub rule: RuleId,
    pub kind: BenefitKind,
    /// Base or tax reduction, or the surtax levied
    #[schemars(with = "f64")]
    pub amount_impact: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ItemAssessment {
    pub item: LineItem,
    #[schemars(with = "f64")]
    pub original_base: Decimal,
    #[schemars(with = "f64")]
    pub adjusted_base: Decimal,
    #[schemars(with = "f64")]
    pub rate: Decimal,
    #[schemars(with = "f64")]
    pub tax_due: Decimal,
    /// Regional surtax levied on the original base, reconciled across periods
    #[schemars(with = "f64")]
    pub surtax: Decimal,
    pub applied_benefits: Vec<AppliedBenefit>,
    #[serde(default)]
    pub notes: Vec<String>,
}

impl ItemAssessment {
    pub fn matched_any_rule(&self) -> bool {
        !self.applied_benefits.is_empty()
    }
}

/// Operation-level result, including the interstate differential
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OperationAssessment {
    pub operation: String,
    #[schemars(with = "f64")]
    pub adjusted_base: Decimal,
    #[schemars(with = "f64")]
    pub items_tax: Decimal,
    #[schemars(with = "f64")]
    pub differential: Decimal,
    #[schemars(with = "f64")]
    pub tax_due: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Totals {
    #[schemars(with = "f64")]
    pub base: Decimal,
    #[schemars(with = "f64")]
    pub tax_due: Decimal,
    #[schemars(with = "f64")]
    pub surtax_payable: Decimal,
    #[schemars(with = "f64")]
    pub surtax_credited: Decimal,
    #[schemars(with = "f64")]
    pub net_surtax: Decimal,
    #[schemars(with = "f64")]
    pub differential: Decimal,
    #[schemars(with = "f64")]
    pub asset_credit_recognized: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum AssessmentStatus {
    Pending,
    Completed,
    Failed,
}

impl AssessmentStatus {
    pub fn display(&self) -> &'static str {
        match self {
            AssessmentStatus::Pending => "Pending",
            AssessmentStatus::Completed => "Completed",
            AssessmentStatus::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for AssessmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display())
    }
}

/// Assessment of one company for one period. Never mutated once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PeriodAssessment {
    pub company: String,
    pub period: Period,
    /// 1-based run sequence for this company and period
    pub run: u32,
    /// SHA-256 of the assessed inputs
    pub input_digest: String,
    pub totals: Totals,
    pub item_assessments: Vec<ItemAssessment>,
    #[serde(default)]
    pub operations: Vec<OperationAssessment>,
    #[serde(default)]
    pub asset_movements: Vec<AssetMovement>,
    pub applied_rules: Vec<RuleId>,
    pub alerts: Vec<Alert>,
    pub confidence_score: u8,
    pub status: AssessmentStatus,
    #[serde(default)]
    pub failure: Option<FailureRecord>,
}

impl PeriodAssessment {
    pub fn pending(company: &str, period: Period) -> Self {
        PeriodAssessment {
            company: company.to_string(),
            period,
            run: 0,
            input_digest: String::new(),
            totals: Totals::default(),
            item_assessments: Vec::new(),
            operations: Vec::new(),
            asset_movements: Vec::new(),
            applied_rules: Vec::new(),
            alerts: Vec::new(),
            confidence_score: 0,
            status: AssessmentStatus::Pending,
            failure: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == AssessmentStatus::Completed
    }
}
