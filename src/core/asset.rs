use chrono::NaiveDate;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum AssetStatus {
    Active,
    /// Fully recognised; never reopens
    Settled,
}

/// CIAP schedule recovering the ICMS paid on a fixed-asset acquisition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FixedAssetCreditRecord {
    pub asset_id: String,
    pub company: String,
    #[serde(default)]
    pub description: String,
    pub ncm: String,
    pub category: String,
    pub acquisition_date: NaiveDate,
    #[schemars(with = "f64")]
    pub acquisition_value: Decimal,
    #[schemars(with = "f64")]
    pub icms_on_acquisition: Decimal,
    pub recovery_months: u32,
    #[schemars(with = "f64")]
    pub monthly_installment: Decimal,
    #[schemars(with = "f64")]
    pub cumulative_recognized: Decimal,
    #[schemars(with = "f64")]
    pub balance_remaining: Decimal,
    pub status: AssetStatus,
}

impl FixedAssetCreditRecord {
    pub fn is_active(&self) -> bool {
        self.status == AssetStatus::Active
    }
}

/// Recognition applied to one record during a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AssetMovement {
    pub asset_id: String,
    pub months_elapsed: u32,
    #[schemars(with = "f64")]
    pub recognized: Decimal,
    #[schemars(with = "f64")]
    pub cumulative_recognized: Decimal,
    #[schemars(with = "f64")]
    pub balance_remaining: Decimal,
    pub status: AssetStatus,
    /// Record was created by this run
    pub created: bool,
}
