use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::io::Read;

/// NCM prefix mapped to a CIAP recovery category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AssetCategory {
    pub ncm_prefix: String,
    pub name: String,
    pub recovery_months: u32,
}

impl AssetCategory {
    fn new(ncm_prefix: &str, name: &str, recovery_months: u32) -> Self {
        AssetCategory {
            ncm_prefix: ncm_prefix.to_string(),
            name: name.to_string(),
            recovery_months,
        }
    }
}

/// Engine tunables. Missing keys in a config file fall back to these defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct EngineConfig {
    /// Rate (%) used when the rate table has nothing for an item
    #[schemars(with = "f64")]
    pub default_rate: Decimal,
    /// Destination internal rate (%) used for DIFAL when the destination is unknown
    #[schemars(with = "f64")]
    pub fallback_internal_rate: Decimal,
    /// Interstate rate (%) used for DIFAL when the pair is unknown
    #[schemars(with = "f64")]
    pub fallback_interstate_rate: Decimal,
    /// Recovery period for fixed assets outside every category
    pub default_recovery_months: u32,
    /// NCM chapters whose inbound acquisitions qualify for fixed-asset credit
    pub asset_chapters: Vec<String>,
    /// Most specific prefix wins
    pub asset_categories: Vec<AssetCategory>,
    /// Allowed gap between declared and assessed tax before alerting
    #[schemars(with = "f64")]
    pub declared_tax_tolerance: Decimal,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            default_rate: dec!(18),
            fallback_internal_rate: dec!(18),
            fallback_interstate_rate: dec!(12),
            default_recovery_months: 60,
            asset_chapters: ["84", "85", "87", "88", "89", "90", "94"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
            asset_categories: vec![
                AssetCategory::new("84", "machinery", 48),
                AssetCategory::new("8471", "data processing equipment", 48),
                AssetCategory::new("85", "electrical equipment", 48),
                AssetCategory::new("87", "vehicles", 48),
                AssetCategory::new("90", "instruments", 48),
                AssetCategory::new("94", "furniture", 48),
            ],
            declared_tax_tolerance: dec!(0.01),
        }
    }
}

impl EngineConfig {
    /// Read config from JSON
    pub fn from_json<R: Read>(reader: R) -> anyhow::Result<Self> {
        let config: EngineConfig = serde_json::from_reader(reader)?;
        if config.default_recovery_months == 0
            || config.asset_categories.iter().any(|c| c.recovery_months == 0)
        {
            anyhow::bail!("recovery months must be positive");
        }
        Ok(config)
    }

    /// Category with the longest prefix matching `ncm`
    pub fn asset_category(&self, ncm: &str) -> Option<&AssetCategory> {
        self.asset_categories
            .iter()
            .filter(|c| ncm.starts_with(c.ncm_prefix.as_str()))
            .max_by_key(|c| c.ncm_prefix.len())
    }

    pub fn is_asset_chapter(&self, ncm: &str) -> bool {
        self.asset_chapters.iter().any(|c| ncm.starts_with(c.as_str()))
    }
}
