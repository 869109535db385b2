use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Domain alerts raised while assessing a period.
///
/// Every silent local recovery (default rate, monetary clamp) emits one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type")]
pub enum Alert {
    /// Item matched no rule; tax derived from declared values.
    NoRuleMatched { item: String },
    /// No internal rate for the item's jurisdiction and CST; default used.
    DefaultRateApplied {
        item: String,
        jurisdiction: String,
        cst: String,
        #[schemars(with = "f64")]
        rate: Decimal,
    },
    /// Destination internal rate unknown; configured fallback used.
    FallbackDestinationRate {
        operation: String,
        jurisdiction: String,
        #[schemars(with = "f64")]
        rate: Decimal,
    },
    /// Interstate rate unknown for the pair; configured fallback used.
    FallbackInterstateRate {
        operation: String,
        origin: String,
        destination: String,
        #[schemars(with = "f64")]
        rate: Decimal,
    },
    /// Benefits drove the item's tax below zero; clamped to 0.
    NegativeTaxClamped {
        item: String,
        #[schemars(with = "f64")]
        computed: Decimal,
    },
    /// Declared ICMS differs from the computed amount.
    DeclaredTaxDivergence {
        item: String,
        #[schemars(with = "f64")]
        declared: Decimal,
        #[schemars(with = "f64")]
        computed: Decimal,
    },
    /// Prior period credit exceeds this period's surtax.
    NegativeNetSurtax {
        #[schemars(with = "f64")]
        net: Decimal,
    },
    /// Recognition was clamped to the acquisition's ICMS.
    AssetScheduleOverflow {
        asset_id: String,
        #[schemars(with = "f64")]
        requested: Decimal,
        #[schemars(with = "f64")]
        recognized: Decimal,
    },
}

impl Alert {
    pub fn name(&self) -> &'static str {
        match self {
            Alert::NoRuleMatched { .. } => "NoRuleMatched",
            Alert::DefaultRateApplied { .. } => "DefaultRateApplied",
            Alert::FallbackDestinationRate { .. } => "FallbackDestinationRate",
            Alert::FallbackInterstateRate { .. } => "FallbackInterstateRate",
            Alert::NegativeTaxClamped { .. } => "NegativeTaxClamped",
            Alert::DeclaredTaxDivergence { .. } => "DeclaredTaxDivergence",
            Alert::NegativeNetSurtax { .. } => "NegativeNetSurtax",
            Alert::AssetScheduleOverflow { .. } => "AssetScheduleOverflow",
        }
    }

    /// Alert raised by a rate fallback
    pub fn is_rate_fallback(&self) -> bool {
        matches!(
            self,
            Alert::DefaultRateApplied { .. }
                | Alert::FallbackDestinationRate { .. }
                | Alert::FallbackInterstateRate { .. }
        )
    }

    pub fn message(&self) -> String {
        match self {
            Alert::NoRuleMatched { item } => format!("no rule matched item {item}"),
            Alert::DefaultRateApplied {
                item,
                jurisdiction,
                cst,
                rate,
            } => format!("no rate for {jurisdiction}/CST {cst} (item {item}); default {rate}% applied"),
            Alert::FallbackDestinationRate {
                operation,
                jurisdiction,
                rate,
            } => format!("no internal rate for destination {jurisdiction} (operation {operation}); fallback {rate}% applied"),
            Alert::FallbackInterstateRate {
                operation,
                origin,
                destination,
                rate,
            } => format!("no interstate rate {origin}->{destination} (operation {operation}); fallback {rate}% applied"),
            Alert::NegativeTaxClamped { item, computed } => {
                format!("tax for item {item} computed as {computed}; clamped to 0")
            }
            Alert::DeclaredTaxDivergence {
                item,
                declared,
                computed,
            } => format!("item {item} declares {declared} but {computed} was assessed"),
            Alert::NegativeNetSurtax { net } => {
                format!("prior surtax credit exceeds current surtax; net {net} not carried forward")
            }
            Alert::AssetScheduleOverflow {
                asset_id,
                requested,
                recognized,
            } => format!("asset {asset_id}: recognition of {requested} clamped to {recognized}"),
        }
    }
}

impl std::fmt::Display for Alert {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message())
    }
}
