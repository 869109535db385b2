use crate::core::{Cst, Jurisdiction};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;

/// Rate lookups supplied by an external collaborator (percentages)
pub trait RateTable: Send + Sync {
    /// Internal rate of `jurisdiction` for an item in tax situation `cst`
    fn internal_rate(&self, jurisdiction: &Jurisdiction, cst: &Cst) -> Option<Decimal>;

    /// Interstate rate charged by `origin` on sales to `destination`
    fn interstate_rate(&self, origin: &Jurisdiction, destination: &Jurisdiction) -> Option<Decimal>;
}

/// Modal internal rates per UF
const INTERNAL_RATES: &[(&str, Decimal)] = &[
    ("AC", dec!(19)),
    ("AL", dec!(19)),
    ("AM", dec!(20)),
    ("AP", dec!(18)),
    ("BA", dec!(20.5)),
    ("CE", dec!(20)),
    ("DF", dec!(20)),
    ("ES", dec!(17)),
    ("GO", dec!(19)),
    ("MA", dec!(23)),
    ("MG", dec!(18)),
    ("MS", dec!(17)),
    ("MT", dec!(17)),
    ("PA", dec!(19)),
    ("PB", dec!(20)),
    ("PE", dec!(20.5)),
    ("PI", dec!(22.5)),
    ("PR", dec!(19.5)),
    ("RJ", dec!(22)),
    ("RN", dec!(20)),
    ("RO", dec!(19.5)),
    ("RR", dec!(20)),
    ("RS", dec!(17)),
    ("SC", dec!(17)),
    ("SE", dec!(20)),
    ("SP", dec!(18)),
    ("TO", dec!(20)),
];

/// South and Southeast states (except ES) pay 7% on sales to the other regions
const SOUTH_SOUTHEAST: &[&str] = &["MG", "PR", "RJ", "RS", "SC", "SP"];

/// Tax situations with no ICMS due on the operation:
/// 30 exempt with ST, 40 exempt, 41 not taxed, 50 suspended, 60 ST charged earlier
const UNTAXED_SITUATIONS: &[&str] = &["30", "40", "41", "50", "60"];

/// In-memory rate table, defaulting to the Brazilian modal rates
#[derive(Debug, Clone)]
pub struct StaticRateTable {
    internal: HashMap<String, Decimal>,
    interstate: HashMap<(String, String), Decimal>,
    regional_rule: bool,
}

impl Default for StaticRateTable {
    fn default() -> Self {
        StaticRateTable {
            internal: INTERNAL_RATES
                .iter()
                .map(|(uf, rate)| (uf.to_string(), *rate))
                .collect(),
            interstate: HashMap::new(),
            regional_rule: true,
        }
    }
}

impl StaticRateTable {
    /// Table with no rates at all; every lookup misses
    pub fn empty() -> Self {
        StaticRateTable {
            internal: HashMap::new(),
            interstate: HashMap::new(),
            regional_rule: false,
        }
    }

    pub fn with_internal(mut self, jurisdiction: &str, rate: Decimal) -> Self {
        self.internal.insert(jurisdiction.to_ascii_uppercase(), rate);
        self
    }

    pub fn with_interstate(mut self, origin: &str, destination: &str, rate: Decimal) -> Self {
        self.interstate.insert(
            (origin.to_ascii_uppercase(), destination.to_ascii_uppercase()),
            rate,
        );
        self
    }

    pub fn without_internal(mut self, jurisdiction: &str) -> Self {
        self.internal.remove(&jurisdiction.to_ascii_uppercase());
        self
    }
}

impl RateTable for StaticRateTable {
    fn internal_rate(&self, jurisdiction: &Jurisdiction, cst: &Cst) -> Option<Decimal> {
        let rate = self.internal.get(jurisdiction.as_str()).copied()?;
        if UNTAXED_SITUATIONS.contains(&cst.situation()) {
            Some(Decimal::ZERO)
        } else {
            Some(rate)
        }
    }

    fn interstate_rate(&self, origin: &Jurisdiction, destination: &Jurisdiction) -> Option<Decimal> {
        if origin == destination {
            return None;
        }
        let key = (origin.as_str().to_string(), destination.as_str().to_string());
        if let Some(rate) = self.interstate.get(&key) {
            return Some(*rate);
        }
        if !self.regional_rule
            || !self.internal.contains_key(origin.as_str())
            || !self.internal.contains_key(destination.as_str())
        {
            return None;
        }
        let from_south = SOUTH_SOUTHEAST.contains(&origin.as_str());
        let to_south = SOUTH_SOUTHEAST.contains(&destination.as_str());
        if from_south && !to_south {
            Some(dec!(7))
        } else {
            Some(dec!(12))
        }
    }
}
