use super::codes::Jurisdiction;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub type RuleId = u64;

/// Classification matcher: wildcard or a set of code prefixes
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CodeMatch {
    #[default]
    Any,
    Prefixes(Vec<String>),
}

impl CodeMatch {
    pub fn prefixes<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let prefixes: Vec<String> = prefixes
            .into_iter()
            .map(|p| p.as_ref().trim().replace('.', ""))
            .collect();
        if prefixes.iter().any(|p| p == "*") {
            CodeMatch::Any
        } else {
            CodeMatch::Prefixes(prefixes)
        }
    }

    pub fn matches(&self, code: &str) -> bool {
        match self {
            CodeMatch::Any => true,
            CodeMatch::Prefixes(prefixes) => prefixes.iter().any(|p| code.starts_with(p.as_str())),
        }
    }
}

impl Serialize for CodeMatch {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CodeMatch::Any => serializer.serialize_str("*"),
            CodeMatch::Prefixes(p) => p.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for CodeMatch {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            One(String),
            Many(Vec<String>),
        }
        Ok(match Raw::deserialize(deserializer)? {
            Raw::One(s) => CodeMatch::prefixes([s]),
            Raw::Many(v) => CodeMatch::prefixes(v),
        })
    }
}

impl JsonSchema for CodeMatch {
    fn schema_name() -> String {
        "CodeMatch".to_string()
    }

    fn json_schema(gen: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        // "*" or a list of prefixes
        <Vec<String>>::json_schema(gen)
    }
}

/// Benefit type with its percentage parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind")]
pub enum RuleKind {
    /// Reduces the calculation base by `reduction_pct` percent
    ReducedBase {
        #[schemars(with = "f64")]
        reduction_pct: Decimal,
    },
    /// Grants a credit of `credit_pct` percent of the computed tax
    PresumedCredit {
        #[schemars(with = "f64")]
        credit_pct: Decimal,
    },
    /// Regional incentive surtax on the pre-reduction base
    RegionalSurtax {
        #[schemars(with = "f64")]
        surtax_pct: Decimal,
    },
    /// Fixed-asset credit recovery; optional override of the recovery period
    FixedAssetCredit {
        #[serde(default)]
        recovery_months: Option<u32>,
    },
    /// Removes the remaining tax of the item
    Exemption,
}

impl RuleKind {
    pub fn label(&self) -> BenefitKind {
        match self {
            RuleKind::ReducedBase { .. } => BenefitKind::ReducedBase,
            RuleKind::PresumedCredit { .. } => BenefitKind::PresumedCredit,
            RuleKind::RegionalSurtax { .. } => BenefitKind::RegionalSurtax,
            RuleKind::FixedAssetCredit { .. } => BenefitKind::FixedAssetCredit,
            RuleKind::Exemption => BenefitKind::Exemption,
        }
    }
}

/// Parameter-free rule kind, used when reporting applied benefits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum BenefitKind {
    ReducedBase,
    PresumedCredit,
    RegionalSurtax,
    FixedAssetCredit,
    Exemption,
}

impl BenefitKind {
    pub fn display(&self) -> &'static str {
        match self {
            BenefitKind::ReducedBase => "Reduced base",
            BenefitKind::PresumedCredit => "Presumed credit",
            BenefitKind::RegionalSurtax => "Regional surtax",
            BenefitKind::FixedAssetCredit => "Fixed-asset credit",
            BenefitKind::Exemption => "Exemption",
        }
    }
}

impl std::fmt::Display for BenefitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display())
    }
}

/// Tax benefit rule for one jurisdiction and validity window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TaxRule {
    pub id: RuleId,
    pub jurisdiction: Jurisdiction,
    #[serde(flatten)]
    pub kind: RuleKind,
    #[serde(default)]
    pub ncm_match: CodeMatch,
    #[serde(default)]
    pub cfop_match: CodeMatch,
    #[serde(default)]
    pub cst_match: CodeMatch,
    pub valid_from: NaiveDate,
    #[serde(default)]
    pub valid_to: Option<NaiveDate>,
    #[serde(default = "default_active")]
    pub active: bool,
    /// Legal source of the benefit (decree, article)
    #[serde(default)]
    pub provenance: String,
}

fn default_active() -> bool {
    true
}

impl TaxRule {
    /// Rule is active and `as_of` falls inside its validity window
    pub fn in_force(&self, as_of: NaiveDate) -> bool {
        self.active && self.valid_from <= as_of && self.valid_to.is_none_or(|to| as_of <= to)
    }

    pub fn matches_codes(&self, ncm: &str, cfop: &str, cst: &str) -> bool {
        self.ncm_match.matches(ncm) && self.cfop_match.matches(cfop) && self.cst_match.matches(cst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn wildcard_matches_anything() {
        assert!(CodeMatch::Any.matches("84713012"));
        assert!(CodeMatch::prefixes(["84", "*"]).matches("22030000"));
    }

    #[test]
    fn prefixes_match_hierarchy() {
        let m = CodeMatch::prefixes(["8471", "85.17"]);
        assert!(m.matches("84713012"));
        assert!(m.matches("85171231"));
        assert!(!m.matches("84720000"));
    }

    #[test]
    fn deserialize_rule() {
        let json = r#"{
            "id": 7,
            "jurisdiction": "SP",
            "kind": "ReducedBase",
            "reduction_pct": 33.33,
            "ncm_match": ["8471"],
            "cfop_match": "*",
            "valid_from": "2024-01-01",
            "provenance": "RICMS/SP Anexo II art. 12"
        }"#;
        let rule: TaxRule = serde_json::from_str(json).unwrap();
        assert_eq!(rule.kind, RuleKind::ReducedBase { reduction_pct: dec!(33.33) });
        assert_eq!(rule.cfop_match, CodeMatch::Any);
        assert_eq!(rule.cst_match, CodeMatch::Any);
        assert!(rule.active);
        assert!(rule.valid_to.is_none());
    }

    #[test]
    fn validity_window_inclusive() {
        let rule = TaxRule {
            id: 1,
            jurisdiction: "SP".parse().unwrap(),
            kind: RuleKind::Exemption,
            ncm_match: CodeMatch::Any,
            cfop_match: CodeMatch::Any,
            cst_match: CodeMatch::Any,
            valid_from: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            valid_to: NaiveDate::from_ymd_opt(2024, 12, 31),
            active: true,
            provenance: String::new(),
        };
        assert!(rule.in_force(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()));
        assert!(rule.in_force(NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()));
        assert!(!rule.in_force(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()));
        assert!(!TaxRule { active: false, ..rule }
            .in_force(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()));
    }
}
