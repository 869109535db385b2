//! Validated classification codes: UF jurisdiction, NCM, CFOP and CST.

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;

#[derive(Debug, thiserror::Error, PartialEq, Eq, Clone)]
pub enum ClassificationError {
    #[error("invalid jurisdiction '{0}': expected a two-letter UF code")]
    Jurisdiction(String),
    #[error("invalid NCM '{0}': expected 8 digits")]
    Ncm(String),
    #[error("invalid CFOP '{0}': expected 4 digits starting with 1-3 or 5-7")]
    Cfop(String),
    #[error("invalid CST '{0}': expected 2 or 3 digits")]
    Cst(String),
}

impl ClassificationError {
    /// Name of the classification field that failed
    pub fn field(&self) -> &'static str {
        match self {
            ClassificationError::Jurisdiction(_) => "jurisdiction",
            ClassificationError::Ncm(_) => "ncm",
            ClassificationError::Cfop(_) => "cfop",
            ClassificationError::Cst(_) => "cst",
        }
    }
}

/// Strip the dotted separators commonly found in printed codes ("8471.30.12").
fn digits_only(raw: &str) -> String {
    raw.trim().chars().filter(|c| *c != '.').collect()
}

fn all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

macro_rules! string_code {
    ($name:ident) => {
        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.0)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }

        impl JsonSchema for $name {
            fn schema_name() -> String {
                stringify!($name).to_string()
            }

            fn json_schema(gen: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
                String::json_schema(gen)
            }
        }
    };
}

/// Two-letter Brazilian state (UF) code, e.g. "SP"
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Jurisdiction(String);

impl FromStr for Jurisdiction {
    type Err = ClassificationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_ascii_uppercase();
        if code.len() == 2 && code.bytes().all(|b| b.is_ascii_uppercase()) {
            Ok(Jurisdiction(code))
        } else {
            Err(ClassificationError::Jurisdiction(s.to_string()))
        }
    }
}

string_code!(Jurisdiction);

/// Mercosur product classification (8 digits)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ncm(String);

impl Ncm {
    /// Two-digit chapter, e.g. "84" for machinery
    pub fn chapter(&self) -> &str {
        &self.0[..2]
    }
}

impl FromStr for Ncm {
    type Err = ClassificationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = digits_only(s);
        if code.len() == 8 && all_digits(&code) {
            Ok(Ncm(code))
        } else {
            Err(ClassificationError::Ncm(s.to_string()))
        }
    }
}

string_code!(Ncm);

/// Fiscal operation code (4 digits)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cfop(String);

impl Cfop {
    /// First digit 1-3: entry into the establishment
    pub fn is_inbound(&self) -> bool {
        matches!(self.0.as_bytes()[0], b'1'..=b'3')
    }

    pub fn is_outbound(&self) -> bool {
        !self.is_inbound()
    }

    /// 2xxx / 6xxx: operation with another state
    pub fn is_interstate(&self) -> bool {
        matches!(self.0.as_bytes()[0], b'2' | b'6')
    }
}

impl FromStr for Cfop {
    type Err = ClassificationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = digits_only(s);
        let valid_group = matches!(code.as_bytes().first(), Some(b'1'..=b'3' | b'5'..=b'7'));
        if code.len() == 4 && all_digits(&code) && valid_group {
            Ok(Cfop(code))
        } else {
            Err(ClassificationError::Cfop(s.to_string()))
        }
    }
}

string_code!(Cfop);

/// Tax situation code. The three-digit form carries the goods origin digit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cst(String);

impl Cst {
    /// Fully taxed situation, used where no item-specific CST applies
    pub fn taxed() -> Self {
        Cst("00".to_string())
    }

    /// Tax situation digits without the origin prefix
    pub fn situation(&self) -> &str {
        &self.0[self.0.len() - 2..]
    }
}

impl FromStr for Cst {
    type Err = ClassificationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim();
        if (code.len() == 2 || code.len() == 3) && all_digits(code) {
            Ok(Cst(code.to_string()))
        } else {
            Err(ClassificationError::Cst(s.to_string()))
        }
    }
}

string_code!(Cst);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jurisdiction_normalises_case() {
        let uf: Jurisdiction = "sp".parse().unwrap();
        assert_eq!(uf.as_str(), "SP");
        assert!("SPX".parse::<Jurisdiction>().is_err());
        assert!("S1".parse::<Jurisdiction>().is_err());
    }

    #[test]
    fn ncm_ignores_dots() {
        let ncm: Ncm = "8471.30.12".parse().unwrap();
        assert_eq!(ncm.as_str(), "84713012");
        assert_eq!(ncm.chapter(), "84");
        assert!("847130".parse::<Ncm>().is_err());
        assert!("8471301A".parse::<Ncm>().is_err());
    }

    #[test]
    fn cfop_direction() {
        let sale: Cfop = "6.102".parse().unwrap();
        assert!(sale.is_outbound());
        assert!(sale.is_interstate());
        let purchase: Cfop = "1551".parse().unwrap();
        assert!(purchase.is_inbound());
        assert!(!purchase.is_interstate());
        assert!("4102".parse::<Cfop>().is_err());
        assert!("8102".parse::<Cfop>().is_err());
        assert!("510".parse::<Cfop>().is_err());
    }

    #[test]
    fn cst_situation_drops_origin() {
        let cst: Cst = "020".parse().unwrap();
        assert_eq!(cst.situation(), "20");
        let cst: Cst = "40".parse().unwrap();
        assert_eq!(cst.situation(), "40");
        assert!("4".parse::<Cst>().is_err());
        assert!("0200".parse::<Cst>().is_err());
    }

    #[test]
    fn error_names_field() {
        let err = "xx".parse::<Ncm>().unwrap_err();
        assert_eq!(err.field(), "ncm");
    }
}
