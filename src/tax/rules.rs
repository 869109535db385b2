use crate::core::{Jurisdiction, RuleId, RuleKind, SourceError, TaxRule};
use chrono::NaiveDate;

/// Rule administration collaborator
pub trait RuleSource: Send + Sync {
    /// Rules of `jurisdiction` in force on `as_of`
    fn rules(&self, jurisdiction: &Jurisdiction, as_of: NaiveDate) -> Result<Vec<TaxRule>, SourceError>;
}

/// Rule set held in id order, the order in which matching rules are applied
#[derive(Debug, Clone, Default)]
pub struct RuleRepository {
    rules: Vec<TaxRule>,
}

impl RuleRepository {
    pub fn new(mut rules: Vec<TaxRule>) -> Self {
        rules.sort_by_key(|r| r.id);
        RuleRepository { rules }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn ids(&self) -> Vec<RuleId> {
        self.rules.iter().map(|r| r.id).collect()
    }

    /// Every rule matching the codes and in force on `as_of`, ascending by id.
    ///
    /// All matches are returned, not a single best match; the caller applies
    /// them cumulatively.
    pub fn find_applicable(
        &self,
        jurisdiction: &Jurisdiction,
        ncm: &str,
        cfop: &str,
        cst: &str,
        as_of: NaiveDate,
    ) -> Vec<&TaxRule> {
        self.rules
            .iter()
            .filter(|r| &r.jurisdiction == jurisdiction)
            .filter(|r| r.in_force(as_of))
            .filter(|r| r.matches_codes(ncm, cfop, cst))
            .collect()
    }

    /// FixedAssetCredit rules matching an acquisition (any CST)
    pub fn find_asset_rules(
        &self,
        jurisdiction: &Jurisdiction,
        ncm: &str,
        cfop: &str,
        as_of: NaiveDate,
    ) -> Vec<&TaxRule> {
        self.rules
            .iter()
            .filter(|r| matches!(r.kind, RuleKind::FixedAssetCredit { .. }))
            .filter(|r| &r.jurisdiction == jurisdiction && r.in_force(as_of))
            .filter(|r| r.ncm_match.matches(ncm) && r.cfop_match.matches(cfop))
            .collect()
    }
}

impl RuleSource for RuleRepository {
    fn rules(&self, jurisdiction: &Jurisdiction, as_of: NaiveDate) -> Result<Vec<TaxRule>, SourceError> {
        Ok(self
            .rules
            .iter()
            .filter(|r| &r.jurisdiction == jurisdiction && r.in_force(as_of))
            .cloned()
            .collect())
    }
}
