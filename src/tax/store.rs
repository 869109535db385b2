//! Read-side collaborators (documents) and the append-only assessment history.

use crate::core::{
    AssessmentStatus, AssetAcquisition, LineItem, Operation, Period, PeriodAssessment, SourceError,
    StoreError,
};
use std::collections::HashMap;
use std::sync::RwLock;

/// Supplies the fiscal documents of a company for a period
pub trait DocumentSource: Send + Sync {
    fn line_items_and_operations(
        &self,
        company: &str,
        period: Period,
    ) -> Result<(Vec<LineItem>, Vec<Operation>), SourceError>;

    fn fixed_asset_candidates(&self, company: &str, period: Period) -> Result<Vec<AssetAcquisition>, SourceError>;
}

/// Documents of one company and period
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PeriodDocuments {
    pub items: Vec<LineItem>,
    pub operations: Vec<Operation>,
    pub acquisitions: Vec<AssetAcquisition>,
}

#[derive(Debug, Default)]
pub struct MemoryDocuments {
    documents: RwLock<HashMap<(String, Period), PeriodDocuments>>,
}

impl MemoryDocuments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the documents held for `company` and `period`
    pub fn insert(&self, company: &str, period: Period, documents: PeriodDocuments) -> Result<(), SourceError> {
        self.documents
            .write()
            .map_err(|_| SourceError::new("documents", "lock poisoned"))?
            .insert((company.to_string(), period), documents);
        Ok(())
    }

    fn get(&self, company: &str, period: Period) -> Result<PeriodDocuments, SourceError> {
        let held = self
            .documents
            .read()
            .map_err(|_| SourceError::new("documents", "lock poisoned"))?;
        // a period without documents assesses to zero
        Ok(held
            .get(&(company.to_string(), period))
            .cloned()
            .unwrap_or_default())
    }
}

impl DocumentSource for MemoryDocuments {
    fn line_items_and_operations(
        &self,
        company: &str,
        period: Period,
    ) -> Result<(Vec<LineItem>, Vec<Operation>), SourceError> {
        let documents = self.get(company, period)?;
        Ok((documents.items, documents.operations))
    }

    fn fixed_asset_candidates(&self, company: &str, period: Period) -> Result<Vec<AssetAcquisition>, SourceError> {
        Ok(self.get(company, period)?.acquisitions)
    }
}

/// Selects assessments of one company by period range (inclusive) and status
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssessmentFilter {
    pub from: Option<Period>,
    pub to: Option<Period>,
    pub status: Option<AssessmentStatus>,
}

impl AssessmentFilter {
    pub fn period(period: Period) -> Self {
        AssessmentFilter {
            from: Some(period),
            to: Some(period),
            status: None,
        }
    }

    pub fn matches(&self, assessment: &PeriodAssessment) -> bool {
        self.from.is_none_or(|from| assessment.period >= from)
            && self.to.is_none_or(|to| assessment.period <= to)
            && self.status.is_none_or(|status| assessment.status == status)
    }
}

/// Append-only history of assessments
pub trait AssessmentStore: Send + Sync {
    fn append(&self, assessment: PeriodAssessment) -> Result<(), StoreError>;

    /// Most recently appended assessment for the key, whatever its status
    fn latest(&self, company: &str, period: Period) -> Result<Option<PeriodAssessment>, StoreError>;

    /// Matching assessments ordered by period, then run
    fn list(&self, company: &str, filter: &AssessmentFilter) -> Result<Vec<PeriodAssessment>, StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryAssessments {
    history: RwLock<Vec<PeriodAssessment>>,
}

impl MemoryAssessments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history(history: Vec<PeriodAssessment>) -> Self {
        MemoryAssessments {
            history: RwLock::new(history),
        }
    }

    /// Every assessment in append order
    pub fn all(&self) -> Result<Vec<PeriodAssessment>, StoreError> {
        Ok(self.read()?.clone())
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Vec<PeriodAssessment>>, StoreError> {
        self.history
            .read()
            .map_err(|_| StoreError("lock poisoned".to_string()))
    }
}

impl AssessmentStore for MemoryAssessments {
    fn append(&self, assessment: PeriodAssessment) -> Result<(), StoreError> {
        self.history
            .write()
            .map_err(|_| StoreError("lock poisoned".to_string()))?
            .push(assessment);
        Ok(())
    }

    fn latest(&self, company: &str, period: Period) -> Result<Option<PeriodAssessment>, StoreError> {
        Ok(self
            .read()?
            .iter()
            .rev()
            .find(|a| a.company == company && a.period == period)
            .cloned())
    }

    fn list(&self, company: &str, filter: &AssessmentFilter) -> Result<Vec<PeriodAssessment>, StoreError> {
        let mut found: Vec<_> = self
            .read()?
            .iter()
            .filter(|a| a.company == company && filter.matches(a))
            .cloned()
            .collect();
        found.sort_by_key(|a| (a.period, a.run));
        Ok(found)
    }
}
