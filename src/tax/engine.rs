//! Orchestrates one (company, period) assessment run.
//!
//! A run stages every ledger and asset-record mutation in `LedgerWrites` and
//! commits it in one call after the assessment is final. Any error before
//! that point yields a Failed assessment and leaves the ledger untouched.

use super::aggregate::{confidence_score, input_digest, score_factors, totals};
use super::benefits::{BenefitPipeline, Classified};
use super::ciap::AssetAmortizer;
use super::config::EngineConfig;
use super::difal::DifferentialCalculator;
use super::ledger::{reconcile_with, CreditLedger, LedgerWrites};
use super::rates::RateTable;
use super::rules::{RuleRepository, RuleSource};
use super::store::{AssessmentFilter, AssessmentStore, DocumentSource};
use crate::core::{
    Alert, AssessmentError, AssessmentStatus, Company, FailureRecord, ItemAssessment, Period,
    PeriodAssessment, RuleId, StoreError,
};
use rust_decimal::Decimal;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Cooperative cancellation, checked between run stages
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), AssessmentError> {
        if self.is_cancelled() {
            return Err(AssessmentError::Cancelled);
        }
        Ok(())
    }
}

/// One mutex per (company, period); distinct keys never contend
#[derive(Debug, Default)]
struct RunLocks {
    locks: Mutex<HashMap<(String, Period), Arc<Mutex<()>>>>,
}

impl RunLocks {
    fn key(&self, company: &str, period: Period) -> Arc<Mutex<()>> {
        let mut locks = match self.locks.lock() {
            Ok(locks) => locks,
            Err(poisoned) => poisoned.into_inner(),
        };
        locks
            .entry((company.to_string(), period))
            .or_default()
            .clone()
    }
}

pub struct AssessmentEngine {
    rules: Arc<dyn RuleSource>,
    rates: Arc<dyn RateTable>,
    documents: Arc<dyn DocumentSource>,
    ledger: Arc<dyn CreditLedger>,
    history: Arc<dyn AssessmentStore>,
    config: EngineConfig,
    locks: RunLocks,
}

impl AssessmentEngine {
    pub fn new(
        rules: Arc<dyn RuleSource>,
        rates: Arc<dyn RateTable>,
        documents: Arc<dyn DocumentSource>,
        ledger: Arc<dyn CreditLedger>,
        history: Arc<dyn AssessmentStore>,
    ) -> Self {
        AssessmentEngine {
            rules,
            rates,
            documents,
            ledger,
            history,
            config: EngineConfig::default(),
            locks: RunLocks::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn run_assessment(&self, company: &Company, period: Period) -> Result<PeriodAssessment, StoreError> {
        self.run_assessment_with(company, period, &CancelToken::new())
    }

    /// Assess `company` for `period` and append the result to the history.
    ///
    /// Assessment failures are returned as a Failed `PeriodAssessment`; `Err`
    /// means the history itself could not be written.
    pub fn run_assessment_with(
        &self,
        company: &Company,
        period: Period,
        cancel: &CancelToken,
    ) -> Result<PeriodAssessment, StoreError> {
        let key_lock = self.locks.key(&company.id, period);
        let _guard = match key_lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let run = self
            .history
            .list(&company.id, &AssessmentFilter::period(period))?
            .len() as u32
            + 1;
        log::info!("Assessing {} {} (run {})", company.id, period, run);

        let result = self.assess(company, period, run, cancel).and_then(|(assessment, writes)| {
            cancel.check()?;
            self.ledger.commit(writes)?;
            Ok(assessment)
        });

        let assessment = match result {
            Ok(assessment) => {
                log::info!(
                    "Assessed {} {}: tax due {}, net surtax {}, asset credit {}, confidence {}",
                    company.id,
                    period,
                    assessment.totals.tax_due,
                    assessment.totals.net_surtax,
                    assessment.totals.asset_credit_recognized,
                    assessment.confidence_score
                );
                assessment
            }
            Err(err) => {
                log::error!("Assessment {} {} failed ({:?}): {}", company.id, period, err.kind(), err);
                failed(company, period, run, &err)
            }
        };

        self.history.append(assessment.clone())?;
        Ok(assessment)
    }

    /// Latest assessment for the key, whatever its status
    pub fn get_assessment(&self, company: &str, period: Period) -> Result<Option<PeriodAssessment>, StoreError> {
        self.history.latest(company, period)
    }

    pub fn list_assessments(
        &self,
        company: &str,
        filter: &AssessmentFilter,
    ) -> Result<Vec<PeriodAssessment>, StoreError> {
        self.history.list(company, filter)
    }

    fn assess(
        &self,
        company: &Company,
        period: Period,
        run: u32,
        cancel: &CancelToken,
    ) -> Result<(PeriodAssessment, LedgerWrites), AssessmentError> {
        let as_of = period.last_day();
        let jurisdiction = &company.jurisdiction;

        let rules = RuleRepository::new(self.rules.rules(jurisdiction, as_of)?);
        let (items, operations) = self.documents.line_items_and_operations(&company.id, period)?;
        let candidates = self.documents.fixed_asset_candidates(&company.id, period)?;
        log::debug!(
            "{} {}: {} rules, {} items, {} operations, {} asset candidates",
            company.id,
            period,
            rules.len(),
            items.len(),
            operations.len(),
            candidates.len()
        );

        let mut codes = HashSet::new();
        for item in &items {
            if !codes.insert(item.code.as_str()) {
                return Err(AssessmentError::DuplicateItem(item.code.clone()));
            }
        }
        cancel.check()?;

        // items
        let pipeline = BenefitPipeline::new(jurisdiction, self.rates.as_ref(), &self.config);
        let mut alerts = Vec::new();
        let mut item_assessments = Vec::with_capacity(items.len());
        for item in &items {
            let classified = Classified::of(item)?;
            let matched = rules.find_applicable(
                jurisdiction,
                classified.ncm.as_str(),
                classified.cfop.as_str(),
                classified.cst.as_str(),
                as_of,
            );
            let outcome = pipeline.assess(item, &classified, &matched);
            alerts.extend(outcome.alerts);
            item_assessments.push(outcome.assessment);
        }
        cancel.check()?;

        // operations
        let by_code: HashMap<&str, &ItemAssessment> = item_assessments
            .iter()
            .map(|a| (a.item.code.as_str(), a))
            .collect();
        let calculator = DifferentialCalculator::new(self.rates.as_ref(), &self.config);
        let mut operation_assessments = Vec::with_capacity(operations.len());
        for operation in &operations {
            let members = operation
                .item_codes
                .iter()
                .map(|code| {
                    by_code
                        .get(code.as_str())
                        .copied()
                        .ok_or_else(|| AssessmentError::UnknownItem {
                            operation: operation.id.clone(),
                            item: code.clone(),
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;
            let outcome = calculator.assess(operation, &members);
            alerts.extend(outcome.alerts);
            operation_assessments.push(outcome.assessment);
        }

        // surtax against the prior period
        let current_payable: Decimal = item_assessments.iter().map(|a| a.surtax).sum();
        let surtax = reconcile_with(self.ledger.as_ref(), &company.id, period, current_payable)?;
        if surtax.net < Decimal::ZERO {
            alerts.push(Alert::NegativeNetSurtax {
                net: surtax.net.round_dp(2),
            });
        }
        cancel.check()?;

        // fixed-asset schedules
        let amortizer = AssetAmortizer::new(&self.config);
        let mut records = self.ledger.asset_records(&company.id)?;
        let mut opened = HashSet::new();
        for candidate in &candidates {
            if records.iter().any(|r| r.asset_id == candidate.asset_id) {
                log::debug!("Asset {} already scheduled", candidate.asset_id);
                continue;
            }
            if let Some(record) = amortizer.open(&company.id, candidate, &rules, jurisdiction, as_of)? {
                opened.insert(record.asset_id.clone());
                records.push(record);
            }
        }
        let mut movements = Vec::new();
        let mut staged = Vec::new();
        for mut record in records {
            if let Some(recognition) = amortizer.advance(&mut record, as_of) {
                let mut movement = recognition.movement;
                movement.created = opened.contains(&record.asset_id);
                movements.push(movement);
                alerts.extend(recognition.alert);
                staged.push(record);
            }
        }
        cancel.check()?;

        let totals = totals(&item_assessments, &operation_assessments, &surtax, &movements);
        let confidence_score = confidence_score(&score_factors(&item_assessments, &alerts, &totals));
        let applied_rules: Vec<RuleId> = item_assessments
            .iter()
            .flat_map(|a| a.applied_benefits.iter().map(|b| b.rule))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let assessment = PeriodAssessment {
            company: company.id.clone(),
            period,
            run,
            input_digest: input_digest(&items, &operations, &candidates, &rules.ids()),
            totals,
            item_assessments,
            operations: operation_assessments,
            asset_movements: movements,
            applied_rules,
            alerts,
            confidence_score,
            status: AssessmentStatus::Completed,
            failure: None,
        };
        let writes = LedgerWrites {
            company: company.id.clone(),
            period,
            payable_surtax: assessment.totals.surtax_payable,
            asset_records: staged,
        };
        Ok((assessment, writes))
    }
}

fn failed(company: &Company, period: Period, run: u32, err: &AssessmentError) -> PeriodAssessment {
    PeriodAssessment {
        run,
        status: AssessmentStatus::Failed,
        failure: Some(FailureRecord::from(err)),
        ..PeriodAssessment::pending(&company.id, period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CodeMatch, ErrorKind, LineItem, RuleKind, SourceError, TaxRule};
    use crate::tax::ledger::MemoryLedger;
    use crate::tax::rates::StaticRateTable;
    use crate::tax::store::{MemoryAssessments, MemoryDocuments, PeriodDocuments};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    struct Unavailable;

    impl RuleSource for Unavailable {
        fn rules(
            &self,
            _: &crate::core::Jurisdiction,
            _: NaiveDate,
        ) -> Result<Vec<TaxRule>, SourceError> {
            Err(SourceError::new("rules", "connection refused"))
        }
    }

    fn company() -> Company {
        Company {
            id: "ACME".to_string(),
            jurisdiction: "SP".parse().unwrap(),
        }
    }

    fn item(code: &str, base: Decimal) -> LineItem {
        LineItem {
            code: code.to_string(),
            description: String::new(),
            ncm: "84713012".to_string(),
            cfop: "5102".to_string(),
            cst: "00".to_string(),
            quantity: dec!(1),
            unit_value: base,
            total_value: base,
            discount: None,
            declared_base: Some(base),
            declared_tax: None,
        }
    }

    fn engine(rules: Arc<dyn RuleSource>, documents: Arc<MemoryDocuments>) -> AssessmentEngine {
        AssessmentEngine::new(
            rules,
            Arc::new(StaticRateTable::default()),
            documents,
            Arc::new(MemoryLedger::new()),
            Arc::new(MemoryAssessments::new()),
        )
    }

    #[test]
    fn composed_benefits_through_engine() {
        let rule = |id, kind| TaxRule {
            id,
            jurisdiction: "SP".parse().unwrap(),
            kind,
            ncm_match: CodeMatch::Any,
            cfop_match: CodeMatch::Any,
            cst_match: CodeMatch::Any,
            valid_from: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            valid_to: None,
            active: true,
            provenance: String::new(),
        };
        let rules = RuleRepository::new(vec![
            rule(1, RuleKind::ReducedBase { reduction_pct: dec!(50) }),
            rule(2, RuleKind::PresumedCredit { credit_pct: dec!(10) }),
        ]);
        let period: Period = "2025-01".parse().unwrap();
        let documents = Arc::new(MemoryDocuments::new());
        documents.insert(
            "ACME",
            period,
            PeriodDocuments {
                items: vec![item("A", dec!(1000))],
                ..PeriodDocuments::default()
            },
        )
        .unwrap();
        let engine = engine(Arc::new(rules), documents);
        let a = engine.run_assessment(&company(), period).unwrap();
        assert_eq!(a.status, AssessmentStatus::Completed);
        assert_eq!(a.totals.tax_due, dec!(81));
        assert_eq!(a.applied_rules, vec![1, 2]);
        assert_eq!(a.confidence_score, 100);
        assert_eq!(a.run, 1);
        assert_eq!(engine.run_assessment(&company(), period).unwrap().run, 2);
    }

    #[test]
    fn source_failure_fails_run() {
        let engine = engine(Arc::new(Unavailable), Arc::new(MemoryDocuments::new()));
        let period = "2025-01".parse().unwrap();
        let a = engine.run_assessment(&company(), period).unwrap();
        assert_eq!(a.status, AssessmentStatus::Failed);
        assert_eq!(a.confidence_score, 0);
        assert_eq!(a.failure.unwrap().kind, ErrorKind::SourceUnavailable);
        assert_eq!(engine.get_assessment("ACME", period).unwrap().unwrap().status, AssessmentStatus::Failed);
    }

    #[test]
    fn cancelled_run_commits_nothing() {
        let ledger = Arc::new(MemoryLedger::new());
        let engine = AssessmentEngine::new(
            Arc::new(RuleRepository::default()),
            Arc::new(StaticRateTable::default()),
            Arc::new(MemoryDocuments::new()),
            ledger.clone(),
            Arc::new(MemoryAssessments::new()),
        );
        let cancel = CancelToken::new();
        cancel.cancel();
        let a = engine
            .run_assessment_with(&company(), "2025-01".parse().unwrap(), &cancel)
            .unwrap();
        assert_eq!(a.failure.unwrap().kind, ErrorKind::Cancelled);
        assert!(ledger.entries().unwrap().is_empty());
    }
}
