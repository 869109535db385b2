pub mod aggregate;
pub mod benefits;
pub mod ciap;
pub mod config;
pub mod difal;
pub mod engine;
pub mod ledger;
pub mod rates;
pub mod rules;
pub mod store;

pub use aggregate::{confidence_score, input_digest, ScoreFactor, CONFIDENCE_TABLE};
pub use benefits::{BenefitPipeline, Classified, ItemOutcome};
pub use ciap::{AssetAmortizer, Recognition};
pub use config::{AssetCategory, EngineConfig};
pub use difal::{differential, DifferentialCalculator, DifferentialOutcome};
pub use engine::{AssessmentEngine, CancelToken};
pub use ledger::{reconcile, CreditLedger, LedgerWrites, MemoryLedger, SurtaxReconciliation};
pub use rates::{RateTable, StaticRateTable};
pub use rules::{RuleRepository, RuleSource};
pub use store::{
    AssessmentFilter, AssessmentStore, DocumentSource, MemoryAssessments, MemoryDocuments,
    PeriodDocuments,
};
