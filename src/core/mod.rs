pub mod alerts;
pub mod assessment;
pub mod asset;
pub mod codes;
pub mod error;
pub mod item;
pub mod period;
pub mod rule;

// Flat public surface for domain types and functions.
pub use alerts::Alert;
pub use assessment::{
    AppliedBenefit, AssessmentStatus, ItemAssessment, OperationAssessment, PeriodAssessment,
    Totals,
};
pub use asset::{AssetMovement, AssetStatus, FixedAssetCreditRecord};
pub use codes::{Cfop, ClassificationError, Cst, Jurisdiction, Ncm};
pub use error::{
    AssessmentError, ErrorKind, FailureRecord, LedgerError, SourceError,
    StoreError,
};
pub use item::{
    read_line_items_csv, AssetAcquisition, Company, CsvField, Direction, LineItem, Operation,
};
pub use period::{whole_months_between, Period, PeriodError};
pub use rule::{BenefitKind, CodeMatch, RuleId, RuleKind, TaxRule};
