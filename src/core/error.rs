use super::codes::ClassificationError;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Failure of the durable ledger store
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
#[error("ledger unavailable: {0}")]
pub struct LedgerError(pub String);

/// Failure of the assessment history store
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
#[error("assessment history unavailable: {0}")]
pub struct StoreError(pub String);

/// Failure of a read-only collaborator (documents, rules)
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
#[error("{source_name} unavailable: {message}")]
pub struct SourceError {
    pub source_name: &'static str,
    pub message: String,
}

impl SourceError {
    pub fn new(source_name: &'static str, message: impl Into<String>) -> Self {
        SourceError {
            source_name,
            message: message.into(),
        }
    }
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum AssessmentError {
    #[error("item {item}: {source}")]
    InvalidClassification {
        item: String,
        #[source]
        source: ClassificationError,
    },
    #[error(transparent)]
    LedgerUnavailable(#[from] LedgerError),
    #[error(transparent)]
    SourceUnavailable(#[from] SourceError),
    #[error("operation {operation} references unknown item {item}")]
    UnknownItem { operation: String, item: String },
    #[error("duplicate item code {0}")]
    DuplicateItem(String),
    #[error("run cancelled before commit")]
    Cancelled,
}

impl AssessmentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AssessmentError::InvalidClassification { .. } => ErrorKind::InvalidClassification,
            AssessmentError::LedgerUnavailable(_) => ErrorKind::LedgerUnavailable,
            AssessmentError::SourceUnavailable(_) => ErrorKind::SourceUnavailable,
            AssessmentError::UnknownItem { .. } | AssessmentError::DuplicateItem(_) => {
                ErrorKind::IntegrityViolation
            }
            AssessmentError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

/// Serializable error category carried by a failed assessment.
///
/// `RuleNotFound` and `AssetScheduleOverflow` are recovered locally and
/// surface as alerts; no failed run carries them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum ErrorKind {
    RuleNotFound,
    InvalidClassification,
    LedgerUnavailable,
    AssetScheduleOverflow,
    SourceUnavailable,
    IntegrityViolation,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FailureRecord {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&AssessmentError> for FailureRecord {
    fn from(err: &AssessmentError) -> Self {
        FailureRecord {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_failure_record() {
        let err = AssessmentError::InvalidClassification {
            item: "A3".to_string(),
            source: ClassificationError::Ncm("12".to_string()),
        };
        let record = FailureRecord::from(&err);
        assert_eq!(record.kind, ErrorKind::InvalidClassification);
        assert_eq!(record.message, "item A3: invalid NCM '12': expected 8 digits");
    }

    #[test]
    fn history_failure_is_not_a_ledger_failure() {
        let err = StoreError("lock poisoned".to_string());
        assert_eq!(err.to_string(), "assessment history unavailable: lock poisoned");
    }

    #[test]
    fn ledger_error_converts() {
        let err: AssessmentError = LedgerError("disk full".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::LedgerUnavailable);
        assert_eq!(err.to_string(), "ledger unavailable: disk full");
    }
}
