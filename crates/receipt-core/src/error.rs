use crate::types::{Field, StageStatus, StatusSlot};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReceiptError {
    #[error("not initialized: run 'receipts init'")]
    NotInitialized,

    #[error("sheet not found: {0}")]
    SheetNotFound(String),

    #[error("row {row} out of range (last row is {last})")]
    RowOutOfRange { row: u32, last: u32 },

    #[error("invalid cell address ({row}, {col}): rows and columns start at 1")]
    InvalidAddress { row: u32, col: u32 },

    #[error("invalid A1 reference '{0}'")]
    InvalidA1(String),

    #[error("invalid {slot} status transition from {from} to {to}")]
    InvalidTransition {
        slot: StatusSlot,
        from: StageStatus,
        to: StageStatus,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, ReceiptError>;

// ---------------------------------------------------------------------------
// Stage errors
// ---------------------------------------------------------------------------

/// A response row that cannot produce a receipt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingField(Field),

    #[error("amount is not a number: '{0}'")]
    NonNumericAmount(String),
}

/// One strategy's failure inside a [`RenderError`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyFailure {
    pub strategy: String,
    pub cause: String,
}

/// Every configured render strategy failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", render_summary(.attempts))]
pub struct RenderError {
    pub attempts: Vec<StrategyFailure>,
}

fn render_summary(attempts: &[StrategyFailure]) -> String {
    if attempts.is_empty() {
        return "no render strategy configured".to_string();
    }
    let causes: Vec<String> = attempts
        .iter()
        .map(|a| format!("{}: {}", a.strategy, a.cause))
        .collect();
    format!("rendering failed ({})", causes.join("; "))
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("file not found: {0}")]
    NotFound(String),

    #[error("unsupported conversion to {0}")]
    UnsupportedFormat(String),

    #[error("conversion failed: {0}")]
    Conversion(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<ReceiptError> for StorageError {
    fn from(e: ReceiptError) -> Self {
        match e {
            ReceiptError::Io(e) => StorageError::Io(e),
            other => StorageError::Io(std::io::Error::other(other)),
        }
    }
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Invalid email")]
    InvalidEmail(String),

    #[error("send failed: {0}")]
    Transport(String),
}

/// Writing a status cell failed. Logged and dropped, never recorded on the row.
#[derive(Debug, Error)]
#[error("failed to write {slot} status for row {row}: {source}")]
pub struct StatusWriteError {
    pub row: u32,
    pub slot: StatusSlot,
    #[source]
    pub source: ReceiptError,
}
