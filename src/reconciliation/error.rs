use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use chrono::NaiveDate;
use serde_json::json;
use thiserror::Error;

/// Failures reported by the storage layer.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Compare-and-swap on the employee balances found different values.
    #[error("leave balance of employee {0} changed concurrently")]
    BalanceChanged(u64),

    /// A ledger record overlapping the period was committed first.
    #[error("employee {0} already has a reconciliation overlapping this period")]
    DuplicateLedgerEntry(u64),

    #[error("{0}")]
    Unavailable(String),
}

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("employee {0} not found")]
    NotFound(u64),

    #[error("period end {end} is before period start {start}")]
    InvalidPeriod { start: NaiveDate, end: NaiveDate },

    #[error(
        "period {start}..{end} overlaps an existing reconciliation {existing_start}..{existing_end}"
    )]
    PeriodOverlap {
        start: NaiveDate,
        end: NaiveDate,
        existing_start: NaiveDate,
        existing_end: NaiveDate,
    },

    /// Another reconciliation for the same employee won the race; retrying is safe.
    #[error("concurrent reconciliation for employee {0}, retry")]
    Conflict(u64),

    #[error("failed to persist reconciliation: {0}")]
    Persistence(#[source] StoreError),

    /// Reading employee, leave, attendance or ledger data failed.
    #[error("failed to load reconciliation inputs: {0}")]
    Storage(#[source] StoreError),
}

impl ReconcileError {
    pub fn kind(&self) -> &'static str {
        match self {
            ReconcileError::NotFound(_) => "NotFound",
            ReconcileError::InvalidPeriod { .. } => "InvalidPeriod",
            ReconcileError::PeriodOverlap { .. } => "PeriodOverlap",
            ReconcileError::Conflict(_) => "Conflict",
            ReconcileError::Persistence(_) => "PersistenceError",
            ReconcileError::Storage(_) => "StorageError",
        }
    }
}

impl ResponseError for ReconcileError {
    fn status_code(&self) -> StatusCode {
        match self {
            ReconcileError::NotFound(_) => StatusCode::NOT_FOUND,
            ReconcileError::InvalidPeriod { .. } => StatusCode::BAD_REQUEST,
            ReconcileError::PeriodOverlap { .. } | ReconcileError::Conflict(_) => {
                StatusCode::CONFLICT
            }
            ReconcileError::Persistence(_) | ReconcileError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            // storage details stay in the logs
            ReconcileError::Persistence(_) => "Failed to persist reconciliation, retry".to_string(),
            ReconcileError::Storage(_) => "Internal Server Error".to_string(),
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(json!({
            "error": self.kind(),
            "message": message,
        }))
    }
}
