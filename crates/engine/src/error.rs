//! The module contains the error the engine can throw.
//!
//! Variants are grouped by how a caller should react:
//!
//! - input problems ([`Validation`], [`InvalidExpense`], [`InvalidArithmetic`],
//!   [`CurrencyMismatch`]) are reported back to the user as-is;
//! - lookups and permissions ([`KeyNotFound`], [`Forbidden`]);
//! - state conflicts ([`InvalidTransition`], [`MissingReason`], [`Conflict`],
//!   [`ExistingKey`], [`OwnerCannotLeave`]);
//! - upstream parsing failures ([`ExpenseCreationFailed`],
//!   [`ExpenseCreationTimeout`]);
//! - internal faults ([`CorruptLedger`], [`Export`], [`Database`]) that must
//!   never leak details to clients.
//!
//!  [`Validation`]: EngineError::Validation
//!  [`InvalidExpense`]: EngineError::InvalidExpense
//!  [`InvalidArithmetic`]: EngineError::InvalidArithmetic
//!  [`CurrencyMismatch`]: EngineError::CurrencyMismatch
//!  [`KeyNotFound`]: EngineError::KeyNotFound
//!  [`Forbidden`]: EngineError::Forbidden
//!  [`InvalidTransition`]: EngineError::InvalidTransition
//!  [`MissingReason`]: EngineError::MissingReason
//!  [`Conflict`]: EngineError::Conflict
//!  [`ExistingKey`]: EngineError::ExistingKey
//!  [`OwnerCannotLeave`]: EngineError::OwnerCannotLeave
//!  [`ExpenseCreationFailed`]: EngineError::ExpenseCreationFailed
//!  [`ExpenseCreationTimeout`]: EngineError::ExpenseCreationTimeout
//!  [`CorruptLedger`]: EngineError::CorruptLedger
//!  [`Export`]: EngineError::Export
//!  [`Database`]: EngineError::Database
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("Invalid expense: {0}")]
    InvalidExpense(String),
    #[error("Invalid arithmetic: {0}")]
    InvalidArithmetic(String),
    #[error("Currency mismatch: {0}")]
    CurrencyMismatch(String),
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
    #[error("A reason is required: {0}")]
    MissingReason(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error("The group owner cannot leave: {0}")]
    OwnerCannotLeave(String),
    #[error("Expense creation failed: {0}")]
    ExpenseCreationFailed(String),
    #[error("Expense creation timed out: {0}")]
    ExpenseCreationTimeout(String),
    #[error("Corrupt ledger: {0}")]
    CorruptLedger(String),
    #[error("Export failed: {0}")]
    Export(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl EngineError {
    /// Returns `true` for faults whose details must stay server-side.
    #[must_use]
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::CorruptLedger(_) | Self::Export(_) | Self::Database(_)
        )
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Validation(a), Self::Validation(b)) => a == b,
            (Self::InvalidExpense(a), Self::InvalidExpense(b)) => a == b,
            (Self::InvalidArithmetic(a), Self::InvalidArithmetic(b)) => a == b,
            (Self::CurrencyMismatch(a), Self::CurrencyMismatch(b)) => a == b,
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::Forbidden(a), Self::Forbidden(b)) => a == b,
            (Self::InvalidTransition(a), Self::InvalidTransition(b)) => a == b,
            (Self::MissingReason(a), Self::MissingReason(b)) => a == b,
            (Self::Conflict(a), Self::Conflict(b)) => a == b,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::OwnerCannotLeave(a), Self::OwnerCannotLeave(b)) => a == b,
            (Self::ExpenseCreationFailed(a), Self::ExpenseCreationFailed(b)) => a == b,
            (Self::ExpenseCreationTimeout(a), Self::ExpenseCreationTimeout(b)) => a == b,
            (Self::CorruptLedger(a), Self::CorruptLedger(b)) => a == b,
            (Self::Export(a), Self::Export(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
