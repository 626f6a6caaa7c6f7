//! Billing domain errors

use core_kernel::{CoreError, MemberId, MoneyError, PortError, TemporalError};
use thiserror::Error;

use crate::invoice::InvoiceState;
use crate::reference::ReferenceError;

/// Errors that can occur in the billing domain
#[derive(Debug, Error)]
pub enum BillingError {
    /// Member not found
    #[error("Member not found: {0}")]
    MemberNotFound(MemberId),

    /// Billing year division outside 1, 2, 3, 4, 12
    #[error("Unsupported billing year division: {0}")]
    UnsupportedDivision(u32),

    /// Invoice state machine violation
    #[error("Invalid invoice transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: InvoiceState,
        to: InvoiceState,
    },

    /// The period was already billed
    #[error("Membership period already invoiced (fraction {fraction})")]
    AlreadyInvoiced {
        fraction: u32,
    },

    /// Calculation error
    #[error("Calculation error: {0}")]
    CalculationError(String),

    /// Payment reference could not be built
    #[error(transparent)]
    Reference(#[from] ReferenceError),

    /// Repository failure
    #[error("Repository error: {0}")]
    Port(#[from] PortError),

    /// Kernel error
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl From<MoneyError> for BillingError {
    fn from(error: MoneyError) -> Self {
        BillingError::Core(CoreError::Money(error))
    }
}

impl From<TemporalError> for BillingError {
    fn from(error: TemporalError) -> Self {
        BillingError::Core(CoreError::Temporal(error))
    }
}

pub type Result<T> = std::result::Result<T, BillingError>;
