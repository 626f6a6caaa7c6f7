//! Bank integration error types
//!
//! Errors raised while reading statements, writing export files or talking
//! to payment sources.

use thiserror::Error;

use core_kernel::PortError;
use domain_billing::{BillingError, ReferenceError};

/// Errors that can occur in the bank integration layer
#[derive(Debug, Error)]
pub enum BankError {
    /// The file is not a statement format we can read
    #[error("Unsupported file: {reason}")]
    UnsupportedFile { reason: String },

    /// The XML could not be read or written
    #[error("XML error: {0}")]
    Xml(String),

    /// The bank rejected our credentials
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// A payment source failed in a way that does not degrade
    #[error("Payment source error: {0}")]
    Source(#[from] PortError),

    /// The organization settings lack what an export needs
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Imported payments could not be processed
    #[error("Billing error: {0}")]
    Billing(#[from] BillingError),

    /// A reference could not be built for an export
    #[error(transparent)]
    Reference(#[from] ReferenceError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BankError {
    /// Creates an unsupported file error
    pub fn unsupported(reason: impl Into<String>) -> Self {
        BankError::UnsupportedFile { reason: reason.into() }
    }

    pub(crate) fn xml(error: impl std::fmt::Display) -> Self {
        BankError::Xml(error.to_string())
    }

    /// Checks if the error comes from the file content rather than the environment
    pub fn is_unsupported_file(&self) -> bool {
        matches!(self, BankError::UnsupportedFile { .. } | BankError::Xml(_))
    }
}

/// Result type for bank operations
pub type Result<T> = std::result::Result<T, BankError>;
