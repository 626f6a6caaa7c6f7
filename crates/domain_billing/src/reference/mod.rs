//! Payment references
//!
//! A payment reference lets a bank transfer be matched back to exactly one
//! invoice. Two formats are supported, both embedding the member and invoice
//! identifiers plus a checksum:
//!
//! - [`CreditorReference`]: ISO 11649 "RF" reference, mod-97 checksum
//! - [`QrReference`]: Swiss 27-digit structured reference, recursive mod-10
//!
//! Which one an organization uses depends on its country; [`ReferenceCodec`]
//! makes that choice once from the [`OrgConfig`].

pub mod qr;
pub mod rf;

use std::fmt;

use core_kernel::{InvoiceId, MemberId, OrgConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use qr::QrReference;
pub use rf::CreditorReference;

/// Largest identifier that fits the 8-digit reference fields
pub const MAX_REFERENCE_ID: u64 = 99_999_999;

/// Errors raised while building references
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReferenceError {
    #[error("{field} {value} does not fit in a payment reference (1..={max})", max = MAX_REFERENCE_ID)]
    IdOutOfRange {
        field: &'static str,
        value: u64,
    },

    #[error("Invalid bank reference prefix: {0:?}")]
    InvalidBankReference(String),
}

/// The pair of identifiers a payment reference carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReferenceCode {
    pub member_id: MemberId,
    pub invoice_id: InvoiceId,
}

impl ReferenceCode {
    pub fn new(member_id: MemberId, invoice_id: InvoiceId) -> Self {
        Self { member_id, invoice_id }
    }

    /// Raw member and invoice values, rejecting ids that overflow 8 digits
    fn checked_ids(&self) -> Result<(u64, u64), ReferenceError> {
        let member = check_range("member_id", self.member_id.value())?;
        let invoice = check_range("invoice_id", self.invoice_id.value())?;
        Ok((member, invoice))
    }
}

impl fmt::Display for ReferenceCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.member_id, self.invoice_id)
    }
}

fn check_range(field: &'static str, value: u64) -> Result<u64, ReferenceError> {
    if value == 0 || value > MAX_REFERENCE_ID {
        return Err(ReferenceError::IdOutOfRange { field, value });
    }
    Ok(value)
}

/// Reference format selected for an organization
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceCodec {
    /// ISO 11649 creditor reference
    Rf,
    /// Swiss structured reference with the bank's prefix
    Qr(QrReference),
}

impl ReferenceCodec {
    /// Swiss organizations use QR references, everyone else RF
    pub fn for_org(org: &OrgConfig) -> Result<Self, ReferenceError> {
        if org.uses_qr_references() {
            Ok(ReferenceCodec::Qr(QrReference::new(org.creditor.bank_reference.as_deref())?))
        } else {
            Ok(ReferenceCodec::Rf)
        }
    }

    /// Canonical reference string
    pub fn encode(&self, code: ReferenceCode) -> Result<String, ReferenceError> {
        match self {
            ReferenceCodec::Rf => CreditorReference::encode(code),
            ReferenceCodec::Qr(qr) => qr.encode(code),
        }
    }

    /// Human-readable grouping of a canonical reference
    pub fn formatted(&self, reference: &str) -> String {
        match self {
            ReferenceCodec::Rf => CreditorReference::formatted(reference),
            ReferenceCodec::Qr(_) => QrReference::formatted(reference),
        }
    }

    /// Returns true if the text holds a reference with a correct checksum
    pub fn is_valid(&self, text: &str) -> bool {
        match self {
            ReferenceCodec::Rf => CreditorReference::is_valid(text),
            ReferenceCodec::Qr(_) => QrReference::is_valid(text),
        }
    }

    /// Decodes the identifiers, `None` when absent, malformed or checksum-invalid
    pub fn payload(&self, text: &str) -> Option<ReferenceCode> {
        match self {
            ReferenceCodec::Rf => CreditorReference::payload(text),
            ReferenceCodec::Qr(_) => QrReference::payload(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_out_of_range_are_rejected() {
        let code = ReferenceCode::new(MemberId::new(100_000_000), InvoiceId::new(1));
        assert_eq!(
            CreditorReference::encode(code),
            Err(ReferenceError::IdOutOfRange { field: "member_id", value: 100_000_000 })
        );
        let code = ReferenceCode::new(MemberId::new(1), InvoiceId::new(0));
        assert!(CreditorReference::encode(code).is_err());
    }

    #[test]
    fn test_codec_dispatch() {
        let code = ReferenceCode::new(MemberId::new(42), InvoiceId::new(706));
        let qr = ReferenceCodec::Qr(QrReference::new(None).unwrap());
        let reference = qr.encode(code).unwrap();
        assert_eq!(reference, "000000000000000420000007068");
        assert_eq!(qr.payload(&reference), Some(code));
        assert!(!ReferenceCodec::Rf.is_valid(&reference));
    }
}
