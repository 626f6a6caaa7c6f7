//! Shared statement parsing contract
//!
//! Every statement format turns a bank file into [`PaymentData`]: entries
//! whose payment reference resolves to a member and invoice. Entries without
//! a usable reference are skipped, never reported as errors.

use tracing::{debug, instrument};

use core_kernel::OrgConfig;
use domain_billing::{CreditorReference, PaymentData, QrReference, ReferenceCode, ReferenceCodec};

use crate::camt::CamtParser;
use crate::error::{BankError, Result};
use crate::mt940::Mt940Parser;

/// A parsed bank file
pub trait StatementParser {
    /// Payment data of every resolvable entry, in file order
    fn payments_data(&self) -> Result<Vec<PaymentData>>;
}

/// Statement formats recognized by content sniffing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementFormat {
    Camt,
    Mt940,
}

impl StatementFormat {
    /// Guesses the format from the first meaningful characters
    pub fn detect(content: &str) -> Option<Self> {
        let trimmed = content.trim_start_matches('\u{feff}').trim_start();
        if trimmed.starts_with('<') {
            Some(StatementFormat::Camt)
        } else if trimmed.starts_with(":20:") || trimmed.starts_with("{1:") || trimmed.contains("\n:61:") {
            Some(StatementFormat::Mt940)
        } else {
            None
        }
    }
}

/// Parses a statement of any supported format
///
/// # Errors
///
/// Returns `BankError::UnsupportedFile` when the format is not recognized or
/// the file is malformed. Nothing is returned for a file that fails halfway.
#[instrument(skip_all, fields(bytes = content.len()))]
pub fn parse_statement(content: &str, org: &OrgConfig) -> Result<Vec<PaymentData>> {
    match StatementFormat::detect(content) {
        Some(StatementFormat::Camt) => CamtParser::new(content, org)?.payments_data(),
        Some(StatementFormat::Mt940) => Mt940Parser::new(content, org)?.payments_data(),
        None => Err(BankError::unsupported("neither camt XML nor MT940")),
    }
}

/// Looks for the organization's reference in remittance texts.
///
/// Structured references are decoded as they are; free texts are scanned.
pub(crate) fn resolve_reference<'a, S, U>(
    codec: &ReferenceCodec,
    structured: S,
    unstructured: U,
) -> Option<ReferenceCode>
where
    S: IntoIterator<Item = &'a str>,
    U: IntoIterator<Item = &'a str>,
{
    structured
        .into_iter()
        .find_map(|reference| codec.payload(reference))
        .or_else(|| unstructured.into_iter().find_map(|text| scan_text(codec, text)))
}

fn scan_text(codec: &ReferenceCodec, text: &str) -> Option<ReferenceCode> {
    match codec {
        ReferenceCodec::Rf => CreditorReference::payload(text),
        // Digit runs, possibly grouped by spaces, between any other characters
        ReferenceCodec::Qr(_) => text
            .split(|c: char| !c.is_ascii_digit() && c != ' ')
            .map(|segment| segment.replace(' ', ""))
            .find_map(|candidate| QrReference::payload(&candidate)),
    }
}

pub(crate) fn log_skipped(reason: &str, index: usize) {
    debug!(entry = index, reason, "Statement entry skipped");
}
