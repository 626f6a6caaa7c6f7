//! Swiss structured reference (QR-bill "QRR", formerly ESR/BVR)
//!
//! 27 digits: 9-digit bank prefix, 8-digit member id, 9-digit invoice id and
//! a recursive modulo-10 check digit.

use core_kernel::{InvoiceId, MemberId};

use super::{ReferenceCode, ReferenceError};

const LENGTH: usize = 27;
const PREFIX_LENGTH: usize = 9;

/// Carry table of the recursive modulo-10 algorithm
const MOD10_TABLE: [[u8; 10]; 10] = [
    [0, 9, 4, 6, 8, 2, 7, 1, 3, 5],
    [9, 4, 6, 8, 2, 7, 1, 3, 5, 0],
    [4, 6, 8, 2, 7, 1, 3, 5, 0, 9],
    [6, 8, 2, 7, 1, 3, 5, 0, 9, 4],
    [8, 2, 7, 1, 3, 5, 0, 9, 4, 6],
    [2, 7, 1, 3, 5, 0, 9, 4, 6, 8],
    [7, 1, 3, 5, 0, 9, 4, 6, 8, 2],
    [1, 3, 5, 0, 9, 4, 6, 8, 2, 7],
    [3, 5, 0, 9, 4, 6, 8, 2, 7, 1],
    [5, 0, 9, 4, 6, 8, 2, 7, 1, 3],
];

/// Codec for Swiss structured references
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrReference {
    prefix: String,
}

impl QrReference {
    /// Creates a codec for the organization's bank reference.
    ///
    /// The bank reference is left-aligned in the 9-digit prefix and
    /// zero-filled; no bank reference gives an all-zero prefix.
    pub fn new(bank_reference: Option<&str>) -> Result<Self, ReferenceError> {
        let reference = bank_reference.map(str::trim).unwrap_or("");
        if reference.len() > PREFIX_LENGTH || !reference.chars().all(|c| c.is_ascii_digit()) {
            return Err(ReferenceError::InvalidBankReference(reference.to_string()));
        }
        Ok(Self {
            prefix: format!("{:0<width$}", reference, width = PREFIX_LENGTH),
        })
    }

    /// The 9-digit prefix every reference starts with
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Builds the 27-digit reference
    pub fn encode(&self, code: ReferenceCode) -> Result<String, ReferenceError> {
        let (member, invoice) = code.checked_ids()?;
        let payload = format!("{}{:08}{:09}", self.prefix, member, invoice);
        let check = check_digit(&payload).unwrap_or(0);
        Ok(format!("{}{}", payload, check))
    }

    /// Renders the reference in 2-5-5-5-5-5 digit groups
    pub fn formatted(reference: &str) -> String {
        let compact: String = reference.chars().filter(|c| *c != ' ').collect();
        if compact.len() != LENGTH || !compact.bytes().all(|b| b.is_ascii_digit()) {
            return compact;
        }
        let mut groups = vec![&compact[..2]];
        groups.extend((2..LENGTH).step_by(5).map(|start| &compact[start..start + 5]));
        groups.join(" ")
    }

    pub fn is_valid(text: &str) -> bool {
        normalize(text)
            .map(|digits| verify(&digits))
            .unwrap_or(false)
    }

    /// Decodes the member and invoice identifiers; the prefix is not compared
    pub fn payload(text: &str) -> Option<ReferenceCode> {
        let digits = normalize(text)?;
        if !verify(&digits) {
            return None;
        }
        let member: u64 = digits[PREFIX_LENGTH..PREFIX_LENGTH + 8].parse().ok()?;
        let invoice: u64 = digits[PREFIX_LENGTH + 8..LENGTH - 1].parse().ok()?;
        if member == 0 || invoice == 0 {
            return None;
        }
        Some(ReferenceCode::new(MemberId::new(member), InvoiceId::new(invoice)))
    }
}

/// Recursive modulo-10 check digit, `None` on non-digit input
pub fn check_digit(digits: &str) -> Option<u8> {
    let mut carry = 0u8;
    for c in digits.chars() {
        let digit = c.to_digit(10)? as usize;
        carry = MOD10_TABLE[carry as usize][digit];
    }
    Some((10 - carry) % 10)
}

/// Strips the spaces of the formatted rendering; anything else must be a digit
fn normalize(text: &str) -> Option<String> {
    let digits: String = text.chars().filter(|c| *c != ' ').collect();
    if digits.len() == LENGTH && digits.chars().all(|c| c.is_ascii_digit()) {
        Some(digits)
    } else {
        None
    }
}

fn verify(digits: &str) -> bool {
    let (payload, check) = digits.split_at(LENGTH - 1);
    match (check_digit(payload), check.parse::<u8>()) {
        (Some(expected), Ok(actual)) => expected == actual,
        _ => false,
    }
}
