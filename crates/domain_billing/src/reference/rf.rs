//! ISO 11649 creditor reference ("RF" reference)
//!
//! Layout: `RF` + 2 check digits + 8-digit member id + 8-digit invoice id.
//! Bank statements rarely carry the reference on its own, so parsing scans
//! free text for the first plausible candidate.

use core_kernel::{InvoiceId, MemberId};

use super::{ReferenceCode, ReferenceError};

const PREFIX: &str = "RF";

/// Digits following the marker: 2 check digits + 16 payload digits
const SIGNIFICANT_DIGITS: usize = 18;

/// Codec for RF creditor references
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CreditorReference;

impl CreditorReference {
    /// Builds the canonical 20-character reference
    ///
    /// # Arguments
    ///
    /// * `code` - Member and invoice identifiers, each within 1..=99,999,999
    pub fn encode(code: ReferenceCode) -> Result<String, ReferenceError> {
        let (member, invoice) = code.checked_ids()?;
        let payload = format!("{:08}{:08}", member, invoice);
        Ok(format!("{}{:02}{}", PREFIX, check_digits(&payload), payload))
    }

    /// Groups a canonical reference by 4 characters ("RF21 0000 0001 0000 0001")
    pub fn formatted(reference: &str) -> String {
        let compact: Vec<char> = reference.chars().filter(|c| !c.is_whitespace()).collect();
        compact
            .chunks(4)
            .map(|group| group.iter().collect::<String>())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Finds the first RF candidate in free text and returns it in canonical form.
    ///
    /// Separators between digit groups are skipped; a letter before the 18th
    /// digit abandons the candidate. The checksum is not verified here.
    pub fn extract(text: &str) -> Option<String> {
        let upper = text.to_ascii_uppercase();
        let mut start = 0;
        while let Some(offset) = upper[start..].find(PREFIX) {
            let marker = start + offset;
            if let Some(digits) = significant_digits(&upper.as_bytes()[marker + PREFIX.len()..]) {
                return Some(format!("{}{}", PREFIX, digits));
            }
            start = marker + 1;
        }
        None
    }

    /// Returns true if the text contains an RF reference with a correct checksum
    pub fn is_valid(text: &str) -> bool {
        Self::extract(text)
            .map(|reference| verify(&reference))
            .unwrap_or(false)
    }

    /// Decodes the member and invoice identifiers
    pub fn payload(text: &str) -> Option<ReferenceCode> {
        let reference = Self::extract(text)?;
        if !verify(&reference) {
            return None;
        }
        let payload = &reference[4..];
        let member: u64 = payload[..8].parse().ok()?;
        let invoice: u64 = payload[8..].parse().ok()?;
        if member == 0 || invoice == 0 {
            return None;
        }
        Some(ReferenceCode::new(MemberId::new(member), InvoiceId::new(invoice)))
    }
}

fn significant_digits(bytes: &[u8]) -> Option<String> {
    let mut digits = String::with_capacity(SIGNIFICANT_DIGITS);
    for &byte in bytes {
        if byte.is_ascii_digit() {
            digits.push(byte as char);
            if digits.len() == SIGNIFICANT_DIGITS {
                return Some(digits);
            }
        } else if byte.is_ascii_alphabetic() {
            return None;
        }
    }
    None
}

/// `reference` is canonical: "RF" + 18 digits
fn verify(reference: &str) -> bool {
    let (check, payload) = reference[PREFIX.len()..].split_at(2);
    check.parse::<u32>().map(|c| c == check_digits(payload)).unwrap_or(false)
}

/// ISO 7064 MOD 97-10 over `payload + "RF00"`, letters expanded to base-36 values
fn check_digits(payload: &str) -> u32 {
    let remainder = payload
        .chars()
        .chain(PREFIX.chars())
        .chain("00".chars())
        .fold(0u32, |acc, c| match c.to_digit(36) {
            Some(value) if value < 10 => (acc * 10 + value) % 97,
            Some(value) => (acc * 100 + value) % 97,
            None => acc,
        });
    98 - remainder
}
