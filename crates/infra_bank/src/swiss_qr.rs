//! Swiss QR-bill payload
//!
//! Text encoded in the QR code of a Swiss payment slip (version 0200,
//! structured addresses, QR reference).

use tracing::instrument;

use core_kernel::{OrgConfig, PostalAddress};
use domain_billing::{Invoice, Member, QrReference, ReferenceCode};

use crate::error::{BankError, Result};

const HEADER: [&str; 3] = ["SPC", "0200", "1"];
const TRAILER: &str = "EPD";
const ULTIMATE_CREDITOR_LINES: usize = 7;

/// Builds the payload of a Swiss QR-bill for an invoice
///
/// The amount is what is still due on the invoice; it is left blank when
/// nothing is due, which lets the payer fill it in.
///
/// # Errors
///
/// `BankError::Configuration` for a non-Swiss organization, and
/// `BankError::Reference` when the ids or the bank reference cannot be
/// encoded.
#[instrument(skip_all, fields(invoice_id = %invoice.id, member_id = %member.id))]
pub fn qr_bill_payload(org: &OrgConfig, invoice: &Invoice, member: &Member) -> Result<String> {
    if !org.uses_qr_references() {
        return Err(BankError::Configuration(format!(
            "QR-bills need a Swiss organization, got country {}",
            org.country_code
        )));
    }

    let reference = QrReference::new(org.creditor.bank_reference.as_deref())?
        .encode(ReferenceCode::new(invoice.member_id, invoice.id))?;
    let due = invoice
        .missing_amount()
        .map_err(|e| BankError::Configuration(e.to_string()))?;
    let amount = if due.is_positive() {
        format!("{:.2}", due.amount())
    } else {
        String::new()
    };

    let creditor = &org.creditor;
    let mut lines: Vec<String> = HEADER.iter().map(|s| s.to_string()).collect();
    lines.push(creditor.iban.replace(' ', ""));
    push_address(&mut lines, &creditor.name, &creditor.address);
    lines.extend(std::iter::repeat(String::new()).take(ULTIMATE_CREDITOR_LINES));
    lines.push(amount);
    lines.push(invoice.currency.code().to_string());
    push_address(&mut lines, &member.name, &member.address);
    lines.push("QRR".to_string());
    lines.push(reference);
    lines.push(format!("Invoice {}", invoice.id));
    lines.push(TRAILER.to_string());

    Ok(lines.join("\r\n"))
}

/// Structured ("S") address: name, street, building number, zip, city, country
fn push_address(lines: &mut Vec<String>, name: &str, address: &PostalAddress) {
    lines.push("S".to_string());
    lines.push(name.to_string());
    lines.push(address.street.clone());
    lines.push(String::new());
    lines.push(address.zip.clone());
    lines.push(address.city.clone());
    lines.push(address.country_code.clone());
}
