//! ISO 20022 camt.053 / camt.054 statement reader
//!
//! camt.053 is the end-of-day account statement, camt.054 the credit/debit
//! notification. Each `Ntry` (booking) may bundle several `TxDtls`
//! (transactions); every transaction with a resolvable reference becomes one
//! [`PaymentData`].
//!
//! camt.054 files are read for credits only. camt.053 files keep debits as
//! negative amounts so chargebacks and reversals reach the redistribution.

use std::str::FromStr;

use chrono::NaiveDate;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;
use rust_decimal::Decimal;
use tracing::{debug, instrument, warn};

use core_kernel::{Currency, Money, OrgConfig};
use domain_billing::{PaymentData, PaymentOrigin, ReferenceCodec};

use crate::error::{BankError, Result};
use crate::statement::{log_skipped, resolve_reference, StatementParser};

const NAMESPACE_PREFIX: &str = "urn:iso:std:iso:20022:tech:xsd:";

/// Message versions we read
const SUPPORTED_VERSIONS: [&str; 6] = [
    "camt.053.001.02",
    "camt.053.001.04",
    "camt.053.001.08",
    "camt.054.001.02",
    "camt.054.001.04",
    "camt.054.001.08",
];

/// Statement (053) or notification (054)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CamtKind {
    Statement,
    Notification,
}

impl CamtKind {
    fn origin(&self) -> PaymentOrigin {
        match self {
            CamtKind::Statement => PaymentOrigin::Camt053,
            CamtKind::Notification => PaymentOrigin::Camt054,
        }
    }
}

#[derive(Debug, Default)]
struct Transaction {
    amount: Option<(Decimal, String)>,
    credit: Option<bool>,
    bank_reference: Option<String>,
    references: Vec<String>,
    texts: Vec<String>,
}

#[derive(Debug, Default)]
struct Booking {
    amount: Option<(Decimal, String)>,
    credit: Option<bool>,
    booking_date: Option<NaiveDate>,
    value_date: Option<NaiveDate>,
    bank_reference: Option<String>,
    texts: Vec<String>,
    transactions: Vec<Transaction>,
}

/// A camt document validated and read into bookings
pub struct CamtParser {
    kind: CamtKind,
    codec: ReferenceCodec,
    currency: Currency,
    bookings: Vec<Booking>,
}

impl CamtParser {
    /// Reads the whole document
    ///
    /// # Errors
    ///
    /// Returns `BankError::UnsupportedFile` when the root namespace is not a
    /// supported camt.053/054 version or a booking is malformed, and
    /// `BankError::Xml` when the XML itself is broken.
    #[instrument(skip_all)]
    pub fn new(content: &str, org: &OrgConfig) -> Result<Self> {
        let codec = ReferenceCodec::for_org(org)?;
        let (kind, bookings) = read_document(content)?;
        debug!(?kind, bookings = bookings.len(), "camt document read");
        Ok(Self {
            kind,
            codec,
            currency: org.currency,
            bookings,
        })
    }

    pub fn kind(&self) -> CamtKind {
        self.kind
    }

    fn transaction_data(
        &self,
        booking: &Booking,
        index: usize,
        position: usize,
        transaction: &Transaction,
    ) -> Result<Option<PaymentData>> {
        let credit = transaction.credit.or(booking.credit).unwrap_or(true);
        if !credit && self.kind == CamtKind::Notification {
            log_skipped("debit in notification", index);
            return Ok(None);
        }

        // A booking amount only stands for the transaction when it is alone
        let amount = match (&transaction.amount, booking.transactions.len() <= 1) {
            (Some(amount), _) => amount,
            (None, true) => match &booking.amount {
                Some(amount) => amount,
                None => return Err(BankError::unsupported(format!("entry {} has no amount", index))),
            },
            (None, false) => {
                log_skipped("transaction without amount", index);
                return Ok(None);
            }
        };

        let Some(code) = resolve_reference(
            &self.codec,
            transaction.references.iter().map(String::as_str),
            transaction.texts.iter().chain(&booking.texts).map(String::as_str),
        ) else {
            log_skipped("no valid reference", index);
            return Ok(None);
        };

        let currency = match Currency::from_str(&amount.1) {
            Ok(currency) if currency == self.currency => currency,
            _ => {
                warn!(entry = index, currency = %amount.1, "Entry currency differs from the organization currency");
                return Ok(None);
            }
        };

        let date = booking
            .booking_date
            .or(booking.value_date)
            .ok_or_else(|| BankError::unsupported(format!("entry {} has no booking date", index)))?;

        let signed = if credit { amount.0 } else { -amount.0 };
        let mut data = PaymentData::new(
            Some(code.member_id),
            Some(code.invoice_id),
            Money::new(signed, currency),
            date,
            self.kind.origin(),
        );

        let fingerprint = match (&transaction.bank_reference, &booking.bank_reference) {
            (Some(reference), _) => Some(reference.clone()),
            (None, Some(reference)) if booking.transactions.len() > 1 => {
                Some(format!("{}/{}", reference, position))
            }
            (None, reference) => reference.clone(),
        };
        if let Some(fingerprint) = fingerprint {
            data = data.with_fingerprint(fingerprint);
        }
        Ok(Some(data))
    }
}

impl StatementParser for CamtParser {
    fn payments_data(&self) -> Result<Vec<PaymentData>> {
        let mut payments = Vec::new();
        for (index, booking) in self.bookings.iter().enumerate() {
            if booking.transactions.is_empty() {
                let single = Transaction::default();
                payments.extend(self.transaction_data(booking, index, 0, &single)?);
                continue;
            }
            for (position, transaction) in booking.transactions.iter().enumerate() {
                payments.extend(self.transaction_data(booking, index, position, transaction)?);
            }
        }
        debug!(payments = payments.len(), "camt payments extracted");
        Ok(payments)
    }
}

/// Kind of document bound to the root element's namespace, prefixed or not
fn document_kind(namespace: &ResolveResult<'_>) -> Result<CamtKind> {
    let namespace = match namespace {
        ResolveResult::Bound(Namespace(uri)) => String::from_utf8_lossy(uri).into_owned(),
        _ => return Err(BankError::unsupported("camt document without namespace")),
    };

    let version = namespace.strip_prefix(NAMESPACE_PREFIX).unwrap_or("");
    if !SUPPORTED_VERSIONS.contains(&version) {
        return Err(BankError::unsupported(format!("unknown camt namespace {}", namespace)));
    }
    Ok(if version.starts_with("camt.053") {
        CamtKind::Statement
    } else {
        CamtKind::Notification
    })
}

fn currency_attribute(element: &BytesStart<'_>) -> String {
    element
        .attributes()
        .flatten()
        .find(|attribute| attribute.key.as_ref() == b"Ccy")
        .and_then(|attribute| attribute.unescape_value().ok().map(|value| value.into_owned()))
        .unwrap_or_default()
}

fn parse_amount(text: &str) -> Result<Decimal> {
    Decimal::from_str(text.trim()).map_err(|e| BankError::unsupported(format!("amount {:?}: {}", text, e)))
}

fn parse_date(text: &str) -> Result<NaiveDate> {
    // DtTm values carry a time after the date
    let day = text.get(..10).unwrap_or(text);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").map_err(|e| BankError::unsupported(format!("date {:?}: {}", text, e)))
}

fn ends_with(path: &[String], suffix: &[&str]) -> bool {
    path.len() >= suffix.len()
        && path[path.len() - suffix.len()..]
            .iter()
            .zip(suffix)
            .all(|(element, expected)| element == expected)
}

/// Walks the document keeping the element path and the booking being read
fn read_document(content: &str) -> Result<(CamtKind, Vec<Booking>)> {
    let mut reader = NsReader::from_str(content);
    reader.trim_text(true);

    let mut kind: Option<CamtKind> = None;
    let mut path: Vec<String> = Vec::new();
    let mut currency = String::new();
    let mut pending: Option<Booking> = None;
    let mut bookings = Vec::new();

    loop {
        let (namespace, event) = reader.read_resolved_event().map_err(BankError::xml)?;
        let value = match event {
            Event::Start(element) => {
                let name = String::from_utf8_lossy(element.local_name().as_ref()).into_owned();
                if kind.is_none() {
                    if name != "Document" {
                        return Err(BankError::unsupported(format!("unexpected root element {}", name)));
                    }
                    kind = Some(document_kind(&namespace)?);
                }
                match name.as_str() {
                    "Ntry" => pending = Some(Booking::default()),
                    "TxDtls" => {
                        if let Some(booking) = pending.as_mut() {
                            booking.transactions.push(Transaction::default());
                        }
                    }
                    "Amt" => currency = currency_attribute(&element),
                    _ => {}
                }
                path.push(name);
                continue;
            }
            Event::Text(text) => text.unescape().map_err(BankError::xml)?.into_owned(),
            Event::CData(data) => std::str::from_utf8(&data)
                .map_err(BankError::xml)?
                .trim()
                .to_string(),
            Event::End(_) => {
                if path.pop().as_deref() == Some("Ntry") {
                    bookings.extend(pending.take());
                }
                continue;
            }
            Event::Eof => break,
            _ => continue,
        };

        if let Some(booking) = pending.as_mut() {
            read_text(&path, booking, &value, &currency)?;
        }
    }

    let kind = kind.ok_or_else(|| BankError::unsupported("empty camt document"))?;
    Ok((kind, bookings))
}

fn read_text(path: &[String], booking: &mut Booking, value: &str, currency: &str) -> Result<()> {
    let in_transaction = path.iter().any(|element| element == "TxDtls");

    if in_transaction {
        let Some(transaction) = booking.transactions.last_mut() else {
            return Ok(());
        };
        if ends_with(path, &["TxDtls", "Amt"]) || ends_with(path, &["TxAmt", "Amt"]) {
            transaction.amount = Some((parse_amount(value)?, currency.to_string()));
        } else if ends_with(path, &["TxDtls", "CdtDbtInd"]) {
            transaction.credit = Some(value == "CRDT");
        } else if ends_with(path, &["Refs", "AcctSvcrRef"]) {
            transaction.bank_reference = Some(value.to_string());
        } else if ends_with(path, &["CdtrRefInf", "Ref"]) {
            transaction.references.push(value.to_string());
        } else if ends_with(path, &["RmtInf", "Ustrd"]) || ends_with(path, &["TxDtls", "AddtlTxInf"]) {
            transaction.texts.push(value.to_string());
        }
        return Ok(());
    }

    if ends_with(path, &["Ntry", "Amt"]) {
        booking.amount = Some((parse_amount(value)?, currency.to_string()));
    } else if ends_with(path, &["Ntry", "CdtDbtInd"]) {
        booking.credit = Some(value == "CRDT");
    } else if ends_with(path, &["BookgDt", "Dt"]) || ends_with(path, &["BookgDt", "DtTm"]) {
        booking.booking_date = Some(parse_date(value)?);
    } else if ends_with(path, &["ValDt", "Dt"]) || ends_with(path, &["ValDt", "DtTm"]) {
        booking.value_date = Some(parse_date(value)?);
    } else if ends_with(path, &["Ntry", "AcctSvcrRef"]) {
        booking.bank_reference = Some(value.to_string());
    } else if ends_with(path, &["Ntry", "AddtlNtryInf"]) {
        booking.texts.push(value.to_string());
    }
    Ok(())
}
