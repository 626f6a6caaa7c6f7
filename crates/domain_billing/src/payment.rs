//! Payments
//!
//! Payments arrive from bank statements, bank APIs or manual entry. Whatever
//! the source, they are handed to the processor as [`PaymentData`] and stored
//! as [`Payment`] once, keyed by a unique fingerprint.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use core_kernel::{InvoiceId, MemberId, Money, PaymentId};

/// Where a payment came from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentOrigin {
    /// Entered by an operator
    Manual,
    /// camt.053 account statement
    #[serde(rename = "camt.053")]
    Camt053,
    /// camt.054 debit/credit notification
    #[serde(rename = "camt.054")]
    Camt054,
    /// MT940 statement
    Mt940,
    /// A named bank API
    BankApi(String),
}

impl fmt::Display for PaymentOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentOrigin::Manual => write!(f, "manual"),
            PaymentOrigin::Camt053 => write!(f, "camt.053"),
            PaymentOrigin::Camt054 => write!(f, "camt.054"),
            PaymentOrigin::Mt940 => write!(f, "mt940"),
            PaymentOrigin::BankApi(name) => write!(f, "{}", name),
        }
    }
}

/// A payment as reported by a source, before it is matched and stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentData {
    pub member_id: Option<MemberId>,
    pub invoice_id: Option<InvoiceId>,
    /// Signed; negative amounts are refunds or chargebacks
    pub amount: Money,
    pub date: NaiveDate,
    pub origin: PaymentOrigin,
    /// Source-provided unique key (bank reference), if any
    pub fingerprint: Option<String>,
}

impl PaymentData {
    /// Creates payment data without a source fingerprint
    pub fn new(
        member_id: Option<MemberId>,
        invoice_id: Option<InvoiceId>,
        amount: Money,
        date: NaiveDate,
        origin: PaymentOrigin,
    ) -> Self {
        Self {
            member_id,
            invoice_id,
            amount,
            date,
            origin,
            fingerprint: None,
        }
    }

    /// Sets the source fingerprint
    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.fingerprint = Some(fingerprint.into());
        self
    }

    /// The source fingerprint, or a digest of the payment's identifying fields.
    ///
    /// The digest covers `date|amount|member|invoice|origin` so the same
    /// statement line imported twice maps to the same payment.
    pub fn fingerprint(&self) -> String {
        if let Some(fingerprint) = &self.fingerprint {
            return fingerprint.clone();
        }
        let member = self.member_id.map(|id| id.to_string()).unwrap_or_default();
        let invoice = self.invoice_id.map(|id| id.to_string()).unwrap_or_default();
        let key = format!(
            "{}|{}|{}|{}|{}",
            self.date,
            self.amount.amount().normalize(),
            member,
            invoice,
            self.origin
        );

        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        format!("sha256:{:x}", hasher.finalize())
    }
}

/// A stored payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    /// Unique identifier
    pub id: PaymentId,
    /// Paying member
    pub member_id: MemberId,
    /// Invoice the payer referenced, if any
    pub invoice_id: Option<InvoiceId>,
    /// Signed amount
    pub amount: Money,
    /// Value date
    pub date: NaiveDate,
    /// Unique key
    pub fingerprint: String,
    /// Source
    pub origin: PaymentOrigin,
    /// Set when reconciliation decided to disregard the payment
    pub ignored_at: Option<DateTime<Utc>>,
    /// Set when the bank reversed the payment
    pub reversed_at: Option<DateTime<Utc>>,
}

impl Payment {
    /// Creates a payment from matched payment data
    ///
    /// # Arguments
    ///
    /// * `id` - Identifier handed out by the repository
    /// * `member_id` - Resolved member
    /// * `data` - Source data
    pub fn from_data(id: PaymentId, member_id: MemberId, data: &PaymentData) -> Self {
        Self {
            id,
            member_id,
            invoice_id: data.invoice_id,
            amount: data.amount,
            date: data.date,
            fingerprint: data.fingerprint(),
            origin: data.origin.clone(),
            ignored_at: None,
            reversed_at: None,
        }
    }

    /// Ignored and reversed payments take no part in redistribution
    pub fn is_active(&self) -> bool {
        self.ignored_at.is_none() && self.reversed_at.is_none()
    }

    pub fn is_refund(&self) -> bool {
        self.amount.is_negative()
    }

    pub fn ignore(&mut self, at: DateTime<Utc>) {
        self.ignored_at = Some(at);
    }

    pub fn reverse(&mut self, at: DateTime<Utc>) {
        self.reversed_at = Some(at);
    }
}

/// Share of a payment credited to an invoice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentAllocation {
    /// Payment ID
    pub payment_id: PaymentId,
    /// Invoice ID
    pub invoice_id: InvoiceId,
    /// Amount allocated to this invoice
    pub amount: Money,
}
