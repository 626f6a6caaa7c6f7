//! Bank integration for the CSA billing engine
//!
//! Reads payments out of bank files and writes the files banks accept:
//!
//! - **Statements**: camt.053 / camt.054 (ISO 20022 XML) and SWIFT MT940
//! - **Direct debits**: SEPA pain.008.001.02
//! - **Payment slips**: Swiss QR-bill payload
//! - **Payment sources**: async port for bank APIs and statement inboxes,
//!   with timeout and outage degradation
//!
//! Parsers only produce [`PaymentData`](domain_billing::PaymentData); matching
//! payments to invoices is left to
//! [`PaymentsProcessor`](domain_billing::PaymentsProcessor).

pub mod camt;
pub mod error;
pub mod mt940;
pub mod sepa;
pub mod source;
pub mod statement;
pub mod swiss_qr;

pub use camt::{CamtKind, CamtParser};
pub use error::{BankError, Result};
pub use mt940::Mt940Parser;
pub use sepa::SepaDirectDebit;
pub use source::{fetch_payments, import_payments, PaymentSource, StatementInboxSource, DEFAULT_SOURCE_TIMEOUT};
pub use statement::{parse_statement, StatementFormat, StatementParser};
pub use swiss_qr::qr_bill_payload;
