//! Billing Domain - CSA membership invoicing and payment reconciliation
//!
//! This crate decides when and how much to bill each member, and matches the
//! payments that come back to the invoices they settle.
//!
//! # Components
//!
//! - **Payment references**: RF and Swiss QR references embedding member and invoice ids
//! - **Periods**: fiscal-year installments for each billing year division
//! - **Invoicer**: next billing date and installment amount for a member
//! - **Previsional invoicing**: month-by-month projection of what is left to bill
//! - **Payments processor**: idempotent ingestion of payment data
//! - **Payments redistributor**: oldest-first allocation of a member's payment pool
//!
//! Every entry point takes the organization settings as an explicit
//! [`OrgConfig`](core_kernel::OrgConfig) value.
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_billing::{InMemoryBillingRepository, Invoicer, PaymentsProcessor};
//!
//! let repository = InMemoryBillingRepository::new();
//! let invoices = Invoicer::new(&repository, &org).run(org.today()).await?;
//!
//! let report = PaymentsProcessor::new(&repository, &org).process(payments_data).await?;
//! ```

pub mod adapters;
pub mod error;
pub mod invoice;
pub mod invoicer;
pub mod member;
pub mod membership;
pub mod payment;
pub mod periods;
pub mod ports;
pub mod previsional;
pub mod processor;
pub mod redistributor;
pub mod reference;
pub mod schedule;

pub use adapters::InMemoryBillingRepository;
pub use error::BillingError;
pub use invoice::{EntityKind, Invoice, InvoiceEntity, InvoiceItem, InvoiceState, SepaMetadata};
pub use invoicer::{InvoicePlan, Invoicer};
pub use member::{Member, SepaMandate};
pub use membership::Membership;
pub use payment::{Payment, PaymentAllocation, PaymentData, PaymentOrigin};
pub use periods::{BillingPeriod, PeriodCalculator};
pub use ports::BillingRepository;
pub use previsional::Projection;
pub use processor::{PaymentsProcessor, ProcessingReport};
pub use redistributor::{PaymentsRedistributor, RedistributionReport};
pub use reference::{CreditorReference, QrReference, ReferenceCode, ReferenceCodec, ReferenceError};
pub use schedule::{Installment, MembershipSchedule};
