//! Core Kernel - Foundational types for the CSA billing engine
//!
//! This crate provides the fundamental building blocks used by the billing crates:
//! - Money types with precise decimal arithmetic and currency-specific rounding
//! - Fiscal years and half-open billing periods
//! - Strongly-typed integer identifiers
//! - The organization settings every billing entry point receives explicitly

pub mod money;
pub mod temporal;
pub mod identifiers;
pub mod organization;
pub mod ports;
pub mod error;

pub use money::{Money, Currency, MoneyError};
pub use temporal::{FiscalYear, Period, TemporalError, Timezone};
pub use identifiers::{MemberId, MembershipId, InvoiceId, PaymentId, EntityId};
pub use organization::{OrgConfig, CreditorIdentity, PostalAddress, BillingSettings};
pub use ports::PortError;
pub use error::CoreError;
