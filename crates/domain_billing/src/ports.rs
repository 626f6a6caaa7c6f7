//! Repository port for the billing domain
//!
//! Billing reads members and memberships, and reads and writes invoices and
//! payments, through [`BillingRepository`]. Implementations can be a database
//! or the in-memory adapter in [`crate::adapters`].
//!
//! # Concurrency
//!
//! Billing operations are single-writer per member: callers take the lock
//! returned by [`BillingRepository::member_lock`] across their
//! read-compute-write sequence. Payment insertion must check the fingerprint
//! and insert atomically.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use core_kernel::{InvoiceId, MemberId, PaymentId, PortError};

use crate::invoice::Invoice;
use crate::member::Member;
use crate::membership::Membership;
use crate::payment::{Payment, PaymentData, PaymentOrigin};

/// Storage operations billing relies on
#[async_trait]
pub trait BillingRepository: Send + Sync {
    // ========================================================================
    // Members
    // ========================================================================

    /// Retrieves a member by ID, `None` if unknown
    async fn member(&self, id: MemberId) -> Result<Option<Member>, PortError>;

    /// All members, ordered by ID
    async fn members(&self) -> Result<Vec<Member>, PortError>;

    /// Memberships of a member
    async fn memberships_of(&self, member_id: MemberId) -> Result<Vec<Membership>, PortError>;

    /// Lock serializing billing writes for one member
    async fn member_lock(&self, member_id: MemberId) -> Arc<Mutex<()>>;

    // ========================================================================
    // Invoices
    // ========================================================================

    /// Retrieves an invoice by ID, `None` if unknown
    async fn invoice(&self, id: InvoiceId) -> Result<Option<Invoice>, PortError>;

    /// All invoices of a member, canceled ones included
    async fn invoices_of(&self, member_id: MemberId) -> Result<Vec<Invoice>, PortError>;

    /// Reserves the next invoice identifier
    async fn next_invoice_id(&self) -> Result<InvoiceId, PortError>;

    /// Inserts or replaces an invoice
    async fn save_invoice(&self, invoice: Invoice) -> Result<(), PortError>;

    // ========================================================================
    // Payments
    // ========================================================================

    /// All payments of a member, inactive ones included
    async fn payments_of(&self, member_id: MemberId) -> Result<Vec<Payment>, PortError>;

    /// Retrieves a payment by fingerprint; fingerprints are unique per origin
    async fn payment_by_fingerprint(
        &self,
        origin: &PaymentOrigin,
        fingerprint: &str,
    ) -> Result<Option<Payment>, PortError>;

    /// Stores a payment unless one with the same origin and fingerprint exists
    ///
    /// # Returns
    ///
    /// The created payment, or `None` when the fingerprint is already known
    /// for that origin
    async fn insert_payment_if_new(
        &self,
        member_id: MemberId,
        data: &PaymentData,
    ) -> Result<Option<Payment>, PortError>;

    /// Inserts or replaces a payment
    async fn save_payment(&self, payment: Payment) -> Result<(), PortError>;

    /// Retrieves a payment by ID
    async fn payment(&self, id: PaymentId) -> Result<Option<Payment>, PortError>;
}
