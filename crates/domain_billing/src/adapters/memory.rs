//! In-memory billing repository

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use core_kernel::{InvoiceId, MemberId, PaymentId, PortError};

use crate::invoice::Invoice;
use crate::member::Member;
use crate::membership::Membership;
use crate::payment::{Payment, PaymentData, PaymentOrigin};
use crate::ports::BillingRepository;

/// Process-local implementation of [`BillingRepository`]
#[derive(Debug, Default)]
pub struct InMemoryBillingRepository {
    members: RwLock<BTreeMap<MemberId, Member>>,
    memberships: RwLock<Vec<Membership>>,
    invoices: RwLock<BTreeMap<InvoiceId, Invoice>>,
    payments: RwLock<BTreeMap<PaymentId, Payment>>,
    member_locks: Mutex<HashMap<MemberId, Arc<Mutex<()>>>>,
    last_invoice_id: AtomicU64,
    last_payment_id: AtomicU64,
}

impl InMemoryBillingRepository {
    /// Creates an empty repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a member
    pub async fn insert_member(&self, member: Member) {
        self.members.write().await.insert(member.id, member);
    }

    /// Adds or replaces a membership
    pub async fn insert_membership(&self, membership: Membership) {
        let mut memberships = self.memberships.write().await;
        memberships.retain(|existing| existing.id != membership.id);
        memberships.push(membership);
    }

    /// Number of stored payments
    pub async fn payment_count(&self) -> usize {
        self.payments.read().await.len()
    }

    fn next_payment_id(&self) -> PaymentId {
        PaymentId::new(self.last_payment_id.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

fn find_payment<'a>(
    payments: &'a BTreeMap<PaymentId, Payment>,
    origin: &PaymentOrigin,
    fingerprint: &str,
) -> Option<&'a Payment> {
    payments
        .values()
        .find(|payment| payment.origin == *origin && payment.fingerprint == fingerprint)
}

#[async_trait]
impl BillingRepository for InMemoryBillingRepository {
    async fn member(&self, id: MemberId) -> Result<Option<Member>, PortError> {
        Ok(self.members.read().await.get(&id).cloned())
    }

    async fn members(&self) -> Result<Vec<Member>, PortError> {
        Ok(self.members.read().await.values().cloned().collect())
    }

    async fn memberships_of(&self, member_id: MemberId) -> Result<Vec<Membership>, PortError> {
        Ok(self
            .memberships
            .read()
            .await
            .iter()
            .filter(|membership| membership.member_id == member_id)
            .cloned()
            .collect())
    }

    async fn member_lock(&self, member_id: MemberId) -> Arc<Mutex<()>> {
        self.member_locks.lock().await.entry(member_id).or_default().clone()
    }

    async fn invoice(&self, id: InvoiceId) -> Result<Option<Invoice>, PortError> {
        Ok(self.invoices.read().await.get(&id).cloned())
    }

    async fn invoices_of(&self, member_id: MemberId) -> Result<Vec<Invoice>, PortError> {
        Ok(self
            .invoices
            .read()
            .await
            .values()
            .filter(|invoice| invoice.member_id == member_id)
            .cloned()
            .collect())
    }

    async fn next_invoice_id(&self) -> Result<InvoiceId, PortError> {
        Ok(InvoiceId::new(self.last_invoice_id.fetch_add(1, Ordering::SeqCst) + 1))
    }

    async fn save_invoice(&self, invoice: Invoice) -> Result<(), PortError> {
        // Keep generated ids ahead of explicitly inserted ones
        self.last_invoice_id.fetch_max(invoice.id.value(), Ordering::SeqCst);
        self.invoices.write().await.insert(invoice.id, invoice);
        Ok(())
    }

    async fn payments_of(&self, member_id: MemberId) -> Result<Vec<Payment>, PortError> {
        Ok(self
            .payments
            .read()
            .await
            .values()
            .filter(|payment| payment.member_id == member_id)
            .cloned()
            .collect())
    }

    async fn payment_by_fingerprint(
        &self,
        origin: &PaymentOrigin,
        fingerprint: &str,
    ) -> Result<Option<Payment>, PortError> {
        Ok(find_payment(&*self.payments.read().await, origin, fingerprint).cloned())
    }

    async fn insert_payment_if_new(
        &self,
        member_id: MemberId,
        data: &PaymentData,
    ) -> Result<Option<Payment>, PortError> {
        // The write guard spans the check and the insert
        let mut payments = self.payments.write().await;
        if find_payment(&payments, &data.origin, &data.fingerprint()).is_some() {
            return Ok(None);
        }
        let payment = Payment::from_data(self.next_payment_id(), member_id, data);
        payments.insert(payment.id, payment.clone());
        Ok(Some(payment))
    }

    async fn save_payment(&self, payment: Payment) -> Result<(), PortError> {
        self.last_payment_id.fetch_max(payment.id.value(), Ordering::SeqCst);
        self.payments.write().await.insert(payment.id, payment);
        Ok(())
    }

    async fn payment(&self, id: PaymentId) -> Result<Option<Payment>, PortError> {
        Ok(self.payments.read().await.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use core_kernel::{Currency, Money};
    use rust_decimal_macros::dec;

    fn data() -> PaymentData {
        PaymentData::new(
            Some(MemberId::new(1)),
            None,
            Money::new(dec!(10), Currency::CHF),
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            PaymentOrigin::Manual,
        )
    }

    #[tokio::test]
    async fn test_fingerprint_uniqueness() {
        let repository = InMemoryBillingRepository::new();
        let first = repository.insert_payment_if_new(MemberId::new(1), &data()).await.unwrap();
        assert_eq!(first.map(|p| p.id), Some(PaymentId::new(1)));
        let second = repository.insert_payment_if_new(MemberId::new(1), &data()).await.unwrap();
        assert!(second.is_none());
        assert_eq!(repository.payment_count().await, 1);
    }

    #[tokio::test]
    async fn test_fingerprint_is_scoped_to_origin() {
        let repository = InMemoryBillingRepository::new();
        let first = data().with_fingerprint("1");
        let mut second = data().with_fingerprint("1");
        second.origin = PaymentOrigin::BankApi("bank-b".to_string());

        assert!(repository.insert_payment_if_new(MemberId::new(1), &first).await.unwrap().is_some());
        assert!(repository.insert_payment_if_new(MemberId::new(1), &second).await.unwrap().is_some());

        let found = repository.payment_by_fingerprint(&second.origin, "1").await.unwrap().unwrap();
        assert_eq!(found.id, PaymentId::new(2));
        assert!(repository
            .payment_by_fingerprint(&PaymentOrigin::Camt054, "1")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_member_lock_is_shared_per_member() {
        let repository = InMemoryBillingRepository::new();
        let a = repository.member_lock(MemberId::new(1)).await;
        let b = repository.member_lock(MemberId::new(1)).await;
        let c = repository.member_lock(MemberId::new(2)).await;
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }
}
