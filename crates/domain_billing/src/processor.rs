//! Payments processor
//!
//! Turns [`PaymentData`] from any source into stored payments. Entries that
//! cannot be tied to a member (and, when given, to one of that member's
//! invoices) are skipped, and entries already imported are recognized by
//! their origin and fingerprint, so feeding the same statement twice is harmless.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use core_kernel::{MemberId, OrgConfig, PaymentId};

use crate::error::Result;
use crate::payment::PaymentData;
use crate::ports::BillingRepository;
use crate::redistributor::{PaymentsRedistributor, RedistributionReport};

/// Outcome of a processing run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingReport {
    /// Payments created
    pub created: Vec<PaymentId>,
    /// Entries whose fingerprint was already known
    pub skipped_duplicates: usize,
    /// Entries without a matching member or invoice
    pub skipped_unresolved: usize,
    /// Members whose payments changed
    pub affected_members: BTreeSet<MemberId>,
    /// Redistribution of each affected member
    pub redistributions: Vec<RedistributionReport>,
}

/// Stores incoming payments and redistributes them
pub struct PaymentsProcessor<'a, R: BillingRepository + ?Sized> {
    repository: &'a R,
    org: &'a OrgConfig,
}

impl<'a, R: BillingRepository + ?Sized> PaymentsProcessor<'a, R> {
    pub fn new(repository: &'a R, org: &'a OrgConfig) -> Self {
        Self { repository, org }
    }

    /// Processes a batch of payment data
    ///
    /// # Arguments
    ///
    /// * `payments_data` - Entries from a statement, bank API or manual input
    ///
    /// # Returns
    ///
    /// A report of created and skipped entries. Every member that received a
    /// new payment has been redistributed once the report is returned.
    #[instrument(skip_all, fields(entries = payments_data.len()))]
    pub async fn process(&self, payments_data: Vec<PaymentData>) -> Result<ProcessingReport> {
        let mut report = ProcessingReport::default();

        for data in &payments_data {
            let Some(member_id) = self.resolve(data).await? else {
                report.skipped_unresolved += 1;
                continue;
            };

            match self.repository.insert_payment_if_new(member_id, data).await? {
                Some(payment) => {
                    debug!(payment_id = %payment.id, member_id = %member_id, amount = %payment.amount, "Payment created");
                    report.created.push(payment.id);
                    report.affected_members.insert(member_id);
                }
                None => {
                    debug!(fingerprint = %data.fingerprint(), "Payment already imported");
                    report.skipped_duplicates += 1;
                }
            }
        }

        let redistributor = PaymentsRedistributor::new(self.repository, self.org);
        for member_id in &report.affected_members {
            report.redistributions.push(redistributor.redistribute(*member_id).await?);
        }

        info!(
            created = report.created.len(),
            duplicates = report.skipped_duplicates,
            unresolved = report.skipped_unresolved,
            "Payments processed"
        );
        Ok(report)
    }

    /// Member owning the payment, `None` when it cannot be matched
    async fn resolve(&self, data: &PaymentData) -> Result<Option<MemberId>> {
        let Some(member_id) = data.member_id else {
            debug!(date = %data.date, amount = %data.amount, "Payment without member");
            return Ok(None);
        };
        if self.repository.member(member_id).await?.is_none() {
            debug!(member_id = %member_id, "Payment for unknown member");
            return Ok(None);
        }
        if data.amount.currency() != self.org.currency {
            warn!(
                member_id = %member_id,
                currency = %data.amount.currency(),
                "Payment currency differs from the organization currency"
            );
            return Ok(None);
        }
        if let Some(invoice_id) = data.invoice_id {
            match self.repository.invoice(invoice_id).await? {
                Some(invoice) if invoice.member_id == member_id => {}
                Some(_) => {
                    debug!(member_id = %member_id, invoice_id = %invoice_id, "Invoice belongs to another member");
                    return Ok(None);
                }
                None => {
                    debug!(invoice_id = %invoice_id, "Payment for unknown invoice");
                    return Ok(None);
                }
            }
        }
        Ok(Some(member_id))
    }
}
