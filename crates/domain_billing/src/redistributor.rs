//! Payments redistribution
//!
//! Members pay whenever and however they like: a single transfer for several
//! invoices, the reference of a canceled invoice, a refund. Redistribution
//! ignores what each payment claimed to pay and recomputes every invoice's
//! paid amount from the member's whole payment pool, oldest invoice first.
//!
//! Conservation: the paid amounts of the non-canceled invoices always add up
//! to the pooled payments. Whatever cannot be matched (credit or debt) lands
//! on the most recent invoice.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use core_kernel::{InvoiceId, MemberId, Money, OrgConfig, PaymentId};

use crate::error::{BillingError, Result};
use crate::invoice::{Invoice, InvoiceState};
use crate::payment::{Payment, PaymentAllocation};
use crate::ports::BillingRepository;

/// Outcome of a redistribution run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedistributionReport {
    pub member_id: MemberId,
    /// Allocations in walk order
    pub allocations: Vec<PaymentAllocation>,
    /// Pool amount that did not fit the invoices, booked on the latest invoice
    pub unallocated: Money,
    /// Invoices closed after the run
    pub closed: Vec<InvoiceId>,
    /// Invoices open after the run
    pub open: Vec<InvoiceId>,
}

/// Pool entry being consumed
struct Funds {
    payment_id: PaymentId,
    remaining: Money,
}

/// Recomputes paid amounts and states of a member's invoices
pub struct PaymentsRedistributor<'a, R: BillingRepository + ?Sized> {
    repository: &'a R,
    org: &'a OrgConfig,
}

impl<'a, R: BillingRepository + ?Sized> PaymentsRedistributor<'a, R> {
    pub fn new(repository: &'a R, org: &'a OrgConfig) -> Self {
        Self { repository, org }
    }

    /// Redistributes the member's payments over their invoices
    ///
    /// # Errors
    ///
    /// Returns `BillingError::MemberNotFound` for unknown members
    #[instrument(skip(self), fields(member_id = %member_id))]
    pub async fn redistribute(&self, member_id: MemberId) -> Result<RedistributionReport> {
        if self.repository.member(member_id).await?.is_none() {
            return Err(BillingError::MemberNotFound(member_id));
        }

        let lock = self.repository.member_lock(member_id).await;
        let _guard = lock.lock().await;

        let mut invoices = self.repository.invoices_of(member_id).await?;
        let payments: Vec<Payment> = self
            .repository
            .payments_of(member_id)
            .await?
            .into_iter()
            .filter(Payment::is_active)
            .collect();

        let report = distribute(member_id, &mut invoices, &payments, self.org)?;
        for invoice in invoices {
            self.repository.save_invoice(invoice).await?;
        }

        info!(
            allocations = report.allocations.len(),
            closed = report.closed.len(),
            open = report.open.len(),
            unallocated = %report.unallocated,
            "Payments redistributed"
        );
        Ok(report)
    }
}

/// Pure redistribution over in-memory invoices and active payments
pub fn distribute(
    member_id: MemberId,
    invoices: &mut [Invoice],
    payments: &[Payment],
    org: &OrgConfig,
) -> Result<RedistributionReport> {
    let currency = org.currency;
    invoices.sort_by_key(|invoice| (invoice.date, invoice.id));

    let live: Vec<usize> = (0..invoices.len())
        .filter(|&index| !invoices[index].is_canceled())
        .collect();
    let position: HashMap<InvoiceId, usize> = live
        .iter()
        .enumerate()
        .map(|(order, &index)| (invoices[index].id, order))
        .collect();

    // Payments referencing a live invoice come first, in invoice order; the
    // rest (detached or pointing at a canceled invoice) follow by date.
    let mut walk: Vec<&Payment> = payments.iter().filter(|p| !p.amount.is_zero()).collect();
    walk.sort_by_key(|payment| {
        let order = payment.invoice_id.and_then(|id| position.get(&id).copied());
        (order.is_none(), order.unwrap_or(0), payment.date, payment.id)
    });

    let mut credits: Vec<Funds> = Vec::new();
    let mut refunds: Vec<Funds> = Vec::new();
    for payment in walk {
        let funds = Funds { payment_id: payment.id, remaining: payment.amount };
        if payment.is_refund() {
            refunds.push(funds);
        } else {
            credits.push(funds);
        }
    }

    let mut paid: HashMap<InvoiceId, Money> = HashMap::new();
    let mut allocations = Vec::new();

    // Refunds settle payback invoices first
    for &index in &live {
        let invoice = &invoices[index];
        if !invoice.is_payback() {
            continue;
        }
        let mut due = invoice.amount;
        for funds in refunds.iter_mut().filter(|funds| !funds.remaining.is_zero()) {
            if !due.is_negative() {
                break;
            }
            // Both negative: the larger value is the smaller refund
            let take = if funds.remaining.amount() > due.amount() { funds.remaining } else { due };
            allocate(&mut paid, &mut allocations, funds, invoice.id, take)?;
            due = due.checked_sub(&take)?;
        }
    }

    // Leftover refunds are netted off the end of the credit walk
    let mut debt = Money::zero(currency);
    for funds in &refunds {
        debt = debt.checked_add(&funds.remaining)?;
    }
    for funds in credits.iter_mut().rev() {
        if !debt.is_negative() {
            break;
        }
        let take = funds.remaining.min(debt.abs())?;
        funds.remaining = funds.remaining.checked_sub(&take)?;
        debt = debt.checked_add(&take)?;
    }
    settle_netted_refunds(&mut refunds, debt)?;

    // Oldest invoice first
    for &index in &live {
        let invoice = &invoices[index];
        if invoice.is_payback() {
            continue;
        }
        let mut due = invoice.amount;
        for funds in credits.iter_mut().filter(|funds| funds.remaining.is_positive()) {
            if !due.is_positive() {
                break;
            }
            let take = funds.remaining.min(due)?;
            allocate(&mut paid, &mut allocations, funds, invoice.id, take)?;
            due = due.checked_sub(&take)?;
        }
    }

    // Whatever is left goes to the latest invoice
    let mut unallocated = Money::zero(currency);
    if let Some(&latest) = live.last() {
        let latest_id = invoices[latest].id;
        for funds in credits.iter_mut().chain(refunds.iter_mut()) {
            if funds.remaining.is_zero() {
                continue;
            }
            unallocated = unallocated.checked_add(&funds.remaining)?;
            let take = funds.remaining;
            allocate(&mut paid, &mut allocations, funds, latest_id, take)?;
        }
    }

    let mut closed = Vec::new();
    let mut open = Vec::new();
    for invoice in invoices.iter_mut() {
        let amount = paid.get(&invoice.id).copied().unwrap_or(Money::zero(invoice.currency));
        invoice.apply_paid_amount(amount)?;
        match invoice.state {
            InvoiceState::Closed => closed.push(invoice.id),
            InvoiceState::Open => open.push(invoice.id),
            _ => {}
        }
        debug!(invoice_id = %invoice.id, paid = %invoice.paid_amount, state = ?invoice.state, "Invoice updated");
    }

    Ok(RedistributionReport {
        member_id,
        allocations,
        unallocated,
        closed,
        open,
    })
}

/// Marks the part of the leftover refunds that was netted off credits.
///
/// `debt` is what remains unpaid of those refunds after netting; the
/// refunds are reduced from the front until only `debt` is left.
fn settle_netted_refunds(refunds: &mut [Funds], debt: Money) -> Result<()> {
    let mut total = Money::zero(debt.currency());
    for funds in refunds.iter() {
        total = total.checked_add(&funds.remaining)?;
    }
    let mut netted = total.checked_sub(&debt)?;
    for funds in refunds.iter_mut() {
        if !netted.is_negative() {
            break;
        }
        let take = if funds.remaining.amount() > netted.amount() { funds.remaining } else { netted };
        funds.remaining = funds.remaining.checked_sub(&take)?;
        netted = netted.checked_sub(&take)?;
    }
    Ok(())
}

fn allocate(
    paid: &mut HashMap<InvoiceId, Money>,
    allocations: &mut Vec<PaymentAllocation>,
    funds: &mut Funds,
    invoice_id: InvoiceId,
    amount: Money,
) -> Result<()> {
    if amount.is_zero() {
        return Ok(());
    }
    let entry = paid.entry(invoice_id).or_insert(Money::zero(amount.currency()));
    *entry = entry.checked_add(&amount)?;
    funds.remaining = funds.remaining.checked_sub(&amount)?;
    allocations.push(PaymentAllocation {
        payment_id: funds.payment_id,
        invoice_id,
        amount,
    });
    Ok(())
}
