//! Invoicer
//!
//! Decides when a member is billed next and issues the invoice.
//!
//! A member moves through three states: not billable, billable (the next
//! billing date is on or before today) and invoiced. Members with a basket
//! membership are billed in installments (see [`MembershipSchedule`]);
//! support members, who only owe the annual fee, are re-checked weekly and
//! billed once per fiscal year.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use core_kernel::{
    temporal::monday_on_or_after, FiscalYear, MemberId, MembershipId, Money, OrgConfig,
};

use crate::error::{BillingError, Result};
use crate::invoice::{Invoice, InvoiceEntity};
use crate::member::Member;
use crate::membership::{current_membership, Membership};
use crate::ports::BillingRepository;
use crate::schedule::{Installment, MembershipSchedule};

/// What the next invoice of a member would contain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoicePlan {
    pub member_id: MemberId,
    pub date: NaiveDate,
    pub membership_id: Option<MembershipId>,
    pub installment: Option<Installment>,
    pub annual_fee: Option<Money>,
}

/// Issues membership and annual-fee invoices
pub struct Invoicer<'a, R: BillingRepository + ?Sized> {
    repository: &'a R,
    org: &'a OrgConfig,
}

impl<'a, R: BillingRepository + ?Sized> Invoicer<'a, R> {
    /// Creates an invoicer
    ///
    /// # Arguments
    ///
    /// * `repository` - Billing storage
    /// * `org` - Organization settings
    pub fn new(repository: &'a R, org: &'a OrgConfig) -> Self {
        Self { repository, org }
    }

    /// Next date the member can be billed, `None` when nothing is left to bill
    pub async fn next_date(&self, member_id: MemberId, today: NaiveDate) -> Result<Option<NaiveDate>> {
        let context = self.load(member_id).await?;
        match current_membership(&context.memberships, today) {
            Some(membership) if membership.salary_basket => Ok(None),
            Some(membership) => {
                let schedule = MembershipSchedule::new(membership, &context.invoices, self.org)?;
                Ok(schedule.next_date())
            }
            None => self.support_next_date(&context, today),
        }
    }

    /// Returns true if the member's next billing date is due
    pub async fn is_billable(&self, member_id: MemberId, today: NaiveDate) -> Result<bool> {
        Ok(self
            .next_date(member_id, today)
            .await?
            .is_some_and(|next| next <= today))
    }

    /// Computes the invoice the member would receive today
    pub async fn plan(&self, member_id: MemberId, today: NaiveDate) -> Result<Option<InvoicePlan>> {
        let context = self.load(member_id).await?;
        self.plan_for(&context, today)
    }

    /// Issues the member's next invoice if it is due.
    ///
    /// Runs inside the member's critical section so a period is never billed
    /// twice by concurrent runs.
    ///
    /// # Returns
    ///
    /// The created invoice (in the processing state), or `None` when the
    /// member is not billable today
    #[instrument(skip(self), fields(member_id = %member_id))]
    pub async fn create_invoice(&self, member_id: MemberId, today: NaiveDate) -> Result<Option<Invoice>> {
        let lock = self.repository.member_lock(member_id).await;
        let _guard = lock.lock().await;

        let context = self.load(member_id).await?;
        let Some(plan) = self.plan_for(&context, today)? else {
            debug!("Member not billable");
            return Ok(None);
        };

        if let (Some(installment), Some(membership_id)) = (&plan.installment, plan.membership_id) {
            ensure_not_invoiced(&context.invoices, membership_id, installment)?;
        }

        let entity = match plan.membership_id {
            Some(membership_id) => InvoiceEntity::membership(membership_id),
            None => InvoiceEntity::annual_fee(),
        };
        let id = self.repository.next_invoice_id().await?;
        let mut invoice = Invoice::new(id, member_id, plan.date, self.org.currency, entity);

        if let Some(installment) = &plan.installment {
            invoice = invoice.with_memberships_amount(
                installment.amount,
                installment.description.clone(),
                installment.fraction,
            )?;
        }
        if let Some(fee) = plan.annual_fee {
            invoice = invoice.with_annual_fee(fee)?;
        }
        if let Some(metadata) = context.member.sepa_metadata() {
            invoice = invoice.with_sepa_metadata(metadata);
        }

        self.repository.save_invoice(invoice.clone()).await?;
        info!(
            invoice_id = %invoice.id,
            amount = %invoice.amount,
            description = invoice.memberships_amount_description.as_deref().unwrap_or("annual fee"),
            "Invoice created"
        );
        Ok(Some(invoice))
    }

    /// Bills every billable member
    pub async fn run(&self, today: NaiveDate) -> Result<Vec<Invoice>> {
        let mut created = Vec::new();
        for member in self.repository.members().await? {
            if let Some(invoice) = self.create_invoice(member.id, today).await? {
                created.push(invoice);
            }
        }
        info!(count = created.len(), "Invoicing run finished");
        Ok(created)
    }

    async fn load(&self, member_id: MemberId) -> Result<MemberContext> {
        let member = self
            .repository
            .member(member_id)
            .await?
            .ok_or(BillingError::MemberNotFound(member_id))?;
        Ok(MemberContext {
            memberships: self.repository.memberships_of(member_id).await?,
            invoices: self.repository.invoices_of(member_id).await?,
            member,
        })
    }

    fn plan_for(&self, context: &MemberContext, today: NaiveDate) -> Result<Option<InvoicePlan>> {
        let fee = self.annual_fee_due(context, today)?;

        match current_membership(&context.memberships, today) {
            Some(membership) if membership.salary_basket => Ok(None),
            Some(membership) => {
                let schedule = MembershipSchedule::new(membership, &context.invoices, self.org)?;
                Ok(schedule.installment(today)?.map(|installment| InvoicePlan {
                    member_id: context.member.id,
                    date: today,
                    membership_id: Some(membership.id),
                    installment: Some(installment),
                    annual_fee: fee,
                }))
            }
            None => {
                let due = self
                    .support_next_date(context, today)?
                    .is_some_and(|next| next <= today);
                Ok(fee.filter(|_| due).map(|fee| InvoicePlan {
                    member_id: context.member.id,
                    date: today,
                    membership_id: None,
                    installment: None,
                    annual_fee: Some(fee),
                }))
            }
        }
    }

    /// The member's annual fee, unless an invoice of the fiscal year already carries it
    fn annual_fee_due(&self, context: &MemberContext, today: NaiveDate) -> Result<Option<Money>> {
        let Some(fee) = context.member.effective_annual_fee(self.org) else {
            return Ok(None);
        };
        let fiscal_year = self.org.fiscal_year(today)?;
        if annual_fee_invoiced(&context.invoices, fiscal_year) {
            return Ok(None);
        }
        Ok(Some(fee))
    }

    /// Monday on or after `max(fiscal-year start, member since)`, moving to
    /// the next fiscal year once the current one's fee is invoiced
    fn support_next_date(&self, context: &MemberContext, today: NaiveDate) -> Result<Option<NaiveDate>> {
        if context.member.effective_annual_fee(self.org).is_none() {
            return Ok(None);
        }
        let mut fiscal_year = self.org.fiscal_year(today)?;
        if annual_fee_invoiced(&context.invoices, fiscal_year) {
            fiscal_year = fiscal_year.next();
        }
        let start = fiscal_year.beginning()?.max(context.member.since);
        Ok(Some(monday_on_or_after(start)))
    }
}

struct MemberContext {
    member: Member,
    memberships: Vec<Membership>,
    invoices: Vec<Invoice>,
}

fn annual_fee_invoiced(invoices: &[Invoice], fiscal_year: FiscalYear) -> bool {
    invoices.iter().any(|invoice| {
        !invoice.is_canceled() && invoice.annual_fee.is_some() && fiscal_year.contains(invoice.date)
    })
}

/// An installment must cover fewer remaining periods than every earlier one
fn ensure_not_invoiced(
    invoices: &[Invoice],
    membership_id: MembershipId,
    installment: &Installment,
) -> Result<()> {
    let smallest = invoices
        .iter()
        .filter(|invoice| !invoice.is_canceled() && invoice.membership_id() == Some(membership_id))
        .filter_map(|invoice| invoice.membership_amount_fraction)
        .min();

    match smallest {
        Some(fraction) if !installment.catch_up && installment.fraction >= fraction => {
            Err(BillingError::AlreadyInvoiced { fraction: installment.fraction })
        }
        _ => Ok(()),
    }
}
