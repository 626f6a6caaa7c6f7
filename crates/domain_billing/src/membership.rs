//! Membership read model
//!
//! A membership is a basket subscription for one fiscal year. Billing reads
//! it to decide how much is still to be invoiced; the amount already
//! invoiced is derived from the membership's non-canceled invoices.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use core_kernel::{MemberId, MembershipId, Money};

use crate::error::Result;
use crate::invoice::Invoice;

/// A basket subscription
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub id: MembershipId,
    pub member_id: MemberId,
    /// Full price for the whole membership
    pub price: Money,
    /// Number of installments per fiscal year (1, 2, 3, 4 or 12)
    pub billing_year_division: u32,
    pub started_on: NaiveDate,
    /// Last day (inclusive)
    pub ended_on: NaiveDate,
    /// Billable delivery dates
    pub deliveries: Vec<NaiveDate>,
    /// Leading deliveries that are free trials
    pub trial_deliveries: u32,
    /// Paid through salary, never invoiced
    pub salary_basket: bool,
}

impl Membership {
    pub fn new(
        id: MembershipId,
        member_id: MemberId,
        price: Money,
        billing_year_division: u32,
        started_on: NaiveDate,
        ended_on: NaiveDate,
    ) -> Self {
        Self {
            id,
            member_id,
            price,
            billing_year_division,
            started_on,
            ended_on,
            deliveries: Vec::new(),
            trial_deliveries: 0,
            salary_basket: false,
        }
    }

    pub fn with_deliveries(mut self, mut deliveries: Vec<NaiveDate>) -> Self {
        deliveries.sort();
        self.deliveries = deliveries;
        self
    }

    pub fn with_trial_deliveries(mut self, count: u32) -> Self {
        self.trial_deliveries = count;
        self
    }

    pub fn with_salary_basket(mut self) -> Self {
        self.salary_basket = true;
        self
    }

    pub fn is_active(&self, today: NaiveDate) -> bool {
        self.started_on <= today && today <= self.ended_on
    }

    pub fn is_future(&self, today: NaiveDate) -> bool {
        self.started_on > today
    }

    /// First delivery after the trial ones
    pub fn first_billable_delivery(&self) -> Option<NaiveDate> {
        self.deliveries.get(self.trial_deliveries as usize).copied()
    }

    pub fn last_delivery(&self) -> Option<NaiveDate> {
        self.deliveries.last().copied()
    }

    /// Installments already issued for this membership
    pub fn invoices<'a>(&self, invoices: &'a [Invoice]) -> Vec<&'a Invoice> {
        invoices
            .iter()
            .filter(|invoice| !invoice.is_canceled() && invoice.membership_id() == Some(self.id))
            .collect()
    }

    /// Sum of the installments on the membership's non-canceled invoices
    pub fn invoiced_amount(&self, invoices: &[Invoice]) -> Result<Money> {
        let mut total = Money::zero(self.price.currency());
        for invoice in self.invoices(invoices) {
            if let Some(amount) = &invoice.memberships_amount {
                total = total.checked_add(amount)?;
            }
        }
        Ok(total)
    }

    /// `price - invoiced_amount`
    pub fn missing_invoices_amount(&self, invoices: &[Invoice]) -> Result<Money> {
        Ok(self.price.checked_sub(&self.invoiced_amount(invoices)?)?)
    }
}

/// The active membership, or else the nearest future one
pub fn current_membership(memberships: &[Membership], today: NaiveDate) -> Option<&Membership> {
    memberships
        .iter()
        .find(|membership| membership.is_active(today))
        .or_else(|| {
            memberships
                .iter()
                .filter(|membership| membership.is_future(today))
                .min_by_key(|membership| membership.started_on)
        })
}
