//! Installment schedule of one membership
//!
//! Shared by the invoicer, which bills the next installment, and the
//! previsional projection, which simulates every installment still to come.
//! Both must agree on how a missing amount is spread over the remaining
//! periods, so the arithmetic lives here.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use core_kernel::{Money, OrgConfig};

use crate::error::{BillingError, Result};
use crate::invoice::Invoice;
use crate::membership::Membership;
use crate::periods::{BillingPeriod, PeriodCalculator};

/// One membership installment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Installment {
    /// Invoice date
    pub date: NaiveDate,
    /// Start of the billed period, clamped to the billing start
    pub period_start: NaiveDate,
    /// Periods left, the billed one included
    pub fraction: u32,
    pub amount: Money,
    /// Ordinal of the billed period in the fiscal year
    pub ordinal: u32,
    /// Bills a price increase after every period was invoiced
    pub catch_up: bool,
    pub description: String,
}

/// Label printed next to an installment
pub fn installment_description(division: u32, ordinal: u32) -> Result<String> {
    let label = match division {
        1 => return Ok("Annual amount".to_string()),
        2 => "Semiannual amount",
        3 => "Four-monthly amount",
        4 => "Quarterly amount",
        12 => "Monthly amount",
        other => return Err(BillingError::UnsupportedDivision(other)),
    };
    Ok(format!("{} #{}", label, ordinal))
}

/// Billing position of a membership: what is invoiced, what is left
#[derive(Debug, Clone)]
pub struct MembershipSchedule {
    division: u32,
    periods: Vec<BillingPeriod>,
    invoiced_periods: usize,
    missing: Money,
    /// Earliest invoice date; `None` while no billable delivery exists
    billing_start: Option<NaiveDate>,
    last_invoice_date: Option<NaiveDate>,
}

impl MembershipSchedule {
    /// Derives the schedule from the membership and the member's invoices
    ///
    /// # Arguments
    ///
    /// * `membership` - The billed membership
    /// * `invoices` - Invoices of the member; other memberships' invoices are ignored
    /// * `org` - Organization settings
    pub fn new(membership: &Membership, invoices: &[Invoice], org: &OrgConfig) -> Result<Self> {
        let periods = PeriodCalculator::relevant_periods(membership, org)?;
        let issued = membership.invoices(invoices);

        // Each installment records how many periods were left; the smallest
        // value tells how far billing went.
        let invoiced_periods = issued
            .iter()
            .filter_map(|invoice| invoice.membership_amount_fraction)
            .min()
            .map(|fraction| periods.len().saturating_sub(fraction.max(1) as usize - 1))
            .unwrap_or(0);

        let waits_for_delivery =
            org.billing.starts_after_first_delivery || membership.trial_deliveries > 0;
        let billing_start = if waits_for_delivery {
            membership
                .first_billable_delivery()
                .map(|delivery| delivery.max(membership.started_on))
        } else {
            Some(membership.started_on)
        };

        Ok(Self {
            division: membership.billing_year_division,
            periods,
            invoiced_periods,
            missing: membership.missing_invoices_amount(invoices)?,
            billing_start,
            last_invoice_date: issued.iter().map(|invoice| invoice.date).max(),
        })
    }

    /// Relevant periods not invoiced yet
    pub fn remaining(&self) -> &[BillingPeriod] {
        &self.periods[self.invoiced_periods.min(self.periods.len())..]
    }

    /// `price - invoiced_amount`
    pub fn missing(&self) -> Money {
        self.missing
    }

    /// Date from which the next installment can be billed
    pub fn next_date(&self) -> Option<NaiveDate> {
        if !self.missing.is_positive() || self.periods.is_empty() {
            return None;
        }
        let start = self.billing_start?;
        match self.remaining().first() {
            Some(next) => Some(next.period.begin.max(start)),
            None => Some(self.last_invoice_date.map_or(start, |last| last.max(start))),
        }
    }

    /// Installment billed on `date`, `None` when nothing is due by then
    pub fn installment(&self, date: NaiveDate) -> Result<Option<Installment>> {
        match self.next_date() {
            Some(next) if next <= date => {}
            _ => return Ok(None),
        }

        let remaining = self.remaining();
        let catch_up = remaining.is_empty();
        let fraction = remaining
            .iter()
            .filter(|billing_period| billing_period.period.end > date)
            .count()
            .max(1);

        // The last installment takes whatever is left so rounding never leaks
        let amount = if fraction == 1 {
            self.missing
        } else {
            self.missing.split(fraction as u32)?
        };
        let billed = &self.periods[self.periods.len() - fraction];
        let period_start = if catch_up {
            date
        } else {
            self.billing_start.map_or(billed.period.begin, |start| billed.period.begin.max(start))
        };

        Ok(Some(Installment {
            date,
            period_start,
            fraction: fraction as u32,
            amount,
            ordinal: billed.ordinal,
            catch_up,
            description: installment_description(self.division, billed.ordinal)?,
        }))
    }

    /// Books an installment as if it had been invoiced
    pub(crate) fn advance(&mut self, installment: &Installment) -> Result<()> {
        self.missing = self.missing.checked_sub(&installment.amount)?;
        self.invoiced_periods = self.periods.len() + 1 - installment.fraction as usize;
        self.last_invoice_date = Some(installment.date);
        Ok(())
    }
}
