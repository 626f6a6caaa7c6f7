//! Previsional invoicing
//!
//! Projects the installments a membership will still be billed, keyed by
//! month, so the organization can forecast its income. The projection runs
//! the same schedule the invoicer uses, so projected and real amounts match.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use core_kernel::{temporal::month_key, OrgConfig};

use crate::error::Result;
use crate::invoice::Invoice;
use crate::membership::Membership;
use crate::schedule::MembershipSchedule;

/// Month key ("YYYY-MM") to projected amount
pub type Projection = BTreeMap<String, Decimal>;

/// Projects the not-yet-invoiced installments of a membership
///
/// # Arguments
///
/// * `membership` - The projected membership
/// * `invoices` - Invoices of the member
/// * `org` - Organization settings
/// * `today` - Overdue installments are billed on this date
///
/// # Returns
///
/// Amounts keyed by the month of each billed period's start. Periods already
/// over are folded into the first current one. The sum
/// equals the membership's missing invoices amount; the map is empty for
/// salary baskets, fully invoiced memberships and memberships that wait for
/// a delivery that is not planned.
pub fn compute(
    membership: &Membership,
    invoices: &[Invoice],
    org: &OrgConfig,
    today: NaiveDate,
) -> Result<Projection> {
    let mut projection = Projection::new();
    if membership.salary_basket {
        return Ok(projection);
    }

    let mut schedule = MembershipSchedule::new(membership, invoices, org)?;
    while let Some(next) = schedule.next_date() {
        let date = next.max(today);
        let Some(installment) = schedule.installment(date)? else {
            break;
        };
        *projection
            .entry(month_key(installment.period_start))
            .or_insert(Decimal::ZERO) += installment.amount.amount();
        schedule.advance(&installment)?;
        if installment.catch_up {
            break;
        }
    }
    Ok(projection)
}

/// Sums projections by month
pub fn aggregate<I>(projections: I) -> Projection
where
    I: IntoIterator<Item = Projection>,
{
    let mut total = Projection::new();
    for projection in projections {
        for (month, amount) in projection {
            *total.entry(month).or_insert(Decimal::ZERO) += amount;
        }
    }
    total
}
