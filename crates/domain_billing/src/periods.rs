//! Fiscal-year billing periods
//!
//! A membership is billed in `division` installments per fiscal year. Each
//! installment covers one contiguous period of `12 / division` months, the
//! first starting on the fiscal year's first day.

use serde::{Deserialize, Serialize};

use core_kernel::{temporal::add_months, FiscalYear, OrgConfig, Period};

use crate::error::{BillingError, Result};
use crate::membership::Membership;

/// Divisions of the fiscal year that map to whole months
pub const SUPPORTED_DIVISIONS: [u32; 5] = [1, 2, 3, 4, 12];

/// A period together with its position in the fiscal year
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingPeriod {
    /// 1-based ordinal within the fiscal year
    pub ordinal: u32,
    pub period: Period,
}

/// Builds billing periods
pub struct PeriodCalculator;

impl PeriodCalculator {
    /// Splits a fiscal year into `division` contiguous half-open periods
    ///
    /// # Errors
    ///
    /// Returns `BillingError::UnsupportedDivision` for divisions other than
    /// 1, 2, 3, 4 and 12.
    pub fn build(fiscal_year: FiscalYear, division: u32) -> Result<Vec<Period>> {
        if !SUPPORTED_DIVISIONS.contains(&division) {
            return Err(BillingError::UnsupportedDivision(division));
        }
        let months = 12 / division;
        let beginning = fiscal_year.beginning()?;

        (0..division)
            .map(|index| {
                let begin = add_months(beginning, index * months)?;
                let end = add_months(beginning, (index + 1) * months)?;
                Ok(Period::new(begin, end)?)
            })
            .collect()
    }

    /// Fiscal-year month (1-based) through which the membership is billed.
    ///
    /// This is the month of `ended_on`, or the month of the last delivery
    /// when the organization stops billing there and that month comes first.
    pub fn last_fy_month(membership: &Membership, org: &OrgConfig) -> Result<i32> {
        let fiscal_year = org.fiscal_year(membership.started_on)?;
        let nominal = fiscal_year.month_index(membership.ended_on).min(12);

        if org.billing.ends_on_last_delivery_fy_month {
            if let Some(last_delivery) = membership.last_delivery() {
                return Ok(nominal.min(fiscal_year.month_index(last_delivery)));
            }
        }
        Ok(nominal)
    }

    /// Periods of the membership's fiscal year that it is billed for.
    ///
    /// A period counts when it shares at least one day with
    /// `[started_on, ended_on]` and starts no later than the last billed month.
    pub fn relevant_periods(membership: &Membership, org: &OrgConfig) -> Result<Vec<BillingPeriod>> {
        let fiscal_year = org.fiscal_year(membership.started_on)?;
        let last_month = Self::last_fy_month(membership, org)?;
        let periods = Self::build(fiscal_year, membership.billing_year_division)?;

        Ok(periods
            .into_iter()
            .zip(1u32..)
            .filter(|(period, _)| {
                period.overlaps_days(membership.started_on, membership.ended_on)
                    && fiscal_year.month_index(period.begin) <= last_month
            })
            .map(|(period, ordinal)| BillingPeriod { ordinal, period })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use core_kernel::{Currency, MemberId, MembershipId, Money};
    use rust_decimal_macros::dec;
    use test_utils::OrgFixtures;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_build_quarters_with_offset_fiscal_year() {
        let fy = FiscalYear::new(2023, 4).unwrap();
        let periods = PeriodCalculator::build(fy, 4).unwrap();
        assert_eq!(periods.len(), 4);
        assert_eq!(periods[0].begin, date(2023, 4, 1));
        assert_eq!(periods[1].begin, date(2023, 7, 1));
        assert_eq!(periods[3].end, date(2024, 4, 1));
    }

    #[test]
    fn test_unsupported_division() {
        let fy = FiscalYear::new(2024, 1).unwrap();
        assert!(matches!(
            PeriodCalculator::build(fy, 5),
            Err(BillingError::UnsupportedDivision(5))
        ));
        assert!(PeriodCalculator::build(fy, 0).is_err());
    }

    #[test]
    fn test_relevant_periods_for_partial_membership() {
        let org = OrgFixtures::swiss();
        let membership = Membership::new(
            MembershipId::new(1),
            MemberId::new(1),
            Money::new(dec!(200), Currency::CHF),
            4,
            date(2024, 5, 15),
            date(2024, 12, 31),
        );
        let relevant = PeriodCalculator::relevant_periods(&membership, &org).unwrap();
        let ordinals: Vec<u32> = relevant.iter().map(|p| p.ordinal).collect();
        assert_eq!(ordinals, vec![2, 3, 4]);
    }

    #[test]
    fn test_last_fy_month_follows_last_delivery() {
        let mut org = OrgFixtures::swiss();
        let membership = Membership::new(
            MembershipId::new(1),
            MemberId::new(1),
            Money::new(dec!(200), Currency::CHF),
            4,
            date(2024, 1, 1),
            date(2024, 12, 31),
        )
        .with_deliveries(vec![date(2024, 3, 5), date(2024, 8, 20)]);

        assert_eq!(PeriodCalculator::last_fy_month(&membership, &org).unwrap(), 12);
        org.billing.ends_on_last_delivery_fy_month = true;
        assert_eq!(PeriodCalculator::last_fy_month(&membership, &org).unwrap(), 8);

        let relevant = PeriodCalculator::relevant_periods(&membership, &org).unwrap();
        assert_eq!(relevant.len(), 3);
    }
}
