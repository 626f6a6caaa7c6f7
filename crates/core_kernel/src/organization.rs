//! Organization settings consumed by the billing engine
//!
//! The organization store lives outside this workspace; billing entry points
//! receive an `OrgConfig` value explicitly instead of reading ambient state.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::money::Currency;
use crate::temporal::{FiscalYear, Timezone};

/// A postal address as printed on payment slips
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PostalAddress {
    pub street: String,
    pub zip: String,
    pub city: String,
    /// ISO 3166-1 alpha-2
    pub country_code: String,
}

/// Bank identity of the organization collecting payments
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CreditorIdentity {
    pub name: String,
    pub iban: String,
    pub address: PostalAddress,
    /// SEPA creditor identifier (e.g. "DE98ZZZ09999999999")
    pub sepa_creditor_identifier: Option<String>,
    /// Digits the Swiss bank prefixes to structured references
    pub bank_reference: Option<String>,
}

/// Billing behaviour switches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BillingSettings {
    /// Memberships are billed only once their first delivery took place
    pub starts_after_first_delivery: bool,
    /// Billing stops at the fiscal month of the last delivery
    pub ends_on_last_delivery_fy_month: bool,
    /// Yearly fee billed to members who owe one, on top of memberships
    pub annual_fee: Option<Decimal>,
}

impl Default for BillingSettings {
    fn default() -> Self {
        Self {
            starts_after_first_delivery: true,
            ends_on_last_delivery_fy_month: false,
            annual_fee: None,
        }
    }
}

/// Organization configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrgConfig {
    /// Organization name
    pub name: String,
    /// First month of the fiscal year (1-12)
    pub fiscal_year_start_month: u32,
    /// Invoicing currency
    pub currency: Currency,
    /// ISO 3166-1 alpha-2 country code; "CH" selects Swiss QR references
    pub country_code: String,
    /// Local calendar used to decide what "today" is
    #[serde(default)]
    pub timezone: Timezone,
    /// Creditor bank identity
    pub creditor: CreditorIdentity,
    /// Billing switches
    #[serde(default)]
    pub billing: BillingSettings,
}

impl OrgConfig {
    /// Validates the settings that billing arithmetic relies on
    pub fn validate(&self) -> Result<(), CoreError> {
        if !(1..=12).contains(&self.fiscal_year_start_month) {
            return Err(CoreError::configuration(format!(
                "fiscal_year_start_month must be within 1..=12, got {}",
                self.fiscal_year_start_month
            )));
        }
        if let Some(reference) = &self.creditor.bank_reference {
            if reference.len() > 9 || !reference.chars().all(|c| c.is_ascii_digit()) {
                return Err(CoreError::configuration(format!(
                    "bank_reference must be at most 9 digits, got {:?}",
                    reference
                )));
            }
        }
        Ok(())
    }

    /// Returns true when the organization uses Swiss QR references
    pub fn uses_qr_references(&self) -> bool {
        self.country_code.eq_ignore_ascii_case("CH")
    }

    /// Fiscal year containing the date
    pub fn fiscal_year(&self, date: NaiveDate) -> Result<FiscalYear, CoreError> {
        Ok(FiscalYear::for_date(date, self.fiscal_year_start_month)?)
    }

    /// Today's date in the organization's timezone
    pub fn today(&self) -> NaiveDate {
        self.timezone.today()
    }
}
