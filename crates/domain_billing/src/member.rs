//! Member read model
//!
//! Members are owned by the membership platform; billing only reads them.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{MemberId, Money, OrgConfig, PostalAddress};

use crate::invoice::SepaMetadata;

/// SEPA direct-debit mandate signed by the member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SepaMandate {
    pub id: String,
    pub signed_on: NaiveDate,
    pub iban: String,
}

/// A member of the organization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub name: String,
    pub address: PostalAddress,
    /// Whether the member pays the yearly fee
    pub owes_annual_fee: bool,
    /// Member-specific fee overriding the organization default
    pub annual_fee: Option<Decimal>,
    pub sepa_mandate: Option<SepaMandate>,
    /// Creation date
    pub since: NaiveDate,
}

impl Member {
    pub fn new(id: MemberId, name: impl Into<String>, since: NaiveDate) -> Self {
        Self {
            id,
            name: name.into(),
            address: PostalAddress::default(),
            owes_annual_fee: false,
            annual_fee: None,
            sepa_mandate: None,
            since,
        }
    }

    pub fn with_address(mut self, address: PostalAddress) -> Self {
        self.address = address;
        self
    }

    /// Makes the member owe the annual fee, optionally at a specific amount
    pub fn with_annual_fee(mut self, fee: Option<Decimal>) -> Self {
        self.owes_annual_fee = true;
        self.annual_fee = fee;
        self
    }

    pub fn with_sepa_mandate(mut self, mandate: SepaMandate) -> Self {
        self.sepa_mandate = Some(mandate);
        self
    }

    /// Annual fee due, falling back to the organization default
    pub fn effective_annual_fee(&self, org: &OrgConfig) -> Option<Money> {
        if !self.owes_annual_fee {
            return None;
        }
        self.annual_fee
            .or(org.billing.annual_fee)
            .filter(|fee| fee.is_sign_positive() && !fee.is_zero())
            .map(|fee| Money::new(fee, org.currency).round_to_currency())
    }

    /// Mandate data frozen onto invoices at creation
    pub fn sepa_metadata(&self) -> Option<SepaMetadata> {
        self.sepa_mandate.as_ref().map(|mandate| SepaMetadata {
            mandate_id: mandate.id.clone(),
            mandate_signed_on: mandate.signed_on,
            debtor_iban: mandate.iban.clone(),
            debtor_name: self.name.clone(),
        })
    }
}
