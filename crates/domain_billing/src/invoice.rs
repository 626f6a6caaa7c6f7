//! Invoices
//!
//! An invoice bills one entity (a membership, the annual fee, shares, ...)
//! to one member. Its amount is never set directly: it is the sum of the
//! components its entity kind allows, rounded to the currency's increment.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{Currency, EntityId, InvoiceId, MemberId, MembershipId, Money};

use crate::error::{BillingError, Result};

/// Invoice state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceState {
    /// Created, not yet sent to the member
    Processing,
    /// Sent, awaiting payment
    Open,
    /// Fully paid
    Closed,
    /// Voided; never re-opens
    Canceled,
}

/// Kind of entity an invoice bills
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Membership,
    AnnualFee,
    Share,
    NewMemberFee,
    Other,
}

/// Components that make up an invoice amount
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmountRule {
    pub annual_fee: bool,
    pub memberships: bool,
    pub shares: bool,
    pub items: bool,
}

impl EntityKind {
    /// Amount rule table
    pub fn amount_rule(&self) -> AmountRule {
        match self {
            EntityKind::Membership => AmountRule { annual_fee: true, memberships: true, shares: false, items: false },
            EntityKind::AnnualFee => AmountRule { annual_fee: true, memberships: false, shares: false, items: false },
            EntityKind::Share => AmountRule { annual_fee: false, memberships: false, shares: true, items: false },
            EntityKind::NewMemberFee => AmountRule { annual_fee: false, memberships: false, shares: false, items: true },
            EntityKind::Other => AmountRule { annual_fee: false, memberships: false, shares: false, items: true },
        }
    }
}

/// Tagged reference to the billed entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InvoiceEntity {
    pub kind: EntityKind,
    pub id: Option<EntityId>,
}

impl InvoiceEntity {
    pub fn new(kind: EntityKind, id: Option<EntityId>) -> Self {
        Self { kind, id }
    }

    pub fn membership(id: MembershipId) -> Self {
        Self::new(EntityKind::Membership, Some(EntityId::new(id.value())))
    }

    pub fn annual_fee() -> Self {
        Self::new(EntityKind::AnnualFee, None)
    }
}

/// A free line on `Other` and `NewMemberFee` invoices
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub description: String,
    pub amount: Money,
}

impl InvoiceItem {
    pub fn new(description: impl Into<String>, amount: Money) -> Self {
        Self {
            description: description.into(),
            amount,
        }
    }
}

/// Direct-debit data captured when the invoice was created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SepaMetadata {
    pub mandate_id: String,
    pub mandate_signed_on: NaiveDate,
    pub debtor_iban: String,
    pub debtor_name: String,
}

/// An invoice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    /// Unique identifier
    pub id: InvoiceId,
    /// Billed member
    pub member_id: MemberId,
    /// Invoice date
    pub date: NaiveDate,
    /// Currency
    pub currency: Currency,
    /// Total, derived from the components
    pub amount: Money,
    /// Sum of the payments allocated by redistribution
    pub paid_amount: Money,
    /// Billed entity
    pub entity: InvoiceEntity,
    /// Annual fee component
    pub annual_fee: Option<Money>,
    /// Membership installment component
    pub memberships_amount: Option<Money>,
    /// Installment label ("Quarterly amount #2")
    pub memberships_amount_description: Option<String>,
    /// Number of periods left, the billed one included, when the installment was computed
    pub membership_amount_fraction: Option<u32>,
    /// Number of shares (Share invoices)
    pub shares_number: Option<u32>,
    /// Unit price of a share (Share invoices)
    pub share_price: Option<Money>,
    /// Lines (Other and NewMemberFee invoices)
    pub items: Vec<InvoiceItem>,
    /// State
    pub state: InvoiceState,
    /// When the invoice was sent
    pub sent_at: Option<DateTime<Utc>>,
    /// When the invoice was canceled
    pub canceled_at: Option<DateTime<Utc>>,
    /// Direct-debit mandate data
    pub sepa_metadata: Option<SepaMetadata>,
}

impl Invoice {
    /// Creates an empty invoice in the processing state
    ///
    /// # Arguments
    ///
    /// * `id` - Identifier handed out by the repository
    /// * `member_id` - Billed member
    /// * `date` - Invoice date
    /// * `currency` - Invoice currency
    /// * `entity` - Billed entity
    pub fn new(
        id: InvoiceId,
        member_id: MemberId,
        date: NaiveDate,
        currency: Currency,
        entity: InvoiceEntity,
    ) -> Self {
        Self {
            id,
            member_id,
            date,
            currency,
            amount: Money::zero(currency),
            paid_amount: Money::zero(currency),
            entity,
            annual_fee: None,
            memberships_amount: None,
            memberships_amount_description: None,
            membership_amount_fraction: None,
            shares_number: None,
            share_price: None,
            items: Vec::new(),
            state: InvoiceState::Processing,
            sent_at: None,
            canceled_at: None,
            sepa_metadata: None,
        }
    }

    /// Sets the annual fee component
    pub fn with_annual_fee(mut self, fee: Money) -> Result<Self> {
        self.annual_fee = Some(fee);
        self.recalculate_amount()?;
        Ok(self)
    }

    /// Sets the membership installment
    ///
    /// # Arguments
    ///
    /// * `amount` - Installment amount
    /// * `description` - Installment label
    /// * `fraction` - Periods left, the billed one included
    pub fn with_memberships_amount(
        mut self,
        amount: Money,
        description: impl Into<String>,
        fraction: u32,
    ) -> Result<Self> {
        self.memberships_amount = Some(amount);
        self.memberships_amount_description = Some(description.into());
        self.membership_amount_fraction = Some(fraction);
        self.recalculate_amount()?;
        Ok(self)
    }

    /// Sets the number of shares and their unit price
    pub fn with_shares(mut self, number: u32, price: Money) -> Result<Self> {
        self.shares_number = Some(number);
        self.share_price = Some(price);
        self.recalculate_amount()?;
        Ok(self)
    }

    /// Adds a line
    pub fn with_item(mut self, item: InvoiceItem) -> Result<Self> {
        self.items.push(item);
        self.recalculate_amount()?;
        Ok(self)
    }

    /// Attaches direct-debit data
    pub fn with_sepa_metadata(mut self, metadata: SepaMetadata) -> Self {
        self.sepa_metadata = Some(metadata);
        self
    }

    /// Applies the amount rule of the entity kind.
    ///
    /// Components the kind does not allow are rejected rather than ignored.
    fn recalculate_amount(&mut self) -> Result<()> {
        let rule = self.entity.kind.amount_rule();
        let mut total = Money::zero(self.currency);

        if let Some(fee) = &self.annual_fee {
            ensure_allowed(rule.annual_fee, "annual_fee", self.entity.kind)?;
            total = total.checked_add(fee)?;
        }
        if let Some(memberships) = &self.memberships_amount {
            ensure_allowed(rule.memberships, "memberships_amount", self.entity.kind)?;
            total = total.checked_add(memberships)?;
        }
        if let (Some(number), Some(price)) = (self.shares_number, &self.share_price) {
            ensure_allowed(rule.shares, "shares", self.entity.kind)?;
            let shares = Money::new(price.amount() * Decimal::from(number), price.currency());
            total = total.checked_add(&shares)?;
        }
        if !self.items.is_empty() {
            ensure_allowed(rule.items, "items", self.entity.kind)?;
            for item in &self.items {
                total = total.checked_add(&item.amount)?;
            }
        }

        self.amount = total.round_to_currency();
        Ok(())
    }

    /// Membership billed by this invoice, if any
    pub fn membership_id(&self) -> Option<MembershipId> {
        match (self.entity.kind, self.entity.id) {
            (EntityKind::Membership, Some(id)) => Some(MembershipId::new(id.value())),
            _ => None,
        }
    }

    pub fn is_canceled(&self) -> bool {
        self.state == InvoiceState::Canceled
    }

    /// A negative invoice pays money back to the member
    pub fn is_payback(&self) -> bool {
        self.amount.is_negative()
    }

    /// Amount still due
    pub fn missing_amount(&self) -> Result<Money> {
        Ok(self.amount.checked_sub(&self.paid_amount)?)
    }

    // ========================================================================
    // State transitions
    // ========================================================================

    /// Marks the invoice as sent: processing → open
    pub fn open(&mut self, sent_at: DateTime<Utc>) -> Result<()> {
        self.transition(&[InvoiceState::Processing], InvoiceState::Open)?;
        self.sent_at = Some(sent_at);
        Ok(())
    }

    /// open → closed
    pub fn close(&mut self) -> Result<()> {
        self.transition(&[InvoiceState::Open], InvoiceState::Closed)
    }

    /// closed → open
    pub fn reopen(&mut self) -> Result<()> {
        self.transition(&[InvoiceState::Closed], InvoiceState::Open)
    }

    /// Cancels an open or closed invoice
    pub fn cancel(&mut self, at: DateTime<Utc>) -> Result<()> {
        self.transition(&[InvoiceState::Open, InvoiceState::Closed], InvoiceState::Canceled)?;
        self.canceled_at = Some(at);
        Ok(())
    }

    /// Records the redistributed paid amount and derives open/closed from it.
    ///
    /// Canceled invoices are forced to zero; processing invoices keep their state.
    pub fn apply_paid_amount(&mut self, paid: Money) -> Result<()> {
        match self.state {
            InvoiceState::Canceled => {
                self.paid_amount = Money::zero(self.currency);
            }
            InvoiceState::Processing => {
                self.paid_amount = paid;
            }
            InvoiceState::Open | InvoiceState::Closed => {
                self.paid_amount = paid;
                let settled = paid.amount() >= self.amount.amount();
                match (self.state, settled) {
                    (InvoiceState::Open, true) => self.close()?,
                    (InvoiceState::Closed, false) => self.reopen()?,
                    _ => {}
                }
            }
        }
        Ok(())
    }

    fn transition(&mut self, from: &[InvoiceState], to: InvoiceState) -> Result<()> {
        if !from.contains(&self.state) {
            return Err(BillingError::InvalidTransition { from: self.state, to });
        }
        self.state = to;
        Ok(())
    }
}

fn ensure_allowed(allowed: bool, component: &str, kind: EntityKind) -> Result<()> {
    if allowed {
        Ok(())
    } else {
        Err(BillingError::CalculationError(format!(
            "{} is not a component of {:?} invoices",
            component, kind
        )))
    }
}
