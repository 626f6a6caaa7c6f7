//! Test Data Builders
//!
//! Provides builder patterns for constructing test data with sensible defaults.
//! These builders allow tests to specify only the relevant fields while using
//! defaults for everything else.

use chrono::{Datelike, Duration, NaiveDate, Utc, Weekday};
use core_kernel::{Currency, InvoiceId, MemberId, MembershipId, Money, PaymentId};
use domain_billing::{
    EntityKind, InMemoryBillingRepository, Invoice, InvoiceEntity, InvoiceItem, Member,
    Membership, Payment, PaymentData, PaymentOrigin,
};
use rust_decimal::Decimal;

use crate::fixtures::{DateFixtures, MoneyFixtures};

/// Builder for members
pub struct MemberBuilder {
    id: MemberId,
    name: String,
    since: NaiveDate,
    annual_fee: Option<Option<Decimal>>,
}

impl Default for MemberBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MemberBuilder {
    /// Creates a new builder with default values
    pub fn new() -> Self {
        Self {
            id: MemberId::new(42),
            name: "Jeanne Dupont".to_string(),
            since: DateFixtures::date(2023, 6, 1),
            annual_fee: None,
        }
    }

    pub fn with_id(mut self, id: u64) -> Self {
        self.id = MemberId::new(id);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_since(mut self, since: NaiveDate) -> Self {
        self.since = since;
        self
    }

    /// Marks the member as owing an annual fee (`None` uses the organization default)
    pub fn owing_annual_fee(mut self, fee: Option<Decimal>) -> Self {
        self.annual_fee = Some(fee);
        self
    }

    pub fn build(self) -> Member {
        let member = Member::new(self.id, self.name, self.since);
        match self.annual_fee {
            Some(fee) => member.with_annual_fee(fee),
            None => member,
        }
    }
}

/// Builder for memberships, defaulting to a yearly CHF 200 basket over
/// fiscal year 2024 with weekly deliveries
pub struct MembershipBuilder {
    id: MembershipId,
    member_id: MemberId,
    price: Money,
    division: u32,
    started_on: NaiveDate,
    ended_on: NaiveDate,
    deliveries: Option<Vec<NaiveDate>>,
    trial_deliveries: u32,
    salary_basket: bool,
}

impl Default for MembershipBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MembershipBuilder {
    pub fn new() -> Self {
        Self {
            id: MembershipId::new(1),
            member_id: MemberId::new(42),
            price: MoneyFixtures::chf_200(),
            division: 1,
            started_on: DateFixtures::fy_2024_start(),
            ended_on: DateFixtures::fy_2024_end(),
            deliveries: None,
            trial_deliveries: 0,
            salary_basket: false,
        }
    }

    pub fn with_id(mut self, id: u64) -> Self {
        self.id = MembershipId::new(id);
        self
    }

    pub fn with_member_id(mut self, id: u64) -> Self {
        self.member_id = MemberId::new(id);
        self
    }

    pub fn with_price(mut self, price: Money) -> Self {
        self.price = price;
        self
    }

    pub fn with_division(mut self, division: u32) -> Self {
        self.division = division;
        self
    }

    pub fn with_dates(mut self, started_on: NaiveDate, ended_on: NaiveDate) -> Self {
        self.started_on = started_on;
        self.ended_on = ended_on;
        self
    }

    /// Replaces the default weekly deliveries
    pub fn with_deliveries(mut self, deliveries: Vec<NaiveDate>) -> Self {
        self.deliveries = Some(deliveries);
        self
    }

    pub fn with_trial_deliveries(mut self, count: u32) -> Self {
        self.trial_deliveries = count;
        self
    }

    pub fn salary_basket(mut self) -> Self {
        self.salary_basket = true;
        self
    }

    pub fn build(self) -> Membership {
        // Weekly deliveries start on the first Tuesday of the membership
        let deliveries = self.deliveries.unwrap_or_else(|| {
            let offset = (Weekday::Tue.num_days_from_monday() + 7
                - self.started_on.weekday().num_days_from_monday())
                % 7;
            let first = self.started_on + Duration::days(i64::from(offset));
            DateFixtures::weekly_deliveries(first, self.ended_on)
        });
        let membership = Membership::new(
            self.id,
            self.member_id,
            self.price,
            self.division,
            self.started_on,
            self.ended_on,
        )
        .with_deliveries(deliveries)
        .with_trial_deliveries(self.trial_deliveries);
        if self.salary_basket {
            membership.with_salary_basket()
        } else {
            membership
        }
    }
}

/// Builder for invoices carrying a single item
pub struct InvoiceBuilder {
    id: InvoiceId,
    member_id: MemberId,
    date: NaiveDate,
    amount: Decimal,
    currency: Currency,
    entity: InvoiceEntity,
    open: bool,
    canceled: bool,
}

impl Default for InvoiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl InvoiceBuilder {
    pub fn new() -> Self {
        Self {
            id: InvoiceId::new(706),
            member_id: MemberId::new(42),
            date: DateFixtures::fy_2024_start(),
            amount: MoneyFixtures::chf_200().amount(),
            currency: Currency::CHF,
            entity: InvoiceEntity::new(EntityKind::Other, None),
            open: true,
            canceled: false,
        }
    }

    pub fn with_id(mut self, id: u64) -> Self {
        self.id = InvoiceId::new(id);
        self
    }

    pub fn with_member_id(mut self, id: u64) -> Self {
        self.member_id = MemberId::new(id);
        self
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = date;
        self
    }

    pub fn with_amount(mut self, amount: Decimal) -> Self {
        self.amount = amount;
        self
    }

    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.currency = currency;
        self
    }

    /// Keeps the invoice in the processing state
    pub fn processing(mut self) -> Self {
        self.open = false;
        self
    }

    pub fn canceled(mut self) -> Self {
        self.canceled = true;
        self
    }

    pub fn build(self) -> Invoice {
        let mut invoice = Invoice::new(self.id, self.member_id, self.date, self.currency, self.entity)
            .with_item(InvoiceItem::new("Panier", Money::new(self.amount, self.currency)))
            .expect("item invoices accept items");
        if self.open || self.canceled {
            invoice.open(Utc::now()).expect("processing invoice opens");
        }
        if self.canceled {
            invoice.cancel(Utc::now()).expect("open invoice cancels");
        }
        invoice
    }
}

/// Builder for stored payments
pub struct PaymentBuilder {
    id: PaymentId,
    member_id: MemberId,
    invoice_id: Option<InvoiceId>,
    amount: Decimal,
    currency: Currency,
    date: NaiveDate,
    origin: PaymentOrigin,
}

impl Default for PaymentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PaymentBuilder {
    pub fn new() -> Self {
        Self {
            id: PaymentId::new(1),
            member_id: MemberId::new(42),
            invoice_id: None,
            amount: MoneyFixtures::chf_200().amount(),
            currency: Currency::CHF,
            date: DateFixtures::date(2024, 2, 1),
            origin: PaymentOrigin::Manual,
        }
    }

    pub fn with_id(mut self, id: u64) -> Self {
        self.id = PaymentId::new(id);
        self
    }

    pub fn with_member_id(mut self, id: u64) -> Self {
        self.member_id = MemberId::new(id);
        self
    }

    pub fn for_invoice(mut self, id: u64) -> Self {
        self.invoice_id = Some(InvoiceId::new(id));
        self
    }

    pub fn with_amount(mut self, amount: Decimal) -> Self {
        self.amount = amount;
        self
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = date;
        self
    }

    pub fn with_origin(mut self, origin: PaymentOrigin) -> Self {
        self.origin = origin;
        self
    }

    /// Payment data as a source would report it
    pub fn data(&self) -> PaymentData {
        PaymentData::new(
            Some(self.member_id),
            self.invoice_id,
            Money::new(self.amount, self.currency),
            self.date,
            self.origin.clone(),
        )
    }

    pub fn build(self) -> Payment {
        Payment::from_data(self.id, self.member_id, &self.data())
    }
}

/// In-memory repository pre-populated with members, memberships and invoices
#[derive(Default)]
pub struct ScenarioBuilder {
    members: Vec<Member>,
    memberships: Vec<Membership>,
    invoices: Vec<Invoice>,
    payments: Vec<Payment>,
}

impl ScenarioBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn member(mut self, member: Member) -> Self {
        self.members.push(member);
        self
    }

    pub fn membership(mut self, membership: Membership) -> Self {
        self.memberships.push(membership);
        self
    }

    pub fn invoice(mut self, invoice: Invoice) -> Self {
        self.invoices.push(invoice);
        self
    }

    pub fn payment(mut self, payment: Payment) -> Self {
        self.payments.push(payment);
        self
    }

    pub async fn build(self) -> InMemoryBillingRepository {
        use domain_billing::BillingRepository;

        let repository = InMemoryBillingRepository::new();
        for member in self.members {
            repository.insert_member(member).await;
        }
        for membership in self.memberships {
            repository.insert_membership(membership).await;
        }
        for invoice in self.invoices {
            repository.save_invoice(invoice).await.expect("invoice stored");
        }
        for payment in self.payments {
            repository.save_payment(payment).await.expect("payment stored");
        }
        repository
    }
}
