//! Property-Based Test Generators
//!
//! Provides proptest strategies for generating random test data
//! that maintains domain invariants.

use core_kernel::{Currency, InvoiceId, MemberId, Money};
use domain_billing::ReferenceCode;
use proptest::prelude::*;
use rust_decimal::Decimal;

/// Largest id a payment reference can carry
pub const MAX_ID: u64 = 99_999_999;

/// Strategy for ids that fit in a payment reference
pub fn reference_id_strategy() -> impl Strategy<Value = u64> {
    prop_oneof![
        1 => Just(1u64),
        1 => Just(MAX_ID),
        8 => 1u64..=MAX_ID,
    ]
}

/// Strategy for (member, invoice) reference codes
pub fn reference_code_strategy() -> impl Strategy<Value = ReferenceCode> {
    (reference_id_strategy(), reference_id_strategy())
        .prop_map(|(member, invoice)| ReferenceCode::new(MemberId::new(member), InvoiceId::new(invoice)))
}

/// Strategy for Swiss bank reference prefixes (up to 9 digits)
pub fn bank_reference_strategy() -> impl Strategy<Value = Option<String>> {
    prop::option::of("[0-9]{1,9}")
}

/// Strategy for supported billing year divisions
pub fn division_strategy() -> impl Strategy<Value = u32> {
    prop::sample::select(vec![1u32, 2, 3, 4, 12])
}

/// Strategy for fiscal year start months
pub fn fiscal_year_start_month_strategy() -> impl Strategy<Value = u32> {
    1u32..=12u32
}

/// Strategy for membership prices in CHF, already rounded to 5 cents
pub fn chf_price_strategy() -> impl Strategy<Value = Money> {
    (1i64..=40_000i64).prop_map(|steps| Money::new(Decimal::new(steps * 5, 2), Currency::CHF))
}

/// Strategy for payment amounts in CHF (refunds included)
pub fn chf_payment_strategy() -> impl Strategy<Value = Money> {
    prop_oneof![
        4 => (1i64..=50_000i64).prop_map(|cents| Money::from_minor(cents, Currency::CHF)),
        1 => (-20_000i64..=-1i64).prop_map(|cents| Money::from_minor(cents, Currency::CHF)),
    ]
}

/// Strategy for invoice amounts in CHF, paybacks included
pub fn chf_invoice_amount_strategy() -> impl Strategy<Value = Decimal> {
    prop_oneof![
        5 => (0i64..=10_000i64).prop_map(|steps| Decimal::new(steps * 5, 2)),
        1 => (-2_000i64..=-1i64).prop_map(|steps| Decimal::new(steps * 5, 2)),
    ]
}
