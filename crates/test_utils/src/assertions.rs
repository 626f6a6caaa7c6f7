//! Custom Test Assertions
//!
//! Provides specialized assertion helpers for billing types that give
//! more meaningful error messages than standard assertions.

use core_kernel::{InvoiceId, Money};
use domain_billing::{Invoice, InvoiceState, Payment, Projection};
use rust_decimal::Decimal;

/// Asserts that two Money values are approximately equal within a tolerance
///
/// # Panics
///
/// Panics if the currencies don't match or the amounts differ by more than tolerance
pub fn assert_money_approx_eq(actual: &Money, expected: &Money, tolerance: Decimal) {
    assert_eq!(
        actual.currency(),
        expected.currency(),
        "Currency mismatch: actual={}, expected={}",
        actual.currency(),
        expected.currency()
    );

    let diff = (actual.amount() - expected.amount()).abs();
    assert!(
        diff <= tolerance,
        "Money amounts differ by more than tolerance: actual={}, expected={}, diff={}, tolerance={}",
        actual.amount(),
        expected.amount(),
        diff,
        tolerance
    );
}

/// Asserts that a Money value is zero
pub fn assert_money_zero(money: &Money) {
    assert!(
        money.is_zero(),
        "Expected zero money, got {} {}",
        money.currency().symbol(),
        money.amount()
    );
}

/// Asserts that an amount is a multiple of its currency's rounding increment
pub fn assert_money_rounded(money: &Money) {
    assert!(
        money.is_rounded(),
        "Expected {} to be rounded to {}",
        money,
        money.currency().rounding_increment()
    );
}

fn find(invoices: &[Invoice], id: u64) -> &Invoice {
    invoices
        .iter()
        .find(|invoice| invoice.id == InvoiceId::new(id))
        .unwrap_or_else(|| panic!("Invoice {} not found", id))
}

/// Asserts the state and paid amount of an invoice
///
/// # Arguments
///
/// * `invoices` - Invoices to search
/// * `id` - Raw invoice id
/// * `state` - Expected state
/// * `paid` - Expected paid amount
pub fn assert_invoice(invoices: &[Invoice], id: u64, state: InvoiceState, paid: Decimal) {
    let invoice = find(invoices, id);
    assert_eq!(
        invoice.state, state,
        "Invoice {} state: expected {:?}, got {:?}",
        id, state, invoice.state
    );
    assert_eq!(
        invoice.paid_amount.amount(),
        paid,
        "Invoice {} paid amount: expected {}, got {}",
        id,
        paid,
        invoice.paid_amount.amount()
    );
}

/// Asserts that live invoices absorb exactly the active payments.
///
/// Holds whenever the member has at least one non-canceled invoice.
pub fn assert_payments_conserved(invoices: &[Invoice], payments: &[Payment]) {
    let paid: Decimal = invoices
        .iter()
        .filter(|invoice| !invoice.is_canceled())
        .map(|invoice| invoice.paid_amount.amount())
        .sum();
    let pooled: Decimal = payments
        .iter()
        .filter(|payment| payment.is_active())
        .map(|payment| payment.amount.amount())
        .sum();
    assert_eq!(
        paid, pooled,
        "Paid amounts ({}) differ from the payment pool ({})",
        paid, pooled
    );

    for invoice in invoices.iter().filter(|invoice| invoice.is_canceled()) {
        assert!(
            invoice.paid_amount.is_zero(),
            "Canceled invoice {} keeps a paid amount of {}",
            invoice.id,
            invoice.paid_amount
        );
    }
}

/// Asserts that a projection sums to the expected total
pub fn assert_projection_total(projection: &Projection, expected: Decimal) {
    let total: Decimal = projection.values().copied().sum();
    assert_eq!(
        total, expected,
        "Projection sums to {}, expected {}: {:?}",
        total, expected, projection
    );
}
