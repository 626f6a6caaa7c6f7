//! SWIFT MT940 statement reader
//!
//! Each `:61:` statement line is paired with the `:86:` narrative that
//! follows it; the payment reference is searched in that narrative.
//! Supported tags: `:20:`, `:25:`, `:28C:`, `:60F:`/`:60M:`, `:61:`, `:86:`,
//! `:62F:`/`:62M:`, `:64:`, `:65:`. Unknown tags are ignored. A `:86:` after
//! the closing balances carries information to the account owner and is
//! skipped.

use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use tracing::{debug, instrument, warn};

use core_kernel::{Currency, Money, OrgConfig};
use domain_billing::{PaymentData, PaymentOrigin, ReferenceCodec};

use crate::error::{BankError, Result};
use crate::statement::{log_skipped, resolve_reference, StatementParser};

/// `:61:` value date, optional entry date, mark, optional funds code,
/// amount, transaction type, customer reference, `//` bank reference
static STATEMENT_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^:61:(?P<val>\d{6})(?P<book>\d{4})?(?P<mark>R?[CD])(?P<funds>[A-Z])?(?P<amt>\d+,\d{0,2})(?P<tx>[A-Z][A-Z0-9]{3})(?P<reference>[^/]*)(?://(?P<bank>.*))?$",
    )
    .expect(":61: pattern compiles")
});

/// One `:61:` line with its narrative
#[derive(Debug, Clone)]
struct StatementLine {
    date: NaiveDate,
    amount: Decimal,
    currency: Option<String>,
    bank_reference: Option<String>,
    customer_reference: Option<String>,
    narrative: String,
}

/// An MT940 statement read into statement lines
pub struct Mt940Parser {
    codec: ReferenceCodec,
    currency: Currency,
    lines: Vec<StatementLine>,
}

impl Mt940Parser {
    /// Reads the whole statement
    ///
    /// # Errors
    ///
    /// Returns `BankError::UnsupportedFile` naming the offending line when a
    /// `:61:` line is malformed or a `:86:` narrative follows neither a
    /// `:61:` line nor the closing balances.
    #[instrument(skip_all)]
    pub fn new(content: &str, org: &OrgConfig) -> Result<Self> {
        let codec = ReferenceCodec::for_org(org)?;
        let lines = read_lines(content)?;
        debug!(lines = lines.len(), "MT940 statement read");
        Ok(Self {
            codec,
            currency: org.currency,
            lines,
        })
    }
}

impl StatementParser for Mt940Parser {
    fn payments_data(&self) -> Result<Vec<PaymentData>> {
        let mut payments = Vec::new();
        for (index, line) in self.lines.iter().enumerate() {
            let Some(code) = resolve_reference(
                &self.codec,
                line.customer_reference.as_deref(),
                [line.narrative.as_str()],
            ) else {
                log_skipped("no valid reference", index);
                continue;
            };

            let currency = match line.currency.as_deref().map(Currency::from_str) {
                Some(Ok(currency)) if currency == self.currency => currency,
                None => self.currency,
                _ => {
                    warn!(entry = index, currency = ?line.currency, "Statement currency differs from the organization currency");
                    continue;
                }
            };

            let mut data = PaymentData::new(
                Some(code.member_id),
                Some(code.invoice_id),
                Money::new(line.amount, currency),
                line.date,
                PaymentOrigin::Mt940,
            );
            if let Some(reference) = &line.bank_reference {
                data = data.with_fingerprint(reference.clone());
            }
            payments.push(data);
        }
        debug!(payments = payments.len(), "MT940 payments extracted");
        Ok(payments)
    }
}

fn read_lines(content: &str) -> Result<Vec<StatementLine>> {
    let mut lines: Vec<StatementLine> = Vec::new();
    let mut currency: Option<String> = None;
    let mut awaiting_narrative = false;
    let mut in_narrative = false;
    let mut after_closing_balance = false;

    for raw in content.lines() {
        let line = raw.trim_end();
        if line.is_empty() || line.starts_with('-') || line.starts_with('{') {
            in_narrative = false;
            continue;
        }

        if let Some(rest) = line.strip_prefix(":20:") {
            debug!(statement = rest.trim(), "MT940 statement");
            currency = None;
            awaiting_narrative = false;
            in_narrative = false;
            after_closing_balance = false;
        } else if let Some(balance) = line.strip_prefix(":60F:").or_else(|| line.strip_prefix(":60M:")) {
            // Mark, YYMMDD, currency, amount
            currency = balance.get(7..10).map(str::to_string);
            awaiting_narrative = false;
            in_narrative = false;
            after_closing_balance = false;
        } else if line.starts_with(":61:") {
            lines.push(parse_statement_line(line, currency.clone())?);
            awaiting_narrative = true;
            in_narrative = false;
            after_closing_balance = false;
        } else if let Some(text) = line.strip_prefix(":86:") {
            if awaiting_narrative {
                if let Some(last) = lines.last_mut() {
                    last.narrative = text.trim().to_string();
                }
                in_narrative = true;
            } else if after_closing_balance {
                debug!(information = text.trim(), "MT940 information to account owner skipped");
                in_narrative = false;
            } else {
                return Err(BankError::unsupported(format!(":86: without :61:: {}", line)));
            }
            awaiting_narrative = false;
        } else if [":62F:", ":62M:", ":64:", ":65:"].iter().any(|tag| line.starts_with(tag)) {
            awaiting_narrative = false;
            in_narrative = false;
            after_closing_balance = true;
        } else if line.starts_with(':') {
            awaiting_narrative = false;
            in_narrative = false;
            after_closing_balance = false;
        } else if in_narrative {
            if let Some(last) = lines.last_mut() {
                last.narrative.push(' ');
                last.narrative.push_str(line.trim());
            }
        }
    }
    Ok(lines)
}

fn parse_statement_line(line: &str, currency: Option<String>) -> Result<StatementLine> {
    let malformed = || BankError::unsupported(format!("malformed :61: line: {}", line));
    let captures = STATEMENT_LINE.captures(line).ok_or_else(malformed)?;

    let value_date = captures
        .name("val")
        .and_then(|m| NaiveDate::parse_from_str(m.as_str(), "%y%m%d").ok())
        .ok_or_else(malformed)?;
    let date = match captures.name("book") {
        Some(book) => entry_date(value_date, book.as_str()).ok_or_else(malformed)?,
        None => value_date,
    };

    let amount_text = captures.name("amt").map(|m| m.as_str()).ok_or_else(malformed)?;
    let amount = Decimal::from_str(amount_text.replace(',', ".").trim_end_matches('.')).map_err(|_| malformed())?;

    // RC reverses a credit, RD a debit
    let signed = match captures.name("mark").map(|m| m.as_str()) {
        Some("C") | Some("RD") => amount,
        Some("D") | Some("RC") => -amount,
        _ => return Err(malformed()),
    };

    let customer_reference = captures
        .name("reference")
        .map(|m| m.as_str().trim().to_string())
        .filter(|reference| !reference.is_empty() && reference != "NONREF");
    let bank_reference = captures
        .name("bank")
        .map(|m| m.as_str().trim().to_string())
        .filter(|reference| !reference.is_empty());

    Ok(StatementLine {
        date,
        amount: signed,
        currency,
        bank_reference,
        customer_reference,
        narrative: String::new(),
    })
}

/// Entry date (MMDD) in the year closest to the value date
fn entry_date(value_date: NaiveDate, month_day: &str) -> Option<NaiveDate> {
    let month: u32 = month_day.get(..2)?.parse().ok()?;
    let day: u32 = month_day.get(2..4)?.parse().ok()?;
    let year = match (value_date.month(), month) {
        (12, 1) => value_date.year() + 1,
        (1, 12) => value_date.year() - 1,
        _ => value_date.year(),
    };
    NaiveDate::from_ymd_opt(year, month, day)
}
