//! Operator commands
//!
//! Each command renders its result as text for stdout so the binary stays a
//! thin shell around [`run`].

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use tracing::{debug, info};

use core_kernel::{FiscalYear, InvoiceId, MemberId, Money, OrgConfig, PostalAddress};
use domain_billing::{
    EntityKind, Invoice, InvoiceEntity, InvoiceItem, Member, PeriodCalculator, ReferenceCode, ReferenceCodec,
};
use infra_bank::{parse_statement, qr_bill_payload};

#[derive(Debug, Parser)]
#[command(name = "csa-billing")]
#[command(version, about = "Billing tools for community supported agriculture", long_about = None)]
pub struct Cli {
    /// Configuration file (default: billing.toml when present)
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Build or read payment references
    #[command(subcommand)]
    Reference(ReferenceCommand),

    /// List the billing periods of a fiscal year
    Periods {
        /// Billing year division: 1, 2, 3, 4 or 12
        #[arg(short, long)]
        division: u32,

        /// Calendar year the fiscal year starts in (default: current)
        #[arg(short, long)]
        year: Option<i32>,
    },

    /// Read bank statements
    #[command(subcommand)]
    Statement(StatementCommand),

    /// Print the Swiss QR-bill payload of an invoice
    QrPayload(QrPayloadArgs),
}

#[derive(Debug, Subcommand)]
pub enum ReferenceCommand {
    /// Reference for a member and invoice
    Encode {
        #[arg(short, long)]
        member: MemberId,
        #[arg(short, long)]
        invoice: InvoiceId,
    },
    /// Member and invoice carried by a reference
    Decode { reference: String },
}

#[derive(Debug, Subcommand)]
pub enum StatementCommand {
    /// Print the payments of a camt.053/054 or MT940 file as JSON
    Parse { file: PathBuf },
}

#[derive(Debug, Args)]
pub struct QrPayloadArgs {
    #[arg(long)]
    pub member: MemberId,
    #[arg(long)]
    pub invoice: InvoiceId,
    /// Amount due
    #[arg(long)]
    pub amount: Decimal,
    /// Invoice date (default: today)
    #[arg(long)]
    pub date: Option<NaiveDate>,
    #[arg(long)]
    pub debtor_name: String,
    #[arg(long, default_value = "")]
    pub debtor_street: String,
    #[arg(long, default_value = "")]
    pub debtor_zip: String,
    #[arg(long, default_value = "")]
    pub debtor_city: String,
    #[arg(long, default_value = "CH")]
    pub debtor_country: String,
}

/// Runs a command and returns what to print
pub fn run(command: Command, org: &OrgConfig) -> anyhow::Result<String> {
    match command {
        Command::Reference(ReferenceCommand::Encode { member, invoice }) => encode_reference(org, member, invoice),
        Command::Reference(ReferenceCommand::Decode { reference }) => decode_reference(org, &reference),
        Command::Periods { division, year } => periods(org, division, year),
        Command::Statement(StatementCommand::Parse { file }) => statement(org, &file),
        Command::QrPayload(args) => qr_payload(org, args),
    }
}

fn encode_reference(org: &OrgConfig, member: MemberId, invoice: InvoiceId) -> anyhow::Result<String> {
    let codec = ReferenceCodec::for_org(org)?;
    let reference = codec.encode(ReferenceCode::new(member, invoice))?;
    Ok(format!("{}\n{}", reference, codec.formatted(&reference)))
}

fn decode_reference(org: &OrgConfig, reference: &str) -> anyhow::Result<String> {
    let codec = ReferenceCodec::for_org(org)?;
    match codec.payload(reference) {
        Some(code) => Ok(format!("member {}\ninvoice {}", code.member_id, code.invoice_id)),
        None => bail!("{:?} is not a valid payment reference", reference),
    }
}

fn periods(org: &OrgConfig, division: u32, year: Option<i32>) -> anyhow::Result<String> {
    let fiscal_year = match year {
        Some(year) => FiscalYear::new(year, org.fiscal_year_start_month)?,
        None => org.fiscal_year(org.today())?,
    };
    let lines: Vec<String> = PeriodCalculator::build(fiscal_year, division)?
        .iter()
        .enumerate()
        .map(|(index, period)| format!("#{} {} {}", index + 1, period.begin, period.last_day()))
        .collect();
    debug!(%fiscal_year, division, "Periods listed");
    Ok(lines.join("\n"))
}

fn statement(org: &OrgConfig, file: &Path) -> anyhow::Result<String> {
    let content = std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
    let payments = parse_statement(&content, org).with_context(|| format!("parsing {}", file.display()))?;
    info!(file = %file.display(), payments = payments.len(), "Statement parsed");
    Ok(serde_json::to_string_pretty(&payments)?)
}

fn qr_payload(org: &OrgConfig, args: QrPayloadArgs) -> anyhow::Result<String> {
    let date = args.date.unwrap_or_else(|| org.today());
    let member_id = args.member;
    let member = Member::new(member_id, args.debtor_name, date).with_address(PostalAddress {
        street: args.debtor_street,
        zip: args.debtor_zip,
        city: args.debtor_city,
        country_code: args.debtor_country,
    });

    let mut invoice = Invoice::new(
        args.invoice,
        member_id,
        date,
        org.currency,
        InvoiceEntity::new(EntityKind::Other, None),
    )
    .with_item(InvoiceItem::new(
        format!("Invoice {}", args.invoice),
        Money::new(args.amount, org.currency),
    ))?;
    invoice.open(Utc::now())?;

    Ok(qr_bill_payload(org, &invoice, &member)?)
}
