//! SEPA direct-debit export (pain.008.001.02)
//!
//! Open invoices of members who signed a mandate are collected in a single
//! `PmtInf` block: core scheme, one-off sequence, batch booking.

use std::io::Write;

use chrono::{DateTime, NaiveDate, Utc};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use rust_decimal::Decimal;
use tracing::{debug, instrument};

use core_kernel::OrgConfig;
use domain_billing::{CreditorReference, Invoice, InvoiceState, ReferenceCode, SepaMetadata};

use crate::error::{BankError, Result};

const PAIN_008_NAMESPACE: &str = "urn:iso:std:iso:20022:tech:xsd:pain.008.001.02";
const NOT_PROVIDED: &str = "NOTPROVIDED";

/// One collected invoice
struct Collection<'a> {
    invoice: &'a Invoice,
    mandate: &'a SepaMetadata,
    due: Decimal,
    end_to_end_id: String,
}

/// Writes pain.008 direct-debit files for an organization
pub struct SepaDirectDebit<'a> {
    org: &'a OrgConfig,
}

impl<'a> SepaDirectDebit<'a> {
    pub fn new(org: &'a OrgConfig) -> Self {
        Self { org }
    }

    /// Builds the pain.008 document for the collectible invoices.
    ///
    /// An invoice is collectible when it is open, carries mandate data and
    /// still has an amount due.
    ///
    /// # Returns
    ///
    /// `None` when no invoice is collectible.
    ///
    /// # Errors
    ///
    /// `BankError::Configuration` when the organization has no SEPA creditor
    /// identifier, `BankError::Reference` when an id cannot be encoded.
    #[instrument(skip_all, fields(invoices = invoices.len(), %collection_date))]
    pub fn xml(
        &self,
        invoices: &[Invoice],
        collection_date: NaiveDate,
        created_at: DateTime<Utc>,
    ) -> Result<Option<String>> {
        let collections = collectible(invoices)?;
        if collections.is_empty() {
            debug!("No invoice to collect");
            return Ok(None);
        }

        let creditor_id = self
            .org
            .creditor
            .sepa_creditor_identifier
            .as_deref()
            .ok_or_else(|| BankError::Configuration("SEPA creditor identifier is not set".to_string()))?;

        let message_id = created_at.format("CSA%Y%m%d%H%M%S").to_string();
        let header = Header {
            message_id: &message_id,
            created_at: created_at.format("%Y-%m-%dT%H:%M:%S").to_string(),
            transactions: collections.len().to_string(),
            control_sum: amount(collections.iter().map(|c| c.due).sum()),
            creditor_id,
            collection_date: collection_date.format("%Y-%m-%d").to_string(),
        };

        let mut buffer = Vec::new();
        self.write_document(&mut buffer, &header, &collections).map_err(BankError::xml)?;
        let document = String::from_utf8(buffer).map_err(BankError::xml)?;

        debug!(transactions = collections.len(), "pain.008 written");
        Ok(Some(document))
    }

    fn write_document<W: Write>(
        &self,
        out: W,
        header: &Header<'_>,
        collections: &[Collection<'_>],
    ) -> quick_xml::Result<()> {
        let mut wr = Writer::new_with_indent(out, b' ', 2);
        let creditor = &self.org.creditor;

        wr.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        wr.write_event(Event::Start(
            BytesStart::new("Document").with_attributes([("xmlns", PAIN_008_NAMESPACE)]),
        ))?;
        open(&mut wr, "CstmrDrctDbtInitn")?;

        open(&mut wr, "GrpHdr")?;
        leaf(&mut wr, "MsgId", header.message_id)?;
        leaf(&mut wr, "CreDtTm", &header.created_at)?;
        leaf(&mut wr, "NbOfTxs", &header.transactions)?;
        leaf(&mut wr, "CtrlSum", &header.control_sum)?;
        open(&mut wr, "InitgPty")?;
        leaf(&mut wr, "Nm", &creditor.name)?;
        open(&mut wr, "Id")?;
        open(&mut wr, "OrgId")?;
        open(&mut wr, "Othr")?;
        leaf(&mut wr, "Id", header.creditor_id)?;
        close(&mut wr, "Othr")?;
        close(&mut wr, "OrgId")?;
        close(&mut wr, "Id")?;
        close(&mut wr, "InitgPty")?;
        close(&mut wr, "GrpHdr")?;

        open(&mut wr, "PmtInf")?;
        leaf(&mut wr, "PmtInfId", header.message_id)?;
        leaf(&mut wr, "PmtMtd", "DD")?;
        leaf(&mut wr, "BtchBookg", "true")?;
        leaf(&mut wr, "NbOfTxs", &header.transactions)?;
        leaf(&mut wr, "CtrlSum", &header.control_sum)?;
        open(&mut wr, "PmtTpInf")?;
        open(&mut wr, "SvcLvl")?;
        leaf(&mut wr, "Cd", "SEPA")?;
        close(&mut wr, "SvcLvl")?;
        open(&mut wr, "LclInstrm")?;
        leaf(&mut wr, "Cd", "CORE")?;
        close(&mut wr, "LclInstrm")?;
        leaf(&mut wr, "SeqTp", "OOFF")?;
        close(&mut wr, "PmtTpInf")?;
        leaf(&mut wr, "ReqdColltnDt", &header.collection_date)?;
        open(&mut wr, "Cdtr")?;
        leaf(&mut wr, "Nm", &creditor.name)?;
        close(&mut wr, "Cdtr")?;
        account(&mut wr, "CdtrAcct", &creditor.iban)?;
        agent(&mut wr, "CdtrAgt")?;
        leaf(&mut wr, "ChrgBr", "SLEV")?;
        open(&mut wr, "CdtrSchmeId")?;
        open(&mut wr, "Id")?;
        open(&mut wr, "PrvtId")?;
        open(&mut wr, "Othr")?;
        leaf(&mut wr, "Id", header.creditor_id)?;
        open(&mut wr, "SchmeNm")?;
        leaf(&mut wr, "Prtry", "SEPA")?;
        close(&mut wr, "SchmeNm")?;
        close(&mut wr, "Othr")?;
        close(&mut wr, "PrvtId")?;
        close(&mut wr, "Id")?;
        close(&mut wr, "CdtrSchmeId")?;

        for collection in collections {
            write_transaction(&mut wr, collection)?;
        }

        close(&mut wr, "PmtInf")?;
        close(&mut wr, "CstmrDrctDbtInitn")?;
        close(&mut wr, "Document")
    }
}

struct Header<'a> {
    message_id: &'a str,
    created_at: String,
    transactions: String,
    control_sum: String,
    creditor_id: &'a str,
    collection_date: String,
}

fn collectible(invoices: &[Invoice]) -> Result<Vec<Collection<'_>>> {
    let mut collections = Vec::new();
    for invoice in invoices {
        let Some(mandate) = invoice.sepa_metadata.as_ref() else {
            continue;
        };
        if invoice.state != InvoiceState::Open {
            continue;
        }
        let due = invoice.missing_amount().map_err(|e| BankError::Configuration(e.to_string()))?;
        if !due.is_positive() {
            continue;
        }
        let end_to_end_id = CreditorReference::encode(ReferenceCode::new(invoice.member_id, invoice.id))?;
        collections.push(Collection {
            invoice,
            mandate,
            due: due.amount(),
            end_to_end_id,
        });
    }
    Ok(collections)
}

fn write_transaction<W: Write>(wr: &mut Writer<W>, collection: &Collection<'_>) -> quick_xml::Result<()> {
    let invoice = collection.invoice;
    let mandate = collection.mandate;

    open(wr, "DrctDbtTxInf")?;
    open(wr, "PmtId")?;
    leaf(wr, "InstrId", &format!("{}-{}", invoice.member_id, invoice.id))?;
    leaf(wr, "EndToEndId", &collection.end_to_end_id)?;
    close(wr, "PmtId")?;
    wr.write_event(Event::Start(
        BytesStart::new("InstdAmt").with_attributes([("Ccy", invoice.currency.code())]),
    ))?;
    wr.write_event(Event::Text(BytesText::new(&amount(collection.due))))?;
    close(wr, "InstdAmt")?;
    open(wr, "DrctDbtTx")?;
    open(wr, "MndtRltdInf")?;
    leaf(wr, "MndtId", &mandate.mandate_id)?;
    leaf(wr, "DtOfSgntr", &mandate.mandate_signed_on.format("%Y-%m-%d").to_string())?;
    close(wr, "MndtRltdInf")?;
    close(wr, "DrctDbtTx")?;
    agent(wr, "DbtrAgt")?;
    open(wr, "Dbtr")?;
    leaf(wr, "Nm", &mandate.debtor_name)?;
    close(wr, "Dbtr")?;
    account(wr, "DbtrAcct", &mandate.debtor_iban)?;
    open(wr, "RmtInf")?;
    leaf(wr, "Ustrd", &format!("Invoice {}", invoice.id))?;
    close(wr, "RmtInf")?;
    close(wr, "DrctDbtTxInf")
}

fn amount(value: Decimal) -> String {
    format!("{:.2}", value)
}

fn open<W: Write>(wr: &mut Writer<W>, name: &str) -> quick_xml::Result<()> {
    wr.write_event(Event::Start(BytesStart::new(name)))
}

fn close<W: Write>(wr: &mut Writer<W>, name: &str) -> quick_xml::Result<()> {
    wr.write_event(Event::End(BytesEnd::new(name)))
}

fn leaf<W: Write>(wr: &mut Writer<W>, name: &str, text: &str) -> quick_xml::Result<()> {
    open(wr, name)?;
    wr.write_event(Event::Text(BytesText::new(text)))?;
    close(wr, name)
}

fn account<W: Write>(wr: &mut Writer<W>, name: &str, iban: &str) -> quick_xml::Result<()> {
    open(wr, name)?;
    open(wr, "Id")?;
    leaf(wr, "IBAN", iban)?;
    close(wr, "Id")?;
    close(wr, name)
}

// BIC is optional for SEPA core since 2016
fn agent<W: Write>(wr: &mut Writer<W>, name: &str) -> quick_xml::Result<()> {
    open(wr, name)?;
    open(wr, "FinInstnId")?;
    open(wr, "Othr")?;
    leaf(wr, "Id", NOT_PROVIDED)?;
    close(wr, "Othr")?;
    close(wr, "FinInstnId")?;
    close(wr, name)
}
