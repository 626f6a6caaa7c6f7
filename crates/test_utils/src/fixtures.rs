//! Pre-built Test Fixtures
//!
//! Provides ready-to-use test data for the billing test suite: organization
//! settings, amounts, dates and sample bank statements whose references
//! resolve to known members and invoices.

use chrono::NaiveDate;
use core_kernel::{
    BillingSettings, CreditorIdentity, Currency, Money, OrgConfig, PostalAddress, Timezone,
};
use once_cell::sync::Lazy;
use rust_decimal_macros::dec;

/// Swiss organization shared by read-only tests
pub static SWISS_ORG: Lazy<OrgConfig> = Lazy::new(OrgFixtures::swiss);

/// Fixture for organization settings
pub struct OrgFixtures;

impl OrgFixtures {
    /// Swiss organization: CHF, QR references without bank prefix,
    /// calendar fiscal year, billing from the first delivery
    pub fn swiss() -> OrgConfig {
        OrgConfig {
            name: "Rage de Vert".to_string(),
            fiscal_year_start_month: 1,
            currency: Currency::CHF,
            country_code: "CH".to_string(),
            timezone: Timezone::default(),
            creditor: CreditorIdentity {
                name: "Rage de Vert".to_string(),
                iban: "CH4431999123000889012".to_string(),
                address: PostalAddress {
                    street: "Rue de la Gare 12".to_string(),
                    zip: "2000".to_string(),
                    city: "Neuchâtel".to_string(),
                    country_code: "CH".to_string(),
                },
                sepa_creditor_identifier: None,
                bank_reference: None,
            },
            billing: BillingSettings::default(),
        }
    }

    /// Swiss organization whose bank prefixes references with "123456"
    pub fn swiss_with_bank_reference() -> OrgConfig {
        let mut org = Self::swiss();
        org.creditor.bank_reference = Some("123456".to_string());
        org
    }

    /// German organization: EUR, RF references, SEPA direct debit
    pub fn german() -> OrgConfig {
        OrgConfig {
            name: "Gemüsekooperative".to_string(),
            fiscal_year_start_month: 1,
            currency: Currency::EUR,
            country_code: "DE".to_string(),
            timezone: Timezone::new(chrono_tz::Europe::Berlin),
            creditor: CreditorIdentity {
                name: "Gemüsekooperative eG".to_string(),
                iban: "DE89370400440532013000".to_string(),
                address: PostalAddress {
                    street: "Feldweg 3".to_string(),
                    zip: "79098".to_string(),
                    city: "Freiburg".to_string(),
                    country_code: "DE".to_string(),
                },
                sepa_creditor_identifier: Some("DE98ZZZ09999999999".to_string()),
                bank_reference: None,
            },
            billing: BillingSettings::default(),
        }
    }

    /// Swiss organization whose fiscal year starts in April
    pub fn swiss_april_fiscal_year() -> OrgConfig {
        let mut org = Self::swiss();
        org.fiscal_year_start_month = 4;
        org
    }
}

/// Fixture for Money test data
pub struct MoneyFixtures;

impl MoneyFixtures {
    /// Yearly basket price used by most scenarios
    pub fn chf_200() -> Money {
        Money::new(dec!(200.00), Currency::CHF)
    }

    pub fn chf_zero() -> Money {
        Money::zero(Currency::CHF)
    }

    /// Creates a EUR amount for currency mismatch tests
    pub fn eur_100() -> Money {
        Money::new(dec!(100.00), Currency::EUR)
    }

    /// Default annual fee
    pub fn chf_annual_fee() -> Money {
        Money::new(dec!(30.00), Currency::CHF)
    }
}

/// Fixture for temporal test data
pub struct DateFixtures;

impl DateFixtures {
    /// Start of the 2024 fiscal year (a Monday)
    pub fn fy_2024_start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    pub fn fy_2024_end() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()
    }

    /// Weekly Tuesday deliveries from `first` until `last`
    pub fn weekly_deliveries(first: NaiveDate, last: NaiveDate) -> Vec<NaiveDate> {
        first
            .iter_weeks()
            .take_while(|date| *date <= last)
            .collect()
    }

    pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }
}

/// Sample bank statements.
///
/// Swiss statements carry QR references for member 42 (invoices 706 and
/// 707); German ones carry RF references for member 42 / invoice 706 and
/// member 12 / invoice 34.
pub struct StatementFixtures;

impl StatementFixtures {
    /// camt.054 credit notification: two resolvable credits, one bad
    /// checksum, one debit and one transaction without reference
    pub const CAMT054_SWISS: &'static str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Document xmlns="urn:iso:std:iso:20022:tech:xsd:camt.054.001.04">
  <BkToCstmrDbtCdtNtfctn>
    <GrpHdr>
      <MsgId>20240302-0001</MsgId>
      <CreDtTm>2024-03-02T06:00:00</CreDtTm>
    </GrpHdr>
    <Ntfctn>
      <Id>NTF-0001</Id>
      <Acct><Id><IBAN>CH4431999123000889012</IBAN></Id></Acct>
      <Ntry>
        <Amt Ccy="CHF">50.00</Amt>
        <CdtDbtInd>CRDT</CdtDbtInd>
        <Sts>BOOK</Sts>
        <BookgDt><Dt>2024-03-01</Dt></BookgDt>
        <ValDt><Dt>2024-03-01</Dt></ValDt>
        <AcctSvcrRef>ZV20240301/000001</AcctSvcrRef>
        <NtryDtls>
          <TxDtls>
            <Refs><AcctSvcrRef>ZV20240301/000001/1</AcctSvcrRef></Refs>
            <Amt Ccy="CHF">50.00</Amt>
            <CdtDbtInd>CRDT</CdtDbtInd>
            <RmtInf>
              <Strd>
                <CdtrRefInf>
                  <Tp><CdOrPrtry><Prtry>QRR</Prtry></CdOrPrtry></Tp>
                  <Ref>000000000000000420000007068</Ref>
                </CdtrRefInf>
              </Strd>
            </RmtInf>
          </TxDtls>
        </NtryDtls>
      </Ntry>
      <Ntry>
        <Amt Ccy="CHF">20.00</Amt>
        <CdtDbtInd>CRDT</CdtDbtInd>
        <Sts>BOOK</Sts>
        <BookgDt><Dt>2024-03-01</Dt></BookgDt>
        <AcctSvcrRef>ZV20240301/000002</AcctSvcrRef>
        <NtryDtls>
          <TxDtls>
            <RmtInf>
              <Strd>
                <CdtrRefInf><Ref>000000000000000420000007067</Ref></CdtrRefInf>
              </Strd>
            </RmtInf>
          </TxDtls>
        </NtryDtls>
      </Ntry>
      <Ntry>
        <Amt Ccy="CHF">15.00</Amt>
        <CdtDbtInd>DBIT</CdtDbtInd>
        <Sts>BOOK</Sts>
        <BookgDt><Dt>2024-03-01</Dt></BookgDt>
        <AcctSvcrRef>ZV20240301/000003</AcctSvcrRef>
        <NtryDtls>
          <TxDtls>
            <RmtInf>
              <Strd>
                <CdtrRefInf><Ref>000000000000000420000007068</Ref></CdtrRefInf>
              </Strd>
            </RmtInf>
          </TxDtls>
        </NtryDtls>
      </Ntry>
      <Ntry>
        <Amt Ccy="CHF">96.65</Amt>
        <CdtDbtInd>CRDT</CdtDbtInd>
        <Sts>BOOK</Sts>
        <BookgDt><Dt>2024-03-04</Dt></BookgDt>
        <AcctSvcrRef>ZV20240304/000004</AcctSvcrRef>
        <NtryDtls>
          <TxDtls>
            <Amt Ccy="CHF">66.65</Amt>
            <CdtDbtInd>CRDT</CdtDbtInd>
            <RmtInf>
              <Strd>
                <CdtrRefInf><Ref>00 00000 00000 00042 00000 07073</Ref></CdtrRefInf>
              </Strd>
            </RmtInf>
          </TxDtls>
          <TxDtls>
            <Amt Ccy="CHF">30.00</Amt>
            <CdtDbtInd>CRDT</CdtDbtInd>
            <RmtInf><Ustrd>Don pour la fête des récoltes</Ustrd></RmtInf>
          </TxDtls>
        </NtryDtls>
      </Ntry>
    </Ntfctn>
  </BkToCstmrDbtCdtNtfctn>
</Document>
"#;

    /// camt.053 statement: structured and unstructured RF references and a
    /// returned direct debit
    pub const CAMT053_GERMAN: &'static str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Document xmlns="urn:iso:std:iso:20022:tech:xsd:camt.053.001.02">
  <BkToCstmrStmt>
    <GrpHdr>
      <MsgId>STMT-2024-03</MsgId>
      <CreDtTm>2024-03-08T06:00:00</CreDtTm>
    </GrpHdr>
    <Stmt>
      <Id>STMT-2024-03-01</Id>
      <Acct><Id><IBAN>DE89370400440532013000</IBAN></Id></Acct>
      <Ntry>
        <Amt Ccy="EUR">120.00</Amt>
        <CdtDbtInd>CRDT</CdtDbtInd>
        <Sts>BOOK</Sts>
        <BookgDt><Dt>2024-03-01</Dt></BookgDt>
        <AcctSvcrRef>2024030100001</AcctSvcrRef>
        <NtryDtls>
          <TxDtls>
            <RmtInf>
              <Strd>
                <CdtrRefInf>
                  <Tp><CdOrPrtry><Cd>SCOR</Cd></CdOrPrtry><Issr>ISO</Issr></Tp>
                  <Ref>RF560000004200000706</Ref>
                </CdtrRefInf>
              </Strd>
            </RmtInf>
          </TxDtls>
        </NtryDtls>
      </Ntry>
      <Ntry>
        <Amt Ccy="EUR">30.00</Amt>
        <CdtDbtInd>CRDT</CdtDbtInd>
        <Sts>BOOK</Sts>
        <BookgDt><Dt>2024-03-04</Dt></BookgDt>
        <AcctSvcrRef>2024030400002</AcctSvcrRef>
        <NtryDtls>
          <TxDtls>
            <RmtInf><Ustrd>EREF: RF02 0000 0012 0000 0034 SVWZ+Beitrag Maerz</Ustrd></RmtInf>
          </TxDtls>
        </NtryDtls>
      </Ntry>
      <Ntry>
        <Amt Ccy="EUR">120.00</Amt>
        <CdtDbtInd>DBIT</CdtDbtInd>
        <RvslInd>true</RvslInd>
        <Sts>BOOK</Sts>
        <BookgDt><Dt>2024-03-06</Dt></BookgDt>
        <AcctSvcrRef>2024030600003</AcctSvcrRef>
        <NtryDtls>
          <TxDtls>
            <RmtInf>
              <Strd><CdtrRefInf><Ref>RF560000004200000706</Ref></CdtrRefInf></Strd>
            </RmtInf>
          </TxDtls>
        </NtryDtls>
      </Ntry>
      <Ntry>
        <Amt Ccy="EUR">10.00</Amt>
        <CdtDbtInd>CRDT</CdtDbtInd>
        <Sts>BOOK</Sts>
        <BookgDt><Dt>2024-03-07</Dt></BookgDt>
        <AcctSvcrRef>2024030700004</AcctSvcrRef>
        <NtryDtls>
          <TxDtls>
            <RmtInf><Ustrd>Spende</Ustrd></RmtInf>
          </TxDtls>
        </NtryDtls>
      </Ntry>
    </Stmt>
  </BkToCstmrStmt>
</Document>
"#;

    /// MT940 statement: credit with continuation lines, debit, reversal of
    /// a credit and an entry without reference
    pub const MT940_GERMAN: &'static str = ":20:STMT-2024-03
:25:37040044/0532013000
:28C:00001/001
:60F:C240229EUR1000,00
:61:2403010301C120,00NTRFNONREF//2024030100001
:86:166?00GUTSCHRIFT?20EREF+RF560000004200000706
?21SVWZ+Korb Q1
:61:2403050305D120,00NTRFNONREF//2024030500002
:86:RUECKLASTSCHRIFT RF56 0000 0042 0000 0706
:61:2403060306RC30,00NTRFNONREF//2024030600003
:86:STORNO RF020000001200000034
:61:240307C10,00NTRFNONREF
:86:SPENDE
:62F:C240307EUR880,00
";
}
