//! Integration tests for the bank integration layer
//!
//! Statements are parsed from the shared fixtures and fed through the
//! payments processor, the way a statement import runs in production.

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal_macros::dec;

use core_kernel::{InvoiceId, MemberId, OrgConfig, PortError};
use domain_billing::{BillingRepository, InvoiceState, PaymentData, PaymentOrigin, PaymentsProcessor};
use infra_bank::{
    fetch_payments, import_payments, parse_statement, BankError, PaymentSource, StatementFormat,
    StatementInboxSource,
};
use test_utils::{
    assert_invoice, DateFixtures, InvoiceBuilder, MemberBuilder, OrgFixtures, PaymentBuilder, ScenarioBuilder,
    StatementFixtures,
};

fn summary(payments: &[PaymentData]) -> Vec<(u64, u64, rust_decimal::Decimal, chrono::NaiveDate)> {
    payments
        .iter()
        .map(|data| {
            (
                data.member_id.map(|id| id.value()).unwrap_or_default(),
                data.invoice_id.map(|id| id.value()).unwrap_or_default(),
                data.amount.amount(),
                data.date,
            )
        })
        .collect()
}

mod statements {
    use super::*;

    #[test]
    fn test_camt054_keeps_resolvable_credits() {
        let org = OrgFixtures::swiss();
        let payments = parse_statement(StatementFixtures::CAMT054_SWISS, &org).unwrap();

        assert_eq!(
            summary(&payments),
            vec![
                (42, 706, dec!(50.00), DateFixtures::date(2024, 3, 1)),
                (42, 707, dec!(66.65), DateFixtures::date(2024, 3, 4)),
            ]
        );
        assert_eq!(payments[0].fingerprint.as_deref(), Some("ZV20240301/000001/1"));
        assert_eq!(payments[1].fingerprint.as_deref(), Some("ZV20240304/000004/0"));
        assert!(payments.iter().all(|p| p.origin == PaymentOrigin::Camt054));
    }

    #[test]
    fn test_camt053_keeps_reversals_as_negative_amounts() {
        let org = OrgFixtures::german();
        let payments = parse_statement(StatementFixtures::CAMT053_GERMAN, &org).unwrap();

        assert_eq!(
            summary(&payments),
            vec![
                (42, 706, dec!(120.00), DateFixtures::date(2024, 3, 1)),
                (12, 34, dec!(30.00), DateFixtures::date(2024, 3, 4)),
                (42, 706, dec!(-120.00), DateFixtures::date(2024, 3, 6)),
            ]
        );
        let fingerprints: Vec<_> = payments.iter().filter_map(|p| p.fingerprint.clone()).collect();
        assert_eq!(fingerprints, vec!["2024030100001", "2024030400002", "2024030600003"]);
        assert!(payments.iter().all(|p| p.origin == PaymentOrigin::Camt053));
    }

    #[test]
    fn test_mt940_pairs_lines_with_narratives() {
        let org = OrgFixtures::german();
        let payments = parse_statement(StatementFixtures::MT940_GERMAN, &org).unwrap();

        assert_eq!(
            summary(&payments),
            vec![
                (42, 706, dec!(120.00), DateFixtures::date(2024, 3, 1)),
                (42, 706, dec!(-120.00), DateFixtures::date(2024, 3, 5)),
                (12, 34, dec!(-30.00), DateFixtures::date(2024, 3, 6)),
            ]
        );
        assert_eq!(payments[0].fingerprint.as_deref(), Some("2024030100001"));
        assert!(payments.iter().all(|p| p.origin == PaymentOrigin::Mt940));
    }

    #[test]
    fn test_mt940_owner_information_keeps_payments() {
        let org = OrgFixtures::german();
        let with_information = StatementFixtures::MT940_GERMAN.replace(
            ":62F:C240307EUR880,00\n",
            ":62F:C240307EUR880,00\n:64:C240307EUR880,00\n:86:Statement information for account owner\n",
        );
        assert_ne!(with_information, StatementFixtures::MT940_GERMAN);

        let payments = parse_statement(&with_information, &org).unwrap();
        assert_eq!(summary(&payments), summary(&parse_statement(StatementFixtures::MT940_GERMAN, &org).unwrap()));
        assert_eq!(payments.len(), 3);
    }

    #[test]
    fn test_swiss_statement_needs_swiss_references() {
        // RF references are not QR references
        let org = OrgFixtures::swiss();
        let payments = parse_statement(StatementFixtures::MT940_GERMAN, &org).unwrap();
        assert!(payments.is_empty());
    }

    #[test]
    fn test_unknown_format_is_unsupported() {
        let org = OrgFixtures::swiss();
        let error = parse_statement("Datum;Betrag\n01.03.2024;50,00\n", &org).unwrap_err();
        assert!(error.is_unsupported_file());
        assert_eq!(StatementFormat::detect(StatementFixtures::MT940_GERMAN), Some(StatementFormat::Mt940));
    }

    #[test]
    fn test_truncated_mt940_is_rejected_whole() {
        let org = OrgFixtures::german();
        let truncated = StatementFixtures::MT940_GERMAN.replace(":61:2403050305D120,00", ":61:24030X0305D120,00");
        let error = parse_statement(&truncated, &org).unwrap_err();
        assert!(matches!(error, BankError::UnsupportedFile { .. }));
    }

    #[test]
    fn test_payment_data_serializes_for_operators() {
        let org = OrgFixtures::swiss();
        let payments = parse_statement(StatementFixtures::CAMT054_SWISS, &org).unwrap();
        let json = serde_json::to_value(&payments).unwrap();
        assert_eq!(json[0]["origin"], "camt.054");
        assert_eq!(json[0]["member_id"], 42);
    }
}

mod reconciliation {
    use super::*;

    async fn swiss_scenario() -> domain_billing::InMemoryBillingRepository {
        ScenarioBuilder::new()
            .member(MemberBuilder::new().build())
            .invoice(InvoiceBuilder::new().with_id(706).with_amount(dec!(50.00)).build())
            .invoice(
                InvoiceBuilder::new()
                    .with_id(707)
                    .with_date(DateFixtures::date(2024, 2, 1))
                    .with_amount(dec!(66.65))
                    .build(),
            )
            .build()
            .await
    }

    #[tokio::test]
    async fn test_statement_closes_invoices() {
        let org = OrgFixtures::swiss();
        let repository = swiss_scenario().await;
        let payments = parse_statement(StatementFixtures::CAMT054_SWISS, &org).unwrap();

        let report = PaymentsProcessor::new(&repository, &org).process(payments).await.unwrap();
        assert_eq!(report.created.len(), 2);

        let invoices = repository.invoices_of(MemberId::new(42)).await.unwrap();
        assert_invoice(&invoices, 706, InvoiceState::Closed, dec!(50.00));
        assert_invoice(&invoices, 707, InvoiceState::Closed, dec!(66.65));
    }

    #[tokio::test]
    async fn test_importing_a_statement_twice_is_harmless() {
        let org = OrgFixtures::swiss();
        let repository = swiss_scenario().await;
        let processor = PaymentsProcessor::new(&repository, &org);

        processor
            .process(parse_statement(StatementFixtures::CAMT054_SWISS, &org).unwrap())
            .await
            .unwrap();
        let second = processor
            .process(parse_statement(StatementFixtures::CAMT054_SWISS, &org).unwrap())
            .await
            .unwrap();

        assert!(second.created.is_empty());
        assert_eq!(second.skipped_duplicates, 2);
        assert_eq!(repository.payments_of(MemberId::new(42)).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_returned_direct_debit_reopens_invoice() {
        let org = OrgFixtures::german();
        let repository = ScenarioBuilder::new()
            .member(MemberBuilder::new().build())
            .member(MemberBuilder::new().with_id(12).with_name("Hans Keller").build())
            .invoice(
                InvoiceBuilder::new()
                    .with_id(706)
                    .with_currency(core_kernel::Currency::EUR)
                    .with_amount(dec!(120.00))
                    .build(),
            )
            .invoice(
                InvoiceBuilder::new()
                    .with_id(34)
                    .with_member_id(12)
                    .with_currency(core_kernel::Currency::EUR)
                    .with_amount(dec!(30.00))
                    .build(),
            )
            .build()
            .await;

        let payments = parse_statement(StatementFixtures::CAMT053_GERMAN, &org).unwrap();
        PaymentsProcessor::new(&repository, &org).process(payments).await.unwrap();

        let first = repository.invoices_of(MemberId::new(42)).await.unwrap();
        assert_invoice(&first, 706, InvoiceState::Open, dec!(0));
        let second = repository.invoices_of(MemberId::new(12)).await.unwrap();
        assert_invoice(&second, 34, InvoiceState::Closed, dec!(30.00));
        let invoice = repository.invoice(InvoiceId::new(34)).await.unwrap().unwrap();
        assert_eq!(invoice.state, InvoiceState::Closed);
    }
}

mod sources {
    use super::*;

    enum Behaviour {
        Answer(Vec<PaymentData>),
        Hang,
        Fail(fn() -> PortError),
    }

    struct FakeBankApi {
        behaviour: Behaviour,
    }

    #[async_trait]
    impl PaymentSource for FakeBankApi {
        fn name(&self) -> &str {
            "fake-bank"
        }

        async fn fetch(&self, _org: &OrgConfig) -> Result<Vec<PaymentData>, PortError> {
            match &self.behaviour {
                Behaviour::Answer(payments) => Ok(payments.clone()),
                Behaviour::Hang => {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(Vec::new())
                }
                Behaviour::Fail(error) => Err(error()),
            }
        }
    }

    fn source(behaviour: Behaviour) -> FakeBankApi {
        FakeBankApi { behaviour }
    }

    const TIMEOUT: Duration = Duration::from_millis(50);

    #[tokio::test]
    async fn test_answer_is_passed_through() {
        let org = OrgFixtures::swiss();
        let data = PaymentBuilder::new()
            .for_invoice(706)
            .with_origin(PaymentOrigin::BankApi("fake-bank".to_string()))
            .data();
        let payments = fetch_payments(&source(Behaviour::Answer(vec![data.clone()])), &org, TIMEOUT)
            .await
            .unwrap();
        assert_eq!(payments, vec![data]);
    }

    #[tokio::test]
    async fn test_timeout_degrades_to_no_payments() {
        let org = OrgFixtures::swiss();
        let payments = fetch_payments(&source(Behaviour::Hang), &org, TIMEOUT).await.unwrap();
        assert!(payments.is_empty());
    }

    #[tokio::test]
    async fn test_maintenance_degrades_to_no_payments() {
        let org = OrgFixtures::swiss();
        let maintenance = || PortError::ServiceUnavailable {
            service: "ebics".to_string(),
        };
        let payments = fetch_payments(&source(Behaviour::Fail(maintenance)), &org, TIMEOUT)
            .await
            .unwrap();
        assert!(payments.is_empty());

        let unreachable = || PortError::connection("connection reset");
        let payments = fetch_payments(&source(Behaviour::Fail(unreachable)), &org, TIMEOUT)
            .await
            .unwrap();
        assert!(payments.is_empty());
    }

    #[tokio::test]
    async fn test_rejected_credentials_are_reported() {
        let org = OrgFixtures::swiss();
        let rejected = || PortError::Unauthorized {
            message: "certificate expired".to_string(),
        };
        let error = fetch_payments(&source(Behaviour::Fail(rejected)), &org, TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(error, BankError::Authentication(_)));
    }

    #[tokio::test]
    async fn test_other_failures_are_reported() {
        let org = OrgFixtures::swiss();
        let garbled = || PortError::transformation("unexpected payload");
        let error = fetch_payments(&source(Behaviour::Fail(garbled)), &org, TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(error, BankError::Source(_)));
    }

    #[tokio::test]
    async fn test_statement_inbox_skips_other_files() {
        let org = OrgFixtures::swiss();
        let inbox = tempfile::tempdir().unwrap();
        tokio::fs::write(inbox.path().join("2024-03-02.xml"), StatementFixtures::CAMT054_SWISS)
            .await
            .unwrap();
        tokio::fs::write(inbox.path().join("readme.txt"), "Statements go here")
            .await
            .unwrap();

        let source = StatementInboxSource::new(inbox.path());
        let payments = fetch_payments(&source, &org, Duration::from_secs(5)).await.unwrap();

        assert_eq!(payments.len(), 2);
        assert_eq!(payments[0].invoice_id, Some(InvoiceId::new(706)));
    }

    #[tokio::test]
    async fn test_missing_inbox_degrades_to_no_payments() {
        let org = OrgFixtures::swiss();
        let inbox = tempfile::tempdir().unwrap();
        let source = StatementInboxSource::new(inbox.path().join("missing"));
        let payments = fetch_payments(&source, &org, Duration::from_secs(5)).await.unwrap();
        assert!(payments.is_empty());
    }

    #[tokio::test]
    async fn test_import_runs_the_processor() {
        let org = OrgFixtures::swiss();
        let repository = ScenarioBuilder::new()
            .member(MemberBuilder::new().build())
            .invoice(InvoiceBuilder::new().with_id(706).with_amount(dec!(50.00)).build())
            .build()
            .await;
        let inbox = tempfile::tempdir().unwrap();
        tokio::fs::write(inbox.path().join("camt054.xml"), StatementFixtures::CAMT054_SWISS)
            .await
            .unwrap();

        let source = StatementInboxSource::new(inbox.path());
        let report = import_payments(&source, &repository, &org, Duration::from_secs(5))
            .await
            .unwrap();

        // Invoice 707 does not exist here
        assert_eq!(report.created.len(), 1);
        assert_eq!(report.skipped_unresolved, 1);
        let invoices = repository.invoices_of(MemberId::new(42)).await.unwrap();
        assert_invoice(&invoices, 706, InvoiceState::Closed, dec!(50.00));
    }
}

mod property_tests {
    use super::*;
    use domain_billing::{CreditorReference, QrReference};
    use proptest::prelude::*;
    use test_utils::{bank_reference_strategy, reference_code_strategy};

    proptest! {
        #[test]
        fn prop_mt940_narrative_reference_resolves(code in reference_code_strategy()) {
            let org = OrgFixtures::german();
            let reference = CreditorReference::encode(code).unwrap();
            let statement = format!(
                ":20:STMT\n:60F:C240229EUR0,00\n:61:240301C25,50NTRFNONREF//B1\n:86:BEITRAG {}\n:62F:C240301EUR25,50\n",
                CreditorReference::formatted(&reference)
            );

            let payments = parse_statement(&statement, &org).unwrap();

            prop_assert_eq!(payments.len(), 1);
            prop_assert_eq!(payments[0].member_id, Some(code.member_id));
            prop_assert_eq!(payments[0].invoice_id, Some(code.invoice_id));
            prop_assert_eq!(payments[0].amount.amount(), dec!(25.50));
        }

        #[test]
        fn prop_camt_structured_reference_resolves(
            code in reference_code_strategy(),
            bank_reference in bank_reference_strategy(),
        ) {
            let mut org = OrgFixtures::swiss();
            org.creditor.bank_reference = bank_reference.clone();
            let reference = QrReference::new(bank_reference.as_deref()).unwrap().encode(code).unwrap();
            let notification = StatementFixtures::CAMT054_SWISS.replacen("000000000000000420000007068", &reference, 1);

            let payments = parse_statement(&notification, &org).unwrap();

            prop_assert_eq!(payments[0].member_id, Some(code.member_id));
            prop_assert_eq!(payments[0].invoice_id, Some(code.invoice_id));
        }
    }
}
