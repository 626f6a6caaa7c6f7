//! Payment sources
//!
//! A payment source fetches payment data from outside the engine: a bank
//! API, an EBICS download, a directory of statements. Outages never stop
//! billing: a source that times out, is in maintenance or cannot be reached
//! yields no payments for this run. Rejected credentials are reported.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use core_kernel::{OrgConfig, PortError};
use domain_billing::{BillingRepository, PaymentData, PaymentsProcessor, ProcessingReport};

use crate::error::{BankError, Result};
use crate::statement::parse_statement;

/// Default time a source gets to answer
pub const DEFAULT_SOURCE_TIMEOUT: Duration = Duration::from_secs(30);

/// Port for anything that delivers payment data
#[async_trait]
pub trait PaymentSource: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Fetches the payment data available now
    async fn fetch(&self, org: &OrgConfig) -> std::result::Result<Vec<PaymentData>, PortError>;
}

/// Fetches from a source, degrading outages to an empty result
///
/// # Errors
///
/// `BankError::Authentication` when the source rejects our credentials,
/// `BankError::Source` for any other non-transient failure.
#[instrument(skip_all, fields(source = source.name(), timeout_ms = timeout.as_millis() as u64))]
pub async fn fetch_payments(
    source: &dyn PaymentSource,
    org: &OrgConfig,
    timeout: Duration,
) -> Result<Vec<PaymentData>> {
    let outcome = match tokio::time::timeout(timeout, source.fetch(org)).await {
        Ok(outcome) => outcome,
        Err(_) => Err(PortError::Timeout {
            operation: format!("fetch from {}", source.name()),
            duration_ms: timeout.as_millis() as u64,
        }),
    };

    match outcome {
        Ok(payments) => {
            debug!(payments = payments.len(), "Payment source answered");
            Ok(payments)
        }
        Err(error) if error.is_unauthorized() => Err(BankError::Authentication(error.to_string())),
        Err(error) if error.is_transient() => {
            warn!(%error, "Payment source unavailable, no payments fetched");
            Ok(Vec::new())
        }
        Err(error) => Err(BankError::Source(error)),
    }
}

/// Fetches from a source and processes what it returned
pub async fn import_payments<R>(
    source: &dyn PaymentSource,
    repository: &R,
    org: &OrgConfig,
    timeout: Duration,
) -> Result<ProcessingReport>
where
    R: BillingRepository + ?Sized,
{
    let payments = fetch_payments(source, org, timeout).await?;
    let report = PaymentsProcessor::new(repository, org).process(payments).await?;
    info!(
        source = source.name(),
        created = report.created.len(),
        duplicates = report.skipped_duplicates,
        unresolved = report.skipped_unresolved,
        "Payments imported"
    );
    Ok(report)
}

/// Statement files dropped in a directory
///
/// Every regular file is parsed, in file name order. Files that are not
/// statements are skipped with a warning.
pub struct StatementInboxSource {
    directory: PathBuf,
}

impl StatementInboxSource {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    async fn statement_files(&self) -> std::result::Result<Vec<PathBuf>, PortError> {
        let mut entries = tokio::fs::read_dir(&self.directory)
            .await
            .map_err(|e| PortError::connection(format!("{}: {}", self.directory.display(), e)))?;

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| PortError::connection(e.to_string()))?
        {
            let is_file = entry
                .file_type()
                .await
                .map(|file_type| file_type.is_file())
                .unwrap_or(false);
            if is_file {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }
}

#[async_trait]
impl PaymentSource for StatementInboxSource {
    fn name(&self) -> &str {
        "statement-inbox"
    }

    async fn fetch(&self, org: &OrgConfig) -> std::result::Result<Vec<PaymentData>, PortError> {
        let mut payments = Vec::new();
        for path in self.statement_files().await? {
            let content = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| PortError::connection(format!("{}: {}", path.display(), e)))?;
            match parse_statement(&content, org) {
                Ok(mut data) => {
                    debug!(file = %path.display(), payments = data.len(), "Statement read");
                    payments.append(&mut data);
                }
                Err(error) if error.is_unsupported_file() => {
                    warn!(file = %path.display(), %error, "Statement skipped");
                }
                Err(error) => return Err(PortError::transformation(error.to_string())),
            }
        }
        Ok(payments)
    }
}
