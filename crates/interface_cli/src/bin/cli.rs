//! CSA Billing - command line binary
//!
//! # Usage
//!
//! ```bash
//! csa-billing reference encode --member 42 --invoice 706
//! csa-billing reference decode "RF56 0000 0042 0000 0706"
//! csa-billing periods --division 4 --year 2024
//! csa-billing statement parse camt054.xml
//! csa-billing qr-payload --member 42 --invoice 706 --amount 200 --debtor-name "Jeanne Dupont"
//! ```
//!
//! # Configuration
//!
//! Organization settings come from `billing.toml` (or `--config <file>`),
//! overridden by `BILLING_`-prefixed environment variables with `__`
//! between nested keys. A `.env` file is loaded first when present.
//!
//! * `BILLING_LOG_LEVEL` - trace, debug, info, warn, error (default: info)
//! * `BILLING_ORGANIZATION__COUNTRY_CODE` - "CH" selects Swiss QR references
//! * `RUST_LOG` - overrides the log level

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use interface_cli::{run, Cli, CliConfig};

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = CliConfig::load(cli.config.as_deref())?;

    init_tracing(&config.log_level);
    tracing::debug!(organization = %config.organization.name, "Configuration loaded");

    let output = run(cli.command, &config.organization)?;
    println!("{}", output);
    Ok(())
}

/// Initializes the tracing subscriber. Logs go to stderr so command output
/// on stdout stays machine readable.
fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true).with_writer(std::io::stderr))
        .init();
}
