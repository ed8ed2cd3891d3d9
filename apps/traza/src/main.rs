//! # Traza - Curriculum Traceability
//!
//! The main binary for the Traza traceability engine.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │            apps/traza (THE BINARY)           │
//! │                                              │
//! │  ┌─────────────┐        ┌────────────────┐   │
//! │  │   CLI       │        │  traza.toml    │   │
//! │  │  (clap)     │        │  (config)      │   │
//! │  └──────┬──────┘        └───────┬────────┘   │
//! │         └──────────┬────────────┘            │
//! │                    ▼                         │
//! │            ┌───────────────┐                 │
//! │            │  traza-core   │                 │
//! │            │ (THE LOGIC)   │                 │
//! │            └───────────────┘                 │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! traza init
//! traza import-catalog -f curriculum.json
//! traza create --kind r1 --source 3 --target 1
//! traza matrix --type objective-outcome --program 1
//! traza trace --course 10 --program 1 --levels high,medium
//! ```

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use traza::cli::{self, Cli};
use traza::config::{Config, DEFAULT_LOG_FILTER, LogFormat};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    let cli = Cli::parse();

    let config = match Config::resolve(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    init_tracing(&config, cli.verbose);

    if !cli.quiet && !cli.json_mode {
        eprintln!("Traza v{} - curriculum traceability", env!("CARGO_PKG_VERSION"));
    }

    if let Err(e) = cli::execute(cli, &config) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize tracing. TRAZA_LOG_FORMAT=json enables machine-parseable output.
///
/// The filter comes from RUST_LOG, then the config file, then the default.
fn init_tracing(config: &Config, verbose: bool) {
    let format = std::env::var("TRAZA_LOG_FORMAT")
        .map(|v| LogFormat::from_env_value(&v))
        .unwrap_or(config.logging.format);

    let fallback = match (&config.logging.filter, verbose) {
        (Some(filter), _) => filter.clone(),
        (None, true) => "traza=debug,traza_core=debug".to_string(),
        (None, false) => DEFAULT_LOG_FILTER.to_string(),
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    // Logs go to stderr so command output on stdout stays parseable.
    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
