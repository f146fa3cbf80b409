use clap::{Args, Parser};
use std::path::PathBuf;
use std::process::ExitCode;

mod config;
mod observability;

use config::Config;

#[derive(Args)]
struct CliArgs {
    /// Path to the YAML config file
    #[arg(long)]
    config_file: PathBuf,
}

#[derive(Parser)]
#[command(name = "ledgerd", about = "Caching proxy and ledger sync for the Kraken API")]
enum CliCommand {
    /// Serve the HTTP API and the admin listener
    Serve(CliArgs),
    /// Run one ledger sync and print the stored records as JSON
    Sync(CliArgs),
}

fn main() -> ExitCode {
    let cli = CliCommand::parse();
    let (CliCommand::Serve(args) | CliCommand::Sync(args)) = &cli;

    let config = match Config::from_file(&args.config_file) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {e}", args.config_file.display());
            return ExitCode::FAILURE;
        }
    };

    let _sentry = observability::init_logging(&config.logging);

    if let Some(metrics) = &config.metrics {
        if let Err(e) = observability::init_metrics(metrics) {
            tracing::error!(error = %e, "Could not initialize metrics");
            return ExitCode::FAILURE;
        }
    }

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!(error = %e, "Could not start runtime");
            return ExitCode::FAILURE;
        }
    };

    let result = match cli {
        CliCommand::Serve(_) => {
            tracing::info!("Starting ledgerd");
            rt.block_on(ledger::run(config.ledger))
        }
        CliCommand::Sync(_) => rt.block_on(sync(&config.ledger)),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "ledgerd failed");
            ExitCode::FAILURE
        }
    }
}

async fn sync(config: &ledger::config::Config) -> Result<(), ledger::LedgerError> {
    let records = ledger::sync_once(config).await?;
    match serde_json::to_string_pretty(&records) {
        Ok(json) => println!("{json}"),
        Err(e) => tracing::error!(error = %e, "Could not serialize records"),
    }
    Ok(())
}
