//! Load or remove the development tour fixtures

use clap::Parser;
use natours::config::DatabaseConfig;
use natours::dev_data;
use natours::storage::mongodb::{self, MongoTourStore};
use natours::telemetry;
use std::path::PathBuf;
use std::process::ExitCode;

/// `import-dev-data` command arguments
#[derive(Debug, Parser)]
#[command(
    name = "import-dev-data",
    about = "Import or delete the development tour data",
    version
)]
struct CliArgs {
    /// Insert every tour from the fixture file
    #[arg(long, conflicts_with = "delete", required_unless_present = "delete")]
    import: bool,
    /// Delete every tour in the database
    #[arg(long)]
    delete: bool,
    /// Fixture file to import
    #[arg(long, value_name = "path", default_value = dev_data::DEFAULT_TOURS_FILE)]
    file: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    telemetry::init(telemetry::environment_hint());
    let args = CliArgs::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = format!("{:#}", err), "dev-data command failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: CliArgs) -> anyhow::Result<()> {
    let config = DatabaseConfig::from_env()?;
    let db = mongodb::connect(&config).await?;
    let store = MongoTourStore::new(db);

    if args.import {
        let tours = dev_data::read_tours(&args.file)?;
        store.ensure_indexes().await?;
        dev_data::import(&store, tours).await?;
    } else {
        dev_data::delete_all(&store).await?;
    }
    Ok(())
}
