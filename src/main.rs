//! Natours API server

use natours::config::AppConfig;
use natours::server::ServerBuilder;
use natours::storage::mongodb::{self, MongoTourStore, MongoUserStore};
use natours::telemetry;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    telemetry::init(telemetry::environment_hint());

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = format!("{:#}", err), "shutting down");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;

    let db = mongodb::connect(&config.database).await?;

    let tours = MongoTourStore::new(db.clone());
    let users = MongoUserStore::new(db);
    tours.ensure_indexes().await?;
    users.ensure_indexes().await?;

    ServerBuilder::new(config)
        .with_tour_store(tours)
        .with_user_store(users)
        .serve()
        .await
}
