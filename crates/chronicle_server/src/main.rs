mod config;
mod shutdown;

use chronicle_api::ChronicleApi;
use common::postgres::{
    ensure_schema, PostgresClient, PostgresIdentityStore, PostgresLastUserRepository,
};
use common::telemetry::{init_telemetry, TelemetryConfig};
use config::ServiceConfig;
use ingest_worker::IngestPipeline;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() {
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = init_telemetry(&TelemetryConfig {
        service_name: "chronicle".to_string(),
        log_level: config.log_level.clone(),
    }) {
        eprintln!("Failed to initialize telemetry: {}", e);
        std::process::exit(1);
    }

    info!(
        listen_addr = %config.listen_addr,
        workers = config.workers,
        write_interval_secs = config.write_interval_secs,
        "Starting chronicle service"
    );
    debug!("Configuration: {:?}", config);

    let postgres_client = match initialize_postgres(&config).await {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to initialize PostgreSQL: {:#}", e);
            std::process::exit(1);
        }
    };

    let pipeline = Arc::new(IngestPipeline::start(
        PostgresIdentityStore::new(postgres_client.clone()),
        config.pipeline_config(),
    ));
    let last_user_repository = Arc::new(PostgresLastUserRepository::new(postgres_client));

    let chronicle_api = ChronicleApi::new(
        pipeline.clone(),
        last_user_repository,
        config.api_key.clone(),
        config.http_server_config(),
    );

    let shutdown_token = CancellationToken::new();
    tokio::spawn(shutdown::cancel_on_signal(shutdown_token.clone()));

    let result = chronicle_api.run(shutdown_token).await;

    // Buffered pending inserts are not persisted across restarts.
    let unflushed = pipeline.queue_len();
    if unflushed > 0 {
        warn!(unflushed, "Shutting down with unwritten pending inserts");
    }

    match result {
        Ok(()) => info!("Application exiting normally"),
        Err(e) => {
            error!("Application exiting with error: {:#}", e);
            std::process::exit(1);
        }
    }
}

async fn initialize_postgres(config: &ServiceConfig) -> anyhow::Result<PostgresClient> {
    info!("Initializing PostgreSQL...");
    let client = PostgresClient::new(&config.postgres_config())?;
    ensure_schema(&client).await?;
    Ok(client)
}
