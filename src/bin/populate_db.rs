use georeview::config::{init_tracing, AppConfig};
use georeview::{seed, Database};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("[SEED] Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = async {
        let db = Database::new(&config.database_path)?;
        db.create_schema().await?;
        seed::populate(&db).await
    }
    .await;

    match result {
        Ok(count) => {
            tracing::info!("[SEED] Database populated successfully with {} reviews", count);
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("[SEED] Error populating database: {}", e);
            ExitCode::FAILURE
        }
    }
}
