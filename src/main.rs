use dotenvy::dotenv;
use sales_dashboard::{
    app::{BackendState, Dashboard, FileStatus},
    config::{
        database::{create_connection, create_tables},
        settings::load_default_settings,
    },
    errors::{Error, Result},
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; variables can also be set externally
    dotenv().ok();
    info!("Attempted to load .env file.");

    // 3. Load settings from config.toml, falling back to defaults
    let settings = load_default_settings()
        .inspect_err(|e| error!("Critical error loading settings: {}", e))?;
    info!("Successfully loaded settings.");

    // 4. Connect and provision the record store
    let db = create_connection(&settings)
        .await
        .inspect_err(|e| error!("Failed to connect to the record store: {}", e))?;
    create_tables(&db)
        .await
        .inspect(|_| info!("Record store tables are ready."))
        .inspect_err(|e| error!("Failed to create tables: {}", e))?;

    let import_paths = settings.import_paths.clone();
    let mut dashboard = Dashboard::new(db, settings);

    // 5. Refuse to touch data when the probe fails
    if let BackendState::Misconfigured { message } = dashboard.check_backend().await {
        error!("Record store is misconfigured: {}", message);
        return Err(Error::Config {
            message: message.clone(),
        });
    }

    // 6. Process configured exports; one bad file does not stop the rest
    if import_paths.is_empty() {
        info!("No import paths configured.");
    }
    for path in &import_paths {
        if let Err(e) = dashboard.upload(path) {
            warn!("Skipping '{}': {}", path.display(), e);
            continue;
        }
        match dashboard.process().await {
            Ok(outcome) => {
                for rejection in &outcome.rejected {
                    warn!("Line {} rejected: {}", rejection.line, rejection.reason);
                }
            }
            Err(e) => error!("Failed to process '{}': {}", path.display(), e),
        }
    }

    // 7. Log the overall report
    if dashboard.state().file_status == FileStatus::Failed {
        warn!("The last export failed to process.");
    }
    let report = dashboard.report().await?;
    if report.is_empty() {
        info!("No sales recorded yet.");
    } else {
        info!("{}", report.summary_text());
    }

    Ok(())
}
