use std::process::ExitCode;

use remedylab::api::{self, ApiContext};
use remedylab::config::{self, AppConfig};
use remedylab::db::sqlite::open_database;
use remedylab::pipeline::routing::seed_default_mappings;

fn main() -> ExitCode {
    remedylab::init_tracing();
    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Fatal startup error");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env();
    std::fs::create_dir_all(&config.data_dir)?;

    let db_path = config.database_path();
    let conn = open_database(&db_path)?;
    seed_default_mappings(&conn)?;
    drop(conn);
    tracing::info!(path = %db_path.display(), "Database ready");

    // Blocking HTTP clients must be built before the async runtime starts
    let pipeline = remedylab::build_pipeline(&config)?;
    let ctx = ApiContext::new(db_path, pipeline);

    // The runtime only ever sees clones; the last handle drops after it shuts down
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(api::serve(config.bind_addr, ctx.clone()))?;
    drop(runtime);
    drop(ctx);
    Ok(())
}
