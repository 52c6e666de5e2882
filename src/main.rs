//! Entry point for the ncjson server.
//! Handles CLI parsing, logging setup, the worker pool and the HTTP listener.

use clap::Parser;
use ncjson::cli::Args;
use ncjson::parallel::{WorkerConfig, WorkerPool};
use ncjson::server::router;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command-line arguments
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    if args.log_json {
        fmt().with_env_filter(filter).with_target(true).json().init();
    } else {
        fmt().with_env_filter(filter).with_target(true).init();
    }

    // Fail at startup on a bad path.
    ncjson::netcdf_io::NetcdfFile::open(&args.file)?;
    info!(file = %args.file.display(), "Serving NetCDF file");

    let config = WorkerConfig::new(args.workers);
    let pool = Arc::new(WorkerPool::for_file(&config, &args.file)?);
    let app = router(pool);

    let listener = tokio::net::TcpListener::bind(&args.listen).await?;
    info!(address = %args.listen, workers = config.num_workers, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;

    Ok(())
}
