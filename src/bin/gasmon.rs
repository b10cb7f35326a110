//! GasMon - gas sensor monitor
//!
//! Reads sensor notifications from the queue file, keeps trusted and
//! first-seen readings, and writes per-bucket averages per location when
//! stopped.
//!
//! Usage:
//!   cargo run --release --bin gasmon -- [--backend json|sqlite]
//!
//! Stop with Ctrl-C or by pressing Enter. See `MonitorConfig::from_env` for
//! the environment variables.

use gasmon::aggregator_core::{CsvReportWriter, ReportSink};
use gasmon::config::MonitorConfig;
use gasmon::pipeline::{
    start_pipeline_ingestion, AllowlistSource, IngestionSettings, LocationTrustFilter,
    PipelineEngine,
};
use gasmon::streamer_core::TailQueue;
use log::{error, info};
use std::io::BufRead;
use std::sync::Arc;
use tokio::sync::watch;

/// Only a delivered signal stops the run; a failed listener leaves Enter as the way out
fn on_ctrl_c(result: std::io::Result<()>, shutdown_tx: &watch::Sender<bool>) {
    match result {
        Ok(()) => {
            info!("🛑 Ctrl-C received, stopping...");
            shutdown_tx.send_replace(true);
        }
        Err(e) => error!("❌ Failed to listen for Ctrl-C: {}", e),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let config = MonitorConfig::from_env()?;

    info!("🚀 Starting GasMon...");
    info!("📊 Configuration:");
    info!("   ├─ Allowlist: {} ({:?})", config.allowlist_path.display(), config.allowlist_backend);
    info!("   ├─ Queue file: {}", config.queue_path.display());
    info!("   ├─ Report: {}", config.report_path.display());
    info!("   ├─ Batch size: {}", config.max_messages);
    info!("   ├─ Wait time: {:?}", config.wait_time);
    info!("   └─ Bucket width: {}", config.bucket_width.as_str());

    let source = AllowlistSource::new(config.allowlist_backend, config.allowlist_path.clone());
    let locations = match source.load_locations().await {
        Ok(locations) => locations,
        Err(e) => {
            error!("❌ Failed to load trusted locations ({}): {}", source.backend_type(), e);
            return Err(e.into());
        }
    };

    let engine = PipelineEngine::new(LocationTrustFilter::new(locations), config.bucket_width);

    let shutdown_tx = Arc::new(watch::channel(false).0);
    let shutdown_rx = shutdown_tx.subscribe();

    {
        let shutdown_tx = Arc::clone(&shutdown_tx);
        tokio::spawn(async move {
            on_ctrl_c(tokio::signal::ctrl_c().await, &shutdown_tx);
        });
    }

    {
        // Blocking stdin read on its own thread so it never holds up runtime shutdown
        let shutdown_tx = Arc::clone(&shutdown_tx);
        std::thread::spawn(move || {
            let mut line = String::new();
            // EOF (stdin not attached) leaves Ctrl-C as the only way to stop
            if matches!(std::io::stdin().lock().read_line(&mut line), Ok(n) if n > 0) {
                info!("🛑 Key press received, stopping...");
                shutdown_tx.send_replace(true);
            }
        });
    }

    println!("Press Enter to stop monitoring and write the report.");

    let mut queue = TailQueue::new(config.queue_path.clone());
    let settings = IngestionSettings::from(&config);
    let received = start_pipeline_ingestion(&mut queue, &engine, &settings, shutdown_rx).await;

    let stats = engine.stats();
    info!("📊 Run summary:");
    info!("   ├─ Messages received: {}", received);
    info!("   ├─ Messages handled: {}", stats.total_handled());
    info!("   ├─ Distinct events tracked: {}", engine.dedup().tracked_keys());
    info!("   └─ Buckets aggregated: {}", engine.aggregator().bucket_count());

    let report = engine.report();
    let mut writer = CsvReportWriter::new(config.report_path.clone());
    let written = writer.write_report(&report).await;

    println!("{}", stats);

    match written {
        Ok(()) => {
            info!("✅ GasMon stopped, report saved via {} writer", writer.backend_type());
            Ok(())
        }
        Err(e) => {
            error!("❌ Failed to write report to {}: {}", writer.path().display(), e);
            Err(e.into())
        }
    }
}
