//! Fatigue monitor - replays recorded cabin frames through the pipeline

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use camera_capture::ImageSequenceSource;
use dms::{init_logging, init_metrics_exporter, run_monitor, FatigueSession, MonitorConfig, OverlaySink, SinkChain, TracingSink};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = MonitorConfig::load(config_path.as_deref()).context("loading configuration")?;
    init_logging(&config.logging);

    info!("=== Fatigue Monitor v{} ===", env!("CARGO_PKG_VERSION"));

    if let Some(addr) = config.metrics_listen {
        if let Err(e) = init_metrics_exporter(addr) {
            warn!("{}", e);
        }
    }

    let profile = config.profile()?;
    profile.log_summary();
    let classifier = config.classifier.build_classifier(&profile)?;
    let mut session = FatigueSession::new(profile, config.locator.build(), classifier)?
        .with_absent_alert_frames(config.absent_alert_frames);

    let mut source = ImageSequenceSource::open(&config.frames_dir)
        .with_context(|| format!("opening frames directory {}", config.frames_dir.display()))?;

    let mut sink = SinkChain::new().with(TracingSink::new());
    if let Some(dir) = &config.output_dir {
        sink = sink.with(OverlaySink::new(dir)?);
    }

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, stopping after the current frame");
                stop.store(true, Ordering::SeqCst);
            }
        });
    }

    let summary = tokio::task::spawn_blocking(move || run_monitor(&mut session, &mut source, &mut sink, &stop))
        .await
        .context("monitor loop panicked")?;

    info!("Summary: {}", serde_json::to_string(&summary)?);
    Ok(())
}
