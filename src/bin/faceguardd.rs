//! faceguardd - live face-recognition access control daemon
//!
//! This daemon:
//! 1. Loads the role roster from the reference database
//! 2. Ingests frames from the configured camera
//! 3. Resolves every Nth frame on a background worker (drop-if-busy)
//! 4. Classifies matches against the fixed role/alert policy
//! 5. Persists alert-worthy detections to the dated logs
//! 6. Reports session statistics on shutdown

use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use faceguard::{FaceguardConfig, HistogramEngine, Session};

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cfg = FaceguardConfig::load()?;
    log::info!(
        "faceguardd {} starting (camera={}, threshold={}%, every {} frame(s))",
        env!("CARGO_PKG_VERSION"),
        cfg.camera.device,
        cfg.recognition.threshold,
        cfg.recognition.process_every_n
    );

    let running = Arc::new(AtomicBool::new(true));
    let running_flag = Arc::clone(&running);
    ctrlc::set_handler(move || {
        log::info!("shutdown requested");
        running_flag.store(false, Ordering::Relaxed);
    })?;

    let engine = Box::new(HistogramEngine::new());
    let mut session = Session::start(&cfg, engine)?;

    let frame_interval = Duration::from_millis((1000 / cfg.camera.target_fps.max(1)) as u64);
    let mut last_health_log = Instant::now();

    while running.load(Ordering::Relaxed) {
        if let Err(err) = session.tick() {
            // Camera acquisition failure is fatal to the session.
            log::error!("session error: {:#}", err);
            break;
        }

        if last_health_log.elapsed() >= HEALTH_LOG_INTERVAL {
            let camera = session.camera_stats();
            let stats = session.stats();
            log::info!(
                "camera health={} frames={} device={} | alerts={}",
                session.camera_healthy(),
                camera.frames_captured,
                camera.device,
                stats.alerts_generated
            );
            last_health_log = Instant::now();
        }

        std::thread::sleep(frame_interval);
    }

    let stats = session.finish()?;

    println!();
    println!("{}", "=".repeat(70));
    println!("ESTADISTICAS DE LA SESION");
    println!("{}", "=".repeat(70));
    println!("Frames procesados: {}", stats.frames_processed);
    println!("Total detecciones: {}", stats.total_detections);
    println!("Detecciones exitosas: {}", stats.successful_matches);
    println!("Alertas generadas: {}", stats.alerts_generated);
    println!("Tasa de exito: {}%", stats.success_rate());
    println!("{}", "=".repeat(70));

    Ok(())
}
