//! Live recognition session.
//!
//! One `Session` owns everything a run needs — camera, roster snapshot,
//! pipeline, alert log, temp store, counters — and is discarded at session
//! end. There are no process-wide singletons; every pipeline stage reads
//! state through this object. The camera handle is released exactly once,
//! when the session is dropped, shutdown errors included.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::collections::HashSet;

use crate::alerts::AlertLog;
use crate::camera::{CameraConfig, CameraSource, CameraStats};
use crate::classify::{Detection, FrameAnalyzer, FrameOutcome};
use crate::config::FaceguardConfig;
use crate::frame::Frame;
use crate::pipeline::Coordinator;
use crate::recognize::FaceEngine;
use crate::roster::Roster;
use crate::tempfiles::TempStore;

/// Session counters. Updated only by the consumer loop, never by the
/// pipeline worker; reset on demand; reported at session end.
#[derive(Clone, Copy, Debug, Default)]
pub struct SessionStats {
    pub frames_processed: u64,
    /// Frames that went through resolution (attempts, not faces).
    pub total_detections: u64,
    pub successful_matches: u64,
    pub alerts_generated: u64,
}

impl SessionStats {
    pub fn reset(&mut self) {
        *self = SessionStats::default();
    }

    /// Share of resolution attempts that identified someone, in percent.
    pub fn success_rate(&self) -> f64 {
        let attempts = self.total_detections.max(1) as f64;
        (self.successful_matches as f64 / attempts * 10_000.0).round() / 100.0
    }
}

pub struct Session {
    camera: CameraSource,
    roster: Roster,
    alert_log: AlertLog,
    temp: TempStore,
    coordinator: Coordinator<FrameOutcome>,
    stats: SessionStats,
    detections: Vec<Detection>,
    alerts: Vec<Detection>,
    saved_unknowns: HashSet<[u8; 32]>,
    process_every_n: u64,
    frame_index: u64,
    paused: bool,
}

impl Session {
    /// Build the session: load the roster, open the camera, spawn the
    /// pipeline worker, and mark the session start in the alert log.
    pub fn start(config: &FaceguardConfig, engine: Box<dyn FaceEngine>) -> Result<Self> {
        config.ensure_dirs()?;

        let roster = Roster::load(&config.database_dir).context("loading reference roster")?;
        if roster.is_empty() {
            log::warn!("reference database is empty; every face will resolve unauthorized");
        } else {
            log::info!("{} registered person(s)", roster.len());
            for entry in roster.entries() {
                log::debug!(
                    "  - {} [{}], {} photo(s)",
                    entry.name,
                    entry.category.label(),
                    entry.image_count
                );
            }
        }

        let mut analyzer = FrameAnalyzer::new(engine, config)?;
        log::info!("recognition engine: {}", analyzer.engine_name());

        let mut camera = CameraSource::new(CameraConfig::from(&config.camera))?;
        camera.connect().context("failed to open camera")?;

        let temp = TempStore::new(&config.temp_dir)?;
        let alert_log = AlertLog::new(&config.logs_dir, config.alert_filter)?;
        alert_log.log_session_start()?;

        let coordinator = Coordinator::spawn(move |frame| analyzer.analyze(frame));

        Ok(Self {
            camera,
            roster,
            alert_log,
            temp,
            coordinator,
            stats: SessionStats::default(),
            detections: Vec::new(),
            alerts: Vec::new(),
            saved_unknowns: HashSet::new(),
            process_every_n: config.recognition.process_every_n,
            frame_index: 0,
            paused: false,
        })
    }

    /// One loop iteration: capture, maybe submit, consume any ready result.
    /// A capture failure is fatal to the session.
    pub fn tick(&mut self) -> Result<()> {
        if self.paused {
            return Ok(());
        }

        let frame = self.camera.next_frame().context("camera capture failed")?;

        if self.frame_index % self.process_every_n == 0 {
            // Drop-if-busy: at most one job is ever outstanding.
            self.coordinator.submit(self.frame_index, frame);
        }
        self.frame_index += 1;
        self.stats.frames_processed += 1;

        if let Some(result) = self.coordinator.poll() {
            self.apply_outcome(result.index, result.outcome);
        }
        Ok(())
    }

    fn apply_outcome(&mut self, frame_index: u64, outcome: FrameOutcome) {
        self.stats.total_detections += 1;
        if outcome.detections.is_empty() {
            return;
        }

        log::info!(
            "frame {}: {} detection(s)",
            frame_index,
            outcome.detections.len()
        );
        let mut crops = outcome.unknown_crops.into_iter();

        for detection in outcome.detections {
            let tag = if detection.authorized { "OK" } else { "ALERTA" };
            log::info!(
                "  [{}] {} - {} ({}%)",
                tag,
                detection.name,
                detection.role,
                detection.confidence
            );

            if detection.authorized {
                self.stats.successful_matches += 1;
                if let Err(err) = self.alert_log.log_detection(&detection) {
                    log::error!("failed to record detection: {}", err);
                }
            } else if detection.name == "Desconocido" {
                if let Some(crop) = crops.next() {
                    self.save_unknown_crop(&crop);
                }
            }

            if detection.raises_alert {
                self.stats.alerts_generated += 1;
                match self.alert_log.log_alert(&detection) {
                    Ok(true) => log::warn!(
                        "ALERTA: {} - {}",
                        detection.name,
                        detection.severity_or_low().as_str()
                    ),
                    Ok(false) => {}
                    Err(err) => log::error!("failed to persist alert: {}", err),
                }
                self.alerts.push(detection.clone());
            }

            self.detections.push(detection);
        }
    }

    /// Archive the crop of an unrecognized face, once per distinct crop.
    fn save_unknown_crop(&mut self, crop: &Frame) {
        let digest: [u8; 32] = Sha256::digest(crop.pixels()).into();
        if !self.saved_unknowns.insert(digest) {
            return;
        }
        let saved = crop
            .to_image()
            .and_then(|image| self.temp.save_jpeg("desconocido", &image));
        match saved {
            Ok(path) => log::info!("unknown face archived: {}", path.display()),
            Err(err) => log::warn!("failed to archive unknown face: {}", err),
        }
    }

    pub fn toggle_pause(&mut self) -> bool {
        self.paused = !self.paused;
        self.paused
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn reset_stats(&mut self) {
        self.stats.reset();
        self.detections.clear();
        self.alerts.clear();
        self.saved_unknowns.clear();
        log::info!("session statistics reset");
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn detections(&self) -> &[Detection] {
        &self.detections
    }

    pub fn alerts(&self) -> &[Detection] {
        &self.alerts
    }

    pub fn camera_healthy(&self) -> bool {
        self.camera.is_healthy()
    }

    pub fn camera_stats(&self) -> CameraStats {
        self.camera.stats()
    }

    /// End the session: stop the worker (bounded wait), write the closing
    /// markers, release the camera. Returns the final counters.
    pub fn finish(self) -> Result<SessionStats> {
        let Session {
            camera,
            alert_log,
            coordinator,
            stats,
            ..
        } = self;

        if !coordinator.shutdown() {
            log::warn!("pipeline worker still busy at session end");
        }
        alert_log
            .log_session_end(&stats)
            .context("writing session end markers")?;

        drop(camera);
        log::info!("camera released");
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognize::ScriptedEngine;
    use crate::roles::AlertFilter;
    use std::time::Duration;

    fn test_config(dir: &std::path::Path) -> FaceguardConfig {
        let mut config = FaceguardConfig::default();
        config.database_dir = dir.join("database");
        config.logs_dir = dir.join("logs");
        config.temp_dir = dir.join("temp");
        config.camera.device = "stub://test".to_string();
        config.camera.width = 64;
        config.camera.height = 48;
        config.recognition.process_every_n = 1;
        config
    }

    fn run_until<F>(session: &mut Session, mut done: F)
    where
        F: FnMut(&Session) -> bool,
    {
        for _ in 0..500 {
            session.tick().unwrap();
            if done(session) {
                return;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        panic!("session condition not reached");
    }

    #[test]
    fn matched_vip_generates_a_low_alert() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let engine = ScriptedEngine::new().with_candidate("database/vip/carlos/carlos_1.jpg", 0.3);

        let mut session = Session::start(&config, Box::new(engine)).unwrap();
        run_until(&mut session, |s| s.stats().alerts_generated >= 1);

        assert_eq!(session.alerts()[0].name, "Carlos");
        assert!(session.alerts()[0].authorized);

        let stats = session.finish().unwrap();
        assert!(stats.successful_matches >= 1);
        assert!(stats.frames_processed >= 1);

        let json = std::fs::read_dir(config.logs_dir)
            .unwrap()
            .flatten()
            .find(|e| e.path().extension().is_some_and(|ext| ext == "jsonl"))
            .expect("structured log exists");
        let raw = std::fs::read_to_string(json.path()).unwrap();
        assert!(raw.contains("\"nombre\":\"Carlos\""));
    }

    #[test]
    fn unknown_faces_are_archived_and_alerted_critically() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        // Engine knows nobody; the synthetic scene repeats, so the same
        // crop shows up many times but is archived once.
        let engine = ScriptedEngine::new();

        let mut session = Session::start(&config, Box::new(engine)).unwrap();
        run_until(&mut session, |s| s.stats().alerts_generated >= 2);

        let unknown_files: Vec<_> = std::fs::read_dir(&config.temp_dir)
            .unwrap()
            .flatten()
            .filter(|e| {
                e.file_name()
                    .to_string_lossy()
                    .starts_with("desconocido_")
            })
            .collect();
        assert!(!unknown_files.is_empty());

        assert!(session.alerts().iter().all(|a| !a.authorized));
        session.finish().unwrap();
    }

    #[test]
    fn suppressed_alerts_still_count_but_do_not_write() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.alert_filter = AlertFilter::Critical;
        // VIP match alerts at "bajo", which the filter suppresses.
        let engine = ScriptedEngine::new().with_candidate("database/vip/carlos/carlos_1.jpg", 0.3);

        let mut session = Session::start(&config, Box::new(engine)).unwrap();
        run_until(&mut session, |s| s.stats().alerts_generated >= 1);
        session.finish().unwrap();

        let json_lines: usize = std::fs::read_dir(&config.logs_dir)
            .unwrap()
            .flatten()
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "jsonl"))
            .map(|e| {
                std::fs::read_to_string(e.path())
                    .map(|raw| raw.lines().count())
                    .unwrap_or(0)
            })
            .sum();
        assert_eq!(json_lines, 0);
    }

    #[test]
    fn pause_stops_frame_accounting() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let mut session = Session::start(&config, Box::new(ScriptedEngine::new())).unwrap();

        session.tick().unwrap();
        let before = session.stats().frames_processed;

        assert!(session.toggle_pause());
        session.tick().unwrap();
        session.tick().unwrap();
        assert_eq!(session.stats().frames_processed, before);

        assert!(!session.toggle_pause());
        session.tick().unwrap();
        assert_eq!(session.stats().frames_processed, before + 1);
        session.finish().unwrap();
    }

    #[test]
    fn reset_clears_counters_and_session_lists() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let mut session = Session::start(&config, Box::new(ScriptedEngine::new())).unwrap();

        run_until(&mut session, |s| s.stats().alerts_generated >= 1);
        session.reset_stats();

        assert_eq!(session.stats().frames_processed, 0);
        assert_eq!(session.stats().alerts_generated, 0);
        assert!(session.detections().is_empty());
        assert!(session.alerts().is_empty());
        session.finish().unwrap();
    }

    #[test]
    fn success_rate_rounds_to_two_decimals() {
        let stats = SessionStats {
            frames_processed: 10,
            total_detections: 3,
            successful_matches: 1,
            alerts_generated: 0,
        };
        assert_eq!(stats.success_rate(), 33.33);
    }
}
