use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::roles::AlertFilter;

const DEFAULT_DATABASE_DIR: &str = "database";
const DEFAULT_LOGS_DIR: &str = "logs";
const DEFAULT_TEMP_DIR: &str = "temp";
const DEFAULT_CAMERA_DEVICE: &str = "stub://camera";
const DEFAULT_CAMERA_FPS: u32 = 30;
const DEFAULT_CAMERA_WIDTH: u32 = 1280;
const DEFAULT_CAMERA_HEIGHT: u32 = 720;
const DEFAULT_THRESHOLD: f64 = 50.0;
const DEFAULT_PROCESS_EVERY_N: u64 = 10;
const DEFAULT_MAX_FACES: usize = 1;
const DEFAULT_TEMP_MAX_AGE_SECS: u64 = 600;
const DEFAULT_SWEEP_EVERY: u64 = 100;

#[derive(Debug, Deserialize, Default)]
struct FaceguardConfigFile {
    database_dir: Option<String>,
    logs_dir: Option<String>,
    temp_dir: Option<String>,
    camera: Option<CameraConfigFile>,
    recognition: Option<RecognitionConfigFile>,
    alerts: Option<AlertConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    device: Option<String>,
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct RecognitionConfigFile {
    threshold: Option<f64>,
    process_every_n: Option<u64>,
    max_faces: Option<usize>,
    temp_max_age_secs: Option<u64>,
    sweep_every: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct AlertConfigFile {
    filter: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FaceguardConfig {
    pub database_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub temp_dir: PathBuf,
    pub camera: CameraSettings,
    pub recognition: RecognitionSettings,
    pub alert_filter: AlertFilter,
}

#[derive(Debug, Clone)]
pub struct CameraSettings {
    pub device: String,
    pub target_fps: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct RecognitionSettings {
    /// Minimum match confidence (0-100) for a probe to count as identified.
    pub threshold: f64,
    /// Resolution runs on every Nth captured frame.
    pub process_every_n: u64,
    /// Upper bound on faces resolved per processed frame.
    pub max_faces: usize,
    /// Temp crops older than this are removed by the sweep.
    pub temp_max_age: Duration,
    /// The sweep runs every Nth processed frame.
    pub sweep_every: u64,
}

impl Default for FaceguardConfig {
    fn default() -> Self {
        Self::from_file(FaceguardConfigFile::default()).expect("defaults are valid")
    }
}

impl FaceguardConfig {
    /// Load configuration: file named by `FACEGUARD_CONFIG` (if set), then
    /// env-var overrides, then validation.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("FACEGUARD_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: FaceguardConfigFile) -> Result<Self> {
        let camera = CameraSettings {
            device: file
                .camera
                .as_ref()
                .and_then(|c| c.device.clone())
                .unwrap_or_else(|| DEFAULT_CAMERA_DEVICE.to_string()),
            target_fps: file
                .camera
                .as_ref()
                .and_then(|c| c.target_fps)
                .unwrap_or(DEFAULT_CAMERA_FPS),
            width: file
                .camera
                .as_ref()
                .and_then(|c| c.width)
                .unwrap_or(DEFAULT_CAMERA_WIDTH),
            height: file
                .camera
                .as_ref()
                .and_then(|c| c.height)
                .unwrap_or(DEFAULT_CAMERA_HEIGHT),
        };
        let recognition = RecognitionSettings {
            threshold: file
                .recognition
                .as_ref()
                .and_then(|r| r.threshold)
                .unwrap_or(DEFAULT_THRESHOLD),
            process_every_n: file
                .recognition
                .as_ref()
                .and_then(|r| r.process_every_n)
                .unwrap_or(DEFAULT_PROCESS_EVERY_N),
            max_faces: file
                .recognition
                .as_ref()
                .and_then(|r| r.max_faces)
                .unwrap_or(DEFAULT_MAX_FACES),
            temp_max_age: Duration::from_secs(
                file.recognition
                    .as_ref()
                    .and_then(|r| r.temp_max_age_secs)
                    .unwrap_or(DEFAULT_TEMP_MAX_AGE_SECS),
            ),
            sweep_every: file
                .recognition
                .as_ref()
                .and_then(|r| r.sweep_every)
                .unwrap_or(DEFAULT_SWEEP_EVERY),
        };
        let alert_filter = match file.alerts.and_then(|a| a.filter) {
            Some(level) => AlertFilter::parse(&level)?,
            None => AlertFilter::All,
        };
        Ok(Self {
            database_dir: PathBuf::from(
                file.database_dir
                    .unwrap_or_else(|| DEFAULT_DATABASE_DIR.to_string()),
            ),
            logs_dir: PathBuf::from(file.logs_dir.unwrap_or_else(|| DEFAULT_LOGS_DIR.to_string())),
            temp_dir: PathBuf::from(file.temp_dir.unwrap_or_else(|| DEFAULT_TEMP_DIR.to_string())),
            camera,
            recognition,
            alert_filter,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(dir) = std::env::var("FACEGUARD_DATABASE_DIR") {
            if !dir.trim().is_empty() {
                self.database_dir = PathBuf::from(dir);
            }
        }
        if let Ok(dir) = std::env::var("FACEGUARD_LOGS_DIR") {
            if !dir.trim().is_empty() {
                self.logs_dir = PathBuf::from(dir);
            }
        }
        if let Ok(dir) = std::env::var("FACEGUARD_TEMP_DIR") {
            if !dir.trim().is_empty() {
                self.temp_dir = PathBuf::from(dir);
            }
        }
        if let Ok(device) = std::env::var("FACEGUARD_CAMERA_DEVICE") {
            if !device.trim().is_empty() {
                self.camera.device = device;
            }
        }
        if let Ok(threshold) = std::env::var("FACEGUARD_THRESHOLD") {
            self.recognition.threshold = threshold
                .parse()
                .map_err(|_| anyhow!("FACEGUARD_THRESHOLD must be a number"))?;
        }
        if let Ok(every) = std::env::var("FACEGUARD_PROCESS_EVERY_N") {
            self.recognition.process_every_n = every
                .parse()
                .map_err(|_| anyhow!("FACEGUARD_PROCESS_EVERY_N must be an integer"))?;
        }
        if let Ok(filter) = std::env::var("FACEGUARD_ALERT_FILTER") {
            if !filter.trim().is_empty() {
                self.alert_filter = AlertFilter::parse(&filter)?;
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..=100.0).contains(&self.recognition.threshold) {
            return Err(anyhow!(
                "recognition threshold must be within 0-100, got {}",
                self.recognition.threshold
            ));
        }
        if self.recognition.process_every_n == 0 {
            return Err(anyhow!("process_every_n must be greater than zero"));
        }
        if self.recognition.max_faces == 0 {
            return Err(anyhow!("max_faces must be greater than zero"));
        }
        if self.recognition.sweep_every == 0 {
            return Err(anyhow!("sweep_every must be greater than zero"));
        }
        if self.camera.target_fps == 0 {
            return Err(anyhow!("camera target_fps must be greater than zero"));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!("camera dimensions must be greater than zero"));
        }
        Ok(())
    }

    /// Create the directories the session writes to.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.database_dir, &self.logs_dir, &self.temp_dir] {
            std::fs::create_dir_all(dir)
                .map_err(|e| anyhow!("failed to create {}: {}", dir.display(), e))?;
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<FaceguardConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_deployed_system() {
        let cfg = FaceguardConfig::default();
        assert_eq!(cfg.recognition.threshold, 50.0);
        assert_eq!(cfg.recognition.process_every_n, 10);
        assert_eq!(cfg.recognition.max_faces, 1);
        assert_eq!(cfg.recognition.temp_max_age.as_secs(), 600);
        assert_eq!(cfg.camera.width, 1280);
        assert_eq!(cfg.camera.height, 720);
        assert_eq!(cfg.alert_filter, AlertFilter::All);
    }

    #[test]
    fn validate_rejects_out_of_range_threshold() {
        let mut cfg = FaceguardConfig::default();
        cfg.recognition.threshold = 120.0;
        assert!(cfg.validate().is_err());

        cfg.recognition.threshold = -1.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_intervals() {
        let mut cfg = FaceguardConfig::default();
        cfg.recognition.process_every_n = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = FaceguardConfig::default();
        cfg.camera.target_fps = 0;
        assert!(cfg.validate().is_err());
    }
}
