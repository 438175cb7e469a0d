//! Alert persistence.
//!
//! Alert-worthy detections go to two dated files under the logs directory:
//! a severity-tagged human-readable text log and a structured JSON Lines
//! file (one record per line, append-only — the record shape matches what
//! downstream tooling already consumes). A configured minimum severity
//! gates both files uniformly; unknown-person criticals pass through the
//! same gate as everything else.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::classify::Detection;
use crate::frame::Bbox;
use crate::roles::{AlertFilter, AlertSeverity};
use crate::session::SessionStats;

const RECENT_ALERTS: usize = 10;

/// One persisted alert, as written to the structured log.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AlertRecord {
    pub timestamp: String,
    pub fecha: String,
    pub hora: String,
    pub nombre: String,
    pub rol: String,
    pub nivel_acceso: i32,
    pub confianza: f64,
    pub tipo_alerta: AlertSeverity,
    pub bbox: Bbox,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<String>,
}

impl AlertRecord {
    fn from_detection(detection: &Detection, now: DateTime<Local>) -> Self {
        Self {
            timestamp: now.to_rfc3339(),
            fecha: now.format("%Y-%m-%d").to_string(),
            hora: now.format("%H:%M:%S").to_string(),
            nombre: detection.name.clone(),
            rol: detection.role.clone(),
            nivel_acceso: detection.access_level,
            confianza: detection.confidence,
            tipo_alerta: detection.severity_or_low(),
            bbox: detection.bbox,
            analysis: detection.analysis.clone(),
        }
    }
}

/// Aggregate view of one day's alerts.
#[derive(Clone, Debug, Default)]
pub struct AlertDayStats {
    pub total: usize,
    pub by_severity: BTreeMap<String, usize>,
    pub by_person: BTreeMap<String, usize>,
    pub recent: Vec<AlertRecord>,
}

/// Dated alert log pair (text + JSON Lines).
pub struct AlertLog {
    filter: AlertFilter,
    text_path: PathBuf,
    json_path: PathBuf,
}

impl AlertLog {
    pub fn new(logs_dir: &Path, filter: AlertFilter) -> Result<Self> {
        std::fs::create_dir_all(logs_dir)
            .with_context(|| format!("creating logs dir {}", logs_dir.display()))?;
        let day = Local::now().format("%Y%m%d");
        Ok(Self {
            filter,
            text_path: logs_dir.join(format!("alertas_{}.log", day)),
            json_path: logs_dir.join(format!("alertas_{}.jsonl", day)),
        })
    }

    pub fn text_path(&self) -> &Path {
        &self.text_path
    }

    pub fn json_path(&self) -> &Path {
        &self.json_path
    }

    /// Persist an alert-worthy detection. Returns whether the severity
    /// filter admitted it (a suppressed alert writes nothing anywhere).
    pub fn log_alert(&self, detection: &Detection) -> Result<bool> {
        let severity = detection.severity_or_low();
        if !self.filter.allows(severity) {
            log::debug!(
                "alert [{}] for {} suppressed by filter",
                severity.as_str(),
                detection.name
            );
            return Ok(false);
        }

        let level = match severity {
            AlertSeverity::Critical => "CRITICAL",
            AlertSeverity::High => "ERROR",
            AlertSeverity::Medium => "WARNING",
            AlertSeverity::Low => "INFO",
        };
        let now = Local::now();
        let message = format!(
            "ALERTA [{}] | Persona: {} | Rol: {} | Confianza: {}% | Ubicacion: ({}, {})",
            severity.as_str().to_uppercase(),
            detection.name,
            detection.role,
            detection.confidence,
            detection.bbox.x,
            detection.bbox.y
        );
        self.append_text(&now, level, &message)?;

        let record = AlertRecord::from_detection(detection, now);
        let line = serde_json::to_string(&record).context("serializing alert record")?;
        append_line(&self.json_path, &line)?;
        Ok(true)
    }

    /// Record an authorized (non-alert) detection in the text log.
    pub fn log_detection(&self, detection: &Detection) -> Result<()> {
        let message = format!(
            "DETECCION | Persona: {} | Rol: {} | Confianza: {}%",
            detection.name, detection.role, detection.confidence
        );
        self.append_text(&Local::now(), "INFO", &message)
    }

    pub fn log_session_start(&self) -> Result<()> {
        let now = Local::now();
        self.append_text(&now, "INFO", &"=".repeat(80))?;
        self.append_text(&now, "INFO", "NUEVA SESION DE RECONOCIMIENTO INICIADA")?;
        self.append_text(&now, "INFO", &"=".repeat(80))
    }

    pub fn log_session_end(&self, stats: &SessionStats) -> Result<()> {
        let now = Local::now();
        self.append_text(&now, "INFO", &"-".repeat(80))?;
        self.append_text(&now, "INFO", "SESION DE RECONOCIMIENTO FINALIZADA")?;
        self.append_text(
            &now,
            "INFO",
            &format!("Frames procesados: {}", stats.frames_processed),
        )?;
        self.append_text(
            &now,
            "INFO",
            &format!("Detecciones totales: {}", stats.total_detections),
        )?;
        self.append_text(
            &now,
            "INFO",
            &format!("Alertas generadas: {}", stats.alerts_generated),
        )?;
        self.append_text(&now, "INFO", &"=".repeat(80))
    }

    /// Read back today's structured alerts. A missing file is an empty day;
    /// unreadable lines are skipped so one corrupt record does not hide the
    /// rest of the history.
    pub fn alerts_for_today(&self) -> Result<Vec<AlertRecord>> {
        if !self.json_path.exists() {
            return Ok(Vec::new());
        }
        let raw = std::fs::read_to_string(&self.json_path)
            .with_context(|| format!("reading {}", self.json_path.display()))?;

        let mut records = Vec::new();
        for (number, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<AlertRecord>(line) {
                Ok(record) => records.push(record),
                Err(err) => {
                    log::warn!(
                        "skipping corrupt alert record at {}:{}: {}",
                        self.json_path.display(),
                        number + 1,
                        err
                    );
                }
            }
        }
        Ok(records)
    }

    pub fn stats_for_today(&self) -> Result<AlertDayStats> {
        let records = self.alerts_for_today()?;
        let mut stats = AlertDayStats {
            total: records.len(),
            ..AlertDayStats::default()
        };
        for record in &records {
            *stats
                .by_severity
                .entry(record.tipo_alerta.as_str().to_string())
                .or_insert(0) += 1;
            *stats.by_person.entry(record.nombre.clone()).or_insert(0) += 1;
        }
        let skip = records.len().saturating_sub(RECENT_ALERTS);
        stats.recent = records.into_iter().skip(skip).collect();
        Ok(stats)
    }

    fn append_text(&self, now: &DateTime<Local>, level: &str, message: &str) -> Result<()> {
        let line = format!("{} | {} | {}", now.format("%Y-%m-%d %H:%M:%S"), level, message);
        append_line(&self.text_path, &line)
    }
}

fn append_line(path: &Path, line: &str) -> Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening {}", path.display()))?;
    writeln!(file, "{}", line).with_context(|| format!("appending to {}", path.display()))?;
    Ok(())
}
