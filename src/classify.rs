//! Role/alert classification and per-frame analysis.
//!
//! The classifier is a pure mapping from a resolution to a `Detection`
//! record; policy comes from the matched category's associated data. An
//! unresolved face is always "No autorizado" at critical severity — no
//! configuration can soften that, because an unrecognized presence is the
//! signal this system exists to surface.

use chrono::Local;
use serde::Serialize;
use uuid::Uuid;

use crate::config::FaceguardConfig;
use crate::frame::{Bbox, Frame};
use crate::recognize::FaceEngine;
use crate::resolver::{IdentityResolver, Resolution};
use crate::roles::AlertSeverity;
use crate::tempfiles::TempStore;

/// One resolved face observation in one processed frame.
///
/// Serialized field names are the wire format of the structured alert log.
#[derive(Clone, Debug, Serialize)]
pub struct Detection {
    pub id: String,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "rol")]
    pub role: String,
    #[serde(rename = "confianza")]
    pub confidence: f64,
    #[serde(rename = "autorizado")]
    pub authorized: bool,
    #[serde(rename = "nivel_acceso")]
    pub access_level: i32,
    pub bbox: Bbox,
    /// ISO-8601 wall-clock time of classification.
    pub timestamp: String,
    #[serde(rename = "genera_alerta")]
    pub raises_alert: bool,
    #[serde(rename = "tipo_alerta")]
    pub severity: Option<AlertSeverity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<String>,
}

impl Detection {
    pub fn severity_or_low(&self) -> AlertSeverity {
        self.severity.unwrap_or(AlertSeverity::Low)
    }
}

/// Map a resolution onto a detection record. `NoFace` yields none.
pub fn classify(resolution: &Resolution, bbox: Bbox) -> Option<Detection> {
    let timestamp = Local::now().to_rfc3339();
    let id = short_id();

    match resolution {
        Resolution::NoFace => None,
        Resolution::Matched {
            name,
            category,
            confidence,
        } => {
            let policy = category.alert_policy();
            Some(Detection {
                id,
                name: name.clone(),
                role: category.label().to_string(),
                confidence: *confidence,
                authorized: true,
                access_level: category.access_level(),
                bbox,
                timestamp,
                raises_alert: policy.is_some(),
                severity: policy,
                analysis: None,
            })
        }
        Resolution::Unknown { analysis } => Some(Detection {
            id,
            name: "Desconocido".to_string(),
            role: "No autorizado".to_string(),
            confidence: 0.0,
            authorized: false,
            access_level: 0,
            bbox,
            timestamp,
            raises_alert: true,
            severity: Some(AlertSeverity::Critical),
            analysis: analysis.clone(),
        }),
    }
}

fn short_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Everything one processed frame produced.
#[derive(Debug, Default)]
pub struct FrameOutcome {
    pub detections: Vec<Detection>,
    /// Crops of unrecognized faces, for archival by the session loop.
    pub unknown_crops: Vec<Frame>,
}

/// The pipeline worker's unit of work: full frame in, detections out.
///
/// Composes the detector pass (where are the faces), the resolver (who are
/// they) and the classifier (what does that mean). Also owns the periodic
/// temp-file sweep, which runs every Nth analyzed frame.
pub struct FrameAnalyzer {
    resolver: IdentityResolver,
    max_faces: usize,
    sweep_every: u64,
    temp_max_age: std::time::Duration,
    frames_analyzed: u64,
}

impl FrameAnalyzer {
    pub fn new(engine: Box<dyn FaceEngine>, config: &FaceguardConfig) -> anyhow::Result<Self> {
        let temp = TempStore::new(&config.temp_dir)?;
        let resolver = IdentityResolver::new(
            engine,
            &config.database_dir,
            temp,
            config.recognition.threshold,
        );
        Ok(Self {
            resolver,
            max_faces: config.recognition.max_faces,
            sweep_every: config.recognition.sweep_every,
            temp_max_age: config.recognition.temp_max_age,
            frames_analyzed: 0,
        })
    }

    pub fn engine_name(&self) -> &'static str {
        self.resolver.engine_name()
    }

    pub fn analyze(&mut self, frame: &Frame) -> FrameOutcome {
        self.frames_analyzed += 1;
        if self.frames_analyzed % self.sweep_every == 0 {
            self.resolver.temp().sweep(self.temp_max_age);
        }

        let mut outcome = FrameOutcome::default();

        let image = match frame.to_image() {
            Ok(image) => image,
            Err(err) => {
                log::error!("analyzer: unusable frame: {}", err);
                return outcome;
            }
        };
        let frame_path = match self.resolver.temp().save_jpeg("deteccion", &image) {
            Ok(path) => path,
            Err(err) => {
                log::error!("analyzer: failed to stage frame: {}", err);
                return outcome;
            }
        };

        let regions = match self.resolver.detect_faces(&frame_path) {
            Ok(regions) => regions,
            Err(err) => {
                log::error!("analyzer: face detection failed: {}", err);
                return outcome;
            }
        };
        log::debug!("analyzer: {} face(s) detected", regions.len());

        for region in regions.into_iter().take(self.max_faces) {
            let crop = match frame.crop(&region.bbox) {
                Ok(crop) => crop,
                Err(err) => {
                    log::error!("analyzer: bad face region {:?}: {}", region.bbox, err);
                    continue;
                }
            };

            let resolution = self.resolver.resolve(&crop);
            let Some(detection) = classify(&resolution, region.bbox) else {
                continue;
            };
            if !detection.authorized {
                outcome.unknown_crops.push(crop);
            }
            outcome.detections.push(detection);
        }

        outcome
    }
}
