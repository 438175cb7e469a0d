//! Identity resolution.
//!
//! Given a face crop, find the closest registered person. Every failure
//! path here leans toward denial: an engine error, an unreadable crop, or a
//! low-confidence match all resolve to `Unknown`, never to an
//! authorization. The one exception is a crop the detector itself rejects
//! (`NoFace`), which produces no detection at all rather than an
//! unknown-person alert.

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::frame::Frame;
use crate::recognize::{FaceEngine, FaceRegion};
use crate::roles::RoleCategory;
use crate::roster;
use crate::tempfiles::TempStore;

/// Outcome of resolving one face crop.
#[derive(Clone, Debug)]
pub enum Resolution {
    /// The detector found no real face in the crop. Not an alert.
    NoFace,
    /// Nobody matched confidently enough. Always treated as unauthorized.
    Unknown { analysis: Option<String> },
    /// A registered person matched at or above the threshold.
    Matched {
        name: String,
        category: RoleCategory,
        confidence: f64,
    },
}

pub struct IdentityResolver {
    engine: Box<dyn FaceEngine>,
    database_dir: PathBuf,
    temp: TempStore,
    threshold: f64,
}

impl IdentityResolver {
    pub fn new(
        engine: Box<dyn FaceEngine>,
        database_dir: impl Into<PathBuf>,
        temp: TempStore,
        threshold: f64,
    ) -> Self {
        Self {
            engine,
            database_dir: database_dir.into(),
            temp,
            threshold,
        }
    }

    pub fn temp(&self) -> &TempStore {
        &self.temp
    }

    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }

    /// Detect faces in an already-written image file.
    pub fn detect_faces(&mut self, image_path: &Path) -> Result<Vec<FaceRegion>> {
        self.engine.extract_faces(image_path)
    }

    /// Resolve one face crop. Never fails outward; see the module docs for
    /// how each failure mode maps.
    pub fn resolve(&mut self, crop: &Frame) -> Resolution {
        let image = match crop.to_image() {
            Ok(image) => image,
            Err(err) => {
                log::error!("resolver: unusable crop: {}", err);
                return Resolution::Unknown { analysis: None };
            }
        };
        let probe_path = match self.temp.save_jpeg("rostro", &image) {
            Ok(path) => path,
            Err(err) => {
                log::error!("resolver: failed to stage probe: {}", err);
                return Resolution::Unknown { analysis: None };
            }
        };

        // Re-check the crop with the detector. Zero confidence or zero area
        // means the original detection was a phantom: no person, no alert.
        match self.engine.extract_faces(&probe_path) {
            Ok(regions) => {
                let valid = regions
                    .first()
                    .map(|r| r.confidence > 0.0 && r.bbox.area() > 0)
                    .unwrap_or(false);
                if !valid {
                    log::info!("resolver: no real face in crop, skipping");
                    return Resolution::NoFace;
                }
            }
            Err(err) => {
                log::error!("resolver: face re-check failed: {}", err);
                return Resolution::Unknown { analysis: None };
            }
        }

        let candidates = match self.engine.find_nearest(&probe_path, &self.database_dir) {
            Ok(candidates) => candidates,
            Err(err) => {
                log::error!("resolver: match lookup failed: {}", err);
                return Resolution::Unknown { analysis: None };
            }
        };

        let Some(best) = candidates
            .iter()
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
        else {
            log::warn!("resolver: no candidates in reference database");
            return self.unknown_with_analysis(&probe_path);
        };

        let confidence = round2((1.0 - best.distance) * 100.0);
        log::info!(
            "resolver: best match {} distance {:.4} confidence {}%",
            best.identity_path.display(),
            best.distance,
            confidence
        );

        if confidence < self.threshold {
            log::warn!(
                "resolver: confidence {}% below threshold {}%",
                confidence,
                self.threshold
            );
            return self.unknown_with_analysis(&probe_path);
        }

        let Some(category) = roster::category_from_path(&best.identity_path) else {
            log::warn!(
                "resolver: matched image outside any role category: {}",
                best.identity_path.display()
            );
            return self.unknown_with_analysis(&probe_path);
        };

        Resolution::Matched {
            name: roster::person_from_path(&best.identity_path),
            category,
            confidence,
        }
    }

    /// Best-effort descriptive summary for an unknown face.
    fn unknown_with_analysis(&mut self, probe_path: &Path) -> Resolution {
        let analysis = match self.engine.describe(probe_path) {
            Ok(analysis) => analysis,
            Err(err) => {
                log::warn!("resolver: describe failed: {}", err);
                None
            }
        };
        Resolution::Unknown { analysis }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
