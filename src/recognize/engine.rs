use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::frame::Bbox;

/// A face found in an image by the engine's detector.
#[derive(Clone, Debug)]
pub struct FaceRegion {
    pub bbox: Bbox,
    /// Detector confidence in [0, 1]. Zero means the detector found nothing
    /// and returned a placeholder region.
    pub confidence: f32,
}

/// One nearest-neighbor hit from the reference database.
#[derive(Clone, Debug)]
pub struct MatchCandidate {
    /// Path of the reference image that matched. Role category and display
    /// name are recovered from this path.
    pub identity_path: PathBuf,
    /// Embedding distance; lower is closer. Expected in [0, 1].
    pub distance: f64,
}

/// Face detection and matching boundary.
///
/// Implementations take image *paths*, not pixels: the production engines
/// this wraps operate on files, so the resolver writes a temp crop before
/// each call. Candidates are returned best-first (lowest distance), but
/// callers must not rely on it — the resolver re-selects the minimum.
///
/// Engines run on the pipeline worker thread, hence `Send`.
pub trait FaceEngine: Send {
    /// Engine identifier, for logs.
    fn name(&self) -> &'static str;

    /// Detect faces in the image at `image_path`.
    fn extract_faces(&mut self, image_path: &Path) -> Result<Vec<FaceRegion>>;

    /// Find the closest reference images to the probe at `probe_path`.
    /// An empty database yields an empty candidate list, not an error.
    fn find_nearest(
        &mut self,
        probe_path: &Path,
        database_dir: &Path,
    ) -> Result<Vec<MatchCandidate>>;

    /// Optional free-text description of the face (used to annotate
    /// unknown-person alerts). Engines without this capability return None.
    fn describe(&mut self, _image_path: &Path) -> Result<Option<String>> {
        Ok(None)
    }
}
