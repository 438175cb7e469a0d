use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};

use crate::frame::Bbox;
use crate::recognize::engine::{FaceEngine, FaceRegion, MatchCandidate};

/// Scripted engine for tests. Returns pre-configured regions and candidates
/// regardless of input, and can be told to fail the next call.
pub struct ScriptedEngine {
    faces: Vec<FaceRegion>,
    candidates: Vec<MatchCandidate>,
    description: Option<String>,
    fail_next: bool,
    pub extract_calls: u64,
    pub find_calls: u64,
}

impl ScriptedEngine {
    /// By default the engine "sees" one confident face covering a small
    /// region, and knows nobody.
    pub fn new() -> Self {
        Self {
            faces: vec![FaceRegion {
                bbox: Bbox::new(10, 10, 40, 40),
                confidence: 0.95,
            }],
            candidates: Vec::new(),
            description: None,
            fail_next: false,
            extract_calls: 0,
            find_calls: 0,
        }
    }

    /// Report no faces at all from `extract_faces`.
    pub fn without_faces(mut self) -> Self {
        self.faces.clear();
        self
    }

    /// Report a face whose detector signals mark it as not-a-face
    /// (zero confidence, zero area).
    pub fn with_phantom_face(mut self) -> Self {
        self.faces = vec![FaceRegion {
            bbox: Bbox::new(0, 0, 0, 0),
            confidence: 0.0,
        }];
        self
    }

    pub fn with_candidate(mut self, identity_path: impl Into<PathBuf>, distance: f64) -> Self {
        self.candidates.push(MatchCandidate {
            identity_path: identity_path.into(),
            distance,
        });
        self
    }

    pub fn with_description(mut self, text: &str) -> Self {
        self.description = Some(text.to_string());
        self
    }

    /// Make the next engine call return an error.
    pub fn failing(mut self) -> Self {
        self.fail_next = true;
        self
    }

    fn take_failure(&mut self) -> Result<()> {
        if self.fail_next {
            self.fail_next = false;
            return Err(anyhow!("scripted engine failure"));
        }
        Ok(())
    }
}

impl Default for ScriptedEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FaceEngine for ScriptedEngine {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn extract_faces(&mut self, _image_path: &Path) -> Result<Vec<FaceRegion>> {
        self.extract_calls += 1;
        self.take_failure()?;
        Ok(self.faces.clone())
    }

    fn find_nearest(
        &mut self,
        _probe_path: &Path,
        _database_dir: &Path,
    ) -> Result<Vec<MatchCandidate>> {
        self.find_calls += 1;
        self.take_failure()?;
        Ok(self.candidates.clone())
    }

    fn describe(&mut self, _image_path: &Path) -> Result<Option<String>> {
        Ok(self.description.clone())
    }
}
