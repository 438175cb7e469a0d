use anyhow::{Context, Result};
use image::RgbImage;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::frame::Bbox;
use crate::recognize::engine::{FaceEngine, FaceRegion, MatchCandidate};
use crate::roster::is_image_file;

/// Bins per channel; the embedding is a joint RGB histogram of BINS^3 cells.
const BINS: usize = 4;
/// Luminance variance below this reads as a flat image with nothing in it.
const MIN_FACE_VARIANCE: f64 = 50.0;

/// Self-contained CPU engine: joint color-histogram embeddings and L2
/// nearest-neighbor over the reference database.
///
/// This is a development stand-in for a real face-embedding engine, good
/// enough to exercise the full pipeline end to end. Reference embeddings are
/// cached by content digest, so repeated lookups do not re-decode the
/// database.
pub struct HistogramEngine {
    cache: HashMap<PathBuf, CachedEmbedding>,
}

struct CachedEmbedding {
    digest: [u8; 32],
    embedding: Vec<f32>,
}

impl HistogramEngine {
    pub fn new() -> Self {
        Self {
            cache: HashMap::new(),
        }
    }

    fn embedding_for(&mut self, path: &Path) -> Result<Vec<f32>> {
        let bytes =
            std::fs::read(path).with_context(|| format!("reading image {}", path.display()))?;
        let digest: [u8; 32] = Sha256::digest(&bytes).into();

        if let Some(cached) = self.cache.get(path) {
            if cached.digest == digest {
                return Ok(cached.embedding.clone());
            }
        }

        let image = image::load_from_memory(&bytes)
            .with_context(|| format!("decoding image {}", path.display()))?
            .to_rgb8();
        let embedding = embed(&image);
        self.cache.insert(
            path.to_path_buf(),
            CachedEmbedding {
                digest,
                embedding: embedding.clone(),
            },
        );
        Ok(embedding)
    }
}

impl Default for HistogramEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FaceEngine for HistogramEngine {
    fn name(&self) -> &'static str {
        "histogram"
    }

    fn extract_faces(&mut self, image_path: &Path) -> Result<Vec<FaceRegion>> {
        let image = image::open(image_path)
            .with_context(|| format!("opening image {}", image_path.display()))?
            .to_rgb8();

        let variance = luminance_variance(&image);
        if variance < MIN_FACE_VARIANCE {
            return Ok(Vec::new());
        }

        // No spatial localization: report one region covering the image,
        // with confidence growing with scene contrast.
        let confidence = (variance / (variance + 500.0)) as f32;
        Ok(vec![FaceRegion {
            bbox: Bbox::new(0, 0, image.width(), image.height()),
            confidence,
        }])
    }

    fn find_nearest(
        &mut self,
        probe_path: &Path,
        database_dir: &Path,
    ) -> Result<Vec<MatchCandidate>> {
        let probe = self.embedding_for(probe_path)?;

        let mut references = Vec::new();
        collect_images(database_dir, &mut references)?;

        let mut candidates = Vec::with_capacity(references.len());
        for reference in references {
            let embedding = match self.embedding_for(&reference) {
                Ok(embedding) => embedding,
                Err(err) => {
                    log::warn!("skipping unreadable reference {}: {}", reference.display(), err);
                    continue;
                }
            };
            candidates.push(MatchCandidate {
                distance: distance(&probe, &embedding),
                identity_path: reference,
            });
        }

        candidates.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        Ok(candidates)
    }
}

fn embed(image: &RgbImage) -> Vec<f32> {
    let mut histogram = vec![0u32; BINS * BINS * BINS];
    let shift = 8 - BINS.trailing_zeros() as usize; // 256 -> BINS buckets

    for pixel in image.pixels() {
        let r = (pixel[0] >> shift) as usize;
        let g = (pixel[1] >> shift) as usize;
        let b = (pixel[2] >> shift) as usize;
        histogram[(r * BINS + g) * BINS + b] += 1;
    }

    let total = (image.width() as f32 * image.height() as f32).max(1.0);
    histogram.iter().map(|&count| count as f32 / total).collect()
}

/// L2 between normalized histograms, scaled into [0, 1].
fn distance(a: &[f32], b: &[f32]) -> f64 {
    let sum_sq: f64 = a
        .iter()
        .zip(b)
        .map(|(x, y)| {
            let d = (*x - *y) as f64;
            d * d
        })
        .sum();
    (sum_sq.sqrt() / std::f64::consts::SQRT_2).clamp(0.0, 1.0)
}

fn luminance_variance(image: &RgbImage) -> f64 {
    let count = (image.width() as f64 * image.height() as f64).max(1.0);
    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    for pixel in image.pixels() {
        let luma =
            0.299 * pixel[0] as f64 + 0.587 * pixel[1] as f64 + 0.114 * pixel[2] as f64;
        sum += luma;
        sum_sq += luma * luma;
    }
    let mean = sum / count;
    (sum_sq / count - mean * mean).max(0.0)
}

fn collect_images(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }
    for entry in
        std::fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))?
    {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_images(&path, out)?;
        } else if is_image_file(&path) {
            out.push(path);
        }
    }
    Ok(())
}
