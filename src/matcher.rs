//! Genome Vault - Face Matching
//!
//! Detection and embedding extraction sit behind the [`FaceModel`]
//! trait; the matcher owns selection (largest face wins), normalization,
//! thresholded cosine scoring and the one-entry-per-attempt audit rule.

use std::cmp::Ordering;
use std::sync::{Arc, OnceLock};

use image::RgbImage;
use ndarray::Array1;

use crate::audit::{AttemptEntry, AttemptLog};
use crate::error::{VaultError, VaultResult};
use crate::gallery::{l2_normalize, FaceGallery, GalleryIndex, EMBEDDING_DIM};

/// Default cosine similarity threshold for accepting a match
pub const DEFAULT_THRESHOLD: f32 = 0.5;

/// A detected face: bounding box `[x1, y1, x2, y2]` plus its raw
/// embedding
#[derive(Debug, Clone)]
pub struct DetectedFace {
    pub bbox: [f32; 4],
    pub embedding: Vec<f32>,
}

impl DetectedFace {
    /// Bounding-box area, the multi-face tie-break criterion
    pub fn area(&self) -> f32 {
        (self.bbox[2] - self.bbox[0]) * (self.bbox[3] - self.bbox[1])
    }
}

/// Face detection and embedding extraction model
pub trait FaceModel: Send + Sync {
    /// Detect all faces in a frame. Empty when none are present.
    fn detect(&self, frame: &RgbImage) -> Vec<DetectedFace>;
}

/// Process-wide model handle. The model is expensive to load, so it is
/// installed once and shared read-only by all sessions.
static MODEL: OnceLock<Arc<dyn FaceModel>> = OnceLock::new();

/// Install the shared face model. The first install wins; later calls
/// are ignored.
pub fn install_model(model: Arc<dyn FaceModel>) {
    let _ = MODEL.set(model);
}

/// The shared face model, if one has been installed
pub fn global_model() -> VaultResult<Arc<dyn FaceModel>> {
    MODEL.get().cloned().ok_or(VaultError::ModelNotLoaded)
}

/// Select the largest-area face from a detection result
pub fn largest_face(faces: Vec<DetectedFace>) -> Option<DetectedFace> {
    faces
        .into_iter()
        .max_by(|a, b| a.area().partial_cmp(&b.area()).unwrap_or(Ordering::Equal))
}

/// A successful gallery match
#[derive(Debug, Clone)]
pub struct FaceMatch {
    pub name: String,
    pub contact: String,
    pub similarity: f32,
    pub index: usize,
}

/// Matches captured frames against the admin gallery
pub struct FaceMatcher {
    model: Arc<dyn FaceModel>,
    threshold: f32,
}

impl FaceMatcher {
    pub fn new(model: Arc<dyn FaceModel>, threshold: f32) -> Self {
        Self { model, threshold }
    }

    /// Matcher backed by the process-wide model handle
    pub fn with_global(threshold: f32) -> VaultResult<Self> {
        Ok(Self::new(global_model()?, threshold))
    }

    pub fn model(&self) -> &dyn FaceModel {
        self.model.as_ref()
    }

    /// Extract the normalized embedding of the largest face in a frame
    pub fn embed(&self, frame: &RgbImage) -> VaultResult<Vec<f32>> {
        let face = largest_face(self.model.detect(frame)).ok_or(VaultError::NoFaceDetected)?;

        if face.embedding.len() != EMBEDDING_DIM {
            return Err(VaultError::InvalidEmbedding {
                expected: EMBEDDING_DIM,
                actual: face.embedding.len(),
            });
        }

        let mut embedding = face.embedding;
        l2_normalize(&mut embedding);
        Ok(embedding)
    }

    /// Register an admin from a captured frame.
    ///
    /// Fails with `NoFaceDetected` before anything is persisted.
    pub fn register(
        &self,
        gallery: &FaceGallery,
        frame: &RgbImage,
        name: &str,
        contact: &str,
    ) -> VaultResult<()> {
        let embedding = self.embed(frame)?;
        gallery.register(name, contact, frame, &embedding)
    }

    /// Match a frame against the gallery.
    ///
    /// Every call appends exactly one attempt-log entry, whichever way
    /// it exits.
    pub fn match_frame(
        &self,
        frame: &RgbImage,
        index: &GalleryIndex,
        log: &AttemptLog,
    ) -> VaultResult<FaceMatch> {
        if index.is_empty() {
            log.append(&AttemptEntry::unknown(0.0))?;
            return Err(VaultError::EmptyGallery);
        }

        let embedding = match self.embed(frame) {
            Ok(e) => e,
            Err(e) => {
                log.append(&AttemptEntry::unknown(0.0))?;
                return Err(e);
            }
        };

        let query = Array1::from(embedding);
        let (best_idx, best_sim) = index
            .best_match(&query)
            .ok_or(VaultError::EmptyGallery)?;

        if best_sim >= self.threshold {
            let name = index.name(best_idx).to_string();
            log.append(&AttemptEntry::matched(&name, best_sim))?;
            log::info!("face recognized as {} ({:.2})", name, best_sim);
            Ok(FaceMatch {
                contact: index.contact(best_idx).to_string(),
                name,
                similarity: best_sim,
                index: best_idx,
            })
        } else {
            log.append(&AttemptEntry::unknown(best_sim))?;
            Err(VaultError::NoMatch {
                best_similarity: best_sim,
            })
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Reference model
// ═══════════════════════════════════════════════════════════════════════════

/// Reference [`FaceModel`]: treats the whole frame as one face and
/// embeds it as a 32x16 grid of mean-centered cell luminances.
///
/// A near-uniform frame (no structure to embed) is reported as having
/// no face. This stands in for the CNN detector in the CLI and in
/// tests; a real model plugs in behind the same trait.
pub struct GridEmbedder;

impl GridEmbedder {
    const COLS: u32 = 32;
    const ROWS: u32 = 16;
    const MIN_STDDEV: f32 = 1.0;

    fn cell_means(frame: &RgbImage) -> Vec<f32> {
        let (w, h) = frame.dimensions();
        let mut sums = vec![0.0f64; EMBEDDING_DIM];
        let mut counts = vec![0u32; EMBEDDING_DIM];

        for (x, y, pixel) in frame.enumerate_pixels() {
            let luma =
                0.299 * pixel.0[0] as f64 + 0.587 * pixel.0[1] as f64 + 0.114 * pixel.0[2] as f64;
            let col = (x * Self::COLS / w).min(Self::COLS - 1);
            let row = (y * Self::ROWS / h).min(Self::ROWS - 1);
            let cell = (row * Self::COLS + col) as usize;
            sums[cell] += luma;
            counts[cell] += 1;
        }

        sums.iter()
            .zip(&counts)
            .map(|(&s, &c)| if c > 0 { (s / c as f64) as f32 } else { 0.0 })
            .collect()
    }
}

impl FaceModel for GridEmbedder {
    fn detect(&self, frame: &RgbImage) -> Vec<DetectedFace> {
        let (w, h) = frame.dimensions();
        if w == 0 || h == 0 {
            return Vec::new();
        }

        let mut cells = Self::cell_means(frame);
        let mean: f32 = cells.iter().sum::<f32>() / cells.len() as f32;
        let variance: f32 =
            cells.iter().map(|c| (c - mean) * (c - mean)).sum::<f32>() / cells.len() as f32;

        if variance.sqrt() < Self::MIN_STDDEV {
            return Vec::new();
        }

        for c in cells.iter_mut() {
            *c -= mean;
        }

        vec![DetectedFace {
            bbox: [0.0, 0.0, w as f32, h as f32],
            embedding: cells,
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    /// Model serving a canned detection result
    struct StubModel(Vec<DetectedFace>);

    impl FaceModel for StubModel {
        fn detect(&self, _frame: &RgbImage) -> Vec<DetectedFace> {
            self.0.clone()
        }
    }

    fn unit_vec(hot: usize) -> Vec<f32> {
        let mut v = vec![0.0; EMBEDDING_DIM];
        v[hot] = 1.0;
        v
    }

    fn face(bbox: [f32; 4], hot: usize) -> DetectedFace {
        DetectedFace {
            bbox,
            embedding: unit_vec(hot),
        }
    }

    #[test]
    fn test_largest_face_wins() {
        let faces = vec![
            face([0.0, 0.0, 10.0, 10.0], 0),
            face([0.0, 0.0, 50.0, 40.0], 1),
            face([0.0, 0.0, 20.0, 20.0], 2),
        ];
        let selected = largest_face(faces).unwrap();
        assert_eq!(selected.embedding[1], 1.0);
    }

    #[test]
    fn test_no_face_detected() {
        let dir = tempdir().unwrap();
        let log = AttemptLog::new(dir.path().join("log.csv"));
        let gallery = FaceGallery::open(dir.path().join("gallery"), "m@x.com").unwrap();
        gallery
            .register("alice", "a@x.com", &RgbImage::new(8, 8), &unit_vec(0))
            .unwrap();

        let matcher = FaceMatcher::new(Arc::new(StubModel(Vec::new())), DEFAULT_THRESHOLD);
        let index = gallery.load(matcher.model()).unwrap();

        let result = matcher.match_frame(&RgbImage::new(8, 8), &index, &log);
        assert!(matches!(result, Err(VaultError::NoFaceDetected)));

        let content = log.read().unwrap();
        assert!(content.lines().nth(1).unwrap().contains("Unknown,0.0000,False"));
    }

    #[test]
    fn test_empty_gallery_logged() {
        let dir = tempdir().unwrap();
        let log = AttemptLog::new(dir.path().join("log.csv"));
        let gallery = FaceGallery::open(dir.path().join("gallery"), "m@x.com").unwrap();

        let matcher = FaceMatcher::new(
            Arc::new(StubModel(vec![face([0.0, 0.0, 8.0, 8.0], 0)])),
            DEFAULT_THRESHOLD,
        );
        let index = gallery.load(matcher.model()).unwrap();

        let result = matcher.match_frame(&RgbImage::new(8, 8), &index, &log);
        assert!(matches!(result, Err(VaultError::EmptyGallery)));
        assert_eq!(log.read().unwrap().lines().count(), 2);
    }

    #[test]
    fn test_duplicate_embedding_matches_at_one() {
        let dir = tempdir().unwrap();
        let log = AttemptLog::new(dir.path().join("log.csv"));
        let gallery = FaceGallery::open(dir.path().join("gallery"), "m@x.com").unwrap();
        gallery
            .register("alice", "a@x.com", &RgbImage::new(8, 8), &unit_vec(5))
            .unwrap();

        let matcher = FaceMatcher::new(
            Arc::new(StubModel(vec![face([0.0, 0.0, 8.0, 8.0], 5)])),
            DEFAULT_THRESHOLD,
        );
        let index = gallery.load(matcher.model()).unwrap();

        let matched = matcher.match_frame(&RgbImage::new(8, 8), &index, &log).unwrap();
        assert_eq!(matched.name, "alice");
        assert_eq!(matched.contact, "a@x.com");
        assert!((matched.similarity - 1.0).abs() < 1e-4);

        let content = log.read().unwrap();
        assert!(content.lines().nth(1).unwrap().contains("alice,1.0000,True"));
    }

    #[test]
    fn test_orthogonal_embedding_below_threshold() {
        let dir = tempdir().unwrap();
        let log = AttemptLog::new(dir.path().join("log.csv"));
        let gallery = FaceGallery::open(dir.path().join("gallery"), "m@x.com").unwrap();
        gallery
            .register("alice", "a@x.com", &RgbImage::new(8, 8), &unit_vec(0))
            .unwrap();

        let matcher = FaceMatcher::new(
            Arc::new(StubModel(vec![face([0.0, 0.0, 8.0, 8.0], 1)])),
            DEFAULT_THRESHOLD,
        );
        let index = gallery.load(matcher.model()).unwrap();

        let result = matcher.match_frame(&RgbImage::new(8, 8), &index, &log);
        match result {
            Err(VaultError::NoMatch { best_similarity }) => {
                assert!(best_similarity.abs() < 1e-4);
            }
            other => panic!("expected NoMatch, got {:?}", other.map(|m| m.name)),
        }

        // Failure still carries the best score into the log
        assert!(log.read().unwrap().contains("Unknown,"));
    }

    #[test]
    fn test_grid_embedder_deterministic() {
        let mut frame = RgbImage::new(64, 64);
        for (x, y, pixel) in frame.enumerate_pixels_mut() {
            pixel.0 = [(x * 3) as u8, (y * 2) as u8, ((x + y) % 255) as u8];
        }

        let model = GridEmbedder;
        let a = model.detect(&frame);
        let b = model.detect(&frame);
        assert_eq!(a.len(), 1);
        assert_eq!(a[0].embedding, b[0].embedding);
        assert_eq!(a[0].embedding.len(), EMBEDDING_DIM);
    }

    #[test]
    fn test_grid_embedder_rejects_blank_frame() {
        let model = GridEmbedder;
        assert!(model.detect(&RgbImage::new(64, 64)).is_empty());
    }
}
