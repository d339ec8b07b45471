//! Genome Vault - Admin Face Gallery
//!
//! Persisted registry of admin identities. Per admin, three artifacts
//! keyed by name: a reference still (`{name}.png`), a contact address
//! (`{name}.txt`) and a serialized embedding (`{name}.emb`, little-endian
//! f32, 512 dims, L2-normalized). The embedding is recomputed from the
//! still and cached when the `.emb` file is absent.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use image::RgbImage;
use ndarray::{Array1, Array2};

use crate::error::{VaultError, VaultResult};
use crate::matcher::{largest_face, FaceModel};

/// Embedding dimension produced by the face model
pub const EMBEDDING_DIM: usize = 512;

/// L2-normalize a vector in place so cosine similarity reduces to a
/// dot product
pub fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    let denom = norm + 1e-10;
    for x in v.iter_mut() {
        *x /= denom;
    }
}

/// On-disk gallery of registered admins
pub struct FaceGallery {
    root: PathBuf,
    master_contact: String,
}

impl FaceGallery {
    /// Open (creating if needed) a gallery directory.
    ///
    /// `master_contact` is the fallback address for entries whose
    /// contact file is missing or unreadable.
    pub fn open<P: AsRef<Path>>(root: P, master_contact: &str) -> VaultResult<Self> {
        fs::create_dir_all(root.as_ref())?;
        Ok(Self {
            root: root.as_ref().to_path_buf(),
            master_contact: master_contact.to_string(),
        })
    }

    /// Register (or overwrite) an admin identity.
    ///
    /// Writes all three artifacts; the embedding is normalized before
    /// storage. Names double as file stems, so path separators are
    /// rejected.
    pub fn register(
        &self,
        name: &str,
        contact: &str,
        still: &RgbImage,
        embedding: &[f32],
    ) -> VaultResult<()> {
        validate_name(name)?;
        if embedding.len() != EMBEDDING_DIM {
            return Err(VaultError::InvalidEmbedding {
                expected: EMBEDDING_DIM,
                actual: embedding.len(),
            });
        }

        let mut normalized = embedding.to_vec();
        l2_normalize(&mut normalized);

        let mut png = Vec::new();
        image::DynamicImage::ImageRgb8(still.clone())
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)?;

        self.write_atomic(&self.image_path(name), &png)?;
        self.write_atomic(&self.contact_path(name), contact.trim().as_bytes())?;
        self.write_atomic(&self.embedding_path(name), &encode_embedding(&normalized))?;

        Ok(())
    }

    /// Load every registered identity into a stacked index.
    ///
    /// Entries with no cached embedding are recomputed from the still
    /// and cached; entries whose still has no detectable face (or whose
    /// cached vector is malformed) are skipped.
    pub fn load(&self, model: &dyn FaceModel) -> VaultResult<GalleryIndex> {
        let mut stems: Vec<String> = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("png") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    stems.push(stem.to_string());
                }
            }
        }
        stems.sort();

        let mut names = Vec::new();
        let mut contacts = Vec::new();
        let mut flat: Vec<f32> = Vec::new();

        for name in stems {
            let embedding = match self.load_embedding(&name, model)? {
                Some(v) => v,
                None => {
                    log::warn!("gallery entry {:?} has no usable embedding, skipping", name);
                    continue;
                }
            };

            let contact = fs::read_to_string(self.contact_path(&name))
                .map(|s| s.trim().to_string())
                .unwrap_or_else(|_| self.master_contact.clone());

            names.push(name);
            contacts.push(contact);
            flat.extend_from_slice(&embedding);
        }

        let matrix = Array2::from_shape_vec((names.len(), EMBEDDING_DIM), flat)
            .map_err(|e| VaultError::GalleryCorrupted(e.to_string()))?;

        Ok(GalleryIndex {
            names,
            contacts,
            matrix,
        })
    }

    /// Cached embedding for `name`, recomputing from the still when the
    /// `.emb` artifact is absent
    fn load_embedding(&self, name: &str, model: &dyn FaceModel) -> VaultResult<Option<Vec<f32>>> {
        let emb_path = self.embedding_path(name);

        if emb_path.exists() {
            let raw = fs::read(&emb_path)?;
            return Ok(decode_embedding(&raw));
        }

        let still = match image::open(self.image_path(name)) {
            Ok(img) => img.to_rgb8(),
            Err(_) => return Ok(None),
        };

        let face = match largest_face(model.detect(&still)) {
            Some(f) => f,
            None => return Ok(None),
        };

        if face.embedding.len() != EMBEDDING_DIM {
            return Ok(None);
        }

        let mut embedding = face.embedding;
        l2_normalize(&mut embedding);
        self.write_atomic(&emb_path, &encode_embedding(&embedding))?;

        Ok(Some(embedding))
    }

    fn image_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.png", name))
    }

    fn contact_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.txt", name))
    }

    fn embedding_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.emb", name))
    }

    /// Write via temp file + rename so readers never observe a torn
    /// artifact
    fn write_atomic(&self, path: &Path, data: &[u8]) -> VaultResult<()> {
        let temp_path = path.with_extension("tmp");

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)?;
        file.write_all(data)?;
        file.sync_all()?;

        fs::rename(&temp_path, path)?;
        Ok(())
    }
}

fn validate_name(name: &str) -> VaultResult<()> {
    if name.is_empty() {
        return Err(VaultError::InvalidInput("admin name must not be empty".into()));
    }
    if name.contains(['/', '\\']) || name.contains("..") {
        return Err(VaultError::InvalidInput(format!(
            "admin name {:?} is not a valid file stem",
            name
        )));
    }
    Ok(())
}

fn encode_embedding(v: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(v.len() * 4);
    for x in v {
        out.extend_from_slice(&x.to_le_bytes());
    }
    out
}

fn decode_embedding(raw: &[u8]) -> Option<Vec<f32>> {
    if raw.len() != EMBEDDING_DIM * 4 {
        return None;
    }
    Some(
        raw.chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    )
}

/// In-memory stacking of all gallery embeddings for batched scoring
pub struct GalleryIndex {
    names: Vec<String>,
    contacts: Vec<String>,
    matrix: Array2<f32>,
}

impl GalleryIndex {
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn name(&self, index: usize) -> &str {
        &self.names[index]
    }

    pub fn contact(&self, index: usize) -> &str {
        &self.contacts[index]
    }

    /// Argmax of cosine similarity against every gallery entry.
    ///
    /// Embeddings are normalized at registration, so this is a single
    /// matrix-vector product.
    pub fn best_match(&self, embedding: &Array1<f32>) -> Option<(usize, f32)> {
        if self.is_empty() {
            return None;
        }

        let sims = self.matrix.dot(embedding);
        let mut best_idx = 0;
        let mut best_sim = f32::NEG_INFINITY;
        for (i, &sim) in sims.iter().enumerate() {
            if sim > best_sim {
                best_idx = i;
                best_sim = sim;
            }
        }
        Some((best_idx, best_sim))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::DetectedFace;
    use tempfile::tempdir;

    /// Model that reports one full-frame face with a canned embedding
    struct FixedModel(Vec<f32>);

    impl FaceModel for FixedModel {
        fn detect(&self, frame: &RgbImage) -> Vec<DetectedFace> {
            vec![DetectedFace {
                bbox: [0.0, 0.0, frame.width() as f32, frame.height() as f32],
                embedding: self.0.clone(),
            }]
        }
    }

    fn unit_vec(hot: usize) -> Vec<f32> {
        let mut v = vec![0.0; EMBEDDING_DIM];
        v[hot] = 1.0;
        v
    }

    #[test]
    fn test_register_writes_three_artifacts() {
        let dir = tempdir().unwrap();
        let gallery = FaceGallery::open(dir.path(), "master@example.com").unwrap();

        gallery
            .register("alice", "a@x.com", &RgbImage::new(8, 8), &unit_vec(0))
            .unwrap();

        assert!(dir.path().join("alice.png").exists());
        assert!(dir.path().join("alice.txt").exists());
        assert!(dir.path().join("alice.emb").exists());
    }

    #[test]
    fn test_load_stacks_entries_sorted() {
        let dir = tempdir().unwrap();
        let gallery = FaceGallery::open(dir.path(), "master@example.com").unwrap();
        let frame = RgbImage::new(8, 8);

        gallery.register("bob", "b@x.com", &frame, &unit_vec(1)).unwrap();
        gallery.register("alice", "a@x.com", &frame, &unit_vec(0)).unwrap();

        let model = FixedModel(unit_vec(0));
        let index = gallery.load(&model).unwrap();

        assert_eq!(index.len(), 2);
        assert_eq!(index.name(0), "alice");
        assert_eq!(index.contact(0), "a@x.com");
        assert_eq!(index.name(1), "bob");
    }

    #[test]
    fn test_missing_embedding_recomputed_and_cached() {
        let dir = tempdir().unwrap();
        let gallery = FaceGallery::open(dir.path(), "master@example.com").unwrap();
        let frame = RgbImage::new(8, 8);

        gallery.register("carol", "c@x.com", &frame, &unit_vec(2)).unwrap();
        fs::remove_file(dir.path().join("carol.emb")).unwrap();

        let model = FixedModel(unit_vec(7));
        let index = gallery.load(&model).unwrap();

        assert_eq!(index.len(), 1);
        assert!(dir.path().join("carol.emb").exists());

        let query = Array1::from(unit_vec(7));
        let (idx, sim) = index.best_match(&query).unwrap();
        assert_eq!(idx, 0);
        assert!((sim - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_missing_contact_falls_back_to_master() {
        let dir = tempdir().unwrap();
        let gallery = FaceGallery::open(dir.path(), "master@example.com").unwrap();

        gallery
            .register("dave", "d@x.com", &RgbImage::new(8, 8), &unit_vec(3))
            .unwrap();
        fs::remove_file(dir.path().join("dave.txt")).unwrap();

        let index = gallery.load(&FixedModel(unit_vec(0))).unwrap();
        assert_eq!(index.contact(0), "master@example.com");
    }

    #[test]
    fn test_reregistration_overwrites() {
        let dir = tempdir().unwrap();
        let gallery = FaceGallery::open(dir.path(), "master@example.com").unwrap();
        let frame = RgbImage::new(8, 8);

        gallery.register("erin", "old@x.com", &frame, &unit_vec(4)).unwrap();
        gallery.register("erin", "new@x.com", &frame, &unit_vec(5)).unwrap();

        let index = gallery.load(&FixedModel(unit_vec(0))).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.contact(0), "new@x.com");

        let query = Array1::from(unit_vec(5));
        let (_, sim) = index.best_match(&query).unwrap();
        assert!((sim - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_path_traversal_name_rejected() {
        let dir = tempdir().unwrap();
        let gallery = FaceGallery::open(dir.path(), "master@example.com").unwrap();

        let result = gallery.register("../evil", "e@x.com", &RgbImage::new(8, 8), &unit_vec(0));
        assert!(matches!(result, Err(VaultError::InvalidInput(_))));
    }

    #[test]
    fn test_orthogonal_embedding_scores_near_zero() {
        let dir = tempdir().unwrap();
        let gallery = FaceGallery::open(dir.path(), "master@example.com").unwrap();

        gallery
            .register("frank", "f@x.com", &RgbImage::new(8, 8), &unit_vec(0))
            .unwrap();

        let index = gallery.load(&FixedModel(unit_vec(0))).unwrap();
        let query = Array1::from(unit_vec(1));
        let (_, sim) = index.best_match(&query).unwrap();
        assert!(sim.abs() < 1e-4);
    }
}
