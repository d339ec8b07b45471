//! Genome Vault - Frame Acquisition Seam
//!
//! The matcher consumes one RGB still per attempt. A live camera device
//! sits behind [`FrameSource`] and must impose its own bounded timeout;
//! a call that fails returns `CameraError` rather than hanging.

use std::path::{Path, PathBuf};

use image::RgbImage;

use crate::error::{VaultError, VaultResult};

/// Frames discarded before the working frame so auto-exposure and focus
/// settle on a live device
pub const WARMUP_FRAMES: usize = 15;

/// Produces RGB still frames
pub trait FrameSource {
    fn next_frame(&mut self) -> VaultResult<RgbImage>;
}

/// Wrapper that discards warm-up frames before returning a working frame
pub struct WarmedCapture<S: FrameSource> {
    source: S,
    warmup: usize,
}

impl<S: FrameSource> WarmedCapture<S> {
    pub fn new(source: S) -> Self {
        Self::with_warmup(source, WARMUP_FRAMES)
    }

    pub fn with_warmup(source: S, warmup: usize) -> Self {
        Self { source, warmup }
    }

    /// Capture one working frame, discarding the warm-up frames first
    pub fn capture(&mut self) -> VaultResult<RgbImage> {
        for _ in 0..self.warmup {
            self.source.next_frame()?;
        }
        self.source.next_frame()
    }
}

/// Frame source backed by a still image on disk (no warm-up needed)
pub struct FileFrameSource {
    path: PathBuf,
}

impl FileFrameSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl FrameSource for FileFrameSource {
    fn next_frame(&mut self) -> VaultResult<RgbImage> {
        image::open(&self.path)
            .map(|img| img.to_rgb8())
            .map_err(|e| VaultError::CameraError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Counts frames handed out, failing after an optional budget
    struct CountingSource {
        served: usize,
        budget: Option<usize>,
    }

    impl FrameSource for CountingSource {
        fn next_frame(&mut self) -> VaultResult<RgbImage> {
            if let Some(budget) = self.budget {
                if self.served >= budget {
                    return Err(VaultError::CameraError("device gone".into()));
                }
            }
            self.served += 1;
            Ok(RgbImage::new(4, 4))
        }
    }

    #[test]
    fn test_warmup_frames_discarded() {
        let source = CountingSource {
            served: 0,
            budget: None,
        };
        let mut capture = WarmedCapture::with_warmup(source, 15);
        capture.capture().unwrap();
        assert_eq!(capture.source.served, 16);
    }

    #[test]
    fn test_device_failure_surfaces() {
        let source = CountingSource {
            served: 0,
            budget: Some(3),
        };
        let mut capture = WarmedCapture::with_warmup(source, 15);
        assert!(matches!(
            capture.capture(),
            Err(VaultError::CameraError(_))
        ));
    }

    #[test]
    fn test_missing_file_is_camera_error() {
        let mut source = FileFrameSource::new("/nonexistent/frame.png");
        assert!(matches!(
            source.next_frame(),
            Err(VaultError::CameraError(_))
        ));
    }
}
