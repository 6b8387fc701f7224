use pill_watch_common::frame::GrayFrame;
use tracing::debug;

/// Result of comparing the two newest buffer slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// At least one of the two slots holds no frame.
    NoData,
    /// Both frames present, change stayed at or under the threshold.
    NoChange { changed_pixels: u64 },
    /// Both frames present, change exceeded the threshold.
    Changed { changed_pixels: u64 },
}

impl Comparison {
    pub fn is_change(&self) -> bool {
        matches!(self, Comparison::Changed { .. })
    }
}

/// Two-level pixel difference rule.
///
/// A pixel counts as changed when its absolute intensity delta is strictly
/// greater than `noise_floor`. A frame pair counts as changed when strictly
/// more than `threshold` pixels changed. The noise floor absorbs sensor and
/// lighting jitter; the aggregate threshold ignores small localized motion.
#[derive(Debug, Clone, Copy)]
pub struct PixelDiff {
    noise_floor: u8,
    threshold: u64,
}

impl Default for PixelDiff {
    fn default() -> Self {
        Self::new(20, 5000)
    }
}

impl PixelDiff {
    pub fn new(noise_floor: u8, threshold: u64) -> Self {
        Self {
            noise_floor,
            threshold,
        }
    }

    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    /// Number of pixels whose intensity differs by more than the noise floor.
    pub fn changed_pixels(&self, a: &GrayFrame, b: &GrayFrame) -> Result<u64, DiffError> {
        if a.dimensions() != b.dimensions() {
            return Err(DiffError::DimensionMismatch {
                left: a.dimensions(),
                right: b.dimensions(),
            });
        }
        let count = a
            .samples()
            .iter()
            .zip(b.samples())
            .filter(|&(&pa, &pb)| pa.abs_diff(pb) > self.noise_floor)
            .count() as u64;
        Ok(count)
    }

    /// Compare two optional frames, keeping "no data" apart from "no change".
    pub fn compare(
        &self,
        older: Option<&GrayFrame>,
        newer: Option<&GrayFrame>,
    ) -> Result<Comparison, DiffError> {
        let (Some(a), Some(b)) = (older, newer) else {
            debug!(
                older_present = older.is_some(),
                newer_present = newer.is_some(),
                "missing frame, skipping comparison"
            );
            return Ok(Comparison::NoData);
        };

        let changed_pixels = self.changed_pixels(a, b)?;
        let changed = changed_pixels > self.threshold;
        debug!(
            changed_pixels,
            threshold = self.threshold,
            noise_floor = self.noise_floor,
            older_seq = a.seq,
            newer_seq = b.seq,
            changed,
            "pixel diff comparison"
        );

        if changed {
            Ok(Comparison::Changed { changed_pixels })
        } else {
            Ok(Comparison::NoChange { changed_pixels })
        }
    }

    /// Boolean form of [`PixelDiff::compare`]: absent frames never count as a change.
    #[allow(dead_code)]
    pub fn changed(
        &self,
        older: Option<&GrayFrame>,
        newer: Option<&GrayFrame>,
    ) -> Result<bool, DiffError> {
        Ok(self.compare(older, newer)?.is_change())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiffError {
    #[error("cannot compare frames of different sizes: {left:?} vs {right:?}")]
    DimensionMismatch { left: (u32, u32), right: (u32, u32) },
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    /// 100x100 frame at `base` with the first `bright` pixels (row-major) set to `value`.
    fn frame_with(base: u8, bright: u32, value: u8) -> GrayFrame {
        let mut img = GrayImage::from_pixel(100, 100, Luma([base]));
        for i in 0..bright {
            img.put_pixel(i % 100, i / 100, Luma([value]));
        }
        GrayFrame::new(img, 0, 0)
    }

    #[test]
    fn identical_frames_do_not_change() {
        let diff = PixelDiff::default();
        let a = frame_with(10, 4000, 250);
        assert!(!diff.changed(Some(&a), Some(&a)).unwrap());
        assert_eq!(
            diff.compare(Some(&a), Some(&a)).unwrap(),
            Comparison::NoChange { changed_pixels: 0 }
        );
    }

    #[test]
    fn every_pixel_changed_is_detected() {
        let diff = PixelDiff::default();
        let a = GrayFrame::filled(100, 60, 0, 0);
        let b = GrayFrame::filled(100, 60, 21, 1);
        assert_eq!(
            diff.compare(Some(&a), Some(&b)).unwrap(),
            Comparison::Changed { changed_pixels: 6000 }
        );
    }

    #[test]
    fn threshold_is_strict() {
        let diff = PixelDiff::default();
        let base = frame_with(50, 0, 0);

        let exactly = frame_with(50, 5000, 200);
        assert!(!diff.changed(Some(&base), Some(&exactly)).unwrap());

        let one_more = frame_with(50, 5001, 200);
        assert!(diff.changed(Some(&base), Some(&one_more)).unwrap());
    }

    #[test]
    fn noise_floor_is_strict() {
        let diff = PixelDiff::default();
        let a = GrayFrame::filled(100, 100, 100, 0);
        let at_floor = GrayFrame::filled(100, 100, 120, 1);
        let above_floor = GrayFrame::filled(100, 100, 79, 2);
        assert_eq!(diff.changed_pixels(&a, &at_floor).unwrap(), 0);
        assert_eq!(diff.changed_pixels(&a, &above_floor).unwrap(), 10_000);
    }

    #[test]
    fn absent_frame_is_no_data() {
        let diff = PixelDiff::default();
        let a = GrayFrame::filled(10, 10, 0, 0);
        assert_eq!(diff.compare(None, Some(&a)).unwrap(), Comparison::NoData);
        assert_eq!(diff.compare(Some(&a), None).unwrap(), Comparison::NoData);
        assert!(!diff.changed(None, None).unwrap());
    }

    #[test]
    fn dimension_mismatch_is_an_error() {
        let diff = PixelDiff::default();
        let a = GrayFrame::filled(10, 10, 0, 0);
        let b = GrayFrame::filled(10, 11, 0, 1);
        assert_eq!(
            diff.compare(Some(&a), Some(&b)),
            Err(DiffError::DimensionMismatch {
                left: (10, 10),
                right: (10, 11)
            })
        );
    }

    #[test]
    fn custom_thresholds() {
        let diff = PixelDiff::new(5, 10);
        let a = frame_with(0, 0, 0);
        let b = frame_with(0, 11, 6);
        assert!(diff.changed(Some(&a), Some(&b)).unwrap());
    }
}
