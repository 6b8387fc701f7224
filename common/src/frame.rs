use image::{GrayImage, ImageReader};
use std::io::Cursor;

/// A grayscale camera still with capture metadata.
///
/// Frames are immutable once captured and are ordered by `seq`, which the
/// capturing source increments for every attempt.
#[derive(Debug, Clone)]
pub struct GrayFrame {
    pub image: GrayImage,
    pub captured_at_ms: i64,
    pub seq: u64,
}

impl GrayFrame {
    pub fn new(image: GrayImage, captured_at_ms: i64, seq: u64) -> Self {
        Self {
            image,
            captured_at_ms,
            seq,
        }
    }

    /// Decode encoded image bytes (JPEG from the camera) to single-channel grayscale.
    pub fn decode(data: &[u8], captured_at_ms: i64, seq: u64) -> Result<Self, FrameError> {
        if data.is_empty() {
            return Err(FrameError::Empty);
        }
        let img = ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(FrameError::Read)?
            .decode()
            .map_err(FrameError::Decode)?;
        Ok(Self::new(img.to_luma8(), captured_at_ms, seq))
    }

    /// Build a frame where every pixel has the same intensity.
    pub fn filled(width: u32, height: u32, value: u8, seq: u64) -> Self {
        let image = GrayImage::from_pixel(width, height, image::Luma([value]));
        Self::new(image, chrono::Utc::now().timestamp_millis(), seq)
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn pixel_count(&self) -> u64 {
        let (w, h) = self.dimensions();
        w as u64 * h as u64
    }

    /// Raw intensity samples in row-major order.
    pub fn samples(&self) -> &[u8] {
        self.image.as_raw()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("image payload is empty")]
    Empty,
    #[error("failed to read image payload: {0}")]
    Read(std::io::Error),
    #[error("failed to decode image: {0}")]
    Decode(image::ImageError),
}
