//! PNG export of the rendered spectrum.

use std::path::Path;

use image::{Rgba, RgbaImage};
use thiserror::Error;

use crate::render::FrameImage;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("nothing has been rendered yet")]
    Empty,
    #[error("pixel buffer of {len} bytes does not match {width}x{height}")]
    SizeMismatch { width: u32, height: u32, len: usize },
    #[error("failed to write PNG: {0}")]
    Image(#[from] image::ImageError),
}

/// Default file name, e.g. `spectrum_1760870400123.png`.
pub fn default_file_name() -> String {
    format!("spectrum_{:.0}.png", chrono::Local::now().timestamp_millis())
}

pub fn to_rgba_image(frame: &FrameImage) -> Result<RgbaImage, SnapshotError> {
    if frame.width == 0 || frame.height == 0 {
        return Err(SnapshotError::Empty);
    }
    let expected = frame.width as usize * frame.height as usize * 4;
    if frame.pixels.len() != expected {
        return Err(SnapshotError::SizeMismatch {
            width: frame.width,
            height: frame.height,
            len: frame.pixels.len(),
        });
    }
    let mut out = RgbaImage::new(frame.width, frame.height);
    for (i, px) in frame.pixels.chunks_exact(4).enumerate() {
        let x = i as u32 % frame.width;
        let y = i as u32 / frame.width;
        out.put_pixel(x, y, Rgba([px[0], px[1], px[2], px[3]]));
    }
    Ok(out)
}

/// Write `frame` to `path` as PNG.
pub fn save_png(frame: &FrameImage, path: impl AsRef<Path>) -> Result<(), SnapshotError> {
    let path = path.as_ref();
    to_rgba_image(frame)?.save(path)?;
    tracing::info!(path = %path.display(), "saved spectrum snapshot");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_buffers() {
        let frame = FrameImage {
            width: 2,
            height: 2,
            pixels: vec![0; 3],
        };
        assert!(matches!(
            to_rgba_image(&frame),
            Err(SnapshotError::SizeMismatch { .. })
        ));
        assert!(matches!(
            to_rgba_image(&FrameImage::default()),
            Err(SnapshotError::Empty)
        ));
    }

    #[test]
    fn pixels_are_row_major() {
        let frame = FrameImage {
            width: 2,
            height: 1,
            pixels: vec![1, 2, 3, 4, 5, 6, 7, 8],
        };
        let img = to_rgba_image(&frame).unwrap();
        assert_eq!(img.get_pixel(1, 0), &Rgba([5, 6, 7, 8]));
    }
}
