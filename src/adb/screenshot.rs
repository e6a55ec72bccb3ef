//! Screenshot capture types and PNG validation.

use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine};

use super::connection::AdbError;

const PNG_MAGIC: &[u8; 8] = b"\x89PNG\r\n\x1a\n";

/// A captured device screen.
///
/// The image is written to a transient path that the next capture overwrites,
/// and kept in memory for the vision model.
#[derive(Debug, Clone)]
pub struct ScreenCapture {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub png_data: Vec<u8>,
}

impl ScreenCapture {
    /// Base64-encoded PNG payload.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.png_data)
    }
}

/// Validate raw `screencap -p` output and probe its dimensions.
///
/// # Note
/// Secure screens (payment pages, lock screen) make `screencap` print a status
/// line instead of image data, which surfaces here as `InvalidScreenshot`.
pub fn decode_capture(png_data: Vec<u8>, path: &Path) -> Result<ScreenCapture, AdbError> {
    if png_data.len() < PNG_MAGIC.len() {
        return Err(AdbError::InvalidScreenshot(format!(
            "data too small: {} bytes",
            png_data.len()
        )));
    }

    if &png_data[..PNG_MAGIC.len()] != PNG_MAGIC {
        return Err(AdbError::InvalidScreenshot(format!(
            "invalid PNG header: {:?}",
            &png_data[..PNG_MAGIC.len()]
        )));
    }

    let img = image::load_from_memory(&png_data)
        .map_err(|e| AdbError::InvalidScreenshot(e.to_string()))?;

    Ok(ScreenCapture {
        path: path.to_path_buf(),
        width: img.width(),
        height: img.height(),
        png_data,
    })
}

#[cfg(test)]
fn encode_test_png(width: u32, height: u32) -> Vec<u8> {
    use image::{DynamicImage, RgbImage};
    use std::io::Cursor;

    let img = DynamicImage::ImageRgb8(RgbImage::new(width, height));
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, image::ImageFormat::Png)
        .expect("encode png");
    buffer.into_inner()
}
