//! JPEG to PNG conversion.
//!
//! Uploads are accepted only as JPEG. The payload is sniffed before decoding
//! so a mislabelled file is rejected with the format that was actually seen,
//! then decoded and re-encoded losslessly as PNG.

use bytes::Bytes;
use image::{ImageFormat, ImageReader};
use std::io::Cursor;

use crate::error::ConvertError;

/// JPEG start-of-image marker followed by the first marker prefix.
const JPEG_MAGIC: [u8; 3] = [0xFF, 0xD8, 0xFF];

/// Check whether `data` starts like a JPEG stream.
#[inline]
pub fn is_jpeg(data: &[u8]) -> bool {
    data.starts_with(&JPEG_MAGIC)
}

/// Name of the format `data` appears to be in, for error reporting.
fn detected_format(data: &[u8]) -> String {
    if data.is_empty() {
        return "empty".to_string();
    }
    match image::guess_format(data) {
        Ok(format) => format!("{:?}", format).to_lowercase(),
        Err(_) => "unknown".to_string(),
    }
}

// =============================================================================
// PNG Converter
// =============================================================================

/// Re-encodes JPEG uploads as PNG.
#[derive(Debug, Clone, Default)]
pub struct PngConverter {}

impl PngConverter {
    pub fn new() -> Self {
        Self {}
    }

    /// Decode a JPEG payload and encode it as PNG.
    ///
    /// # Errors
    ///
    /// - [`ConvertError::UnsupportedFormat`] if the payload is not JPEG
    /// - [`ConvertError::Decode`] if the JPEG stream is corrupt
    /// - [`ConvertError::Encode`] if PNG encoding fails
    pub fn convert(&self, source: &[u8]) -> Result<Bytes, ConvertError> {
        if !is_jpeg(source) {
            return Err(ConvertError::UnsupportedFormat {
                detected: detected_format(source),
            });
        }

        let img = ImageReader::with_format(Cursor::new(source), ImageFormat::Jpeg)
            .decode()
            .map_err(|e| ConvertError::Decode(e.to_string()))?;

        let mut output = Cursor::new(Vec::new());
        img.write_to(&mut output, ImageFormat::Png)
            .map_err(|e| ConvertError::Encode(e.to_string()))?;

        Ok(Bytes::from(output.into_inner()))
    }

}
