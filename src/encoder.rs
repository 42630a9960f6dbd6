// src/encoder.rs
//
// Rasterizes a captured frame into the outbound payload: JPEG at a fixed
// quality, wrapped as a self-describing data URL the way the detector's
// streaming endpoint expects it.

use crate::types::Frame;
use anyhow::{anyhow, Result};
use base64::Engine;

pub struct FrameEncoder {
    quality: u8,
}

impl FrameEncoder {
    pub fn new(quality: u8) -> Self {
        Self { quality }
    }

    /// Encode one frame as `data:image/jpeg;base64,...`. The result is owned
    /// by the caller for the duration of one send and discarded afterwards.
    pub fn encode_data_url(&self, frame: &Frame) -> Result<String> {
        let jpeg = encode_rgb_to_jpeg(&frame.data, frame.width, frame.height, self.quality)?;
        Ok(format!(
            "data:image/jpeg;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(&jpeg)
        ))
    }
}

/// Encode RGB frame data to JPEG bytes using the `image` crate.
fn encode_rgb_to_jpeg(rgb_data: &[u8], width: usize, height: usize, quality: u8) -> Result<Vec<u8>> {
    use image::{ImageBuffer, RgbImage};
    use std::io::Cursor;

    let expected_len = width * height * 3;
    if rgb_data.len() < expected_len {
        return Err(anyhow!(
            "frame data too short: {} bytes for {}x{}",
            rgb_data.len(),
            width,
            height
        ));
    }

    let img: RgbImage =
        ImageBuffer::from_raw(width as u32, height as u32, rgb_data[..expected_len].to_vec())
            .ok_or_else(|| anyhow!("failed to build image buffer"))?;

    let mut buf = Cursor::new(Vec::new());
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality);
    img.write_with_encoder(encoder)?;
    Ok(buf.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_frame(width: usize, height: usize) -> Frame {
        Frame {
            data: vec![128u8; width * height * 3],
            width,
            height,
            timestamp_ms: 0.0,
        }
    }

    #[test]
    fn test_encode_produces_data_url() {
        let encoder = FrameEncoder::new(80);
        let payload = encoder.encode_data_url(&test_frame(32, 24)).unwrap();

        let b64 = payload.strip_prefix("data:image/jpeg;base64,").unwrap();
        let jpeg = base64::engine::general_purpose::STANDARD
            .decode(b64)
            .unwrap();
        // JPEG SOI marker
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_short_frame_data_is_rejected() {
        let encoder = FrameEncoder::new(80);
        let frame = Frame {
            data: vec![0u8; 10],
            width: 32,
            height: 24,
            timestamp_ms: 0.0,
        };

        assert!(encoder.encode_data_url(&frame).is_err());
    }
}
