// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image codec capability. The scanning pipeline only sees `Bitmap`s; decoding
// and encoding sit behind this trait so collaborators can inject whatever
// image library their platform provides, and tests can run headlessly.

use std::path::Path;

use flatscan_core::error::{FlatscanError, Result};
use flatscan_core::Bitmap;
use image::{DynamicImage, ImageFormat};
use tracing::{debug, info, instrument};

use super::convert::{bitmap_from_dynamic, bitmap_to_dynamic};

/// Encoded output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Png,
    /// JPEG with quality 1-100. Alpha is dropped.
    Jpeg { quality: u8 },
}

impl OutputFormat {
    /// Infer the format from a file extension (`png`, `jpg`, `jpeg`).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg { quality: 90 }),
            _ => None,
        }
    }
}

/// Decode and encode bitmaps.
pub trait ImageCodec: Send + Sync {
    /// Decode encoded image bytes (JPEG, PNG, ...).
    fn decode(&self, data: &[u8]) -> Result<Bitmap>;

    /// Encode a bitmap.
    fn encode(&self, bitmap: &Bitmap, format: OutputFormat) -> Result<Vec<u8>>;

    /// Decode an image file.
    fn open(&self, path: &Path) -> Result<Bitmap> {
        let data = std::fs::read(path)?;
        self.decode(&data)
    }

    /// Encode a bitmap to a file, choosing the format from the extension.
    fn save(&self, bitmap: &Bitmap, path: &Path) -> Result<()> {
        let format = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(OutputFormat::from_extension)
            .ok_or_else(|| {
                FlatscanError::ImageError(format!(
                    "unsupported output extension for {}",
                    path.display()
                ))
            })?;
        let bytes = self.encode(bitmap, format)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }
}

/// `ImageCodec` backed by the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCrateCodec;

impl ImageCodec for ImageCrateCodec {
    #[instrument(skip(self, data), fields(data_len = data.len()))]
    fn decode(&self, data: &[u8]) -> Result<Bitmap> {
        let image = image::load_from_memory(data).map_err(|err| {
            FlatscanError::ImageError(format!("failed to decode image: {}", err))
        })?;
        info!(
            width = image.width(),
            height = image.height(),
            "Image decoded"
        );
        bitmap_from_dynamic(&image)
    }

    #[instrument(skip(self, bitmap), fields(width = bitmap.width(), height = bitmap.height()))]
    fn encode(&self, bitmap: &Bitmap, format: OutputFormat) -> Result<Vec<u8>> {
        let image = bitmap_to_dynamic(bitmap)?;
        let bytes = match format {
            OutputFormat::Png => encode_png(&image)?,
            OutputFormat::Jpeg { quality } => encode_jpeg(&image, quality)?,
        };
        debug!(bytes = bytes.len(), ?format, "Image encoded");
        Ok(bytes)
    }
}

fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buffer);
    image.write_to(&mut cursor, ImageFormat::Png).map_err(|err| {
        FlatscanError::ImageError(format!("PNG encoding failed: {}", err))
    })?;
    Ok(buffer)
}

fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let rgb = image.to_rgb8();
    let encoder =
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
    rgb.write_with_encoder(encoder).map_err(|err| {
        FlatscanError::ImageError(format!("JPEG encoding failed: {}", err))
    })?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker() -> Bitmap {
        Bitmap::gray_from_fn(8, 6, |x, y| if (x + y) % 2 == 0 { 255 } else { 0 }).unwrap()
    }

    #[test]
    fn png_round_trip_is_lossless() {
        let codec = ImageCrateCodec;
        let bitmap = checker();
        let bytes = codec.encode(&bitmap, OutputFormat::Png).unwrap();
        assert_eq!(codec.decode(&bytes).unwrap(), bitmap);
    }

    #[test]
    fn jpeg_output_has_three_channels() {
        let codec = ImageCrateCodec;
        let bytes = codec
            .encode(&checker(), OutputFormat::Jpeg { quality: 80 })
            .unwrap();
        let decoded = codec.decode(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (8, 6));
        assert_eq!(decoded.channels(), 3);
    }

    #[test]
    fn garbage_bytes_are_an_image_error() {
        let err = ImageCrateCodec.decode(b"definitely not an image").unwrap_err();
        assert!(matches!(err, FlatscanError::ImageError(_)));
    }

    #[test]
    fn save_and_open_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.png");
        let codec = ImageCrateCodec;
        codec.save(&checker(), &path).unwrap();
        assert_eq!(codec.open(&path).unwrap(), checker());
    }

    #[test]
    fn save_rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let err = ImageCrateCodec
            .save(&checker(), &dir.path().join("page.bmpx"))
            .unwrap_err();
        assert!(matches!(err, FlatscanError::ImageError(_)));
    }
}
