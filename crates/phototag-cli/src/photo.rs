//! Photo payload encoding
//!
//! Uploads are always JPEG at quality 80, whatever the input format.

use std::path::Path;

use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use phototag_core::domain::PhotoPayload;

/// JPEG quality used for every upload
pub const JPEG_QUALITY: u8 = 80;

/// Reads an image file and re-encodes it as a payload
pub fn encode_file(path: &Path) -> Result<PhotoPayload> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    encode_bytes(&bytes).with_context(|| format!("Failed to encode {}", path.display()))
}

/// Decodes any supported image format and re-encodes it as JPEG
pub fn encode_bytes(bytes: &[u8]) -> Result<PhotoPayload> {
    let image = image::load_from_memory(bytes).context("Unsupported or corrupt image")?;
    let rgb = image.to_rgb8();

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY)
        .encode_image(&rgb)
        .context("JPEG encoding failed")?;

    Ok(PhotoPayload::from_bytes(&jpeg))
}

/// Writes a payload's raw bytes to `path`
pub fn write_file(photo: &PhotoPayload, path: &Path) -> Result<()> {
    let bytes = photo.decode()?;
    std::fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

    fn png_bytes() -> Vec<u8> {
        let image = RgbImage::from_pixel(8, 8, Rgb([200, 40, 40]));
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(image)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn test_png_is_reencoded_as_jpeg() {
        let payload = encode_bytes(&png_bytes()).unwrap();
        let jpeg = payload.decode().unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        let back = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((back.width(), back.height()), (8, 8));
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(encode_bytes(b"definitely not an image").is_err());
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.png");
        std::fs::write(&input, png_bytes()).unwrap();

        let payload = encode_file(&input).unwrap();
        let output = dir.path().join("out.jpg");
        write_file(&payload, &output).unwrap();
        assert_eq!(std::fs::read(&output).unwrap(), payload.decode().unwrap());
    }

    #[test]
    fn test_missing_file() {
        let err = encode_file(Path::new("/nonexistent/photo.png")).unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }
}
