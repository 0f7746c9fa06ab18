//! Texture pixel data ready for GPU upload
//!
//! Textures are uploaded once at startup and never multi-buffered; the
//! binding table gives each one a single view in its trailing band.

use std::path::Path;

use crate::render::{RenderError, RenderResult};

/// RGBA8 pixels of one texture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureData {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Tightly packed RGBA8 rows
    pub pixels: Vec<u8>,
}

impl TextureData {
    /// Wrap raw RGBA8 pixels
    pub fn from_rgba8(width: u32, height: u32, pixels: Vec<u8>) -> RenderResult<Self> {
        if width == 0 || height == 0 {
            return Err(RenderError::Texture(format!("texture size {width}x{height} is empty")));
        }

        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(RenderError::Texture(format!(
                "{width}x{height} RGBA8 texture needs {expected} bytes, got {}",
                pixels.len()
            )));
        }

        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Decode a PNG file
    pub fn from_png_file(path: impl AsRef<Path>) -> RenderResult<Self> {
        let path = path.as_ref();
        log::debug!("Loading texture from: {:?}", path);

        let image = image::open(path)
            .map_err(|e| RenderError::Texture(format!("failed to load {}: {e}", path.display())))?;
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();

        log::info!("Loaded texture {}x{} from {:?}", width, height, path);
        Self::from_rgba8(width, height, rgba.into_raw())
    }

    /// Decode PNG bytes held in memory
    pub fn from_png_bytes(bytes: &[u8]) -> RenderResult<Self> {
        let image = image::load_from_memory_with_format(bytes, image::ImageFormat::Png)
            .map_err(|e| RenderError::Texture(format!("failed to decode PNG: {e}")))?;
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        Self::from_rgba8(width, height, rgba.into_raw())
    }

    /// Two-color checkerboard with `cell` pixel squares
    pub fn checkerboard(size: u32, cell: u32, even: [u8; 4], odd: [u8; 4]) -> Self {
        let cell = cell.max(1);
        let size = size.max(1);
        let mut pixels = Vec::with_capacity(size as usize * size as usize * 4);
        for y in 0..size {
            for x in 0..size {
                let color = if ((x / cell) + (y / cell)) % 2 == 0 { even } else { odd };
                pixels.extend_from_slice(&color);
            }
        }

        Self {
            width: size,
            height: size,
            pixels,
        }
    }

    /// Size of the pixel data in bytes
    pub fn byte_size(&self) -> usize {
        self.pixels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgba8_size_is_checked() {
        assert!(TextureData::from_rgba8(2, 2, vec![0; 16]).is_ok());
        assert!(matches!(
            TextureData::from_rgba8(2, 2, vec![0; 15]),
            Err(RenderError::Texture(_))
        ));
        assert!(TextureData::from_rgba8(0, 2, Vec::new()).is_err());
    }

    #[test]
    fn test_checkerboard_pattern() {
        let white = [255, 255, 255, 255];
        let black = [0, 0, 0, 255];
        let texture = TextureData::checkerboard(4, 2, white, black);

        assert_eq!(texture.byte_size(), 4 * 4 * 4);
        assert_eq!(&texture.pixels[0..4], &white);
        // (2, 0) starts the second cell
        assert_eq!(&texture.pixels[8..12], &black);
        // (2, 2) is back on an even cell
        let offset = (2 * 4 + 2) * 4;
        assert_eq!(&texture.pixels[offset..offset + 4], &white);
    }

    #[test]
    fn test_png_bytes_decode() {
        let source = TextureData::checkerboard(8, 4, [10, 20, 30, 255], [200, 100, 50, 255]);
        let buffer = image::RgbaImage::from_raw(source.width, source.height, source.pixels.clone())
            .expect("pixel buffer matches dimensions");

        let mut encoded = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(buffer)
            .write_to(&mut encoded, image::ImageFormat::Png)
            .expect("PNG encoding");

        let decoded = TextureData::from_png_bytes(encoded.get_ref()).unwrap();
        assert_eq!(decoded, source);
    }

    #[test]
    fn test_missing_file_is_a_texture_error() {
        let result = TextureData::from_png_file("does/not/exist.png");
        assert!(matches!(result, Err(RenderError::Texture(_))));
    }
}
