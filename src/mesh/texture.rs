//! Texture storage shared between source surfaces and atlases.

use crate::error::{CombineError, Result};
use image::{ImageEncoder, RgbaImage};

/// An RGBA8 image with an optional mip chain.
///
/// Source textures normally carry no mips. Atlases produced by the builders carry the full
/// chain down to 1x1 when mip generation is enabled.
#[derive(Debug, Clone)]
pub struct Texture {
    image: RgbaImage,
    mips: Vec<RgbaImage>,
}

impl Texture {
    /// Wrap an existing image.
    pub fn from_rgba(image: RgbaImage) -> Self {
        Self {
            image,
            mips: Vec::new(),
        }
    }

    /// Create a texture from raw RGBA data (4 bytes per pixel).
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let image = RgbaImage::from_raw(width, height, pixels).ok_or_else(|| {
            CombineError::AtlasBuild(format!(
                "Pixel buffer does not match {}x{} RGBA texture",
                width, height
            ))
        })?;
        Ok(Self::from_rgba(image))
    }

    /// Create a fully transparent texture.
    pub fn blank(width: u32, height: u32) -> Self {
        Self::from_rgba(RgbaImage::new(width, height))
    }

    /// Create a texture filled with one color.
    pub fn solid(width: u32, height: u32, color: [u8; 4]) -> Self {
        Self::from_rgba(RgbaImage::from_pixel(width, height, image::Rgba(color)))
    }

    /// Decode a texture from encoded bytes (PNG).
    pub fn load_from_bytes(data: &[u8]) -> Result<Self> {
        let img = image::load_from_memory(data)?;
        Ok(Self::from_rgba(img.to_rgba8()))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Base mip level.
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub(crate) fn image_mut(&mut self) -> &mut RgbaImage {
        &mut self.image
    }

    /// Levels below the base, largest first.
    pub fn mips(&self) -> &[RgbaImage] {
        &self.mips
    }

    /// Number of levels including the base.
    pub fn mip_count(&self) -> usize {
        1 + self.mips.len()
    }

    pub(crate) fn set_mips(&mut self, mips: Vec<RgbaImage>) {
        self.mips = mips;
    }

    /// Get a pixel at (x, y) of the base level.
    pub fn get_pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.image.get_pixel(x, y).0
    }

    /// Export the base level as PNG bytes.
    pub fn to_png(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        let cursor = std::io::Cursor::new(&mut bytes);
        let encoder = image::codecs::png::PngEncoder::new(cursor);

        encoder
            .write_image(
                self.image.as_raw(),
                self.width(),
                self.height(),
                image::ExtendedColorType::Rgba8,
            )
            .map_err(|e| CombineError::AtlasBuild(format!("Failed to encode PNG: {}", e)))?;

        Ok(bytes)
    }
}
