//! Atlas building strategies.
//!
//! [`ComputeAtlasBuilder`] lays images out with the binary-tree [`Packer`] and rasterizes them
//! through a [`ComputeDevice`] command stream. [`FallbackAtlasBuilder`] is the generic CPU path:
//! simple row packing into a square power-of-two atlas.

use super::device::{blit_scaled, build_mip_chain, Capabilities, CommandStream, ComputeDevice, PixelRect};
use super::packer::{sort_blocks, Block, Packer};
use crate::error::{CombineError, Result};
use crate::mesh::Texture;
use image::RgbaImage;
use std::sync::Arc;

/// A region within the texture atlas.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AtlasRegion {
    /// U coordinate of the left edge (0-1).
    pub u_min: f32,
    /// V coordinate of the top edge (0-1).
    pub v_min: f32,
    /// U coordinate of the right edge (0-1).
    pub u_max: f32,
    /// V coordinate of the bottom edge (0-1).
    pub v_max: f32,
}

impl AtlasRegion {
    /// Normalize a pixel rectangle by the atlas size.
    pub fn from_pixels(rect: PixelRect, atlas_width: u32, atlas_height: u32) -> Self {
        let w = atlas_width as f32;
        let h = atlas_height as f32;
        Self {
            u_min: rect.x as f32 / w,
            v_min: rect.y as f32 / h,
            u_max: (rect.x + rect.w) as f32 / w,
            v_max: (rect.y + rect.h) as f32 / h,
        }
    }

    /// Back to pixels for an atlas of the given size.
    pub fn to_pixels(&self, atlas_width: u32, atlas_height: u32) -> PixelRect {
        let w = atlas_width as f32;
        let h = atlas_height as f32;
        PixelRect {
            x: (self.u_min * w).round() as u32,
            y: (self.v_min * h).round() as u32,
            w: (self.width() * w).round() as u32,
            h: (self.height() * h).round() as u32,
        }
    }

    /// Get the width of this region in UV space.
    pub fn width(&self) -> f32 {
        self.u_max - self.u_min
    }

    /// Get the height of this region in UV space.
    pub fn height(&self) -> f32 {
        self.v_max - self.v_min
    }

    /// Transform a local UV coordinate (0-1) to atlas coordinate.
    ///
    /// Exact at the corners: `(0, 0)` maps to the min edges and `(1, 1)` to the max edges.
    pub fn transform_uv(&self, u: f32, v: f32) -> [f32; 2] {
        [lerp(self.u_min, self.u_max, u), lerp(self.v_min, self.v_max, v)]
    }
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a * (1.0 - t) + b * t
}

/// A layout computed once and reused for further texture slots.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AtlasLayout {
    /// Width of the atlas in pixels.
    pub width: u32,
    /// Height of the atlas in pixels.
    pub height: u32,
    /// One region per input image, in input order.
    pub regions: Vec<AtlasRegion>,
}

/// A built texture atlas.
#[derive(Debug, Clone)]
pub struct PackedAtlas {
    pub texture: Texture,
    pub layout: AtlasLayout,
}

/// How atlases are laid out and rasterized.
pub trait AtlasStrategy: Send + Sync {
    /// Short name for logging.
    fn name(&self) -> &'static str;

    /// Compute a layout for `images` and rasterize them into a new atlas.
    fn pack_textures(&self, images: &[Arc<Texture>], max_size: u32) -> Result<PackedAtlas>;

    /// Rasterize `images` into the regions of an existing layout. `None` leaves its region empty.
    fn pack_textures_in_rects(
        &self,
        images: &[Option<Arc<Texture>>],
        layout: &AtlasLayout,
    ) -> Result<Texture>;
}

/// Pick the strategy for a device once, at construction time.
pub fn select_strategy(
    capabilities: Capabilities,
    device: Arc<dyn ComputeDevice>,
    padding: u32,
    generate_mips: bool,
) -> Box<dyn AtlasStrategy> {
    if capabilities.supports_compute {
        Box::new(ComputeAtlasBuilder::new(device, generate_mips))
    } else {
        Box::new(FallbackAtlasBuilder::new(padding, generate_mips))
    }
}

fn check_layout<T>(images: &[T], layout: &AtlasLayout) -> Result<()> {
    if images.len() != layout.regions.len() {
        return Err(CombineError::LayoutMismatch {
            images: images.len(),
            rects: layout.regions.len(),
        });
    }
    Ok(())
}

fn check_images(images: &[Arc<Texture>]) -> Result<()> {
    if images.is_empty() {
        return Err(CombineError::AtlasBuild("No images to pack".to_string()));
    }
    if let Some(i) = images.iter().position(|t| t.width() == 0 || t.height() == 0) {
        return Err(CombineError::AtlasBuild(format!("Image {} has zero size", i)));
    }
    Ok(())
}

/// Binary-tree layout rasterized through a compute device.
pub struct ComputeAtlasBuilder {
    device: Arc<dyn ComputeDevice>,
    generate_mips: bool,
}

impl ComputeAtlasBuilder {
    pub fn new(device: Arc<dyn ComputeDevice>, generate_mips: bool) -> Self {
        Self {
            device,
            generate_mips,
        }
    }
}

impl AtlasStrategy for ComputeAtlasBuilder {
    fn name(&self) -> &'static str {
        "compute"
    }

    fn pack_textures(&self, images: &[Arc<Texture>], max_size: u32) -> Result<PackedAtlas> {
        check_images(images)?;

        let mut blocks: Vec<Block> = images
            .iter()
            .enumerate()
            .map(|(i, t)| Block::new(i, t.width(), t.height()))
            .collect();
        sort_blocks(&mut blocks);
        let (mut width, mut height) = Packer::new().fit(&mut blocks)?;

        if width < height {
            return Err(CombineError::PortraitAtlas { width, height });
        }

        let mut scale = 1.0;
        if width > max_size {
            scale = max_size as f32 / width as f32;
            width = max_size;
            height = (height as f32 * scale) as u32;
        }
        let width = width.next_power_of_two();
        let height = height.next_power_of_two();
        log::debug!(
            "Packed {} images into {}x{} (scale {:.3})",
            images.len(),
            width,
            height,
            scale
        );

        let mut regions = vec![AtlasRegion::default(); images.len()];
        let mut stream = CommandStream::new();
        for block in &blocks {
            let block = block.scaled(scale);
            let rect = PixelRect::new(block.x, block.y, block.w, block.h);
            stream.copy_scaled(&images[block.index], rect);
            regions[block.index] = AtlasRegion::from_pixels(rect, width, height);
        }
        // Mips read the target, so they go after every copy
        if self.generate_mips {
            stream.generate_mips();
        }

        let mut texture = Texture::blank(width, height);
        self.device.submit(&mut texture, stream)?;

        Ok(PackedAtlas {
            texture,
            layout: AtlasLayout {
                width,
                height,
                regions,
            },
        })
    }

    fn pack_textures_in_rects(
        &self,
        images: &[Option<Arc<Texture>>],
        layout: &AtlasLayout,
    ) -> Result<Texture> {
        check_layout(images, layout)?;

        let mut stream = CommandStream::new();
        for (image, region) in images.iter().zip(&layout.regions) {
            if let Some(texture) = image {
                stream.copy_scaled(texture, region.to_pixels(layout.width, layout.height));
            }
        }
        if self.generate_mips {
            stream.generate_mips();
        }

        let mut texture = Texture::blank(layout.width, layout.height);
        self.device.submit(&mut texture, stream)?;
        Ok(texture)
    }
}

/// CPU row packer used when compute is unavailable.
pub struct FallbackAtlasBuilder {
    padding: u32,
    generate_mips: bool,
}

impl FallbackAtlasBuilder {
    pub fn new(padding: u32, generate_mips: bool) -> Self {
        Self {
            padding,
            generate_mips,
        }
    }

    fn finish(&self, image: RgbaImage) -> Texture {
        let mips = if self.generate_mips {
            build_mip_chain(&image)
        } else {
            Vec::new()
        };
        let mut texture = Texture::from_rgba(image);
        texture.set_mips(mips);
        texture
    }
}

impl AtlasStrategy for FallbackAtlasBuilder {
    fn name(&self) -> &'static str {
        "fallback"
    }

    fn pack_textures(&self, images: &[Arc<Texture>], max_size: u32) -> Result<PackedAtlas> {
        check_images(images)?;
        let padding = self.padding;

        // Sort textures by height (tallest first) for better packing
        let mut order: Vec<usize> = (0..images.len()).collect();
        order.sort_by(|&a, &b| images[b].height().cmp(&images[a].height()));

        // Start with minimum size that could fit all textures
        let total_area: u64 = images
            .iter()
            .map(|t| (t.width() + padding * 2) as u64 * (t.height() + padding * 2) as u64)
            .sum();
        let min_size = (total_area as f64).sqrt().ceil() as u32;
        // Start at 64, or the largest power of two within max_size when that is smaller
        let mut atlas_size = 64u32;
        while atlas_size > max_size.max(1) {
            atlas_size /= 2;
        }
        while atlas_size < min_size && atlas_size < max_size {
            atlas_size *= 2;
        }

        // Try to pack at increasing sizes
        loop {
            if atlas_size > max_size {
                return Err(CombineError::AtlasBuild(format!(
                    "Failed to pack {} textures into {}x{} atlas",
                    images.len(),
                    max_size,
                    max_size
                )));
            }

            if let Some((image, regions)) = try_pack(images, &order, atlas_size, padding) {
                log::debug!(
                    "Row-packed {} images into {}x{}",
                    images.len(),
                    atlas_size,
                    atlas_size
                );
                return Ok(PackedAtlas {
                    texture: self.finish(image),
                    layout: AtlasLayout {
                        width: atlas_size,
                        height: atlas_size,
                        regions,
                    },
                });
            }

            atlas_size *= 2;
        }
    }

    fn pack_textures_in_rects(
        &self,
        images: &[Option<Arc<Texture>>],
        layout: &AtlasLayout,
    ) -> Result<Texture> {
        check_layout(images, layout)?;

        let mut image = RgbaImage::new(layout.width, layout.height);
        for (source, region) in images.iter().zip(&layout.regions) {
            if let Some(texture) = source {
                blit_scaled(
                    &mut image,
                    texture.image(),
                    region.to_pixels(layout.width, layout.height),
                );
            }
        }
        Ok(self.finish(image))
    }
}

/// Try to pack textures into an atlas of the given size.
fn try_pack(
    images: &[Arc<Texture>],
    order: &[usize],
    atlas_size: u32,
    padding: u32,
) -> Option<(RgbaImage, Vec<AtlasRegion>)> {
    let mut atlas = RgbaImage::new(atlas_size, atlas_size);
    let mut regions = vec![AtlasRegion::default(); images.len()];

    // Simple row-based packing
    let mut current_x = 0u32;
    let mut current_y = 0u32;
    let mut row_height = 0u32;

    for &index in order {
        let texture = images[index].image();
        let (width, height) = texture.dimensions();
        let tex_width = width + padding * 2;
        let tex_height = height + padding * 2;

        // Check if we need to start a new row
        if current_x + tex_width > atlas_size {
            current_x = 0;
            current_y += row_height;
            row_height = 0;
        }

        // Check if we've run out of space
        if current_y + tex_height > atlas_size || tex_width > atlas_size {
            return None;
        }

        // Padding pixels get the nearest edge pixel color so filtering does not bleed
        for py in 0..tex_height {
            for px in 0..tex_width {
                let sx = (px as i64 - padding as i64).clamp(0, width as i64 - 1) as u32;
                let sy = (py as i64 - padding as i64).clamp(0, height as i64 - 1) as u32;
                atlas.put_pixel(current_x + px, current_y + py, *texture.get_pixel(sx, sy));
            }
        }

        let rect = PixelRect::new(current_x + padding, current_y + padding, width, height);
        regions[index] = AtlasRegion::from_pixels(rect, atlas_size, atlas_size);

        // Update position
        current_x += tex_width;
        row_height = row_height.max(tex_height);
    }

    Some((atlas, regions))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::device::SoftwareDevice;

    fn solid(width: u32, height: u32, color: [u8; 4]) -> Arc<Texture> {
        Arc::new(Texture::solid(width, height, color))
    }

    fn compute_builder() -> ComputeAtlasBuilder {
        ComputeAtlasBuilder::new(Arc::new(SoftwareDevice), true)
    }

    fn assert_disjoint(regions: &[AtlasRegion]) {
        for (i, a) in regions.iter().enumerate() {
            assert!(a.u_min >= 0.0 && a.u_max <= 1.0 && a.v_min >= 0.0 && a.v_max <= 1.0);
            for b in &regions[i + 1..] {
                let overlap = a.u_min < b.u_max
                    && b.u_min < a.u_max
                    && a.v_min < b.v_max
                    && b.v_min < a.v_max;
                assert!(!overlap, "{:?} overlaps {:?}", a, b);
            }
        }
    }

    #[test]
    fn test_atlas_region_transform() {
        let region = AtlasRegion {
            u_min: 0.25,
            v_min: 0.5,
            u_max: 0.5,
            v_max: 0.75,
        };

        let [u, v] = region.transform_uv(0.0, 0.0);
        assert!((u - 0.25).abs() < 0.001);
        assert!((v - 0.5).abs() < 0.001);

        let [u, v] = region.transform_uv(1.0, 1.0);
        assert!((u - 0.5).abs() < 0.001);
        assert!((v - 0.75).abs() < 0.001);
    }

    #[test]
    fn test_region_pixel_roundtrip() {
        let rect = PixelRect::new(16, 8, 32, 8);
        let region = AtlasRegion::from_pixels(rect, 64, 32);
        assert_eq!(region.to_pixels(64, 32), rect);
    }

    #[test]
    fn test_compute_single_texture() {
        let images = vec![solid(16, 8, [255, 0, 0, 255])];
        let atlas = compute_builder().pack_textures(&images, 2048).unwrap();

        assert_eq!((atlas.layout.width, atlas.layout.height), (16, 8));
        assert_eq!(
            atlas.layout.regions[0],
            AtlasRegion {
                u_min: 0.0,
                v_min: 0.0,
                u_max: 1.0,
                v_max: 1.0
            }
        );
        assert_eq!(atlas.texture.get_pixel(15, 7), [255, 0, 0, 255]);
        assert_eq!(atlas.texture.mip_count(), 5);
    }

    #[test]
    fn test_compute_regions_follow_input_order() {
        let images = vec![
            solid(8, 8, [255, 0, 0, 255]),
            solid(16, 16, [0, 255, 0, 255]),
            solid(8, 8, [0, 0, 255, 255]),
        ];
        let atlas = compute_builder().pack_textures(&images, 2048).unwrap();
        let layout = &atlas.layout;

        // Tallest image is placed first at the origin
        let green = layout.regions[1].to_pixels(layout.width, layout.height);
        assert_eq!(green, PixelRect::new(0, 0, 16, 16));
        assert_disjoint(&layout.regions);
        assert!(layout.width.is_power_of_two() && layout.height.is_power_of_two());

        for (i, color) in [[255, 0, 0, 255], [0, 255, 0, 255], [0, 0, 255, 255]]
            .into_iter()
            .enumerate()
        {
            let rect = layout.regions[i].to_pixels(layout.width, layout.height);
            assert_eq!(atlas.texture.get_pixel(rect.x, rect.y), color);
        }
    }

    #[test]
    fn test_compute_rounds_up_to_power_of_two() {
        let images = vec![solid(10, 6, [1, 1, 1, 255]), solid(10, 6, [2, 2, 2, 255])];
        let atlas = compute_builder().pack_textures(&images, 2048).unwrap();
        // Packed 20x6, rounded to 32x8
        assert_eq!((atlas.layout.width, atlas.layout.height), (32, 8));
        let region = atlas.layout.regions[1];
        assert!((region.u_min - 10.0 / 32.0).abs() < 1e-6);
        assert!((region.v_max - 6.0 / 8.0).abs() < 1e-6);
    }

    #[test]
    fn test_compute_scales_down_to_max_size() {
        let images = vec![solid(64, 64, [9, 9, 9, 255]), solid(64, 64, [7, 7, 7, 255])];
        let atlas = compute_builder().pack_textures(&images, 64).unwrap();
        assert_eq!((atlas.layout.width, atlas.layout.height), (64, 32));

        let second = atlas.layout.regions[1].to_pixels(64, 32);
        assert_eq!(second, PixelRect::new(32, 0, 32, 32));
        assert_eq!(atlas.texture.get_pixel(40, 10), [7, 7, 7, 255]);
    }

    #[test]
    fn test_compute_rejects_portrait_layout() {
        let images = vec![solid(8, 16, [0, 0, 0, 255])];
        let err = compute_builder().pack_textures(&images, 2048).unwrap_err();
        assert!(matches!(
            err,
            CombineError::PortraitAtlas {
                width: 8,
                height: 16
            }
        ));
    }

    #[test]
    fn test_compute_rejects_empty_input() {
        assert!(compute_builder().pack_textures(&[], 2048).is_err());
    }

    #[test]
    fn test_reuse_layout_for_second_slot() {
        let builder = compute_builder();
        let albedo = vec![solid(16, 16, [255, 0, 0, 255]), solid(8, 8, [0, 255, 0, 255])];
        let atlas = builder.pack_textures(&albedo, 2048).unwrap();

        // Normal maps at different resolutions land in the same slots
        let normals = vec![Some(solid(4, 4, [128, 128, 255, 255])), None];
        let normal_atlas = builder
            .pack_textures_in_rects(&normals, &atlas.layout)
            .unwrap();

        assert_eq!(normal_atlas.width(), atlas.layout.width);
        assert_eq!(normal_atlas.height(), atlas.layout.height);
        let first = atlas.layout.regions[0].to_pixels(atlas.layout.width, atlas.layout.height);
        assert_eq!(
            normal_atlas.get_pixel(first.x + first.w - 1, first.y + first.h - 1),
            [128, 128, 255, 255]
        );
        let second = atlas.layout.regions[1].to_pixels(atlas.layout.width, atlas.layout.height);
        assert_eq!(normal_atlas.get_pixel(second.x, second.y), [0, 0, 0, 0]);
    }

    #[test]
    fn test_reuse_layout_length_mismatch() {
        let layout = AtlasLayout {
            width: 16,
            height: 16,
            regions: vec![AtlasRegion::default()],
        };
        let err = compute_builder()
            .pack_textures_in_rects(&[None, None], &layout)
            .unwrap_err();
        assert!(matches!(err, CombineError::LayoutMismatch { images: 2, rects: 1 }));
    }

    #[test]
    fn test_fallback_multiple_textures() {
        let builder = FallbackAtlasBuilder::new(1, false);
        let images = vec![
            solid(16, 16, [255, 0, 0, 255]),
            solid(16, 16, [0, 255, 0, 255]),
            solid(16, 16, [0, 0, 255, 255]),
        ];
        let atlas = builder.pack_textures(&images, 256).unwrap();

        assert_eq!((atlas.layout.width, atlas.layout.height), (64, 64));
        assert_eq!(atlas.layout.regions.len(), 3);
        assert_disjoint(&atlas.layout.regions);
        assert_eq!(atlas.texture.mip_count(), 1);

        let rect = atlas.layout.regions[2].to_pixels(64, 64);
        assert_eq!(atlas.texture.get_pixel(rect.x, rect.y), [0, 0, 255, 255]);
        // Edge-clamped padding
        assert_eq!(atlas.texture.get_pixel(rect.x - 1, rect.y - 1), [0, 0, 255, 255]);
    }

    #[test]
    fn test_fallback_out_of_space() {
        let builder = FallbackAtlasBuilder::new(0, false);
        let images = vec![solid(128, 128, [0, 0, 0, 255])];
        assert!(matches!(
            builder.pack_textures(&images, 64),
            Err(CombineError::AtlasBuild(_))
        ));
    }

    #[test]
    fn test_fallback_small_max_size() {
        let builder = FallbackAtlasBuilder::new(0, false);
        let images = vec![solid(16, 16, [3, 3, 3, 255])];
        let atlas = builder.pack_textures(&images, 32).unwrap();
        assert_eq!((atlas.layout.width, atlas.layout.height), (32, 32));
        assert_eq!(atlas.texture.get_pixel(15, 15), [3, 3, 3, 255]);

        // Not a power of two, rounds down
        let atlas = builder.pack_textures(&images, 48).unwrap();
        assert_eq!((atlas.layout.width, atlas.layout.height), (32, 32));
    }

    #[test]
    fn test_fallback_accepts_portrait_images() {
        let builder = FallbackAtlasBuilder::new(0, true);
        let images = vec![solid(8, 32, [5, 5, 5, 255])];
        let atlas = builder.pack_textures(&images, 256).unwrap();
        assert_eq!(atlas.layout.width, atlas.layout.height);
        assert!(atlas.texture.mip_count() > 1);
    }

    #[test]
    fn test_select_strategy() {
        let device: Arc<dyn ComputeDevice> = Arc::new(SoftwareDevice);
        let compute = select_strategy(
            Capabilities {
                supports_compute: true,
            },
            device.clone(),
            0,
            true,
        );
        assert_eq!(compute.name(), "compute");

        let fallback = select_strategy(Capabilities::cpu_only(), device, 0, true);
        assert_eq!(fallback.name(), "fallback");
    }
}
