//! Copy/dispatch surface for the compute atlas path.
//!
//! The compute builder records scaled copies on a [`CommandStream`] and submits it once to a
//! [`ComputeDevice`]. [`SoftwareDevice`] executes the stream on the CPU with the same
//! point-sampled copy a compute kernel would run, one row per task.

use crate::error::Result;
use crate::mesh::Texture;
use image::imageops::FilterType;
use image::RgbaImage;
use rayon::prelude::*;
use std::sync::OnceLock;

/// Environment variable that forces the CPU fallback when set to a non-empty value.
pub const DISABLE_COMPUTE_ENV: &str = "SKIN_COMBINER_DISABLE_COMPUTE";

/// A destination rectangle in atlas pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl PixelRect {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }
}

/// One recorded device operation.
#[derive(Debug, Clone, Copy)]
pub enum Command<'a> {
    /// Resample `source` into `dest`, stretching it to the rectangle size.
    CopyScaled { source: &'a Texture, dest: PixelRect },
    /// Rebuild the target's mip chain from its base level.
    GenerateMips,
}

/// Ordered list of commands against a single target.
#[derive(Debug, Default)]
pub struct CommandStream<'a> {
    commands: Vec<Command<'a>>,
}

impl<'a> CommandStream<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn copy_scaled(&mut self, source: &'a Texture, dest: PixelRect) {
        self.commands.push(Command::CopyScaled { source, dest });
    }

    pub fn generate_mips(&mut self) {
        self.commands.push(Command::GenerateMips);
    }

    pub fn commands(&self) -> &[Command<'a>] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// A device that can execute copy streams into an atlas target.
pub trait ComputeDevice: Send + Sync {
    /// Whether the device can run compute dispatches at all.
    fn supports_compute(&self) -> bool;

    /// Execute every command in order against `target`.
    fn submit(&self, target: &mut Texture, stream: CommandStream<'_>) -> Result<()>;
}

/// Device capability flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub supports_compute: bool,
}

impl Capabilities {
    /// Query a device, honouring [`DISABLE_COMPUTE_ENV`].
    pub fn query(device: &dyn ComputeDevice) -> Self {
        Self {
            supports_compute: device.supports_compute() && !compute_disabled(),
        }
    }

    /// Capabilities of a host without compute support.
    pub fn cpu_only() -> Self {
        Self {
            supports_compute: false,
        }
    }
}

/// Read once per process.
fn compute_disabled() -> bool {
    static DISABLED: OnceLock<bool> = OnceLock::new();
    *DISABLED.get_or_init(|| {
        std::env::var_os(DISABLE_COMPUTE_ENV).is_some_and(|v| !v.is_empty())
    })
}

/// Executes command streams on the CPU.
#[derive(Debug, Clone, Copy, Default)]
pub struct SoftwareDevice;

impl ComputeDevice for SoftwareDevice {
    fn supports_compute(&self) -> bool {
        true
    }

    fn submit(&self, target: &mut Texture, stream: CommandStream<'_>) -> Result<()> {
        log::trace!("Executing {} atlas commands", stream.len());
        for command in stream.commands {
            match command {
                Command::CopyScaled { source, dest } => {
                    blit_scaled(target.image_mut(), source.image(), dest)
                }
                Command::GenerateMips => {
                    let mips = build_mip_chain(target.image());
                    target.set_mips(mips);
                }
            }
        }
        Ok(())
    }
}

/// Point-sample `source` into `dest`, clipped to the target bounds.
pub(crate) fn blit_scaled(target: &mut RgbaImage, source: &RgbaImage, dest: PixelRect) {
    let (target_w, target_h) = target.dimensions();
    let (source_w, source_h) = source.dimensions();
    if dest.w == 0 || dest.h == 0 || source_w == 0 || source_h == 0 {
        return;
    }

    let x_end = (dest.x + dest.w).min(target_w);
    let y_end = (dest.y + dest.h).min(target_h);
    if dest.x >= x_end || dest.y >= y_end {
        return;
    }

    let step_x = source_w as f32 / dest.w as f32;
    let step_y = source_h as f32 / dest.h as f32;
    let row_bytes = target_w as usize * 4;

    target
        .par_chunks_mut(row_bytes)
        .enumerate()
        .skip(dest.y as usize)
        .take((y_end - dest.y) as usize)
        .for_each(|(y, row)| {
            let sy = ((((y as u32 - dest.y) as f32 + 0.5) * step_y) as u32).min(source_h - 1);
            for x in dest.x..x_end {
                let sx = ((((x - dest.x) as f32 + 0.5) * step_x) as u32).min(source_w - 1);
                let i = x as usize * 4;
                row[i..i + 4].copy_from_slice(&source.get_pixel(sx, sy).0);
            }
        });
}

/// Halve repeatedly down to 1x1.
pub(crate) fn build_mip_chain(base: &RgbaImage) -> Vec<RgbaImage> {
    let mut mips: Vec<RgbaImage> = Vec::new();
    let (mut w, mut h) = base.dimensions();
    while w > 1 || h > 1 {
        w = (w / 2).max(1);
        h = (h / 2).max(1);
        let next = image::imageops::resize(mips.last().unwrap_or(base), w, h, FilterType::Triangle);
        mips.push(next);
    }
    mips
}
