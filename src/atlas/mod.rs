//! Texture atlas building.
//!
//! This module lays out the textures of many surfaces into one image and reports the
//! normalized region each surface was assigned.

mod builder;
pub mod device;
pub mod packer;

pub use builder::{
    select_strategy, AtlasLayout, AtlasRegion, AtlasStrategy, ComputeAtlasBuilder,
    FallbackAtlasBuilder, PackedAtlas,
};
pub use device::{Capabilities, CommandStream, ComputeDevice, PixelRect, SoftwareDevice};
pub use packer::{Block, Packer};
