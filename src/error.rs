//! Error types for the skin combiner.

use crate::scene::NodeId;
use thiserror::Error;

/// Result type alias using CombineError.
pub type Result<T> = std::result::Result<T, CombineError>;

/// Main error type for mesh consolidation and atlas building.
#[derive(Error, Debug)]
pub enum CombineError {
    /// Failed to read or process an image.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Failed to parse JSON configuration.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The packed layout came out taller than it is wide.
    /// Atlases are always landscape; nothing is assigned to the root when this fires.
    #[error("Packed atlas is narrower than it is tall ({width}x{height})")]
    PortraitAtlas { width: u32, height: u32 },

    /// The packer could grow in neither direction for a rectangle.
    /// Only happens when the input was not sorted by decreasing height.
    #[error("Cannot place a {width}x{height} rectangle: input not sorted by decreasing height")]
    Unpackable { width: u32, height: u32 },

    /// A weighted influence points past the end of its surface's joint list.
    #[error("Surface {surface} vertex {vertex} references bone {index} but only {bone_count} bones are bound")]
    InvalidBoneIndex {
        surface: usize,
        vertex: usize,
        index: u32,
        bone_count: usize,
    },

    /// A weight table that does not cover every vertex.
    #[error("Surface {surface} has {vertices} vertices but {weights} bone weights")]
    WeightCountMismatch {
        surface: usize,
        vertices: usize,
        weights: usize,
    },

    /// Joint list and bind pose list are not paired index for index.
    #[error("Surface {surface} has {bones} bones but {bind_poses} bind poses")]
    BindPoseMismatch {
        surface: usize,
        bones: usize,
        bind_poses: usize,
    },

    /// A reused layout does not have one rectangle per image.
    #[error("Layout has {rects} rectangles for {images} images")]
    LayoutMismatch { images: usize, rects: usize },

    /// Combiner configuration cannot be used.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A node handle that does not belong to the scene.
    #[error("Unknown scene node: {0:?}")]
    UnknownNode(NodeId),

    /// Failed to build texture atlas.
    #[error("Atlas building error: {0}")]
    AtlasBuild(String),
}
