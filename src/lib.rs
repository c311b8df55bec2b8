//! # Skin Combiner
//!
//! A Rust library for merging separately skinned character surfaces into a single renderable.
//!
//! ## Overview
//!
//! Characters assembled from interchangeable parts (bodies, heads, armor pieces) usually carry
//! one mesh, one skeleton binding and one material per part. This library folds a set of such
//! [`SourceSurface`]s into one [`CombinedMesh`] with a deduplicated bone list and one
//! [`Material`] whose textures are atlases shared by every part.
//!
//! ## Quick Start
//!
//! ```ignore
//! use skin_combiner::{Combiner, CombinerConfig, Scene, SourceSurface};
//!
//! let mut combiner = Combiner::software(CombinerConfig::default())?;
//!
//! // Surfaces reference nodes of `scene` for their placement and joints
//! let report = combiner.combine(&mut scene, root, &mut surfaces)?;
//!
//! println!("{} vertices, {} bones", report.vertices, report.bones);
//! ```
//!
//! ## Atlas Strategies
//!
//! The texture atlas is built through an [`AtlasStrategy`]. Devices that report compute
//! support get the binary-tree packer with a command stream; anything else falls back to a
//! CPU row packer. Set `SKIN_COMBINER_DISABLE_COMPUTE` to force the fallback.

pub mod atlas;
pub mod combiner;
pub mod error;
pub mod mesh;
pub mod scene;
pub mod types;

// Re-export main types for convenience
pub use atlas::{
    AtlasLayout, AtlasRegion, AtlasStrategy, Capabilities, ComputeDevice, PackedAtlas,
    Packer, SoftwareDevice,
};
pub use combiner::{CombineReport, Combiner, CombinerConfig};
pub use error::{CombineError, Result};
pub use mesh::{CombinedMesh, Material, SkinnedMesh, SourceSurface, Texture};
pub use scene::{NodeId, Scene, SkinnedRenderer};
pub use types::{BoneWeight, BoundingBox, MAX_INFLUENCES};
