//! Surfaces, materials, and mesh data.
//!
//! A [`SourceSurface`] is one separately skinned input. The combiner turns a set of them into
//! a single [`CombinedMesh`] with one shared [`Material`].

pub mod geometry;
pub mod texture;

pub use geometry::{CombinedMesh, SkinnedMesh};
pub use texture::Texture;

use crate::scene::NodeId;
use std::collections::HashMap;
use std::sync::Arc;

/// Named texture slots plus an identifying name.
#[derive(Debug, Clone, Default)]
pub struct Material {
    pub name: String,
    pub textures: HashMap<String, Arc<Texture>>,
}

impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            textures: HashMap::new(),
        }
    }

    pub fn with_texture(mut self, slot: impl Into<String>, texture: Arc<Texture>) -> Self {
        self.textures.insert(slot.into(), texture);
        self
    }

    /// Get the texture bound to a slot.
    pub fn texture(&self, slot: &str) -> Option<&Arc<Texture>> {
        self.textures.get(slot)
    }

    pub fn set_texture(&mut self, slot: impl Into<String>, texture: Arc<Texture>) {
        self.textures.insert(slot.into(), texture);
    }
}

/// One mergeable input surface.
#[derive(Debug, Clone)]
pub struct SourceSurface {
    /// Disabled surfaces are skipped. The combiner disables every surface it consumes.
    pub enabled: bool,
    /// The surface's own transform in the scene.
    pub node: NodeId,
    pub mesh: Arc<SkinnedMesh>,
    /// Joints, index-paired with `mesh.bind_poses`.
    pub bones: Vec<NodeId>,
    pub material: Material,
}

impl SourceSurface {
    pub fn new(node: NodeId, mesh: Arc<SkinnedMesh>, material: Material) -> Self {
        Self {
            enabled: true,
            node,
            mesh,
            bones: Vec::new(),
            material,
        }
    }

    pub fn with_bones(mut self, bones: Vec<NodeId>) -> Self {
        self.bones = bones;
        self
    }

    /// Whether this surface carries its own per-vertex weight table.
    pub fn is_weighted(&self) -> bool {
        self.mesh.weights().is_some()
    }
}
