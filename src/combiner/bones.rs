//! Combined bone list with bind poses.

use crate::error::{CombineError, Result};
use crate::mesh::SourceSurface;
use crate::scene::{NodeId, Scene};
use glam::Mat4;
use std::collections::HashMap;

/// Ordered, deduplicated joints paired index for index with their bind poses.
///
/// Indices are stable for one combine call. The table is cleared and reused between calls.
#[derive(Debug, Default)]
pub struct BoneTable {
    bones: Vec<NodeId>,
    bind_poses: Vec<Mat4>,
    lookup: HashMap<NodeId, u32>,
}

impl BoneTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.bones.clear();
        self.bind_poses.clear();
        self.lookup.clear();
    }

    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    pub fn bones(&self) -> &[NodeId] {
        &self.bones
    }

    pub fn bind_poses(&self) -> &[Mat4] {
        &self.bind_poses
    }

    pub fn index_of(&self, bone: NodeId) -> Option<u32> {
        self.lookup.get(&bone).copied()
    }

    /// Add a joint if it is not present yet. The first bind pose seen for a joint wins.
    pub fn insert(&mut self, bone: NodeId, bind_pose: Mat4) -> u32 {
        if let Some(index) = self.index_of(bone) {
            return index;
        }
        let index = self.bones.len() as u32;
        self.bones.push(bone);
        self.bind_poses.push(bind_pose);
        self.lookup.insert(bone, index);
        index
    }

    /// Merge a surface's joints and return its local-to-global index table.
    pub fn map_surface(&mut self, surface_index: usize, surface: &SourceSurface) -> Result<Vec<u32>> {
        let bind_poses = &surface.mesh.bind_poses;
        if bind_poses.len() != surface.bones.len() {
            return Err(CombineError::BindPoseMismatch {
                surface: surface_index,
                bones: surface.bones.len(),
                bind_poses: bind_poses.len(),
            });
        }

        Ok(surface
            .bones
            .iter()
            .zip(bind_poses)
            .map(|(&bone, &pose)| self.insert(bone, pose))
            .collect())
    }

    /// Nearest ancestor of `node` that is already a combined bone.
    pub fn resolve_ancestor(&self, scene: &Scene, node: NodeId) -> Option<(NodeId, u32)> {
        scene
            .ancestors(node)
            .find_map(|ancestor| self.index_of(ancestor).map(|index| (ancestor, index)))
    }
}
