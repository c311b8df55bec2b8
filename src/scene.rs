//! Minimal transform hierarchy.
//!
//! Nodes live in an arena and are addressed by [`NodeId`]. Joints are plain node ids, so two
//! surfaces bound to the same joint compare equal by value.

use crate::error::{CombineError, Result};
use crate::mesh::{CombinedMesh, Material};
use glam::Mat4;
use std::sync::Arc;

/// Stable handle to a node in a [`Scene`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// The renderable attached to a node after combination.
#[derive(Debug, Clone)]
pub struct SkinnedRenderer {
    /// Combined geometry and skinning data.
    pub mesh: Arc<CombinedMesh>,
    /// Joints, index-paired with `mesh.bind_poses`.
    pub bones: Vec<NodeId>,
    /// The single shared material holding one atlas per texture slot.
    pub material: Material,
    /// Number of times a combine has written into this renderer.
    pub generation: u32,
}

/// A node in the transform hierarchy.
#[derive(Debug, Clone)]
pub struct SceneNode {
    pub name: String,
    /// Transform relative to the parent.
    pub local: Mat4,
    pub parent: Option<NodeId>,
    pub renderer: Option<SkinnedRenderer>,
}

/// Arena of transform nodes.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    nodes: Vec<SceneNode>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a root-level node.
    pub fn add_node(&mut self, name: impl Into<String>, local: Mat4) -> NodeId {
        self.push(name.into(), local, None)
    }

    /// Add a node under `parent`.
    pub fn add_child(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        local: Mat4,
    ) -> Result<NodeId> {
        self.node(parent)?;
        Ok(self.push(name.into(), local, Some(parent)))
    }

    fn push(&mut self, name: String, local: Mat4, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(SceneNode {
            name,
            local,
            parent,
            renderer: None,
        });
        id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Result<&SceneNode> {
        self.nodes.get(id.index()).ok_or(CombineError::UnknownNode(id))
    }

    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut SceneNode> {
        self.nodes
            .get_mut(id.index())
            .ok_or(CombineError::UnknownNode(id))
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.index()).and_then(|n| n.parent)
    }

    /// Walk the parent chain, nearest ancestor first. The node itself is not included.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            scene: self,
            next: self.parent(id),
        }
    }

    /// Compose local transforms from the hierarchy root down to `id`.
    pub fn local_to_world(&self, id: NodeId) -> Result<Mat4> {
        let mut matrix = self.node(id)?.local;
        for ancestor in self.ancestors(id) {
            matrix = self.node(ancestor)?.local * matrix;
        }
        Ok(matrix)
    }

    pub fn world_to_local(&self, id: NodeId) -> Result<Mat4> {
        Ok(self.local_to_world(id)?.inverse())
    }

    pub fn renderer(&self, id: NodeId) -> Option<&SkinnedRenderer> {
        self.nodes.get(id.index()).and_then(|n| n.renderer.as_ref())
    }

    pub fn renderer_mut(&mut self, id: NodeId) -> Option<&mut SkinnedRenderer> {
        self.nodes
            .get_mut(id.index())
            .and_then(|n| n.renderer.as_mut())
    }

    /// Find the first node with the given name.
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|n| n.name == name)
            .map(|i| NodeId(i as u32))
    }
}

/// Iterator over a node's ancestors.
pub struct Ancestors<'a> {
    scene: &'a Scene,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.scene.parent(current);
        Some(current)
    }
}
