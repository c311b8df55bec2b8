//! Source and combined mesh geometry.

use crate::types::{BoneWeight, BoundingBox};
use glam::Mat4;
use std::mem;

/// Geometry of one skinned source surface.
///
/// Vertex data is stored in structure-of-arrays layout. `normals` and `uvs` may be empty;
/// missing UVs read as `(0, 0)`.
#[derive(Debug, Clone, Default)]
pub struct SkinnedMesh {
    /// Vertex positions in the surface's local space.
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    /// Texture coordinates in `[0, 1]` for the surface's own textures.
    pub uvs: Vec<[f32; 2]>,
    /// Triangle index lists, one per submesh.
    pub submeshes: Vec<Vec<u32>>,
    /// Per-vertex influences. `None` (or empty) means the surface is rigidly attached.
    pub bone_weights: Option<Vec<BoneWeight>>,
    /// Inverse bind matrix per joint, paired with the surface's joint list.
    pub bind_poses: Vec<Mat4>,
}

impl SkinnedMesh {
    pub fn new(positions: Vec<[f32; 3]>, uvs: Vec<[f32; 2]>) -> Self {
        Self {
            positions,
            uvs,
            ..Self::default()
        }
    }

    pub fn with_normals(mut self, normals: Vec<[f32; 3]>) -> Self {
        self.normals = normals;
        self
    }

    pub fn with_submesh(mut self, indices: Vec<u32>) -> Self {
        self.submeshes.push(indices);
        self
    }

    pub fn with_bone_weights(mut self, weights: Vec<BoneWeight>) -> Self {
        self.bone_weights = Some(weights);
        self
    }

    pub fn with_bind_poses(mut self, bind_poses: Vec<Mat4>) -> Self {
        self.bind_poses = bind_poses;
        self
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn submesh_count(&self) -> usize {
        self.submeshes.len()
    }

    /// The weight table, if the surface carries a non-empty one.
    pub fn weights(&self) -> Option<&[BoneWeight]> {
        self.bone_weights.as_deref().filter(|w| !w.is_empty())
    }

    pub fn uv(&self, vertex: usize) -> [f32; 2] {
        self.uvs.get(vertex).copied().unwrap_or([0.0, 0.0])
    }
}

/// The merged output of one combine call.
#[derive(Debug, Clone, Default)]
pub struct CombinedMesh {
    /// Vertex positions in the root's local space.
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    /// Texture coordinates into the shared atlas.
    pub uvs: Vec<[f32; 2]>,
    /// Triangle indices of the single merged submesh.
    pub indices: Vec<u32>,
    /// Influences indexing the combined bone list.
    pub bone_weights: Vec<BoneWeight>,
    /// Inverse bind matrix per combined bone.
    pub bind_poses: Vec<Mat4>,
    pub bounds: BoundingBox,
}

impl CombinedMesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if this mesh contains no vertices.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Recompute the bounds from the current positions.
    pub fn recalculate_bounds(&mut self) {
        self.bounds =
            BoundingBox::from_points(self.positions.iter().copied()).unwrap_or_default();
    }

    /// Raw bytes of the positions array. Zero-allocation view.
    pub fn positions_bytes(&self) -> &[u8] {
        cast_slice(&self.positions)
    }

    /// Raw bytes of the UVs array. Zero-allocation view.
    pub fn uvs_bytes(&self) -> &[u8] {
        cast_slice(&self.uvs)
    }

    /// Raw bytes of the indices array. Zero-allocation view.
    pub fn indices_bytes(&self) -> &[u8] {
        cast_slice(&self.indices)
    }

    /// Raw bytes of the bone weights, indices then weights per vertex.
    pub fn bone_weights_bytes(&self) -> &[u8] {
        cast_slice(&self.bone_weights)
    }
}

/// Cast a slice of `T` to a byte slice without allocation.
fn cast_slice<T: Copy>(slice: &[T]) -> &[u8] {
    let ptr = slice.as_ptr() as *const u8;
    let len = mem::size_of_val(slice);
    // SAFETY: [f32; N], [u32] and BoneWeight (repr(C), [u32; 4] + [f32; 4]) have no padding.
    unsafe { std::slice::from_raw_parts(ptr, len) }
}
