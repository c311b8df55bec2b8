//! Geometry concatenation.

use crate::mesh::{CombinedMesh, SkinnedMesh};
use glam::{Mat4, Vec3};

/// Default normal for surfaces that carry none.
const UP: [f32; 3] = [0.0, 1.0, 0.0];

/// Concatenate meshes into one, baking a transform into each.
///
/// All submeshes are merged into a single index list. Vertex order follows `parts`.
pub fn merge_geometry(parts: &[(&SkinnedMesh, Mat4)]) -> CombinedMesh {
    let vertex_count: usize = parts.iter().map(|(m, _)| m.vertex_count()).sum();
    let index_count: usize = parts
        .iter()
        .flat_map(|(m, _)| m.submeshes.iter().map(Vec::len))
        .sum();

    let mut out = CombinedMesh {
        positions: Vec::with_capacity(vertex_count),
        normals: Vec::with_capacity(vertex_count),
        indices: Vec::with_capacity(index_count),
        ..CombinedMesh::default()
    };

    for &(mesh, transform) in parts {
        let offset = out.positions.len() as u32;

        out.positions.extend(
            mesh.positions
                .iter()
                .map(|&p| transform.transform_point3(Vec3::from(p)).to_array()),
        );

        if mesh.normals.len() == mesh.vertex_count() {
            let normal_matrix = transform.inverse().transpose();
            out.normals.extend(mesh.normals.iter().map(|&n| {
                normal_matrix
                    .transform_vector3(Vec3::from(n))
                    .normalize_or_zero()
                    .to_array()
            }));
        } else {
            out.normals
                .extend(std::iter::repeat(UP).take(mesh.vertex_count()));
        }

        for submesh in &mesh.submeshes {
            out.indices.extend(submesh.iter().map(|&i| i + offset));
        }
    }

    out.recalculate_bounds();
    out
}
