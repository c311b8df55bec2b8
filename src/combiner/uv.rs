//! Per-vertex UV remapping into atlas regions.

use crate::atlas::AtlasRegion;
use crate::mesh::SkinnedMesh;
use rayon::prelude::*;

/// Map a surface's own `[0, 1]` UVs into its atlas region, one task per vertex.
pub fn remap_uvs(target: &mut [[f32; 2]], mesh: &SkinnedMesh, region: &AtlasRegion) {
    target
        .par_iter_mut()
        .enumerate()
        .for_each(|(vertex, out)| {
            let [u, v] = mesh.uv(vertex);
            *out = region.transform_uv(u, v);
        });
}
