//! Per-vertex bone weight remapping.
//!
//! Every vertex is independent, so each surface's slice of the output is filled by one
//! parallel dispatch that completes before the next surface starts.

use crate::error::{CombineError, Result};
use crate::types::BoneWeight;
use rayon::prelude::*;

/// How a surface's vertices are bound to the combined skeleton.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Binding {
    /// The surface carries its own weight table.
    Skinned,
    /// Every vertex follows one ancestor bone.
    Rigid { bone: u32 },
    /// No weight table and no ancestor in the bone list. Vertices get weight 0 on bone 0.
    Unresolved,
}

impl Binding {
    /// Vertices already follow a bone, so geometry must not be pre-transformed.
    pub fn is_rigid(&self) -> bool {
        matches!(self, Binding::Rigid { .. })
    }
}

/// Translate a surface's weights through its local-to-global bone table into `target`.
pub fn remap_weights(
    target: &mut [BoneWeight],
    source: &[BoneWeight],
    mapping: &[u32],
    surface: usize,
) -> Result<()> {
    if target.len() != source.len() {
        return Err(CombineError::WeightCountMismatch {
            surface,
            vertices: target.len(),
            weights: source.len(),
        });
    }

    target
        .par_iter_mut()
        .zip(source.par_iter())
        .enumerate()
        .try_for_each(|(vertex, (out, weight))| {
            *out = weight
                .remap(mapping)
                .map_err(|index| CombineError::InvalidBoneIndex {
                    surface,
                    vertex,
                    index,
                    bone_count: mapping.len(),
                })?;
            Ok(())
        })
}

/// Fill a rigid or unresolved surface's slice with a single influence.
pub fn fill_binding(target: &mut [BoneWeight], binding: Binding) {
    let weight = match binding {
        Binding::Rigid { bone } => BoneWeight::rigid(bone),
        Binding::Unresolved | Binding::Skinned => BoneWeight::default(),
    };
    target.par_iter_mut().for_each(|out| *out = weight);
}
