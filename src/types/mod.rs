//! Shared types used throughout the library.

use serde::{Deserialize, Serialize};

/// Maximum number of joint influences per vertex.
pub const MAX_INFLUENCES: usize = 4;

/// An axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl BoundingBox {
    pub fn from_points(points: impl Iterator<Item = [f32; 3]>) -> Option<Self> {
        let mut min = [f32::MAX; 3];
        let mut max = [f32::MIN; 3];
        let mut has_points = false;

        for p in points {
            has_points = true;
            for i in 0..3 {
                min[i] = min[i].min(p[i]);
                max[i] = max[i].max(p[i]);
            }
        }

        if has_points {
            Some(Self { min, max })
        } else {
            None
        }
    }
}

/// Up to four `(bone index, weight)` influences on one vertex.
///
/// Unused slots have weight 0; their index is unspecified. Laid out as the four indices
/// followed by the four weights.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[repr(C)]
pub struct BoneWeight {
    pub indices: [u32; MAX_INFLUENCES],
    pub weights: [f32; MAX_INFLUENCES],
}

impl BoneWeight {
    pub fn new(indices: [u32; MAX_INFLUENCES], weights: [f32; MAX_INFLUENCES]) -> Self {
        Self { indices, weights }
    }

    /// A vertex that follows exactly one bone.
    pub fn rigid(index: u32) -> Self {
        Self {
            indices: [index, 0, 0, 0],
            weights: [1.0, 0.0, 0.0, 0.0],
        }
    }

    /// Sum of all influence weights.
    pub fn total(&self) -> f32 {
        self.weights.iter().sum()
    }

    /// Translate local bone indices through a local-to-global table.
    ///
    /// Zero-weight slots whose index is out of range collapse to 0. A weighted slot that
    /// is out of range returns the offending local index.
    pub fn remap(&self, mapping: &[u32]) -> std::result::Result<Self, u32> {
        let mut out = *self;
        for slot in 0..MAX_INFLUENCES {
            let local = self.indices[slot];
            out.indices[slot] = match mapping.get(local as usize) {
                Some(&global) => global,
                None if self.weights[slot] == 0.0 => 0,
                None => return Err(local),
            };
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_from_points() {
        let points = [[0.0, 1.0, -2.0], [3.0, -1.0, 2.0], [1.0, 0.0, 0.0]];
        let bounds = BoundingBox::from_points(points.into_iter()).unwrap();
        assert_eq!(bounds.min, [0.0, -1.0, -2.0]);
        assert_eq!(bounds.max, [3.0, 1.0, 2.0]);
    }

    #[test]
    fn test_bounds_empty() {
        assert!(BoundingBox::from_points(std::iter::empty()).is_none());
    }

    #[test]
    fn test_remap_bone_weight() {
        let weight = BoneWeight::new([0, 1, 2, 0], [0.5, 0.25, 0.25, 0.0]);
        let remapped = weight.remap(&[7, 3, 9]).unwrap();
        assert_eq!(remapped.indices, [7, 3, 9, 7]);
        assert_eq!(remapped.weights, weight.weights);
    }

    #[test]
    fn test_remap_out_of_range() {
        // Unweighted slot past the end is tolerated
        let unused = BoneWeight::new([0, 5, 0, 0], [1.0, 0.0, 0.0, 0.0]);
        assert_eq!(unused.remap(&[4]).unwrap().indices, [4, 0, 4, 4]);

        let weighted = BoneWeight::new([0, 5, 0, 0], [0.5, 0.5, 0.0, 0.0]);
        assert_eq!(weighted.remap(&[4]), Err(5));
    }

    #[test]
    fn test_rigid_weight() {
        let weight = BoneWeight::rigid(3);
        assert_eq!(weight.indices[0], 3);
        assert!((weight.total() - 1.0).abs() < f32::EPSILON);
    }
}
