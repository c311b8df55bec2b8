//! Skinned surface consolidation.
//!
//! [`Combiner::combine`] merges a set of [`SourceSurface`]s into one renderable on a root
//! node: one deduplicated bone list, one merged mesh, and one material with an atlas per
//! texture slot. The steps run in a fixed order:
//!
//! 1. drop disabled surfaces and surfaces without a primary texture
//! 2. move surfaces with weight tables ahead of rigidly attached ones
//! 3. merge joints and remap per-vertex weights
//! 4. concatenate geometry
//! 5. pack the primary slot, then reuse that layout for the remaining slots
//! 6. remap UVs into the atlas
//! 7. attach the result to the root and disable every consumed surface
//!
//! Nothing touches the scene or the surfaces before step 7, so a failed call leaves both as
//! they were.

pub mod bones;
pub mod merge;
pub mod uv;
pub mod weights;

pub use bones::BoneTable;
pub use weights::Binding;

use crate::atlas::{
    select_strategy, AtlasLayout, AtlasStrategy, Capabilities, ComputeDevice, SoftwareDevice,
};
use crate::error::{CombineError, Result};
use crate::mesh::{Material, SourceSurface, Texture};
use crate::scene::{NodeId, Scene, SkinnedRenderer};
use crate::types::BoneWeight;
use glam::Mat4;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Combiner configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombinerConfig {
    /// Material slots to atlas. The first one is the primary slot.
    pub texture_slots: Vec<String>,
    /// Maximum atlas width before the layout is scaled down.
    pub max_atlas_size: u32,
    /// Padding between textures, CPU fallback only.
    pub fallback_padding: u32,
    /// Build a mip chain for every atlas.
    pub generate_mips: bool,
}

impl Default for CombinerConfig {
    fn default() -> Self {
        Self {
            texture_slots: vec![
                "albedo".to_string(),
                "normal".to_string(),
                "specular".to_string(),
            ],
            max_atlas_size: 2048,
            fallback_padding: 0,
            generate_mips: true,
        }
    }
}

impl CombinerConfig {
    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_texture_slots<S: Into<String>>(mut self, slots: impl IntoIterator<Item = S>) -> Self {
        self.texture_slots = slots.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_atlas_size(mut self, size: u32) -> Self {
        self.max_atlas_size = size;
        self
    }

    pub fn with_fallback_padding(mut self, padding: u32) -> Self {
        self.fallback_padding = padding;
        self
    }

    pub fn with_mips(mut self, generate: bool) -> Self {
        self.generate_mips = generate;
        self
    }

    /// The slot that decides eligibility and drives the layout.
    pub fn primary_slot(&self) -> Option<&str> {
        self.texture_slots.first().map(String::as_str)
    }

    fn validate(&self) -> Result<()> {
        if self.texture_slots.is_empty() {
            return Err(CombineError::InvalidConfig(
                "at least one texture slot is required".to_string(),
            ));
        }
        if self.max_atlas_size == 0 {
            return Err(CombineError::InvalidConfig(
                "max_atlas_size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Summary of one combine call.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CombineReport {
    /// Surfaces merged.
    pub surfaces: usize,
    /// Vertices in the combined mesh.
    pub vertices: usize,
    /// Joints in the combined bone list.
    pub bones: usize,
    /// Atlas size in pixels, `None` when nothing was combined.
    pub atlas_size: Option<(u32, u32)>,
    /// Input indices of surfaces with no weight table and no ancestor bone.
    /// Their vertices carry weight 0 on bone 0.
    pub unresolved: Vec<usize>,
}

impl CombineReport {
    /// Returns `true` if the call had nothing to combine.
    pub fn is_empty(&self) -> bool {
        self.surfaces == 0
    }
}

/// Merges skinned surfaces into one mesh with shared atlases.
///
/// The bone table and texture staging list are reused across calls and cleared at the
/// start of each one. `combine` takes `&mut self`, so one combiner runs one call at a time;
/// separate combiners are independent.
pub struct Combiner {
    config: CombinerConfig,
    strategy: Box<dyn AtlasStrategy>,
    bones: BoneTable,
    staging: Vec<Option<Arc<Texture>>>,
}

impl Combiner {
    /// Create a combiner for a device, choosing the atlas strategy from its capabilities.
    pub fn new(config: CombinerConfig, device: Arc<dyn ComputeDevice>) -> Result<Self> {
        let capabilities = Capabilities::query(device.as_ref());
        Self::with_capabilities(config, device, capabilities)
    }

    /// Create a combiner with explicit capabilities.
    pub fn with_capabilities(
        config: CombinerConfig,
        device: Arc<dyn ComputeDevice>,
        capabilities: Capabilities,
    ) -> Result<Self> {
        config.validate()?;
        let strategy = select_strategy(
            capabilities,
            device,
            config.fallback_padding,
            config.generate_mips,
        );
        log::debug!("Combiner using {} atlas strategy", strategy.name());
        Ok(Self {
            config,
            strategy,
            bones: BoneTable::new(),
            staging: Vec::new(),
        })
    }

    /// Create a combiner backed by the CPU [`SoftwareDevice`].
    pub fn software(config: CombinerConfig) -> Result<Self> {
        Self::new(config, Arc::new(SoftwareDevice))
    }

    pub fn config(&self) -> &CombinerConfig {
        &self.config
    }

    /// Name of the atlas strategy in use.
    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Merge `surfaces` into a renderable attached to `root`.
    ///
    /// Calling again on the same root replaces the renderer's mesh with a new one; already
    /// consumed surfaces are disabled and therefore skipped.
    pub fn combine(
        &mut self,
        scene: &mut Scene,
        root: NodeId,
        surfaces: &mut [SourceSurface],
    ) -> Result<CombineReport> {
        self.bones.clear();
        self.staging.clear();

        let Some(primary) = self.config.primary_slot() else {
            return Err(CombineError::InvalidConfig("no texture slots".to_string()));
        };
        let order = eligible_order(surfaces, primary);
        if order.is_empty() {
            log::debug!("No eligible surfaces out of {}, nothing to combine", surfaces.len());
            return Ok(CombineReport::default());
        }
        log::debug!(
            "Combining {} of {} surfaces onto {:?}",
            order.len(),
            surfaces.len(),
            root
        );

        let root_world_to_local = scene.world_to_local(root)?;
        let selected: Vec<(usize, &SourceSurface)> =
            order.iter().map(|&i| (i, &surfaces[i])).collect();

        // Bones and weights
        let total_vertices: usize = selected.iter().map(|(_, s)| s.mesh.vertex_count()).sum();
        let mut bone_weights = vec![BoneWeight::default(); total_vertices];
        let mut bindings = Vec::with_capacity(selected.len());
        let mut unresolved = Vec::new();
        let mut start = 0;
        for &(index, surface) in &selected {
            let mapping = self.bones.map_surface(index, surface)?;
            let end = start + surface.mesh.vertex_count();
            let target = &mut bone_weights[start..end];

            let binding = match surface.mesh.weights() {
                Some(source) => {
                    weights::remap_weights(target, source, &mapping, index)?;
                    Binding::Skinned
                }
                None => {
                    let binding = match self.bones.resolve_ancestor(scene, surface.node) {
                        Some((bone, global)) => {
                            log::trace!("Surface {} rigidly follows {:?}", index, bone);
                            Binding::Rigid { bone: global }
                        }
                        None => {
                            log::warn!(
                                "Surface {} has no weights and no ancestor bone; its vertices will not be skinned",
                                index
                            );
                            unresolved.push(index);
                            Binding::Unresolved
                        }
                    };
                    weights::fill_binding(target, binding);
                    binding
                }
            };
            bindings.push(binding);
            start = end;
        }

        // Geometry
        let mut parts = Vec::with_capacity(selected.len());
        for (&(_, surface), binding) in selected.iter().zip(&bindings) {
            let transform = if binding.is_rigid() {
                Mat4::IDENTITY
            } else {
                root_world_to_local * scene.local_to_world(surface.node)?
            };
            parts.push((surface.mesh.as_ref(), transform));
        }
        let mut mesh = merge::merge_geometry(&parts);

        // Atlases
        let material_template = &selected[0].1.material;
        let (material, layout) = self.build_atlases(&selected, material_template)?;

        // UVs
        mesh.uvs = vec![[0.0; 2]; total_vertices];
        let mut start = 0;
        for ((_, surface), region) in selected.iter().zip(&layout.regions) {
            let end = start + surface.mesh.vertex_count();
            uv::remap_uvs(&mut mesh.uvs[start..end], &surface.mesh, region);
            start = end;
        }

        mesh.bone_weights = bone_weights;
        mesh.bind_poses = self.bones.bind_poses().to_vec();
        let bones = self.bones.bones().to_vec();

        let report = CombineReport {
            surfaces: selected.len(),
            vertices: mesh.vertex_count(),
            bones: bones.len(),
            atlas_size: Some((layout.width, layout.height)),
            unresolved,
        };

        // Finalize
        let node = scene.node_mut(root)?;
        let mesh = Arc::new(mesh);
        match node.renderer.as_mut() {
            Some(renderer) => {
                renderer.mesh = mesh;
                renderer.bones = bones;
                renderer.material = material;
                renderer.generation += 1;
            }
            None => {
                node.renderer = Some(SkinnedRenderer {
                    mesh,
                    bones,
                    material,
                    generation: 1,
                });
            }
        }
        for &index in &order {
            surfaces[index].enabled = false;
        }

        log::debug!(
            "Combined {} surfaces: {} vertices, {} bones, {}x{} atlas",
            report.surfaces,
            report.vertices,
            report.bones,
            layout.width,
            layout.height
        );
        Ok(report)
    }

    /// Build one atlas per slot. The primary slot decides the layout for all of them.
    fn build_atlases(
        &mut self,
        selected: &[(usize, &SourceSurface)],
        template: &Material,
    ) -> Result<(Material, AtlasLayout)> {
        let mut material = template.clone();
        let Some((primary, others)) = self.config.texture_slots.split_first() else {
            return Err(CombineError::InvalidConfig("no texture slots".to_string()));
        };

        // Every selected surface has a primary texture
        let images: Vec<Arc<Texture>> = selected
            .iter()
            .filter_map(|(_, s)| s.material.texture(primary).cloned())
            .collect();
        let packed = self.strategy.pack_textures(&images, self.config.max_atlas_size)?;
        let layout = packed.layout;
        material.set_texture(primary.clone(), Arc::new(packed.texture));

        for slot in others {
            self.staging.clear();
            self.staging
                .extend(selected.iter().map(|(_, s)| s.material.texture(slot).cloned()));

            let missing = self.staging.iter().filter(|t| t.is_none()).count();
            if missing > 0 {
                log::warn!("{} surfaces have no '{}' texture", missing, slot);
            }
            let atlas = self.strategy.pack_textures_in_rects(&self.staging, &layout)?;
            log::trace!("Built '{}' atlas {}x{}", slot, atlas.width(), atlas.height());
            material.set_texture(slot.clone(), Arc::new(atlas));
        }
        self.staging.clear();

        Ok((material, layout))
    }
}

/// Eligible surface indices, weighted surfaces first, each group in input order.
fn eligible_order(surfaces: &[SourceSurface], primary: &str) -> Vec<usize> {
    let (mut order, rigid): (Vec<usize>, Vec<usize>) = surfaces
        .iter()
        .enumerate()
        .filter(|(_, s)| s.enabled && s.material.texture(primary).is_some())
        .map(|(i, _)| i)
        .partition(|&i| surfaces[i].is_weighted());
    order.extend(rigid);
    order
}
