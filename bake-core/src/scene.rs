//! Materials, mesh entities, and ambient host state.
//!
//! The scene is a plain-data view of what the host owns: materials with
//! optional shading graphs, mesh entities with UV layers and material
//! slots, the renderer context, and the current selection. Renderer and
//! selection state are explicit value objects so the bake orchestrator can
//! snapshot and restore them as plain copies.

use crate::graph::ShadingGraph;
use crate::image_io::BakedImage;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Surface blend/alpha mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendMode {
    Opaque,
    AlphaClip,
    AlphaBlend,
}

/// A material: unique name plus an optional shading graph.
/// Materials without a graph are "empty" (legacy) materials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Material {
    pub name: String,
    pub graph: Option<ShadingGraph>,
    pub blend_mode: BlendMode,
}

impl Material {
    pub fn new(name: impl Into<String>, graph: ShadingGraph) -> Self {
        Self {
            name: name.into(),
            graph: Some(graph),
            blend_mode: BlendMode::Opaque,
        }
    }

    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            graph: None,
            blend_mode: BlendMode::Opaque,
        }
    }

    pub fn with_blend_mode(mut self, blend_mode: BlendMode) -> Self {
        self.blend_mode = blend_mode;
        self
    }
}

/// Named, ordered per-corner 2D coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UvLayer {
    pub name: String,
    pub coords: Vec<[f32; 2]>,
}

/// Mesh topology counts plus UV layers
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeshData {
    pub vertex_count: usize,
    pub face_count: usize,
    pub uv_layers: Vec<UvLayer>,
    /// Index into `uv_layers`; None when the mesh has no UVs
    pub active_uv: Option<usize>,
}

impl MeshData {
    pub fn active_uv_layer(&self) -> Option<&UvLayer> {
        self.uv_layers.get(self.active_uv?)
    }

    pub fn has_uv(&self) -> bool {
        self.active_uv_layer()
            .map(|l| !l.coords.is_empty())
            .unwrap_or(false)
    }
}

/// A scene object referencing materials through ordered slots
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshEntity {
    pub name: String,
    pub mesh: Option<MeshData>,
    /// Material name per slot index
    pub material_slots: Vec<String>,
}

impl MeshEntity {
    pub fn new(name: impl Into<String>, mesh: MeshData, material_slots: Vec<String>) -> Self {
        Self {
            name: name.into(),
            mesh: Some(mesh),
            material_slots,
        }
    }

    pub fn has_uv(&self) -> bool {
        self.mesh.as_ref().map(MeshData::has_uv).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderDevice {
    Cpu,
    Gpu,
}

/// Per-bake channel pass toggles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BakePassConfig {
    pub direct: bool,
    pub indirect: bool,
    pub color: bool,
}

impl Default for BakePassConfig {
    fn default() -> Self {
        Self {
            direct: true,
            indirect: true,
            color: true,
        }
    }
}

/// Renderer engine state as an explicit value object. Snapshot/restore are
/// plain copies of this value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RendererContext {
    pub engine: String,
    pub samples: u32,
    pub denoise: bool,
    pub device: RenderDevice,
    pub passes: BakePassConfig,
}

impl Default for RendererContext {
    fn default() -> Self {
        Self {
            engine: "realtime".to_string(),
            samples: 64,
            denoise: true,
            device: RenderDevice::Cpu,
            passes: BakePassConfig::default(),
        }
    }
}

/// Object selection state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub selected: Vec<String>,
    pub active: Option<String>,
}

/// Everything the analyses read and the orchestrator temporarily mutates
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scene {
    pub materials: Vec<Material>,
    pub entities: Vec<MeshEntity>,
    #[serde(default)]
    pub selection: Selection,
    #[serde(default)]
    pub renderer: RendererContext,
    /// Persistent named output images, one per (base-name, texture-suffix)
    #[serde(default)]
    pub images: BTreeMap<String, BakedImage>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn material(&self, name: &str) -> Option<&Material> {
        self.materials.iter().find(|m| m.name == name)
    }

    pub fn material_mut(&mut self, name: &str) -> Option<&mut Material> {
        self.materials.iter_mut().find(|m| m.name == name)
    }

    pub fn add_material(&mut self, material: Material) {
        self.materials.push(material);
    }

    pub fn remove_material(&mut self, name: &str) -> Option<Material> {
        let idx = self.materials.iter().position(|m| m.name == name)?;
        Some(self.materials.remove(idx))
    }

    /// Indices of entities with at least one slot referencing the material
    pub fn entities_using(&self, material: &str) -> Vec<usize> {
        self.entities
            .iter()
            .enumerate()
            .filter(|(_, e)| e.material_slots.iter().any(|s| s == material))
            .map(|(i, _)| i)
            .collect()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Other(format!("cannot read scene {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}
