//! Transactional bake orchestration.
//!
//! One bake invocation covers one material and the mesh entities using it:
//! snapshot renderer/selection state, optionally swap in a transform-
//! bypassed copy of the shading graph, create or reuse one output image per
//! required texture, invoke the external bake capability once per texture,
//! and restore every snapshotted field on every exit path.
//!
//! Mutation discipline: any edit to shared state (material slots, node
//! graphs, temp materials) goes through a `BakeSession` method that records
//! its undo before mutating. Restoration failures are logged, never
//! propagated, so they cannot mask the original error.

use crate::classify::{self, BakeChannel, TaxonomySuffix, TextureRequirement};
use crate::graph::{sockets, InputSocket, Node, NodeHandle, NodeKind};
use crate::image_io::{BakedImage, ColorDepth, ImageFormat, ImageSaver};
use crate::scene::{BakePassConfig, Material, RenderDevice, RendererContext, Scene, Selection};
use crate::uv_chain::{self, UvChainReport};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Renderer engine required for baking
const BAKE_ENGINE: &str = "path_tracer";

/// Settings bundle for one bake invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BakeSettings {
    pub width: u32,
    pub height: u32,
    pub samples: u32,
    pub margin: u32,
    pub use_cage: bool,
    pub device: RenderDevice,
    pub output_dir: PathBuf,
    pub format: ImageFormat,
    pub color_depth: ColorDepth,
    /// Delete and recreate a same-named pre-existing image
    pub clear_existing: bool,
    pub save_to_disk: bool,
}

impl Default for BakeSettings {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 1024,
            samples: 32,
            margin: 16,
            use_cage: false,
            device: RenderDevice::Cpu,
            output_dir: PathBuf::from("bakes"),
            format: ImageFormat::Png,
            color_depth: ColorDepth::Standard,
            clear_existing: false,
            save_to_disk: true,
        }
    }
}

/// Everything the external renderer needs for one bake call: the bound
/// output image, the active material, and the configured passes.
pub struct BakeTarget<'a> {
    pub image: &'a mut BakedImage,
    pub material: &'a Material,
    pub passes: BakePassConfig,
}

/// Opaque external renderer capability. Writes baked pixel data into the
/// target's bound image.
pub trait BakeHost {
    fn invoke_bake(
        &mut self,
        target: &mut BakeTarget<'_>,
        channel: BakeChannel,
        margin: u32,
        use_cage: bool,
    ) -> Result<()>;
}

/// Fixed per-channel pass configuration. Not user-configurable per texture.
pub fn configure_channel_passes(channel: BakeChannel) -> BakePassConfig {
    match channel {
        BakeChannel::Combined => BakePassConfig {
            direct: true,
            indirect: false,
            color: true,
        },
        BakeChannel::Diffuse => BakePassConfig {
            direct: false,
            indirect: false,
            color: true,
        },
        BakeChannel::Normal | BakeChannel::Roughness => BakePassConfig {
            direct: false,
            indirect: false,
            color: false,
        },
        // lighting off, color on: captures emissive output
        BakeChannel::Emit => BakePassConfig {
            direct: false,
            indirect: false,
            color: true,
        },
    }
}

/// How one bake invocation ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BakeOutcome {
    Completed,
    /// `_VXC` materials: vertex-color only, nothing to bake
    NoTexturesRequired,
    /// Missing precondition; the batch continues
    Skipped { reason: String },
}

/// Result of one successful (or skipped) bake invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BakeReport {
    pub material: String,
    pub outcome: BakeOutcome,
    pub textures_baked: Vec<String>,
    pub saved_files: Vec<PathBuf>,
    pub warnings: Vec<String>,
}

impl BakeReport {
    fn skipped(material: &str, reason: impl Into<String>, warnings: Vec<String>) -> Self {
        Self {
            material: material.to_string(),
            outcome: BakeOutcome::Skipped {
                reason: reason.into(),
            },
            textures_baked: Vec::new(),
            saved_files: Vec::new(),
            warnings,
        }
    }
}

/// A (entity, slot) pair temporarily repointed to a corrected material copy
#[derive(Debug, Clone)]
struct SlotAssignment {
    entity: usize,
    slot: usize,
    original: String,
}

/// A temporarily swapped-out shader node
#[derive(Debug, Clone)]
struct ShaderSubstitution {
    material: String,
    node: NodeHandle,
    original: Node,
    /// Incoming link retargeted from the emission color socket
    relinked: bool,
}

/// Snapshot of every piece of shared state one bake invocation may touch.
/// `restore` consumes the session, so restoration runs exactly once.
pub struct BakeSession {
    renderer: RendererContext,
    selection: Selection,
    slots: Vec<SlotAssignment>,
    temp_materials: Vec<String>,
    substitution: Option<ShaderSubstitution>,
}

impl BakeSession {
    /// Snapshot renderer and selection state before any mutation
    pub fn begin(scene: &Scene) -> Self {
        Self {
            renderer: scene.renderer.clone(),
            selection: scene.selection.clone(),
            slots: Vec::new(),
            temp_materials: Vec::new(),
            substitution: None,
        }
    }

    /// Repoint one entity slot, recording the original assignment first
    fn reassign_slot(&mut self, scene: &mut Scene, entity: usize, slot: usize, material: &str) {
        let Some(e) = scene.entities.get_mut(entity) else {
            return;
        };
        let Some(current) = e.material_slots.get_mut(slot) else {
            return;
        };
        self.slots.push(SlotAssignment {
            entity,
            slot,
            original: current.clone(),
        });
        debug!(entity = %e.name, slot, material, "repointing material slot");
        *current = material.to_string();
    }

    /// Copy the material with every flagged texture node rebound directly
    /// to a fresh coordinate source, register the copy as temporary, and
    /// repoint the using entities' matching slots to it.
    fn apply_graph_correction(
        &mut self,
        scene: &mut Scene,
        material_name: &str,
        chain_report: &UvChainReport,
        entities: &[usize],
    ) -> Result<String> {
        let source = scene
            .material(material_name)
            .ok_or_else(|| Error::MaterialNotFound(material_name.to_string()))?;
        let mut graph = source
            .graph
            .clone()
            .ok_or_else(|| Error::Graph(format!("material '{}' has no graph", material_name)))?;
        let blend_mode = source.blend_mode;

        for chain in &chain_report.chains {
            graph.remove_incoming(chain.texture, sockets::VECTOR);
            let coord = graph.add_node(Node::tex_coord());
            graph.add_link(coord, sockets::UV, chain.texture, sockets::VECTOR)?;
        }

        let mut copy_name = format!("{}.bake_tmp", material_name);
        while scene.material(&copy_name).is_some() {
            copy_name.push('+');
        }
        // record before mutate
        self.temp_materials.push(copy_name.clone());
        scene.add_material(Material {
            name: copy_name.clone(),
            graph: Some(graph),
            blend_mode,
        });

        for &entity in entities {
            let slot_count = scene
                .entities
                .get(entity)
                .map(|e| e.material_slots.len())
                .unwrap_or(0);
            for slot in 0..slot_count {
                let matches = scene
                    .entities
                    .get(entity)
                    .map(|e| e.material_slots[slot] == material_name)
                    .unwrap_or(false);
                if matches {
                    self.reassign_slot(scene, entity, slot, &copy_name);
                }
            }
        }

        Ok(copy_name)
    }

    /// Replace the material's emission shader with an equivalent
    /// energy-conserving PBR node (emission color as base color, fully
    /// rough, zero specular) so a diffuse-only bake captures the emission's
    /// color. Returns false when the material has no emission node.
    fn substitute_emission_shader(&mut self, scene: &mut Scene, material: &str) -> Result<bool> {
        let mat = scene
            .material_mut(material)
            .ok_or_else(|| Error::MaterialNotFound(material.to_string()))?;
        let Some(graph) = mat.graph.as_mut() else {
            return Ok(false);
        };
        let Some(handle) = graph.find(|k| matches!(k, NodeKind::Emission)) else {
            return Ok(false);
        };
        let original = graph
            .node(handle)
            .cloned()
            .ok_or_else(|| Error::Graph("emission node vanished".into()))?;

        let emission_color = original
            .input(sockets::COLOR)
            .and_then(|s| s.default.as_color())
            .unwrap_or([1.0, 1.0, 1.0, 1.0]);

        // record before mutate
        self.substitution = Some(ShaderSubstitution {
            material: material.to_string(),
            node: handle,
            original,
            relinked: false,
        });

        let replacement = Node::new(
            NodeKind::Pbr,
            vec![
                InputSocket::color(sockets::BASE_COLOR, emission_color),
                InputSocket::scalar(sockets::METALLIC, 0.0),
                InputSocket::scalar(sockets::ROUGHNESS, 1.0),
                InputSocket::scalar(sockets::SPECULAR, 0.0),
                InputSocket::scalar(sockets::ALPHA, 1.0),
                InputSocket::color(sockets::EMISSION_COLOR, [0.0, 0.0, 0.0, 1.0]),
                InputSocket::scalar(sockets::EMISSION_STRENGTH, 0.0),
            ],
        );
        if let Some(node) = graph.node_mut(handle) {
            *node = replacement;
        }
        let relinked = graph.retarget_input(handle, sockets::COLOR, sockets::BASE_COLOR);
        if let Some(sub) = self.substitution.as_mut() {
            sub.relinked = relinked;
        }
        debug!(material, "substituted emission shader for diffuse bake");
        Ok(true)
    }

    /// Undo a pending shader substitution. Safe to call when none is
    /// pending. Failures are logged, not propagated.
    fn revert_substitution(&mut self, scene: &mut Scene) {
        let Some(sub) = self.substitution.take() else {
            return;
        };
        let Some(graph) = scene
            .material_mut(&sub.material)
            .and_then(|m| m.graph.as_mut())
        else {
            warn!(material = %sub.material, "cannot revert shader substitution: material gone");
            return;
        };
        if sub.relinked && !graph.retarget_input(sub.node, sockets::BASE_COLOR, sockets::COLOR) {
            warn!(material = %sub.material, "shader substitution link not found during revert");
        }
        match graph.node_mut(sub.node) {
            Some(node) => *node = sub.original,
            None => warn!(material = %sub.material, "substituted node vanished during revert"),
        }
    }

    /// Restore every snapshotted field, in order: pending shader
    /// substitution, temporary material removal, per-slot assignments,
    /// renderer settings, selection. Step failures are logged only.
    pub fn restore(mut self, scene: &mut Scene) {
        self.revert_substitution(scene);

        for name in self.temp_materials.drain(..) {
            if scene.remove_material(&name).is_none() {
                warn!(material = %name, "temporary material already gone during restore");
            }
        }

        for assignment in self.slots.drain(..).rev() {
            match scene
                .entities
                .get_mut(assignment.entity)
                .and_then(|e| e.material_slots.get_mut(assignment.slot))
            {
                Some(slot) => *slot = assignment.original,
                None => warn!(
                    entity = assignment.entity,
                    slot = assignment.slot,
                    "slot vanished during restore"
                ),
            }
        }

        scene.renderer = self.renderer;
        scene.selection = self.selection;
        debug!("bake session restored");
    }
}

/// Bake one material. Restores all temporarily mutated state on success
/// and on failure; an `Err` means the external bake (or a save) failed
/// after full restoration.
pub fn bake_material(
    scene: &mut Scene,
    host: &mut dyn BakeHost,
    saver: &dyn ImageSaver,
    material_name: &str,
    settings: &BakeSettings,
) -> Result<BakeReport> {
    let material = scene
        .material(material_name)
        .ok_or_else(|| Error::MaterialNotFound(material_name.to_string()))?;
    let suffix = classify::recommend_suffix(material.graph.as_ref(), material.blend_mode);

    if suffix == TaxonomySuffix::Vxc {
        debug!(material = material_name, "vertex-color material, no textures required");
        return Ok(BakeReport {
            material: material_name.to_string(),
            outcome: BakeOutcome::NoTexturesRequired,
            textures_baked: Vec::new(),
            saved_files: Vec::new(),
            warnings: Vec::new(),
        });
    }

    let requirements = classify::derive_texture_requirements(suffix, material.graph.as_ref());
    if requirements.is_empty() {
        return Err(Error::Classification(format!(
            "no textures derived for '{}' ({}) although some were expected",
            material_name,
            suffix.label()
        )));
    }

    let entity_indices = scene.entities_using(material_name);
    if entity_indices.is_empty() {
        return Ok(BakeReport::skipped(
            material_name,
            "no mesh entities use this material",
            Vec::new(),
        ));
    }

    let mut warnings = Vec::new();
    let usable: Vec<usize> = entity_indices
        .into_iter()
        .filter(|&i| {
            let entity = &scene.entities[i];
            if entity.has_uv() {
                true
            } else {
                let msg = format!("skipping '{}': no UV layer", entity.name);
                warn!(material = material_name, "{}", msg);
                warnings.push(msg);
                false
            }
        })
        .collect();
    if usable.is_empty() {
        return Ok(BakeReport::skipped(
            material_name,
            "no using entity has a UV layer",
            warnings,
        ));
    }

    let mut session = BakeSession::begin(scene);
    let result = run_bake(
        scene,
        host,
        saver,
        &mut session,
        material_name,
        suffix,
        &requirements,
        &usable,
        settings,
    );
    session.restore(scene);

    let (textures_baked, saved_files) = result?;
    Ok(BakeReport {
        material: material_name.to_string(),
        outcome: BakeOutcome::Completed,
        textures_baked,
        saved_files,
        warnings,
    })
}

#[allow(clippy::too_many_arguments)]
fn run_bake(
    scene: &mut Scene,
    host: &mut dyn BakeHost,
    saver: &dyn ImageSaver,
    session: &mut BakeSession,
    material_name: &str,
    suffix: TaxonomySuffix,
    requirements: &[TextureRequirement],
    usable: &[usize],
    settings: &BakeSettings,
) -> Result<(Vec<String>, Vec<PathBuf>)> {
    // transform-bypassed copy when the chain detector flags the graph
    let chain_report = scene
        .material(material_name)
        .and_then(|m| m.graph.as_ref())
        .map(uv_chain::detect_uv_transform_chain);
    let active_material = match chain_report {
        Some(report) if report.has_problematic_chain => {
            debug!(material = material_name, detail = %report.detail, "bypassing UV-transform chains");
            session.apply_graph_correction(scene, material_name, &report, usable)?
        }
        _ => material_name.to_string(),
    };

    // renderer + selection for the external bake
    scene.renderer.engine = BAKE_ENGINE.to_string();
    scene.renderer.samples = settings.samples;
    scene.renderer.denoise = false;
    scene.renderer.device = settings.device;
    scene.selection = Selection {
        selected: usable
            .iter()
            .map(|&i| scene.entities[i].name.clone())
            .collect(),
        active: usable.first().map(|&i| scene.entities[i].name.clone()),
    };

    let base = classify::base_name(material_name).to_string();
    let mut textures_baked = Vec::new();
    let mut saved_files = Vec::new();

    for requirement in requirements {
        let image_name = format!("{}{}", base, requirement.suffix);
        if settings.clear_existing {
            scene.images.remove(&image_name);
        }
        let float = settings.color_depth == ColorDepth::Float;
        scene.images.entry(image_name.clone()).or_insert_with(|| {
            BakedImage::new(&image_name, settings.width, settings.height, float)
        });

        scene.renderer.passes = configure_channel_passes(requirement.channel);

        // diffuse bake of an unlit/blend material would capture nothing;
        // swap the emission shader for the duration of this one call
        let substituted = if requirement.channel == BakeChannel::Diffuse
            && matches!(suffix, TaxonomySuffix::Unlit | TaxonomySuffix::Blend)
        {
            session.substitute_emission_shader(scene, &active_material)?
        } else {
            false
        };

        let bake_result = invoke_on_target(
            scene,
            host,
            &active_material,
            &image_name,
            requirement.channel,
            settings,
        );

        if substituted {
            session.revert_substitution(scene);
        }
        bake_result?;
        textures_baked.push(image_name.clone());

        if settings.save_to_disk {
            let filename = format!("{}.{}", image_name, settings.format.extension());
            let path = settings.output_dir.join(filename);
            let image = scene
                .images
                .get(&image_name)
                .ok_or_else(|| Error::Other(format!("image '{}' vanished", image_name)))?;
            saver.save_image(image, &path, settings.format, settings.color_depth)?;
            saved_files.push(path);
        }
    }

    Ok((textures_baked, saved_files))
}

fn invoke_on_target(
    scene: &mut Scene,
    host: &mut dyn BakeHost,
    material_name: &str,
    image_name: &str,
    channel: BakeChannel,
    settings: &BakeSettings,
) -> Result<()> {
    let passes = scene.renderer.passes;
    let material = scene
        .materials
        .iter()
        .find(|m| m.name == material_name)
        .ok_or_else(|| Error::MaterialNotFound(material_name.to_string()))?;
    let image = scene
        .images
        .get_mut(image_name)
        .ok_or_else(|| Error::Other(format!("image '{}' not registered", image_name)))?;
    let mut target = BakeTarget {
        image,
        material,
        passes,
    };
    host.invoke_bake(&mut target, channel, settings.margin, settings.use_cage)
}

/// Per-material failure inside a batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchFailure {
    pub material: String,
    pub error: String,
}

/// Aggregate result of a sequential batch bake
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchBakeSummary {
    pub total: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub failures: Vec<BatchFailure>,
    pub reports: Vec<BakeReport>,
}

/// Bake every material in the scene, strictly sequentially. One material's
/// failure never aborts the batch.
pub fn bake_all(
    scene: &mut Scene,
    host: &mut dyn BakeHost,
    saver: &dyn ImageSaver,
    settings: &BakeSettings,
) -> BatchBakeSummary {
    let names: Vec<String> = scene.materials.iter().map(|m| m.name.clone()).collect();
    let mut summary = BatchBakeSummary {
        total: names.len(),
        ..Default::default()
    };

    for name in names {
        match bake_material(scene, host, saver, &name, settings) {
            Ok(report) => {
                match report.outcome {
                    BakeOutcome::Skipped { .. } => summary.skipped += 1,
                    _ => summary.succeeded += 1,
                }
                summary.reports.push(report);
            }
            Err(e) => {
                warn!(material = %name, error = %e, "bake failed, continuing batch");
                summary.failed += 1;
                summary.failures.push(BatchFailure {
                    material: name,
                    error: e.to_string(),
                });
            }
        }
    }

    summary
}

/// Built-in host that flat-fills the bound image from the material's
/// literal colors. Lets the CLI produce real files without an external
/// renderer; not a substitute for a path-traced bake.
pub struct PreviewBakeHost;

impl BakeHost for PreviewBakeHost {
    fn invoke_bake(
        &mut self,
        target: &mut BakeTarget<'_>,
        channel: BakeChannel,
        _margin: u32,
        _use_cage: bool,
    ) -> Result<()> {
        let color = preview_color(target.material, channel);
        target.image.fill(color);
        Ok(())
    }
}

fn preview_color(material: &Material, channel: BakeChannel) -> [u8; 4] {
    let graph = material.graph.as_ref();
    let pbr = graph.and_then(|g| g.find(|k| matches!(k, NodeKind::Pbr)));
    let emission = graph.and_then(|g| g.find(|k| matches!(k, NodeKind::Emission)));

    let literal_color = |handle, socket: &str| -> Option<[f32; 4]> {
        graph?.input_literal(handle, socket)?.as_color()
    };

    let rgba = match channel {
        BakeChannel::Diffuse | BakeChannel::Combined => pbr
            .and_then(|h| literal_color(h, sockets::BASE_COLOR))
            .or_else(|| emission.and_then(|h| literal_color(h, sockets::COLOR)))
            .unwrap_or([0.5, 0.5, 0.5, 1.0]),
        BakeChannel::Emit => emission
            .and_then(|h| literal_color(h, sockets::COLOR))
            .or_else(|| pbr.and_then(|h| literal_color(h, sockets::EMISSION_COLOR)))
            .unwrap_or([0.0, 0.0, 0.0, 1.0]),
        BakeChannel::Normal => [0.5, 0.5, 1.0, 1.0],
        BakeChannel::Roughness => {
            let r = pbr
                .and_then(|h| graph.and_then(|g| g.input_scalar(h, sockets::ROUGHNESS)))
                .unwrap_or(0.5);
            [r, r, r, 1.0]
        }
    };

    let to_u8 = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    [to_u8(rgba[0]), to_u8(rgba[1]), to_u8(rgba[2]), to_u8(rgba[3])]
}

/// Default path for saving baked textures of one scene
pub fn default_output_dir(scene_path: &Path) -> PathBuf {
    scene_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join("bakes")
}
