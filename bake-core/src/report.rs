//! Report generation from classification and detector results.
//!
//! Produces structured per-material and per-scene reports suitable for CLI
//! output or JSON export. Reports are advisory: nothing here mutates the
//! scene.

use crate::classify::{self, Classification, TextureRequirement};
use crate::scene::Scene;
use crate::uv_chain::{self, UvChainReport};
use crate::uv_conflict::{self, UvConflictReport};
use serde::{Deserialize, Serialize};

/// Complete analysis report for one material
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialReport {
    pub name: String,
    pub recommended_name: String,
    pub suffix: String,
    pub naming_issues: Vec<String>,
    pub texture_requirements: Vec<TextureRequirement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uv_conflict: Option<UvConflictReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uv_chain: Option<UvChainReport>,
    /// No naming issues and no flagged hazards
    pub clean: bool,
}

/// Builder for constructing material reports
pub struct ReportBuilder {
    name: String,
    classification: Option<Classification>,
    texture_requirements: Vec<TextureRequirement>,
    uv_conflict: Option<UvConflictReport>,
    uv_chain: Option<UvChainReport>,
}

impl ReportBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            classification: None,
            texture_requirements: Vec::new(),
            uv_conflict: None,
            uv_chain: None,
        }
    }

    pub fn with_classification(mut self, classification: Classification) -> Self {
        self.classification = Some(classification);
        self
    }

    pub fn with_texture_requirements(mut self, requirements: Vec<TextureRequirement>) -> Self {
        self.texture_requirements = requirements;
        self
    }

    pub fn with_uv_conflict(mut self, report: UvConflictReport) -> Self {
        self.uv_conflict = Some(report);
        self
    }

    pub fn with_uv_chain(mut self, report: UvChainReport) -> Self {
        self.uv_chain = Some(report);
        self
    }

    pub fn build(self) -> MaterialReport {
        let (naming_issues, recommended_name, suffix) = match self.classification {
            Some(c) => (
                c.issues.iter().map(ToString::to_string).collect(),
                c.recommended_name,
                c.recommended_suffix.label().to_string(),
            ),
            None => (Vec::new(), self.name.clone(), String::new()),
        };
        let conflicted = self
            .uv_conflict
            .as_ref()
            .map(|r| r.has_conflict)
            .unwrap_or(false);
        let chained = self
            .uv_chain
            .as_ref()
            .map(|r| r.has_problematic_chain)
            .unwrap_or(false);
        let clean = naming_issues.is_empty() && !conflicted && !chained;

        MaterialReport {
            name: self.name,
            recommended_name,
            suffix,
            naming_issues,
            texture_requirements: self.texture_requirements,
            uv_conflict: self.uv_conflict,
            uv_chain: self.uv_chain,
            clean,
        }
    }
}

impl MaterialReport {
    /// Run every analysis against one named material in a scene
    pub fn from_scene(scene: &Scene, name: &str) -> Option<MaterialReport> {
        let material = scene.material(name)?;
        let classification =
            classify::classify(&material.name, material.graph.as_ref(), material.blend_mode);
        let requirements = classify::derive_texture_requirements(
            classification.recommended_suffix,
            material.graph.as_ref(),
        );

        let entities: Vec<_> = scene
            .entities_using(name)
            .into_iter()
            .map(|i| &scene.entities[i])
            .collect();
        let conflict = uv_conflict::detect_uv_conflict(&entities);

        let mut builder = ReportBuilder::new(name)
            .with_classification(classification)
            .with_texture_requirements(requirements)
            .with_uv_conflict(conflict);
        if let Some(graph) = material.graph.as_ref() {
            builder = builder.with_uv_chain(uv_chain::detect_uv_transform_chain(graph));
        }
        Some(builder.build())
    }

    /// Format as human-readable text
    pub fn to_text(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Material: {}", self.name));
        lines.push(format!("  Suffix: {}", self.suffix));
        if self.recommended_name != self.name {
            lines.push(format!("  Recommended name: {}", self.recommended_name));
        }

        if self.naming_issues.is_empty() {
            lines.push("  Naming: ok".to_string());
        } else {
            lines.push("  Naming issues:".to_string());
            for issue in &self.naming_issues {
                lines.push(format!("    - {}", issue));
            }
        }

        if self.texture_requirements.is_empty() {
            lines.push("  Textures: none required".to_string());
        } else {
            lines.push("  Textures:".to_string());
            for req in &self.texture_requirements {
                let suffix = if req.suffix.is_empty() {
                    "(base)"
                } else {
                    req.suffix.as_str()
                };
                lines.push(format!("    {} -> {}", suffix, req.description));
            }
        }

        if let Some(conflict) = &self.uv_conflict {
            if conflict.has_conflict {
                lines.push(format!("  UV sharing: {}", conflict.detail));
            }
        }
        if let Some(chain) = &self.uv_chain {
            if chain.has_problematic_chain {
                lines.push(format!("  UV transforms: {}", chain.detail));
            }
        }

        lines.join("\n")
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Aggregate report over every material in a scene
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneReport {
    pub materials: Vec<MaterialReport>,
    pub material_count: usize,
    pub clean_count: usize,
    pub naming_issue_count: usize,
    pub uv_conflict_count: usize,
    pub uv_chain_count: usize,
}

impl SceneReport {
    pub fn passed(&self) -> bool {
        self.clean_count == self.material_count
    }

    pub fn to_text(&self) -> String {
        let mut lines = Vec::new();
        for report in &self.materials {
            lines.push(report.to_text());
            lines.push(String::new());
        }
        lines.push(format!(
            "Result: {} ({} materials, {} clean, {} naming issues, {} UV conflicts, {} transform chains)",
            if self.passed() { "CLEAN" } else { "ISSUES FOUND" },
            self.material_count,
            self.clean_count,
            self.naming_issue_count,
            self.uv_conflict_count,
            self.uv_chain_count
        ));
        lines.join("\n")
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Analyze every material in the scene
pub fn scene_report(scene: &Scene) -> SceneReport {
    let materials: Vec<MaterialReport> = scene
        .materials
        .iter()
        .filter_map(|m| MaterialReport::from_scene(scene, &m.name))
        .collect();

    let material_count = materials.len();
    let clean_count = materials.iter().filter(|r| r.clean).count();
    let naming_issue_count = materials.iter().map(|r| r.naming_issues.len()).sum();
    let uv_conflict_count = materials
        .iter()
        .filter(|r| r.uv_conflict.as_ref().map_or(false, |c| c.has_conflict))
        .count();
    let uv_chain_count = materials
        .iter()
        .filter(|r| {
            r.uv_chain
                .as_ref()
                .map_or(false, |c| c.has_problematic_chain)
        })
        .count();

    SceneReport {
        materials,
        material_count,
        clean_count,
        naming_issue_count,
        uv_conflict_count,
        uv_chain_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Node, ShadingGraph};
    use crate::scene::{Material, MeshData, MeshEntity, UvLayer};

    fn quad_mesh() -> MeshData {
        MeshData {
            vertex_count: 4,
            face_count: 1,
            uv_layers: vec![UvLayer {
                name: "UVMap".to_string(),
                coords: vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
            }],
            active_uv: Some(0),
        }
    }

    fn pbr_scene(material_name: &str) -> Scene {
        let mut g = ShadingGraph::new();
        g.add_node(Node::pbr());
        let mut scene = Scene::new();
        scene.add_material(Material::new(material_name, g));
        scene.entities.push(MeshEntity::new(
            "cube",
            quad_mesh(),
            vec![material_name.to_string()],
        ));
        scene
    }

    #[test]
    fn clean_material_reports_clean() {
        let scene = pbr_scene("wall");
        let report = MaterialReport::from_scene(&scene, "wall").unwrap();
        assert!(report.clean);
        assert_eq!(report.recommended_name, "wall");
        assert_eq!(report.texture_requirements.len(), 1);
    }

    #[test]
    fn naming_issue_breaks_clean() {
        let scene = pbr_scene("bad name");
        let report = MaterialReport::from_scene(&scene, "bad name").unwrap();
        assert!(!report.clean);
        assert_eq!(report.recommended_name, "badName");
        assert!(report.to_text().contains("Recommended name: badName"));
    }

    #[test]
    fn shared_material_reports_conflict() {
        let mut scene = pbr_scene("wall");
        scene
            .entities
            .push(MeshEntity::new("plane", quad_mesh(), vec!["wall".to_string()]));

        let report = MaterialReport::from_scene(&scene, "wall").unwrap();
        assert!(!report.clean);
        assert!(report.uv_conflict.unwrap().has_conflict);
    }

    #[test]
    fn scene_report_aggregates_counts() {
        let mut scene = pbr_scene("wall");
        let mut g = ShadingGraph::new();
        g.add_node(Node::pbr());
        scene.add_material(Material::new("bad name", g));

        let report = scene_report(&scene);
        assert_eq!(report.material_count, 2);
        assert_eq!(report.clean_count, 1);
        assert_eq!(report.naming_issue_count, 1);
        assert!(!report.passed());
        assert!(report.to_text().contains("ISSUES FOUND"));
    }

    #[test]
    fn report_serializes_to_json() {
        let scene = pbr_scene("wall");
        let report = MaterialReport::from_scene(&scene, "wall").unwrap();
        let json = report.to_json().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["name"], "wall");
        assert!(parsed.get("texture_requirements").is_some());
    }

    #[test]
    fn unknown_material_yields_none() {
        let scene = Scene::new();
        assert!(MaterialReport::from_scene(&scene, "ghost").is_none());
    }
}
