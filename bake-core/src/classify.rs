//! Material classification against the target platform's naming/texture
//! taxonomy.
//!
//! Produces naming issues, a canonical recommended name, and a recommended
//! taxonomy suffix from a material's name, graph shape, and blend mode; and
//! derives the ordered list of output textures each suffix requires. All
//! functions here are total: they never error, they only evaluate literal
//! socket defaults, and they never execute the graph.

use crate::graph::{sockets, NodeKind, ShadingGraph};
use crate::scene::BlendMode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Characters that must never appear in a material name
pub const NAME_BLACKLIST: &[char] = &['-', '.', ',', '/', '*', '$', '&'];

/// A problem found in a material's name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamingIssue {
    /// Blacklisted characters present, in order of first appearance
    InvalidCharacters(String),
    SpacePresent,
    /// The base name (suffix stripped) still contains `_` or space
    StrayUnderscore,
}

impl fmt::Display for NamingIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NamingIssue::InvalidCharacters(chars) => {
                write!(f, "invalid characters: {}", chars)
            }
            NamingIssue::SpacePresent => write!(f, "contains spaces"),
            NamingIssue::StrayUnderscore => {
                write!(f, "underscore or space in base name")
            }
        }
    }
}

/// The closed naming-convention taxonomy. Exactly one suffix is recommended
/// per material per classification run; it is derived, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxonomySuffix {
    /// No suffix ("Base PBR")
    BasePbr,
    Metal,
    Unlit,
    Blend,
    Transparent,
    Masked,
    Vxc,
    Vxm,
    Uio,
}

impl TaxonomySuffix {
    /// The eight non-empty suffixes, in match order. Mutually exclusive by
    /// construction, so first match wins.
    pub const MATCH_ORDER: [TaxonomySuffix; 8] = [
        TaxonomySuffix::Metal,
        TaxonomySuffix::Unlit,
        TaxonomySuffix::Blend,
        TaxonomySuffix::Transparent,
        TaxonomySuffix::Masked,
        TaxonomySuffix::Vxc,
        TaxonomySuffix::Vxm,
        TaxonomySuffix::Uio,
    ];

    /// Suffix token as appended to a material name
    pub fn as_str(self) -> &'static str {
        match self {
            TaxonomySuffix::BasePbr => "",
            TaxonomySuffix::Metal => "_Metal",
            TaxonomySuffix::Unlit => "_Unlit",
            TaxonomySuffix::Blend => "_Blend",
            TaxonomySuffix::Transparent => "_Transparent",
            TaxonomySuffix::Masked => "_Masked",
            TaxonomySuffix::Vxc => "_VXC",
            TaxonomySuffix::Vxm => "_VXM",
            TaxonomySuffix::Uio => "_UIO",
        }
    }

    /// Human-readable label
    pub fn label(self) -> &'static str {
        match self {
            TaxonomySuffix::BasePbr => "Base PBR",
            other => other.as_str(),
        }
    }

    /// The suffix a name already carries, if any
    pub fn detect(name: &str) -> Option<TaxonomySuffix> {
        Self::MATCH_ORDER
            .iter()
            .copied()
            .find(|s| name.ends_with(s.as_str()))
    }
}

impl fmt::Display for TaxonomySuffix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Bake-channel semantics of one required texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BakeChannel {
    Combined,
    Diffuse,
    Normal,
    Roughness,
    Emit,
}

/// One entry of a suffix's required-texture list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextureRequirement {
    /// Appended to the material base name to form the image name
    pub suffix: String,
    pub channel: BakeChannel,
    pub description: String,
}

impl TextureRequirement {
    fn new(suffix: &str, channel: BakeChannel, description: &str) -> Self {
        Self {
            suffix: suffix.to_string(),
            channel,
            description: description.to_string(),
        }
    }
}

/// Result of one classification run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub issues: Vec<NamingIssue>,
    pub recommended_name: String,
    pub recommended_suffix: TaxonomySuffix,
}

impl Classification {
    pub fn has_naming_issues(&self) -> bool {
        !self.issues.is_empty()
    }

    /// Issues joined into one message
    pub fn issues_text(&self) -> String {
        self.issues
            .iter()
            .map(NamingIssue::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Classify a material: naming issues, canonical recommended name, and
/// recommended taxonomy suffix.
pub fn classify(name: &str, graph: Option<&ShadingGraph>, blend: BlendMode) -> Classification {
    let recommended_suffix = recommend_suffix(graph, blend);
    Classification {
        issues: naming_issues(name),
        recommended_name: repair_name(name, recommended_suffix),
        recommended_suffix,
    }
}

/// Scan a name for naming-convention problems
pub fn naming_issues(name: &str) -> Vec<NamingIssue> {
    let mut issues = Vec::new();

    let mut bad = String::new();
    for c in name.chars() {
        if NAME_BLACKLIST.contains(&c) && !bad.contains(c) {
            bad.push(c);
        }
    }
    if !bad.is_empty() {
        issues.push(NamingIssue::InvalidCharacters(bad));
    }

    if name.contains(' ') {
        issues.push(NamingIssue::SpacePresent);
    }

    let (base, _) = split_suffix(name);
    if base.contains('_') || base.contains(' ') {
        issues.push(NamingIssue::StrayUnderscore);
    }

    issues
}

/// Repair a name to the canonical convention: strip blacklisted characters,
/// lower-camel-case the base, append the recommended suffix. Idempotent:
/// repairing an already-repaired name returns it unchanged.
pub fn repair_name(name: &str, recommended: TaxonomySuffix) -> String {
    let cleaned: String = name.chars().filter(|c| !NAME_BLACKLIST.contains(c)).collect();
    let (base, _existing) = split_suffix(&cleaned);
    format!("{}{}", lower_camel_case(base), recommended.as_str())
}

/// Base substring of a name with any taxonomy suffix stripped
pub fn base_name(name: &str) -> &str {
    split_suffix(name).0
}

fn split_suffix(name: &str) -> (&str, Option<TaxonomySuffix>) {
    match TaxonomySuffix::detect(name) {
        Some(s) => (&name[..name.len() - s.as_str().len()], Some(s)),
        None => (name, None),
    }
}

fn lower_camel_case(base: &str) -> String {
    let joined: String = base
        .split(['_', ' '])
        .filter(|t| !t.is_empty())
        .map(capitalize)
        .collect();
    let mut chars = joined.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn capitalize(token: &str) -> String {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Recommend a taxonomy suffix. Fixed precedence, first matching rule wins.
pub fn recommend_suffix(graph: Option<&ShadingGraph>, blend: BlendMode) -> TaxonomySuffix {
    let Some(g) = graph else {
        // legacy material with no graph at all
        return TaxonomySuffix::Unlit;
    };

    let has_pbr = g.any(|k| matches!(k, NodeKind::Pbr));
    let has_emission = g.any(|k| matches!(k, NodeKind::Emission));
    let has_transparent = g.any(|k| matches!(k, NodeKind::Transparent));
    let pbr = g.find(|k| matches!(k, NodeKind::Pbr));

    // 1. vertex-color attribute
    if g.any(|k| matches!(k, NodeKind::Attribute { is_color: true, .. })) {
        return if has_pbr {
            TaxonomySuffix::Vxm
        } else {
            TaxonomySuffix::Vxc
        };
    }

    // 2. alpha clip
    if blend == BlendMode::AlphaClip {
        return TaxonomySuffix::Masked;
    }

    // 3. transparency: blend mode, transparent shader, or PBR alpha
    let pbr_alpha_transparent = pbr
        .map(|h| {
            g.is_connected(h, sockets::ALPHA)
                || g.input_scalar(h, sockets::ALPHA).map_or(false, |v| v < 1.0)
        })
        .unwrap_or(false);
    let transparency =
        blend == BlendMode::AlphaBlend || has_transparent || pbr_alpha_transparent;
    if transparency {
        return TaxonomySuffix::Transparent;
    }

    // 4. emission with no PBR
    if has_emission && !has_pbr {
        return TaxonomySuffix::Unlit;
    }

    // 5. emission does not override transparency
    if has_emission && transparency {
        return TaxonomySuffix::Transparent;
    }

    // 6. pure emission by type tag
    if has_emission && !has_pbr && !has_transparent {
        return TaxonomySuffix::Unlit;
    }

    // 7. metallic literal > 0. A connected metallic input is not treated as
    // metallic: its resolved value is unknown without evaluating the graph.
    if let Some(h) = pbr {
        if !g.is_connected(h, sockets::METALLIC)
            && g.input_scalar(h, sockets::METALLIC).map_or(false, |v| v > 0.0)
        {
            return TaxonomySuffix::Metal;
        }
    }

    // 8. plain PBR
    if has_pbr {
        return TaxonomySuffix::BasePbr;
    }

    // 9. graph present but no recognized shader category
    TaxonomySuffix::BasePbr
}

/// True when the graph warrants the second (Metalness+Emission+AO) texture
pub fn needs_second_texture(graph: &ShadingGraph) -> bool {
    if graph.any(|k| matches!(k, NodeKind::AmbientOcclusion))
        || graph.any(|k| matches!(k, NodeKind::Emission))
    {
        return true;
    }
    let Some(pbr) = graph.find(|k| matches!(k, NodeKind::Pbr)) else {
        return false;
    };
    let metallic = graph.is_connected(pbr, sockets::METALLIC)
        || graph
            .input_scalar(pbr, sockets::METALLIC)
            .map_or(false, |v| v > 0.0);
    let emission_strength = graph.is_connected(pbr, sockets::EMISSION_STRENGTH)
        || graph
            .input_scalar(pbr, sockets::EMISSION_STRENGTH)
            .map_or(false, |v| v > 0.0);
    let emission_color = graph.is_connected(pbr, sockets::EMISSION_COLOR);
    metallic || emission_strength || emission_color
}

/// Ordered list of output textures a suffix requires. `_VXC` requires none:
/// it is vertex-color only and short-circuits the bake orchestrator.
pub fn derive_texture_requirements(
    suffix: TaxonomySuffix,
    graph: Option<&ShadingGraph>,
) -> Vec<TextureRequirement> {
    match suffix {
        TaxonomySuffix::Vxc => Vec::new(),
        TaxonomySuffix::BasePbr | TaxonomySuffix::Vxm => {
            let mut out = vec![TextureRequirement::new(
                "",
                BakeChannel::Diffuse,
                "BaseColor + Roughness",
            )];
            if graph.map_or(false, needs_second_texture) {
                out.push(TextureRequirement::new(
                    "_me",
                    BakeChannel::Emit,
                    "Metalness + Emission + AmbientOcclusion",
                ));
            }
            out
        }
        TaxonomySuffix::Metal => vec![TextureRequirement::new(
            "",
            BakeChannel::Diffuse,
            "BaseColor + Roughness",
        )],
        TaxonomySuffix::Unlit | TaxonomySuffix::Uio => vec![TextureRequirement::new(
            "",
            BakeChannel::Diffuse,
            "BaseColor",
        )],
        TaxonomySuffix::Blend | TaxonomySuffix::Transparent | TaxonomySuffix::Masked => {
            vec![TextureRequirement::new(
                "",
                BakeChannel::Diffuse,
                "BaseColor + Alpha",
            )]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Node, NodeKind, ShadingGraph, SocketValue};

    fn pbr_graph() -> (ShadingGraph, crate::graph::NodeHandle) {
        let mut g = ShadingGraph::new();
        let h = g.add_node(Node::pbr());
        (g, h)
    }

    #[test]
    fn repair_name_is_idempotent() {
        let cases = [
            "Rusty-Metal Plate.01",
            "wood_floor",
            "already_Metal",
            "UPPER CASE NAME",
            "trailing_",
            "a.b,c/d*e$f&g",
            "",
        ];
        for case in cases {
            for suffix in [
                TaxonomySuffix::BasePbr,
                TaxonomySuffix::Metal,
                TaxonomySuffix::Vxc,
            ] {
                let once = repair_name(case, suffix);
                let twice = repair_name(&once, suffix);
                assert_eq!(once, twice, "not idempotent for {:?} + {:?}", case, suffix);
            }
        }
    }

    #[test]
    fn rusty_metal_plate_example() {
        let (mut g, pbr) = pbr_graph();
        g.node_mut(pbr)
            .unwrap()
            .input_mut(crate::graph::sockets::METALLIC)
            .unwrap()
            .default = SocketValue::Scalar(0.8);

        let c = classify("Rusty-Metal Plate.01", Some(&g), BlendMode::Opaque);
        assert_eq!(c.recommended_suffix, TaxonomySuffix::Metal);
        assert_eq!(c.recommended_name, "rustyMetalPlate01_Metal");
        assert!(c
            .issues
            .iter()
            .any(|i| matches!(i, NamingIssue::InvalidCharacters(s) if s.contains('-') && s.contains('.'))));
        assert!(c.issues.contains(&NamingIssue::SpacePresent));
        assert!(c.issues.contains(&NamingIssue::StrayUnderscore));
    }

    #[test]
    fn repaired_name_has_no_issues() {
        let c = classify("Rusty-Metal Plate.01", None, BlendMode::Opaque);
        assert!(naming_issues(&c.recommended_name).is_empty());
    }

    #[test]
    fn vertex_color_rules() {
        let mut g = ShadingGraph::new();
        g.add_node(Node::attribute("Col", true));
        assert_eq!(
            recommend_suffix(Some(&g), BlendMode::Opaque),
            TaxonomySuffix::Vxc
        );

        g.add_node(Node::pbr());
        assert_eq!(
            recommend_suffix(Some(&g), BlendMode::Opaque),
            TaxonomySuffix::Vxm
        );

        // non-color attribute does not trigger the rule
        let mut g2 = ShadingGraph::new();
        g2.add_node(Node::attribute("weight", false));
        g2.add_node(Node::pbr());
        assert_eq!(
            recommend_suffix(Some(&g2), BlendMode::Opaque),
            TaxonomySuffix::BasePbr
        );
    }

    #[test]
    fn vertex_color_wins_over_blend_mode() {
        let mut g = ShadingGraph::new();
        g.add_node(Node::attribute("Col", true));
        assert_eq!(
            recommend_suffix(Some(&g), BlendMode::AlphaClip),
            TaxonomySuffix::Vxc
        );
    }

    #[test]
    fn alpha_clip_is_masked() {
        let (g, _) = pbr_graph();
        assert_eq!(
            recommend_suffix(Some(&g), BlendMode::AlphaClip),
            TaxonomySuffix::Masked
        );
    }

    #[test]
    fn transparency_signals() {
        let (g, _) = pbr_graph();
        assert_eq!(
            recommend_suffix(Some(&g), BlendMode::AlphaBlend),
            TaxonomySuffix::Transparent
        );

        let mut g2 = ShadingGraph::new();
        g2.add_node(Node::transparent());
        assert_eq!(
            recommend_suffix(Some(&g2), BlendMode::Opaque),
            TaxonomySuffix::Transparent
        );

        // literal alpha below 1.0
        let (mut g3, pbr) = pbr_graph();
        g3.node_mut(pbr)
            .unwrap()
            .input_mut(crate::graph::sockets::ALPHA)
            .unwrap()
            .default = SocketValue::Scalar(0.5);
        assert_eq!(
            recommend_suffix(Some(&g3), BlendMode::Opaque),
            TaxonomySuffix::Transparent
        );

        // connected alpha
        let (mut g4, pbr) = pbr_graph();
        let tex = g4.add_node(Node::image_texture(Some("mask")));
        g4.add_link(tex, crate::graph::sockets::COLOR, pbr, crate::graph::sockets::ALPHA)
            .unwrap();
        assert_eq!(
            recommend_suffix(Some(&g4), BlendMode::Opaque),
            TaxonomySuffix::Transparent
        );
    }

    #[test]
    fn emission_only_is_unlit() {
        let mut g = ShadingGraph::new();
        g.add_node(Node::emission([1.0, 0.5, 0.0, 1.0], 2.0));
        assert_eq!(
            recommend_suffix(Some(&g), BlendMode::Opaque),
            TaxonomySuffix::Unlit
        );
    }

    #[test]
    fn emission_does_not_override_transparency() {
        let mut g = ShadingGraph::new();
        g.add_node(Node::emission([1.0, 1.0, 1.0, 1.0], 1.0));
        g.add_node(Node::transparent());
        assert_eq!(
            recommend_suffix(Some(&g), BlendMode::Opaque),
            TaxonomySuffix::Transparent
        );
    }

    #[test]
    fn metallic_literal_above_zero_is_metal() {
        let (mut g, pbr) = pbr_graph();
        g.node_mut(pbr)
            .unwrap()
            .input_mut(crate::graph::sockets::METALLIC)
            .unwrap()
            .default = SocketValue::Scalar(0.01);
        assert_eq!(
            recommend_suffix(Some(&g), BlendMode::Opaque),
            TaxonomySuffix::Metal
        );
    }

    #[test]
    fn connected_metallic_is_never_metal() {
        let (mut g, pbr) = pbr_graph();
        let tex = g.add_node(Node::image_texture(Some("metal_mask")));
        g.add_link(
            tex,
            crate::graph::sockets::COLOR,
            pbr,
            crate::graph::sockets::METALLIC,
        )
        .unwrap();
        assert_eq!(
            recommend_suffix(Some(&g), BlendMode::Opaque),
            TaxonomySuffix::BasePbr
        );
    }

    #[test]
    fn plain_pbr_has_no_suffix() {
        let (g, _) = pbr_graph();
        assert_eq!(
            recommend_suffix(Some(&g), BlendMode::Opaque),
            TaxonomySuffix::BasePbr
        );
    }

    #[test]
    fn fallbacks() {
        // no graph at all
        assert_eq!(
            recommend_suffix(None, BlendMode::Opaque),
            TaxonomySuffix::Unlit
        );
        // graph with no recognized shader
        let mut g = ShadingGraph::new();
        g.add_node(Node::tex_coord());
        assert_eq!(
            recommend_suffix(Some(&g), BlendMode::Opaque),
            TaxonomySuffix::BasePbr
        );
    }

    #[test]
    fn vxc_requires_no_textures() {
        let mut g = ShadingGraph::new();
        g.add_node(Node::attribute("Col", true));
        assert!(derive_texture_requirements(TaxonomySuffix::Vxc, Some(&g)).is_empty());
    }

    #[test]
    fn unlit_requires_exactly_one_basecolor_texture() {
        let mut g = ShadingGraph::new();
        g.add_node(Node::emission([1.0, 1.0, 1.0, 1.0], 1.0));
        let reqs = derive_texture_requirements(TaxonomySuffix::Unlit, Some(&g));
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].channel, BakeChannel::Diffuse);
        assert_eq!(reqs[0].description, "BaseColor");
    }

    #[test]
    fn base_pbr_second_texture_gate() {
        let (g, _) = pbr_graph();
        let reqs = derive_texture_requirements(TaxonomySuffix::BasePbr, Some(&g));
        assert_eq!(reqs.len(), 1);

        // literal metallic opens the gate
        let (mut g2, pbr) = pbr_graph();
        g2.node_mut(pbr)
            .unwrap()
            .input_mut(crate::graph::sockets::METALLIC)
            .unwrap()
            .default = SocketValue::Scalar(0.3);
        let reqs = derive_texture_requirements(TaxonomySuffix::BasePbr, Some(&g2));
        assert_eq!(reqs.len(), 2);
        assert_eq!(reqs[1].suffix, "_me");
        assert_eq!(reqs[1].channel, BakeChannel::Emit);

        // connected metallic also opens it (unlike the metal naming rule)
        let (mut g3, pbr) = pbr_graph();
        let tex = g3.add_node(Node::image_texture(None));
        g3.add_link(
            tex,
            crate::graph::sockets::COLOR,
            pbr,
            crate::graph::sockets::METALLIC,
        )
        .unwrap();
        assert_eq!(
            derive_texture_requirements(TaxonomySuffix::BasePbr, Some(&g3)).len(),
            2
        );

        // AO node opens it too
        let (mut g4, _) = pbr_graph();
        g4.add_node(Node::ambient_occlusion());
        assert_eq!(
            derive_texture_requirements(TaxonomySuffix::BasePbr, Some(&g4)).len(),
            2
        );
    }

    #[test]
    fn suffix_detection_and_base_name() {
        assert_eq!(TaxonomySuffix::detect("wall_Metal"), Some(TaxonomySuffix::Metal));
        assert_eq!(TaxonomySuffix::detect("wall"), None);
        assert_eq!(base_name("wall_Metal"), "wall");
        assert_eq!(base_name("glow_VXC"), "glow");
        assert_eq!(base_name("plain"), "plain");
    }

    #[test]
    fn existing_wrong_suffix_is_replaced() {
        let mut g = ShadingGraph::new();
        g.add_node(Node::emission([1.0, 1.0, 1.0, 1.0], 1.0));
        let c = classify("sign_Metal", Some(&g), BlendMode::Opaque);
        assert_eq!(c.recommended_suffix, TaxonomySuffix::Unlit);
        assert_eq!(c.recommended_name, "sign_Unlit");
    }

    #[test]
    fn base_pbr_strips_existing_suffix() {
        let (g, _) = pbr_graph();
        let c = classify("wall_Unlit", Some(&g), BlendMode::Opaque);
        assert_eq!(c.recommended_suffix, TaxonomySuffix::BasePbr);
        assert_eq!(c.recommended_name, "wall");
    }
}
