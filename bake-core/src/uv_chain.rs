//! UV-transform chain detection.
//!
//! Walks backward from each image-texture node's coordinate input through
//! chains of coordinate-transform nodes to the coordinate source. A chain
//! that reaches the source through at least one transform node is flagged:
//! the transform's presence risks baking drift even when its parameters are
//! currently the identity.

use crate::graph::{sockets, NodeHandle, NodeKind, ShadingGraph, SocketType};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One flagged texture-to-source chain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UvChain {
    /// The image-texture node whose coordinate input the chain feeds
    pub texture: NodeHandle,
    /// Transform nodes in traversal order (texture side first)
    pub transforms: Vec<NodeHandle>,
    /// The terminating coordinate-source node
    pub source: NodeHandle,
    /// Ordered description: texture <- transforms <- source
    pub description: String,
}

/// Result of one chain scan over a graph
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UvChainReport {
    pub has_problematic_chain: bool,
    pub detail: String,
    pub chains: Vec<UvChain>,
}

/// Scan every image-texture node with a connected coordinate input
pub fn detect_uv_transform_chain(graph: &ShadingGraph) -> UvChainReport {
    let mut chains = Vec::new();
    for (handle, node) in graph.nodes() {
        if !matches!(node.kind, NodeKind::ImageTexture { .. }) {
            continue;
        }
        if let Some(chain) = walk_chain(graph, handle) {
            chains.push(chain);
        }
    }

    let detail = chains
        .iter()
        .map(|c| c.description.as_str())
        .collect::<Vec<_>>()
        .join("; ");

    UvChainReport {
        has_problematic_chain: !chains.is_empty(),
        detail,
        chains,
    }
}

/// Backward walk from one texture node's coordinate input. Returns a chain
/// only when the walk reaches a coordinate source with at least one
/// transform node recorded; inconclusive walks are not flagged.
fn walk_chain(graph: &ShadingGraph, texture: NodeHandle) -> Option<UvChain> {
    let mut current = graph.incoming(texture, sockets::VECTOR)?.from;
    let mut transforms = Vec::new();
    let mut segments = Vec::new();
    let mut visited = HashSet::new();

    loop {
        if !visited.insert(current) {
            // cycle: inconclusive
            return None;
        }
        let node = graph.node(current)?;
        match &node.kind {
            NodeKind::Reroute => {
                // pass through without recording
                current = graph.incoming(current, sockets::INPUT)?.from;
            }
            NodeKind::TexCoord => {
                if transforms.is_empty() {
                    // direct source binding, nothing to flag
                    return None;
                }
                let texture_label = graph
                    .node(texture)
                    .map(|n| n.kind.label())
                    .unwrap_or("Image Texture");
                let description = format!(
                    "{} <- {} <- {}",
                    texture_label,
                    segments.join(" <- "),
                    node.kind.label()
                );
                return Some(UvChain {
                    texture,
                    transforms,
                    source: current,
                    description,
                });
            }
            kind if kind.is_uv_transform() => {
                transforms.push(current);
                segments.push(describe_transform(kind));
                // continue through the node's first connected vector input
                let next = node
                    .inputs
                    .iter()
                    .filter(|s| s.ty == SocketType::Vector)
                    .find_map(|s| graph.incoming(current, &s.name));
                match next {
                    Some(link) => current = link.from,
                    // chain terminates inconclusively
                    None => return None,
                }
            }
            // any other category ends the walk without flagging
            _ => return None,
        }
    }
}

/// An affine mapping only "transforms UVs" when its parameters differ from
/// the identity; it is still recorded either way.
fn describe_transform(kind: &NodeKind) -> String {
    match kind {
        NodeKind::Mapping {
            location,
            rotation,
            scale,
        } => {
            let identity =
                *location == [0.0; 3] && *rotation == [0.0; 3] && *scale == [1.0, 1.0, 1.0];
            if identity {
                "Mapping (no-op)".to_string()
            } else {
                "Mapping (transforms UVs)".to_string()
            }
        }
        other => other.label().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Node, ShadingGraph};

    #[test]
    fn direct_source_binding_is_not_flagged() {
        let mut g = ShadingGraph::new();
        let src = g.add_node(Node::tex_coord());
        let tex = g.add_node(Node::image_texture(Some("wood")));
        g.add_link(src, sockets::UV, tex, sockets::VECTOR).unwrap();

        let report = detect_uv_transform_chain(&g);
        assert!(!report.has_problematic_chain);
        assert!(report.chains.is_empty());
    }

    #[test]
    fn identity_mapping_still_flags_the_chain() {
        let mut g = ShadingGraph::new();
        let src = g.add_node(Node::tex_coord());
        let map = g.add_node(Node::identity_mapping());
        let tex = g.add_node(Node::image_texture(Some("wood")));
        g.add_link(src, sockets::UV, map, sockets::VECTOR).unwrap();
        g.add_link(map, sockets::VECTOR, tex, sockets::VECTOR).unwrap();

        let report = detect_uv_transform_chain(&g);
        assert!(report.has_problematic_chain);
        assert_eq!(report.chains.len(), 1);
        assert_eq!(report.chains[0].transforms, vec![map]);
        assert!(report.detail.contains("Mapping (no-op)"));
    }

    #[test]
    fn non_identity_mapping_described_as_transforming() {
        let mut g = ShadingGraph::new();
        let src = g.add_node(Node::tex_coord());
        let map = g.add_node(Node::mapping([0.1, 0.0, 0.0], [0.0; 3], [1.0, 1.0, 1.0]));
        let tex = g.add_node(Node::image_texture(None));
        g.add_link(src, sockets::UV, map, sockets::VECTOR).unwrap();
        g.add_link(map, sockets::VECTOR, tex, sockets::VECTOR).unwrap();

        let report = detect_uv_transform_chain(&g);
        assert!(report.detail.contains("Mapping (transforms UVs)"));
    }

    #[test]
    fn multi_transform_chain_recorded_in_traversal_order() {
        let mut g = ShadingGraph::new();
        let src = g.add_node(Node::tex_coord());
        let math = g.add_node(Node::vector_math());
        let map = g.add_node(Node::identity_mapping());
        let tex = g.add_node(Node::image_texture(None));
        g.add_link(src, sockets::UV, math, sockets::VECTOR).unwrap();
        g.add_link(math, sockets::VECTOR, map, sockets::VECTOR).unwrap();
        g.add_link(map, sockets::VECTOR, tex, sockets::VECTOR).unwrap();

        let report = detect_uv_transform_chain(&g);
        assert_eq!(report.chains[0].transforms, vec![map, math]);
        let detail = &report.detail;
        let map_pos = detail.find("Mapping").unwrap();
        let math_pos = detail.find("Vector Math").unwrap();
        assert!(map_pos < math_pos, "texture-side transform first: {}", detail);
    }

    #[test]
    fn reroutes_are_traversed_without_recording() {
        let mut g = ShadingGraph::new();
        let src = g.add_node(Node::tex_coord());
        let map = g.add_node(Node::identity_mapping());
        let reroute = g.add_node(Node::reroute());
        let tex = g.add_node(Node::image_texture(None));
        g.add_link(src, sockets::UV, map, sockets::VECTOR).unwrap();
        g.add_link(map, sockets::VECTOR, reroute, sockets::INPUT).unwrap();
        g.add_link(reroute, sockets::INPUT, tex, sockets::VECTOR).unwrap();

        let report = detect_uv_transform_chain(&g);
        assert!(report.has_problematic_chain);
        assert_eq!(report.chains[0].transforms, vec![map]);
    }

    #[test]
    fn dangling_transform_is_inconclusive() {
        let mut g = ShadingGraph::new();
        let map = g.add_node(Node::identity_mapping());
        let tex = g.add_node(Node::image_texture(None));
        g.add_link(map, sockets::VECTOR, tex, sockets::VECTOR).unwrap();

        assert!(!detect_uv_transform_chain(&g).has_problematic_chain);
    }

    #[test]
    fn foreign_node_terminates_without_flagging() {
        let mut g = ShadingGraph::new();
        let attr = g.add_node(Node::attribute("Col", true));
        let map = g.add_node(Node::identity_mapping());
        let tex = g.add_node(Node::image_texture(None));
        g.add_link(attr, sockets::COLOR, map, sockets::VECTOR).unwrap();
        g.add_link(map, sockets::VECTOR, tex, sockets::VECTOR).unwrap();

        assert!(!detect_uv_transform_chain(&g).has_problematic_chain);
    }

    #[test]
    fn unconnected_texture_input_is_skipped() {
        let mut g = ShadingGraph::new();
        g.add_node(Node::image_texture(None));
        assert!(!detect_uv_transform_chain(&g).has_problematic_chain);
    }
}
