//! Shading-graph model.
//!
//! A material's node graph as an arena of typed nodes addressed by stable
//! handles, with directed links between (node, socket) pairs. The graph is
//! consumed by the classifier and detectors and copied/edited by the bake
//! orchestrator; it is never evaluated.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Well-known socket names used by the classifier and orchestrator
pub mod sockets {
    pub const BASE_COLOR: &str = "Base Color";
    pub const METALLIC: &str = "Metallic";
    pub const ROUGHNESS: &str = "Roughness";
    pub const SPECULAR: &str = "Specular";
    pub const ALPHA: &str = "Alpha";
    pub const EMISSION_COLOR: &str = "Emission Color";
    pub const EMISSION_STRENGTH: &str = "Emission Strength";
    pub const COLOR: &str = "Color";
    pub const STRENGTH: &str = "Strength";
    pub const VECTOR: &str = "Vector";
    pub const INPUT: &str = "Input";
    pub const UV: &str = "UV";
}

/// Stable index of a node within its graph's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeHandle(pub u32);

/// Socket data type. Links must connect compatible types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SocketType {
    Vector,
    Color,
    Scalar,
}

impl SocketType {
    /// Color interconverts with both vector and scalar (implicit channel
    /// conversion); vector and scalar never link directly.
    pub fn compatible(self, other: SocketType) -> bool {
        !matches!(
            (self, other),
            (SocketType::Vector, SocketType::Scalar) | (SocketType::Scalar, SocketType::Vector)
        )
    }
}

/// Literal value carried by an input socket when nothing is connected
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SocketValue {
    Scalar(f32),
    Vector([f32; 3]),
    Color([f32; 4]),
}

impl SocketValue {
    pub fn socket_type(&self) -> SocketType {
        match self {
            SocketValue::Scalar(_) => SocketType::Scalar,
            SocketValue::Vector(_) => SocketType::Vector,
            SocketValue::Color(_) => SocketType::Color,
        }
    }

    pub fn as_scalar(&self) -> Option<f32> {
        match self {
            SocketValue::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_color(&self) -> Option<[f32; 4]> {
        match self {
            SocketValue::Color(c) => Some(*c),
            _ => None,
        }
    }
}

/// Typed input socket with a literal default
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSocket {
    pub name: String,
    pub ty: SocketType,
    pub default: SocketValue,
}

impl InputSocket {
    pub fn scalar(name: &str, default: f32) -> Self {
        Self {
            name: name.to_string(),
            ty: SocketType::Scalar,
            default: SocketValue::Scalar(default),
        }
    }

    pub fn color(name: &str, default: [f32; 4]) -> Self {
        Self {
            name: name.to_string(),
            ty: SocketType::Color,
            default: SocketValue::Color(default),
        }
    }

    pub fn vector(name: &str, default: [f32; 3]) -> Self {
        Self {
            name: name.to_string(),
            ty: SocketType::Vector,
            default: SocketValue::Vector(default),
        }
    }
}

/// Node category tag with per-kind payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeKind {
    /// Energy-conserving physically-based shading node
    Pbr,
    /// Pure emission shader
    Emission,
    /// Transparent/glass shader
    Transparent,
    /// Mesh attribute lookup (vertex colors when `is_color`)
    Attribute { name: String, is_color: bool },
    /// Image texture lookup
    ImageTexture { image: Option<String> },
    /// Affine coordinate mapping
    Mapping {
        location: [f32; 3],
        rotation: [f32; 3],
        scale: [f32; 3],
    },
    /// Explicit UV-map selector
    UvMap { uv_layer: String },
    VectorTransform,
    VectorRotate,
    VectorMath,
    /// Ambient-occlusion sampler
    AmbientOcclusion,
    /// Pass-through; traversals step through it transparently
    Reroute,
    /// Raw UV coordinate source
    TexCoord,
}

impl NodeKind {
    /// Coordinate-transform category: remaps UV/vector coordinates
    /// before they reach a texture lookup.
    pub fn is_uv_transform(&self) -> bool {
        matches!(
            self,
            NodeKind::Mapping { .. }
                | NodeKind::UvMap { .. }
                | NodeKind::VectorTransform
                | NodeKind::VectorRotate
                | NodeKind::VectorMath
        )
    }

    pub fn is_shader(&self) -> bool {
        matches!(
            self,
            NodeKind::Pbr | NodeKind::Emission | NodeKind::Transparent
        )
    }

    /// Type produced on this node's output. Reroutes pass through whatever
    /// they carry, so they report `None` and link as anything.
    pub fn output_type(&self) -> Option<SocketType> {
        match self {
            NodeKind::Pbr | NodeKind::Emission | NodeKind::Transparent => Some(SocketType::Color),
            NodeKind::Attribute { .. } => Some(SocketType::Color),
            NodeKind::ImageTexture { .. } => Some(SocketType::Color),
            NodeKind::AmbientOcclusion => Some(SocketType::Color),
            NodeKind::Mapping { .. }
            | NodeKind::UvMap { .. }
            | NodeKind::VectorTransform
            | NodeKind::VectorRotate
            | NodeKind::VectorMath
            | NodeKind::TexCoord => Some(SocketType::Vector),
            NodeKind::Reroute => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Pbr => "PBR",
            NodeKind::Emission => "Emission",
            NodeKind::Transparent => "Transparent",
            NodeKind::Attribute { .. } => "Attribute",
            NodeKind::ImageTexture { .. } => "Image Texture",
            NodeKind::Mapping { .. } => "Mapping",
            NodeKind::UvMap { .. } => "UV Map",
            NodeKind::VectorTransform => "Vector Transform",
            NodeKind::VectorRotate => "Vector Rotate",
            NodeKind::VectorMath => "Vector Math",
            NodeKind::AmbientOcclusion => "Ambient Occlusion",
            NodeKind::Reroute => "Reroute",
            NodeKind::TexCoord => "Texture Coordinate",
        }
    }
}

/// A graph node: category tag plus typed input sockets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub kind: NodeKind,
    pub inputs: Vec<InputSocket>,
}

impl Node {
    pub fn new(kind: NodeKind, inputs: Vec<InputSocket>) -> Self {
        Self { kind, inputs }
    }

    /// PBR node with neutral literal defaults. A default-constructed PBR
    /// node triggers neither the metal rule nor the second-texture gate.
    pub fn pbr() -> Self {
        Self::new(
            NodeKind::Pbr,
            vec![
                InputSocket::color(sockets::BASE_COLOR, [0.8, 0.8, 0.8, 1.0]),
                InputSocket::scalar(sockets::METALLIC, 0.0),
                InputSocket::scalar(sockets::ROUGHNESS, 0.5),
                InputSocket::scalar(sockets::SPECULAR, 0.5),
                InputSocket::scalar(sockets::ALPHA, 1.0),
                InputSocket::color(sockets::EMISSION_COLOR, [0.0, 0.0, 0.0, 1.0]),
                InputSocket::scalar(sockets::EMISSION_STRENGTH, 0.0),
            ],
        )
    }

    pub fn emission(color: [f32; 4], strength: f32) -> Self {
        Self::new(
            NodeKind::Emission,
            vec![
                InputSocket::color(sockets::COLOR, color),
                InputSocket::scalar(sockets::STRENGTH, strength),
            ],
        )
    }

    pub fn transparent() -> Self {
        Self::new(
            NodeKind::Transparent,
            vec![InputSocket::color(sockets::COLOR, [1.0, 1.0, 1.0, 1.0])],
        )
    }

    pub fn attribute(name: &str, is_color: bool) -> Self {
        Self::new(
            NodeKind::Attribute {
                name: name.to_string(),
                is_color,
            },
            Vec::new(),
        )
    }

    pub fn image_texture(image: Option<&str>) -> Self {
        Self::new(
            NodeKind::ImageTexture {
                image: image.map(str::to_string),
            },
            vec![InputSocket::vector(sockets::VECTOR, [0.0, 0.0, 0.0])],
        )
    }

    pub fn mapping(location: [f32; 3], rotation: [f32; 3], scale: [f32; 3]) -> Self {
        Self::new(
            NodeKind::Mapping {
                location,
                rotation,
                scale,
            },
            vec![InputSocket::vector(sockets::VECTOR, [0.0, 0.0, 0.0])],
        )
    }

    /// Affine mapping left at (0,0,0)/(0,0,0)/(1,1,1)
    pub fn identity_mapping() -> Self {
        Self::mapping([0.0; 3], [0.0; 3], [1.0, 1.0, 1.0])
    }

    pub fn uv_map(uv_layer: &str) -> Self {
        Self::new(
            NodeKind::UvMap {
                uv_layer: uv_layer.to_string(),
            },
            Vec::new(),
        )
    }

    pub fn vector_math() -> Self {
        Self::new(
            NodeKind::VectorMath,
            vec![InputSocket::vector(sockets::VECTOR, [0.0, 0.0, 0.0])],
        )
    }

    pub fn ambient_occlusion() -> Self {
        Self::new(NodeKind::AmbientOcclusion, Vec::new())
    }

    pub fn reroute() -> Self {
        Self::new(
            NodeKind::Reroute,
            vec![InputSocket::vector(sockets::INPUT, [0.0, 0.0, 0.0])],
        )
    }

    pub fn tex_coord() -> Self {
        Self::new(NodeKind::TexCoord, Vec::new())
    }

    pub fn input(&self, name: &str) -> Option<&InputSocket> {
        self.inputs.iter().find(|s| s.name == name)
    }

    pub fn input_mut(&mut self, name: &str) -> Option<&mut InputSocket> {
        self.inputs.iter_mut().find(|s| s.name == name)
    }
}

/// Directed link between (node, socket) pairs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub from: NodeHandle,
    pub from_socket: String,
    pub to: NodeHandle,
    pub to_socket: String,
}

/// Arena of nodes plus the links between them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShadingGraph {
    nodes: Vec<Node>,
    links: Vec<Link>,
}

impl ShadingGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: Node) -> NodeHandle {
        let handle = NodeHandle(self.nodes.len() as u32);
        self.nodes.push(node);
        handle
    }

    pub fn node(&self, handle: NodeHandle) -> Option<&Node> {
        self.nodes.get(handle.0 as usize)
    }

    pub fn node_mut(&mut self, handle: NodeHandle) -> Option<&mut Node> {
        self.nodes.get_mut(handle.0 as usize)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate (handle, node) pairs in arena order
    pub fn nodes(&self) -> impl Iterator<Item = (NodeHandle, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (NodeHandle(i as u32), n))
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Connect an output socket to an input socket. The destination socket
    /// must exist and the types must be compatible.
    pub fn add_link(
        &mut self,
        from: NodeHandle,
        from_socket: &str,
        to: NodeHandle,
        to_socket: &str,
    ) -> Result<()> {
        let source = self
            .node(from)
            .ok_or_else(|| Error::Graph(format!("unknown source node {:?}", from)))?;
        let dest = self
            .node(to)
            .ok_or_else(|| Error::Graph(format!("unknown dest node {:?}", to)))?;
        let dest_ty = dest
            .input(to_socket)
            .ok_or_else(|| {
                Error::Graph(format!(
                    "node {} has no input socket '{}'",
                    dest.kind.label(),
                    to_socket
                ))
            })?
            .ty;
        if let Some(src_ty) = source.kind.output_type() {
            if !src_ty.compatible(dest_ty) {
                return Err(Error::Graph(format!(
                    "incompatible link {:?} -> {:?} ('{}' to '{}')",
                    src_ty, dest_ty, from_socket, to_socket
                )));
            }
        }
        // One link per input socket: a new link replaces an existing one
        self.links.retain(|l| !(l.to == to && l.to_socket == to_socket));
        self.links.push(Link {
            from,
            from_socket: from_socket.to_string(),
            to,
            to_socket: to_socket.to_string(),
        });
        Ok(())
    }

    /// The link feeding an input socket, if any
    pub fn incoming(&self, to: NodeHandle, socket: &str) -> Option<&Link> {
        self.links
            .iter()
            .find(|l| l.to == to && l.to_socket == socket)
    }

    pub fn is_connected(&self, to: NodeHandle, socket: &str) -> bool {
        self.incoming(to, socket).is_some()
    }

    /// Literal default of an input socket, only when nothing is connected
    pub fn input_literal(&self, handle: NodeHandle, socket: &str) -> Option<&SocketValue> {
        if self.is_connected(handle, socket) {
            return None;
        }
        self.node(handle)?.input(socket).map(|s| &s.default)
    }

    pub fn input_scalar(&self, handle: NodeHandle, socket: &str) -> Option<f32> {
        self.input_literal(handle, socket)?.as_scalar()
    }

    pub fn remove_incoming(&mut self, to: NodeHandle, socket: &str) -> Option<Link> {
        let idx = self
            .links
            .iter()
            .position(|l| l.to == to && l.to_socket == socket)?;
        Some(self.links.remove(idx))
    }

    /// Move an incoming link from one input socket to another on the same
    /// node. Returns true when a link was retargeted.
    pub fn retarget_input(&mut self, to: NodeHandle, old_socket: &str, new_socket: &str) -> bool {
        for link in &mut self.links {
            if link.to == to && link.to_socket == old_socket {
                link.to_socket = new_socket.to_string();
                return true;
            }
        }
        false
    }

    /// Follow reroutes upstream until a non-reroute node (or a dangling
    /// reroute) is reached. Cycle-safe: revisiting a handle stops the walk.
    pub fn follow_reroutes(&self, start: NodeHandle) -> NodeHandle {
        let mut current = start;
        let mut seen = HashSet::new();
        while seen.insert(current) {
            let Some(node) = self.node(current) else {
                return current;
            };
            if !matches!(node.kind, NodeKind::Reroute) {
                return current;
            }
            match self.incoming(current, sockets::INPUT) {
                Some(link) => current = link.from,
                None => return current,
            }
        }
        current
    }

    /// First node matching the predicate, in arena order
    pub fn find(&self, pred: impl Fn(&NodeKind) -> bool) -> Option<NodeHandle> {
        self.nodes().find(|(_, n)| pred(&n.kind)).map(|(h, _)| h)
    }

    pub fn any(&self, pred: impl Fn(&NodeKind) -> bool) -> bool {
        self.find(pred).is_some()
    }
}
