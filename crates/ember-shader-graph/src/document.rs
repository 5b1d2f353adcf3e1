//! Shader documents: the authoring-facing description of one shader
//! stage's inputs, outputs and bindings, prior to text generation.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::arena::NodeId;
use crate::graph::ShaderGraph;
use crate::node::ValueRepr;
use crate::types::{UniformType, ValueType};

static NEXT_DOCUMENT_ID: AtomicU64 = AtomicU64::new(1);

/// A process-stable document identity.
///
/// Used by the MSL generator to suffix entry-point names so that multiple
/// shader-pair variants can coexist in one compiled library, and by
/// renderer backends as part of their pipeline cache keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocumentId(u64);

impl DocumentId {
    fn next() -> Self {
        Self(NEXT_DOCUMENT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The per-stream vertex input nodes of one geometry stream.
#[derive(Debug, Clone, Copy)]
pub struct Geometry {
    pub position: NodeId,
    pub texture_coordinate_0: NodeId,
    pub texture_coordinate_1: NodeId,
    pub normal: NodeId,
    pub tangent: NodeId,
    pub color: NodeId,
    pub joint_indices: NodeId,
    pub joint_weights: NodeId,
}

fn make_geometry(graph: &mut ShaderGraph, index: u8) -> Geometry {
    Geometry {
        position: graph.add_node(ValueRepr::VertexInPosition(index), ValueType::Float3),
        texture_coordinate_0: graph
            .add_node(ValueRepr::VertexInTexCoord0(index), ValueType::Float2),
        texture_coordinate_1: graph
            .add_node(ValueRepr::VertexInTexCoord1(index), ValueType::Float2),
        normal: graph.add_node(ValueRepr::VertexInNormal(index), ValueType::Float3),
        tangent: graph.add_node(ValueRepr::VertexInTangent(index), ValueType::Float3),
        color: graph.add_node(ValueRepr::VertexInColor(index), ValueType::Float4),
        joint_indices: graph
            .add_node(ValueRepr::VertexInJointIndices(index), ValueType::UInt4),
        joint_weights: graph
            .add_node(ValueRepr::VertexInJointWeights(index), ValueType::Float4),
    }
}

/// One material channel's binding nodes: a texture attachment plus its
/// sampling scale/offset and tint color.
#[derive(Debug, Clone, Copy)]
pub struct MaterialChannel {
    pub attachment: NodeId,
    pub scale: NodeId,
    pub offset: NodeId,
    pub color: NodeId,
}

fn make_channel(graph: &mut ShaderGraph, index: u8) -> MaterialChannel {
    MaterialChannel {
        attachment: graph.add_node(ValueRepr::ChannelAttachment(index), ValueType::Texture2D),
        scale: graph.add_node(ValueRepr::ChannelScale(index), ValueType::Float2),
        offset: graph.add_node(ValueRepr::ChannelOffset(index), ValueType::Float2),
        color: graph.add_node(ValueRepr::ChannelColor(index), ValueType::Float4),
    }
}

fn channel_at(
    graph: &mut ShaderGraph,
    channels: &mut Vec<MaterialChannel>,
    index: u8,
) -> MaterialChannel {
    assert!(
        (index as usize) <= channels.len(),
        "channel index {index} must be an existing channel or the next one"
    );
    if index as usize == channels.len() {
        let channel = make_channel(graph, index);
        channels.push(channel);
    }
    channels[index as usize]
}

fn custom_uniform(
    graph: &mut ShaderGraph,
    uniforms: &mut Vec<(String, NodeId)>,
    name: &str,
    ty: UniformType,
) -> NodeId {
    if let Some((_, id)) = uniforms.iter().find(|(n, _)| n == name) {
        return *id;
    }
    let id = graph.add_node(
        ValueRepr::UniformCustom {
            name: name.to_owned(),
            ty,
        },
        ty.value_type(),
    );
    uniforms.push((name.to_owned(), id));
    id
}

fn sorted_uniforms(uniforms: &[(String, NodeId)]) -> Vec<(&str, NodeId)> {
    let mut out: Vec<(&str, NodeId)> = uniforms
        .iter()
        .map(|(name, id)| (name.as_str(), *id))
        .collect();
    // Case-insensitive name order; exact name as the tie-break. The
    // renderer backends compute uniform-buffer byte offsets with the same
    // sort, independently of the generators.
    out.sort_by(|a, b| {
        let al = a.0.to_ascii_lowercase();
        let bl = b.0.to_ascii_lowercase();
        al.cmp(&bl).then_with(|| a.0.cmp(b.0))
    });
    out
}

/// The vertex-stage shader document.
pub struct VertexShader {
    id: DocumentId,
    /// The value graph all of this document's nodes live in.
    pub graph: ShaderGraph,
    geometries: Vec<Geometry>,
    channels: Vec<MaterialChannel>,
    uniforms: Vec<(String, NodeId)>,
    outputs: Vec<(String, NodeId)>,
    position: Option<NodeId>,
    point_size: Option<NodeId>,
    instance_id: NodeId,
    model_matrix: NodeId,
    view_matrix: NodeId,
    projection_matrix: NodeId,
    model_view_projection_matrix: NodeId,
}

impl VertexShader {
    pub fn new() -> Self {
        let mut graph = ShaderGraph::new();
        let geometry0 = make_geometry(&mut graph, 0);
        let channel0 = make_channel(&mut graph, 0);
        let model_matrix = graph.add_node(ValueRepr::UniformModelMatrix, ValueType::Float4x4);
        let view_matrix = graph.add_node(ValueRepr::UniformViewMatrix, ValueType::Float4x4);
        let projection_matrix =
            graph.add_node(ValueRepr::UniformProjectionMatrix, ValueType::Float4x4);
        let view_projection = graph.multiply(projection_matrix, view_matrix);
        let model_view_projection_matrix = graph.multiply(view_projection, model_matrix);
        let instance_id = graph.add_node(ValueRepr::VertexInstanceId, ValueType::Int);
        Self {
            id: DocumentId::next(),
            graph,
            geometries: vec![geometry0],
            channels: vec![channel0],
            uniforms: Vec::new(),
            outputs: Vec::new(),
            position: None,
            point_size: None,
            instance_id,
            model_matrix,
            view_matrix,
            projection_matrix,
            model_view_projection_matrix,
        }
    }

    pub fn id(&self) -> DocumentId {
        self.id
    }

    /// The vertex input nodes for geometry stream `index`. Requesting the
    /// stream one past the end appends it.
    pub fn geometry(&mut self, index: u8) -> Geometry {
        assert!(
            (index as usize) <= self.geometries.len(),
            "geometry index {index} must be an existing stream or the next one"
        );
        if index as usize == self.geometries.len() {
            let geometry = make_geometry(&mut self.graph, index);
            self.geometries.push(geometry);
        }
        self.geometries[index as usize]
    }

    /// The geometry streams created so far, in stream order.
    pub fn geometries(&self) -> &[Geometry] {
        &self.geometries
    }

    /// The binding nodes for material channel `index`. Requesting the
    /// channel one past the end appends it.
    pub fn channel(&mut self, index: u8) -> MaterialChannel {
        channel_at(&mut self.graph, &mut self.channels, index)
    }

    /// The material channels in channel order.
    pub fn channels(&self) -> &[MaterialChannel] {
        &self.channels
    }

    /// Creates or returns the custom uniform named `name`.
    pub fn custom_uniform(&mut self, name: &str, ty: UniformType) -> NodeId {
        custom_uniform(&mut self.graph, &mut self.uniforms, name, ty)
    }

    /// Custom uniforms in the deterministic emission order.
    pub fn sorted_custom_uniforms(&self) -> Vec<(&str, NodeId)> {
        sorted_uniforms(&self.uniforms)
    }

    pub fn model_matrix(&self) -> NodeId {
        self.model_matrix
    }

    pub fn view_matrix(&self) -> NodeId {
        self.view_matrix
    }

    pub fn projection_matrix(&self) -> NodeId {
        self.projection_matrix
    }

    /// `projection * view * model`, the default position transform.
    pub fn model_view_projection_matrix(&self) -> NodeId {
        self.model_view_projection_matrix
    }

    pub fn instance_id(&self) -> NodeId {
        self.instance_id
    }

    /// Binds the clip-space position output.
    pub fn set_position(&mut self, value: NodeId) {
        self.position = Some(value);
    }

    pub fn position(&self) -> Option<NodeId> {
        self.position
    }

    /// Binds the point-size output.
    pub fn set_point_size(&mut self, value: NodeId) {
        self.point_size = Some(value);
    }

    pub fn point_size(&self) -> Option<NodeId> {
        self.point_size
    }

    /// Binds the named varying output, replacing any previous binding of
    /// the same name while keeping its original position in emission
    /// order.
    pub fn set_output(&mut self, name: &str, value: NodeId) {
        if let Some(entry) = self.outputs.iter_mut().find(|(n, _)| n == name) {
            entry.1 = value;
            return;
        }
        self.outputs.push((name.to_owned(), value));
    }

    /// Named varying outputs in insertion order.
    pub fn outputs(&self) -> impl Iterator<Item = (&str, NodeId)> {
        self.outputs.iter().map(|(name, id)| (name.as_str(), *id))
    }
}

impl Default for VertexShader {
    fn default() -> Self {
        Self::new()
    }
}

/// The fragment-stage shader document.
pub struct FragmentShader {
    id: DocumentId,
    /// The value graph all of this document's nodes live in.
    pub graph: ShaderGraph,
    channels: Vec<MaterialChannel>,
    uniforms: Vec<(String, NodeId)>,
    inputs: Vec<(String, NodeId)>,
    color: Option<NodeId>,
    instance_id: NodeId,
    position: NodeId,
}

impl FragmentShader {
    pub fn new() -> Self {
        let mut graph = ShaderGraph::new();
        let channel0 = make_channel(&mut graph, 0);
        let instance_id = graph.add_node(ValueRepr::FragmentInstanceId, ValueType::Int);
        let position = graph.add_node(ValueRepr::FragmentPosition, ValueType::Float4);
        Self {
            id: DocumentId::next(),
            graph,
            channels: vec![channel0],
            uniforms: Vec::new(),
            inputs: Vec::new(),
            color: None,
            instance_id,
            position,
        }
    }

    pub fn id(&self) -> DocumentId {
        self.id
    }

    /// The binding nodes for material channel `index`. Requesting the
    /// channel one past the end appends it.
    pub fn channel(&mut self, index: u8) -> MaterialChannel {
        channel_at(&mut self.graph, &mut self.channels, index)
    }

    /// The material channels in channel order.
    pub fn channels(&self) -> &[MaterialChannel] {
        &self.channels
    }

    /// Creates or returns the custom uniform named `name`.
    pub fn custom_uniform(&mut self, name: &str, ty: UniformType) -> NodeId {
        custom_uniform(&mut self.graph, &mut self.uniforms, name, ty)
    }

    /// Custom uniforms in the deterministic emission order.
    pub fn sorted_custom_uniforms(&self) -> Vec<(&str, NodeId)> {
        sorted_uniforms(&self.uniforms)
    }

    /// Creates or returns the named varying input with the given type.
    ///
    /// The paired vertex shader must write an output of the same name;
    /// generation fails linkage validation otherwise.
    pub fn input(&mut self, name: &str, ty: ValueType) -> NodeId {
        if let Some((_, id)) = self.inputs.iter().find(|(n, _)| n == name) {
            return *id;
        }
        let id = self
            .graph
            .add_node(ValueRepr::FragmentIn(name.to_owned()), ty);
        self.inputs.push((name.to_owned(), id));
        id
    }

    /// Named varying inputs in insertion order.
    pub fn inputs(&self) -> impl Iterator<Item = (&str, NodeId)> {
        self.inputs.iter().map(|(name, id)| (name.as_str(), *id))
    }

    /// Binds the color output.
    pub fn set_color(&mut self, value: NodeId) {
        self.color = Some(value);
    }

    pub fn color(&self) -> Option<NodeId> {
        self.color
    }

    pub fn instance_id(&self) -> NodeId {
        self.instance_id
    }

    /// The fragment's window-space position.
    pub fn position(&self) -> NodeId {
        self.position
    }
}

impl Default for FragmentShader {
    fn default() -> Self {
        Self::new()
    }
}
