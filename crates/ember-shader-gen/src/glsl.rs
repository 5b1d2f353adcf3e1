//! GLSL source generation (desktop core and ES profiles).

use core::fmt;

use ember_shader_graph::{
    FragmentShader, NodeId, Operation, Operator, ShaderGraph, ValueRepr, ValueType, VertexShader,
};
use tracing::debug;

use crate::emit::{self, binary_rhs, lerp_factor, CodeEmitter, InputAttribute, OperationArgs};
use crate::error::GenerateError;
use crate::writer::SourceWriter;
use crate::StageSources;

/// The GLSL dialect to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlslVersion {
    /// OpenGL ES 3.0 / WebGL 2.
    V300Es,
    /// OpenGL 3.3 core.
    V330Core,
}

impl fmt::Display for GlslVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GlslVersion::V300Es => write!(f, "#version 300 es"),
            GlslVersion::V330Core => write!(f, "#version 330 core"),
        }
    }
}

/// Generates GLSL source for a shader document pair.
#[derive(Debug, Clone, Copy)]
pub struct GlslCodeGenerator {
    version: GlslVersion,
}

impl GlslCodeGenerator {
    pub fn new(version: GlslVersion) -> Self {
        Self { version }
    }

    /// Generates the vertex and fragment stage sources.
    pub fn generate_shader_code(
        &self,
        vertex_shader: &VertexShader,
        fragment_shader: &FragmentShader,
        attributes: &[InputAttribute],
    ) -> Result<StageSources, GenerateError> {
        emit::validate_linkage(vertex_shader, fragment_shader)?;
        debug!(
            vertex = %vertex_shader.id(),
            fragment = %fragment_shader.id(),
            attributes = attributes.len(),
            "generating GLSL shader pair"
        );
        let vertex = self.vertex_source(vertex_shader, attributes)?;
        let fragment = self.fragment_source(fragment_shader)?;
        Ok(StageSources { vertex, fragment })
    }

    fn emit_preamble_uniforms(
        &self,
        w: &mut SourceWriter,
        graph: &ShaderGraph,
        uniforms: &[(&str, NodeId)],
    ) -> Result<(), GenerateError> {
        w.line("uniform mat4 vMtx;");
        w.line("uniform mat4 pMtx;");
        for (name, id) in uniforms {
            match graph.value_type(*id) {
                ValueType::Float4x4Array(capacity) => {
                    w.line(&format!("uniform mat4 u_{name}[{capacity}];"));
                }
                ty => {
                    let ty = self.type_name(ty)?;
                    w.line(&format!("uniform {ty} u_{name};"));
                }
            }
        }
        Ok(())
    }

    fn emit_material_uniforms(&self, w: &mut SourceWriter, channel_count: usize) {
        w.line("struct Material {");
        w.indent();
        w.line("vec2 offset;");
        w.line("vec2 scale;");
        w.line("vec4 color;");
        w.line("sampler2D texture;");
        w.dedent();
        w.line("};");
        for index in 0..channel_count {
            w.line(&format!("uniform Material material_{index};"));
        }
    }

    fn attribute_name(attribute: InputAttribute) -> String {
        let geometry = attribute.geometry_index();
        match attribute {
            InputAttribute::VertexInPosition { .. } => format!("iPos{geometry}"),
            InputAttribute::VertexInTexCoord0 { .. } => format!("iUV{geometry}_0"),
            InputAttribute::VertexInTexCoord1 { .. } => format!("iUV{geometry}_1"),
            InputAttribute::VertexInNormal { .. } => format!("iNml{geometry}"),
            InputAttribute::VertexInTangent { .. } => format!("iTan{geometry}"),
            InputAttribute::VertexInColor { .. } => format!("iClr{geometry}"),
            InputAttribute::VertexInJointIndices { .. } => format!("iJtIdx{geometry}"),
            InputAttribute::VertexInJointWeights { .. } => format!("iJtWeit{geometry}"),
        }
    }

    fn vertex_source(
        &self,
        vertex_shader: &VertexShader,
        attributes: &[InputAttribute],
    ) -> Result<String, GenerateError> {
        let graph = &vertex_shader.graph;
        let mut w = SourceWriter::new();
        w.line(&self.version.to_string());
        w.line("precision highp float;");
        w.blank();
        self.emit_preamble_uniforms(&mut w, graph, &vertex_shader.sorted_custom_uniforms())?;
        w.blank();
        self.emit_material_uniforms(&mut w, vertex_shader.channels().len());
        w.blank();
        for (location, attribute) in attributes.iter().enumerate() {
            let ty = self.type_name(attribute.value_type())?;
            let name = Self::attribute_name(*attribute);
            w.line(&format!("layout(location = {location}) in {ty} {name};"));
        }
        // The per-instance model matrix rides in the next vertex-buffer
        // slot after the caller's attributes.
        w.line(&format!(
            "layout(location = {}) in mat4 mMtx;",
            attributes.len()
        ));
        w.blank();
        for (name, id) in vertex_shader.outputs() {
            let ty = self.type_name(graph.value_type(id))?;
            w.line(&format!("out {ty} io_{name};"));
        }
        w.blank();
        w.line("void main() {");
        w.raw(&emit::generate_vertex_main(self, vertex_shader)?);
        w.line("}");
        Ok(w.finish())
    }

    fn fragment_source(&self, fragment_shader: &FragmentShader) -> Result<String, GenerateError> {
        let graph = &fragment_shader.graph;
        let mut w = SourceWriter::new();
        w.line(&self.version.to_string());
        w.line("precision highp float;");
        w.blank();
        self.emit_preamble_uniforms(&mut w, graph, &fragment_shader.sorted_custom_uniforms())?;
        w.blank();
        self.emit_material_uniforms(&mut w, fragment_shader.channels().len());
        w.blank();
        for (name, id) in fragment_shader.inputs() {
            let ty = self.type_name(graph.value_type(id))?;
            w.line(&format!("in {ty} io_{name};"));
        }
        w.line("layout(location = 0) out vec4 fClr;");
        w.blank();
        w.line("void main() {");
        w.raw(&emit::generate_fragment_main(self, fragment_shader)?);
        w.line("}");
        Ok(w.finish())
    }
}

impl CodeEmitter for GlslCodeGenerator {
    fn type_name(&self, ty: ValueType) -> Result<&'static str, GenerateError> {
        match ty {
            ValueType::Void => Ok("void"),
            ValueType::Bool => Ok("bool"),
            ValueType::Int => Ok("int"),
            ValueType::UInt => Ok("uint"),
            ValueType::Float => Ok("float"),
            ValueType::Float2 => Ok("vec2"),
            ValueType::Float3 => Ok("vec3"),
            ValueType::Float4 => Ok("vec4"),
            ValueType::UInt4 => Ok("uvec4"),
            ValueType::Float3x3 => Ok("mat3"),
            ValueType::Float4x4 => Ok("mat4"),
            ValueType::Float4x4Array(_) => Ok("mat4"),
            ValueType::Texture2D => Ok("sampler2D"),
            ValueType::Operation => Err(GenerateError::UntypedValue),
        }
    }

    fn reference(&self, repr: &ValueRepr) -> Result<String, GenerateError> {
        match repr {
            ValueRepr::VertexInPosition(i) => Ok(format!("iPos{i}")),
            ValueRepr::VertexInTexCoord0(i) => Ok(format!("iUV{i}_0")),
            ValueRepr::VertexInTexCoord1(i) => Ok(format!("iUV{i}_1")),
            ValueRepr::VertexInNormal(i) => Ok(format!("iNml{i}")),
            ValueRepr::VertexInTangent(i) => Ok(format!("iTan{i}")),
            ValueRepr::VertexInColor(i) => Ok(format!("iClr{i}")),
            ValueRepr::VertexInJointIndices(i) => Ok(format!("iJtIdx{i}")),
            ValueRepr::VertexInJointWeights(i) => Ok(format!("iJtWeit{i}")),
            ValueRepr::VertexOutPosition => Ok("gl_Position".to_owned()),
            ValueRepr::VertexOutPointSize => Ok("gl_PointSize".to_owned()),
            ValueRepr::VertexOut(name) => Ok(format!("io_{name}")),
            ValueRepr::VertexInstanceId => Ok("gl_InstanceID".to_owned()),
            ValueRepr::FragmentIn(name) => Ok(format!("io_{name}")),
            ValueRepr::FragmentOutColor => Ok("fClr".to_owned()),
            ValueRepr::FragmentInstanceId => Err(GenerateError::unsupported(
                "fragmentInstanceID",
                "GLSL has no fragment-stage instance id",
            )),
            ValueRepr::FragmentPosition => Ok("gl_FragCoord".to_owned()),
            ValueRepr::UniformModelMatrix => Ok("mMtx".to_owned()),
            ValueRepr::UniformViewMatrix => Ok("vMtx".to_owned()),
            ValueRepr::UniformProjectionMatrix => Ok("pMtx".to_owned()),
            ValueRepr::UniformCustom { name, .. } => Ok(format!("u_{name}")),
            ValueRepr::ChannelAttachment(i) => Ok(format!("material_{i}.texture")),
            ValueRepr::ChannelScale(i) => Ok(format!("material_{i}.scale")),
            ValueRepr::ChannelOffset(i) => Ok(format!("material_{i}.offset")),
            ValueRepr::ChannelColor(i) => Ok(format!("material_{i}.color")),
            repr => Err(GenerateError::unsupported(
                repr.kind_name(),
                "declared per node, never referenced by name",
            )),
        }
    }

    fn operation_expr(
        &self,
        _graph: &ShaderGraph,
        op: &Operation,
        args: &OperationArgs,
    ) -> Result<String, GenerateError> {
        let lhs = &args.lhs.text;
        match &op.operator {
            Operator::Add
            | Operator::Subtract
            | Operator::Multiply
            | Operator::Divide
            | Operator::Compare(_) => {
                let symbol = op.operator.symbol().ok_or_else(|| {
                    GenerateError::unsupported("operation", "operator has no infix symbol")
                })?;
                let rhs = binary_rhs(args)?;
                Ok(format!("{lhs} {symbol} {rhs}"))
            }
            Operator::Not => Ok(format!("!{lhs}")),
            Operator::Cast(ty) => {
                let ty = self.type_name(*ty)?;
                Ok(format!("{ty}({lhs})"))
            }
            Operator::Sampler2D { .. } => {
                // Filter selection is CPU-side sampler state in GL.
                let rhs = binary_rhs(args)?;
                Ok(format!("texture({lhs},{rhs})"))
            }
            Operator::Lerp { .. } => {
                let rhs = binary_rhs(args)?;
                let factor = lerp_factor(args)?;
                Ok(format!("mix({lhs},{rhs},{factor})"))
            }
            Operator::Distance => {
                let rhs = binary_rhs(args)?;
                Ok(format!("distance({lhs},{rhs})"))
            }
            Operator::Branch { .. }
            | Operator::Switch { .. }
            | Operator::Discard { .. }
            | Operator::Sampler2DSize => Err(GenerateError::unsupported(
                "operation",
                "statement-shaped operator has no expression form",
            )),
        }
    }

    fn discard_statement(&self) -> &'static str {
        "discard"
    }

    fn sampler_size_statement(&self, target: &str, texture: &str) -> String {
        format!("{target} = vec2(textureSize({texture}, 0));")
    }

    fn array_literal(&self, element_type: &str, items: &[String]) -> String {
        format!("{element_type}[{}]({})", items.len(), items.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_TYPES: [ValueType; 13] = [
        ValueType::Void,
        ValueType::Bool,
        ValueType::Int,
        ValueType::UInt,
        ValueType::Float,
        ValueType::Float2,
        ValueType::Float3,
        ValueType::Float4,
        ValueType::UInt4,
        ValueType::Float3x3,
        ValueType::Float4x4,
        ValueType::Float4x4Array(8),
        ValueType::Texture2D,
    ];

    #[test]
    fn type_table_is_total() {
        let g = GlslCodeGenerator::new(GlslVersion::V330Core);
        for ty in ALL_TYPES {
            g.type_name(ty).expect("concrete type must map");
        }
        assert_eq!(g.type_name(ValueType::Float4x4Array(3)), Ok("mat4"));
        assert!(g.type_name(ValueType::Operation).is_err());
    }

    #[test]
    fn reference_table_spot_checks() {
        let g = GlslCodeGenerator::new(GlslVersion::V330Core);
        assert_eq!(
            g.reference(&ValueRepr::VertexInPosition(0)).unwrap(),
            "iPos0"
        );
        assert_eq!(
            g.reference(&ValueRepr::VertexOutPosition).unwrap(),
            "gl_Position"
        );
        assert_eq!(
            g.reference(&ValueRepr::ChannelAttachment(2)).unwrap(),
            "material_2.texture"
        );
        assert_eq!(
            g.reference(&ValueRepr::UniformCustom {
                name: "strength".to_owned(),
                ty: ember_shader_graph::UniformType::Float,
            })
            .unwrap(),
            "u_strength"
        );
        assert!(g.reference(&ValueRepr::FragmentInstanceId).is_err());
    }

    #[test]
    fn version_pragmas() {
        assert_eq!(GlslVersion::V300Es.to_string(), "#version 300 es");
        assert_eq!(GlslVersion::V330Core.to_string(), "#version 330 core");
    }
}
