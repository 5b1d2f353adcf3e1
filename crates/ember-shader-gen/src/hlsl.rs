//! HLSL source generation (Direct3D 12, shader model 5.x semantics).

use ember_shader_graph::{
    FragmentShader, NodeId, Operation, Operator, SamplerFilter, ShaderGraph, ValueRepr, ValueType,
    VertexShader,
};
use tracing::debug;

use crate::emit::{self, binary_rhs, lerp_factor, CodeEmitter, InputAttribute, OperationArgs};
use crate::error::GenerateError;
use crate::writer::SourceWriter;
use crate::StageSources;

/// Generates HLSL source for a shader document pair. Entry points are
/// named `VSMain` and `PSMain`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HlslCodeGenerator;

impl HlslCodeGenerator {
    pub fn new() -> Self {
        Self
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
            "generating HLSL shader pair"
        );
        let vertex = self.vertex_source(vertex_shader, attributes)?;
        let fragment = self.fragment_source(vertex_shader, fragment_shader)?;
        Ok(StageSources { vertex, fragment })
    }

    fn emit_uniform_cbuffer(
        &self,
        w: &mut SourceWriter,
        graph: &ShaderGraph,
        uniforms: &[(&str, NodeId)],
    ) -> Result<(), GenerateError> {
        w.line("cbuffer Uniforms : register(b0) {");
        w.indent();
        w.line("float4x4 pMtx;");
        w.line("float4x4 vMtx;");
        for (name, id) in uniforms {
            match graph.value_type(*id) {
                ValueType::Float4x4Array(capacity) => {
                    w.line(&format!("float4x4 u_{name}[{capacity}];"));
                }
                ty => {
                    let ty = self.type_name(ty)?;
                    w.line(&format!("{ty} u_{name};"));
                }
            }
        }
        w.dedent();
        w.line("};");
        Ok(())
    }

    fn emit_material_cbuffer(&self, w: &mut SourceWriter) {
        w.line("struct Material {");
        w.indent();
        w.line("float2 scale;");
        w.line("float2 offset;");
        w.line("float4 color;");
        w.line("int sampleFilter;");
        w.dedent();
        w.line("};");
        w.line("cbuffer Materials : register(b1) {");
        w.indent();
        w.line("Material materials[16];");
        w.dedent();
        w.line("};");
    }

    fn attribute_field(attribute: InputAttribute) -> (String, &'static str) {
        let geometry = attribute.geometry_index();
        match attribute {
            InputAttribute::VertexInPosition { .. } => (format!("pos{geometry}"), "POSITION"),
            InputAttribute::VertexInTexCoord0 { .. } => (format!("uv{geometry}_0"), "TEXCOORD0"),
            InputAttribute::VertexInTexCoord1 { .. } => (format!("uv{geometry}_1"), "TEXCOORD1"),
            InputAttribute::VertexInNormal { .. } => (format!("nml{geometry}"), "NORMAL"),
            InputAttribute::VertexInTangent { .. } => (format!("tan{geometry}"), "TANGENT"),
            InputAttribute::VertexInColor { .. } => (format!("clr{geometry}"), "COLOR"),
            InputAttribute::VertexInJointIndices { .. } => {
                (format!("jtIdx{geometry}"), "BONEINDEX")
            }
            InputAttribute::VertexInJointWeights { .. } => {
                (format!("jtWeit{geometry}"), "BONEWEIGHT")
            }
        }
    }

    /// The inter-stage struct; must be textually identical in both
    /// sources, so it is always derived from the vertex shader's outputs.
    fn emit_interstage_struct(
        &self,
        w: &mut SourceWriter,
        vertex_shader: &VertexShader,
    ) -> Result<(), GenerateError> {
        w.line("struct PSInput {");
        w.indent();
        w.line("float4 pos : SV_POSITION;");
        w.line("float ptSz : PSIZE;");
        w.line("int iid : IID;");
        for (name, id) in vertex_shader.outputs() {
            let ty = self.type_name(vertex_shader.graph.value_type(id))?;
            w.line(&format!("{ty} {name} : {};", name.to_uppercase()));
        }
        w.dedent();
        w.line("};");
        Ok(())
    }

    fn vertex_source(
        &self,
        vertex_shader: &VertexShader,
        attributes: &[InputAttribute],
    ) -> Result<String, GenerateError> {
        let graph = &vertex_shader.graph;
        let mut w = SourceWriter::new();
        self.emit_uniform_cbuffer(&mut w, graph, &vertex_shader.sorted_custom_uniforms())?;
        self.emit_material_cbuffer(&mut w);
        w.blank();
        w.line("struct VSInput {");
        w.indent();
        for attribute in attributes {
            let ty = self.type_name(attribute.value_type())?;
            let (field, semantic) = Self::attribute_field(*attribute);
            w.line(&format!("{ty} {field} : {semantic};"));
        }
        // D3D vertex input cannot bind a float4x4 under one semantic; the
        // per-instance model matrix arrives as four float4 rows.
        w.line("float4 modelMatrix1 : ModelMatrixA;");
        w.line("float4 modelMatrix2 : ModelMatrixB;");
        w.line("float4 modelMatrix3 : ModelMatrixC;");
        w.line("float4 modelMatrix4 : ModelMatrixD;");
        w.line("uint iid : SV_InstanceID;");
        w.dedent();
        w.line("};");
        self.emit_interstage_struct(&mut w, vertex_shader)?;
        w.blank();
        w.line("PSInput VSMain(VSInput input) {");
        w.indent();
        w.line("float4x4 mMtx = float4x4(input.modelMatrix1,input.modelMatrix2,input.modelMatrix3,input.modelMatrix4);");
        w.line("PSInput output;");
        w.line("output.iid = input.iid;");
        w.dedent();
        w.raw(&emit::generate_vertex_main(self, vertex_shader)?);
        w.indent();
        w.line("return output;");
        w.dedent();
        w.line("}");
        Ok(w.finish())
    }

    fn fragment_source(
        &self,
        vertex_shader: &VertexShader,
        fragment_shader: &FragmentShader,
    ) -> Result<String, GenerateError> {
        let graph = &fragment_shader.graph;
        let mut w = SourceWriter::new();
        self.emit_uniform_cbuffer(&mut w, graph, &fragment_shader.sorted_custom_uniforms())?;
        self.emit_material_cbuffer(&mut w);
        self.emit_interstage_struct(&mut w, vertex_shader)?;
        w.blank();
        for index in 0..fragment_shader.channels().len() {
            w.line(&format!(
                "Texture2D<float4> tex{index} : register(t{index});"
            ));
        }
        w.line("SamplerState linearSampler : register(s0);");
        w.line("SamplerState nearestSampler : register(s1);");
        w.blank();
        // D3D cannot select a sampler dynamically by value; the helper
        // branches on an integer filter selector over the two statically
        // bound sampler states.
        w.line("float4 Sample(Texture2D<float4> tex, int sampleFilter, float2 uv) {");
        w.indent();
        w.line("if (sampleFilter == 1) {");
        w.indent();
        w.line("return tex.Sample(nearestSampler, uv);");
        w.dedent();
        w.line("}");
        w.line("return tex.Sample(linearSampler, uv);");
        w.dedent();
        w.line("}");
        w.blank();
        w.line("float4 PSMain(PSInput input) : SV_TARGET {");
        w.indent();
        w.line("float4 fClr;");
        w.dedent();
        w.raw(&emit::generate_fragment_main(self, fragment_shader)?);
        w.indent();
        w.line("return fClr;");
        w.dedent();
        w.line("}");
        Ok(w.finish())
    }
}

/// Whether a multiply must lower to the `mul()` intrinsic: any operand
/// whose resolved type is matrix-shaped, walking through nested operation
/// nodes whose stored type is unresolved.
fn needs_mul(graph: &ShaderGraph, op: &Operation) -> bool {
    let mut operands = vec![op.lhs];
    if let Some(rhs) = op.rhs {
        operands.push(rhs);
    }
    for id in operands {
        let node = graph.node(id);
        if node.ty.is_matrix() {
            return true;
        }
        if node.ty == ValueType::Operation {
            if graph.value_type(id).is_matrix() {
                return true;
            }
            if let ValueRepr::Operation(inner) = &node.repr {
                if needs_mul(graph, inner) {
                    return true;
                }
            }
        }
    }
    false
}

impl CodeEmitter for HlslCodeGenerator {
    fn type_name(&self, ty: ValueType) -> Result<&'static str, GenerateError> {
        match ty {
            ValueType::Void => Ok("void"),
            ValueType::Bool => Ok("bool"),
            ValueType::Int => Ok("int"),
            ValueType::UInt => Ok("uint"),
            ValueType::Float => Ok("float"),
            ValueType::Float2 => Ok("float2"),
            ValueType::Float3 => Ok("float3"),
            ValueType::Float4 => Ok("float4"),
            ValueType::UInt4 => Ok("uint4"),
            ValueType::Float3x3 => Ok("float3x3"),
            ValueType::Float4x4 => Ok("float4x4"),
            ValueType::Float4x4Array(_) => Ok("float4x4"),
            ValueType::Texture2D => Ok("Texture2D<float4>"),
            ValueType::Operation => Err(GenerateError::UntypedValue),
        }
    }

    fn reference(&self, repr: &ValueRepr) -> Result<String, GenerateError> {
        match repr {
            ValueRepr::VertexInPosition(i) => Ok(format!("input.pos{i}")),
            ValueRepr::VertexInTexCoord0(i) => Ok(format!("input.uv{i}_0")),
            ValueRepr::VertexInTexCoord1(i) => Ok(format!("input.uv{i}_1")),
            ValueRepr::VertexInNormal(i) => Ok(format!("input.nml{i}")),
            ValueRepr::VertexInTangent(i) => Ok(format!("input.tan{i}")),
            ValueRepr::VertexInColor(i) => Ok(format!("input.clr{i}")),
            ValueRepr::VertexInJointIndices(i) => Ok(format!("input.jtIdx{i}")),
            ValueRepr::VertexInJointWeights(i) => Ok(format!("input.jtWeit{i}")),
            ValueRepr::VertexOutPosition => Ok("output.pos".to_owned()),
            ValueRepr::VertexOutPointSize => Ok("output.ptSz".to_owned()),
            ValueRepr::VertexOut(name) => Ok(format!("output.{name}")),
            ValueRepr::VertexInstanceId => Ok("input.iid".to_owned()),
            ValueRepr::FragmentIn(name) => Ok(format!("input.{name}")),
            ValueRepr::FragmentOutColor => Ok("fClr".to_owned()),
            ValueRepr::FragmentInstanceId => Ok("input.iid".to_owned()),
            ValueRepr::FragmentPosition => Ok("input.pos".to_owned()),
            ValueRepr::UniformModelMatrix => Ok("mMtx".to_owned()),
            ValueRepr::UniformViewMatrix => Ok("vMtx".to_owned()),
            ValueRepr::UniformProjectionMatrix => Ok("pMtx".to_owned()),
            ValueRepr::UniformCustom { name, .. } => Ok(format!("u_{name}")),
            ValueRepr::ChannelAttachment(i) => Ok(format!("tex{i}")),
            ValueRepr::ChannelScale(i) => Ok(format!("materials[{i}].scale")),
            ValueRepr::ChannelOffset(i) => Ok(format!("materials[{i}].offset")),
            ValueRepr::ChannelColor(i) => Ok(format!("materials[{i}].color")),
            repr => Err(GenerateError::unsupported(
                repr.kind_name(),
                "declared per node, never referenced by name",
            )),
        }
    }

    fn operation_expr(
        &self,
        graph: &ShaderGraph,
        op: &Operation,
        args: &OperationArgs,
    ) -> Result<String, GenerateError> {
        let lhs = &args.lhs.text;
        match &op.operator {
            Operator::Multiply => {
                let rhs = binary_rhs(args)?;
                if needs_mul(graph, op) {
                    Ok(format!("mul({lhs},{rhs})"))
                } else {
                    Ok(format!("{lhs} * {rhs}"))
                }
            }
            Operator::Add | Operator::Subtract | Operator::Divide | Operator::Compare(_) => {
                let symbol = op.operator.symbol().ok_or_else(|| {
                    GenerateError::unsupported("operation", "operator has no infix symbol")
                })?;
                let rhs = binary_rhs(args)?;
                Ok(format!("{lhs} {symbol} {rhs}"))
            }
            Operator::Not => Ok(format!("!{lhs}")),
            Operator::Cast(ty) => {
                let ty = self.type_name(*ty)?;
                Ok(format!("({ty}){lhs}"))
            }
            Operator::Sampler2D { filter } => {
                let rhs = binary_rhs(args)?;
                let selector = match filter {
                    SamplerFilter::Linear => 0,
                    SamplerFilter::Nearest => 1,
                };
                Ok(format!("Sample({lhs}, {selector}, {rhs})"))
            }
            Operator::Lerp { .. } => {
                let rhs = binary_rhs(args)?;
                let factor = lerp_factor(args)?;
                Ok(format!("lerp({lhs}, {rhs}, {factor})"))
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

    fn default_position_expr(&self, mvp: &str, position: &str, float4: &str) -> String {
        format!("mul({mvp},{float4}({position},1.0))")
    }

    fn discard_statement(&self) -> &'static str {
        "discard"
    }

    fn sampler_size_statement(&self, target: &str, texture: &str) -> String {
        format!("{texture}.GetDimensions({target}.x, {target}.y);")
    }

    fn array_literal(&self, _element_type: &str, items: &[String]) -> String {
        format!("{{{}}}", items.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_shader_graph::ShaderGraph;

    #[test]
    fn type_table_is_total() {
        let g = HlslCodeGenerator::new();
        for ty in [
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
            ValueType::Float4x4Array(4),
            ValueType::Texture2D,
        ] {
            g.type_name(ty).expect("concrete type must map");
        }
        assert!(g.type_name(ValueType::Operation).is_err());
    }

    #[test]
    fn matrix_operands_promote_to_mul() {
        let mut graph = ShaderGraph::new();
        let m = graph.add_node(ValueRepr::UniformModelMatrix, ValueType::Float4x4);
        let v = graph.vec4_const(0.0, 0.0, 0.0, 1.0);
        let product = graph.multiply(m, v);
        let ValueRepr::Operation(op) = &graph.node(product).repr else {
            panic!("expected an operation node");
        };
        assert!(needs_mul(&graph, op));

        let a = graph.scalar_float(2.0);
        let b = graph.scalar_float(3.0);
        let scalar_product = graph.multiply(a, b);
        let ValueRepr::Operation(op) = &graph.node(scalar_product).repr else {
            panic!("expected an operation node");
        };
        assert!(!needs_mul(&graph, op));
    }

    #[test]
    fn mat4_array_elements_promote_to_mul() {
        let mut graph = ShaderGraph::new();
        let bones = graph.add_node(
            ValueRepr::UniformCustom {
                name: "bones".to_owned(),
                ty: ember_shader_graph::UniformType::Mat4Array(4),
            },
            ValueType::Float4x4Array(4),
        );
        let index = graph.scalar_int(0);
        let bone = graph.mat4_array_value(bones, index);
        let v = graph.vec4_const(0.0, 0.0, 0.0, 1.0);
        let product = graph.multiply(bone, v);
        let ValueRepr::Operation(op) = &graph.node(product).repr else {
            panic!("expected an operation node");
        };
        assert!(needs_mul(&graph, op));
    }
}
