//! MSL source generation (Metal).
//!
//! Metal compiles both stages into one library, so the generator emits a
//! single source string with two entry points. Entry names are suffixed
//! with the owning document's id so multiple shader-pair variants can
//! coexist in one compiled library without name collisions.

use std::collections::BTreeMap;

use ember_shader_graph::{
    FragmentShader, Operation, Operator, SamplerFilter, ShaderGraph, ValueRepr, ValueType,
    VertexShader,
};
use tracing::debug;

use crate::emit::{self, binary_rhs, lerp_factor, CodeEmitter, InputAttribute, OperationArgs};
use crate::error::GenerateError;
use crate::writer::SourceWriter;

/// Generates combined MSL source for a shader document pair.
#[derive(Debug, Clone, Copy, Default)]
pub struct MslCodeGenerator;

/// Per-call emitter: MSL addresses custom uniforms positionally inside
/// the argument-buffer `Uniforms` struct, so references need the merged
/// name → slot table of the documents being generated.
struct MslEmitter {
    uniform_slots: BTreeMap<String, usize>,
}

/// The merged custom uniforms of both documents, in the shared
/// case-insensitive name order that fixes each uniform's slot.
fn merge_uniforms<'a>(
    vertex_shader: &'a VertexShader,
    fragment_shader: &'a FragmentShader,
) -> Result<Vec<(&'a str, ValueType)>, GenerateError> {
    let mut merged: Vec<(&str, ValueType)> = Vec::new();
    let vertex = vertex_shader
        .sorted_custom_uniforms()
        .into_iter()
        .map(|(name, id)| (name, vertex_shader.graph.value_type(id)));
    let fragment = fragment_shader
        .sorted_custom_uniforms()
        .into_iter()
        .map(|(name, id)| (name, fragment_shader.graph.value_type(id)));
    for (name, ty) in vertex.chain(fragment) {
        match merged.iter().find(|(existing, _)| *existing == name) {
            Some((_, existing_ty)) if *existing_ty != ty => {
                return Err(GenerateError::UniformConflict {
                    name: name.to_owned(),
                })
            }
            Some(_) => {}
            None => merged.push((name, ty)),
        }
    }
    merged.sort_by(|a, b| {
        let al = a.0.to_ascii_lowercase();
        let bl = b.0.to_ascii_lowercase();
        al.cmp(&bl).then_with(|| a.0.cmp(b.0))
    });
    Ok(merged)
}

impl MslCodeGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Generates one source string containing both entry points, named
    /// `vertex<id>` / `fragment<id>` after the respective document.
    pub fn generate_shader_code(
        &self,
        vertex_shader: &VertexShader,
        fragment_shader: &FragmentShader,
        attributes: &[InputAttribute],
    ) -> Result<String, GenerateError> {
        emit::validate_linkage(vertex_shader, fragment_shader)?;
        debug!(
            vertex = %vertex_shader.id(),
            fragment = %fragment_shader.id(),
            attributes = attributes.len(),
            "generating MSL shader pair"
        );

        let uniforms = merge_uniforms(vertex_shader, fragment_shader)?;
        let emitter = MslEmitter {
            uniform_slots: uniforms
                .iter()
                .enumerate()
                .map(|(slot, (name, _))| ((*name).to_owned(), slot))
                .collect(),
        };

        let vertex_main = emit::generate_vertex_main(&emitter, vertex_shader)?;
        let fragment_main = emit::generate_fragment_main(&emitter, fragment_shader)?;

        let mut w = SourceWriter::new();
        w.line("#include <metal_stdlib>");
        w.line("#include <simd/simd.h>");
        w.line("using namespace metal;");
        w.blank();
        w.line("typedef struct {");
        w.indent();
        w.line("float2 scale;");
        w.line("float2 offset;");
        w.line("float4 color;");
        w.line("int sampleFilter;");
        w.dedent();
        w.line("} Material;");
        w.line("typedef struct {");
        w.indent();
        w.line("float4x4 pMtx;");
        w.line("float4x4 vMtx;");
        for (slot, (_, ty)) in uniforms.iter().enumerate() {
            match ty {
                ValueType::Float4x4Array(capacity) => {
                    w.line(&format!("float4x4 u{slot}[{capacity}];"));
                }
                ty => {
                    let ty = emitter.type_name(*ty)?;
                    w.line(&format!("{ty} u{slot};"));
                }
            }
        }
        w.dedent();
        w.line("} Uniforms;");
        w.line("typedef struct {");
        w.indent();
        w.line("float4x4 mMtx;");
        w.line("float4x4 iMMtx;");
        w.dedent();
        w.line("} InstanceUniforms;");
        w.line("typedef struct {");
        w.indent();
        for (location, attribute) in attributes.iter().enumerate() {
            let ty = emitter.type_name(attribute.value_type())?;
            let field = attribute_field(*attribute);
            w.line(&format!("{ty} {field} [[attribute({location})]];"));
        }
        w.dedent();
        w.line("} Vertex;");
        w.line("typedef struct {");
        w.indent();
        w.line("float4 pos [[position]];");
        w.line("float ptSz [[point_size]];");
        for (name, id) in vertex_shader.outputs() {
            let ty = emitter.type_name(vertex_shader.graph.value_type(id))?;
            w.line(&format!("{ty} {name};"));
        }
        w.line("int iid [[flat]];");
        w.dedent();
        w.line("} Fragment;");
        w.blank();

        let buffer_base = attributes.len();
        w.line(&format!(
            "vertex Fragment vertex{}(Vertex in [[stage_in]],",
            vertex_shader.id()
        ));
        w.indent();
        w.line(&format!(
            "constant Uniforms & uniforms [[ buffer({buffer_base}) ]],"
        ));
        w.line(&format!(
            "constant InstanceUniforms *instances [[ buffer({}) ]],",
            buffer_base + 1
        ));
        w.line(&format!(
            "constant Material *materials [[ buffer({}) ]],",
            buffer_base + 2
        ));
        w.line("sampler linearSampler [[ sampler(0) ]],");
        w.line("sampler nearestSampler [[ sampler(1) ]],");
        w.line("ushort uiid [[instance_id]]) {");
        w.line("int iid = uiid;");
        w.line("Fragment out;");
        w.line("out.iid = iid;");
        w.dedent();
        w.raw(&vertex_main);
        w.indent();
        w.line("return out;");
        w.dedent();
        w.line("}");

        w.line(&format!(
            "fragment float4 fragment{}(Fragment in [[stage_in]],",
            fragment_shader.id()
        ));
        w.indent();
        w.line("constant Uniforms & uniforms [[ buffer(0) ]],");
        w.line("constant Material *materials [[ buffer(1) ]],");
        w.line("sampler linearSampler [[ sampler(0) ]],");
        w.line("sampler nearestSampler [[ sampler(1) ]],");
        for (index, _) in fragment_shader.channels().iter().enumerate() {
            let comma = if index + 1 == fragment_shader.channels().len() {
                ") {"
            } else {
                ","
            };
            w.line(&format!(
                "texture2d<float> tex{index} [[ texture({index}) ]]{comma}"
            ));
        }
        w.line("float4 fClr;");
        w.dedent();
        w.raw(&fragment_main);
        w.indent();
        w.line("return fClr;");
        w.dedent();
        w.line("}");
        Ok(w.finish())
    }
}

fn attribute_field(attribute: InputAttribute) -> String {
    let geometry = attribute.geometry_index();
    match attribute {
        InputAttribute::VertexInPosition { .. } => format!("pos{geometry}"),
        InputAttribute::VertexInTexCoord0 { .. } => format!("uv{geometry}_0"),
        InputAttribute::VertexInTexCoord1 { .. } => format!("uv{geometry}_1"),
        InputAttribute::VertexInNormal { .. } => format!("nml{geometry}"),
        InputAttribute::VertexInTangent { .. } => format!("tan{geometry}"),
        InputAttribute::VertexInColor { .. } => format!("clr{geometry}"),
        InputAttribute::VertexInJointIndices { .. } => format!("jtIdx{geometry}"),
        InputAttribute::VertexInJointWeights { .. } => format!("jtWeit{geometry}"),
    }
}

impl CodeEmitter for MslEmitter {
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
            ValueType::Texture2D => Ok("texture2d<float>"),
            ValueType::Operation => Err(GenerateError::UntypedValue),
        }
    }

    fn reference(&self, repr: &ValueRepr) -> Result<String, GenerateError> {
        match repr {
            ValueRepr::VertexInPosition(i) => Ok(format!("in.pos{i}")),
            ValueRepr::VertexInTexCoord0(i) => Ok(format!("in.uv{i}_0")),
            ValueRepr::VertexInTexCoord1(i) => Ok(format!("in.uv{i}_1")),
            ValueRepr::VertexInNormal(i) => Ok(format!("in.nml{i}")),
            ValueRepr::VertexInTangent(i) => Ok(format!("in.tan{i}")),
            ValueRepr::VertexInColor(i) => Ok(format!("in.clr{i}")),
            ValueRepr::VertexInJointIndices(i) => Ok(format!("in.jtIdx{i}")),
            ValueRepr::VertexInJointWeights(i) => Ok(format!("in.jtWeit{i}")),
            ValueRepr::VertexOutPosition => Ok("out.pos".to_owned()),
            ValueRepr::VertexOutPointSize => Ok("out.ptSz".to_owned()),
            ValueRepr::VertexOut(name) => Ok(format!("out.{name}")),
            ValueRepr::VertexInstanceId => Ok("iid".to_owned()),
            ValueRepr::FragmentIn(name) => Ok(format!("in.{name}")),
            ValueRepr::FragmentOutColor => Ok("fClr".to_owned()),
            ValueRepr::FragmentInstanceId => Ok("in.iid".to_owned()),
            ValueRepr::FragmentPosition => Ok("in.pos".to_owned()),
            ValueRepr::UniformModelMatrix => Ok("instances[iid].mMtx".to_owned()),
            ValueRepr::UniformViewMatrix => Ok("uniforms.vMtx".to_owned()),
            ValueRepr::UniformProjectionMatrix => Ok("uniforms.pMtx".to_owned()),
            ValueRepr::UniformCustom { name, .. } => match self.uniform_slots.get(name) {
                Some(slot) => Ok(format!("uniforms.u{slot}")),
                None => Err(GenerateError::unsupported(
                    "uniformCustom",
                    "custom uniform missing from the merged uniform table",
                )),
            },
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
            Operator::Sampler2D { filter } => {
                let rhs = binary_rhs(args)?;
                let sampler = match filter {
                    SamplerFilter::Linear => "linearSampler",
                    SamplerFilter::Nearest => "nearestSampler",
                };
                Ok(format!("{lhs}.sample({sampler},{rhs})"))
            }
            Operator::Lerp { .. } => {
                let rhs = binary_rhs(args)?;
                let factor = lerp_factor(args)?;
                Ok(format!("mix({lhs}, {rhs}, {factor})"))
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
        "discard_fragment()"
    }

    fn sampler_size_statement(&self, target: &str, texture: &str) -> String {
        format!("{target} = float2({texture}.get_width(), {texture}.get_height());")
    }

    fn array_literal(&self, _element_type: &str, items: &[String]) -> String {
        format!("{{{}}}", items.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_shader_graph::UniformType;

    #[test]
    fn type_table_is_total() {
        let e = MslEmitter {
            uniform_slots: BTreeMap::new(),
        };
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
            ValueType::Float4x4Array(2),
            ValueType::Texture2D,
        ] {
            e.type_name(ty).expect("concrete type must map");
        }
        assert!(e.type_name(ValueType::Operation).is_err());
    }

    #[test]
    fn merged_uniforms_sort_case_insensitively_across_documents() {
        let mut vsh = VertexShader::new();
        let mut fsh = FragmentShader::new();
        vsh.custom_uniform("zeta", UniformType::Float);
        fsh.custom_uniform("Alpha", UniformType::Vec2);
        fsh.custom_uniform("zeta", UniformType::Float);
        let merged = merge_uniforms(&vsh, &fsh).expect("merge");
        let names: Vec<&str> = merged.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, ["Alpha", "zeta"]);
    }

    #[test]
    fn conflicting_uniform_types_are_rejected() {
        let mut vsh = VertexShader::new();
        let mut fsh = FragmentShader::new();
        vsh.custom_uniform("strength", UniformType::Float);
        fsh.custom_uniform("strength", UniformType::Vec4);
        assert_eq!(
            merge_uniforms(&vsh, &fsh),
            Err(GenerateError::UniformConflict {
                name: "strength".to_owned()
            })
        );
    }
}
