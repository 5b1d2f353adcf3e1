//! The shared, language-independent emission engine.
//!
//! The three generators plug into this engine through [`CodeEmitter`],
//! which carries the per-target mappings (type keywords, binding
//! reference syntax, operator/intrinsic spellings). Everything else is
//! shared: dependency-ordered declaration emission over the node graph,
//! single-assignment caching by node identity, the statement shapes for
//! branch/switch/discard, main-body assembly for both stages, and
//! vertex/fragment linkage validation.

use std::collections::{BTreeMap, BTreeSet};

use ember_shader_graph::{
    FragmentShader, NodeId, Operation, Operator, ShaderGraph, ValueRepr, ValueType, VertexShader,
};

use crate::error::GenerateError;
use crate::writer::SourceWriter;

/// One vertex-buffer attribute in the caller's vertex layout, in buffer
/// order. The attribute's position in the list is its binding location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputAttribute {
    VertexInPosition { geometry_index: u8 },
    VertexInTexCoord0 { geometry_index: u8 },
    VertexInTexCoord1 { geometry_index: u8 },
    VertexInNormal { geometry_index: u8 },
    VertexInTangent { geometry_index: u8 },
    VertexInColor { geometry_index: u8 },
    VertexInJointIndices { geometry_index: u8 },
    VertexInJointWeights { geometry_index: u8 },
}

impl InputAttribute {
    /// The semantic type of the attribute's data.
    pub fn value_type(self) -> ValueType {
        match self {
            InputAttribute::VertexInPosition { .. }
            | InputAttribute::VertexInNormal { .. }
            | InputAttribute::VertexInTangent { .. } => ValueType::Float3,
            InputAttribute::VertexInTexCoord0 { .. }
            | InputAttribute::VertexInTexCoord1 { .. } => ValueType::Float2,
            InputAttribute::VertexInColor { .. }
            | InputAttribute::VertexInJointWeights { .. } => ValueType::Float4,
            InputAttribute::VertexInJointIndices { .. } => ValueType::UInt4,
        }
    }

    /// The geometry stream the attribute belongs to.
    pub fn geometry_index(self) -> u8 {
        match self {
            InputAttribute::VertexInPosition { geometry_index }
            | InputAttribute::VertexInTexCoord0 { geometry_index }
            | InputAttribute::VertexInTexCoord1 { geometry_index }
            | InputAttribute::VertexInNormal { geometry_index }
            | InputAttribute::VertexInTangent { geometry_index }
            | InputAttribute::VertexInColor { geometry_index }
            | InputAttribute::VertexInJointIndices { geometry_index }
            | InputAttribute::VertexInJointWeights { geometry_index } => geometry_index,
        }
    }
}

/// A resolved operand handed to [`CodeEmitter::operation_expr`]: its
/// use-site text plus its semantic type.
pub struct OperandInfo {
    pub text: String,
    pub ty: ValueType,
}

/// The pre-resolved operands of one operation.
pub struct OperationArgs {
    pub lhs: OperandInfo,
    pub rhs: Option<OperandInfo>,
    /// The `lerp` factor, when the operator carries one.
    pub extra: Option<OperandInfo>,
}

/// The per-target extension points of the emission engine.
pub trait CodeEmitter {
    /// The target keyword for a semantic type. Total over the concrete
    /// types; [`ValueType::Operation`] is a typed error.
    fn type_name(&self, ty: ValueType) -> Result<&'static str, GenerateError>;

    /// The access expression for a leaf binding (stage I/O, uniform,
    /// material channel). Composite and operation nodes never reach this
    /// hook; they are cached under fresh variable names by the engine.
    fn reference(&self, repr: &ValueRepr) -> Result<String, GenerateError>;

    /// The right-hand-side expression for an expression-shaped operator.
    /// Statement-shaped operators (branch, switch, discard, texture size)
    /// are assembled by the engine and never reach this hook.
    fn operation_expr(
        &self,
        graph: &ShaderGraph,
        op: &Operation,
        args: &OperationArgs,
    ) -> Result<String, GenerateError>;

    /// The default clip-space position expression used when a document
    /// binds no custom position: the model-view-projection chain applied
    /// to geometry stream 0. HLSL overrides this to lower the matrix
    /// product through `mul()`.
    fn default_position_expr(&self, mvp: &str, position: &str, float4: &str) -> String {
        format!("{mvp} * {float4}({position},1.0)")
    }

    /// The fragment-kill statement, without the trailing semicolon.
    fn discard_statement(&self) -> &'static str;

    /// A full statement assigning the dimensions of `texture` to the
    /// already-declared `target` variable.
    fn sampler_size_statement(&self, target: &str, texture: &str) -> String;

    /// An array initializer expression over already-declared elements.
    fn array_literal(&self, element_type: &str, items: &[String]) -> String;
}

/// Per-stage scratch state: the fresh-name counter, the node-identity →
/// variable-name cache and the set of already-declared nodes.
///
/// A fresh context is created for every stage-generation call, so node
/// identities never collide or short-circuit across stages.
pub struct EmissionContext {
    next_var: u32,
    var_names: BTreeMap<NodeId, String>,
    declared: BTreeSet<NodeId>,
}

impl EmissionContext {
    pub fn new() -> Self {
        Self {
            next_var: 1,
            var_names: BTreeMap::new(),
            declared: BTreeSet::new(),
        }
    }

    /// The variable name assigned to `id`, allocating `v1`, `v2`, ... on
    /// first request.
    pub fn var_name(&mut self, id: NodeId) -> String {
        if let Some(name) = self.var_names.get(&id) {
            return name.clone();
        }
        let name = format!("v{}", self.next_var);
        self.next_var += 1;
        self.var_names.insert(id, name.clone());
        name
    }
}

impl Default for EmissionContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Formats a float literal so every target parses it as floating point.
pub(crate) fn float_literal(value: f32) -> String {
    if value.is_finite() && value == value.trunc() {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

/// The use-site text for a node: literals inline, composites and
/// operations by their cached variable name, component accessors as
/// subscripts, leaf bindings through the emitter's reference syntax.
pub(crate) fn value_text<E: CodeEmitter + ?Sized>(
    emitter: &E,
    graph: &ShaderGraph,
    ctx: &mut EmissionContext,
    id: NodeId,
) -> Result<String, GenerateError> {
    let node = graph.node(id);
    match &node.repr {
        ValueRepr::ScalarBool(value) => Ok(value.to_string()),
        ValueRepr::ScalarInt(value) => Ok(value.to_string()),
        ValueRepr::ScalarUInt(value) => Ok(format!("{value}u")),
        ValueRepr::ScalarFloat(value) => Ok(float_literal(*value)),
        ValueRepr::Vec2 { .. }
        | ValueRepr::Vec3 { .. }
        | ValueRepr::Vec4 { .. }
        | ValueRepr::UVec4 { .. }
        | ValueRepr::Mat4 { .. }
        | ValueRepr::Mat4Array { .. }
        | ValueRepr::Operation(_) => Ok(ctx.var_name(id)),
        ValueRepr::Vec2Value { vector, index }
        | ValueRepr::Vec3Value { vector, index }
        | ValueRepr::Vec4Value { vector, index }
        | ValueRepr::UVec4Value { vector, index } => {
            let vector = value_text(emitter, graph, ctx, *vector)?;
            let index = value_text(emitter, graph, ctx, *index)?;
            Ok(format!("{vector}[{index}]"))
        }
        ValueRepr::Mat4ArrayValue { array, index } => {
            let array = value_text(emitter, graph, ctx, *array)?;
            let index = value_text(emitter, graph, ctx, *index)?;
            Ok(format!("{array}[{index}]"))
        }
        repr => emitter.reference(repr),
    }
}

fn operand_info<E: CodeEmitter + ?Sized>(
    emitter: &E,
    graph: &ShaderGraph,
    ctx: &mut EmissionContext,
    id: NodeId,
) -> Result<OperandInfo, GenerateError> {
    Ok(OperandInfo {
        text: value_text(emitter, graph, ctx, id)?,
        ty: graph.value_type(id),
    })
}

/// Emits the declaration for `id` (and, recursively, everything it
/// depends on) unless the node was already declared in this context.
pub(crate) fn declare_value<E: CodeEmitter + ?Sized>(
    emitter: &E,
    graph: &ShaderGraph,
    ctx: &mut EmissionContext,
    w: &mut SourceWriter,
    id: NodeId,
) -> Result<(), GenerateError> {
    if !ctx.declared.insert(id) {
        return Ok(());
    }
    // Clone keeps the borrow checker away from the recursive calls; node
    // payloads are a handful of ids.
    let repr = graph.node(id).repr.clone();
    match repr {
        ValueRepr::ScalarBool(_)
        | ValueRepr::ScalarInt(_)
        | ValueRepr::ScalarUInt(_)
        | ValueRepr::ScalarFloat(_) => Ok(()),

        ValueRepr::Vec2 { x, y } => declare_composite(emitter, graph, ctx, w, id, &[x, y]),
        ValueRepr::Vec3 { x, y, z } => declare_composite(emitter, graph, ctx, w, id, &[x, y, z]),
        ValueRepr::Vec4 { x, y, z, w: ww } => {
            declare_composite(emitter, graph, ctx, w, id, &[x, y, z, ww])
        }
        ValueRepr::UVec4 { x, y, z, w: ww } => {
            declare_composite(emitter, graph, ctx, w, id, &[x, y, z, ww])
        }
        ValueRepr::Mat4 { columns } => declare_composite(emitter, graph, ctx, w, id, &columns),
        ValueRepr::Mat4Array { elements } => {
            let mut items = Vec::with_capacity(elements.len());
            for &element in &elements {
                declare_value(emitter, graph, ctx, w, element)?;
            }
            for &element in &elements {
                items.push(value_text(emitter, graph, ctx, element)?);
            }
            let ty = emitter.type_name(graph.value_type(id))?;
            let var = ctx.var_name(id);
            let init = emitter.array_literal(ty, &items);
            w.line(&format!("{ty} {var}[{}] = {init};", items.len()));
            Ok(())
        }

        ValueRepr::Vec2Value { vector, index }
        | ValueRepr::Vec3Value { vector, index }
        | ValueRepr::Vec4Value { vector, index }
        | ValueRepr::UVec4Value { vector, index } => {
            declare_value(emitter, graph, ctx, w, vector)?;
            declare_value(emitter, graph, ctx, w, index)
        }
        ValueRepr::Mat4ArrayValue { array, index } => {
            declare_value(emitter, graph, ctx, w, array)?;
            declare_value(emitter, graph, ctx, w, index)
        }

        ValueRepr::Operation(op) => declare_operation(emitter, graph, ctx, w, id, &op),

        // Stage I/O, uniforms and material channels are direct references
        // to fixed external bindings; they are inlined at use sites.
        _ => Ok(()),
    }
}

fn declare_composite<E: CodeEmitter + ?Sized>(
    emitter: &E,
    graph: &ShaderGraph,
    ctx: &mut EmissionContext,
    w: &mut SourceWriter,
    id: NodeId,
    components: &[NodeId],
) -> Result<(), GenerateError> {
    for &component in components {
        declare_value(emitter, graph, ctx, w, component)?;
    }
    let mut parts = Vec::with_capacity(components.len());
    for &component in components {
        parts.push(value_text(emitter, graph, ctx, component)?);
    }
    let ty = emitter.type_name(graph.value_type(id))?;
    let var = ctx.var_name(id);
    w.line(&format!("{ty} {var} = {ty}({});", parts.join(",")));
    Ok(())
}

fn declare_operation<E: CodeEmitter + ?Sized>(
    emitter: &E,
    graph: &ShaderGraph,
    ctx: &mut EmissionContext,
    w: &mut SourceWriter,
    id: NodeId,
    op: &Operation,
) -> Result<(), GenerateError> {
    match &op.operator {
        Operator::Add
        | Operator::Subtract
        | Operator::Multiply
        | Operator::Divide
        | Operator::Compare(_)
        | Operator::Not
        | Operator::Cast(_)
        | Operator::Sampler2D { .. }
        | Operator::Distance
        | Operator::Lerp { .. } => {
            declare_value(emitter, graph, ctx, w, op.lhs)?;
            if let Some(rhs) = op.rhs {
                declare_value(emitter, graph, ctx, w, rhs)?;
            }
            if let Operator::Lerp { factor } = &op.operator {
                declare_value(emitter, graph, ctx, w, *factor)?;
            }

            let lhs = operand_info(emitter, graph, ctx, op.lhs)?;
            let rhs = match op.rhs {
                Some(rhs) => Some(operand_info(emitter, graph, ctx, rhs)?),
                None => None,
            };
            let extra = match &op.operator {
                Operator::Lerp { factor } => Some(operand_info(emitter, graph, ctx, *factor)?),
                _ => None,
            };
            let args = OperationArgs { lhs, rhs, extra };

            let expr = emitter.operation_expr(graph, op, &args)?;
            let ty = emitter.type_name(graph.value_type(id))?;
            let var = ctx.var_name(id);
            w.line(&format!("{ty} {var} = {expr};"));
            Ok(())
        }

        Operator::Branch { comparing } => {
            let comparing = *comparing;
            declare_value(emitter, graph, ctx, w, comparing)?;
            let ty = emitter.type_name(graph.value_type(id))?;
            let var = ctx.var_name(id);
            let comparing = value_text(emitter, graph, ctx, comparing)?;
            w.line(&format!("{ty} {var};"));
            w.line(&format!("if ({comparing}) {{"));
            w.indent();
            declare_value(emitter, graph, ctx, w, op.lhs)?;
            let success = value_text(emitter, graph, ctx, op.lhs)?;
            w.line(&format!("{var} = {success};"));
            w.dedent();
            w.line("} else {");
            w.indent();
            let failure_id = op
                .rhs
                .ok_or_else(|| GenerateError::unsupported_node(id, "operation", "branch without a failure operand"))?;
            declare_value(emitter, graph, ctx, w, failure_id)?;
            let failure = value_text(emitter, graph, ctx, failure_id)?;
            w.line(&format!("{var} = {failure};"));
            w.dedent();
            w.line("}");
            Ok(())
        }

        Operator::Switch { cases } => {
            declare_value(emitter, graph, ctx, w, op.lhs)?;
            for case in cases {
                declare_value(emitter, graph, ctx, w, case.compare)?;
            }
            let ty = emitter.type_name(graph.value_type(id))?;
            let var = ctx.var_name(id);
            let scrutinee = value_text(emitter, graph, ctx, op.lhs)?;
            w.line(&format!("{ty} {var};"));
            w.line(&format!("switch ({scrutinee}) {{"));
            w.indent();
            for case in cases {
                let compare = value_text(emitter, graph, ctx, case.compare)?;
                w.line(&format!("case {compare}: {{"));
                w.indent();
                declare_value(emitter, graph, ctx, w, case.result)?;
                let result = value_text(emitter, graph, ctx, case.result)?;
                w.line(&format!("{var} = {result};"));
                w.line("break;");
                w.dedent();
                w.line("}");
            }
            w.dedent();
            w.line("}");
            Ok(())
        }

        Operator::Discard { comparing } => {
            let comparing = *comparing;
            declare_value(emitter, graph, ctx, w, comparing)?;
            declare_value(emitter, graph, ctx, w, op.lhs)?;
            let ty = emitter.type_name(graph.value_type(id))?;
            let var = ctx.var_name(id);
            let value = value_text(emitter, graph, ctx, op.lhs)?;
            let comparing = value_text(emitter, graph, ctx, comparing)?;
            w.line(&format!("{ty} {var} = {value};"));
            w.line(&format!("if ({comparing}) {{"));
            w.indent();
            w.line(&format!("{};", emitter.discard_statement()));
            w.dedent();
            w.line("}");
            Ok(())
        }

        Operator::Sampler2DSize => {
            declare_value(emitter, graph, ctx, w, op.lhs)?;
            let ty = emitter.type_name(graph.value_type(id))?;
            let var = ctx.var_name(id);
            let texture = value_text(emitter, graph, ctx, op.lhs)?;
            w.line(&format!("{ty} {var};"));
            w.line(&emitter.sampler_size_statement(&var, &texture));
            Ok(())
        }
    }
}

/// The second operand of a binary operator; absent only on malformed
/// graphs built through the raw node API.
pub(crate) fn binary_rhs(args: &OperationArgs) -> Result<&str, GenerateError> {
    args.rhs
        .as_ref()
        .map(|operand| operand.text.as_str())
        .ok_or_else(|| GenerateError::unsupported("operation", "binary operator missing an operand"))
}

/// The factor operand of a lerp.
pub(crate) fn lerp_factor(args: &OperationArgs) -> Result<&str, GenerateError> {
    args.extra
        .as_ref()
        .map(|operand| operand.text.as_str())
        .ok_or_else(|| GenerateError::unsupported("operation", "lerp missing its factor"))
}

/// Checks the shader-linkage invariant: every varying the fragment shader
/// reads must be written by the vertex shader. Runs before any text is
/// generated.
pub fn validate_linkage(
    vertex_shader: &VertexShader,
    fragment_shader: &FragmentShader,
) -> Result<(), GenerateError> {
    let written: BTreeSet<&str> = vertex_shader.outputs().map(|(name, _)| name).collect();
    let required: BTreeSet<&str> = fragment_shader.inputs().map(|(name, _)| name).collect();
    for name in required {
        if !written.contains(name) {
            return Err(GenerateError::Linkage {
                varying: name.to_owned(),
            });
        }
    }
    Ok(())
}

/// Assembles the vertex-stage function body: declarations in dependency
/// order, then the output-binding assignments.
pub(crate) fn generate_vertex_main<E: CodeEmitter + ?Sized>(
    emitter: &E,
    vertex_shader: &VertexShader,
) -> Result<String, GenerateError> {
    let graph = &vertex_shader.graph;
    let mut ctx = EmissionContext::new();
    let mut w = SourceWriter::with_depth(1);
    let mut statements: Vec<String> = Vec::new();

    let out_position = emitter.reference(&ValueRepr::VertexOutPosition)?;
    if let Some(position) = vertex_shader.position() {
        declare_value(emitter, graph, &mut ctx, &mut w, position)?;
        let position = value_text(emitter, graph, &mut ctx, position)?;
        statements.push(format!("{out_position} = {position};"));
    } else {
        // No custom position: transform geometry stream 0 by the default
        // model-view-projection chain.
        let mvp = vertex_shader.model_view_projection_matrix();
        declare_value(emitter, graph, &mut ctx, &mut w, mvp)?;
        let mvp = value_text(emitter, graph, &mut ctx, mvp)?;
        let position0 = value_text(
            emitter,
            graph,
            &mut ctx,
            vertex_shader.geometries()[0].position,
        )?;
        let float4 = emitter.type_name(ValueType::Float4)?;
        let expr = emitter.default_position_expr(&mvp, &position0, float4);
        statements.push(format!("{out_position} = {expr};"));
    }

    if let Some(point_size) = vertex_shader.point_size() {
        declare_value(emitter, graph, &mut ctx, &mut w, point_size)?;
        let point_size = value_text(emitter, graph, &mut ctx, point_size)?;
        let out_point_size = emitter.reference(&ValueRepr::VertexOutPointSize)?;
        statements.push(format!("{out_point_size} = {point_size};"));
    }

    for (name, value) in vertex_shader.outputs() {
        declare_value(emitter, graph, &mut ctx, &mut w, value)?;
        let value = value_text(emitter, graph, &mut ctx, value)?;
        let target = emitter.reference(&ValueRepr::VertexOut(name.to_owned()))?;
        statements.push(format!("{target} = {value};"));
    }

    let mut out = w.finish();
    for statement in statements {
        out.push_str("    ");
        out.push_str(&statement);
        out.push('\n');
    }
    Ok(out)
}

/// Assembles the fragment-stage function body.
pub(crate) fn generate_fragment_main<E: CodeEmitter + ?Sized>(
    emitter: &E,
    fragment_shader: &FragmentShader,
) -> Result<String, GenerateError> {
    let graph = &fragment_shader.graph;
    let mut ctx = EmissionContext::new();
    let mut w = SourceWriter::with_depth(1);
    let mut statements: Vec<String> = Vec::new();

    let out_color = emitter.reference(&ValueRepr::FragmentOutColor)?;
    if let Some(color) = fragment_shader.color() {
        declare_value(emitter, graph, &mut ctx, &mut w, color)?;
        let color = value_text(emitter, graph, &mut ctx, color)?;
        statements.push(format!("{out_color} = {color};"));
    } else {
        // Unbound color renders opaque mid-gray.
        let float4 = emitter.type_name(ValueType::Float4)?;
        statements.push(format!("{out_color} = {float4}(0.5,0.5,0.5,1.0);"));
    }

    let mut out = w.finish();
    for statement in statements {
        out.push_str("    ");
        out.push_str(&statement);
        out.push('\n');
    }
    Ok(out)
}
