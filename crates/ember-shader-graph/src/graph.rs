//! The shader value graph and its builder API.

use crate::arena::{NodeArena, NodeId};
use crate::node::{Node, Operation, Operator, SwitchCase, ValueRepr};
use crate::types::{Comparison, SamplerFilter, ValueType};

/// A DAG of typed shader value nodes.
///
/// Nodes are appended through the builder methods, which compute and store
/// the result type of every node they create. Nodes are shared by
/// identity: passing the same [`NodeId`] to two consumers yields one
/// declaration in generated code.
#[derive(Debug, Clone, Default)]
pub struct ShaderGraph {
    nodes: NodeArena,
}

impl ShaderGraph {
    pub fn new() -> Self {
        Self {
            nodes: NodeArena::new(),
        }
    }

    /// Returns the number of nodes in the graph.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the graph contains no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Appends a raw node. The builder methods below are preferred; they
    /// compute the stored result type for you.
    pub fn add_node(&mut self, repr: ValueRepr, ty: ValueType) -> NodeId {
        self.nodes.append(Node { repr, ty })
    }

    /// Returns the node for `id`. Panics if the handle belongs to a
    /// different graph.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    /// The resolved semantic type of `id`.
    ///
    /// The stored type is authoritative for every builder-created node;
    /// raw nodes stored with [`ValueType::Operation`] are resolved by
    /// inspecting their producing operation.
    pub fn value_type(&self, id: NodeId) -> ValueType {
        let node = &self.nodes[id];
        match node.ty {
            ValueType::Operation => match &node.repr {
                ValueRepr::Operation(op) => self.operation_result_type(op),
                _ => node.ty,
            },
            ty => ty,
        }
    }

    fn operation_result_type(&self, op: &Operation) -> ValueType {
        match &op.operator {
            Operator::Compare(_) | Operator::Not => ValueType::Bool,
            Operator::Cast(ty) => *ty,
            Operator::Distance => ValueType::Float,
            Operator::Sampler2D { .. } => ValueType::Float4,
            Operator::Sampler2DSize => ValueType::Float2,
            Operator::Switch { cases } => match cases.first() {
                Some(case) => self.value_type(case.result),
                None => self.value_type(op.lhs),
            },
            Operator::Add | Operator::Subtract | Operator::Multiply | Operator::Divide => {
                let lhs = self.value_type(op.lhs);
                let rhs = op.rhs.map(|rhs| self.value_type(rhs)).unwrap_or(lhs);
                binary_result_type(&op.operator, lhs, rhs)
            }
            Operator::Branch { .. }
            | Operator::Discard { .. }
            | Operator::Lerp { .. } => self.value_type(op.lhs),
        }
    }

    // Scalar literals.

    pub fn scalar_bool(&mut self, value: bool) -> NodeId {
        self.add_node(ValueRepr::ScalarBool(value), ValueType::Bool)
    }

    pub fn scalar_int(&mut self, value: i32) -> NodeId {
        self.add_node(ValueRepr::ScalarInt(value), ValueType::Int)
    }

    pub fn scalar_uint(&mut self, value: u32) -> NodeId {
        self.add_node(ValueRepr::ScalarUInt(value), ValueType::UInt)
    }

    pub fn scalar_float(&mut self, value: f32) -> NodeId {
        self.add_node(ValueRepr::ScalarFloat(value), ValueType::Float)
    }

    // Composite constructors.

    pub fn vec2(&mut self, x: NodeId, y: NodeId) -> NodeId {
        self.add_node(ValueRepr::Vec2 { x, y }, ValueType::Float2)
    }

    pub fn vec3(&mut self, x: NodeId, y: NodeId, z: NodeId) -> NodeId {
        self.add_node(ValueRepr::Vec3 { x, y, z }, ValueType::Float3)
    }

    pub fn vec4(&mut self, x: NodeId, y: NodeId, z: NodeId, w: NodeId) -> NodeId {
        self.add_node(ValueRepr::Vec4 { x, y, z, w }, ValueType::Float4)
    }

    pub fn uvec4(&mut self, x: NodeId, y: NodeId, z: NodeId, w: NodeId) -> NodeId {
        self.add_node(ValueRepr::UVec4 { x, y, z, w }, ValueType::UInt4)
    }

    pub fn vec2_const(&mut self, x: f32, y: f32) -> NodeId {
        let x = self.scalar_float(x);
        let y = self.scalar_float(y);
        self.vec2(x, y)
    }

    pub fn vec3_const(&mut self, x: f32, y: f32, z: f32) -> NodeId {
        let x = self.scalar_float(x);
        let y = self.scalar_float(y);
        let z = self.scalar_float(z);
        self.vec3(x, y, z)
    }

    pub fn vec4_const(&mut self, x: f32, y: f32, z: f32, w: f32) -> NodeId {
        let x = self.scalar_float(x);
        let y = self.scalar_float(y);
        let z = self.scalar_float(z);
        let w = self.scalar_float(w);
        self.vec4(x, y, z, w)
    }

    pub fn uvec4_const(&mut self, x: u32, y: u32, z: u32, w: u32) -> NodeId {
        let x = self.scalar_uint(x);
        let y = self.scalar_uint(y);
        let z = self.scalar_uint(z);
        let w = self.scalar_uint(w);
        self.uvec4(x, y, z, w)
    }

    /// A `float4x4` from four `float4` column nodes.
    pub fn mat4(&mut self, columns: [NodeId; 4]) -> NodeId {
        self.add_node(ValueRepr::Mat4 { columns }, ValueType::Float4x4)
    }

    /// A fixed array of `float4x4` element nodes.
    pub fn mat4_array(&mut self, elements: Vec<NodeId>) -> NodeId {
        let capacity = elements.len() as u32;
        self.add_node(
            ValueRepr::Mat4Array { elements },
            ValueType::Float4x4Array(capacity),
        )
    }

    // Component-index accessors.

    pub fn vec2_value(&mut self, vector: NodeId, index: NodeId) -> NodeId {
        self.add_node(ValueRepr::Vec2Value { vector, index }, ValueType::Float)
    }

    pub fn vec3_value(&mut self, vector: NodeId, index: NodeId) -> NodeId {
        self.add_node(ValueRepr::Vec3Value { vector, index }, ValueType::Float)
    }

    pub fn vec4_value(&mut self, vector: NodeId, index: NodeId) -> NodeId {
        self.add_node(ValueRepr::Vec4Value { vector, index }, ValueType::Float)
    }

    pub fn uvec4_value(&mut self, vector: NodeId, index: NodeId) -> NodeId {
        self.add_node(ValueRepr::UVec4Value { vector, index }, ValueType::UInt)
    }

    pub fn mat4_array_value(&mut self, array: NodeId, index: NodeId) -> NodeId {
        self.add_node(
            ValueRepr::Mat4ArrayValue { array, index },
            ValueType::Float4x4,
        )
    }

    // Operations.

    fn binary(&mut self, operator: Operator, lhs: NodeId, rhs: NodeId) -> NodeId {
        let ty = binary_result_type(&operator, self.value_type(lhs), self.value_type(rhs));
        self.add_node(
            ValueRepr::Operation(Operation {
                operator,
                lhs,
                rhs: Some(rhs),
            }),
            ty,
        )
    }

    pub fn add(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.binary(Operator::Add, lhs, rhs)
    }

    pub fn subtract(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.binary(Operator::Subtract, lhs, rhs)
    }

    pub fn multiply(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.binary(Operator::Multiply, lhs, rhs)
    }

    pub fn divide(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.binary(Operator::Divide, lhs, rhs)
    }

    pub fn compare(&mut self, lhs: NodeId, comparison: Comparison, rhs: NodeId) -> NodeId {
        self.add_node(
            ValueRepr::Operation(Operation {
                operator: Operator::Compare(comparison),
                lhs,
                rhs: Some(rhs),
            }),
            ValueType::Bool,
        )
    }

    pub fn not(&mut self, value: NodeId) -> NodeId {
        self.add_node(
            ValueRepr::Operation(Operation {
                operator: Operator::Not,
                lhs: value,
                rhs: None,
            }),
            ValueType::Bool,
        )
    }

    pub fn cast(&mut self, value: NodeId, ty: ValueType) -> NodeId {
        self.add_node(
            ValueRepr::Operation(Operation {
                operator: Operator::Cast(ty),
                lhs: value,
                rhs: None,
            }),
            ty,
        )
    }

    /// `if (comparing) { success } else { failure }`.
    pub fn branch(&mut self, comparing: NodeId, success: NodeId, failure: NodeId) -> NodeId {
        let ty = self.value_type(success);
        self.add_node(
            ValueRepr::Operation(Operation {
                operator: Operator::Branch { comparing },
                lhs: success,
                rhs: Some(failure),
            }),
            ty,
        )
    }

    /// `switch (scrutinee)` selecting among case results. `cases` must be
    /// non-empty.
    pub fn switch_value(&mut self, scrutinee: NodeId, cases: Vec<SwitchCase>) -> NodeId {
        assert!(!cases.is_empty(), "switch requires at least one case");
        let ty = self.value_type(cases[0].result);
        self.add_node(
            ValueRepr::Operation(Operation {
                operator: Operator::Switch { cases },
                lhs: scrutinee,
                rhs: None,
            }),
            ty,
        )
    }

    /// Passes `value` through, discarding the fragment when `comparing`
    /// holds.
    pub fn discard_if(&mut self, comparing: NodeId, value: NodeId) -> NodeId {
        let ty = self.value_type(value);
        self.add_node(
            ValueRepr::Operation(Operation {
                operator: Operator::Discard { comparing },
                lhs: value,
                rhs: None,
            }),
            ty,
        )
    }

    /// Samples `texture` at `coordinates` with the given filter.
    pub fn sample(
        &mut self,
        texture: NodeId,
        coordinates: NodeId,
        filter: SamplerFilter,
    ) -> NodeId {
        self.add_node(
            ValueRepr::Operation(Operation {
                operator: Operator::Sampler2D { filter },
                lhs: texture,
                rhs: Some(coordinates),
            }),
            ValueType::Float4,
        )
    }

    /// The dimensions of `texture` in texels, as a `float2`.
    pub fn sample_size(&mut self, texture: NodeId) -> NodeId {
        self.add_node(
            ValueRepr::Operation(Operation {
                operator: Operator::Sampler2DSize,
                lhs: texture,
                rhs: None,
            }),
            ValueType::Float2,
        )
    }

    pub fn lerp(&mut self, from: NodeId, to: NodeId, factor: NodeId) -> NodeId {
        let ty = self.value_type(from);
        self.add_node(
            ValueRepr::Operation(Operation {
                operator: Operator::Lerp { factor },
                lhs: from,
                rhs: Some(to),
            }),
            ty,
        )
    }

    pub fn distance(&mut self, lhs: NodeId, rhs: NodeId) -> NodeId {
        self.add_node(
            ValueRepr::Operation(Operation {
                operator: Operator::Distance,
                lhs,
                rhs: Some(rhs),
            }),
            ValueType::Float,
        )
    }
}

/// The result type of an arithmetic operator over two operand types.
///
/// Mirrors the shapes the authoring API can construct: matrix by vector
/// yields the vector, matrix by matrix the matrix, scalar against vector
/// broadcasts to the vector, and anything else keeps the left type.
fn binary_result_type(operator: &Operator, lhs: ValueType, rhs: ValueType) -> ValueType {
    if matches!(operator, Operator::Multiply) {
        if lhs.is_matrix() && rhs.is_vector() {
            return rhs;
        }
        if lhs.is_matrix() && rhs.is_matrix() {
            return lhs;
        }
    }
    if lhs.is_scalar() && rhs.is_vector() {
        return rhs;
    }
    lhs
}
