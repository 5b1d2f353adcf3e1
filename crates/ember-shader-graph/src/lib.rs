//! The shader value graph of the ember engine.
//!
//! A shader program is authored as a DAG of typed value nodes (scalars,
//! vector/matrix composites, stage I/O and uniform references, operation
//! nodes) held in an arena and addressed by [`NodeId`]. A
//! [`VertexShader`]/[`FragmentShader`] document pair describes one shader
//! program's bindings over such graphs; the `ember-shader-gen` crate
//! turns a pair into GLSL, HLSL or MSL source text.
//!
//! Nodes are shared by identity: handing the same [`NodeId`] to several
//! outputs emits one declaration in generated code.

#![forbid(unsafe_code)]

mod arena;
mod document;
mod graph;
mod node;
mod types;

pub use crate::arena::{NodeArena, NodeId};
pub use crate::document::{
    DocumentId, FragmentShader, Geometry, MaterialChannel, VertexShader,
};
pub use crate::graph::ShaderGraph;
pub use crate::node::{Node, Operation, Operator, SwitchCase, ValueRepr};
pub use crate::types::{Comparison, SamplerFilter, UniformType, ValueType};
