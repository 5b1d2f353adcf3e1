//! Shader source generation for the ember engine.
//!
//! Turns a [`VertexShader`]/[`FragmentShader`] document pair (see
//! `ember-shader-graph`) into source text for one of three target
//! shading languages:
//!
//! - [`GlslCodeGenerator`] — GLSL, one source string per stage.
//! - [`HlslCodeGenerator`] — HLSL, one source string per stage with
//!   `VSMain`/`PSMain` entry points.
//! - [`MslCodeGenerator`] — MSL, one combined source string with
//!   document-id-suffixed entry points.
//!
//! Generation is synchronous, performs no I/O, and is deterministic:
//! identical documents and attribute lists produce byte-identical
//! source. Generators hold no per-call state; callers may share one
//! generator across threads. Renderer backends are expected to memoize
//! generated source per shader shape so generation runs once per distinct
//! pipeline, not once per draw call.
//!
//! [`VertexShader`]: ember_shader_graph::VertexShader
//! [`FragmentShader`]: ember_shader_graph::FragmentShader

#![forbid(unsafe_code)]

mod emit;
mod error;
mod glsl;
mod hlsl;
mod msl;
mod writer;

pub use crate::emit::{
    validate_linkage, CodeEmitter, EmissionContext, InputAttribute, OperandInfo, OperationArgs,
};
pub use crate::error::GenerateError;
pub use crate::glsl::{GlslCodeGenerator, GlslVersion};
pub use crate::hlsl::HlslCodeGenerator;
pub use crate::msl::MslCodeGenerator;

/// The generated sources of a two-string target (GLSL, HLSL).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSources {
    pub vertex: String,
    pub fragment: String,
}
