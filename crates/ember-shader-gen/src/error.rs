//! Generation errors.

use core::fmt;

use ember_shader_graph::NodeId;

/// An error raised while generating shader source.
///
/// Generation is deterministic: a caller that gets an error will get the
/// same error again unless it edits the shader documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerateError {
    /// The fragment shader requires a varying the vertex shader does not
    /// write. Raised by linkage validation before any text is generated.
    Linkage { varying: String },
    /// A node kind (or operator/target combination) the generator cannot
    /// emit, e.g. a composite asked for as a leaf reference or a
    /// fragment-only operator in the vertex stage.
    UnsupportedNode {
        node: Option<NodeId>,
        kind: &'static str,
        detail: &'static str,
    },
    /// `ValueType::Operation` reached a type-name lookup; the node's
    /// producing operation was never resolved to a concrete type.
    UntypedValue,
    /// The two documents declare a custom uniform of the same name with
    /// different types, which a shared uniform block cannot represent.
    UniformConflict { name: String },
}

impl GenerateError {
    pub(crate) fn unsupported(kind: &'static str, detail: &'static str) -> Self {
        GenerateError::UnsupportedNode {
            node: None,
            kind,
            detail,
        }
    }

    pub(crate) fn unsupported_node(
        node: NodeId,
        kind: &'static str,
        detail: &'static str,
    ) -> Self {
        GenerateError::UnsupportedNode {
            node: Some(node),
            kind,
            detail,
        }
    }
}

impl fmt::Display for GenerateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerateError::Linkage { varying } => write!(
                f,
                "shaders can't be linked: the vertex shader does not write \"{varying}\" required by the fragment shader"
            ),
            GenerateError::UnsupportedNode { node, kind, detail } => match node {
                Some(node) => write!(f, "unsupported {kind} node {node:?}: {detail}"),
                None => write!(f, "unsupported {kind} node: {detail}"),
            },
            GenerateError::UntypedValue => {
                write!(f, "operation node has no resolvable result type")
            }
            GenerateError::UniformConflict { name } => write!(
                f,
                "custom uniform \"{name}\" is declared with different types by the vertex and fragment shaders"
            ),
        }
    }
}

impl std::error::Error for GenerateError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_mentions_the_missing_varying() {
        let err = GenerateError::Linkage {
            varying: "uv".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("\"uv\""), "message was: {msg}");
    }
}
