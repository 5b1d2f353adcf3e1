//! Semantic types carried by shader graph nodes.

/// The semantic type of a shader value.
///
/// `Float4x4Array` carries its fixed element capacity; array-ness is
/// expressed at declaration sites with a bracket suffix, so the target
/// type keyword is always the element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Void,
    Bool,
    Int,
    UInt,
    Float,
    Float2,
    Float3,
    Float4,
    UInt4,
    Float3x3,
    Float4x4,
    Float4x4Array(u32),
    Texture2D,
    /// Untyped sentinel for raw operation nodes whose result type has not
    /// been resolved. The builder API never stores this; it exists for
    /// the low-level `add_node` escape hatch.
    Operation,
}

impl ValueType {
    /// Returns `true` for the matrix-shaped types.
    pub fn is_matrix(self) -> bool {
        matches!(
            self,
            ValueType::Float3x3 | ValueType::Float4x4 | ValueType::Float4x4Array(_)
        )
    }

    /// Returns `true` for the vector-shaped types.
    pub fn is_vector(self) -> bool {
        matches!(
            self,
            ValueType::Float2 | ValueType::Float3 | ValueType::Float4 | ValueType::UInt4
        )
    }

    /// Returns `true` for single-component numeric/boolean types.
    pub fn is_scalar(self) -> bool {
        matches!(
            self,
            ValueType::Bool | ValueType::Int | ValueType::UInt | ValueType::Float
        )
    }
}

/// The declared type of a custom uniform binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformType {
    Bool,
    Int,
    UInt,
    Float,
    Vec2,
    Vec3,
    Vec4,
    UVec4,
    Mat3,
    Mat4,
    Mat4Array(u32),
}

impl UniformType {
    /// The semantic value type of a uniform declared with this type.
    pub fn value_type(self) -> ValueType {
        match self {
            UniformType::Bool => ValueType::Bool,
            UniformType::Int => ValueType::Int,
            UniformType::UInt => ValueType::UInt,
            UniformType::Float => ValueType::Float,
            UniformType::Vec2 => ValueType::Float2,
            UniformType::Vec3 => ValueType::Float3,
            UniformType::Vec4 => ValueType::Float4,
            UniformType::UVec4 => ValueType::UInt4,
            UniformType::Mat3 => ValueType::Float3x3,
            UniformType::Mat4 => ValueType::Float4x4,
            UniformType::Mat4Array(capacity) => ValueType::Float4x4Array(capacity),
        }
    }
}

/// Comparison operators usable in `Operator::Compare`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Equal,
    NotEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    And,
    Or,
}

impl Comparison {
    /// The infix symbol shared by all three target languages.
    pub fn symbol(self) -> &'static str {
        match self {
            Comparison::Equal => "==",
            Comparison::NotEqual => "!=",
            Comparison::Greater => ">",
            Comparison::GreaterEqual => ">=",
            Comparison::Less => "<",
            Comparison::LessEqual => "<=",
            Comparison::And => "&&",
            Comparison::Or => "||",
        }
    }
}

/// Texture sampling filter for `Operator::Sampler2D`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerFilter {
    Linear,
    Nearest,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_types_map_to_value_types() {
        assert_eq!(UniformType::Vec3.value_type(), ValueType::Float3);
        assert_eq!(UniformType::UVec4.value_type(), ValueType::UInt4);
        assert_eq!(
            UniformType::Mat4Array(12).value_type(),
            ValueType::Float4x4Array(12)
        );
    }

    #[test]
    fn shape_predicates() {
        assert!(ValueType::Float4x4Array(4).is_matrix());
        assert!(ValueType::UInt4.is_vector());
        assert!(ValueType::UInt.is_scalar());
        assert!(!ValueType::Texture2D.is_scalar());
    }
}
