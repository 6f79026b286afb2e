//! Semantic types for glslx.
//!
//! The checker works on a reduced type universe: `void`, scalars and vectors
//! of the four primitive kinds, arrays and named structs. Matrices and
//! samplers parse fine but resolve to [`TypeError::NotSupported`].

use std::fmt;

use thiserror::Error;

use crate::ast::{ArraySpecifier, ExprNode, TypeName, TypeSpecifier};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Int,
    Uint,
    Bool,
    Float,
}

impl PrimitiveKind {
    pub fn is_numeric(self) -> bool {
        !matches!(self, PrimitiveKind::Bool)
    }

    pub fn is_integral(self) -> bool {
        matches!(self, PrimitiveKind::Int | PrimitiveKind::Uint)
    }

    pub fn scalar_name(self) -> &'static str {
        match self {
            PrimitiveKind::Int => "int",
            PrimitiveKind::Uint => "uint",
            PrimitiveKind::Bool => "bool",
            PrimitiveKind::Float => "float",
        }
    }

    fn vector_prefix(self) -> &'static str {
        match self {
            PrimitiveKind::Int => "ivec",
            PrimitiveKind::Uint => "uvec",
            PrimitiveKind::Bool => "bvec",
            PrimitiveKind::Float => "vec",
        }
    }
}

/// A resolved type. Arity 1 is a scalar, 2 to 4 a vector.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GlslType {
    Void,
    Primitive { kind: PrimitiveKind, arity: u8 },
    /// `size` is `None` for unsized arrays and sizes that are not known
    /// statically.
    Array {
        element: Box<GlslType>,
        size: Option<usize>,
    },
    Struct(String),
}

impl GlslType {
    pub const BOOL: GlslType = GlslType::scalar(PrimitiveKind::Bool);
    pub const INT: GlslType = GlslType::scalar(PrimitiveKind::Int);
    pub const UINT: GlslType = GlslType::scalar(PrimitiveKind::Uint);
    pub const FLOAT: GlslType = GlslType::scalar(PrimitiveKind::Float);

    pub const fn scalar(kind: PrimitiveKind) -> Self {
        GlslType::Primitive { kind, arity: 1 }
    }

    pub const fn vector(kind: PrimitiveKind, arity: u8) -> Self {
        GlslType::Primitive { kind, arity }
    }

    pub fn array(element: GlslType, size: Option<usize>) -> Self {
        GlslType::Array {
            element: Box::new(element),
            size,
        }
    }

    pub fn primitive(&self) -> Option<(PrimitiveKind, u8)> {
        match self {
            GlslType::Primitive { kind, arity } => Some((*kind, *arity)),
            _ => None,
        }
    }

    pub fn kind(&self) -> Option<PrimitiveKind> {
        self.primitive().map(|(kind, _)| kind)
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, GlslType::Primitive { arity: 1, .. })
    }

    pub fn is_vector(&self) -> bool {
        matches!(self, GlslType::Primitive { arity, .. } if *arity > 1)
    }

    pub fn is_numeric(&self) -> bool {
        self.kind().is_some_and(PrimitiveKind::is_numeric)
    }

    pub fn is_integral(&self) -> bool {
        self.kind().is_some_and(PrimitiveKind::is_integral)
    }

    pub fn is_integral_scalar(&self) -> bool {
        self.is_scalar() && self.is_integral()
    }

    /// Same kind, different number of components.
    pub fn with_arity(&self, arity: u8) -> Option<GlslType> {
        self.kind().map(|kind| GlslType::vector(kind, arity))
    }

    /// What `self[i]` yields: the element of an array or a vector component.
    pub fn indexed(&self) -> Option<GlslType> {
        match self {
            GlslType::Array { element, .. } => Some((**element).clone()),
            GlslType::Primitive { kind, arity } if *arity > 1 => Some(GlslType::scalar(*kind)),
            _ => None,
        }
    }
}

impl fmt::Display for GlslType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GlslType::Void => f.write_str("void"),
            GlslType::Primitive { kind, arity: 1 } => f.write_str(kind.scalar_name()),
            GlslType::Primitive { kind, arity } => write!(f, "{}{arity}", kind.vector_prefix()),
            GlslType::Array { element, size } => match size {
                Some(size) => write!(f, "{element}[{size}]"),
                None => write!(f, "{element}[]"),
            },
            GlslType::Struct(name) => f.write_str(name),
        }
    }
}

/// Result type of an arithmetic-style operation on two primitives: the
/// kinds must agree and the arities must match unless one side is a scalar.
pub fn broadcast(left: &GlslType, right: &GlslType) -> Option<GlslType> {
    let (left_kind, left_arity) = left.primitive()?;
    let (right_kind, right_arity) = right.primitive()?;
    if left_kind != right_kind {
        return None;
    }
    match (left_arity, right_arity) {
        (l, r) if l == r => Some(left.clone()),
        (1, _) => Some(right.clone()),
        (_, 1) => Some(left.clone()),
        _ => None,
    }
}

/// Component index of a swizzle letter, in any of the three naming sets.
pub fn swizzle_component(letter: char) -> Option<(usize, u8)> {
    const SETS: [&str; 3] = ["xyzw", "rgba", "stpq"];
    SETS.iter()
        .enumerate()
        .find_map(|(set, letters)| letters.find(letter).map(|index| (index, set as u8)))
}

/// Component indices selected by `selector` on a vector of `arity`
/// components, or `None` when the swizzle is invalid. Letters must all come
/// from the same naming set.
pub fn swizzle(arity: u8, selector: &str) -> Option<Vec<usize>> {
    if selector.is_empty() || selector.len() > 4 {
        return None;
    }
    let mut set = None;
    let mut indices = Vec::with_capacity(selector.len());
    for letter in selector.chars() {
        let (index, letter_set) = swizzle_component(letter)?;
        if *set.get_or_insert(letter_set) != letter_set || index >= arity as usize {
            return None;
        }
        indices.push(index);
    }
    Some(indices)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
    #[error("type `{0}` is not yet supported")]
    NotSupported(String),
    #[error("unknown type `{0}`")]
    Unknown(String),
    #[error("array size must be a positive integer constant")]
    BadArraySize,
}

/// Map a builtin type keyword to its type.
pub fn builtin_type(name: &str) -> Result<GlslType, TypeError> {
    let scalar = match name {
        "void" => return Ok(GlslType::Void),
        "float" => Some(PrimitiveKind::Float),
        "int" => Some(PrimitiveKind::Int),
        "uint" => Some(PrimitiveKind::Uint),
        "bool" => Some(PrimitiveKind::Bool),
        _ => None,
    };
    if let Some(kind) = scalar {
        return Ok(GlslType::scalar(kind));
    }
    let (kind, rest) = if let Some(rest) = name.strip_prefix("ivec") {
        (PrimitiveKind::Int, rest)
    } else if let Some(rest) = name.strip_prefix("uvec") {
        (PrimitiveKind::Uint, rest)
    } else if let Some(rest) = name.strip_prefix("bvec") {
        (PrimitiveKind::Bool, rest)
    } else if let Some(rest) = name.strip_prefix("vec") {
        (PrimitiveKind::Float, rest)
    } else if crate::lexer::is_type_keyword(name) {
        return Err(TypeError::NotSupported(name.to_string()));
    } else {
        return Err(TypeError::Unknown(name.to_string()));
    };
    match rest {
        "2" => Ok(GlslType::vector(kind, 2)),
        "3" => Ok(GlslType::vector(kind, 3)),
        "4" => Ok(GlslType::vector(kind, 4)),
        _ => Err(TypeError::Unknown(name.to_string())),
    }
}

/// What type resolution needs to know about its surroundings.
pub trait TypeContext {
    /// Whether a struct with this name is visible.
    fn is_struct(&self, name: &str) -> bool;

    /// Value of an array size expression, `None` when it cannot be computed
    /// statically.
    fn array_size(&mut self, size: &ExprNode) -> Result<Option<usize>, TypeError>;
}

/// Resolve a type specifier plus the array suffix of its declarator, as in
/// `float a[3]`.
pub fn resolve_type(
    specifier: &TypeSpecifier,
    declarator: &ArraySpecifier,
    context: &mut dyn TypeContext,
) -> Result<GlslType, TypeError> {
    let base = match &specifier.name.data {
        TypeName::Builtin(name) => builtin_type(name)?,
        TypeName::Named(name) if context.is_struct(name) => GlslType::Struct(name.clone()),
        TypeName::Named(name) => return Err(TypeError::Unknown(name.clone())),
    };
    let inner = apply_array(base, &specifier.array, context)?;
    apply_array(inner, declarator, context)
}

fn apply_array(
    ty: GlslType,
    array: &ArraySpecifier,
    context: &mut dyn TypeContext,
) -> Result<GlslType, TypeError> {
    match array {
        ArraySpecifier::None => Ok(ty),
        ArraySpecifier::Unsized => Ok(GlslType::array(ty, None)),
        ArraySpecifier::Sized(size) => Ok(GlslType::array(ty, context.array_size(size)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoContext;

    impl TypeContext for NoContext {
        fn is_struct(&self, name: &str) -> bool {
            name == "Light"
        }

        fn array_size(&mut self, _: &ExprNode) -> Result<Option<usize>, TypeError> {
            Ok(Some(3))
        }
    }

    fn resolve(source: &str) -> Result<GlslType, TypeError> {
        let statement = crate::parser::parse_declaration(source).expect("parse");
        let crate::ast::Statement::Declaration(crate::ast::Declaration::Variables(list)) =
            statement.data
        else {
            panic!("expected a variable declaration");
        };
        resolve_type(
            &list.ty.specifier,
            &list.declarators[0].data.array,
            &mut NoContext,
        )
    }

    #[test]
    fn displays_types() {
        assert_eq!(GlslType::FLOAT.to_string(), "float");
        assert_eq!(GlslType::vector(PrimitiveKind::Int, 3).to_string(), "ivec3");
        assert_eq!(
            GlslType::array(GlslType::vector(PrimitiveKind::Float, 2), Some(4)).to_string(),
            "vec2[4]"
        );
        assert_eq!(GlslType::array(GlslType::UINT, None).to_string(), "uint[]");
    }

    #[test]
    fn broadcasts_scalars_against_vectors() {
        let vec3 = GlslType::vector(PrimitiveKind::Float, 3);
        assert_eq!(broadcast(&vec3, &GlslType::FLOAT), Some(vec3.clone()));
        assert_eq!(broadcast(&GlslType::FLOAT, &vec3), Some(vec3.clone()));
        assert_eq!(broadcast(&vec3, &GlslType::INT), None);
        let vec2 = GlslType::vector(PrimitiveKind::Float, 2);
        assert_eq!(broadcast(&vec3, &vec2), None);
    }

    #[test]
    fn checks_swizzles() {
        assert_eq!(swizzle(3, "zyx"), Some(vec![2, 1, 0]));
        assert_eq!(swizzle(4, "rgba"), Some(vec![0, 1, 2, 3]));
        assert_eq!(swizzle(2, "xz"), None);
        assert_eq!(swizzle(4, "xg"), None);
        assert_eq!(swizzle(4, "xxxxx"), None);
    }

    #[test]
    fn resolves_specifiers() {
        assert_eq!(resolve("vec3 a;"), Ok(GlslType::vector(PrimitiveKind::Float, 3)));
        assert_eq!(
            resolve("float a[3];"),
            Ok(GlslType::array(GlslType::FLOAT, Some(3)))
        );
        assert_eq!(resolve("Light l;"), Ok(GlslType::Struct("Light".into())));
        assert_eq!(resolve("Fog f;"), Err(TypeError::Unknown("Fog".into())));
        assert_eq!(
            resolve("mat3 m;"),
            Err(TypeError::NotSupported("mat3".into()))
        );
    }
}
