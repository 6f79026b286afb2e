//! Built-in functions and variables.
//!
//! The tables below describe what a shader can use without declaring it.
//! Signatures are kept as display strings; return types are computed from
//! the argument types with a [`ReturnRule`], which covers the generic
//! `genType` overloads without listing every instantiation.

use std::collections::HashMap;

use crate::types::{GlslType, PrimitiveKind};

/// How the return type of a builtin follows from its arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnRule {
    /// `genType f(genType x, ...)`
    SameAsFirst,
    /// `genType step(float edge, genType x)`
    SameAsLast,
    /// `float length(genType x)`
    ScalarOfFirst,
    /// `bvec lessThan(vec x, vec y)`
    BoolVectorOfFirst,
    Fixed(PrimitiveKind, u8),
}

impl ReturnRule {
    /// Return type for the given argument types, `None` when the rule needs
    /// an argument that is missing or not a primitive.
    pub fn apply(self, args: &[GlslType]) -> Option<GlslType> {
        match self {
            ReturnRule::SameAsFirst => args.first().filter(|ty| ty.primitive().is_some()).cloned(),
            ReturnRule::SameAsLast => args.last().filter(|ty| ty.primitive().is_some()).cloned(),
            ReturnRule::ScalarOfFirst => args.first()?.with_arity(1),
            ReturnRule::BoolVectorOfFirst => {
                let (_, arity) = args.first()?.primitive()?;
                Some(GlslType::vector(PrimitiveKind::Bool, arity))
            }
            ReturnRule::Fixed(kind, arity) => Some(GlslType::vector(kind, arity)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltinFunction {
    pub name: &'static str,
    /// Display signature, e.g. `genType mix(genType x, genType y, genType a)`.
    pub signature: &'static str,
    pub returns: ReturnRule,
}

impl BuiltinFunction {
    /// Parameter labels taken from the signature.
    pub fn parameters(&self) -> Vec<&'static str> {
        let signature = self.signature;
        let Some((open, close)) = signature.find('(').zip(signature.rfind(')')) else {
            return Vec::new();
        };
        let inner = &signature[open + 1..close];
        if inner.is_empty() {
            return Vec::new();
        }
        inner.split(", ").collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltinVariable {
    pub name: &'static str,
    pub ty: GlslType,
    /// Read-only variables cannot be assigned to.
    pub constant: bool,
}

const fn function(name: &'static str, signature: &'static str, returns: ReturnRule) -> BuiltinFunction {
    BuiltinFunction {
        name,
        signature,
        returns,
    }
}

use ReturnRule::*;

const BOOL: ReturnRule = Fixed(PrimitiveKind::Bool, 1);
const VEC4: ReturnRule = Fixed(PrimitiveKind::Float, 4);

/// Every builtin function known to the checker and the language service.
pub const BUILTIN_FUNCTIONS: &[BuiltinFunction] = &[
    // angle and trigonometry
    function("radians", "genType radians(genType degrees)", SameAsFirst),
    function("degrees", "genType degrees(genType radians)", SameAsFirst),
    function("sin", "genType sin(genType angle)", SameAsFirst),
    function("cos", "genType cos(genType angle)", SameAsFirst),
    function("tan", "genType tan(genType angle)", SameAsFirst),
    function("asin", "genType asin(genType x)", SameAsFirst),
    function("acos", "genType acos(genType x)", SameAsFirst),
    function("atan", "genType atan(genType y, genType x)", SameAsFirst),
    function("sinh", "genType sinh(genType x)", SameAsFirst),
    function("cosh", "genType cosh(genType x)", SameAsFirst),
    function("tanh", "genType tanh(genType x)", SameAsFirst),
    // exponential
    function("pow", "genType pow(genType x, genType y)", SameAsFirst),
    function("exp", "genType exp(genType x)", SameAsFirst),
    function("log", "genType log(genType x)", SameAsFirst),
    function("exp2", "genType exp2(genType x)", SameAsFirst),
    function("log2", "genType log2(genType x)", SameAsFirst),
    function("sqrt", "genType sqrt(genType x)", SameAsFirst),
    function("inversesqrt", "genType inversesqrt(genType x)", SameAsFirst),
    // common
    function("abs", "genType abs(genType x)", SameAsFirst),
    function("sign", "genType sign(genType x)", SameAsFirst),
    function("floor", "genType floor(genType x)", SameAsFirst),
    function("trunc", "genType trunc(genType x)", SameAsFirst),
    function("round", "genType round(genType x)", SameAsFirst),
    function("ceil", "genType ceil(genType x)", SameAsFirst),
    function("fract", "genType fract(genType x)", SameAsFirst),
    function("mod", "genType mod(genType x, genType y)", SameAsFirst),
    function("min", "genType min(genType x, genType y)", SameAsFirst),
    function("max", "genType max(genType x, genType y)", SameAsFirst),
    function(
        "clamp",
        "genType clamp(genType x, genType minVal, genType maxVal)",
        SameAsFirst,
    ),
    function("mix", "genType mix(genType x, genType y, genType a)", SameAsFirst),
    function("step", "genType step(genType edge, genType x)", SameAsLast),
    function(
        "smoothstep",
        "genType smoothstep(genType edge0, genType edge1, genType x)",
        SameAsLast,
    ),
    function("isnan", "bvec isnan(genType x)", BoolVectorOfFirst),
    function("isinf", "bvec isinf(genType x)", BoolVectorOfFirst),
    // geometry
    function("length", "float length(genType x)", ScalarOfFirst),
    function("distance", "float distance(genType p0, genType p1)", ScalarOfFirst),
    function("dot", "float dot(genType x, genType y)", ScalarOfFirst),
    function("cross", "vec3 cross(vec3 x, vec3 y)", SameAsFirst),
    function("normalize", "genType normalize(genType x)", SameAsFirst),
    function(
        "faceforward",
        "genType faceforward(genType N, genType I, genType Nref)",
        SameAsFirst,
    ),
    function("reflect", "genType reflect(genType I, genType N)", SameAsFirst),
    function(
        "refract",
        "genType refract(genType I, genType N, float eta)",
        SameAsFirst,
    ),
    // vector relational
    function("lessThan", "bvec lessThan(vec x, vec y)", BoolVectorOfFirst),
    function("lessThanEqual", "bvec lessThanEqual(vec x, vec y)", BoolVectorOfFirst),
    function("greaterThan", "bvec greaterThan(vec x, vec y)", BoolVectorOfFirst),
    function(
        "greaterThanEqual",
        "bvec greaterThanEqual(vec x, vec y)",
        BoolVectorOfFirst,
    ),
    function("equal", "bvec equal(vec x, vec y)", BoolVectorOfFirst),
    function("notEqual", "bvec notEqual(vec x, vec y)", BoolVectorOfFirst),
    function("any", "bool any(bvec x)", BOOL),
    function("all", "bool all(bvec x)", BOOL),
    function("not", "bvec not(bvec x)", SameAsFirst),
    // textures
    function("texture", "vec4 texture(sampler sampler, vec P)", VEC4),
    function("textureLod", "vec4 textureLod(sampler sampler, vec P, float lod)", VEC4),
    function("texelFetch", "vec4 texelFetch(sampler sampler, ivec P, int lod)", VEC4),
    function("texture2D", "vec4 texture2D(sampler2D sampler, vec2 coord)", VEC4),
    function("textureCube", "vec4 textureCube(samplerCube sampler, vec3 coord)", VEC4),
    function(
        "textureSize",
        "ivec2 textureSize(sampler sampler, int lod)",
        Fixed(PrimitiveKind::Int, 2),
    ),
    // derivatives
    function("dFdx", "genType dFdx(genType p)", SameAsFirst),
    function("dFdy", "genType dFdy(genType p)", SameAsFirst),
    function("fwidth", "genType fwidth(genType p)", SameAsFirst),
];

fn variables() -> Vec<BuiltinVariable> {
    let vec = |arity| GlslType::vector(PrimitiveKind::Float, arity);
    let variable = |name, ty, constant| BuiltinVariable { name, ty, constant };
    vec![
        variable("gl_Position", vec(4), false),
        variable("gl_PointSize", GlslType::FLOAT, false),
        variable("gl_FragCoord", vec(4), true),
        variable("gl_FrontFacing", GlslType::BOOL, true),
        variable("gl_PointCoord", vec(2), true),
        variable("gl_FragColor", vec(4), false),
        variable("gl_FragDepth", GlslType::FLOAT, false),
        variable("gl_VertexID", GlslType::INT, true),
        variable("gl_InstanceID", GlslType::INT, true),
        variable("gl_MaxDrawBuffers", GlslType::INT, true),
        variable("gl_MaxTextureImageUnits", GlslType::INT, true),
    ]
}

/// Lookup tables over the builtin functions and variables.
///
/// Building the tables is cheap but not free; a language service builds
/// them once and shares them between queries.
#[derive(Debug, Clone)]
pub struct Builtins {
    functions: HashMap<&'static str, &'static BuiltinFunction>,
    variables: Vec<BuiltinVariable>,
}

impl Default for Builtins {
    fn default() -> Self {
        Self::new()
    }
}

impl Builtins {
    pub fn new() -> Self {
        let functions = BUILTIN_FUNCTIONS
            .iter()
            .map(|function| (function.name, function))
            .collect();
        Builtins {
            functions,
            variables: variables(),
        }
    }

    pub fn function(&self, name: &str) -> Option<&'static BuiltinFunction> {
        self.functions.get(name).copied()
    }

    pub fn variable(&self, name: &str) -> Option<&BuiltinVariable> {
        self.variables.iter().find(|variable| variable.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.function(name).is_some() || self.variable(name).is_some()
    }

    /// Functions in table order.
    pub fn functions(&self) -> impl Iterator<Item = &'static BuiltinFunction> {
        BUILTIN_FUNCTIONS.iter()
    }

    pub fn variables(&self) -> impl Iterator<Item = &BuiltinVariable> {
        self.variables.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_functions_and_variables() {
        let builtins = Builtins::new();
        assert!(builtins.function("mix").is_some());
        assert!(builtins.variable("gl_FragColor").is_some());
        assert!(builtins.contains("gl_Position"));
        assert!(!builtins.contains("mainImage"));
    }

    #[test]
    fn applies_return_rules() {
        let vec3 = GlslType::vector(PrimitiveKind::Float, 3);
        assert_eq!(SameAsFirst.apply(&[vec3.clone()]), Some(vec3.clone()));
        assert_eq!(ScalarOfFirst.apply(&[vec3.clone()]), Some(GlslType::FLOAT));
        assert_eq!(
            BoolVectorOfFirst.apply(&[vec3.clone(), vec3.clone()]),
            Some(GlslType::vector(PrimitiveKind::Bool, 3))
        );
        assert_eq!(
            SameAsLast.apply(&[GlslType::FLOAT, vec3.clone()]),
            Some(vec3)
        );
        assert_eq!(SameAsFirst.apply(&[]), None);
    }

    #[test]
    fn splits_parameter_labels() {
        let builtins = Builtins::new();
        let clamp = builtins.function("clamp").expect("clamp");
        assert_eq!(
            clamp.parameters(),
            vec!["genType x", "genType minVal", "genType maxVal"]
        );
    }
}
