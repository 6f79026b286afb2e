//! Syntax tree for glslx translation units.
//!
//! Every expression, statement and external declaration is wrapped in a
//! [`Node`], which carries the byte range of the production and the comments
//! found inside it. Smaller pieces that do not need their own range are
//! wrapped in [`Commented`].
//!
//! Comment groups follow one convention across the tree: group 0 holds the
//! comments immediately before the production's first token, and each further
//! group holds the comments found before a token the production consumed
//! itself, in source order.

use std::fmt;

use crate::span::Range;

/// Comments found at a single attachment point, raw text included (`//`, `/*`).
pub type CommentGroup = Vec<String>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Comments(pub Vec<CommentGroup>);

impl Comments {
    pub fn push(&mut self, group: CommentGroup) {
        self.0.push(group);
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(Vec::is_empty)
    }

    /// All comments in source order, regardless of attachment point.
    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter().flatten()
    }

    pub fn leading(&self) -> &[String] {
        self.0.first().map(Vec::as_slice).unwrap_or_default()
    }

    pub fn append(&mut self, other: Comments) {
        self.0.extend(other.0);
    }
}

/// A value plus its surrounding comments, without a range.
#[derive(Debug, Clone, PartialEq)]
pub struct Commented<T> {
    pub data: T,
    pub comments: Comments,
}

impl<T> Commented<T> {
    pub fn new(data: T) -> Self {
        Commented {
            data,
            comments: Comments::default(),
        }
    }
}

/// A value plus its comments and source range.
#[derive(Debug, Clone, PartialEq)]
pub struct Node<T> {
    pub data: T,
    pub comments: Comments,
    pub range: Range,
}

impl<T> Node<T> {
    pub fn new(data: T, range: Range) -> Self {
        Node {
            data,
            comments: Comments::default(),
            range,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Node<U> {
        Node {
            data: f(self.data),
            comments: self.comments,
            range: self.range,
        }
    }
}

pub type ExprNode = Node<Expr>;
pub type StmtNode = Node<Statement>;
pub type ExternalNode = Node<ExternalDeclaration>;

// ---------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Radix {
    Decimal,
    Octal,
    Hex,
}

/// Integer literal. `text` is the literal exactly as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntLiteral {
    pub text: String,
    pub value: u32,
    pub unsigned: bool,
    pub radix: Radix,
}

/// Float literal. `text` is the literal exactly as written.
#[derive(Debug, Clone, PartialEq)]
pub struct FloatLiteral {
    pub text: String,
    pub value: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Mul,
    Div,
    Mod,
    Add,
    Sub,
    Shl,
    Shr,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    BitAnd,
    BitXor,
    BitOr,
    And,
    Xor,
    Or,
    Comma,
    /// Array or component indexing, `a[i]`.
    Index,
}

impl BinaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Le => "<=",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitXor => "^",
            BinaryOp::BitOr => "|",
            BinaryOp::And => "&&",
            BinaryOp::Xor => "^^",
            BinaryOp::Or => "||",
            BinaryOp::Comma => ",",
            BinaryOp::Index => "[]",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Some(match symbol {
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            "%" => BinaryOp::Mod,
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            "<<" => BinaryOp::Shl,
            ">>" => BinaryOp::Shr,
            "<" => BinaryOp::Lt,
            ">" => BinaryOp::Gt,
            "<=" => BinaryOp::Le,
            ">=" => BinaryOp::Ge,
            "==" => BinaryOp::Eq,
            "!=" => BinaryOp::Ne,
            "&" => BinaryOp::BitAnd,
            "^" => BinaryOp::BitXor,
            "|" => BinaryOp::BitOr,
            "&&" => BinaryOp::And,
            "^^" => BinaryOp::Xor,
            "||" => BinaryOp::Or,
            "," => BinaryOp::Comma,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Inc,
    Dec,
    Plus,
    Minus,
    Not,
    BitNot,
}

impl UnaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            UnaryOp::Inc => "++",
            UnaryOp::Dec => "--",
            UnaryOp::Plus => "+",
            UnaryOp::Minus => "-",
            UnaryOp::Not => "!",
            UnaryOp::BitNot => "~",
        }
    }
}

/// `=` or a compound assignment; `None` inside means plain `=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AssignOp(pub Option<BinaryOp>);

impl AssignOp {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        let op = match symbol {
            "=" => None,
            "*=" => Some(BinaryOp::Mul),
            "/=" => Some(BinaryOp::Div),
            "%=" => Some(BinaryOp::Mod),
            "+=" => Some(BinaryOp::Add),
            "-=" => Some(BinaryOp::Sub),
            "<<=" => Some(BinaryOp::Shl),
            ">>=" => Some(BinaryOp::Shr),
            "&=" => Some(BinaryOp::BitAnd),
            "^=" => Some(BinaryOp::BitXor),
            "|=" => Some(BinaryOp::BitOr),
            _ => return None,
        };
        Some(AssignOp(op))
    }

    pub fn as_str(self) -> &'static str {
        match self.0 {
            None => "=",
            Some(BinaryOp::Mul) => "*=",
            Some(BinaryOp::Div) => "/=",
            Some(BinaryOp::Mod) => "%=",
            Some(BinaryOp::Add) => "+=",
            Some(BinaryOp::Sub) => "-=",
            Some(BinaryOp::Shl) => "<<=",
            Some(BinaryOp::Shr) => ">>=",
            Some(BinaryOp::BitAnd) => "&=",
            Some(BinaryOp::BitXor) => "^=",
            Some(BinaryOp::BitOr) => "|=",
            Some(_) => "=",
        }
    }
}

/// Target of a call: a function name or a type constructor.
#[derive(Debug, Clone, PartialEq)]
pub enum Callee {
    Name(String),
    Type(TypeSpecifier),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub callee: Commented<Callee>,
    pub args: Vec<ExprNode>,
    /// The call was written `f(void)`.
    pub void: bool,
}

impl FunctionCall {
    pub fn name(&self) -> Option<&str> {
        match &self.callee.data {
            Callee::Name(name) => Some(name),
            Callee::Type(_) => None,
        }
    }
}

/// What follows the `.` of a field access.
#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    Member(String),
    Method(FunctionCall),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Int(IntLiteral),
    Float(FloatLiteral),
    Bool(bool),
    Ident(String),
    Binary {
        op: BinaryOp,
        left: Box<ExprNode>,
        right: Box<ExprNode>,
    },
    Unary {
        op: UnaryOp,
        postfix: bool,
        operand: Box<ExprNode>,
    },
    Field {
        target: Box<ExprNode>,
        selector: Commented<Selector>,
    },
    Assign {
        op: AssignOp,
        left: Box<ExprNode>,
        right: Box<ExprNode>,
    },
    Conditional {
        condition: Box<ExprNode>,
        then: Box<ExprNode>,
        otherwise: Box<ExprNode>,
    },
    Call(FunctionCall),
    /// Placeholder left by the recovering parser.
    Error(String),
}

// ---------------------------------------------------------------------
// Types and declarations
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Precision {
    Low,
    Medium,
    High,
}

impl Precision {
    pub fn as_str(self) -> &'static str {
        match self {
            Precision::Low => "lowp",
            Precision::Medium => "mediump",
            Precision::High => "highp",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "lowp" => Some(Precision::Low),
            "mediump" => Some(Precision::Medium),
            "highp" => Some(Precision::High),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeName {
    /// A keyword type such as `float` or `vec3`.
    Builtin(String),
    /// A user type, i.e. a struct name.
    Named(String),
}

impl TypeName {
    pub fn as_str(&self) -> &str {
        match self {
            TypeName::Builtin(name) | TypeName::Named(name) => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArraySpecifier {
    None,
    Sized(Box<ExprNode>),
    Unsized,
}

impl ArraySpecifier {
    pub fn is_array(&self) -> bool {
        !matches!(self, ArraySpecifier::None)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeSpecifier {
    pub precision: Option<Precision>,
    pub name: Commented<TypeName>,
    pub array: ArraySpecifier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Storage {
    Const,
    In,
    Out,
    InOut,
    Centroid,
    Uniform,
    Attribute,
    Varying,
    Buffer,
    Shared,
}

impl Storage {
    pub fn as_str(self) -> &'static str {
        match self {
            Storage::Const => "const",
            Storage::In => "in",
            Storage::Out => "out",
            Storage::InOut => "inout",
            Storage::Centroid => "centroid",
            Storage::Uniform => "uniform",
            Storage::Attribute => "attribute",
            Storage::Varying => "varying",
            Storage::Buffer => "buffer",
            Storage::Shared => "shared",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Some(match keyword {
            "const" => Storage::Const,
            "in" => Storage::In,
            "out" => Storage::Out,
            "inout" => Storage::InOut,
            "centroid" => Storage::Centroid,
            "uniform" => Storage::Uniform,
            "attribute" => Storage::Attribute,
            "varying" => Storage::Varying,
            "buffer" => Storage::Buffer,
            "shared" => Storage::Shared,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interpolation {
    Smooth,
    Flat,
    NoPerspective,
}

impl Interpolation {
    pub fn as_str(self) -> &'static str {
        match self {
            Interpolation::Smooth => "smooth",
            Interpolation::Flat => "flat",
            Interpolation::NoPerspective => "noperspective",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "smooth" => Some(Interpolation::Smooth),
            "flat" => Some(Interpolation::Flat),
            "noperspective" => Some(Interpolation::NoPerspective),
            _ => None,
        }
    }
}

/// One entry of `layout(...)`; `value` keeps the literal text.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutId {
    pub name: String,
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Qualifier {
    Storage(Storage),
    Layout(Vec<Commented<LayoutId>>),
    Interpolation(Interpolation),
    Invariant,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeQualifier {
    pub parts: Vec<Commented<Qualifier>>,
}

impl TypeQualifier {
    pub fn has_storage(&self, storage: Storage) -> bool {
        self.parts
            .iter()
            .any(|part| part.data == Qualifier::Storage(storage))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FullySpecifiedType {
    pub qualifier: Option<TypeQualifier>,
    pub specifier: TypeSpecifier,
}

impl FullySpecifiedType {
    pub fn is_const(&self) -> bool {
        self.qualifier
            .as_ref()
            .is_some_and(|qualifier| qualifier.has_storage(Storage::Const))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Declarator {
    pub name: String,
    pub array: ArraySpecifier,
    pub initializer: Option<ExprNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeclaratorList {
    pub ty: FullySpecifiedType,
    pub declarators: Vec<Commented<Declarator>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub qualifier: Option<TypeQualifier>,
    pub ty: TypeSpecifier,
    pub name: Option<String>,
    pub array: ArraySpecifier,
}

impl Parameter {
    /// The parameter list `(void)` is a single unnamed `void` parameter.
    pub fn is_void(&self) -> bool {
        self.name.is_none()
            && self.qualifier.is_none()
            && matches!(&self.ty.name.data, TypeName::Builtin(name) if name == "void")
            && !self.ty.array.is_array()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionPrototype {
    pub return_type: FullySpecifiedType,
    pub name: String,
    pub params: Vec<Commented<Parameter>>,
}

impl FunctionPrototype {
    /// Parameters, skipping a lone `void`.
    pub fn parameters(&self) -> impl Iterator<Item = &Parameter> {
        self.params
            .iter()
            .map(|param| &param.data)
            .filter(|param| !param.is_void())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructField {
    pub ty: TypeSpecifier,
    pub names: Vec<Commented<(String, ArraySpecifier)>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructDefinition {
    pub name: String,
    pub fields: Vec<Commented<StructField>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Declaration {
    Prototype(FunctionPrototype),
    Variables(DeclaratorList),
    /// `precision highp float;`
    Precision {
        precision: Precision,
        ty: TypeSpecifier,
    },
    Struct(StructDefinition),
    /// `invariant gl_Position;` or `layout(...) in;`
    Qualifier {
        qualifier: TypeQualifier,
        names: Vec<Commented<String>>,
    },
}

// ---------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Jump {
    Break,
    Continue,
    Discard,
    Return(Option<ExprNode>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Expression statement; `None` for the empty statement `;`.
    Expr(Option<ExprNode>),
    Declaration(Declaration),
    Compound(Vec<StmtNode>),
    If {
        condition: ExprNode,
        then: Box<StmtNode>,
        otherwise: Option<Box<StmtNode>>,
    },
    While {
        condition: ExprNode,
        body: Box<StmtNode>,
    },
    DoWhile {
        body: Box<StmtNode>,
        condition: ExprNode,
    },
    For {
        init: Box<StmtNode>,
        condition: Option<ExprNode>,
        step: Option<ExprNode>,
        body: Box<StmtNode>,
    },
    Switch {
        selector: ExprNode,
        body: Vec<StmtNode>,
    },
    Case(ExprNode),
    Default,
    Jump(Jump),
}

impl Statement {
    /// Whether entering this statement opens a lexical scope.
    pub fn owns_scope(&self) -> bool {
        matches!(
            self,
            Statement::Compound(_)
                | Statement::While { .. }
                | Statement::DoWhile { .. }
                | Statement::For { .. }
                | Statement::Switch { .. }
        )
    }
}

// ---------------------------------------------------------------------
// Top level
// ---------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ImportItem {
    pub name: String,
    pub alias: Option<String>,
}

impl ImportItem {
    /// Name the symbol is visible under in the importing file.
    pub fn local_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImportKind {
    /// `import * from "path"`
    All,
    /// `import * as prefix from "path"`; names become `prefix` + name.
    Prefixed(String),
    /// `import { a, b as c } from "path"`
    Named(Vec<Commented<ImportItem>>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Import {
    pub kind: ImportKind,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDefinition {
    pub prototype: Commented<FunctionPrototype>,
    pub body: Box<StmtNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExternalDeclaration {
    Function(FunctionDefinition),
    Declaration(Declaration),
    Import(Import),
}

/// One parsed source file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranslationUnit {
    pub declarations: Vec<ExternalNode>,
    /// Comments after the last declaration.
    pub comments: Comments,
}

impl TranslationUnit {
    pub fn imports(&self) -> impl Iterator<Item = (&Import, Range)> {
        self.declarations.iter().filter_map(|decl| match &decl.data {
            ExternalDeclaration::Import(import) => Some((import, decl.range)),
            _ => None,
        })
    }
}

impl fmt::Display for TypeSpecifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(precision) = self.precision {
            write!(f, "{} ", precision.as_str())?;
        }
        f.write_str(self.name.data.as_str())?;
        match &self.array {
            ArraySpecifier::None => Ok(()),
            ArraySpecifier::Unsized => f.write_str("[]"),
            ArraySpecifier::Sized(size) => write!(f, "[{}]", crate::format::packed_expr(size)),
        }
    }
}
