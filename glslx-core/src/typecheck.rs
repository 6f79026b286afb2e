//! Type checking for glslx.
//!
//! The checker walks a translation unit with its [`ScopeTree`] and reports
//! type errors as [`Diagnostic`]s. It never stops at the first problem: an
//! expression whose type cannot be determined yields `None`, and operations
//! on `None` stay silent so one mistake produces one diagnostic.
//!
//! Names that resolve to nothing are not reported here; [`check_names`]
//! is a separate pass over the same tree.

use crate::ast::{
    ArraySpecifier, BinaryOp, Callee, Declaration, Expr, ExprNode, ExternalDeclaration,
    FunctionCall, FunctionDefinition, FunctionPrototype, Jump, Selector, Statement, StmtNode,
    TranslationUnit, TypeSpecifier, UnaryOp,
};
use crate::builtins::Builtins;
use crate::diagnostic::Diagnostic;
use crate::eval::Evaluator;
use crate::scope::{ScopeItem, ScopeTree};
use crate::span::Range;
use crate::types::{GlslType, TypeContext, TypeError, broadcast, resolve_type, swizzle};
use crate::visit::{Visit, walk_expr};

/// Result of type checking a single expression.
#[derive(Debug)]
pub struct TypeCheckResult {
    pub ty: Option<GlslType>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Type of `expr`, with names resolved at the expression's position in
/// `unit`.
pub fn typecheck_expr(
    expr: &ExprNode,
    unit: &TranslationUnit,
    tree: &ScopeTree,
    builtins: &Builtins,
) -> TypeCheckResult {
    let mut checker = TypeChecker::new(unit, tree, builtins);
    let ty = checker.infer(expr);
    TypeCheckResult {
        ty,
        diagnostics: checker.diagnostics,
    }
}

/// Check every declaration of `unit`.
pub fn typecheck_unit(unit: &TranslationUnit, tree: &ScopeTree, builtins: &Builtins) -> Vec<Diagnostic> {
    let mut checker = TypeChecker::new(unit, tree, builtins);
    checker.check_unit(unit);
    checker.diagnostics
}

pub struct TypeChecker<'a> {
    tree: &'a ScopeTree,
    builtins: &'a Builtins,
    /// Global constants, for array sizes.
    constants: Evaluator<'a>,
    /// Where names are currently being resolved.
    position: usize,
    /// Return type of the function being checked.
    return_type: Option<GlslType>,
    pub diagnostics: Vec<Diagnostic>,
}

impl<'a> TypeChecker<'a> {
    pub fn new(unit: &TranslationUnit, tree: &'a ScopeTree, builtins: &'a Builtins) -> Self {
        let mut constants = Evaluator::new();
        constants.declare_globals(unit);
        TypeChecker {
            tree,
            builtins,
            constants,
            position: 0,
            return_type: None,
            diagnostics: Vec::new(),
        }
    }

    fn error(&mut self, range: Range, msg: impl Into<String>) {
        self.diagnostics.push(Diagnostic::new(range, msg));
    }

    fn resolve(
        &mut self,
        specifier: &TypeSpecifier,
        array: &ArraySpecifier,
        range: Range,
    ) -> Option<GlslType> {
        self.position = range.start;
        match resolve_type(specifier, array, self) {
            Ok(ty) => Some(ty),
            Err(error) => {
                self.error(range, error.to_string());
                None
            }
        }
    }

    /// Resolve a type that was already checked where it was declared.
    fn resolve_quietly(
        &mut self,
        specifier: &TypeSpecifier,
        array: &ArraySpecifier,
        position: usize,
    ) -> Option<GlslType> {
        self.position = position;
        resolve_type(specifier, array, self).ok()
    }

    // -----------------------------------------------------------------
    // Declarations and statements
    // -----------------------------------------------------------------

    pub fn check_unit(&mut self, unit: &TranslationUnit) {
        for external in &unit.declarations {
            match &external.data {
                ExternalDeclaration::Function(function) => self.function(function, external.range),
                ExternalDeclaration::Declaration(declaration) => {
                    self.declaration(declaration, external.range)
                }
                ExternalDeclaration::Import(_) => {}
            }
        }
    }

    fn function(&mut self, function: &FunctionDefinition, range: Range) {
        self.return_type = self.prototype(&function.prototype.data, range);
        self.statement(&function.body);
        self.return_type = None;
    }

    fn prototype(&mut self, prototype: &FunctionPrototype, range: Range) -> Option<GlslType> {
        for param in prototype.parameters() {
            if let Some(GlslType::Void) = self.resolve(&param.ty, &param.array, range) {
                self.error(range, "parameters cannot be `void`");
            }
        }
        self.resolve(
            &prototype.return_type.specifier,
            &ArraySpecifier::None,
            range,
        )
    }

    fn declaration(&mut self, declaration: &Declaration, range: Range) {
        match declaration {
            Declaration::Variables(list) => {
                let constant = list.ty.is_const();
                for declarator in &list.declarators {
                    let declarator = &declarator.data;
                    let ty = self.resolve(&list.ty.specifier, &declarator.array, range);
                    if ty == Some(GlslType::Void) {
                        self.error(range, format!("variable `{}` cannot be `void`", declarator.name));
                    }
                    let Some(initializer) = &declarator.initializer else {
                        if constant {
                            self.error(
                                range,
                                format!("constant `{}` must be initialized", declarator.name),
                            );
                        }
                        continue;
                    };
                    let value = self.infer(initializer);
                    if let (Some(ty), Some(value)) = (ty, value) {
                        if !assignable(&ty, &value) {
                            self.error(
                                initializer.range,
                                format!("cannot initialize `{ty}` with `{value}`"),
                            );
                        }
                    }
                }
            }
            Declaration::Prototype(prototype) => {
                self.prototype(prototype, range);
            }
            Declaration::Struct(definition) => {
                for field in &definition.fields {
                    for name in &field.data.names {
                        self.resolve(&field.data.ty, &name.data.1, range);
                    }
                }
            }
            Declaration::Precision { .. } | Declaration::Qualifier { .. } => {}
        }
    }

    fn statement(&mut self, stmt: &StmtNode) {
        match &stmt.data {
            Statement::Expr(Some(expr)) => {
                self.infer(expr);
            }
            Statement::Expr(None)
            | Statement::Default
            | Statement::Jump(Jump::Break | Jump::Continue | Jump::Discard) => {}
            Statement::Declaration(declaration) => self.declaration(declaration, stmt.range),
            Statement::Compound(items) => {
                for item in items {
                    self.statement(item);
                }
            }
            Statement::If {
                condition,
                then,
                otherwise,
            } => {
                self.condition(condition);
                self.statement(then);
                if let Some(otherwise) = otherwise {
                    self.statement(otherwise);
                }
            }
            Statement::While { condition, body } | Statement::DoWhile { body, condition } => {
                self.condition(condition);
                self.statement(body);
            }
            Statement::For {
                init,
                condition,
                step,
                body,
            } => {
                self.statement(init);
                if let Some(condition) = condition {
                    self.condition(condition);
                }
                if let Some(step) = step {
                    self.infer(step);
                }
                self.statement(body);
            }
            Statement::Switch { selector, body } => {
                if let Some(ty) = self.infer(selector) {
                    if !ty.is_integral_scalar() {
                        self.error(
                            selector.range,
                            format!("switch selector must be an integer, found `{ty}`"),
                        );
                    }
                }
                for item in body {
                    self.statement(item);
                }
            }
            Statement::Case(label) => {
                self.infer(label);
            }
            Statement::Jump(Jump::Return(value)) => self.return_value(value.as_ref(), stmt.range),
        }
    }

    fn condition(&mut self, condition: &ExprNode) {
        if let Some(ty) = self.infer(condition) {
            if ty != GlslType::BOOL {
                self.error(
                    condition.range,
                    format!("condition must be `bool`, found `{ty}`"),
                );
            }
        }
    }

    fn return_value(&mut self, value: Option<&ExprNode>, range: Range) {
        let expected = self.return_type.clone();
        match (value, expected) {
            (None, Some(expected)) if expected != GlslType::Void => {
                self.error(range, format!("missing return value of type `{expected}`"));
            }
            (Some(value), Some(GlslType::Void)) => {
                self.infer(value);
                self.error(value.range, "`void` function cannot return a value");
            }
            (Some(value), Some(expected)) => {
                if let Some(actual) = self.infer(value) {
                    if !assignable(&expected, &actual) {
                        self.error(
                            value.range,
                            format!("cannot return `{actual}` from a function returning `{expected}`"),
                        );
                    }
                }
            }
            (Some(value), None) => {
                self.infer(value);
            }
            (None, _) => {}
        }
    }

    // -----------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------

    pub fn infer(&mut self, expr: &ExprNode) -> Option<GlslType> {
        let range = expr.range;
        match &expr.data {
            Expr::Int(literal) => Some(if literal.unsigned {
                GlslType::UINT
            } else {
                GlslType::INT
            }),
            Expr::Float(_) => Some(GlslType::FLOAT),
            Expr::Bool(_) => Some(GlslType::BOOL),
            Expr::Ident(name) => self.variable_type(name, range),
            Expr::Binary {
                op: BinaryOp::Comma,
                left,
                right,
            } => {
                self.infer(left);
                self.infer(right)
            }
            Expr::Binary {
                op: BinaryOp::Index,
                left,
                right,
            } => {
                let target = self.infer(left);
                if let Some(index) = self.infer(right) {
                    if !index.is_integral_scalar() {
                        self.error(
                            right.range,
                            format!("index must be an integer, found `{index}`"),
                        );
                    }
                }
                let target = target?;
                let element = target.indexed();
                if element.is_none() {
                    self.error(range, format!("cannot index into `{target}`"));
                }
                element
            }
            Expr::Binary { op, left, right } => {
                let operands = (left.range, right.range);
                let left = self.infer(left);
                let right = self.infer(right);
                self.binary(*op, &left?, &right?, operands)
            }
            Expr::Unary { op, operand, .. } => {
                let ty = self.infer(operand)?;
                let fits = match op {
                    UnaryOp::Inc | UnaryOp::Dec | UnaryOp::Plus | UnaryOp::Minus => ty.is_numeric(),
                    UnaryOp::Not => ty == GlslType::BOOL,
                    UnaryOp::BitNot => ty.is_integral(),
                };
                if !fits {
                    self.error(range, format!("cannot apply `{}` to `{ty}`", op.as_str()));
                    return None;
                }
                if matches!(op, UnaryOp::Inc | UnaryOp::Dec) {
                    self.require_lvalue(operand);
                }
                Some(ty)
            }
            Expr::Field { target, selector } => {
                let ty = self.infer(target)?;
                match &selector.data {
                    Selector::Member(name) => self.member(&ty, name, range),
                    Selector::Method(call) => {
                        for arg in &call.args {
                            self.infer(arg);
                        }
                        let has_length = matches!(ty, GlslType::Array { .. }) || ty.is_vector();
                        if call.name() == Some("length") && call.args.is_empty() && has_length {
                            Some(GlslType::INT)
                        } else {
                            self.error(
                                range,
                                format!(
                                    "no method `{}` on `{ty}`",
                                    call.name().unwrap_or_default()
                                ),
                            );
                            None
                        }
                    }
                }
            }
            Expr::Assign { op, left, right } => {
                let target = self.infer(left);
                let value = self.infer(right);
                self.require_lvalue(left);
                let (target, value) = (target?, value?);
                let value = match op.0 {
                    None => value,
                    Some(op) => self.binary(op, &target, &value, (left.range, right.range))?,
                };
                if !assignable(&target, &value) {
                    self.error(range, format!("cannot assign `{value}` to `{target}`"));
                }
                Some(target)
            }
            Expr::Conditional {
                condition,
                then,
                otherwise,
            } => {
                self.condition(condition);
                let then = self.infer(then);
                let otherwise = self.infer(otherwise);
                let (then, otherwise) = (then?, otherwise?);
                if then != otherwise {
                    self.error(
                        range,
                        format!("conditional branches differ: `{then}` and `{otherwise}`"),
                    );
                    return None;
                }
                Some(then)
            }
            Expr::Call(call) => self.call(call, range),
            Expr::Error(_) => None,
        }
    }

    fn variable_type(&mut self, name: &str, range: Range) -> Option<GlslType> {
        let tree = self.tree;
        match tree.lookup_at(name, range.start) {
            Some(ScopeItem::Variable(variable)) => {
                self.resolve_quietly(&variable.ty, &variable.array, variable.declared_at)
            }
            Some(ScopeItem::Function(_) | ScopeItem::Struct(_)) => {
                self.error(range, format!("`{name}` is not a variable"));
                None
            }
            None => self.builtins.variable(name).map(|variable| variable.ty.clone()),
        }
    }

    fn binary(
        &mut self,
        op: BinaryOp,
        left: &GlslType,
        right: &GlslType,
        (left_range, right_range): (Range, Range),
    ) -> Option<GlslType> {
        let result = match op {
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div if left.is_numeric() => {
                broadcast(left, right)
            }
            BinaryOp::Mod | BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor
                if left.is_integral() =>
            {
                broadcast(left, right)
            }
            BinaryOp::Shl | BinaryOp::Shr if left.is_integral() && right.is_integral() => {
                let same_size = left.primitive().map(|(_, arity)| arity)
                    == right.primitive().map(|(_, arity)| arity);
                (right.is_scalar() || same_size).then(|| left.clone())
            }
            BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge => {
                (left.is_numeric() && left.is_scalar() && left == right).then_some(GlslType::BOOL)
            }
            BinaryOp::Eq | BinaryOp::Ne => (left == right).then_some(GlslType::BOOL),
            BinaryOp::And | BinaryOp::Or | BinaryOp::Xor => {
                (*left == GlslType::BOOL && *right == GlslType::BOOL).then_some(GlslType::BOOL)
            }
            BinaryOp::Comma => Some(right.clone()),
            _ => None,
        };
        if result.is_some() {
            return result;
        }
        // Blame the left operand when the operator cannot take it at all,
        // otherwise the right one for not matching it.
        let left_fits = match op {
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => left.is_numeric(),
            BinaryOp::Mod
            | BinaryOp::BitAnd
            | BinaryOp::BitOr
            | BinaryOp::BitXor
            | BinaryOp::Shl
            | BinaryOp::Shr => left.is_integral(),
            BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge => {
                left.is_numeric() && left.is_scalar()
            }
            BinaryOp::And | BinaryOp::Or | BinaryOp::Xor => *left == GlslType::BOOL,
            _ => true,
        };
        self.error(
            if left_fits { right_range } else { left_range },
            format!("cannot apply `{}` to `{left}` and `{right}`", op.as_str()),
        );
        match op {
            BinaryOp::Lt
            | BinaryOp::Gt
            | BinaryOp::Le
            | BinaryOp::Ge
            | BinaryOp::Eq
            | BinaryOp::Ne
            | BinaryOp::And
            | BinaryOp::Or
            | BinaryOp::Xor => Some(GlslType::BOOL),
            _ => None,
        }
    }

    fn member(&mut self, ty: &GlslType, name: &str, range: Range) -> Option<GlslType> {
        match ty {
            GlslType::Primitive { arity, .. } if *arity > 1 => match swizzle(*arity, name) {
                Some(indices) => ty.with_arity(indices.len() as u8),
                None => {
                    self.error(range, format!("invalid swizzle `{name}` on `{ty}`"));
                    None
                }
            },
            GlslType::Struct(struct_name) => {
                let tree = self.tree;
                let definition = tree.struct_at(struct_name, range.start)?;
                let field = definition.fields.iter().find_map(|field| {
                    field
                        .data
                        .names
                        .iter()
                        .find(|declared| declared.data.0 == name)
                        .map(|declared| (&field.data.ty, &declared.data.1))
                });
                match field {
                    Some((field_ty, array)) => self.resolve_quietly(field_ty, array, range.start),
                    None => {
                        self.error(range, format!("no field `{name}` on `{struct_name}`"));
                        None
                    }
                }
            }
            _ => {
                self.error(range, format!("`{ty}` has no fields"));
                None
            }
        }
    }

    fn call(&mut self, call: &FunctionCall, range: Range) -> Option<GlslType> {
        let args: Vec<Option<GlslType>> = call.args.iter().map(|arg| self.infer(arg)).collect();
        let name = match &call.callee.data {
            Callee::Type(specifier) => {
                return self.resolve(specifier, &ArraySpecifier::None, range);
            }
            Callee::Name(name) => name,
        };
        let tree = self.tree;
        match tree.lookup_at(name, range.start) {
            // Arguments are not matched against parameters; the first
            // declared overload decides the result type.
            Some(ScopeItem::Function(overloads)) => {
                let overload = overloads.first()?;
                let return_type = &overload.prototype.return_type.specifier;
                self.resolve_quietly(return_type, &ArraySpecifier::None, overload.declared_at)
            }
            Some(ScopeItem::Struct(_)) => Some(GlslType::Struct(name.clone())),
            Some(ScopeItem::Variable(_)) => {
                self.error(range, format!("`{name}` is not a function"));
                None
            }
            None => match self.builtins.function(name) {
                Some(builtin) => {
                    let args: Option<Vec<GlslType>> = args.into_iter().collect();
                    builtin.returns.apply(&args?)
                }
                None => {
                    self.error(range, format!("unknown function `{name}`"));
                    None
                }
            },
        }
    }

    fn require_lvalue(&mut self, expr: &ExprNode) {
        if let Err(why) = self.lvalue(expr) {
            self.error(expr.range, why);
        }
    }

    fn lvalue(&mut self, expr: &ExprNode) -> Result<(), String> {
        match &expr.data {
            Expr::Ident(name) => match self.tree.lookup_at(name, expr.range.start) {
                Some(ScopeItem::Variable(variable)) if variable.constant => {
                    Err(format!("cannot assign to constant `{name}`"))
                }
                Some(ScopeItem::Variable(_)) => Ok(()),
                Some(_) => Err(format!("cannot assign to `{name}`")),
                None => match self.builtins.variable(name) {
                    Some(variable) if variable.constant => {
                        Err(format!("cannot assign to read-only `{name}`"))
                    }
                    _ => Ok(()),
                },
            },
            Expr::Field { target, selector } => {
                if let Selector::Member(name) = &selector.data {
                    let letters: Vec<char> = name.chars().collect();
                    let repeats = letters
                        .iter()
                        .enumerate()
                        .any(|(at, letter)| letters[..at].contains(letter));
                    if repeats {
                        return Err(format!("swizzle `{name}` repeats a component"));
                    }
                }
                self.lvalue(target)
            }
            Expr::Binary {
                op: BinaryOp::Index,
                left,
                ..
            } => self.lvalue(left),
            Expr::Conditional {
                condition,
                then,
                otherwise,
            } => {
                if self.constants.evaluate(condition).as_bool().is_none() {
                    return Err("conditional assignment target needs a constant condition".to_string());
                }
                self.lvalue(then)?;
                self.lvalue(otherwise)
            }
            Expr::Error(_) => Ok(()),
            _ => Err("expression is not assignable".to_string()),
        }
    }
}

impl TypeContext for TypeChecker<'_> {
    fn is_struct(&self, name: &str) -> bool {
        self.tree.struct_at(name, self.position).is_some()
    }

    fn array_size(&mut self, size: &ExprNode) -> Result<Option<usize>, TypeError> {
        self.constants.array_size(size)
    }
}

/// Whether a value of type `value` can be stored where `target` is
/// expected. Arrays of unknown size match any size.
fn assignable(target: &GlslType, value: &GlslType) -> bool {
    match (target, value) {
        (
            GlslType::Array {
                element: target_element,
                size: target_size,
            },
            GlslType::Array {
                element: value_element,
                size: value_size,
            },
        ) => {
            assignable(target_element, value_element)
                && (target_size.is_none() || value_size.is_none() || target_size == value_size)
        }
        _ => target == value,
    }
}

// ---------------------------------------------------------------------
// Name existence
// ---------------------------------------------------------------------

struct NameCheck<'a> {
    tree: &'a ScopeTree,
    builtins: &'a Builtins,
    diagnostics: Vec<Diagnostic>,
}

impl Visit for NameCheck<'_> {
    fn visit_expr(&mut self, expr: &ExprNode) {
        if let Expr::Ident(name) = &expr.data {
            let known = self.tree.lookup_at(name, expr.range.start).is_some()
                || self.builtins.variable(name).is_some();
            if !known {
                self.diagnostics.push(Diagnostic::new(
                    expr.range,
                    format!("unknown identifier `{name}`"),
                ));
            }
        }
        walk_expr(self, expr);
    }
}

/// Report identifiers that resolve to nothing at the point of use.
pub fn check_names(unit: &TranslationUnit, tree: &ScopeTree, builtins: &Builtins) -> Vec<Diagnostic> {
    let mut check = NameCheck {
        tree,
        builtins,
        diagnostics: Vec::new(),
    };
    for external in &unit.declarations {
        check.visit_external(external);
    }
    check.diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse, parse_expression};
    use crate::types::PrimitiveKind;

    fn type_of(source: &str) -> TypeCheckResult {
        let unit = TranslationUnit::default();
        let tree = ScopeTree::build(&unit);
        let expr = parse_expression(source).expect("parse");
        typecheck_expr(&expr, &unit, &tree, &Builtins::new())
    }

    fn check(source: &str) -> Vec<String> {
        let unit = parse(source).expect("parse");
        let tree = ScopeTree::build(&unit);
        typecheck_unit(&unit, &tree, &Builtins::new())
            .into_iter()
            .map(|diagnostic| diagnostic.why)
            .collect()
    }

    #[test]
    fn mixed_kinds_do_not_add() {
        let result = type_of("1.0 + 2");
        assert_eq!(result.ty, None);
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(
            result.diagnostics[0].why,
            "cannot apply `+` to `float` and `int`"
        );
    }

    #[test]
    fn scalars_broadcast_over_vectors() {
        let result = type_of("vec2(1.0) + 1.0");
        assert!(result.diagnostics.is_empty());
        assert_eq!(result.ty, Some(GlslType::vector(PrimitiveKind::Float, 2)));
    }

    #[test]
    fn vector_sizes_must_match() {
        let result = type_of("ivec3(1) & ivec2(1)");
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.ty, None);
    }

    #[test]
    fn infers_builtin_calls_and_swizzles() {
        let result = type_of("dot(vec3(1.0), vec3(2.0)) * vec4(1.0).xyz");
        assert!(result.diagnostics.is_empty());
        assert_eq!(result.ty, Some(GlslType::vector(PrimitiveKind::Float, 3)));
        assert_eq!(type_of("1 < 2 && true").ty, Some(GlslType::BOOL));
        assert_eq!(type_of("(1u << 3) | 4u").ty, Some(GlslType::UINT));
    }

    #[test]
    fn accepts_a_well_typed_shader() {
        let source = "\
struct Light { vec3 color; float power; };
uniform Light light;
const int COUNT = 2;
float scale(float x) { return x * light.power; }
void main() {
    vec3 c = light.color * scale(2.0);
    float a[COUNT] = float[2](1.0, 2.0);
    for (int i = 0; i < COUNT; i++) { c += a[i]; }
    gl_FragColor = vec4(c, 1.0);
}
";
        assert_eq!(check(source), Vec::<String>::new());
    }

    #[test]
    fn reports_every_problem() {
        let source = "\
const float k;
float f(float x) { return x > 1.0; }
void main() {
    int i = 1.0;
    vec3 v = vec3(1.0);
    v.xx = vec2(1.0);
    v.w;
    if (i) {}
    mat3 m;
    k = 2.0;
    undefined_fn(1);
    return 1;
}
";
        let diagnostics = check(source);
        let expected = [
            "constant `k` must be initialized",
            "cannot return `bool` from a function returning `float`",
            "cannot initialize `int` with `float`",
            "swizzle `xx` repeats a component",
            "invalid swizzle `w` on `vec3`",
            "condition must be `bool`, found `int`",
            "type `mat3` is not yet supported",
            "cannot assign to constant `k`",
            "unknown function `undefined_fn`",
            "`void` function cannot return a value",
        ];
        assert_eq!(diagnostics, expected);
    }

    #[test]
    fn operand_mismatch_points_at_the_operand() {
        let result = type_of("1.0 + 2");
        assert_eq!(result.diagnostics[0].start, 6);
        assert_eq!(result.diagnostics[0].end, 7);
        let result = type_of("true * 2");
        assert_eq!(result.diagnostics[0].start, 0);
        assert_eq!(result.diagnostics[0].end, 4);
    }

    #[test]
    fn conditional_targets_need_a_constant_condition() {
        let source = "\
const bool FIRST = true;
void main() {
    float a = 0.0;
    float b = 0.0;
    bool pick = a < b;
    (FIRST ? a : b) = 1.0;
    (pick ? a : b) = 2.0;
}
";
        assert_eq!(
            check(source),
            ["conditional assignment target needs a constant condition"]
        );
    }

    #[test]
    fn finds_unknown_names_separately() {
        let source = "void main() { float a = b; c = gl_FragCoord.x; }";
        let unit = parse(source).expect("parse");
        let tree = ScopeTree::build(&unit);
        let builtins = Builtins::new();
        let names: Vec<String> = check_names(&unit, &tree, &builtins)
            .into_iter()
            .map(|diagnostic| diagnostic.why)
            .collect();
        assert_eq!(names, ["unknown identifier `b`", "unknown identifier `c`"]);
        assert!(typecheck_unit(&unit, &tree, &builtins).is_empty());
    }
}
