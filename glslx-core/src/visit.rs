//! Tree traversals over the syntax tree.
//!
//! [`Visit`] walks a tree by shared reference and [`VisitMut`] rewrites one in
//! place. Both come with `walk_*` functions holding the default recursion, so
//! an implementation overrides the node categories it cares about and calls
//! back into the matching `walk_*` to keep descending.
//!
//! On top of those sit the name utilities used by the language service and
//! the bundler: scope-aware identifier mapping, renaming, and the symbols a
//! top-level declaration defines and uses.

use std::collections::HashSet;

use crate::ast::{
    ArraySpecifier, Callee, Declaration, Expr, ExprNode, ExternalDeclaration, ExternalNode,
    FullySpecifiedType, FunctionCall, FunctionDefinition, FunctionPrototype, Jump, Selector,
    Statement, StmtNode, TranslationUnit, TypeName, TypeSpecifier,
};

// ---------------------------------------------------------------------
// Shared-reference traversal
// ---------------------------------------------------------------------

pub trait Visit {
    fn visit_expr(&mut self, expr: &ExprNode) {
        walk_expr(self, expr);
    }

    fn visit_stmt(&mut self, stmt: &StmtNode) {
        walk_stmt(self, stmt);
    }

    fn visit_declaration(&mut self, declaration: &Declaration) {
        walk_declaration(self, declaration);
    }

    fn visit_type_specifier(&mut self, ty: &TypeSpecifier) {
        walk_type_specifier(self, ty);
    }

    fn visit_function(&mut self, function: &FunctionDefinition) {
        walk_function(self, function);
    }

    fn visit_external(&mut self, external: &ExternalNode) {
        walk_external(self, external);
    }
}

pub fn walk_expr<V: Visit + ?Sized>(visitor: &mut V, expr: &ExprNode) {
    match &expr.data {
        Expr::Int(_) | Expr::Float(_) | Expr::Bool(_) | Expr::Ident(_) | Expr::Error(_) => {}
        Expr::Binary { left, right, .. } | Expr::Assign { left, right, .. } => {
            visitor.visit_expr(left);
            visitor.visit_expr(right);
        }
        Expr::Unary { operand, .. } => visitor.visit_expr(operand),
        Expr::Field { target, selector } => {
            visitor.visit_expr(target);
            if let Selector::Method(call) = &selector.data {
                walk_call(visitor, call);
            }
        }
        Expr::Conditional {
            condition,
            then,
            otherwise,
        } => {
            visitor.visit_expr(condition);
            visitor.visit_expr(then);
            visitor.visit_expr(otherwise);
        }
        Expr::Call(call) => walk_call(visitor, call),
    }
}

fn walk_call<V: Visit + ?Sized>(visitor: &mut V, call: &FunctionCall) {
    if let Callee::Type(ty) = &call.callee.data {
        visitor.visit_type_specifier(ty);
    }
    for arg in &call.args {
        visitor.visit_expr(arg);
    }
}

fn walk_array<V: Visit + ?Sized>(visitor: &mut V, array: &ArraySpecifier) {
    if let ArraySpecifier::Sized(size) = array {
        visitor.visit_expr(size);
    }
}

pub fn walk_type_specifier<V: Visit + ?Sized>(visitor: &mut V, ty: &TypeSpecifier) {
    walk_array(visitor, &ty.array);
}

fn walk_prototype<V: Visit + ?Sized>(visitor: &mut V, prototype: &FunctionPrototype) {
    visitor.visit_type_specifier(&prototype.return_type.specifier);
    for param in &prototype.params {
        visitor.visit_type_specifier(&param.data.ty);
        walk_array(visitor, &param.data.array);
    }
}

pub fn walk_declaration<V: Visit + ?Sized>(visitor: &mut V, declaration: &Declaration) {
    match declaration {
        Declaration::Prototype(prototype) => walk_prototype(visitor, prototype),
        Declaration::Variables(list) => {
            visitor.visit_type_specifier(&list.ty.specifier);
            for declarator in &list.declarators {
                walk_array(visitor, &declarator.data.array);
                if let Some(initializer) = &declarator.data.initializer {
                    visitor.visit_expr(initializer);
                }
            }
        }
        Declaration::Precision { ty, .. } => visitor.visit_type_specifier(ty),
        Declaration::Struct(definition) => {
            for field in &definition.fields {
                visitor.visit_type_specifier(&field.data.ty);
                for name in &field.data.names {
                    walk_array(visitor, &name.data.1);
                }
            }
        }
        Declaration::Qualifier { .. } => {}
    }
}

pub fn walk_stmt<V: Visit + ?Sized>(visitor: &mut V, stmt: &StmtNode) {
    match &stmt.data {
        Statement::Expr(expr) => {
            if let Some(expr) = expr {
                visitor.visit_expr(expr);
            }
        }
        Statement::Declaration(declaration) => visitor.visit_declaration(declaration),
        Statement::Compound(items) => {
            for item in items {
                visitor.visit_stmt(item);
            }
        }
        Statement::Switch { selector, body } => {
            visitor.visit_expr(selector);
            for item in body {
                visitor.visit_stmt(item);
            }
        }
        Statement::If {
            condition,
            then,
            otherwise,
        } => {
            visitor.visit_expr(condition);
            visitor.visit_stmt(then);
            if let Some(otherwise) = otherwise {
                visitor.visit_stmt(otherwise);
            }
        }
        Statement::While { condition, body } => {
            visitor.visit_expr(condition);
            visitor.visit_stmt(body);
        }
        Statement::DoWhile { body, condition } => {
            visitor.visit_stmt(body);
            visitor.visit_expr(condition);
        }
        Statement::For {
            init,
            condition,
            step,
            body,
        } => {
            visitor.visit_stmt(init);
            if let Some(condition) = condition {
                visitor.visit_expr(condition);
            }
            if let Some(step) = step {
                visitor.visit_expr(step);
            }
            visitor.visit_stmt(body);
        }
        Statement::Case(label) => visitor.visit_expr(label),
        Statement::Jump(Jump::Return(Some(value))) => visitor.visit_expr(value),
        Statement::Default | Statement::Jump(_) => {}
    }
}

pub fn walk_function<V: Visit + ?Sized>(visitor: &mut V, function: &FunctionDefinition) {
    walk_prototype(visitor, &function.prototype.data);
    visitor.visit_stmt(&function.body);
}

pub fn walk_external<V: Visit + ?Sized>(visitor: &mut V, external: &ExternalNode) {
    match &external.data {
        ExternalDeclaration::Function(function) => visitor.visit_function(function),
        ExternalDeclaration::Declaration(declaration) => visitor.visit_declaration(declaration),
        ExternalDeclaration::Import(_) => {}
    }
}

// ---------------------------------------------------------------------
// In-place rewriting traversal
// ---------------------------------------------------------------------

pub trait VisitMut {
    fn visit_expr_mut(&mut self, expr: &mut ExprNode) {
        walk_expr_mut(self, expr);
    }

    fn visit_stmt_mut(&mut self, stmt: &mut StmtNode) {
        walk_stmt_mut(self, stmt);
    }

    fn visit_declaration_mut(&mut self, declaration: &mut Declaration) {
        walk_declaration_mut(self, declaration);
    }

    fn visit_type_specifier_mut(&mut self, ty: &mut TypeSpecifier) {
        walk_type_specifier_mut(self, ty);
    }

    fn visit_function_mut(&mut self, function: &mut FunctionDefinition) {
        walk_function_mut(self, function);
    }

    fn visit_external_mut(&mut self, external: &mut ExternalNode) {
        walk_external_mut(self, external);
    }
}

pub fn walk_expr_mut<V: VisitMut + ?Sized>(visitor: &mut V, expr: &mut ExprNode) {
    match &mut expr.data {
        Expr::Int(_) | Expr::Float(_) | Expr::Bool(_) | Expr::Ident(_) | Expr::Error(_) => {}
        Expr::Binary { left, right, .. } | Expr::Assign { left, right, .. } => {
            visitor.visit_expr_mut(left);
            visitor.visit_expr_mut(right);
        }
        Expr::Unary { operand, .. } => visitor.visit_expr_mut(operand),
        Expr::Field { target, selector } => {
            visitor.visit_expr_mut(target);
            if let Selector::Method(call) = &mut selector.data {
                walk_call_mut(visitor, call);
            }
        }
        Expr::Conditional {
            condition,
            then,
            otherwise,
        } => {
            visitor.visit_expr_mut(condition);
            visitor.visit_expr_mut(then);
            visitor.visit_expr_mut(otherwise);
        }
        Expr::Call(call) => walk_call_mut(visitor, call),
    }
}

fn walk_call_mut<V: VisitMut + ?Sized>(visitor: &mut V, call: &mut FunctionCall) {
    if let Callee::Type(ty) = &mut call.callee.data {
        visitor.visit_type_specifier_mut(ty);
    }
    for arg in &mut call.args {
        visitor.visit_expr_mut(arg);
    }
}

fn walk_array_mut<V: VisitMut + ?Sized>(visitor: &mut V, array: &mut ArraySpecifier) {
    if let ArraySpecifier::Sized(size) = array {
        visitor.visit_expr_mut(size);
    }
}

pub fn walk_type_specifier_mut<V: VisitMut + ?Sized>(visitor: &mut V, ty: &mut TypeSpecifier) {
    walk_array_mut(visitor, &mut ty.array);
}

pub fn walk_declaration_mut<V: VisitMut + ?Sized>(visitor: &mut V, declaration: &mut Declaration) {
    match declaration {
        Declaration::Prototype(prototype) => {
            visitor.visit_type_specifier_mut(&mut prototype.return_type.specifier);
            for param in &mut prototype.params {
                visitor.visit_type_specifier_mut(&mut param.data.ty);
                walk_array_mut(visitor, &mut param.data.array);
            }
        }
        Declaration::Variables(list) => {
            visitor.visit_type_specifier_mut(&mut list.ty.specifier);
            for declarator in &mut list.declarators {
                walk_array_mut(visitor, &mut declarator.data.array);
                if let Some(initializer) = &mut declarator.data.initializer {
                    visitor.visit_expr_mut(initializer);
                }
            }
        }
        Declaration::Precision { ty, .. } => visitor.visit_type_specifier_mut(ty),
        Declaration::Struct(definition) => {
            for field in &mut definition.fields {
                visitor.visit_type_specifier_mut(&mut field.data.ty);
                for name in &mut field.data.names {
                    walk_array_mut(visitor, &mut name.data.1);
                }
            }
        }
        Declaration::Qualifier { .. } => {}
    }
}

pub fn walk_stmt_mut<V: VisitMut + ?Sized>(visitor: &mut V, stmt: &mut StmtNode) {
    match &mut stmt.data {
        Statement::Expr(expr) => {
            if let Some(expr) = expr {
                visitor.visit_expr_mut(expr);
            }
        }
        Statement::Declaration(declaration) => visitor.visit_declaration_mut(declaration),
        Statement::Compound(items) => {
            for item in items {
                visitor.visit_stmt_mut(item);
            }
        }
        Statement::Switch { selector, body } => {
            visitor.visit_expr_mut(selector);
            for item in body {
                visitor.visit_stmt_mut(item);
            }
        }
        Statement::If {
            condition,
            then,
            otherwise,
        } => {
            visitor.visit_expr_mut(condition);
            visitor.visit_stmt_mut(then);
            if let Some(otherwise) = otherwise {
                visitor.visit_stmt_mut(otherwise);
            }
        }
        Statement::While { condition, body } => {
            visitor.visit_expr_mut(condition);
            visitor.visit_stmt_mut(body);
        }
        Statement::DoWhile { body, condition } => {
            visitor.visit_stmt_mut(body);
            visitor.visit_expr_mut(condition);
        }
        Statement::For {
            init,
            condition,
            step,
            body,
        } => {
            visitor.visit_stmt_mut(init);
            if let Some(condition) = condition {
                visitor.visit_expr_mut(condition);
            }
            if let Some(step) = step {
                visitor.visit_expr_mut(step);
            }
            visitor.visit_stmt_mut(body);
        }
        Statement::Case(label) => visitor.visit_expr_mut(label),
        Statement::Jump(Jump::Return(Some(value))) => visitor.visit_expr_mut(value),
        Statement::Default | Statement::Jump(_) => {}
    }
}

pub fn walk_function_mut<V: VisitMut + ?Sized>(visitor: &mut V, function: &mut FunctionDefinition) {
    let prototype = &mut function.prototype.data;
    visitor.visit_type_specifier_mut(&mut prototype.return_type.specifier);
    for param in &mut prototype.params {
        visitor.visit_type_specifier_mut(&mut param.data.ty);
        walk_array_mut(visitor, &mut param.data.array);
    }
    visitor.visit_stmt_mut(&mut function.body);
}

pub fn walk_external_mut<V: VisitMut + ?Sized>(visitor: &mut V, external: &mut ExternalNode) {
    match &mut external.data {
        ExternalDeclaration::Function(function) => visitor.visit_function_mut(function),
        ExternalDeclaration::Declaration(declaration) => visitor.visit_declaration_mut(declaration),
        ExternalDeclaration::Import(_) => {}
    }
}

/// Anything a traversal can start from.
pub trait Walk {
    fn walk<V: Visit + ?Sized>(&self, visitor: &mut V);
    fn walk_mut<V: VisitMut + ?Sized>(&mut self, visitor: &mut V);
}

impl Walk for ExprNode {
    fn walk<V: Visit + ?Sized>(&self, visitor: &mut V) {
        visitor.visit_expr(self);
    }

    fn walk_mut<V: VisitMut + ?Sized>(&mut self, visitor: &mut V) {
        visitor.visit_expr_mut(self);
    }
}

impl Walk for StmtNode {
    fn walk<V: Visit + ?Sized>(&self, visitor: &mut V) {
        visitor.visit_stmt(self);
    }

    fn walk_mut<V: VisitMut + ?Sized>(&mut self, visitor: &mut V) {
        visitor.visit_stmt_mut(self);
    }
}

impl Walk for ExternalNode {
    fn walk<V: Visit + ?Sized>(&self, visitor: &mut V) {
        visitor.visit_external(self);
    }

    fn walk_mut<V: VisitMut + ?Sized>(&mut self, visitor: &mut V) {
        visitor.visit_external_mut(self);
    }
}

impl Walk for TranslationUnit {
    fn walk<V: Visit + ?Sized>(&self, visitor: &mut V) {
        for declaration in &self.declarations {
            visitor.visit_external(declaration);
        }
    }

    fn walk_mut<V: VisitMut + ?Sized>(&mut self, visitor: &mut V) {
        for declaration in &mut self.declarations {
            visitor.visit_external_mut(declaration);
        }
    }
}

// ---------------------------------------------------------------------
// Names
// ---------------------------------------------------------------------

/// Where a name occurrence resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// A parameter or a declaration inside a function or block.
    Local,
    /// Anything not declared in an enclosing local scope: globals of the
    /// file, imported symbols and builtins.
    Global,
}

/// One occurrence of a name handed to a [`map_names`] callback.
#[derive(Debug, Clone, Copy)]
pub struct NameRef<'a> {
    pub name: &'a str,
    pub binding: Binding,
    /// The occurrence declares the name rather than using it.
    pub defines: bool,
}

/// Rewrite every identifier-like name under `node`: variables, function
/// names, struct type names and declared names. Struct field names, swizzles
/// and method names are not names in this sense and are left alone.
///
/// `f` returns the replacement for an occurrence, or `None` to keep it.
/// Scoping is tracked so that `f` can tell locals from globals.
pub fn map_names<W, F>(node: &mut W, f: F)
where
    W: Walk + ?Sized,
    F: FnMut(NameRef<'_>) -> Option<String>,
{
    let mut mapper = NameMapper {
        scopes: Vec::new(),
        f,
    };
    node.walk_mut(&mut mapper);
}

/// Rename every occurrence of `from` to `to`, regardless of scoping.
pub fn rename_identifiers<W: Walk + ?Sized>(node: &mut W, from: &str, to: &str) {
    map_names(node, |occurrence| {
        (occurrence.name == from).then(|| to.to_string())
    });
}

struct NameMapper<F> {
    /// Original names declared in each open local scope.
    scopes: Vec<HashSet<String>>,
    f: F,
}

impl<F: FnMut(NameRef<'_>) -> Option<String>> NameMapper<F> {
    fn apply(&mut self, name: &mut String, binding: Binding, defines: bool) {
        let occurrence = NameRef {
            name,
            binding,
            defines,
        };
        if let Some(replacement) = (self.f)(occurrence) {
            *name = replacement;
        }
    }

    fn reference(&mut self, name: &mut String) {
        let binding = if self.scopes.iter().any(|scope| scope.contains(name.as_str())) {
            Binding::Local
        } else {
            Binding::Global
        };
        self.apply(name, binding, false);
    }

    fn define(&mut self, name: &mut String) {
        let binding = match self.scopes.last_mut() {
            Some(scope) => {
                scope.insert(name.clone());
                Binding::Local
            }
            None => Binding::Global,
        };
        self.apply(name, binding, true);
    }

    fn prototype(&mut self, prototype: &mut FunctionPrototype) {
        self.visit_type_specifier_mut(&mut prototype.return_type.specifier);
        self.define(&mut prototype.name);
        self.scopes.push(HashSet::new());
        for param in &mut prototype.params {
            self.visit_type_specifier_mut(&mut param.data.ty);
            walk_array_mut(self, &mut param.data.array);
            if let Some(name) = &mut param.data.name {
                self.define(name);
            }
        }
    }
}

impl<F: FnMut(NameRef<'_>) -> Option<String>> VisitMut for NameMapper<F> {
    fn visit_expr_mut(&mut self, expr: &mut ExprNode) {
        match &mut expr.data {
            Expr::Ident(name) => self.reference(name),
            Expr::Call(FunctionCall {
                callee:
                    crate::ast::Commented {
                        data: Callee::Name(name),
                        ..
                    },
                ..
            }) => self.reference(name),
            _ => {}
        }
        walk_expr_mut(self, expr);
    }

    fn visit_type_specifier_mut(&mut self, ty: &mut TypeSpecifier) {
        if let TypeName::Named(name) = &mut ty.name.data {
            self.reference(name);
        }
        walk_type_specifier_mut(self, ty);
    }

    fn visit_stmt_mut(&mut self, stmt: &mut StmtNode) {
        let scoped = stmt.data.owns_scope();
        if scoped {
            self.scopes.push(HashSet::new());
        }
        walk_stmt_mut(self, stmt);
        if scoped {
            self.scopes.pop();
        }
    }

    fn visit_function_mut(&mut self, function: &mut FunctionDefinition) {
        self.prototype(&mut function.prototype.data);
        self.visit_stmt_mut(&mut function.body);
        self.scopes.pop();
    }

    fn visit_declaration_mut(&mut self, declaration: &mut Declaration) {
        match declaration {
            Declaration::Prototype(prototype) => {
                self.prototype(prototype);
                self.scopes.pop();
            }
            Declaration::Variables(list) => {
                self.visit_type_specifier_mut(&mut list.ty.specifier);
                for declarator in &mut list.declarators {
                    walk_array_mut(self, &mut declarator.data.array);
                    if let Some(initializer) = &mut declarator.data.initializer {
                        self.visit_expr_mut(initializer);
                    }
                    self.define(&mut declarator.data.name);
                }
            }
            Declaration::Struct(definition) => {
                self.define(&mut definition.name);
                for field in &mut definition.fields {
                    self.visit_type_specifier_mut(&mut field.data.ty);
                    for name in &mut field.data.names {
                        walk_array_mut(self, &mut name.data.1);
                    }
                }
            }
            Declaration::Precision { ty, .. } => self.visit_type_specifier_mut(ty),
            Declaration::Qualifier { names, .. } => {
                for name in names {
                    self.reference(&mut name.data);
                }
            }
        }
    }
}

/// Names a top-level declaration introduces into the global scope, in
/// declaration order.
pub fn defined_symbols(external: &ExternalNode) -> Vec<String> {
    match &external.data {
        ExternalDeclaration::Function(function) => vec![function.prototype.data.name.clone()],
        ExternalDeclaration::Declaration(declaration) => declared_names(declaration),
        ExternalDeclaration::Import(_) => Vec::new(),
    }
}

pub(crate) fn declared_names(declaration: &Declaration) -> Vec<String> {
    match declaration {
        Declaration::Prototype(prototype) => vec![prototype.name.clone()],
        Declaration::Variables(list) => list
            .declarators
            .iter()
            .map(|declarator| declarator.data.name.clone())
            .collect(),
        Declaration::Struct(definition) => vec![definition.name.clone()],
        Declaration::Precision { .. } | Declaration::Qualifier { .. } => Vec::new(),
    }
}

/// Global names a top-level declaration refers to without declaring them
/// itself, in first-use order. Builtins are included; callers filter them
/// against what they know to be defined.
pub fn free_symbols(external: &ExternalNode) -> Vec<String> {
    let defined = defined_symbols(external);
    let mut used = Vec::new();
    let mut copy = external.clone();
    map_names(&mut copy, |occurrence| {
        if occurrence.binding == Binding::Global
            && !occurrence.defines
            && !defined.iter().any(|name| name == occurrence.name)
            && !used.iter().any(|name: &String| name == occurrence.name)
        {
            used.push(occurrence.name.to_string());
        }
        None
    });
    used
}

/// Names declared locally anywhere under `node`: parameters and block
/// declarations, deduplicated, in declaration order.
pub fn local_symbols<W: Walk + Clone>(node: &W) -> Vec<String> {
    let mut locals: Vec<String> = Vec::new();
    let mut copy = node.clone();
    map_names(&mut copy, |occurrence| {
        if occurrence.binding == Binding::Local
            && occurrence.defines
            && !locals.iter().any(|name| name == occurrence.name)
        {
            locals.push(occurrence.name.to_string());
        }
        None
    });
    locals
}

/// Display-oriented summary of a function signature.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionInfo {
    pub name: String,
    pub return_type: FullySpecifiedType,
    pub params: Vec<ParameterInfo>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterInfo {
    pub name: Option<String>,
    /// Parameter type, `in`/`out`/`inout` and array suffix included.
    pub label: String,
    pub ty: TypeSpecifier,
}

impl FunctionInfo {
    /// `float mix(float x, float y, float a)`
    pub fn label(&self) -> String {
        let params: Vec<&str> = self.params.iter().map(|param| param.label.as_str()).collect();
        format!(
            "{} {}({})",
            self.return_type.specifier,
            self.name,
            params.join(", ")
        )
    }
}

pub fn function_info(prototype: &FunctionPrototype) -> FunctionInfo {
    let params = prototype
        .parameters()
        .map(|param| {
            let mut label = String::new();
            if let Some(qualifier) = &param.qualifier {
                for part in &qualifier.parts {
                    if let crate::ast::Qualifier::Storage(storage) = part.data {
                        label.push_str(storage.as_str());
                        label.push(' ');
                    }
                }
            }
            label.push_str(&param.ty.to_string());
            if let Some(name) = &param.name {
                label.push(' ');
                label.push_str(name);
            }
            match &param.array {
                ArraySpecifier::None => {}
                ArraySpecifier::Unsized => label.push_str("[]"),
                ArraySpecifier::Sized(size) => {
                    label.push_str(&format!("[{}]", crate::format::packed_expr(size)));
                }
            }
            ParameterInfo {
                name: param.name.clone(),
                label,
                ty: param.ty.clone(),
            }
        })
        .collect();
    FunctionInfo {
        name: prototype.name.clone(),
        return_type: prototype.return_type.clone(),
        params,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{packed_external, packed_stmt};
    use crate::parser::{parse_declaration, parse_external_declaration, parse_statement};

    #[test]
    fn renames_every_occurrence() {
        let mut stmt = parse_statement("a=a;").expect("parse");
        rename_identifiers(&mut stmt, "a", "b");
        assert_eq!(packed_stmt(&stmt), "b=b;");
    }

    #[test]
    fn renaming_leaves_struct_fields_alone() {
        let mut stmt = parse_declaration("struct a{float a;};").expect("parse");
        rename_identifiers(&mut stmt, "a", "b");
        assert_eq!(packed_stmt(&stmt), "struct b{float a;};");
    }

    #[test]
    fn renaming_leaves_swizzles_and_methods_alone() {
        let mut stmt = parse_statement("x = x.x + x.length();").expect("parse");
        rename_identifiers(&mut stmt, "x", "y");
        assert_eq!(packed_stmt(&stmt), "y=y.x+y.length();");
        rename_identifiers(&mut stmt, "length", "size");
        assert_eq!(packed_stmt(&stmt), "y=y.x+y.length();");
    }

    #[test]
    fn map_names_distinguishes_locals() {
        let mut external =
            parse_external_declaration("float f(float x) { float y = x + g; return y * k; }")
                .expect("parse");
        map_names(&mut external, |occurrence| match occurrence.binding {
            Binding::Local => Some(format!("l_{}", occurrence.name)),
            Binding::Global => None,
        });
        assert_eq!(
            packed_external(&external),
            "float f(float l_x){float l_y=l_x+g;return l_y*k;}"
        );
    }

    #[test]
    fn shadowing_ends_with_the_block() {
        let mut external =
            parse_external_declaration("void f() { { float a = 1.0; a; } a; }").expect("parse");
        map_names(&mut external, |occurrence| {
            (occurrence.binding == Binding::Global && occurrence.name == "a")
                .then(|| "g".to_string())
        });
        assert_eq!(packed_external(&external), "void f(){{float a=1.0;a;}g;}");
    }

    #[test]
    fn collects_defined_and_free_symbols() {
        let external = parse_external_declaration(
            "vec3 shade(Light l, vec3 n) { return helper(l.color) * ambient + n; }",
        )
        .expect("parse");
        assert_eq!(defined_symbols(&external), ["shade"]);
        assert_eq!(
            free_symbols(&external),
            ["Light", "helper", "ambient"]
        );

        let external =
            parse_external_declaration("const float a = 1.0, b = a * scale;").expect("parse");
        assert_eq!(defined_symbols(&external), ["a", "b"]);
        assert_eq!(free_symbols(&external), ["scale"]);
    }

    #[test]
    fn collects_locals() {
        let external = parse_external_declaration(
            "void f(int i) { for (int j = 0; j < i; j++) { float k; } float k; }",
        )
        .expect("parse");
        assert_eq!(local_symbols(&external), ["i", "j", "k"]);
    }

    #[test]
    fn describes_signatures() {
        let external =
            parse_external_declaration("float f(in vec2 p, out float d[2]);").expect("parse");
        let ExternalDeclaration::Declaration(Declaration::Prototype(prototype)) = &external.data
        else {
            panic!("expected prototype");
        };
        let info = function_info(prototype);
        assert_eq!(info.label(), "float f(in vec2 p, out float d[2])");
    }
}
