//! Constant evaluation and statement simulation.
//!
//! The evaluator computes values of expressions over the primitive types,
//! and can step through a function body to show what each variable holds at
//! a given source position. Values it cannot compute become
//! [`Value::Error`], which absorbs every operation it takes part in.
//!
//! Integers are kept with 32-bit wrapping semantics and floats are rounded
//! to single precision after every operation.

use std::fmt;

use crate::ast::{
    ArraySpecifier, BinaryOp, Callee, Commented, Declaration, DeclaratorList, ExprNode, Expr,
    ExternalDeclaration, FunctionCall, Jump, Selector, Statement, StmtNode, TranslationUnit,
    UnaryOp,
};
use crate::scope::{ScopeId, ScopeTree};
use crate::span::Range;
use crate::types::{GlslType, PrimitiveKind, TypeContext, TypeError, resolve_type, swizzle};

/// Loops stop after this many iterations, whatever their condition says.
pub const MAX_LOOP_ITERATIONS: usize = 1000;

/// Arrays with more elements than this become error values once written to.
pub const MAX_ARRAY_LENGTH: usize = 1 << 16;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A scalar or vector; one component per lane, already normalized to the
    /// kind's range.
    Primitive {
        kind: PrimitiveKind,
        components: Vec<f64>,
    },
    Array {
        element: GlslType,
        items: Vec<Value>,
    },
    /// Declared without an initializer, or a function parameter.
    Uninitialized(GlslType),
    Error(String),
}

impl Value {
    pub fn scalar(kind: PrimitiveKind, value: f64) -> Self {
        Value::Primitive {
            kind,
            components: vec![normalize(kind, value)],
        }
    }

    pub fn bool(value: bool) -> Self {
        Value::scalar(PrimitiveKind::Bool, if value { 1.0 } else { 0.0 })
    }

    fn error(message: impl Into<String>) -> Self {
        Value::Error(message.into())
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    pub fn ty(&self) -> Option<GlslType> {
        match self {
            Value::Primitive { kind, components } => {
                Some(GlslType::vector(*kind, components.len() as u8))
            }
            Value::Array { element, items } => {
                Some(GlslType::array(element.clone(), Some(items.len())))
            }
            Value::Uninitialized(ty) => Some(ty.clone()),
            Value::Error(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Primitive {
                kind: PrimitiveKind::Bool,
                components,
            } if components.len() == 1 => Some(components[0] != 0.0),
            _ => None,
        }
    }

    pub fn as_index(&self) -> Option<i64> {
        match self {
            Value::Primitive { kind, components } if kind.is_integral() && components.len() == 1 => {
                Some(components[0] as i64)
            }
            _ => None,
        }
    }
}

fn normalize(kind: PrimitiveKind, value: f64) -> f64 {
    match kind {
        PrimitiveKind::Float => value as f32 as f64,
        PrimitiveKind::Int => value as i64 as i32 as f64,
        PrimitiveKind::Uint => value as i64 as u32 as f64,
        PrimitiveKind::Bool => {
            if value != 0.0 {
                1.0
            } else {
                0.0
            }
        }
    }
}

fn convert(from: PrimitiveKind, to: PrimitiveKind, value: f64) -> f64 {
    match (from, to) {
        (PrimitiveKind::Float, PrimitiveKind::Int | PrimitiveKind::Uint) => {
            normalize(to, value.trunc())
        }
        _ => normalize(to, value),
    }
}

fn component(kind: PrimitiveKind, value: f64) -> String {
    match kind {
        PrimitiveKind::Float => format!("{:?}", value as f32),
        PrimitiveKind::Int | PrimitiveKind::Uint => format!("{}", value as i64),
        PrimitiveKind::Bool => (value != 0.0).to_string(),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Primitive { kind, components } if components.len() == 1 => {
                f.write_str(&component(*kind, components[0]))
            }
            Value::Primitive { kind, components } => {
                let parts: Vec<String> = components.iter().map(|x| component(*kind, *x)).collect();
                let ty = GlslType::vector(*kind, components.len() as u8);
                write!(f, "{ty}({})", parts.join(", "))
            }
            Value::Array { element, items } => {
                let parts: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "{element}[{}]({})", items.len(), parts.join(", "))
            }
            Value::Uninitialized(ty) => write!(f, "uninitialized {ty}"),
            Value::Error(message) => write!(f, "error: {message}"),
        }
    }
}

/// A named value visible to the evaluator.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub name: String,
    /// Declared type; `None` when the declaration itself failed to resolve.
    pub ty: Option<GlslType>,
    pub constant: bool,
    pub value: Value,
}

#[derive(Debug, Clone)]
struct Frame {
    scope: Option<ScopeId>,
    bindings: Vec<Binding>,
}

/// How a statement finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Normal,
    Return,
    /// Execution reached the position being inspected.
    Halt,
}

/// A place that can be assigned to: a variable plus the accesses into it.
enum Access {
    Index(usize),
    Swizzle(Vec<usize>),
}

pub struct Evaluator<'a> {
    scopes: Option<&'a ScopeTree>,
    frames: Vec<Frame>,
    structs: Vec<String>,
    halt_at: Option<usize>,
}

impl Default for Evaluator<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Evaluator<'a> {
    pub fn new() -> Self {
        Evaluator {
            scopes: None,
            frames: vec![Frame {
                scope: None,
                bindings: Vec::new(),
            }],
            structs: Vec::new(),
            halt_at: None,
        }
    }

    /// An evaluator whose frames remember the scope they correspond to.
    pub fn with_scopes(tree: &'a ScopeTree) -> Self {
        let mut evaluator = Self::new();
        evaluator.scopes = Some(tree);
        evaluator.frames[0].scope = Some(ScopeTree::ROOT);
        evaluator
    }

    /// Bind every global variable of `unit` in declaration order.
    pub fn declare_globals(&mut self, unit: &TranslationUnit) {
        for external in &unit.declarations {
            if let ExternalDeclaration::Declaration(declaration) = &external.data {
                self.declaration(declaration);
            }
        }
    }

    /// Scope of the innermost frame.
    pub fn current_scope(&self) -> Option<ScopeId> {
        self.frames.last().and_then(|frame| frame.scope)
    }

    /// Everything visible right now, outermost first; an inner binding
    /// replaces an outer one of the same name in place.
    pub fn bindings(&self) -> Vec<Binding> {
        let mut visible: Vec<Binding> = Vec::new();
        for binding in self.frames.iter().flat_map(|frame| &frame.bindings) {
            match visible.iter_mut().find(|seen| seen.name == binding.name) {
                Some(seen) => *seen = binding.clone(),
                None => visible.push(binding.clone()),
            }
        }
        visible
    }

    pub fn lookup(&self, name: &str) -> Option<&Binding> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.bindings.iter().find(|binding| binding.name == name))
    }

    fn lookup_mut(&mut self, name: &str) -> Option<&mut Binding> {
        self.frames
            .iter_mut()
            .rev()
            .find_map(|frame| frame.bindings.iter_mut().find(|binding| binding.name == name))
    }

    fn bind(&mut self, binding: Binding) {
        let Some(frame) = self.frames.last_mut() else {
            return;
        };
        match frame.bindings.iter_mut().find(|seen| seen.name == binding.name) {
            Some(seen) => *seen = binding,
            None => frame.bindings.push(binding),
        }
    }

    fn declaration(&mut self, declaration: &Declaration) {
        match declaration {
            Declaration::Variables(list) => self.declare(list),
            Declaration::Struct(definition) => self.structs.push(definition.name.clone()),
            Declaration::Prototype(_) | Declaration::Precision { .. } | Declaration::Qualifier { .. } => {}
        }
    }

    fn declare(&mut self, list: &DeclaratorList) {
        let constant = list.ty.is_const();
        for declarator in &list.declarators {
            let declarator = &declarator.data;
            let (ty, value) = match resolve_type(&list.ty.specifier, &declarator.array, self) {
                Ok(ty) => {
                    let value = match &declarator.initializer {
                        Some(initializer) => {
                            let value = self.evaluate(initializer);
                            fit(value, &ty)
                        }
                        None => Value::Uninitialized(ty.clone()),
                    };
                    (Some(ty), value)
                }
                Err(error) => (None, Value::error(error.to_string())),
            };
            self.bind(Binding {
                name: declarator.name.clone(),
                ty,
                constant,
                value,
            });
        }
    }

    // -----------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------

    pub fn evaluate(&mut self, expr: &ExprNode) -> Value {
        match &expr.data {
            Expr::Int(literal) => {
                let kind = if literal.unsigned {
                    PrimitiveKind::Uint
                } else {
                    PrimitiveKind::Int
                };
                Value::scalar(kind, literal.value as f64)
            }
            Expr::Float(literal) => Value::scalar(PrimitiveKind::Float, literal.value as f64),
            Expr::Bool(value) => Value::bool(*value),
            Expr::Ident(name) => match self.lookup(name) {
                Some(binding) => binding.value.clone(),
                None => Value::error(format!("unknown identifier `{name}`")),
            },
            Expr::Binary { op, left, right } => match op {
                BinaryOp::Comma => {
                    self.evaluate(left);
                    self.evaluate(right)
                }
                BinaryOp::And | BinaryOp::Or => {
                    let left = self.evaluate(left);
                    match left.as_bool() {
                        Some(value) if value == (*op == BinaryOp::Or) => Value::bool(value),
                        Some(_) => {
                            let right = self.evaluate(right);
                            match right.as_bool() {
                                Some(value) => Value::bool(value),
                                None => absorb(right, "logical operands must be `bool`"),
                            }
                        }
                        None => absorb(left, "logical operands must be `bool`"),
                    }
                }
                BinaryOp::Index => {
                    let target = self.evaluate(left);
                    let index = self.evaluate(right);
                    index_value(target, index)
                }
                _ => {
                    let left = self.evaluate(left);
                    let right = self.evaluate(right);
                    binary(*op, left, right)
                }
            },
            Expr::Unary {
                op: op @ (UnaryOp::Inc | UnaryOp::Dec),
                postfix,
                operand,
            } => {
                let old = self.evaluate(operand);
                let Some(kind) = old.ty().and_then(|ty| ty.kind()) else {
                    return absorb(old, "`++` and `--` need a numeric operand");
                };
                let step = if *op == UnaryOp::Inc {
                    BinaryOp::Add
                } else {
                    BinaryOp::Sub
                };
                let new = binary(step, old.clone(), Value::scalar(kind, 1.0));
                let stored = self.store(operand, new);
                if *postfix && !stored.is_error() { old } else { stored }
            }
            Expr::Unary { op, operand, .. } => {
                let value = self.evaluate(operand);
                unary(*op, value)
            }
            Expr::Field { target, selector } => {
                let value = self.evaluate(target);
                match &selector.data {
                    Selector::Member(name) => member(value, name),
                    Selector::Method(call) if call.name() == Some("length") && call.args.is_empty() => {
                        length(value)
                    }
                    Selector::Method(call) => Value::error(format!(
                        "unknown method `{}`",
                        call.name().unwrap_or_default()
                    )),
                }
            }
            Expr::Assign { op, left, right } => {
                let right = self.evaluate(right);
                let value = match op.0 {
                    None => right,
                    Some(op) => {
                        let current = self.evaluate(left);
                        binary(op, current, right)
                    }
                };
                self.store(left, value)
            }
            Expr::Conditional {
                condition,
                then,
                otherwise,
            } => {
                let condition = self.evaluate(condition);
                match condition.as_bool() {
                    Some(true) => self.evaluate(then),
                    Some(false) => self.evaluate(otherwise),
                    None => absorb(condition, "condition must be `bool`"),
                }
            }
            Expr::Call(call) => self.call(call),
            Expr::Error(message) => Value::error(message.clone()),
        }
    }

    fn call(&mut self, call: &FunctionCall) -> Value {
        let args: Vec<Value> = call.args.iter().map(|arg| self.evaluate(arg)).collect();
        if let Some(error) = args.iter().find(|arg| arg.is_error()) {
            return error.clone();
        }
        match &call.callee.data {
            Callee::Type(specifier) => match resolve_type(specifier, &ArraySpecifier::None, self) {
                Ok(ty) => construct(&ty, args),
                Err(error) => Value::error(error.to_string()),
            },
            Callee::Name(name) if self.is_struct(name) => {
                Value::error("struct constructors are not yet supported")
            }
            Callee::Name(name) => builtin_call(name, args)
                .unwrap_or_else(|| Value::error(format!("cannot evaluate calls to `{name}`"))),
        }
    }

    /// Assign `value` to the place `target` denotes and return what was
    /// stored.
    fn store(&mut self, target: &ExprNode, value: Value) -> Value {
        let mut path = Vec::new();
        let name = match self.place(target, &mut path) {
            Ok(name) => name,
            Err(error) => return error,
        };
        let Some(binding) = self.lookup_mut(&name) else {
            return Value::error(format!("unknown identifier `{name}`"));
        };
        if binding.constant {
            return Value::error(format!("cannot assign to constant `{name}`"));
        }
        // Vector lanes cannot hold an error, so a mismatch poisons the
        // innermost enclosing variable or array element instead.
        let mut leaf = binding.ty.clone();
        let mut slot_depth = 0;
        for (depth, access) in path.iter().enumerate() {
            if matches!(leaf, Some(GlslType::Array { .. })) {
                slot_depth = depth + 1;
            }
            leaf = leaf.and_then(|ty| narrow(&ty, access));
        }
        let value = match &leaf {
            Some(ty) if !value.is_error() => fit(value, ty),
            _ => value,
        };
        let target = if value.is_error() {
            &path[..slot_depth]
        } else {
            &path[..]
        };
        match write(&mut binding.value, target, value.clone()) {
            Ok(()) => value,
            Err(message) => Value::error(message),
        }
    }

    fn place(&mut self, target: &ExprNode, path: &mut Vec<Access>) -> Result<String, Value> {
        match &target.data {
            Expr::Ident(name) => Ok(name.clone()),
            Expr::Binary {
                op: BinaryOp::Index,
                left,
                right,
            } => {
                let name = self.place(left, path)?;
                let index = self.evaluate(right);
                match index.as_index() {
                    Some(index) if index >= 0 => {
                        path.push(Access::Index(index as usize));
                        Ok(name)
                    }
                    _ => Err(absorb(index, "index must be a non-negative integer")),
                }
            }
            Expr::Field {
                target,
                selector:
                    Commented {
                        data: Selector::Member(selector),
                        ..
                    },
            } => {
                let name = self.place(target, path)?;
                let indices = swizzle(4, selector)
                    .ok_or_else(|| Value::error(format!("invalid swizzle `{selector}`")))?;
                path.push(Access::Swizzle(indices));
                Ok(name)
            }
            Expr::Conditional {
                condition,
                then,
                otherwise,
            } => {
                let condition = self.evaluate(condition);
                match condition.as_bool() {
                    Some(true) => self.place(then, path),
                    Some(false) => self.place(otherwise, path),
                    None => Err(absorb(condition, "condition must be `bool`")),
                }
            }
            _ => Err(Value::error("expression is not assignable")),
        }
    }

    // -----------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------

    pub fn execute(&mut self, stmt: &StmtNode) -> Flow {
        if self.halt_at.is_some_and(|at| stmt.range.start >= at) {
            return Flow::Halt;
        }
        match &stmt.data {
            Statement::Expr(Some(expr)) => {
                self.evaluate(expr);
                Flow::Normal
            }
            Statement::Expr(None) | Statement::Case(_) | Statement::Default => Flow::Normal,
            Statement::Declaration(declaration) => {
                self.declaration(declaration);
                Flow::Normal
            }
            Statement::Compound(items) => self.scoped(stmt.range, |evaluator| {
                for item in items {
                    let flow = evaluator.execute(item);
                    if flow != Flow::Normal {
                        return flow;
                    }
                }
                Flow::Normal
            }),
            Statement::If {
                condition,
                then,
                otherwise,
            } => match self.evaluate(condition).as_bool() {
                Some(true) => self.execute(then),
                Some(false) => match otherwise {
                    Some(otherwise) => self.execute(otherwise),
                    None => Flow::Normal,
                },
                None => Flow::Normal,
            },
            Statement::While { condition, body } => self.scoped(stmt.range, |evaluator| {
                evaluator.repeat(Some(condition), None, body, false)
            }),
            Statement::DoWhile { body, condition } => self.scoped(stmt.range, |evaluator| {
                evaluator.repeat(Some(condition), None, body, true)
            }),
            Statement::For {
                init,
                condition,
                step,
                body,
            } => self.scoped(stmt.range, |evaluator| {
                if evaluator.execute(init) == Flow::Halt {
                    return Flow::Halt;
                }
                evaluator.repeat(condition.as_ref(), step.as_ref(), body, false)
            }),
            Statement::Switch { selector, body } => {
                self.scoped(stmt.range, |evaluator| evaluator.switch(selector, body))
            }
            // Loops and switches are not exited early: a loop runs until its
            // condition fails, a switch runs to its end.
            Statement::Jump(Jump::Break | Jump::Continue) => Flow::Normal,
            Statement::Jump(Jump::Return(value)) => {
                if let Some(value) = value {
                    self.evaluate(value);
                }
                Flow::Return
            }
            Statement::Jump(Jump::Discard) => Flow::Return,
        }
    }

    /// Run `body` in a fresh frame. The frame stays on the stack when
    /// execution halts inside it.
    fn scoped(&mut self, range: Range, body: impl FnOnce(&mut Self) -> Flow) -> Flow {
        let scope = self.scopes.and_then(|tree| tree.scope_for(range));
        self.frames.push(Frame {
            scope,
            bindings: Vec::new(),
        });
        let mut flow = body(self);
        if flow == Flow::Normal
            && self
                .halt_at
                .is_some_and(|at| range.start <= at && at < range.end)
        {
            flow = Flow::Halt;
        }
        if flow != Flow::Halt {
            self.frames.pop();
        }
        flow
    }

    fn holds(&mut self, condition: Option<&ExprNode>) -> bool {
        match condition {
            Some(condition) => self.evaluate(condition).as_bool() == Some(true),
            None => true,
        }
    }

    fn repeat(
        &mut self,
        condition: Option<&ExprNode>,
        step: Option<&ExprNode>,
        body: &StmtNode,
        test_after: bool,
    ) -> Flow {
        for _ in 0..MAX_LOOP_ITERATIONS {
            if !test_after && !self.holds(condition) {
                return Flow::Normal;
            }
            let flow = self.execute(body);
            if flow != Flow::Normal {
                return flow;
            }
            if let Some(step) = step {
                self.evaluate(step);
            }
            if test_after && !self.holds(condition) {
                return Flow::Normal;
            }
        }
        log::debug!("loop stopped after {MAX_LOOP_ITERATIONS} iterations");
        Flow::Normal
    }

    fn switch(&mut self, selector: &ExprNode, body: &[StmtNode]) -> Flow {
        let selected = self.evaluate(selector);
        let mut start = None;
        for (index, item) in body.iter().enumerate() {
            if let Statement::Case(label) = &item.data {
                if self.evaluate(label) == selected {
                    start = Some(index);
                    break;
                }
            }
        }
        let start = start.or_else(|| {
            body.iter()
                .position(|item| matches!(item.data, Statement::Default))
        });
        let Some(start) = start else {
            return Flow::Normal;
        };
        for item in &body[start..] {
            let flow = self.execute(item);
            if flow != Flow::Normal {
                return flow;
            }
        }
        Flow::Normal
    }
}

impl TypeContext for Evaluator<'_> {
    fn is_struct(&self, name: &str) -> bool {
        self.structs.iter().any(|declared| declared == name)
    }

    fn array_size(&mut self, size: &ExprNode) -> Result<Option<usize>, TypeError> {
        let value = self.evaluate(size);
        if value.is_error() {
            return Ok(None);
        }
        match value.as_index() {
            Some(size) if size > 0 => Ok(Some(size as usize)),
            _ => Err(TypeError::BadArraySize),
        }
    }
}

/// Pass errors through, otherwise report `message`.
fn absorb(value: Value, message: &str) -> Value {
    if value.is_error() {
        value
    } else {
        Value::error(message)
    }
}

fn primitive(value: Value) -> Result<(PrimitiveKind, Vec<f64>), Value> {
    match value {
        Value::Primitive { kind, components } => Ok((kind, components)),
        Value::Error(_) => Err(value),
        Value::Uninitialized(ty) => Err(Value::error(format!("use of uninitialized `{ty}` value"))),
        Value::Array { .. } => Err(Value::error("expected a scalar or vector, found an array")),
    }
}

/// Check that a value fits the declared type of its slot.
fn fit(value: Value, ty: &GlslType) -> Value {
    let Some(actual) = value.ty() else {
        return value;
    };
    let fits = match (ty, &actual) {
        (
            GlslType::Array {
                element,
                size: None,
            },
            GlslType::Array {
                element: actual, ..
            },
        ) => element == actual,
        _ => *ty == actual,
    };
    if fits {
        value
    } else {
        Value::error(format!("cannot assign `{actual}` to `{ty}`"))
    }
}

fn write(slot: &mut Value, path: &[Access], value: Value) -> Result<(), String> {
    let Some((first, rest)) = path.split_first() else {
        *slot = value;
        return Ok(());
    };
    if let Value::Uninitialized(ty) = slot {
        let fresh = zeroed(ty);
        *slot = fresh;
    }
    match (first, slot) {
        (Access::Index(index), Value::Array { items, .. }) => match items.get_mut(*index) {
            Some(item) => write(item, rest, value),
            None => Err("index out of range".to_string()),
        },
        (Access::Index(index), Value::Primitive { kind, components }) if rest.is_empty() => {
            let (value_kind, lanes) = primitive(value).map_err(describe)?;
            if value_kind != *kind || lanes.len() != 1 {
                return Err("component assignment needs a matching scalar".to_string());
            }
            match components.get_mut(*index) {
                Some(lane) => {
                    *lane = lanes[0];
                    Ok(())
                }
                None => Err("index out of range".to_string()),
            }
        }
        (Access::Swizzle(indices), Value::Primitive { kind, components }) if rest.is_empty() => {
            let (value_kind, lanes) = primitive(value).map_err(describe)?;
            let distinct = indices
                .iter()
                .enumerate()
                .all(|(at, index)| !indices[..at].contains(index));
            if !distinct || indices.iter().any(|index| *index >= components.len()) {
                return Err("invalid swizzle assignment".to_string());
            }
            if value_kind != *kind || lanes.len() != indices.len() {
                return Err("swizzle assignment needs a matching vector".to_string());
            }
            for (index, lane) in indices.iter().zip(lanes) {
                components[*index] = lane;
            }
            Ok(())
        }
        (_, Value::Error(_)) => Ok(()),
        _ => Err("expression is not assignable".to_string()),
    }
}

/// Declared type reached by one access into a value of type `ty`.
fn narrow(ty: &GlslType, access: &Access) -> Option<GlslType> {
    match (ty, access) {
        (GlslType::Array { element, .. }, Access::Index(_)) => Some((**element).clone()),
        (GlslType::Primitive { kind, .. }, Access::Index(_)) => Some(GlslType::scalar(*kind)),
        (GlslType::Primitive { kind, .. }, Access::Swizzle(indices)) => {
            Some(GlslType::vector(*kind, indices.len() as u8))
        }
        _ => None,
    }
}

fn describe(value: Value) -> String {
    match value {
        Value::Error(message) => message,
        other => other.to_string(),
    }
}

/// Value written into when a declared-but-unset vector or array is
/// partially assigned.
fn zeroed(ty: &GlslType) -> Value {
    match ty {
        GlslType::Primitive { kind, arity } => Value::Primitive {
            kind: *kind,
            components: vec![0.0; *arity as usize],
        },
        GlslType::Array {
            size: Some(size), ..
        } if *size > MAX_ARRAY_LENGTH => Value::error(format!(
            "arrays longer than {MAX_ARRAY_LENGTH} elements are not evaluated"
        )),
        GlslType::Array {
            element,
            size: Some(size),
        } => Value::Array {
            element: (**element).clone(),
            items: vec![Value::Uninitialized((**element).clone()); *size],
        },
        _ => Value::Uninitialized(ty.clone()),
    }
}

fn binary(op: BinaryOp, left: Value, right: Value) -> Value {
    if matches!(op, BinaryOp::Eq | BinaryOp::Ne) {
        return equality(op, left, right);
    }
    let (left_kind, left) = match primitive(left) {
        Ok(parts) => parts,
        Err(error) => return error,
    };
    let (right_kind, right) = match primitive(right) {
        Ok(parts) => parts,
        Err(error) => return error,
    };
    let shift = matches!(op, BinaryOp::Shl | BinaryOp::Shr);
    if shift {
        if !left_kind.is_integral() || !right_kind.is_integral() {
            return Value::error("shifts need integer operands");
        }
    } else if left_kind != right_kind {
        return Value::error(format!(
            "mismatched operand kinds `{}` and `{}`",
            left_kind.scalar_name(),
            right_kind.scalar_name()
        ));
    }
    let arity = match (left.len(), right.len()) {
        (l, r) if l == r => l,
        (1, r) if !shift => r,
        (l, 1) => l,
        _ => return Value::error("mismatched operand sizes"),
    };
    let lane = |values: &[f64], index: usize| values[if values.len() == 1 { 0 } else { index }];
    let kind = left_kind;
    let function: fn(PrimitiveKind, f64, f64) -> Option<f64> = match op {
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div if kind.is_numeric() => {
            arithmetic_for(op)
        }
        BinaryOp::Mod if kind.is_integral() => remainder,
        BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge
            if kind.is_numeric() && arity == 1 =>
        {
            comparison_for(op)
        }
        BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor if kind.is_integral() => {
            bitwise_for(op)
        }
        BinaryOp::Shl => shift_left,
        BinaryOp::Shr => shift_right,
        BinaryOp::Xor | BinaryOp::And | BinaryOp::Or
            if kind == PrimitiveKind::Bool && arity == 1 =>
        {
            logical_for(op)
        }
        _ => {
            return Value::error(format!(
                "cannot apply `{}` to `{}` operands",
                op.as_str(),
                kind.scalar_name()
            ));
        }
    };
    let result_kind = match op {
        BinaryOp::Lt
        | BinaryOp::Gt
        | BinaryOp::Le
        | BinaryOp::Ge
        | BinaryOp::And
        | BinaryOp::Or
        | BinaryOp::Xor => PrimitiveKind::Bool,
        _ => kind,
    };
    let mut components = Vec::with_capacity(arity);
    for index in 0..arity {
        match function(kind, lane(&left, index), lane(&right, index)) {
            Some(value) => components.push(normalize(result_kind, value)),
            None => return Value::error("division by zero"),
        }
    }
    Value::Primitive {
        kind: result_kind,
        components,
    }
}

fn arithmetic_for(op: BinaryOp) -> fn(PrimitiveKind, f64, f64) -> Option<f64> {
    match op {
        BinaryOp::Add => |_, a, b| Some(a + b),
        BinaryOp::Sub => |_, a, b| Some(a - b),
        BinaryOp::Mul => |kind, a, b| match kind {
            PrimitiveKind::Int => Some((a as i32).wrapping_mul(b as i32) as f64),
            PrimitiveKind::Uint => Some((a as u32).wrapping_mul(b as u32) as f64),
            _ => Some(a * b),
        },
        _ => |kind, a, b| match kind {
            PrimitiveKind::Int if b == 0.0 => None,
            PrimitiveKind::Uint if b == 0.0 => None,
            PrimitiveKind::Int => Some((a as i32).wrapping_div(b as i32) as f64),
            PrimitiveKind::Uint => Some(((a as u32) / (b as u32)) as f64),
            _ => Some(a / b),
        },
    }
}

fn remainder(kind: PrimitiveKind, a: f64, b: f64) -> Option<f64> {
    if b == 0.0 {
        return None;
    }
    match kind {
        PrimitiveKind::Int => Some((a as i32).wrapping_rem(b as i32) as f64),
        _ => Some(((a as u32) % (b as u32)) as f64),
    }
}

fn comparison_for(op: BinaryOp) -> fn(PrimitiveKind, f64, f64) -> Option<f64> {
    match op {
        BinaryOp::Lt => |_, a, b| Some(if a < b { 1.0 } else { 0.0 }),
        BinaryOp::Gt => |_, a, b| Some(if a > b { 1.0 } else { 0.0 }),
        BinaryOp::Le => |_, a, b| Some(if a <= b { 1.0 } else { 0.0 }),
        _ => |_, a, b| Some(if a >= b { 1.0 } else { 0.0 }),
    }
}

fn bitwise_for(op: BinaryOp) -> fn(PrimitiveKind, f64, f64) -> Option<f64> {
    match op {
        BinaryOp::BitAnd => |kind, a, b| Some(bits(kind, a, b, |x, y| x & y)),
        BinaryOp::BitOr => |kind, a, b| Some(bits(kind, a, b, |x, y| x | y)),
        _ => |kind, a, b| Some(bits(kind, a, b, |x, y| x ^ y)),
    }
}

fn logical_for(op: BinaryOp) -> fn(PrimitiveKind, f64, f64) -> Option<f64> {
    match op {
        BinaryOp::And => |_, a, b| Some(if a != 0.0 && b != 0.0 { 1.0 } else { 0.0 }),
        BinaryOp::Or => |_, a, b| Some(if a != 0.0 || b != 0.0 { 1.0 } else { 0.0 }),
        _ => |_, a, b| Some(if (a != 0.0) != (b != 0.0) { 1.0 } else { 0.0 }),
    }
}

fn bits(kind: PrimitiveKind, a: f64, b: f64, op: fn(u32, u32) -> u32) -> f64 {
    match kind {
        PrimitiveKind::Int => op(a as i32 as u32, b as i32 as u32) as i32 as f64,
        _ => op(a as u32, b as u32) as f64,
    }
}

fn shift_left(kind: PrimitiveKind, a: f64, b: f64) -> Option<f64> {
    Some(match kind {
        PrimitiveKind::Int => (a as i32).wrapping_shl(b as i64 as u32) as f64,
        _ => (a as u32).wrapping_shl(b as i64 as u32) as f64,
    })
}

fn shift_right(kind: PrimitiveKind, a: f64, b: f64) -> Option<f64> {
    Some(match kind {
        PrimitiveKind::Int => (a as i32).wrapping_shr(b as i64 as u32) as f64,
        _ => (a as u32).wrapping_shr(b as i64 as u32) as f64,
    })
}

fn equality(op: BinaryOp, left: Value, right: Value) -> Value {
    for value in [&left, &right] {
        match value {
            Value::Error(_) => return value.clone(),
            Value::Uninitialized(ty) => {
                return Value::error(format!("use of uninitialized `{ty}` value"));
            }
            _ => {}
        }
    }
    if left.ty() != right.ty() {
        return Value::error("cannot compare values of different types");
    }
    let equal = left == right;
    Value::bool(if op == BinaryOp::Eq { equal } else { !equal })
}

fn unary(op: UnaryOp, value: Value) -> Value {
    let (kind, components) = match primitive(value) {
        Ok(parts) => parts,
        Err(error) => return error,
    };
    let function: fn(PrimitiveKind, f64) -> f64 = match op {
        UnaryOp::Minus if kind.is_numeric() => |_, x| -x,
        UnaryOp::Plus if kind.is_numeric() => |_, x| x,
        UnaryOp::Not if kind == PrimitiveKind::Bool && components.len() == 1 => {
            |_, x| if x != 0.0 { 0.0 } else { 1.0 }
        }
        UnaryOp::BitNot if kind.is_integral() => |kind, x| match kind {
            PrimitiveKind::Int => !(x as i32) as f64,
            _ => !(x as u32) as f64,
        },
        _ => {
            return Value::error(format!(
                "cannot apply `{}` to `{}`",
                op.as_str(),
                kind.scalar_name()
            ));
        }
    };
    Value::Primitive {
        kind,
        components: components
            .into_iter()
            .map(|x| normalize(kind, function(kind, x)))
            .collect(),
    }
}

fn index_value(target: Value, index: Value) -> Value {
    if target.is_error() {
        return target;
    }
    let Some(position) = index.as_index() else {
        return absorb(index, "index must be an integer scalar");
    };
    let out_of_range = || Value::error(format!("index {position} out of range"));
    if position < 0 {
        return out_of_range();
    }
    let position = position as usize;
    match target {
        Value::Array { items, .. } => items.get(position).cloned().unwrap_or_else(out_of_range),
        Value::Primitive { kind, components } if components.len() > 1 => components
            .get(position)
            .map(|lane| Value::scalar(kind, *lane))
            .unwrap_or_else(out_of_range),
        Value::Uninitialized(ty) => Value::error(format!("use of uninitialized `{ty}` value")),
        _ => Value::error("only arrays and vectors can be indexed"),
    }
}

fn member(value: Value, name: &str) -> Value {
    match value {
        Value::Primitive { kind, components } if components.len() > 1 => {
            match swizzle(components.len() as u8, name) {
                Some(indices) => Value::Primitive {
                    kind,
                    components: indices.into_iter().map(|index| components[index]).collect(),
                },
                None => Value::error(format!("invalid swizzle `{name}`")),
            }
        }
        Value::Error(_) => value,
        Value::Uninitialized(GlslType::Struct(_)) => {
            Value::error("struct values are not yet supported")
        }
        Value::Uninitialized(ty) => Value::error(format!("use of uninitialized `{ty}` value")),
        _ => Value::error(format!("no field `{name}`")),
    }
}

fn length(value: Value) -> Value {
    let length = match &value {
        Value::Array { items, .. } => items.len(),
        Value::Uninitialized(GlslType::Array {
            size: Some(size), ..
        }) => *size,
        Value::Primitive { components, .. } if components.len() > 1 => components.len(),
        _ => return absorb(value, "`length()` needs an array or a vector"),
    };
    Value::scalar(PrimitiveKind::Int, length as f64)
}

fn construct(ty: &GlslType, args: Vec<Value>) -> Value {
    match ty {
        GlslType::Primitive { kind, arity } => {
            let single = args.len() == 1;
            let mut lanes = Vec::new();
            for arg in args {
                let (from, components) = match primitive(arg) {
                    Ok(parts) => parts,
                    Err(error) => return error,
                };
                lanes.extend(components.into_iter().map(|x| convert(from, *kind, x)));
            }
            let arity = *arity as usize;
            if single && lanes.len() == 1 {
                lanes = vec![lanes[0]; arity];
            }
            if lanes.len() < arity {
                return Value::error(format!("not enough components to construct `{ty}`"));
            }
            lanes.truncate(arity);
            Value::Primitive {
                kind: *kind,
                components: lanes,
            }
        }
        GlslType::Array { element, size } => {
            if size.is_some_and(|size| size != args.len()) {
                return Value::error(format!("`{ty}` needs exactly {} elements", size.unwrap_or_default()));
            }
            if let Some(bad) = args.iter().find(|arg| arg.ty().as_ref() != Some(element)) {
                return absorb(bad.clone(), &format!("array elements must be `{element}`"));
            }
            Value::Array {
                element: (**element).clone(),
                items: args,
            }
        }
        GlslType::Struct(_) => Value::error("struct constructors are not yet supported"),
        GlslType::Void => Value::error("cannot construct `void`"),
    }
}

/// Evaluate a pure builtin function; `None` when `name` is not one the
/// evaluator knows.
fn builtin_call(name: &str, args: Vec<Value>) -> Option<Value> {
    let float: Option<fn(f64) -> f64> = match name {
        "radians" => Some(f64::to_radians),
        "degrees" => Some(f64::to_degrees),
        "sin" => Some(f64::sin),
        "cos" => Some(f64::cos),
        "tan" => Some(f64::tan),
        "asin" => Some(f64::asin),
        "acos" => Some(f64::acos),
        "sinh" => Some(f64::sinh),
        "cosh" => Some(f64::cosh),
        "tanh" => Some(f64::tanh),
        "exp" => Some(f64::exp),
        "log" => Some(f64::ln),
        "exp2" => Some(f64::exp2),
        "log2" => Some(f64::log2),
        "sqrt" => Some(f64::sqrt),
        "inversesqrt" => Some(|x| 1.0 / x.sqrt()),
        "floor" => Some(f64::floor),
        "ceil" => Some(f64::ceil),
        "trunc" => Some(f64::trunc),
        "round" => Some(f64::round),
        "fract" => Some(|x| x - x.floor()),
        _ => None,
    };
    if let Some(function) = float {
        return Some(lanewise(args, 1, true, move |x| function(x[0])));
    }
    let value = match name {
        "abs" => lanewise(args, 1, false, |x| x[0].abs()),
        "sign" => lanewise(args, 1, false, |x| {
            if x[0] > 0.0 {
                1.0
            } else if x[0] < 0.0 {
                -1.0
            } else {
                0.0
            }
        }),
        "min" => lanewise(args, 2, false, |x| x[0].min(x[1])),
        "max" => lanewise(args, 2, false, |x| x[0].max(x[1])),
        "clamp" => lanewise(args, 3, false, |x| x[0].max(x[1]).min(x[2])),
        "mod" => lanewise(args, 2, true, |x| x[0] - x[1] * (x[0] / x[1]).floor()),
        "pow" => lanewise(args, 2, true, |x| x[0].powf(x[1])),
        "atan" if args.len() == 2 => lanewise(args, 2, true, |x| x[0].atan2(x[1])),
        "atan" => lanewise(args, 1, true, |x| x[0].atan()),
        "mix" => lanewise(args, 3, true, |x| x[0] * (1.0 - x[2]) + x[1] * x[2]),
        "step" => lanewise(args, 2, true, |x| if x[1] < x[0] { 0.0 } else { 1.0 }),
        "smoothstep" => lanewise(args, 3, true, |x| {
            let t = ((x[2] - x[0]) / (x[1] - x[0])).clamp(0.0, 1.0);
            t * t * (3.0 - 2.0 * t)
        }),
        "length" => reduce(args, 1, |x| x[0].iter().map(|a| a * a).sum::<f64>().sqrt()),
        "distance" => reduce(args, 2, |x| {
            x[0].iter()
                .zip(&x[1])
                .map(|(a, b)| (a - b) * (a - b))
                .sum::<f64>()
                .sqrt()
        }),
        "dot" => reduce(args, 2, |x| x[0].iter().zip(&x[1]).map(|(a, b)| a * b).sum()),
        "normalize" => {
            let length = reduce(args.clone(), 1, |x| x[0].iter().map(|a| a * a).sum::<f64>().sqrt());
            match length {
                Value::Primitive { components, .. } => {
                    let length = components[0];
                    lanewise(args, 1, true, move |x| x[0] / length)
                }
                error => error,
            }
        }
        _ => return None,
    };
    Some(value)
}

/// Apply `function` lane by lane; scalar arguments are broadcast.
fn lanewise(args: Vec<Value>, count: usize, float_only: bool, function: impl Fn(&[f64]) -> f64) -> Value {
    if args.len() != count {
        return Value::error(format!("expected {count} arguments, found {}", args.len()));
    }
    let mut operands = Vec::with_capacity(count);
    for arg in args {
        match primitive(arg) {
            Ok(parts) => operands.push(parts),
            Err(error) => return error,
        }
    }
    let kind = operands[0].0;
    if operands.iter().any(|(other, _)| *other != kind) {
        return Value::error("mismatched argument types");
    }
    if !kind.is_numeric() || (float_only && kind != PrimitiveKind::Float) {
        return Value::error(format!("`{}` arguments are not supported", kind.scalar_name()));
    }
    let arity = operands.iter().map(|(_, lanes)| lanes.len()).max().unwrap_or(1);
    if operands
        .iter()
        .any(|(_, lanes)| lanes.len() != 1 && lanes.len() != arity)
    {
        return Value::error("mismatched argument sizes");
    }
    let components = (0..arity)
        .map(|index| {
            let lanes: Vec<f64> = operands
                .iter()
                .map(|(_, lanes)| lanes[if lanes.len() == 1 { 0 } else { index }])
                .collect();
            normalize(kind, function(&lanes))
        })
        .collect();
    Value::Primitive { kind, components }
}

/// Fold whole float vectors into one float.
fn reduce(args: Vec<Value>, count: usize, function: impl Fn(&[Vec<f64>]) -> f64) -> Value {
    if args.len() != count {
        return Value::error(format!("expected {count} arguments, found {}", args.len()));
    }
    let mut vectors = Vec::with_capacity(count);
    for arg in args {
        match primitive(arg) {
            Ok((PrimitiveKind::Float, lanes)) => vectors.push(lanes),
            Ok(_) => return Value::error("expected float arguments"),
            Err(error) => return error,
        }
    }
    if vectors.iter().any(|lanes| lanes.len() != vectors[0].len()) {
        return Value::error("mismatched argument sizes");
    }
    Value::scalar(PrimitiveKind::Float, function(&vectors))
}

// ---------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------

/// Evaluate an expression, optionally against the globals of `unit`.
pub fn evaluate_expression(expr: &ExprNode, unit: Option<&TranslationUnit>) -> Value {
    let mut evaluator = Evaluator::new();
    if let Some(unit) = unit {
        evaluator.declare_globals(unit);
    }
    evaluator.evaluate(expr)
}

/// Values of every global variable, in declaration order.
pub fn evaluate_globals(unit: &TranslationUnit) -> Vec<Binding> {
    let mut evaluator = Evaluator::new();
    evaluator.declare_globals(unit);
    evaluator.bindings()
}

/// What execution looks like when it first reaches `position`.
#[derive(Debug, Clone, PartialEq)]
pub struct Preview {
    /// Innermost scope alive at that point.
    pub scope: Option<ScopeId>,
    pub bindings: Vec<Binding>,
}

/// Simulate the function containing `position` with unknown parameters,
/// stopping at the first statement that starts at or after `position`.
/// Outside any function only the globals are reported.
pub fn preview_at(unit: &TranslationUnit, tree: &ScopeTree, position: usize) -> Preview {
    let mut evaluator = Evaluator::with_scopes(tree);
    evaluator.declare_globals(unit);
    let function = unit.declarations.iter().find_map(|external| match &external.data {
        ExternalDeclaration::Function(function)
            if external.range.start <= position && position < external.range.end =>
        {
            Some((external.range, function))
        }
        _ => None,
    });
    if let Some((range, function)) = function {
        log::debug!("previewing `{}` at byte {position}", function.prototype.data.name);
        evaluator.frames.push(Frame {
            scope: tree.scope_for(range),
            bindings: Vec::new(),
        });
        for param in function.prototype.data.parameters() {
            let Some(name) = &param.name else { continue };
            let (ty, value) = match resolve_type(&param.ty, &param.array, &mut evaluator) {
                Ok(ty) => (Some(ty.clone()), Value::Uninitialized(ty)),
                Err(error) => (None, Value::error(error.to_string())),
            };
            evaluator.bind(Binding {
                name: name.clone(),
                ty,
                constant: false,
                value,
            });
        }
        evaluator.halt_at = Some(position);
        evaluator.execute(&function.body);
    }
    Preview {
        scope: evaluator.current_scope(),
        bindings: evaluator.bindings(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse, parse_expression};

    fn eval(source: &str) -> Value {
        evaluate_expression(&parse_expression(source).expect("parse"), None)
    }

    fn binding<'a>(bindings: &'a [Binding], name: &str) -> &'a Value {
        &bindings
            .iter()
            .find(|binding| binding.name == name)
            .expect("binding")
            .value
    }

    #[test]
    fn equal_expressions_evaluate_equal() {
        assert_eq!(eval("1 + 1"), eval("2"));
        assert_eq!(eval("true ? 1 : 2"), eval("1"));
        assert_eq!(eval("(1 + 2) * 3"), Value::scalar(PrimitiveKind::Int, 9.0));
    }

    #[test]
    fn globals_agree_with_literals() {
        let unit = parse("const int a = 1 + 1;\nconst int b = 2;\nuniform float t;").expect("parse");
        let globals = evaluate_globals(&unit);
        assert_eq!(binding(&globals, "a"), binding(&globals, "b"));
        assert_eq!(binding(&globals, "t"), &Value::Uninitialized(GlslType::FLOAT));
        assert_eq!(globals[0].name, "a");
    }

    #[test]
    fn integers_wrap_at_32_bits() {
        assert_eq!(eval("2147483647 + 1").to_string(), "-2147483648");
        assert_eq!(eval("0u - 1u").to_string(), "4294967295");
        assert_eq!(eval("7 / 2").to_string(), "3");
        assert_eq!(eval("-7 % 3").to_string(), "-1");
    }

    #[test]
    fn reports_errors_as_values() {
        assert!(eval("1 / 0").is_error());
        assert!(eval("1.0 + 2").is_error());
        assert!(eval("(1 / 0) + 5").is_error());
        assert!(eval("undefined_name").is_error());
        assert_eq!(eval("1.0 / 0.0").to_string(), "inf");
    }

    #[test]
    fn evaluates_vectors() {
        assert_eq!(
            eval("vec3(1.0, 2.0, 3.0) * 2.0").to_string(),
            "vec3(2.0, 4.0, 6.0)"
        );
        assert_eq!(eval("vec4(1.0, 2.0, 3.0, 4.0).wzy").to_string(), "vec3(4.0, 3.0, 2.0)");
        assert_eq!(eval("vec2(3.0)").to_string(), "vec2(3.0, 3.0)");
        assert_eq!(eval("ivec2(1.7, -1.7)").to_string(), "ivec2(1, -1)");
        assert_eq!(eval("vec3(1.0, 2.0, 3.0)[1]").to_string(), "2.0");
        assert_eq!(eval("length(vec2(3.0, 4.0))").to_string(), "5.0");
        assert_eq!(eval("float[2](1.0, 2.0).length()").to_string(), "2");
    }

    #[test]
    fn floats_are_single_precision() {
        assert_eq!(eval("0.1 + 0.2").to_string(), "0.3");
        assert_eq!(eval("16777216.0 + 1.0").to_string(), "16777216.0");
    }

    const FUNCTION: &str = "\
float scale = 2.0;
float f(float x) {
    float y = x * scale;
    float z = 3.0;
    for (int i = 0; i < 4; i++) {
        z += 1.0;
    }
    return z;
}
";

    #[test]
    fn previews_the_state_before_a_statement() {
        let unit = parse(FUNCTION).expect("parse");
        let tree = ScopeTree::build(&unit);
        let preview = preview_at(&unit, &tree, FUNCTION.find("return z").expect("return"));
        assert_eq!(binding(&preview.bindings, "z").to_string(), "7.0");
        assert_eq!(binding(&preview.bindings, "scale").to_string(), "2.0");
        assert_eq!(
            binding(&preview.bindings, "x"),
            &Value::Uninitialized(GlslType::FLOAT)
        );
        assert!(binding(&preview.bindings, "y").is_error());
        assert!(preview.bindings.iter().all(|binding| binding.name != "i"));
    }

    #[test]
    fn previews_stop_in_the_first_iteration() {
        let unit = parse(FUNCTION).expect("parse");
        let tree = ScopeTree::build(&unit);
        let position = FUNCTION.find("z += 1.0").expect("loop body");
        let preview = preview_at(&unit, &tree, position);
        assert_eq!(binding(&preview.bindings, "z").to_string(), "3.0");
        assert_eq!(binding(&preview.bindings, "i").to_string(), "0");
        assert_eq!(preview.scope, tree.chain_at(position).last().copied());
    }

    #[test]
    fn loops_are_capped() {
        let source = "void main() {\n    int i = 0;\n    while (true) { i++; }\n    int done = 1;\n}\n";
        let unit = parse(source).expect("parse");
        let tree = ScopeTree::build(&unit);
        let preview = preview_at(&unit, &tree, source.find("int done").expect("done"));
        assert_eq!(
            binding(&preview.bindings, "i"),
            &Value::scalar(PrimitiveKind::Int, MAX_LOOP_ITERATIONS as f64)
        );
    }

    #[test]
    fn switch_runs_to_the_end() {
        let source = "\
int pick() {
    int r = 0;
    switch (2) {
    case 1: r = 10; break;
    case 2: r = 20;
    case 3: r = r + 1; break;
    default: r = -1;
    }
    return r;
}
";
        let unit = parse(source).expect("parse");
        let tree = ScopeTree::build(&unit);
        let preview = preview_at(&unit, &tree, source.find("return r").expect("return"));
        assert_eq!(binding(&preview.bindings, "r").to_string(), "-1");
    }

    #[test]
    fn assigns_through_swizzles_and_indices() {
        let source = "\
void main() {
    vec3 v = vec3(0.0);
    v.zx = vec2(1.0, 2.0);
    float a[2];
    a[1] = 5.0;
    const int k = 1;
    k = 2;
}
";
        let unit = parse(source).expect("parse");
        let tree = ScopeTree::build(&unit);
        let preview = preview_at(&unit, &tree, source.rfind('}').expect("end"));
        assert_eq!(binding(&preview.bindings, "v").to_string(), "vec3(2.0, 0.0, 1.0)");
        assert_eq!(
            binding(&preview.bindings, "a").to_string(),
            "float[2](uninitialized float, 5.0)"
        );
        assert_eq!(binding(&preview.bindings, "k").to_string(), "1");
    }

    #[test]
    fn mismatched_assignment_poisons_the_slot() {
        let source = "\
void main() {
    float x = 1.0;
    x = 2;
    float y = 1;
    y = 3;
    vec2 v = vec2(0.0);
    v.x = 1;
    float a[2];
    a[0] = 1;
    a[1] = 2.0;
    int done = 0;
}
";
        let unit = parse(source).expect("parse");
        let tree = ScopeTree::build(&unit);
        let preview = preview_at(&unit, &tree, source.find("int done").expect("done"));
        assert!(binding(&preview.bindings, "x").is_error());
        assert!(binding(&preview.bindings, "y").is_error());
        assert!(binding(&preview.bindings, "v").is_error());
        let Value::Array { items, .. } = binding(&preview.bindings, "a") else {
            panic!("expected an array");
        };
        assert!(items[0].is_error());
        assert_eq!(items[1].to_string(), "2.0");
    }

    #[test]
    fn oversized_arrays_are_not_allocated() {
        let source = "void main() {\n    float a[2000000000];\n    a[0] = 1.0;\n}\n";
        let unit = parse(source).expect("parse");
        let tree = ScopeTree::build(&unit);
        let preview = preview_at(&unit, &tree, source.rfind('}').expect("end"));
        assert!(binding(&preview.bindings, "a").is_error());
    }
}
