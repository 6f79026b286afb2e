//! Source printers.
//!
//! Two layouts share one token writer:
//!
//! - **packed**: the canonical form. Tokens are joined with the fewest spaces
//!   that still lex back to the same tokens, parentheses appear only where
//!   precedence needs them, and comments are dropped. Packed output of a
//!   reparsed packed output is identical to the first.
//! - **fancy**: one statement per line, block indentation, spaced operators,
//!   and the comments attached to statements and top-level declarations.
//!   Calls that would overflow `line_width` get one argument per line.

use crate::ast::{
    ArraySpecifier, Callee, Comments, Declaration, Expr, ExprNode, ExternalDeclaration,
    ExternalNode, FullySpecifiedType, FunctionCall, FunctionPrototype, Import, ImportKind, Jump,
    Qualifier, Selector, Statement, StmtNode, StructDefinition, TranslationUnit, TypeQualifier,
    TypeSpecifier,
};
use crate::ast::BinaryOp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatMode {
    #[default]
    Packed,
    Fancy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatOptions {
    pub mode: FormatMode,
    /// Soft limit for fancy output; only call arguments are wrapped.
    pub line_width: usize,
    /// Spaces per indentation level in fancy output.
    pub indent: usize,
}

impl Default for FormatOptions {
    fn default() -> Self {
        FormatOptions {
            mode: FormatMode::Packed,
            line_width: 80,
            indent: 4,
        }
    }
}

impl FormatOptions {
    pub fn fancy() -> Self {
        FormatOptions {
            mode: FormatMode::Fancy,
            ..FormatOptions::default()
        }
    }
}

/// Print a whole translation unit.
pub fn format(unit: &TranslationUnit, options: &FormatOptions) -> String {
    match options.mode {
        FormatMode::Packed => {
            let mut writer = Writer::new(false);
            for declaration in &unit.declarations {
                writer.external(declaration);
            }
            writer.out
        }
        FormatMode::Fancy => {
            let mut fancy = Fancy::new(options);
            fancy.unit(unit);
            fancy.finish()
        }
    }
}

pub fn packed(unit: &TranslationUnit) -> String {
    format(unit, &FormatOptions::default())
}

pub fn packed_expr(expr: &ExprNode) -> String {
    let mut writer = Writer::new(false);
    writer.expr(expr, 0);
    writer.out
}

pub fn packed_stmt(stmt: &StmtNode) -> String {
    let mut writer = Writer::new(false);
    writer.stmt(stmt);
    writer.out
}

pub fn packed_external(external: &ExternalNode) -> String {
    let mut writer = Writer::new(false);
    writer.external(external);
    writer.out
}

/// Expression with the spacing of fancy output, on one line.
pub fn fancy_expr(expr: &ExprNode) -> String {
    let mut writer = Writer::new(true);
    writer.expr(expr, 0);
    writer.out
}

// ---------------------------------------------------------------------
// Precedence
// ---------------------------------------------------------------------

const PREC_COMMA: u8 = 1;
const PREC_ASSIGN: u8 = 2;
const PREC_CONDITIONAL: u8 = 3;
const PREC_LOGICAL_OR: u8 = 4;
const PREC_PREFIX: u8 = 15;
const PREC_POSTFIX: u8 = 16;
const PREC_PRIMARY: u8 = 17;

fn binary_precedence(op: BinaryOp) -> u8 {
    match op {
        BinaryOp::Comma => PREC_COMMA,
        BinaryOp::Or => 4,
        BinaryOp::Xor => 5,
        BinaryOp::And => 6,
        BinaryOp::BitOr => 7,
        BinaryOp::BitXor => 8,
        BinaryOp::BitAnd => 9,
        BinaryOp::Eq | BinaryOp::Ne => 10,
        BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge => 11,
        BinaryOp::Shl | BinaryOp::Shr => 12,
        BinaryOp::Add | BinaryOp::Sub => 13,
        BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => 14,
        BinaryOp::Index => PREC_POSTFIX,
    }
}

fn precedence(expr: &Expr) -> u8 {
    match expr {
        Expr::Binary { op, .. } => binary_precedence(*op),
        Expr::Unary { postfix: false, .. } => PREC_PREFIX,
        Expr::Unary { postfix: true, .. } | Expr::Field { .. } | Expr::Call(_) => PREC_POSTFIX,
        Expr::Assign { .. } => PREC_ASSIGN,
        Expr::Conditional { .. } => PREC_CONDITIONAL,
        Expr::Int(_) | Expr::Float(_) | Expr::Bool(_) | Expr::Ident(_) | Expr::Error(_) => {
            PREC_PRIMARY
        }
    }
}

/// Whether two adjacent tokens would fuse without a space between them.
fn needs_space(last: char, first: char) -> bool {
    let word = |c: char| c.is_ascii_alphanumeric() || c == '_';
    (word(last) && word(first))
        || (last == '+' && first == '+')
        || (last == '-' && first == '-')
        || (last == '/' && (first == '/' || first == '*'))
}

// ---------------------------------------------------------------------
// Token writer
// ---------------------------------------------------------------------

struct Writer {
    out: String,
    fancy: bool,
}

impl Writer {
    fn new(fancy: bool) -> Self {
        Writer {
            out: String::new(),
            fancy,
        }
    }

    fn token(&mut self, text: &str) {
        if let (Some(last), Some(first)) = (self.out.chars().last(), text.chars().next())
            && needs_space(last, first)
        {
            self.out.push(' ');
        }
        self.out.push_str(text);
    }

    /// A space in fancy output, nothing in packed output.
    fn space(&mut self) {
        if self.fancy && !self.out.is_empty() && !self.out.ends_with(' ') {
            self.out.push(' ');
        }
    }

    fn op(&mut self, text: &str) {
        self.space();
        self.token(text);
        self.space();
    }

    fn comma(&mut self) {
        self.token(",");
        self.space();
    }

    fn expr(&mut self, expr: &ExprNode, min: u8) {
        if precedence(&expr.data) < min {
            self.token("(");
            self.expr_inner(expr);
            self.token(")");
        } else {
            self.expr_inner(expr);
        }
    }

    fn expr_inner(&mut self, expr: &ExprNode) {
        match &expr.data {
            Expr::Int(literal) => self.token(&literal.text),
            Expr::Float(literal) => self.token(&literal.text),
            Expr::Bool(value) => self.token(if *value { "true" } else { "false" }),
            Expr::Ident(name) => self.token(name),
            Expr::Error(_) => {}
            Expr::Binary {
                op: BinaryOp::Index,
                left,
                right,
            } => {
                self.expr(left, PREC_POSTFIX);
                self.token("[");
                self.expr(right, 0);
                self.token("]");
            }
            Expr::Binary {
                op: BinaryOp::Comma,
                left,
                right,
            } => {
                self.expr(left, PREC_COMMA);
                self.comma();
                self.expr(right, PREC_ASSIGN);
            }
            Expr::Binary { op, left, right } => {
                let precedence = binary_precedence(*op);
                self.expr(left, precedence);
                self.op(op.as_str());
                self.expr(right, precedence + 1);
            }
            Expr::Unary {
                op,
                postfix: false,
                operand,
            } => {
                self.token(op.as_str());
                self.expr(operand, PREC_PREFIX);
            }
            Expr::Unary {
                op,
                postfix: true,
                operand,
            } => {
                self.expr(operand, PREC_POSTFIX);
                self.token(op.as_str());
            }
            Expr::Field { target, selector } => {
                // `1.x` would lex as the float `1.` followed by `x`.
                if matches!(target.data, Expr::Int(_)) {
                    self.token("(");
                    self.expr_inner(target);
                    self.token(")");
                } else {
                    self.expr(target, PREC_POSTFIX);
                }
                self.token(".");
                match &selector.data {
                    Selector::Member(name) => self.token(name),
                    Selector::Method(call) => self.call(call),
                }
            }
            Expr::Assign { op, left, right } => {
                self.expr(left, PREC_LOGICAL_OR);
                self.op(op.as_str());
                self.expr(right, PREC_ASSIGN);
            }
            Expr::Conditional {
                condition,
                then,
                otherwise,
            } => {
                self.expr(condition, PREC_LOGICAL_OR);
                self.op("?");
                self.expr(then, 0);
                self.op(":");
                self.expr(otherwise, PREC_ASSIGN);
            }
            Expr::Call(call) => self.call(call),
        }
    }

    fn callee(&mut self, call: &FunctionCall) {
        match &call.callee.data {
            Callee::Name(name) => self.token(name),
            Callee::Type(ty) => self.type_specifier(ty),
        }
    }

    fn call(&mut self, call: &FunctionCall) {
        self.callee(call);
        self.token("(");
        if call.void {
            self.token("void");
        }
        for (index, arg) in call.args.iter().enumerate() {
            if index > 0 {
                self.comma();
            }
            self.expr(arg, PREC_ASSIGN);
        }
        self.token(")");
    }

    fn array(&mut self, array: &ArraySpecifier) {
        match array {
            ArraySpecifier::None => {}
            ArraySpecifier::Unsized => {
                self.token("[");
                self.token("]");
            }
            ArraySpecifier::Sized(size) => {
                self.token("[");
                self.expr(size, 0);
                self.token("]");
            }
        }
    }

    fn type_specifier(&mut self, ty: &TypeSpecifier) {
        if let Some(precision) = ty.precision {
            self.token(precision.as_str());
        }
        self.token(ty.name.data.as_str());
        self.array(&ty.array);
    }

    fn qualifier(&mut self, qualifier: &TypeQualifier) {
        for (index, part) in qualifier.parts.iter().enumerate() {
            if index > 0 {
                self.space();
            }
            match &part.data {
                Qualifier::Storage(storage) => self.token(storage.as_str()),
                Qualifier::Interpolation(interpolation) => self.token(interpolation.as_str()),
                Qualifier::Invariant => self.token("invariant"),
                Qualifier::Layout(ids) => {
                    self.token("layout");
                    self.token("(");
                    for (index, id) in ids.iter().enumerate() {
                        if index > 0 {
                            self.comma();
                        }
                        self.token(&id.data.name);
                        if let Some(value) = &id.data.value {
                            self.op("=");
                            self.token(value);
                        }
                    }
                    self.token(")");
                }
            }
        }
    }

    fn full_type(&mut self, ty: &FullySpecifiedType) {
        if let Some(qualifier) = &ty.qualifier {
            self.qualifier(qualifier);
            self.space();
        }
        self.type_specifier(&ty.specifier);
    }

    fn prototype(&mut self, prototype: &FunctionPrototype) {
        self.full_type(&prototype.return_type);
        self.space();
        self.token(&prototype.name);
        self.token("(");
        for (index, param) in prototype.params.iter().enumerate() {
            if index > 0 {
                self.comma();
            }
            let param = &param.data;
            if let Some(qualifier) = &param.qualifier {
                self.qualifier(qualifier);
                self.space();
            }
            self.type_specifier(&param.ty);
            if let Some(name) = &param.name {
                self.space();
                self.token(name);
            }
            self.array(&param.array);
        }
        self.token(")");
    }

    fn struct_definition(&mut self, definition: &StructDefinition) {
        self.token("struct");
        self.token(&definition.name);
        self.space();
        self.token("{");
        for field in &definition.fields {
            self.space();
            self.struct_field(&field.data);
        }
        self.space();
        self.token("}");
        self.token(";");
    }

    fn struct_field(&mut self, field: &crate::ast::StructField) {
        self.type_specifier(&field.ty);
        self.space();
        for (index, name) in field.names.iter().enumerate() {
            if index > 0 {
                self.comma();
            }
            self.token(&name.data.0);
            self.array(&name.data.1);
        }
        self.token(";");
    }

    fn declaration(&mut self, declaration: &Declaration) {
        match declaration {
            Declaration::Prototype(prototype) => {
                self.prototype(prototype);
                self.token(";");
            }
            Declaration::Variables(list) => {
                self.full_type(&list.ty);
                self.space();
                for (index, declarator) in list.declarators.iter().enumerate() {
                    if index > 0 {
                        self.comma();
                    }
                    let declarator = &declarator.data;
                    self.token(&declarator.name);
                    self.array(&declarator.array);
                    if let Some(initializer) = &declarator.initializer {
                        self.op("=");
                        self.expr(initializer, PREC_ASSIGN);
                    }
                }
                self.token(";");
            }
            Declaration::Precision { precision, ty } => {
                self.token("precision");
                self.token(precision.as_str());
                self.type_specifier(ty);
                self.token(";");
            }
            Declaration::Struct(definition) => self.struct_definition(definition),
            Declaration::Qualifier { qualifier, names } => {
                self.qualifier(qualifier);
                if !names.is_empty() {
                    self.space();
                }
                for (index, name) in names.iter().enumerate() {
                    if index > 0 {
                        self.comma();
                    }
                    self.token(&name.data);
                }
                self.token(";");
            }
        }
    }

    fn stmt(&mut self, stmt: &StmtNode) {
        match &stmt.data {
            Statement::Expr(expr) => {
                if let Some(expr) = expr {
                    self.expr(expr, 0);
                }
                self.token(";");
            }
            Statement::Declaration(declaration) => self.declaration(declaration),
            Statement::Compound(items) => {
                self.token("{");
                for item in items {
                    self.stmt(item);
                }
                self.token("}");
            }
            Statement::If {
                condition,
                then,
                otherwise,
            } => {
                self.token("if");
                self.parenthesized(condition);
                self.stmt(then);
                if let Some(otherwise) = otherwise {
                    self.token("else");
                    self.stmt(otherwise);
                }
            }
            Statement::While { condition, body } => {
                self.token("while");
                self.parenthesized(condition);
                self.stmt(body);
            }
            Statement::DoWhile { body, condition } => {
                self.token("do");
                self.stmt(body);
                self.token("while");
                self.parenthesized(condition);
                self.token(";");
            }
            Statement::For {
                init,
                condition,
                step,
                body,
            } => {
                self.token("for");
                self.token("(");
                self.stmt(init);
                if let Some(condition) = condition {
                    self.expr(condition, 0);
                }
                self.token(";");
                if let Some(step) = step {
                    self.expr(step, 0);
                }
                self.token(")");
                self.stmt(body);
            }
            Statement::Switch { selector, body } => {
                self.token("switch");
                self.parenthesized(selector);
                self.token("{");
                for item in body {
                    self.stmt(item);
                }
                self.token("}");
            }
            Statement::Case(label) => {
                self.token("case");
                self.expr(label, 0);
                self.token(":");
            }
            Statement::Default => {
                self.token("default");
                self.token(":");
            }
            Statement::Jump(jump) => self.jump(jump),
        }
    }

    fn jump(&mut self, jump: &Jump) {
        match jump {
            Jump::Break => self.token("break"),
            Jump::Continue => self.token("continue"),
            Jump::Discard => self.token("discard"),
            Jump::Return(value) => {
                self.token("return");
                if let Some(value) = value {
                    self.expr(value, 0);
                }
            }
        }
        self.token(";");
    }

    fn parenthesized(&mut self, expr: &ExprNode) {
        self.token("(");
        self.expr(expr, 0);
        self.token(")");
    }

    fn import(&mut self, import: &Import) {
        self.token("import");
        self.space();
        match &import.kind {
            ImportKind::All => self.token("*"),
            ImportKind::Prefixed(prefix) => {
                self.token("*");
                self.space();
                self.token("as");
                self.token(prefix);
            }
            ImportKind::Named(items) => {
                self.token("{");
                self.space();
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        self.comma();
                    }
                    self.token(&item.data.name);
                    if let Some(alias) = &item.data.alias {
                        self.token("as");
                        self.token(alias);
                    }
                }
                self.space();
                self.token("}");
            }
        }
        self.space();
        self.token("from");
        self.space();
        self.token(&format!("\"{}\"", import.path));
    }

    fn external(&mut self, external: &ExternalNode) {
        match &external.data {
            ExternalDeclaration::Function(function) => {
                self.prototype(&function.prototype.data);
                self.stmt(&function.body);
            }
            ExternalDeclaration::Declaration(declaration) => self.declaration(declaration),
            ExternalDeclaration::Import(import) => self.import(import),
        }
    }
}

// ---------------------------------------------------------------------
// Fancy layout
// ---------------------------------------------------------------------

struct Fancy<'a> {
    options: &'a FormatOptions,
    lines: Vec<String>,
    depth: usize,
}

impl<'a> Fancy<'a> {
    fn new(options: &'a FormatOptions) -> Self {
        Fancy {
            options,
            lines: Vec::new(),
            depth: 0,
        }
    }

    fn finish(self) -> String {
        let mut out = self.lines.join("\n");
        out.push('\n');
        out
    }

    fn indentation(&self) -> usize {
        self.depth * self.options.indent
    }

    fn line(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if text.is_empty() {
            self.lines.push(String::new());
        } else {
            self.lines
                .push(format!("{}{}", " ".repeat(self.indentation()), text));
        }
    }

    fn comment_lines<'c>(&mut self, comments: impl IntoIterator<Item = &'c String>) {
        for comment in comments {
            self.line(comment);
        }
    }

    fn comments(&mut self, comments: &Comments) {
        self.comment_lines(comments.iter());
    }

    fn inline(render: impl FnOnce(&mut Writer)) -> String {
        let mut writer = Writer::new(true);
        render(&mut writer);
        writer.out
    }

    fn unit(&mut self, unit: &TranslationUnit) {
        let is_function =
            |node: &ExternalNode| matches!(node.data, ExternalDeclaration::Function(_));
        for (index, declaration) in unit.declarations.iter().enumerate() {
            if index > 0
                && (is_function(declaration) || is_function(&unit.declarations[index - 1]))
            {
                self.line("");
            }
            self.external(declaration);
        }
        self.comments(&unit.comments);
    }

    fn external(&mut self, external: &ExternalNode) {
        self.comments(&external.comments);
        match &external.data {
            ExternalDeclaration::Function(function) => {
                self.comments(&function.prototype.comments);
                let header = Fancy::inline(|writer| writer.prototype(&function.prototype.data));
                self.block(header, &function.body, Vec::new());
            }
            ExternalDeclaration::Declaration(declaration) => self.declaration(declaration),
            ExternalDeclaration::Import(import) => {
                let text = Fancy::inline(|writer| writer.import(import));
                self.line(text);
            }
        }
    }

    fn declaration(&mut self, declaration: &Declaration) {
        match declaration {
            Declaration::Struct(definition) => {
                self.line(format!("struct {} {{", definition.name));
                self.depth += 1;
                for field in &definition.fields {
                    self.comments(&field.comments);
                    let text = Fancy::inline(|writer| writer.struct_field(&field.data));
                    self.line(text);
                }
                self.depth -= 1;
                self.line("};");
            }
            Declaration::Variables(list)
                if list.declarators.len() == 1
                    && list.declarators[0].data.initializer.is_some() =>
            {
                let declarator = &list.declarators[0].data;
                let prefix = Fancy::inline(|writer| {
                    writer.full_type(&list.ty);
                    writer.space();
                    writer.token(&declarator.name);
                    writer.array(&declarator.array);
                    writer.op("=");
                });
                if let Some(initializer) = &declarator.initializer {
                    self.expr_line(prefix, initializer, ";");
                }
            }
            _ => {
                let text = Fancy::inline(|writer| writer.declaration(declaration));
                self.line(text);
            }
        }
    }

    /// `prefix expr suffix` on one line, or with the call arguments of
    /// `expr` split over several lines when it does not fit.
    fn expr_line(&mut self, prefix: String, expr: &ExprNode, suffix: &str) {
        let text = fancy_expr(expr);
        let width = self.indentation() + prefix.len() + text.len() + suffix.len();
        if width <= self.options.line_width {
            self.line(format!("{prefix}{text}{suffix}"));
            return;
        }
        match &expr.data {
            Expr::Call(call) if !call.args.is_empty() => self.wrapped_call(prefix, call, suffix),
            Expr::Assign { op, left, right } if matches!(right.data, Expr::Call(_)) => {
                let prefix = format!("{prefix}{} {} ", fancy_expr(left), op.as_str());
                self.expr_line(prefix, right, suffix);
            }
            _ => self.line(format!("{prefix}{text}{suffix}")),
        }
    }

    fn wrapped_call(&mut self, prefix: String, call: &FunctionCall, suffix: &str) {
        let callee = Fancy::inline(|writer| writer.callee(call));
        self.line(format!("{prefix}{callee}("));
        self.depth += 1;
        let last = call.args.len().saturating_sub(1);
        for (index, arg) in call.args.iter().enumerate() {
            let separator = if index == last { "" } else { "," };
            self.expr_line(String::new(), arg, separator);
        }
        self.depth -= 1;
        self.line(format!("){suffix}"));
    }

    /// `header {` ... `}` for compound bodies, otherwise the header on its
    /// own line with the body indented below it.
    fn block(&mut self, header: String, body: &StmtNode, extra: Vec<&String>) {
        match &body.data {
            Statement::Compound(items) => {
                if header.is_empty() {
                    self.line("{");
                } else {
                    self.line(format!("{header} {{"));
                }
                self.depth += 1;
                self.comment_lines(extra);
                let (closing, opening): (&[String], &[Vec<String>]) =
                    match body.comments.0.split_last() {
                        Some((closing, opening)) => (closing, opening),
                        None => (&[], &[]),
                    };
                self.comment_lines(opening.iter().flatten());
                for item in items {
                    self.stmt(item);
                }
                self.comment_lines(closing);
                self.depth -= 1;
                self.line("}");
            }
            _ => {
                self.line(header);
                self.depth += 1;
                self.comment_lines(extra);
                self.stmt(body);
                self.depth -= 1;
            }
        }
    }

    fn stmt(&mut self, stmt: &StmtNode) {
        if !matches!(stmt.data, Statement::Compound(_)) {
            self.comments(&stmt.comments);
        }
        match &stmt.data {
            Statement::Expr(None) => self.line(";"),
            Statement::Expr(Some(expr)) => self.expr_line(String::new(), expr, ";"),
            Statement::Declaration(declaration) => self.declaration(declaration),
            Statement::Compound(_) => self.block(String::new(), stmt, Vec::new()),
            Statement::If { .. } => self.if_chain(String::new(), stmt, Vec::new()),
            Statement::While { condition, body } => {
                self.block(format!("while ({})", fancy_expr(condition)), body, Vec::new());
            }
            Statement::DoWhile { body, condition } => {
                let condition = fancy_expr(condition);
                if matches!(body.data, Statement::Compound(_)) {
                    self.block("do".to_string(), body, Vec::new());
                    self.lines.pop();
                    self.line(format!("}} while ({condition});"));
                } else {
                    self.block("do".to_string(), body, Vec::new());
                    self.line(format!("while ({condition});"));
                }
            }
            Statement::For {
                init,
                condition,
                step,
                body,
            } => {
                let mut header = format!("for ({}", Fancy::inline(|writer| writer.stmt(init)));
                if let Some(condition) = condition {
                    header.push(' ');
                    header.push_str(&fancy_expr(condition));
                }
                header.push(';');
                if let Some(step) = step {
                    header.push(' ');
                    header.push_str(&fancy_expr(step));
                }
                header.push(')');
                self.block(header, body, Vec::new());
            }
            Statement::Switch { selector, body } => {
                self.line(format!("switch ({}) {{", fancy_expr(selector)));
                self.depth += 1;
                for item in body {
                    if matches!(item.data, Statement::Case(_) | Statement::Default) {
                        self.stmt(item);
                    } else {
                        self.depth += 1;
                        self.stmt(item);
                        self.depth -= 1;
                    }
                }
                self.depth -= 1;
                self.line("}");
            }
            Statement::Case(label) => self.line(format!("case {}:", fancy_expr(label))),
            Statement::Default => self.line("default:"),
            Statement::Jump(Jump::Return(Some(value))) => {
                self.expr_line("return ".to_string(), value, ";");
            }
            Statement::Jump(jump) => {
                let text = Fancy::inline(|writer| writer.jump(jump));
                self.line(text);
            }
        }
    }

    fn if_chain(&mut self, prefix: String, stmt: &StmtNode, extra: Vec<&String>) {
        let Statement::If {
            condition,
            then,
            otherwise,
        } = &stmt.data
        else {
            return;
        };
        let header = format!("{prefix}if ({})", fancy_expr(condition));
        self.block(header, then, extra);
        let Some(otherwise) = otherwise else {
            return;
        };
        let prefix = if matches!(then.data, Statement::Compound(_)) {
            let closing = self.lines.pop().unwrap_or_default();
            format!("{} else ", closing.trim())
        } else {
            "else ".to_string()
        };
        let extra: Vec<&String> = otherwise.comments.iter().collect();
        if matches!(otherwise.data, Statement::If { .. }) {
            self.if_chain(prefix, otherwise, extra);
        } else {
            let header = prefix.trim_end().to_string();
            match &otherwise.data {
                Statement::Compound(_) => self.block(header, otherwise, Vec::new()),
                _ => {
                    self.line(header);
                    self.depth += 1;
                    self.comment_lines(extra);
                    self.stmt_without_comments(otherwise);
                    self.depth -= 1;
                }
            }
        }
    }

    fn stmt_without_comments(&mut self, stmt: &StmtNode) {
        let mut bare = stmt.clone();
        bare.comments = Comments::default();
        self.stmt(&bare);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::{
        parse, parse_declaration, parse_expression, parse_external_declaration, parse_statement,
    };

    fn expr(source: &str) -> String {
        packed_expr(&parse_expression(source).expect("parse"))
    }

    #[test]
    fn keeps_only_needed_parentheses() {
        assert_eq!(expr("1 * (2 + 3)"), "1*(2+3)");
        assert_eq!(expr("(1-2)-3"), "1-2-3");
        assert_eq!(expr("1-(2-3)"), "1-(2-3)");
        assert_eq!(expr("a = (b = c)"), "a=b=c");
        assert_eq!(expr("(a ? b : c) ? d : e"), "(a?b:c)?d:e");
        assert_eq!(expr("f((a, b), c)"), "f((a,b),c)");
        assert_eq!(expr("(-a)++"), "(-a)++");
        assert_eq!(expr("-(a.x)"), "-a.x");
    }

    #[test]
    fn separates_tokens_that_would_fuse() {
        assert_eq!(expr("a - -b"), "a- -b");
        assert_eq!(expr("a + ++b"), "a+ ++b");
        assert_eq!(expr("a - (-1)"), "a- -1");
        assert_eq!(expr("(1).x"), "(1).x");
        assert_eq!(expr("(1.0).x"), "1.0.x");
    }

    #[test]
    fn keeps_literal_text() {
        assert_eq!(expr("1.00 + 0x1Fu + 017 + 1e3f"), "1.00+0x1Fu+017+1e3f");
    }

    #[test]
    fn packed_output_is_idempotent() {
        let expressions = [
            "a.xyz[i]++ * -b",
            "f(void) + float[2](1.0, 2.0)[0]",
            "a ? b, c : d = e",
            "x <<= y >> 2 & ~z",
        ];
        for source in expressions {
            let once = expr(source);
            assert_eq!(expr(&once), once, "{source}");
        }

        let statements = [
            "if (a) if (b) x = 1; else y = 2;",
            "for (int i = 0; i < 4; i++) { continue; }",
            "for (;;) break;",
            "do x++; while (x < 3);",
            "switch (x) { case 1: y = 2; break; default: discard; }",
            "{ S s; s.f = 1.0; }",
        ];
        for source in statements {
            let once = packed_stmt(&parse_statement(source).expect("parse"));
            let twice = packed_stmt(&parse_statement(&once).expect("reparse"));
            assert_eq!(once, twice, "{source}");
        }

        let declarations = [
            "layout(location = 0) out highp vec4 color;",
            "struct Light { vec3 p; float r[2], s; };",
            "invariant gl_Position;",
            "precision mediump float;",
            "float[3] a = float[3](1.0, 2.0, 3.0), b[2];",
        ];
        for source in declarations {
            let once = packed_stmt(&parse_declaration(source).expect("parse"));
            let twice = packed_stmt(&parse_declaration(&once).expect("reparse"));
            assert_eq!(once, twice, "{source}");
        }

        let externals = [
            "import * as b_ from \"b.glsl\";",
            "import { f, g as h } from \"c.glsl\"",
            "vec2 f(in vec2 p, const float s) { return p * s; }",
        ];
        for source in externals {
            let once = packed_external(&parse_external_declaration(source).expect("parse"));
            let twice = packed_external(&parse_external_declaration(&once).expect("reparse"));
            assert_eq!(once, twice, "{source}");
        }
    }

    #[test]
    fn imports_drop_the_optional_semicolon() {
        let external =
            parse_external_declaration("import * as b_ from \"b.glsl\";").expect("parse");
        assert_eq!(packed_external(&external), "import*as b_ from\"b.glsl\"");
    }

    #[test]
    fn comments_do_not_change_packed_output() {
        let source = "uniform float t; float f(float x) { if (x > t) return x * 2.0; return -x; }";
        let mut commented = String::new();
        let mut last = 0;
        for token in tokenize(source).expect("lex") {
            commented.push_str(&source[last..token.start]);
            commented.push_str("/* c */");
            commented.push_str(&token.text);
            last = token.end;
        }
        let plain = packed(&parse(source).expect("parse"));
        let noisy = packed(&parse(&commented).expect("parse commented"));
        assert_eq!(plain, noisy);
    }

    const FANCY_SOURCE: &str = "// header
precision highp float;
uniform vec2 resolution;
float f(float x) {
  if (x > 0.0) return x; else { x = -x; }
  /* tail */
}
// end
";

    #[test]
    fn fancy_layout() {
        let unit = parse(FANCY_SOURCE).expect("parse");
        let expected = "// header
precision highp float;
uniform vec2 resolution;

float f(float x) {
    if (x > 0.0)
        return x;
    else {
        x = -x;
    }
    /* tail */
}
// end
";
        assert_eq!(format(&unit, &FormatOptions::fancy()), expected);
    }

    #[test]
    fn fancy_output_is_idempotent() {
        let source = "struct S { float a; }; void main() { for (int i = 0; i < 2; i++) { if (i == 0) { x = 1; } else if (i == 1) y = 2; else { z = 3; } } do { i--; } while (i > 0); switch (i) { case 0: break; default: i = 1; } }";
        let options = FormatOptions::fancy();
        let once = format(&parse(source).expect("parse"), &options);
        let twice = format(&parse(&once).expect("reparse"), &options);
        assert_eq!(once, twice);
        assert!(once.contains("} else if (i == 1)\n"));
        assert!(once.contains("} while (i > 0);"));
    }

    #[test]
    fn fancy_wraps_long_calls() {
        let unit = parse(
            "void main() { color = mix(vec3(0.1, 0.2, 0.3), vec3(0.4, 0.5, 0.6), smoothstep(0.0, 1.0, t)); }",
        )
        .expect("parse");
        let options = FormatOptions {
            line_width: 60,
            ..FormatOptions::fancy()
        };
        let expected = "void main() {
    color = mix(
        vec3(0.1, 0.2, 0.3),
        vec3(0.4, 0.5, 0.6),
        smoothstep(0.0, 1.0, t)
    );
}
";
        assert_eq!(format(&unit, &options), expected);
    }
}
