//! Expression grammar: the precedence ladder from primary expressions up to
//! the comma operator.

use super::{PResult, Parser};
use crate::ast::{
    AssignOp, Callee, Commented, Comments, Expr, ExprNode, FloatLiteral, FunctionCall,
    IntLiteral, Node, Radix, Selector, UnaryOp,
};
use crate::error::CoreError;
use crate::lexer::{Token, TokenKind, is_type_keyword};
use crate::span::Range;

impl Parser {
    /// `expression: assignment (',' assignment)*`
    pub(crate) fn expression(&mut self) -> PResult<ExprNode> {
        self.binop(Parser::assignment, &[","])
    }

    /// Right-associative assignment. The left side is parsed as a
    /// conditional expression; whether it is assignable is a semantic check.
    pub(crate) fn assignment(&mut self) -> PResult<ExprNode> {
        let left = self.conditional()?;
        let Some(op) = self
            .peek()
            .filter(|token| token.kind == TokenKind::Symbol)
            .and_then(|token| AssignOp::from_symbol(&token.text))
        else {
            return Ok(left);
        };
        let mut comments = Comments(vec![Vec::new()]);
        self.bump(&mut comments)?;
        let right = self.assignment()?;
        Ok(Node {
            range: Range::new(left.range.start, right.range.end),
            data: Expr::Assign {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            comments,
        })
    }

    fn conditional(&mut self) -> PResult<ExprNode> {
        let condition = self.logical_or()?;
        if !self.at_symbol("?") {
            return Ok(condition);
        }
        let mut comments = Comments(vec![Vec::new()]);
        self.bump(&mut comments)?;
        let then = self.expression()?;
        self.expect_symbol(":", &mut comments)?;
        let otherwise = self.assignment()?;
        Ok(Node {
            range: Range::new(condition.range.start, otherwise.range.end),
            data: Expr::Conditional {
                condition: Box::new(condition),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            },
            comments,
        })
    }

    fn logical_or(&mut self) -> PResult<ExprNode> {
        self.binop(Parser::logical_xor, &["||"])
    }

    fn logical_xor(&mut self) -> PResult<ExprNode> {
        self.binop(Parser::logical_and, &["^^"])
    }

    fn logical_and(&mut self) -> PResult<ExprNode> {
        self.binop(Parser::bit_or, &["&&"])
    }

    fn bit_or(&mut self) -> PResult<ExprNode> {
        self.binop(Parser::bit_xor, &["|"])
    }

    fn bit_xor(&mut self) -> PResult<ExprNode> {
        self.binop(Parser::bit_and, &["^"])
    }

    fn bit_and(&mut self) -> PResult<ExprNode> {
        self.binop(Parser::equality, &["&"])
    }

    fn equality(&mut self) -> PResult<ExprNode> {
        self.binop(Parser::relational, &["==", "!="])
    }

    fn relational(&mut self) -> PResult<ExprNode> {
        self.binop(Parser::shift, &["<", ">", "<=", ">="])
    }

    fn shift(&mut self) -> PResult<ExprNode> {
        self.binop(Parser::additive, &["<<", ">>"])
    }

    fn additive(&mut self) -> PResult<ExprNode> {
        self.binop(Parser::multiplicative, &["+", "-"])
    }

    fn multiplicative(&mut self) -> PResult<ExprNode> {
        self.binop(Parser::unary, &["*", "/", "%"])
    }

    fn unary(&mut self) -> PResult<ExprNode> {
        let op = self
            .peek()
            .filter(|token| token.kind == TokenKind::Symbol)
            .and_then(|token| match token.text.as_str() {
                "++" => Some(UnaryOp::Inc),
                "--" => Some(UnaryOp::Dec),
                "+" => Some(UnaryOp::Plus),
                "-" => Some(UnaryOp::Minus),
                "!" => Some(UnaryOp::Not),
                "~" => Some(UnaryOp::BitNot),
                _ => None,
            });
        match op {
            Some(op) => self.node(|parser, comments| {
                parser.bump(comments)?;
                let operand = parser.unary()?;
                Ok(Expr::Unary {
                    op,
                    postfix: false,
                    operand: Box::new(operand),
                })
            }),
            None => self.postfix(),
        }
    }

    /// Indexing, field access, method calls and postfix `++`/`--`.
    ///
    /// Method calls are recognized here rather than as plain field access so
    /// that `v.length()` is never mistaken for a property read.
    fn postfix(&mut self) -> PResult<ExprNode> {
        let mut expr = self.primary()?;
        loop {
            let mut comments = Comments(vec![Vec::new()]);
            let data = if self.at_symbol("[") {
                self.bump(&mut comments)?;
                let index = self.expression()?;
                self.expect_symbol("]", &mut comments)?;
                Expr::Binary {
                    op: crate::ast::BinaryOp::Index,
                    left: Box::new(expr),
                    right: Box::new(index),
                }
            } else if self.at_symbol(".") {
                self.bump(&mut comments)?;
                let selector = self.commented(|parser, comments| {
                    let name = parser.expect_identifier(comments)?;
                    if parser.at_symbol("(") {
                        let callee = Commented::new(Callee::Name(name));
                        Ok(Selector::Method(parser.call(callee, comments)?))
                    } else {
                        Ok(Selector::Member(name))
                    }
                })?;
                Expr::Field {
                    target: Box::new(expr),
                    selector,
                }
            } else if self.at_symbol("++") || self.at_symbol("--") {
                let token = self.bump(&mut comments)?;
                let op = if token.text == "++" {
                    UnaryOp::Inc
                } else {
                    UnaryOp::Dec
                };
                Expr::Unary {
                    op,
                    postfix: true,
                    operand: Box::new(expr),
                }
            } else {
                return Ok(expr);
            };
            let start = match &data {
                Expr::Binary { left, .. } => left.range.start,
                Expr::Field { target, .. } => target.range.start,
                Expr::Unary { operand, .. } => operand.range.start,
                _ => self.last_end,
            };
            expr = Node {
                data,
                comments,
                range: Range::new(start, self.last_end),
            };
        }
    }

    fn primary(&mut self) -> PResult<ExprNode> {
        let Some(token) = self.peek().cloned() else {
            return Err(self.expected("an expression"));
        };
        match token.kind {
            TokenKind::IntDecimal | TokenKind::IntOctal | TokenKind::IntHex => {
                self.node(|parser, comments| {
                    let token = parser.bump(comments)?;
                    int_literal(&token).map(Expr::Int)
                })
            }
            TokenKind::Float => self.node(|parser, comments| {
                let token = parser.bump(comments)?;
                float_literal(&token).map(Expr::Float)
            }),
            TokenKind::Keyword if token.text == "true" || token.text == "false" => {
                self.node(|parser, comments| {
                    let token = parser.bump(comments)?;
                    Ok(Expr::Bool(token.text == "true"))
                })
            }
            TokenKind::Keyword if is_type_keyword(&token.text) => self.constructor(),
            TokenKind::Symbol if token.text == "(" => self.parenthesized(),
            TokenKind::Identifier => {
                let next = self.peek_nth(1);
                if next.is_some_and(|next| next.is_symbol("(")) {
                    self.node(|parser, comments| {
                        let name = parser.expect_identifier(comments)?;
                        let callee = Commented::new(Callee::Name(name));
                        parser.call(callee, comments).map(Expr::Call)
                    })
                } else if next.is_some_and(|next| next.is_symbol("[")) {
                    // `S[2](...)` is an array constructor, `a[2]` an index.
                    self.attempt(Parser::constructor).or_else(|_| self.identifier())
                } else {
                    self.identifier()
                }
            }
            _ => Err(self.expected("an expression")),
        }
    }

    fn identifier(&mut self) -> PResult<ExprNode> {
        self.node(|parser, comments| parser.expect_identifier(comments).map(Expr::Ident))
    }

    fn constructor(&mut self) -> PResult<ExprNode> {
        self.node(|parser, comments| {
            let ty = parser.type_specifier()?;
            if !parser.at_symbol("(") {
                return Err(parser.expected("`(`"));
            }
            let callee = Commented::new(Callee::Type(ty));
            parser.call(callee, comments).map(Expr::Call)
        })
    }

    /// `( expression )`: yields the inner node with its range widened to the
    /// parentheses and the comments around them folded in.
    fn parenthesized(&mut self) -> PResult<ExprNode> {
        let mut comments = Comments(vec![self.leading()]);
        let start = self.start();
        self.expect_symbol("(", &mut comments)?;
        let mut inner = self.expression()?;
        self.expect_symbol(")", &mut comments)?;
        let close = comments.0.pop().unwrap_or_default();
        comments.append(std::mem::take(&mut inner.comments));
        comments.push(close);
        inner.comments = comments;
        inner.range = Range::new(start, self.last_end);
        Ok(inner)
    }

    /// Argument list of a call, cursor on `(`.
    pub(crate) fn call(
        &mut self,
        callee: Commented<Callee>,
        comments: &mut Comments,
    ) -> PResult<FunctionCall> {
        self.expect_symbol("(", comments)?;
        let mut void = false;
        let mut args = Vec::new();
        if self.at_keyword("void") && self.peek_nth(1).is_some_and(|next| next.is_symbol(")")) {
            self.bump(comments)?;
            void = true;
        } else if !self.at_symbol(")") {
            args = self.separated(",", comments, Parser::assignment)?;
        }
        self.expect_symbol(")", comments)?;
        Ok(FunctionCall { callee, args, void })
    }
}

fn int_literal(token: &Token) -> PResult<IntLiteral> {
    let text = token.text.clone();
    let unsigned = text.ends_with(['u', 'U']);
    let digits = text.trim_end_matches(['u', 'U']);
    let (radix, parsed) = match token.kind {
        TokenKind::IntHex => (Radix::Hex, u64::from_str_radix(&digits[2..], 16)),
        TokenKind::IntOctal => (Radix::Octal, u64::from_str_radix(&digits[1..], 8)),
        _ => (Radix::Decimal, digits.parse::<u64>()),
    };
    let value = parsed
        .ok()
        .and_then(|value| u32::try_from(value).ok())
        .ok_or_else(|| {
            CoreError::parse(token.start, format!("integer literal `{text}` is out of range"))
        })?;
    Ok(IntLiteral {
        text,
        value,
        unsigned,
        radix,
    })
}

fn float_literal(token: &Token) -> PResult<FloatLiteral> {
    let digits = token.text.trim_end_matches(['f', 'F']);
    let value = digits.parse::<f32>().map_err(|_| {
        CoreError::parse(
            token.start,
            format!("malformed float literal `{}`", token.text),
        )
    })?;
    Ok(FloatLiteral {
        text: token.text.clone(),
        value,
    })
}

#[cfg(test)]
mod tests {
    use crate::ast::{BinaryOp, Callee, Expr, Selector, UnaryOp};
    use crate::parser::parse_expression;

    fn parse(source: &str) -> Expr {
        parse_expression(source).expect("parse").data
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let Expr::Binary { op, right, .. } = parse("1 + 2 * 3") else {
            panic!("expected binary");
        };
        assert_eq!(op, BinaryOp::Add);
        assert!(matches!(right.data, Expr::Binary { op: BinaryOp::Mul, .. }));
    }

    #[test]
    fn subtraction_is_left_associative() {
        let Expr::Binary { left, .. } = parse("1 - 2 - 3") else {
            panic!("expected binary");
        };
        assert!(matches!(left.data, Expr::Binary { op: BinaryOp::Sub, .. }));
    }

    #[test]
    fn assignment_is_right_associative() {
        let Expr::Assign { right, .. } = parse("a = b += c") else {
            panic!("expected assignment");
        };
        assert!(matches!(right.data, Expr::Assign { .. }));
    }

    #[test]
    fn parses_postfix_chain() {
        let Expr::Unary { op, postfix, operand } = parse("a[1].xy++") else {
            panic!("expected unary");
        };
        assert_eq!(op, UnaryOp::Inc);
        assert!(postfix);
        let Expr::Field { target, selector } = operand.data else {
            panic!("expected field access");
        };
        assert_eq!(selector.data, Selector::Member("xy".to_string()));
        assert!(matches!(target.data, Expr::Binary { op: BinaryOp::Index, .. }));
    }

    #[test]
    fn method_calls_are_not_field_reads() {
        let Expr::Field { selector, .. } = parse("values.length()") else {
            panic!("expected field access");
        };
        assert!(matches!(selector.data, Selector::Method(_)));
    }

    #[test]
    fn parses_constructors_and_calls() {
        let Expr::Call(call) = parse("vec3(1.0, 2.0, 3.0)") else {
            panic!("expected call");
        };
        assert!(matches!(call.callee.data, Callee::Type(_)));
        assert_eq!(call.args.len(), 3);

        let Expr::Call(call) = parse("float[2](1.0, 2.0)") else {
            panic!("expected call");
        };
        let Callee::Type(ty) = &call.callee.data else {
            panic!("expected type callee");
        };
        assert!(ty.array.is_array());

        let Expr::Call(call) = parse("f(void)") else {
            panic!("expected call");
        };
        assert!(call.void);
        assert!(call.args.is_empty());
    }

    #[test]
    fn identifier_followed_by_index_is_not_a_constructor() {
        assert!(matches!(parse("a[2]"), Expr::Binary { op: BinaryOp::Index, .. }));
        assert!(matches!(parse("S[2](a, b)"), Expr::Call(_)));
    }

    #[test]
    fn keeps_literal_text() {
        let Expr::Float(literal) = parse("1.00") else {
            panic!("expected float");
        };
        assert_eq!(literal.text, "1.00");
        assert_eq!(literal.value, 1.0);

        let Expr::Int(literal) = parse("0x1Fu") else {
            panic!("expected int");
        };
        assert_eq!(literal.value, 31);
        assert!(literal.unsigned);
    }

    #[test]
    fn rejects_oversized_integer_literals() {
        assert!(parse_expression("4294967296").is_err());
        assert!(parse_expression("4294967295u").is_ok());
    }

    #[test]
    fn conditional_else_branch_takes_assignment() {
        let Expr::Conditional { otherwise, .. } = parse("a ? b : c = d") else {
            panic!("expected conditional");
        };
        assert!(matches!(otherwise.data, Expr::Assign { .. }));
    }
}
