//! Statements and blocks.

use super::{PResult, Parser};
use crate::ast::{Comments, Expr, Jump, Node, Statement, StmtNode};
use crate::error::CoreError;
use crate::span::Range;

impl Parser {
    pub(crate) fn statement(&mut self) -> PResult<StmtNode> {
        if self.at_symbol("{") {
            return self.compound_statement();
        }
        let keyword = self
            .peek()
            .filter(|token| token.kind == crate::lexer::TokenKind::Keyword)
            .map(|token| token.text.clone());
        self.node(|parser, comments| match keyword.as_deref() {
            Some("if") => parser.if_statement(comments),
            Some("while") => parser.while_statement(comments),
            Some("do") => parser.do_statement(comments),
            Some("for") => parser.for_statement(comments),
            Some("switch") => parser.switch_statement(comments),
            Some("case") => {
                parser.bump(comments)?;
                let label = parser.expression()?;
                parser.expect_symbol(":", comments)?;
                Ok(Statement::Case(label))
            }
            Some("default") => {
                parser.bump(comments)?;
                parser.expect_symbol(":", comments)?;
                Ok(Statement::Default)
            }
            Some("break") => parser.jump(Jump::Break, comments),
            Some("continue") => parser.jump(Jump::Continue, comments),
            Some("discard") => parser.jump(Jump::Discard, comments),
            Some("return") => {
                parser.bump(comments)?;
                let value = if parser.at_symbol(";") {
                    None
                } else {
                    Some(parser.expression()?)
                };
                parser.expect_symbol(";", comments)?;
                Ok(Statement::Jump(Jump::Return(value)))
            }
            _ if parser.at_symbol(";") => {
                parser.bump(comments)?;
                Ok(Statement::Expr(None))
            }
            _ => parser.simple_statement(comments),
        })
    }

    pub(crate) fn compound_statement(&mut self) -> PResult<StmtNode> {
        self.node(|parser, comments| {
            parser.expect_symbol("{", comments)?;
            let items = parser.block_items()?;
            parser.expect_symbol("}", comments)?;
            Ok(Statement::Compound(items))
        })
    }

    /// Statements up to (not including) the closing `}`.
    fn block_items(&mut self) -> PResult<Vec<StmtNode>> {
        let mut items = Vec::new();
        while !self.at_symbol("}") {
            if self.peek().is_none() {
                return Err(self.expected("`}`"));
            }
            items.push(self.block_item()?);
        }
        Ok(items)
    }

    fn block_item(&mut self) -> PResult<StmtNode> {
        if !self.recovering {
            return self.statement();
        }
        let error = match self.attempt(Parser::statement) {
            Ok(statement) => return Ok(statement),
            Err(error) => error,
        };
        log::debug!("recovering from {error}");
        let leading = self.leading();
        let start = self.start();
        let skipped = self.synchronize();
        let range = Range::new(start, self.last_end.max(start));
        let placeholder = Node::new(Expr::Error(error.to_string()), range);
        self.recovered.push(error);
        Ok(Node {
            data: Statement::Expr(Some(placeholder)),
            comments: Comments(vec![leading, skipped]),
            range,
        })
    }

    /// A declaration or an expression statement. When neither parses, the
    /// error that got further into the input wins.
    fn simple_statement(&mut self, comments: &mut Comments) -> PResult<Statement> {
        let saved = comments.0.len();
        let declaration_error = match self.attempt(|parser| parser.declaration(comments)) {
            Ok(declaration) => return Ok(Statement::Declaration(declaration)),
            Err(error) => error,
        };
        comments.0.truncate(saved);
        let expression = self.attempt(|parser| {
            let expr = parser.expression()?;
            parser.expect_symbol(";", comments)?;
            Ok(expr)
        });
        match expression {
            Ok(expr) => Ok(Statement::Expr(Some(expr))),
            Err(expression_error) => {
                comments.0.truncate(saved);
                Err(furthest(declaration_error, expression_error))
            }
        }
    }

    fn if_statement(&mut self, comments: &mut Comments) -> PResult<Statement> {
        self.expect_keyword("if", comments)?;
        let condition = self.condition(comments)?;
        let then = Box::new(self.statement()?);
        let otherwise = if self.eat_keyword("else", comments)? {
            Some(Box::new(self.statement()?))
        } else {
            None
        };
        Ok(Statement::If {
            condition,
            then,
            otherwise,
        })
    }

    fn while_statement(&mut self, comments: &mut Comments) -> PResult<Statement> {
        self.expect_keyword("while", comments)?;
        let condition = self.condition(comments)?;
        let body = Box::new(self.statement()?);
        Ok(Statement::While { condition, body })
    }

    fn do_statement(&mut self, comments: &mut Comments) -> PResult<Statement> {
        self.expect_keyword("do", comments)?;
        let body = Box::new(self.statement()?);
        self.expect_keyword("while", comments)?;
        let condition = self.condition(comments)?;
        self.expect_symbol(";", comments)?;
        Ok(Statement::DoWhile { body, condition })
    }

    fn for_statement(&mut self, comments: &mut Comments) -> PResult<Statement> {
        self.expect_keyword("for", comments)?;
        self.expect_symbol("(", comments)?;
        let init = self.node(|parser, comments| {
            if parser.eat_symbol(";", comments)? {
                Ok(Statement::Expr(None))
            } else {
                parser.simple_statement(comments)
            }
        })?;
        let condition = self.optional(Parser::expression);
        self.expect_symbol(";", comments)?;
        let step = self.optional(Parser::expression);
        self.expect_symbol(")", comments)?;
        let body = Box::new(self.statement()?);
        Ok(Statement::For {
            init: Box::new(init),
            condition,
            step,
            body,
        })
    }

    fn switch_statement(&mut self, comments: &mut Comments) -> PResult<Statement> {
        self.expect_keyword("switch", comments)?;
        let selector = self.condition(comments)?;
        self.expect_symbol("{", comments)?;
        let body = self.block_items()?;
        self.expect_symbol("}", comments)?;
        Ok(Statement::Switch { selector, body })
    }

    fn jump(&mut self, jump: Jump, comments: &mut Comments) -> PResult<Statement> {
        self.bump(comments)?;
        self.expect_symbol(";", comments)?;
        Ok(Statement::Jump(jump))
    }

    /// `( expression )` after `if`, `while` and `switch`.
    fn condition(&mut self, comments: &mut Comments) -> PResult<crate::ast::ExprNode> {
        self.expect_symbol("(", comments)?;
        let condition = self.expression()?;
        self.expect_symbol(")", comments)?;
        Ok(condition)
    }
}

fn furthest(first: CoreError, second: CoreError) -> CoreError {
    if second.position() > first.position() {
        second
    } else {
        first
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{Declaration, Expr, Jump, Statement};
    use crate::parser::parse_statement;

    fn parse(source: &str) -> Statement {
        parse_statement(source).expect("parse").data
    }

    #[test]
    fn distinguishes_declarations_from_expressions() {
        assert!(matches!(
            parse("S s;"),
            Statement::Declaration(Declaration::Variables(_))
        ));
        assert!(matches!(parse("a = b;"), Statement::Expr(Some(_))));
        assert!(matches!(parse("vec3(1.0);"), Statement::Expr(Some(_))));
        assert!(matches!(parse("a[0] = 1.0;"), Statement::Expr(Some(_))));
        assert!(matches!(parse(";"), Statement::Expr(None)));
    }

    #[test]
    fn parses_if_else() {
        let Statement::If { otherwise, .. } = parse("if (a) b = c; else { d = e; }") else {
            panic!("expected if");
        };
        assert!(matches!(
            otherwise.map(|node| node.data),
            Some(Statement::Compound(_))
        ));
    }

    #[test]
    fn parses_loops() {
        let Statement::For {
            init,
            condition,
            step,
            ..
        } = parse("for (int i = 0; i < 4; i++) x += i;")
        else {
            panic!("expected for");
        };
        assert!(matches!(init.data, Statement::Declaration(_)));
        assert!(condition.is_some() && step.is_some());

        let Statement::For {
            condition, step, ..
        } = parse("for (;;) break;")
        else {
            panic!("expected for");
        };
        assert!(condition.is_none() && step.is_none());

        assert!(matches!(parse("while (true) {}"), Statement::While { .. }));
        assert!(matches!(parse("do x++; while (x < 3);"), Statement::DoWhile { .. }));
    }

    #[test]
    fn parses_switch_labels() {
        let Statement::Switch { body, .. } =
            parse("switch (x) { case 1: y = 2; break; default: y = 3; }")
        else {
            panic!("expected switch");
        };
        assert_eq!(body.len(), 5);
        assert!(matches!(body[0].data, Statement::Case(_)));
        assert!(matches!(body[3].data, Statement::Default));
    }

    #[test]
    fn parses_jumps() {
        assert!(matches!(parse("return;"), Statement::Jump(Jump::Return(None))));
        let Statement::Jump(Jump::Return(Some(value))) = parse("return a + 1;") else {
            panic!("expected return");
        };
        assert!(matches!(value.data, Expr::Binary { .. }));
        assert!(matches!(parse("discard;"), Statement::Jump(Jump::Discard)));
    }

    #[test]
    fn reports_the_furthest_error() {
        let err = parse_statement("a = = 2;").unwrap_err();
        assert_eq!(err.position(), Some(4));
    }
}
