//! Parser for glslx.
//!
//! The parser is a recursive-descent cursor over the full token stream,
//! comment tokens included. Productions never see comment tokens directly:
//! every token consumption hands the comments immediately preceding it to
//! the production, which stores them in its [`Comments`]. The generic
//! building blocks live here; the concrete grammar lives in the `expr`,
//! `stmt` and `decl` submodules.

mod decl;
mod expr;
mod stmt;

use crate::ast::{
    CommentGroup, Commented, Comments, ExprNode, ExternalNode, Node, StmtNode, TranslationUnit,
};
use crate::error::CoreError;
use crate::lexer::{Token, TokenKind, tokenize};
use crate::span::Range;

pub(crate) type PResult<T> = Result<T, CoreError>;

/// Parse a whole translation unit.
pub fn parse(source: &str) -> Result<TranslationUnit, CoreError> {
    let mut parser = Parser::new(tokenize(source)?, source.len());
    let unit = parser.translation_unit()?;
    Ok(unit)
}

/// Parse a translation unit, replacing statements that fail to parse inside
/// blocks with error placeholders.
///
/// Errors that cannot be recovered from (lexing, top-level syntax) are still
/// returned as `Err`. Recovered errors come back next to the unit.
pub fn parse_recovering(source: &str) -> Result<(TranslationUnit, Vec<CoreError>), CoreError> {
    let mut parser = Parser::new(tokenize(source)?, source.len());
    parser.recovering = true;
    let unit = parser.translation_unit()?;
    Ok((unit, parser.recovered))
}

/// Parse a single expression, e.g. `1*(2+3)`.
pub fn parse_expression(source: &str) -> Result<ExprNode, CoreError> {
    parse_fragment(source, Parser::expression)
}

/// Parse a single statement, e.g. `if(a)b=c;`.
pub fn parse_statement(source: &str) -> Result<StmtNode, CoreError> {
    parse_fragment(source, Parser::statement)
}

/// Parse a single declaration statement, e.g. `const float a=1.;`.
pub fn parse_declaration(source: &str) -> Result<StmtNode, CoreError> {
    parse_fragment(source, |parser| {
        parser.node(|parser, comments| {
            parser
                .declaration(comments)
                .map(crate::ast::Statement::Declaration)
        })
    })
}

/// Parse a single external declaration: function, declaration or import.
pub fn parse_external_declaration(source: &str) -> Result<ExternalNode, CoreError> {
    parse_fragment(source, Parser::external_declaration)
}

fn parse_fragment<T>(
    source: &str,
    rule: impl FnOnce(&mut Parser) -> PResult<Node<T>>,
) -> Result<Node<T>, CoreError> {
    let mut parser = Parser::new(tokenize(source)?, source.len());
    let mut node = rule(&mut parser)?;
    let trailing = parser.leading();
    if let Some(token) = parser.peek() {
        return Err(CoreError::parse(
            token.start,
            format!("unexpected trailing input `{}`", token.text),
        ));
    }
    if !trailing.is_empty() {
        node.comments.push(trailing);
    }
    Ok(node)
}

pub(crate) struct Parser {
    tokens: Vec<Token>,
    index: usize,
    /// End offset of the last consumed non-comment token.
    last_end: usize,
    source_len: usize,
    recovering: bool,
    recovered: Vec<CoreError>,
}

impl Parser {
    fn new(tokens: Vec<Token>, source_len: usize) -> Self {
        Parser {
            tokens,
            index: 0,
            last_end: 0,
            source_len,
            recovering: false,
            recovered: Vec::new(),
        }
    }

    // -----------------------------------------------------------------
    // Cursor
    // -----------------------------------------------------------------

    fn next_significant(&self, from: usize) -> Option<usize> {
        (from..self.tokens.len()).find(|&index| self.tokens[index].kind != TokenKind::Comment)
    }

    /// The next non-comment token.
    fn peek(&self) -> Option<&Token> {
        self.peek_nth(0)
    }

    /// The `n`th non-comment token after the cursor.
    fn peek_nth(&self, n: usize) -> Option<&Token> {
        let mut index = self.next_significant(self.index)?;
        for _ in 0..n {
            index = self.next_significant(index + 1)?;
        }
        self.tokens.get(index)
    }

    /// Byte offset of the next non-comment token, or the end of input.
    fn start(&self) -> usize {
        self.peek().map_or(self.source_len, |token| token.start)
    }

    /// Drain the comment tokens at the cursor.
    fn leading(&mut self) -> CommentGroup {
        let mut group = Vec::new();
        while let Some(token) = self.tokens.get(self.index) {
            if token.kind != TokenKind::Comment {
                break;
            }
            group.push(token.text.clone());
            self.index += 1;
        }
        group
    }

    /// Consume the next token, recording the comments before it.
    fn bump(&mut self, comments: &mut Comments) -> PResult<Token> {
        let group = self.leading();
        let token = self
            .tokens
            .get(self.index)
            .cloned()
            .ok_or_else(|| CoreError::parse(self.source_len, "unexpected end of input"))?;
        comments.push(group);
        self.index += 1;
        self.last_end = token.end;
        Ok(token)
    }

    fn at_symbol(&self, symbol: &str) -> bool {
        self.peek().is_some_and(|token| token.is_symbol(symbol))
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        self.peek().is_some_and(|token| token.is_keyword(keyword))
    }

    fn at_kind(&self, kind: TokenKind) -> bool {
        self.peek().is_some_and(|token| token.kind == kind)
    }

    fn eat_symbol(&mut self, symbol: &str, comments: &mut Comments) -> PResult<bool> {
        if self.at_symbol(symbol) {
            self.bump(comments)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn eat_keyword(&mut self, keyword: &str, comments: &mut Comments) -> PResult<bool> {
        if self.at_keyword(keyword) {
            self.bump(comments)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn expect_symbol(&mut self, symbol: &str, comments: &mut Comments) -> PResult<Token> {
        if self.at_symbol(symbol) {
            self.bump(comments)
        } else {
            Err(self.expected(&format!("`{symbol}`")))
        }
    }

    fn expect_keyword(&mut self, keyword: &str, comments: &mut Comments) -> PResult<Token> {
        if self.at_keyword(keyword) {
            self.bump(comments)
        } else {
            Err(self.expected(&format!("`{keyword}`")))
        }
    }

    fn expect_identifier(&mut self, comments: &mut Comments) -> PResult<String> {
        if self.at_kind(TokenKind::Identifier) {
            Ok(self.bump(comments)?.text)
        } else {
            Err(self.expected("an identifier"))
        }
    }

    /// Error describing what was expected at the cursor.
    fn expected(&self, what: &str) -> CoreError {
        match self.peek() {
            Some(token) => CoreError::parse(
                token.start,
                format!("expected {what}, found `{}`", token.text),
            ),
            None => CoreError::parse(
                self.source_len,
                format!("expected {what}, found end of input"),
            ),
        }
    }

    // -----------------------------------------------------------------
    // Combinators
    // -----------------------------------------------------------------

    /// Run a production that owns a range. Group 0 of the node's comments is
    /// whatever precedes its first token.
    fn node<T>(
        &mut self,
        rule: impl FnOnce(&mut Self, &mut Comments) -> PResult<T>,
    ) -> PResult<Node<T>> {
        let mut comments = Comments(vec![self.leading()]);
        let start = self.start();
        let data = rule(self, &mut comments)?;
        Ok(Node {
            data,
            comments,
            range: Range::new(start, self.last_end.max(start)),
        })
    }

    /// Like [`Parser::node`] for productions without a range.
    fn commented<T>(
        &mut self,
        rule: impl FnOnce(&mut Self, &mut Comments) -> PResult<T>,
    ) -> PResult<Commented<T>> {
        let mut comments = Comments(vec![self.leading()]);
        let data = rule(self, &mut comments)?;
        Ok(Commented { data, comments })
    }

    /// Ordered alternation: run `rule`, rewinding the cursor if it fails.
    fn attempt<T>(&mut self, rule: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        let (index, last_end) = (self.index, self.last_end);
        let recovered = self.recovered.len();
        let result = rule(self);
        if result.is_err() {
            self.index = index;
            self.last_end = last_end;
            self.recovered.truncate(recovered);
        }
        result
    }

    /// Run `rule` if it succeeds, otherwise consume nothing.
    fn optional<T>(&mut self, rule: impl FnOnce(&mut Self) -> PResult<T>) -> Option<T> {
        self.attempt(rule).ok()
    }

    /// Repeat `rule` until it fails.
    fn many<T>(&mut self, mut rule: impl FnMut(&mut Self) -> PResult<T>) -> Vec<T> {
        let mut items = Vec::new();
        while let Some(item) = self.optional(&mut rule) {
            items.push(item);
        }
        items
    }

    /// One or more `rule`s separated by `separator`.
    fn separated<T>(
        &mut self,
        separator: &str,
        comments: &mut Comments,
        mut rule: impl FnMut(&mut Self) -> PResult<T>,
    ) -> PResult<Vec<T>> {
        let mut items = vec![rule(self)?];
        while self.eat_symbol(separator, comments)? {
            items.push(rule(self)?);
        }
        Ok(items)
    }

    /// Left-associative binary operator chain over `higher`-precedence
    /// operands.
    fn binop(
        &mut self,
        higher: fn(&mut Self) -> PResult<ExprNode>,
        operators: &[&str],
    ) -> PResult<ExprNode> {
        let mut left = higher(self)?;
        loop {
            let Some(op) = self
                .peek()
                .filter(|token| token.kind == TokenKind::Symbol)
                .filter(|token| operators.contains(&token.text.as_str()))
                .and_then(|token| crate::ast::BinaryOp::from_symbol(&token.text))
            else {
                return Ok(left);
            };
            let mut comments = Comments(vec![Vec::new()]);
            self.bump(&mut comments)?;
            let right = higher(self)?;
            let range = Range::new(left.range.start, right.range.end);
            left = Node {
                data: crate::ast::Expr::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                comments,
                range,
            };
        }
    }

    // -----------------------------------------------------------------
    // Translation unit
    // -----------------------------------------------------------------

    fn translation_unit(&mut self) -> PResult<TranslationUnit> {
        let mut declarations = Vec::new();
        while self.peek().is_some() {
            declarations.push(self.external_declaration()?);
        }
        let trailing = self.leading();
        Ok(TranslationUnit {
            declarations,
            comments: Comments(vec![trailing]),
        })
    }

    /// Skip to the end of the broken statement: past the next `;` at the
    /// current nesting depth, or up to the `}` closing the enclosing block.
    /// Returns the comments that were skipped over.
    fn synchronize(&mut self) -> CommentGroup {
        let mut skipped = Vec::new();
        let mut depth = 0usize;
        let mut consumed = false;
        while let Some(token) = self.tokens.get(self.index) {
            if token.kind == TokenKind::Comment {
                skipped.push(token.text.clone());
                self.index += 1;
                continue;
            }
            if token.is_symbol("}") && depth == 0 && consumed {
                break;
            }
            self.index += 1;
            self.last_end = token.end;
            consumed = true;
            if token.is_symbol("{") {
                depth += 1;
            } else if token.is_symbol("}") {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    break;
                }
            } else if token.is_symbol(";") && depth == 0 {
                break;
            }
        }
        skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Expr, ExternalDeclaration, Statement};

    #[test]
    fn binary_nodes_span_both_operands() {
        let expr = parse_expression("a + b * c").expect("parse");
        assert_eq!(expr.range, Range::new(0, 9));
        let Expr::Binary { right, .. } = &expr.data else {
            panic!("expected binary expression");
        };
        assert_eq!(right.range, Range::new(4, 9));
    }

    #[test]
    fn parenthesized_range_includes_parens() {
        let expr = parse_expression("(a + b) * c").expect("parse");
        let Expr::Binary { left, .. } = &expr.data else {
            panic!("expected binary expression");
        };
        assert_eq!(left.range, Range::new(0, 7));
    }

    #[test]
    fn comments_attach_to_following_production() {
        let unit = parse("/* lead */ float a; // tail").expect("parse");
        assert_eq!(unit.declarations[0].comments.leading(), ["/* lead */"]);
        assert_eq!(unit.comments.leading(), ["// tail"]);
    }

    #[test]
    fn no_comment_is_lost() {
        let source = "/*1*/ void /*2*/ main /*3*/ ( /*4*/ ) /*5*/ { /*6*/ a /*7*/ = /*8*/ 1 /*9*/ ; /*10*/ } /*11*/";
        let unit = parse(source).expect("parse");
        let mut count = unit.comments.iter().count();
        let decl = &unit.declarations[0];
        count += decl.comments.iter().count();
        let ExternalDeclaration::Function(function) = &decl.data else {
            panic!("expected function");
        };
        count += function.prototype.comments.iter().count();
        count += function
            .prototype
            .data
            .return_type
            .specifier
            .name
            .comments
            .iter()
            .count();
        count += function.body.comments.iter().count();
        let Statement::Compound(body) = &function.body.data else {
            panic!("expected block");
        };
        let stmt = &body[0];
        count += stmt.comments.iter().count();
        let Statement::Expr(Some(expr)) = &stmt.data else {
            panic!("expected expression statement");
        };
        count += expr.comments.iter().count();
        let Expr::Assign { left, right, .. } = &expr.data else {
            panic!("expected assignment");
        };
        count += left.comments.iter().count() + right.comments.iter().count();
        assert_eq!(count, 11);
    }

    #[test]
    fn reports_trailing_input() {
        let err = parse_expression("a b").unwrap_err();
        assert!(matches!(err, CoreError::ParseError { position: 2, .. }));
    }

    #[test]
    fn reports_missing_semicolon() {
        let err = parse("float a").unwrap_err();
        assert!(matches!(err, CoreError::ParseError { position: 7, .. }));
    }

    #[test]
    fn recovering_parse_leaves_error_placeholder() {
        let source = "void main() { float a = 1.0; a = = 2; a = 3.0; }";
        let (unit, errors) = parse_recovering(source).expect("parse");
        assert_eq!(errors.len(), 1);
        let ExternalDeclaration::Function(function) = &unit.declarations[0].data else {
            panic!("expected function");
        };
        let Statement::Compound(body) = &function.body.data else {
            panic!("expected block");
        };
        assert_eq!(body.len(), 3);
        assert!(matches!(
            &body[1].data,
            Statement::Expr(Some(Node { data: Expr::Error(_), .. }))
        ));
    }

    #[test]
    fn strict_parse_rejects_broken_statement() {
        assert!(parse("void main() { a = = 2; }").is_err());
    }
}
