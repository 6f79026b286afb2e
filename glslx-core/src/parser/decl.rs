//! Declarations, types, function prototypes, structs and imports.

use super::{PResult, Parser};
use crate::ast::{
    ArraySpecifier, Commented, Comments, Declaration, Declarator, DeclaratorList,
    ExternalDeclaration, ExternalNode, FullySpecifiedType, FunctionDefinition, FunctionPrototype,
    Import, ImportItem, ImportKind, Interpolation, LayoutId, Parameter, Precision, Qualifier,
    Storage, StructDefinition, StructField, TypeName, TypeQualifier, TypeSpecifier,
};
use crate::lexer::{TokenKind, is_type_keyword};

/// Either half of the shared prefix `type name (...)`.
enum Parsed {
    Declaration(Declaration),
    Function(FunctionDefinition),
}

impl Parser {
    pub(crate) fn external_declaration(&mut self) -> PResult<ExternalNode> {
        self.node(|parser, comments| {
            if parser.at_keyword("import") {
                return parser.import(comments).map(ExternalDeclaration::Import);
            }
            Ok(match parser.declaration_or_definition(comments, true)? {
                Parsed::Declaration(declaration) => ExternalDeclaration::Declaration(declaration),
                Parsed::Function(function) => ExternalDeclaration::Function(function),
            })
        })
    }

    /// A declaration terminated by `;`.
    pub(crate) fn declaration(&mut self, comments: &mut Comments) -> PResult<Declaration> {
        match self.declaration_or_definition(comments, false)? {
            Parsed::Declaration(declaration) => Ok(declaration),
            Parsed::Function(_) => Err(self.expected("`;`")),
        }
    }

    fn declaration_or_definition(
        &mut self,
        comments: &mut Comments,
        allow_definition: bool,
    ) -> PResult<Parsed> {
        if self.at_keyword("precision") {
            self.bump(comments)?;
            let precision = self
                .peek()
                .filter(|token| token.kind == TokenKind::Keyword)
                .and_then(|token| Precision::from_keyword(&token.text))
                .ok_or_else(|| self.expected("a precision qualifier"))?;
            self.bump(comments)?;
            let ty = self.type_specifier()?;
            self.expect_symbol(";", comments)?;
            return Ok(Parsed::Declaration(Declaration::Precision { precision, ty }));
        }

        if self.at_keyword("struct") {
            let definition = self.struct_definition(comments)?;
            self.expect_symbol(";", comments)?;
            return Ok(Parsed::Declaration(Declaration::Struct(definition)));
        }

        let qualifier = self.type_qualifier()?;
        if let Some(qualifier) = &qualifier {
            let names_follow = self.at_kind(TokenKind::Identifier)
                && self
                    .peek_nth(1)
                    .is_some_and(|next| next.is_symbol(",") || next.is_symbol(";"));
            if self.at_symbol(";") || names_follow {
                let names = if names_follow {
                    self.separated(",", comments, |parser| {
                        parser.commented(|parser, comments| parser.expect_identifier(comments))
                    })?
                } else {
                    Vec::new()
                };
                self.expect_symbol(";", comments)?;
                return Ok(Parsed::Declaration(Declaration::Qualifier {
                    qualifier: qualifier.clone(),
                    names,
                }));
            }
        }

        let specifier = self.type_specifier()?;
        let ty = FullySpecifiedType {
            qualifier,
            specifier,
        };
        let mut first = Comments::default();
        let name = self.expect_identifier(&mut first)?;

        if self.at_symbol("(") {
            let prototype = self.prototype_rest(ty, name, comments)?;
            if allow_definition && self.at_symbol("{") {
                let body = self.compound_statement()?;
                return Ok(Parsed::Function(FunctionDefinition {
                    prototype: Commented {
                        data: prototype,
                        comments: first,
                    },
                    body: Box::new(body),
                }));
            }
            comments.append(first);
            self.expect_symbol(";", comments)?;
            return Ok(Parsed::Declaration(Declaration::Prototype(prototype)));
        }

        let mut declarators = vec![Commented {
            data: self.declarator_rest(name, &mut first)?,
            comments: first,
        }];
        while self.eat_symbol(",", comments)? {
            declarators.push(self.commented(|parser, comments| {
                let name = parser.expect_identifier(comments)?;
                parser.declarator_rest(name, comments)
            })?);
        }
        self.expect_symbol(";", comments)?;
        Ok(Parsed::Declaration(Declaration::Variables(DeclaratorList {
            ty,
            declarators,
        })))
    }

    fn declarator_rest(&mut self, name: String, comments: &mut Comments) -> PResult<Declarator> {
        let array = self.array_specifier(comments)?;
        let initializer = if self.eat_symbol("=", comments)? {
            Some(self.assignment()?)
        } else {
            None
        };
        Ok(Declarator {
            name,
            array,
            initializer,
        })
    }

    fn prototype_rest(
        &mut self,
        return_type: FullySpecifiedType,
        name: String,
        comments: &mut Comments,
    ) -> PResult<FunctionPrototype> {
        self.expect_symbol("(", comments)?;
        let params = if self.at_symbol(")") {
            Vec::new()
        } else {
            self.separated(",", comments, Parser::parameter)?
        };
        self.expect_symbol(")", comments)?;
        Ok(FunctionPrototype {
            return_type,
            name,
            params,
        })
    }

    fn parameter(&mut self) -> PResult<Commented<Parameter>> {
        self.commented(|parser, comments| {
            let qualifier = parser.type_qualifier()?;
            let ty = parser.type_specifier()?;
            let (name, array) = if parser.at_kind(TokenKind::Identifier) {
                let name = parser.expect_identifier(comments)?;
                (Some(name), parser.array_specifier(comments)?)
            } else {
                (None, ArraySpecifier::None)
            };
            Ok(Parameter {
                qualifier,
                ty,
                name,
                array,
            })
        })
    }

    /// `[precision] name [array]`
    pub(crate) fn type_specifier(&mut self) -> PResult<TypeSpecifier> {
        let mut comments = Comments(vec![self.leading()]);
        let precision = self
            .peek()
            .filter(|token| token.kind == TokenKind::Keyword)
            .and_then(|token| Precision::from_keyword(&token.text));
        if precision.is_some() {
            self.bump(&mut comments)?;
        }
        let token = self.peek().cloned().ok_or_else(|| self.expected("a type"))?;
        let name = match token.kind {
            TokenKind::Keyword if is_type_keyword(&token.text) => TypeName::Builtin(token.text),
            TokenKind::Identifier => TypeName::Named(token.text),
            _ => return Err(self.expected("a type")),
        };
        self.bump(&mut comments)?;
        let array = self.array_specifier(&mut comments)?;
        Ok(TypeSpecifier {
            precision,
            name: Commented {
                data: name,
                comments,
            },
            array,
        })
    }

    fn array_specifier(&mut self, comments: &mut Comments) -> PResult<ArraySpecifier> {
        if !self.eat_symbol("[", comments)? {
            return Ok(ArraySpecifier::None);
        }
        if self.eat_symbol("]", comments)? {
            return Ok(ArraySpecifier::Unsized);
        }
        let size = self.assignment()?;
        self.expect_symbol("]", comments)?;
        Ok(ArraySpecifier::Sized(Box::new(size)))
    }

    fn type_qualifier(&mut self) -> PResult<Option<TypeQualifier>> {
        let parts = self.many(Parser::qualifier);
        Ok((!parts.is_empty()).then_some(TypeQualifier { parts }))
    }

    fn qualifier(&mut self) -> PResult<Commented<Qualifier>> {
        self.commented(|parser, comments| {
            let Some(token) = parser
                .peek()
                .filter(|token| token.kind == TokenKind::Keyword)
                .cloned()
            else {
                return Err(parser.expected("a qualifier"));
            };
            if let Some(storage) = Storage::from_keyword(&token.text) {
                parser.bump(comments)?;
                Ok(Qualifier::Storage(storage))
            } else if let Some(interpolation) = Interpolation::from_keyword(&token.text) {
                parser.bump(comments)?;
                Ok(Qualifier::Interpolation(interpolation))
            } else if token.text == "invariant" {
                parser.bump(comments)?;
                Ok(Qualifier::Invariant)
            } else if token.text == "layout" {
                parser.bump(comments)?;
                parser.expect_symbol("(", comments)?;
                let ids = parser.separated(",", comments, Parser::layout_id)?;
                parser.expect_symbol(")", comments)?;
                Ok(Qualifier::Layout(ids))
            } else {
                Err(parser.expected("a qualifier"))
            }
        })
    }

    fn layout_id(&mut self) -> PResult<Commented<LayoutId>> {
        self.commented(|parser, comments| {
            let is_name = parser
                .peek()
                .is_some_and(|token| matches!(token.kind, TokenKind::Identifier | TokenKind::Keyword));
            if !is_name {
                return Err(parser.expected("a layout qualifier"));
            }
            let name = parser.bump(comments)?.text;
            let value = if parser.eat_symbol("=", comments)? {
                let is_int = parser.peek().is_some_and(|token| token.kind.is_int());
                if !is_int {
                    return Err(parser.expected("an integer"));
                }
                Some(parser.bump(comments)?.text)
            } else {
                None
            };
            Ok(LayoutId { name, value })
        })
    }

    fn struct_definition(&mut self, comments: &mut Comments) -> PResult<StructDefinition> {
        self.expect_keyword("struct", comments)?;
        let name = self.expect_identifier(comments)?;
        self.expect_symbol("{", comments)?;
        let mut fields = Vec::new();
        while !self.at_symbol("}") {
            fields.push(self.commented(|parser, comments| {
                let ty = parser.type_specifier()?;
                let names = parser.separated(",", comments, |parser| {
                    parser.commented(|parser, comments| {
                        let name = parser.expect_identifier(comments)?;
                        let array = parser.array_specifier(comments)?;
                        Ok((name, array))
                    })
                })?;
                parser.expect_symbol(";", comments)?;
                Ok(StructField { ty, names })
            })?);
        }
        self.expect_symbol("}", comments)?;
        if fields.is_empty() {
            return Err(crate::error::CoreError::parse(
                self.last_end,
                format!("struct `{name}` has no fields"),
            ));
        }
        Ok(StructDefinition { name, fields })
    }

    fn import(&mut self, comments: &mut Comments) -> PResult<Import> {
        self.expect_keyword("import", comments)?;
        let kind = if self.eat_symbol("*", comments)? {
            if self.eat_keyword("as", comments)? {
                ImportKind::Prefixed(self.expect_identifier(comments)?)
            } else {
                ImportKind::All
            }
        } else if self.eat_symbol("{", comments)? {
            let items = self.separated(",", comments, |parser| {
                parser.commented(|parser, comments| {
                    let name = parser.expect_identifier(comments)?;
                    let alias = if parser.eat_keyword("as", comments)? {
                        Some(parser.expect_identifier(comments)?)
                    } else {
                        None
                    };
                    Ok(ImportItem { name, alias })
                })
            })?;
            self.expect_symbol("}", comments)?;
            ImportKind::Named(items)
        } else {
            return Err(self.expected("`*` or `{`"));
        };
        self.expect_keyword("from", comments)?;
        if !self.at_kind(TokenKind::ImportString) {
            return Err(self.expected("a quoted import path"));
        }
        let token = self.bump(comments)?;
        let path = token.text[1..token.text.len() - 1].to_string();
        self.eat_symbol(";", comments)?;
        Ok(Import { kind, path })
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{
        ArraySpecifier, Declaration, ExternalDeclaration, ImportKind, Qualifier, Statement,
        Storage, TypeName,
    };
    use crate::parser::{parse, parse_declaration, parse_external_declaration};

    fn declaration(source: &str) -> Declaration {
        match parse_declaration(source).expect("parse").data {
            Statement::Declaration(declaration) => declaration,
            other => panic!("expected declaration, got {other:?}"),
        }
    }

    #[test]
    fn parses_declarator_lists() {
        let Declaration::Variables(list) = declaration("const highp float a = 1.0, b[2], c[];")
        else {
            panic!("expected variables");
        };
        assert!(list.ty.is_const());
        assert_eq!(list.declarators.len(), 3);
        assert!(list.declarators[0].data.initializer.is_some());
        assert!(matches!(list.declarators[1].data.array, ArraySpecifier::Sized(_)));
        assert_eq!(list.declarators[2].data.array, ArraySpecifier::Unsized);
    }

    #[test]
    fn parses_precision_statement() {
        assert!(matches!(
            declaration("precision mediump float;"),
            Declaration::Precision { .. }
        ));
    }

    #[test]
    fn parses_qualifier_statements() {
        let Declaration::Qualifier { qualifier, names } = declaration("invariant gl_Position;")
        else {
            panic!("expected qualifier statement");
        };
        assert_eq!(qualifier.parts[0].data, Qualifier::Invariant);
        assert_eq!(names[0].data, "gl_Position");

        let Declaration::Qualifier { names, .. } =
            declaration("layout(local_size_x = 8, shared) in;")
        else {
            panic!("expected qualifier statement");
        };
        assert!(names.is_empty());
    }

    #[test]
    fn parses_struct_definitions() {
        let Declaration::Struct(definition) = declaration("struct Light { vec3 position; float a, b[2]; };")
        else {
            panic!("expected struct");
        };
        assert_eq!(definition.name, "Light");
        assert_eq!(definition.fields.len(), 2);
        assert_eq!(definition.fields[1].data.names.len(), 2);
    }

    #[test]
    fn parses_struct_typed_variables() {
        let Declaration::Variables(list) = declaration("uniform Light lights[4];") else {
            panic!("expected variables");
        };
        assert_eq!(
            list.ty.specifier.name.data,
            TypeName::Named("Light".to_string())
        );
        assert!(list.ty.qualifier.unwrap().has_storage(Storage::Uniform));
    }

    #[test]
    fn parses_prototypes_and_definitions() {
        assert!(matches!(
            declaration("float f(in float x, const int y[2]);"),
            Declaration::Prototype(_)
        ));
        let external = parse_external_declaration("void main(void) { }").expect("parse");
        let ExternalDeclaration::Function(function) = external.data else {
            panic!("expected function");
        };
        assert_eq!(function.prototype.data.parameters().count(), 0);
    }

    #[test]
    fn function_definitions_are_not_statements() {
        assert!(parse_declaration("void f() { }").is_err());
    }

    #[test]
    fn parses_imports() {
        let unit = parse(
            "import * from \"a.glsl\"\nimport * as b_ from \"b.glsl\";\nimport { f, g as h } from \"./c.glsl\"",
        )
        .expect("parse");
        let imports: Vec<_> = unit.imports().map(|(import, _)| import.clone()).collect();
        assert_eq!(imports.len(), 3);
        assert_eq!(imports[0].kind, ImportKind::All);
        assert_eq!(imports[1].kind, ImportKind::Prefixed("b_".to_string()));
        assert_eq!(imports[2].path, "./c.glsl");
        let ImportKind::Named(items) = &imports[2].kind else {
            panic!("expected named import");
        };
        assert_eq!(items[1].data.local_name(), "h");
    }

    #[test]
    fn rejects_empty_structs() {
        assert!(parse("struct S {};").is_err());
    }
}
