//! Lexical scopes of a translation unit.
//!
//! Scopes live in an arena indexed by [`ScopeId`]; each scope knows its
//! parent and children, and the tree also remembers which scope each
//! scope-owning node opened, keyed by the node's range. The checker, the
//! evaluator and the language service all resolve names through it.

use std::collections::{BTreeMap, HashMap};

use crate::ast::{
    ArraySpecifier, Declaration, ExternalDeclaration, ExternalNode, FunctionPrototype,
    Statement, StmtNode, StructDefinition, TranslationUnit, TypeSpecifier,
};
use crate::span::Range;
use crate::visit::{FunctionInfo, function_info};

pub type ScopeId = usize;

#[derive(Debug, Clone, PartialEq)]
pub struct VariableItem {
    pub ty: TypeSpecifier,
    /// Array suffix written on the declarator, `a[3]`.
    pub array: ArraySpecifier,
    pub constant: bool,
    /// Byte offset of the declaring statement. Locals are only visible from
    /// here on.
    pub declared_at: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionItem {
    pub prototype: FunctionPrototype,
    /// A body was seen, not just a prototype.
    pub defined: bool,
    pub declared_at: usize,
}

impl FunctionItem {
    pub fn info(&self) -> FunctionInfo {
        function_info(&self.prototype)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructItem {
    pub definition: StructDefinition,
    pub declared_at: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScopeItem {
    Variable(VariableItem),
    /// All overloads declared under one name.
    Function(Vec<FunctionItem>),
    Struct(StructItem),
}

impl ScopeItem {
    pub fn declared_at(&self) -> usize {
        match self {
            ScopeItem::Variable(variable) => variable.declared_at,
            ScopeItem::Function(overloads) => overloads
                .iter()
                .map(|overload| overload.declared_at)
                .min()
                .unwrap_or_default(),
            ScopeItem::Struct(item) => item.declared_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Scope {
    pub items: BTreeMap<String, ScopeItem>,
    pub children: Vec<ScopeId>,
    pub parent: Option<ScopeId>,
    pub range: Range,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScopeTree {
    scopes: Vec<Scope>,
    by_range: HashMap<Range, ScopeId>,
}

impl ScopeTree {
    pub const ROOT: ScopeId = 0;

    /// Build the scopes of `unit`. Imports are not followed; the language
    /// service adds imported names with [`ScopeTree::import`].
    pub fn build(unit: &TranslationUnit) -> Self {
        let root = Scope {
            items: BTreeMap::new(),
            children: Vec::new(),
            parent: None,
            range: Range::new(0, usize::MAX),
        };
        let mut tree = ScopeTree {
            scopes: vec![root],
            by_range: HashMap::new(),
        };
        for external in &unit.declarations {
            tree.external(external);
        }
        tree
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id]
    }

    pub fn globals(&self) -> &BTreeMap<String, ScopeItem> {
        &self.scopes[Self::ROOT].items
    }

    /// Scope opened by the node spanning `range`, if it opened one.
    pub fn scope_for(&self, range: Range) -> Option<ScopeId> {
        self.by_range.get(&range).copied()
    }

    /// Add an imported global. Names the file defines itself win; returns
    /// whether the item was added.
    pub fn import(&mut self, name: String, item: ScopeItem) -> bool {
        let globals = &mut self.scopes[Self::ROOT].items;
        if globals.contains_key(&name) {
            return false;
        }
        globals.insert(name, item);
        true
    }

    /// Scopes enclosing `position`, outermost first.
    pub fn chain_at(&self, position: usize) -> Vec<ScopeId> {
        let mut chain = vec![Self::ROOT];
        let mut current = Self::ROOT;
        while let Some(&child) = self.scopes[current].children.iter().find(|&&child| {
            let range = self.scopes[child].range;
            range.start <= position && position < range.end
        }) {
            chain.push(child);
            current = child;
        }
        chain
    }

    /// Innermost item called `name` that is visible at `position`.
    pub fn lookup(&self, chain: &[ScopeId], name: &str, position: usize) -> Option<&ScopeItem> {
        chain.iter().rev().find_map(|&id| {
            self.scopes[id]
                .items
                .get(name)
                .filter(|item| id == Self::ROOT || item.declared_at() <= position)
        })
    }

    pub fn lookup_at(&self, name: &str, position: usize) -> Option<&ScopeItem> {
        self.lookup(&self.chain_at(position), name, position)
    }

    pub fn struct_at(&self, name: &str, position: usize) -> Option<&StructDefinition> {
        match self.lookup_at(name, position)? {
            ScopeItem::Struct(item) => Some(&item.definition),
            _ => None,
        }
    }

    /// Everything visible at `position`, innermost scope first. Shadowed
    /// names appear once.
    pub fn visible_at(&self, position: usize) -> Vec<(&str, &ScopeItem)> {
        let mut seen = std::collections::HashSet::new();
        let mut visible = Vec::new();
        for &id in self.chain_at(position).iter().rev() {
            for (name, item) in &self.scopes[id].items {
                if (id == Self::ROOT || item.declared_at() <= position) && seen.insert(name.as_str())
                {
                    visible.push((name.as_str(), item));
                }
            }
        }
        visible
    }

    fn open(&mut self, parent: ScopeId, range: Range) -> ScopeId {
        let id = self.scopes.len();
        self.scopes.push(Scope {
            items: BTreeMap::new(),
            children: Vec::new(),
            parent: Some(parent),
            range,
        });
        self.scopes[parent].children.push(id);
        self.by_range.insert(range, id);
        id
    }

    fn insert(&mut self, scope: ScopeId, name: &str, item: ScopeItem) {
        self.scopes[scope]
            .items
            .entry(name.to_string())
            .or_insert(item);
    }

    fn external(&mut self, external: &ExternalNode) {
        let at = external.range.start;
        match &external.data {
            ExternalDeclaration::Function(function) => {
                let prototype = &function.prototype.data;
                self.add_function(Self::ROOT, prototype, true, at);
                let scope = self.open(Self::ROOT, external.range);
                for param in prototype.parameters() {
                    let Some(name) = &param.name else { continue };
                    let constant = param.qualifier.as_ref().is_some_and(|qualifier| {
                        qualifier.has_storage(crate::ast::Storage::Const)
                    });
                    let variable = VariableItem {
                        ty: param.ty.clone(),
                        array: param.array.clone(),
                        constant,
                        declared_at: at,
                    };
                    self.insert(scope, name, ScopeItem::Variable(variable));
                }
                self.statement(scope, &function.body);
            }
            ExternalDeclaration::Declaration(declaration) => {
                self.declaration(Self::ROOT, declaration, at)
            }
            ExternalDeclaration::Import(_) => {}
        }
    }

    fn declaration(&mut self, scope: ScopeId, declaration: &Declaration, at: usize) {
        match declaration {
            Declaration::Variables(list) => {
                for declarator in &list.declarators {
                    let variable = VariableItem {
                        ty: list.ty.specifier.clone(),
                        array: declarator.data.array.clone(),
                        constant: list.ty.is_const(),
                        declared_at: at,
                    };
                    self.insert(scope, &declarator.data.name, ScopeItem::Variable(variable));
                }
            }
            Declaration::Prototype(prototype) => self.add_function(scope, prototype, false, at),
            Declaration::Struct(definition) => {
                let item = StructItem {
                    definition: definition.clone(),
                    declared_at: at,
                };
                self.insert(scope, &definition.name, ScopeItem::Struct(item));
            }
            Declaration::Precision { .. } | Declaration::Qualifier { .. } => {}
        }
    }

    fn add_function(&mut self, scope: ScopeId, prototype: &FunctionPrototype, defined: bool, at: usize) {
        let entry = self.scopes[scope]
            .items
            .entry(prototype.name.clone())
            .or_insert_with(|| ScopeItem::Function(Vec::new()));
        let ScopeItem::Function(overloads) = entry else {
            return;
        };
        let key = signature_key(prototype);
        match overloads
            .iter_mut()
            .find(|overload| signature_key(&overload.prototype) == key)
        {
            Some(existing) => existing.defined |= defined,
            None => overloads.push(FunctionItem {
                prototype: prototype.clone(),
                defined,
                declared_at: at,
            }),
        }
    }

    fn statement(&mut self, scope: ScopeId, stmt: &StmtNode) {
        let scope = if stmt.data.owns_scope() {
            self.open(scope, stmt.range)
        } else {
            scope
        };
        match &stmt.data {
            Statement::Declaration(declaration) => {
                self.declaration(scope, declaration, stmt.range.start)
            }
            Statement::Compound(items) | Statement::Switch { body: items, .. } => {
                for item in items {
                    self.statement(scope, item);
                }
            }
            Statement::If {
                then, otherwise, ..
            } => {
                self.statement(scope, then);
                if let Some(otherwise) = otherwise {
                    self.statement(scope, otherwise);
                }
            }
            Statement::While { body, .. } | Statement::DoWhile { body, .. } => {
                self.statement(scope, body)
            }
            Statement::For { init, body, .. } => {
                self.statement(scope, init);
                self.statement(scope, body);
            }
            Statement::Expr(_) | Statement::Case(_) | Statement::Default | Statement::Jump(_) => {}
        }
    }
}

/// Parameter types of a prototype, which tell overloads apart.
fn signature_key(prototype: &FunctionPrototype) -> Vec<String> {
    prototype
        .parameters()
        .map(|param| {
            let mut key = param.ty.to_string();
            if param.array.is_array() {
                key.push_str("[]");
            }
            key
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    const SOURCE: &str = "\
float g;
float helper(float x);
float helper(float x) { return x * g; }
void main() {
    float a = 1.0;
    {
        float b = a;
    }
    float g = 2.0;
}
";

    fn offset(pattern: &str) -> usize {
        SOURCE.find(pattern).expect("pattern")
    }

    #[test]
    fn nests_scopes_by_range() {
        let tree = ScopeTree::build(&parse(SOURCE).expect("parse"));
        assert!(tree.globals().contains_key("g"));
        assert!(tree.globals().contains_key("main"));
        let chain = tree.chain_at(offset("float b"));
        assert_eq!(chain.len(), 4);
        assert_eq!(tree.scope(chain[3]).parent, Some(chain[2]));
        assert!(tree.scope(chain[3]).items.contains_key("b"));
        assert_eq!(tree.chain_at(0), vec![ScopeTree::ROOT]);
    }

    #[test]
    fn locals_are_visible_after_their_declaration() {
        let tree = ScopeTree::build(&parse(SOURCE).expect("parse"));
        assert!(tree.lookup_at("a", offset("void main")).is_none());
        assert!(tree.lookup_at("a", offset("float b")).is_some());
        assert!(tree.lookup_at("b", offset("float g = 2.0")).is_none());
        assert!(tree.lookup_at("x", offset("x * g")).is_some());
    }

    #[test]
    fn inner_declarations_shadow_globals() {
        let tree = ScopeTree::build(&parse(SOURCE).expect("parse"));
        let position = offset("float g = 2.0") + 14;
        let visible = tree.visible_at(position);
        let globals = visible.iter().filter(|(name, _)| *name == "g").count();
        assert_eq!(globals, 1);
        let Some(ScopeItem::Variable(variable)) = tree.lookup_at("g", position) else {
            panic!("expected a variable");
        };
        assert_eq!(variable.declared_at, offset("float g = 2.0"));
    }

    #[test]
    fn merges_prototype_and_definition() {
        let tree = ScopeTree::build(&parse(SOURCE).expect("parse"));
        let Some(ScopeItem::Function(overloads)) = tree.globals().get("helper") else {
            panic!("expected a function");
        };
        assert_eq!(overloads.len(), 1);
        assert!(overloads[0].defined);
        assert_eq!(overloads[0].info().label(), "float helper(float x)");
    }

    #[test]
    fn remembers_the_scope_of_each_block() {
        let unit = parse(SOURCE).expect("parse");
        let tree = ScopeTree::build(&unit);
        let main = &unit.declarations[3];
        let ExternalDeclaration::Function(function) = &main.data else {
            panic!("expected main");
        };
        let body = tree.scope_for(function.body.range).expect("body scope");
        assert_eq!(tree.scope(body).parent, tree.scope_for(main.range));
    }
}
