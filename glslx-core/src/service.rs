//! Editor-facing queries over a set of files.
//!
//! A [`LanguageService`] is a session: it owns the builtin table, a version
//! per file and two caches. Parsed files are cached per `(path, version)`.
//! An analysis (scope tree with imports merged in) remembers the version of
//! every file it read and is rebuilt as soon as any of them changes.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::ast::{ArraySpecifier, Expr, ExprNode, ImportKind, TranslationUnit};
use crate::builtins::Builtins;
use crate::diagnostic::{Diagnostic, dedup};
use crate::error::CoreError;
use crate::eval::{Preview, preview_at};
use crate::format::packed_expr;
use crate::fs::{FileSystem, Subscription, has_extension, normalize, resolve_import};
use crate::parser::parse_recovering;
use crate::scope::{ScopeItem, ScopeTree};
use crate::span::Range;
use crate::typecheck::{check_names, typecheck_unit};
use crate::visit::{Visit, walk_expr};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Extensions of the files the service watches, without the dot.
    pub extensions: Vec<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            extensions: ["glsl", "frag", "vert", "fs", "vs"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHelp {
    /// `float helper(float x, float y)`
    pub label: String,
    pub parameters: Vec<String>,
    /// Index of the argument the position is in.
    pub active_parameter: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionKind {
    Variable,
    Function,
    Struct,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionItem {
    pub label: String,
    pub kind: CompletionKind,
    pub detail: String,
}

enum Parsed {
    Unit {
        unit: Rc<TranslationUnit>,
        errors: Vec<Diagnostic>,
    },
    /// The file could not be parsed at all.
    Failed(Diagnostic),
}

/// A file with its imports resolved.
#[derive(Debug)]
pub struct Analysis {
    pub unit: Rc<TranslationUnit>,
    pub tree: ScopeTree,
    /// Syntax errors and import problems.
    pub diagnostics: Vec<Diagnostic>,
    /// Parsing failed; `unit` is empty and `diagnostics` holds the error.
    pub fatal: bool,
    /// Every file read to build this analysis, with the version read.
    snapshot: Vec<(String, u64)>,
}

pub struct LanguageService<F: FileSystem> {
    fs: F,
    builtins: Builtins,
    versions: Rc<RefCell<HashMap<String, u64>>>,
    parsed: RefCell<HashMap<String, (u64, Rc<Parsed>)>>,
    analyses: RefCell<HashMap<String, Rc<Analysis>>>,
    _subscription: Subscription,
}

impl<F: FileSystem> LanguageService<F> {
    pub fn new(fs: F) -> Self {
        Self::with_config(fs, ServiceConfig::default())
    }

    pub fn with_config(fs: F, config: ServiceConfig) -> Self {
        let versions = Rc::new(RefCell::new(HashMap::new()));
        let watched = Rc::clone(&versions);
        let extensions = config.extensions;
        let subscription = fs.subscribe(
            "",
            Box::new(move |path: &str| has_extension(path, &extensions)),
            Box::new(move |path: &str| bump(&watched, path)),
        );
        LanguageService {
            fs,
            builtins: Builtins::new(),
            versions,
            parsed: RefCell::new(HashMap::new()),
            analyses: RefCell::new(HashMap::new()),
            _subscription: subscription,
        }
    }

    pub fn file_system(&self) -> &F {
        &self.fs
    }

    pub fn builtins(&self) -> &Builtins {
        &self.builtins
    }

    /// Mark `path` as changed. Needed for file systems that do not notify.
    pub fn notify_changed(&self, path: &str) {
        bump(&self.versions, path);
    }

    pub fn version(&self, path: &str) -> u64 {
        self.versions
            .borrow()
            .get(&normalize(path))
            .copied()
            .unwrap_or_default()
    }

    /// Everything wrong with `path`: syntax errors, unresolved imports,
    /// unknown names and type errors.
    pub fn diagnostics(&self, path: &str) -> Result<Vec<Diagnostic>, CoreError> {
        let analysis = self.analysis(path)?;
        let mut diagnostics = analysis.diagnostics.clone();
        if analysis.fatal {
            return Ok(diagnostics);
        }
        diagnostics.extend(check_names(&analysis.unit, &analysis.tree, &self.builtins));
        diagnostics.extend(typecheck_unit(&analysis.unit, &analysis.tree, &self.builtins));
        Ok(dedup(diagnostics))
    }

    /// Signature of the innermost named call around `position`.
    pub fn signature_help(&self, path: &str, position: usize) -> Result<Option<SignatureHelp>, CoreError> {
        let analysis = self.analysis(path)?;
        let mut finder = CallFinder {
            position,
            found: None,
        };
        for external in &analysis.unit.declarations {
            finder.visit_external(external);
        }
        let Some((name, args)) = finder.found else {
            return Ok(None);
        };
        let (label, parameters): (String, Vec<String>) = match analysis.tree.lookup_at(&name, position) {
            Some(ScopeItem::Function(overloads)) => match overloads.first() {
                Some(overload) => {
                    let info = overload.info();
                    let parameters = info.params.iter().map(|param| param.label.clone()).collect();
                    (info.label(), parameters)
                }
                None => return Ok(None),
            },
            Some(_) => return Ok(None),
            None => match self.builtins.function(&name) {
                Some(builtin) => (
                    builtin.signature.to_string(),
                    builtin.parameters().into_iter().map(String::from).collect(),
                ),
                None => return Ok(None),
            },
        };
        let before = args.iter().filter(|arg| arg.end < position).count();
        let active_parameter = before.min(parameters.len().saturating_sub(1));
        Ok(Some(SignatureHelp {
            label,
            parameters,
            active_parameter,
        }))
    }

    /// Names visible at `position`, innermost first, followed by builtins.
    pub fn completions(&self, path: &str, position: usize) -> Result<Vec<CompletionItem>, CoreError> {
        let analysis = self.analysis(path)?;
        let mut seen = HashSet::new();
        let mut items = Vec::new();
        for (name, item) in analysis.tree.visible_at(position) {
            let (kind, detail) = match item {
                ScopeItem::Variable(variable) => {
                    let mut detail = variable.ty.to_string();
                    detail.push_str(&array_suffix(&variable.array));
                    (CompletionKind::Variable, detail)
                }
                ScopeItem::Function(overloads) => {
                    let detail = overloads
                        .first()
                        .map(|overload| overload.info().label())
                        .unwrap_or_default();
                    (CompletionKind::Function, detail)
                }
                ScopeItem::Struct(_) => (CompletionKind::Struct, format!("struct {name}")),
            };
            seen.insert(name.to_string());
            items.push(CompletionItem {
                label: name.to_string(),
                kind,
                detail,
            });
        }
        for variable in self.builtins.variables() {
            if seen.insert(variable.name.to_string()) {
                items.push(CompletionItem {
                    label: variable.name.to_string(),
                    kind: CompletionKind::Variable,
                    detail: variable.ty.to_string(),
                });
            }
        }
        for function in self.builtins.functions() {
            if seen.insert(function.name.to_string()) {
                items.push(CompletionItem {
                    label: function.name.to_string(),
                    kind: CompletionKind::Function,
                    detail: function.signature.to_string(),
                });
            }
        }
        Ok(items)
    }

    /// Values of the variables visible when execution first reaches
    /// `position`.
    pub fn preview(&self, path: &str, position: usize) -> Result<Preview, CoreError> {
        let analysis = self.analysis(path)?;
        Ok(preview_at(&analysis.unit, &analysis.tree, position))
    }

    /// The analysis of `path`, rebuilt when it or one of its imports
    /// changed.
    pub fn analysis(&self, path: &str) -> Result<Rc<Analysis>, CoreError> {
        let path = normalize(path);
        if let Some(cached) = self.analyses.borrow().get(&path) {
            if cached
                .snapshot
                .iter()
                .all(|(file, version)| self.version(file) == *version)
            {
                return Ok(Rc::clone(cached));
            }
        }
        let analysis = Rc::new(self.analyze(&path)?);
        log::debug!(
            "analyzed `{path}` ({} files read, {} diagnostics)",
            analysis.snapshot.len(),
            analysis.diagnostics.len()
        );
        self.analyses
            .borrow_mut()
            .insert(path, Rc::clone(&analysis));
        Ok(analysis)
    }

    fn analyze(&self, path: &str) -> Result<Analysis, CoreError> {
        let mut snapshot = vec![(path.to_string(), self.version(path))];
        let (unit, errors) = match &*self.parse_file(path)? {
            Parsed::Unit { unit, errors } => (Rc::clone(unit), errors.clone()),
            Parsed::Failed(diagnostic) => {
                let unit = Rc::new(TranslationUnit::default());
                let tree = ScopeTree::build(&unit);
                return Ok(Analysis {
                    unit,
                    tree,
                    diagnostics: vec![diagnostic.clone()],
                    fatal: true,
                    snapshot,
                });
            }
        };
        let mut tree = ScopeTree::build(&unit);
        let mut diagnostics = errors;
        for (import, range) in unit.imports() {
            let target = resolve_import(path, &import.path);
            snapshot.push((target.clone(), self.version(&target)));
            let exported = match self.parse_file(&target) {
                Ok(parsed) => match &*parsed {
                    Parsed::Unit { unit, .. } => ScopeTree::build(unit),
                    Parsed::Failed(failure) => {
                        let why = format!("failed to parse `{}`: {}", import.path, failure.why);
                        diagnostics.push(Diagnostic::new(range, why));
                        continue;
                    }
                },
                Err(error) => {
                    log::debug!("import `{target}` from `{path}` failed: {error}");
                    let why = format!("cannot resolve import `{}`", import.path);
                    diagnostics.push(Diagnostic::new(range, why));
                    continue;
                }
            };
            let globals = exported.globals();
            match &import.kind {
                ImportKind::All => {
                    for (name, item) in globals {
                        tree.import(name.clone(), item.clone());
                    }
                }
                ImportKind::Prefixed(prefix) => {
                    for (name, item) in globals {
                        tree.import(format!("{prefix}{name}"), item.clone());
                    }
                }
                ImportKind::Named(items) => {
                    for item in items {
                        match globals.get(&item.data.name) {
                            Some(found) => {
                                tree.import(item.data.local_name().to_string(), found.clone());
                            }
                            None => {
                                let why = format!(
                                    "`{}` is not exported by `{}`",
                                    item.data.name, import.path
                                );
                                diagnostics.push(Diagnostic::new(range, why));
                            }
                        }
                    }
                }
            }
        }
        Ok(Analysis {
            unit,
            tree,
            diagnostics,
            fatal: false,
            snapshot,
        })
    }

    fn parse_file(&self, path: &str) -> Result<Rc<Parsed>, CoreError> {
        let version = self.version(path);
        if let Some((parsed_at, parsed)) = self.parsed.borrow().get(path) {
            if *parsed_at == version {
                return Ok(Rc::clone(parsed));
            }
        }
        let source = self.fs.read_file(path)?;
        let parsed = match parse_recovering(&source) {
            Ok((unit, errors)) => Parsed::Unit {
                unit: Rc::new(unit),
                errors: errors.iter().map(syntax_diagnostic).collect(),
            },
            Err(error) => Parsed::Failed(syntax_diagnostic(&error)),
        };
        log::debug!("parsed `{path}` at version {version}");
        let parsed = Rc::new(parsed);
        self.parsed
            .borrow_mut()
            .insert(path.to_string(), (version, Rc::clone(&parsed)));
        Ok(parsed)
    }
}

fn bump(versions: &RefCell<HashMap<String, u64>>, path: &str) {
    let path = normalize(path);
    log::trace!("`{path}` changed");
    *versions.borrow_mut().entry(path).or_default() += 1;
}

fn syntax_diagnostic(error: &CoreError) -> Diagnostic {
    let position = error.position().unwrap_or_default();
    let why = match error {
        CoreError::LexError { message, .. } | CoreError::ParseError { message, .. } => message.clone(),
        other => other.to_string(),
    };
    Diagnostic::new(Range::new(position, position), why)
}

fn array_suffix(array: &ArraySpecifier) -> String {
    match array {
        ArraySpecifier::None => String::new(),
        ArraySpecifier::Unsized => "[]".to_string(),
        ArraySpecifier::Sized(size) => format!("[{}]", packed_expr(size)),
    }
}

/// Finds the smallest named call whose range strictly contains a position.
struct CallFinder {
    position: usize,
    found: Option<(String, Vec<Range>)>,
}

impl Visit for CallFinder {
    fn visit_expr(&mut self, expr: &ExprNode) {
        let range = expr.range;
        if range.start >= self.position || self.position >= range.end {
            return;
        }
        if let Expr::Call(call) = &expr.data {
            if let Some(name) = call.name() {
                let args = call.args.iter().map(|arg| arg.range).collect();
                self.found = Some((name.to_string(), args));
            }
        }
        walk_expr(self, expr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFs;

    const LIB: &str = "\
struct Light { vec3 color; float power; };
float helper(float x, float y) { return x * y; }
const float SCALE = 2.0;
";

    fn service(main: &str) -> (MemoryFs, LanguageService<MemoryFs>) {
        let fs = MemoryFs::new();
        fs.write("lib/light.glsl", LIB);
        fs.write("main.frag", main);
        let service = LanguageService::new(fs.clone());
        (fs, service)
    }

    fn messages(service: &LanguageService<MemoryFs>, path: &str) -> Vec<String> {
        service
            .diagnostics(path)
            .expect("diagnostics")
            .into_iter()
            .map(|diagnostic| diagnostic.why)
            .collect()
    }

    #[test]
    fn reports_names_and_types_together() {
        let (_, service) = service("void main() { float a = 1; b = a; }");
        assert_eq!(
            messages(&service, "main.frag"),
            ["unknown identifier `b`", "cannot initialize `float` with `int`"]
        );
    }

    #[test]
    fn fatal_parse_errors_are_a_single_diagnostic() {
        let (_, service) = service("void main( {");
        let diagnostics = service.diagnostics("main.frag").expect("diagnostics");
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn missing_files_are_errors() {
        let (_, service) = service("");
        assert!(matches!(
            service.diagnostics("nope.frag"),
            Err(CoreError::NotFound(_))
        ));
    }

    #[test]
    fn resolves_imports_relative_to_the_file() {
        let main = "\
import { helper, Light as L } from \"./lib/light.glsl\";
import * as lib from \"lib/light.glsl\";
void main() {
    L light = L(vec3(1.0), 2.0);
    float a = helper(light.power, 1.0);
    float b = libhelper(a, libSCALE);
}
";
        let (_, service) = service(main);
        assert_eq!(messages(&service, "main.frag"), Vec::<String>::new());
    }

    #[test]
    fn reports_broken_imports_on_the_import() {
        let main = "\
import { helper, missing } from \"./lib/light.glsl\";
import * from \"./nowhere.glsl\";
void main() {}
";
        let (fs, service) = service(main);
        fs.write("broken.glsl", "float (");
        let diagnostics = service.diagnostics("main.frag").expect("diagnostics");
        let whys: Vec<&str> = diagnostics.iter().map(|d| d.why.as_str()).collect();
        assert_eq!(
            whys,
            [
                "`missing` is not exported by `./lib/light.glsl`",
                "cannot resolve import `./nowhere.glsl`"
            ]
        );
        assert_eq!(diagnostics[0].start, 0);

        fs.write("main.frag", "import * from \"broken.glsl\";");
        let whys = messages(&service, "main.frag");
        assert_eq!(whys.len(), 1);
        assert!(whys[0].starts_with("failed to parse `broken.glsl`"));
    }

    #[test]
    fn exports_are_not_transitive() {
        let (fs, service) = service("import * from \"middle.glsl\";\nvoid main() { float a = helper(1.0, 2.0); }");
        fs.write("middle.glsl", "import * from \"lib/light.glsl\";\nfloat middle;");
        assert_eq!(
            messages(&service, "main.frag"),
            ["unknown function `helper`"]
        );
    }

    #[test]
    fn refreshes_when_files_change() {
        let (fs, service) = service("import { helper } from \"lib/light.glsl\";\nvoid main() { helper(1.0, 2.0); }");
        assert!(messages(&service, "main.frag").is_empty());
        let first = service.analysis("main.frag").expect("analysis");
        let again = service.analysis("main.frag").expect("analysis");
        assert!(Rc::ptr_eq(&first, &again));

        fs.write("lib/light.glsl", "float other;");
        assert_eq!(
            messages(&service, "main.frag"),
            [
                "`helper` is not exported by `lib/light.glsl`",
                "unknown function `helper`"
            ]
        );

        fs.write("main.frag", "void main() {}");
        assert!(messages(&service, "main.frag").is_empty());
        assert_eq!(service.version("main.frag"), 1);
    }

    #[test]
    fn ignores_files_outside_the_configured_extensions() {
        let (fs, service) = service("");
        fs.write("notes.txt", "hello");
        assert_eq!(service.version("notes.txt"), 0);
        service.notify_changed("notes.txt");
        assert_eq!(service.version("notes.txt"), 1);
    }

    #[test]
    fn helps_with_user_and_builtin_signatures() {
        let main = "\
import { helper } from \"lib/light.glsl\";
void main() {
    float a = helper(1.0, mix(0.0, 1.0, 0.5));
}
";
        let (_, service) = service(main);
        let at_half = main.find("0.5").expect("0.5");
        let help = service
            .signature_help("main.frag", at_half)
            .expect("query")
            .expect("help");
        assert_eq!(help.label, "genType mix(genType x, genType y, genType a)");
        assert_eq!(help.active_parameter, 2);

        let at_first = main.find("1.0").expect("1.0");
        let help = service
            .signature_help("main.frag", at_first)
            .expect("query")
            .expect("help");
        assert_eq!(help.label, "float helper(float x, float y)");
        assert_eq!(help.parameters, ["float x", "float y"]);
        assert_eq!(help.active_parameter, 0);

        let outside = main.find("float a").expect("decl");
        assert_eq!(service.signature_help("main.frag", outside).expect("query"), None);
    }

    #[test]
    fn completes_visible_names_then_builtins() {
        let main = "\
import * from \"lib/light.glsl\";
float global;
void main() {
    float early = 1.0;
    float late = 2.0;
}
";
        let (_, service) = service(main);
        let position = main.find("    float late").expect("late");
        let items = service.completions("main.frag", position).expect("completions");
        let labels: Vec<&str> = items.iter().map(|item| item.label.as_str()).collect();
        assert_eq!(labels[0], "early");
        assert!(!labels.contains(&"late"));
        assert!(labels.contains(&"global"));
        assert!(labels.contains(&"gl_FragColor"));

        let helper = items.iter().find(|item| item.label == "helper").expect("helper");
        assert_eq!(helper.kind, CompletionKind::Function);
        assert_eq!(helper.detail, "float helper(float x, float y)");
        let light = items.iter().find(|item| item.label == "Light").expect("Light");
        assert_eq!(light.kind, CompletionKind::Struct);

        let first_builtin = labels.iter().position(|label| *label == "gl_Position").expect("builtin");
        let last_user = labels.iter().position(|label| *label == "helper").expect("user");
        assert!(last_user < first_builtin);
    }

    #[test]
    fn previews_values() {
        let main = "void main() {\n    int a = 2;\n    int b = a * 3;\n    a = b;\n}\n";
        let (_, service) = service(main);
        let preview = service
            .preview("main.frag", main.find("a = b").expect("assign"))
            .expect("preview");
        let b = preview.bindings.iter().find(|binding| binding.name == "b").expect("b");
        assert_eq!(b.value.to_string(), "6");
    }
}
