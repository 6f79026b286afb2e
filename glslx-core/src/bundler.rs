//! Link a file and everything it imports into one translation unit.
//!
//! Bundling runs in three phases:
//!
//! 1. resolve: breadth-first over the import graph from the entry file;
//! 2. consolidate: give every global a unique name, rename locals that
//!    would shadow one, and rewrite imported names to what they link to;
//! 3. order: drop declarations the root function does not reach and emit
//!    the rest dependencies first.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::ast::{ExternalDeclaration, ExternalNode, ImportKind, TranslationUnit};
use crate::error::CoreError;
use crate::fs::{FileSystem, normalize, resolve_import};
use crate::parser::parse;
use crate::visit::{Binding, defined_symbols, free_symbols, local_symbols, map_names};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleOptions {
    pub entry_path: String,
    /// Function whose dependencies are kept.
    pub root_function: String,
}

impl BundleOptions {
    pub fn new(entry_path: impl Into<String>) -> Self {
        BundleOptions {
            entry_path: entry_path.into(),
            root_function: "main".to_string(),
        }
    }
}

/// Source handed back by a [`SourceResolver`].
#[derive(Debug, Clone)]
pub enum Resolved {
    Text(String),
    /// An already parsed file.
    Unit(TranslationUnit),
}

pub trait SourceResolver {
    fn resolve(&mut self, path: &str) -> Result<Resolved, String>;
}

impl<F> SourceResolver for F
where
    F: FnMut(&str) -> Result<Resolved, String>,
{
    fn resolve(&mut self, path: &str) -> Result<Resolved, String> {
        self(path)
    }
}

/// Reads sources from a [`FileSystem`].
pub struct FileSystemResolver<'a, F: FileSystem> {
    fs: &'a F,
}

impl<'a, F: FileSystem> FileSystemResolver<'a, F> {
    pub fn new(fs: &'a F) -> Self {
        FileSystemResolver { fs }
    }
}

impl<F: FileSystem> SourceResolver for FileSystemResolver<'_, F> {
    fn resolve(&mut self, path: &str) -> Result<Resolved, String> {
        self.fs
            .read_file(path)
            .map(Resolved::Text)
            .map_err(|error| error.to_string())
    }
}

struct SourceUnit {
    path: String,
    unit: TranslationUnit,
    /// Own global names in first-appearance order.
    globals: Vec<String>,
}

pub fn bundle(
    options: &BundleOptions,
    resolver: &mut impl SourceResolver,
) -> Result<TranslationUnit, CoreError> {
    let files = resolve_files(&options.entry_path, resolver)?;
    log::debug!("bundling {} files from `{}`", files.len(), options.entry_path);
    let declarations = consolidate(&files)?;
    let declarations = order(declarations, &options.root_function)?;
    let comments = files
        .first()
        .map(|file| file.unit.comments.clone())
        .unwrap_or_default();
    Ok(TranslationUnit {
        declarations,
        comments,
    })
}

fn resolve_files(
    entry_path: &str,
    resolver: &mut impl SourceResolver,
) -> Result<Vec<SourceUnit>, CoreError> {
    let entry = normalize(entry_path);
    let mut files = Vec::new();
    let mut seen = HashSet::from([entry.clone()]);
    let mut queue = VecDeque::from([entry]);
    while let Some(path) = queue.pop_front() {
        let unit = match resolver.resolve(&path) {
            Ok(Resolved::Text(source)) => parse(&source).map_err(|error| {
                CoreError::BundleError(format!("failed to parse `{path}`: {error}"))
            })?,
            Ok(Resolved::Unit(unit)) => unit,
            Err(message) => {
                return Err(CoreError::BundleError(format!(
                    "cannot resolve `{path}`: {message}"
                )));
            }
        };
        for (import, _) in unit.imports() {
            let target = resolve_import(&path, &import.path);
            if seen.insert(target.clone()) {
                queue.push_back(target);
            }
        }
        let mut globals: Vec<String> = Vec::new();
        for external in &unit.declarations {
            for name in defined_symbols(external) {
                if !globals.contains(&name) {
                    globals.push(name);
                }
            }
        }
        log::trace!("resolved `{path}` with globals {globals:?}");
        files.push(SourceUnit {
            path,
            unit,
            globals,
        });
    }
    Ok(files)
}

/// Smallest `name_N` not in `taken`.
fn fresh_name(name: &str, taken: impl Fn(&str) -> bool) -> String {
    (0..)
        .map(|n| format!("{name}_{n}"))
        .find(|candidate| !taken(candidate.as_str()))
        .unwrap_or_else(|| name.to_string())
}

fn consolidate(files: &[SourceUnit]) -> Result<Vec<ExternalNode>, CoreError> {
    // Final name of every (file, global) pair.
    let mut taken: HashSet<String> = HashSet::new();
    let mut finals: Vec<HashMap<String, String>> = Vec::new();
    for file in files {
        let mut names = HashMap::new();
        for global in &file.globals {
            let renamed = if taken.contains(global) {
                let renamed = fresh_name(global, |candidate| taken.contains(candidate));
                log::debug!("renaming `{global}` in `{}` to `{renamed}`", file.path);
                renamed
            } else {
                global.clone()
            };
            taken.insert(renamed.clone());
            names.insert(global.clone(), renamed);
        }
        finals.push(names);
    }
    let index: HashMap<&str, usize> = files
        .iter()
        .enumerate()
        .map(|(at, file)| (file.path.as_str(), at))
        .collect();

    let mut declarations = Vec::new();
    for (at, file) in files.iter().enumerate() {
        let mut visible: HashMap<String, String> = HashMap::new();
        for (import, _) in file.unit.imports() {
            let target = resolve_import(&file.path, &import.path);
            let Some(&source) = index.get(target.as_str()) else {
                return Err(CoreError::BundleError(format!(
                    "import `{}` in `{}` was never resolved",
                    import.path, file.path
                )));
            };
            let exported = &finals[source];
            match &import.kind {
                ImportKind::All => {
                    for global in &files[source].globals {
                        visible.insert(global.clone(), exported[global].clone());
                    }
                }
                ImportKind::Prefixed(prefix) => {
                    for global in &files[source].globals {
                        visible.insert(format!("{prefix}{global}"), exported[global].clone());
                    }
                }
                ImportKind::Named(items) => {
                    for item in items {
                        let Some(linked) = exported.get(&item.data.name) else {
                            return Err(CoreError::BundleError(format!(
                                "`{}` is not exported by `{}`",
                                item.data.name, import.path
                            )));
                        };
                        visible.insert(item.data.local_name().to_string(), linked.clone());
                    }
                }
            }
        }
        for (global, renamed) in &finals[at] {
            visible.insert(global.clone(), renamed.clone());
        }

        for external in &file.unit.declarations {
            if matches!(external.data, ExternalDeclaration::Import(_)) {
                continue;
            }
            let locals = local_symbols(external);
            let mut local_renames: HashMap<String, String> = HashMap::new();
            for local in &locals {
                if taken.contains(local) {
                    let renamed = fresh_name(local, |candidate| {
                        taken.contains(candidate)
                            || locals.iter().any(|other| other == candidate)
                            || local_renames.values().any(|other| other == candidate)
                    });
                    log::trace!("renaming local `{local}` in `{}` to `{renamed}`", file.path);
                    local_renames.insert(local.clone(), renamed);
                }
            }
            let mut external = external.clone();
            map_names(&mut external, |occurrence| {
                let renames = match occurrence.binding {
                    Binding::Local => &local_renames,
                    Binding::Global => &visible,
                };
                renames
                    .get(occurrence.name)
                    .filter(|renamed| renamed.as_str() != occurrence.name)
                    .cloned()
            });
            declarations.push(external);
        }
    }
    Ok(declarations)
}

fn order(declarations: Vec<ExternalNode>, root_function: &str) -> Result<Vec<ExternalNode>, CoreError> {
    let defines: Vec<Vec<String>> = declarations.iter().map(defined_symbols).collect();
    let mut definers: HashMap<&str, Vec<usize>> = HashMap::new();
    for (at, names) in defines.iter().enumerate() {
        for name in names {
            definers.entry(name.as_str()).or_default().push(at);
        }
    }
    let uses: Vec<Vec<usize>> = declarations
        .iter()
        .enumerate()
        .map(|(at, declaration)| {
            let mut dependencies: Vec<usize> = free_symbols(declaration)
                .iter()
                .filter_map(|name| definers.get(name.as_str()))
                .flatten()
                .copied()
                .filter(|&dependency| dependency != at)
                .collect();
            dependencies.sort_unstable();
            dependencies.dedup();
            dependencies
        })
        .collect();

    let Some(roots) = definers.get(root_function) else {
        return Err(CoreError::BundleError(format!(
            "root function `{root_function}` is not defined"
        )));
    };
    let mut kept = vec![false; declarations.len()];
    let mut pending: Vec<usize> = roots.clone();
    pending.extend((0..declarations.len()).filter(|&at| defines[at].is_empty()));
    while let Some(at) = pending.pop() {
        if !kept[at] {
            kept[at] = true;
            pending.extend(&uses[at]);
        }
    }
    log::debug!(
        "keeping {} of {} declarations",
        kept.iter().filter(|&&keep| keep).count(),
        declarations.len()
    );

    let mut emitted = vec![false; declarations.len()];
    let mut sequence = Vec::new();
    let remaining = kept.iter().filter(|&&keep| keep).count();
    while sequence.len() < remaining {
        let ready = (0..declarations.len()).find(|&at| {
            kept[at] && !emitted[at] && uses[at].iter().all(|&dependency| emitted[dependency])
        });
        let Some(at) = ready else {
            let stuck: Vec<String> = (0..declarations.len())
                .filter(|&at| kept[at] && !emitted[at])
                .flat_map(|at| defines[at].clone())
                .collect();
            return Err(CoreError::BundleError(format!(
                "dependency cycle between {}",
                stuck.join(", ")
            )));
        };
        emitted[at] = true;
        sequence.push(at);
    }

    let mut slots: Vec<Option<ExternalNode>> = declarations.into_iter().map(Some).collect();
    Ok(sequence
        .into_iter()
        .filter_map(|at| slots[at].take())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::packed;
    use crate::fs::MemoryFs;

    fn bundle_files(files: &[(&str, &str)]) -> Result<String, CoreError> {
        let sources: HashMap<String, String> = files
            .iter()
            .map(|(path, source)| (path.to_string(), source.to_string()))
            .collect();
        let mut resolver = |path: &str| {
            sources
                .get(path)
                .cloned()
                .map(Resolved::Text)
                .ok_or_else(|| "no such file".to_string())
        };
        let options = BundleOptions::new(files[0].0);
        bundle(&options, &mut resolver).map(|unit| packed(&unit))
    }

    fn expect(source: &str) -> String {
        packed(&parse(source).expect("parse expected"))
    }

    #[test]
    fn single_file_bundles_to_itself() {
        let source = "\
precision mediump float;
uniform float time;
float wave(float x) { return sin(x * time); }
void main() { gl_FragColor = vec4(wave(1.0)); }
";
        assert_eq!(bundle_files(&[("main.glsl", source)]).expect("bundle"), expect(source));
    }

    #[test]
    fn only_reachable_declarations_are_kept() {
        let bundled = bundle_files(&[
            (
                "a.glsl",
                "import { f } from \"b.glsl\";\nvoid main() { gl_FragColor = vec4(f()); }",
            ),
            ("b.glsl", "float f() { return 1.0; }\nfloat g() { return 2.0; }"),
        ])
        .expect("bundle");
        assert_eq!(
            bundled,
            expect("float f(){return 1.0;}void main(){gl_FragColor=vec4(f());}")
        );
    }

    #[test]
    fn colliding_globals_get_suffixes() {
        let bundled = bundle_files(&[
            (
                "a.glsl",
                "import * as b_ from \"b.glsl\";\nfloat f() { return 1.0; }\nvoid main() { gl_FragColor = vec4(f() + b_f()); }",
            ),
            ("b.glsl", "float f() { return 2.0; }"),
        ])
        .expect("bundle");
        assert_eq!(
            bundled,
            expect(
                "float f(){return 1.0;}float f_0(){return 2.0;}void main(){gl_FragColor=vec4(f()+f_0());}"
            )
        );
    }

    #[test]
    fn locals_shadowing_globals_are_renamed() {
        let bundled = bundle_files(&[
            (
                "a.glsl",
                "import * as b_ from \"b.glsl\";\nfloat f() { return 1.0; }\nvoid main() { float f_0 = b_f(); gl_FragColor = vec4(f_0 + f()); }",
            ),
            ("b.glsl", "float f() { return 2.0; }"),
        ])
        .expect("bundle");
        assert_eq!(
            bundled,
            expect(
                "float f(){return 1.0;}float f_0(){return 2.0;}void main(){float f_0_0=f_0();gl_FragColor=vec4(f_0_0+f());}"
            )
        );
    }

    #[test]
    fn mutual_imports_terminate() {
        let bundled = bundle_files(&[
            (
                "a.glsl",
                "import { g } from \"./b.glsl\";\nfloat f() { return 1.0; }\nvoid main() { gl_FragColor = vec4(g()); }",
            ),
            (
                "b.glsl",
                "import { f } from \"./a.glsl\";\nfloat g() { return f() * 2.0; }",
            ),
        ])
        .expect("bundle");
        assert_eq!(
            bundled,
            expect("float f(){return 1.0;}float g(){return f()*2.0;}void main(){gl_FragColor=vec4(g());}")
        );
    }

    #[test]
    fn dependencies_come_first() {
        let bundled = bundle_files(&[
            (
                "main.glsl",
                "import { x as y } from \"b.glsl\";\nfloat x = y + 1.0;\nvoid main() { gl_FragColor = vec4(x); }",
            ),
            ("b.glsl", "import { x as z } from \"c.glsl\";\nfloat x = z + 1.0;"),
            ("c.glsl", "float x = 1.0;"),
        ])
        .expect("bundle");
        assert_eq!(
            bundled,
            expect("float x_1=1.0;float x_0=x_1+1.0;float x=x_0+1.0;void main(){gl_FragColor=vec4(x);}")
        );
    }

    #[test]
    fn precision_statements_survive() {
        let bundled = bundle_files(&[(
            "main.glsl",
            "precision highp float;\nfloat unused;\nvoid main() {}",
        )])
        .expect("bundle");
        assert_eq!(bundled, expect("precision highp float;void main(){}"));
    }

    #[test]
    fn reports_link_errors() {
        let missing = bundle_files(&[("a.glsl", "import * from \"b.glsl\";\nvoid main() {}")]);
        assert!(matches!(missing, Err(CoreError::BundleError(message)) if message.contains("b.glsl")));

        let broken = bundle_files(&[
            ("a.glsl", "import * from \"b.glsl\";\nvoid main() {}"),
            ("b.glsl", "float ("),
        ]);
        assert!(matches!(broken, Err(CoreError::BundleError(message)) if message.starts_with("failed to parse `b.glsl`")));

        let unexported = bundle_files(&[
            ("a.glsl", "import { h } from \"b.glsl\";\nvoid main() {}"),
            ("b.glsl", "float g;"),
        ]);
        assert!(matches!(unexported, Err(CoreError::BundleError(message)) if message.contains("`h`")));

        let rootless = bundle_files(&[("a.glsl", "float g;")]);
        assert!(matches!(rootless, Err(CoreError::BundleError(message)) if message.contains("`main`")));

        let cyclic = bundle_files(&[(
            "a.glsl",
            "float f();\nfloat g() { return f(); }\nfloat f() { return g(); }\nvoid main() { f(); }",
        )]);
        assert!(matches!(cyclic, Err(CoreError::BundleError(message)) if message.starts_with("dependency cycle")));
    }

    #[test]
    fn reads_through_a_file_system() {
        let fs = MemoryFs::new();
        fs.write("shaders/main.frag", "import * from \"./lib/util.glsl\";\nvoid main() { gl_FragColor = tint(); }");
        fs.write("shaders/lib/util.glsl", "vec4 tint() { return vec4(1.0); }");
        let mut resolver = FileSystemResolver::new(&fs);
        let unit = bundle(&BundleOptions::new("shaders/main.frag"), &mut resolver).expect("bundle");
        assert_eq!(
            packed(&unit),
            expect("vec4 tint(){return vec4(1.0);}void main(){gl_FragColor=tint();}")
        );
    }

    #[test]
    fn accepts_parsed_units() {
        let unit = parse("void main() {}").expect("parse");
        let mut resolver = move |path: &str| match path {
            "main.glsl" => Ok(Resolved::Unit(unit.clone())),
            _ => Err("unknown".to_string()),
        };
        let unit = bundle(&BundleOptions::new("main.glsl"), &mut resolver).expect("bundle");
        assert_eq!(packed(&unit), "void main(){}");
    }
}
