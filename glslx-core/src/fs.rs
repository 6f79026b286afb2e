//! File system access for the language service and the bundler.
//!
//! Paths are logical, `/`-separated strings. [`MemoryFs`] keeps files in
//! memory and notifies subscribers on every write; [`OsFs`] reads from a
//! directory on disk and never notifies.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};

use walkdir::WalkDir;

use crate::error::CoreError;

/// Decides which changed paths a subscriber hears about.
pub type PathPredicate = Box<dyn Fn(&str) -> bool>;
/// Called with the path that changed.
pub type ChangeCallback = Box<dyn Fn(&str)>;

pub trait FileSystem {
    fn read_file(&self, path: &str) -> Result<String, CoreError>;

    /// Paths of the direct children of the directory `path`.
    fn read_dir(&self, path: &str) -> Result<Vec<String>, CoreError>;

    fn is_dir(&self, path: &str) -> bool;

    /// Watch files under `path` that satisfy `predicate`. Dropping the
    /// returned [`Subscription`] stops the notifications.
    fn subscribe(&self, path: &str, predicate: PathPredicate, callback: ChangeCallback)
    -> Subscription;
}

/// Handle to an active watch.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// A subscription that never fires.
    pub fn inactive() -> Self {
        Subscription { cancel: None }
    }

    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

// ---------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------

/// Remove `.` segments, resolve `..` against earlier segments and collapse
/// repeated separators.
pub fn normalize(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if matches!(segments.last(), Some(last) if *last != "..") {
                    segments.pop();
                } else {
                    segments.push("..");
                }
            }
            _ => segments.push(segment),
        }
    }
    let joined = segments.join("/");
    if path.starts_with('/') {
        format!("/{joined}")
    } else {
        joined
    }
}

/// Path of the file an `import ... from "target"` in `from` refers to.
pub fn resolve_import(from: &str, target: &str) -> String {
    if target.starts_with("./") || target.starts_with("../") {
        match from.rsplit_once('/') {
            Some((directory, _)) => normalize(&format!("{directory}/{target}")),
            None => normalize(target),
        }
    } else {
        normalize(target)
    }
}

/// Whether `path` ends in one of `extensions` (given without the dot).
pub fn has_extension(path: &str, extensions: &[String]) -> bool {
    path.rsplit_once('.')
        .is_some_and(|(_, extension)| extensions.iter().any(|known| known == extension))
}

// ---------------------------------------------------------------------
// In-memory file system
// ---------------------------------------------------------------------

struct Watcher {
    id: u64,
    prefix: String,
    predicate: PathPredicate,
    callback: Rc<dyn Fn(&str)>,
}

#[derive(Default)]
struct MemoryState {
    files: BTreeMap<String, String>,
    watchers: Vec<Watcher>,
    next_id: u64,
}

/// Files held in memory. Clones share the same files.
#[derive(Clone, Default)]
pub struct MemoryFs {
    state: Rc<RefCell<MemoryState>>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace a file and notify matching subscribers.
    pub fn write(&self, path: &str, contents: impl Into<String>) {
        let path = normalize(path);
        let callbacks: Vec<Rc<dyn Fn(&str)>> = {
            let mut state = self.state.borrow_mut();
            state.files.insert(path.clone(), contents.into());
            state
                .watchers
                .iter()
                .filter(|watcher| path.starts_with(&watcher.prefix) && (watcher.predicate)(&path))
                .map(|watcher| Rc::clone(&watcher.callback))
                .collect()
        };
        for callback in callbacks {
            callback(&path);
        }
    }
}

impl FileSystem for MemoryFs {
    fn read_file(&self, path: &str) -> Result<String, CoreError> {
        let path = normalize(path);
        self.state
            .borrow()
            .files
            .get(&path)
            .cloned()
            .ok_or(CoreError::NotFound(path))
    }

    fn read_dir(&self, path: &str) -> Result<Vec<String>, CoreError> {
        let directory = normalize(path);
        let prefix = if directory.is_empty() {
            String::new()
        } else {
            format!("{directory}/")
        };
        let state = self.state.borrow();
        let mut children: Vec<String> = state
            .files
            .keys()
            .filter_map(|file| file.strip_prefix(&prefix))
            .map(|rest| {
                let child = rest.split('/').next().unwrap_or(rest);
                format!("{prefix}{child}")
            })
            .collect();
        children.dedup();
        if children.is_empty() && !directory.is_empty() {
            return Err(CoreError::NotFound(directory));
        }
        Ok(children)
    }

    fn is_dir(&self, path: &str) -> bool {
        let directory = normalize(path);
        let prefix = format!("{directory}/");
        directory.is_empty() || self.state.borrow().files.keys().any(|file| file.starts_with(&prefix))
    }

    fn subscribe(&self, path: &str, predicate: PathPredicate, callback: ChangeCallback) -> Subscription {
        let mut state = self.state.borrow_mut();
        let id = state.next_id;
        state.next_id += 1;
        state.watchers.push(Watcher {
            id,
            prefix: normalize(path),
            predicate,
            callback: Rc::from(callback),
        });
        let weak: Weak<RefCell<MemoryState>> = Rc::downgrade(&self.state);
        Subscription {
            cancel: Some(Box::new(move || {
                if let Some(state) = weak.upgrade() {
                    state.borrow_mut().watchers.retain(|watcher| watcher.id != id);
                }
            })),
        }
    }
}

// ---------------------------------------------------------------------
// Disk
// ---------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Path relative to the root, `/`-separated.
    pub path: String,
    pub contents: String,
}

/// A directory on disk. Logical paths are relative to `root`.
#[derive(Debug, Clone)]
pub struct OsFs {
    root: PathBuf,
}

impl OsFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        OsFs { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn full_path(&self, path: &str) -> PathBuf {
        self.root.join(normalize(path))
    }

    fn logical(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        let parts: Vec<String> = relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy().into_owned())
            .collect();
        parts.join("/")
    }

    /// Every file below the root whose extension is one of `extensions`,
    /// sorted by path.
    pub fn source_files(&self, extensions: &[String]) -> Result<Vec<SourceFile>, CoreError> {
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
        {
            let path = entry.path();
            let logical = self.logical(path);
            if path.is_file() && has_extension(&logical, extensions) {
                let contents = fs::read_to_string(path)?;
                files.push(SourceFile {
                    path: logical,
                    contents,
                });
            }
        }
        Ok(files)
    }
}

impl FileSystem for OsFs {
    fn read_file(&self, path: &str) -> Result<String, CoreError> {
        let full = self.full_path(path);
        if !full.is_file() {
            return Err(CoreError::NotFound(normalize(path)));
        }
        Ok(fs::read_to_string(full)?)
    }

    fn read_dir(&self, path: &str) -> Result<Vec<String>, CoreError> {
        let full = self.full_path(path);
        if !full.is_dir() {
            return Err(CoreError::NotFound(normalize(path)));
        }
        Ok(WalkDir::new(&full)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .map(|entry| self.logical(entry.path()))
            .collect())
    }

    fn is_dir(&self, path: &str) -> bool {
        self.full_path(path).is_dir()
    }

    fn subscribe(&self, _path: &str, _predicate: PathPredicate, _callback: ChangeCallback) -> Subscription {
        Subscription::inactive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn normalizes_paths() {
        assert_eq!(normalize("a/./b//c"), "a/b/c");
        assert_eq!(normalize("a/b/../c"), "a/c");
        assert_eq!(normalize("../a"), "../a");
        assert_eq!(resolve_import("lib/light.glsl", "./noise.glsl"), "lib/noise.glsl");
        assert_eq!(resolve_import("lib/light.glsl", "../main.glsl"), "main.glsl");
        assert_eq!(resolve_import("lib/light.glsl", "common/util.glsl"), "common/util.glsl");
        assert_eq!(resolve_import("main.glsl", "./lib/a.glsl"), "lib/a.glsl");
    }

    #[test]
    fn memory_fs_lists_directories() {
        let fs = MemoryFs::new();
        fs.write("lib/a.glsl", "float a;");
        fs.write("lib/sub/b.glsl", "float b;");
        fs.write("main.glsl", "");
        assert_eq!(fs.read_file("lib/a.glsl").expect("read"), "float a;");
        assert!(matches!(fs.read_file("nope.glsl"), Err(CoreError::NotFound(_))));
        assert_eq!(
            fs.read_dir("lib").expect("list"),
            vec!["lib/a.glsl".to_string(), "lib/sub".to_string()]
        );
        assert!(fs.is_dir("lib/sub"));
        assert!(!fs.is_dir("main.glsl"));
    }

    #[test]
    fn memory_fs_notifies_until_unsubscribed() {
        let fs = MemoryFs::new();
        let hits = Rc::new(Cell::new(0));
        let counter = Rc::clone(&hits);
        let subscription = fs.subscribe(
            "shaders",
            Box::new(|path: &str| path.ends_with(".glsl")),
            Box::new(move |_: &str| counter.set(counter.get() + 1)),
        );
        fs.write("shaders/a.glsl", "");
        fs.write("shaders/a.txt", "");
        fs.write("other/b.glsl", "");
        assert_eq!(hits.get(), 1);
        subscription.unsubscribe();
        fs.write("shaders/a.glsl", "float x;");
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn os_fs_reads_from_a_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("lib")).expect("mkdir");
        fs::write(dir.path().join("main.frag"), "void main() {}").expect("write");
        fs::write(dir.path().join("lib/util.glsl"), "float u;").expect("write");
        fs::write(dir.path().join("notes.txt"), "ignore me").expect("write");

        let os = OsFs::new(dir.path());
        assert_eq!(os.read_file("lib/util.glsl").expect("read"), "float u;");
        assert!(matches!(os.read_file("missing.glsl"), Err(CoreError::NotFound(_))));
        assert!(os.is_dir("lib"));
        assert_eq!(os.read_dir("lib").expect("list"), vec!["lib/util.glsl".to_string()]);

        let extensions = vec!["glsl".to_string(), "frag".to_string()];
        let files = os.source_files(&extensions).expect("walk");
        let paths: Vec<&str> = files.iter().map(|file| file.path.as_str()).collect();
        assert_eq!(paths, ["lib/util.glsl", "main.frag"]);
    }
}
