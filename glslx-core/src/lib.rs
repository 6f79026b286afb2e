//! Core of the glslx shading language toolchain.
//!
//! glslx is GLSL extended with `import` declarations. The pipeline is
//! roughly:
//!
//!   source .glsl
//!     -> lexer      (tokens, comments kept)
//!     -> parser     (comment-preserving AST)
//!     -> scope + typecheck + eval (language service queries)
//!     -> bundler    (one linked unit)
//!     -> format     (packed or fancy text)
//!
//! Editors, the CLI and other hosts should depend on this crate rather
//! than reimplementing the pipeline.

// ---------------------------------------------------------------------
// Error handling and diagnostics
// ---------------------------------------------------------------------

pub mod span;
pub mod diagnostic;
pub mod error;

// ---------------------------------------------------------------------
// Front-end: lexing, parsing and syntax utilities
// ---------------------------------------------------------------------

pub mod lexer;
pub mod parser;
pub mod ast;
pub mod visit;
pub mod format;

// ---------------------------------------------------------------------
// Semantic layers: scopes, types, checking, constant evaluation
// ---------------------------------------------------------------------

pub mod scope;
pub mod types;
pub mod builtins;
pub mod typecheck;
pub mod eval;

// ---------------------------------------------------------------------
// Hosts: file access, language service and bundling
// ---------------------------------------------------------------------

pub mod fs;
pub mod service;
pub mod bundler;

// ---------------------------------------------------------------------
// Public API re-exports
// ---------------------------------------------------------------------

pub use bundler::{BundleOptions, FileSystemResolver, Resolved, SourceResolver, bundle};
pub use diagnostic::Diagnostic;
pub use error::CoreError;
pub use format::{FormatMode, FormatOptions, format};
pub use fs::{FileSystem, MemoryFs, OsFs};
pub use parser::{parse, parse_recovering};
pub use service::{LanguageService, ServiceConfig};
