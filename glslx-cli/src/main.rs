use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use glslx_core::eval::{Binding, evaluate_globals, preview_at};
use glslx_core::scope::ScopeTree;
use glslx_core::{
    BundleOptions, FileSystem, FileSystemResolver, FormatMode, FormatOptions, LanguageService,
    MemoryFs, OsFs, ServiceConfig, bundle, format, parse,
};

/// Formatter, checker, evaluator and bundler for glslx shaders.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[arg(short, long, global = true, help = "Log debug output to stderr")]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Reformat a shader.
    Format {
        #[arg(help = "Input file, `-` for stdin")]
        input: String,
        #[command(flatten)]
        style: Style,
        #[arg(short, long, value_name = "PATH")]
        output: Option<String>,
    },
    /// Report diagnostics for a shader or every shader under a directory.
    Check {
        #[arg(help = "File or directory, `-` for stdin")]
        path: String,
        #[arg(
            long = "ext",
            value_name = "EXT",
            help = "Shader file extensions to check in directories (default: glsl, frag, vert, fs, vs)"
        )]
        extensions: Vec<String>,
    },
    /// Link a shader and its imports into one file.
    Bundle {
        entry: String,
        #[arg(long, default_value = "main", help = "Function whose dependencies are kept")]
        root: String,
        #[command(flatten)]
        style: Style,
        #[arg(short, long, value_name = "PATH")]
        output: Option<String>,
    },
    /// Print global constant values, or the values visible at a byte offset.
    Eval {
        #[arg(help = "Input file, `-` for stdin")]
        input: String,
        #[arg(long, value_name = "OFFSET")]
        at: Option<usize>,
    },
}

#[derive(clap::Args, Debug)]
struct Style {
    #[arg(long, help = "Indent and wrap instead of packing")]
    fancy: bool,
    #[arg(long, value_name = "N", default_value_t = 80)]
    line_width: usize,
    #[arg(long, value_name = "N", default_value_t = 4)]
    indent: usize,
}

impl Style {
    fn options(&self) -> FormatOptions {
        FormatOptions {
            mode: if self.fancy {
                FormatMode::Fancy
            } else {
                FormatMode::Packed
            },
            line_width: self.line_width,
            indent: self.indent,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
    execute(cli.command)
}

fn execute(command: Command) -> Result<()> {
    match command {
        Command::Format {
            input,
            style,
            output,
        } => {
            let source = read_input(&input)?;
            let unit = parse(&source).with_context(|| format!("failed to parse {input}"))?;
            write_output(output.as_deref(), &finish(format(&unit, &style.options())))
        }
        Command::Check { path, extensions } => {
            let config = if extensions.is_empty() {
                ServiceConfig::default()
            } else {
                ServiceConfig { extensions }
            };
            let problems = check(&path, config)?;
            if problems > 0 {
                anyhow::bail!("found {problems} problem(s)");
            }
            Ok(())
        }
        Command::Bundle {
            entry,
            root,
            style,
            output,
        } => {
            let (root_dir, file) = split_path(Path::new(&entry))?;
            let fs = OsFs::new(root_dir);
            let options = BundleOptions {
                entry_path: file,
                root_function: root,
            };
            let mut resolver = FileSystemResolver::new(&fs);
            let unit = bundle(&options, &mut resolver)
                .with_context(|| format!("failed to bundle {entry}"))?;
            write_output(output.as_deref(), &finish(format(&unit, &style.options())))
        }
        Command::Eval { input, at } => {
            let source = read_input(&input)?;
            let unit = parse(&source).with_context(|| format!("failed to parse {input}"))?;
            let bindings = match at {
                Some(position) => {
                    let tree = ScopeTree::build(&unit);
                    preview_at(&unit, &tree, position).bindings
                }
                None => evaluate_globals(&unit),
            };
            let mut out = String::new();
            for binding in &bindings {
                out.push_str(&describe(binding));
                out.push('\n');
            }
            write_output(None, &out)
        }
    }
}

/// Print diagnostics for `path` and return how many were found.
fn check(path: &str, config: ServiceConfig) -> Result<usize> {
    if path == "-" {
        let source = read_input(path)?;
        let fs = MemoryFs::new();
        fs.write("stdin.glsl", source);
        let service = LanguageService::with_config(fs, config);
        return report(&service, "stdin.glsl", "<stdin>");
    }
    let target = Path::new(path);
    if target.is_dir() {
        let fs = OsFs::new(target);
        let files: Vec<String> = fs
            .source_files(&config.extensions)
            .with_context(|| format!("failed to list {path}"))?
            .into_iter()
            .map(|file| file.path)
            .collect();
        log::info!("checking {} files under {path}", files.len());
        let service = LanguageService::with_config(fs, config);
        let mut problems = 0;
        for file in &files {
            let shown = target.join(file).display().to_string();
            problems += report(&service, file, &shown)?;
        }
        return Ok(problems);
    }
    let (root, file) = split_path(target)?;
    let service = LanguageService::with_config(OsFs::new(root), config);
    report(&service, &file, path)
}

fn report<F: FileSystem>(service: &LanguageService<F>, file: &str, shown: &str) -> Result<usize> {
    let diagnostics = service
        .diagnostics(file)
        .with_context(|| format!("failed to check {shown}"))?;
    let source = service.file_system().read_file(file)?;
    for diagnostic in &diagnostics {
        let (line, column) = line_column(&source, diagnostic.start);
        println!("{shown}:{line}:{column}: {}", diagnostic.why);
    }
    Ok(diagnostics.len())
}

/// One-based line and column of a byte offset.
fn line_column(source: &str, offset: usize) -> (usize, usize) {
    let before = &source.as_bytes()[..offset.min(source.len())];
    let line = before.iter().filter(|&&byte| byte == b'\n').count() + 1;
    let column = before.iter().rev().take_while(|&&byte| byte != b'\n').count() + 1;
    (line, column)
}

fn describe(binding: &Binding) -> String {
    let constant = if binding.constant { "const " } else { "" };
    match &binding.ty {
        Some(ty) => format!("{constant}{ty} {} = {}", binding.name, binding.value),
        None => format!("{constant}{} = {}", binding.name, binding.value),
    }
}

/// Split a file path into the directory used as the file system root and
/// the file name inside it.
fn split_path(path: &Path) -> Result<(PathBuf, String)> {
    let file = path
        .file_name()
        .with_context(|| format!("{} is not a file", path.display()))?
        .to_string_lossy()
        .into_owned();
    let root = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((root, file))
}

fn read_input(input: &str) -> Result<String> {
    if input == "-" {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("failed to read stdin")?;
        return Ok(buffer);
    }
    fs::read_to_string(input).with_context(|| format!("failed to read input file {input}"))
}

fn finish(mut text: String) -> String {
    if !text.ends_with('\n') {
        text.push('\n');
    }
    text
}

fn write_output(path: Option<&str>, text: &str) -> Result<()> {
    let Some(path) = path else {
        print!("{text}");
        return Ok(());
    };
    if let Some(parent) = PathBuf::from(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {parent:?}"))?;
        }
    }
    fs::write(path, text).with_context(|| format!("failed to write output file {path}"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_cmd::Command;
    use predicates::prelude::*;
    use tempfile::tempdir;

    fn glslx() -> Command {
        Command::cargo_bin("glslx").expect("binary exists")
    }

    #[test]
    fn formats_packed_to_a_file() {
        let dir = tempdir().expect("tempdir");
        let input_path = dir.path().join("input.frag");
        fs::write(&input_path, "void main ( ) { gl_FragColor = vec4 ( 1.0 * ( 2.0 + 3.0 ) ) ; }")
            .expect("write input");
        let output_path = dir.path().join("out/packed.frag");

        glslx()
            .arg("format")
            .arg(&input_path)
            .arg("--output")
            .arg(&output_path)
            .assert()
            .success();

        let packed = fs::read_to_string(&output_path).expect("read output");
        assert_eq!(packed, "void main(){gl_FragColor=vec4(1.0*(2.0+3.0));}\n");
    }

    #[test]
    fn formats_stdin_fancy() {
        glslx()
            .args(["format", "-", "--fancy"])
            .write_stdin("float f(){return 1.0;}")
            .assert()
            .success()
            .stdout(predicate::str::contains("float f() {"))
            .stdout(predicate::str::contains("    return 1.0;"));
    }

    #[test]
    fn reports_parse_errors() {
        glslx()
            .args(["format", "-"])
            .write_stdin("void main( {")
            .assert()
            .failure()
            .stderr(predicate::str::contains("failed to parse"));
    }

    #[test]
    fn checks_a_directory() {
        let dir = tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("lib")).expect("mkdir");
        fs::write(dir.path().join("lib/util.glsl"), "float halve(float x) { return x * 0.5; }")
            .expect("write lib");
        fs::write(
            dir.path().join("ok.frag"),
            "import { halve } from \"./lib/util.glsl\";\nvoid main() { gl_FragColor = vec4(halve(1.0)); }",
        )
        .expect("write ok");
        fs::write(dir.path().join("notes.txt"), "not a shader").expect("write notes");

        glslx().arg("check").arg(dir.path()).assert().success();

        fs::write(dir.path().join("bad.frag"), "void main() {\n    int i = 1.0;\n}")
            .expect("write bad");
        glslx()
            .arg("check")
            .arg(dir.path())
            .assert()
            .failure()
            .stdout(predicate::str::contains("bad.frag:2:13: cannot initialize `int` with `float`"))
            .stderr(predicate::str::contains("found 1 problem(s)"));
    }

    #[test]
    fn bundles_imports() {
        let dir = tempdir().expect("tempdir");
        fs::write(
            dir.path().join("main.frag"),
            "import { f } from \"./lib.glsl\";\nvoid main() { gl_FragColor = vec4(f()); }",
        )
        .expect("write main");
        fs::write(
            dir.path().join("lib.glsl"),
            "float f() { return 1.0; }\nfloat unused() { return 2.0; }",
        )
        .expect("write lib");

        glslx()
            .arg("bundle")
            .arg(dir.path().join("main.frag"))
            .assert()
            .success()
            .stdout("float f(){return 1.0;}void main(){gl_FragColor=vec4(f());}\n");
    }

    #[test]
    fn bundle_reports_missing_imports() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("main.frag"), "import * from \"gone.glsl\";\nvoid main() {}")
            .expect("write main");

        glslx()
            .arg("bundle")
            .arg(dir.path().join("main.frag"))
            .assert()
            .failure()
            .stderr(predicate::str::contains("gone.glsl"));
    }

    #[test]
    fn evaluates_globals_and_previews() {
        let source = "const int n = 3 * 4;\nfloat f() {\n    float x = 0.5;\n    x *= 4.0;\n    return x;\n}\n";
        glslx()
            .args(["eval", "-"])
            .write_stdin(source)
            .assert()
            .success()
            .stdout("const int n = 12\n");

        let offset = source.find("return").expect("return").to_string();
        glslx()
            .args(["eval", "-", "--at", offset.as_str()])
            .write_stdin(source)
            .assert()
            .success()
            .stdout(predicate::str::contains("float x = 2.0"));
    }

    #[test]
    fn finds_line_and_column() {
        assert_eq!(line_column("ab\ncd", 0), (1, 1));
        assert_eq!(line_column("ab\ncd", 4), (2, 2));
        assert_eq!(line_column("ab", 99), (1, 3));
    }
}
