//! Czar compiler library
//!
//! Translates `.cz` source into a C11 translation unit. The pipeline is a
//! straight-line sequence of five stages — lexer, parser, type checker,
//! lowering, code generator — each a pure function from one value-typed
//! artifact to the next, with diagnostics accumulating in a caller-owned
//! list. The driver (`main.rs`) owns the host `cc`/`clang` invocation;
//! everything in this crate stops at producing a `.c` file as a string.

pub mod ast;
pub mod codegen;
pub mod config;
pub mod diagnostics;
pub mod lexer;
pub mod lowering;
pub mod parser;
pub mod scope;
pub mod test_runner;
pub mod token;
pub mod typechecker;
pub mod types;

pub use ast::Program;
pub use codegen::CodeGen;
pub use config::CompilerConfig;
pub use diagnostics::{Diagnostic, Diagnostics};
pub use types::Type;

use std::fs;
use std::path::Path;
use std::process::Command;

/// Lex a source file, for the `cz lexer` subcommand. Returns the token
/// stream even when diagnostics were pushed; the caller decides what to
/// print and whether to exit non-zero.
pub fn lex_file(path: &Path, diags: &mut Diagnostics) -> Result<Vec<token::Token>, String> {
    let source = fs::read_to_string(path).map_err(|e| format!("failed to read {}: {e}", path.display()))?;
    Ok(lexer::lex(&source, path, diags))
}

/// Lex and parse a source file, for the `cz parser` subcommand and every
/// later stage. Parsing proceeds even after a lex error so later stages
/// still see as much of the tree as the parser could recover.
pub fn parse_file(path: &Path, diags: &mut Diagnostics) -> Result<Program, String> {
    let source = fs::read_to_string(path).map_err(|e| format!("failed to read {}: {e}", path.display()))?;
    let tokens = lexer::lex(&source, path, diags);
    Ok(parser::parse(tokens, path, diags))
}

/// Run lex, parse, and type check; stop at the first stage boundary that
/// produced an error-severity diagnostic, matching the spec's "driver
/// aborts between stages on any error" propagation policy.
fn check_file(path: &Path, diags: &mut Diagnostics) -> Result<Program, String> {
    let program = parse_file(path, diags)?;
    if diags.has_errors() {
        return Ok(program);
    }
    typechecker::check(&program, path, diags);
    Ok(program)
}

/// Run the full pipeline and render the C translation unit as a string,
/// for the `cz generator` subcommand. Does not touch the filesystem beyond
/// reading `path`.
pub fn compile_to_c(path: &Path, config: &CompilerConfig, diags: &mut Diagnostics) -> Result<String, String> {
    let program = check_file(path, diags)?;
    if diags.has_errors() {
        return Err("compilation failed".to_string());
    }
    let mut config = config.clone();
    config.apply_directives(&program.directives);
    let lowered = lowering::lower(&program);
    Ok(codegen::generate(&lowered, path, &config))
}

/// `cz build`: compile to C, write it next to the input (or to a temporary
/// location kept only long enough for `cc` to read it), then invoke the
/// host C compiler to produce `output_path`.
pub fn compile_file(path: &Path, output_path: &Path, config: &CompilerConfig, diags: &mut Diagnostics) -> Result<(), String> {
    let c_source = compile_to_c(path, config, diags)?;
    let c_path = path.with_extension("c");
    fs::write(&c_path, &c_source).map_err(|e| format!("failed to write {}: {e}", c_path.display()))?;

    let result = (|| -> Result<(), String> {
        let output = Command::new("cc")
            .arg(&c_path)
            .arg("-o")
            .arg(output_path)
            .output()
            .map_err(|e| format!("failed to run host C compiler: {e}"))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!("host C compiler failed:\n{stderr}"));
        }
        Ok(())
    })();

    if !config.keep_c {
        fs::remove_file(&c_path).ok();
    }
    result
}

/// `cz run`: build, then execute the resulting binary, propagating its
/// exit code unchanged.
pub fn run_file(path: &Path, config: &CompilerConfig, diags: &mut Diagnostics) -> Result<i32, String> {
    let output_path = path.with_extension("");
    compile_file(path, &output_path, config, diags)?;
    let status = Command::new(&output_path).status().map_err(|e| format!("failed to run {}: {e}", output_path.display()))?;
    Ok(status.code().unwrap_or(1))
}

/// `cz test DIR`: run the syntax-check-only test runner over a directory.
pub fn run_tests_in_dir(dir: &Path, verbose: bool) -> test_runner::TestSummary {
    let runner = test_runner::TestRunner::new(verbose);
    runner.run(dir)
}
