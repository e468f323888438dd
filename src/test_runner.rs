//! `cz test DIR` — recursive per-file syntax check
//!
//! Unlike the teacher's `test-*.seq` runner (which compiles a synthetic
//! `main` that calls every discovered test function and inspects its stdout
//! for pass/fail markers), Czar's `test` subcommand only runs the first
//! three pipeline stages — lex, parse, type check — over every `.cz` file
//! under a directory tree and reports which files are clean. There is no
//! notion of a test function or assertion in the language; "passing" means
//! "compiles to a well-typed program."

use std::fs;
use std::path::{Path, PathBuf};

use crate::diagnostics::Diagnostics;
use crate::lexer::lex;
use crate::parser::parse;
use crate::typechecker;

/// Outcome of checking a single file.
#[derive(Debug)]
pub struct FileCheckResult {
    pub path: PathBuf,
    pub diagnostics: Vec<crate::diagnostics::Diagnostic>,
}

impl FileCheckResult {
    pub fn passed(&self) -> bool {
        !self.diagnostics.iter().any(|d| d.is_error())
    }
}

#[derive(Debug, Default)]
pub struct TestSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub results: Vec<FileCheckResult>,
}

pub struct TestRunner {
    pub verbose: bool,
}

impl TestRunner {
    pub fn new(verbose: bool) -> Self {
        TestRunner { verbose }
    }

    /// Recursively collect every `.cz` file under `root`, in file-system
    /// order (not sorted — matches the teacher's own directory walk).
    pub fn discover_test_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut files = Vec::new();
        self.discover_in_directory(root, &mut files);
        files
    }

    fn discover_in_directory(&self, dir: &Path, files: &mut Vec<PathBuf>) {
        let Ok(entries) = fs::read_dir(dir) else { return };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                self.discover_in_directory(&path, files);
            } else if path.extension().is_some_and(|ext| ext == "cz") {
                files.push(path);
            }
        }
    }

    /// Lex, parse, and type check a single file, discarding the program —
    /// only whether it came back clean matters here.
    pub fn check_file(&self, path: &Path) -> FileCheckResult {
        let mut diags = Diagnostics::new();
        let source = match fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                diags.error(path, 0, 0, format!("could not read file: {e}"));
                return FileCheckResult { path: path.to_path_buf(), diagnostics: diags.into_vec() };
            }
        };
        let tokens = lex(&source, path, &mut diags);
        let program = parse(tokens, path, &mut diags);
        if !diags.has_errors() {
            typechecker::check(&program, path, &mut diags);
        }
        FileCheckResult { path: path.to_path_buf(), diagnostics: diags.into_vec() }
    }

    pub fn run(&self, root: &Path) -> TestSummary {
        let mut summary = TestSummary::default();
        for path in self.discover_test_files(root) {
            let result = self.check_file(&path);
            summary.total += 1;
            if result.passed() {
                summary.passed += 1;
            } else {
                summary.failed += 1;
            }
            summary.results.push(result);
        }
        summary
    }

    pub fn print_results(&self, summary: &TestSummary) {
        for result in &summary.results {
            let status = if result.passed() { "ok" } else { "FAILED" };
            println!("{} ... {}", result.path.display(), status);
            if self.verbose || !result.passed() {
                for d in &result.diagnostics {
                    println!("  {d}");
                }
            }
        }
        println!("\n========================================");
        println!("Results: {} passed, {} failed, {} total", summary.passed, summary.failed, summary.total);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn discovers_cz_files_recursively() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "a.cz", "fn main() i32 { return 0; }");
        write_file(dir.path(), "sub/b.cz", "fn main() i32 { return 0; }");
        write_file(dir.path(), "notes.txt", "ignore me");
        let runner = TestRunner::new(false);
        let files = runner.discover_test_files(dir.path());
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn well_typed_file_passes() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "ok.cz", "fn main() i32 { return 0; }");
        let runner = TestRunner::new(false);
        let result = runner.check_file(&path);
        assert!(result.passed(), "{:?}", result.diagnostics);
    }

    #[test]
    fn malformed_file_fails_with_diagnostics() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(dir.path(), "bad.cz", "fn main() i32 { return \"not a number\"; }");
        let runner = TestRunner::new(false);
        let result = runner.check_file(&path);
        assert!(!result.passed());
        assert!(!result.diagnostics.is_empty());
    }

    #[test]
    fn summary_counts_match_file_outcomes() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "ok.cz", "fn main() i32 { return 0; }");
        write_file(dir.path(), "bad.cz", "fn main() i32 { return \"nope\"; }");
        let runner = TestRunner::new(false);
        let summary = runner.run(dir.path());
        assert_eq!(summary.total, 2);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failed, 1);
    }
}
