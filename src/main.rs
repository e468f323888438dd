//! Czar compiler CLI
//!
//! `cz` compiles `.cz` source to portable C11 and, for `build`/`run`, on to
//! a native binary via the host C compiler.

use clap::{Parser as ClapParser, Subcommand};
use std::path::PathBuf;
use std::process;

use czarc::{CompilerConfig, Diagnostics};

#[derive(ClapParser)]
#[command(name = "cz")]
#[command(about = "Czar compiler - translates .cz source to C11", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print one line per token: `KIND 'lexeme' at LINE:COL`
    Lexer { input: PathBuf },
    /// Print an indented textual rendering of the AST
    Parser { input: PathBuf },
    /// Write FILE.c next to the input
    Generator { input: PathBuf },
    /// Generate C, invoke the host C compiler, write the output binary
    Build {
        input: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Enable allocation/free instrumentation and an exit summary
        #[arg(long)]
        debug: bool,
        /// Keep the intermediate .c file instead of deleting it
        #[arg(long)]
        keep_c: bool,
    },
    /// Build then execute the binary; its exit code becomes ours
    Run {
        input: PathBuf,
        #[arg(long)]
        debug: bool,
        #[arg(long)]
        keep_c: bool,
    },
    /// Per-file syntax check across a directory tree
    Test {
        dir: PathBuf,
        #[arg(short, long)]
        verbose: bool,
    },
}

fn print_diagnostics(diags: &Diagnostics) {
    for d in diags.iter() {
        eprintln!("{d}");
    }
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Lexer { input } => {
            let mut diags = Diagnostics::new();
            match czarc::lex_file(&input, &mut diags) {
                Ok(tokens) => {
                    for t in &tokens {
                        println!("{} '{}' at {}:{}", t.kind_name(), t.lexeme, t.line, t.column);
                    }
                    print_diagnostics(&diags);
                    if diags.has_errors() {
                        process::exit(1);
                    }
                }
                Err(e) => {
                    eprintln!("Error: {e}");
                    process::exit(1);
                }
            }
        }
        Commands::Parser { input } => {
            let mut diags = Diagnostics::new();
            match czarc::parse_file(&input, &mut diags) {
                Ok(program) => {
                    println!("{program:#?}");
                    print_diagnostics(&diags);
                    if diags.has_errors() {
                        process::exit(1);
                    }
                }
                Err(e) => {
                    eprintln!("Error: {e}");
                    process::exit(1);
                }
            }
        }
        Commands::Generator { input } => {
            let mut diags = Diagnostics::new();
            let config = CompilerConfig::new();
            match czarc::compile_to_c(&input, &config, &mut diags) {
                Ok(c_source) => {
                    let c_path = input.with_extension("c");
                    if let Err(e) = std::fs::write(&c_path, c_source) {
                        eprintln!("Error: failed to write {}: {e}", c_path.display());
                        process::exit(1);
                    }
                    println!("Wrote {}", c_path.display());
                }
                Err(e) => {
                    print_diagnostics(&diags);
                    eprintln!("Error: {e}");
                    process::exit(1);
                }
            }
        }
        Commands::Build { input, output, debug, keep_c } => {
            let mut diags = Diagnostics::new();
            let config = CompilerConfig::new().with_debug(debug).with_keep_c(keep_c);
            let output_path = output.unwrap_or_else(|| PathBuf::from("a.out"));
            match czarc::compile_file(&input, &output_path, &config, &mut diags) {
                Ok(()) => {
                    println!("Compiled {} -> {}", input.display(), output_path.display());
                }
                Err(e) => {
                    print_diagnostics(&diags);
                    eprintln!("Error: {e}");
                    process::exit(1);
                }
            }
        }
        Commands::Run { input, debug, keep_c } => {
            let mut diags = Diagnostics::new();
            let config = CompilerConfig::new().with_debug(debug).with_keep_c(keep_c);
            match czarc::run_file(&input, &config, &mut diags) {
                Ok(code) => process::exit(code),
                Err(e) => {
                    print_diagnostics(&diags);
                    eprintln!("Error: {e}");
                    process::exit(1);
                }
            }
        }
        Commands::Test { dir, verbose } => {
            let summary = czarc::run_tests_in_dir(&dir, verbose);
            let runner = czarc::test_runner::TestRunner::new(verbose);
            runner.print_results(&summary);
            if summary.failed > 0 {
                process::exit(1);
            }
        }
    }
}
