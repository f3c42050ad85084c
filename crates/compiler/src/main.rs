//! GoxLang CLI
//!
//! Command-line interface for running `.gox` programs.

use clap::{CommandFactory, Parser as ClapParser, Subcommand};
use clap_complete::{Shell, generate};
use goxc::CompilerConfig;
use goxlang_vm::Vm;
use std::io;
use std::path::{Path, PathBuf};
use std::process;

#[derive(ClapParser)]
#[command(name = "goxc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "GoxLang compiler and virtual machine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile and run a .gox source file
    Run {
        /// Input .gox source file
        input: PathBuf,

        /// Starting size of the VM's linear memory, in cells
        #[arg(long)]
        memory_cells: Option<usize>,

        /// Print the checked AST to stderr before running
        #[arg(long)]
        dump_ast: bool,

        /// Print the lowered IR module to stderr before running
        #[arg(long)]
        dump_ir: bool,

        /// Path to a TOML configuration file (overridden by the flags above)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { input, memory_cells, dump_ast, dump_ir, config } => {
            run_file(&input, memory_cells, dump_ast, dump_ir, config.as_deref());
        }
        Commands::Completions { shell } => run_completions(shell),
    }
}

fn run_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "goxc", &mut io::stdout());
}

fn load_config(path: Option<&Path>) -> CompilerConfig {
    match path {
        None => CompilerConfig::default(),
        Some(path) => {
            let text = match std::fs::read_to_string(path) {
                Ok(text) => text,
                Err(e) => {
                    eprintln!("Error: failed to read config '{}': {e}", path.display());
                    process::exit(1);
                }
            };
            match CompilerConfig::from_toml(&text) {
                Ok(cfg) => cfg,
                Err(e) => {
                    eprintln!("Error: {e}");
                    process::exit(1);
                }
            }
        }
    }
}

fn run_file(input: &Path, memory_cells: Option<usize>, dump_ast: bool, dump_ir: bool, config_path: Option<&Path>) {
    let mut config = load_config(config_path);
    if let Some(cells) = memory_cells {
        config = config.with_memory_cells(cells);
    }
    let dump_ast = dump_ast || config.dump_ast;
    let dump_ir = dump_ir || config.dump_ir;
    config = config.with_dump_ast(dump_ast).with_dump_ir(dump_ir);

    let (program, module) = match goxc::compile_file(input) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    };

    if config.dump_ast {
        eprintln!("{program:#?}");
    }
    if config.dump_ir {
        eprintln!("{}", module.dump());
    }

    let stdout = io::stdout();
    let mut vm = match Vm::new(&module, config.memory_cells, stdout.lock()) {
        Ok(vm) => vm,
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    };

    if let Err(e) = vm.run() {
        eprintln!("{e}");
        process::exit(1);
    }
}
