//! Wisp CLI: run a `.wisp` file, or with no file, drop into a line-editing
//! REPL.

mod config;

use std::path::PathBuf;
use std::process;

use clap::Parser;
use config::WispConfig;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use wisp_runtime::{InterpretResult, Vm};

#[derive(Parser)]
#[command(name = "wisp")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "The Wisp scripting language: compiler and VM", long_about = None)]
struct Cli {
    /// Script to run. Omit to start an interactive REPL.
    path: Option<PathBuf>,

    /// Log every dispatched instruction via `tracing::trace!`.
    #[arg(long)]
    trace: bool,

    /// Reserved for future semantic strictness checks; currently a no-op.
    #[arg(long)]
    strict: bool,

    /// Path to a wisp.toml configuration file (defaults to ./wisp.toml if present).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase logging verbosity; repeat for more (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let cli = Cli::parse();

    let config = match WispConfig::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{e}");
            process::exit(65);
        }
    };

    init_logging(&config, cli.verbose);

    let mut vm = Vm::new();
    vm.set_trace(cli.trace);

    let code = match cli.path {
        Some(path) => run_file(&mut vm, &path),
        None => {
            run_repl(&mut vm, &config);
            0
        }
    };
    process::exit(code);
}

fn init_logging(config: &WispConfig, verbose: u8) {
    let level = match verbose {
        0 => config.logging.default_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_file(vm: &mut Vm, path: &std::path::Path) -> i32 {
    let source = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Could not read file '{}': {e}", path.display());
            return 74;
        }
    };
    let filename = path.to_string_lossy().to_string();
    let result = vm.interpret_source(&source, &filename);
    report(&result);
    result.exit_code()
}

fn run_repl(vm: &mut Vm, config: &WispConfig) {
    let mut editor = DefaultEditor::new().expect("failed to initialize the line editor");
    let history_path = config.repl.resolved_history_path();
    let _ = editor.load_history(&history_path);

    loop {
        match editor.readline("wisp> ") {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(line.as_str());
                let result = vm.interpret_source(&line, "<repl>");
                // The REPL reports errors but never exits the process.
                report(&result);
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("Readline error: {e}");
                break;
            }
        }
    }
    let _ = editor.save_history(&history_path);
}

fn report(result: &InterpretResult) {
    match result {
        InterpretResult::Ok => {}
        InterpretResult::CompileError(errors) => {
            for e in errors {
                eprintln!("{e}");
            }
        }
        InterpretResult::RuntimeError(e) => {
            eprintln!("{e}");
        }
    }
}
