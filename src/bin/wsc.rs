//! # Wsc
//!
//! This binary is the compiler and VM driver for stackscript. It reads a
//! source file, runs it through every compiler pass, and executes the
//! resulting bytecode.
extern crate stackscript;

use std::{fs, process::ExitCode};

use clap::{Parser, ValueEnum};
use log::error;
use stackscript::config::{CompileOptions, VmOptions};

/// Struct containing the CLI configuration for Wsc.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// The path to the stackscript source file.
    #[arg(index = 1)]
    pub file: std::path::PathBuf,

    /// Specify the log level of the compiler.
    #[arg(value_enum, short, long, default_value_t = LogLevel::default())]
    pub verbosity: LogLevel,

    /// Whether to dump the parsed AST (for debugging).
    #[arg(long)]
    pub dump_ast: bool,

    /// Whether to dump the emitted bytecode (for debugging).
    #[arg(long)]
    pub dump_bytecode: bool,
}

/// Enum for specifying the log level of Wsc.
#[derive(ValueEnum, Clone, Default, Debug)]
pub enum LogLevel {
    #[default]
    #[value(alias("0"))]
    Error,
    #[value(alias("1"))]
    Warn,
    #[value(alias("2"))]
    Info,
    #[value(alias("3"))]
    Debug,
    #[value(alias("4"))]
    Trace,
}

impl From<&LogLevel> for log::Level {
    fn from(value: &LogLevel) -> Self {
        match value {
            LogLevel::Error => log::Level::Error,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Info => log::Level::Info,
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Trace => log::Level::Trace,
        }
    }
}

fn main() -> ExitCode {
    let args = Cli::parse();
    simple_logger::init_with_level((&args.verbosity).into()).unwrap();

    let source = match fs::read_to_string(&args.file) {
        Ok(source) => source,
        Err(err) => {
            error!("failed to read {}: {err}", args.file.display());
            return ExitCode::FAILURE;
        }
    };

    let compile_options = CompileOptions {
        dump_ast: args.dump_ast,
        dump_bytecode: args.dump_bytecode,
    };

    let program = match stackscript::compile(&source, &compile_options) {
        Ok(program) => program,
        Err(diagnostics) => {
            for diagnostic in diagnostics.iter() {
                eprintln!("{}", diagnostic.render(&source));
            }
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = stackscript::run(program, &VmOptions::default()) {
        error!("{err}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
