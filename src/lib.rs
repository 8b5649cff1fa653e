//! stackscript: lexer, parser, symbol resolution, type checker, bytecode
//! emitter and stack-based VM (spec.md §2).
pub mod ast;
pub mod builtins;
pub mod bytecode;
pub mod codegen;
pub mod config;
pub mod diagnostics;
pub mod lexer;
pub mod parser;
pub mod resolve;
pub mod typecheck;
pub mod vm;

use bytecode::Program;
use config::{CompileOptions, VmOptions};
use diagnostics::Diagnostics;
use lexer::Lexer;
use parser::Parser;
use vm::{RuntimeError, Vm};

/// Runs every pass in order, returning the first pass's collected
/// diagnostics on failure (spec.md §6's `compile` entry point).
pub fn compile(source: &str, options: &CompileOptions) -> Result<Program, Diagnostics> {
    let tokens = Lexer::tokenize(source).map_err(|e| {
        let mut diagnostics = Diagnostics::new();
        diagnostics.push(e.into());
        diagnostics
    })?;

    let top_level = Parser::parse_program(source, tokens).map_err(|e| {
        let mut diagnostics = Diagnostics::new();
        diagnostics.push(e.into());
        diagnostics
    })?;

    if options.dump_ast {
        log::debug!("{:#?}", top_level);
    }

    resolve::Resolver::resolve_program(&top_level)?;
    typecheck::TypeChecker::check_program(&top_level)?;
    let program = codegen::Codegen::compile_program(&top_level)?;

    if options.dump_bytecode {
        for (index, chunk) in program.functions.iter().enumerate() {
            log::debug!("function {index}: {:?}", chunk.code);
        }
    }

    Ok(program)
}

/// Executes a compiled program to completion (spec.md §6's `run` entry
/// point).
pub fn run(program: Program, options: &VmOptions) -> Result<(), RuntimeError> {
    let mut vm = Vm::new(program, options.clone());
    vm.run()
}

/// Like [`run`], but `print` output goes to `writer` instead of stdout —
/// used by tests that assert on observable output.
pub fn run_with_writer(
    program: Program,
    options: &VmOptions,
    writer: Box<dyn std::io::Write>,
) -> Result<(), RuntimeError> {
    let mut vm = Vm::with_writer(program, options.clone(), writer);
    vm.run()
}
