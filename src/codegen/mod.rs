//! Bytecode emitter (spec.md §4.5): walks the resolved, type-checked AST
//! and emits one [`Chunk`] per function plus a shared constant pool.
pub mod error;

pub use error::{CodegenError, CodegenErrorKind};

use crate::ast::expr::{Expr, FunctionValue};
use crate::ast::op::BinaryOp;
use crate::ast::stmt::{Block, Stmt};
use crate::ast::symbol::SymbolKind;
use crate::bytecode::{Chunk, Constant, OpCode, Program};
use crate::diagnostics::Diagnostics;

pub type CodegenResult<T> = Result<T, CodegenError>;

struct FunctionFrame {
    func_index: u8,
    /// Running count of slots assigned so far, parameters included.
    local_count: u16,
    /// How many of those slots are parameters, already materialized on the
    /// eval stack by the caller before entry — `STACK_ALLOC` only needs to
    /// reserve the rest (body-declared locals).
    param_count: u16,
    alloc_patch_at: usize,
}

pub struct Codegen {
    program: Program,
    frames: Vec<FunctionFrame>,
}

impl Codegen {
    pub fn new() -> Self {
        Self {
            program: Program::default(),
            frames: vec![],
        }
    }

    pub fn compile_program(top_level: &[Stmt]) -> Result<Program, Diagnostics> {
        let mut gen = Self::new();
        gen.program.functions.push(Chunk::new());
        gen.frames.push(FunctionFrame { func_index: 0, local_count: 0, param_count: 0, alloc_patch_at: 0 });
        let alloc_at = gen.chunk_mut().emit_with_placeholder(OpCode::StackAlloc);
        gen.frames.last_mut().unwrap().alloc_patch_at = alloc_at;

        let mut diagnostics = Diagnostics::new();
        for stmt in top_level {
            if let Err(e) = gen.emit_stmt(stmt) {
                diagnostics.push(e.into());
                return Err(diagnostics);
            }
        }

        gen.patch_stack_alloc();

        if diagnostics.is_empty() {
            Ok(gen.program)
        } else {
            Err(diagnostics)
        }
    }

    fn chunk_mut(&mut self) -> &mut Chunk {
        let idx = self.frames.last().unwrap().func_index as usize;
        &mut self.program.functions[idx]
    }

    fn push_constant(&mut self, value: Constant, start: usize, end: usize) -> CodegenResult<u8> {
        if self.program.constants.len() >= 255 {
            return Err(CodegenError::constant_overflow(start, end));
        }
        self.program.constants.push(value);
        Ok((self.program.constants.len() - 1) as u8)
    }

    fn alloc_local(&mut self, start: usize, end: usize) -> CodegenResult<u8> {
        let frame = self.frames.last_mut().unwrap();
        if frame.local_count >= 255 {
            return Err(CodegenError::local_overflow(start, end));
        }
        let slot = frame.local_count as u8;
        frame.local_count += 1;
        Ok(slot)
    }

    fn alloc_param(&mut self, start: usize, end: usize) -> CodegenResult<u8> {
        let slot = self.alloc_local(start, end)?;
        self.frames.last_mut().unwrap().param_count += 1;
        Ok(slot)
    }

    /// Patches the function's leading `STACK_ALLOC` to reserve only the
    /// body-declared locals — parameter slots are already materialized on
    /// the eval stack by the caller before entry.
    fn patch_stack_alloc(&mut self) {
        let frame = self.frames.last().unwrap();
        let extra = (frame.local_count - frame.param_count) as u8;
        let patch_at = frame.alloc_patch_at;
        self.chunk_mut().patch_byte(patch_at, extra);
    }

    // --- statements -------------------------------------------------------

    fn emit_block(&mut self, block: &Block) -> CodegenResult<()> {
        for stmt in &block.stmts {
            self.emit_stmt(stmt)?;
        }
        Ok(())
    }

    fn emit_stmt(&mut self, stmt: &Stmt) -> CodegenResult<()> {
        match stmt {
            Stmt::VarDecl { value, span, decl, .. } => {
                let decl = decl.borrow().clone().expect("resolved before codegen");

                if let Expr::Function(func) = value {
                    let func_index = self.emit_function(func, span.0, span.1)?;
                    if decl.kind == SymbolKind::Function {
                        *decl.func_index.borrow_mut() = Some(func_index);
                    }
                    let k = self.push_constant(Constant::Func(func_index), span.0, span.1)?;
                    self.chunk_mut().emit_byte(OpCode::Constant, k);
                } else {
                    self.emit_expr(value)?;
                }

                let slot = self.alloc_local(span.0, span.1)?;
                *decl.slot.borrow_mut() = Some(slot);
                self.chunk_mut().emit_byte(OpCode::VarSet, slot);
                Ok(())
            }
            Stmt::Assign { value, binding, .. } => {
                self.emit_expr(value)?;
                let decl = binding.borrow().clone().expect("resolved before codegen");
                let slot = decl.slot.borrow().expect("assignable binding has a slot");
                self.chunk_mut().emit_byte(OpCode::VarSet, slot);
                Ok(())
            }
            Stmt::ArrayAssign { target, index, value, .. } => {
                self.emit_expr(value)?;
                self.emit_expr(index)?;
                self.emit_expr(target)?;
                self.chunk_mut().emit_op(OpCode::ArraySet);
                Ok(())
            }
            Stmt::While { cond, body, .. } => self.emit_while(cond, body),
            Stmt::For { init, cond, step, body, .. } => self.emit_for(init, cond, step, body),
            Stmt::If { cond, then_block, else_block, .. } => self.emit_if(cond, then_block, else_block.as_ref()),
            Stmt::Return { value, .. } => {
                let has_value = value.is_some();
                if let Some(value) = value {
                    self.emit_expr(value)?;
                }
                self.chunk_mut().emit_byte(OpCode::Return, has_value as u8);
                Ok(())
            }
            Stmt::Expr(expr) => self.emit_expr(expr),
            Stmt::Block(block) => self.emit_block(block),
        }
    }

    fn emit_if(&mut self, cond: &Expr, then_block: &Block, else_block: Option<&Block>) -> CodegenResult<()> {
        self.emit_expr(cond)?;
        let branch_at = self.chunk_mut().emit_with_placeholder(OpCode::BranchNeq);
        self.emit_block(then_block)?;

        if let Some(else_block) = else_block {
            let jump_at = self.chunk_mut().emit_with_placeholder(OpCode::Jump);
            self.patch_forward(branch_at);
            self.emit_block(else_block)?;
            self.patch_forward(jump_at);
        } else {
            self.patch_forward(branch_at);
        }
        Ok(())
    }

    fn emit_while(&mut self, cond: &Expr, body: &Block) -> CodegenResult<()> {
        let loop_start = self.chunk_mut().len();
        self.emit_expr(cond)?;
        let branch_at = self.chunk_mut().emit_with_placeholder(OpCode::BranchNeq);
        self.emit_block(body)?;
        self.emit_jump_back(loop_start);
        self.patch_forward(branch_at);
        Ok(())
    }

    fn emit_for(&mut self, init: &Stmt, cond: &Expr, step: &Stmt, body: &Block) -> CodegenResult<()> {
        self.emit_stmt(init)?;
        let loop_start = self.chunk_mut().len();
        self.emit_expr(cond)?;
        let branch_at = self.chunk_mut().emit_with_placeholder(OpCode::BranchNeq);
        self.emit_block(body)?;
        self.emit_stmt(step)?;
        self.emit_jump_back(loop_start);
        self.patch_forward(branch_at);
        Ok(())
    }

    /// Patches a forward `BRANCH_NEQ`/`JUMP` placeholder to land exactly at
    /// the current end of the chunk.
    fn patch_forward(&mut self, operand_at: usize) {
        let target = self.chunk_mut().len();
        let distance = (target - (operand_at + 1)) as u8;
        self.chunk_mut().patch_byte(operand_at, distance);
    }

    fn emit_jump_back(&mut self, loop_start: usize) {
        let after = self.chunk_mut().len() + 2;
        let distance = (after - loop_start) as u8;
        self.chunk_mut().emit_byte(OpCode::JumpBack, distance);
    }

    // --- expressions --------------------------------------------------------

    fn emit_expr(&mut self, expr: &Expr) -> CodegenResult<()> {
        match expr {
            Expr::Int { value, span } => {
                let k = self.push_constant(Constant::Int(*value), span.0, span.1)?;
                self.chunk_mut().emit_byte(OpCode::Constant, k);
            }
            Expr::Bool { value, span } => {
                let k = self.push_constant(Constant::Bool(*value), span.0, span.1)?;
                self.chunk_mut().emit_byte(OpCode::Constant, k);
            }
            Expr::Str { value, span } => {
                let k = self.push_constant(Constant::Str(value.clone()), span.0, span.1)?;
                self.chunk_mut().emit_byte(OpCode::Constant, k);
            }
            Expr::Ident { span, binding, .. } => {
                let decl = binding.borrow().clone().expect("resolved before codegen");
                if decl.kind == SymbolKind::Function {
                    let idx = decl.func_index.borrow().expect("function binding has an index");
                    let k = self.push_constant(Constant::Func(idx), span.0, span.1)?;
                    self.chunk_mut().emit_byte(OpCode::Constant, k);
                } else {
                    let slot = decl.slot.borrow().expect("variable binding has a slot");
                    self.chunk_mut().emit_byte(OpCode::VarGet, slot);
                }
            }
            Expr::Call { callee, args, span, .. } => {
                for arg in args {
                    self.emit_expr(arg)?;
                }
                self.emit_expr(callee)?;
                let argc = u8::try_from(args.len()).map_err(|_| CodegenError::local_overflow(span.0, span.1))?;
                self.chunk_mut().emit_byte(OpCode::Call, argc);
            }
            Expr::Index { target, index, .. } => {
                self.emit_expr(index)?;
                self.emit_expr(target)?;
                self.chunk_mut().emit_op(OpCode::ArrayGet);
            }
            Expr::Binary { op, lhs, rhs, .. } => self.emit_binary(*op, lhs, rhs)?,
            Expr::Function(func) => {
                let func_index = self.emit_function(func, func.span.0, func.span.1)?;
                let k = self.push_constant(Constant::Func(func_index), func.span.0, func.span.1)?;
                self.chunk_mut().emit_byte(OpCode::Constant, k);
            }
            Expr::BuiltinCall { builtin, args, .. } => {
                for arg in args {
                    self.emit_expr(arg)?;
                }
                self.chunk_mut().emit_byte(OpCode::CallBuiltin, builtin.index());
            }
            Expr::ArrayInit { items, span, .. } => {
                for item in items.iter().rev() {
                    self.emit_expr(item)?;
                }
                let n = u8::try_from(items.len()).map_err(|_| CodegenError::local_overflow(span.0, span.1))?;
                self.chunk_mut().emit_byte(OpCode::ArrayInit, n);
            }
        }
        Ok(())
    }

    fn emit_binary(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> CodegenResult<()> {
        if op == BinaryOp::NotEqual {
            self.emit_expr(lhs)?;
            self.emit_expr(rhs)?;
            self.chunk_mut().emit_op(OpCode::Equal);
            self.chunk_mut().emit_op(OpCode::Negate);
            return Ok(());
        }

        self.emit_expr(lhs)?;
        self.emit_expr(rhs)?;
        let opcode = match op {
            BinaryOp::Add => OpCode::Add,
            BinaryOp::Sub => OpCode::Sub,
            BinaryOp::Mul => OpCode::Mul,
            BinaryOp::Div => OpCode::Div,
            BinaryOp::Mod => OpCode::Mod,
            BinaryOp::Less => OpCode::Less,
            BinaryOp::LessEq => OpCode::LessEq,
            BinaryOp::Greater => OpCode::Greater,
            BinaryOp::GreaterEq => OpCode::GreaterEq,
            BinaryOp::Equal => OpCode::Equal,
            BinaryOp::And => OpCode::And,
            BinaryOp::Or => OpCode::Or,
            BinaryOp::NotEqual => unreachable!("handled above"),
        };
        self.chunk_mut().emit_op(opcode);
        Ok(())
    }

    /// Compiles a function value into its own chunk and returns its index
    /// in the program's function table.
    fn emit_function(&mut self, func: &FunctionValue, start: usize, end: usize) -> CodegenResult<u8> {
        let func_index = u8::try_from(self.program.functions.len())
            .map_err(|_| CodegenError::local_overflow(start, end))?;
        self.program.functions.push(Chunk::new());
        *func.func_index.borrow_mut() = Some(func_index);

        self.frames.push(FunctionFrame { func_index, local_count: 0, param_count: 0, alloc_patch_at: 0 });
        let alloc_at = self.chunk_mut().emit_with_placeholder(OpCode::StackAlloc);
        self.frames.last_mut().unwrap().alloc_patch_at = alloc_at;

        if func.has_self_param() {
            if let Some(decl) = func.params[0].decl.borrow().as_ref() {
                *decl.func_index.borrow_mut() = Some(func_index);
            }
        }
        for param in func.real_params() {
            let decl = param.decl.borrow().clone().expect("resolved before codegen");
            let slot = self.alloc_param(param.span.0, param.span.1)?;
            *decl.slot.borrow_mut() = Some(slot);
        }

        for stmt in &func.body.stmts {
            self.emit_stmt(stmt)?;
        }

        self.patch_stack_alloc();
        self.frames.pop();

        Ok(func_index)
    }
}

impl Default for Codegen {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::Parser;
    use crate::resolve::Resolver;
    use crate::typecheck::TypeChecker;

    fn compile(source: &str) -> Program {
        let tokens = Lexer::tokenize(source).unwrap();
        let stmts = Parser::parse_program(source, tokens).unwrap();
        Resolver::resolve_program(&stmts).unwrap();
        TypeChecker::check_program(&stmts).unwrap();
        Codegen::compile_program(&stmts).unwrap()
    }

    #[test]
    fn constant_pushes_produce_constant_opcodes() {
        let program = compile("print(1);");
        assert!(program.functions[0].code.contains(&(OpCode::Constant as u8)));
    }

    #[test]
    fn branch_targets_stay_inside_the_emitting_function() {
        let program = compile("if true { print(1); } else { print(2); }");
        let chunk = &program.functions[0];
        let mut pc = 2; // skip the STACK_ALLOC opcode+operand
        while pc < chunk.len() {
            let op = OpCode::from_byte(chunk.code[pc]).unwrap();
            if matches!(op, OpCode::BranchNeq | OpCode::Jump) {
                let operand_at = pc + 1;
                let target = operand_at + 1 + chunk.code[operand_at] as usize;
                assert!(target <= chunk.len());
            }
            pc += if op.has_operand() { 2 } else { 1 };
        }
    }

    #[test]
    fn recursive_function_compiles_without_error() {
        compile("var fact: fn(int) -> int = fn(n: int) -> int { if n == 0 { return 1; } return n * fact(n - 1); };");
    }
}
