//! Symbol resolution (spec.md §4.3): binds every name reference to a
//! [`SymbolDecl`], enforcing block-scoped shadowing and maintaining the
//! global function namespace.
pub mod error;

pub use error::{ResolveError, ResolveErrorKind};

use std::collections::HashMap;

use crate::ast::expr::{Expr, FunctionValue};
use crate::ast::stmt::{Block, Stmt};
use crate::ast::symbol::{SymbolDecl, SymbolKind, SymbolRef};
use crate::diagnostics::Diagnostics;

pub type ResolveResult<T> = Result<T, ResolveError>;

/// One lexical block's bindings, in declaration order.
type Frame = Vec<(String, SymbolRef)>;

/// Per-function stack of block frames — the inner stack of spec.md §4.3's
/// "stack of stacks". Functions never see another function's frames: there
/// are no closures in this core (spec.md §9).
struct FunctionScope {
    frames: Vec<Frame>,
}

impl FunctionScope {
    fn new() -> Self {
        Self { frames: vec![Frame::new()] }
    }

    fn find(&self, name: &str) -> Option<SymbolRef> {
        for frame in self.frames.iter().rev() {
            if let Some((_, decl)) = frame.iter().find(|(n, _)| n == name) {
                return Some(decl.clone());
            }
        }
        None
    }

    fn contains(&self, name: &str) -> bool {
        self.frames.iter().any(|f| f.iter().any(|(n, _)| n == name))
    }

    fn bind(&mut self, name: String, decl: SymbolRef) {
        self.frames.last_mut().expect("function scope always has a frame").push((name, decl));
    }
}

pub struct Resolver {
    globals: HashMap<String, SymbolRef>,
    functions: Vec<FunctionScope>,
    diagnostics: Diagnostics,
}

impl Resolver {
    pub fn new() -> Self {
        Self {
            globals: HashMap::new(),
            functions: vec![FunctionScope::new()],
            diagnostics: Diagnostics::new(),
        }
    }

    /// Resolves a whole program (the top-level block is function 0's body).
    pub fn resolve_program(top_level: &[Stmt]) -> Result<(), Diagnostics> {
        let mut resolver = Self::new();
        for stmt in top_level {
            if let Err(e) = resolver.resolve_stmt(stmt) {
                resolver.diagnostics.push(e.into());
                return Err(resolver.diagnostics);
            }
        }
        if resolver.diagnostics.is_empty() {
            Ok(())
        } else {
            Err(resolver.diagnostics)
        }
    }

    fn current(&mut self) -> &mut FunctionScope {
        self.functions.last_mut().expect("at least one function scope")
    }

    fn is_bound_anywhere(&self, name: &str) -> bool {
        self.globals.contains_key(name) || self.functions.last().unwrap().contains(name)
    }

    fn declare(&mut self, name: &str, kind: SymbolKind, start: usize, end: usize) -> ResolveResult<SymbolRef> {
        if self.is_bound_anywhere(name) {
            return Err(ResolveError::shadowing(name, start, end));
        }
        let decl = SymbolDecl::new(name, kind);
        self.current().bind(name.to_string(), decl.clone());
        Ok(decl)
    }

    fn declare_global_function(&mut self, name: &str, start: usize, end: usize) -> ResolveResult<SymbolRef> {
        if self.is_bound_anywhere(name) {
            return Err(ResolveError::shadowing(name, start, end));
        }
        let decl = SymbolDecl::new(name, SymbolKind::Function);
        self.globals.insert(name.to_string(), decl.clone());
        self.current().bind(name.to_string(), decl.clone());
        Ok(decl)
    }

    fn lookup(&self, name: &str, start: usize, end: usize) -> ResolveResult<SymbolRef> {
        if let Some(decl) = self.globals.get(name) {
            return Ok(decl.clone());
        }
        if let Some(decl) = self.functions.last().unwrap().find(name) {
            return Ok(decl);
        }
        Err(ResolveError::not_found(name, start, end))
    }

    fn enter_block(&mut self) {
        self.current().frames.push(Frame::new());
    }

    fn exit_block(&mut self) {
        self.current().frames.pop();
    }

    // --- statements ---------------------------------------------------------

    fn resolve_block(&mut self, block: &Block) -> ResolveResult<()> {
        self.enter_block();
        for stmt in &block.stmts {
            self.resolve_stmt(stmt)?;
        }
        self.exit_block();
        Ok(())
    }

    fn resolve_stmt(&mut self, stmt: &Stmt) -> ResolveResult<()> {
        match stmt {
            Stmt::VarDecl { name, value, span, decl, .. } => {
                self.resolve_expr(value)?;
                let is_top_level_function = self.functions.len() == 1 && matches!(value, Expr::Function(_));
                let bound = if is_top_level_function {
                    self.declare_global_function(name, span.0, span.1)?
                } else {
                    self.declare(name, SymbolKind::Variable, span.0, span.1)?
                };
                *decl.borrow_mut() = Some(bound);
                Ok(())
            }
            Stmt::Assign { name, value, span, binding } => {
                self.resolve_expr(value)?;
                let bound = self.lookup(name, span.0, span.1)?;
                *binding.borrow_mut() = Some(bound);
                Ok(())
            }
            Stmt::ArrayAssign { target, index, value, .. } => {
                self.resolve_expr(target)?;
                self.resolve_expr(index)?;
                self.resolve_expr(value)?;
                Ok(())
            }
            Stmt::While { cond, body, .. } => {
                self.resolve_expr(cond)?;
                self.resolve_block(body)
            }
            Stmt::For { init, cond, step, body, .. } => {
                self.enter_block();
                self.resolve_stmt(init)?;
                self.resolve_expr(cond)?;
                self.resolve_stmt(step)?;
                for stmt in &body.stmts {
                    self.resolve_stmt(stmt)?;
                }
                self.exit_block();
                Ok(())
            }
            Stmt::If { cond, then_block, else_block, .. } => {
                self.resolve_expr(cond)?;
                self.resolve_block(then_block)?;
                if let Some(else_block) = else_block {
                    self.resolve_block(else_block)?;
                }
                Ok(())
            }
            Stmt::Return { value, .. } => {
                if let Some(value) = value {
                    self.resolve_expr(value)?;
                }
                Ok(())
            }
            Stmt::Expr(expr) => self.resolve_expr(expr),
            Stmt::Block(block) => self.resolve_block(block),
        }
    }

    // --- expressions ----------------------------------------------------

    fn resolve_expr(&mut self, expr: &Expr) -> ResolveResult<()> {
        match expr {
            Expr::Int { .. } | Expr::Bool { .. } | Expr::Str { .. } => Ok(()),
            Expr::Ident { name, span, binding, .. } => {
                let bound = self.lookup(name, span.0, span.1)?;
                *binding.borrow_mut() = Some(bound);
                Ok(())
            }
            Expr::Call { callee, args, .. } => {
                self.resolve_expr(callee)?;
                for arg in args {
                    self.resolve_expr(arg)?;
                }
                Ok(())
            }
            Expr::Index { target, index, .. } => {
                self.resolve_expr(target)?;
                self.resolve_expr(index)
            }
            Expr::Binary { lhs, rhs, .. } => {
                self.resolve_expr(lhs)?;
                self.resolve_expr(rhs)
            }
            Expr::Function(func) => self.resolve_function(func),
            Expr::BuiltinCall { args, .. } => {
                for arg in args {
                    self.resolve_expr(arg)?;
                }
                Ok(())
            }
            Expr::ArrayInit { items, .. } => {
                for item in items {
                    self.resolve_expr(item)?;
                }
                Ok(())
            }
        }
    }

    fn resolve_function(&mut self, func: &FunctionValue) -> ResolveResult<()> {
        self.functions.push(FunctionScope::new());

        if func.has_self_param() {
            let self_param = &func.params[0];
            let decl = SymbolDecl::new("self", SymbolKind::Function);
            self.current().bind("self".to_string(), decl.clone());
            *self_param.decl.borrow_mut() = Some(decl);
        }

        for param in func.real_params() {
            let decl = self.declare(&param.name, SymbolKind::Parameter, param.span.0, param.span.1)?;
            *param.decl.borrow_mut() = Some(decl);
        }

        for stmt in &func.body.stmts {
            self.resolve_stmt(stmt)?;
        }

        self.functions.pop();
        Ok(())
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::Parser;

    fn resolve(source: &str) -> Result<(), Diagnostics> {
        let tokens = Lexer::tokenize(source).unwrap();
        let stmts = Parser::parse_program(source, tokens).unwrap();
        Resolver::resolve_program(&stmts)
    }

    #[test]
    fn resolves_simple_variable_use() {
        assert!(resolve("var x := 1; print(x);").is_ok());
    }

    #[test]
    fn unknown_name_is_symbol_not_found() {
        let err = resolve("print(y);").unwrap_err();
        assert!(matches!(
            err.first().unwrap().kind,
            crate::diagnostics::DiagnosticKind::SymbolNotFound
        ));
    }

    #[test]
    fn redeclaring_a_name_in_the_same_block_is_shadowing() {
        let err = resolve("var x := 1; var x := 2;").unwrap_err();
        assert!(matches!(
            err.first().unwrap().kind,
            crate::diagnostics::DiagnosticKind::SymbolShadowing
        ));
    }

    #[test]
    fn redeclaring_a_name_visible_from_an_enclosing_block_is_shadowing() {
        let err = resolve("var x := 1; if true { var x := 2; }").unwrap_err();
        assert!(matches!(
            err.first().unwrap().kind,
            crate::diagnostics::DiagnosticKind::SymbolShadowing
        ));
    }

    #[test]
    fn recursive_global_function_resolves_its_own_name() {
        assert!(resolve(
            "var fact: fn(int) -> int = fn(n: int) -> int { if n == 0 { return 1; } return n * fact(n - 1); };"
        )
        .is_ok());
    }

    #[test]
    fn self_param_binds_a_recursion_alias() {
        assert!(resolve("var f := fn(self: int, n: int) -> int { return self(n); };").is_ok());
    }

    #[test]
    fn block_scoped_binding_is_not_visible_after_the_block_exits() {
        let err = resolve("if true { var x := 1; } print(x);").unwrap_err();
        assert!(matches!(
            err.first().unwrap().kind,
            crate::diagnostics::DiagnosticKind::SymbolNotFound
        ));
    }
}
