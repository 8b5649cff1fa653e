//! Type checking (spec.md §4.4): infers, checks, and annotates every AST
//! node's type in place.
pub mod error;
pub mod types;

pub use error::TypeError;
pub use types::Type;

use crate::ast::expr::{Expr, FunctionValue};
use crate::ast::op::BinaryOp;
use crate::ast::stmt::{Block, Stmt};
use crate::ast::symbol::SymbolRef;
use crate::ast::ty::TypeExpr;
use crate::builtins::Builtin;
use crate::diagnostics::Diagnostics;

pub type TypeResult<T> = Result<T, TypeError>;

pub struct TypeChecker {
    return_type_stack: Vec<Type>,
}

impl TypeChecker {
    pub fn new() -> Self {
        Self { return_type_stack: vec![] }
    }

    pub fn check_program(top_level: &[Stmt]) -> Result<(), Diagnostics> {
        let mut checker = Self::new();
        checker.return_type_stack.push(Type::Void);
        let mut diagnostics = Diagnostics::new();
        for stmt in top_level {
            if let Err(e) = checker.check_stmt(stmt) {
                diagnostics.push(e.into());
                return Err(diagnostics);
            }
        }
        if diagnostics.is_empty() {
            Ok(())
        } else {
            Err(diagnostics)
        }
    }

    fn resolve_type_expr(&self, ty: &TypeExpr, start: usize, end: usize) -> TypeResult<Type> {
        match ty {
            TypeExpr::Named(name) => match name.as_str() {
                "int" => Ok(Type::Int),
                "bool" => Ok(Type::Bool),
                "string" => Ok(Type::String),
                "void" => Ok(Type::Void),
                other => Err(TypeError::unknown_type(other, start, end)),
            },
            TypeExpr::Array(inner) => Ok(Type::array_of(self.resolve_type_expr(inner, start, end)?)),
            TypeExpr::Function(params, ret) => {
                let mut resolved_params = vec![];
                for p in params {
                    resolved_params.push(self.resolve_type_expr(p, start, end)?);
                }
                let resolved_ret = self.resolve_type_expr(ret, start, end)?;
                Ok(Type::function(resolved_params, resolved_ret))
            }
        }
    }

    // --- statements -----------------------------------------------------

    fn check_block(&mut self, block: &Block) -> TypeResult<()> {
        for stmt in &block.stmts {
            self.check_stmt(stmt)?;
        }
        Ok(())
    }

    fn check_stmt(&mut self, stmt: &Stmt) -> TypeResult<()> {
        match stmt {
            Stmt::VarDecl { declared_type, value, span, decl, .. } => {
                let bound = decl.borrow().clone();

                if let Expr::Function(func) = value {
                    let func_ty = self.check_function_expr(func, bound.as_ref())?;
                    if let Some(declared_type) = declared_type {
                        let expected = self.resolve_type_expr(declared_type, span.0, span.1)?;
                        if expected != func_ty {
                            return Err(TypeError::mismatch(&expected, &func_ty, span.0, span.1));
                        }
                    }
                    if let Some(bound) = &bound {
                        bound.set_ty(func_ty);
                    }
                    return Ok(());
                }

                let value_ty = self.check_expr(value)?;
                let final_ty = if let Some(declared_type) = declared_type {
                    let expected = self.resolve_type_expr(declared_type, span.0, span.1)?;
                    if expected != value_ty && !is_empty_array_sentinel(&expected, &value_ty) {
                        return Err(TypeError::mismatch(&expected, &value_ty, span.0, span.1));
                    }
                    expected
                } else {
                    if value_ty.is_void() {
                        return Err(TypeError::void_variable(span.0, span.1));
                    }
                    value_ty
                };
                if let Some(bound) = &bound {
                    bound.set_ty(final_ty);
                }
                Ok(())
            }
            Stmt::Assign { value, span, binding, .. } => {
                let value_ty = self.check_expr(value)?;
                let bound = binding.borrow().clone().expect("resolved before typecheck");
                let expected = bound.ty().unwrap_or(Type::Void);
                if expected != value_ty && !is_empty_array_sentinel(&expected, &value_ty) {
                    return Err(TypeError::mismatch(&expected, &value_ty, span.0, span.1));
                }
                Ok(())
            }
            Stmt::ArrayAssign { target, index, value, span } => {
                let target_ty = self.check_expr(target)?;
                let Type::Array(elem) = &target_ty else {
                    return Err(TypeError::new("index assignment target is not an array", span.0, span.1));
                };
                let elem = (**elem).clone();
                let index_ty = self.check_expr(index)?;
                if index_ty != Type::Int {
                    return Err(TypeError::mismatch(&Type::Int, &index_ty, span.0, span.1));
                }
                let value_ty = self.check_expr(value)?;
                if !elem.is_void() && value_ty != elem {
                    return Err(TypeError::mismatch(&elem, &value_ty, span.0, span.1));
                }
                Ok(())
            }
            Stmt::While { cond, body, span } => {
                let cond_ty = self.check_expr(cond)?;
                if cond_ty != Type::Bool {
                    return Err(TypeError::mismatch(&Type::Bool, &cond_ty, span.0, span.1));
                }
                self.check_block(body)
            }
            Stmt::For { init, cond, step, body, span } => {
                self.check_stmt(init)?;
                let cond_ty = self.check_expr(cond)?;
                if cond_ty != Type::Bool {
                    return Err(TypeError::mismatch(&Type::Bool, &cond_ty, span.0, span.1));
                }
                self.check_stmt(step)?;
                self.check_block(body)
            }
            Stmt::If { cond, then_block, else_block, span } => {
                let cond_ty = self.check_expr(cond)?;
                if cond_ty != Type::Bool {
                    return Err(TypeError::mismatch(&Type::Bool, &cond_ty, span.0, span.1));
                }
                self.check_block(then_block)?;
                if let Some(else_block) = else_block {
                    self.check_block(else_block)?;
                }
                Ok(())
            }
            Stmt::Return { value, span } => {
                let actual = match value {
                    Some(expr) => self.check_expr(expr)?,
                    None => Type::Void,
                };
                let expected = self.return_type_stack.last().cloned().unwrap_or(Type::Void);
                if actual != expected {
                    return Err(TypeError::mismatch(&expected, &actual, span.0, span.1));
                }
                Ok(())
            }
            Stmt::Expr(expr) => self.check_expr(expr).map(|_| ()),
            Stmt::Block(block) => self.check_block(block),
        }
    }

    // --- expressions ------------------------------------------------------

    fn check_expr(&mut self, expr: &Expr) -> TypeResult<Type> {
        let ty = match expr {
            Expr::Int { .. } => Type::Int,
            Expr::Bool { .. } => Type::Bool,
            Expr::Str { .. } => Type::String,
            Expr::Ident { span, binding, .. } => {
                let bound = binding.borrow().clone().expect("resolved before typecheck");
                bound.ty().ok_or_else(|| TypeError::new("use of a not-yet-typed binding", span.0, span.1))?
            }
            Expr::Call { callee, args, span, .. } => {
                let callee_ty = self.check_expr(callee)?;
                let Type::Function(params, ret) = &callee_ty else {
                    return Err(TypeError::new("callee is not callable", span.0, span.1));
                };
                if params.len() != args.len() {
                    return Err(TypeError::new(
                        format!("expected {} argument(s), found {}", params.len(), args.len()),
                        span.0,
                        span.1,
                    ));
                }
                let params = params.clone();
                let ret = (*ret).clone();
                for (arg, expected) in args.iter().zip(params.iter()) {
                    let arg_ty = self.check_expr(arg)?;
                    if arg_ty != *expected {
                        return Err(TypeError::mismatch(expected, &arg_ty, span.0, span.1));
                    }
                }
                ret
            }
            Expr::Index { target, index, span, .. } => {
                let target_ty = self.check_expr(target)?;
                let Type::Array(elem) = &target_ty else {
                    return Err(TypeError::new("indexed value is not an array", span.0, span.1));
                };
                let elem = (**elem).clone();
                let index_ty = self.check_expr(index)?;
                if index_ty != Type::Int {
                    return Err(TypeError::mismatch(&Type::Int, &index_ty, span.0, span.1));
                }
                elem
            }
            Expr::Binary { op, lhs, rhs, span, .. } => self.check_binary(*op, lhs, rhs, span.0, span.1)?,
            Expr::Function(func) => self.check_function_expr(func, None)?,
            Expr::BuiltinCall { builtin, args, span, .. } => self.check_builtin_call(*builtin, args, span.0, span.1)?,
            Expr::ArrayInit { items, span, .. } => {
                if items.is_empty() {
                    Type::array_of(Type::Void)
                } else {
                    let first = self.check_expr(&items[0])?;
                    for item in &items[1..] {
                        let item_ty = self.check_expr(item)?;
                        if item_ty != first {
                            return Err(TypeError::mismatch(&first, &item_ty, span.0, span.1));
                        }
                    }
                    Type::array_of(first)
                }
            }
        };

        if let Some(slot) = expr_ty_slot(expr) {
            *slot.borrow_mut() = Some(ty.clone());
        }
        Ok(ty)
    }

    fn check_binary(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr, start: usize, end: usize) -> TypeResult<Type> {
        let lhs_ty = self.check_expr(lhs)?;
        let rhs_ty = self.check_expr(rhs)?;

        if op.is_boolean() {
            if lhs_ty != Type::Bool || rhs_ty != Type::Bool {
                return Err(TypeError::new(format!("'{op}' requires 'bool' operands"), start, end));
            }
            return Ok(Type::Bool);
        }

        if op.is_equality() {
            if lhs_ty != rhs_ty {
                return Err(TypeError::mismatch(&lhs_ty, &rhs_ty, start, end));
            }
            return Ok(Type::Bool);
        }

        if op.is_comparison() {
            if lhs_ty != Type::Int || rhs_ty != Type::Int {
                return Err(TypeError::new(format!("'{op}' requires 'int' operands"), start, end));
            }
            return Ok(Type::Bool);
        }

        // arithmetic
        if lhs_ty != Type::Int || rhs_ty != Type::Int {
            return Err(TypeError::new(format!("'{op}' requires 'int' operands"), start, end));
        }
        Ok(Type::Int)
    }

    fn check_builtin_call(&mut self, builtin: Builtin, args: &[Expr], start: usize, end: usize) -> TypeResult<Type> {
        if args.len() != builtin.arity() {
            return Err(TypeError::new(
                format!("'{}' expects {} argument(s), found {}", builtin.name(), builtin.arity(), args.len()),
                start,
                end,
            ));
        }

        let mut arg_types = vec![];
        for arg in args {
            arg_types.push(self.check_expr(arg)?);
        }

        match builtin {
            Builtin::Print => Ok(Type::Void),
            Builtin::ToString => Ok(Type::String),
            Builtin::Length => match &arg_types[0] {
                Type::Array(_) | Type::String => Ok(Type::Int),
                other => Err(TypeError::new(format!("'length' does not accept '{other}'"), start, end)),
            },
            Builtin::Clone => Ok(arg_types[0].clone()),
            Builtin::Append => {
                let Type::Array(elem) = &arg_types[0] else {
                    return Err(TypeError::new("'append' expects an array as its first argument", start, end));
                };
                let elem = (**elem).clone();
                if !elem.is_void() && arg_types[1] != elem {
                    return Err(TypeError::mismatch(&elem, &arg_types[1], start, end));
                }
                Ok(Type::Void)
            }
            Builtin::Random => {
                if arg_types[0] != Type::Int || arg_types[1] != Type::Int {
                    return Err(TypeError::new("'random' expects two 'int' arguments", start, end));
                }
                Ok(Type::Int)
            }
        }
    }

    fn check_function_expr(&mut self, func: &FunctionValue, extra_decl: Option<&SymbolRef>) -> TypeResult<Type> {
        let mut param_types = vec![];
        for p in func.real_params() {
            param_types.push(self.resolve_type_expr(&p.declared_type, p.span.0, p.span.1)?);
        }
        let ret_type = self.resolve_type_expr(&func.return_type, func.span.0, func.span.1)?;
        let func_ty = Type::function(param_types.clone(), ret_type.clone());

        *func.resolved_type.borrow_mut() = Some(func_ty.clone());
        if let Some(decl) = extra_decl {
            decl.set_ty(func_ty.clone());
        }
        if func.has_self_param() {
            if let Some(decl) = func.params[0].decl.borrow().as_ref() {
                decl.set_ty(func_ty.clone());
            }
        }
        for (p, ty) in func.real_params().iter().zip(param_types.iter()) {
            if let Some(decl) = p.decl.borrow().as_ref() {
                decl.set_ty(ty.clone());
            }
        }

        self.return_type_stack.push(ret_type);
        let result = self.check_block(&func.body);
        self.return_type_stack.pop();
        result?;

        Ok(func_ty)
    }
}

impl Default for TypeChecker {
    fn default() -> Self {
        Self::new()
    }
}

/// An empty array literal types as `[void]` (spec.md §9's sentinel); it is
/// compatible with any declared array type at a `var` binding site.
fn is_empty_array_sentinel(expected: &Type, actual: &Type) -> bool {
    matches!((expected, actual), (Type::Array(_), Type::Array(elem)) if elem.is_void())
}

/// The `ty` cell an expression node annotates itself through, if any —
/// literals carry no cell since their type is constant.
fn expr_ty_slot(expr: &Expr) -> Option<&std::cell::RefCell<Option<Type>>> {
    match expr {
        Expr::Ident { ty, .. }
        | Expr::Call { ty, .. }
        | Expr::Index { ty, .. }
        | Expr::Binary { ty, .. }
        | Expr::BuiltinCall { ty, .. }
        | Expr::ArrayInit { ty, .. } => Some(ty),
        Expr::Int { .. } | Expr::Bool { .. } | Expr::Str { .. } | Expr::Function(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::Parser;
    use crate::resolve::Resolver;

    fn check(source: &str) -> Result<(), Diagnostics> {
        let tokens = Lexer::tokenize(source).unwrap();
        let stmts = Parser::parse_program(source, tokens).unwrap();
        Resolver::resolve_program(&stmts).unwrap();
        TypeChecker::check_program(&stmts)
    }

    #[test]
    fn arithmetic_requires_matching_int_operands() {
        assert!(check("print(1 + 2);").is_ok());
        let err = check("print(1 + true);").unwrap_err();
        assert!(matches!(
            err.first().unwrap().kind,
            crate::diagnostics::DiagnosticKind::MismatchedTypes
        ));
    }

    #[test]
    fn var_decl_initializer_must_match_annotation() {
        let err = check("var x: int = true;").unwrap_err();
        assert!(matches!(
            err.first().unwrap().kind,
            crate::diagnostics::DiagnosticKind::MismatchedTypes
        ));
    }

    #[test]
    fn recursive_function_type_checks_its_own_call() {
        assert!(check(
            "var fact: fn(int) -> int = fn(n: int) -> int { if n == 0 { return 1; } return n * fact(n - 1); };"
        )
        .is_ok());
    }

    #[test]
    fn array_index_and_length_type_check() {
        assert!(check("var a: [int] = [1, 2, 3]; print(a[0]); print(length(a));").is_ok());
    }

    #[test]
    fn empty_array_elements_accept_append_of_any_type() {
        assert!(check("var a: [int] = []; append(a, 1);").is_ok());
    }
}
