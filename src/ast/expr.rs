use std::cell::RefCell;

use crate::ast::op::BinaryOp;
use crate::ast::stmt::Block;
use crate::ast::symbol::SymbolRef;
use crate::ast::ty::TypeExpr;
use crate::builtins::Builtin;
use crate::typecheck::types::Type;

pub type Span = (usize, usize);

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub declared_type: TypeExpr,
    pub span: Span,
    pub decl: RefCell<Option<SymbolRef>>,
}

/// A function value literal. Carries its syntactic signature until the
/// type pass resolves `resolved_type`, and its function-table index once
/// codegen has compiled its body — both filled in by later passes, per
/// spec.md §3's "Function-value nodes additionally store ... a
/// function-table index and resolved function Type".
#[derive(Debug, Clone)]
pub struct FunctionValue {
    pub params: Vec<Param>,
    pub return_type: TypeExpr,
    pub body: Block,
    pub span: Span,
    pub resolved_type: RefCell<Option<Type>>,
    pub func_index: RefCell<Option<u8>>,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Int {
        value: i64,
        span: Span,
    },
    Bool {
        value: bool,
        span: Span,
    },
    Str {
        value: String,
        span: Span,
    },
    /// A variable/function-name read. `binding` is filled by the symbol
    /// pass; `ty` is filled by the type pass.
    Ident {
        name: String,
        span: Span,
        binding: RefCell<Option<SymbolRef>>,
        ty: RefCell<Option<Type>>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        span: Span,
        ty: RefCell<Option<Type>>,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
        span: Span,
        ty: RefCell<Option<Type>>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        span: Span,
        ty: RefCell<Option<Type>>,
    },
    Function(Box<FunctionValue>),
    BuiltinCall {
        builtin: Builtin,
        args: Vec<Expr>,
        span: Span,
        ty: RefCell<Option<Type>>,
    },
    ArrayInit {
        items: Vec<Expr>,
        span: Span,
        ty: RefCell<Option<Type>>,
    },
}

impl FunctionValue {
    /// A function literal whose first parameter is named `self` binds an
    /// implicit, slot-free recursion alias instead of taking a real
    /// argument there (resolved specially in `crate::resolve`).
    pub fn has_self_param(&self) -> bool {
        self.params.first().map(|p| p.name == "self").unwrap_or(false)
    }

    pub fn real_params(&self) -> &[Param] {
        if self.has_self_param() {
            &self.params[1..]
        } else {
            &self.params[..]
        }
    }
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Int { span, .. }
            | Expr::Bool { span, .. }
            | Expr::Str { span, .. }
            | Expr::Ident { span, .. }
            | Expr::Call { span, .. }
            | Expr::Index { span, .. }
            | Expr::Binary { span, .. }
            | Expr::BuiltinCall { span, .. }
            | Expr::ArrayInit { span, .. } => *span,
            Expr::Function(f) => f.span,
        }
    }
}
