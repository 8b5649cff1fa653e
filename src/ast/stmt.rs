use std::cell::RefCell;

use crate::ast::expr::{Expr, Span};
use crate::ast::symbol::SymbolRef;
use crate::ast::ty::TypeExpr;

#[derive(Debug, Clone)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    VarDecl {
        name: String,
        declared_type: Option<TypeExpr>,
        value: Expr,
        span: Span,
        decl: RefCell<Option<SymbolRef>>,
    },
    Assign {
        name: String,
        value: Expr,
        span: Span,
        binding: RefCell<Option<SymbolRef>>,
    },
    ArrayAssign {
        target: Expr,
        index: Expr,
        value: Expr,
        span: Span,
    },
    While {
        cond: Expr,
        body: Block,
        span: Span,
    },
    For {
        init: Box<Stmt>,
        cond: Expr,
        step: Box<Stmt>,
        body: Block,
        span: Span,
    },
    If {
        cond: Expr,
        then_block: Block,
        else_block: Option<Block>,
        span: Span,
    },
    Return {
        value: Option<Expr>,
        span: Span,
    },
    Expr(Expr),
    Block(Block),
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::VarDecl { span, .. }
            | Stmt::Assign { span, .. }
            | Stmt::ArrayAssign { span, .. }
            | Stmt::While { span, .. }
            | Stmt::For { span, .. }
            | Stmt::If { span, .. }
            | Stmt::Return { span, .. } => *span,
            Stmt::Expr(e) => e.span(),
            Stmt::Block(b) => b.span,
        }
    }
}
