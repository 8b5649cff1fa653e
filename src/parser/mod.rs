//! Recursive-descent statement parser with Pratt-style expression climbing.
//!
//! Statement forms, the type grammar, and the expression precedence table
//! are all as specified in spec.md §4.2. There is no error recovery: the
//! first parse error aborts the current production (spec.md §4.2/§7).
pub mod error;

pub use error::{ParseError, ParseErrorKind};

use std::cell::RefCell;

use crate::ast::expr::{Expr, FunctionValue, Param};
use crate::ast::op::BinaryOp;
use crate::ast::stmt::{Block, Stmt};
use crate::ast::ty::TypeExpr;
use crate::builtins::Builtin;
use crate::lexer::{Token, TokenKind};

pub type ParseResult<T> = Result<T, ParseError>;

pub struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str, tokens: Vec<Token>) -> Self {
        Self { source, tokens, pos: 0 }
    }

    pub fn parse_program(source: &'a str, tokens: Vec<Token>) -> ParseResult<Vec<Stmt>> {
        let mut parser = Self::new(source, tokens);
        let mut stmts = vec![];
        while parser.peek().is_some() {
            stmts.push(parser.parse_statement()?);
        }
        Ok(stmts)
    }

    // --- token stream helpers -------------------------------------------------

    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|t| t.kind)
    }

    fn peek2_kind(&self) -> Option<TokenKind> {
        self.tokens.get(self.pos + 1).map(|t| t.kind)
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.peek()?;
        self.pos += 1;
        Some(tok)
    }

    fn lexeme(&self, token: Token) -> &'a str {
        token.lexeme(self.source)
    }

    fn last_end(&self) -> usize {
        self.tokens
            .get(self.pos.saturating_sub(1))
            .map(|t| t.end)
            .unwrap_or(self.source.len())
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> ParseResult<Token> {
        match self.peek() {
            Some(tok) if tok.kind == kind => {
                self.pos += 1;
                Ok(tok)
            }
            Some(tok) => Err(ParseError::unexpected_token(what, tok.kind, tok.start, tok.end)),
            None => Err(ParseError::unexpected_end(what)),
        }
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek_kind() == Some(kind)
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    // --- statements -------------------------------------------------------

    fn parse_block(&mut self) -> ParseResult<Block> {
        let open = self.expect(TokenKind::LBrace, "'{'")?;
        let mut stmts = vec![];
        loop {
            if self.eat(TokenKind::RBrace) {
                return Ok(Block {
                    stmts,
                    span: (open.start, self.last_end()),
                });
            }
            if self.peek().is_none() {
                return Err(ParseError::unterminated_block(open.start, self.source.len()));
            }
            stmts.push(self.parse_statement()?);
        }
    }

    fn parse_statement(&mut self) -> ParseResult<Stmt> {
        match self.peek_kind() {
            Some(TokenKind::Var) => self.parse_var_decl(),
            Some(TokenKind::If) => self.parse_if(),
            Some(TokenKind::While) => self.parse_while(),
            Some(TokenKind::For) => self.parse_for(),
            Some(TokenKind::Return) => self.parse_return(),
            Some(TokenKind::LBrace) => Ok(Stmt::Block(self.parse_block()?)),
            _ => self.parse_expr_or_assignment_statement(),
        }
    }

    fn parse_var_decl(&mut self) -> ParseResult<Stmt> {
        let start_tok = self.expect(TokenKind::Var, "'var'")?;
        let name_tok = self.expect(TokenKind::Id, "a variable name")?;
        let name = self.lexeme(name_tok).to_string();

        let declared_type = if self.eat(TokenKind::ColonEq) {
            None
        } else {
            self.expect(TokenKind::Colon, "':' or ':='")?;
            let ty = self.parse_type()?;
            self.expect(TokenKind::Eq, "'='")?;
            Some(ty)
        };

        let value = self.parse_expression(0)?;
        self.expect(TokenKind::Semicolon, "';'")?;

        Ok(Stmt::VarDecl {
            name,
            declared_type,
            value,
            span: (start_tok.start, self.last_end()),
            decl: RefCell::new(None),
        })
    }

    fn parse_if(&mut self) -> ParseResult<Stmt> {
        let start_tok = self.expect(TokenKind::If, "'if'")?;
        let cond = self.parse_expression(0)?;
        let then_block = self.parse_block()?;
        let else_block = if self.eat(TokenKind::Else) {
            Some(self.parse_block()?)
        } else {
            None
        };

        Ok(Stmt::If {
            cond,
            then_block,
            else_block,
            span: (start_tok.start, self.last_end()),
        })
    }

    fn parse_while(&mut self) -> ParseResult<Stmt> {
        let start_tok = self.expect(TokenKind::While, "'while'")?;
        let cond = self.parse_expression(0)?;
        let body = self.parse_block()?;

        Ok(Stmt::While {
            cond,
            body,
            span: (start_tok.start, self.last_end()),
        })
    }

    fn parse_for(&mut self) -> ParseResult<Stmt> {
        let start_tok = self.expect(TokenKind::For, "'for'")?;
        self.expect(TokenKind::LParen, "'('")?;
        let init = self.parse_expr_or_assignment_statement()?;
        let cond = self.parse_expression(0)?;
        self.expect(TokenKind::Semicolon, "';'")?;
        let step = self.parse_expr_or_assignment_statement_no_semicolon()?;
        self.expect(TokenKind::RParen, "')'")?;
        let body = self.parse_block()?;

        Ok(Stmt::For {
            init: Box::new(init),
            cond,
            step: Box::new(step),
            body,
            span: (start_tok.start, self.last_end()),
        })
    }

    fn parse_return(&mut self) -> ParseResult<Stmt> {
        let start_tok = self.expect(TokenKind::Return, "'return'")?;
        let value = if self.check(TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression(0)?)
        };
        self.expect(TokenKind::Semicolon, "';'")?;

        Ok(Stmt::Return {
            value,
            span: (start_tok.start, self.last_end()),
        })
    }

    /// Parses `NAME = EXPR ;`, `EXPR[EXPR] = EXPR ;`, or a bare expression
    /// statement, consuming the trailing `;`.
    fn parse_expr_or_assignment_statement(&mut self) -> ParseResult<Stmt> {
        let stmt = self.parse_expr_or_assignment_statement_no_semicolon()?;
        self.expect(TokenKind::Semicolon, "';'")?;
        Ok(stmt)
    }

    fn parse_expr_or_assignment_statement_no_semicolon(&mut self) -> ParseResult<Stmt> {
        let start = self.peek().map(|t| t.start).unwrap_or(self.source.len());
        let expr = self.parse_expression(0)?;

        if self.eat(TokenKind::Eq) {
            let value = self.parse_expression(0)?;
            let span = (start, self.last_end());
            return Ok(match expr {
                Expr::Ident { name, .. } => Stmt::Assign {
                    name,
                    value,
                    span,
                    binding: RefCell::new(None),
                },
                Expr::Index { target, index, .. } => Stmt::ArrayAssign {
                    target: *target,
                    index: *index,
                    value,
                    span,
                },
                other => {
                    let (s, e) = other.span();
                    return Err(ParseError::unexpected_token(
                        "an assignable expression",
                        self.tokens[self.pos.saturating_sub(1)].kind,
                        s,
                        e,
                    ));
                }
            });
        }

        Ok(Stmt::Expr(expr))
    }

    // --- types --------------------------------------------------------------

    fn parse_type(&mut self) -> ParseResult<TypeExpr> {
        if self.eat(TokenKind::LBracket) {
            let inner = self.parse_type()?;
            self.expect(TokenKind::RBracket, "']'")?;
            return Ok(TypeExpr::Array(Box::new(inner)));
        }

        if self.eat(TokenKind::Fn) {
            self.expect(TokenKind::LParen, "'('")?;
            let mut params = vec![];
            if !self.check(TokenKind::RParen) {
                loop {
                    params.push(self.parse_type()?);
                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                }
            }
            self.expect(TokenKind::RParen, "')'")?;
            self.expect(TokenKind::Arrow, "'->'")?;
            let ret = self.parse_type()?;
            return Ok(TypeExpr::Function(params, Box::new(ret)));
        }

        let tok = self.expect(TokenKind::Id, "a type name")?;
        Ok(TypeExpr::Named(self.lexeme(tok).to_string()))
    }

    // --- expressions: Pratt precedence climbing -----------------------------

    fn infix_binding_power(kind: TokenKind) -> Option<(u8, u8, BinaryOp)> {
        use TokenKind::*;
        Some(match kind {
            Star => (12, 13, BinaryOp::Mul),
            Slash => (12, 13, BinaryOp::Div),
            Percent => (12, 13, BinaryOp::Mod),
            Plus => (10, 11, BinaryOp::Add),
            Minus => (10, 11, BinaryOp::Sub),
            Less => (7, 8, BinaryOp::Less),
            LessEq => (7, 8, BinaryOp::LessEq),
            Greater => (7, 8, BinaryOp::Greater),
            GreaterEq => (7, 8, BinaryOp::GreaterEq),
            EqEq => (5, 6, BinaryOp::Equal),
            BangEq => (5, 6, BinaryOp::NotEqual),
            TokenKind::And => (2, 3, BinaryOp::And),
            TokenKind::Or => (2, 3, BinaryOp::Or),
            _ => return None,
        })
    }

    fn parse_expression(&mut self, min_bp: u8) -> ParseResult<Expr> {
        let mut lhs = self.parse_postfix()?;

        while let Some(kind) = self.peek_kind() {
            let Some((left_bp, right_bp, op)) = Self::infix_binding_power(kind) else {
                break;
            };
            if left_bp < min_bp {
                break;
            }
            self.pos += 1;
            let rhs = self.parse_expression(right_bp)?;
            let span = (lhs.span().0, rhs.span().1);
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
                ty: RefCell::new(None),
            };
        }

        Ok(lhs)
    }

    /// Primary expression followed by any number of postfix `(...)` calls
    /// or `[...]` indexing operations (precedence 20, spec.md §4.2).
    fn parse_postfix(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_primary()?;

        loop {
            match self.peek_kind() {
                Some(TokenKind::LParen) => {
                    self.pos += 1;
                    let mut args = vec![];
                    if !self.check(TokenKind::RParen) {
                        loop {
                            args.push(self.parse_expression(0)?);
                            if !self.eat(TokenKind::Comma) {
                                break;
                            }
                        }
                    }
                    self.expect(TokenKind::RParen, "')'")?;
                    let span = (expr.span().0, self.last_end());
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                        span,
                        ty: RefCell::new(None),
                    };
                }
                Some(TokenKind::LBracket) => {
                    self.pos += 1;
                    let index = self.parse_expression(0)?;
                    self.expect(TokenKind::RBracket, "']'")?;
                    let span = (expr.span().0, self.last_end());
                    expr = Expr::Index {
                        target: Box::new(expr),
                        index: Box::new(index),
                        span,
                        ty: RefCell::new(None),
                    };
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        let Some(tok) = self.peek() else {
            return Err(ParseError::unexpected_end("an expression"));
        };

        match tok.kind {
            TokenKind::Int => {
                self.pos += 1;
                let text = self.lexeme(tok);
                // Overflowing literals clamp to zero rather than failing
                // the parse (spec.md §4.2's documented, UB-adjacent
                // behavior — see DESIGN.md Open Question decisions).
                let value = text.parse::<i64>().unwrap_or(0);
                Ok(Expr::Int { value, span: (tok.start, tok.end) })
            }
            TokenKind::True => {
                self.pos += 1;
                Ok(Expr::Bool { value: true, span: (tok.start, tok.end) })
            }
            TokenKind::False => {
                self.pos += 1;
                Ok(Expr::Bool { value: false, span: (tok.start, tok.end) })
            }
            TokenKind::Str => {
                self.pos += 1;
                let raw = self.lexeme(tok);
                let value = raw[1..raw.len() - 1].to_string();
                Ok(Expr::Str { value, span: (tok.start, tok.end) })
            }
            TokenKind::LParen => {
                self.pos += 1;
                let inner = self.parse_expression(0)?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(inner)
            }
            TokenKind::LBracket => self.parse_array_literal(),
            TokenKind::Fn => self.parse_function_value(),
            TokenKind::Id => self.parse_ident_or_builtin_call(),
            other => Err(ParseError::unexpected_token("an expression", other, tok.start, tok.end)),
        }
    }

    fn parse_array_literal(&mut self) -> ParseResult<Expr> {
        let open = self.expect(TokenKind::LBracket, "'['")?;
        let mut items = vec![];
        if !self.check(TokenKind::RBracket) {
            loop {
                items.push(self.parse_expression(0)?);
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RBracket, "']'")?;
        Ok(Expr::ArrayInit {
            items,
            span: (open.start, self.last_end()),
            ty: RefCell::new(None),
        })
    }

    fn parse_function_value(&mut self) -> ParseResult<Expr> {
        let start_tok = self.expect(TokenKind::Fn, "'fn'")?;
        self.expect(TokenKind::LParen, "'('")?;

        let mut params = vec![];
        if !self.check(TokenKind::RParen) {
            loop {
                let name_tok = self.expect(TokenKind::Id, "a parameter name")?;
                self.expect(TokenKind::Colon, "':'")?;
                let declared_type = self.parse_type()?;
                params.push(Param {
                    name: self.lexeme(name_tok).to_string(),
                    declared_type,
                    span: (name_tok.start, self.last_end()),
                    decl: RefCell::new(None),
                });
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, "')'")?;
        self.expect(TokenKind::Arrow, "'->'")?;
        let return_type = self.parse_type()?;
        let body = self.parse_block()?;

        Ok(Expr::Function(Box::new(FunctionValue {
            params,
            return_type,
            body,
            span: (start_tok.start, self.last_end()),
            resolved_type: RefCell::new(None),
            func_index: RefCell::new(None),
        })))
    }

    /// A bare identifier that matches a builtin's reserved name always
    /// parses as a builtin call at the call site, never a variable read
    /// (spec.md §6).
    fn parse_ident_or_builtin_call(&mut self) -> ParseResult<Expr> {
        let tok = self.expect(TokenKind::Id, "an identifier")?;
        let name = self.lexeme(tok).to_string();

        if let Some(builtin) = Builtin::by_name(&name) {
            if self.check(TokenKind::LParen) {
                self.pos += 1;
                let mut args = vec![];
                if !self.check(TokenKind::RParen) {
                    loop {
                        args.push(self.parse_expression(0)?);
                        if !self.eat(TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::RParen, "')'")?;
                return Ok(Expr::BuiltinCall {
                    builtin,
                    args,
                    span: (tok.start, self.last_end()),
                    ty: RefCell::new(None),
                });
            }
        }

        Ok(Expr::Ident {
            name,
            span: (tok.start, tok.end),
            binding: RefCell::new(None),
            ty: RefCell::new(None),
        })
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn parse(source: &str) -> Vec<Stmt> {
        let tokens = Lexer::tokenize(source).unwrap();
        Parser::parse_program(source, tokens).unwrap()
    }

    #[test]
    fn parses_var_decl_with_inferred_type() {
        let stmts = parse("var x := 1;");
        assert_eq!(stmts.len(), 1);
        assert!(matches!(stmts[0], Stmt::VarDecl { declared_type: None, .. }));
    }

    #[test]
    fn parses_var_decl_with_annotation() {
        let stmts = parse("var x: int = 1;");
        assert!(matches!(stmts[0], Stmt::VarDecl { declared_type: Some(_), .. }));
    }

    #[test]
    fn arithmetic_precedence_matches_expectation() {
        let stmts = parse("print(1 + 2 * 3);");
        let Stmt::Expr(Expr::BuiltinCall { args, .. }) = &stmts[0] else {
            panic!("expected builtin call")
        };
        let Expr::Binary { op: BinaryOp::Add, rhs, .. } = &args[0] else {
            panic!("expected top-level add")
        };
        assert!(matches!(**rhs, Expr::Binary { op: BinaryOp::Mul, .. }));
    }

    #[test]
    fn array_element_assignment_is_recognized_at_statement_position() {
        let stmts = parse("a[0] = 9;");
        assert!(matches!(stmts[0], Stmt::ArrayAssign { .. }));
    }

    #[test]
    fn bare_identifier_matching_builtin_name_parses_as_builtin_call() {
        let stmts = parse("print(1);");
        assert!(matches!(stmts[0], Stmt::Expr(Expr::BuiltinCall { builtin: Builtin::Print, .. })));
    }

    #[test]
    fn unterminated_block_is_an_error() {
        let tokens = Lexer::tokenize("if true { print(1);").unwrap();
        let err = Parser::parse_program("if true { print(1);", tokens).unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::UnterminatedBlock));
    }
}
