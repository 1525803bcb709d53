//! Recursive-descent parser for the Cinder dialect.
//!
//! The dialect is C-shaped: global declarations, function definitions,
//! statement and expression forms with the usual precedence ladder, plus
//! the object-call sugar `obj.fn(...)`, qualified parent calls `::fn(...)`
//! and `Name::fn(...)`, array literals `({ ... })`, and mapping literals
//! `([ key : value, ... ])`.

use crate::ast::*;
use crate::error::CompileError;
use crate::lexer::{Token, TokenKind};
use cinder_core::{BinOp, IncDec, UnOp};

pub struct Parser<'a> {
    path: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Parser<'a> {
    pub fn new(path: &'a str, tokens: Vec<Token>) -> Self {
        Parser {
            path,
            tokens,
            pos: 0,
        }
    }

    pub fn parse(&mut self) -> Result<ScriptAst, CompileError> {
        let mut script = ScriptAst::default();
        let mut seen_body = false;
        while !self.is_at_end() {
            if self.check_ident("inherit") {
                let line = self.line();
                if seen_body {
                    return Err(self.err("inherit must appear before declarations and code"));
                }
                self.advance();
                let path = self.expect_string("inherit expects a quoted path")?;
                self.expect_punct(";")?;
                script.inherits.push(InheritAst { path, line });
                continue;
            }
            if self.peek_type_keyword().is_some() {
                let decls = self.parse_decl_list()?;
                self.expect_punct(";")?;
                script.globals.extend(decls);
                seen_body = true;
                continue;
            }
            script.functions.push(self.parse_function()?);
            seen_body = true;
        }
        Ok(script)
    }

    // ---- declarations ----

    fn peek_type_keyword(&self) -> Option<TypeAst> {
        let TokenKind::Ident(name) = &self.peek()?.kind else {
            return None;
        };
        // `var x` only counts as a declaration when an identifier follows;
        // plain identifiers named like types stay expressions otherwise.
        let ty = match name.as_str() {
            "int" => TypeAst::Int,
            "string" => TypeAst::Str,
            "object" => TypeAst::Object,
            "mapping" => TypeAst::Mapping,
            "var" => TypeAst::Dynamic,
            _ => return None,
        };
        match self.peek_at(1)?.kind {
            TokenKind::Ident(_) | TokenKind::Punct("*") => Some(ty),
            _ => None,
        }
    }

    /// `int a, *b, c[5]`; the leading type keyword is consumed here.
    fn parse_decl_list(&mut self) -> Result<Vec<DeclAst>, CompileError> {
        let base = self
            .peek_type_keyword()
            .ok_or_else(|| self.err("expected a type"))?;
        self.advance();
        let mut decls = vec![self.parse_declarator(&base)?];
        while self.check_punct(",") {
            self.advance();
            decls.push(self.parse_declarator(&base)?);
        }
        Ok(decls)
    }

    fn parse_declarator(&mut self, base: &TypeAst) -> Result<DeclAst, CompileError> {
        let line = self.line();
        let unlimited = if self.check_punct("*") {
            self.advance();
            true
        } else {
            false
        };
        let name = self.expect_ident("expected a variable name")?;
        let mut dims: Vec<u16> = Vec::new();
        while self.check_punct("[") {
            self.advance();
            let size = self.expect_int("array dimension must be an integer constant")?;
            if size <= 0 || size > u16::MAX as i64 {
                return Err(self.err("array dimension out of range"));
            }
            dims.push(size as u16);
            self.expect_punct("]")?;
        }
        let ty = if unlimited {
            TypeAst::Array {
                elem: Box::new(base.clone()),
                size: None,
            }
        } else if !dims.is_empty() {
            let total: u32 = dims.iter().map(|d| *d as u32).product();
            if total > u16::MAX as u32 {
                return Err(self.err("declared array too large"));
            }
            TypeAst::Array {
                elem: Box::new(base.clone()),
                size: Some(total as u16),
            }
        } else {
            base.clone()
        };
        Ok(DeclAst { name, ty, line })
    }

    fn parse_function(&mut self) -> Result<FunctionAst, CompileError> {
        let line = self.line();
        let is_static = if self.check_ident("static") {
            self.advance();
            true
        } else {
            false
        };
        let name = self.expect_ident("expected a function name")?;
        self.expect_punct("(")?;
        let mut params = Vec::new();
        if !self.check_punct(")") {
            loop {
                let base = match self.peek_type_keyword() {
                    Some(ty) => {
                        self.advance();
                        ty
                    }
                    None => TypeAst::Dynamic,
                };
                params.push(self.parse_declarator(&base)?);
                if self.check_punct(",") {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect_punct(")")?;
        self.expect_punct("{")?;
        let body = self.parse_block()?;
        Ok(FunctionAst {
            name,
            is_static,
            params,
            body,
            line,
        })
    }

    // ---- statements ----

    /// Parse until the closing `}` (already inside the block).
    fn parse_block(&mut self) -> Result<Vec<Stmt>, CompileError> {
        let mut stmts = Vec::new();
        while !self.check_punct("}") {
            if self.is_at_end() {
                return Err(self.err("unexpected end of file inside a block"));
            }
            stmts.push(self.parse_stmt()?);
        }
        self.advance(); // consume '}'
        Ok(stmts)
    }

    /// A statement position that accepts either one statement or a block.
    fn parse_body(&mut self) -> Result<Vec<Stmt>, CompileError> {
        if self.check_punct("{") {
            self.advance();
            self.parse_block()
        } else {
            Ok(vec![self.parse_stmt()?])
        }
    }

    fn parse_stmt(&mut self) -> Result<Stmt, CompileError> {
        let line = self.line();
        if self.check_punct(";") {
            // empty statement
            self.advance();
            return Ok(Stmt::Expr {
                expr: Expr::Int(0),
                line,
            });
        }
        if self.peek_type_keyword().is_some() {
            let decls = self.parse_decl_list()?;
            self.expect_punct(";")?;
            return Ok(Stmt::Decl { decls });
        }
        if self.check_ident("if") {
            self.advance();
            self.expect_punct("(")?;
            let cond = self.parse_expr()?;
            self.expect_punct(")")?;
            let then = self.parse_body()?;
            let otherwise = if self.check_ident("else") {
                self.advance();
                self.parse_body()?
            } else {
                Vec::new()
            };
            return Ok(Stmt::If {
                cond,
                then,
                otherwise,
                line,
            });
        }
        if self.check_ident("while") {
            self.advance();
            self.expect_punct("(")?;
            let cond = self.parse_expr()?;
            self.expect_punct(")")?;
            let body = self.parse_body()?;
            return Ok(Stmt::While { cond, body, line });
        }
        if self.check_ident("do") {
            self.advance();
            let body = self.parse_body()?;
            if !self.check_ident("while") {
                return Err(self.err("expected 'while' after do body"));
            }
            self.advance();
            self.expect_punct("(")?;
            let cond = self.parse_expr()?;
            self.expect_punct(")")?;
            self.expect_punct(";")?;
            return Ok(Stmt::DoWhile { body, cond, line });
        }
        if self.check_ident("for") {
            self.advance();
            self.expect_punct("(")?;
            let init = if self.check_punct(";") {
                None
            } else {
                Some(self.parse_expr()?)
            };
            self.expect_punct(";")?;
            let cond = if self.check_punct(";") {
                None
            } else {
                Some(self.parse_expr()?)
            };
            self.expect_punct(";")?;
            let step = if self.check_punct(")") {
                None
            } else {
                Some(self.parse_expr()?)
            };
            self.expect_punct(")")?;
            let body = self.parse_body()?;
            return Ok(Stmt::For {
                init,
                cond,
                step,
                body,
                line,
            });
        }
        if self.check_ident("return") {
            self.advance();
            let value = if self.check_punct(";") {
                None
            } else {
                Some(self.parse_expr()?)
            };
            self.expect_punct(";")?;
            return Ok(Stmt::Return { value, line });
        }
        if self.check_ident("break") {
            self.advance();
            self.expect_punct(";")?;
            return Ok(Stmt::Break { line });
        }
        if self.check_ident("continue") {
            self.advance();
            self.expect_punct(";")?;
            return Ok(Stmt::Continue { line });
        }
        let expr = self.parse_expr()?;
        self.expect_punct(";")?;
        Ok(Stmt::Expr { expr, line })
    }

    // ---- expressions ----

    /// Full expression including the comma operator.
    pub fn parse_expr(&mut self) -> Result<Expr, CompileError> {
        let first = self.parse_assignment()?;
        if !self.check_punct(",") {
            return Ok(first);
        }
        let mut parts = vec![first];
        while self.check_punct(",") {
            self.advance();
            parts.push(self.parse_assignment()?);
        }
        Ok(Expr::Comma(parts))
    }

    fn parse_assignment(&mut self) -> Result<Expr, CompileError> {
        let target = self.parse_ternary()?;
        let op = match self.peek_punct() {
            Some("=") => None,
            Some("+=") => Some(BinOp::Add),
            Some("-=") => Some(BinOp::Sub),
            Some("*=") => Some(BinOp::Mul),
            Some("/=") => Some(BinOp::Div),
            Some("%=") => Some(BinOp::Mod),
            Some("&=") => Some(BinOp::BitAnd),
            Some("|=") => Some(BinOp::BitOr),
            Some("^=") => Some(BinOp::BitXor),
            Some("<<=") => Some(BinOp::Shl),
            Some(">>=") => Some(BinOp::Shr),
            _ => return Ok(target),
        };
        if !matches!(target, Expr::Var(_) | Expr::Index { .. }) {
            return Err(self.err("left side of assignment is not assignable"));
        }
        self.advance();
        let value = self.parse_assignment()?;
        Ok(Expr::Assign {
            op,
            target: Box::new(target),
            value: Box::new(value),
        })
    }

    fn parse_ternary(&mut self) -> Result<Expr, CompileError> {
        let cond = self.parse_binary(0)?;
        if !self.check_punct("?") {
            return Ok(cond);
        }
        self.advance();
        let then = self.parse_expr_no_comma()?;
        self.expect_punct(":")?;
        let otherwise = self.parse_ternary()?;
        Ok(Expr::Ternary {
            cond: Box::new(cond),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        })
    }

    fn parse_expr_no_comma(&mut self) -> Result<Expr, CompileError> {
        self.parse_assignment()
    }

    /// Binary operator levels, loosest first.
    fn parse_binary(&mut self, level: usize) -> Result<Expr, CompileError> {
        const LEVELS: &[&[(&str, BinOp)]] = &[
            &[("||", BinOp::LogOr)],
            &[("&&", BinOp::LogAnd)],
            &[("|", BinOp::BitOr)],
            &[("^", BinOp::BitXor)],
            &[("&", BinOp::BitAnd)],
            &[("==", BinOp::Eq), ("!=", BinOp::Ne)],
            &[
                ("<=", BinOp::Le),
                (">=", BinOp::Ge),
                ("<", BinOp::Lt),
                (">", BinOp::Gt),
            ],
            &[("<<", BinOp::Shl), (">>", BinOp::Shr)],
            &[("+", BinOp::Add), ("-", BinOp::Sub)],
            &[("*", BinOp::Mul), ("/", BinOp::Div), ("%", BinOp::Mod)],
        ];
        if level >= LEVELS.len() {
            return self.parse_unary();
        }
        let mut left = self.parse_binary(level + 1)?;
        loop {
            let Some(p) = self.peek_punct() else {
                return Ok(left);
            };
            let Some((_, op)) = LEVELS[level].iter().find(|(s, _)| *s == p) else {
                return Ok(left);
            };
            self.advance();
            let right = self.parse_binary(level + 1)?;
            left = Expr::Binary {
                op: *op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, CompileError> {
        let op = match self.peek_punct() {
            Some("!") => Some(UnOp::Not),
            Some("~") => Some(UnOp::BitNot),
            Some("-") => Some(UnOp::Neg),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary {
                op,
                operand: Box::new(operand),
            });
        }
        if self.check_punct("++") || self.check_punct("--") {
            let op = if self.check_punct("++") {
                IncDec::PreInc
            } else {
                IncDec::PreDec
            };
            self.advance();
            let target = self.parse_unary()?;
            if !matches!(target, Expr::Var(_) | Expr::Index { .. }) {
                return Err(self.err("++/-- needs a variable or element"));
            }
            return Ok(Expr::IncDec {
                op,
                target: Box::new(target),
            });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, CompileError> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.check_punct("[") {
                self.advance();
                let index = self.parse_expr()?;
                self.expect_punct("]")?;
                expr = Expr::Index {
                    base: Box::new(expr),
                    index: Box::new(index),
                };
                continue;
            }
            if self.check_punct(".") {
                self.advance();
                let name = self.expect_ident("expected a function name after '.'")?;
                self.expect_punct("(")?;
                let args = self.parse_args()?;
                expr = Expr::MethodCall {
                    receiver: Box::new(expr),
                    name,
                    args,
                };
                continue;
            }
            if self.check_punct("++") || self.check_punct("--") {
                let op = if self.check_punct("++") {
                    IncDec::PostInc
                } else {
                    IncDec::PostDec
                };
                if !matches!(expr, Expr::Var(_) | Expr::Index { .. }) {
                    return Err(self.err("++/-- needs a variable or element"));
                }
                self.advance();
                expr = Expr::IncDec {
                    op,
                    target: Box::new(expr),
                };
                continue;
            }
            return Ok(expr);
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, CompileError> {
        let Some(token) = self.peek().cloned() else {
            return Err(self.err("unexpected end of file in expression"));
        };
        match token.kind {
            TokenKind::Int(n) => {
                self.advance();
                Ok(Expr::Int(n))
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Expr::Str(s))
            }
            TokenKind::Punct("(") => {
                // `({` opens an array literal, `([` a mapping literal
                if self.peek_at(1).is_some_and(|t| t.is_punct("{")) {
                    return self.parse_array_literal();
                }
                if self.peek_at(1).is_some_and(|t| t.is_punct("[")) {
                    return self.parse_mapping_literal();
                }
                self.advance();
                let inner = self.parse_expr()?;
                self.expect_punct(")")?;
                Ok(inner)
            }
            TokenKind::Punct("::") => {
                self.advance();
                let name = self.expect_ident("expected a function name after '::'")?;
                self.expect_punct("(")?;
                let args = self.parse_args()?;
                Ok(Expr::SuperCall {
                    parent: None,
                    name,
                    args,
                })
            }
            TokenKind::Ident(name) => {
                self.advance();
                if self.check_punct("::") {
                    self.advance();
                    let func = self.expect_ident("expected a function name after '::'")?;
                    self.expect_punct("(")?;
                    let args = self.parse_args()?;
                    return Ok(Expr::SuperCall {
                        parent: Some(name),
                        name: func,
                        args,
                    });
                }
                if self.check_punct("(") {
                    self.advance();
                    let args = self.parse_args()?;
                    return Ok(Expr::Call { name, args });
                }
                Ok(Expr::Var(name))
            }
            _ => Err(self.err("expected an expression")),
        }
    }

    /// Arguments up to and including the closing `)`.
    fn parse_args(&mut self) -> Result<Vec<Expr>, CompileError> {
        let mut args = Vec::new();
        if self.check_punct(")") {
            self.advance();
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr_no_comma()?);
            if self.check_punct(",") {
                self.advance();
            } else {
                self.expect_punct(")")?;
                return Ok(args);
            }
        }
    }

    fn parse_array_literal(&mut self) -> Result<Expr, CompileError> {
        self.expect_punct("(")?;
        self.expect_punct("{")?;
        let mut elems = Vec::new();
        if !self.check_punct("}") {
            loop {
                elems.push(self.parse_expr_no_comma()?);
                if self.check_punct(",") {
                    self.advance();
                    // allow a trailing comma before `})`
                    if self.check_punct("}") {
                        break;
                    }
                } else {
                    break;
                }
            }
        }
        self.expect_punct("}")?;
        self.expect_punct(")")?;
        Ok(Expr::ArrayLit(elems))
    }

    fn parse_mapping_literal(&mut self) -> Result<Expr, CompileError> {
        self.expect_punct("(")?;
        self.expect_punct("[")?;
        let mut entries = Vec::new();
        if !self.check_punct("]") {
            loop {
                let key = self.parse_expr_no_comma()?;
                self.expect_punct(":")?;
                let value = self.parse_expr_no_comma()?;
                entries.push((key, value));
                if self.check_punct(",") {
                    self.advance();
                    if self.check_punct("]") {
                        break;
                    }
                } else {
                    break;
                }
            }
        }
        self.expect_punct("]")?;
        self.expect_punct(")")?;
        Ok(Expr::MappingLit(entries))
    }

    // ---- token helpers ----

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn peek_punct(&self) -> Option<&'static str> {
        match self.peek()?.kind {
            TokenKind::Punct(p) => Some(p),
            _ => None,
        }
    }

    fn check_punct(&self, p: &str) -> bool {
        self.peek().is_some_and(|t| t.is_punct(p))
    }

    fn check_ident(&self, name: &str) -> bool {
        self.peek().is_some_and(|t| t.is_ident(name))
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn line(&self) -> u32 {
        self.peek()
            .map(|t| t.line)
            .or_else(|| self.tokens.last().map(|t| t.line))
            .unwrap_or(0)
    }

    fn err(&self, message: impl Into<String>) -> CompileError {
        CompileError::new(self.path, self.line(), message)
    }

    fn expect_punct(&mut self, p: &'static str) -> Result<(), CompileError> {
        if self.check_punct(p) {
            self.advance();
            Ok(())
        } else {
            Err(self.err(format!("expected '{p}'")))
        }
    }

    fn expect_ident(&mut self, msg: &str) -> Result<String, CompileError> {
        match self.peek().map(|t| t.kind.clone()) {
            Some(TokenKind::Ident(name)) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.err(msg)),
        }
    }

    fn expect_string(&mut self, msg: &str) -> Result<String, CompileError> {
        match self.peek().map(|t| t.kind.clone()) {
            Some(TokenKind::Str(s)) => {
                self.advance();
                Ok(s)
            }
            _ => Err(self.err(msg)),
        }
    }

    fn expect_int(&mut self, msg: &str) -> Result<i64, CompileError> {
        match self.peek().map(|t| t.kind.clone()) {
            Some(TokenKind::Int(n)) => {
                self.advance();
                Ok(n)
            }
            _ => Err(self.err(msg)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::preprocess::{NoIncludes, preprocess};

    fn parse(src: &str) -> ScriptAst {
        let lines = preprocess("/t", src, &mut NoIncludes).unwrap();
        let tokens = tokenize("/t", &lines).unwrap();
        Parser::new("/t", tokens).parse().unwrap()
    }

    fn parse_err(src: &str) -> CompileError {
        let lines = preprocess("/t", src, &mut NoIncludes).unwrap();
        let tokens = tokenize("/t", &lines).unwrap();
        Parser::new("/t", tokens).parse().unwrap_err()
    }

    #[test]
    fn test_globals_functions_and_inherits() {
        let ast = parse(
            "inherit \"/std/object\";\nint hp, *log;\nstring name;\nstatic init() { hp = 10; }\n",
        );
        assert_eq!(ast.inherits.len(), 1);
        assert_eq!(ast.globals.len(), 3);
        assert_eq!(ast.globals[1].ty, TypeAst::Array {
            elem: Box::new(TypeAst::Int),
            size: None
        });
        assert!(ast.functions[0].is_static);
    }

    #[test]
    fn test_inherit_after_code_rejected() {
        let err = parse_err("int x;\ninherit \"/std/object\";\n");
        assert!(err.message.contains("inherit"));
        assert_eq!(err.line, 2);
    }

    #[test]
    fn test_method_call_sugar_chains() {
        let ast = parse("f() { this_player().listen(\"hi\"); }\n");
        let Stmt::Expr { expr, .. } = &ast.functions[0].body[0] else {
            panic!("expected expression statement");
        };
        let Expr::MethodCall { receiver, name, .. } = expr else {
            panic!("expected method call, got {expr:?}");
        };
        assert_eq!(name, "listen");
        assert!(matches!(receiver.as_ref(), Expr::Call { name, .. } if name == "this_player"));
    }

    #[test]
    fn test_super_calls() {
        let ast = parse("init() { ::init(); left::setup(1, 2); }\n");
        let body = &ast.functions[0].body;
        assert!(matches!(
            &body[0],
            Stmt::Expr {
                expr: Expr::SuperCall { parent: None, .. },
                ..
            }
        ));
        let Stmt::Expr {
            expr: Expr::SuperCall { parent, args, .. },
            ..
        } = &body[1]
        else {
            panic!("expected super call");
        };
        assert_eq!(parent.as_deref(), Some("left"));
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn test_array_and_mapping_literals() {
        let ast = parse("f() { a = ({ 1, 2, 3 }); m = ([ \"k\" : 1, 2 : b ]); }\n");
        let Stmt::Expr {
            expr: Expr::Assign { value, .. },
            ..
        } = &ast.functions[0].body[0]
        else {
            panic!("expected assignment");
        };
        assert!(matches!(value.as_ref(), Expr::ArrayLit(v) if v.len() == 3));
        let Stmt::Expr {
            expr: Expr::Assign { value, .. },
            ..
        } = &ast.functions[0].body[1]
        else {
            panic!("expected assignment");
        };
        assert!(matches!(value.as_ref(), Expr::MappingLit(v) if v.len() == 2));
    }

    #[test]
    fn test_precedence_shapes() {
        let ast = parse("f() { x = 1 + 2 * 3 == 7 && !y; }\n");
        let Stmt::Expr {
            expr: Expr::Assign { value, .. },
            ..
        } = &ast.functions[0].body[0]
        else {
            panic!("expected assignment");
        };
        // top of the value tree must be &&
        assert!(matches!(
            value.as_ref(),
            Expr::Binary {
                op: BinOp::LogAnd,
                ..
            }
        ));
    }

    #[test]
    fn test_ternary_and_compound_assign() {
        let ast = parse("f() { n += m ? 1 : 2; a[i] = 5; }\n");
        assert!(matches!(
            &ast.functions[0].body[0],
            Stmt::Expr {
                expr: Expr::Assign { op: Some(BinOp::Add), .. },
                ..
            }
        ));
        let Stmt::Expr {
            expr: Expr::Assign { target, .. },
            ..
        } = &ast.functions[0].body[1]
        else {
            panic!("expected assignment");
        };
        assert!(matches!(target.as_ref(), Expr::Index { .. }));
    }

    #[test]
    fn test_control_flow_statements() {
        let ast = parse(
            "f() { for (i = 0; i < 10; i++) { if (i == 5) break; else continue; } \
             while (x) y--; do { z(); } while (0); return 42; }\n",
        );
        let body = &ast.functions[0].body;
        assert!(matches!(body[0], Stmt::For { .. }));
        assert!(matches!(body[1], Stmt::While { .. }));
        assert!(matches!(body[2], Stmt::DoWhile { .. }));
        assert!(matches!(body[3], Stmt::Return { .. }));
    }

    #[test]
    fn test_assignment_needs_lvalue() {
        let err = parse_err("f() { 1 = 2; }\n");
        assert!(err.message.contains("not assignable"));
    }

    #[test]
    fn test_typed_params_and_dims() {
        let ast = parse("g(string who, int n, var rest) { } h() { int grid[3][4]; }\n");
        assert_eq!(ast.functions[0].params.len(), 3);
        assert_eq!(ast.functions[0].params[0].ty, TypeAst::Str);
        let Stmt::Decl { decls } = &ast.functions[1].body[0] else {
            panic!("expected declaration");
        };
        assert_eq!(decls[0].ty, TypeAst::Array {
            elem: Box::new(TypeAst::Int),
            size: Some(12)
        });
    }
}
