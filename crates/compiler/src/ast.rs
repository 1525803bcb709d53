//! Abstract syntax for the Cinder dialect.

use cinder_core::{BinOp, IncDec, UnOp};

/// A parsed script file, before inheritance resolution and code generation.
#[derive(Debug, Default)]
pub struct ScriptAst {
    pub inherits: Vec<InheritAst>,
    pub globals: Vec<DeclAst>,
    pub functions: Vec<FunctionAst>,
}

#[derive(Debug)]
pub struct InheritAst {
    pub path: String,
    pub line: u32,
}

/// Declared type of a variable. Arrays record the product of their declared
/// dimensions; `size: None` is the unlimited `*` form.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeAst {
    Dynamic,
    Int,
    Str,
    Object,
    Mapping,
    Array { elem: Box<TypeAst>, size: Option<u16> },
}

#[derive(Debug, Clone)]
pub struct DeclAst {
    pub name: String,
    pub ty: TypeAst,
    pub line: u32,
}

#[derive(Debug)]
pub struct FunctionAst {
    pub name: String,
    pub is_static: bool,
    pub params: Vec<DeclAst>,
    pub body: Vec<Stmt>,
    pub line: u32,
}

#[derive(Debug)]
pub enum Stmt {
    Expr {
        expr: Expr,
        line: u32,
    },
    Decl {
        decls: Vec<DeclAst>,
    },
    If {
        cond: Expr,
        then: Vec<Stmt>,
        otherwise: Vec<Stmt>,
        line: u32,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
        line: u32,
    },
    DoWhile {
        body: Vec<Stmt>,
        cond: Expr,
        line: u32,
    },
    For {
        init: Option<Expr>,
        cond: Option<Expr>,
        step: Option<Expr>,
        body: Vec<Stmt>,
        line: u32,
    },
    Return {
        value: Option<Expr>,
        line: u32,
    },
    Break {
        line: u32,
    },
    Continue {
        line: u32,
    },
}

#[derive(Debug)]
pub enum Expr {
    Int(i64),
    Str(String),
    Var(String),
    /// `target = value`, or `target op= value` when `op` is set.
    Assign {
        op: Option<BinOp>,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnOp,
        operand: Box<Expr>,
    },
    IncDec {
        op: IncDec,
        target: Box<Expr>,
    },
    Ternary {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    /// Comma operator: evaluate all, keep the last.
    Comma(Vec<Expr>),
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    /// `f(args)`: own function, efun, or late-bound inherited/attached.
    Call {
        name: String,
        args: Vec<Expr>,
    },
    /// `obj.f(args)`: sugar for `call_other(obj, "f", args...)`.
    MethodCall {
        receiver: Box<Expr>,
        name: String,
        args: Vec<Expr>,
    },
    /// `::f(args)` (parent `None`) or `Name::f(args)`.
    SuperCall {
        parent: Option<String>,
        name: String,
        args: Vec<Expr>,
    },
    ArrayLit(Vec<Expr>),
    MappingLit(Vec<(Expr, Expr)>),
}
