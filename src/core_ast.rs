//! Core AST: the desugarer's output, input to the type checker (spec §3.3).
//!
//! Strictly smaller than the surface AST: single-param lambdas, single-arg
//! applications, no pipes/composition/blocks/while/list-literals/or-patterns.

use crate::tokens::Span;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOpKind {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    Concat,
    Assign, // :=
}

/// `::` does not survive desugaring (it becomes `Variant("Cons", ..)`), so
/// the core set drops it relative to the surface `BinOpKind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOpKind {
    Neg,
    NotBool,
    Deref,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    pub decls: Vec<Decl>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Decl {
    Let(LetDecl),
    LetRecGroup(Vec<LetBinding>, Span),
    Type(TypeDecl),
    TypeGroup(Vec<TypeDecl>, Span),
    External(ExternalDecl),
    ExternalType(ExternalTypeDecl),
    Import(ImportDecl),
    Export(ExportDecl),
}

impl Decl {
    pub fn span(&self) -> Span {
        match self {
            Decl::Let(d) => d.span,
            Decl::LetRecGroup(_, s) => *s,
            Decl::Type(d) => d.span,
            Decl::TypeGroup(_, s) => *s,
            Decl::External(d) => d.span,
            Decl::ExternalType(d) => d.span,
            Decl::Import(d) => d.span,
            Decl::Export(d) => d.span,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LetDecl {
    pub pattern: Pattern,
    pub value: Expr,
    pub mutable: bool,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LetBinding {
    pub name: String,
    pub body: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeDecl {
    pub name: String,
    pub params: Vec<String>,
    pub def: TypeDef,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TypeDef {
    Alias(TypeExpr),
    Record(Vec<(String, TypeExpr)>),
    Variant(Vec<VariantCtor>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantCtor {
    pub name: String,
    pub args: Vec<TypeExpr>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalDecl {
    pub name: String,
    pub ty: TypeExpr,
    pub js_expr: String,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalTypeDecl {
    pub name: String,
    pub arity: usize,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportDecl {
    pub path: Vec<String>,
    pub names: ImportNames,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ImportNames {
    Wildcard,
    Named(Vec<(String, Option<String>)>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportDecl {
    pub names: Vec<String>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TypeExpr {
    Var(String, Span),
    Named(String, Span),
    App(String, Vec<TypeExpr>, Span),
    Fun(Box<TypeExpr>, Box<TypeExpr>, Span),
    Record(Vec<(String, TypeExpr)>, Span),
    Variant(Vec<VariantCtor>, Span),
    Tuple(Vec<TypeExpr>, Span),
    Union(Vec<TypeExpr>, Span),
    Ref(Box<TypeExpr>, Span),
}

impl TypeExpr {
    pub fn span(&self) -> Span {
        match self {
            TypeExpr::Var(_, s)
            | TypeExpr::Named(_, s)
            | TypeExpr::App(_, _, s)
            | TypeExpr::Fun(_, _, s)
            | TypeExpr::Record(_, s)
            | TypeExpr::Variant(_, s)
            | TypeExpr::Tuple(_, s)
            | TypeExpr::Union(_, s)
            | TypeExpr::Ref(_, s) => *s,
        }
    }
}

/// No or-patterns, list patterns, or type-annotated patterns at this layer
/// (spec §3.3); `Cons`/`Nil` list shapes are ordinary `Ctor` patterns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Pattern {
    Wildcard(Span),
    Var(String, Span),
    Int(String, Span),
    Float(String, Span),
    Str(String, Span),
    Bool(bool, Span),
    Unit(Span),
    Ctor(String, Vec<Pattern>, Span),
    Record(Vec<(String, Pattern)>, Span),
    Tuple(Vec<Pattern>, Span),
}

impl Pattern {
    pub fn span(&self) -> Span {
        match self {
            Pattern::Wildcard(s)
            | Pattern::Var(_, s)
            | Pattern::Int(_, s)
            | Pattern::Float(_, s)
            | Pattern::Str(_, s)
            | Pattern::Bool(_, s)
            | Pattern::Unit(s)
            | Pattern::Ctor(_, _, s)
            | Pattern::Record(_, s)
            | Pattern::Tuple(_, s) => *s,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchCase {
    pub pattern: Pattern,
    pub guard: Option<Expr>,
    pub body: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RecordFieldExpr {
    Named(String, Expr),
    Spread(Expr),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Expr {
    Int(String, Span),
    Float(String, Span),
    Str(String, Span),
    Bool(bool, Span),
    Unit(Span),
    Var(String, Span),
    Let {
        pattern: Pattern,
        value: Box<Expr>,
        body: Box<Expr>,
        span: Span,
    },
    LetRec {
        bindings: Vec<LetBinding>,
        body: Box<Expr>,
        span: Span,
    },
    Lambda {
        param: Pattern,
        body: Box<Expr>,
        span: Span,
    },
    App {
        func: Box<Expr>,
        arg: Box<Expr>,
        span: Span,
    },
    If {
        cond: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
        span: Span,
    },
    Match {
        scrutinee: Box<Expr>,
        cases: Vec<MatchCase>,
        span: Span,
    },
    BinOp {
        op: BinOpKind,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        span: Span,
    },
    UnaryOp {
        op: UnaryOpKind,
        operand: Box<Expr>,
        span: Span,
    },
    Record {
        fields: Vec<RecordFieldExpr>,
        span: Span,
    },
    RecordAccess {
        record: Box<Expr>,
        field: String,
        span: Span,
    },
    RecordUpdate {
        base: Box<Expr>,
        updates: Vec<RecordFieldExpr>,
        span: Span,
    },
    Variant {
        name: String,
        args: Vec<Expr>,
        span: Span,
    },
    Tuple {
        elements: Vec<Expr>,
        span: Span,
    },
    TypeAnnotation {
        expr: Box<Expr>,
        ty: TypeExpr,
        span: Span,
    },
    Unsafe {
        expr: Box<Expr>,
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Int(_, s)
            | Expr::Float(_, s)
            | Expr::Str(_, s)
            | Expr::Bool(_, s)
            | Expr::Unit(s)
            | Expr::Var(_, s) => *s,
            Expr::Let { span, .. }
            | Expr::LetRec { span, .. }
            | Expr::Lambda { span, .. }
            | Expr::App { span, .. }
            | Expr::If { span, .. }
            | Expr::Match { span, .. }
            | Expr::BinOp { span, .. }
            | Expr::UnaryOp { span, .. }
            | Expr::Record { span, .. }
            | Expr::RecordAccess { span, .. }
            | Expr::RecordUpdate { span, .. }
            | Expr::Variant { span, .. }
            | Expr::Tuple { span, .. }
            | Expr::TypeAnnotation { span, .. }
            | Expr::Unsafe { span, .. } => *span,
        }
    }

    /// Syntactic value per spec §4.4.4 / Glossary — drives the value
    /// restriction's generalisation decision.
    pub fn is_syntactic_value(&self) -> bool {
        match self {
            Expr::Int(..)
            | Expr::Float(..)
            | Expr::Str(..)
            | Expr::Bool(..)
            | Expr::Unit(_)
            | Expr::Var(..)
            | Expr::Lambda { .. } => true,
            Expr::Variant { args, .. } => args.iter().all(Expr::is_syntactic_value),
            Expr::Record { fields, .. } => fields.iter().all(|f| match f {
                RecordFieldExpr::Named(_, e) => e.is_syntactic_value(),
                RecordFieldExpr::Spread(e) => e.is_syntactic_value(),
            }),
            Expr::Tuple { elements, .. } => elements.iter().all(Expr::is_syntactic_value),
            Expr::TypeAnnotation { expr, .. } => expr.is_syntactic_value(),
            _ => false,
        }
    }
}

pub const NIL_CTOR: &str = "Nil";
pub const CONS_CTOR: &str = "Cons";
