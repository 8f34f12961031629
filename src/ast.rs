//! Surface AST: the parser's output, pre-desugaring (spec §3.2).

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
    Concat, // &
    Cons,   // ::
    Assign, // :=
}

/// `Bang` covers the single lexeme `!`, which means boolean negation or
/// `Ref` dereference depending on the operand's inferred type; the parser
/// cannot tell which, so both core and surface AST keep one ambiguous tag
/// and the type checker picks the inference rule (spec §3.2, §4.4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOpKind {
    Neg,
    Bang,
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
    ExternalBlock(Vec<ExternalDecl>, Span),
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
            Decl::ExternalBlock(_, s) => *s,
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
    pub params: Vec<Pattern>,
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

// ── Type expressions ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TypeExpr {
    Var(String, Span),
    Named(String, Span),
    App(String, Vec<TypeExpr>, Span),
    Fun(Vec<TypeExpr>, Box<TypeExpr>, Span),
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

// ── Patterns ────────────────────────────────────────────────────────

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
    List(Vec<Pattern>, Option<Box<Pattern>>, Span),
    Tuple(Vec<Pattern>, Span),
    Or(Vec<Pattern>, Span),
    Annotated(Box<Pattern>, TypeExpr, Span),
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
            | Pattern::List(_, _, s)
            | Pattern::Tuple(_, s)
            | Pattern::Or(_, s)
            | Pattern::Annotated(_, _, s) => *s,
        }
    }

    /// Names bound by this pattern, in left-to-right order (duplicates kept
    /// out). Used to validate or-pattern alternatives bind the same set.
    pub fn bound_names(&self, out: &mut Vec<String>) {
        match self {
            Pattern::Wildcard(_)
            | Pattern::Int(_, _)
            | Pattern::Float(_, _)
            | Pattern::Str(_, _)
            | Pattern::Bool(_, _)
            | Pattern::Unit(_) => {}
            Pattern::Var(name, _) => out.push(name.clone()),
            Pattern::Ctor(_, args, _) => args.iter().for_each(|p| p.bound_names(out)),
            Pattern::Record(fields, _) => fields.iter().for_each(|(_, p)| p.bound_names(out)),
            Pattern::List(elems, rest, _) => {
                elems.iter().for_each(|p| p.bound_names(out));
                if let Some(r) = rest {
                    r.bound_names(out);
                }
            }
            Pattern::Tuple(elems, _) => elems.iter().for_each(|p| p.bound_names(out)),
            Pattern::Or(alts, _) => {
                if let Some(first) = alts.first() {
                    first.bound_names(out);
                }
            }
            Pattern::Annotated(inner, _, _) => inner.bound_names(out),
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

// ── Record fields ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RecordFieldExpr {
    Named(String, Expr),
    Spread(Expr),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ListElem {
    Item(Expr),
    Spread(Expr),
}

// ── Expressions ─────────────────────────────────────────────────────

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
        mutable: bool,
        span: Span,
    },
    LetRec {
        bindings: Vec<LetBinding>,
        body: Box<Expr>,
        span: Span,
    },
    Lambda {
        params: Vec<Pattern>,
        body: Box<Expr>,
        span: Span,
    },
    App {
        func: Box<Expr>,
        args: Vec<Expr>,
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
    Pipe {
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        span: Span,
    },
    Compose {
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        reversed: bool, // true for `<<`
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
        record: Box<Expr>,
        fields: Vec<RecordFieldExpr>,
        span: Span,
    },
    List {
        elements: Vec<ListElem>,
        span: Span,
    },
    Tuple {
        elements: Vec<Expr>,
        span: Span,
    },
    Block {
        statements: Vec<Expr>,
        span: Span,
    },
    While {
        cond: Box<Expr>,
        body: Box<Expr>,
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
            | Expr::Pipe { span, .. }
            | Expr::Compose { span, .. }
            | Expr::Record { span, .. }
            | Expr::RecordAccess { span, .. }
            | Expr::RecordUpdate { span, .. }
            | Expr::List { span, .. }
            | Expr::Tuple { span, .. }
            | Expr::Block { span, .. }
            | Expr::While { span, .. }
            | Expr::TypeAnnotation { span, .. }
            | Expr::Unsafe { span, .. } => *span,
        }
    }

    /// A *syntactic value* per spec §4.4.4 / Glossary: literal, variable,
    /// lambda, constructor applied to values, record/list/tuple of values.
    /// Used by the value restriction to decide what may be generalised.
    pub fn is_syntactic_value(&self) -> bool {
        match self {
            Expr::Int(..)
            | Expr::Float(..)
            | Expr::Str(..)
            | Expr::Bool(..)
            | Expr::Unit(_)
            | Expr::Var(..)
            | Expr::Lambda { .. } => true,
            Expr::App { func, args, .. } => {
                is_ctor_head(func) && args.iter().all(Expr::is_syntactic_value)
            }
            Expr::Record { fields, .. } => fields.iter().all(|f| match f {
                RecordFieldExpr::Named(_, e) => e.is_syntactic_value(),
                RecordFieldExpr::Spread(e) => e.is_syntactic_value(),
            }),
            Expr::List { elements, .. } => elements.iter().all(|e| match e {
                ListElem::Item(e) | ListElem::Spread(e) => e.is_syntactic_value(),
            }),
            Expr::Tuple { elements, .. } => elements.iter().all(Expr::is_syntactic_value),
            Expr::TypeAnnotation { expr, .. } => expr.is_syntactic_value(),
            _ => false,
        }
    }
}

fn is_ctor_head(e: &Expr) -> bool {
    matches!(e, Expr::Var(name, _) if name.chars().next().is_some_and(|c| c.is_uppercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn or_pattern_bound_names_uses_first_alt() {
        let s = Span::dummy();
        let p = Pattern::Or(
            vec![Pattern::Var("x".into(), s), Pattern::Var("x".into(), s)],
            s,
        );
        let mut names = Vec::new();
        p.bound_names(&mut names);
        assert_eq!(names, vec!["x".to_string()]);
    }

    #[test]
    fn app_of_uppercase_var_is_syntactic_value_when_args_are() {
        let s = Span::dummy();
        let e = Expr::App {
            func: Box::new(Expr::Var("Some".into(), s)),
            args: vec![Expr::Int("1".into(), s)],
            span: s,
        };
        assert!(e.is_syntactic_value());
    }

    #[test]
    fn app_of_lowercase_var_is_not_syntactic_value() {
        let s = Span::dummy();
        let e = Expr::App {
            func: Box::new(Expr::Var("f".into(), s)),
            args: vec![Expr::Int("1".into(), s)],
            span: s,
        };
        assert!(!e.is_syntactic_value());
    }
}
