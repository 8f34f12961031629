//! Surface AST → Core AST desugaring (spec §4.3): pure structural rewriting
//! that preserves semantics and source spans.

use crate::ast as sf;
use crate::core_ast as core;
use crate::tokens::Span;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DesugarError {
    #[error("or-pattern alternatives must bind the same names")]
    OrPatternMismatch { span: Span },
    #[error("spread target must be a list or record expression")]
    InvalidSpread { span: Span },
}

impl DesugarError {
    pub fn span(&self) -> Span {
        match self {
            DesugarError::OrPatternMismatch { span } => *span,
            DesugarError::InvalidSpread { span } => *span,
        }
    }
}

/// Monotone fresh-name counter; prefixes (`$tmp`, `$loop`) cannot collide
/// with user identifiers, which must start with an XID_Start character or
/// underscore followed by further XID_Continue characters (never `$`).
pub struct FreshGen {
    counter: u64,
}

impl FreshGen {
    pub fn new() -> Self {
        Self { counter: 0 }
    }

    pub fn fresh(&mut self, prefix: &str) -> String {
        let name = format!("{prefix}{}", self.counter);
        self.counter += 1;
        name
    }
}

impl Default for FreshGen {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Desugarer {
    fresh: FreshGen,
    errors: Vec<DesugarError>,
}

impl Desugarer {
    pub fn new(fresh: FreshGen) -> Self {
        Self {
            fresh,
            errors: Vec::new(),
        }
    }

    pub fn desugar_module(mut self, module: sf::Module) -> (core::Module, Vec<DesugarError>, FreshGen) {
        let decls = module
            .decls
            .into_iter()
            .flat_map(|d| self.desugar_decl(d))
            .collect();
        let core_module = core::Module {
            decls,
            span: module.span,
        };
        (core_module, self.errors, self.fresh)
    }

    fn push_error(&mut self, e: DesugarError) {
        self.errors.push(e);
    }

    /// One surface declaration may expand into several core declarations
    /// (an `external { ... }` block flattens to its member bindings).
    fn desugar_decl(&mut self, decl: sf::Decl) -> Vec<core::Decl> {
        match decl {
            sf::Decl::Let(d) => match self.desugar_pattern(d.pattern) {
                Some(pattern) => vec![core::Decl::Let(core::LetDecl {
                    pattern,
                    value: self.desugar_expr(d.value),
                    mutable: d.mutable,
                    span: d.span,
                })],
                None => vec![],
            },
            sf::Decl::LetRecGroup(bindings, span) => vec![core::Decl::LetRecGroup(
                bindings
                    .into_iter()
                    .map(|b| self.desugar_let_binding(b))
                    .collect(),
                span,
            )],
            sf::Decl::Type(d) => vec![core::Decl::Type(self.desugar_type_decl(d))],
            sf::Decl::TypeGroup(decls, span) => vec![core::Decl::TypeGroup(
                decls.into_iter().map(|d| self.desugar_type_decl(d)).collect(),
                span,
            )],
            sf::Decl::External(d) => vec![core::Decl::External(core::ExternalDecl {
                name: d.name,
                ty: self.desugar_type(d.ty),
                js_expr: d.js_expr,
                span: d.span,
            })],
            sf::Decl::ExternalType(d) => vec![core::Decl::ExternalType(core::ExternalTypeDecl {
                name: d.name,
                arity: d.arity,
                span: d.span,
            })],
            sf::Decl::ExternalBlock(decls, _span) => decls
                .into_iter()
                .map(|d| {
                    core::Decl::External(core::ExternalDecl {
                        name: d.name,
                        ty: self.desugar_type(d.ty),
                        js_expr: d.js_expr,
                        span: d.span,
                    })
                })
                .collect(),
            sf::Decl::Import(d) => vec![core::Decl::Import(core::ImportDecl {
                path: d.path,
                names: match d.names {
                    sf::ImportNames::Wildcard => core::ImportNames::Wildcard,
                    sf::ImportNames::Named(n) => core::ImportNames::Named(n),
                },
                span: d.span,
            })],
            sf::Decl::Export(d) => vec![core::Decl::Export(core::ExportDecl {
                names: d.names,
                span: d.span,
            })],
        }
    }

    fn desugar_let_binding(&mut self, b: sf::LetBinding) -> core::LetBinding {
        let span = b.span;
        let mut body = self.desugar_expr(b.body);
        for param in b.params.into_iter().rev() {
            let Some(p) = self.desugar_pattern(param) else {
                continue;
            };
            let s = p.span().merge(body.span());
            body = core::Expr::Lambda {
                param: p,
                body: Box::new(body),
                span: s,
            };
        }
        core::LetBinding {
            name: b.name,
            body,
            span,
        }
    }

    fn desugar_type_decl(&mut self, d: sf::TypeDecl) -> core::TypeDecl {
        core::TypeDecl {
            name: d.name,
            params: d.params,
            def: match d.def {
                sf::TypeDef::Alias(t) => core::TypeDef::Alias(self.desugar_type(t)),
                sf::TypeDef::Record(fields) => core::TypeDef::Record(
                    fields
                        .into_iter()
                        .map(|(n, t)| (n, self.desugar_type(t)))
                        .collect(),
                ),
                sf::TypeDef::Variant(ctors) => {
                    core::TypeDef::Variant(ctors.into_iter().map(|c| self.desugar_ctor(c)).collect())
                }
            },
            span: d.span,
        }
    }

    fn desugar_ctor(&mut self, c: sf::VariantCtor) -> core::VariantCtor {
        core::VariantCtor {
            name: c.name,
            args: c.args.into_iter().map(|t| self.desugar_type(t)).collect(),
            span: c.span,
        }
    }

    fn desugar_type(&mut self, t: sf::TypeExpr) -> core::TypeExpr {
        match t {
            sf::TypeExpr::Var(n, s) => core::TypeExpr::Var(n, s),
            sf::TypeExpr::Named(n, s) => core::TypeExpr::Named(n, s),
            sf::TypeExpr::App(n, args, s) => {
                core::TypeExpr::App(n, args.into_iter().map(|a| self.desugar_type(a)).collect(), s)
            }
            sf::TypeExpr::Fun(params, result, s) => {
                let result = self.desugar_type(*result);
                let mut params: Vec<_> = params.into_iter().map(|p| self.desugar_type(p)).collect();
                let mut acc = result;
                while let Some(p) = params.pop() {
                    let span = p.span().merge(acc.span());
                    acc = core::TypeExpr::Fun(Box::new(p), Box::new(acc), span);
                }
                if let core::TypeExpr::Fun(..) = &acc {
                    acc
                } else {
                    // zero-param Fun never occurs from the parser, but keep
                    // the span-correct fallback for completeness.
                    core::TypeExpr::Fun(
                        Box::new(core::TypeExpr::Named("Unit".to_string(), s)),
                        Box::new(acc),
                        s,
                    )
                }
            }
            sf::TypeExpr::Record(fields, s) => core::TypeExpr::Record(
                fields.into_iter().map(|(n, t)| (n, self.desugar_type(t))).collect(),
                s,
            ),
            sf::TypeExpr::Variant(ctors, s) => {
                core::TypeExpr::Variant(ctors.into_iter().map(|c| self.desugar_ctor(c)).collect(), s)
            }
            sf::TypeExpr::Tuple(elems, s) => {
                core::TypeExpr::Tuple(elems.into_iter().map(|t| self.desugar_type(t)).collect(), s)
            }
            sf::TypeExpr::Union(alts, s) => {
                core::TypeExpr::Union(alts.into_iter().map(|t| self.desugar_type(t)).collect(), s)
            }
            sf::TypeExpr::Ref(inner, s) => core::TypeExpr::Ref(Box::new(self.desugar_type(*inner)), s),
        }
    }

    // ── patterns ─────────────────────────────────────────────────────

    /// Desugars a single non-or pattern; or-patterns are handled only at
    /// match-case granularity by `desugar_match_case` (they cannot appear
    /// nested inside another pattern per the surface grammar).
    fn desugar_pattern(&mut self, p: sf::Pattern) -> Option<core::Pattern> {
        match p {
            sf::Pattern::Wildcard(s) => Some(core::Pattern::Wildcard(s)),
            sf::Pattern::Var(n, s) => Some(core::Pattern::Var(n, s)),
            sf::Pattern::Int(n, s) => Some(core::Pattern::Int(n, s)),
            sf::Pattern::Float(n, s) => Some(core::Pattern::Float(n, s)),
            sf::Pattern::Str(n, s) => Some(core::Pattern::Str(n, s)),
            sf::Pattern::Bool(b, s) => Some(core::Pattern::Bool(b, s)),
            sf::Pattern::Unit(s) => Some(core::Pattern::Unit(s)),
            sf::Pattern::Ctor(name, args, s) => Some(core::Pattern::Ctor(
                name,
                args.into_iter().filter_map(|a| self.desugar_pattern(a)).collect(),
                s,
            )),
            sf::Pattern::Record(fields, s) => Some(core::Pattern::Record(
                fields
                    .into_iter()
                    .filter_map(|(n, p)| Some((n, self.desugar_pattern(p)?)))
                    .collect(),
                s,
            )),
            sf::Pattern::Tuple(elems, s) => Some(core::Pattern::Tuple(
                elems.into_iter().filter_map(|p| self.desugar_pattern(p)).collect(),
                s,
            )),
            sf::Pattern::List(elems, rest, s) => Some(self.desugar_list_pattern(elems, rest, s)),
            sf::Pattern::Or(alts, s) => {
                // Nested or-patterns (inside a ctor/tuple/record slot) are
                // not expanded here; only top-level case patterns are. Treat
                // as a binding error upstream is unreachable because the
                // parser only places `Or` at case granularity in practice,
                // but defensively drop to the first alternative's shape.
                self.push_error(DesugarError::OrPatternMismatch { span: s });
                alts.into_iter().next().and_then(|p| self.desugar_pattern(p))
            }
            sf::Pattern::Annotated(inner, _, _) => self.desugar_pattern(*inner),
        }
    }

    fn desugar_list_pattern(
        &mut self,
        elems: Vec<sf::Pattern>,
        rest: Option<Box<sf::Pattern>>,
        span: Span,
    ) -> core::Pattern {
        let tail = match rest {
            Some(r) => self.desugar_pattern(*r).unwrap_or(core::Pattern::Wildcard(span)),
            None => core::Pattern::Ctor(core::NIL_CTOR.to_string(), vec![], span),
        };
        elems.into_iter().rev().fold(tail, |acc, p| {
            let Some(p) = self.desugar_pattern(p) else {
                return acc;
            };
            let s = p.span().merge(acc.span());
            core::Pattern::Ctor(core::CONS_CTOR.to_string(), vec![p, acc], s)
        })
    }

    /// Expands or-patterns into N case copies sharing the guard and body,
    /// after checking every alternative binds the same variable set.
    fn desugar_match_case(&mut self, case: sf::MatchCase) -> Vec<core::MatchCase> {
        let guard = case.guard.map(|g| self.desugar_expr(g));
        let body = self.desugar_expr(case.body);
        match case.pattern {
            sf::Pattern::Or(alts, span) => {
                if let Some(first) = alts.first() {
                    let mut expected = Vec::new();
                    first.bound_names(&mut expected);
                    expected.sort();
                    for alt in &alts[1..] {
                        let mut names = Vec::new();
                        alt.bound_names(&mut names);
                        names.sort();
                        if names != expected {
                            self.push_error(DesugarError::OrPatternMismatch { span });
                        }
                    }
                }
                alts.into_iter()
                    .filter_map(|p| self.desugar_pattern(p))
                    .map(|p| core::MatchCase {
                        pattern: p,
                        guard: guard.clone(),
                        body: body.clone(),
                        span,
                    })
                    .collect()
            }
            other => {
                let span = case.span;
                match self.desugar_pattern(other) {
                    Some(p) => vec![core::MatchCase {
                        pattern: p,
                        guard,
                        body,
                        span,
                    }],
                    None => vec![],
                }
            }
        }
    }

    // ── expressions ──────────────────────────────────────────────────

    pub fn desugar_expr(&mut self, e: sf::Expr) -> core::Expr {
        match e {
            sf::Expr::Int(n, s) => core::Expr::Int(n, s),
            sf::Expr::Float(n, s) => core::Expr::Float(n, s),
            sf::Expr::Str(n, s) => core::Expr::Str(n, s),
            sf::Expr::Bool(b, s) => core::Expr::Bool(b, s),
            sf::Expr::Unit(s) => core::Expr::Unit(s),
            sf::Expr::Var(n, s) => core::Expr::Var(n, s),
            sf::Expr::Let {
                pattern,
                value,
                body,
                span,
                ..
            } => {
                let value = self.desugar_expr(*value);
                let body = self.desugar_expr(*body);
                match self.desugar_pattern(pattern) {
                    Some(p) => core::Expr::Let {
                        pattern: p,
                        value: Box::new(value),
                        body: Box::new(body),
                        span,
                    },
                    None => body,
                }
            }
            sf::Expr::LetRec { bindings, body, span } => core::Expr::LetRec {
                bindings: bindings.into_iter().map(|b| self.desugar_let_binding(b)).collect(),
                body: Box::new(self.desugar_expr(*body)),
                span,
            },
            sf::Expr::Lambda { params, body, span } => self.desugar_lambda(params, *body, span),
            sf::Expr::App { func, args, span } => self.desugar_app(*func, args, span),
            sf::Expr::If {
                cond,
                then_branch,
                else_branch,
                span,
            } => core::Expr::If {
                cond: Box::new(self.desugar_expr(*cond)),
                then_branch: Box::new(self.desugar_expr(*then_branch)),
                else_branch: Box::new(self.desugar_expr(*else_branch)),
                span,
            },
            sf::Expr::Match { scrutinee, cases, span } => core::Expr::Match {
                scrutinee: Box::new(self.desugar_expr(*scrutinee)),
                cases: cases.into_iter().flat_map(|c| self.desugar_match_case(c)).collect(),
                span,
            },
            sf::Expr::BinOp { op, lhs, rhs, span } => self.desugar_binop(op, *lhs, *rhs, span),
            sf::Expr::UnaryOp { op, operand, span } => core::Expr::UnaryOp {
                op: match op {
                    sf::UnaryOpKind::Neg => core::UnaryOpKind::Neg,
                    // `Deref` vs `NotBool` is resolved by the type checker
                    // (spec §3.2); the desugarer keeps `NotBool` as the
                    // provisional tag and the checker reinterprets it when
                    // the operand's type proves to be a `Ref`.
                    sf::UnaryOpKind::Bang => core::UnaryOpKind::NotBool,
                },
                operand: Box::new(self.desugar_expr(*operand)),
                span,
            },
            sf::Expr::Pipe { lhs, rhs, span } => {
                let arg = self.desugar_expr(*lhs);
                let func = self.desugar_expr(*rhs);
                core::Expr::App {
                    func: Box::new(func),
                    arg: Box::new(arg),
                    span,
                }
            }
            sf::Expr::Compose {
                lhs,
                rhs,
                reversed,
                span,
            } => self.desugar_compose(*lhs, *rhs, reversed, span),
            sf::Expr::Record { fields, span } => self.desugar_record(fields, span),
            sf::Expr::RecordAccess { record, field, span } => core::Expr::RecordAccess {
                record: Box::new(self.desugar_expr(*record)),
                field,
                span,
            },
            sf::Expr::RecordUpdate { record, fields, span } => core::Expr::RecordUpdate {
                base: Box::new(self.desugar_expr(*record)),
                updates: fields
                    .into_iter()
                    .map(|f| self.desugar_record_field(f))
                    .collect(),
                span,
            },
            sf::Expr::List { elements, span } => self.desugar_list(elements, span),
            sf::Expr::Tuple { elements, span } => core::Expr::Tuple {
                elements: elements.into_iter().map(|e| self.desugar_expr(e)).collect(),
                span,
            },
            sf::Expr::Block { statements, span } => self.desugar_block(statements, span),
            sf::Expr::While { cond, body, span } => self.desugar_while(*cond, *body, span),
            sf::Expr::TypeAnnotation { expr, ty, span } => core::Expr::TypeAnnotation {
                expr: Box::new(self.desugar_expr(*expr)),
                ty: self.desugar_type(ty),
                span,
            },
            sf::Expr::Unsafe { expr, span } => core::Expr::Unsafe {
                expr: Box::new(self.desugar_expr(*expr)),
                span,
            },
        }
    }

    fn desugar_lambda(&mut self, params: Vec<sf::Pattern>, body: sf::Expr, span: Span) -> core::Expr {
        let body = self.desugar_expr(body);
        let mut params: Vec<_> = params.into_iter().filter_map(|p| self.desugar_pattern(p)).collect();
        if params.is_empty() {
            return body;
        }
        let last = params.pop().unwrap_or(core::Pattern::Wildcard(span));
        let mut acc = core::Expr::Lambda {
            param: last,
            body: Box::new(body),
            span,
        };
        while let Some(p) = params.pop() {
            let s = p.span().merge(acc.span());
            acc = core::Expr::Lambda {
                param: p,
                body: Box::new(acc),
                span: s,
            };
        }
        acc
    }

    fn desugar_app(&mut self, func: sf::Expr, args: Vec<sf::Expr>, span: Span) -> core::Expr {
        let func = self.desugar_expr(func);
        args.into_iter().fold(func, |acc, a| {
            let arg = self.desugar_expr(a);
            let s = acc.span().merge(arg.span());
            core::Expr::App {
                func: Box::new(acc),
                arg: Box::new(arg),
                span: s,
            }
        })
    }

    fn desugar_compose(&mut self, lhs: sf::Expr, rhs: sf::Expr, reversed: bool, span: Span) -> core::Expr {
        let f = self.desugar_expr(lhs);
        let g = self.desugar_expr(rhs);
        let x_name = self.fresh.fresh("$compose");
        let x = core::Expr::Var(x_name.clone(), span);
        let (outer, inner) = if reversed { (f, g) } else { (g, f) };
        let inner_call = core::Expr::App {
            func: Box::new(inner),
            arg: Box::new(x),
            span,
        };
        let outer_call = core::Expr::App {
            func: Box::new(outer),
            arg: Box::new(inner_call),
            span,
        };
        core::Expr::Lambda {
            param: core::Pattern::Var(x_name, span),
            body: Box::new(outer_call),
            span,
        }
    }

    fn desugar_record(&mut self, fields: Vec<sf::RecordFieldExpr>, span: Span) -> core::Expr {
        core::Expr::Record {
            fields: fields.into_iter().map(|f| self.desugar_record_field(f)).collect(),
            span,
        }
    }

    fn desugar_record_field(&mut self, f: sf::RecordFieldExpr) -> core::RecordFieldExpr {
        match f {
            sf::RecordFieldExpr::Named(n, e) => core::RecordFieldExpr::Named(n, self.desugar_expr(e)),
            sf::RecordFieldExpr::Spread(e) => core::RecordFieldExpr::Spread(self.desugar_expr(e)),
        }
    }

    /// `::` lowers to the same `Cons` constructor the list-literal sugar
    /// uses; every other operator is retained as a core `BinOp` (spec §4.3).
    fn desugar_binop(&mut self, op: sf::BinOpKind, lhs: sf::Expr, rhs: sf::Expr, span: Span) -> core::Expr {
        let lhs = self.desugar_expr(lhs);
        let rhs = self.desugar_expr(rhs);
        if op == sf::BinOpKind::Cons {
            return core::Expr::Variant {
                name: core::CONS_CTOR.to_string(),
                args: vec![lhs, rhs],
                span,
            };
        }
        let op = match op {
            sf::BinOpKind::Add => core::BinOpKind::Add,
            sf::BinOpKind::Sub => core::BinOpKind::Sub,
            sf::BinOpKind::Mul => core::BinOpKind::Mul,
            sf::BinOpKind::Div => core::BinOpKind::Div,
            sf::BinOpKind::Mod => core::BinOpKind::Mod,
            sf::BinOpKind::Pow => core::BinOpKind::Pow,
            sf::BinOpKind::Eq => core::BinOpKind::Eq,
            sf::BinOpKind::NotEq => core::BinOpKind::NotEq,
            sf::BinOpKind::Lt => core::BinOpKind::Lt,
            sf::BinOpKind::LtEq => core::BinOpKind::LtEq,
            sf::BinOpKind::Gt => core::BinOpKind::Gt,
            sf::BinOpKind::GtEq => core::BinOpKind::GtEq,
            sf::BinOpKind::And => core::BinOpKind::And,
            sf::BinOpKind::Or => core::BinOpKind::Or,
            sf::BinOpKind::Concat => core::BinOpKind::Concat,
            sf::BinOpKind::Assign => core::BinOpKind::Assign,
            sf::BinOpKind::Cons => unreachable!("handled above"),
        };
        core::Expr::BinOp {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            span,
        }
    }

    /// Right-associated `Cons` chain; a run of spreads and plain elements is
    /// folded right-to-left, with each spread becoming a `List.concat` call
    /// against the already-built tail.
    fn desugar_list(&mut self, elements: Vec<sf::ListElem>, span: Span) -> core::Expr {
        let tail = core::Expr::Variant {
            name: core::NIL_CTOR.to_string(),
            args: vec![],
            span,
        };
        elements.into_iter().rev().fold(tail, |acc, elem| match elem {
            sf::ListElem::Item(e) => {
                let e = self.desugar_expr(e);
                let s = e.span().merge(acc.span());
                core::Expr::Variant {
                    name: core::CONS_CTOR.to_string(),
                    args: vec![e, acc],
                    span: s,
                }
            }
            sf::ListElem::Spread(e) => {
                let e = self.desugar_expr(e);
                let s = e.span().merge(acc.span());
                core::Expr::App {
                    func: Box::new(core::Expr::App {
                        func: Box::new(core::Expr::Var("List.concat".to_string(), s)),
                        arg: Box::new(e),
                        span: s,
                    }),
                    arg: Box::new(acc),
                    span: s,
                }
            }
        })
    }

    /// `while c { body }` → `letrec $loop = () => match c { true => { body;
    /// $loop() } | false => () } ; $loop()` with a fresh loop name.
    fn desugar_while(&mut self, cond: sf::Expr, body: sf::Expr, span: Span) -> core::Expr {
        let cond = self.desugar_expr(cond);
        let body = self.desugar_expr(body);
        let loop_name = self.fresh.fresh("$loop");
        let call_loop = core::Expr::App {
            func: Box::new(core::Expr::Var(loop_name.clone(), span)),
            arg: Box::new(core::Expr::Unit(span)),
            span,
        };
        let continue_body = core::Expr::Let {
            pattern: core::Pattern::Wildcard(span),
            value: Box::new(body),
            body: Box::new(call_loop.clone()),
            span,
        };
        let match_expr = core::Expr::Match {
            scrutinee: Box::new(cond),
            cases: vec![
                core::MatchCase {
                    pattern: core::Pattern::Bool(true, span),
                    guard: None,
                    body: continue_body,
                    span,
                },
                core::MatchCase {
                    pattern: core::Pattern::Bool(false, span),
                    guard: None,
                    body: core::Expr::Unit(span),
                    span,
                },
            ],
            span,
        };
        let loop_binding = core::LetBinding {
            name: loop_name,
            body: core::Expr::Lambda {
                param: core::Pattern::Unit(span),
                body: Box::new(match_expr),
                span,
            },
            span,
        };
        core::Expr::LetRec {
            bindings: vec![loop_binding],
            body: Box::new(call_loop),
            span,
        }
    }

    /// `{ s1; s2; ...; sn }` → right-folded `Let{_, s_i, next}`; the parser
    /// always supplies a trailing `Unit` statement for a final `;`, so the
    /// last element of `statements` is always the block's value.
    fn desugar_block(&mut self, statements: Vec<sf::Expr>, span: Span) -> core::Expr {
        let mut exprs: Vec<core::Expr> = statements.into_iter().map(|e| self.desugar_expr(e)).collect();
        let Some(last) = exprs.pop() else {
            return core::Expr::Unit(span);
        };
        exprs.into_iter().rev().fold(last, |acc, e| {
            let s = e.span().merge(acc.span());
            core::Expr::Let {
                pattern: core::Pattern::Wildcard(s),
                value: Box::new(e),
                body: Box::new(acc),
                span: s,
            }
        })
    }
}

pub fn desugar(module: sf::Module, fresh: FreshGen) -> (core::Module, Vec<DesugarError>, FreshGen) {
    Desugarer::new(fresh).desugar_module(module)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;
    use crate::parser::parse;

    fn desugar_src(src: &str) -> (core::Module, Vec<DesugarError>) {
        let tokens = lex(src, 0).expect("lex ok");
        let (m, perrs) = parse(tokens, 10);
        assert!(perrs.is_empty(), "parse errors: {perrs:?}");
        let (core_m, errs, _) = desugar(m, FreshGen::new());
        (core_m, errs)
    }

    #[test]
    fn curried_lambda_desugars_to_nested_single_param() {
        let (m, errs) = desugar_src("let add = (x, y) => x + y;");
        assert!(errs.is_empty());
        match &m.decls[0] {
            core::Decl::Let(d) => match &d.value {
                core::Expr::Lambda { param, body, .. } => {
                    assert!(matches!(param, core::Pattern::Var(n, _) if n == "x"));
                    assert!(matches!(**body, core::Expr::Lambda { .. }));
                }
                other => panic!("expected lambda, got {other:?}"),
            },
            other => panic!("expected let decl, got {other:?}"),
        }
    }

    #[test]
    fn pipe_desugars_to_application() {
        let (m, errs) = desugar_src("let h = 3 |> f;");
        assert!(errs.is_empty());
        match &m.decls[0] {
            core::Decl::Let(d) => assert!(matches!(d.value, core::Expr::App { .. })),
            other => panic!("expected let decl, got {other:?}"),
        }
    }

    #[test]
    fn list_literal_desugars_to_cons_nil_chain() {
        let (m, errs) = desugar_src("let xs = [1, 2];");
        assert!(errs.is_empty());
        match &m.decls[0] {
            core::Decl::Let(d) => match &d.value {
                core::Expr::Variant { name, args, .. } => {
                    assert_eq!(name, "Cons");
                    assert_eq!(args.len(), 2);
                    match &args[1] {
                        core::Expr::Variant { name, args, .. } => {
                            assert_eq!(name, "Cons");
                            assert!(matches!(args[1], core::Expr::Variant { ref name, .. } if name == "Nil"));
                        }
                        other => panic!("expected nested Cons, got {other:?}"),
                    }
                }
                other => panic!("expected Cons variant, got {other:?}"),
            },
            other => panic!("expected let decl, got {other:?}"),
        }
    }

    #[test]
    fn or_pattern_expands_to_multiple_cases() {
        let (m, errs) = desugar_src("let f = match n { | 0 | 1 => \"s\" | _ => \"m\" };");
        assert!(errs.is_empty());
        match &m.decls[0] {
            core::Decl::Let(d) => match &d.value {
                core::Expr::Match { cases, .. } => assert_eq!(cases.len(), 3),
                other => panic!("expected match, got {other:?}"),
            },
            other => panic!("expected let decl, got {other:?}"),
        }
    }

    #[test]
    fn mismatched_or_pattern_bindings_reported() {
        let (_, errs) = desugar_src("let f = match n { | Some(x) | None => 0 };");
        assert!(!errs.is_empty());
    }

    #[test]
    fn while_desugars_to_letrec_loop() {
        let (m, errs) = desugar_src("let f = (x) => { while true { x }; () };");
        assert!(errs.is_empty());
        match &m.decls[0] {
            core::Decl::Let(d) => match &d.value {
                core::Expr::Lambda { body, .. } => {
                    assert!(matches!(**body, core::Expr::Let { .. }));
                }
                other => panic!("expected lambda, got {other:?}"),
            },
            other => panic!("expected let decl, got {other:?}"),
        }
    }

    #[test]
    fn block_folds_into_nested_lets() {
        let (m, errs) = desugar_src("let f = (x) => { let y = x; y };");
        assert!(errs.is_empty());
        match &m.decls[0] {
            core::Decl::Let(d) => match &d.value {
                core::Expr::Lambda { body, .. } => assert!(matches!(**body, core::Expr::Let { .. })),
                other => panic!("expected lambda, got {other:?}"),
            },
            other => panic!("expected let decl, got {other:?}"),
        }
    }
}
