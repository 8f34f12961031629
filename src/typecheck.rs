//! The inference traversal (spec §4.4.3-§4.4.6) tying together the unifier,
//! the persistent environment, and exhaustiveness checking.

use crate::core_ast::{
    BinOpKind, Decl, ExportDecl, ExternalDecl, ExternalTypeDecl, ImportDecl, ImportNames,
    LetBinding, LetDecl, MatchCase, Module, Pattern, RecordFieldExpr, TypeDecl, TypeDef, TypeExpr,
    UnaryOpKind, Expr,
};
use crate::diagnostics::Diagnostic;
use crate::error_codes::ErrorCode;
use crate::exhaustive::{check_match, ExhaustivenessCtx};
use crate::tokens::Span;
use crate::types::{ModuleInterface, Type, TypeCtor, TypeEnv, TypeScheme};
use crate::unify::{unify, Engine, UnifyError};
use std::collections::HashMap;

pub struct TypeChecker {
    engine: Engine,
    diagnostics: Vec<Diagnostic>,
    max_errors: usize,
    emit_unreachable_warnings: bool,
    emit_unused_binding_warnings: bool,
    aliases: HashMap<String, (Vec<String>, TypeExpr)>,
    exh_ctx: ExhaustivenessCtx,
    /// Ids of fresh vars introduced by an arithmetic/comparison operator or
    /// `Neg`, still unresolved and thus candidates for Int-defaulting at the
    /// next generalisation boundary (spec §4.4.5).
    numeric_vars: std::collections::HashSet<crate::types::VarId>,
}

impl TypeChecker {
    pub fn new(max_errors: usize, emit_unreachable_warnings: bool, emit_unused_binding_warnings: bool) -> Self {
        TypeChecker {
            engine: Engine::new(),
            diagnostics: Vec::new(),
            max_errors,
            emit_unreachable_warnings,
            emit_unused_binding_warnings,
            aliases: HashMap::new(),
            exh_ctx: ExhaustivenessCtx::default(),
            numeric_vars: std::collections::HashSet::new(),
        }
    }

    /// Constrains `ty` to be a ground numeric type (`Int`/`Float`) or a var
    /// that will be defaulted to `Int` if it's still unresolved when its
    /// binding generalises (spec §4.4.5).
    fn constrain_numeric(&mut self, ty: &Type, span: Span) -> Type {
        match ty.prune() {
            v @ Type::Var(_) => {
                if let Type::Var(cell) = &v {
                    self.numeric_vars.insert(cell.borrow().id);
                }
                v
            }
            v @ Type::Const(_) if matches!(v, Type::Const("Int") | Type::Const("Float")) => v,
            Type::Error => Type::Error,
            other => {
                let d = Diagnostic::new(
                    ErrorCode::TypeMismatch,
                    format!("expected a numeric type, found `{other}`"),
                    span,
                )
                .with_expected_actual("Int or Float".to_string(), other.to_string());
                self.push(d);
                Type::Error
            }
        }
    }

    /// Binds every still-unresolved var in `ty` that was constrained numeric
    /// to `Int`, before it would otherwise be quantified by `generalize`.
    fn default_numeric_vars(&self, ty: &Type) {
        match ty.prune() {
            Type::Var(cell) => {
                let id = cell.borrow().id;
                if self.numeric_vars.contains(&id) {
                    cell.borrow_mut().bound = Some(Type::int());
                }
            }
            Type::App(_, args) | Type::Tuple(args) | Type::Union(args) | Type::Variant(_, args) => {
                for a in &args {
                    self.default_numeric_vars(a);
                }
            }
            Type::Fun(p, r) => {
                self.default_numeric_vars(&p);
                self.default_numeric_vars(&r);
            }
            Type::Record(fields) => {
                for (_, t) in &fields {
                    self.default_numeric_vars(t);
                }
            }
            Type::Ref(inner) => self.default_numeric_vars(&inner),
            Type::Const(_) | Type::Error => {}
        }
    }

    fn budget_exhausted(&self) -> bool {
        use crate::diagnostics::Severity;
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
            >= self.max_errors
    }

    fn push(&mut self, d: Diagnostic) {
        self.diagnostics.push(d);
    }

    fn report_unify(&mut self, err: UnifyError, span: Span) {
        let (code, message, expected, actual) = match err {
            UnifyError::Mismatch { lhs, rhs } => (
                ErrorCode::TypeMismatch,
                format!("expected `{lhs}`, found `{rhs}`"),
                Some(lhs.to_string()),
                Some(rhs.to_string()),
            ),
            UnifyError::Occurs { var, ty } => (
                ErrorCode::TypeOccursCheck,
                format!("infinite type: 't{var}' occurs in `{ty}`"),
                None,
                None,
            ),
            UnifyError::MissingField { field } => (
                ErrorCode::TypeMissingRecordField,
                format!("record is missing field `{field}`"),
                None,
                None,
            ),
            UnifyError::TupleArity { lhs, rhs } => (
                ErrorCode::TypeArityMismatch,
                format!("tuple arity mismatch: {lhs} vs {rhs}"),
                None,
                None,
            ),
        };
        let mut d = Diagnostic::new(code, message, span);
        if let (Some(e), Some(a)) = (expected, actual) {
            d = d.with_expected_actual(e, a);
        }
        self.push(d);
    }

    fn unify_or_report(&mut self, t1: &Type, t2: &Type, span: Span) -> Type {
        match unify(t1, t2) {
            Ok(()) => t1.clone(),
            Err(e) => {
                self.report_unify(e, span);
                Type::Error
            }
        }
    }

    pub fn diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    pub fn check_module(
        &mut self,
        module: &Module,
        mut env: TypeEnv,
        module_iface: Option<&dyn ModuleInterface>,
    ) -> TypeEnv {
        for decl in &module.decls {
            if self.budget_exhausted() {
                break;
            }
            env = self.check_decl(env, decl, module_iface);
        }
        env
    }

    fn check_decl(&mut self, env: TypeEnv, decl: &Decl, module_iface: Option<&dyn ModuleInterface>) -> TypeEnv {
        match decl {
            Decl::Let(d) => self.check_let_decl(env, d),
            Decl::LetRecGroup(bindings, span) => self.check_letrec_group(env, bindings, *span),
            Decl::Type(d) => self.register_type_decl(env, d),
            Decl::TypeGroup(decls, _) => {
                let mut new_env = env;
                for d in decls {
                    new_env = new_env.extend_type(d.name.clone(), TypeCtor { name: d.name.clone(), arity: d.params.len() });
                    if let TypeDef::Variant(ctors) = &d.def {
                        for c in ctors {
                            self.exh_ctx.ctor_to_type.insert(c.name.clone(), d.name.clone());
                            self.exh_ctx.ctor_arities.insert(c.name.clone(), c.args.len());
                        }
                        self.exh_ctx
                            .variants_by_type
                            .insert(d.name.clone(), ctors.iter().map(|c| (c.name.clone(), c.args.len())).collect());
                    }
                }
                for d in decls {
                    new_env = self.register_type_decl(new_env, d);
                }
                new_env
            }
            Decl::External(d) => self.check_external(env, d),
            Decl::ExternalType(d) => self.check_external_type(env, d),
            Decl::Import(d) => self.check_import(env, d, module_iface),
            Decl::Export(d) => self.check_export(env, d),
        }
    }

    fn check_let_decl(&mut self, env: TypeEnv, d: &LetDecl) -> TypeEnv {
        self.engine.enter_level();
        let vt = self.infer_expr(&env, &d.value);
        self.engine.leave_level();
        let is_value = d.value.is_syntactic_value();
        let bindings = self.check_pattern(&env, &d.pattern, &vt);
        let mut new_env = env;
        for (name, ty) in bindings {
            let scheme = if is_value {
                self.default_numeric_vars(&ty);
                let (quantified, body) = self.engine.generalize(&ty);
                TypeScheme { quantified, body }
            } else {
                TypeScheme::monomorphic(ty)
            };
            new_env = new_env.extend_value(name, scheme);
        }
        new_env
    }

    fn check_letrec_group(&mut self, env: TypeEnv, bindings: &[LetBinding], _span: Span) -> TypeEnv {
        self.engine.enter_level();
        let mut rec_env = env.clone();
        let mut placeholders = Vec::new();
        for b in bindings {
            let v = self.engine.fresh_var();
            rec_env = rec_env.extend_value(b.name.clone(), TypeScheme::monomorphic(v.clone()));
            placeholders.push(v);
        }
        let mut body_types = Vec::new();
        for (b, placeholder) in bindings.iter().zip(placeholders.iter()) {
            let bt = self.infer_expr(&rec_env, &b.body);
            if let Err(e) = unify(placeholder, &bt) {
                self.report_unify(e, b.span);
            }
            body_types.push(bt);
        }
        self.engine.leave_level();

        let mut final_env = env;
        for (b, placeholder) in bindings.iter().zip(placeholders.iter()) {
            let is_value = b.body.is_syntactic_value();
            let scheme = if is_value {
                self.default_numeric_vars(placeholder);
                let (quantified, body) = self.engine.generalize(placeholder);
                TypeScheme { quantified, body }
            } else {
                TypeScheme::monomorphic(placeholder.clone())
            };
            final_env = final_env.extend_value(b.name.clone(), scheme);
        }
        final_env
    }

    fn register_type_decl(&mut self, env: TypeEnv, d: &TypeDecl) -> TypeEnv {
        let mut new_env = env.extend_type(d.name.clone(), TypeCtor { name: d.name.clone(), arity: d.params.len() });
        match &d.def {
            TypeDef::Alias(texpr) => {
                self.aliases.insert(d.name.clone(), (d.params.clone(), texpr.clone()));
                new_env
            }
            TypeDef::Record(fields) => {
                let texpr = TypeExpr::Record(fields.clone(), d.span);
                self.aliases.insert(d.name.clone(), (d.params.clone(), texpr));
                new_env
            }
            TypeDef::Variant(ctors) => {
                self.exh_ctx
                    .variants_by_type
                    .insert(d.name.clone(), ctors.iter().map(|c| (c.name.clone(), c.args.len())).collect());
                for ctor in ctors {
                    self.exh_ctx.ctor_to_type.insert(ctor.name.clone(), d.name.clone());
                    self.exh_ctx.ctor_arities.insert(ctor.name.clone(), ctor.args.len());

                    self.engine.enter_level();
                    let mut vars_map = HashMap::new();
                    for p in &d.params {
                        vars_map.insert(p.clone(), self.engine.fresh_var());
                    }
                    let arg_types: Vec<Type> = ctor
                        .args
                        .iter()
                        .map(|a| self.elaborate_type(&new_env, &mut vars_map, a))
                        .collect();
                    let result_type = Type::App(
                        d.name.clone(),
                        d.params.iter().map(|p| vars_map[p].clone()).collect(),
                    );
                    let mut ctor_ty = result_type;
                    for at in arg_types.into_iter().rev() {
                        ctor_ty = Type::Fun(Box::new(at), Box::new(ctor_ty));
                    }
                    self.engine.leave_level();
                    self.default_numeric_vars(&ctor_ty);
                    let (quantified, body) = self.engine.generalize(&ctor_ty);
                    new_env = new_env.extend_ctor(ctor.name.clone(), TypeScheme { quantified, body });
                }
                new_env
            }
        }
    }

    fn check_external(&mut self, env: TypeEnv, d: &ExternalDecl) -> TypeEnv {
        self.engine.enter_level();
        let mut vars_map = HashMap::new();
        let ty = self.elaborate_type(&env, &mut vars_map, &d.ty);
        self.engine.leave_level();
        self.default_numeric_vars(&ty);
        let (quantified, body) = self.engine.generalize(&ty);
        env.extend_value(d.name.clone(), TypeScheme { quantified, body })
    }

    fn check_external_type(&mut self, env: TypeEnv, d: &ExternalTypeDecl) -> TypeEnv {
        env.extend_type(d.name.clone(), TypeCtor { name: d.name.clone(), arity: d.arity })
    }

    fn check_import(&mut self, mut env: TypeEnv, d: &ImportDecl, module_iface: Option<&dyn ModuleInterface>) -> TypeEnv {
        let Some(iface) = module_iface else {
            return env;
        };
        match &d.names {
            ImportNames::Wildcard => env,
            ImportNames::Named(names) => {
                for (name, alias) in names {
                    let local_name = alias.clone().unwrap_or_else(|| name.clone());
                    if let Some(scheme) = iface.lookup_value(name) {
                        env = env.extend_value(local_name.clone(), scheme);
                    } else if let Some(ctor) = iface.lookup_type(name) {
                        env = env.extend_type(local_name, ctor);
                    } else {
                        self.push(Diagnostic::new(
                            ErrorCode::TypeUndefinedVariable,
                            format!("import `{}` not found in module `{}`", name, d.path.join(".")),
                            d.span,
                        ));
                    }
                }
                env
            }
        }
    }

    fn check_export(&mut self, env: TypeEnv, d: &ExportDecl) -> TypeEnv {
        for name in &d.names {
            if env.lookup_value(name).is_none() && env.lookup_type(name).is_none() {
                self.push(Diagnostic::new(
                    ErrorCode::TypeUndefinedVariable,
                    format!("cannot export undefined name `{name}`"),
                    d.span,
                ));
            }
        }
        env
    }

    // ---- type expression elaboration ----

    fn elaborate_type(&mut self, env: &TypeEnv, vars: &mut HashMap<String, Type>, texpr: &TypeExpr) -> Type {
        match texpr {
            TypeExpr::Var(name, _) => vars.entry(name.clone()).or_insert_with(|| self.engine.fresh_var()).clone(),
            TypeExpr::Named(name, span) => self.elaborate_named_or_app(env, vars, name, &[], *span),
            TypeExpr::App(name, args, span) => {
                let arg_types: Vec<Type> = args.iter().map(|a| self.elaborate_type(env, vars, a)).collect();
                self.elaborate_named_or_app(env, vars, name, &arg_types, *span)
            }
            TypeExpr::Fun(p, r, _) => Type::Fun(
                Box::new(self.elaborate_type(env, vars, p)),
                Box::new(self.elaborate_type(env, vars, r)),
            ),
            TypeExpr::Record(fields, _) => Type::Record(
                fields.iter().map(|(n, t)| (n.clone(), self.elaborate_type(env, vars, t))).collect(),
            ),
            TypeExpr::Variant(ctors, _) => Type::Union(
                ctors
                    .iter()
                    .map(|c| Type::Variant(c.name.clone(), c.args.iter().map(|a| self.elaborate_type(env, vars, a)).collect()))
                    .collect(),
            ),
            TypeExpr::Tuple(elems, _) => Type::Tuple(elems.iter().map(|t| self.elaborate_type(env, vars, t)).collect()),
            TypeExpr::Union(alts, _) => Type::Union(alts.iter().map(|t| self.elaborate_type(env, vars, t)).collect()),
            TypeExpr::Ref(inner, _) => Type::Ref(Box::new(self.elaborate_type(env, vars, inner))),
        }
    }

    fn elaborate_named_or_app(&mut self, env: &TypeEnv, vars: &mut HashMap<String, Type>, name: &str, args: &[Type], span: Span) -> Type {
        match name {
            "Int" => Type::int(),
            "Float" => Type::float(),
            "String" => Type::string(),
            "Bool" => Type::bool(),
            "Unit" => Type::unit(),
            _ => {
                if let Some((params, body)) = self.aliases.get(name).cloned() {
                    let mut local_vars = HashMap::new();
                    for (p, a) in params.iter().zip(args.iter()) {
                        local_vars.insert(p.clone(), a.clone());
                    }
                    for p in &params {
                        local_vars.entry(p.clone()).or_insert_with(|| self.engine.fresh_var());
                    }
                    self.elaborate_type(env, &mut local_vars, &body)
                } else if env.lookup_type(name).is_some() {
                    Type::App(name.to_string(), args.to_vec())
                } else {
                    self.push(Diagnostic::new(
                        ErrorCode::TypeUndefinedTypeName,
                        format!("undefined type `{name}`"),
                        span,
                    ));
                    Type::Error
                }
            }
        }
    }

    // ---- pattern checking (spec §4.4.6) ----

    fn check_pattern(&mut self, env: &TypeEnv, pattern: &Pattern, expected: &Type) -> Vec<(String, Type)> {
        match pattern {
            Pattern::Wildcard(_) => vec![],
            Pattern::Var(name, _) => vec![(name.clone(), expected.clone())],
            Pattern::Int(_, span) => {
                self.unify_or_report(expected, &Type::int(), *span);
                vec![]
            }
            Pattern::Float(_, span) => {
                self.unify_or_report(expected, &Type::float(), *span);
                vec![]
            }
            Pattern::Str(_, span) => {
                self.unify_or_report(expected, &Type::string(), *span);
                vec![]
            }
            Pattern::Bool(_, span) => {
                self.unify_or_report(expected, &Type::bool(), *span);
                vec![]
            }
            Pattern::Unit(span) => {
                self.unify_or_report(expected, &Type::unit(), *span);
                vec![]
            }
            Pattern::Ctor(name, args, span) => {
                let Some(scheme) = env.lookup_ctor(name).cloned() else {
                    self.push(Diagnostic::new(
                        ErrorCode::TypeUndefinedConstructor,
                        format!("undefined constructor `{name}`"),
                        *span,
                    ));
                    for a in args {
                        self.check_pattern(env, a, &Type::Error);
                    }
                    return vec![];
                };
                let instantiated = self.engine.instantiate(&scheme.quantified, &scheme.body);
                let mut arg_types = Vec::new();
                let mut cur = instantiated;
                for _ in args {
                    match cur.prune() {
                        Type::Fun(p, r) => {
                            arg_types.push(*p);
                            cur = *r;
                        }
                        _ => {
                            self.push(Diagnostic::new(
                                ErrorCode::TypeArityMismatch,
                                format!("constructor `{name}` applied to too many arguments"),
                                *span,
                            ));
                            arg_types.push(Type::Error);
                        }
                    }
                }
                self.unify_or_report(expected, &cur, *span);
                let mut bindings = Vec::new();
                for (a, at) in args.iter().zip(arg_types.iter()) {
                    bindings.extend(self.check_pattern(env, a, at));
                }
                bindings
            }
            Pattern::Record(fields, span) => {
                let fresh_fields: Vec<(String, Type)> = fields.iter().map(|(n, _)| (n.clone(), self.engine.fresh_var())).collect();
                self.unify_or_report(expected, &Type::Record(fresh_fields.clone()), *span);
                let mut bindings = Vec::new();
                for ((_, p), (_, ft)) in fields.iter().zip(fresh_fields.iter()) {
                    bindings.extend(self.check_pattern(env, p, ft));
                }
                bindings
            }
            Pattern::Tuple(elems, span) => {
                let fresh: Vec<Type> = elems.iter().map(|_| self.engine.fresh_var()).collect();
                self.unify_or_report(expected, &Type::Tuple(fresh.clone()), *span);
                let mut bindings = Vec::new();
                for (p, t) in elems.iter().zip(fresh.iter()) {
                    bindings.extend(self.check_pattern(env, p, t));
                }
                bindings
            }
        }
    }

    // ---- expression inference (spec §4.4.4) ----

    fn infer_expr(&mut self, env: &TypeEnv, expr: &Expr) -> Type {
        match expr {
            Expr::Int(_, _) => Type::int(),
            Expr::Float(_, _) => Type::float(),
            Expr::Str(_, _) => Type::string(),
            Expr::Bool(_, _) => Type::bool(),
            Expr::Unit(_) => Type::unit(),
            // Surface constructor calls (`Some(1)`, `None`) desugar to a
            // plain `Var`/`App` chain, never to `Expr::Variant` — that node
            // is only built directly for list sugar. So a bare constructor
            // name is looked up in the value namespace first and the
            // constructor namespace second.
            Expr::Var(name, span) => match env.lookup_value(name).or_else(|| env.lookup_ctor(name)) {
                Some(scheme) => self.engine.instantiate(&scheme.quantified, &scheme.body),
                None => {
                    self.push(Diagnostic::new(
                        ErrorCode::TypeUndefinedVariable,
                        format!("undefined variable `{name}`"),
                        *span,
                    ));
                    Type::Error
                }
            },
            Expr::Let { pattern, value, body, .. } => {
                self.engine.enter_level();
                let vt = self.infer_expr(env, value);
                self.engine.leave_level();
                let is_value = value.is_syntactic_value();
                let bindings = self.check_pattern(env, pattern, &vt);
                let mut inner = env.clone();
                for (name, ty) in bindings {
                    let scheme = if is_value {
                        self.default_numeric_vars(&ty);
                        let (quantified, body) = self.engine.generalize(&ty);
                        TypeScheme { quantified, body }
                    } else {
                        TypeScheme::monomorphic(ty)
                    };
                    inner = inner.extend_value(name, scheme);
                }
                self.infer_expr(&inner, body)
            }
            Expr::LetRec { bindings, body, span } => {
                let inner = self.check_letrec_group(env.clone(), bindings, *span);
                self.infer_expr(&inner, body)
            }
            Expr::Lambda { param, body, .. } => {
                let a = self.engine.fresh_var();
                let bindings = self.check_pattern(env, param, &a);
                let inner = env.extend_values(bindings.into_iter().map(|(n, t)| (n, TypeScheme::monomorphic(t))));
                let bt = self.infer_expr(&inner, body);
                Type::Fun(Box::new(a), Box::new(bt))
            }
            Expr::App { func, arg, span } => {
                let ft = self.infer_expr(env, func);
                let at = self.infer_expr(env, arg);
                let r = self.engine.fresh_var();
                self.unify_or_report(&ft, &Type::Fun(Box::new(at), Box::new(r.clone())), *span);
                r
            }
            Expr::If { cond, then_branch, else_branch, span } => {
                let ct = self.infer_expr(env, cond);
                self.unify_or_report(&ct, &Type::bool(), cond.span());
                let tt = self.infer_expr(env, then_branch);
                let et = self.infer_expr(env, else_branch);
                self.unify_or_report(&tt, &et, *span);
                tt
            }
            Expr::Match { scrutinee, cases, span } => self.infer_match(env, scrutinee, cases, *span),
            Expr::BinOp { op, lhs, rhs, span } => self.infer_binop(env, *op, lhs, rhs, *span),
            Expr::UnaryOp { op, operand, span } => self.infer_unaryop(env, *op, operand, *span),
            Expr::Record { fields, .. } => {
                let mut field_types = Vec::new();
                for f in fields {
                    match f {
                        RecordFieldExpr::Named(name, e) => {
                            field_types.push((name.clone(), self.infer_expr(env, e)));
                        }
                        RecordFieldExpr::Spread(e) => {
                            if let Type::Record(spread_fields) = self.infer_expr(env, e).prune() {
                                field_types.extend(spread_fields);
                            }
                        }
                    }
                }
                Type::Record(field_types)
            }
            Expr::RecordAccess { record, field, span } => {
                let rt = self.infer_expr(env, record);
                let ft = self.engine.fresh_var();
                self.unify_or_report(&rt, &Type::Record(vec![(field.clone(), ft.clone())]), *span);
                ft
            }
            Expr::RecordUpdate { base, updates, span } => {
                let bt = self.infer_expr(env, base);
                for u in updates {
                    match u {
                        RecordFieldExpr::Named(name, e) => {
                            let et = self.infer_expr(env, e);
                            let expected_field = self.engine.fresh_var();
                            self.unify_or_report(&bt, &Type::Record(vec![(name.clone(), expected_field.clone())]), *span);
                            self.unify_or_report(&expected_field, &et, e.span());
                        }
                        RecordFieldExpr::Spread(e) => {
                            let et = self.infer_expr(env, e);
                            self.unify_or_report(&bt, &et, *span);
                        }
                    }
                }
                bt
            }
            Expr::Variant { name, args, span } => {
                let Some(scheme) = env.lookup_ctor(name).cloned() else {
                    self.push(Diagnostic::new(
                        ErrorCode::TypeUndefinedConstructor,
                        format!("undefined constructor `{name}`"),
                        *span,
                    ));
                    for a in args {
                        self.infer_expr(env, a);
                    }
                    return Type::Error;
                };
                let mut cur = self.engine.instantiate(&scheme.quantified, &scheme.body);
                for a in args {
                    let at = self.infer_expr(env, a);
                    let r = self.engine.fresh_var();
                    cur = self.unify_or_report(&cur, &Type::Fun(Box::new(at), Box::new(r.clone())), *span);
                    cur = r;
                }
                cur
            }
            Expr::Tuple { elements, .. } => Type::Tuple(elements.iter().map(|e| self.infer_expr(env, e)).collect()),
            Expr::TypeAnnotation { expr, ty, .. } => {
                let mut vars_map = HashMap::new();
                let target = self.elaborate_type(env, &mut vars_map, ty);
                let et = self.infer_expr(env, expr);
                self.unify_or_report(&et, &target, expr.span());
                target
            }
            Expr::Unsafe { expr, .. } => self.infer_expr(env, expr),
        }
    }

    fn infer_binop(&mut self, env: &TypeEnv, op: BinOpKind, lhs: &Expr, rhs: &Expr, span: Span) -> Type {
        let lt = self.infer_expr(env, lhs);
        let rt = self.infer_expr(env, rhs);
        match op {
            BinOpKind::Add | BinOpKind::Sub | BinOpKind::Mul | BinOpKind::Div | BinOpKind::Mod | BinOpKind::Pow => {
                let n = self.engine.fresh_var();
                let n = self.unify_or_report(&n, &lt, span);
                let n = self.unify_or_report(&n, &rt, span);
                self.constrain_numeric(&n, span)
            }
            BinOpKind::Lt | BinOpKind::LtEq | BinOpKind::Gt | BinOpKind::GtEq => {
                let n = self.engine.fresh_var();
                let n = self.unify_or_report(&n, &lt, span);
                let n = self.unify_or_report(&n, &rt, span);
                self.constrain_numeric(&n, span);
                Type::bool()
            }
            BinOpKind::Eq | BinOpKind::NotEq => {
                self.unify_or_report(&lt, &rt, span);
                Type::bool()
            }
            BinOpKind::And | BinOpKind::Or => {
                self.unify_or_report(&lt, &Type::bool(), span);
                self.unify_or_report(&rt, &Type::bool(), span);
                Type::bool()
            }
            BinOpKind::Concat => {
                self.unify_or_report(&lt, &Type::string(), span);
                self.unify_or_report(&rt, &Type::string(), span);
                Type::string()
            }
            BinOpKind::Assign => {
                self.unify_or_report(&lt, &Type::Ref(Box::new(rt)), span);
                Type::unit()
            }
        }
    }

    /// `NotBool` is the desugarer's provisional tag for surface `!`; it is
    /// reinterpreted as `Deref` here when the operand's type resolves to a
    /// concrete `Ref<T>` (spec §3.2, §4.4.3 — the type checker owns this
    /// disambiguation since the parser cannot see it).
    fn infer_unaryop(&mut self, env: &TypeEnv, op: UnaryOpKind, operand: &Expr, span: Span) -> Type {
        let ot = self.infer_expr(env, operand);
        match op {
            UnaryOpKind::Neg => {
                let n = self.engine.fresh_var();
                let n = self.unify_or_report(&n, &ot, span);
                self.constrain_numeric(&n, span)
            }
            UnaryOpKind::Deref => {
                let inner = self.engine.fresh_var();
                self.unify_or_report(&ot, &Type::Ref(Box::new(inner.clone())), span);
                inner
            }
            UnaryOpKind::NotBool => {
                if let Type::Ref(inner) = ot.prune() {
                    *inner
                } else {
                    self.unify_or_report(&ot, &Type::bool(), span)
                }
            }
        }
    }

    fn infer_match(&mut self, env: &TypeEnv, scrutinee: &Expr, cases: &[MatchCase], span: Span) -> Type {
        let st = self.infer_expr(env, scrutinee);
        let result = self.engine.fresh_var();
        for case in cases {
            let bindings = self.check_pattern(env, &case.pattern, &st);
            let inner = env.extend_values(bindings.into_iter().map(|(n, t)| (n, TypeScheme::monomorphic(t))));
            if let Some(guard) = &case.guard {
                let gt = self.infer_expr(&inner, guard);
                self.unify_or_report(&gt, &Type::bool(), guard.span());
            }
            let bt = self.infer_expr(&inner, &case.body);
            self.unify_or_report(&result, &bt, case.span);
        }

        let patterns: Vec<Pattern> = cases.iter().map(|c| c.pattern.clone()).collect();
        let guarded: Vec<bool> = cases.iter().map(|c| c.guard.is_some()).collect();
        let report = check_match(&patterns, &guarded, &self.exh_ctx);
        if self.emit_unreachable_warnings {
            for idx in report.unreachable_rows {
                self.push(Diagnostic::new(
                    ErrorCode::TypeUnreachableCase,
                    "this case is unreachable".to_string(),
                    cases[idx].span,
                ));
            }
        }
        if let Some(witness) = report.witness {
            self.push(
                Diagnostic::new(ErrorCode::TypeNonExhaustiveMatch, "match is not exhaustive".to_string(), span)
                    .with_hint(format!("unmatched case: `{witness}`")),
            );
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::Span;

    fn s() -> Span {
        Span::dummy()
    }

    #[test]
    fn literal_int_infers_int() {
        let mut tc = TypeChecker::new(10, true, true);
        let env = TypeEnv::new();
        let ty = tc.infer_expr(&env, &Expr::Int("1".to_string(), s()));
        assert_eq!(ty, Type::int());
        assert!(tc.diagnostics.is_empty());
    }

    #[test]
    fn identity_lambda_is_polymorphic() {
        let mut tc = TypeChecker::new(10, true, true);
        let env = TypeEnv::new();
        let id = Expr::Lambda {
            param: Pattern::Var("x".to_string(), s()),
            body: Box::new(Expr::Var("x".to_string(), s())),
            span: s(),
        };
        let decl = LetDecl { pattern: Pattern::Var("id".to_string(), s()), value: id, mutable: false, span: s() };
        let env = tc.check_let_decl(env, &decl);
        let scheme = env.lookup_value("id").unwrap();
        assert_eq!(scheme.quantified.len(), 1);
    }

    #[test]
    fn undefined_variable_reports_diagnostic() {
        let mut tc = TypeChecker::new(10, true, true);
        let env = TypeEnv::new();
        tc.infer_expr(&env, &Expr::Var("nope".to_string(), s()));
        assert_eq!(tc.diagnostics.len(), 1);
        assert_eq!(tc.diagnostics[0].code.code(), "VF4002");
    }

    #[test]
    fn mismatched_if_branches_reports_mismatch() {
        let mut tc = TypeChecker::new(10, true, true);
        let env = TypeEnv::new();
        let expr = Expr::If {
            cond: Box::new(Expr::Bool(true, s())),
            then_branch: Box::new(Expr::Int("1".to_string(), s())),
            else_branch: Box::new(Expr::Str("x".to_string(), s())),
            span: s(),
        };
        tc.infer_expr(&env, &expr);
        assert_eq!(tc.diagnostics.len(), 1);
        assert_eq!(tc.diagnostics[0].code.code(), "VF4001");
    }

    #[test]
    fn record_access_allows_extra_fields() {
        let mut tc = TypeChecker::new(10, true, true);
        let env = TypeEnv::new();
        let rec = Expr::Record {
            fields: vec![RecordFieldExpr::Named("x".to_string(), Expr::Int("1".to_string(), s()))],
            span: s(),
        };
        let access = Expr::RecordAccess { record: Box::new(rec), field: "x".to_string(), span: s() };
        let ty = tc.infer_expr(&env, &access);
        assert_eq!(ty, Type::int());
    }

    #[test]
    fn bang_on_ref_resolves_to_deref() {
        let mut tc = TypeChecker::new(10, true, true);
        let env = TypeEnv::new().extend_value(
            "r".to_string(),
            TypeScheme::monomorphic(Type::Ref(Box::new(Type::int()))),
        );
        let expr = Expr::UnaryOp {
            op: UnaryOpKind::NotBool,
            operand: Box::new(Expr::Var("r".to_string(), s())),
            span: s(),
        };
        let ty = tc.infer_expr(&env, &expr);
        assert_eq!(ty, Type::int());
    }

    #[test]
    fn bang_on_bool_stays_boolean_not() {
        let mut tc = TypeChecker::new(10, true, true);
        let env = TypeEnv::new();
        let expr = Expr::UnaryOp {
            op: UnaryOpKind::NotBool,
            operand: Box::new(Expr::Bool(true, s())),
            span: s(),
        };
        let ty = tc.infer_expr(&env, &expr);
        assert_eq!(ty, Type::bool());
    }

    #[test]
    fn non_exhaustive_match_reports_counterexample_hint() {
        let mut tc = TypeChecker::new(10, true, true);
        let mut env = TypeEnv::new();
        env = env.extend_type("Option".to_string(), TypeCtor { name: "Option".to_string(), arity: 1 });
        let a = tc.engine.fresh_var();
        env = env.extend_ctor(
            "Some".to_string(),
            TypeScheme { quantified: vec![], body: Type::Fun(Box::new(a.clone()), Box::new(Type::App("Option".to_string(), vec![a.clone()]))) },
        );
        env = env.extend_ctor("None".to_string(), TypeScheme { quantified: vec![], body: Type::App("Option".to_string(), vec![a]) });
        tc.exh_ctx.ctor_to_type.insert("Some".to_string(), "Option".to_string());
        tc.exh_ctx.ctor_to_type.insert("None".to_string(), "Option".to_string());
        tc.exh_ctx.ctor_arities.insert("Some".to_string(), 1);
        tc.exh_ctx.ctor_arities.insert("None".to_string(), 0);
        tc.exh_ctx.variants_by_type.insert("Option".to_string(), vec![("Some".to_string(), 1), ("None".to_string(), 0)]);

        let scrutinee = Expr::Variant { name: "None".to_string(), args: vec![], span: s() };
        let cases = vec![MatchCase {
            pattern: Pattern::Ctor("Some".to_string(), vec![Pattern::Var("n".to_string(), s())], s()),
            guard: None,
            body: Expr::Var("n".to_string(), s()),
            span: s(),
        }];
        tc.infer_match(&env, &scrutinee, &cases, s());
        assert!(tc.diagnostics.iter().any(|d| d.code.code() == "VF4900"));
    }
}
