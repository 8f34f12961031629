//! Desugar invariants and span preservation (spec §8, groups 3-4): the
//! Core AST never re-introduces surface-only shapes, and every Core span
//! stays within the surface subtree it was derived from.

use vibefun_compiler::core_ast::{Decl as CoreDecl, Expr as CoreExpr};
use vibefun_compiler::desugar::FreshGen;
use vibefun_compiler::{desugar, lex, parse};

fn desugar_source(source: &str) -> vibefun_compiler::core_ast::Module {
    let tokens = lex(source, 0).expect("lex ok");
    let (module, parse_errors) = parse(tokens, 10);
    assert!(parse_errors.is_empty(), "unexpected parse errors: {parse_errors:?}");
    let (core_module, desugar_errors, _fresh) = desugar(module, FreshGen::new());
    assert!(desugar_errors.is_empty(), "unexpected desugar errors: {desugar_errors:?}");
    core_module
}

fn within(inner: vibefun_compiler::tokens::Span, outer: vibefun_compiler::tokens::Span) -> bool {
    inner.start >= outer.start && inner.end <= outer.end
}

#[test]
fn multi_param_lambda_curries_into_nested_single_param_lambdas() {
    let module = desugar_source("let add = (x, y) => x + y;");
    let CoreDecl::Let(decl) = &module.decls[0] else {
        panic!("expected a let decl, got {:?}", module.decls[0]);
    };
    match &decl.value {
        CoreExpr::Lambda { param, body, .. } => {
            assert!(matches!(param, vibefun_compiler::core_ast::Pattern::Var(n, _) if n == "x"));
            match body.as_ref() {
                CoreExpr::Lambda { param, .. } => {
                    assert!(matches!(param, vibefun_compiler::core_ast::Pattern::Var(n, _) if n == "y"));
                }
                other => panic!("expected nested single-param lambda, got {other:?}"),
            }
        }
        other => panic!("expected Lambda, got {other:?}"),
    }
}

#[test]
fn pipe_desugars_to_a_single_argument_application() {
    let module = desugar_source("let h = 3 |> f;");
    let CoreDecl::Let(decl) = &module.decls[0] else {
        panic!("expected a let decl");
    };
    match &decl.value {
        CoreExpr::App { func, arg, .. } => {
            assert!(matches!(**func, CoreExpr::Var(ref n, _) if n == "f"));
            assert!(matches!(**arg, CoreExpr::Int(ref n, _) if n == "3"));
        }
        other => panic!("expected App, got {other:?}"),
    }
}

#[test]
fn list_literal_desugars_to_right_nested_cons_chain() {
    let module = desugar_source("let xs = [1, 2, 3];");
    let CoreDecl::Let(decl) = &module.decls[0] else {
        panic!("expected a let decl");
    };
    let mut depth = 0;
    let mut cur = &decl.value;
    loop {
        match cur {
            CoreExpr::Variant { name, args, .. } if name == "Cons" => {
                depth += 1;
                cur = &args[1];
            }
            CoreExpr::Variant { name, .. } if name == "Nil" => break,
            other => panic!("expected Cons/Nil chain, got {other:?}"),
        }
    }
    assert_eq!(depth, 3);
}

#[test]
fn or_pattern_match_case_expands_into_one_row_per_alternative() {
    let module = desugar_source("let tag = match n { | 0 | 1 => \"s\" | _ => \"m\" };");
    let CoreDecl::Let(decl) = &module.decls[0] else {
        panic!("expected a let decl");
    };
    match &decl.value {
        CoreExpr::Match { cases, .. } => {
            assert_eq!(cases.len(), 3, "expected 0, 1, and _ as three separate rows");
        }
        other => panic!("expected Match, got {other:?}"),
    }
}

#[test]
fn desugared_spans_stay_within_the_surface_declaration_span() {
    let source = "let add = (x, y) => x + y;";
    let tokens = lex(source, 0).expect("lex ok");
    let (surface_module, parse_errors) = parse(tokens, 10);
    assert!(parse_errors.is_empty());
    let surface_span = surface_module.decls[0].span();
    let (core_module, desugar_errors, _fresh) = desugar(surface_module, FreshGen::new());
    assert!(desugar_errors.is_empty());
    let core_span = core_module.decls[0].span();
    assert!(within(core_span, surface_span), "core span {core_span:?} escaped surface span {surface_span:?}");
}

#[test]
fn block_expression_desugars_to_nested_lets_with_no_block_node() {
    let module = desugar_source("let r = { let x = 1; x + 1 };");
    let CoreDecl::Let(decl) = &module.decls[0] else {
        panic!("expected a let decl");
    };
    assert!(matches!(decl.value, CoreExpr::Let { .. }));
}
