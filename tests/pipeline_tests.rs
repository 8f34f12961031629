//! End-to-end scenarios S1-S7 (spec §8), driven through the public
//! `pipeline::compile` entry point.

use std::cell::RefCell;
use std::rc::Rc;

use vibefun_compiler::diagnostics::Severity;
use vibefun_compiler::error_codes::ErrorCode;
use vibefun_compiler::types::{Type, TypeEnv, TypeScheme, VarCell};
use vibefun_compiler::{pipeline, CompileOptions};

fn compile_ok(source: &str) -> pipeline::PipelineResult {
    let env = TypeEnv::new();
    let options = CompileOptions::default();
    pipeline::compile(source, 0, &env, &options)
}

fn errors(result: &pipeline::PipelineResult) -> Vec<&vibefun_compiler::diagnostics::Diagnostic> {
    result.diagnostics.iter().filter(|d| d.severity == Severity::Error).collect()
}

/// A polymorphic `ref` binding (`forall a. a -> Ref<a>`), standing in for
/// the built-in constructor a real embedder would pre-populate the
/// environment with (SPEC_FULL §12, decision 4).
fn ref_scheme() -> TypeScheme {
    let a = Type::Var(Rc::new(RefCell::new(VarCell {
        id: 1_000_000,
        level: 0,
        bound: None,
    })));
    TypeScheme {
        quantified: vec![1_000_000],
        body: Type::Fun(Box::new(a.clone()), Box::new(Type::Ref(Box::new(a)))),
    }
}

#[test]
fn s1_curried_addition_infers_int_arrow_int_arrow_int() {
    let result = compile_ok("let add = (x, y) => x + y;");
    assert!(errors(&result).is_empty(), "unexpected errors: {:?}", result.diagnostics);
    let scheme = result.env.lookup_value("add").expect("add should be bound");
    assert_eq!(scheme.body.to_string(), "(Int) -> (Int) -> Int");
}

#[test]
fn s2_pipe_chains_threads_value_through_both_functions() {
    let source = "let f = (x) => x + 1; let g = (x) => x * 2; let h = 3 |> f |> g;";
    let result = compile_ok(source);
    assert!(errors(&result).is_empty(), "unexpected errors: {:?}", result.diagnostics);
    let scheme = result.env.lookup_value("h").expect("h should be bound");
    assert_eq!(scheme.body.to_string(), "Int");
}

#[test]
fn s3_list_literal_desugars_to_cons_chain_and_typechecks_exhaustively() {
    let source = "\
        type List a = | Nil | Cons(a, List<a>);\n\
        let xs = [1, 2, 3];\n\
        let head = match xs { | [] => 0 | [h, ...t] => h };\n";
    let result = compile_ok(source);
    assert!(errors(&result).is_empty(), "unexpected errors: {:?}", result.diagnostics);
    let non_exhaustive = result
        .diagnostics
        .iter()
        .any(|d| d.code.code() == ErrorCode::TypeNonExhaustiveMatch.code());
    assert!(!non_exhaustive, "[] / [h, ...t] should be exhaustive over List");
    let xs = result.env.lookup_value("xs").expect("xs should be bound");
    assert_eq!(xs.body.to_string(), "List<Int>");
}

#[test]
fn s4_record_access_accepts_extra_fields_via_width_subtyping() {
    let source = "\
        let f = (p) => p.x;\n\
        let p3 = { x: 1, y: 2, z: 3 };\n\
        let v = f(p3);\n";
    let result = compile_ok(source);
    assert!(errors(&result).is_empty(), "unexpected errors: {:?}", result.diagnostics);
    let v = result.env.lookup_value("v").expect("v should be bound");
    assert_eq!(v.body.to_string(), "Int");
}

#[test]
fn s5_value_restriction_keeps_ref_cell_monomorphic_across_assignments() {
    let source = "\
        type Option a = | Some(a) | None;\n\
        let r = ref(None);\n\
        let _ = (r := Some(1));\n\
        let _ = (r := Some(\"x\"));\n";
    let env = TypeEnv::new().extend_value("ref".to_string(), ref_scheme());
    let options = CompileOptions::default();
    let result = pipeline::compile(source, 0, &env, &options);
    let mismatches: Vec<_> = result
        .diagnostics
        .iter()
        .filter(|d| d.code.code() == ErrorCode::TypeMismatch.code())
        .collect();
    assert_eq!(mismatches.len(), 1, "expected exactly one mismatch from the second assignment: {:?}", result.diagnostics);
}

#[test]
fn s6_non_exhaustive_match_warns_with_none_counterexample() {
    let source = "\
        type Option a = | Some(a) | None;\n\
        let opt = Some(1);\n\
        let n = match opt { | Some(n) => n };\n";
    let result = compile_ok(source);
    assert!(errors(&result).is_empty(), "unexpected errors: {:?}", result.diagnostics);
    let warning = result
        .diagnostics
        .iter()
        .find(|d| d.code.code() == ErrorCode::TypeNonExhaustiveMatch.code())
        .expect("expected a non-exhaustive-match warning");
    let hint = warning.hint.as_deref().unwrap_or_default();
    assert!(hint.contains("None"), "hint should name the missing `None` case, got: {hint}");
}

#[test]
fn s7_or_pattern_literal_cases_with_wildcard_are_reachable_and_exhaustive() {
    let source = "\
        let n = 1;\n\
        let tag = match n { | 0 | 1 => \"s\" | _ => \"m\" };\n";
    let result = compile_ok(source);
    assert!(errors(&result).is_empty(), "unexpected errors: {:?}", result.diagnostics);
    let warnings: Vec<_> = result
        .diagnostics
        .iter()
        .filter(|d| {
            d.code.code() == ErrorCode::TypeNonExhaustiveMatch.code()
                || d.code.code() == ErrorCode::TypeUnreachableCase.code()
        })
        .collect();
    assert!(warnings.is_empty(), "expected no exhaustiveness/reachability warnings, got: {warnings:?}");
}

#[test]
fn lex_failure_short_circuits_pipeline_with_no_core_module() {
    let source = "let x = \"unterminated;";
    let result = compile_ok(source);
    assert!(result.core_module.is_none());
    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(result.diagnostics[0].code.code(), ErrorCode::LexUnterminatedString.code());
}

#[test]
fn parse_error_still_produces_a_core_module_for_later_phases() {
    let source = "let x = ;";
    let result = compile_ok(source);
    assert!(result.core_module.is_some(), "parse recovery should still hand off a partial module");
    assert!(result.diagnostics.iter().any(|d| d.code.code() == ErrorCode::ParseUnexpectedToken.code()));
}
