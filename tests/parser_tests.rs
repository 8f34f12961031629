//! Parse determinism (spec §8, group 2): repeated parses of the same
//! token stream yield identical trees and identical diagnostics.

use vibefun_compiler::ast::Decl;
use vibefun_compiler::{lex, parse};

fn parse_twice(source: &str) -> ((vibefun_compiler::ast::Module, Vec<vibefun_compiler::parser::ParseError>), (vibefun_compiler::ast::Module, Vec<vibefun_compiler::parser::ParseError>)) {
    let tokens_a = lex(source, 0).expect("lex ok");
    let tokens_b = lex(source, 0).expect("lex ok");
    (parse(tokens_a, 10), parse(tokens_b, 10))
}

#[test]
fn well_formed_module_parses_identically_on_repeat() {
    let source = "let add = (x, y) => x + y; let xs = [1, 2, 3];";
    let ((m1, e1), (m2, e2)) = parse_twice(source);
    assert_eq!(format!("{m1:?}"), format!("{m2:?}"));
    assert_eq!(format!("{e1:?}"), format!("{e2:?}"));
    assert!(e1.is_empty());
    assert_eq!(m1.decls.len(), 2);
}

#[test]
fn malformed_module_reports_identical_diagnostics_on_repeat() {
    let source = "let x = ; let y = 1;";
    let ((m1, e1), (m2, e2)) = parse_twice(source);
    assert_eq!(format!("{m1:?}"), format!("{m2:?}"));
    assert_eq!(format!("{e1:?}"), format!("{e2:?}"));
    assert!(!e1.is_empty());
}

#[test]
fn max_errors_budget_stops_recording_further_diagnostics() {
    let source = "let a = ; let b = ; let c = ;";
    let tokens = lex(source, 0).expect("lex ok");
    let (_module, errors) = parse(tokens, 2);
    assert!(errors.len() <= 2, "parser should respect the max_errors budget, got {errors:?}");
}

#[test]
fn mutually_recursive_type_group_parses_as_one_decl() {
    let source = "type Even = | EvenZero | EvenSucc(Odd) and Odd = | OddSucc(Even);";
    let tokens = lex(source, 0).expect("lex ok");
    let (module, errors) = parse(tokens, 10);
    assert!(errors.is_empty(), "unexpected parse errors: {errors:?}");
    assert_eq!(module.decls.len(), 1);
    assert!(matches!(module.decls[0], Decl::TypeGroup(..)));
}
