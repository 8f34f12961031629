//! Lex round-trip property coverage for literals (spec §8, group 1).

use vibefun_compiler::lex;
use vibefun_compiler::tokens::TokenKind;

fn single_token_kind(source: &str) -> TokenKind {
    let tokens = lex(source, 0).expect("lex ok");
    assert_eq!(tokens.len(), 2, "expected one literal token plus Eof, got {tokens:?}");
    assert_eq!(tokens[1].kind, TokenKind::Eof);
    tokens[0].kind.clone()
}

#[test]
fn decimal_int_round_trips() {
    match single_token_kind("42") {
        TokenKind::Int { text, .. } => assert_eq!(text, "42"),
        other => panic!("expected Int, got {other:?}"),
    }
}

#[test]
fn float_round_trips() {
    match single_token_kind("3.25") {
        TokenKind::Float { text } => assert_eq!(text, "3.25"),
        other => panic!("expected Float, got {other:?}"),
    }
}

#[test]
fn plain_string_round_trips() {
    match single_token_kind("\"hello\"") {
        TokenKind::Str { value, triple } => {
            assert_eq!(value, "hello");
            assert!(!triple);
        }
        other => panic!("expected Str, got {other:?}"),
    }
}

#[test]
fn triple_quoted_string_round_trips() {
    match single_token_kind("\"\"\"hello\"\"\"") {
        TokenKind::Str { value, triple } => {
            assert_eq!(value, "hello");
            assert!(triple);
        }
        other => panic!("expected triple Str, got {other:?}"),
    }
}

#[test]
fn bool_literals_round_trip() {
    assert_eq!(single_token_kind("true"), TokenKind::Bool(true));
    assert_eq!(single_token_kind("false"), TokenKind::Bool(false));
}

#[test]
fn unit_literal_round_trips() {
    assert_eq!(single_token_kind("()"), TokenKind::Unit);
}

#[test]
fn identifier_is_nfc_normalized() {
    // "e\u{0301}" (e + combining acute) normalizes to "\u{00e9}" (e-acute).
    let decomposed = "caf\u{0065}\u{0301}";
    match single_token_kind(decomposed) {
        TokenKind::Ident(name) => assert_eq!(name, "caf\u{00e9}"),
        other => panic!("expected Ident, got {other:?}"),
    }
}

#[test]
fn nested_block_comments_are_skipped() {
    match single_token_kind("/* outer /* inner */ still outer */ 1") {
        TokenKind::Int { text, .. } => assert_eq!(text, "1"),
        other => panic!("expected Int, got {other:?}"),
    }
}

#[test]
fn unterminated_string_is_a_lex_error() {
    assert!(lex("\"abc", 0).is_err());
}
