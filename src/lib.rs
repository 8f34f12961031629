//! Vibefun compiler front-end
//!
//! Lexes, parses, desugars, and type-checks Vibefun source, producing a
//! typed core AST plus the diagnostics accumulated along the way.

pub mod core_ast;
pub mod desugar;
pub mod diagnostics;
pub mod error_codes;
pub mod exhaustive;
pub mod lexer;
pub mod ast;
pub mod parser;
pub mod tokens;
pub mod typecheck;
pub mod types;
pub mod unify;

use diagnostics::Diagnostic;
use error_codes::ErrorCode;
use thiserror::Error;
use types::{ModuleInterface, TypeEnv};

fn lex_error_code(e: &lexer::LexError) -> ErrorCode {
    match e {
        lexer::LexError::UnterminatedString(_) => ErrorCode::LexUnterminatedString,
        lexer::LexError::UnterminatedComment(_) => ErrorCode::LexUnterminatedComment,
        lexer::LexError::InvalidNumber(_, _) => ErrorCode::LexInvalidNumber,
        lexer::LexError::UnknownEscape(_, _) => ErrorCode::LexUnknownEscape,
        lexer::LexError::MalformedUnicodeEscape(_) | lexer::LexError::UnicodeEscapeOutOfRange(_) => {
            ErrorCode::LexInvalidUnicodeEscape
        }
        lexer::LexError::UnexpectedChar(_, _) | lexer::LexError::RawNewlineInString(_) => {
            ErrorCode::LexUnexpectedChar
        }
    }
}

fn parse_error_code(e: &parser::ParseError) -> ErrorCode {
    match e {
        parser::ParseError::Unexpected { .. } => ErrorCode::ParseUnexpectedToken,
        parser::ParseError::UnexpectedEof { .. } => ErrorCode::ParseUnexpectedEof,
        parser::ParseError::UnclosedDelimiter { .. } => ErrorCode::ParseUnclosedDelimiter,
    }
}

fn desugar_error_code(e: &desugar::DesugarError) -> ErrorCode {
    match e {
        desugar::DesugarError::OrPatternMismatch { .. } => ErrorCode::DesugarOrPatternMismatch,
        desugar::DesugarError::InvalidSpread { .. } => ErrorCode::DesugarInvalidSpread,
    }
}

/// Identifies a source file across diagnostics and spans; the caller
/// assigns these (spec §6.1 — `lex(source_bytes, file_id)`).
pub type FileId = u32;

/// Caller-tunable knobs that change diagnostics volume and recovery
/// behavior, never semantics: a zero-error run produces the same typed
/// core AST regardless of these settings (SPEC_FULL §10.3).
#[derive(Debug, Clone)]
pub struct CompileOptions {
    pub max_parse_errors: usize,
    pub max_type_errors: usize,
    pub emit_unreachable_warnings: bool,
    pub emit_unused_binding_warnings: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            max_parse_errors: 10,
            max_type_errors: 10,
            emit_unreachable_warnings: true,
            emit_unused_binding_warnings: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("lex error: {0}")]
    Lex(#[from] lexer::LexError),
    #[error("parse errors: {0:?}")]
    Parse(Vec<parser::ParseError>),
    #[error("desugar errors: {0:?}")]
    Desugar(Vec<desugar::DesugarError>),
    #[error("multiple errors: {0:?}")]
    Multiple(Vec<CompileError>),
}

impl CompileError {
    /// Flattens a list of errors into one: drops empties, unwraps
    /// single-element lists, and splices nested `Multiple` variants so
    /// callers never have to recurse to find the underlying errors.
    pub fn from_multiple(errors: Vec<CompileError>) -> Option<CompileError> {
        let flattened: Vec<CompileError> = errors
            .into_iter()
            .flat_map(|e| match e {
                CompileError::Multiple(inner) => inner,
                other => vec![other],
            })
            .collect();
        match flattened.len() {
            0 => None,
            1 => Some(flattened.into_iter().next().unwrap()),
            _ => Some(CompileError::Multiple(flattened)),
        }
    }
}

/// Phase 1 (spec §6.1): `lex(source_bytes, file_id) -> Result<TokenStream, Diagnostics>`.
pub fn lex(source: &str, file: FileId) -> Result<Vec<tokens::Token>, lexer::LexError> {
    lexer::lex(source, file)
}

/// Phase 2: `parse(tokens) -> (SurfaceModule, Diagnostics)` — always returns a
/// (possibly partial) module, even with parse errors.
pub fn parse(tokens: Vec<tokens::Token>, max_errors: usize) -> (ast::Module, Vec<parser::ParseError>) {
    parser::parse(tokens, max_errors)
}

/// Phase 3: `desugar(surface_module, fresh_gen) -> (CoreModule, Diagnostics)`.
pub fn desugar(
    module: ast::Module,
    fresh: desugar::FreshGen,
) -> (core_ast::Module, Vec<desugar::DesugarError>, desugar::FreshGen) {
    desugar::desugar(module, fresh)
}

/// Phase 4: `check(core_module, env) -> (TypedCoreModule, Diagnostics)`.
///
/// The "typed core AST" is the same `core_ast::Module` the desugarer
/// produced, plus the `TypeEnv` extended with every declaration's inferred
/// scheme — which is sufficient to recover the type of any top-level name
/// without threading a parallel type-annotated tree through every node.
pub fn check(
    module: &core_ast::Module,
    env: TypeEnv,
    module_iface: Option<&dyn ModuleInterface>,
    options: &CompileOptions,
) -> (TypeEnv, Vec<Diagnostic>) {
    let mut checker = typecheck::TypeChecker::new(
        options.max_type_errors,
        options.emit_unreachable_warnings,
        options.emit_unused_binding_warnings,
    );
    let env = checker.check_module(module, env, module_iface);
    (env, checker.diagnostics())
}

pub mod pipeline {
    use super::*;

    pub struct PipelineResult {
        pub env: TypeEnv,
        pub core_module: Option<core_ast::Module>,
        pub diagnostics: Vec<Diagnostic>,
    }

    /// Runs `lex -> parse -> desugar -> check -> exhaustiveness` in sequence
    /// per spec §6.1: a lex failure short-circuits (there is no token stream
    /// to recover from); parse, desugar, and type errors all continue
    /// through the remaining phases on whatever partial tree they produced,
    /// so diagnostics accumulate in source order across the whole pipeline
    /// (spec §7's recovery policy).
    pub fn compile(source: &str, file_id: FileId, env: &TypeEnv, options: &CompileOptions) -> PipelineResult {
        let mut diagnostics = Vec::new();

        let tokens = match lex(source, file_id) {
            Ok(t) => t,
            Err(e) => {
                diagnostics.push(Diagnostic::new(lex_error_code(&e), e.to_string(), e.span()));
                return PipelineResult { env: env.clone(), core_module: None, diagnostics };
            }
        };

        let (surface_module, parse_errors) = parse(tokens, options.max_parse_errors);
        for e in &parse_errors {
            diagnostics.push(Diagnostic::new(parse_error_code(e), e.to_string(), e.span()));
        }

        let (core_module, desugar_errors, _fresh) = desugar(surface_module, desugar::FreshGen::new());
        for e in &desugar_errors {
            diagnostics.push(Diagnostic::new(desugar_error_code(e), e.to_string(), e.span()));
        }

        let (new_env, check_diagnostics) = check(&core_module, env.clone(), None, options);
        diagnostics.extend(check_diagnostics);

        PipelineResult { env: new_env, core_module: Some(core_module), diagnostics }
    }
}
