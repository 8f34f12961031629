//! Recursive-descent parser producing the surface AST (spec §4.2).
//!
//! Precedence climbing handles the binary-operator tiers; everything above
//! that (lambdas, records vs. blocks, `let`/`match`/`if`) is resolved with a
//! small amount of checkpoint/rewind lookahead rather than a separate
//! tokenizer pass, following the teacher's single-pass parser shape.

use crate::ast::*;
use crate::tokens::{Keyword, Span, Token, TokenKind};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("unexpected token {found}, expected {expected}")]
    Unexpected {
        found: String,
        expected: String,
        span: Span,
    },
    #[error("unexpected end of input, expected {expected}")]
    UnexpectedEof { expected: String, span: Span },
    #[error("unclosed delimiter {delim}")]
    UnclosedDelimiter {
        delim: &'static str,
        opened_at: Span,
        span: Span,
    },
}

impl ParseError {
    pub fn span(&self) -> Span {
        match self {
            ParseError::Unexpected { span, .. } => *span,
            ParseError::UnexpectedEof { span, .. } => *span,
            ParseError::UnclosedDelimiter { span, .. } => *span,
        }
    }
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    pub errors: Vec<ParseError>,
    max_errors: usize,
}

type PResult<T> = Result<T, ParseError>;

impl Parser {
    pub fn new(tokens: Vec<Token>, max_errors: usize) -> Self {
        Self {
            tokens,
            pos: 0,
            errors: Vec::new(),
            max_errors,
        }
    }

    // ── token-stream helpers ────────────────────────────────────────

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_at(&self, offset: usize) -> &Token {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[idx]
    }

    fn is_eof(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn prev_span(&self) -> Span {
        let idx = self.pos.saturating_sub(1);
        self.tokens[idx].span
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(kind)
    }

    fn at_keyword(&self, kw: Keyword) -> bool {
        matches!(&self.peek().kind, TokenKind::Keyword(k) if *k == kw)
    }

    fn eat_keyword(&mut self, kw: Keyword) -> bool {
        if self.at_keyword(kw) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> PResult<Token> {
        if self.check(&kind) {
            Ok(self.advance())
        } else {
            Err(self.err_unexpected(what))
        }
    }

    fn expect_keyword(&mut self, kw: Keyword) -> PResult<Span> {
        if self.eat_keyword(kw) {
            Ok(self.prev_span())
        } else {
            Err(self.err_unexpected(kw.as_str()))
        }
    }

    fn expect_ident(&mut self, what: &str) -> PResult<(String, Span)> {
        match self.peek().kind.clone() {
            TokenKind::Ident(name) => {
                let span = self.peek().span;
                self.advance();
                Ok((name, span))
            }
            _ => Err(self.err_unexpected(what)),
        }
    }

    fn expect_string(&mut self, what: &str) -> PResult<(String, Span)> {
        match self.peek().kind.clone() {
            TokenKind::Str { value, .. } => {
                let span = self.peek().span;
                self.advance();
                Ok((value, span))
            }
            _ => Err(self.err_unexpected(what)),
        }
    }

    fn err_unexpected(&self, expected: &str) -> ParseError {
        let tok = self.peek();
        if matches!(tok.kind, TokenKind::Eof) {
            ParseError::UnexpectedEof {
                expected: expected.to_string(),
                span: tok.span,
            }
        } else {
            ParseError::Unexpected {
                found: tok.kind.to_string(),
                expected: expected.to_string(),
                span: tok.span,
            }
        }
    }

    fn push_error(&mut self, err: ParseError) {
        if self.errors.len() < self.max_errors {
            self.errors.push(err);
        }
    }

    fn budget_exhausted(&self) -> bool {
        self.errors.len() >= self.max_errors
    }

    /// Skip tokens until a declaration boundary so one bad declaration does
    /// not cascade into spurious errors for the rest of the module.
    fn resync(&mut self) {
        loop {
            if self.is_eof() {
                return;
            }
            if self.eat(&TokenKind::Semicolon) {
                return;
            }
            if matches!(self.peek().kind, TokenKind::Keyword(Keyword::Let))
                || matches!(self.peek().kind, TokenKind::Keyword(Keyword::Type))
                || matches!(self.peek().kind, TokenKind::Keyword(Keyword::External))
                || matches!(self.peek().kind, TokenKind::Keyword(Keyword::Import))
                || matches!(self.peek().kind, TokenKind::Keyword(Keyword::Export))
            {
                return;
            }
            self.advance();
        }
    }

    // ── module & declarations ───────────────────────────────────────

    pub fn parse_module(mut self) -> (Module, Vec<ParseError>) {
        let start = self.peek().span;
        let mut decls = Vec::new();
        while !self.is_eof() {
            if self.budget_exhausted() {
                break;
            }
            match self.parse_declaration() {
                Ok(d) => decls.push(d),
                Err(e) => {
                    self.push_error(e);
                    self.resync();
                }
            }
        }
        let end = self.prev_span();
        let module = Module {
            decls,
            span: start.merge(end),
        };
        (module, self.errors)
    }

    fn parse_declaration(&mut self) -> PResult<Decl> {
        if self.at_keyword(Keyword::Let) {
            return self.parse_decl_let();
        }
        if self.at_keyword(Keyword::Type) {
            return self.parse_decl_type();
        }
        if self.at_keyword(Keyword::External) {
            return self.parse_decl_external();
        }
        if self.at_keyword(Keyword::Import) {
            return self.parse_decl_import();
        }
        if self.at_keyword(Keyword::Export) {
            return self.parse_decl_export();
        }
        Err(self.err_unexpected("a declaration (let, type, external, import, export)"))
    }

    fn parse_decl_let(&mut self) -> PResult<Decl> {
        let start = self.expect_keyword(Keyword::Let)?;
        let is_rec = self.eat_keyword(Keyword::Rec);
        if is_rec {
            let mut bindings = vec![self.parse_let_binding()?];
            while self.eat_keyword(Keyword::And) {
                bindings.push(self.parse_let_binding()?);
            }
            let end = self.expect(TokenKind::Semicolon, "';'")?.span;
            return Ok(Decl::LetRecGroup(bindings, start.merge(end)));
        }
        let mutable = self.eat_keyword(Keyword::Mut);
        let pattern = self.parse_pattern()?;
        let params = self.parse_param_list_if_function()?;
        self.expect(TokenKind::Eq, "'='")?;
        let mut value = self.parse_expr()?;
        if !params.is_empty() {
            let span = pattern.span().merge(value.span());
            value = Expr::Lambda {
                params,
                body: Box::new(value),
                span,
            };
        }
        let end = self.expect(TokenKind::Semicolon, "';'")?.span;
        Ok(Decl::Let(LetDecl {
            pattern,
            value,
            mutable,
            span: start.merge(end),
        }))
    }

    /// `let f x y = ...` sugar: a plain identifier pattern followed by more
    /// patterns before `=` is a curried function definition.
    fn parse_param_list_if_function(&mut self) -> PResult<Vec<Pattern>> {
        let mut params = Vec::new();
        while !self.check(&TokenKind::Eq) && !self.is_eof() {
            params.push(self.parse_pattern_no_or()?);
        }
        Ok(params)
    }

    fn parse_let_binding(&mut self) -> PResult<LetBinding> {
        let (name, name_span) = self.expect_ident("a binding name")?;
        let mut params = Vec::new();
        while !self.check(&TokenKind::Eq) {
            params.push(self.parse_pattern_no_or()?);
        }
        self.expect(TokenKind::Eq, "'='")?;
        let body = self.parse_expr()?;
        let span = name_span.merge(body.span());
        Ok(LetBinding {
            name,
            params,
            body,
            span,
        })
    }

    fn parse_decl_type(&mut self) -> PResult<Decl> {
        let decl = self.parse_type_decl_single()?;
        if self.at_keyword(Keyword::And) {
            let mut group = vec![decl];
            while self.eat_keyword(Keyword::And) {
                self.expect_keyword(Keyword::Type)?;
                group.push(self.parse_type_decl_body()?);
            }
            let span = group[0].span.merge(group[group.len() - 1].span);
            return Ok(Decl::TypeGroup(group, span));
        }
        Ok(Decl::Type(decl))
    }

    fn parse_type_decl_single(&mut self) -> PResult<TypeDecl> {
        let start = self.expect_keyword(Keyword::Type)?;
        let mut decl = self.parse_type_decl_body()?;
        decl.span = start.merge(decl.span);
        Ok(decl)
    }

    /// Parses `Name params = def ;` without the leading `type` keyword (used
    /// both standalone and after `and` in a mutually recursive group).
    fn parse_type_decl_body(&mut self) -> PResult<TypeDecl> {
        let (name, name_span) = self.expect_ident("a type name")?;
        let mut params = Vec::new();
        while let TokenKind::Ident(_) = self.peek().kind {
            let (p, _) = self.expect_ident("a type parameter")?;
            params.push(p);
        }
        self.expect(TokenKind::Eq, "'='")?;
        let def = self.parse_type_def()?;
        let end = self.expect(TokenKind::Semicolon, "';'")?.span;
        Ok(TypeDecl {
            name,
            params,
            def,
            span: name_span.merge(end),
        })
    }

    fn parse_type_def(&mut self) -> PResult<TypeDef> {
        if self.check(&TokenKind::LBrace) {
            self.advance();
            let mut fields = Vec::new();
            while !self.check(&TokenKind::RBrace) {
                let (fname, _) = self.expect_ident("a field name")?;
                self.expect(TokenKind::Colon, "':'")?;
                let fty = self.parse_type()?;
                fields.push((fname, fty));
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::RBrace, "'}'")?;
            return Ok(TypeDef::Record(fields));
        }
        if self.check_variant_start() {
            let ctors = self.parse_variant_ctors()?;
            return Ok(TypeDef::Variant(ctors));
        }
        Ok(TypeDef::Alias(self.parse_type()?))
    }

    fn check_variant_start(&self) -> bool {
        self.check(&TokenKind::Pipe)
            || matches!(&self.peek().kind, TokenKind::Ident(name) if name.chars().next().is_some_and(|c| c.is_uppercase()))
    }

    fn parse_variant_ctors(&mut self) -> PResult<Vec<VariantCtor>> {
        let mut ctors = Vec::new();
        self.eat(&TokenKind::Pipe);
        loop {
            let (name, name_span) = self.expect_ident("a constructor name")?;
            let mut args = Vec::new();
            if self.eat(&TokenKind::LParen) {
                while !self.check(&TokenKind::RParen) {
                    args.push(self.parse_type()?);
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RParen, "')'")?;
            }
            let end = args.last().map(|t| t.span()).unwrap_or(name_span);
            ctors.push(VariantCtor {
                name,
                args,
                span: name_span.merge(end),
            });
            if !self.eat(&TokenKind::Pipe) {
                break;
            }
        }
        Ok(ctors)
    }

    fn parse_decl_external(&mut self) -> PResult<Decl> {
        let start = self.expect_keyword(Keyword::External)?;
        if self.eat_keyword(Keyword::Type) {
            let (name, name_span) = self.expect_ident("a type name")?;
            let mut arity = 0usize;
            while let TokenKind::Ident(_) = self.peek().kind {
                self.advance();
                arity += 1;
            }
            let end = self.expect(TokenKind::Semicolon, "';'")?.span;
            let _ = name_span;
            return Ok(Decl::ExternalType(ExternalTypeDecl {
                name,
                arity,
                span: start.merge(end),
            }));
        }
        if self.check(&TokenKind::LBrace) {
            self.advance();
            let mut decls = Vec::new();
            while !self.check(&TokenKind::RBrace) {
                decls.push(self.parse_external_binding()?);
            }
            let end = self.expect(TokenKind::RBrace, "'}'")?.span;
            return Ok(Decl::ExternalBlock(decls, start.merge(end)));
        }
        let mut decl = self.parse_external_binding()?;
        decl.span = start.merge(decl.span);
        Ok(Decl::External(decl))
    }

    fn parse_external_binding(&mut self) -> PResult<ExternalDecl> {
        let (name, name_span) = self.expect_ident("an external binding name")?;
        self.expect(TokenKind::Colon, "':'")?;
        let ty = self.parse_type()?;
        self.expect(TokenKind::Eq, "'='")?;
        let (js_expr, _) = self.expect_string("a JS expression string")?;
        let end = self.expect(TokenKind::Semicolon, "';'")?.span;
        Ok(ExternalDecl {
            name,
            ty,
            js_expr,
            span: name_span.merge(end),
        })
    }

    fn parse_decl_import(&mut self) -> PResult<Decl> {
        let start = self.expect_keyword(Keyword::Import)?;
        let names = if self.eat(&TokenKind::Star) {
            ImportNames::Wildcard
        } else {
            self.expect(TokenKind::LBrace, "'{'")?;
            let mut names = Vec::new();
            while !self.check(&TokenKind::RBrace) {
                let (name, _) = self.expect_ident("an import name")?;
                let alias = if self.eat_keyword(Keyword::As) {
                    Some(self.expect_ident("an alias")?.0)
                } else {
                    None
                };
                names.push((name, alias));
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::RBrace, "'}'")?;
            ImportNames::Named(names)
        };
        self.expect_keyword(Keyword::From)?;
        let (path_str, _) = self.expect_string("a module path")?;
        let path = path_str.split('/').map(str::to_string).collect();
        let end = self.expect(TokenKind::Semicolon, "';'")?.span;
        Ok(Decl::Import(ImportDecl {
            path,
            names,
            span: start.merge(end),
        }))
    }

    fn parse_decl_export(&mut self) -> PResult<Decl> {
        let start = self.expect_keyword(Keyword::Export)?;
        self.expect(TokenKind::LBrace, "'{'")?;
        let mut names = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            let (name, _) = self.expect_ident("an export name")?;
            names.push(name);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        let _ = self.expect(TokenKind::RBrace, "'}'")?;
        let end = self.expect(TokenKind::Semicolon, "';'")?.span;
        Ok(Decl::Export(ExportDecl {
            names,
            span: start.merge(end),
        }))
    }

    // ── types ────────────────────────────────────────────────────────

    fn parse_type(&mut self) -> PResult<TypeExpr> {
        let lhs = self.parse_type_app()?;
        if self.eat(&TokenKind::Arrow) {
            let rhs = self.parse_type()?;
            let span = lhs.span().merge(rhs.span());
            return Ok(TypeExpr::Fun(vec![lhs], Box::new(rhs), span));
        }
        if self.check(&TokenKind::Pipe) {
            let mut parts = vec![lhs];
            while self.eat(&TokenKind::Pipe) {
                parts.push(self.parse_type_app()?);
            }
            let span = parts[0].span().merge(parts[parts.len() - 1].span());
            return Ok(TypeExpr::Union(parts, span));
        }
        Ok(lhs)
    }

    fn parse_type_app(&mut self) -> PResult<TypeExpr> {
        if self.eat_keyword(Keyword::Ref) {
            let start = self.prev_span();
            self.expect(TokenKind::Lt, "'<'")?;
            let inner = self.parse_type()?;
            let end = self.expect(TokenKind::Gt, "'>'")?.span;
            return Ok(TypeExpr::Ref(Box::new(inner), start.merge(end)));
        }
        let base = self.parse_type_paren()?;
        if self.check(&TokenKind::Lt) {
            if let TypeExpr::Named(name, span) = base {
                self.advance();
                let mut args = vec![self.parse_type()?];
                while self.eat(&TokenKind::Comma) {
                    args.push(self.parse_type()?);
                }
                let end = self.expect(TokenKind::Gt, "'>'")?.span;
                return Ok(TypeExpr::App(name, args, span.merge(end)));
            }
        }
        Ok(base)
    }

    fn parse_type_paren(&mut self) -> PResult<TypeExpr> {
        if self.eat(&TokenKind::LParen) {
            let start = self.prev_span();
            if self.eat(&TokenKind::RParen) {
                let end = self.prev_span();
                return Ok(TypeExpr::Named("Unit".to_string(), start.merge(end)));
            }
            let mut items = vec![self.parse_type()?];
            while self.eat(&TokenKind::Comma) {
                items.push(self.parse_type()?);
            }
            let end = self.expect(TokenKind::RParen, "')'")?.span;
            if items.len() == 1 {
                return Ok(items.pop().unwrap_or(TypeExpr::Named(
                    "Unit".to_string(),
                    start.merge(end),
                )));
            }
            return Ok(TypeExpr::Tuple(items, start.merge(end)));
        }
        if self.check(&TokenKind::LBrace) {
            return self.parse_type_record();
        }
        match self.peek().kind.clone() {
            TokenKind::Ident(name) => {
                let span = self.peek().span;
                self.advance();
                if name.chars().next().is_some_and(|c| c.is_lowercase()) {
                    Ok(TypeExpr::Var(name, span))
                } else {
                    Ok(TypeExpr::Named(name, span))
                }
            }
            _ => Err(self.err_unexpected("a type")),
        }
    }

    fn parse_type_record(&mut self) -> PResult<TypeExpr> {
        let start = self.expect(TokenKind::LBrace, "'{'")?.span;
        let mut fields = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            let (name, _) = self.expect_ident("a field name")?;
            self.expect(TokenKind::Colon, "':'")?;
            let ty = self.parse_type()?;
            fields.push((name, ty));
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        let end = self.expect(TokenKind::RBrace, "'}'")?.span;
        Ok(TypeExpr::Record(fields, start.merge(end)))
    }

    // ── patterns ─────────────────────────────────────────────────────

    fn parse_pattern(&mut self) -> PResult<Pattern> {
        let first = self.parse_pattern_no_or()?;
        if self.check(&TokenKind::Pipe) {
            let mut alts = vec![first];
            while self.eat(&TokenKind::Pipe) {
                alts.push(self.parse_pattern_no_or()?);
            }
            let span = alts[0].span().merge(alts[alts.len() - 1].span());
            return Ok(Pattern::Or(alts, span));
        }
        Ok(first)
    }

    fn parse_pattern_no_or(&mut self) -> PResult<Pattern> {
        let base = self.parse_pattern_atom()?;
        if self.eat(&TokenKind::Colon) {
            let ty = self.parse_type()?;
            let span = base.span().merge(ty.span());
            return Ok(Pattern::Annotated(Box::new(base), ty, span));
        }
        Ok(base)
    }

    fn parse_pattern_atom(&mut self) -> PResult<Pattern> {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::Ident(name) if name == "_" => {
                self.advance();
                Ok(Pattern::Wildcard(tok.span))
            }
            TokenKind::Ident(name) => {
                self.advance();
                if name.chars().next().is_some_and(|c| c.is_uppercase()) {
                    let mut args = Vec::new();
                    if self.eat(&TokenKind::LParen) {
                        while !self.check(&TokenKind::RParen) {
                            args.push(self.parse_pattern()?);
                            if !self.eat(&TokenKind::Comma) {
                                break;
                            }
                        }
                        let end = self.expect(TokenKind::RParen, "')'")?.span;
                        return Ok(Pattern::Ctor(name, args, tok.span.merge(end)));
                    }
                    Ok(Pattern::Ctor(name, args, tok.span))
                } else {
                    Ok(Pattern::Var(name, tok.span))
                }
            }
            TokenKind::Int { text, .. } => {
                self.advance();
                Ok(Pattern::Int(text, tok.span))
            }
            TokenKind::Float { text } => {
                self.advance();
                Ok(Pattern::Float(text, tok.span))
            }
            TokenKind::Str { value, .. } => {
                self.advance();
                Ok(Pattern::Str(value, tok.span))
            }
            TokenKind::Bool(b) => {
                self.advance();
                Ok(Pattern::Bool(b, tok.span))
            }
            TokenKind::Unit => {
                self.advance();
                Ok(Pattern::Unit(tok.span))
            }
            TokenKind::LBracket => self.parse_list_pattern(),
            TokenKind::LBrace => self.parse_record_pattern(),
            TokenKind::LParen => self.parse_paren_pattern(),
            _ => Err(self.err_unexpected("a pattern")),
        }
    }

    fn parse_list_pattern(&mut self) -> PResult<Pattern> {
        let start = self.expect(TokenKind::LBracket, "'['")?.span;
        let mut elems = Vec::new();
        let mut rest = None;
        while !self.check(&TokenKind::RBracket) {
            if self.eat(&TokenKind::DotDotDot) {
                rest = Some(Box::new(self.parse_pattern_no_or()?));
                break;
            }
            elems.push(self.parse_pattern()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        let end = self.expect(TokenKind::RBracket, "']'")?.span;
        Ok(Pattern::List(elems, rest, start.merge(end)))
    }

    fn parse_record_pattern(&mut self) -> PResult<Pattern> {
        let start = self.expect(TokenKind::LBrace, "'{'")?.span;
        let mut fields = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            let (name, name_span) = self.expect_ident("a field name")?;
            let pat = if self.eat(&TokenKind::Colon) {
                self.parse_pattern()?
            } else {
                Pattern::Var(name.clone(), name_span)
            };
            fields.push((name, pat));
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        let end = self.expect(TokenKind::RBrace, "'}'")?.span;
        Ok(Pattern::Record(fields, start.merge(end)))
    }

    fn parse_paren_pattern(&mut self) -> PResult<Pattern> {
        let start = self.expect(TokenKind::LParen, "'('")?.span;
        if self.eat(&TokenKind::RParen) {
            let end = self.prev_span();
            return Ok(Pattern::Unit(start.merge(end)));
        }
        let mut items = vec![self.parse_pattern()?];
        while self.eat(&TokenKind::Comma) {
            items.push(self.parse_pattern()?);
        }
        let end = self.expect(TokenKind::RParen, "')'")?.span;
        if items.len() == 1 {
            return Ok(items.pop().unwrap_or(Pattern::Unit(start.merge(end))));
        }
        Ok(Pattern::Tuple(items, start.merge(end)))
    }

    // ── expressions ──────────────────────────────────────────────────

    pub fn parse_expr(&mut self) -> PResult<Expr> {
        if let Some(lambda) = self.try_lambda()? {
            return Ok(lambda);
        }
        if self.at_keyword(Keyword::If) {
            return self.parse_if();
        }
        if self.at_keyword(Keyword::Match) {
            return self.parse_match();
        }
        if self.at_keyword(Keyword::Let) {
            return self.parse_let_expr();
        }
        if self.at_keyword(Keyword::While) {
            return self.parse_while();
        }
        if self.at_keyword(Keyword::Unsafe) {
            return self.parse_unsafe();
        }
        if self.at_keyword(Keyword::Try) {
            return self.parse_try();
        }
        self.parse_assign()
    }

    /// Attempts `pat (, pat)* => expr` (one or more lambda parameters). A
    /// single bare identifier is also accepted without parens:
    /// `x => x + 1`. Rewinds on failure to let the caller try other forms.
    fn try_lambda(&mut self) -> PResult<Option<Expr>> {
        let checkpoint = self.pos;
        if let TokenKind::Ident(name) = self.peek().kind.clone() {
            if name != "_" && name.chars().next().is_some_and(|c| c.is_lowercase()) {
                let span = self.peek().span;
                self.advance();
                if self.eat(&TokenKind::FatArrow) {
                    let body = self.parse_expr()?;
                    let full = span.merge(body.span());
                    return Ok(Some(Expr::Lambda {
                        params: vec![Pattern::Var(name, span)],
                        body: Box::new(body),
                        span: full,
                    }));
                }
            }
        }
        self.pos = checkpoint;
        if self.check(&TokenKind::LParen) {
            if let Some(params) = self.try_parse_pattern_list_then_arrow()? {
                let start = self.tokens[checkpoint].span;
                let body = self.parse_expr()?;
                let full = start.merge(body.span());
                return Ok(Some(Expr::Lambda {
                    params,
                    body: Box::new(body),
                    span: full,
                }));
            }
            self.pos = checkpoint;
        }
        Ok(None)
    }

    /// Tries `( pat, pat, ... ) =>`; returns `Ok(None)` (with position
    /// restored by the caller) if the parenthesised group is not followed by
    /// `=>`, meaning it was an ordinary grouped/tuple expression instead.
    fn try_parse_pattern_list_then_arrow(&mut self) -> PResult<Option<Vec<Pattern>>> {
        let checkpoint = self.pos;
        self.advance(); // '('
        let mut params = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                match self.parse_pattern_no_or() {
                    Ok(p) => params.push(p),
                    Err(_) => {
                        self.pos = checkpoint;
                        return Ok(None);
                    }
                }
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        if !self.eat(&TokenKind::RParen) {
            self.pos = checkpoint;
            return Ok(None);
        }
        if !self.eat(&TokenKind::FatArrow) {
            self.pos = checkpoint;
            return Ok(None);
        }
        Ok(Some(params))
    }

    fn parse_if(&mut self) -> PResult<Expr> {
        let start = self.expect_keyword(Keyword::If)?;
        let cond = self.parse_expr()?;
        self.expect_keyword(Keyword::Then)?;
        let then_branch = self.parse_expr()?;
        self.expect_keyword(Keyword::Else)?;
        let else_branch = self.parse_expr()?;
        let span = start.merge(else_branch.span());
        Ok(Expr::If {
            cond: Box::new(cond),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
            span,
        })
    }

    fn parse_match(&mut self) -> PResult<Expr> {
        let start = self.expect_keyword(Keyword::Match)?;
        let scrutinee = self.parse_expr()?;
        self.expect(TokenKind::LBrace, "'{'")?;
        let mut cases = Vec::new();
        self.eat(&TokenKind::Pipe);
        while !self.check(&TokenKind::RBrace) {
            let pattern = self.parse_pattern()?;
            let guard = if self.eat_keyword(Keyword::When) {
                Some(self.parse_expr()?)
            } else {
                None
            };
            self.expect(TokenKind::FatArrow, "'=>'")?;
            let body = self.parse_expr()?;
            let span = pattern.span().merge(body.span());
            cases.push(MatchCase {
                pattern,
                guard,
                body,
                span,
            });
            if !self.eat(&TokenKind::Pipe) {
                break;
            }
        }
        let end = self.expect(TokenKind::RBrace, "'}'")?.span;
        Ok(Expr::Match {
            scrutinee: Box::new(scrutinee),
            cases,
            span: start.merge(end),
        })
    }

    fn parse_let_expr(&mut self) -> PResult<Expr> {
        let start = self.expect_keyword(Keyword::Let)?;
        let is_rec = self.eat_keyword(Keyword::Rec);
        if is_rec {
            let mut bindings = vec![self.parse_let_binding()?];
            while self.eat_keyword(Keyword::And) {
                bindings.push(self.parse_let_binding()?);
            }
            self.expect(TokenKind::Semicolon, "';'")?;
            let body = self.parse_expr()?;
            let span = start.merge(body.span());
            return Ok(Expr::LetRec {
                bindings,
                body: Box::new(body),
                span,
            });
        }
        let mutable = self.eat_keyword(Keyword::Mut);
        let pattern = self.parse_pattern()?;
        let params = self.parse_param_list_if_function()?;
        self.expect(TokenKind::Eq, "'='")?;
        let mut value = self.parse_expr()?;
        if !params.is_empty() {
            let span = pattern.span().merge(value.span());
            value = Expr::Lambda {
                params,
                body: Box::new(value),
                span,
            };
        }
        self.expect(TokenKind::Semicolon, "';'")?;
        let body = self.parse_expr()?;
        let span = start.merge(body.span());
        Ok(Expr::Let {
            pattern,
            value: Box::new(value),
            body: Box::new(body),
            mutable,
            span,
        })
    }

    fn parse_while(&mut self) -> PResult<Expr> {
        let start = self.expect_keyword(Keyword::While)?;
        let cond = self.parse_expr()?;
        let body = self.parse_explicit_block()?;
        let span = start.merge(body.span());
        Ok(Expr::While {
            cond: Box::new(cond),
            body: Box::new(body),
            span,
        })
    }

    /// A brace-delimited block that is unambiguously a block (used for
    /// `while` bodies, which never accept a bare record).
    fn parse_explicit_block(&mut self) -> PResult<Expr> {
        let start = self.expect(TokenKind::LBrace, "'{'")?.span;
        let (statements, end) = self.parse_block_body()?;
        Ok(Expr::Block {
            statements,
            span: start.merge(end),
        })
    }

    fn parse_unsafe(&mut self) -> PResult<Expr> {
        let start = self.expect_keyword(Keyword::Unsafe)?;
        let inner = self.parse_explicit_block()?;
        let span = start.merge(inner.span());
        Ok(Expr::Unsafe {
            expr: Box::new(inner),
            span,
        })
    }

    fn parse_try(&mut self) -> PResult<Expr> {
        let start = self.expect_keyword(Keyword::Try)?;
        let body = self.parse_explicit_block()?;
        self.expect_keyword(Keyword::Catch)?;
        let pattern = self.parse_pattern()?;
        let handler = self.parse_explicit_block()?;
        let span = start.merge(handler.span());
        let case = MatchCase {
            pattern,
            guard: None,
            body: handler,
            span,
        };
        Ok(Expr::Match {
            scrutinee: Box::new(body),
            cases: vec![case],
            span,
        })
    }

    fn parse_assign(&mut self) -> PResult<Expr> {
        let lhs = self.parse_pipe_compose()?;
        if self.check(&TokenKind::ColonEq) {
            self.advance();
            let rhs = self.parse_assign()?;
            let span = lhs.span().merge(rhs.span());
            return Ok(Expr::BinOp {
                op: BinOpKind::Assign,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            });
        }
        Ok(lhs)
    }

    fn parse_pipe_compose(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_or()?;
        loop {
            if self.eat(&TokenKind::PipeGt) {
                let rhs = self.parse_or()?;
                let span = lhs.span().merge(rhs.span());
                lhs = Expr::Pipe {
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                    span,
                };
            } else if self.eat(&TokenKind::GtGt) {
                let rhs = self.parse_or()?;
                let span = lhs.span().merge(rhs.span());
                lhs = Expr::Compose {
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                    reversed: false,
                    span,
                };
            } else if self.eat(&TokenKind::LtLt) {
                let rhs = self.parse_or()?;
                let span = lhs.span().merge(rhs.span());
                lhs = Expr::Compose {
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                    reversed: true,
                    span,
                };
            } else {
                break;
            }
        }
        Ok(lhs)
    }

    fn parse_or(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_and()?;
        while self.eat(&TokenKind::PipePipe) {
            let rhs = self.parse_and()?;
            let span = lhs.span().merge(rhs.span());
            lhs = Expr::BinOp {
                op: BinOpKind::Or,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            };
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_cmp()?;
        while self.eat(&TokenKind::AmpAmp) {
            let rhs = self.parse_cmp()?;
            let span = lhs.span().merge(rhs.span());
            lhs = Expr::BinOp {
                op: BinOpKind::And,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            };
        }
        Ok(lhs)
    }

    fn parse_cmp(&mut self) -> PResult<Expr> {
        let lhs = self.parse_concat_cons()?;
        let op = match self.peek().kind {
            TokenKind::EqEq => BinOpKind::Eq,
            TokenKind::NotEq => BinOpKind::NotEq,
            TokenKind::Lt => BinOpKind::Lt,
            TokenKind::LtEq => BinOpKind::LtEq,
            TokenKind::Gt => BinOpKind::Gt,
            TokenKind::GtEq => BinOpKind::GtEq,
            _ => return Ok(lhs),
        };
        self.advance();
        let rhs = self.parse_concat_cons()?;
        let span = lhs.span().merge(rhs.span());
        Ok(Expr::BinOp {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            span,
        })
    }

    /// `&` (concat, left-assoc) and `::` (cons, right-assoc) share a tier;
    /// cons breaks out of the left-folding loop into right recursion.
    fn parse_concat_cons(&mut self) -> PResult<Expr> {
        let lhs = self.parse_add()?;
        if self.eat(&TokenKind::ColonColon) {
            let rhs = self.parse_concat_cons()?;
            let span = lhs.span().merge(rhs.span());
            return Ok(Expr::BinOp {
                op: BinOpKind::Cons,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            });
        }
        let mut lhs = lhs;
        while self.eat(&TokenKind::Amp) {
            let rhs = self.parse_add()?;
            let span = lhs.span().merge(rhs.span());
            lhs = Expr::BinOp {
                op: BinOpKind::Concat,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            };
        }
        Ok(lhs)
    }

    fn parse_add(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_mul()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinOpKind::Add,
                TokenKind::Minus => BinOpKind::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_mul()?;
            let span = lhs.span().merge(rhs.span());
            lhs = Expr::BinOp {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            };
        }
        Ok(lhs)
    }

    fn parse_mul(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_power()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinOpKind::Mul,
                TokenKind::Slash => BinOpKind::Div,
                TokenKind::Percent => BinOpKind::Mod,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_power()?;
            let span = lhs.span().merge(rhs.span());
            lhs = Expr::BinOp {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            };
        }
        Ok(lhs)
    }

    /// `**` is right-associative.
    fn parse_power(&mut self) -> PResult<Expr> {
        let lhs = self.parse_unary()?;
        if self.eat(&TokenKind::StarStar) {
            let rhs = self.parse_power()?;
            let span = lhs.span().merge(rhs.span());
            return Ok(Expr::BinOp {
                op: BinOpKind::Pow,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            });
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        let tok = self.peek().clone();
        let op = match tok.kind {
            TokenKind::Minus => Some(UnaryOpKind::Neg),
            TokenKind::Bang => Some(UnaryOpKind::Bang),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.parse_unary()?;
            let span = tok.span.merge(operand.span());
            return Ok(Expr::UnaryOp {
                op,
                operand: Box::new(operand),
                span,
            });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> PResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.eat(&TokenKind::Dot) {
                let (field, field_span) = self.expect_ident("a field name")?;
                let span = expr.span().merge(field_span);
                expr = Expr::RecordAccess {
                    record: Box::new(expr),
                    field,
                    span,
                };
            } else if self.check(&TokenKind::LParen) && !self.peek().preceded_by_newline {
                let args = self.parse_call_args()?;
                let end = self.prev_span();
                let span = expr.span().merge(end);
                expr = Expr::App {
                    func: Box::new(expr),
                    args,
                    span,
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_call_args(&mut self) -> PResult<Vec<Expr>> {
        self.expect(TokenKind::LParen, "'('")?;
        let mut args = Vec::new();
        while !self.check(&TokenKind::RParen) {
            args.push(self.parse_expr()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen, "')'")?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::Int { text, .. } => {
                self.advance();
                Ok(Expr::Int(text, tok.span))
            }
            TokenKind::Float { text } => {
                self.advance();
                Ok(Expr::Float(text, tok.span))
            }
            TokenKind::Str { value, .. } => {
                self.advance();
                Ok(Expr::Str(value, tok.span))
            }
            TokenKind::Bool(b) => {
                self.advance();
                Ok(Expr::Bool(b, tok.span))
            }
            TokenKind::Unit => {
                self.advance();
                Ok(Expr::Unit(tok.span))
            }
            TokenKind::Ident(name) => {
                self.advance();
                Ok(Expr::Var(name, tok.span))
            }
            TokenKind::Keyword(Keyword::Ref) => {
                self.advance();
                let args = self.parse_call_args()?;
                let span = tok.span.merge(self.prev_span());
                Ok(Expr::App {
                    func: Box::new(Expr::Var("ref".to_string(), tok.span)),
                    args,
                    span,
                })
            }
            TokenKind::LParen => self.parse_paren_expr(),
            TokenKind::LBracket => self.parse_list_expr(),
            TokenKind::LBrace => self.parse_brace_expr(),
            _ => Err(self.err_unexpected("an expression")),
        }
    }

    fn parse_paren_expr(&mut self) -> PResult<Expr> {
        let start = self.expect(TokenKind::LParen, "'('")?.span;
        if self.eat(&TokenKind::RParen) {
            let end = self.prev_span();
            return Ok(Expr::Unit(start.merge(end)));
        }
        let mut items = vec![self.parse_expr()?];
        while self.eat(&TokenKind::Comma) {
            items.push(self.parse_expr()?);
        }
        let end = self.expect(TokenKind::RParen, "')'")?.span;
        if items.len() == 1 {
            let inner = items.pop().unwrap_or(Expr::Unit(start.merge(end)));
            if self.eat(&TokenKind::Colon) {
                let ty = self.parse_type()?;
                let span = start.merge(ty.span());
                return Ok(Expr::TypeAnnotation {
                    expr: Box::new(inner),
                    ty,
                    span,
                });
            }
            return Ok(inner);
        }
        Ok(Expr::Tuple {
            elements: items,
            span: start.merge(end),
        })
    }

    fn parse_list_expr(&mut self) -> PResult<Expr> {
        let start = self.expect(TokenKind::LBracket, "'['")?.span;
        let mut elements = Vec::new();
        while !self.check(&TokenKind::RBracket) {
            if self.eat(&TokenKind::DotDotDot) {
                elements.push(ListElem::Spread(self.parse_expr()?));
            } else {
                elements.push(ListElem::Item(self.parse_expr()?));
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        let end = self.expect(TokenKind::RBracket, "']'")?.span;
        Ok(Expr::List {
            elements,
            span: start.merge(end),
        })
    }

    /// `{` starts either a record (literal or update-via-spread) or a block.
    /// Lookahead at the first non-trivial token after `{` decides: `}`,
    /// `...`, or `ident :`/`ident ,`/`ident }` all mean record; anything
    /// else is a block (spec §6.3).
    fn parse_brace_expr(&mut self) -> PResult<Expr> {
        if self.looks_like_record() {
            return self.parse_record_body();
        }
        let start = self.expect(TokenKind::LBrace, "'{'")?.span;
        let (statements, end) = self.parse_block_body()?;
        Ok(Expr::Block {
            statements,
            span: start.merge(end),
        })
    }

    fn looks_like_record(&self) -> bool {
        debug_assert!(matches!(self.peek().kind, TokenKind::LBrace));
        match &self.peek_at(1).kind {
            TokenKind::RBrace | TokenKind::DotDotDot => true,
            TokenKind::Ident(_) => matches!(
                self.peek_at(2).kind,
                TokenKind::Colon | TokenKind::Comma | TokenKind::RBrace
            ),
            _ => false,
        }
    }

    fn parse_record_body(&mut self) -> PResult<Expr> {
        let start = self.expect(TokenKind::LBrace, "'{'")?.span;
        let mut fields = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            if self.eat(&TokenKind::DotDotDot) {
                fields.push(RecordFieldExpr::Spread(self.parse_expr()?));
            } else {
                let (name, name_span) = self.expect_ident("a field name")?;
                let value = if self.eat(&TokenKind::Colon) {
                    self.parse_expr()?
                } else {
                    Expr::Var(name.clone(), name_span)
                };
                fields.push(RecordFieldExpr::Named(name, value));
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        let end = self.expect(TokenKind::RBrace, "'}'")?.span;
        let span = start.merge(end);
        let is_update = matches!(fields.first(), Some(RecordFieldExpr::Spread(_)));
        if is_update {
            let base = match fields.remove(0) {
                RecordFieldExpr::Spread(e) => e,
                RecordFieldExpr::Named(..) => unreachable!(),
            };
            return Ok(Expr::RecordUpdate {
                record: Box::new(base),
                fields,
                span,
            });
        }
        Ok(Expr::Record { fields, span })
    }

    /// A sequence of `;`-terminated statements followed by a final
    /// expression with no trailing `;`; desugars to nested `let _ = ...`
    /// (spec §4.3). The final expression's span end is the block's end.
    fn parse_block_body(&mut self) -> PResult<(Vec<Expr>, Span)> {
        let mut statements = Vec::new();
        loop {
            if self.check(&TokenKind::RBrace) {
                break;
            }
            let expr = self.parse_expr()?;
            if self.eat(&TokenKind::Semicolon) {
                statements.push(expr);
                if self.check(&TokenKind::RBrace) {
                    statements.push(Expr::Unit(self.prev_span()));
                    break;
                }
                continue;
            }
            statements.push(expr);
            break;
        }
        let end = self.expect(TokenKind::RBrace, "'}'")?.span;
        Ok((statements, end))
    }
}

pub fn parse(tokens: Vec<Token>, max_errors: usize) -> (Module, Vec<ParseError>) {
    Parser::new(tokens, max_errors).parse_module()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;

    fn parse_expr_str(src: &str) -> Expr {
        let tokens = lex(src, 0).expect("lex ok");
        let mut p = Parser::new(tokens, 10);
        p.parse_expr().expect("parse ok")
    }

    fn parse_module_str(src: &str) -> Module {
        let tokens = lex(src, 0).expect("lex ok");
        let (m, errs) = parse(tokens, 10);
        assert!(errs.is_empty(), "unexpected parse errors: {errs:?}");
        m
    }

    #[test]
    fn bare_ident_lambda() {
        let e = parse_expr_str("x => x + 1");
        match e {
            Expr::Lambda { params, .. } => assert_eq!(params.len(), 1),
            other => panic!("expected lambda, got {other:?}"),
        }
    }

    #[test]
    fn multi_param_lambda_absorbs_pipe_body() {
        let e = parse_expr_str("(x, y) => x |> f");
        match e {
            Expr::Lambda { params, body, .. } => {
                assert_eq!(params.len(), 2);
                assert!(matches!(*body, Expr::Pipe { .. }));
            }
            other => panic!("expected lambda, got {other:?}"),
        }
    }

    #[test]
    fn parenthesised_group_is_not_a_lambda() {
        let e = parse_expr_str("(1 + 2) * 3");
        assert!(matches!(e, Expr::BinOp { op: BinOpKind::Mul, .. }));
    }

    #[test]
    fn empty_braces_is_empty_record() {
        let e = parse_expr_str("{}");
        assert!(matches!(e, Expr::Record { .. }));
    }

    #[test]
    fn brace_with_statement_is_block() {
        let e = parse_expr_str("{ let x = 1; x }");
        assert!(matches!(e, Expr::Block { .. }));
    }

    #[test]
    fn leading_spread_is_record_update() {
        let e = parse_expr_str("{ ...base, x: 1 }");
        assert!(matches!(e, Expr::RecordUpdate { .. }));
    }

    #[test]
    fn or_pattern_in_match_case() {
        let m = parse_module_str("let f = match n { | 0 | 1 => \"s\" | _ => \"m\" };");
        match &m.decls[0] {
            Decl::Let(d) => match &d.value {
                Expr::Match { cases, .. } => {
                    assert_eq!(cases.len(), 2);
                    assert!(matches!(cases[0].pattern, Pattern::Or(..)));
                }
                other => panic!("expected match, got {other:?}"),
            },
            other => panic!("expected let decl, got {other:?}"),
        }
    }

    #[test]
    fn curried_let_function_sugar() {
        let m = parse_module_str("let add x y = x + y;");
        match &m.decls[0] {
            Decl::Let(d) => assert!(matches!(d.value, Expr::Lambda { .. })),
            other => panic!("expected let decl, got {other:?}"),
        }
    }

    #[test]
    fn missing_semicolon_recorded_and_recovers() {
        let tokens = lex("let x = 1\nlet y = 2;", 0).expect("lex ok");
        let (m, errs) = parse(tokens, 10);
        assert!(!errs.is_empty());
        assert_eq!(m.decls.len(), 2);
    }

    #[test]
    fn variant_type_decl() {
        let m = parse_module_str("type Option a = | Some(a) | None;");
        match &m.decls[0] {
            Decl::Type(d) => match &d.def {
                TypeDef::Variant(ctors) => assert_eq!(ctors.len(), 2),
                other => panic!("expected variant def, got {other:?}"),
            },
            other => panic!("expected type decl, got {other:?}"),
        }
    }
}
