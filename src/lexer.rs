//! UTF-8 source text to token stream (spec §4.1).

use crate::tokens::{IntRadix, Keyword, Span, Token, TokenKind};
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LexError {
    #[error("unterminated string literal at {0:?}")]
    UnterminatedString(Span),
    #[error("unterminated block comment at {0:?}")]
    UnterminatedComment(Span),
    #[error("invalid numeric literal at {0:?}: {1}")]
    InvalidNumber(Span, String),
    #[error("unknown escape sequence '\\{1}' at {0:?}")]
    UnknownEscape(Span, char),
    #[error("malformed unicode escape at {0:?}")]
    MalformedUnicodeEscape(Span),
    #[error("unicode escape out of range at {0:?}")]
    UnicodeEscapeOutOfRange(Span),
    #[error("unexpected character '{1}' at {0:?}")]
    UnexpectedChar(Span, char),
    #[error("raw newline inside single-line string at {0:?}")]
    RawNewlineInString(Span),
}

impl LexError {
    pub fn span(&self) -> Span {
        match self {
            LexError::UnterminatedString(s)
            | LexError::UnterminatedComment(s)
            | LexError::InvalidNumber(s, _)
            | LexError::UnknownEscape(s, _)
            | LexError::MalformedUnicodeEscape(s)
            | LexError::UnicodeEscapeOutOfRange(s)
            | LexError::UnexpectedChar(s, _)
            | LexError::RawNewlineInString(s) => *s,
        }
    }
}

/// Returns true for characters the spec allows to continue an identifier
/// beyond what `unicode-ident` classifies as `XID_Continue`: emoji
/// presentation, and ZWJ (already XID_Continue-adjacent but spelled out
/// here for clarity since emoji sequences rely on it).
fn is_extra_ident_continue(c: char) -> bool {
    matches!(c,
        '\u{200D}' // ZWJ
        | '\u{1F300}'..='\u{1FAFF}'
        | '\u{2600}'..='\u{27BF}'
        | '\u{FE0F}' // emoji presentation selector
    )
}

fn is_ident_start(c: char) -> bool {
    c == '_' || unicode_ident::is_xid_start(c) || matches!(c, '\u{1F300}'..='\u{1FAFF}')
}

fn is_ident_continue(c: char) -> bool {
    unicode_ident::is_xid_continue(c) || is_extra_ident_continue(c)
}

pub struct Lexer<'a> {
    file: u32,
    chars: Vec<char>,
    byte_offsets: Vec<usize>,
    source: &'a str,
    pos: usize,
    line: usize,
    col: usize,
    newline_pending: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str, file: u32) -> Self {
        let source = source.strip_prefix('\u{FEFF}').unwrap_or(source);
        let mut chars = Vec::with_capacity(source.len());
        let mut byte_offsets = Vec::with_capacity(source.len() + 1);
        for (i, c) in source.char_indices() {
            chars.push(c);
            byte_offsets.push(i);
        }
        byte_offsets.push(source.len());
        Self {
            file,
            chars,
            byte_offsets,
            source,
            pos: 0,
            line: 1,
            col: 1,
            newline_pending: false,
        }
    }

    fn byte_at(&self, pos: usize) -> usize {
        self.byte_offsets.get(pos).copied().unwrap_or(self.source.len())
    }

    fn cur(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.chars.get(self.pos + n).copied()
    }

    fn span_point(&self) -> Span {
        let b = self.byte_at(self.pos);
        Span::new(self.file, b, b, self.line, self.col)
    }

    fn span_from(&self, start_pos: usize, start_line: usize, start_col: usize) -> Span {
        Span::new(
            self.file,
            self.byte_at(start_pos),
            self.byte_at(self.pos),
            start_line,
            start_col,
        )
    }

    /// Advance one logical character; CR and CRLF both count as a single
    /// newline (spec §4.1: "CR, LF, CRLF normalised to LF logically").
    fn bump(&mut self) -> Option<char> {
        let c = self.cur()?;
        self.pos += 1;
        if c == '\r' {
            if self.cur() == Some('\n') {
                self.pos += 1;
            }
            self.line += 1;
            self.col = 1;
        } else if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn skip_trivia(&mut self) -> Result<(), LexError> {
        loop {
            match self.cur() {
                Some(c) if c == ' ' || c == '\t' => {
                    self.bump();
                }
                Some('\r') | Some('\n') => {
                    self.newline_pending = true;
                    self.bump();
                }
                Some('/') if self.peek_at(1) == Some('/') => {
                    while self.cur().is_some() && self.cur() != Some('\r') && self.cur() != Some('\n') {
                        self.bump();
                    }
                }
                Some('/') if self.peek_at(1) == Some('*') => {
                    self.skip_block_comment()?;
                }
                _ => return Ok(()),
            }
        }
    }

    fn skip_block_comment(&mut self) -> Result<(), LexError> {
        let start_pos = self.pos;
        let start_line = self.line;
        let start_col = self.col;
        self.bump(); // '/'
        self.bump(); // '*'
        let mut depth = 1usize;
        loop {
            match self.cur() {
                None => {
                    return Err(LexError::UnterminatedComment(self.span_from(
                        start_pos, start_line, start_col,
                    )))
                }
                Some('*') if self.peek_at(1) == Some('/') => {
                    self.bump();
                    self.bump();
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                Some('/') if self.peek_at(1) == Some('*') => {
                    self.bump();
                    self.bump();
                    depth += 1;
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut out = Vec::new();
        loop {
            self.skip_trivia()?;
            let newline_before = std::mem::take(&mut self.newline_pending);
            let start_pos = self.pos;
            let start_line = self.line;
            let start_col = self.col;
            let Some(c) = self.cur() else {
                out.push(Token::new(TokenKind::Eof, self.span_point(), newline_before));
                break;
            };

            let kind = if is_ident_start(c) {
                self.lex_ident_or_keyword()?
            } else if c.is_ascii_digit() {
                self.lex_number(start_pos, start_line, start_col)?
            } else if c == '"' {
                self.lex_string(start_pos, start_line, start_col)?
            } else {
                self.lex_operator(start_pos, start_line, start_col)?
            };
            let span = self.span_from(start_pos, start_line, start_col);
            out.push(Token::new(kind, span, newline_before));
        }
        Ok(out)
    }

    fn lex_ident_or_keyword(&mut self) -> Result<TokenKind, LexError> {
        let mut raw = String::new();
        while let Some(c) = self.cur() {
            if raw.is_empty() {
                if !is_ident_start(c) {
                    break;
                }
            } else if !is_ident_continue(c) {
                break;
            }
            raw.push(c);
            self.bump();
        }
        let normalized: String = raw.nfc().collect();
        if normalized == "true" {
            return Ok(TokenKind::Bool(true));
        }
        if normalized == "false" {
            return Ok(TokenKind::Bool(false));
        }
        if let Some(kw) = Keyword::from_str(&normalized) {
            return Ok(TokenKind::Keyword(kw));
        }
        Ok(TokenKind::Ident(normalized))
    }

    fn lex_number(
        &mut self,
        start_pos: usize,
        start_line: usize,
        start_col: usize,
    ) -> Result<TokenKind, LexError> {
        let err_span = || Span::new(self.file, 0, 0, start_line, start_col);
        let _ = err_span;

        if self.cur() == Some('0') && matches!(self.peek_at(1), Some('x') | Some('X')) {
            self.bump();
            self.bump();
            let digits = self.consume_digit_run(|c| c.is_ascii_hexdigit())?;
            if digits.is_empty() {
                return Err(LexError::InvalidNumber(
                    self.span_from(start_pos, start_line, start_col),
                    "hex literal has no digits".into(),
                ));
            }
            return Ok(TokenKind::Int {
                text: format!("0x{digits}"),
                radix: IntRadix::Hex,
            });
        }
        if self.cur() == Some('0') && matches!(self.peek_at(1), Some('b') | Some('B')) {
            self.bump();
            self.bump();
            let digits = self.consume_digit_run(|c| c == '0' || c == '1')?;
            if digits.is_empty() {
                return Err(LexError::InvalidNumber(
                    self.span_from(start_pos, start_line, start_col),
                    "binary literal has no digits".into(),
                ));
            }
            return Ok(TokenKind::Int {
                text: format!("0b{digits}"),
                radix: IntRadix::Binary,
            });
        }

        let int_part = self.consume_digit_run(|c| c.is_ascii_digit())?;

        let mut is_float = false;
        let mut text = int_part;
        if self.cur() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            is_float = true;
            text.push('.');
            self.bump();
            let frac = self.consume_digit_run(|c| c.is_ascii_digit())?;
            text.push_str(&frac);
        }
        if matches!(self.cur(), Some('e') | Some('E')) {
            let save_pos = self.pos;
            let save_line = self.line;
            let save_col = self.col;
            let mut exp_text = String::new();
            exp_text.push(self.cur().unwrap_or('e'));
            self.bump();
            if matches!(self.cur(), Some('+') | Some('-')) {
                exp_text.push(self.cur().unwrap_or('+'));
                self.bump();
            }
            if self.cur().is_some_and(|c| c.is_ascii_digit()) {
                is_float = true;
                let exp_digits = self.consume_digit_run(|c| c.is_ascii_digit())?;
                exp_text.push_str(&exp_digits);
                text.push_str(&exp_text);
            } else {
                self.pos = save_pos;
                self.line = save_line;
                self.col = save_col;
            }
        }

        if is_float {
            Ok(TokenKind::Float { text })
        } else {
            Ok(TokenKind::Int {
                text,
                radix: IntRadix::Decimal,
            })
        }
    }

    /// Consumes a run of digits permitting single, non-leading, non-trailing
    /// underscore separators (spec §3.1, §4.1).
    fn consume_digit_run(&mut self, is_digit: impl Fn(char) -> bool) -> Result<String, LexError> {
        let start_pos = self.pos;
        let start_line = self.line;
        let start_col = self.col;
        let mut out = String::new();
        let mut prev_was_underscore = false;
        let mut prev_was_digit = false;
        while let Some(c) = self.cur() {
            if is_digit(c) {
                out.push(c);
                self.bump();
                prev_was_underscore = false;
                prev_was_digit = true;
            } else if c == '_' {
                if !prev_was_digit || prev_was_underscore {
                    return Err(LexError::InvalidNumber(
                        self.span_from(start_pos, start_line, start_col),
                        "stray or consecutive '_' in numeric literal".into(),
                    ));
                }
                self.bump();
                prev_was_underscore = true;
            } else {
                break;
            }
        }
        if prev_was_underscore {
            return Err(LexError::InvalidNumber(
                self.span_from(start_pos, start_line, start_col),
                "trailing '_' in numeric literal".into(),
            ));
        }
        Ok(out)
    }

    fn lex_string(
        &mut self,
        start_pos: usize,
        start_line: usize,
        start_col: usize,
    ) -> Result<TokenKind, LexError> {
        let triple = self.peek_at(1) == Some('"') && self.peek_at(2) == Some('"');
        self.bump(); // opening "
        if triple {
            self.bump();
            self.bump();
        }
        let mut value = String::new();
        loop {
            match self.cur() {
                None => {
                    return Err(LexError::UnterminatedString(self.span_from(
                        start_pos, start_line, start_col,
                    )))
                }
                Some('"') => {
                    if triple {
                        if self.peek_at(1) == Some('"') && self.peek_at(2) == Some('"') {
                            self.bump();
                            self.bump();
                            self.bump();
                            break;
                        }
                        value.push('"');
                        self.bump();
                    } else {
                        self.bump();
                        break;
                    }
                }
                Some('\r') | Some('\n') if !triple => {
                    return Err(LexError::RawNewlineInString(self.span_from(
                        start_pos, start_line, start_col,
                    )))
                }
                Some('\\') => {
                    let esc_pos = self.pos;
                    let esc_line = self.line;
                    let esc_col = self.col;
                    self.bump();
                    value.push(self.lex_escape(esc_pos, esc_line, esc_col)?);
                }
                Some(c) => {
                    value.push(c);
                    self.bump();
                }
            }
        }
        let normalized: String = value.nfc().collect();
        Ok(TokenKind::Str {
            value: normalized,
            triple,
        })
    }

    fn lex_escape(
        &mut self,
        esc_pos: usize,
        esc_line: usize,
        esc_col: usize,
    ) -> Result<char, LexError> {
        let span = |this: &Self| this.span_from(esc_pos, esc_line, esc_col);
        match self.cur() {
            Some('\\') => {
                self.bump();
                Ok('\\')
            }
            Some('"') => {
                self.bump();
                Ok('"')
            }
            Some('\'') => {
                self.bump();
                Ok('\'')
            }
            Some('n') => {
                self.bump();
                Ok('\n')
            }
            Some('r') => {
                self.bump();
                Ok('\r')
            }
            Some('t') => {
                self.bump();
                Ok('\t')
            }
            Some('x') => {
                self.bump();
                let mut hex = String::new();
                for _ in 0..2 {
                    match self.cur() {
                        Some(c) if c.is_ascii_hexdigit() => {
                            hex.push(c);
                            self.bump();
                        }
                        _ => return Err(LexError::MalformedUnicodeEscape(span(self))),
                    }
                }
                let v = u32::from_str_radix(&hex, 16).map_err(|_| {
                    LexError::MalformedUnicodeEscape(span(self))
                })?;
                char::from_u32(v).ok_or_else(|| LexError::UnicodeEscapeOutOfRange(span(self)))
            }
            Some('u') => {
                self.bump();
                if self.cur() == Some('{') {
                    self.bump();
                    let mut hex = String::new();
                    while self.cur().is_some_and(|c| c.is_ascii_hexdigit()) {
                        hex.push(self.cur().unwrap_or('0'));
                        self.bump();
                    }
                    if self.cur() != Some('}') || hex.is_empty() || hex.len() > 6 {
                        return Err(LexError::MalformedUnicodeEscape(span(self)));
                    }
                    self.bump();
                    let v = u32::from_str_radix(&hex, 16)
                        .map_err(|_| LexError::MalformedUnicodeEscape(span(self)))?;
                    char::from_u32(v).ok_or_else(|| LexError::UnicodeEscapeOutOfRange(span(self)))
                } else {
                    let mut hex = String::new();
                    for _ in 0..4 {
                        match self.cur() {
                            Some(c) if c.is_ascii_hexdigit() => {
                                hex.push(c);
                                self.bump();
                            }
                            _ => return Err(LexError::MalformedUnicodeEscape(span(self))),
                        }
                    }
                    let v = u32::from_str_radix(&hex, 16)
                        .map_err(|_| LexError::MalformedUnicodeEscape(span(self)))?;
                    char::from_u32(v).ok_or_else(|| LexError::UnicodeEscapeOutOfRange(span(self)))
                }
            }
            Some(other) => Err(LexError::UnknownEscape(span(self), other)),
            None => Err(LexError::UnterminatedString(span(self))),
        }
    }

    /// Maximal-munch operator/punctuation tokenisation (spec §4.1, §6.2).
    fn lex_operator(
        &mut self,
        start_pos: usize,
        start_line: usize,
        start_col: usize,
    ) -> Result<TokenKind, LexError> {
        let c0 = self.bump().ok_or_else(|| {
            LexError::UnexpectedChar(self.span_from(start_pos, start_line, start_col), '\0')
        })?;
        let c1 = self.cur();

        macro_rules! two {
            ($second:expr, $tok:expr) => {
                if c1 == Some($second) {
                    self.bump();
                    return Ok($tok);
                }
            };
        }

        match c0 {
            '(' => {
                if c1 == Some(')') {
                    self.bump();
                    return Ok(TokenKind::Unit);
                }
                Ok(TokenKind::LParen)
            }
            ')' => Ok(TokenKind::RParen),
            '{' => Ok(TokenKind::LBrace),
            '}' => Ok(TokenKind::RBrace),
            '[' => Ok(TokenKind::LBracket),
            ']' => Ok(TokenKind::RBracket),
            ',' => Ok(TokenKind::Comma),
            ';' => Ok(TokenKind::Semicolon),
            '+' => Ok(TokenKind::Plus),
            '%' => Ok(TokenKind::Percent),
            '*' => {
                two!('*', TokenKind::StarStar);
                Ok(TokenKind::Star)
            }
            '/' => Ok(TokenKind::Slash),
            '=' => {
                two!('=', TokenKind::EqEq);
                two!('>', TokenKind::FatArrow);
                Ok(TokenKind::Eq)
            }
            '!' => {
                two!('=', TokenKind::NotEq);
                Ok(TokenKind::Bang)
            }
            '<' => {
                two!('=', TokenKind::LtEq);
                two!('<', TokenKind::LtLt);
                Ok(TokenKind::Lt)
            }
            '>' => {
                two!('=', TokenKind::GtEq);
                two!('>', TokenKind::GtGt);
                Ok(TokenKind::Gt)
            }
            '&' => {
                two!('&', TokenKind::AmpAmp);
                Ok(TokenKind::Amp)
            }
            '|' => {
                two!('|', TokenKind::PipePipe);
                two!('>', TokenKind::PipeGt);
                Ok(TokenKind::Pipe)
            }
            ':' => {
                two!(':', TokenKind::ColonColon);
                two!('=', TokenKind::ColonEq);
                Ok(TokenKind::Colon)
            }
            '-' => {
                two!('>', TokenKind::Arrow);
                Ok(TokenKind::Minus)
            }
            '.' => {
                if c1 == Some('.') && self.peek_at(1) == Some('.') {
                    self.bump();
                    self.bump();
                    return Ok(TokenKind::DotDotDot);
                }
                two!('.', TokenKind::DotDot);
                Ok(TokenKind::Dot)
            }
            other => Err(LexError::UnexpectedChar(
                self.span_from(start_pos, start_line, start_col),
                other,
            )),
        }
    }
}

pub fn lex(source: &str, file: u32) -> Result<Vec<Token>, LexError> {
    Lexer::new(source, file).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        lex(src, 0)
            .unwrap_or_else(|e| panic!("lex error: {e}"))
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn lexes_let_binding() {
        let ks = kinds("let x = 1;");
        assert_eq!(
            ks,
            vec![
                TokenKind::Keyword(Keyword::Let),
                TokenKind::Ident("x".into()),
                TokenKind::Eq,
                TokenKind::Int {
                    text: "1".into(),
                    radix: IntRadix::Decimal
                },
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_hex_and_binary() {
        let ks = kinds("0xFF 0b1010 1_000");
        assert_eq!(
            ks[0],
            TokenKind::Int {
                text: "0xFF".into(),
                radix: IntRadix::Hex
            }
        );
        assert_eq!(
            ks[1],
            TokenKind::Int {
                text: "0b1010".into(),
                radix: IntRadix::Binary
            }
        );
        assert_eq!(
            ks[2],
            TokenKind::Int {
                text: "1000".into(),
                radix: IntRadix::Decimal
            }
        );
    }

    #[test]
    fn rejects_consecutive_underscore() {
        assert!(lex("1__0", 0).is_err());
    }

    #[test]
    fn rejects_trailing_underscore() {
        assert!(lex("10_", 0).is_err());
    }

    #[test]
    fn float_requires_both_sides() {
        let ks = kinds("3.14");
        assert_eq!(ks[0], TokenKind::Float { text: "3.14".into() });
    }

    #[test]
    fn nested_block_comments() {
        let ks = kinds("/* outer /* inner */ still outer */ 1");
        assert_eq!(
            ks[0],
            TokenKind::Int {
                text: "1".into(),
                radix: IntRadix::Decimal
            }
        );
    }

    #[test]
    fn unterminated_block_comment_errors() {
        assert!(lex("/* never closed", 0).is_err());
    }

    #[test]
    fn triple_quoted_string_allows_newline() {
        let ks = kinds("\"\"\"line1\nline2\"\"\"");
        match &ks[0] {
            TokenKind::Str { value, triple } => {
                assert!(triple);
                assert_eq!(value, "line1\nline2");
            }
            other => panic!("expected string, got {other:?}"),
        }
    }

    #[test]
    fn single_line_string_rejects_raw_newline() {
        assert!(lex("\"a\nb\"", 0).is_err());
    }

    #[test]
    fn maximal_munch_operators() {
        let ks = kinds("|> >> << :: := ** && ||");
        assert_eq!(
            ks,
            vec![
                TokenKind::PipeGt,
                TokenKind::GtGt,
                TokenKind::LtLt,
                TokenKind::ColonColon,
                TokenKind::ColonEq,
                TokenKind::StarStar,
                TokenKind::AmpAmp,
                TokenKind::PipePipe,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn identifier_nfc_normalised() {
        // "é" as e + combining acute (NFD) should normalise to precomposed NFC.
        let nfd = "caf\u{0065}\u{0301}";
        let ks = kinds(nfd);
        match &ks[0] {
            TokenKind::Ident(s) => assert_eq!(s, "caf\u{00e9}"),
            other => panic!("expected ident, got {other:?}"),
        }
    }

    #[test]
    fn unit_literal() {
        assert_eq!(kinds("()"), vec![TokenKind::Unit, TokenKind::Eof]);
    }

    #[test]
    fn keyword_vs_identifier() {
        let ks = kinds("let letter");
        assert_eq!(ks[0], TokenKind::Keyword(Keyword::Let));
        assert_eq!(ks[1], TokenKind::Ident("letter".into()));
    }

    #[test]
    fn unicode_escape_braced() {
        let ks = kinds(r#""\u{1F600}""#);
        match &ks[0] {
            TokenKind::Str { value, .. } => assert_eq!(value.chars().next().unwrap(), '\u{1F600}'),
            other => panic!("expected string, got {other:?}"),
        }
    }

    #[test]
    fn bom_is_stripped() {
        let ks = kinds("\u{FEFF}let x = 1;");
        assert_eq!(ks[0], TokenKind::Keyword(Keyword::Let));
    }
}
