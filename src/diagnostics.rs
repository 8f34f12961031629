//! The single diagnostic channel (spec §4.6), with human (ANSI) and
//! machine (JSON) renderings.

use crate::error_codes::ErrorCode;
use crate::tokens::Span;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Note,
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub code: ErrorCode,
    pub severity: Severity,
    pub message: String,
    pub primary_span: Span,
    pub secondary_spans: Vec<(Span, String)>,
    pub expected: Option<String>,
    pub actual: Option<String>,
    pub hint: Option<String>,
}

impl Diagnostic {
    pub fn new(code: ErrorCode, message: impl Into<String>, span: Span) -> Self {
        let severity = if code.is_warning() {
            Severity::Warning
        } else {
            Severity::Error
        };
        Diagnostic {
            code,
            severity,
            message: message.into(),
            primary_span: span,
            secondary_spans: Vec::new(),
            expected: None,
            actual: None,
            hint: None,
        }
    }

    pub fn with_expected_actual(mut self, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self.actual = Some(actual.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_secondary(mut self, span: Span, label: impl Into<String>) -> Self {
        self.secondary_spans.push((span, label.into()));
        self
    }

    /// Elm-style source-excerpt rendering: a boxed header naming the code
    /// and severity, the offending source line, and a caret underline.
    pub fn render_ansi(&self, source: &str) -> String {
        let (red, yellow, bold, reset) = ("\x1b[31m", "\x1b[33m", "\x1b[1m", "\x1b[0m");
        let color = if self.severity == Severity::Warning {
            yellow
        } else {
            red
        };
        let label = match self.severity {
            Severity::Error => "ERROR",
            Severity::Warning => "WARNING",
            Severity::Note => "NOTE",
        };
        let line_text = source.lines().nth(self.primary_span.line.saturating_sub(1)).unwrap_or("");
        let mut out = String::new();
        out.push_str(&format!(
            "{bold}── {} {label} ── line {}:{} {reset}\n",
            self.code,
            self.primary_span.line,
            self.primary_span.col
        ));
        out.push_str(&format!("{}\n", line_text));
        let underline_len = (self.primary_span.end.saturating_sub(self.primary_span.start)).max(1);
        out.push_str(&" ".repeat(self.primary_span.col.saturating_sub(1)));
        out.push_str(color);
        out.push_str(&"^".repeat(underline_len));
        out.push_str(reset);
        out.push('\n');
        out.push_str(&self.message);
        out.push('\n');
        if let (Some(expected), Some(actual)) = (&self.expected, &self.actual) {
            out.push_str(&format!("  expected: {expected}\n  actual:   {actual}\n"));
        }
        if let Some(hint) = &self.hint {
            out.push_str(&format!("  hint: {hint}\n"));
        }
        out
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "code": self.code.code(),
            "severity": self.severity,
            "message": self.message,
            "file": self.primary_span.file,
            "startLine": self.primary_span.line,
            "startCol": self.primary_span.col,
            "endLine": self.primary_span.line,
            "endCol": self.primary_span.col + (self.primary_span.end - self.primary_span.start),
            "expected": self.expected,
            "actual": self.actual,
            "hint": self.hint,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warning_severity_derived_from_code() {
        let d = Diagnostic::new(ErrorCode::TypeNonExhaustiveMatch, "missing case", Span::dummy());
        assert_eq!(d.severity, Severity::Warning);
    }

    #[test]
    fn error_severity_derived_from_code() {
        let d = Diagnostic::new(ErrorCode::TypeMismatch, "mismatch", Span::dummy());
        assert_eq!(d.severity, Severity::Error);
    }

    #[test]
    fn json_includes_stable_code() {
        let d = Diagnostic::new(ErrorCode::TypeMismatch, "mismatch", Span::dummy());
        let json = d.to_json();
        assert_eq!(json["code"], "VF4001");
    }
}
