//! Stable `VFxxxx` diagnostic codes (spec §4.6, §7).

/// One code per error/warning variant across all phases. Ranges: `VF1xxx`
/// lexer, `VF2xxx` parser, `VF3xxx` desugarer, `VF4xxx` type checker
/// (`VF49xx` warnings), `VF5xxx` module-level (emitted by the caller).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Lexer
    LexUnterminatedString,
    LexUnterminatedComment,
    LexInvalidNumber,
    LexUnknownEscape,
    LexInvalidUnicodeEscape,
    LexUnexpectedChar,

    // Parser
    ParseUnexpectedToken,
    ParseUnexpectedEof,
    ParseUnclosedDelimiter,

    // Desugarer
    DesugarOrPatternMismatch,
    DesugarInvalidSpread,

    // Type checker — errors
    TypeMismatch,
    TypeUndefinedVariable,
    TypeOccursCheck,
    TypeArityMismatch,
    TypeValueRestriction,
    TypeUndefinedTypeName,
    TypeUndefinedConstructor,
    TypeExpectedFunction,
    TypeMissingRecordField,
    TypeExpectedVariant,

    // Type checker — warnings
    TypeNonExhaustiveMatch,
    TypeUnreachableCase,
    TypeUnusedBinding,

    // Module-level (defined here for ABI completeness; emitted by a caller)
    ModuleCyclicDependency,
    ModuleCyclicDependencyChain,
}

impl ErrorCode {
    pub fn code(self) -> &'static str {
        use ErrorCode::*;
        match self {
            LexUnterminatedString => "VF1001",
            LexUnterminatedComment => "VF1002",
            LexInvalidNumber => "VF1003",
            LexUnknownEscape => "VF1004",
            LexInvalidUnicodeEscape => "VF1005",
            LexUnexpectedChar => "VF1006",

            ParseUnexpectedToken => "VF2001",
            ParseUnexpectedEof => "VF2002",
            ParseUnclosedDelimiter => "VF2003",

            DesugarOrPatternMismatch => "VF3001",
            DesugarInvalidSpread => "VF3002",

            TypeMismatch => "VF4001",
            TypeUndefinedVariable => "VF4002",
            TypeOccursCheck => "VF4003",
            TypeArityMismatch => "VF4006",
            TypeValueRestriction => "VF4011",
            TypeUndefinedTypeName => "VF4014",
            TypeUndefinedConstructor => "VF4016",
            TypeExpectedFunction => "VF4013",
            TypeMissingRecordField => "VF4019",
            TypeExpectedVariant => "VF4020",

            TypeNonExhaustiveMatch => "VF4900",
            TypeUnreachableCase => "VF4901",
            TypeUnusedBinding => "VF4902",

            ModuleCyclicDependency => "VF5900",
            ModuleCyclicDependencyChain => "VF5901",
        }
    }

    pub fn is_warning(self) -> bool {
        matches!(
            self,
            ErrorCode::TypeNonExhaustiveMatch
                | ErrorCode::TypeUnreachableCase
                | ErrorCode::TypeUnusedBinding
        )
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}
