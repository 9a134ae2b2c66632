// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Error types, diagnostics, and the run-scoped error sink.

use std::fmt;

/// Categories of assembler errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsmErrorKind {
    Parse,
    DuplicateLabel,
    DuplicateMacro,
    CircularDefinition,
    UndefinedSymbol,
    TypeMismatch,
    MacroRecursion,
    OperandRange,
    UnresolvedSymbol,
    NonConvergence,
    UnknownOpcode,
    IoWrite,
    Cli,
}

impl AsmErrorKind {
    pub fn label(&self) -> &'static str {
        match self {
            AsmErrorKind::Parse => "parse error",
            AsmErrorKind::DuplicateLabel => "duplicate label",
            AsmErrorKind::DuplicateMacro => "duplicate macro",
            AsmErrorKind::CircularDefinition => "circular definition",
            AsmErrorKind::UndefinedSymbol => "undefined symbol",
            AsmErrorKind::TypeMismatch => "type mismatch",
            AsmErrorKind::MacroRecursion => "macro recursion",
            AsmErrorKind::OperandRange => "operand out of range",
            AsmErrorKind::UnresolvedSymbol => "unresolved symbol",
            AsmErrorKind::NonConvergence => "no convergence",
            AsmErrorKind::UnknownOpcode => "unknown opcode",
            AsmErrorKind::IoWrite => "write error",
            AsmErrorKind::Cli => "usage error",
        }
    }
}

/// An assembler error with a kind and message.
#[derive(Debug, Clone)]
pub struct AsmError {
    kind: AsmErrorKind,
    message: String,
}

impl AsmError {
    pub fn new(kind: AsmErrorKind, msg: &str, param: Option<&str>) -> Self {
        let message = match param {
            Some(p) => format!("{msg}: {p}"),
            None => msg.to_string(),
        };
        Self { kind, message }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> AsmErrorKind {
        self.kind
    }
}

impl fmt::Display for AsmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.kind.label())
    }
}

impl std::error::Error for AsmError {}

/// A diagnostic message with source location.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    line: u32,
    error: AsmError,
}

impl Diagnostic {
    pub fn new(line: u32, error: AsmError) -> Self {
        Self { line, error }
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn error(&self) -> &AsmError {
        &self.error
    }

    pub fn format(&self, file: Option<&str>) -> String {
        match file {
            Some(file) => format!("{file}:{}: ERROR - {}", self.line, self.error),
            None => format!("{}: ERROR - {}", self.line, self.error),
        }
    }
}

/// Run-scoped collector for diagnostics.
///
/// Passes record problems here and keep going where safe, so one run can
/// surface several independent errors. The pipeline consults the sink
/// before code generation; any recorded diagnostic suppresses output.
#[derive(Debug, Default)]
pub struct ErrorSink {
    diagnostics: Vec<Diagnostic>,
}

impl ErrorSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, line: u32, kind: AsmErrorKind, msg: &str, param: Option<&str>) {
        self.diagnostics
            .push(Diagnostic::new(line, AsmError::new(kind, msg, param)));
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.diagnostics.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

/// Error from a failed assembly run, carrying everything collected.
#[derive(Debug)]
pub struct AsmRunError {
    error: AsmError,
    diagnostics: Vec<Diagnostic>,
}

impl AsmRunError {
    pub fn new(error: AsmError, diagnostics: Vec<Diagnostic>) -> Self {
        Self { error, diagnostics }
    }

    pub fn from_sink(error: AsmError, sink: ErrorSink) -> Self {
        Self {
            error,
            diagnostics: sink.into_diagnostics(),
        }
    }

    pub fn error(&self) -> &AsmError {
        &self.error
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }
}

impl fmt::Display for AsmRunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl std::error::Error for AsmRunError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_format_includes_line_and_kind() {
        let err = AsmError::new(AsmErrorKind::UndefinedSymbol, "Undefined symbol", Some("foo"));
        let diag = Diagnostic::new(12, err);
        assert_eq!(
            diag.format(None),
            "12: ERROR - Undefined symbol: foo (undefined symbol)"
        );
        assert_eq!(
            diag.format(Some("prog.oph")),
            "prog.oph:12: ERROR - Undefined symbol: foo (undefined symbol)"
        );
    }

    #[test]
    fn sink_accumulates_and_counts() {
        let mut sink = ErrorSink::new();
        assert!(sink.is_empty());
        sink.record(1, AsmErrorKind::Parse, "bad line", None);
        sink.record(2, AsmErrorKind::OperandRange, "too big", None);
        assert_eq!(sink.count(), 2);
        assert_eq!(sink.diagnostics()[0].line(), 1);
        assert_eq!(
            sink.diagnostics()[1].error().kind(),
            AsmErrorKind::OperandRange
        );
    }
}
