//! Diagnostic reporting infrastructure.
//!
//! This module provides structured reporting for the middle end. Every
//! report carries a source span and, for MIR-stage reports, a locator
//! naming the function, block, and instruction the report points at, so a
//! driver can aggregate records from many functions and still attribute
//! each one precisely.
//!
//! # Error Codes
//!
//! Middle-end error codes continue the front end's numbering:
//!
//! - **E0500-E0599**: Desugaring defects (bad receiver regime, missing builtins)
//! - **E0600-E0699**: MIR construction (resource limits, residual sugar)
//! - **E0700-E0799**: Optimization pipeline (iteration limits)
//! - **E0800-E0899**: Verifier rejections (structure and ownership)
//!
//! Defect-class codes mark invariant violations that indicate a bug in an
//! earlier stage or in this crate, never a user error. Limit-class codes
//! mark recoverable "program too large" conditions.

use crate::span::Span;
use ariadne::{Color, Label, Report, ReportKind, Source};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Middle-end error codes.
///
/// Error codes follow this organization:
/// - E0500-E0599: Desugaring defects
/// - E0600-E0699: MIR construction
/// - E0700-E0799: Optimization pipeline
/// - E0800-E0899: Verifier rejections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u16)]
pub enum ErrorCode {
    // ============================================================
    // Desugaring defects (E0500-E0599)
    // ============================================================
    /// Method receiver has a regime outside value/gc/manual.
    UnsupportedReceiverRegime = 500,
    /// Interpolated type has no `to_str` builtin registered.
    MissingInterpolationBuiltin = 501,
    /// The type table lacks an entry desugaring must synthesize (bool for
    /// `for`-loop conditions).
    MissingPrimitiveType = 502,
    /// A call site names a function the signature table does not know.
    UnknownFunction = 503,

    // ============================================================
    // MIR construction (E0600-E0699)
    // ============================================================
    /// Function exceeded the basic block limit.
    BlockLimit = 600,
    /// Function exceeded the local slot limit.
    LocalLimit = 601,
    /// An error placeholder from the front end reached the middle end.
    ErrorNode = 602,
    /// A sugar construct survived desugaring.
    ResidualSugar = 603,

    // ============================================================
    // Optimization pipeline (E0700-E0799)
    // ============================================================
    /// A pass failed to reach a fixed point within the iteration limit.
    PassIterationLimit = 700,

    // ============================================================
    // Verifier rejections (E0800-E0899)
    // ============================================================
    /// A block is missing its terminator.
    MissingTerminator = 800,
    /// A terminator names a block outside the function.
    InvalidBlockTarget = 801,
    /// A place or operand references an undeclared local.
    UndeclaredLocal = 802,
    /// A place projection does not fit the projected type.
    InvalidProjection = 803,
    /// A borrow was stored, aggregated, or returned.
    BorrowEscape = 804,
    /// A borrow local was referenced outside its synthesis window.
    BorrowOutsideWindow = 805,
    /// A release operation was given a non-manual operand.
    ReleaseRegimeMismatch = 806,
    /// The entry block has predecessors.
    EntryHasPredecessors = 807,
    /// A moved-from local was read again (strict mode only).
    MoveReuse = 808,
}

impl ErrorCode {
    /// Get the formatted error code string (e.g., "E0604").
    pub fn as_str(&self) -> String {
        format!("E{:04}", *self as u16)
    }

    /// Get a human-readable description of the error.
    pub fn description(&self) -> &'static str {
        match self {
            // Desugaring defects
            ErrorCode::UnsupportedReceiverRegime => "method receiver has unsupported ownership regime",
            ErrorCode::MissingInterpolationBuiltin => "no string conversion builtin for interpolated type",
            ErrorCode::MissingPrimitiveType => "type table is missing a primitive type",
            ErrorCode::UnknownFunction => "call to a function missing from the signature table",
            // MIR construction
            ErrorCode::BlockLimit => "function is too large to compile",
            ErrorCode::LocalLimit => "function uses too many locals",
            ErrorCode::ErrorNode => "error placeholder reached the middle end",
            ErrorCode::ResidualSugar => "sugar construct survived desugaring",
            // Optimization pipeline
            ErrorCode::PassIterationLimit => "optimization failed to stabilize",
            // Verifier rejections
            ErrorCode::MissingTerminator => "basic block has no terminator",
            ErrorCode::InvalidBlockTarget => "terminator targets a nonexistent block",
            ErrorCode::UndeclaredLocal => "reference to undeclared local",
            ErrorCode::InvalidProjection => "projection does not match the projected type",
            ErrorCode::BorrowEscape => "borrow escapes into a durable location",
            ErrorCode::BorrowOutsideWindow => "borrow referenced outside its synthesis window",
            ErrorCode::ReleaseRegimeMismatch => "release of a non-manual handle",
            ErrorCode::EntryHasPredecessors => "entry block has predecessors",
            ErrorCode::MoveReuse => "use of moved value",
        }
    }

    /// Get a help message suggesting how to proceed.
    pub fn help(&self) -> Option<&'static str> {
        match self {
            ErrorCode::BlockLimit | ErrorCode::LocalLimit => {
                Some("split the function into smaller functions")
            }
            ErrorCode::PassIterationLimit => {
                Some("raise the pass iteration limit or split the function")
            }
            ErrorCode::ReleaseRegimeMismatch => {
                Some("only manually managed handles can be released")
            }
            _ => None,
        }
    }

    /// Whether this code marks an internal invariant violation rather than
    /// a resource limit.
    pub fn is_defect(&self) -> bool {
        !matches!(
            self,
            ErrorCode::BlockLimit | ErrorCode::LocalLimit | ErrorCode::PassIterationLimit
        )
    }
}

/// The pipeline stage a diagnostic originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    /// Desugaring and borrow lowering.
    Desugar,
    /// CFG construction.
    Lowering,
    /// The optimization pipeline.
    Optimize,
    /// The MIR verifier.
    Verify,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Desugar => "desugar",
            Stage::Lowering => "lowering",
            Stage::Optimize => "optimize",
            Stage::Verify => "verify",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Locator attaching a diagnostic to a position inside a MIR function.
///
/// Indices are the raw values of the corresponding `FnId` / `BasicBlockId`;
/// `instruction` is a statement index within the block, or the statement
/// count for the terminator position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirLocator {
    /// The stage that produced the report.
    pub stage: Stage,
    /// Raw index of the function.
    pub function: u32,
    /// Raw index of the offending block, if block-level.
    pub block: Option<u32>,
    /// Statement index within the block, if instruction-level.
    pub instruction: Option<usize>,
}

impl MirLocator {
    pub fn function(stage: Stage, function: u32) -> Self {
        Self {
            stage,
            function,
            block: None,
            instruction: None,
        }
    }

    pub fn block(stage: Stage, function: u32, block: u32) -> Self {
        Self {
            stage,
            function,
            block: Some(block),
            instruction: None,
        }
    }

    pub fn instruction(stage: Stage, function: u32, block: u32, instruction: usize) -> Self {
        Self {
            stage,
            function,
            block: Some(block),
            instruction: Some(instruction),
        }
    }
}

impl std::fmt::Display for MirLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: fn{}", self.stage, self.function)?;
        if let Some(block) = self.block {
            write!(f, ", bb{}", block)?;
        }
        if let Some(instruction) = self.instruction {
            write!(f, ", instruction {}", instruction)?;
        }
        Ok(())
    }
}

/// The kind of diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// An error that prevents compilation.
    Error,
    /// A warning that doesn't prevent compilation.
    Warning,
    /// An informational note.
    Note,
    /// A hint for fixing the issue.
    Help,
}

impl DiagnosticKind {
    fn to_report_kind(self) -> ReportKind<'static> {
        match self {
            DiagnosticKind::Error => ReportKind::Error,
            DiagnosticKind::Warning => ReportKind::Warning,
            DiagnosticKind::Note => ReportKind::Advice,
            DiagnosticKind::Help => ReportKind::Advice,
        }
    }

    fn color(self) -> Color {
        match self {
            DiagnosticKind::Error => Color::Red,
            DiagnosticKind::Warning => Color::Yellow,
            DiagnosticKind::Note => Color::Cyan,
            DiagnosticKind::Help => Color::Green,
        }
    }
}

/// A compiler diagnostic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    /// The kind of diagnostic.
    pub kind: DiagnosticKind,
    /// The error code (e.g., "E0804").
    pub code: Option<String>,
    /// The main error message.
    pub message: String,
    /// The primary span where the error occurred.
    pub span: Span,
    /// Additional labels pointing to relevant code.
    pub labels: Vec<DiagnosticLabel>,
    /// Suggestions for fixing the error.
    pub suggestions: Vec<String>,
    /// MIR position the report points at, if any.
    pub locator: Option<MirLocator>,
}

impl Diagnostic {
    /// Create a new error diagnostic.
    pub fn error(message: impl Into<String>, span: Span) -> Self {
        Self {
            kind: DiagnosticKind::Error,
            code: None,
            message: message.into(),
            span,
            labels: Vec::new(),
            suggestions: Vec::new(),
            locator: None,
        }
    }

    /// Create a new warning diagnostic.
    pub fn warning(message: impl Into<String>, span: Span) -> Self {
        Self {
            kind: DiagnosticKind::Warning,
            code: None,
            message: message.into(),
            span,
            labels: Vec::new(),
            suggestions: Vec::new(),
            locator: None,
        }
    }

    /// Set the error code from a string.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Set the error code from an ErrorCode enum.
    /// Automatically adds the help message if available.
    pub fn with_error_code(mut self, code: ErrorCode) -> Self {
        self.code = Some(code.as_str());
        if let Some(help) = code.help() {
            self.suggestions.push(help.to_string());
        }
        self
    }

    /// Create an error diagnostic from an ErrorCode with automatic message and help.
    pub fn from_error_code(code: ErrorCode, span: Span) -> Self {
        let mut diag = Self::error(code.description(), span);
        diag.code = Some(code.as_str());
        if let Some(help) = code.help() {
            diag.suggestions.push(help.to_string());
        }
        diag
    }

    /// Attach a MIR locator.
    pub fn with_locator(mut self, locator: MirLocator) -> Self {
        self.locator = Some(locator);
        self
    }

    /// Add a note to help explain the error.
    pub fn with_note(mut self, span: Span, message: impl Into<String>) -> Self {
        self.labels.push(DiagnosticLabel::secondary(span, message));
        self
    }

    /// Add a primary label with a custom message.
    pub fn with_primary_label(mut self, span: Span, message: impl Into<String>) -> Self {
        self.labels.push(DiagnosticLabel::primary(span, message));
        self
    }

    /// Add a label.
    pub fn with_label(mut self, label: DiagnosticLabel) -> Self {
        self.labels.push(label);
        self
    }

    /// Add a suggestion.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Whether this diagnostic is an error.
    pub fn is_error(&self) -> bool {
        self.kind == DiagnosticKind::Error
    }
}

/// A secondary label in a diagnostic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticLabel {
    /// The span this label points to.
    pub span: Span,
    /// The label message.
    pub message: String,
    /// Whether this is the primary label.
    pub primary: bool,
}

impl DiagnosticLabel {
    pub fn primary(span: Span, message: impl Into<String>) -> Self {
        Self {
            span,
            message: message.into(),
            primary: true,
        }
    }

    pub fn secondary(span: Span, message: impl Into<String>) -> Self {
        Self {
            span,
            message: message.into(),
            primary: false,
        }
    }
}

/// Diagnostic emitter that prints diagnostics to stderr.
pub struct DiagnosticEmitter<'a> {
    filename: &'a str,
    source: &'a str,
}

impl<'a> DiagnosticEmitter<'a> {
    pub fn new(filename: &'a str, source: &'a str) -> Self {
        Self { filename, source }
    }

    /// Emit a diagnostic to stderr.
    pub fn emit(&self, diagnostic: &Diagnostic) {
        let mut builder = Report::build(
            diagnostic.kind.to_report_kind(),
            self.filename,
            diagnostic.span.start,
        );

        // Add main message, prefixed with the code and locator when present
        let mut message = if let Some(code) = &diagnostic.code {
            format!("[{}] {}", code, diagnostic.message)
        } else {
            diagnostic.message.clone()
        };
        if let Some(locator) = &diagnostic.locator {
            message.push_str(&format!(" ({})", locator));
        }
        builder = builder.with_message(&message);

        // Add primary label
        builder = builder.with_label(
            Label::new((self.filename, diagnostic.span.start..diagnostic.span.end))
                .with_color(diagnostic.kind.color())
                .with_message(&diagnostic.message),
        );

        // Add secondary labels
        for label in &diagnostic.labels {
            let color = if label.primary {
                diagnostic.kind.color()
            } else {
                Color::Blue
            };
            builder = builder.with_label(
                Label::new((self.filename, label.span.start..label.span.end))
                    .with_color(color)
                    .with_message(&label.message),
            );
        }

        // Add suggestions
        if !diagnostic.suggestions.is_empty() {
            let help = diagnostic.suggestions.join("\n");
            builder = builder.with_help(help);
        }

        let report = builder.finish();

        // Write to stderr
        report
            .eprint((self.filename, Source::from(self.source)))
            .expect("Failed to write diagnostic");
    }
}

/// Resource limit violations raised while building or optimizing a body.
#[derive(Debug, Clone, Error)]
pub enum LimitError {
    #[error("function exceeds the basic block limit of {limit}")]
    BlockLimit { limit: usize, span: Span },

    #[error("function exceeds the local slot limit of {limit}")]
    LocalLimit { limit: usize, span: Span },

    #[error("pass `{pass}` did not stabilize within {limit} iterations")]
    IterationLimit {
        pass: &'static str,
        limit: usize,
        span: Span,
    },
}

impl LimitError {
    pub fn span(&self) -> Span {
        match self {
            LimitError::BlockLimit { span, .. } => *span,
            LimitError::LocalLimit { span, .. } => *span,
            LimitError::IterationLimit { span, .. } => *span,
        }
    }

    fn code(&self) -> ErrorCode {
        match self {
            LimitError::BlockLimit { .. } => ErrorCode::BlockLimit,
            LimitError::LocalLimit { .. } => ErrorCode::LocalLimit,
            LimitError::IterationLimit { .. } => ErrorCode::PassIterationLimit,
        }
    }
}

impl From<LimitError> for Diagnostic {
    fn from(error: LimitError) -> Self {
        let span = error.span();
        let code = error.code();
        Diagnostic::error(error.to_string(), span).with_error_code(code)
    }
}
