//! Diagnostics
//!
//! A single error record serves every stage of the front end: the error
//! kind, a severity, a source location, and a human-readable message.
//! The first error encountered aborts the enclosing pass and propagates
//! to the driver; no diagnostic collection happens in the core.

use crate::span::SourceLocation;
use crate::types::Type;
use std::fmt;
use thiserror::Error;

/// Result type for the checker and generator.
pub type CheckResult<T> = Result<T, CompileError>;

/// How bad it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The program is ill-formed.
    Error,
    /// The compiler is ill-formed.
    InternalError,
}

/// Every diagnostic the front end can produce.
///
/// Some variants are raised by collaborating passes rather than this
/// crate (dependency discovery, return analysis); they live here so the
/// whole pipeline shares one taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InternalCompilerError,

    // Lexical
    InvalidSymbol,

    // Name resolution
    NameNotDefined,
    NameAlreadyDefined,
    NameNotExported,
    AmbiguousModuleName,
    ModuleNotFound,
    ExportingUndefName,
    DuplicatedExport,

    // Types and shapes
    OperationBetweenUnequalTypes,
    InvalidType,
    InvalidTypeForExpr,
    MismatchedAssignment,
    MismatchedTypeInAssign,
    MismatchedTypeInMultiRetAssign,
    MismatchedMultiRetAssignment,
    MismatchedReturnType,
    MismatchedTypeForArgument,
    InvalidNumberOfArgs,
    InvalidNumberOfReturns,
    ExpectedBool,
    ExpectedNumber,
    ExpectedProcedure,
    ExpectedData,
    ExpectedBasicOrProcType,
    CannotUseVoid,
    CannotUseStringInExpr,
    CanOnlyDerefPointers,
    CanOnlyAssignLocal,
    CanOnlyUseNormalAssignment,
    NotAssignable,
    InvalidProp,
    ExitMustBeI8,
    PtrCantBeUsedAsDataSize,
    ValueOutOfBounds,

    // Program shape
    NotAllCodePathsReturnAValue,
    NoEntryPoint,
    InvalidMain,
    InvalidSymbolCycle,
    InvalidDependencyCycle,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::InternalCompilerError => "internal compiler error",
            ErrorKind::InvalidSymbol => "invalid symbol",
            ErrorKind::NameNotDefined => "name not defined",
            ErrorKind::NameAlreadyDefined => "name already defined",
            ErrorKind::NameNotExported => "name not exported",
            ErrorKind::AmbiguousModuleName => "ambiguous module name",
            ErrorKind::ModuleNotFound => "module not found",
            ErrorKind::ExportingUndefName => "exporting undefined name",
            ErrorKind::DuplicatedExport => "duplicated export",
            ErrorKind::OperationBetweenUnequalTypes => "operation between unequal types",
            ErrorKind::InvalidType => "invalid type",
            ErrorKind::InvalidTypeForExpr => "invalid type for expression",
            ErrorKind::MismatchedAssignment => "mismatched assignment",
            ErrorKind::MismatchedTypeInAssign => "mismatched type in assignment",
            ErrorKind::MismatchedTypeInMultiRetAssign => {
                "mismatched type in multi-return assignment"
            }
            ErrorKind::MismatchedMultiRetAssignment => "mismatched multi-return assignment",
            ErrorKind::MismatchedReturnType => "mismatched return type",
            ErrorKind::MismatchedTypeForArgument => "mismatched type for argument",
            ErrorKind::InvalidNumberOfArgs => "invalid number of arguments",
            ErrorKind::InvalidNumberOfReturns => "invalid number of returns",
            ErrorKind::ExpectedBool => "expected bool",
            ErrorKind::ExpectedNumber => "expected number",
            ErrorKind::ExpectedProcedure => "expected procedure",
            ErrorKind::ExpectedData => "expected data",
            ErrorKind::ExpectedBasicOrProcType => "expected basic or procedure type",
            ErrorKind::CannotUseVoid => "cannot use void",
            ErrorKind::CannotUseStringInExpr => "cannot use string in expression",
            ErrorKind::CanOnlyDerefPointers => "can only dereference pointers",
            ErrorKind::CanOnlyAssignLocal => "can only assign locals",
            ErrorKind::CanOnlyUseNormalAssignment => "can only use normal assignment",
            ErrorKind::NotAssignable => "not assignable",
            ErrorKind::InvalidProp => "invalid property",
            ErrorKind::ExitMustBeI8 => "exit value must be i8",
            ErrorKind::PtrCantBeUsedAsDataSize => "pointer literal cannot be used as data size",
            ErrorKind::ValueOutOfBounds => "value out of bounds",
            ErrorKind::NotAllCodePathsReturnAValue => "not all code paths return a value",
            ErrorKind::NoEntryPoint => "program has no entry point",
            ErrorKind::InvalidMain => "invalid main procedure",
            ErrorKind::InvalidSymbolCycle => "invalid symbol cycle",
            ErrorKind::InvalidDependencyCycle => "invalid dependency cycle",
        };
        write!(f, "{}", s)
    }
}

/// A single diagnostic.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{location}: {kind}: {message}")]
pub struct CompileError {
    pub kind: ErrorKind,
    pub severity: Severity,
    pub location: SourceLocation,
    pub message: String,
}

impl CompileError {
    pub fn new(kind: ErrorKind, location: SourceLocation, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: Severity::Error,
            location,
            message: message.into(),
        }
    }

    /// An assertion about the compiler itself failed.
    pub fn internal(location: SourceLocation, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::InternalCompilerError,
            severity: Severity::InternalError,
            location,
            message: message.into(),
        }
    }

    // ============ Constructors ============

    pub fn invalid_symbol(location: SourceLocation, text: &str) -> Self {
        Self::new(
            ErrorKind::InvalidSymbol,
            location,
            format!("invalid symbol: {:?}", text),
        )
    }

    pub fn name_not_defined(location: SourceLocation, name: &str) -> Self {
        Self::new(
            ErrorKind::NameNotDefined,
            location,
            format!("`{}` is not defined", name),
        )
    }

    pub fn name_already_defined(location: SourceLocation, name: &str) -> Self {
        Self::new(
            ErrorKind::NameAlreadyDefined,
            location,
            format!("`{}` is already defined", name),
        )
    }

    pub fn name_not_exported(location: SourceLocation, module: &str, name: &str) -> Self {
        Self::new(
            ErrorKind::NameNotExported,
            location,
            format!("module `{}` does not export `{}`", module, name),
        )
    }

    pub fn module_not_found(location: SourceLocation, name: &str) -> Self {
        Self::new(
            ErrorKind::ModuleNotFound,
            location,
            format!("module `{}` was not found", name),
        )
    }

    pub fn unequal_types(location: SourceLocation, left: &Type, right: &Type) -> Self {
        Self::new(
            ErrorKind::OperationBetweenUnequalTypes,
            location,
            format!("operands have types `{}` and `{}`", left, right),
        )
    }

    pub fn invalid_class(location: SourceLocation, found: &Type, wanted: &str) -> Self {
        Self::new(
            ErrorKind::InvalidTypeForExpr,
            location,
            format!("operand is `{}`, operator admits {}", found, wanted),
        )
    }

    pub fn expected_bool(location: SourceLocation, found: &Type) -> Self {
        Self::new(
            ErrorKind::ExpectedBool,
            location,
            format!("condition is `{}`, expected `bool`", found),
        )
    }

    pub fn expected_procedure(location: SourceLocation, found: &Type) -> Self {
        Self::new(
            ErrorKind::ExpectedProcedure,
            location,
            format!("callee is `{}`, expected a procedure", found),
        )
    }

    pub fn value_out_of_bounds(location: SourceLocation, text: &str) -> Self {
        Self::new(
            ErrorKind::ValueOutOfBounds,
            location,
            format!("`{}` does not fit its literal width", text),
        )
    }
}
