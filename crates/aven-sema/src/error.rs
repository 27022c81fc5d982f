//! Semantic error values with provenance tracking.
//!
//! Every inference error carries a [`ConstraintLoc`]: the source span the
//! offending constraint was generated at, plus the path of the constraint
//! within its root node (`binding.rvalue`, `call.callee`, ...). The path
//! is used only to attribute diagnostics; solving never looks at it.

use std::fmt;

use aven_common::{Issue, Severity, Span};

use crate::ty::{QualTy, Ty, TyVar};

/// Where a constraint came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstraintLoc {
    pub span: Span,
    /// Dotted path from the root node, e.g. `binding.rvalue`.
    pub path: &'static str,
}

impl ConstraintLoc {
    pub fn new(span: Span, path: &'static str) -> Self {
        Self { span, path }
    }
}

/// An error (or warning) produced by the semantic passes.
#[derive(Debug, Clone)]
pub enum SemaError {
    // ── Structural (parse finalizer) ───────────────────────────────────
    /// A name is already taken in this context or its immediate parent.
    InvalidRedeclaration {
        name: String,
        span: Span,
        prior: Span,
    },
    /// A declaration with an empty name.
    InvalidName { span: Span },
    /// `static` / `mutating` outside a nominal type or extension.
    UnexpectedModifier { modifier: String, span: Span },
    /// An attribute the current declaration kind does not accept.
    UnexpectedAttribute { name: String, span: Span },
    /// An attribute nobody recognises (warning).
    UnknownAttribute { name: String, span: Span },
    /// A function parameter without a type signature.
    MissingParamSign { name: String, span: Span },
    /// An `extension` below module top level.
    NestedExtension { span: Span },

    // ── Name resolution ────────────────────────────────────────────────
    /// An identifier no scope defines.
    UndefinedSymbol { name: String, span: Span },
    /// A signature names something that is not a type.
    NotAType { name: String, span: Span },
    /// `Owner::Member` where the owner has no such nested type.
    UnknownNestedType {
        owner: String,
        member: String,
        span: Span,
    },
    /// A generic type applied to the wrong number of arguments.
    GenericArityMismatch {
        name: String,
        expected: usize,
        found: usize,
        span: Span,
    },

    // ── Type inference ─────────────────────────────────────────────────
    /// Two types that must unify cannot.
    NoUnifier {
        lhs: QualTy,
        rhs: QualTy,
        loc: ConstraintLoc,
    },
    /// Occurs-check failure.
    InfiniteType {
        var: TyVar,
        ty: Ty,
        loc: ConstraintLoc,
    },
    /// A binding operator's qualifier requirement cannot hold, e.g. a
    /// move of a `@cst` value.
    QualifierMismatch {
        op: &'static str,
        required: &'static str,
        found: QualTy,
        loc: ConstraintLoc,
    },
    /// The owner type has no member with the given name.
    NoMember {
        ty: QualTy,
        member: String,
        loc: ConstraintLoc,
    },
    /// A constructed type has no compatible constructor.
    NoConstructor { ty: QualTy, loc: ConstraintLoc },
    /// A disjunction where every alternative fails.
    EmptyDisjunction { loc: ConstraintLoc },
    /// A member constraint whose owner never resolved.
    UnresolvedMember { member: String, loc: ConstraintLoc },
    /// A type slot that still contains a free variable after solving.
    AmbiguousType { loc: ConstraintLoc },
}

impl SemaError {
    pub fn severity(&self) -> Severity {
        match self {
            SemaError::UnknownAttribute { .. } => Severity::Warning,
            _ => Severity::Error,
        }
    }

    /// Stable diagnostic code.
    pub fn code(&self) -> &'static str {
        match self {
            SemaError::InvalidRedeclaration { .. } => "E0201",
            SemaError::InvalidName { .. } => "E0202",
            SemaError::UnexpectedModifier { .. } => "E0203",
            SemaError::UnexpectedAttribute { .. } => "E0204",
            SemaError::UnknownAttribute { .. } => "W0201",
            SemaError::MissingParamSign { .. } => "E0205",
            SemaError::NestedExtension { .. } => "E0206",
            SemaError::UndefinedSymbol { .. } => "E0301",
            SemaError::NotAType { .. } => "E0302",
            SemaError::UnknownNestedType { .. } => "E0303",
            SemaError::GenericArityMismatch { .. } => "E0304",
            SemaError::NoUnifier { .. } => "E0401",
            SemaError::InfiniteType { .. } => "E0402",
            SemaError::QualifierMismatch { .. } => "E0403",
            SemaError::NoMember { .. } => "E0404",
            SemaError::NoConstructor { .. } => "E0405",
            SemaError::EmptyDisjunction { .. } => "E0406",
            SemaError::UnresolvedMember { .. } => "E0407",
            SemaError::AmbiguousType { .. } => "E0408",
        }
    }

    /// Primary source span of the error.
    pub fn span(&self) -> Span {
        match self {
            SemaError::InvalidRedeclaration { span, .. }
            | SemaError::InvalidName { span }
            | SemaError::UnexpectedModifier { span, .. }
            | SemaError::UnexpectedAttribute { span, .. }
            | SemaError::UnknownAttribute { span, .. }
            | SemaError::MissingParamSign { span, .. }
            | SemaError::NestedExtension { span }
            | SemaError::UndefinedSymbol { span, .. }
            | SemaError::NotAType { span, .. }
            | SemaError::UnknownNestedType { span, .. }
            | SemaError::GenericArityMismatch { span, .. } => *span,
            SemaError::NoUnifier { loc, .. }
            | SemaError::InfiniteType { loc, .. }
            | SemaError::QualifierMismatch { loc, .. }
            | SemaError::NoMember { loc, .. }
            | SemaError::NoConstructor { loc, .. }
            | SemaError::EmptyDisjunction { loc }
            | SemaError::UnresolvedMember { loc, .. }
            | SemaError::AmbiguousType { loc } => loc.span,
        }
    }

    /// Convert to the module-level issue representation.
    pub fn into_issue(self) -> Issue {
        let severity = self.severity();
        let code = self.code();
        let span = self.span();
        let message = self.to_string();
        match severity {
            Severity::Error => Issue::error(code, message, span),
            Severity::Warning => Issue::warning(code, message, span),
        }
    }
}

impl fmt::Display for SemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SemaError::InvalidRedeclaration { name, .. } => {
                write!(f, "invalid redeclaration of `{name}`")
            }
            SemaError::InvalidName { .. } => {
                write!(f, "invalid name for declaration")
            }
            SemaError::UnexpectedModifier { modifier, .. } => {
                write!(
                    f,
                    "`{modifier}` may only appear on members of a type or extension"
                )
            }
            SemaError::UnexpectedAttribute { name, .. } => {
                write!(f, "attribute `@{name}` is not allowed here")
            }
            SemaError::UnknownAttribute { name, .. } => {
                write!(f, "unknown attribute `@{name}` is ignored")
            }
            SemaError::MissingParamSign { name, .. } => {
                write!(f, "parameter `{name}` has no type signature")
            }
            SemaError::NestedExtension { .. } => {
                write!(f, "extensions must appear at the top level of a module")
            }
            SemaError::UndefinedSymbol { name, .. } => {
                write!(f, "undefined symbol `{name}`")
            }
            SemaError::NotAType { name, .. } => {
                write!(f, "`{name}` does not name a type")
            }
            SemaError::UnknownNestedType { owner, member, .. } => {
                write!(f, "type `{owner}` has no nested type `{member}`")
            }
            SemaError::GenericArityMismatch {
                name,
                expected,
                found,
                ..
            } => {
                write!(
                    f,
                    "type `{name}` expects {expected} generic arguments, found {found}"
                )
            }
            SemaError::NoUnifier { lhs, rhs, loc } => {
                write!(
                    f,
                    "no unifier between `{lhs}` and `{rhs}` (at {})",
                    loc.path
                )
            }
            SemaError::InfiniteType { var, ty, .. } => {
                write!(f, "infinite type: `?{}` occurs in `{ty}`", var.0)
            }
            SemaError::QualifierMismatch {
                op,
                required,
                found,
                ..
            } => {
                write!(
                    f,
                    "`{op}` requires a `{required}` operand, found `{found}`"
                )
            }
            SemaError::NoMember { ty, member, .. } => {
                write!(f, "type `{ty}` has no member `{member}`")
            }
            SemaError::NoConstructor { ty, .. } => {
                write!(f, "type `{ty}` has no compatible constructor")
            }
            SemaError::EmptyDisjunction { loc } => {
                write!(f, "no candidate matches (at {})", loc.path)
            }
            SemaError::UnresolvedMember { member, .. } => {
                write!(f, "cannot resolve member `{member}` of an unresolved type")
            }
            SemaError::AmbiguousType { .. } => {
                write!(f, "cannot infer a unique type for this expression")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redeclaration_message_and_code() {
        let err = SemaError::InvalidRedeclaration {
            name: "x".to_string(),
            span: Span::new(10, 11),
            prior: Span::new(0, 1),
        };
        assert_eq!(err.to_string(), "invalid redeclaration of `x`");
        assert_eq!(err.code(), "E0201");
        assert_eq!(err.severity(), Severity::Error);
        assert_eq!(err.span(), Span::new(10, 11));
    }

    #[test]
    fn unknown_attribute_is_a_warning() {
        let err = SemaError::UnknownAttribute {
            name: "inline".to_string(),
            span: Span::new(0, 7),
        };
        assert_eq!(err.severity(), Severity::Warning);
        let issue = err.into_issue();
        assert_eq!(issue.severity, Severity::Warning);
        assert_eq!(issue.code, "W0201");
    }

    #[test]
    fn qualifier_mismatch_message() {
        let err = SemaError::QualifierMismatch {
            op: "<-",
            required: "@mut",
            found: QualTy::cst(Ty::int()),
            loc: ConstraintLoc::new(Span::new(4, 6), "binding.lvalue"),
        };
        assert_eq!(
            err.to_string(),
            "`<-` requires a `@mut` operand, found `@cst Int`"
        );
    }
}
