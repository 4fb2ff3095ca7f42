use std::fmt;

/// The main error type for strata-cfg tree access, merging and interpolation.
///
/// Error codes follow a rough grouping: 1xx flag/access errors, 2xx
/// interpolation and resolver errors, 4xx type errors, 5xx merge errors.
#[derive(Debug, Clone, PartialEq)]
pub enum StrataError {
    /// Raised when reading a scalar that still holds the `???` sentinel.
    MissingValue {
        path: String,
        hint: Option<String>,
        code: Option<u32>,
    },
    /// Raised when mutating a node whose effective read-only flag is set.
    ReadOnly {
        path: String,
        hint: Option<String>,
        code: Option<u32>,
    },
    /// Raised when creating or reading an unknown key under a struct-flagged mapping.
    StructAccess {
        path: String,
        key: String,
        hint: Option<String>,
        code: Option<u32>,
    },
    PathNotFound {
        path: String,
        hint: Option<String>,
        code: Option<u32>,
    },
    /// Raised when a value cannot be converted to a node's declared type.
    TypeMismatch {
        path: String,
        expected: String,
        got: String,
        hint: Option<String>,
        code: Option<u32>,
    },
    /// Raised for an invalid schema description (bad default, bad enum, ...).
    SchemaError {
        message: String,
        hint: Option<String>,
        code: Option<u32>,
    },
    InterpolationSyntax {
        expr: String,
        message: String,
        hint: Option<String>,
        code: Option<u32>,
    },
    UnknownResolver {
        name: String,
        expr: String,
        hint: Option<String>,
        code: Option<u32>,
    },
    /// Raised when a `${a.b.c}` node-reference points at a path that does not exist.
    ReferenceNotFound {
        target: String,
        path: String,
        hint: Option<String>,
        code: Option<u32>,
    },
    InterpolationCycle {
        path: String,
        chain: Vec<String>,
        hint: Option<String>,
        code: Option<u32>,
    },
    /// A resolver function failed; carries the resolver name and the
    /// tree path of the expression that invoked it.
    ResolverError {
        resolver: String,
        path: String,
        message: String,
        hint: Option<String>,
        code: Option<u32>,
    },
    DuplicateResolver {
        name: String,
        hint: Option<String>,
        code: Option<u32>,
    },
    /// Raised when a merge would cross incompatible declared types or shapes.
    MergeConflict {
        path: String,
        base: String,
        incoming: String,
        hint: Option<String>,
        code: Option<u32>,
    },
}

fn suffix(hint: &Option<String>, code: &Option<u32>) -> String {
    format!(
        "{}{}",
        hint.as_ref()
            .map_or(String::new(), |h| format!(" Hint: {}", h)),
        code.map_or(String::new(), |c| format!(" Code: {}", c))
    )
}

impl fmt::Display for StrataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrataError::MissingValue { path, hint, code } => write!(
                f,
                "[STRATA] Missing mandatory value at '{}'{}",
                path,
                suffix(hint, code)
            ),
            StrataError::ReadOnly { path, hint, code } => write!(
                f,
                "[STRATA] Cannot modify read-only config at '{}'{}",
                path,
                suffix(hint, code)
            ),
            StrataError::StructAccess { path, key, hint, code } => write!(
                f,
                "[STRATA] Unknown key '{}' in struct mapping at '{}'{}",
                key,
                path,
                suffix(hint, code)
            ),
            StrataError::PathNotFound { path, hint, code } => write!(
                f,
                "[STRATA] Path '{}' not found in configuration{}",
                path,
                suffix(hint, code)
            ),
            StrataError::TypeMismatch { path, expected, got, hint, code } => write!(
                f,
                "[STRATA] Type error at '{}': expected {}, got {}{}",
                path,
                expected,
                got,
                suffix(hint, code)
            ),
            StrataError::SchemaError { message, hint, code } => write!(
                f,
                "[STRATA] Schema error: {}{}",
                message,
                suffix(hint, code)
            ),
            StrataError::InterpolationSyntax { expr, message, hint, code } => write!(
                f,
                "[STRATA] Invalid interpolation '{}': {}{}",
                expr,
                message,
                suffix(hint, code)
            ),
            StrataError::UnknownResolver { name, expr, hint, code } => write!(
                f,
                "[STRATA] Unknown resolver '{}' in '{}'{}",
                name,
                expr,
                suffix(hint, code)
            ),
            StrataError::ReferenceNotFound { target, path, hint, code } => write!(
                f,
                "[STRATA] Interpolation at '{}' references unknown path '{}'{}",
                path,
                target,
                suffix(hint, code)
            ),
            StrataError::InterpolationCycle { path, chain, hint, code } => write!(
                f,
                "[STRATA] Interpolation cycle detected at '{}': {}{}",
                path,
                chain.join(" -> "),
                suffix(hint, code)
            ),
            StrataError::ResolverError { resolver, path, message, hint, code } => write!(
                f,
                "[STRATA] Resolver '{}' failed at '{}': {}{}",
                resolver,
                path,
                message,
                suffix(hint, code)
            ),
            StrataError::DuplicateResolver { name, hint, code } => write!(
                f,
                "[STRATA] Resolver '{}' is already registered with a different function{}",
                name,
                suffix(hint, code)
            ),
            StrataError::MergeConflict { path, base, incoming, hint, code } => write!(
                f,
                "[STRATA] Cannot merge at '{}': {} is not compatible with {}{}",
                path,
                incoming,
                base,
                suffix(hint, code)
            ),
        }
    }
}

impl std::error::Error for StrataError {}

impl StrataError {
    /// Helper for missing-value errors with the standard hint.
    pub(crate) fn missing(path: &str) -> Self {
        StrataError::MissingValue {
            path: path.to_string(),
            hint: Some("Supply a value before reading, or merge one in".into()),
            code: Some(103),
        }
    }

    /// Helper for type errors raised during assignment and merging.
    pub(crate) fn type_mismatch(path: &str, expected: &str, got: &str) -> Self {
        StrataError::TypeMismatch {
            path: path.to_string(),
            expected: expected.to_string(),
            got: got.to_string(),
            hint: None,
            code: Some(401),
        }
    }
}
