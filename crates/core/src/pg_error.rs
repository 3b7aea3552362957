//! Translation of PostgreSQL error diagnostics into client-safe payloads.
//!
//! Database errors may contain confidential information (constraint bodies,
//! row contents in `detail`, internal queries), so by default only the vendor
//! error code is exposed. A small set of codes gets a friendlier treatment:
//! unique violations become `conflict` and foreign-key violations become
//! `invalid-reference`, each with the offending column recovered from the
//! constraint name so clients can highlight the right form field.
//!
//! The translation is deterministic and total: every input produces exactly
//! one output shape, never an error.

use crate::error::ErrorCode;

/// PostgreSQL `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";
/// PostgreSQL `foreign_key_violation`.
const FOREIGN_KEY_VIOLATION: &str = "23503";
/// PostgreSQL `insufficient_privilege` (raised by row-level security).
const INSUFFICIENT_PRIVILEGE: &str = "42501";

/// Constraint-name suffixes we know how to strip to recover a column name.
const CONSTRAINT_SUFFIXES: [&str; 2] = ["_key", "_fkey"];

/// Diagnostics plucked from a PostgreSQL error.
///
/// Every field is optional; the translator copes with whatever subset the
/// driver managed to extract.
#[derive(Debug, Default, Clone)]
pub struct PgDiagnostics {
    pub code: Option<String>,
    pub message: Option<String>,
    pub detail: Option<String>,
    pub hint: Option<String>,
    pub schema: Option<String>,
    pub table: Option<String>,
    pub column: Option<String>,
    pub constraint: Option<String>,
}

/// Client-facing translation of a database error.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslatedError {
    pub message: String,
    /// Stable application code, or the raw vendor code when unmatched.
    pub code: Option<String>,
    /// Column names (camel-cased) recovered from the violated constraint.
    pub fields: Option<Vec<String>>,
    /// Diagnostic key/value pairs safe to expose in this environment.
    /// Empty unless `expose_internals` was set.
    pub exposed: Vec<(&'static str, String)>,
}

/// Translate PostgreSQL diagnostics into a client-safe payload.
///
/// `expose_internals` should only be set in development/test; it widens the
/// output with detail, hint, schema, table, column, and constraint.
pub fn translate(diag: &PgDiagnostics, expose_internals: bool) -> TranslatedError {
    let exposed = if expose_internals {
        pluck(diag)
    } else {
        Vec::new()
    };

    match diag.code.as_deref() {
        Some(UNIQUE_VIOLATION) => TranslatedError {
            message: "Conflict occurred".into(),
            code: Some(ErrorCode::Conflict.as_str().into()),
            fields: fields_from_constraint(diag.table.as_deref(), diag.constraint.as_deref()),
            exposed,
        },
        Some(FOREIGN_KEY_VIOLATION) => TranslatedError {
            message: "Invalid reference".into(),
            code: Some(ErrorCode::InvalidReference.as_str().into()),
            fields: fields_from_constraint(diag.table.as_deref(), diag.constraint.as_deref()),
            exposed,
        },
        Some(INSUFFICIENT_PRIVILEGE) => TranslatedError {
            message: "Permission denied (by RLS)".into(),
            code: diag.code.clone(),
            fields: None,
            exposed,
        },
        _ => TranslatedError {
            message: if expose_internals {
                diag.message
                    .clone()
                    .unwrap_or_else(|| "An unknown error occurred".into())
            } else {
                "An unknown error occurred".into()
            },
            code: diag.code.clone(),
            fields: None,
            exposed,
        },
    }
}

/// Recover the violated column from a `{table}_{column}_key` / `_fkey`
/// constraint name, camel-cased for the client's field-naming convention.
///
/// Constraint names that do not match the convention yield `None`; field
/// attribution is a cosmetic hint, not worth failing the request over.
fn fields_from_constraint(table: Option<&str>, constraint: Option<&str>) -> Option<Vec<String>> {
    let table = table?;
    let constraint = constraint?;

    let rest = constraint.strip_prefix(table)?.strip_prefix('_')?;
    let column = CONSTRAINT_SUFFIXES
        .iter()
        .find_map(|suffix| rest.strip_suffix(suffix))?;
    if column.is_empty() {
        return None;
    }
    Some(vec![camel_case(column)])
}

/// `snake_case` (or otherwise word-separated) to `camelCase`.
fn camel_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut boundary = false;
    for ch in input.chars() {
        if !ch.is_ascii_alphanumeric() {
            boundary = !out.is_empty();
        } else if boundary {
            out.extend(ch.to_uppercase());
            boundary = false;
        } else {
            out.extend(ch.to_lowercase());
        }
    }
    out
}

/// Diagnostic properties exposed alongside the message in development/test.
fn pluck(diag: &PgDiagnostics) -> Vec<(&'static str, String)> {
    let candidates = [
        ("detail", &diag.detail),
        ("hint", &diag.hint),
        ("schema", &diag.schema),
        ("table", &diag.table),
        ("column", &diag.column),
        ("constraint", &diag.constraint),
    ];
    candidates
        .into_iter()
        .filter_map(|(key, value)| value.as_ref().map(|v| (key, v.clone())))
        .collect()
}
