//! Error types for the harness.

use thiserror::Error;

use crate::schema::Violation;

/// Result type alias using the harness error.
pub type Result<T> = std::result::Result<T, HarnessError>;

/// Everything that can stop a scenario.
///
/// Variants split into two families: *harness* failures (bad template,
/// unreachable service, bad config) and *assertion* failures (the service
/// answered, but not the way the scenario expected).
#[derive(Error, Debug)]
pub enum HarnessError {
    /// A schema could not be built (invalid `patternProperties` regex, bad descriptor).
    #[error("schema error: {0}")]
    Schema(String),

    /// Template lookup or rendering failed (unknown template, undefined placeholder).
    #[error("template error: {template}: {message}")]
    Template { template: String, message: String },

    /// The rendered payload is not valid JSON.
    #[error("rendered payload {template} is not valid JSON: {source}")]
    RenderedJson {
        template: String,
        #[source]
        source: serde_json::Error,
    },

    /// Transport-level failure talking to the service.
    #[error("http error: {method} {path}: {message}")]
    Http {
        method: String,
        path: String,
        message: String,
    },

    /// The service answered with an unexpected HTTP status.
    #[error("unexpected status for {operation}: expected {expected}, got {actual} (body: {body})")]
    UnexpectedStatus {
        operation: String,
        expected: u16,
        actual: u16,
        body: String,
    },

    /// A field of the response envelope did not match.
    #[error("unexpected {field} for {operation}: expected {expected:?}, got {actual:?}")]
    UnexpectedField {
        operation: String,
        field: String,
        expected: String,
        actual: String,
    },

    /// A response body failed schema validation.
    #[error("{schema} validation failed:\n{}", render_violations(.violations))]
    SchemaViolation {
        schema: String,
        violations: Vec<Violation>,
    },

    /// A semantic check on response content failed.
    #[error("check failed: {0}")]
    Check(String),

    /// Invalid configuration value.
    #[error("configuration error: {0}")]
    Config(String),

    /// JSON (de)serialization failure outside of rendering.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem failure (scratch payloads, config file).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl HarnessError {
    /// Build a semantic check failure.
    pub fn check(message: impl Into<String>) -> Self {
        Self::Check(message.into())
    }

    /// Build a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Whether this error is an assertion about service behaviour rather
    /// than a harness or transport problem.
    pub fn is_assertion(&self) -> bool {
        matches!(
            self,
            Self::UnexpectedStatus { .. }
                | Self::UnexpectedField { .. }
                | Self::SchemaViolation { .. }
                | Self::Check(_)
        )
    }
}

fn render_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| format!("  - {v}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ViolationKind;

    #[test]
    fn test_schema_violation_display_lists_every_violation() {
        let err = HarnessError::SchemaViolation {
            schema: "list_recommendations".into(),
            violations: vec![
                Violation::new("$[0]", ViolationKind::MissingRequired("cluster_name".into())),
                Violation::new(
                    "$[0].version",
                    ViolationKind::TypeMismatch {
                        expected: "string",
                        actual: "number",
                    },
                ),
            ],
        };
        let text = err.to_string();
        assert!(text.starts_with("list_recommendations validation failed:"));
        assert!(text.contains("$[0]: missing required key 'cluster_name'"));
        assert!(text.contains("$[0].version: expected string, found number"));
    }

    #[test]
    fn test_assertion_classification() {
        assert!(HarnessError::check("x").is_assertion());
        assert!(!HarnessError::config("x").is_assertion());
        assert!(!HarnessError::Http {
            method: "GET".into(),
            path: "/listExperiments".into(),
            message: "connection refused".into(),
        }
        .is_assertion());
    }
}
