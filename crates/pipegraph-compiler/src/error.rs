//! Error types for the compiler
//!
//! Provides error handling for:
//! - Configuration validation (every defect, reported together)
//! - Role name generation
//! - Graph construction invariants
//!
//! Nothing here is retryable: the compiler performs no I/O, so the same input
//! always fails the same way.

use pipegraph_model::GraphError;
use serde::Serialize;
use std::fmt;

/// Category of a validation failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ValidationErrorKind {
    /// Enum or type violation
    SchemaError,
    /// Variant-conditional required field absent
    MissingDependentField,
    /// Mutually exclusive settings, or a setting without its prerequisite
    ConflictingConfiguration,
    /// No legal resource name can be produced
    NameOverflow,
}

impl fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// One validation failure, located by its document field path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{kind} at {field}: {reason}")]
pub struct ValidationError {
    /// Dotted field path, e.g. `code_deploy.load_balancer`
    pub field: String,
    /// Failure category
    pub kind: ValidationErrorKind,
    /// Human-readable reason
    pub reason: String,
}

impl ValidationError {
    /// Create a validation error
    pub fn new(field: impl Into<String>, kind: ValidationErrorKind, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            kind,
            reason: reason.into(),
        }
    }
}

/// Every validation failure of one document, in check order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<ValidationError>);

impl ValidationErrors {
    /// Empty collection
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure
    pub fn push(&mut self, error: ValidationError) {
        self.0.push(error);
    }

    /// Check if no failure was recorded
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of failures
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Failures in check order
    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.0.iter()
    }

    /// Failures of one kind
    pub fn of_kind(&self, kind: ValidationErrorKind) -> impl Iterator<Item = &ValidationError> {
        self.0.iter().filter(move |e| e.kind == kind)
    }

    /// Check if a failure of `kind` was recorded on `field`
    #[must_use]
    pub fn has(&self, field: &str, kind: ValidationErrorKind) -> bool {
        self.0.iter().any(|e| e.field == field && e.kind == kind)
    }

    /// `Ok` when empty, otherwise `Err(self)`
    ///
    /// # Errors
    /// Returns self when at least one failure was recorded
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} validation error(s)", self.0.len())?;
        for error in &self.0 {
            write!(f, "\n  - {error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

impl IntoIterator for ValidationErrors {
    type Item = ValidationError;
    type IntoIter = std::vec::IntoIter<ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Resource name generation failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NameError {
    /// Source name is empty
    #[error("name is empty")]
    Empty,

    /// Name contains characters the resource does not accept
    #[error("name contains characters the resource does not accept: '{0}'")]
    IllegalCharacters(String),

    /// Generated name exceeds the platform limit
    #[error("generated name '{name}' exceeds {limit} characters")]
    TooLong {
        /// Generated name
        name: String,
        /// Platform limit
        limit: usize,
    },
}

/// Graph construction failures
///
/// Only reachable when a spec skipped validation or an internal invariant was
/// broken; a validated document never produces these.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    /// A validation rule does not hold for the typed spec
    #[error("invariant violated: {0}")]
    InvariantViolated(ValidationError),

    /// Resource name could not be generated
    #[error("{resource} name: {source}")]
    Name {
        /// Resource being named
        resource: &'static str,
        /// Naming failure
        #[source]
        source: NameError,
    },

    /// Two nodes share an id
    #[error("duplicate node id: {0}")]
    DuplicateNode(String),

    /// An attribute references a node that is not in the graph
    #[error("node {node} references absent node {target}")]
    DanglingReference {
        /// Referencing node
        node: String,
        /// Absent target
        target: String,
    },

    /// An attribute references a node not listed as a dependency
    #[error("node {node} references {target} without depending on it")]
    MissingDependency {
        /// Referencing node
        node: String,
        /// Target missing from `depends_on`
        target: String,
    },

    /// Dependency structure is not a DAG
    #[error("graph structure: {0}")]
    Graph(#[from] GraphError),

    /// Policy JSON rendering failed
    #[error("policy serialization failed: {0}")]
    Serialization(String),
}

/// Top-level compile error
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// Document failed validation
    #[error("{0}")]
    Validation(#[from] ValidationErrors),

    /// Graph construction failed
    #[error("build failed: {0}")]
    Build(#[from] BuildError),
}

impl CompileError {
    /// Validation failures, if that is why compilation failed
    #[must_use]
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            Self::Validation(errors) => Some(errors),
            Self::Build(_) => None,
        }
    }
}

/// Result type alias for compiler operations
pub type CompileResult<T> = Result<T, CompileError>;
