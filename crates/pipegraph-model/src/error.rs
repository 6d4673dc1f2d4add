//! Error types for the data model
//!
//! - Document loading (file → `PipelineDocument`)
//! - Graph traversal (apply ordering)

use std::path::PathBuf;

/// Errors while loading a pipeline document
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// IO error during file read
    #[error("io error reading {path}: {source}")]
    Io {
        /// File being read
        path: PathBuf,
        /// Underlying IO failure
        #[source]
        source: std::io::Error,
    },

    /// Malformed JSON document
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed YAML document
    #[error("invalid yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Malformed TOML document
    #[error("invalid toml: {0}")]
    Toml(#[from] toml::de::Error),

    /// No loader for this file extension
    #[error("unsupported document format: '{0}'")]
    UnsupportedFormat(String),
}

impl LoadError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors while traversing a resource graph
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// A dependency edge points at a node that is not in the graph
    #[error("node {node} depends on unknown node {dependency}")]
    UnknownDependency {
        /// Node declaring the edge
        node: String,
        /// Missing target
        dependency: String,
    },

    /// Dependencies form a cycle
    #[error("dependency cycle through {0}")]
    CycleDetected(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_format_display() {
        let err = LoadError::UnsupportedFormat("ini".to_string());
        assert_eq!(err.to_string(), "unsupported document format: 'ini'");
    }

    #[test]
    fn graph_error_display() {
        let err = GraphError::UnknownDependency {
            node: "pipeline.main".to_string(),
            dependency: "bucket.artifacts".to_string(),
        };
        assert!(err.to_string().contains("unknown node bucket.artifacts"));
    }
}
