//! Compiler facade
//!
//! One entry point running the whole chain:
//! validate → resolve features → compose policies and wire stages → build graph.

use crate::builder::ResourceGraphBuilder;
use crate::config::CompilerConfig;
use crate::error::{CompileResult, ValidationErrors};
use crate::features::FeatureSet;
use crate::naming::RoleKind;
use crate::stages::Stage;
use crate::validator::ConfigValidator;
use pipegraph_model::{PipelineDocument, PipelineSpec, PolicyDocument, ResourceGraph};
use serde::Serialize;
use std::collections::BTreeMap;

/// Everything one compile produced
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Compilation {
    /// Typed spec the graph was built from
    pub spec: PipelineSpec,
    /// Resolved features
    pub features: FeatureSet,
    /// Permission policy per role present in the graph
    pub policies: BTreeMap<RoleKind, PolicyDocument>,
    /// Wired stages
    pub stages: Vec<Stage>,
    /// Resource graph
    pub graph: ResourceGraph,
}

/// Pipeline topology compiler
///
/// Holds no state between compiles; share one instance freely across threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineCompiler {
    validator: ConfigValidator,
    builder: ResourceGraphBuilder,
}

impl PipelineCompiler {
    /// Create compiler
    #[must_use]
    pub fn new(config: CompilerConfig) -> Self {
        Self {
            validator: ConfigValidator::new(),
            builder: ResourceGraphBuilder::new(config),
        }
    }

    /// Validate a document and lower it into a spec
    ///
    /// # Errors
    /// Returns every validation failure
    pub fn validate(&self, doc: &PipelineDocument) -> Result<PipelineSpec, ValidationErrors> {
        self.validator.lower(doc)
    }

    /// Compile a loose document
    ///
    /// # Errors
    /// Returns validation failures, or a build error if graph construction fails
    pub fn compile_document(&self, doc: &PipelineDocument) -> CompileResult<Compilation> {
        let spec = self.validate(doc).map_err(|errors| {
            tracing::info!(pipeline = %doc.name, errors = errors.len(), "document rejected");
            errors
        })?;
        self.compile(&spec)
    }

    /// Compile a typed spec
    ///
    /// # Errors
    /// Returns a build error if an invariant does not hold or the graph is malformed
    pub fn compile(&self, spec: &PipelineSpec) -> CompileResult<Compilation> {
        let compilation = self.builder.assemble(spec)?;
        tracing::info!(
            pipeline = %spec.name,
            nodes = compilation.graph.len(),
            fingerprint = %compilation.graph.fingerprint(),
            "compiled pipeline"
        );
        Ok(compilation)
    }
}
