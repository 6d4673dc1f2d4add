//! pipegraph compiler
//!
//! Compiles a declarative pipeline configuration into a resource graph:
//! pipeline stages, build environment, deployment strategy, least-privilege
//! IAM policies and optional notification resources.
//!
//! # Architecture
//!
//! ```text
//! PipelineDocument
//!   → ConfigValidator         (every defect reported at once)
//!   → PipelineSpec
//!   → resolve()               (FeatureSet)
//!   → IamPolicyComposer       (per-role PolicyDocument)
//!   → wire_stages()           (Source, Build, Deploy)
//!   → ResourceGraphBuilder    (ResourceGraph)
//! ```
//!
//! Every step is a pure function of its input. Compiling the same document
//! twice yields byte-identical graphs.
//!
//! # Usage
//!
//! ```no_run
//! use pipegraph_compiler::prelude::*;
//!
//! let doc = PipelineDocument::load("pipeline.yaml")?;
//! let compilation = PipelineCompiler::new(CompilerConfig::new()).compile_document(&doc)?;
//! for id in compilation.graph.apply_order()? {
//!     println!("{id}");
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod builder;
pub mod compiler;
pub mod config;
pub mod error;
pub mod features;
pub mod iam;
pub mod naming;
pub mod notifications;
pub mod stages;
pub mod validator;

// Re-exports
pub use builder::ResourceGraphBuilder;
pub use compiler::{Compilation, PipelineCompiler};
pub use config::{CompilerConfig, NetworkInterfaceScope};
pub use error::{
    BuildError, CompileError, CompileResult, NameError, ValidationError, ValidationErrorKind,
    ValidationErrors,
};
pub use features::{resolve, FeatureSet};
pub use iam::IamPolicyComposer;
pub use naming::{role_name_prefix, RoleKind};
pub use stages::{wire_stages, Stage, StageAction};
pub use validator::ConfigValidator;

/// Common imports
pub mod prelude {
    pub use crate::{
        CompileError, Compilation, CompilerConfig, ConfigValidator, FeatureSet, PipelineCompiler,
        RoleKind, ValidationErrorKind,
    };
    pub use pipegraph_model::{PipelineDocument, PipelineSpec, PolicyDocument, ResourceGraph};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
