//! pipegraph data model
//!
//! Types shared by the compiler and its callers.
//!
//! # Core Concepts
//!
//! - [`PipelineDocument`]: the loose, on-disk configuration as a user writes it
//! - [`PipelineSpec`]: the validated, strongly-typed form the compiler consumes
//! - [`PolicyDocument`]: ordered IAM permission statements
//! - [`ResourceGraph`]: the compiler's output, resource nodes plus dependency edges
//!
//! A `PipelineDocument` becomes a `PipelineSpec` only through validation, so
//! every variant-conditional field set in a spec is internally consistent.

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod arn;
pub mod code_deploy;
pub mod credential;
pub mod document;
pub mod enums;
pub mod error;
pub mod graph;
pub mod policy;
pub mod spec;

// Re-exports
pub use arn::AccountContext;
pub use code_deploy::{
    BlueGreenSettings, CodeDeployConfig, ComputePlatform, DeploymentOption, EcsTarget,
    LoadBalancerInfo, RollbackEvent, RollbackPolicy, TimeoutAction, TrafficDeploymentType,
};
pub use credential::CredentialRef;
pub use document::PipelineDocument;
pub use enums::ClosedEnum;
pub use error::{GraphError, LoadError};
pub use graph::{NodeId, PipelineOutputs, ResourceGraph, ResourceKind, ResourceNode};
pub use policy::{Condition, Effect, PolicyDocument, PolicyStatement, Principal};
pub use spec::{
    AdditionalPolicies, ArtifactStore, BuildConfig, ComputeType, DeployConfig, DeploymentType,
    EnvironmentType, FeatureFlags, NotificationConfig, PipelineSpec, PipelineState,
    SourceConfig, SourceKind, StageState, VpcConfig,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
