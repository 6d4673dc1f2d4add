//! Validated pipeline definition
//!
//! The strongly-typed input of the compiler. Variant-conditional field sets
//! are sum types, so a spec cannot carry GitHub fields on an S3 source or a
//! connection ARN without a GitHub v2 source.

use crate::arn::AccountContext;
use crate::code_deploy::CodeDeployConfig;
use crate::credential::CredentialRef;
use crate::enums::ClosedEnum;
use serde::Serialize;
use std::collections::BTreeMap;

/// Root configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineSpec {
    /// Pipeline name, also the primary name of the pipeline role
    pub name: String,
    /// CodeBuild project name
    pub build_project_name: String,
    /// Account the ARNs are derived in
    pub account: AccountContext,
    /// Artifact bucket
    pub artifact_store: ArtifactStore,
    /// Source stage configuration
    pub source: SourceConfig,
    /// Build environment
    pub build: BuildConfig,
    /// Deploy stage configuration
    pub deploy: DeployConfig,
    /// Active deployment strategy
    pub deployment_type: DeploymentType,
    /// Build networking
    pub vpc: Option<VpcConfig>,
    /// CodeDeploy application and group, present iff `flags.create_code_deploy_app`
    pub code_deploy: Option<CodeDeployConfig>,
    /// Feature flags
    pub flags: FeatureFlags,
    /// Notification settings
    pub notifications: NotificationConfig,
    /// Extra managed policies per role
    pub additional_policy_arns: AdditionalPolicies,
    /// Tags applied to every taggable resource
    pub tags: BTreeMap<String, String>,
}

impl PipelineSpec {
    /// Artifact bucket ARN
    #[must_use]
    pub fn artifact_bucket_arn(&self) -> String {
        self.account.s3_bucket_arn(&self.artifact_store.bucket)
    }

    /// Build project ARN
    #[must_use]
    pub fn build_project_arn(&self) -> String {
        self.account.codebuild_project_arn(&self.build_project_name)
    }

    /// Pipeline ARN
    #[must_use]
    pub fn pipeline_arn(&self) -> String {
        self.account.codepipeline_arn(&self.name)
    }

    /// Log group receiving build output
    #[must_use]
    pub fn build_log_group_name(&self) -> String {
        format!("/aws/codebuild/{}", self.build_project_name)
    }
}

/// Deployment strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentType {
    /// ECS standard (rolling) deployment from the pipeline
    Ecs,
    /// Deployment through CodeDeploy
    #[serde(rename = "codedeploy")]
    CodeDeploy,
}

impl ClosedEnum for DeploymentType {
    const ALL: &'static [Self] = &[Self::Ecs, Self::CodeDeploy];

    fn as_str(self) -> &'static str {
        match self {
            Self::Ecs => "ecs",
            Self::CodeDeploy => "codedeploy",
        }
    }
}

/// Source provider discriminant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SourceKind {
    /// S3 object source
    S3,
    /// GitHub via OAuth token (v1)
    GitHub,
    /// GitHub via CodeStar connection (v2)
    GitHubV2,
}

impl ClosedEnum for SourceKind {
    const ALL: &'static [Self] = &[Self::S3, Self::GitHub, Self::GitHubV2];

    fn as_str(self) -> &'static str {
        match self {
            Self::S3 => "S3",
            Self::GitHub => "GitHub",
            Self::GitHubV2 => "GitHubV2",
        }
    }
}

/// Source stage configuration, one payload per provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "provider")]
pub enum SourceConfig {
    /// Versioned S3 object
    S3 {
        /// Source bucket
        bucket: String,
        /// Object key
        key: String,
    },
    /// GitHub (OAuth)
    GitHub {
        /// Repository owner
        owner: String,
        /// Repository name
        repo: String,
        /// Tracked branch
        branch: String,
        /// OAuth token reference
        oauth_token: CredentialRef,
        /// Webhook secret reference; a webhook is created when non-empty
        webhook_secret: Option<CredentialRef>,
    },
    /// GitHub through a CodeStar connection
    GitHubV2 {
        /// Repository owner
        owner: String,
        /// Repository name
        repo: String,
        /// Tracked branch
        branch: String,
        /// Connection ARN
        connection_arn: String,
    },
}

impl SourceConfig {
    /// Discriminant of this source
    #[must_use]
    pub fn kind(&self) -> SourceKind {
        match self {
            Self::S3 { .. } => SourceKind::S3,
            Self::GitHub { .. } => SourceKind::GitHub,
            Self::GitHubV2 { .. } => SourceKind::GitHubV2,
        }
    }
}

/// Deploy stage action: provider and configuration passed through verbatim
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeployConfig {
    /// Action provider (`ECS`, `CodeDeploy`, `CodeDeployToECS`, ...)
    pub provider: String,
    /// Provider-specific configuration
    pub configuration: BTreeMap<String, String>,
}

impl DeployConfig {
    /// Check if the provider is the plain ECS deploy action
    #[must_use]
    pub fn is_ecs_provider(&self) -> bool {
        self.provider.eq_ignore_ascii_case("ECS")
    }
}

/// Artifact bucket settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactStore {
    /// Bucket name
    pub bucket: String,
    /// Customer-managed key for artifact encryption
    pub kms_key_arn: Option<String>,
    /// Allow deleting a non-empty bucket
    pub force_destroy: bool,
}

/// CodeBuild compute size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[allow(missing_docs)]
pub enum ComputeType {
    #[serde(rename = "BUILD_GENERAL1_SMALL")]
    Small,
    #[serde(rename = "BUILD_GENERAL1_MEDIUM")]
    Medium,
    #[serde(rename = "BUILD_GENERAL1_LARGE")]
    Large,
    #[serde(rename = "BUILD_GENERAL1_2XLARGE")]
    XLarge2,
}

impl ClosedEnum for ComputeType {
    const ALL: &'static [Self] = &[Self::Small, Self::Medium, Self::Large, Self::XLarge2];

    fn as_str(self) -> &'static str {
        match self {
            Self::Small => "BUILD_GENERAL1_SMALL",
            Self::Medium => "BUILD_GENERAL1_MEDIUM",
            Self::Large => "BUILD_GENERAL1_LARGE",
            Self::XLarge2 => "BUILD_GENERAL1_2XLARGE",
        }
    }
}

/// CodeBuild container type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[allow(missing_docs)]
pub enum EnvironmentType {
    #[serde(rename = "LINUX_CONTAINER")]
    Linux,
    #[serde(rename = "LINUX_GPU_CONTAINER")]
    LinuxGpu,
    #[serde(rename = "ARM_CONTAINER")]
    Arm,
    #[serde(rename = "WINDOWS_SERVER_2019_CONTAINER")]
    Windows2019,
}

impl ClosedEnum for EnvironmentType {
    const ALL: &'static [Self] = &[Self::Linux, Self::LinuxGpu, Self::Arm, Self::Windows2019];

    fn as_str(self) -> &'static str {
        match self {
            Self::Linux => "LINUX_CONTAINER",
            Self::LinuxGpu => "LINUX_GPU_CONTAINER",
            Self::Arm => "ARM_CONTAINER",
            Self::Windows2019 => "WINDOWS_SERVER_2019_CONTAINER",
        }
    }
}

/// Build environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildConfig {
    /// Compute size
    pub compute_type: ComputeType,
    /// Container image
    pub image: String,
    /// Container type
    pub environment_type: EnvironmentType,
    /// Docker-in-docker
    pub privileged_mode: bool,
    /// Inline buildspec or path; `None` uses `buildspec.yml` from the source
    pub buildspec: Option<String>,
    /// Build timeout
    pub timeout_minutes: u32,
    /// Plaintext environment variables
    pub environment_variables: BTreeMap<String, String>,
    /// Retention of the build log group
    pub log_retention_days: u32,
}

/// Build networking
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VpcConfig {
    /// VPC id
    pub vpc_id: String,
    /// Subnets the build runs in
    pub subnet_ids: Vec<String>,
    /// Security groups attached to the build
    pub security_group_ids: Vec<String>,
}

/// Boolean switches of the configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FeatureFlags {
    /// Create a CodeDeploy application, group and service role
    pub create_code_deploy_app: bool,
    /// Emit state-change notification rules
    pub enable_notifications: bool,
    /// Create the notification topic instead of using an existing one
    pub create_sns_topic: bool,
}

/// Pipeline execution states a rule can match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[allow(missing_docs)]
pub enum PipelineState {
    Started,
    Succeeded,
    Resumed,
    Failed,
    Canceled,
    Superseded,
}

impl ClosedEnum for PipelineState {
    const ALL: &'static [Self] = &[
        Self::Started,
        Self::Succeeded,
        Self::Resumed,
        Self::Failed,
        Self::Canceled,
        Self::Superseded,
    ];

    fn as_str(self) -> &'static str {
        match self {
            Self::Started => "STARTED",
            Self::Succeeded => "SUCCEEDED",
            Self::Resumed => "RESUMED",
            Self::Failed => "FAILED",
            Self::Canceled => "CANCELED",
            Self::Superseded => "SUPERSEDED",
        }
    }
}

/// Stage execution states a rule can match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[allow(missing_docs)]
pub enum StageState {
    Started,
    Succeeded,
    Resumed,
    Failed,
    Canceled,
}

impl ClosedEnum for StageState {
    const ALL: &'static [Self] = &[
        Self::Started,
        Self::Succeeded,
        Self::Resumed,
        Self::Failed,
        Self::Canceled,
    ];

    fn as_str(self) -> &'static str {
        match self {
            Self::Started => "STARTED",
            Self::Succeeded => "SUCCEEDED",
            Self::Resumed => "RESUMED",
            Self::Failed => "FAILED",
            Self::Canceled => "CANCELED",
        }
    }
}

/// Notification settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationConfig {
    /// Existing topic, used when no topic is created
    pub sns_topic_arn: Option<String>,
    /// Name of the created topic; defaults to `<pipeline>-notifications`
    pub topic_name: Option<String>,
    /// Pipeline states that notify
    pub pipeline_states: Vec<PipelineState>,
    /// Stage states that notify
    pub stage_states: Vec<StageState>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            sns_topic_arn: None,
            topic_name: None,
            pipeline_states: vec![PipelineState::Failed, PipelineState::Succeeded],
            stage_states: vec![StageState::Failed],
        }
    }
}

/// Extra managed policies attached per role, in order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AdditionalPolicies {
    /// Attached to the pipeline role
    pub pipeline: Vec<String>,
    /// Attached to the build role
    pub build: Vec<String>,
    /// Attached to the CodeDeploy role
    pub deploy: Vec<String>,
}
