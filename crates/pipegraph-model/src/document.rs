//! Pipeline document
//!
//! The configuration as a user writes it: flat optional fields and string
//! discriminants, in YAML, JSON or TOML. Missing fields fall back to defaults
//! here and are reported by the validator, so one pass surfaces every defect
//! instead of stopping at the first absent key.

use crate::error::LoadError;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Root of the on-disk configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineDocument {
    /// Pipeline name
    pub name: String,
    /// CodeBuild project name
    pub build_project_name: String,
    /// Target account
    pub account: AccountDocument,
    /// Artifact bucket
    pub artifact_store: ArtifactStoreDocument,
    /// Source stage
    pub source: SourceDocument,
    /// Build environment
    pub build: BuildDocument,
    /// Deploy stage action
    pub deploy: DeployDocument,
    /// `ecs` or `codedeploy`
    pub deployment_type: String,
    /// Build networking
    pub vpc: Option<VpcDocument>,
    /// CodeDeploy application and group
    pub code_deploy: Option<CodeDeployDocument>,
    /// Create CodeDeploy resources
    pub create_code_deploy_app: bool,
    /// Emit notification rules
    pub enable_notifications: bool,
    /// Create the notification topic
    pub create_sns_topic: bool,
    /// Notification settings
    pub notifications: NotificationDocument,
    /// Extra managed policies per role
    pub additional_policy_arns: AdditionalPolicyDocument,
    /// Resource tags
    pub tags: BTreeMap<String, String>,
}

/// Target account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct AccountDocument {
    /// ARN partition
    pub partition: String,
    /// Region code
    pub region: String,
    /// 12-digit account id
    pub account_id: String,
}

impl Default for AccountDocument {
    fn default() -> Self {
        Self {
            partition: "aws".to_string(),
            region: String::new(),
            account_id: String::new(),
        }
    }
}

/// Artifact bucket
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct ArtifactStoreDocument {
    /// Bucket name
    pub bucket: String,
    /// Customer-managed KMS key
    pub kms_key_arn: Option<String>,
    /// Allow deleting a non-empty bucket
    pub force_destroy: bool,
}

/// Source stage, fields of every provider flattened together
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct SourceDocument {
    /// `S3`, `GitHub` or `GitHubV2`
    pub provider: String,
    /// S3: bucket
    pub bucket: Option<String>,
    /// S3: object key
    pub key: Option<String>,
    /// GitHub: repository owner
    pub owner: Option<String>,
    /// GitHub: repository name
    pub repo: Option<String>,
    /// GitHub: branch
    pub branch: Option<String>,
    /// GitHub v1: OAuth token reference
    pub oauth_token: Option<String>,
    /// GitHub v1: webhook secret reference
    pub webhook_secret: Option<String>,
    /// GitHub v2: CodeStar connection ARN
    pub connection_arn: Option<String>,
}

/// Build environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct BuildDocument {
    /// CodeBuild compute type
    pub compute_type: String,
    /// Container image
    pub image: String,
    /// CodeBuild environment type
    pub environment_type: String,
    /// Docker-in-docker
    pub privileged_mode: bool,
    /// Inline buildspec or path
    pub buildspec: Option<String>,
    /// Build timeout in minutes
    pub timeout_minutes: u32,
    /// Plaintext environment variables
    pub environment_variables: BTreeMap<String, String>,
    /// Build log retention in days
    pub log_retention_days: u32,
}

impl Default for BuildDocument {
    fn default() -> Self {
        Self {
            compute_type: "BUILD_GENERAL1_SMALL".to_string(),
            image: "aws/codebuild/standard:7.0".to_string(),
            environment_type: "LINUX_CONTAINER".to_string(),
            privileged_mode: false,
            buildspec: None,
            timeout_minutes: 60,
            environment_variables: BTreeMap::new(),
            log_retention_days: 14,
        }
    }
}

/// Deploy stage action
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct DeployDocument {
    /// Action provider
    pub provider: String,
    /// Provider configuration, passed through verbatim
    pub configuration: BTreeMap<String, String>,
}

/// Build networking
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct VpcDocument {
    /// VPC id
    pub vpc_id: String,
    /// Subnet ids
    pub subnet_ids: Vec<String>,
    /// Security group ids
    pub security_group_ids: Vec<String>,
}

/// CodeDeploy application and deployment group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct CodeDeployDocument {
    /// Application name
    pub app_name: String,
    /// Deployment group name
    pub deployment_group_name: String,
    /// `EC2`, `Lambda` or `ECS`
    pub compute_platform: String,
    /// `IN_PLACE` or `BLUE_GREEN`
    pub deployment_type: String,
    /// `WITH_TRAFFIC_CONTROL` or `WITHOUT_TRAFFIC_CONTROL`
    pub deployment_option: String,
    /// Deployment configuration name
    pub deployment_config_name: Option<String>,
    /// Rollback policy
    pub rollback: RollbackDocument,
    /// ECS service
    pub ecs_target: Option<EcsTargetDocument>,
    /// Load balancer wiring
    pub load_balancer: Option<LoadBalancerDocument>,
    /// Minutes before the blue fleet is terminated
    pub termination_wait_minutes: u32,
    /// `CONTINUE_DEPLOYMENT` or `STOP_DEPLOYMENT`
    pub action_on_timeout: String,
    /// Task roles CodeDeploy may pass
    pub task_role_arns: Vec<String>,
}

impl Default for CodeDeployDocument {
    fn default() -> Self {
        Self {
            app_name: String::new(),
            deployment_group_name: String::new(),
            compute_platform: String::new(),
            deployment_type: "IN_PLACE".to_string(),
            deployment_option: "WITHOUT_TRAFFIC_CONTROL".to_string(),
            deployment_config_name: None,
            rollback: RollbackDocument::default(),
            ecs_target: None,
            load_balancer: None,
            termination_wait_minutes: 5,
            action_on_timeout: "CONTINUE_DEPLOYMENT".to_string(),
            task_role_arns: Vec::new(),
        }
    }
}

/// Rollback policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct RollbackDocument {
    /// Rollback enabled
    pub enabled: bool,
    /// Triggering events
    pub events: Vec<String>,
}

impl Default for RollbackDocument {
    fn default() -> Self {
        Self {
            enabled: true,
            events: vec!["DEPLOYMENT_FAILURE".to_string()],
        }
    }
}

/// ECS service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct EcsTargetDocument {
    /// Cluster name
    pub cluster_name: String,
    /// Service name
    pub service_name: String,
}

/// Load balancer wiring
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct LoadBalancerDocument {
    /// Production listener ARNs
    pub listener_arns: Vec<String>,
    /// Test listener ARNs
    pub test_listener_arns: Vec<String>,
    /// Blue and green target group names
    pub target_group_names: Vec<String>,
}

/// Notification settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct NotificationDocument {
    /// Existing topic ARN
    pub sns_topic_arn: Option<String>,
    /// Name of the created topic
    pub topic_name: Option<String>,
    /// Pipeline states that notify
    pub pipeline_states: Vec<String>,
    /// Stage states that notify
    pub stage_states: Vec<String>,
}

impl Default for NotificationDocument {
    fn default() -> Self {
        Self {
            sns_topic_arn: None,
            topic_name: None,
            pipeline_states: vec!["FAILED".to_string(), "SUCCEEDED".to_string()],
            stage_states: vec!["FAILED".to_string()],
        }
    }
}

/// Extra managed policies per role
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct AdditionalPolicyDocument {
    /// Pipeline role
    pub pipeline: Vec<String>,
    /// Build role
    pub build: Vec<String>,
    /// CodeDeploy role
    pub deploy: Vec<String>,
}

impl PipelineDocument {
    /// Parse from YAML string
    ///
    /// # Errors
    /// Returns error if YAML is invalid or has unknown fields
    pub fn from_yaml_str(yaml: &str) -> Result<Self, LoadError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Parse from JSON string
    ///
    /// # Errors
    /// Returns error if JSON is invalid or has unknown fields
    pub fn from_json_str(json: &str) -> Result<Self, LoadError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse from TOML string
    ///
    /// # Errors
    /// Returns error if TOML is invalid or has unknown fields
    pub fn from_toml_str(text: &str) -> Result<Self, LoadError> {
        Ok(toml::from_str(text)?)
    }

    /// Load a document, choosing the format by file extension
    ///
    /// # Errors
    /// Returns error if the file cannot be read, the extension is not
    /// `yaml`/`yml`/`json`/`toml`, or the content does not parse
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();

        let text = std::fs::read_to_string(path).map_err(|e| LoadError::io_error(path, e))?;

        match extension.as_str() {
            "yaml" | "yml" => Self::from_yaml_str(&text),
            "json" => Self::from_json_str(&text),
            "toml" => Self::from_toml_str(&text),
            other => Err(LoadError::UnsupportedFormat(other.to_string())),
        }
    }

    /// JSON schema of the document
    #[must_use]
    pub fn json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(PipelineDocument)
    }
}
