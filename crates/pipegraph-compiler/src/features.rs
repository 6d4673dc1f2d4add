//! Conditional feature resolution
//!
//! Decides which optional subsystems a spec includes. Each decision reads
//! spec fields only, never another decision, so the set can be evaluated in
//! any order and every entry can be tested in isolation.

use pipegraph_model::code_deploy::ComputePlatform;
use pipegraph_model::spec::{DeploymentType, PipelineSpec, SourceConfig};
use serde::Serialize;

/// Inclusion decision for every optional subsystem
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct FeatureSet {
    /// CodeDeploy application, group and role
    pub include_code_deploy: bool,
    /// Build-role VPC networking grants
    pub include_vpc_policy: bool,
    /// GitHub webhook
    pub include_webhook: bool,
    /// Created notification topic
    pub include_sns_topic: bool,
    /// Pipeline and stage event rules
    pub include_notification_rules: bool,
    /// Pipeline-role ECS deploy grants
    pub include_ecs_iam_grants: bool,
    /// Deploy-role blue/green grants for ECS
    pub include_code_deploy_ecs_grants: bool,
    /// `codestar-connections:UseConnection` on the pipeline role
    pub include_connection_grant: bool,
    /// Deploy-role `iam:PassRole` on task roles
    pub include_task_role_pass_grant: bool,
    /// Pipeline-role read access to the source bucket
    pub include_s3_source_grant: bool,
    /// Pipeline-role CodeDeploy deployment grants
    pub include_code_deploy_pipeline_grants: bool,
    /// KMS data-key grants on the artifact key
    pub include_kms_grant: bool,
}

impl FeatureSet {
    /// Decisions by name, in declaration order
    #[must_use]
    pub fn entries(&self) -> [(&'static str, bool); 12] {
        [
            ("include_code_deploy", self.include_code_deploy),
            ("include_vpc_policy", self.include_vpc_policy),
            ("include_webhook", self.include_webhook),
            ("include_sns_topic", self.include_sns_topic),
            ("include_notification_rules", self.include_notification_rules),
            ("include_ecs_iam_grants", self.include_ecs_iam_grants),
            ("include_code_deploy_ecs_grants", self.include_code_deploy_ecs_grants),
            ("include_connection_grant", self.include_connection_grant),
            ("include_task_role_pass_grant", self.include_task_role_pass_grant),
            ("include_s3_source_grant", self.include_s3_source_grant),
            (
                "include_code_deploy_pipeline_grants",
                self.include_code_deploy_pipeline_grants,
            ),
            ("include_kms_grant", self.include_kms_grant),
        ]
    }

    /// Names of the enabled decisions
    #[must_use]
    pub fn enabled(&self) -> Vec<&'static str> {
        self.entries()
            .into_iter()
            .filter_map(|(name, on)| on.then_some(name))
            .collect()
    }
}

/// Resolve the feature set of a spec
#[must_use]
pub fn resolve(spec: &PipelineSpec) -> FeatureSet {
    let code_deploy_ecs = spec.flags.create_code_deploy_app
        && spec.deployment_type == DeploymentType::CodeDeploy
        && spec
            .code_deploy
            .as_ref()
            .is_some_and(|cd| cd.compute_platform == ComputePlatform::Ecs);

    let features = FeatureSet {
        include_code_deploy: spec.flags.create_code_deploy_app,
        include_vpc_policy: spec.vpc.is_some(),
        include_webhook: matches!(
            &spec.source,
            SourceConfig::GitHub { webhook_secret: Some(secret), .. } if !secret.is_empty()
        ),
        include_sns_topic: spec.flags.enable_notifications && spec.flags.create_sns_topic,
        include_notification_rules: spec.flags.enable_notifications,
        include_ecs_iam_grants: spec.deployment_type == DeploymentType::Ecs
            || spec.deploy.is_ecs_provider(),
        include_code_deploy_ecs_grants: code_deploy_ecs,
        include_connection_grant: matches!(
            &spec.source,
            SourceConfig::GitHubV2 { connection_arn, .. } if !connection_arn.is_empty()
        ),
        include_task_role_pass_grant: spec.flags.create_code_deploy_app
            && spec
                .code_deploy
                .as_ref()
                .is_some_and(|cd| !cd.task_role_arns.is_empty()),
        include_s3_source_grant: matches!(spec.source, SourceConfig::S3 { .. }),
        include_code_deploy_pipeline_grants: spec.deployment_type == DeploymentType::CodeDeploy,
        include_kms_grant: spec.artifact_store.kms_key_arn.is_some(),
    };

    tracing::debug!(pipeline = %spec.name, enabled = ?features.enabled(), "resolved features");
    features
}
