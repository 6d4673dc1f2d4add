//! Pipeline stage wiring
//!
//! Always three stages: Source, Build, Deploy, one action each. The source
//! action is shaped by the source variant; the deploy action passes the
//! configured provider and configuration through untouched.

use crate::features::FeatureSet;
use pipegraph_model::graph::{NodeId, ResourceKind};
use pipegraph_model::spec::{PipelineSpec, SourceConfig};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Artifact produced by the source action
pub const SOURCE_ARTIFACT: &str = "source_output";

/// Artifact produced by the build action
pub const BUILD_ARTIFACT: &str = "build_output";

/// Action category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[allow(missing_docs)]
pub enum ActionCategory {
    Source,
    Build,
    Deploy,
}

/// Action owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ActionOwner {
    /// First-party provider
    #[serde(rename = "AWS")]
    Aws,
    /// GitHub OAuth provider
    ThirdParty,
}

/// One pipeline action
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageAction {
    /// Action name
    pub name: String,
    /// Category
    pub category: ActionCategory,
    /// Owner
    pub owner: ActionOwner,
    /// Provider
    pub provider: String,
    /// Provider action version
    pub version: String,
    /// Provider configuration
    pub configuration: BTreeMap<String, String>,
    /// Consumed artifacts
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub input_artifacts: Vec<String>,
    /// Produced artifacts
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub output_artifacts: Vec<String>,
    /// Graph nodes whose placeholders appear in `configuration`
    #[serde(skip)]
    pub references: BTreeSet<NodeId>,
}

impl StageAction {
    fn new(category: ActionCategory, owner: ActionOwner, provider: impl Into<String>) -> Self {
        Self {
            name: format!("{category:?}"),
            category,
            owner,
            provider: provider.into(),
            version: "1".to_string(),
            configuration: BTreeMap::new(),
            input_artifacts: Vec::new(),
            output_artifacts: Vec::new(),
            references: BTreeSet::new(),
        }
    }

    fn set(mut self, key: &str, value: impl Into<String>) -> Self {
        self.configuration.insert(key.to_string(), value.into());
        self
    }

    fn set_reference(mut self, key: &str, target: &NodeId, attribute: &str) -> Self {
        self.references.insert(target.clone());
        self.set(key, target.reference(attribute))
    }

    fn reads(mut self, artifact: &str) -> Self {
        self.input_artifacts.push(artifact.to_string());
        self
    }

    fn writes(mut self, artifact: &str) -> Self {
        self.output_artifacts.push(artifact.to_string());
        self
    }
}

/// One pipeline stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stage {
    /// Stage name
    pub name: String,
    /// Actions, run in order
    pub actions: Vec<StageAction>,
}

impl Stage {
    fn single(action: StageAction) -> Self {
        Self {
            name: action.name.clone(),
            actions: vec![action],
        }
    }
}

/// Source, Build and Deploy stages of a spec
#[must_use]
pub fn wire_stages(spec: &PipelineSpec, features: &FeatureSet) -> Vec<Stage> {
    vec![
        Stage::single(source_action(spec, features)),
        Stage::single(build_action()),
        Stage::single(deploy_action(spec)),
    ]
}

fn source_action(spec: &PipelineSpec, features: &FeatureSet) -> StageAction {
    use ActionCategory::Source;

    let action = match &spec.source {
        SourceConfig::S3 { bucket, key } => StageAction::new(Source, ActionOwner::Aws, "S3")
            .set("S3Bucket", bucket)
            .set("S3ObjectKey", key),
        SourceConfig::GitHub {
            owner,
            repo,
            branch,
            oauth_token,
            ..
        } => {
            let action = StageAction::new(Source, ActionOwner::ThirdParty, "GitHub")
                .set("Owner", owner)
                .set("Repo", repo)
                .set("Branch", branch)
                .set("OAuthToken", oauth_token.expose());
            if features.include_webhook {
                action.set("PollForSourceChanges", "false")
            } else {
                action
            }
        }
        SourceConfig::GitHubV2 {
            owner,
            repo,
            branch,
            connection_arn,
        } => StageAction::new(Source, ActionOwner::Aws, "CodeStarSourceConnection")
            .set("FullRepositoryId", format!("{owner}/{repo}"))
            .set("BranchName", branch)
            .set("ConnectionArn", connection_arn),
    };
    action.writes(SOURCE_ARTIFACT)
}

fn build_action() -> StageAction {
    let project = NodeId::new(ResourceKind::BuildProject, "main");
    StageAction::new(ActionCategory::Build, ActionOwner::Aws, "CodeBuild")
        .set_reference("ProjectName", &project, "name")
        .reads(SOURCE_ARTIFACT)
        .writes(BUILD_ARTIFACT)
}

fn deploy_action(spec: &PipelineSpec) -> StageAction {
    let mut action = StageAction::new(ActionCategory::Deploy, ActionOwner::Aws, &spec.deploy.provider)
        .reads(BUILD_ARTIFACT);
    action.configuration = spec.deploy.configuration.clone();
    action
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::resolve;
    use crate::validator::ConfigValidator;
    use pipegraph_model::PipelineDocument;
    use pipegraph_test_utils::fixtures;
    use pretty_assertions::assert_eq;

    fn stages(doc: &PipelineDocument) -> Vec<Stage> {
        let spec = ConfigValidator::new().lower(doc).unwrap();
        wire_stages(&spec, &resolve(&spec))
    }

    fn config(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn three_stages_one_action_each() {
        for (label, doc) in fixtures::all() {
            let stages = stages(&doc);
            let names: Vec<_> = stages.iter().map(|s| s.name.as_str()).collect();
            assert_eq!(names, vec!["Source", "Build", "Deploy"], "{label}");
            assert!(stages.iter().all(|s| s.actions.len() == 1), "{label}");
        }
    }

    #[test]
    fn s3_source_action() {
        let source = &stages(&fixtures::s3_ecs())[0].actions[0];
        assert_eq!(source.provider, "S3");
        assert_eq!(
            source.configuration,
            config(&[("S3Bucket", "orders-source"), ("S3ObjectKey", "releases/orders.zip")])
        );
        assert_eq!(source.output_artifacts, vec![SOURCE_ARTIFACT.to_string()]);
    }

    #[test]
    fn github_webhook_disables_polling() {
        let source = &stages(&fixtures::github_webhook_ecs())[0].actions[0];
        assert_eq!(source.owner, ActionOwner::ThirdParty);
        assert_eq!(source.configuration["PollForSourceChanges"], "false");
        assert_eq!(
            source.configuration["OAuthToken"],
            "{{resolve:secretsmanager:github-token}}"
        );
    }

    #[test]
    fn github_v2_source_action() {
        let source = &stages(&fixtures::github_v2_ecs())[0].actions[0];
        assert_eq!(source.provider, "CodeStarSourceConnection");
        assert_eq!(
            source.configuration,
            config(&[
                ("BranchName", "main"),
                ("ConnectionArn", fixtures::CONNECTION_ARN),
                ("FullRepositoryId", "acme/orders"),
            ])
        );
    }

    #[test]
    fn build_references_project_node() {
        let build = &stages(&fixtures::s3_ecs())[1].actions[0];
        assert_eq!(build.configuration["ProjectName"], "${build_project.main.name}");
        assert_eq!(
            build.references.iter().map(NodeId::as_str).collect::<Vec<_>>(),
            vec!["build_project.main"]
        );
        assert_eq!(build.input_artifacts, vec![SOURCE_ARTIFACT.to_string()]);
        assert_eq!(build.output_artifacts, vec![BUILD_ARTIFACT.to_string()]);
    }

    #[test]
    fn deploy_passes_through() {
        let doc = fixtures::s3_ecs();
        let deploy = &stages(&doc)[2].actions[0];
        assert_eq!(deploy.provider, "ECS");
        assert_eq!(deploy.configuration, doc.deploy.configuration);
        assert!(deploy.references.is_empty());
    }
}
