//! Resource graph construction
//!
//! Turns a validated spec into a [`ResourceGraph`]. Node ids follow
//! `<kind>.<logical-name>` and never depend on anything but the `PipelineSpec`, so two
//! builds of the same spec produce identical graphs.
//!
//! Every placeholder the builder writes is recorded on its node through
//! `Links`; text copied from the input is never treated as a reference.
//! Before returning, every node is checked:
//! - each recorded reference names a node in the graph
//! - each referenced node is listed in `depends_on`
//! - the dependency edges form a DAG
//!
//! A failed check returns an error; no partial graph is ever produced.

use crate::compiler::Compilation;
use crate::config::CompilerConfig;
use crate::error::BuildError;
use crate::features::{resolve, FeatureSet};
use crate::iam::{trust_policy, IamPolicyComposer};
use crate::naming::{derived_name, role_name_prefix, DerivedName, RoleKind, TOPIC_SUFFIX, WEBHOOK_SUFFIX};
use crate::notifications::{event_pattern, input_transformer, NotificationScope};
use crate::stages::{wire_stages, Stage};
use crate::validator::ConfigValidator;
use pipegraph_model::code_deploy::CodeDeployConfig;
use pipegraph_model::graph::{NodeId, PipelineOutputs, ResourceGraph, ResourceKind, ResourceNode};
use pipegraph_model::policy::{PolicyDocument, PolicyStatement, Principal};
use pipegraph_model::spec::{PipelineSpec, SourceConfig};
use pipegraph_model::ClosedEnum;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Tag added to every taggable node
pub const PIPELINE_TAG: &str = "pipegraph:pipeline";

fn id(kind: ResourceKind, name: &str) -> NodeId {
    NodeId::new(kind, name)
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, BuildError> {
    serde_json::to_value(value).map_err(|e| BuildError::Serialization(e.to_string()))
}

/// Insert optional attributes only when present
fn with_optional(mut attributes: Value, optional: impl IntoIterator<Item = (&'static str, Option<Value>)>) -> Value {
    if let Value::Object(map) = &mut attributes {
        for (key, value) in optional {
            if let Some(value) = value {
                map.insert(key.to_string(), value);
            }
        }
    }
    attributes
}

/// Placeholders written into one node's attributes
#[derive(Debug, Default)]
struct Links(BTreeSet<NodeId>);

impl Links {
    /// Placeholder for `attribute` of `target`, recorded
    fn to(&mut self, target: &NodeId, attribute: &str) -> String {
        self.0.insert(target.clone());
        target.reference(attribute)
    }
}

fn named(kind: DerivedName, base: &str, suffix: &str) -> Result<String, BuildError> {
    derived_name(kind, base, suffix).map_err(|source| BuildError::Name {
        resource: kind.as_str(),
        source,
    })
}

/// Graph builder
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceGraphBuilder {
    config: CompilerConfig,
    validator: ConfigValidator,
}

impl ResourceGraphBuilder {
    /// Create builder
    #[inline]
    #[must_use]
    pub fn new(config: CompilerConfig) -> Self {
        Self {
            config,
            validator: ConfigValidator::new(),
        }
    }

    /// Build the resource graph of a spec
    ///
    /// # Errors
    /// Returns error if an invariant does not hold for `spec`, or the
    /// assembled graph has a dangling reference, a missing dependency edge or
    /// a cycle
    pub fn build(&self, spec: &PipelineSpec) -> Result<ResourceGraph, BuildError> {
        self.assemble(spec).map(|compilation| compilation.graph)
    }

    /// Build the graph and keep the intermediate products
    ///
    /// # Errors
    /// Same as [`ResourceGraphBuilder::build`]
    pub fn assemble(&self, spec: &PipelineSpec) -> Result<Compilation, BuildError> {
        if let Some(first) = self.validator.check_spec(spec).into_iter().next() {
            return Err(BuildError::InvariantViolated(first));
        }

        let features = resolve(spec);
        let composer = IamPolicyComposer::new(self.config);
        let roles: Vec<RoleKind> = RoleKind::ALL
            .into_iter()
            .filter(|role| *role != RoleKind::Deploy || features.include_code_deploy)
            .collect();
        let policies: BTreeMap<RoleKind, PolicyDocument> = roles
            .iter()
            .map(|role| (*role, composer.compose(*role, spec, &features)))
            .collect();
        let stages = wire_stages(spec, &features);

        let mut assembly = Assembly::new(spec);
        for role in &roles {
            let managed = composer.managed_policy_arns(*role, spec, &features);
            assembly.role(*role, &policies[role], &managed)?;
        }
        assembly.artifact_bucket()?;
        assembly.build_project()?;
        if let Some(cd) = spec.code_deploy.as_ref().filter(|_| features.include_code_deploy) {
            assembly.code_deploy(cd)?;
        }
        assembly.pipeline(&stages, &features)?;
        let topic = assembly.notifications(&features)?;
        let webhook = assembly.webhook(&features)?;

        let outputs = PipelineOutputs {
            pipeline_arn: spec.pipeline_arn(),
            build_project_arn: spec.build_project_arn(),
            artifact_bucket_arn: spec.artifact_bucket_arn(),
            pipeline_role_arn: id(ResourceKind::Role, RoleKind::Pipeline.as_str()).reference("arn"),
            build_role_arn: id(ResourceKind::Role, RoleKind::Build.as_str()).reference("arn"),
            deploy_role_arn: features
                .include_code_deploy
                .then(|| id(ResourceKind::Role, RoleKind::Deploy.as_str()).reference("arn")),
            code_deploy_app_name: spec
                .code_deploy
                .as_ref()
                .filter(|_| features.include_code_deploy)
                .map(|cd| cd.app_name.clone()),
            deployment_group_name: spec
                .code_deploy
                .as_ref()
                .filter(|_| features.include_code_deploy)
                .map(|cd| cd.deployment_group_name.clone()),
            notification_topic_arn: topic,
            webhook_url: webhook,
        };

        let graph = ResourceGraph::new(assembly.finish(), outputs);
        verify(&graph)?;

        tracing::debug!(
            pipeline = %spec.name,
            nodes = graph.len(),
            edges = graph.edge_count(),
            "built resource graph"
        );

        Ok(Compilation {
            spec: spec.clone(),
            features,
            policies,
            stages,
            graph,
        })
    }
}

/// Reference and dependency checks over a complete graph
fn verify(graph: &ResourceGraph) -> Result<(), BuildError> {
    for node in graph.nodes().values() {
        for target in &node.references {
            if !graph.contains(target.as_str()) {
                return Err(BuildError::DanglingReference {
                    node: node.id.to_string(),
                    target: target.to_string(),
                });
            }
            if !node.depends_on.contains(target) {
                return Err(BuildError::MissingDependency {
                    node: node.id.to_string(),
                    target: target.to_string(),
                });
            }
        }
    }
    graph.apply_order()?;
    Ok(())
}

/// Nodes under construction for one spec
struct Assembly<'a> {
    spec: &'a PipelineSpec,
    tags: BTreeMap<String, String>,
    nodes: BTreeMap<NodeId, ResourceNode>,
}

impl<'a> Assembly<'a> {
    fn new(spec: &'a PipelineSpec) -> Self {
        let mut tags = spec.tags.clone();
        tags.insert(PIPELINE_TAG.to_string(), spec.name.clone());
        Self {
            spec,
            tags,
            nodes: BTreeMap::new(),
        }
    }

    fn insert(&mut self, mut node: ResourceNode) -> Result<NodeId, BuildError> {
        if node.kind.is_taggable() {
            if let Value::Object(map) = &mut node.attributes {
                map.insert("tags".to_string(), to_value(&self.tags)?);
            }
        }
        let node_id = node.id.clone();
        if self.nodes.contains_key(&node_id) {
            return Err(BuildError::DuplicateNode(node_id.to_string()));
        }
        tracing::trace!(node = %node_id, "emitted node");
        self.nodes.insert(node_id.clone(), node);
        Ok(node_id)
    }

    fn finish(self) -> BTreeMap<NodeId, ResourceNode> {
        self.nodes
    }

    fn role(&mut self, role: RoleKind, policy: &PolicyDocument, managed: &[String]) -> Result<(), BuildError> {
        let spec = self.spec;
        let source_name = match role {
            RoleKind::Pipeline => spec.name.as_str(),
            RoleKind::Build => spec.build_project_name.as_str(),
            RoleKind::Deploy => spec.code_deploy.as_ref().map_or("", |cd| cd.app_name.as_str()),
        };
        let name_prefix =
            role_name_prefix(source_name, role).map_err(|source| BuildError::Name {
                resource: role.as_str(),
                source,
            })?;

        let role_id = self.insert(ResourceNode::new(
            ResourceKind::Role,
            role.as_str(),
            json!({
                "name_prefix": name_prefix,
                "assume_role_policy": to_value(&trust_policy(role, &spec.account))?,
            }),
        ))?;

        let mut links = Links::default();
        let attributes = json!({
            "name": format!("{}{}policy", truncate_name(source_name), role.suffix()),
            "role": links.to(&role_id, "name"),
            "policy": to_value(policy)?,
        });
        self.insert(
            ResourceNode::new(ResourceKind::PolicyDocument, role.as_str(), attributes)
                .depends_on(&role_id)
                .referencing(&links.0),
        )?;

        for (i, arn) in managed.iter().enumerate() {
            let mut links = Links::default();
            let attributes = json!({
                "role": links.to(&role_id, "name"),
                "policy_arn": arn,
            });
            self.insert(
                ResourceNode::new(ResourceKind::PolicyAttachment, &format!("{}_{i}", role.as_str()), attributes)
                    .depends_on(&role_id)
                    .referencing(&links.0),
            )?;
        }
        Ok(())
    }

    fn artifact_bucket(&mut self) -> Result<(), BuildError> {
        let spec = self.spec;
        let store = &spec.artifact_store;
        let encryption = match &store.kms_key_arn {
            Some(key) => json!({ "sse_algorithm": "aws:kms", "kms_master_key_id": key }),
            None => json!({ "sse_algorithm": "AES256" }),
        };
        self.insert(ResourceNode::new(
            ResourceKind::Bucket,
            "artifacts",
            json!({
                "bucket": store.bucket,
                "force_destroy": store.force_destroy,
                "versioning": { "enabled": true },
                "public_access_block": {
                    "block_public_acls": true,
                    "block_public_policy": true,
                    "ignore_public_acls": true,
                    "restrict_public_buckets": true,
                },
                "server_side_encryption": encryption,
            }),
        ))?;
        Ok(())
    }

    fn build_project(&mut self) -> Result<(), BuildError> {
        let spec = self.spec;
        let build = &spec.build;

        let log_group = self.insert(ResourceNode::new(
            ResourceKind::LogGroup,
            "build",
            json!({
                "name": spec.build_log_group_name(),
                "retention_in_days": build.log_retention_days,
            }),
        ))?;

        let role = id(ResourceKind::Role, RoleKind::Build.as_str());
        let policy = id(ResourceKind::PolicyDocument, RoleKind::Build.as_str());
        let variables: Vec<Value> = build
            .environment_variables
            .iter()
            .map(|(name, value)| json!({ "name": name, "value": value, "type": "PLAINTEXT" }))
            .collect();

        let mut links = Links::default();
        let attributes = with_optional(
            json!({
                "name": spec.build_project_name,
                "service_role": links.to(&role, "arn"),
                "build_timeout": build.timeout_minutes,
                "artifacts": { "type": "CODEPIPELINE" },
                "source": with_optional(
                    json!({ "type": "CODEPIPELINE" }),
                    [("buildspec", build.buildspec.as_ref().map(|b| json!(b)))],
                ),
                "environment": {
                    "compute_type": build.compute_type.as_str(),
                    "image": build.image,
                    "type": build.environment_type.as_str(),
                    "privileged_mode": build.privileged_mode,
                    "image_pull_credentials_type": "CODEBUILD",
                    "environment_variables": variables,
                },
                "logs_config": {
                    "cloudwatch_logs": {
                        "status": "ENABLED",
                        "group_name": links.to(&log_group, "name"),
                    },
                },
            }),
            [
                (
                    "vpc_config",
                    spec.vpc.as_ref().map(|vpc| {
                        json!({
                            "vpc_id": vpc.vpc_id,
                            "subnets": vpc.subnet_ids,
                            "security_group_ids": vpc.security_group_ids,
                        })
                    }),
                ),
                (
                    "encryption_key",
                    spec.artifact_store.kms_key_arn.as_ref().map(|k| json!(k)),
                ),
            ],
        );

        self.insert(
            ResourceNode::new(ResourceKind::BuildProject, "main", attributes)
                .depends_on(&role)
                .depends_on(&policy)
                .depends_on(&log_group)
                .referencing(&links.0),
        )?;
        Ok(())
    }

    fn code_deploy(&mut self, cd: &CodeDeployConfig) -> Result<(), BuildError> {
        let app = self.insert(ResourceNode::new(
            ResourceKind::DeploymentApplication,
            "main",
            json!({
                "name": cd.app_name,
                "compute_platform": cd.compute_platform.platform_value(),
            }),
        ))?;

        let role = id(ResourceKind::Role, RoleKind::Deploy.as_str());
        let policy = id(ResourceKind::PolicyDocument, RoleKind::Deploy.as_str());
        let events: Vec<&str> = cd.rollback.events.iter().map(|e| e.as_str()).collect();

        let blue_green = cd.is_blue_green().then(|| {
            json!({
                "deployment_ready_option": {
                    "action_on_timeout": cd.blue_green.action_on_timeout.as_str(),
                },
                "terminate_blue_instances_on_deployment_success": {
                    "action": "TERMINATE",
                    "termination_wait_time_in_minutes": cd.blue_green.termination_wait_minutes,
                },
            })
        });
        let ecs_service = cd.ecs_target.as_ref().map(|target| {
            json!({
                "cluster_name": target.cluster_name,
                "service_name": target.service_name,
            })
        });
        let load_balancer = cd.load_balancer.as_ref().map(|lb| {
            let target_groups: Vec<Value> = lb
                .target_group_names
                .iter()
                .map(|name| json!({ "name": name }))
                .collect();
            if cd.is_blue_green() {
                let pair = with_optional(
                    json!({
                        "prod_traffic_route": { "listener_arns": lb.listener_arns },
                        "target_groups": target_groups,
                    }),
                    [(
                        "test_traffic_route",
                        (!lb.test_listener_arns.is_empty())
                            .then(|| json!({ "listener_arns": lb.test_listener_arns })),
                    )],
                );
                json!({ "target_group_pair_info": pair })
            } else {
                json!({ "target_group_info": target_groups })
            }
        });

        let mut links = Links::default();
        let attributes = with_optional(
            json!({
                "app_name": links.to(&app, "name"),
                "deployment_group_name": cd.deployment_group_name,
                "service_role_arn": links.to(&role, "arn"),
                "deployment_config_name": cd.effective_deployment_config(),
                "deployment_style": {
                    "deployment_type": cd.deployment_type.as_str(),
                    "deployment_option": cd.deployment_option.as_str(),
                },
                "auto_rollback_configuration": {
                    "enabled": cd.rollback.enabled,
                    "events": events,
                },
            }),
            [
                ("blue_green_deployment_config", blue_green),
                ("ecs_service", ecs_service),
                ("load_balancer_info", load_balancer),
            ],
        );

        self.insert(
            ResourceNode::new(ResourceKind::DeploymentGroup, "main", attributes)
                .depends_on(&app)
                .depends_on(&role)
                .depends_on(&policy)
                .referencing(&links.0),
        )?;
        Ok(())
    }

    fn pipeline(&mut self, stages: &[Stage], features: &FeatureSet) -> Result<(), BuildError> {
        let spec = self.spec;
        let role = id(ResourceKind::Role, RoleKind::Pipeline.as_str());
        let policy = id(ResourceKind::PolicyDocument, RoleKind::Pipeline.as_str());
        let bucket = id(ResourceKind::Bucket, "artifacts");
        let project = id(ResourceKind::BuildProject, "main");

        let mut links = Links::default();
        for action in stages.iter().flat_map(|stage| &stage.actions) {
            links.0.extend(action.references.iter().cloned());
        }
        let artifact_store = with_optional(
            json!({
                "location": links.to(&bucket, "bucket"),
                "type": "S3",
            }),
            [(
                "encryption_key",
                spec.artifact_store
                    .kms_key_arn
                    .as_ref()
                    .map(|key| json!({ "id": key, "type": "KMS" })),
            )],
        );

        let mut node = ResourceNode::new(
            ResourceKind::Pipeline,
            "main",
            json!({
                "name": spec.name,
                "role_arn": links.to(&role, "arn"),
                "artifact_store": artifact_store,
                "stages": to_value(&stages)?,
            }),
        )
        .depends_on(&role)
        .depends_on(&policy)
        .depends_on(&bucket)
        .depends_on(&project)
        .referencing(&links.0);
        if features.include_code_deploy {
            node = node.depends_on(&id(ResourceKind::DeploymentGroup, "main"));
        }
        self.insert(node)?;
        Ok(())
    }

    /// Topic, topic policy, rules and targets; returns the topic ARN
    fn notifications(&mut self, features: &FeatureSet) -> Result<Option<String>, BuildError> {
        if !features.include_notification_rules {
            return Ok(None);
        }
        let spec = self.spec;

        let created = if features.include_sns_topic {
            let topic_name = match &spec.notifications.topic_name {
                Some(name) => name.clone(),
                None => named(DerivedName::Topic, &spec.name, TOPIC_SUFFIX)?,
            };
            let topic = self.insert(ResourceNode::new(
                ResourceKind::Topic,
                "notifications",
                json!({ "name": topic_name }),
            ))?;

            let mut links = Links::default();
            let publish = PolicyDocument::from_statements(vec![PolicyStatement::allow(["sns:Publish"])
                .for_principal(Principal::service(spec.account.service_principal("events")))
                .on([links.to(&topic, "arn")])
                .sid("AllowEventBridgePublish")]);
            let attributes = json!({
                "arn": links.to(&topic, "arn"),
                "policy": to_value(&publish)?,
            });
            let topic_policy = self.insert(
                ResourceNode::new(ResourceKind::TopicPolicy, "notifications", attributes)
                    .depends_on(&topic)
                    .referencing(&links.0),
            )?;
            Some((topic, topic_policy))
        } else {
            None
        };

        let topic_arn = match &created {
            Some((topic, _)) => topic.reference("arn"),
            None => spec.notifications.sns_topic_arn.clone().unwrap_or_default(),
        };

        let pipeline = id(ResourceKind::Pipeline, "main");
        for scope in NotificationScope::ALL {
            let empty = match scope {
                NotificationScope::Pipeline => spec.notifications.pipeline_states.is_empty(),
                NotificationScope::Stage => spec.notifications.stage_states.is_empty(),
            };
            if empty {
                continue;
            }

            let rule = self.insert(
                ResourceNode::new(
                    ResourceKind::EventRule,
                    scope.node_name(),
                    json!({
                        "name": named(DerivedName::EventRule, &spec.name, scope.rule_suffix())?,
                        "event_pattern": event_pattern(scope, spec),
                    }),
                )
                .depends_on(&pipeline),
            )?;

            let mut links = Links::default();
            let arn = match &created {
                Some((topic, _)) => links.to(topic, "arn"),
                None => topic_arn.clone(),
            };
            let mut target = ResourceNode::new(
                ResourceKind::EventTarget,
                scope.node_name(),
                json!({
                    "rule": links.to(&rule, "name"),
                    "target_id": "sns",
                    "arn": arn,
                    "input_transformer": input_transformer(scope),
                }),
            )
            .depends_on(&rule);
            if let Some((topic, topic_policy)) = &created {
                target = target.depends_on(topic).depends_on(topic_policy);
            }
            self.insert(target.referencing(&links.0))?;
        }

        Ok(Some(topic_arn))
    }

    /// GitHub webhook; returns its URL reference
    fn webhook(&mut self, features: &FeatureSet) -> Result<Option<String>, BuildError> {
        let spec = self.spec;
        let SourceConfig::GitHub {
            branch,
            webhook_secret: Some(secret),
            ..
        } = &spec.source
        else {
            return Ok(None);
        };
        if !features.include_webhook {
            return Ok(None);
        }

        let pipeline = id(ResourceKind::Pipeline, "main");
        let mut links = Links::default();
        let attributes = json!({
            "name": named(DerivedName::Webhook, &spec.name, WEBHOOK_SUFFIX)?,
            "target_pipeline": links.to(&pipeline, "name"),
            "target_action": "Source",
            "authentication": "GITHUB_HMAC",
            "authentication_configuration": { "secret_token": secret.expose() },
            "filters": [{
                "json_path": "$.ref",
                "match_equals": format!("refs/heads/{branch}"),
            }],
        });
        let webhook = self.insert(
            ResourceNode::new(ResourceKind::Webhook, "github", attributes)
                .depends_on(&pipeline)
                .referencing(&links.0),
        )?;
        Ok(Some(webhook.reference("url")))
    }
}

fn truncate_name(name: &str) -> &str {
    crate::naming::truncate(name, crate::naming::ROLE_PREFIX_SOURCE_MAX)
}
