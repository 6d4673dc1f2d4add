//! Configuration validator
//!
//! Checks a [`PipelineDocument`] for internal consistency and lowers it into a
//! typed [`PipelineSpec`]. Every check runs; failures accumulate so a caller
//! sees the complete defect list in one pass. Checks run in a fixed order:
//!
//! 1. Closed enumerations and field schema
//! 2. Source variant field sets
//! 3. CodeDeploy requirements
//! 4. Blue/green and traffic control
//! 5. Notification and networking prerequisites
//! 6. Numeric bounds
//! 7. Role and topic names
//!
//! No spec is produced unless every check passes.

use crate::error::{ValidationError, ValidationErrorKind, ValidationErrors};
use crate::features::resolve;
use crate::naming::{derived_name, role_name_prefix, DerivedName, RoleKind, TOPIC_SUFFIX, WEBHOOK_SUFFIX};
use crate::notifications::NotificationScope;
use once_cell::sync::Lazy;
use pipegraph_model::code_deploy::{
    BlueGreenSettings, CodeDeployConfig, ComputePlatform, DeploymentOption, EcsTarget,
    LoadBalancerInfo, RollbackEvent, RollbackPolicy, TimeoutAction, TrafficDeploymentType,
};
use pipegraph_model::document::{CodeDeployDocument, PipelineDocument, SourceDocument};
use pipegraph_model::spec::{
    AdditionalPolicies, ArtifactStore, BuildConfig, ComputeType, DeployConfig, DeploymentType,
    EnvironmentType, FeatureFlags, NotificationConfig, PipelineSpec, PipelineState,
    SourceConfig, SourceKind, StageState, VpcConfig,
};
use pipegraph_model::{AccountContext, ClosedEnum, CredentialRef};
use regex::Regex;

use ValidationErrorKind::{ConflictingConfiguration, MissingDependentField, NameOverflow, SchemaError};

/// Blue fleet termination wait, minutes
pub const TERMINATION_WAIT_RANGE: std::ops::RangeInclusive<u32> = 0..=2880;

/// Build timeout, minutes
pub const BUILD_TIMEOUT_RANGE: std::ops::RangeInclusive<u32> = 5..=2160;

/// Retention values CloudWatch Logs accepts (0 keeps logs forever)
pub const LOG_RETENTION_DAYS: &[u32] = &[
    0, 1, 3, 5, 7, 14, 30, 60, 90, 120, 150, 180, 365, 400, 545, 731, 1096, 1827, 2192, 2557,
    2922, 3288, 3653,
];

const PARTITIONS: &[&str] = &["aws", "aws-cn", "aws-us-gov"];

static ACCOUNT_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{12}$").expect("account id pattern is valid"));
static REGION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z]{2}(-[a-z]+)+-[0-9]$").expect("region pattern is valid"));
static BUCKET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9][a-z0-9.-]{1,61}[a-z0-9]$").expect("bucket pattern is valid")
});
static TOPIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,256}$").expect("topic pattern is valid"));

/// Source fields by document name, for variant field-set checks
const SOURCE_FIELDS: &[&str] = &[
    "bucket",
    "key",
    "owner",
    "repo",
    "branch",
    "oauth_token",
    "webhook_secret",
    "connection_arn",
];

/// Document validator
///
/// Stateless; one instance can validate any number of documents, from any
/// number of threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigValidator;

impl ConfigValidator {
    /// Create validator
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Validate a document
    ///
    /// # Errors
    /// Returns every violation found, in check order
    pub fn validate(&self, doc: &PipelineDocument) -> Result<(), ValidationErrors> {
        self.lower(doc).map(|_| ())
    }

    /// Validate a document and lower it into a typed spec
    ///
    /// # Errors
    /// Returns every violation found, in check order
    pub fn lower(&self, doc: &PipelineDocument) -> Result<PipelineSpec, ValidationErrors> {
        let mut lowering = Lowering::new(doc);

        let enums = lowering.check_schema();
        let source = enums.source_kind.and_then(|kind| lowering.check_source(kind));
        lowering.check_code_deploy(&enums);
        let load_balancer = lowering.check_traffic(&enums);
        lowering.check_prerequisites();
        lowering.check_bounds();
        lowering.check_names();

        let errors_found = lowering.errors.len();
        tracing::debug!(pipeline = %doc.name, errors = errors_found, "validated document");

        if !lowering.errors.is_empty() {
            return Err(lowering.errors);
        }
        lowering.assemble(enums, source, load_balancer)
    }

    /// Re-check the invariants of an already typed spec
    ///
    /// Specs built directly in code bypass document validation; the graph
    /// builder runs this before constructing any node.
    #[must_use]
    pub fn check_spec(&self, spec: &PipelineSpec) -> ValidationErrors {
        let mut errors = ValidationErrors::new();

        for (field, name, role) in role_name_sources(spec) {
            if let Err(e) = role_name_prefix(name, role) {
                errors.push(ValidationError::new(field, NameOverflow, e.to_string()));
            }
        }

        let features = resolve(spec);
        let notifications = &spec.notifications;
        let rules = NotificationScope::ALL.into_iter().filter(|scope| {
            features.include_notification_rules
                && match scope {
                    NotificationScope::Pipeline => !notifications.pipeline_states.is_empty(),
                    NotificationScope::Stage => !notifications.stage_states.is_empty(),
                }
        });
        let derived = derived_name_sources(
            rules,
            features.include_sns_topic && notifications.topic_name.is_none(),
            features.include_webhook,
        );
        for error in derived_name_errors(&spec.name, &derived) {
            errors.push(error);
        }

        match (spec.flags.create_code_deploy_app, &spec.code_deploy) {
            (true, None) => errors.push(ValidationError::new(
                "code_deploy",
                MissingDependentField,
                "create_code_deploy_app is set but no CodeDeploy configuration is given",
            )),
            (false, Some(_)) => errors.push(ValidationError::new(
                "code_deploy",
                ConflictingConfiguration,
                "CodeDeploy configuration given while create_code_deploy_app is not set",
            )),
            _ => {}
        }

        if let Some(cd) = &spec.code_deploy {
            if cd.deployment_group_name.is_empty() {
                errors.push(ValidationError::new(
                    "code_deploy.deployment_group_name",
                    MissingDependentField,
                    "deployment group name is required",
                ));
            }
            if cd.compute_platform == ComputePlatform::Ecs && cd.ecs_target.is_none() {
                errors.push(ValidationError::new(
                    "code_deploy.ecs_target",
                    MissingDependentField,
                    "ECS compute platform requires an ECS target",
                ));
            }
            if cd.is_blue_green() {
                match &cd.load_balancer {
                    None => errors.push(ValidationError::new(
                        "code_deploy.load_balancer",
                        ConflictingConfiguration,
                        "BLUE_GREEN deployment requires load balancer info",
                    )),
                    Some(lb) if lb.listener_arns.is_empty() => errors.push(ValidationError::new(
                        "code_deploy.load_balancer.listener_arns",
                        MissingDependentField,
                        "at least one production listener is required",
                    )),
                    Some(_) => {}
                }
            }
        }

        if let SourceConfig::GitHubV2 { connection_arn, .. } = &spec.source {
            if connection_arn.is_empty() {
                errors.push(ValidationError::new(
                    "source.connection_arn",
                    MissingDependentField,
                    "GitHubV2 source requires a connection ARN",
                ));
            }
        }

        let has_topic_arn = spec
            .notifications
            .sns_topic_arn
            .as_deref()
            .is_some_and(|arn| !arn.is_empty());
        if spec.flags.enable_notifications && !spec.flags.create_sns_topic && !has_topic_arn {
            errors.push(ValidationError::new(
                "notifications.sns_topic_arn",
                ConflictingConfiguration,
                "notifications are enabled but no topic is created or referenced",
            ));
        }

        errors
    }
}

fn role_name_sources(spec: &PipelineSpec) -> Vec<(&'static str, &str, RoleKind)> {
    let mut sources = vec![
        ("name", spec.name.as_str(), RoleKind::Pipeline),
        ("build_project_name", spec.build_project_name.as_str(), RoleKind::Build),
    ];
    if let Some(cd) = &spec.code_deploy {
        sources.push(("code_deploy.app_name", cd.app_name.as_str(), RoleKind::Deploy));
    }
    sources
}

/// Resources named after the pipeline, with their name suffixes
fn derived_name_sources(
    rules: impl IntoIterator<Item = NotificationScope>,
    default_topic: bool,
    webhook: bool,
) -> Vec<(DerivedName, &'static str)> {
    let mut sources: Vec<_> = rules
        .into_iter()
        .map(|scope| (DerivedName::EventRule, scope.rule_suffix()))
        .collect();
    if default_topic {
        sources.push((DerivedName::Topic, TOPIC_SUFFIX));
    }
    if webhook {
        sources.push((DerivedName::Webhook, WEBHOOK_SUFFIX));
    }
    sources
}

fn derived_name_errors(name: &str, sources: &[(DerivedName, &'static str)]) -> Vec<ValidationError> {
    // An empty name is already reported by the role name check.
    if name.is_empty() {
        return Vec::new();
    }
    sources
        .iter()
        .filter_map(|&(kind, suffix)| {
            derived_name(kind, name, suffix).err().map(|e| {
                ValidationError::new(
                    "name",
                    NameOverflow,
                    format!("cannot derive {} name: {e}", kind.as_str()),
                )
            })
        })
        .collect()
}

/// Enumerations parsed in the schema pass
#[derive(Debug, Default)]
struct ParsedEnums {
    deployment_type: Option<DeploymentType>,
    source_kind: Option<SourceKind>,
    compute_type: Option<ComputeType>,
    environment_type: Option<EnvironmentType>,
    pipeline_states: Option<Vec<PipelineState>>,
    stage_states: Option<Vec<StageState>>,
    code_deploy: Option<CodeDeployEnums>,
}

#[derive(Debug, Default)]
struct CodeDeployEnums {
    compute_platform: Option<ComputePlatform>,
    deployment_type: Option<TrafficDeploymentType>,
    deployment_option: Option<DeploymentOption>,
    rollback_events: Option<Vec<RollbackEvent>>,
    action_on_timeout: Option<TimeoutAction>,
}

/// One lowering pass over one document
struct Lowering<'a> {
    doc: &'a PipelineDocument,
    errors: ValidationErrors,
}

impl<'a> Lowering<'a> {
    fn new(doc: &'a PipelineDocument) -> Self {
        Self {
            doc,
            errors: ValidationErrors::new(),
        }
    }

    fn fail(&mut self, field: impl Into<String>, kind: ValidationErrorKind, reason: impl Into<String>) {
        self.errors.push(ValidationError::new(field, kind, reason));
    }

    fn parse_enum<E: ClosedEnum>(&mut self, field: &str, value: &str) -> Option<E> {
        let parsed = E::parse(value);
        if parsed.is_none() {
            self.fail(
                field,
                SchemaError,
                format!("'{value}' is not one of: {}", E::allowed()),
            );
        }
        parsed
    }

    fn parse_enum_list<E: ClosedEnum>(&mut self, field: &str, values: &[String]) -> Option<Vec<E>> {
        let mut parsed = Vec::with_capacity(values.len());
        let mut complete = true;
        for (i, value) in values.iter().enumerate() {
            match self.parse_enum::<E>(&format!("{field}[{i}]"), value) {
                Some(v) if !parsed.contains(&v) => parsed.push(v),
                Some(_) => {}
                None => complete = false,
            }
        }
        complete.then_some(parsed)
    }

    fn relevant_code_deploy(&self) -> Option<&'a CodeDeployDocument> {
        if self.doc.create_code_deploy_app {
            self.doc.code_deploy.as_ref()
        } else {
            None
        }
    }

    // 1. Closed enumerations and field schema
    fn check_schema(&mut self) -> ParsedEnums {
        let doc = self.doc;
        let mut enums = ParsedEnums {
            deployment_type: self.parse_enum("deployment_type", &doc.deployment_type),
            source_kind: self.parse_enum("source.provider", &doc.source.provider),
            compute_type: self.parse_enum("build.compute_type", &doc.build.compute_type),
            environment_type: self.parse_enum("build.environment_type", &doc.build.environment_type),
            ..ParsedEnums::default()
        };

        if let Some(cd) = self.relevant_code_deploy() {
            let compute_platform = if cd.compute_platform.is_empty() {
                None
            } else {
                self.parse_enum("code_deploy.compute_platform", &cd.compute_platform)
            };
            enums.code_deploy = Some(CodeDeployEnums {
                compute_platform,
                deployment_type: self.parse_enum("code_deploy.deployment_type", &cd.deployment_type),
                deployment_option: self
                    .parse_enum("code_deploy.deployment_option", &cd.deployment_option),
                rollback_events: self.parse_enum_list("code_deploy.rollback.events", &cd.rollback.events),
                action_on_timeout: self
                    .parse_enum("code_deploy.action_on_timeout", &cd.action_on_timeout),
            });
        }

        enums.pipeline_states =
            self.parse_enum_list("notifications.pipeline_states", &doc.notifications.pipeline_states);
        enums.stage_states =
            self.parse_enum_list("notifications.stage_states", &doc.notifications.stage_states);

        if !PARTITIONS.contains(&doc.account.partition.as_str()) {
            self.fail(
                "account.partition",
                SchemaError,
                format!("'{}' is not one of: {}", doc.account.partition, PARTITIONS.join(", ")),
            );
        }
        if !REGION.is_match(&doc.account.region) {
            self.fail(
                "account.region",
                SchemaError,
                format!("'{}' is not a region code", doc.account.region),
            );
        }
        if !ACCOUNT_ID.is_match(&doc.account.account_id) {
            self.fail("account.account_id", SchemaError, "account id must be 12 digits");
        }
        if !BUCKET.is_match(&doc.artifact_store.bucket) {
            self.fail(
                "artifact_store.bucket",
                SchemaError,
                format!("'{}' is not a valid bucket name", doc.artifact_store.bucket),
            );
        }
        if let Some(key) = &doc.artifact_store.kms_key_arn {
            self.check_arn("artifact_store.kms_key_arn", key);
        }
        if doc.build.image.is_empty() {
            self.fail("build.image", SchemaError, "build image is required");
        }
        if doc.deploy.provider.is_empty() {
            self.fail("deploy.provider", SchemaError, "deploy provider is required");
        }

        let policies = &doc.additional_policy_arns;
        for (role, arns) in [
            ("pipeline", &policies.pipeline),
            ("build", &policies.build),
            ("deploy", &policies.deploy),
        ] {
            for (i, arn) in arns.iter().enumerate() {
                self.check_arn(&format!("additional_policy_arns.{role}[{i}]"), arn);
            }
        }
        if let Some(cd) = self.relevant_code_deploy() {
            for (i, arn) in cd.task_role_arns.iter().enumerate() {
                self.check_arn(&format!("code_deploy.task_role_arns[{i}]"), arn);
            }
        }

        enums
    }

    fn check_arn(&mut self, field: &str, value: &str) {
        if !value.starts_with("arn:") || value.split(':').count() < 6 {
            self.fail(field, SchemaError, format!("'{value}' is not an ARN"));
        }
    }

    // 2. Source variant field sets
    fn check_source(&mut self, kind: SourceKind) -> Option<SourceConfig> {
        let doc = self.doc;
        let source = &doc.source;
        let (required, optional): (&[&str], &[&str]) = match kind {
            SourceKind::S3 => (&["bucket", "key"], &[]),
            SourceKind::GitHub => (&["owner", "repo", "branch", "oauth_token"], &["webhook_secret"]),
            SourceKind::GitHubV2 => (&["owner", "repo", "branch", "connection_arn"], &[]),
        };

        let mut complete = true;
        for field in SOURCE_FIELDS {
            let present = source_field(source, field).is_some();
            if required.contains(field) {
                if !present {
                    complete = false;
                    self.fail(
                        format!("source.{field}"),
                        MissingDependentField,
                        format!("{} source requires {field}", kind.as_str()),
                    );
                }
            } else if !optional.contains(field) && present {
                complete = false;
                self.fail(
                    format!("source.{field}"),
                    ConflictingConfiguration,
                    format!("{field} does not apply to a {} source", kind.as_str()),
                );
            }
        }

        if let Some(arn) = source_field(source, "connection_arn") {
            if kind == SourceKind::GitHubV2 {
                self.check_arn("source.connection_arn", arn);
            }
        }

        if !complete {
            return None;
        }

        let value = |field: &str| source_field(source, field).unwrap_or_default().to_string();
        Some(match kind {
            SourceKind::S3 => SourceConfig::S3 {
                bucket: value("bucket"),
                key: value("key"),
            },
            SourceKind::GitHub => SourceConfig::GitHub {
                owner: value("owner"),
                repo: value("repo"),
                branch: value("branch"),
                oauth_token: CredentialRef::new(value("oauth_token")),
                webhook_secret: source_field(source, "webhook_secret").map(CredentialRef::new),
            },
            SourceKind::GitHubV2 => SourceConfig::GitHubV2 {
                owner: value("owner"),
                repo: value("repo"),
                branch: value("branch"),
                connection_arn: value("connection_arn"),
            },
        })
    }

    // 3. CodeDeploy requirements
    fn check_code_deploy(&mut self, enums: &ParsedEnums) {
        let doc = self.doc;
        match (doc.create_code_deploy_app, &doc.code_deploy) {
            (true, None) => self.fail(
                "code_deploy",
                MissingDependentField,
                "create_code_deploy_app requires a code_deploy block",
            ),
            (false, Some(_)) => self.fail(
                "code_deploy",
                ConflictingConfiguration,
                "code_deploy block given while create_code_deploy_app is false",
            ),
            (true, Some(cd)) => {
                for (field, value) in [
                    ("app_name", &cd.app_name),
                    ("deployment_group_name", &cd.deployment_group_name),
                    ("compute_platform", &cd.compute_platform),
                ] {
                    if value.is_empty() {
                        self.fail(
                            format!("code_deploy.{field}"),
                            MissingDependentField,
                            format!("create_code_deploy_app requires {field}"),
                        );
                    }
                }
                let platform = enums.code_deploy.as_ref().and_then(|e| e.compute_platform);
                if platform == Some(ComputePlatform::Ecs) {
                    match &cd.ecs_target {
                        None => self.fail(
                            "code_deploy.ecs_target",
                            MissingDependentField,
                            "ECS compute platform requires an ECS target",
                        ),
                        Some(target) => {
                            if target.cluster_name.is_empty() {
                                self.fail(
                                    "code_deploy.ecs_target.cluster_name",
                                    MissingDependentField,
                                    "ECS target requires a cluster name",
                                );
                            }
                            if target.service_name.is_empty() {
                                self.fail(
                                    "code_deploy.ecs_target.service_name",
                                    MissingDependentField,
                                    "ECS target requires a service name",
                                );
                            }
                        }
                    }
                }
            }
            (false, None) => {}
        }

        if enums.deployment_type == Some(DeploymentType::CodeDeploy) {
            let configuration = &doc.deploy.configuration;
            for key in ["ApplicationName", "DeploymentGroupName"] {
                if configuration.get(key).map_or(true, String::is_empty) {
                    self.fail(
                        format!("deploy.configuration.{key}"),
                        MissingDependentField,
                        format!("codedeploy deployment requires {key}"),
                    );
                }
            }
            if let Some(cd) = self.relevant_code_deploy() {
                for (key, expected) in [
                    ("ApplicationName", &cd.app_name),
                    ("DeploymentGroupName", &cd.deployment_group_name),
                ] {
                    match configuration.get(key) {
                        Some(actual) if !actual.is_empty() && actual != expected => self.fail(
                            format!("deploy.configuration.{key}"),
                            ConflictingConfiguration,
                            format!("'{actual}' does not match the created '{expected}'"),
                        ),
                        _ => {}
                    }
                }
            }
        }
    }

    // 4. Blue/green and traffic control
    fn check_traffic(&mut self, enums: &ParsedEnums) -> Option<LoadBalancerInfo> {
        let cd = self.relevant_code_deploy()?;
        let cd_enums = enums.code_deploy.as_ref()?;

        let blue_green = cd_enums.deployment_type == Some(TrafficDeploymentType::BlueGreen);
        if blue_green && cd.load_balancer.is_none() {
            self.fail(
                "code_deploy.load_balancer",
                ConflictingConfiguration,
                "BLUE_GREEN deployment requires load balancer info",
            );
        }

        if cd_enums.compute_platform == Some(ComputePlatform::Ecs) {
            if cd_enums.deployment_type == Some(TrafficDeploymentType::InPlace) {
                self.fail(
                    "code_deploy.deployment_type",
                    ConflictingConfiguration,
                    "ECS compute platform supports BLUE_GREEN deployments only",
                );
            }
            if blue_green && cd_enums.deployment_option == Some(DeploymentOption::WithoutTrafficControl) {
                self.fail(
                    "code_deploy.deployment_option",
                    ConflictingConfiguration,
                    "ECS blue/green deployments require WITH_TRAFFIC_CONTROL",
                );
            }
        }

        let lb = cd.load_balancer.as_ref()?;
        let mut valid = true;
        if lb.listener_arns.is_empty() {
            valid = false;
            self.fail(
                "code_deploy.load_balancer.listener_arns",
                MissingDependentField,
                "at least one production listener is required",
            );
        }
        for (i, arn) in lb.listener_arns.iter().chain(&lb.test_listener_arns).enumerate() {
            let before = self.errors.len();
            self.check_arn(&format!("code_deploy.load_balancer.listener_arns[{i}]"), arn);
            valid &= self.errors.len() == before;
        }
        let target_groups: Option<[String; 2]> = lb.target_group_names.clone().try_into().ok();
        if target_groups.is_none() {
            self.fail(
                "code_deploy.load_balancer.target_group_names",
                SchemaError,
                format!(
                    "exactly two target groups are required, got {}",
                    lb.target_group_names.len()
                ),
            );
        }
        if lb.target_group_names.iter().any(String::is_empty) {
            valid = false;
            self.fail(
                "code_deploy.load_balancer.target_group_names",
                SchemaError,
                "target group names must not be empty",
            );
        }

        let target_group_names = target_groups?;
        valid.then(|| LoadBalancerInfo {
            listener_arns: lb.listener_arns.clone(),
            test_listener_arns: lb.test_listener_arns.clone(),
            target_group_names,
        })
    }

    // 5. Notification and networking prerequisites
    fn check_prerequisites(&mut self) {
        let doc = self.doc;
        let topic_arn = doc
            .notifications
            .sns_topic_arn
            .as_deref()
            .filter(|arn| !arn.is_empty());

        if doc.enable_notifications && !doc.create_sns_topic && topic_arn.is_none() {
            self.fail(
                "notifications.sns_topic_arn",
                ConflictingConfiguration,
                "notifications are enabled but no topic is created or referenced",
            );
        }
        if doc.create_sns_topic {
            if topic_arn.is_some() {
                self.fail(
                    "notifications.sns_topic_arn",
                    ConflictingConfiguration,
                    "create_sns_topic and sns_topic_arn are mutually exclusive",
                );
            }
            if !doc.enable_notifications {
                tracing::warn!(
                    pipeline = %doc.name,
                    "create_sns_topic is set without enable_notifications; no topic will be created"
                );
            }
        }
        if let Some(arn) = topic_arn {
            self.check_arn("notifications.sns_topic_arn", arn);
        }

        if let Some(vpc) = &doc.vpc {
            if vpc.vpc_id.is_empty() {
                self.fail("vpc.vpc_id", MissingDependentField, "VPC configuration requires vpc_id");
            }
            if vpc.subnet_ids.is_empty() {
                self.fail(
                    "vpc.subnet_ids",
                    MissingDependentField,
                    "VPC configuration requires at least one subnet",
                );
            }
            if vpc.security_group_ids.is_empty() {
                self.fail(
                    "vpc.security_group_ids",
                    MissingDependentField,
                    "VPC configuration requires at least one security group",
                );
            }
        }
    }

    // 6. Numeric bounds
    fn check_bounds(&mut self) {
        let doc = self.doc;
        if let Some(cd) = self.relevant_code_deploy() {
            if !TERMINATION_WAIT_RANGE.contains(&cd.termination_wait_minutes) {
                self.fail(
                    "code_deploy.termination_wait_minutes",
                    SchemaError,
                    format!(
                        "{} is outside {}..={}",
                        cd.termination_wait_minutes,
                        TERMINATION_WAIT_RANGE.start(),
                        TERMINATION_WAIT_RANGE.end()
                    ),
                );
            }
        }
        if !BUILD_TIMEOUT_RANGE.contains(&doc.build.timeout_minutes) {
            self.fail(
                "build.timeout_minutes",
                SchemaError,
                format!(
                    "{} is outside {}..={}",
                    doc.build.timeout_minutes,
                    BUILD_TIMEOUT_RANGE.start(),
                    BUILD_TIMEOUT_RANGE.end()
                ),
            );
        }
        if !LOG_RETENTION_DAYS.contains(&doc.build.log_retention_days) {
            self.fail(
                "build.log_retention_days",
                SchemaError,
                format!("{} is not a CloudWatch retention value", doc.build.log_retention_days),
            );
        }
    }

    // 7. Role and topic names
    fn check_names(&mut self) {
        let doc = self.doc;
        let mut sources = vec![
            ("name", doc.name.as_str(), RoleKind::Pipeline),
            ("build_project_name", doc.build_project_name.as_str(), RoleKind::Build),
        ];
        if let Some(cd) = self.relevant_code_deploy() {
            if !cd.app_name.is_empty() {
                sources.push(("code_deploy.app_name", cd.app_name.as_str(), RoleKind::Deploy));
            }
        }
        for (field, name, role) in sources {
            if let Err(e) = role_name_prefix(name, role) {
                self.fail(field, NameOverflow, format!("cannot derive {role} role name: {e}"));
            }
        }

        let notifications = &doc.notifications;
        let rules = NotificationScope::ALL.into_iter().filter(|scope| {
            doc.enable_notifications
                && match scope {
                    NotificationScope::Pipeline => !notifications.pipeline_states.is_empty(),
                    NotificationScope::Stage => !notifications.stage_states.is_empty(),
                }
        });
        let webhook = doc.source.provider == SourceKind::GitHub.as_str()
            && doc.source.webhook_secret.as_deref().is_some_and(|s| !s.is_empty());
        let derived = derived_name_sources(
            rules,
            doc.enable_notifications && doc.create_sns_topic && notifications.topic_name.is_none(),
            webhook,
        );
        for error in derived_name_errors(&doc.name, &derived) {
            self.errors.push(error);
        }

        if let Some(topic) = &doc.notifications.topic_name {
            if !TOPIC.is_match(topic) {
                self.fail(
                    "notifications.topic_name",
                    NameOverflow,
                    format!("'{topic}' is not a legal topic name"),
                );
            }
        }
    }

    fn assemble(
        mut self,
        enums: ParsedEnums,
        source: Option<SourceConfig>,
        load_balancer: Option<LoadBalancerInfo>,
    ) -> Result<PipelineSpec, ValidationErrors> {
        let doc = self.doc;
        let (
            Some(deployment_type),
            Some(source),
            Some(compute_type),
            Some(environment_type),
            Some(pipeline_states),
            Some(stage_states),
        ) = (
            enums.deployment_type,
            source,
            enums.compute_type,
            enums.environment_type,
            enums.pipeline_states,
            enums.stage_states,
        )
        else {
            self.fail("", SchemaError, "document is incomplete");
            return Err(self.errors);
        };

        let code_deploy = match (self.relevant_code_deploy(), enums.code_deploy) {
            (Some(cd), Some(cd_enums)) => {
                let Some(config) = lower_code_deploy(cd, cd_enums, load_balancer) else {
                    self.fail("code_deploy", SchemaError, "code_deploy block is incomplete");
                    return Err(self.errors);
                };
                Some(config)
            }
            _ => None,
        };

        Ok(PipelineSpec {
            name: doc.name.clone(),
            build_project_name: doc.build_project_name.clone(),
            account: AccountContext {
                partition: doc.account.partition.clone(),
                region: doc.account.region.clone(),
                account_id: doc.account.account_id.clone(),
            },
            artifact_store: ArtifactStore {
                bucket: doc.artifact_store.bucket.clone(),
                kms_key_arn: doc.artifact_store.kms_key_arn.clone(),
                force_destroy: doc.artifact_store.force_destroy,
            },
            source,
            build: BuildConfig {
                compute_type,
                image: doc.build.image.clone(),
                environment_type,
                privileged_mode: doc.build.privileged_mode,
                buildspec: doc.build.buildspec.clone(),
                timeout_minutes: doc.build.timeout_minutes,
                environment_variables: doc.build.environment_variables.clone(),
                log_retention_days: doc.build.log_retention_days,
            },
            deploy: DeployConfig {
                provider: doc.deploy.provider.clone(),
                configuration: doc.deploy.configuration.clone(),
            },
            deployment_type,
            vpc: doc.vpc.as_ref().map(|vpc| VpcConfig {
                vpc_id: vpc.vpc_id.clone(),
                subnet_ids: vpc.subnet_ids.clone(),
                security_group_ids: vpc.security_group_ids.clone(),
            }),
            code_deploy,
            flags: FeatureFlags {
                create_code_deploy_app: doc.create_code_deploy_app,
                enable_notifications: doc.enable_notifications,
                create_sns_topic: doc.create_sns_topic,
            },
            notifications: NotificationConfig {
                sns_topic_arn: doc
                    .notifications
                    .sns_topic_arn
                    .clone()
                    .filter(|arn| !arn.is_empty()),
                topic_name: doc.notifications.topic_name.clone(),
                pipeline_states,
                stage_states,
            },
            additional_policy_arns: AdditionalPolicies {
                pipeline: doc.additional_policy_arns.pipeline.clone(),
                build: doc.additional_policy_arns.build.clone(),
                deploy: doc.additional_policy_arns.deploy.clone(),
            },
            tags: doc.tags.clone(),
        })
    }
}

fn lower_code_deploy(
    cd: &CodeDeployDocument,
    enums: CodeDeployEnums,
    load_balancer: Option<LoadBalancerInfo>,
) -> Option<CodeDeployConfig> {
    Some(CodeDeployConfig {
        app_name: cd.app_name.clone(),
        deployment_group_name: cd.deployment_group_name.clone(),
        compute_platform: enums.compute_platform?,
        deployment_type: enums.deployment_type?,
        deployment_option: enums.deployment_option?,
        deployment_config_name: cd.deployment_config_name.clone(),
        rollback: RollbackPolicy {
            enabled: cd.rollback.enabled,
            events: enums.rollback_events?,
        },
        ecs_target: cd.ecs_target.as_ref().map(|t| EcsTarget {
            cluster_name: t.cluster_name.clone(),
            service_name: t.service_name.clone(),
        }),
        load_balancer,
        blue_green: BlueGreenSettings {
            termination_wait_minutes: cd.termination_wait_minutes,
            action_on_timeout: enums.action_on_timeout?,
        },
        task_role_arns: cd.task_role_arns.clone(),
    })
}

/// Non-empty value of a source field
fn source_field<'s>(source: &'s SourceDocument, field: &str) -> Option<&'s str> {
    let value = match field {
        "bucket" => &source.bucket,
        "key" => &source.key,
        "owner" => &source.owner,
        "repo" => &source.repo,
        "branch" => &source.branch,
        "oauth_token" => &source.oauth_token,
        "webhook_secret" => &source.webhook_secret,
        "connection_arn" => &source.connection_arn,
        _ => return None,
    };
    value.as_deref().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipegraph_model::document::{EcsTargetDocument, LoadBalancerDocument, VpcDocument};
    use pipegraph_test_utils::fixtures;

    fn kinds(errors: &ValidationErrors) -> Vec<(&str, ValidationErrorKind)> {
        errors.iter().map(|e| (e.field.as_str(), e.kind)).collect()
    }

    #[test]
    fn valid_s3_ecs_document_lowers() {
        let spec = ConfigValidator::new().lower(&fixtures::s3_ecs()).unwrap();
        assert_eq!(spec.deployment_type, DeploymentType::Ecs);
        assert!(matches!(spec.source, SourceConfig::S3 { .. }));
        assert!(spec.code_deploy.is_none());
    }

    #[test]
    fn valid_blue_green_document_lowers() {
        let spec = ConfigValidator::new()
            .lower(&fixtures::codedeploy_ecs_blue_green())
            .unwrap();
        let cd = spec.code_deploy.unwrap();
        assert!(cd.is_blue_green());
        assert_eq!(cd.load_balancer.unwrap().target_group_names[1], "orders-green");
    }

    #[test]
    fn unknown_enums_are_schema_errors() {
        let mut doc = fixtures::s3_ecs();
        doc.deployment_type = "lambda".to_string();
        doc.source.provider = "Bitbucket".to_string();
        let errors = ConfigValidator::new().validate(&doc).unwrap_err();
        assert!(errors.has("deployment_type", SchemaError));
        assert!(errors.has("source.provider", SchemaError));
    }

    #[test]
    fn repeated_states_collapse_in_order() {
        let mut doc = fixtures::with_created_topic(fixtures::s3_ecs());
        doc.notifications.pipeline_states =
            ["FAILED", "SUCCEEDED", "FAILED"].map(String::from).to_vec();
        doc.notifications.stage_states = ["CANCELED", "CANCELED"].map(String::from).to_vec();
        let spec = ConfigValidator::new().lower(&doc).unwrap();
        assert_eq!(
            spec.notifications.pipeline_states,
            vec![PipelineState::Failed, PipelineState::Succeeded]
        );
        assert_eq!(spec.notifications.stage_states, vec![StageState::Canceled]);
    }

    #[test]
    fn foreign_source_fields_conflict() {
        let mut doc = fixtures::s3_ecs();
        doc.source.owner = Some("acme".to_string());
        doc.source.connection_arn = Some("arn:aws:codestar-connections:us-east-1:1:connection/x".to_string());
        let errors = ConfigValidator::new().validate(&doc).unwrap_err();
        assert_eq!(
            kinds(&errors),
            vec![
                ("source.owner", ConflictingConfiguration),
                ("source.connection_arn", ConflictingConfiguration),
            ]
        );
    }

    #[test]
    fn missing_variant_fields_reported() {
        let mut doc = fixtures::github_v2_ecs();
        doc.source.connection_arn = None;
        doc.source.branch = Some(String::new());
        let errors = ConfigValidator::new().validate(&doc).unwrap_err();
        assert!(errors.has("source.branch", MissingDependentField));
        assert!(errors.has("source.connection_arn", MissingDependentField));
    }

    #[test]
    fn code_deploy_block_requires_flag() {
        let mut doc = fixtures::s3_ecs();
        doc.code_deploy = fixtures::codedeploy_ecs_blue_green().code_deploy;
        let errors = ConfigValidator::new().validate(&doc).unwrap_err();
        assert!(errors.has("code_deploy", ConflictingConfiguration));
    }

    #[test]
    fn flag_requires_code_deploy_fields() {
        let mut doc = fixtures::codedeploy_ecs_blue_green();
        if let Some(cd) = doc.code_deploy.as_mut() {
            cd.app_name = String::new();
            cd.compute_platform = String::new();
        }
        let errors = ConfigValidator::new().validate(&doc).unwrap_err();
        assert!(errors.has("code_deploy.app_name", MissingDependentField));
        assert!(errors.has("code_deploy.compute_platform", MissingDependentField));
    }

    #[test]
    fn ecs_platform_requires_target() {
        let mut doc = fixtures::codedeploy_ecs_blue_green();
        if let Some(cd) = doc.code_deploy.as_mut() {
            cd.ecs_target = None;
        }
        let errors = ConfigValidator::new().validate(&doc).unwrap_err();
        assert_eq!(kinds(&errors), vec![("code_deploy.ecs_target", MissingDependentField)]);
    }

    #[test]
    fn ecs_target_fields_required() {
        let mut doc = fixtures::codedeploy_ecs_blue_green();
        if let Some(cd) = doc.code_deploy.as_mut() {
            cd.ecs_target = Some(EcsTargetDocument::default());
        }
        let errors = ConfigValidator::new().validate(&doc).unwrap_err();
        assert!(errors.has("code_deploy.ecs_target.cluster_name", MissingDependentField));
        assert!(errors.has("code_deploy.ecs_target.service_name", MissingDependentField));
    }

    #[test]
    fn blue_green_without_load_balancer_fails() {
        let mut doc = fixtures::codedeploy_ecs_blue_green();
        if let Some(cd) = doc.code_deploy.as_mut() {
            cd.load_balancer = None;
        }
        let errors = ConfigValidator::new().validate(&doc).unwrap_err();
        assert_eq!(
            kinds(&errors),
            vec![("code_deploy.load_balancer", ConflictingConfiguration)]
        );
    }

    #[test]
    fn blue_green_needs_exactly_two_target_groups() {
        let mut doc = fixtures::codedeploy_ecs_blue_green();
        if let Some(cd) = doc.code_deploy.as_mut() {
            cd.load_balancer = Some(LoadBalancerDocument {
                listener_arns: vec![fixtures::LISTENER_ARN.to_string()],
                test_listener_arns: Vec::new(),
                target_group_names: vec!["only-one".to_string()],
            });
        }
        let errors = ConfigValidator::new().validate(&doc).unwrap_err();
        assert!(errors.has("code_deploy.load_balancer.target_group_names", SchemaError));
    }

    #[test]
    fn ecs_platform_rejects_in_place() {
        let mut doc = fixtures::codedeploy_ecs_blue_green();
        if let Some(cd) = doc.code_deploy.as_mut() {
            cd.deployment_type = "IN_PLACE".to_string();
        }
        let errors = ConfigValidator::new().validate(&doc).unwrap_err();
        assert!(errors.has("code_deploy.deployment_type", ConflictingConfiguration));
    }

    #[test]
    fn deploy_configuration_must_match_created_app() {
        let mut doc = fixtures::codedeploy_ecs_blue_green();
        doc.deploy
            .configuration
            .insert("ApplicationName".to_string(), "someone-else".to_string());
        let errors = ConfigValidator::new().validate(&doc).unwrap_err();
        assert!(errors.has("deploy.configuration.ApplicationName", ConflictingConfiguration));
    }

    #[test]
    fn notifications_without_topic_conflict() {
        let mut doc = fixtures::s3_ecs();
        doc.enable_notifications = true;
        doc.create_sns_topic = false;
        doc.notifications.sns_topic_arn = Some(String::new());
        let errors = ConfigValidator::new().validate(&doc).unwrap_err();
        assert_eq!(
            kinds(&errors),
            vec![("notifications.sns_topic_arn", ConflictingConfiguration)]
        );
    }

    #[test]
    fn created_and_referenced_topic_conflict() {
        let mut doc = fixtures::s3_ecs();
        doc.enable_notifications = true;
        doc.create_sns_topic = true;
        doc.notifications.sns_topic_arn = Some(fixtures::TOPIC_ARN.to_string());
        let errors = ConfigValidator::new().validate(&doc).unwrap_err();
        assert!(errors.has("notifications.sns_topic_arn", ConflictingConfiguration));
    }

    #[test]
    fn vpc_requires_subnets_and_groups() {
        let mut doc = fixtures::s3_ecs();
        doc.vpc = Some(VpcDocument {
            vpc_id: "vpc-1".to_string(),
            subnet_ids: Vec::new(),
            security_group_ids: Vec::new(),
        });
        let errors = ConfigValidator::new().validate(&doc).unwrap_err();
        assert!(errors.has("vpc.subnet_ids", MissingDependentField));
        assert!(errors.has("vpc.security_group_ids", MissingDependentField));
    }

    #[test]
    fn numeric_bounds() {
        let mut doc = fixtures::codedeploy_ecs_blue_green();
        doc.build.timeout_minutes = 1;
        doc.build.log_retention_days = 42;
        if let Some(cd) = doc.code_deploy.as_mut() {
            cd.termination_wait_minutes = 2881;
        }
        let errors = ConfigValidator::new().validate(&doc).unwrap_err();
        assert_eq!(
            kinds(&errors),
            vec![
                ("code_deploy.termination_wait_minutes", SchemaError),
                ("build.timeout_minutes", SchemaError),
                ("build.log_retention_days", SchemaError),
            ]
        );
    }

    #[test]
    fn empty_names_overflow() {
        let mut doc = fixtures::s3_ecs();
        doc.name = String::new();
        doc.build_project_name = "has spaces".to_string();
        let errors = ConfigValidator::new().validate(&doc).unwrap_err();
        assert_eq!(
            kinds(&errors),
            vec![("name", NameOverflow), ("build_project_name", NameOverflow)]
        );
    }

    #[test]
    fn errors_accumulate_in_check_order() {
        let mut doc = fixtures::s3_ecs();
        doc.deployment_type = "nope".to_string();
        doc.source.key = None;
        doc.enable_notifications = true;
        doc.build.timeout_minutes = 0;
        doc.name = String::new();
        let errors = ConfigValidator::new().validate(&doc).unwrap_err();
        assert_eq!(
            kinds(&errors),
            vec![
                ("deployment_type", SchemaError),
                ("source.key", MissingDependentField),
                ("notifications.sns_topic_arn", ConflictingConfiguration),
                ("build.timeout_minutes", SchemaError),
                ("name", NameOverflow),
            ]
        );
    }

    #[test]
    fn long_names_are_accepted() {
        let mut doc = fixtures::s3_ecs();
        doc.name = "x".repeat(100);
        assert!(ConfigValidator::new().validate(&doc).is_ok());
    }

    #[test]
    fn long_names_with_notifications_are_accepted() {
        let mut doc = fixtures::with_created_topic(fixtures::s3_ecs());
        doc.name = "a".repeat(80);
        assert!(ConfigValidator::new().validate(&doc).is_ok());
    }

    #[test]
    fn derived_topic_name_must_be_legal() {
        let mut doc = fixtures::with_created_topic(fixtures::s3_ecs());
        doc.name = "orders.v2".to_string();
        doc.notifications.topic_name = None;
        let errors = ConfigValidator::new().validate(&doc).unwrap_err();
        assert_eq!(kinds(&errors), vec![("name", NameOverflow)]);
        assert!(errors.iter().next().unwrap().reason.contains("topic"));

        doc.notifications.topic_name = Some("orders-v2-alerts".to_string());
        assert!(ConfigValidator::new().validate(&doc).is_ok());
    }

    #[test]
    fn derived_rule_names_must_be_legal() {
        let mut doc = fixtures::s3_ecs();
        doc.name = "orders+v2".to_string();
        doc.enable_notifications = true;
        doc.notifications.sns_topic_arn = Some(fixtures::TOPIC_ARN.to_string());
        let errors = ConfigValidator::new().validate(&doc).unwrap_err();
        assert_eq!(kinds(&errors), vec![("name", NameOverflow), ("name", NameOverflow)]);

        doc.enable_notifications = false;
        doc.notifications.sns_topic_arn = None;
        assert!(ConfigValidator::new().validate(&doc).is_ok());
    }

    #[test]
    fn check_spec_rechecks_derived_names() {
        let mut spec = ConfigValidator::new()
            .lower(&fixtures::with_created_topic(fixtures::s3_ecs()))
            .unwrap();
        spec.name = "orders,v2".to_string();
        assert!(ConfigValidator::new().check_spec(&spec).has("name", NameOverflow));
    }

    #[test]
    fn check_spec_catches_hand_built_inconsistency() {
        let mut spec = ConfigValidator::new().lower(&fixtures::s3_ecs()).unwrap();
        spec.flags.create_code_deploy_app = true;
        spec.flags.enable_notifications = true;
        let errors = ConfigValidator::new().check_spec(&spec);
        assert!(errors.has("code_deploy", MissingDependentField));
        assert!(errors.has("notifications.sns_topic_arn", ConflictingConfiguration));
    }
}
