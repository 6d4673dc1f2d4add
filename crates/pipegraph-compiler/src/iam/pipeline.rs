//! Pipeline role fragments

use super::{always, Fragment, FragmentContext};
use pipegraph_model::policy::PolicyStatement;
use pipegraph_model::spec::SourceConfig;

pub(super) const FRAGMENTS: &[Fragment] = &[
    Fragment {
        name: "artifact-store",
        gate: always,
        emit: artifact_store,
    },
    Fragment {
        name: "source-s3",
        gate: |ctx| ctx.features.include_s3_source_grant,
        emit: source_s3,
    },
    Fragment {
        name: "codestar-connection",
        gate: |ctx| ctx.features.include_connection_grant,
        emit: codestar_connection,
    },
    Fragment {
        name: "build",
        gate: always,
        emit: build,
    },
    Fragment {
        name: "ecs-deploy",
        gate: |ctx| ctx.features.include_ecs_iam_grants,
        emit: ecs_deploy,
    },
    Fragment {
        name: "codedeploy-deploy",
        gate: |ctx| ctx.features.include_code_deploy_pipeline_grants,
        emit: codedeploy_deploy,
    },
    Fragment {
        name: "kms",
        gate: |ctx| ctx.features.include_kms_grant,
        emit: super::build::kms,
    },
];

fn artifact_store(ctx: &FragmentContext<'_>) -> Vec<PolicyStatement> {
    let spec = ctx.spec;
    let bucket = spec.artifact_bucket_arn();
    vec![PolicyStatement::allow([
        "s3:GetBucketVersioning",
        "s3:GetObject",
        "s3:GetObjectVersion",
        "s3:PutObject",
        "s3:PutObjectAcl",
    ])
    .on([bucket.clone(), format!("{bucket}/*")])]
}

fn source_s3(ctx: &FragmentContext<'_>) -> Vec<PolicyStatement> {
    let SourceConfig::S3 { bucket, key } = &ctx.spec.source else {
        return Vec::new();
    };
    let account = &ctx.spec.account;
    vec![
        PolicyStatement::allow(["s3:GetBucketVersioning"]).on([account.s3_bucket_arn(bucket)]),
        PolicyStatement::allow(["s3:GetObject", "s3:GetObjectVersion"])
            .on([account.s3_object_arn(bucket, key)]),
    ]
}

fn codestar_connection(ctx: &FragmentContext<'_>) -> Vec<PolicyStatement> {
    match &ctx.spec.source {
        SourceConfig::GitHubV2 { connection_arn, .. } => {
            vec![PolicyStatement::allow(["codestar-connections:UseConnection"]).on([connection_arn.clone()])]
        }
        _ => Vec::new(),
    }
}

fn build(ctx: &FragmentContext<'_>) -> Vec<PolicyStatement> {
    vec![PolicyStatement::allow(["codebuild:BatchGetBuilds", "codebuild:StartBuild"])
        .on([ctx.spec.build_project_arn()])]
}

fn ecs_deploy(ctx: &FragmentContext<'_>) -> Vec<PolicyStatement> {
    let tasks = ctx.spec.account.service_principal("ecs-tasks");
    vec![
        PolicyStatement::allow([
            "ecs:DescribeServices",
            "ecs:DescribeTaskDefinition",
            "ecs:DescribeTasks",
            "ecs:ListTasks",
            "ecs:RegisterTaskDefinition",
            "ecs:TagResource",
            "ecs:UpdateService",
        ])
        .on(["*"]),
        PolicyStatement::allow(["iam:PassRole"])
            .on(["*"])
            .when("StringEquals", "iam:PassedToService", [tasks]),
    ]
}

fn codedeploy_deploy(ctx: &FragmentContext<'_>) -> Vec<PolicyStatement> {
    let spec = ctx.spec;
    let account = &spec.account;
    let configured = |key: &str| spec.deploy.configuration.get(key).cloned();

    let app = spec
        .code_deploy
        .as_ref()
        .map(|cd| cd.app_name.clone())
        .or_else(|| configured("ApplicationName"));
    let group = spec
        .code_deploy
        .as_ref()
        .map(|cd| cd.deployment_group_name.clone())
        .or_else(|| configured("DeploymentGroupName"));

    let resources = match (app, group) {
        (Some(app), Some(group)) => vec![
            account.codedeploy_application_arn(&app),
            account.codedeploy_group_arn(&app, &group),
        ],
        (Some(app), None) => vec![account.codedeploy_application_arn(&app)],
        _ => vec![account.codedeploy_application_arn("*")],
    };

    let mut statements = vec![
        PolicyStatement::allow([
            "codedeploy:CreateDeployment",
            "codedeploy:GetApplication",
            "codedeploy:GetApplicationRevision",
            "codedeploy:GetDeployment",
            "codedeploy:RegisterApplicationRevision",
        ])
        .on(resources),
        PolicyStatement::allow(["codedeploy:GetDeploymentConfig"]).on([account.codedeploy_config_arn()]),
    ];

    // CodeDeployToECS registers the task definition before handing over.
    if spec.deploy.provider.eq_ignore_ascii_case("CodeDeployToECS") {
        statements.push(PolicyStatement::allow(["ecs:RegisterTaskDefinition"]).on(["*"]));
        let task_roles = spec
            .code_deploy
            .as_ref()
            .map(|cd| cd.task_role_arns.clone())
            .unwrap_or_default();
        if !task_roles.is_empty() {
            statements.push(PolicyStatement::allow(["iam:PassRole"]).on(task_roles));
        }
    }
    statements
}

#[cfg(test)]
mod tests {
    use crate::config::CompilerConfig;
    use crate::features::resolve;
    use crate::iam::IamPolicyComposer;
    use crate::naming::RoleKind;
    use crate::validator::ConfigValidator;
    use pipegraph_model::{PipelineDocument, PolicyDocument};
    use pipegraph_test_utils::fixtures;
    use pretty_assertions::assert_eq;

    fn pipeline_policy(doc: &PipelineDocument) -> PolicyDocument {
        let spec = ConfigValidator::new().lower(doc).unwrap();
        IamPolicyComposer::new(CompilerConfig::new()).compose(RoleKind::Pipeline, &spec, &resolve(&spec))
    }

    #[test]
    fn s3_ecs_fragment_order() {
        let policy = pipeline_policy(&fixtures::s3_ecs());
        assert_eq!(
            policy.origins(),
            vec!["artifact-store", "source-s3", "build", "ecs-deploy"]
        );
        assert!(!policy.grants("codestar-connections:UseConnection"));
    }

    #[test]
    fn connection_grant_is_scoped_to_connection() {
        let policy = pipeline_policy(&fixtures::github_v2_ecs());
        let grants: Vec<_> = policy.granting("codestar-connections:UseConnection").collect();
        assert_eq!(grants.len(), 1);
        assert_eq!(grants[0].resources, vec![fixtures::CONNECTION_ARN.to_string()]);
    }

    #[test]
    fn ecs_pass_role_limited_to_ecs_tasks() {
        let policy = pipeline_policy(&fixtures::s3_ecs());
        let pass = policy.from_origin("ecs-deploy").find(|s| s.grants("iam:PassRole")).unwrap();
        assert_eq!(
            pass.condition.values("StringEquals", "iam:PassedToService"),
            Some(&["ecs-tasks.amazonaws.com".to_string()][..])
        );
    }

    #[test]
    fn codedeploy_grants_scoped_to_application() {
        let policy = pipeline_policy(&fixtures::s3_codedeploy_existing_app());
        let deploy = policy.granting("codedeploy:CreateDeployment").next().unwrap();
        assert_eq!(
            deploy.resources,
            vec![
                "arn:aws:codedeploy:us-east-1:123456789012:application:legacy-app".to_string(),
                "arn:aws:codedeploy:us-east-1:123456789012:deploymentgroup:legacy-app/legacy-dg"
                    .to_string(),
            ]
        );
        assert!(!policy.grants("ecs:UpdateService"));
    }

    #[test]
    fn codedeploy_to_ecs_passes_task_roles() {
        let policy = pipeline_policy(&fixtures::codedeploy_ecs_blue_green());
        let pass = policy.granting("iam:PassRole").next().unwrap();
        assert_eq!(
            pass.resources,
            vec![
                fixtures::TASK_ROLE_ARN.to_string(),
                fixtures::EXECUTION_ROLE_ARN.to_string()
            ]
        );
    }
}
