//! CodeDeploy role fragments

use super::{always, Fragment, FragmentContext};
use pipegraph_model::policy::PolicyStatement;

pub(super) const FRAGMENTS: &[Fragment] = &[
    Fragment {
        name: "artifact-read",
        gate: always,
        emit: artifact_read,
    },
    Fragment {
        name: "codedeploy-ecs",
        gate: |ctx| ctx.features.include_code_deploy_ecs_grants,
        emit: codedeploy_ecs,
    },
    Fragment {
        name: "task-role-pass",
        gate: |ctx| ctx.features.include_task_role_pass_grant,
        emit: task_role_pass,
    },
];

fn artifact_read(ctx: &FragmentContext<'_>) -> Vec<PolicyStatement> {
    vec![PolicyStatement::allow(["s3:GetObject", "s3:GetObjectVersion"])
        .on([format!("{}/*", ctx.spec.artifact_bucket_arn())])]
}

// Blue/green shifts traffic across services the deployment does not own.
fn codedeploy_ecs(_: &FragmentContext<'_>) -> Vec<PolicyStatement> {
    vec![PolicyStatement::allow([
        "ecs:CreateTaskSet",
        "ecs:DeleteTaskSet",
        "ecs:DescribeServices",
        "ecs:UpdateServicePrimaryTaskSet",
        "elasticloadbalancing:DescribeListeners",
        "elasticloadbalancing:DescribeRules",
        "elasticloadbalancing:DescribeTargetGroups",
        "elasticloadbalancing:ModifyListener",
        "elasticloadbalancing:ModifyRule",
        "lambda:InvokeFunction",
        "cloudwatch:DescribeAlarms",
        "sns:Publish",
    ])
    .on(["*"])]
}

fn task_role_pass(ctx: &FragmentContext<'_>) -> Vec<PolicyStatement> {
    let roles = ctx
        .spec
        .code_deploy
        .as_ref()
        .map(|cd| cd.task_role_arns.clone())
        .unwrap_or_default();
    if roles.is_empty() {
        return Vec::new();
    }
    vec![PolicyStatement::allow(["iam:PassRole"]).on(roles)]
}
