//! Build role fragments

use super::{always, Fragment, FragmentContext};
use crate::config::NetworkInterfaceScope;
use pipegraph_model::policy::PolicyStatement;

pub(super) const FRAGMENTS: &[Fragment] = &[
    Fragment {
        name: "build-logs",
        gate: always,
        emit: build_logs,
    },
    Fragment {
        name: "artifact-store",
        gate: always,
        emit: artifact_store,
    },
    Fragment {
        name: "build-reports",
        gate: always,
        emit: build_reports,
    },
    Fragment {
        name: "vpc",
        gate: |ctx| ctx.features.include_vpc_policy,
        emit: vpc,
    },
    Fragment {
        name: "ecr-push",
        gate: |ctx| ctx.features.include_ecs_iam_grants || ctx.features.include_code_deploy_ecs_grants,
        emit: ecr_push,
    },
    Fragment {
        name: "kms",
        gate: |ctx| ctx.features.include_kms_grant,
        emit: kms,
    },
];

fn build_logs(ctx: &FragmentContext<'_>) -> Vec<PolicyStatement> {
    let group = ctx.spec.account.log_group_arn(&ctx.spec.build_log_group_name());
    vec![PolicyStatement::allow([
        "logs:CreateLogGroup",
        "logs:CreateLogStream",
        "logs:PutLogEvents",
    ])
    .on([group.clone(), format!("{group}:*")])]
}

fn artifact_store(ctx: &FragmentContext<'_>) -> Vec<PolicyStatement> {
    let bucket = ctx.spec.artifact_bucket_arn();
    vec![PolicyStatement::allow([
        "s3:GetBucketAcl",
        "s3:GetBucketLocation",
        "s3:GetObject",
        "s3:GetObjectVersion",
        "s3:PutObject",
    ])
    .on([bucket.clone(), format!("{bucket}/*")])]
}

fn build_reports(ctx: &FragmentContext<'_>) -> Vec<PolicyStatement> {
    vec![PolicyStatement::allow([
        "codebuild:BatchPutCodeCoverages",
        "codebuild:BatchPutTestCases",
        "codebuild:CreateReport",
        "codebuild:CreateReportGroup",
        "codebuild:UpdateReport",
    ])
    .on([ctx.spec.account.codebuild_report_group_arn(&ctx.spec.build_project_name)])]
}

fn vpc(ctx: &FragmentContext<'_>) -> Vec<PolicyStatement> {
    let Some(vpc) = &ctx.spec.vpc else {
        return Vec::new();
    };
    let account = &ctx.spec.account;

    let interfaces = PolicyStatement::allow([
        "ec2:CreateNetworkInterface",
        "ec2:DeleteNetworkInterface",
        "ec2:DescribeDhcpOptions",
        "ec2:DescribeNetworkInterfaces",
        "ec2:DescribeSecurityGroups",
        "ec2:DescribeSubnets",
        "ec2:DescribeVpcs",
    ])
    .on(["*"]);

    let permission = PolicyStatement::allow(["ec2:CreateNetworkInterfacePermission"])
        .on([account.network_interface_arn()]);
    let permission = match ctx.config.network_interface_scope {
        NetworkInterfaceScope::SubnetScoped => permission
            .when(
                "StringEquals",
                "ec2:Subnet",
                vpc.subnet_ids.iter().map(|id| account.subnet_arn(id)),
            )
            .when(
                "StringEquals",
                "ec2:AuthorizedService",
                [account.service_principal("codebuild")],
            ),
        NetworkInterfaceScope::Unscoped => permission,
    };

    vec![interfaces, permission]
}

fn ecr_push(ctx: &FragmentContext<'_>) -> Vec<PolicyStatement> {
    vec![
        PolicyStatement::allow(["ecr:GetAuthorizationToken"]).on(["*"]),
        PolicyStatement::allow([
            "ecr:BatchCheckLayerAvailability",
            "ecr:BatchGetImage",
            "ecr:CompleteLayerUpload",
            "ecr:GetDownloadUrlForLayer",
            "ecr:InitiateLayerUpload",
            "ecr:PutImage",
            "ecr:UploadLayerPart",
        ])
        .on([ctx.spec.account.arn("ecr", "repository/*")]),
    ]
}

/// Data-key access on the artifact store key; shared with the pipeline role
pub(super) fn kms(ctx: &FragmentContext<'_>) -> Vec<PolicyStatement> {
    let Some(key) = &ctx.spec.artifact_store.kms_key_arn else {
        return Vec::new();
    };
    vec![PolicyStatement::allow([
        "kms:Decrypt",
        "kms:DescribeKey",
        "kms:Encrypt",
        "kms:GenerateDataKey*",
        "kms:ReEncrypt*",
    ])
    .on([key.clone()])]
}

#[cfg(test)]
mod tests {
    use crate::config::{CompilerConfig, NetworkInterfaceScope};
    use crate::features::resolve;
    use crate::iam::IamPolicyComposer;
    use crate::naming::RoleKind;
    use crate::validator::ConfigValidator;
    use pipegraph_model::{PipelineDocument, PolicyDocument};
    use pipegraph_test_utils::fixtures;
    use pretty_assertions::assert_eq;

    fn build_policy(doc: &PipelineDocument, config: CompilerConfig) -> PolicyDocument {
        let spec = ConfigValidator::new().lower(doc).unwrap();
        IamPolicyComposer::new(config).compose(RoleKind::Build, &spec, &resolve(&spec))
    }

    #[test]
    fn logs_scoped_to_project_log_group() {
        let policy = build_policy(&fixtures::s3_ecs(), CompilerConfig::new());
        let logs = policy.from_origin("build-logs").next().unwrap();
        assert_eq!(
            logs.resources,
            vec![
                "arn:aws:logs:us-east-1:123456789012:log-group:/aws/codebuild/orders-build".to_string(),
                "arn:aws:logs:us-east-1:123456789012:log-group:/aws/codebuild/orders-build:*"
                    .to_string(),
            ]
        );
    }

    #[test]
    fn no_vpc_grants_without_vpc() {
        let policy = build_policy(&fixtures::s3_ecs(), CompilerConfig::new());
        assert!(!policy.grants("ec2:CreateNetworkInterfacePermission"));
    }

    #[test]
    fn network_interface_permission_scoped_to_subnets() {
        let policy = build_policy(&fixtures::with_vpc(fixtures::s3_ecs()), CompilerConfig::new());
        let permission = policy
            .granting("ec2:CreateNetworkInterfacePermission")
            .next()
            .unwrap();
        assert_eq!(
            permission.condition.values("StringEquals", "ec2:Subnet"),
            Some(
                &[
                    "arn:aws:ec2:us-east-1:123456789012:subnet/subnet-11111111".to_string(),
                    "arn:aws:ec2:us-east-1:123456789012:subnet/subnet-22222222".to_string(),
                ][..]
            )
        );
        assert_eq!(
            permission.condition.values("StringEquals", "ec2:AuthorizedService"),
            Some(&["codebuild.amazonaws.com".to_string()][..])
        );
    }

    #[test]
    fn unscoped_network_interface_permission() {
        let config = CompilerConfig::new().with_network_interface_scope(NetworkInterfaceScope::Unscoped);
        let policy = build_policy(&fixtures::with_vpc(fixtures::s3_ecs()), config);
        let permission = policy
            .granting("ec2:CreateNetworkInterfacePermission")
            .next()
            .unwrap();
        assert!(permission.condition.is_empty());
    }

    #[test]
    fn kms_grant_follows_key() {
        let mut doc = fixtures::s3_ecs();
        doc.artifact_store.kms_key_arn = Some(fixtures::KMS_KEY_ARN.to_string());
        let policy = build_policy(&doc, CompilerConfig::new());
        let kms = policy.granting("kms:Decrypt").next().unwrap();
        assert_eq!(kms.resources, vec![fixtures::KMS_KEY_ARN.to_string()]);
    }
}
