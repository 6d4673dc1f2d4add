//! Testing utilities for the pipegraph workspace
//!
//! Shared pipeline documents covering each source variant and deployment
//! strategy. Every fixture passes validation as returned.

#![allow(missing_docs)]

pub mod fixtures {
    use pipegraph_model::document::{
        AccountDocument, ArtifactStoreDocument, CodeDeployDocument, DeployDocument,
        EcsTargetDocument, LoadBalancerDocument, SourceDocument, VpcDocument,
    };
    use pipegraph_model::{AccountContext, PipelineDocument};
    use std::collections::BTreeMap;

    pub const REGION: &str = "us-east-1";
    pub const ACCOUNT_ID: &str = "123456789012";
    pub const CONNECTION_ARN: &str =
        "arn:aws:codestar-connections:us-east-1:123456789012:connection/0f1e2d3c";
    pub const LISTENER_ARN: &str =
        "arn:aws:elasticloadbalancing:us-east-1:123456789012:listener/app/orders/50dc6c495c0c9188/f2f7dc8efc522ab2";
    pub const TEST_LISTENER_ARN: &str =
        "arn:aws:elasticloadbalancing:us-east-1:123456789012:listener/app/orders/50dc6c495c0c9188/0467ef3c8400ae65";
    pub const TOPIC_ARN: &str = "arn:aws:sns:us-east-1:123456789012:ops-alerts";
    pub const TASK_ROLE_ARN: &str = "arn:aws:iam::123456789012:role/orders-task";
    pub const EXECUTION_ROLE_ARN: &str = "arn:aws:iam::123456789012:role/orders-task-execution";
    pub const KMS_KEY_ARN: &str =
        "arn:aws:kms:us-east-1:123456789012:key/1234abcd-12ab-34cd-56ef-1234567890ab";

    pub fn account() -> AccountContext {
        AccountContext::new(REGION, ACCOUNT_ID)
    }

    fn base(source: SourceDocument) -> PipelineDocument {
        PipelineDocument {
            name: "orders".to_string(),
            build_project_name: "orders-build".to_string(),
            account: AccountDocument {
                partition: "aws".to_string(),
                region: REGION.to_string(),
                account_id: ACCOUNT_ID.to_string(),
            },
            artifact_store: ArtifactStoreDocument {
                bucket: "orders-artifacts".to_string(),
                kms_key_arn: None,
                force_destroy: false,
            },
            source,
            deploy: DeployDocument {
                provider: "ECS".to_string(),
                configuration: BTreeMap::from([
                    ("ClusterName".to_string(), "prod".to_string()),
                    ("ServiceName".to_string(), "orders".to_string()),
                    ("FileName".to_string(), "imagedefinitions.json".to_string()),
                ]),
            },
            deployment_type: "ecs".to_string(),
            tags: BTreeMap::from([("team".to_string(), "payments".to_string())]),
            ..PipelineDocument::default()
        }
    }

    /// S3 source, ECS deploy
    pub fn s3_ecs() -> PipelineDocument {
        base(SourceDocument {
            provider: "S3".to_string(),
            bucket: Some("orders-source".to_string()),
            key: Some("releases/orders.zip".to_string()),
            ..SourceDocument::default()
        })
    }

    /// GitHub OAuth source with a webhook, ECS deploy
    pub fn github_webhook_ecs() -> PipelineDocument {
        base(SourceDocument {
            provider: "GitHub".to_string(),
            owner: Some("acme".to_string()),
            repo: Some("orders".to_string()),
            branch: Some("main".to_string()),
            oauth_token: Some("{{resolve:secretsmanager:github-token}}".to_string()),
            webhook_secret: Some("{{resolve:secretsmanager:github-webhook}}".to_string()),
            ..SourceDocument::default()
        })
    }

    /// GitHub connection source, ECS deploy
    pub fn github_v2_ecs() -> PipelineDocument {
        base(SourceDocument {
            provider: "GitHubV2".to_string(),
            owner: Some("acme".to_string()),
            repo: Some("orders".to_string()),
            branch: Some("main".to_string()),
            connection_arn: Some(CONNECTION_ARN.to_string()),
            ..SourceDocument::default()
        })
    }

    /// GitHub connection source, CodeDeploy ECS blue/green with a created application
    pub fn codedeploy_ecs_blue_green() -> PipelineDocument {
        let mut doc = github_v2_ecs();
        doc.deployment_type = "codedeploy".to_string();
        doc.create_code_deploy_app = true;
        doc.deploy = DeployDocument {
            provider: "CodeDeployToECS".to_string(),
            configuration: BTreeMap::from([
                ("ApplicationName".to_string(), "orders-app".to_string()),
                ("DeploymentGroupName".to_string(), "orders-dg".to_string()),
                ("TaskDefinitionTemplateArtifact".to_string(), "build_output".to_string()),
                ("AppSpecTemplateArtifact".to_string(), "build_output".to_string()),
            ]),
        };
        doc.code_deploy = Some(CodeDeployDocument {
            app_name: "orders-app".to_string(),
            deployment_group_name: "orders-dg".to_string(),
            compute_platform: "ECS".to_string(),
            deployment_type: "BLUE_GREEN".to_string(),
            deployment_option: "WITH_TRAFFIC_CONTROL".to_string(),
            ecs_target: Some(EcsTargetDocument {
                cluster_name: "prod".to_string(),
                service_name: "orders".to_string(),
            }),
            load_balancer: Some(LoadBalancerDocument {
                listener_arns: vec![LISTENER_ARN.to_string()],
                test_listener_arns: vec![TEST_LISTENER_ARN.to_string()],
                target_group_names: vec!["orders-blue".to_string(), "orders-green".to_string()],
            }),
            task_role_arns: vec![TASK_ROLE_ARN.to_string(), EXECUTION_ROLE_ARN.to_string()],
            ..CodeDeployDocument::default()
        });
        doc
    }

    /// S3 source, CodeDeploy to an existing EC2 application
    pub fn s3_codedeploy_existing_app() -> PipelineDocument {
        let mut doc = s3_ecs();
        doc.deployment_type = "codedeploy".to_string();
        doc.deploy = DeployDocument {
            provider: "CodeDeploy".to_string(),
            configuration: BTreeMap::from([
                ("ApplicationName".to_string(), "legacy-app".to_string()),
                ("DeploymentGroupName".to_string(), "legacy-dg".to_string()),
            ]),
        };
        doc
    }

    /// Notifications to a created topic
    pub fn with_created_topic(mut doc: PipelineDocument) -> PipelineDocument {
        doc.enable_notifications = true;
        doc.create_sns_topic = true;
        doc.notifications.topic_name = Some(format!("{}-notifications", doc.name));
        doc
    }

    /// Build inside a VPC
    pub fn with_vpc(mut doc: PipelineDocument) -> PipelineDocument {
        doc.vpc = Some(VpcDocument {
            vpc_id: "vpc-0a1b2c3d".to_string(),
            subnet_ids: vec!["subnet-11111111".to_string(), "subnet-22222222".to_string()],
            security_group_ids: vec!["sg-33333333".to_string()],
        });
        doc
    }

    /// Every fixture, labelled
    pub fn all() -> Vec<(&'static str, PipelineDocument)> {
        vec![
            ("s3_ecs", s3_ecs()),
            ("github_webhook_ecs", github_webhook_ecs()),
            ("github_v2_ecs", github_v2_ecs()),
            ("codedeploy_ecs_blue_green", codedeploy_ecs_blue_green()),
            ("s3_codedeploy_existing_app", s3_codedeploy_existing_app()),
            ("notifications", with_created_topic(s3_ecs())),
            ("vpc", with_vpc(github_v2_ecs())),
        ]
    }
}
