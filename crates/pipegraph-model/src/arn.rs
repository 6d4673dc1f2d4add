//! Account context and ARN formatting
//!
//! Every ARN the compiler pins a permission to is derived here, so the scope
//! of each grant is traceable to one function.

use serde::Serialize;

/// Partition, region and account the pipeline is compiled for
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountContext {
    /// ARN partition (`aws`, `aws-cn`, `aws-us-gov`)
    pub partition: String,
    /// Region code
    pub region: String,
    /// 12-digit account id
    pub account_id: String,
}

impl AccountContext {
    /// Create a context in the commercial partition
    #[must_use]
    pub fn new(region: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            partition: "aws".to_string(),
            region: region.into(),
            account_id: account_id.into(),
        }
    }

    /// Regional, account-scoped ARN
    #[must_use]
    pub fn arn(&self, service: &str, resource: &str) -> String {
        format!(
            "arn:{}:{}:{}:{}:{}",
            self.partition, service, self.region, self.account_id, resource
        )
    }

    /// S3 bucket ARN (global, no account)
    #[must_use]
    pub fn s3_bucket_arn(&self, bucket: &str) -> String {
        format!("arn:{}:s3:::{}", self.partition, bucket)
    }

    /// ARN of objects under a bucket prefix
    #[must_use]
    pub fn s3_object_arn(&self, bucket: &str, key: &str) -> String {
        format!("arn:{}:s3:::{}/{}", self.partition, bucket, key)
    }

    /// AWS-managed service-role policy ARN
    #[must_use]
    pub fn managed_policy_arn(&self, name: &str) -> String {
        format!("arn:{}:iam::aws:policy/service-role/{}", self.partition, name)
    }

    /// CodeBuild project ARN
    #[must_use]
    pub fn codebuild_project_arn(&self, project: &str) -> String {
        self.arn("codebuild", &format!("project/{project}"))
    }

    /// Wildcard over the report groups a project creates
    #[must_use]
    pub fn codebuild_report_group_arn(&self, project: &str) -> String {
        self.arn("codebuild", &format!("report-group/{project}-*"))
    }

    /// CodePipeline ARN
    #[must_use]
    pub fn codepipeline_arn(&self, pipeline: &str) -> String {
        self.arn("codepipeline", pipeline)
    }

    /// CloudWatch log group ARN
    #[must_use]
    pub fn log_group_arn(&self, group: &str) -> String {
        self.arn("logs", &format!("log-group:{group}"))
    }

    /// EC2 subnet ARN
    #[must_use]
    pub fn subnet_arn(&self, subnet_id: &str) -> String {
        self.arn("ec2", &format!("subnet/{subnet_id}"))
    }

    /// Wildcard over network interfaces in the account
    #[must_use]
    pub fn network_interface_arn(&self) -> String {
        self.arn("ec2", "network-interface/*")
    }

    /// CodeDeploy application ARN
    #[must_use]
    pub fn codedeploy_application_arn(&self, app: &str) -> String {
        self.arn("codedeploy", &format!("application:{app}"))
    }

    /// CodeDeploy deployment group ARN
    #[must_use]
    pub fn codedeploy_group_arn(&self, app: &str, group: &str) -> String {
        self.arn("codedeploy", &format!("deploymentgroup:{app}/{group}"))
    }

    /// Wildcard over deployment configurations
    #[must_use]
    pub fn codedeploy_config_arn(&self) -> String {
        self.arn("codedeploy", "deploymentconfig:*")
    }

    /// SNS topic ARN
    #[must_use]
    pub fn sns_topic_arn(&self, topic: &str) -> String {
        self.arn("sns", topic)
    }

    /// Service principal DNS suffix for the partition
    #[must_use]
    pub fn service_principal(&self, service: &str) -> String {
        match self.partition.as_str() {
            "aws-cn" => format!("{service}.amazonaws.com.cn"),
            _ => format!("{service}.amazonaws.com"),
        }
    }
}
