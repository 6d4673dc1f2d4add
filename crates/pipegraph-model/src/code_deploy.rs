//! CodeDeploy application and deployment group configuration

use crate::enums::ClosedEnum;
use serde::Serialize;

/// Compute platform of the CodeDeploy application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[allow(missing_docs)]
pub enum ComputePlatform {
    #[serde(rename = "Server")]
    Ec2,
    Lambda,
    #[serde(rename = "ECS")]
    Ecs,
}

impl ComputePlatform {
    /// Value of the application's `compute_platform` attribute
    #[must_use]
    pub fn platform_value(self) -> &'static str {
        match self {
            Self::Ec2 => "Server",
            Self::Lambda => "Lambda",
            Self::Ecs => "ECS",
        }
    }

    /// Managed service-role policy for this platform
    #[must_use]
    pub fn managed_policy(self) -> &'static str {
        match self {
            Self::Ec2 => "AWSCodeDeployRole",
            Self::Lambda => "AWSCodeDeployRoleForLambda",
            Self::Ecs => "AWSCodeDeployRoleForECS",
        }
    }
}

impl ClosedEnum for ComputePlatform {
    const ALL: &'static [Self] = &[Self::Ec2, Self::Lambda, Self::Ecs];

    fn as_str(self) -> &'static str {
        match self {
            Self::Ec2 => "EC2",
            Self::Lambda => "Lambda",
            Self::Ecs => "ECS",
        }
    }
}

/// In-place or blue/green
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[allow(missing_docs)]
pub enum TrafficDeploymentType {
    InPlace,
    BlueGreen,
}

impl ClosedEnum for TrafficDeploymentType {
    const ALL: &'static [Self] = &[Self::InPlace, Self::BlueGreen];

    fn as_str(self) -> &'static str {
        match self {
            Self::InPlace => "IN_PLACE",
            Self::BlueGreen => "BLUE_GREEN",
        }
    }
}

/// Whether traffic is routed through a load balancer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[allow(missing_docs)]
pub enum DeploymentOption {
    WithTrafficControl,
    WithoutTrafficControl,
}

impl ClosedEnum for DeploymentOption {
    const ALL: &'static [Self] = &[Self::WithTrafficControl, Self::WithoutTrafficControl];

    fn as_str(self) -> &'static str {
        match self {
            Self::WithTrafficControl => "WITH_TRAFFIC_CONTROL",
            Self::WithoutTrafficControl => "WITHOUT_TRAFFIC_CONTROL",
        }
    }
}

/// Events that trigger an automatic rollback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[allow(missing_docs)]
pub enum RollbackEvent {
    DeploymentFailure,
    DeploymentStopOnAlarm,
    DeploymentStopOnRequest,
}

impl ClosedEnum for RollbackEvent {
    const ALL: &'static [Self] = &[
        Self::DeploymentFailure,
        Self::DeploymentStopOnAlarm,
        Self::DeploymentStopOnRequest,
    ];

    fn as_str(self) -> &'static str {
        match self {
            Self::DeploymentFailure => "DEPLOYMENT_FAILURE",
            Self::DeploymentStopOnAlarm => "DEPLOYMENT_STOP_ON_ALARM",
            Self::DeploymentStopOnRequest => "DEPLOYMENT_STOP_ON_REQUEST",
        }
    }
}

/// What happens when the green fleet is not ready in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[allow(missing_docs)]
pub enum TimeoutAction {
    ContinueDeployment,
    StopDeployment,
}

impl ClosedEnum for TimeoutAction {
    const ALL: &'static [Self] = &[Self::ContinueDeployment, Self::StopDeployment];

    fn as_str(self) -> &'static str {
        match self {
            Self::ContinueDeployment => "CONTINUE_DEPLOYMENT",
            Self::StopDeployment => "STOP_DEPLOYMENT",
        }
    }
}

/// Automatic rollback policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollbackPolicy {
    /// Rollback enabled
    pub enabled: bool,
    /// Triggering events
    pub events: Vec<RollbackEvent>,
}

/// ECS service targeted by the deployment group
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EcsTarget {
    /// Cluster name
    pub cluster_name: String,
    /// Service name
    pub service_name: String,
}

/// Load balancer wiring for traffic shifting
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadBalancerInfo {
    /// Production listeners
    pub listener_arns: Vec<String>,
    /// Test listeners, may be empty
    pub test_listener_arns: Vec<String>,
    /// Blue and green target groups
    pub target_group_names: [String; 2],
}

/// Blue/green timing settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BlueGreenSettings {
    /// Minutes before the blue fleet is terminated
    pub termination_wait_minutes: u32,
    /// Action when the green fleet is not ready
    pub action_on_timeout: TimeoutAction,
}

/// CodeDeploy application and deployment group
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodeDeployConfig {
    /// Application name, also the primary name of the deploy role
    pub app_name: String,
    /// Deployment group name
    pub deployment_group_name: String,
    /// Compute platform
    pub compute_platform: ComputePlatform,
    /// In-place or blue/green
    pub deployment_type: TrafficDeploymentType,
    /// Traffic control
    pub deployment_option: DeploymentOption,
    /// Deployment configuration name, platform default when absent
    pub deployment_config_name: Option<String>,
    /// Rollback policy
    pub rollback: RollbackPolicy,
    /// ECS service, required on the ECS platform
    pub ecs_target: Option<EcsTarget>,
    /// Load balancer, required for blue/green
    pub load_balancer: Option<LoadBalancerInfo>,
    /// Blue/green timing
    pub blue_green: BlueGreenSettings,
    /// Task roles CodeDeploy may pass to ECS
    pub task_role_arns: Vec<String>,
}

impl CodeDeployConfig {
    /// Check if this is a blue/green deployment
    #[must_use]
    pub fn is_blue_green(&self) -> bool {
        self.deployment_type == TrafficDeploymentType::BlueGreen
    }

    /// Deployment configuration, falling back to the platform default
    #[must_use]
    pub fn effective_deployment_config(&self) -> &str {
        match (&self.deployment_config_name, self.compute_platform) {
            (Some(name), _) => name,
            (None, ComputePlatform::Ecs) => "CodeDeployDefault.ECSAllAtOnce",
            (None, ComputePlatform::Lambda) => "CodeDeployDefault.LambdaAllAtOnce",
            (None, ComputePlatform::Ec2) => "CodeDeployDefault.OneAtATime",
        }
    }
}
