use pipegraph_compiler::prelude::*;
use pipegraph_compiler::ValidationErrors;
use pipegraph_model::ResourceKind;
use pipegraph_test_utils::fixtures;
use pretty_assertions::assert_eq;
use serde_json::json;

fn compile(doc: &PipelineDocument) -> Compilation {
    PipelineCompiler::default().compile_document(doc).unwrap()
}

fn rejected(doc: &PipelineDocument) -> ValidationErrors {
    match PipelineCompiler::default().compile_document(doc) {
        Err(CompileError::Validation(errors)) => errors,
        other => panic!("expected validation failure, got {other:?}"),
    }
}

#[test]
fn ecs_with_s3_source() {
    let compilation = compile(&fixtures::s3_ecs());
    let graph = &compilation.graph;

    for kind in [ResourceKind::DeploymentApplication, ResourceKind::DeploymentGroup] {
        assert_eq!(graph.of_kind(kind).count(), 0);
    }
    assert!(!graph.contains("role.deploy"));

    let pipeline_policy = &compilation.policies[&RoleKind::Pipeline];
    assert!(pipeline_policy.grants("ecs:UpdateService"));
    assert!(pipeline_policy.grants("ecs:RegisterTaskDefinition"));

    let stages = &graph.get("pipeline.main").unwrap().attributes["stages"];
    assert_eq!(stages[2]["actions"][0]["provider"], "ECS");
    assert_eq!(stages[2]["actions"][0]["configuration"]["ClusterName"], "prod");
}

#[test]
fn codedeploy_ecs_blue_green() {
    let compilation = compile(&fixtures::codedeploy_ecs_blue_green());
    let graph = &compilation.graph;

    let group = graph.get("deployment_group.main").unwrap();
    assert_eq!(
        group.attributes["deployment_style"],
        json!({ "deployment_type": "BLUE_GREEN", "deployment_option": "WITH_TRAFFIC_CONTROL" })
    );
    assert_eq!(
        group.attributes["load_balancer_info"]["target_group_pair_info"],
        json!({
            "prod_traffic_route": { "listener_arns": [fixtures::LISTENER_ARN] },
            "test_traffic_route": { "listener_arns": [fixtures::TEST_LISTENER_ARN] },
            "target_groups": [{ "name": "orders-blue" }, { "name": "orders-green" }],
        })
    );
    assert_eq!(
        group.attributes["blue_green_deployment_config"]["deployment_ready_option"]["action_on_timeout"],
        "CONTINUE_DEPLOYMENT"
    );
    assert_eq!(group.attributes["deployment_config_name"], "CodeDeployDefault.ECSAllAtOnce");

    let outputs = graph.outputs();
    assert_eq!(outputs.code_deploy_app_name.as_deref(), Some("orders-app"));
    assert_eq!(outputs.deployment_group_name.as_deref(), Some("orders-dg"));
    assert_eq!(outputs.deploy_role_arn.as_deref(), Some("${role.deploy.arn}"));
}

#[test]
fn blue_green_without_load_balancer_is_rejected() {
    let mut doc = fixtures::codedeploy_ecs_blue_green();
    if let Some(cd) = doc.code_deploy.as_mut() {
        cd.load_balancer = None;
    }
    let errors = rejected(&doc);
    assert!(errors.has("code_deploy.load_balancer", ValidationErrorKind::ConflictingConfiguration));
}

#[test]
fn notifications_without_any_topic_are_rejected() {
    let mut doc = fixtures::s3_ecs();
    doc.enable_notifications = true;
    doc.create_sns_topic = false;
    doc.notifications.sns_topic_arn = Some(String::new());
    let errors = rejected(&doc);
    assert_eq!(errors.len(), 1);
    assert!(errors.has(
        "notifications.sns_topic_arn",
        ValidationErrorKind::ConflictingConfiguration
    ));
}

#[test]
fn notification_target_transformer() {
    let compilation = compile(&fixtures::with_created_topic(fixtures::github_v2_ecs()));
    let target = compilation.graph.get("event_target.pipeline_state").unwrap();
    assert_eq!(
        target.attributes["input_transformer"],
        json!({
            "input_paths": {
                "pipeline": "$.detail.pipeline",
                "region": "$.region",
                "state": "$.detail.state",
                "time": "$.time",
            },
            "input_template":
                "\"The pipeline <pipeline> has changed state to <state> in <region> at <time>.\"",
        })
    );
    let policy = &compilation.graph.get("topic_policy.notifications").unwrap().attributes["policy"];
    assert_eq!(
        policy["Statement"][0]["Principal"],
        json!({ "Service": ["events.amazonaws.com"] })
    );
}

#[test]
fn existing_codedeploy_application() {
    let compilation = compile(&fixtures::s3_codedeploy_existing_app());
    assert!(!compilation.graph.contains("deployment_app.main"));
    assert!(!compilation.policies.contains_key(&RoleKind::Deploy));
    assert!(compilation.policies[&RoleKind::Pipeline].grants("codedeploy:CreateDeployment"));
}

#[test]
fn apply_order_respects_dependencies() {
    for (label, doc) in fixtures::all() {
        let compilation = compile(&doc);
        let graph = &compilation.graph;
        let order = graph.apply_order().unwrap();
        assert_eq!(order.len(), graph.len(), "{label}");
        let position = |id: &str| order.iter().position(|n| n.as_str() == id).unwrap();
        for node in graph.nodes().values() {
            for dependency in &node.depends_on {
                assert!(
                    position(dependency.as_str()) < position(node.id.as_str()),
                    "{label}: {} before {}",
                    dependency,
                    node.id
                );
            }
        }
    }
}

#[test]
fn role_names_truncate_before_suffix() {
    let mut doc = fixtures::s3_ecs();
    doc.name = "a-very-long-pipeline-name-that-exceeds-the-limit".to_string();
    let compilation = compile(&doc);
    assert_eq!(
        compilation.graph.get("role.pipeline").unwrap().attributes["name_prefix"],
        "a-very-long-pipeline-name-that-e-pipeline-"
    );
}
