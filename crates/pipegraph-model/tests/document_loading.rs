use pipegraph_model::document::PipelineDocument;
use pipegraph_model::LoadError;
use std::io::Write;

const YAML: &str = r#"
name: orders
build_project_name: orders-build
account:
  region: us-east-1
  account_id: "123456789012"
artifact_store:
  bucket: orders-artifacts
source:
  provider: GitHubV2
  owner: acme
  repo: orders
  branch: main
  connection_arn: arn:aws:codestar-connections:us-east-1:123456789012:connection/abc
deploy:
  provider: ECS
  configuration:
    ClusterName: prod
    ServiceName: orders
deployment_type: ecs
tags:
  team: payments
"#;

fn write_temp(suffix: &str, content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn load_yaml_by_extension() {
    let file = write_temp(".yaml", YAML);
    let doc = PipelineDocument::load(file.path()).unwrap();
    assert_eq!(doc.name, "orders");
    assert_eq!(doc.source.provider, "GitHubV2");
    assert_eq!(doc.deploy.configuration["ClusterName"], "prod");
    assert_eq!(doc.tags["team"], "payments");
}

#[test]
fn load_json_matches_yaml() {
    let yaml_doc = PipelineDocument::from_yaml_str(YAML).unwrap();
    let json = serde_json::to_string(&yaml_doc).unwrap();
    let file = write_temp(".json", &json);
    let json_doc = PipelineDocument::load(file.path()).unwrap();
    assert_eq!(yaml_doc, json_doc);
}

#[test]
fn load_rejects_unknown_extension() {
    let file = write_temp(".ini", "name=orders");
    assert!(matches!(
        PipelineDocument::load(file.path()),
        Err(LoadError::UnsupportedFormat(ext)) if ext == "ini"
    ));
}

#[test]
fn load_reports_missing_file() {
    let result = PipelineDocument::load("/definitely/not/here.yaml");
    assert!(matches!(result, Err(LoadError::Io { .. })));
}
