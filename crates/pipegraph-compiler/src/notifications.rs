//! Notification rules and message templates
//!
//! EventBridge rules match pipeline and stage execution state changes; each
//! rule's target rewrites the event into a one-line message with an input
//! transformer. Template text is a compatibility contract with existing
//! consumers and must not change.

use pipegraph_model::spec::PipelineSpec;
use pipegraph_model::ClosedEnum;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Pipeline execution state change message
pub const PIPELINE_STATE_TEMPLATE: &str =
    "\"The pipeline <pipeline> has changed state to <state> in <region> at <time>.\"";

/// Stage execution state change message
pub const STAGE_STATE_TEMPLATE: &str =
    "\"Stage <stage> of pipeline <pipeline> has changed state to <state> in <region> at <time>.\"";

const PIPELINE_DETAIL_TYPE: &str = "CodePipeline Pipeline Execution State Change";
const STAGE_DETAIL_TYPE: &str = "CodePipeline Stage Execution State Change";

/// Which execution a rule watches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationScope {
    /// Whole pipeline execution
    Pipeline,
    /// Single stage execution
    Stage,
}

impl NotificationScope {
    /// Both scopes, in emission order
    pub const ALL: [NotificationScope; 2] = [NotificationScope::Pipeline, NotificationScope::Stage];

    /// Logical node name suffix
    #[must_use]
    pub fn node_name(self) -> &'static str {
        match self {
            Self::Pipeline => "pipeline_state",
            Self::Stage => "stage_state",
        }
    }

    /// Suffix of the rule name
    #[must_use]
    pub fn rule_suffix(self) -> &'static str {
        match self {
            Self::Pipeline => "-pipeline-state",
            Self::Stage => "-stage-state",
        }
    }

    /// EventBridge `detail-type`
    #[must_use]
    pub fn detail_type(self) -> &'static str {
        match self {
            Self::Pipeline => PIPELINE_DETAIL_TYPE,
            Self::Stage => STAGE_DETAIL_TYPE,
        }
    }

    /// Message template
    #[must_use]
    pub fn template(self) -> &'static str {
        match self {
            Self::Pipeline => PIPELINE_STATE_TEMPLATE,
            Self::Stage => STAGE_STATE_TEMPLATE,
        }
    }

    /// Template variable → event JSON path
    #[must_use]
    pub fn input_paths(self) -> BTreeMap<&'static str, &'static str> {
        let mut paths = BTreeMap::from([
            ("pipeline", "$.detail.pipeline"),
            ("state", "$.detail.state"),
            ("region", "$.region"),
            ("time", "$.time"),
        ]);
        if self == Self::Stage {
            paths.insert("stage", "$.detail.stage");
        }
        paths
    }
}

/// Event pattern matching `states` of the pipeline
#[must_use]
pub fn event_pattern(scope: NotificationScope, spec: &PipelineSpec) -> Value {
    let states: Vec<&str> = match scope {
        NotificationScope::Pipeline => spec
            .notifications
            .pipeline_states
            .iter()
            .map(|s| s.as_str())
            .collect(),
        NotificationScope::Stage => spec
            .notifications
            .stage_states
            .iter()
            .map(|s| s.as_str())
            .collect(),
    };
    json!({
        "source": ["aws.codepipeline"],
        "detail-type": [scope.detail_type()],
        "resources": [spec.pipeline_arn()],
        "detail": { "state": states },
    })
}

/// Input transformer block for a rule target
#[must_use]
pub fn input_transformer(scope: NotificationScope) -> Value {
    json!({
        "input_paths": scope.input_paths(),
        "input_template": scope.template(),
    })
}

/// Substitute `<name>` placeholders, as the event bus does at delivery
///
/// One left-to-right pass; substituted values are never rescanned. Unknown
/// placeholders are left in place.
#[must_use]
pub fn render(template: &str, values: &BTreeMap<&str, &str>) -> String {
    let mut text = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('<') {
        text.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        if let Some(close) = after.find('>') {
            if let Some(value) = values.get(&after[..close]) {
                text.push_str(value);
                rest = &after[close + 1..];
                continue;
            }
        }
        text.push('<');
        rest = after;
    }
    text.push_str(rest);
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::ConfigValidator;
    use pipegraph_test_utils::fixtures;
    use pretty_assertions::assert_eq;

    #[test]
    fn templates_substitute_every_path() {
        for scope in NotificationScope::ALL {
            for name in scope.input_paths().keys() {
                assert!(scope.template().contains(&format!("<{name}>")), "{name}");
            }
        }
    }

    #[test]
    fn stage_template_renders_exactly() {
        let values = BTreeMap::from([
            ("stage", "Build"),
            ("pipeline", "orders"),
            ("state", "FAILED"),
            ("region", "us-east-1"),
            ("time", "2024-01-01T00:00:00Z"),
        ]);
        assert_eq!(
            render(STAGE_STATE_TEMPLATE, &values),
            "\"Stage Build of pipeline orders has changed state to FAILED in us-east-1 at 2024-01-01T00:00:00Z.\""
        );
    }

    #[test]
    fn substituted_values_are_not_rescanned() {
        let values = BTreeMap::from([
            ("pipeline", "<state>"),
            ("state", "FAILED"),
            ("region", "<time>"),
            ("time", "noon"),
        ]);
        assert_eq!(
            render(PIPELINE_STATE_TEMPLATE, &values),
            "\"The pipeline <state> has changed state to FAILED in <time> at noon.\""
        );
    }

    #[test]
    fn unknown_placeholders_stay() {
        let values = BTreeMap::from([("state", "FAILED")]);
        assert_eq!(render("<<state> <other> <", &values), "<FAILED <other> <");
    }

    #[test]
    fn pipeline_pattern_shape() {
        let spec = ConfigValidator::new().lower(&fixtures::s3_ecs()).unwrap();
        assert_eq!(
            event_pattern(NotificationScope::Pipeline, &spec),
            json!({
                "source": ["aws.codepipeline"],
                "detail-type": ["CodePipeline Pipeline Execution State Change"],
                "resources": ["arn:aws:codepipeline:us-east-1:123456789012:orders"],
                "detail": { "state": ["FAILED", "SUCCEEDED"] },
            })
        );
    }

    #[test]
    fn stage_transformer_includes_stage() {
        let transformer = input_transformer(NotificationScope::Stage);
        assert_eq!(transformer["input_paths"]["stage"], "$.detail.stage");
        assert_eq!(transformer["input_template"], STAGE_STATE_TEMPLATE);
    }
}
