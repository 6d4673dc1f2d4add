//! Resource graph
//!
//! The compiler's output: typed resource nodes keyed by a deterministic id,
//! each listing the nodes it depends on. Attributes refer to other nodes with
//! `${<node-id>.<attribute>}` placeholders that the provisioning side resolves.
//!
//! Placeholders are recorded on the node by whoever writes them. Attribute
//! text is never scanned, so user strings that look like placeholders pass
//! through as literals.

use crate::error::GraphError;
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::borrow::Borrow;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Kind of resource a node describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum ResourceKind {
    Role,
    PolicyDocument,
    PolicyAttachment,
    Bucket,
    BuildProject,
    Pipeline,
    DeploymentApplication,
    DeploymentGroup,
    LogGroup,
    Topic,
    TopicPolicy,
    EventRule,
    EventTarget,
    Webhook,
}

impl ResourceKind {
    /// Id prefix for nodes of this kind
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Role => "role",
            Self::PolicyDocument => "policy",
            Self::PolicyAttachment => "policy_attachment",
            Self::Bucket => "bucket",
            Self::BuildProject => "build_project",
            Self::Pipeline => "pipeline",
            Self::DeploymentApplication => "deployment_app",
            Self::DeploymentGroup => "deployment_group",
            Self::LogGroup => "log_group",
            Self::Topic => "topic",
            Self::TopicPolicy => "topic_policy",
            Self::EventRule => "event_rule",
            Self::EventTarget => "event_target",
            Self::Webhook => "webhook",
        }
    }

    /// Check if the platform resource accepts tags
    #[must_use]
    pub fn is_taggable(self) -> bool {
        matches!(
            self,
            Self::Role
                | Self::Bucket
                | Self::BuildProject
                | Self::Pipeline
                | Self::DeploymentApplication
                | Self::DeploymentGroup
                | Self::LogGroup
                | Self::Topic
                | Self::EventRule
        )
    }
}

/// Deterministic node id, `<kind>.<logical-name>`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Id for a node of `kind` with logical name `name`
    #[must_use]
    pub fn new(kind: ResourceKind, name: &str) -> Self {
        Self(format!("{}.{}", kind.as_str(), name))
    }

    /// Id as a string
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Placeholder for `attribute` of this node
    #[must_use]
    pub fn reference(&self, attribute: &str) -> String {
        format!("${{{}.{}}}", self.0, attribute)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// One resource descriptor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceNode {
    /// Node id
    pub id: NodeId,
    /// Resource kind
    pub kind: ResourceKind,
    /// Platform attributes, a JSON object
    pub attributes: Value,
    /// Nodes that must exist first
    pub depends_on: BTreeSet<NodeId>,
    /// Nodes whose placeholders appear in `attributes`
    #[serde(skip)]
    pub references: BTreeSet<NodeId>,
}

impl ResourceNode {
    /// Node with no dependencies
    #[must_use]
    pub fn new(kind: ResourceKind, name: &str, attributes: Value) -> Self {
        Self {
            id: NodeId::new(kind, name),
            kind,
            attributes,
            depends_on: BTreeSet::new(),
            references: BTreeSet::new(),
        }
    }

    /// Add a dependency
    #[must_use]
    pub fn depends_on(mut self, id: &NodeId) -> Self {
        self.depends_on.insert(id.clone());
        self
    }

    /// Attribute by name
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Record placeholders for `targets` written into the attributes
    #[must_use]
    pub fn referencing<'a>(mut self, targets: impl IntoIterator<Item = &'a NodeId>) -> Self {
        self.references.extend(targets.into_iter().cloned());
        self
    }
}

/// Identifiers exposed to callers; `None` when the feature is disabled
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineOutputs {
    /// Pipeline ARN
    pub pipeline_arn: String,
    /// Build project ARN
    pub build_project_arn: String,
    /// Artifact bucket ARN
    pub artifact_bucket_arn: String,
    /// Pipeline role ARN
    pub pipeline_role_arn: String,
    /// Build role ARN
    pub build_role_arn: String,
    /// CodeDeploy role ARN
    pub deploy_role_arn: Option<String>,
    /// CodeDeploy application name
    pub code_deploy_app_name: Option<String>,
    /// CodeDeploy deployment group name
    pub deployment_group_name: Option<String>,
    /// Notification topic ARN
    pub notification_topic_arn: Option<String>,
    /// GitHub webhook URL
    pub webhook_url: Option<String>,
}

/// Fully resolved resource graph
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceGraph {
    nodes: BTreeMap<NodeId, ResourceNode>,
    outputs: PipelineOutputs,
}

impl ResourceGraph {
    /// Assemble from nodes and outputs
    #[must_use]
    pub fn new(nodes: BTreeMap<NodeId, ResourceNode>, outputs: PipelineOutputs) -> Self {
        Self { nodes, outputs }
    }

    /// All nodes by id
    #[inline]
    #[must_use]
    pub fn nodes(&self) -> &BTreeMap<NodeId, ResourceNode> {
        &self.nodes
    }

    /// Node by id
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&ResourceNode> {
        self.nodes.get(id)
    }

    /// Check if a node exists
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Number of nodes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the graph has no nodes
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of dependency edges
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.nodes.values().map(|n| n.depends_on.len()).sum()
    }

    /// Nodes of one kind, in id order
    pub fn of_kind(&self, kind: ResourceKind) -> impl Iterator<Item = &ResourceNode> {
        self.nodes.values().filter(move |n| n.kind == kind)
    }

    /// Caller outputs
    #[inline]
    #[must_use]
    pub fn outputs(&self) -> &PipelineOutputs {
        &self.outputs
    }

    /// Node ids ordered so every node follows its dependencies
    ///
    /// # Errors
    /// Returns error if an edge targets an unknown node or edges form a cycle
    pub fn apply_order(&self) -> Result<Vec<&NodeId>, GraphError> {
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
        for id in self.nodes.keys() {
            graph.add_node(id.as_str());
        }
        for node in self.nodes.values() {
            for dependency in &node.depends_on {
                if !self.nodes.contains_key(dependency) {
                    return Err(GraphError::UnknownDependency {
                        node: node.id.to_string(),
                        dependency: dependency.to_string(),
                    });
                }
                graph.add_edge(dependency.as_str(), node.id.as_str(), ());
            }
        }

        let order = toposort(&graph, None)
            .map_err(|cycle| GraphError::CycleDetected(cycle.node_id().to_string()))?;

        Ok(order
            .into_iter()
            .filter_map(|id| self.nodes.get_key_value(id).map(|(key, _)| key))
            .collect())
    }

    /// SHA-256 over the canonical JSON form, hex encoded
    ///
    /// Equal graphs have equal fingerprints; map keys serialize sorted.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        // Serializing BTreeMaps and derived structs into a Vec cannot fail.
        let canonical = serde_json::to_vec(self).unwrap_or_default();
        hasher.update(&canonical);
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(kind: ResourceKind, name: &str) -> ResourceNode {
        ResourceNode::new(kind, name, json!({ "name": name }))
    }

    fn graph(nodes: Vec<ResourceNode>) -> ResourceGraph {
        ResourceGraph::new(
            nodes.into_iter().map(|n| (n.id.clone(), n)).collect(),
            PipelineOutputs::default(),
        )
    }

    #[test]
    fn node_ids_are_kind_prefixed() {
        let id = NodeId::new(ResourceKind::BuildProject, "main");
        assert_eq!(id.as_str(), "build_project.main");
        assert_eq!(id.reference("arn"), "${build_project.main.arn}");
    }

    #[test]
    fn only_recorded_references_count() {
        let role = NodeId::new(ResourceKind::Role, "pipeline");
        let n = ResourceNode::new(
            ResourceKind::Pipeline,
            "main",
            json!({
                "role_arn": role.reference("arn"),
                "variables": [{ "value": "${env.home.path}" }]
            }),
        )
        .referencing([&role]);
        assert_eq!(n.references.iter().map(NodeId::as_str).collect::<Vec<_>>(), vec!["role.pipeline"]);
        assert!(n.depends_on.is_empty());
    }

    #[test]
    fn references_are_not_serialized() {
        let role = NodeId::new(ResourceKind::Role, "pipeline");
        let n = node(ResourceKind::Pipeline, "main").referencing([&role]);
        assert!(serde_json::to_value(&n).unwrap().get("references").is_none());
    }

    #[test]
    fn apply_order_puts_dependencies_first() {
        let bucket = node(ResourceKind::Bucket, "artifacts");
        let role = node(ResourceKind::Role, "pipeline");
        let pipeline = node(ResourceKind::Pipeline, "main")
            .depends_on(&bucket.id)
            .depends_on(&role.id);
        let g = graph(vec![pipeline, role, bucket]);

        let order: Vec<_> = g.apply_order().unwrap().into_iter().map(NodeId::as_str).collect();
        let pos = |id: &str| order.iter().position(|o| *o == id).unwrap();
        assert!(pos("bucket.artifacts") < pos("pipeline.main"));
        assert!(pos("role.pipeline") < pos("pipeline.main"));
        assert_eq!(order.len(), 3);
    }

    #[test]
    fn apply_order_rejects_unknown_dependency() {
        let missing = NodeId::new(ResourceKind::Topic, "notifications");
        let g = graph(vec![node(ResourceKind::EventTarget, "x").depends_on(&missing)]);
        assert!(matches!(
            g.apply_order(),
            Err(GraphError::UnknownDependency { .. })
        ));
    }

    #[test]
    fn apply_order_rejects_cycles() {
        let a = NodeId::new(ResourceKind::Role, "a");
        let b = NodeId::new(ResourceKind::Role, "b");
        let g = graph(vec![
            node(ResourceKind::Role, "a").depends_on(&b),
            node(ResourceKind::Role, "b").depends_on(&a),
        ]);
        assert!(matches!(g.apply_order(), Err(GraphError::CycleDetected(_))));
    }

    #[test]
    fn fingerprint_is_stable_and_content_sensitive() {
        let g1 = graph(vec![node(ResourceKind::Bucket, "artifacts")]);
        let g2 = graph(vec![node(ResourceKind::Bucket, "artifacts")]);
        let g3 = graph(vec![node(ResourceKind::Bucket, "other")]);
        assert_eq!(g1.fingerprint(), g2.fingerprint());
        assert_ne!(g1.fingerprint(), g3.fingerprint());
        assert_eq!(g1.fingerprint().len(), 64);
    }

    #[test]
    fn taggable_kinds() {
        assert!(ResourceKind::Pipeline.is_taggable());
        assert!(!ResourceKind::PolicyDocument.is_taggable());
        assert!(!ResourceKind::Webhook.is_taggable());
    }
}
