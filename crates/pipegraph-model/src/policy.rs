//! IAM policy documents
//!
//! Statements serialize with the exact IAM JSON field names (`Version`,
//! `Statement`, `Sid`, `Effect`, `Principal`, `Action`, `Resource`,
//! `Condition`). Each statement also records the fragment that produced it;
//! that tag is kept for tests and audit and is not part of the JSON.

use serde::Serialize;
use std::collections::BTreeMap;

/// IAM policy language version
pub const POLICY_VERSION: &str = "2012-10-17";

/// Statement effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Effect {
    /// Grant
    Allow,
    /// Explicit deny
    Deny,
}

/// Statement principal, e.g. `{"Service": ["codebuild.amazonaws.com"]}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Principal(BTreeMap<String, Vec<String>>);

impl Principal {
    /// AWS service principal
    #[must_use]
    pub fn service(service: impl Into<String>) -> Self {
        let mut inner = BTreeMap::new();
        inner.insert("Service".to_string(), vec![service.into()]);
        Self(inner)
    }
}

/// Condition block: operator → key → values
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Condition(BTreeMap<String, BTreeMap<String, Vec<String>>>);

impl Condition {
    /// Check if no condition is set
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Values constrained by `operator` on `key`
    #[must_use]
    pub fn values(&self, operator: &str, key: &str) -> Option<&[String]> {
        self.0
            .get(operator)
            .and_then(|keys| keys.get(key))
            .map(Vec::as_slice)
    }

    fn insert(&mut self, operator: &str, key: &str, values: Vec<String>) {
        self.0
            .entry(operator.to_string())
            .or_default()
            .insert(key.to_string(), values);
    }
}

/// One effect/principal/action/resource/condition tuple
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyStatement {
    /// Statement id
    #[serde(rename = "Sid", skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    /// Effect
    #[serde(rename = "Effect")]
    pub effect: Effect,
    /// Principal (trust and resource policies only)
    #[serde(rename = "Principal", skip_serializing_if = "Option::is_none")]
    pub principal: Option<Principal>,
    /// Actions
    #[serde(rename = "Action")]
    pub actions: Vec<String>,
    /// Resources (empty for trust policies)
    #[serde(rename = "Resource", skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<String>,
    /// Condition block
    #[serde(rename = "Condition", skip_serializing_if = "Condition::is_empty")]
    pub condition: Condition,
    /// Fragment that produced this statement
    #[serde(skip)]
    pub origin: String,
}

impl PolicyStatement {
    /// Allow statement over `actions`
    #[must_use]
    pub fn allow<I, S>(actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            sid: None,
            effect: Effect::Allow,
            principal: None,
            actions: actions.into_iter().map(Into::into).collect(),
            resources: Vec::new(),
            condition: Condition::default(),
            origin: String::new(),
        }
    }

    /// Scope to resources
    #[must_use]
    pub fn on<I, S>(mut self, resources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.resources = resources.into_iter().map(Into::into).collect();
        self
    }

    /// Add a condition
    #[must_use]
    pub fn when<I, S>(mut self, operator: &str, key: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.condition
            .insert(operator, key, values.into_iter().map(Into::into).collect());
        self
    }

    /// Set principal
    #[must_use]
    pub fn for_principal(mut self, principal: Principal) -> Self {
        self.principal = Some(principal);
        self
    }

    /// Set statement id
    #[must_use]
    pub fn sid(mut self, sid: impl Into<String>) -> Self {
        self.sid = Some(sid.into());
        self
    }

    /// Tag with the producing fragment
    #[must_use]
    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    /// Check if this statement grants `action`
    #[must_use]
    pub fn grants(&self, action: &str) -> bool {
        self.effect == Effect::Allow && self.actions.iter().any(|a| a == action)
    }

    /// Check if this statement uses the `"*"` resource
    #[must_use]
    pub fn is_unscoped(&self) -> bool {
        self.resources.iter().any(|r| r == "*")
    }
}

/// Ordered policy statements
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyDocument {
    /// Policy language version
    #[serde(rename = "Version")]
    pub version: String,
    /// Statements in emission order
    #[serde(rename = "Statement")]
    pub statements: Vec<PolicyStatement>,
}

impl Default for PolicyDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicyDocument {
    /// Empty document
    #[must_use]
    pub fn new() -> Self {
        Self {
            version: POLICY_VERSION.to_string(),
            statements: Vec::new(),
        }
    }

    /// Document from statements
    #[must_use]
    pub fn from_statements(statements: Vec<PolicyStatement>) -> Self {
        Self {
            version: POLICY_VERSION.to_string(),
            statements,
        }
    }

    /// Append a statement
    pub fn push(&mut self, statement: PolicyStatement) {
        self.statements.push(statement);
    }

    /// Check if the document has no statements
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Statements produced by fragment `origin`
    pub fn from_origin<'a>(&'a self, origin: &'a str) -> impl Iterator<Item = &'a PolicyStatement> {
        self.statements.iter().filter(move |s| s.origin == origin)
    }

    /// Statements granting `action`
    pub fn granting<'a>(&'a self, action: &'a str) -> impl Iterator<Item = &'a PolicyStatement> {
        self.statements.iter().filter(move |s| s.grants(action))
    }

    /// Check if any statement grants `action`
    #[must_use]
    pub fn grants(&self, action: &str) -> bool {
        self.granting(action).next().is_some()
    }

    /// Distinct fragment names, in first-emission order
    #[must_use]
    pub fn origins(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for statement in &self.statements {
            if !seen.contains(&statement.origin.as_str()) {
                seen.push(statement.origin.as_str());
            }
        }
        seen
    }

    /// Compact IAM JSON
    ///
    /// # Errors
    /// Returns error if serialization fails (not expected for this type)
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn statement_json_uses_iam_field_names() {
        let statement = PolicyStatement::allow(["s3:GetObject"])
            .on(["arn:aws:s3:::b/*"])
            .origin("artifact-store");
        let json = serde_json::to_value(&statement).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "Effect": "Allow",
                "Action": ["s3:GetObject"],
                "Resource": ["arn:aws:s3:::b/*"]
            })
        );
    }

    #[test]
    fn condition_and_principal_render() {
        let statement = PolicyStatement::allow(["sts:AssumeRole"])
            .for_principal(Principal::service("codebuild.amazonaws.com"))
            .when("StringEquals", "aws:SourceAccount", ["123456789012"]);
        let json = serde_json::to_value(&statement).unwrap();
        assert_eq!(json["Principal"]["Service"][0], "codebuild.amazonaws.com");
        assert_eq!(
            json["Condition"]["StringEquals"]["aws:SourceAccount"][0],
            "123456789012"
        );
        assert!(json.get("Resource").is_none());
    }

    #[test]
    fn document_queries() {
        let doc = PolicyDocument::from_statements(vec![
            PolicyStatement::allow(["a:One"]).on(["*"]).origin("first"),
            PolicyStatement::allow(["a:Two"]).on(["x"]).origin("second"),
            PolicyStatement::allow(["a:Three"]).on(["y"]).origin("first"),
        ]);
        assert!(doc.grants("a:Two"));
        assert!(!doc.grants("a:Four"));
        assert_eq!(doc.origins(), vec!["first", "second"]);
        assert_eq!(doc.from_origin("first").count(), 2);
        assert!(doc.statements[0].is_unscoped());
    }

    #[test]
    fn document_json_has_version() {
        let doc = PolicyDocument::new();
        assert_eq!(doc.to_json().unwrap(), r#"{"Version":"2012-10-17","Statement":[]}"#);
    }
}
