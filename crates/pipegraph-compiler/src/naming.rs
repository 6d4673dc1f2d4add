//! Role name generation
//!
//! Role names are generated as prefixes: the primary resource name truncated
//! to [`ROLE_PREFIX_SOURCE_MAX`] characters, then a fixed per-role suffix. The
//! provisioning side appends a unique tail within [`ROLE_NAME_MAX`].
//!
//! Other resources named after the pipeline ([`DerivedName`]) keep as much
//! of the pipeline name as their platform limit allows, then a fixed suffix.
//!
//! Pure functions of their input; there is no counter or registry.

use crate::error::NameError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt;

/// Characters kept from the primary name
pub const ROLE_PREFIX_SOURCE_MAX: usize = 32;

/// Platform limit on role names
pub const ROLE_NAME_MAX: usize = 64;

/// Suffix of the created notification topic
pub const TOPIC_SUFFIX: &str = "-notifications";

/// Suffix of the GitHub webhook
pub const WEBHOOK_SUFFIX: &str = "-github";

static IAM_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9+=,.@_-]+$").expect("IAM name pattern is valid"));
static EVENT_RULE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9._-]+$").expect("rule name pattern is valid"));
static TOPIC_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("topic name pattern is valid"));
static WEBHOOK_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9.@_-]+$").expect("webhook name pattern is valid"));

/// The roles a pipeline uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleKind {
    /// Assumed by CodePipeline
    Pipeline,
    /// Assumed by CodeBuild
    Build,
    /// Assumed by CodeDeploy
    Deploy,
}

impl RoleKind {
    /// All roles, in emission order
    pub const ALL: [RoleKind; 3] = [RoleKind::Pipeline, RoleKind::Build, RoleKind::Deploy];

    /// Fixed name suffix
    #[must_use]
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Pipeline => "-pipeline-",
            Self::Build => "-build-",
            Self::Deploy => "-deploy-",
        }
    }

    /// Logical node name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pipeline => "pipeline",
            Self::Build => "build",
            Self::Deploy => "deploy",
        }
    }

    /// Service that assumes the role
    #[must_use]
    pub fn service(self) -> &'static str {
        match self {
            Self::Pipeline => "codepipeline",
            Self::Build => "codebuild",
            Self::Deploy => "codedeploy",
        }
    }

    /// Parse a logical role name
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.as_str() == value)
    }
}

impl fmt::Display for RoleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// First `max` characters of `name`
#[must_use]
pub fn truncate(name: &str, max: usize) -> &str {
    match name.char_indices().nth(max) {
        Some((index, _)) => &name[..index],
        None => name,
    }
}

/// Role name prefix for `role` derived from `name`
///
/// Truncation happens before the suffix is appended, so the suffix is never
/// cut and the result never exceeds [`ROLE_NAME_MAX`].
///
/// # Errors
/// Returns error if `name` is empty or contains characters IAM rejects
pub fn role_name_prefix(name: &str, role: RoleKind) -> Result<String, NameError> {
    if name.is_empty() {
        return Err(NameError::Empty);
    }
    if !IAM_NAME.is_match(name) {
        return Err(NameError::IllegalCharacters(name.to_string()));
    }

    let prefix = format!("{}{}", truncate(name, ROLE_PREFIX_SOURCE_MAX), role.suffix());
    if prefix.len() > ROLE_NAME_MAX {
        return Err(NameError::TooLong {
            name: prefix,
            limit: ROLE_NAME_MAX,
        });
    }
    Ok(prefix)
}

/// Non-role resources named after the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DerivedName {
    /// EventBridge rule
    EventRule,
    /// Created SNS topic
    Topic,
    /// CodePipeline webhook
    Webhook,
}

impl DerivedName {
    /// Platform limit on the full name
    #[must_use]
    pub fn limit(self) -> usize {
        match self {
            Self::EventRule => 64,
            Self::Topic => 256,
            Self::Webhook => 100,
        }
    }

    /// Resource label for messages
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EventRule => "event rule",
            Self::Topic => "topic",
            Self::Webhook => "webhook",
        }
    }

    fn pattern(self) -> &'static Regex {
        match self {
            Self::EventRule => &EVENT_RULE_NAME,
            Self::Topic => &TOPIC_NAME,
            Self::Webhook => &WEBHOOK_NAME,
        }
    }
}

/// Name of a `kind` resource: `base` truncated to fit the limit, then `suffix`
///
/// # Errors
/// Returns error if `base` is empty or the name has characters the resource
/// does not accept
pub fn derived_name(kind: DerivedName, base: &str, suffix: &str) -> Result<String, NameError> {
    if base.is_empty() {
        return Err(NameError::Empty);
    }
    let keep = kind.limit().saturating_sub(suffix.chars().count());
    let name = format!("{}{suffix}", truncate(base, keep));
    if !kind.pattern().is_match(&name) {
        return Err(NameError::IllegalCharacters(name));
    }
    Ok(name)
}
