//! Closed enumerations
//!
//! Configuration fields whose value must come from a fixed set are parsed
//! through [`ClosedEnum`], so the validator can report the allowed values.

/// An enumeration with a fixed set of wire spellings
pub trait ClosedEnum: Sized + Copy + PartialEq + 'static {
    /// Every variant, in declaration order
    const ALL: &'static [Self];

    /// Wire spelling of this variant
    fn as_str(self) -> &'static str;

    /// Parse an exact wire spelling
    #[must_use]
    fn parse(value: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|v| v.as_str() == value)
    }

    /// All wire spellings, for error messages
    #[must_use]
    fn allowed() -> String {
        Self::ALL
            .iter()
            .map(|v| v.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{DeploymentType, SourceKind};

    #[test]
    fn parse_is_exact() {
        assert_eq!(DeploymentType::parse("ecs"), Some(DeploymentType::Ecs));
        assert_eq!(DeploymentType::parse("ECS"), None);
        assert_eq!(SourceKind::parse("GitHubV2"), Some(SourceKind::GitHubV2));
    }

    #[test]
    fn allowed_lists_every_variant() {
        assert_eq!(DeploymentType::allowed(), "ecs, codedeploy");
        assert_eq!(SourceKind::allowed(), "S3, GitHub, GitHubV2");
    }
}
