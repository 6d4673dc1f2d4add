//! IAM policy composition
//!
//! Each role owns a fixed table of fragments. A fragment is a name, a gate
//! over the resolved [`FeatureSet`] and a generator of statements. The
//! composer walks the table in declaration order, so a document's statement
//! order depends only on which gates pass.
//!
//! Resources are pinned to the narrowest ARN derivable from the `PipelineSpec`; `"*"`
//! appears only where the service offers no resource-level scoping.

mod build;
mod deploy;
mod pipeline;
mod trust;

use crate::config::CompilerConfig;
use crate::features::FeatureSet;
use crate::naming::RoleKind;
use pipegraph_model::policy::{PolicyDocument, PolicyStatement};
use pipegraph_model::spec::PipelineSpec;

pub use trust::trust_policy;

/// Inputs every fragment sees
#[derive(Debug, Clone, Copy)]
pub struct FragmentContext<'a> {
    /// Validated spec
    pub spec: &'a PipelineSpec,
    /// Resolved features
    pub features: &'a FeatureSet,
    /// Compile-time policy choices
    pub config: &'a CompilerConfig,
}

/// A named, gated statement generator
#[derive(Clone, Copy)]
pub struct Fragment {
    /// Stable name, recorded as the origin of each emitted statement
    pub name: &'static str,
    /// Inclusion predicate
    pub gate: fn(&FragmentContext<'_>) -> bool,
    /// Statement generator
    pub emit: fn(&FragmentContext<'_>) -> Vec<PolicyStatement>,
}

impl std::fmt::Debug for Fragment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fragment").field("name", &self.name).finish_non_exhaustive()
    }
}

/// Fragment table of a role, in emission order
#[must_use]
pub fn fragments(role: RoleKind) -> &'static [Fragment] {
    match role {
        RoleKind::Pipeline => pipeline::FRAGMENTS,
        RoleKind::Build => build::FRAGMENTS,
        RoleKind::Deploy => deploy::FRAGMENTS,
    }
}

/// Gate that always passes
pub(crate) fn always(_: &FragmentContext<'_>) -> bool {
    true
}

/// `artifact-store` becomes `ArtifactStore`, suffixed with the statement index
/// when a fragment emits more than one statement
fn statement_id(fragment: &str, index: usize, count: usize) -> String {
    let mut sid: String = fragment
        .split('-')
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_ascii_uppercase().to_string() + chars.as_str()
            })
        })
        .collect();
    if count > 1 {
        sid.push_str(&index.to_string());
    }
    sid
}

/// Per-role policy composer
#[derive(Debug, Clone, Copy, Default)]
pub struct IamPolicyComposer {
    config: CompilerConfig,
}

impl IamPolicyComposer {
    /// Create composer
    #[inline]
    #[must_use]
    pub fn new(config: CompilerConfig) -> Self {
        Self { config }
    }

    /// Compose the permission policy of `role`
    ///
    /// The deploy role only exists with CodeDeploy; its document is empty
    /// otherwise.
    #[must_use]
    pub fn compose(&self, role: RoleKind, spec: &PipelineSpec, features: &FeatureSet) -> PolicyDocument {
        let mut document = PolicyDocument::new();
        if role == RoleKind::Deploy && !features.include_code_deploy {
            return document;
        }

        let ctx = FragmentContext {
            spec,
            features,
            config: &self.config,
        };
        for fragment in fragments(role) {
            if !(fragment.gate)(&ctx) {
                continue;
            }
            let statements = (fragment.emit)(&ctx);
            let count = statements.len();
            for (i, statement) in statements.into_iter().enumerate() {
                document.push(
                    statement
                        .sid(statement_id(fragment.name, i, count))
                        .origin(fragment.name),
                );
            }
        }

        tracing::debug!(
            pipeline = %spec.name,
            role = %role,
            statements = document.statements.len(),
            fragments = ?document.origins(),
            "composed role policy"
        );
        document
    }

    /// Managed policies attached to `role`, platform policy first
    #[must_use]
    pub fn managed_policy_arns(&self, role: RoleKind, spec: &PipelineSpec, features: &FeatureSet) -> Vec<String> {
        let extra = &spec.additional_policy_arns;
        match role {
            RoleKind::Pipeline => extra.pipeline.clone(),
            RoleKind::Build => extra.build.clone(),
            RoleKind::Deploy => {
                let Some(cd) = spec.code_deploy.as_ref().filter(|_| features.include_code_deploy) else {
                    return Vec::new();
                };
                let mut arns = vec![spec.account.managed_policy_arn(cd.compute_platform.managed_policy())];
                arns.extend(extra.deploy.iter().cloned());
                arns
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statement_ids() {
        assert_eq!(statement_id("artifact-store", 0, 1), "ArtifactStore");
        assert_eq!(statement_id("vpc", 1, 2), "Vpc1");
        assert_eq!(statement_id("codestar-connection", 0, 1), "CodestarConnection");
    }

    #[test]
    fn fragment_names_are_unique_per_role() {
        for role in RoleKind::ALL {
            let names: Vec<_> = fragments(role).iter().map(|f| f.name).collect();
            let mut deduped = names.clone();
            deduped.sort_unstable();
            deduped.dedup();
            assert_eq!(names.len(), deduped.len(), "{role}");
        }
    }
}
