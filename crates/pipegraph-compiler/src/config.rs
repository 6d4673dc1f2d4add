//! Compiler configuration
//!
//! Compile-time policy choices that are not part of a pipeline document.

use serde::{Deserialize, Serialize};

/// Scope of the `ec2:CreateNetworkInterfacePermission` grant for VPC builds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkInterfaceScope {
    /// Constrained to the build's subnet ARNs and the CodeBuild service
    #[default]
    SubnetScoped,
    /// Any network interface in the account
    Unscoped,
}

/// Compiler configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerConfig {
    /// Network interface permission scope
    pub network_interface_scope: NetworkInterfaceScope,
}

impl CompilerConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With network interface permission scope
    #[inline]
    #[must_use]
    pub fn with_network_interface_scope(mut self, scope: NetworkInterfaceScope) -> Self {
        self.network_interface_scope = scope;
        self
    }
}
