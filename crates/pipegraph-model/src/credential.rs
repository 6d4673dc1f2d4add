//! Opaque credential references
//!
//! OAuth tokens and webhook secrets are carried through the compiler exactly as
//! given. They are never inspected, transformed or logged.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque credential reference (token, secret, or a pointer to one)
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialRef(String);

impl CredentialRef {
    /// Wrap a credential reference
    #[inline]
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The verbatim reference, for emission into resource attributes
    #[inline]
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Check if the reference is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for CredentialRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CredentialRef(<redacted>)")
    }
}
