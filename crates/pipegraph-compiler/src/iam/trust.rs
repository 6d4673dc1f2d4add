//! Role trust policies

use crate::naming::RoleKind;
use pipegraph_model::policy::{PolicyDocument, PolicyStatement, Principal};
use pipegraph_model::AccountContext;

/// Assume-role policy letting the role's service assume it
#[must_use]
pub fn trust_policy(role: RoleKind, account: &AccountContext) -> PolicyDocument {
    PolicyDocument::from_statements(vec![PolicyStatement::allow(["sts:AssumeRole"])
        .for_principal(Principal::service(account.service_principal(role.service())))
        .origin("trust")])
}
