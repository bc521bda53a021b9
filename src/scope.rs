//! Which account's tokens an operation targets.

use crate::models::user::{UserOption, Viewer};

const SELF_BASE: &str = "/api/token/";
const ADMIN_BASE: &str = "/api/token/admin/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryScope {
    /// The caller's own tokens.
    Own,
    /// Another account's tokens, viewed by an elevated operator.
    OnBehalfOf(i64),
}

impl QueryScope {
    /// Derive the scope once from viewer and impersonation target so call
    /// sites never re-check the role themselves. Without the elevated role
    /// the target is ignored.
    pub fn resolve(viewer: &Viewer, target: Option<&UserOption>) -> Self {
        match target {
            Some(user) if viewer.is_elevated() => QueryScope::OnBehalfOf(user.id),
            _ => QueryScope::Own,
        }
    }

    pub fn base_path(&self) -> &'static str {
        match self {
            QueryScope::Own => SELF_BASE,
            QueryScope::OnBehalfOf(_) => ADMIN_BASE,
        }
    }

    pub fn user_id(&self) -> Option<i64> {
        match self {
            QueryScope::Own => None,
            QueryScope::OnBehalfOf(id) => Some(*id),
        }
    }
}
