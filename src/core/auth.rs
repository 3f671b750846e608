//! Roles and authorization policies
//!
//! Authentication (who is calling) happens in the `CurrentUser` extractor;
//! this module only decides whether a role may perform an operation.

use crate::core::error::{AppResult, AuthError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// User role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    #[default]
    User,
    Guide,
    LeadGuide,
    Admin,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::User, Role::Guide, Role::LeadGuide, Role::Admin];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Guide => "guide",
            Role::LeadGuide => "lead-guide",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| format!("unknown role '{s}'"))
    }
}

/// Roles allowed to perform an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthPolicy {
    allowed: Vec<Role>,
}

impl AuthPolicy {
    pub fn has_role(allowed: impl Into<Vec<Role>>) -> Self {
        AuthPolicy {
            allowed: allowed.into(),
        }
    }

    /// Admin and lead guides manage the tour catalogue
    pub fn tour_managers() -> Self {
        AuthPolicy::has_role([Role::Admin, Role::LeadGuide])
    }

    pub fn admin_only() -> Self {
        AuthPolicy::has_role([Role::Admin])
    }

    pub fn check(&self, role: Role) -> bool {
        self.allowed.contains(&role)
    }

    /// Like [`check`](Self::check) but fails with the forbidden error
    pub fn enforce(&self, role: Role) -> AppResult<()> {
        if self.check(role) {
            Ok(())
        } else {
            Err(AuthError::Forbidden.into())
        }
    }
}
