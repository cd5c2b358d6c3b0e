//! Subset of the Discord REST payloads the adapter reads.

use serde::Deserialize;

/// Bit for the "Administrator" permission.
pub const ADMINISTRATOR: u64 = 1 << 3;
/// Bit for the "Manage Roles" permission.
pub const MANAGE_ROLES: u64 = 1 << 28;

#[derive(Debug, Clone, Deserialize)]
pub struct Role {
    pub id: String,
    pub name: String,
    pub position: i64,
    /// Permission bitfield, serialized by Discord as a decimal string.
    #[serde(default)]
    pub permissions: String,
}

impl Role {
    pub fn permission_bits(&self) -> u64 {
        self.permissions.parse().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub global_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Member {
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub nick: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl Member {
    /// Guild nickname, then global display name, then username.
    pub fn display_name(&self) -> Option<String> {
        if let Some(nick) = &self.nick {
            return Some(nick.clone());
        }
        let user = self.user.as_ref()?;
        Some(
            user.global_name
                .clone()
                .unwrap_or_else(|| user.username.clone()),
        )
    }
}
