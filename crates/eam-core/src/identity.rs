//! Users, roles and the permission seam
//!
//! [`PermissionPolicy`] is what the service asks before mutating anything.
//! [`Directory`] is the role-based implementation loaded from configuration.

use eam_artifact::{ArtifactKind, UserId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Global application role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Architect,
    Editor,
    #[default]
    Viewer,
}

impl Role {
    /// Whether the role may modify artifacts at all
    #[inline]
    #[must_use]
    pub const fn can_write(self) -> bool {
        matches!(self, Self::Admin | Self::Architect | Self::Editor)
    }
}

/// Directory entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub role: Role,
    /// Kinds this user may not update even if the role allows writes
    #[serde(default)]
    pub read_only_kinds: Vec<ArtifactKind>,
}

impl UserRecord {
    #[must_use]
    pub fn new(id: impl Into<UserId>, username: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            role,
            read_only_kinds: Vec::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_read_only(mut self, kind: ArtifactKind) -> Self {
        self.read_only_kinds.push(kind);
        self
    }
}

/// Public projection of a user, attached to lock listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: UserId,
    pub username: String,
}

/// Authorisation questions asked by the version-control service
#[cfg_attr(test, mockall::automock)]
pub trait PermissionPolicy: Send + Sync {
    /// May `user` modify artifacts of `kind`
    fn can_update(&self, user: UserId, kind: ArtifactKind) -> bool;

    /// Admins may act on locks held by others
    fn is_admin(&self, user: UserId) -> bool;

    /// Resolve a user for display
    fn user(&self, user: UserId) -> Option<UserSummary>;
}

/// In-memory user directory
#[derive(Debug, Clone, Default)]
pub struct Directory {
    users: HashMap<UserId, UserRecord>,
}

impl Directory {
    #[must_use]
    pub fn new(users: impl IntoIterator<Item = UserRecord>) -> Self {
        Self {
            users: users.into_iter().map(|u| (u.id, u)).collect(),
        }
    }

    #[must_use]
    pub fn with_user(mut self, user: UserRecord) -> Self {
        self.users.insert(user.id, user);
        self
    }

    #[must_use]
    pub fn get(&self, user: UserId) -> Option<&UserRecord> {
        self.users.get(&user)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl PermissionPolicy for Directory {
    fn can_update(&self, user: UserId, kind: ArtifactKind) -> bool {
        self.users
            .get(&user)
            .is_some_and(|u| u.role.can_write() && !u.read_only_kinds.contains(&kind))
    }

    fn is_admin(&self, user: UserId) -> bool {
        self.users.get(&user).is_some_and(|u| u.role == Role::Admin)
    }

    fn user(&self, user: UserId) -> Option<UserSummary> {
        self.users.get(&user).map(|u| UserSummary {
            id: u.id,
            username: u.username.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> Directory {
        Directory::new([
            UserRecord::new(1, "alice", Role::Editor),
            UserRecord::new(2, "bob", Role::Viewer),
            UserRecord::new(9, "root", Role::Admin),
            UserRecord::new(3, "carol", Role::Architect).with_read_only(ArtifactKind::ChangeRequest),
        ])
    }

    #[test]
    fn editors_can_update_viewers_cannot() {
        let dir = directory();
        assert!(dir.can_update(UserId(1), ArtifactKind::Application));
        assert!(!dir.can_update(UserId(2), ArtifactKind::Application));
        assert!(!dir.can_update(UserId(404), ArtifactKind::Application));
    }

    #[test]
    fn read_only_kinds_are_enforced() {
        let dir = directory();
        assert!(dir.can_update(UserId(3), ArtifactKind::Interface));
        assert!(!dir.can_update(UserId(3), ArtifactKind::ChangeRequest));
    }

    #[test]
    fn only_admin_role_is_admin() {
        let dir = directory();
        assert!(dir.is_admin(UserId(9)));
        assert!(!dir.is_admin(UserId(3)));
        assert_eq!(dir.user(UserId(1)).map(|u| u.username), Some("alice".into()));
    }
}
