use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::{IntakeError, IntakeResult};

/// A user known to the identity provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub uid: String,
    /// Registered email, if the account has one
    pub email: Option<String>,
}

/// Identity provider capability: resolve a user id to its registered email
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    /// Fails with [`IntakeError::UserNotFound`] when the id is unknown
    async fn lookup_user(&self, uid: &str) -> IntakeResult<UserRecord>;
}

/// Fixed set of users, for tests and local runs
#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    users: HashMap<String, Option<String>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, uid: impl Into<String>, email: impl Into<String>) -> Self {
        self.users.insert(uid.into(), Some(email.into()));
        self
    }

    /// Account without an email address
    pub fn with_user_without_email(mut self, uid: impl Into<String>) -> Self {
        self.users.insert(uid.into(), None);
        self
    }
}

#[async_trait]
impl IdentityDirectory for InMemoryDirectory {
    async fn lookup_user(&self, uid: &str) -> IntakeResult<UserRecord> {
        self.users
            .get(uid)
            .map(|email| UserRecord {
                uid: uid.to_string(),
                email: email.clone(),
            })
            .ok_or_else(|| IntakeError::UserNotFound(uid.to_string()))
    }
}
