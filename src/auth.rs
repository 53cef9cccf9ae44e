//! Session resolution against the external auth service.
//!
//! Authentication is consumed, not reimplemented: the core only needs "who
//! is the current user, if anyone". [`StaticAuth`] covers embedding and
//! tests; a real deployment implements [`AuthProvider`] over its auth SDK.

use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::AuthError;

/// Resolved authenticated user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: String,
    pub email: Option<String>,
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Resolve the current session, `None` when signed out.
    async fn current_user(&self) -> Result<Option<AuthUser>, AuthError>;
}

/// Fixed-session provider. Holds the signed-in user (or none) explicitly
/// rather than as ambient global state.
#[derive(Debug, Default)]
pub struct StaticAuth {
    user: RwLock<Option<AuthUser>>,
}

impl StaticAuth {
    pub fn signed_out() -> Self {
        Self::default()
    }

    pub fn signed_in(id: impl Into<String>) -> Self {
        Self {
            user: RwLock::new(Some(AuthUser {
                id: id.into(),
                email: None,
            })),
        }
    }

    pub fn set_user(&self, user: Option<AuthUser>) {
        *self.user.write().expect("auth lock poisoned") = user;
    }
}

#[async_trait]
impl AuthProvider for StaticAuth {
    async fn current_user(&self) -> Result<Option<AuthUser>, AuthError> {
        Ok(self.user.read().expect("auth lock poisoned").clone())
    }
}
