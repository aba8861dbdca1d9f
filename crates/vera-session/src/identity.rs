//! Identity collaborator.
//!
//! Token acquisition lives outside this crate. The launcher only needs the
//! current user and a way to ask "did the credential change?", which is what
//! [`IdentityProvider`] exposes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use thiserror::Error;

use crate::protocol::{session_info, SessionMessage};

/// The signed-in user as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub name: String,
    pub credential: String,
}

impl UserIdentity {
    pub fn new(name: impl Into<String>, credential: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            credential: credential.into(),
        }
    }
}

/// The launcher's latest view of the session credential.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialSnapshot {
    pub user_name: Option<String>,
    pub credential: Option<String>,
}

impl CredentialSnapshot {
    pub fn to_message(&self) -> SessionMessage {
        session_info(self.user_name.clone(), self.credential.clone())
    }
}

impl From<Option<UserIdentity>> for CredentialSnapshot {
    fn from(user: Option<UserIdentity>) -> Self {
        match user {
            Some(user) => Self {
                user_name: Some(user.name),
                credential: Some(user.credential),
            },
            None => Self::default(),
        }
    }
}

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("Identity provider unavailable: {0}")]
    Unavailable(String),

    #[error("Credential refresh failed: {0}")]
    RefreshFailed(String),
}

pub trait IdentityProvider: Send + Sync {
    /// The signed-in user, or `None` when nobody is signed in.
    fn current_user(&self) -> Result<Option<UserIdentity>, IdentityError>;

    /// Refresh the credential if needed. Returns true when a new credential
    /// was obtained since the last call.
    fn refresh(&self) -> Result<bool, IdentityError>;
}

/// Identity held in memory; credential changes are made by hand.
#[derive(Debug, Default)]
pub struct StaticIdentity {
    user: Mutex<Option<UserIdentity>>,
    refreshed: AtomicBool,
}

impl StaticIdentity {
    pub fn new(user: Option<UserIdentity>) -> Self {
        Self {
            user: Mutex::new(user),
            refreshed: AtomicBool::new(false),
        }
    }

    pub fn signed_in(name: impl Into<String>, credential: impl Into<String>) -> Self {
        Self::new(Some(UserIdentity::new(name, credential)))
    }

    /// Replace the credential; the next `refresh` reports it.
    pub fn rotate_credential(&self, credential: impl Into<String>) {
        if let Some(user) = self.user.lock().unwrap().as_mut() {
            user.credential = credential.into();
            self.refreshed.store(true, Ordering::SeqCst);
        }
    }

    pub fn sign_out(&self) {
        *self.user.lock().unwrap() = None;
        self.refreshed.store(true, Ordering::SeqCst);
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_user(&self) -> Result<Option<UserIdentity>, IdentityError> {
        Ok(self.user.lock().unwrap().clone())
    }

    fn refresh(&self) -> Result<bool, IdentityError> {
        Ok(self.refreshed.swap(false, Ordering::SeqCst))
    }
}
