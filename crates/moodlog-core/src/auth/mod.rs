//! Signed-in user identity consumed by the sync engine.

use std::fmt;
use std::sync::{PoisonError, RwLock};

use crate::util::normalize_text_option;

/// Source of the currently signed-in user's id.
///
/// Read at session start; a missing id means nothing syncs.
pub trait IdentityProvider: Send + Sync {
    fn current_user_id(&self) -> Option<String>;
}

/// Identity held in memory and switched by sign-in/sign-out.
#[derive(Default)]
pub struct SessionIdentity {
    user_id: RwLock<Option<String>>,
}

impl SessionIdentity {
    /// Identity already signed in as `user_id`. Blank ids count as signed out.
    pub fn signed_in(user_id: impl Into<String>) -> Self {
        Self {
            user_id: RwLock::new(normalize_text_option(Some(user_id.into()))),
        }
    }

    pub fn signed_out() -> Self {
        Self::default()
    }

    /// Sign in as `user_id`; returns `false` when the id is blank.
    pub fn sign_in(&self, user_id: impl Into<String>) -> bool {
        let user_id = normalize_text_option(Some(user_id.into()));
        let signed_in = user_id.is_some();
        *self.user_id.write().unwrap_or_else(PoisonError::into_inner) = user_id;
        signed_in
    }

    pub fn sign_out(&self) {
        *self.user_id.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl IdentityProvider for SessionIdentity {
    fn current_user_id(&self) -> Option<String> {
        self.user_id
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl fmt::Debug for SessionIdentity {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SessionIdentity")
            .field("user_id", &self.current_user_id())
            .finish()
    }
}
