//! Session credentials and lifecycle state.

use std::fmt;

use crate::error::Result;
use crate::storage::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, TokenStore};

/// The bearer credentials of one signed-in member.  Both tokens are opaque.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl Session {
    pub fn new(access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
        Self {
            access_token: Some(access_token.into()),
            refresh_token,
        }
    }

    /// Reads both tokens from durable storage.
    pub fn load(store: &dyn TokenStore) -> Result<Self> {
        Ok(Self {
            access_token: store.get(ACCESS_TOKEN_KEY)?,
            refresh_token: store.get(REFRESH_TOKEN_KEY)?,
        })
    }

    /// Writes the tokens that are present; absent tokens are left as stored.
    pub fn save(&self, store: &dyn TokenStore) -> Result<()> {
        if let Some(access_token) = &self.access_token {
            store.set(ACCESS_TOKEN_KEY, access_token)?;
        }
        if let Some(refresh_token) = &self.refresh_token {
            store.set(REFRESH_TOKEN_KEY, refresh_token)?;
        }
        Ok(())
    }

    /// Writes this session over whatever is stored, erasing the keys of
    /// tokens this session does not hold.
    pub fn replace(&self, store: &dyn TokenStore) -> Result<()> {
        match &self.access_token {
            Some(access_token) => store.set(ACCESS_TOKEN_KEY, access_token)?,
            None => store.remove(ACCESS_TOKEN_KEY)?,
        }
        match &self.refresh_token {
            Some(refresh_token) => store.set(REFRESH_TOKEN_KEY, refresh_token),
            None => store.remove(REFRESH_TOKEN_KEY),
        }
    }

    /// Removes both keys from durable storage.
    pub fn erase(store: &dyn TokenStore) -> Result<()> {
        let access = store.remove(ACCESS_TOKEN_KEY);
        let refresh = store.remove(REFRESH_TOKEN_KEY);
        access.and(refresh)
    }

    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none()
    }
}

// Tokens stay out of logs.
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Where a session client is in its lifecycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No usable credentials.
    Anonymous,
    /// A login or registration is in flight.
    Authenticating,
    /// Holding an access token.
    Authenticated,
    /// A token refresh is in flight.
    RefreshPending,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Anonymous => write!(f, "anonymous"),
            SessionState::Authenticating => write!(f, "authenticating"),
            SessionState::Authenticated => write!(f, "authenticated"),
            SessionState::RefreshPending => write!(f, "refresh_pending"),
        }
    }
}
