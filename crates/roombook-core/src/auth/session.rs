use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::claims::TokenClaims;
use super::store::{StoreResult, TokenKind, TokenStore};

/// Capacity of the session event channel; slow receivers see `Lagged`.
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Who the stored access token says is logged in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub username: String,
    pub email: String,
    pub is_staff: bool,
    pub is_superuser: bool,
}

impl From<TokenClaims> for UserIdentity {
    fn from(claims: TokenClaims) -> Self {
        Self {
            username: claims.username,
            email: claims.email,
            is_staff: claims.is_staff,
            is_superuser: claims.is_superuser,
        }
    }
}

/// Session state, always derived from the stored access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    LoggedOut,
    LoggedIn(UserIdentity),
}

impl SessionState {
    /// Derive the state from an access token. Absent or undecodable tokens
    /// mean logged out.
    pub fn derive(access: Option<&str>) -> Self {
        match access.map(TokenClaims::decode) {
            Some(Ok(claims)) => SessionState::LoggedIn(claims.into()),
            _ => SessionState::LoggedOut,
        }
    }

    pub fn is_logged_in(&self) -> bool {
        matches!(self, SessionState::LoggedIn(_))
    }

    pub fn user(&self) -> Option<&UserIdentity> {
        match self {
            SessionState::LoggedIn(user) => Some(user),
            SessionState::LoggedOut => None,
        }
    }

    /// Username for display, empty when logged out
    pub fn display_name(&self) -> &str {
        self.user().map(|u| u.username.as_str()).unwrap_or("")
    }
}

/// Notifications for the host application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn { username: String },
    Renewed,
    /// Tokens are gone; the host should switch to its logged-out view.
    LoggedOut { reason: String },
}

/// Owns the token store and the event channel.
///
/// Clone is cheap: the store is behind an `Arc` and the broadcast sender is
/// itself reference-counted.
#[derive(Clone)]
pub struct Session {
    store: Arc<dyn TokenStore>,
    events: broadcast::Sender<SessionEvent>,
}

impl Session {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { store, events }
    }

    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Current state, read fresh from the store
    pub fn state(&self) -> StoreResult<SessionState> {
        let access = self.store.get(TokenKind::Access)?;
        Ok(SessionState::derive(access.as_deref()))
    }

    /// Startup check. A stored access token that cannot be decoded is
    /// treated as a broken session and both tokens are discarded.
    pub fn restore(&self) -> StoreResult<SessionState> {
        let Some(access) = self.store.get(TokenKind::Access)? else {
            debug!("No stored access token");
            return Ok(SessionState::LoggedOut);
        };

        match TokenClaims::decode(&access) {
            Ok(claims) => {
                debug!(username = %claims.username, "Session restored");
                Ok(SessionState::LoggedIn(claims.into()))
            }
            Err(e) => {
                warn!(error = %e, "Stored access token is undecodable, clearing session");
                self.store.clear()?;
                Ok(SessionState::LoggedOut)
            }
        }
    }

    /// Clear the tokens and tell the host the session ended.
    pub fn logout(&self, reason: &str) -> StoreResult<()> {
        self.store.clear()?;
        info!(reason, "Logged out");
        self.emit(SessionEvent::LoggedOut {
            reason: reason.to_string(),
        });
        Ok(())
    }

    pub(crate) fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}
