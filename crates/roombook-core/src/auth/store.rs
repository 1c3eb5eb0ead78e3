//! Token storage for the access/refresh pair.
//!
//! The `TokenStore` trait is the only way the rest of the crate reads or
//! writes tokens. Implementations must make `clear` remove both tokens in
//! one step: an observer never sees a lone access or refresh token left
//! behind after a logout.

use std::fmt;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    /// Fixed key name, matching the field names the token endpoints use
    pub fn key(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

/// Token pair as issued by `/token/`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access", &"<redacted>")
            .field("refresh", &"<redacted>")
            .finish()
    }
}

/// Persisted form of the pair. Either side may be missing.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredTokens {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh: Option<String>,
}

impl StoredTokens {
    pub fn get(&self, kind: TokenKind) -> Option<&str> {
        match kind {
            TokenKind::Access => self.access.as_deref(),
            TokenKind::Refresh => self.refresh.as_deref(),
        }
    }

    pub fn set(&mut self, kind: TokenKind, value: &str) {
        let slot = match kind {
            TokenKind::Access => &mut self.access,
            TokenKind::Refresh => &mut self.refresh,
        };
        *slot = Some(value.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.access.is_none() && self.refresh.is_none()
    }
}

impl From<&TokenPair> for StoredTokens {
    fn from(pair: &TokenPair) -> Self {
        Self {
            access: Some(pair.access.clone()),
            refresh: Some(pair.refresh.clone()),
        }
    }
}

impl fmt::Debug for StoredTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredTokens")
            .field("access", &self.access.as_ref().map(|_| "<redacted>"))
            .field("refresh", &self.refresh.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Token file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stored token data is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("Keychain error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("Token store lock poisoned")]
    Poisoned,
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Durable key/value storage for the session token pair.
pub trait TokenStore: Send + Sync {
    fn get(&self, kind: TokenKind) -> StoreResult<Option<String>>;

    fn set(&self, kind: TokenKind, value: &str) -> StoreResult<()>;

    /// Remove both tokens in a single operation.
    fn clear(&self) -> StoreResult<()>;

    /// Replace the whole pair. Stores backed by a single document override
    /// this to write once.
    fn set_pair(&self, pair: &TokenPair) -> StoreResult<()> {
        self.set(TokenKind::Access, &pair.access)?;
        self.set(TokenKind::Refresh, &pair.refresh)
    }
}

/// In-process token store. Nothing survives a restart; used by tests and
/// by hosts that manage persistence themselves.
#[derive(Default)]
pub struct MemoryTokenStore {
    tokens: Mutex<StoredTokens>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a pair already present
    pub fn with_pair(pair: &TokenPair) -> Self {
        Self {
            tokens: Mutex::new(StoredTokens::from(pair)),
        }
    }

    pub fn snapshot(&self) -> StoreResult<StoredTokens> {
        Ok(self.tokens.lock().map_err(|_| StoreError::Poisoned)?.clone())
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self, kind: TokenKind) -> StoreResult<Option<String>> {
        let tokens = self.tokens.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(tokens.get(kind).map(str::to_string))
    }

    fn set(&self, kind: TokenKind, value: &str) -> StoreResult<()> {
        let mut tokens = self.tokens.lock().map_err(|_| StoreError::Poisoned)?;
        tokens.set(kind, value);
        Ok(())
    }

    fn clear(&self) -> StoreResult<()> {
        let mut tokens = self.tokens.lock().map_err(|_| StoreError::Poisoned)?;
        *tokens = StoredTokens::default();
        Ok(())
    }

    fn set_pair(&self, pair: &TokenPair) -> StoreResult<()> {
        let mut tokens = self.tokens.lock().map_err(|_| StoreError::Poisoned)?;
        *tokens = StoredTokens::from(pair);
        Ok(())
    }
}
