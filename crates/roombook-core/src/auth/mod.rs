//! Authentication module for tokens and session state.
//!
//! This module provides:
//! - `TokenStore`: storage abstraction for the access/refresh pair, with
//!   in-memory, file and OS keychain implementations
//! - `Session`: derived session state plus the event channel the host
//!   listens on for logouts
//! - `TokenClaims`: unverified, display-only decoding of the access token

pub mod claims;
pub mod file_store;
pub mod keyring_store;
pub mod session;
pub mod store;

pub use claims::{ClaimsError, TokenClaims};
pub use file_store::FileTokenStore;
pub use keyring_store::KeyringTokenStore;
pub use session::{Session, SessionEvent, SessionState, UserIdentity};
pub use store::{MemoryTokenStore, StoreError, StoredTokens, TokenKind, TokenPair, TokenStore};
