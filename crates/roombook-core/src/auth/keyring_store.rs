use std::sync::Mutex;

use keyring::Entry;

use super::store::{StoreError, StoreResult, StoredTokens, TokenKind, TokenPair, TokenStore};

const SERVICE_NAME: &str = "roombook";

/// Keeps the token pair in the OS keychain.
///
/// Both tokens live in a single keychain secret (serialized JSON), one entry
/// per API host, so replacing or deleting the pair is a single keychain call.
pub struct KeyringTokenStore {
    account: String,
    lock: Mutex<()>,
}

impl KeyringTokenStore {
    /// `account` names the keychain entry, normally the API host
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            lock: Mutex::new(()),
        }
    }

    fn entry(&self) -> StoreResult<Entry> {
        Ok(Entry::new(SERVICE_NAME, &self.account)?)
    }

    fn load(&self) -> StoreResult<StoredTokens> {
        match self.entry()?.get_password() {
            Ok(secret) => Ok(serde_json::from_str(&secret)?),
            Err(keyring::Error::NoEntry) => Ok(StoredTokens::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, tokens: &StoredTokens) -> StoreResult<()> {
        let secret = serde_json::to_string(tokens)?;
        self.entry()?.set_password(&secret)?;
        Ok(())
    }
}

impl TokenStore for KeyringTokenStore {
    fn get(&self, kind: TokenKind) -> StoreResult<Option<String>> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(self.load()?.get(kind).map(str::to_string))
    }

    fn set(&self, kind: TokenKind, value: &str) -> StoreResult<()> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        let mut tokens = self.load()?;
        tokens.set(kind, value);
        self.save(&tokens)
    }

    fn clear(&self) -> StoreResult<()> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn set_pair(&self, pair: &TokenPair) -> StoreResult<()> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        self.save(&StoredTokens::from(pair))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Keyring's in-process mock: every entry starts out empty
    fn mock_store(account: &str) -> KeyringTokenStore {
        keyring::set_default_credential_builder(keyring::mock::default_credential_builder());
        KeyringTokenStore::new(account)
    }

    #[test]
    fn test_missing_entry_reads_as_empty() {
        let store = mock_store("rooms.example.com");
        assert_eq!(store.get(TokenKind::Access).unwrap(), None);
        assert_eq!(store.get(TokenKind::Refresh).unwrap(), None);
    }

    #[test]
    fn test_clearing_missing_entry_succeeds() {
        let store = mock_store("rooms.example.com");
        store.clear().unwrap();
        store.clear().unwrap();
    }

    #[test]
    fn test_set_and_set_pair_succeed() {
        let store = mock_store("rooms.example.com");
        store
            .set_pair(&TokenPair {
                access: "A1".to_string(),
                refresh: "R1".to_string(),
            })
            .unwrap();
        store.set(TokenKind::Access, "A2").unwrap();
    }
}
