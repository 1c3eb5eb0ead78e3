use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

use super::store::{StoreError, StoreResult, StoredTokens, TokenKind, TokenPair, TokenStore};

/// Token file name in cache directory
const TOKEN_FILE: &str = "tokens.json";

/// Stores the token pair as one JSON document in the cache directory.
///
/// Writes go to a sibling temp file which is then renamed over the real one,
/// so readers see either the old pair or the new pair. `clear` deletes the
/// file, removing both tokens at once.
pub struct FileTokenStore {
    cache_dir: PathBuf,
    lock: Mutex<()>,
}

impl FileTokenStore {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self {
            cache_dir,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.cache_dir.join(TOKEN_FILE)
    }

    fn load(&self) -> StoreResult<StoredTokens> {
        let path = self.path();
        if !path.exists() {
            return Ok(StoredTokens::default());
        }
        let contents = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    fn save(&self, tokens: &StoredTokens) -> StoreResult<()> {
        let path = self.path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(tokens)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, contents)?;
        restrict_permissions(&tmp)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

impl TokenStore for FileTokenStore {
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
        match std::fs::remove_file(self.path()) {
            Ok(()) => {
                debug!("Token file removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
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
    use tempfile::TempDir;

    /// Store rooted in a fresh temp dir; hold the guard for the test's duration
    fn temp_store() -> (FileTokenStore, TempDir) {
        let tmp = tempfile::tempdir().expect("tempdir should be created");
        (FileTokenStore::new(tmp.path().join("cache")), tmp)
    }

    #[test]
    fn test_tokens_survive_new_instance() {
        let (store, tmp) = temp_store();
        store
            .set_pair(&TokenPair {
                access: "A1".to_string(),
                refresh: "R1".to_string(),
            })
            .unwrap();

        let reopened = FileTokenStore::new(tmp.path().join("cache"));
        assert_eq!(reopened.get(TokenKind::Access).unwrap().as_deref(), Some("A1"));
        assert_eq!(reopened.get(TokenKind::Refresh).unwrap().as_deref(), Some("R1"));
    }

    #[test]
    fn test_set_updates_single_token() {
        let (store, _tmp) = temp_store();
        store.set(TokenKind::Refresh, "R1").unwrap();
        store.set(TokenKind::Access, "X").unwrap();

        assert_eq!(store.get(TokenKind::Access).unwrap().as_deref(), Some("X"));
        assert_eq!(store.get(TokenKind::Refresh).unwrap().as_deref(), Some("R1"));
        assert!(!store.path().with_extension("json.tmp").exists());
    }

    #[test]
    fn test_clear_removes_file_and_is_idempotent() {
        let (store, _tmp) = temp_store();
        store.set(TokenKind::Access, "A1").unwrap();
        assert!(store.path().exists());

        store.clear().unwrap();
        assert!(!store.path().exists());
        assert_eq!(store.get(TokenKind::Access).unwrap(), None);
        assert_eq!(store.get(TokenKind::Refresh).unwrap(), None);

        store.clear().unwrap();
    }

    #[test]
    fn test_missing_directory_reads_as_empty() {
        let (store, _tmp) = temp_store();
        assert_eq!(store.get(TokenKind::Access).unwrap(), None);
        assert!(!store.path().exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_token_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let (store, _tmp) = temp_store();
        store.set(TokenKind::Access, "A1").unwrap();

        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let (store, _tmp) = temp_store();
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), "not json").unwrap();

        assert!(matches!(store.get(TokenKind::Access), Err(StoreError::Corrupt(_))));
    }
}
