//! Session context injected into the API client.
//!
//! Tokens live behind a [`SessionStore`] so the client never reads storage
//! directly. The signed-in user's profile is cached alongside them.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use jsonwebtoken::{decode, DecodingKey, Validation};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::auth::UserProfile;

/// Key the tokens are persisted under.
pub const SESSION_KEY: &str = "authTokens";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTokens {
    pub access: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenClaims {
    exp: Option<i64>,
}

impl SessionTokens {
    pub fn new(access: impl Into<String>, refresh: Option<String>) -> Self {
        Self {
            access: access.into(),
            refresh,
        }
    }

    /// True when the access token is a JWT whose `exp` is in the past.
    /// Opaque tokens are never considered expired; the server decides.
    pub fn access_expired(&self) -> bool {
        let mut validation = Validation::default();
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        match decode::<TokenClaims>(&self.access, &DecodingKey::from_secret(&[]), &validation) {
            Ok(data) => data
                .claims
                .exp
                .map_or(false, |exp| exp <= Utc::now().timestamp()),
            Err(_) => false,
        }
    }
}

/// Storage backend for session tokens.
pub trait SessionStore: Send + Sync {
    fn load(&self) -> Option<SessionTokens>;
    fn save(&self, tokens: &SessionTokens) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    tokens: Mutex<Option<SessionTokens>>,
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Option<SessionTokens> {
        self.tokens.lock().clone()
    }

    fn save(&self, tokens: &SessionTokens) -> Result<()> {
        *self.tokens.lock() = Some(tokens.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.tokens.lock() = None;
        Ok(())
    }
}

/// Persists tokens in a small JSON key/value file, one entry per key,
/// the way browser local storage would hold them.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn read_entries(&self) -> Result<HashMap<String, Value>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read session file {}", self.path.display()))?;
        if raw.trim().is_empty() {
            return Ok(HashMap::new());
        }
        Ok(serde_json::from_str(&raw)?)
    }

    fn write_entries(&self, entries: &HashMap<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(entries)?)
            .with_context(|| format!("Failed to write session file {}", self.path.display()))
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Option<SessionTokens> {
        let entries = match self.read_entries() {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Ignoring unreadable session file: {:?}", e);
                return None;
            }
        };

        // Older front ends stored the value as a JSON string.
        let value = match entries.get(SESSION_KEY)? {
            Value::String(raw) => serde_json::from_str(raw).ok()?,
            other => other.clone(),
        };

        match serde_json::from_value(value) {
            Ok(tokens) => Some(tokens),
            Err(e) => {
                warn!("Ignoring malformed session entry: {}", e);
                None
            }
        }
    }

    fn save(&self, tokens: &SessionTokens) -> Result<()> {
        let mut entries = self.read_entries().unwrap_or_default();
        entries.insert(SESSION_KEY.to_string(), serde_json::to_value(tokens)?);
        self.write_entries(&entries)
    }

    fn clear(&self) -> Result<()> {
        let mut entries = self.read_entries().unwrap_or_default();
        if entries.remove(SESSION_KEY).is_some() {
            self.write_entries(&entries)?;
        }
        Ok(())
    }
}

/// Shared session handle: explicit get/set/clear over a store, plus the
/// cached profile of whoever is signed in.
pub struct Session {
    store: Box<dyn SessionStore>,
    user: RwLock<Option<UserProfile>>,
}

impl Session {
    pub fn new(store: Box<dyn SessionStore>) -> Self {
        Self {
            store,
            user: RwLock::new(None),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Box::new(MemorySessionStore::default()))
    }

    pub fn tokens(&self) -> Option<SessionTokens> {
        self.store.load()
    }

    pub fn is_authenticated(&self) -> bool {
        self.tokens().is_some()
    }

    pub fn set_tokens(&self, tokens: SessionTokens) {
        if let Err(e) = self.store.save(&tokens) {
            tracing::error!("Failed to persist session: {:?}", e);
        }
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        self.user.read().clone()
    }

    pub fn set_current_user(&self, user: Option<UserProfile>) {
        *self.user.write() = user;
    }

    /// Drops tokens and the cached profile.
    pub fn clear(&self) {
        debug!("clearing session");
        if let Err(e) = self.store.clear() {
            tracing::error!("Failed to clear session: {:?}", e);
        }
        *self.user.write() = None;
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("authenticated", &self.is_authenticated())
            .field("user", &self.user.read().as_ref().map(|u| u.id))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    fn token_expiring_in(offset: Duration) -> String {
        let claims = json!({
            "sub": uuid::Uuid::new_v4(),
            "exp": (Utc::now() + offset).timestamp(),
            "iat": Utc::now().timestamp(),
        });
        encode(&Header::default(), &claims, &EncodingKey::from_secret(b"secret")).unwrap()
    }

    #[test]
    fn test_expired_jwt_is_detected() {
        let tokens = SessionTokens::new(token_expiring_in(Duration::hours(-1)), None);
        assert!(tokens.access_expired());
    }

    #[test]
    fn test_live_jwt_is_not_expired() {
        let tokens = SessionTokens::new(token_expiring_in(Duration::hours(1)), None);
        assert!(!tokens.access_expired());
    }

    #[test]
    fn test_opaque_token_is_not_expired() {
        assert!(!SessionTokens::new("opaque-token", None).access_expired());
    }

    #[test]
    fn test_session_clear_drops_user_and_tokens() {
        let session = Session::in_memory();
        session.set_tokens(SessionTokens::new("abc", Some("def".into())));
        session.set_current_user(Some(UserProfile::named("alice")));
        assert!(session.is_authenticated());

        session.clear();
        assert!(!session.is_authenticated());
        assert!(session.current_user().is_none());
    }

    #[test]
    fn test_file_store_persists_under_fixed_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let store = FileSessionStore::new(&path);

        let tokens = SessionTokens::new("access-1", Some("refresh-1".into()));
        store.save(&tokens).unwrap();

        let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw[SESSION_KEY]["access"], "access-1");
        assert_eq!(FileSessionStore::new(&path).load(), Some(tokens));

        store.clear().unwrap();
        assert_eq!(store.load(), None);
    }

    #[test]
    fn test_file_store_reads_string_encoded_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(
            &path,
            json!({ SESSION_KEY: "{\"access\":\"a\",\"refresh\":\"r\"}" }).to_string(),
        )
        .unwrap();

        let tokens = FileSessionStore::new(&path).load().unwrap();
        assert_eq!(tokens.access, "a");
        assert_eq!(tokens.refresh.as_deref(), Some("r"));
    }

    #[test]
    fn test_file_store_ignores_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "not json").unwrap();
        assert_eq!(FileSessionStore::new(&path).load(), None);
    }
}
