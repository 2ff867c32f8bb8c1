//! Session state for the catalog API.
//!
//! The store is the single source of truth for "is the user authenticated".
//! Every component that needs the bearer token reads it from here lazily at
//! call time, so a logout is observed by the very next outbound request.
//! Only the token and email survive a restart; loading flags and error
//! messages are transient.

use anyhow::{Context, Result};
use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

const SESSION_FILE: &str = "session.json";

/// A point-in-time snapshot of the session.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub token: Option<String>,
    pub email: Option<String>,
    pub loading: bool,
    pub last_error: Option<String>,
}

impl Session {
    /// Authenticated exactly when a token is present.
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }
}

/// The fields that are written to disk. Transient state never persists.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedSession {
    token: Option<String>,
    email: Option<String>,
}

/// Process-wide session store backed by an atomically swapped snapshot.
pub struct SessionStore {
    current: ArcSwap<Session>,
    /// Path of the persisted session file, if persistence is enabled.
    file: Option<PathBuf>,
}

impl SessionStore {
    /// Create an empty, non-persistent store (used by tests).
    pub fn in_memory() -> Self {
        Self {
            current: ArcSwap::from_pointee(Session::default()),
            file: None,
        }
    }

    /// Create a store persisted under `data_dir`, restoring any prior session.
    pub fn open(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data dir: {}", data_dir.display()))?;
        let file = data_dir.join(SESSION_FILE);

        let session = match std::fs::read_to_string(&file) {
            Ok(content) => match serde_json::from_str::<PersistedSession>(&content) {
                Ok(persisted) => {
                    if persisted.token.is_some() {
                        debug!("Restored session for {:?}", persisted.email);
                    }
                    Session {
                        token: persisted.token,
                        email: persisted.email,
                        ..Session::default()
                    }
                }
                Err(e) => {
                    warn!("Ignoring unreadable session file: {}", e);
                    Session::default()
                }
            },
            Err(_) => Session::default(),
        };

        Ok(Self {
            current: ArcSwap::from_pointee(session),
            file: Some(file),
        })
    }

    /// Current snapshot of the session.
    pub fn snapshot(&self) -> Arc<Session> {
        self.current.load_full()
    }

    /// The bearer token, if authenticated.
    pub fn token(&self) -> Option<String> {
        self.current.load().token.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.current.load().is_authenticated()
    }

    /// Mark the start of an authentication attempt.
    pub fn begin_login(&self) {
        self.swap(|s| Session {
            loading: true,
            last_error: None,
            ..s
        });
    }

    /// Store a freshly issued token and the email it was issued for.
    pub fn establish(&self, token: String, email: String) {
        self.current.store(Arc::new(Session {
            token: Some(token),
            email: Some(email),
            loading: false,
            last_error: None,
        }));
        self.persist();
    }

    /// Record a failed authentication attempt without touching credentials.
    pub fn fail_login(&self, message: impl Into<String>) {
        let message = message.into();
        self.swap(|s| Session {
            loading: false,
            last_error: Some(message.clone()),
            ..s
        });
    }

    /// Clear token, email, and error. Synchronous and idempotent.
    pub fn logout(&self) {
        self.current.store(Arc::new(Session::default()));
        self.persist();
    }

    pub fn clear_error(&self) {
        self.swap(|s| Session {
            last_error: None,
            ..s
        });
    }

    fn swap(&self, f: impl Fn(Session) -> Session) {
        self.current.rcu(|old| Arc::new(f((**old).clone())));
    }

    /// Write token/email to disk, replacing the file atomically.
    fn persist(&self) {
        let Some(file) = &self.file else {
            return;
        };
        let snapshot = self.current.load();
        let persisted = PersistedSession {
            token: snapshot.token.clone(),
            email: snapshot.email.clone(),
        };

        if let Err(e) = write_atomic(file, &persisted) {
            warn!("Failed to persist session: {:#}", e);
        }
    }
}

fn write_atomic(path: &Path, persisted: &PersistedSession) -> Result<()> {
    let dir = path.parent().context("Session file has no parent dir")?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .context("Failed to create temporary session file")?;
    let content = serde_json::to_vec_pretty(persisted)?;
    tmp.write_all(&content)?;
    tmp.persist(path).context("Failed to replace session file")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_store_is_unauthenticated() {
        let store = SessionStore::in_memory();
        assert!(!store.is_authenticated());
        assert!(store.token().is_none());
    }

    #[test]
    fn test_authenticated_iff_token_present() {
        let store = SessionStore::in_memory();

        // Exercise every transition and check the invariant after each step.
        let steps: Vec<Box<dyn Fn(&SessionStore)>> = vec![
            Box::new(|s| s.begin_login()),
            Box::new(|s| s.fail_login("Failed to authenticate. Please try again.")),
            Box::new(|s| s.establish("tok-1".into(), "user@example.com".into())),
            Box::new(|s| s.establish("tok-2".into(), "user@example.com".into())),
            Box::new(|s| s.logout()),
            Box::new(|s| s.logout()),
        ];

        for step in steps {
            step(&store);
            let snapshot = store.snapshot();
            assert_eq!(snapshot.is_authenticated(), snapshot.token.is_some());
        }
    }

    #[test]
    fn test_establish_replaces_prior_state_wholesale() {
        let store = SessionStore::in_memory();
        store.begin_login();
        store.fail_login("Failed to authenticate. Please try again.");

        store.establish("tok".into(), "user@example.com".into());
        let snapshot = store.snapshot();
        assert_eq!(snapshot.token.as_deref(), Some("tok"));
        assert_eq!(snapshot.email.as_deref(), Some("user@example.com"));
        assert!(!snapshot.loading);
        assert!(snapshot.last_error.is_none());
    }

    #[test]
    fn test_failed_login_records_error() {
        let store = SessionStore::in_memory();
        store.begin_login();
        assert!(store.snapshot().loading);

        store.fail_login("Failed to authenticate. Please try again.");
        let snapshot = store.snapshot();
        assert!(!snapshot.loading);
        assert!(!snapshot.is_authenticated());
        assert_eq!(
            snapshot.last_error.as_deref(),
            Some("Failed to authenticate. Please try again.")
        );
    }

    #[test]
    fn test_logout_is_idempotent_and_clears_error() {
        let store = SessionStore::in_memory();
        store.establish("tok".into(), "user@example.com".into());
        store.fail_login("boom");

        store.logout();
        store.logout();

        let snapshot = store.snapshot();
        assert!(snapshot.token.is_none());
        assert!(snapshot.email.is_none());
        assert!(snapshot.last_error.is_none());
    }

    #[test]
    fn test_session_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();

        {
            let store = SessionStore::open(dir.path()).unwrap();
            store.establish("tok-persist".into(), "user@example.com".into());
        }

        let store = SessionStore::open(dir.path()).unwrap();
        assert!(store.is_authenticated());
        assert_eq!(store.token().as_deref(), Some("tok-persist"));
        assert_eq!(store.snapshot().email.as_deref(), Some("user@example.com"));
    }

    #[test]
    fn test_transient_fields_are_not_persisted() {
        let dir = tempfile::tempdir().unwrap();

        {
            let store = SessionStore::open(dir.path()).unwrap();
            store.establish("tok".into(), "user@example.com".into());
            store.fail_login("transient error");
        }

        let store = SessionStore::open(dir.path()).unwrap();
        let snapshot = store.snapshot();
        assert!(snapshot.last_error.is_none());
        assert!(!snapshot.loading);
    }

    #[test]
    fn test_logout_clears_persisted_session() {
        let dir = tempfile::tempdir().unwrap();

        {
            let store = SessionStore::open(dir.path()).unwrap();
            store.establish("tok".into(), "user@example.com".into());
            store.logout();
        }

        let store = SessionStore::open(dir.path()).unwrap();
        assert!(!store.is_authenticated());
    }

    #[test]
    fn test_corrupt_session_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SESSION_FILE), "not json").unwrap();

        let store = SessionStore::open(dir.path()).unwrap();
        assert!(!store.is_authenticated());
    }
}
