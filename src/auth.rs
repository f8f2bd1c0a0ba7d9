use crate::store::{Filter, Query, Record, RecordStore, StoreError, StoreErrorKind};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::path::PathBuf;

/// Default credential handed to every imported parent. Known-insecure
/// convenience carried over from the source system.
pub const DEFAULT_PARENT_PASSWORD: &str = "parent123";

/// File name of the persisted session inside the workspace.
const SESSION_FILE: &str = "session.json";

/// The authenticated identity for the lifetime of this daemon process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub username: String,
    pub name: String,
    pub role: String,
}

/// A row in the users table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub username: String,
    pub password: String,
    pub name: String,
    pub role: String,
}

impl Credential {
    pub fn to_record(&self) -> Record {
        let mut rec = Record::new();
        rec.insert("username".into(), json!(self.username));
        rec.insert("password".into(), json!(self.password));
        rec.insert("name".into(), json!(self.name));
        rec.insert("role".into(), json!(self.role));
        rec
    }
}

#[derive(Debug)]
pub enum AuthError {
    InvalidCredentials,
    DuplicateUsername,
    NotAuthenticated,
    IncorrectPassword,
    Store(StoreError),
}

impl AuthError {
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::DuplicateUsername => "duplicate_username",
            AuthError::NotAuthenticated => "not_authenticated",
            AuthError::IncorrectPassword => "incorrect_password",
            AuthError::Store(_) => "store_error",
        }
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::InvalidCredentials => write!(f, "Invalid User ID or password"),
            AuthError::DuplicateUsername => write!(f, "Username already exists"),
            AuthError::NotAuthenticated => write!(f, "Not authenticated"),
            AuthError::IncorrectPassword => write!(f, "Current password is incorrect"),
            AuthError::Store(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        AuthError::Store(e)
    }
}

/// Holds the current Session in memory and mirrors it to a flat JSON file
/// under the workspace. Reads never fail; anything unreadable is no session.
#[derive(Debug, Default)]
pub struct SessionCache {
    current: Option<Session>,
    path: Option<PathBuf>,
}

impl SessionCache {
    pub fn attach(&mut self, workspace: &std::path::Path) {
        self.path = Some(workspace.join(SESSION_FILE));
    }

    pub fn store(&mut self, session: Session) {
        if let Some(path) = &self.path {
            if let Ok(text) = serde_json::to_string(&session) {
                let _ = std::fs::write(path, text);
            }
        }
        self.current = Some(session);
    }

    pub fn current(&mut self) -> Option<Session> {
        if self.current.is_none() {
            self.current = self.rehydrate();
        }
        self.current.clone()
    }

    pub fn clear(&mut self) {
        self.current = None;
        if let Some(path) = &self.path {
            let _ = std::fs::remove_file(path);
        }
    }

    fn rehydrate(&self) -> Option<Session> {
        let path = self.path.as_ref()?;
        let text = std::fs::read_to_string(path).ok()?;
        serde_json::from_str(&text).ok()
    }
}

/// Validates credentials against the users table and owns the session
/// cache. The store is passed per call; the authenticator is constructed
/// once and carried in the daemon state.
#[derive(Debug, Default)]
pub struct Authenticator {
    session: SessionCache,
}

impl Authenticator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach_storage(&mut self, workspace: &std::path::Path) {
        self.session.attach(workspace);
    }

    /// Equality lookup on both username and password. Zero matches is one
    /// error kind for both wrong-username and wrong-password; the store
    /// does not say which.
    pub fn login(
        &mut self,
        store: &dyn RecordStore,
        username: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        let q = Query {
            filters: vec![
                Filter::eq("username", json!(username)),
                Filter::eq("password", json!(password)),
            ],
            limit: Some(1),
            ..Query::default()
        };
        let rows = store.query("users", &q)?;
        let Some(row) = rows.into_iter().next() else {
            return Err(AuthError::InvalidCredentials);
        };

        let session = Session {
            username: field(&row, "username"),
            name: field(&row, "name"),
            role: field(&row, "role"),
        };
        self.session.store(session.clone());
        Ok(session)
    }

    /// One atomic insert; the store's uniqueness constraint on username is
    /// the duplicate check.
    pub fn register(
        &self,
        store: &dyn RecordStore,
        credential: &Credential,
    ) -> Result<Credential, AuthError> {
        match store.insert("users", &[credential.to_record()]) {
            Ok(_) => Ok(credential.clone()),
            Err(e) if e.kind == StoreErrorKind::Conflict => Err(AuthError::DuplicateUsername),
            Err(e) => Err(AuthError::Store(e)),
        }
    }

    pub fn logout(&mut self) {
        self.session.clear();
    }

    pub fn current_user(&mut self) -> Option<Session> {
        self.session.current()
    }

    pub fn is_authenticated(&mut self) -> bool {
        self.current_user().is_some()
    }

    pub fn require_auth(&mut self) -> bool {
        self.is_authenticated()
    }

    pub fn change_password(
        &mut self,
        store: &dyn RecordStore,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let Some(user) = self.current_user() else {
            return Err(AuthError::NotAuthenticated);
        };

        let q = Query {
            filters: vec![Filter::eq("username", json!(user.username))],
            limit: Some(1),
            ..Query::default()
        };
        let rows = store.query("users", &q)?;
        let stored = rows
            .into_iter()
            .next()
            .and_then(|r| r.get("password").and_then(|v| v.as_str()).map(String::from));
        if stored.as_deref() != Some(old_password) {
            return Err(AuthError::IncorrectPassword);
        }

        let mut changes = Record::new();
        changes.insert("password".into(), json!(new_password));
        store.update(
            "users",
            &[Filter::eq("username", json!(user.username))],
            &changes,
        )?;
        Ok(())
    }
}

fn field(row: &Record, name: &str) -> String {
    row.get(name)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
