use std::path::PathBuf;

use crate::auth::Authenticator;
use crate::import::RosterImporter;
use crate::store::SqliteStore;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Per-process daemon state. The store exists once a workspace is
/// selected; the authenticator and importer are constructed up front and
/// handed the store on each call.
pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub store: Option<SqliteStore>,
    pub auth: Authenticator,
    pub importer: RosterImporter,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            workspace: None,
            store: None,
            auth: Authenticator::new(),
            importer: RosterImporter::new(),
        }
    }
}
