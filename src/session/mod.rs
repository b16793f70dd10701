//! Viewer session module.
//!
//! The single boundary that reads the persisted viewer identity (`currentUser`)
//! and bearer credential (`token`). Everything downstream receives a
//! [`ViewerContext`] explicitly instead of re-reading storage.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{ClientError, ClientResult};
use crate::models::{Role, UserId, UserSummary};
use crate::realtime::EventBus;

/// Persisted shape, keyed like the browser storage it replaces.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
struct StoredSession {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    current_user: Option<UserSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token: Option<String>,
}

/// Identity of the viewer as threaded into sync types.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerContext {
    pub user: UserSummary,
}

impl ViewerContext {
    pub fn new(user: UserSummary) -> Self {
        Self { user }
    }

    pub fn id(&self) -> &str {
        &self.user.id
    }

    /// Whether an event's actor is the viewer.
    pub fn is_self(&self, actor_id: &str) -> bool {
        !actor_id.is_empty() && self.user.id == actor_id
    }

    pub fn is_admin(&self) -> bool {
        self.user.role == Role::Admin
    }
}

/// Outcome of the pre-dispatch authentication check.
#[derive(Debug, Clone, PartialEq)]
pub enum Gate {
    Proceed(ViewerContext),
    RedirectToLogin,
}

/// Signed-in state backed by a JSON file.
#[derive(Debug, Clone)]
pub struct Session {
    path: PathBuf,
    stored: StoredSession,
}

impl Session {
    /// Load the session at `path`. A missing file is a signed-out session.
    pub fn load(path: &Path) -> ClientResult<Self> {
        let stored = match std::fs::read_to_string(path) {
            Ok(text) if text.trim().is_empty() => StoredSession::default(),
            Ok(text) => serde_json::from_str(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoredSession::default(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path: path.to_path_buf(),
            stored,
        })
    }

    /// Record a successful login and persist it.
    pub fn login(&mut self, user: UserSummary, token: impl Into<String>) -> ClientResult<()> {
        tracing::info!("Viewer {} signed in", user.id);
        self.stored = StoredSession {
            current_user: Some(user),
            token: Some(token.into()),
        };
        self.persist()
    }

    /// Clear the viewer and close the event bus so no subscription keeps
    /// acting for the previous viewer.
    pub fn logout(&mut self, bus: &EventBus) -> ClientResult<()> {
        tracing::info!("Viewer signed out");
        bus.close();
        self.stored = StoredSession::default();
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.stored.token.as_deref()
    }

    pub fn viewer_id(&self) -> Option<&UserId> {
        self.stored.current_user.as_ref().map(|u| &u.id)
    }

    pub fn is_authenticated(&self) -> bool {
        self.stored.current_user.is_some() && self.stored.token.is_some()
    }

    /// Viewer context, or `Unauthenticated` when signed out.
    pub fn require_viewer(&self) -> ClientResult<ViewerContext> {
        match (&self.stored.current_user, &self.stored.token) {
            (Some(user), Some(_)) => Ok(ViewerContext::new(user.clone())),
            _ => Err(ClientError::Unauthenticated),
        }
    }

    /// Pre-dispatch check for user actions.
    pub fn gate(&self) -> Gate {
        match self.require_viewer() {
            Ok(viewer) => Gate::Proceed(viewer),
            Err(_) => Gate::RedirectToLogin,
        }
    }

    fn persist(&self) -> ClientResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let text = serde_json::to_string_pretty(&self.stored)?;
        std::fs::write(&self.path, text)?;
        Ok(())
    }
}
