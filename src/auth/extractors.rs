use std::sync::Arc;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::Redirect,
};
use tracing::{debug, error};
use uuid::Uuid;

use super::session::{SessionData, SessionSlot, SessionStore};
use crate::state::AppState;

/// Handle on the server-side session of the current request. Reads of a
/// request without a session see the defaults; the first write creates it.
pub struct Session {
    slot: SessionSlot,
    store: Arc<SessionStore>,
}

impl Session {
    pub fn attach(id: Uuid, store: Arc<SessionStore>) -> Self {
        Self {
            slot: SessionSlot::existing(id),
            store,
        }
    }

    pub fn data(&self) -> SessionData {
        self.slot
            .get()
            .and_then(|sid| self.store.get(sid))
            .unwrap_or_default()
    }

    pub fn update<R: Default>(&self, f: impl FnOnce(&mut SessionData) -> R) -> R {
        let sid = self.slot.get_or_create(&self.store);
        match self.store.update(sid, f) {
            Some(r) => r,
            None => {
                debug!(session_id = %sid, "session expired during request; update dropped");
                R::default()
            }
        }
    }

    pub fn flash(&self, message: impl Into<String>) {
        let message = message.into();
        self.update(|s| s.flashes.push(message));
    }

    /// Pending flash messages; reading them clears the queue.
    pub fn take_flashes(&self) -> Vec<String> {
        if self.slot.get().is_none() {
            return Vec::new();
        }
        self.update(|s| std::mem::take(&mut s.flashes))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Session {
    type Rejection = (StatusCode, String);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let slot = parts.extensions.get::<SessionSlot>().cloned().ok_or_else(|| {
            error!("session layer is not installed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "session unavailable".to_string(),
            )
        })?;
        Ok(Session {
            slot,
            store: state.sessions.clone(),
        })
    }
}

/// A logged-in user. Anonymous requests are sent to the login page.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: i64,
    pub name: String,
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Redirect;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|_| Redirect::to("/login"))?;
        match session.data().user() {
            Some(user) => Ok(CurrentUser {
                id: user.id,
                name: user.name,
            }),
            None => {
                debug!(path = %parts.uri.path(), "login required");
                Err(Redirect::to("/login"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::session::SessionKeys;
    use crate::config::SessionConfig;

    fn store() -> Arc<SessionStore> {
        Arc::new(SessionStore::new(SessionKeys::new(&SessionConfig {
            secret: "test-secret".into(),
            issuer: "test-issuer".into(),
            ttl_minutes: 5,
        })))
    }

    #[test]
    fn reads_do_not_create_a_session() {
        let store = store();
        let session = Session {
            slot: SessionSlot::default(),
            store: store.clone(),
        };
        assert!(session.data().user().is_none());
        assert!(session.take_flashes().is_empty());
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn first_write_creates_the_session() {
        let store = store();
        let session = Session {
            slot: SessionSlot::default(),
            store: store.clone(),
        };
        session.flash("hello");
        assert_eq!(store.len(), 1);
        assert_eq!(session.take_flashes(), vec!["hello".to_string()]);
        assert!(session.take_flashes().is_empty());
    }

    #[test]
    fn update_after_expiry_returns_default() {
        let store = store();
        let sid = store.create();
        let session = Session::attach(sid, store.clone());
        store.remove(sid);
        let taken: Vec<String> = session.update(|s| std::mem::take(&mut s.flashes));
        assert!(taken.is_empty());
        assert_eq!(store.len(), 0);
    }
}
