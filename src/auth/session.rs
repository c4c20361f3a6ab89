use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{debug, error};
use uuid::Uuid;

use super::{claims::SessionClaims, dto::SessionUser};
use crate::{config::SessionConfig, state::AppState};

pub const SESSION_COOKIE: &str = "catalog_session";

// sessions created between two sweeps of the expired ones
const PURGE_EVERY: usize = 256;

/// Signs and verifies the session cookie.
#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    ttl: Duration,
}

impl SessionKeys {
    pub fn new(cfg: &SessionConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            ttl: Duration::from_secs(cfg.ttl_minutes.max(0) as u64 * 60),
        }
    }

    pub fn sign(&self, sid: Uuid) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(self.ttl.as_secs() as i64);
        let claims = SessionClaims {
            sid,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(session_id = %sid, "session cookie signed");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<SessionClaims> {
        let mut validation = Validation::default();
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<SessionClaims>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }
}

/// Per-browser state kept on the server.
#[derive(Debug, Clone, Default)]
pub struct SessionData {
    /// Anti-forgery token handed out by the login page.
    pub state: Option<String>,
    pub access_token: Option<String>,
    /// Identity provider subject of the connected account.
    pub provider_id: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub picture: Option<String>,
    pub user_id: Option<i64>,
    pub flashes: Vec<String>,
}

impl SessionData {
    pub fn user(&self) -> Option<SessionUser> {
        match (&self.username, self.user_id) {
            (Some(name), Some(id)) => Some(SessionUser {
                id,
                name: name.clone(),
                picture: self.picture.clone(),
            }),
            _ => None,
        }
    }

    pub fn clear_login(&mut self) {
        self.access_token = None;
        self.provider_id = None;
        self.username = None;
        self.email = None;
        self.picture = None;
        self.user_id = None;
    }
}

struct Entry {
    data: SessionData,
    expires_at: OffsetDateTime,
}

pub struct SessionStore {
    keys: SessionKeys,
    entries: DashMap<Uuid, Entry>,
    created: AtomicUsize,
}

impl SessionStore {
    pub fn new(keys: SessionKeys) -> Self {
        Self {
            keys,
            entries: DashMap::new(),
            created: AtomicUsize::new(0),
        }
    }

    pub fn keys(&self) -> &SessionKeys {
        &self.keys
    }

    pub fn create(&self) -> Uuid {
        if self.created.fetch_add(1, Ordering::Relaxed) % PURGE_EVERY == PURGE_EVERY - 1 {
            let purged = self.purge_expired();
            debug!(purged, "expired sessions swept");
        }
        let sid = Uuid::new_v4();
        let expires_at =
            OffsetDateTime::now_utc() + TimeDuration::seconds(self.keys.ttl.as_secs() as i64);
        self.entries.insert(
            sid,
            Entry {
                data: SessionData::default(),
                expires_at,
            },
        );
        debug!(session_id = %sid, "session created");
        sid
    }

    /// Maps a cookie token to a live session. Absent, forged or expired
    /// tokens resolve to `None`; nothing is created here.
    pub fn resolve(&self, token: Option<&str>) -> Option<Uuid> {
        token
            .and_then(|t| self.keys.verify(t).ok())
            .map(|claims| claims.sid)
            .filter(|sid| self.get(*sid).is_some())
    }

    pub fn get(&self, sid: Uuid) -> Option<SessionData> {
        self.drop_if_expired(sid);
        self.entries.get(&sid).map(|e| e.data.clone())
    }

    pub fn update<R>(&self, sid: Uuid, f: impl FnOnce(&mut SessionData) -> R) -> Option<R> {
        self.drop_if_expired(sid);
        self.entries.get_mut(&sid).map(|mut e| f(&mut e.data))
    }

    pub fn remove(&self, sid: Uuid) {
        self.entries.remove(&sid);
    }

    pub fn purge_expired(&self) -> usize {
        let now = OffsetDateTime::now_utc();
        let before = self.entries.len();
        self.entries.retain(|_, e| e.expires_at > now);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn cookie(&self, sid: Uuid) -> anyhow::Result<String> {
        let token = self.keys.sign(sid)?;
        Ok(format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            SESSION_COOKIE,
            token,
            self.keys.ttl.as_secs()
        ))
    }

    fn drop_if_expired(&self, sid: Uuid) {
        let now = OffsetDateTime::now_utc();
        if self
            .entries
            .remove_if(&sid, |_, e| e.expires_at <= now)
            .is_some()
        {
            debug!(session_id = %sid, "session expired");
        }
    }
}

/// Session of the current request, attached by [`session_layer`]. Empty
/// until a handler first writes to the session.
#[derive(Debug, Clone, Default)]
pub struct SessionSlot(Arc<OnceLock<Uuid>>);

impl SessionSlot {
    pub fn existing(sid: Uuid) -> Self {
        Self(Arc::new(OnceLock::from(sid)))
    }

    pub fn get(&self) -> Option<Uuid> {
        self.0.get().copied()
    }

    pub fn get_or_create(&self, store: &SessionStore) -> Uuid {
        *self.0.get_or_init(|| store.create())
    }
}

pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.to_string())
}

/// Attaches the request's session slot and hands out the cookie when a
/// handler created a session.
pub async fn session_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let token = cookie_value(req.headers(), SESSION_COOKIE);
    let slot = match state.sessions.resolve(token.as_deref()) {
        Some(sid) => SessionSlot::existing(sid),
        None => SessionSlot::default(),
    };
    let had_session = slot.get().is_some();
    req.extensions_mut().insert(slot.clone());

    let mut res = next.run(req).await;
    if let Some(sid) = slot.get().filter(|_| !had_session) {
        match state
            .sessions
            .cookie(sid)
            .map(|c| HeaderValue::from_str(&c))
        {
            Ok(Ok(value)) => {
                res.headers_mut().append(header::SET_COOKIE, value);
            }
            Ok(Err(e)) => error!(error = %e, "session cookie is not a valid header"),
            Err(e) => error!(error = %e, "sign session cookie failed"),
        }
    }
    res
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(ttl_minutes: i64) -> SessionStore {
        SessionStore::new(SessionKeys::new(&SessionConfig {
            secret: "test-secret".into(),
            issuer: "test-issuer".into(),
            ttl_minutes,
        }))
    }

    #[test]
    fn sign_and_verify_session_token() {
        let store = store(5);
        let sid = Uuid::new_v4();
        let token = store.keys().sign(sid).expect("sign");
        let claims = store.keys().verify(&token).expect("verify");
        assert_eq!(claims.sid, sid);
        assert_eq!(claims.iss, "test-issuer");
    }

    #[test]
    fn verify_rejects_token_from_other_secret() {
        let ours = store(5);
        let theirs = SessionStore::new(SessionKeys::new(&SessionConfig {
            secret: "other-secret".into(),
            issuer: "test-issuer".into(),
            ttl_minutes: 5,
        }));
        let token = theirs.keys().sign(Uuid::new_v4()).unwrap();
        assert!(ours.keys().verify(&token).is_err());
    }

    #[test]
    fn resolve_finds_live_session_without_creating() {
        let store = store(5);
        let sid = store.create();
        let token = store.keys().sign(sid).unwrap();

        assert_eq!(store.resolve(Some(&token)), Some(sid));
        assert_eq!(store.resolve(Some("garbage")), None);
        assert_eq!(store.resolve(None), None);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn resolve_ignores_session_missing_from_store() {
        let store = store(5);
        let sid = store.create();
        let token = store.keys().sign(sid).unwrap();
        store.remove(sid);

        assert_eq!(store.resolve(Some(&token)), None);
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn slot_creates_session_once() {
        let store = store(5);
        let slot = SessionSlot::default();
        assert_eq!(slot.get(), None);
        assert_eq!(store.len(), 0);

        let sid = slot.get_or_create(&store);
        assert_eq!(slot.get_or_create(&store), sid);
        assert_eq!(store.len(), 1);

        let existing = SessionSlot::existing(sid);
        assert_eq!(existing.get(), Some(sid));
    }

    #[test]
    fn expired_sessions_are_swept_periodically() {
        let store = store(0);
        for _ in 0..PURGE_EVERY {
            store.create();
        }
        // only the session created after the sweep is left
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn update_is_visible_to_get() {
        let store = store(5);
        let sid = store.create();
        store.update(sid, |s| {
            s.username = Some("Eli".into());
            s.user_id = Some(1);
        });
        let user = store.get(sid).and_then(|s| s.user()).expect("logged in");
        assert_eq!(user.id, 1);
        assert_eq!(user.name, "Eli");
    }

    #[test]
    fn expired_sessions_are_dropped() {
        let store = store(0);
        let sid = store.create();
        assert!(store.get(sid).is_none());
        assert!(store.update(sid, |_| ()).is_none());
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn clear_login_keeps_flashes_and_state() {
        let mut data = SessionData {
            state: Some("ABC".into()),
            access_token: Some("tok".into()),
            provider_id: Some("123".into()),
            username: Some("Eli".into()),
            email: Some("eli@example.com".into()),
            picture: None,
            user_id: Some(3),
            flashes: vec!["hello".into()],
        };
        data.clear_login();
        assert!(data.user().is_none());
        assert!(data.access_token.is_none());
        assert!(data.provider_id.is_none());
        assert_eq!(data.state.as_deref(), Some("ABC"));
        assert_eq!(data.flashes, vec!["hello".to_string()]);
    }

    #[test]
    fn cookie_value_finds_named_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; catalog_session=abc.def.ghi"),
        );
        assert_eq!(
            cookie_value(&headers, SESSION_COOKIE).as_deref(),
            Some("abc.def.ghi")
        );
        assert_eq!(cookie_value(&headers, "missing"), None);
    }
}
