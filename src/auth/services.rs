use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use lazy_static::lazy_static;
use rand::Rng;
use regex::Regex;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{error, info, warn};

use super::{
    extractors::Session,
    dto::Credentials,
    provider::{IdentityProvider, ProviderError},
    repo_types::{NewUser, User},
};

const STATE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const STATE_LEN: usize = 32;

/// Failures of the login / logout flow. Each maps to its own status code and
/// is answered with the message as a JSON string.
#[derive(Debug, Error)]
pub enum AuthFlowError {
    #[error("Invalid state parameter")]
    InvalidState,

    #[error("Failed to upgrade the authorization code")]
    CodeExchange(#[source] ProviderError),

    #[error("{0}")]
    TokenInfo(String),

    #[error("Token's user ID doesn't match given user ID")]
    SubjectMismatch,

    #[error("Token's client ID does not match app's")]
    ClientMismatch,

    #[error("Identity provider returned an invalid email")]
    InvalidEmail,

    #[error("Current user not connected")]
    NotConnected,

    #[error("Failed to revoke token for given user")]
    RevokeFailed,

    #[error("identity provider unavailable: {0}")]
    Provider(#[from] ProviderError),

    #[error("user storage failed: {0}")]
    Storage(anyhow::Error),
}

impl AuthFlowError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthFlowError::InvalidState
            | AuthFlowError::CodeExchange(_)
            | AuthFlowError::SubjectMismatch
            | AuthFlowError::ClientMismatch
            | AuthFlowError::InvalidEmail
            | AuthFlowError::NotConnected => StatusCode::UNAUTHORIZED,
            AuthFlowError::RevokeFailed => StatusCode::BAD_REQUEST,
            AuthFlowError::TokenInfo(_)
            | AuthFlowError::Provider(_)
            | AuthFlowError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthFlowError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AuthFlowError::Provider(e) => {
                error!(error = %e, "identity provider call failed");
                "Identity provider unavailable".to_string()
            }
            AuthFlowError::Storage(e) => {
                error!(error = %e, "user storage failed");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(message)).into_response()
    }
}

/// Outcome of a successful `POST /gconnect`.
#[derive(Debug)]
pub enum ConnectOutcome {
    AlreadyConnected,
    Connected {
        user: User,
        username: String,
        picture: Option<String>,
    },
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Random anti-forgery token for the login page.
pub fn new_state_token() -> String {
    let mut rng = rand::thread_rng();
    (0..STATE_LEN)
        .map(|_| STATE_CHARSET[rng.gen_range(0..STATE_CHARSET.len())] as char)
        .collect()
}

/// Generates a fresh state token and remembers it in the session.
pub fn begin_login(session: &Session) -> String {
    let state = new_state_token();
    let stored = state.clone();
    session.update(|s| s.state = Some(stored));
    state
}

/// Finishes the one-time-code login: validates the anti-forgery token,
/// exchanges the code, checks the access token against the provider, then
/// loads or creates the local user and records everything in the session.
pub async fn connect(
    db: &SqlitePool,
    provider: &dyn IdentityProvider,
    client_id: &str,
    session: &Session,
    state_param: Option<&str>,
    code: &str,
) -> Result<ConnectOutcome, AuthFlowError> {
    let data = session.data();
    if state_param.is_none() || state_param != data.state.as_deref() {
        warn!("state token mismatch");
        return Err(AuthFlowError::InvalidState);
    }

    let credentials = provider.exchange_code(code).await.map_err(|e| {
        warn!(error = %e, "authorization code exchange failed");
        AuthFlowError::CodeExchange(e)
    })?;

    let token_info = provider.token_info(&credentials.access_token).await?;
    if let Some(err) = token_info.error {
        warn!(error = %err, "token info reported an error");
        return Err(AuthFlowError::TokenInfo(err));
    }
    if token_info.user_id.as_deref() != Some(credentials.subject.as_str()) {
        warn!(subject = %credentials.subject, "token user id mismatch");
        return Err(AuthFlowError::SubjectMismatch);
    }
    if token_info.issued_to.as_deref() != Some(client_id) {
        warn!(issued_to = ?token_info.issued_to, "token client id mismatch");
        return Err(AuthFlowError::ClientMismatch);
    }

    if data.access_token.is_some()
        && data.provider_id.as_deref() == Some(credentials.subject.as_str())
    {
        info!(subject = %credentials.subject, "user already connected");
        return Ok(ConnectOutcome::AlreadyConnected);
    }

    let profile = provider.user_info(&credentials.access_token).await?;
    let email = profile.email.trim().to_lowercase();
    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email from identity provider");
        return Err(AuthFlowError::InvalidEmail);
    }
    let username = profile
        .name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| email.clone());
    let picture = profile.picture;

    let user = match User::find_by_email(db, &email)
        .await
        .map_err(AuthFlowError::Storage)?
    {
        Some(u) => u,
        None => {
            let u = User::create(
                db,
                NewUser {
                    name: &username,
                    email: &email,
                    picture: picture.as_deref(),
                },
            )
            .await
            .map_err(AuthFlowError::Storage)?;
            info!(user_id = u.id, email = %u.email, "user created");
            u
        }
    };

    // login keys are written together so a failed step leaves no half login
    let (name, pic, mail, user_id) = (username.clone(), picture.clone(), email, user.id);
    let Credentials {
        access_token,
        subject,
    } = credentials;
    session.update(|s| {
        s.access_token = Some(access_token);
        s.provider_id = Some(subject);
        s.username = Some(name);
        s.picture = pic;
        s.email = Some(mail);
        s.user_id = Some(user_id);
    });
    session.flash(format!("you are now logged in as {}", username));
    info!(user_id = user.id, "user logged in");

    Ok(ConnectOutcome::Connected {
        user,
        username,
        picture,
    })
}

/// Revokes the session's access token and forgets the login.
pub async fn disconnect(
    provider: &dyn IdentityProvider,
    session: &Session,
) -> Result<(), AuthFlowError> {
    let token = session
        .data()
        .access_token
        .ok_or(AuthFlowError::NotConnected)?;

    if !provider.revoke(&token).await? {
        warn!("token revoke refused");
        return Err(AuthFlowError::RevokeFailed);
    }

    session.update(|s| s.clear_login());
    session.flash("You have been successfully logged out.");
    info!("user logged out");
    Ok(())
}
