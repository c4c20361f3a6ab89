use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::{
        dto::ConnectQuery,
        extractors::Session,
        services::{self, ConnectOutcome},
    },
    error::AppResult,
    state::AppState,
    views::{self, Chrome, LoginPage, WelcomeFragment},
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(show_login))
        .route("/gconnect", post(gconnect))
        .route("/gdisconnect", get(gdisconnect))
}

#[instrument(skip(state, session))]
pub async fn show_login(
    State(state): State<AppState>,
    session: Session,
) -> AppResult<Html<String>> {
    let token = services::begin_login(&session);
    views::render(&LoginPage {
        chrome: Chrome::new(&state.config.application_name, &session),
        state: token,
        client_id: state.config.oauth.client_id.clone(),
    })
}

/// Body is the raw one-time authorization code posted by the login page.
#[instrument(skip(state, session, code))]
pub async fn gconnect(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<ConnectQuery>,
    code: String,
) -> AppResult<Response> {
    let outcome = services::connect(
        &state.db,
        state.identity.as_ref(),
        &state.config.oauth.client_id,
        &session,
        query.state.as_deref(),
        code.trim(),
    )
    .await?;

    match outcome {
        ConnectOutcome::AlreadyConnected => {
            Ok((StatusCode::OK, Json("Current user is already connected")).into_response())
        }
        ConnectOutcome::Connected {
            user,
            username,
            picture,
        } => {
            info!(user_id = user.id, "login page connected");
            let fragment = WelcomeFragment {
                username,
                picture: picture.unwrap_or_default(),
            };
            Ok(views::render(&fragment)?.into_response())
        }
    }
}

#[instrument(skip(state, session))]
pub async fn gdisconnect(State(state): State<AppState>, session: Session) -> AppResult<Redirect> {
    services::disconnect(state.identity.as_ref(), &session).await?;
    Ok(Redirect::to("/"))
}
