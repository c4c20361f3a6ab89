use serde::{Deserialize, Serialize};

/// Query string of `POST /gconnect`.
#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    pub state: Option<String>,
}

/// Token endpoint answer for an authorization-code exchange.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

/// Credentials obtained from a successful code exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_token: String,
    /// `sub` of the ID token returned alongside the access token.
    pub subject: String,
}

/// Token-info endpoint answer. Google reports failures in `error`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenInfo {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub issued_to: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Profile returned by the user-info endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserInfo {
    #[serde(default)]
    pub name: Option<String>,
    pub email: String,
    #[serde(default)]
    pub picture: Option<String>,
}

/// Logged-in identity shown in page headers.
#[derive(Debug, Clone, Serialize)]
pub struct SessionUser {
    pub id: i64,
    pub name: String,
    pub picture: Option<String>,
}
