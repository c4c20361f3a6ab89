use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_TOKENINFO_URI: &str = "https://www.googleapis.com/oauth2/v1/tokeninfo";
const GOOGLE_USERINFO_URI: &str = "https://www.googleapis.com/oauth2/v1/userinfo";
const GOOGLE_REVOKE_URI: &str = "https://accounts.google.com/o/oauth2/revoke";

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub secret: String,
    pub issuer: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub token_uri: String,
    pub tokeninfo_uri: String,
    pub userinfo_uri: String,
    pub revoke_uri: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub host: String,
    pub port: u16,
    pub application_name: String,
    pub session: SessionConfig,
    pub oauth: OAuthConfig,
}

/// The `client_secrets.json` file downloaded from the Google API console.
#[derive(Debug, Deserialize)]
pub struct ClientSecrets {
    pub web: WebClientSecrets,
}

#[derive(Debug, Deserialize)]
pub struct WebClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl ClientSecrets {
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        serde_json::from_str(raw).context("parse client secrets")
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read client secrets from {}", path.display()))?;
        Self::parse(&raw)
    }
}

impl DatabaseConfig {
    pub fn from_env() -> Self {
        Self {
            url: std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://itemCatalog.db".into()),
            max_connections: env_parse("DB_MAX_CONNECTIONS").unwrap_or(5),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database = DatabaseConfig::from_env();
        let host = std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port = env_parse("APP_PORT").unwrap_or(8000);
        let application_name =
            std::env::var("APPLICATION_NAME").unwrap_or_else(|_| "Item Catalog".into());

        let session = SessionConfig {
            secret: std::env::var("SESSION_SECRET").context("SESSION_SECRET is not set")?,
            issuer: std::env::var("SESSION_ISSUER").unwrap_or_else(|_| "item-catalog".into()),
            ttl_minutes: env_parse("SESSION_TTL_MINUTES").unwrap_or(60 * 24 * 7),
        };

        let secrets_path =
            std::env::var("CLIENT_SECRETS_FILE").unwrap_or_else(|_| "client_secrets.json".into());
        let secrets = ClientSecrets::load(&secrets_path)?;
        let oauth = OAuthConfig::from_secrets(secrets);

        Ok(Self {
            database,
            host,
            port,
            application_name,
            session,
            oauth,
        })
    }
}

impl OAuthConfig {
    pub fn from_secrets(secrets: ClientSecrets) -> Self {
        let web = secrets.web;
        Self {
            client_id: web.client_id,
            client_secret: web.client_secret,
            token_uri: web.token_uri.unwrap_or_else(|| GOOGLE_TOKEN_URI.into()),
            tokeninfo_uri: std::env::var("OAUTH_TOKENINFO_URI")
                .unwrap_or_else(|_| GOOGLE_TOKENINFO_URI.into()),
            userinfo_uri: std::env::var("OAUTH_USERINFO_URI")
                .unwrap_or_else(|_| GOOGLE_USERINFO_URI.into()),
            revoke_uri: std::env::var("OAUTH_REVOKE_URI")
                .unwrap_or_else(|_| GOOGLE_REVOKE_URI.into()),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}
