use crate::auth::provider::{GoogleProvider, IdentityProvider};
use crate::auth::session::{SessionKeys, SessionStore};
use crate::config::AppConfig;
use crate::db;
use sqlx::SqlitePool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<AppConfig>,
    pub sessions: Arc<SessionStore>,
    pub identity: Arc<dyn IdentityProvider>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;
        let db = db::connect(&config.database).await?;

        // Real Google endpoints
        let identity =
            Arc::new(GoogleProvider::new(config.oauth.clone())) as Arc<dyn IdentityProvider>;

        Ok(Self::from_parts(db, Arc::new(config), identity))
    }

    pub fn from_parts(
        db: SqlitePool,
        config: Arc<AppConfig>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        let sessions = Arc::new(SessionStore::new(SessionKeys::new(&config.session)));
        Self {
            db,
            config,
            sessions,
            identity,
        }
    }

    #[cfg(test)]
    pub async fn fake() -> Self {
        use crate::auth::provider::fake::FakeProvider;
        Self::fake_with(FakeProvider::happy("test-client")).await
    }

    #[cfg(test)]
    pub async fn fake_with(provider: impl IdentityProvider + 'static) -> Self {
        use crate::config::{DatabaseConfig, OAuthConfig, SessionConfig};

        let config = Arc::new(AppConfig {
            database: DatabaseConfig {
                url: "sqlite::memory:".into(),
                max_connections: 1,
            },
            host: "127.0.0.1".into(),
            port: 0,
            application_name: "Item Catalog".into(),
            session: SessionConfig {
                secret: "test".into(),
                issuer: "test".into(),
                ttl_minutes: 5,
            },
            oauth: OAuthConfig {
                client_id: "test-client".into(),
                client_secret: "fake".into(),
                token_uri: "https://fake.local/token".into(),
                tokeninfo_uri: "https://fake.local/tokeninfo".into(),
                userinfo_uri: "https://fake.local/userinfo".into(),
                revoke_uri: "https://fake.local/revoke".into(),
            },
        });

        Self::from_parts(db::memory().await, config, Arc::new(provider))
    }
}
