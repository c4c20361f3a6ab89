use crate::auth::repo_types::{NewUser, User};
use sqlx::SqlitePool;

impl User {
    /// Find a user by id.
    pub async fn find_by_id(db: &SqlitePool, id: i64) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, picture
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Find a user by email.
    pub async fn find_by_email(db: &SqlitePool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, picture
            FROM users
            WHERE email = ?
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn create(db: &SqlitePool, new: NewUser<'_>) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, picture)
            VALUES (?, ?, ?)
            RETURNING id, name, email, picture
            "#,
        )
        .bind(new.name)
        .bind(new.email)
        .bind(new.picture)
        .fetch_one(db)
        .await?;
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[tokio::test]
    async fn create_then_find_by_email_and_id() {
        let db = db::memory().await;
        let created = User::create(
            &db,
            NewUser {
                name: "Eli Benson",
                email: "elibenson@fake.net",
                picture: Some("https://example.com/eli.png"),
            },
        )
        .await
        .expect("insert user");

        let by_email = User::find_by_email(&db, "elibenson@fake.net")
            .await
            .unwrap()
            .expect("found by email");
        assert_eq!(by_email.id, created.id);
        assert_eq!(by_email.picture.as_deref(), Some("https://example.com/eli.png"));

        let by_id = User::find_by_id(&db, created.id).await.unwrap().expect("found by id");
        assert_eq!(by_id.name, "Eli Benson");
    }

    #[tokio::test]
    async fn unknown_email_is_none() {
        let db = db::memory().await;
        assert!(User::find_by_email(&db, "nobody@example.com")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn email_is_unique() {
        let db = db::memory().await;
        let new = NewUser {
            name: "A",
            email: "a@example.com",
            picture: None,
        };
        User::create(&db, new.clone()).await.unwrap();
        assert!(User::create(&db, new).await.is_err());
    }
}
