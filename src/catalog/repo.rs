use anyhow::Context;
use sqlx::SqlitePool;

use super::repo_types::{Category, Item, NewItem};

pub async fn list_categories(db: &SqlitePool) -> anyhow::Result<Vec<Category>> {
    let rows = sqlx::query_as::<_, Category>(
        r#"
        SELECT id, name
          FROM categories
         ORDER BY id ASC
        "#,
    )
    .fetch_all(db)
    .await
    .context("list categories")?;
    Ok(rows)
}

pub async fn find_category_by_name(
    db: &SqlitePool,
    name: &str,
) -> anyhow::Result<Option<Category>> {
    let row = sqlx::query_as::<_, Category>("SELECT id, name FROM categories WHERE name = ?")
        .bind(name)
        .fetch_optional(db)
        .await
        .context("find category by name")?;
    Ok(row)
}

pub async fn find_category_by_id(db: &SqlitePool, id: i64) -> anyhow::Result<Option<Category>> {
    let row = sqlx::query_as::<_, Category>("SELECT id, name FROM categories WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await
        .context("find category by id")?;
    Ok(row)
}

pub async fn insert_category(db: &SqlitePool, name: &str) -> anyhow::Result<Category> {
    let row = sqlx::query_as::<_, Category>(
        "INSERT INTO categories (name) VALUES (?) RETURNING id, name",
    )
    .bind(name)
    .fetch_one(db)
    .await
    .with_context(|| format!("insert category {}", name))?;
    Ok(row)
}

pub async fn list_items_in_category(db: &SqlitePool, cat_id: i64) -> anyhow::Result<Vec<Item>> {
    let rows = sqlx::query_as::<_, Item>(
        r#"
        SELECT id, title, description, cat_id, user_id
          FROM items
         WHERE cat_id = ?
         ORDER BY id ASC
        "#,
    )
    .bind(cat_id)
    .fetch_all(db)
    .await
    .context("list items in category")?;
    Ok(rows)
}

pub async fn find_item(db: &SqlitePool, cat_id: i64, title: &str) -> anyhow::Result<Option<Item>> {
    let row = sqlx::query_as::<_, Item>(
        r#"
        SELECT id, title, description, cat_id, user_id
          FROM items
         WHERE cat_id = ? AND title = ?
         LIMIT 1
        "#,
    )
    .bind(cat_id)
    .bind(title)
    .fetch_optional(db)
    .await
    .context("find item")?;
    Ok(row)
}

/// Whether `title` is already used in the category by an item other than
/// `except`.
pub async fn title_taken(
    db: &SqlitePool,
    cat_id: i64,
    title: &str,
    except: Option<i64>,
) -> anyhow::Result<bool> {
    let (count,): (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*)
          FROM items
         WHERE cat_id = ? AND title = ? AND (? IS NULL OR id <> ?)
        "#,
    )
    .bind(cat_id)
    .bind(title)
    .bind(except)
    .bind(except)
    .fetch_one(db)
    .await
    .context("check title uniqueness")?;
    Ok(count > 0)
}

pub async fn insert_item(db: &SqlitePool, new: NewItem<'_>) -> anyhow::Result<Item> {
    let row = sqlx::query_as::<_, Item>(
        r#"
        INSERT INTO items (title, description, cat_id, user_id)
        VALUES (?, ?, ?, ?)
        RETURNING id, title, description, cat_id, user_id
        "#,
    )
    .bind(new.title)
    .bind(new.description)
    .bind(new.cat_id)
    .bind(new.user_id)
    .fetch_one(db)
    .await
    .context("insert item")?;
    Ok(row)
}

pub async fn update_item(db: &SqlitePool, item: &Item) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        UPDATE items
           SET title = ?, description = ?, cat_id = ?
         WHERE id = ?
        "#,
    )
    .bind(&item.title)
    .bind(&item.description)
    .bind(item.cat_id)
    .bind(item.id)
    .execute(db)
    .await
    .context("update item")?;
    Ok(())
}

pub async fn delete_item(db: &SqlitePool, id: i64) -> anyhow::Result<()> {
    sqlx::query("DELETE FROM items WHERE id = ?")
        .bind(id)
        .execute(db)
        .await
        .context("delete item")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repo_types::{NewUser, User};
    use crate::db;

    async fn user(db: &SqlitePool) -> User {
        User::create(
            db,
            NewUser {
                name: "Eli",
                email: "eli@example.com",
                picture: None,
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn categories_are_listed_in_insertion_order() {
        let db = db::memory().await;
        insert_category(&db, "Soccer").await.unwrap();
        insert_category(&db, "Hockey").await.unwrap();
        let names: Vec<_> = list_categories(&db)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Soccer", "Hockey"]);
    }

    #[tokio::test]
    async fn category_names_are_unique() {
        let db = db::memory().await;
        insert_category(&db, "Soccer").await.unwrap();
        assert!(insert_category(&db, "Soccer").await.is_err());
    }

    #[tokio::test]
    async fn item_crud() {
        let db = db::memory().await;
        let owner = user(&db).await;
        let soccer = insert_category(&db, "Soccer").await.unwrap();
        let hockey = insert_category(&db, "Hockey").await.unwrap();

        let mut item = insert_item(
            &db,
            NewItem {
                title: "Jersey",
                description: Some("A soccer jersey"),
                cat_id: soccer.id,
                user_id: owner.id,
            },
        )
        .await
        .unwrap();
        assert!(find_item(&db, soccer.id, "Jersey").await.unwrap().is_some());
        assert!(find_item(&db, hockey.id, "Jersey").await.unwrap().is_none());

        item.cat_id = hockey.id;
        item.title = "Hockey Jersey".into();
        update_item(&db, &item).await.unwrap();
        let moved = find_item(&db, hockey.id, "Hockey Jersey")
            .await
            .unwrap()
            .expect("moved item");
        assert_eq!(moved.id, item.id);
        assert_eq!(moved.description.as_deref(), Some("A soccer jersey"));
        assert!(list_items_in_category(&db, soccer.id).await.unwrap().is_empty());

        delete_item(&db, item.id).await.unwrap();
        assert!(list_items_in_category(&db, hockey.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn title_taken_ignores_the_item_itself() {
        let db = db::memory().await;
        let owner = user(&db).await;
        let soccer = insert_category(&db, "Soccer").await.unwrap();
        let item = insert_item(
            &db,
            NewItem {
                title: "Jersey",
                description: None,
                cat_id: soccer.id,
                user_id: owner.id,
            },
        )
        .await
        .unwrap();

        assert!(title_taken(&db, soccer.id, "Jersey", None).await.unwrap());
        assert!(!title_taken(&db, soccer.id, "Jersey", Some(item.id)).await.unwrap());
        assert!(!title_taken(&db, soccer.id, "jersey", None).await.unwrap());
        assert!(!title_taken(&db, soccer.id, "Cleats", None).await.unwrap());
    }
}
