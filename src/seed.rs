use anyhow::Context;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::{
    auth::repo_types::{NewUser, User},
    catalog::{
        repo,
        repo_types::{Category, NewItem},
    },
};

const DEFAULT_PICTURE: &str =
    "https://pbs.twimg.com/profile_images/2671170543/18debd694829ed78203a5a36dd364160_400x400.png";

struct SeedItem {
    creator: usize,
    title: &'static str,
    description: &'static str,
}

const fn item(creator: usize, title: &'static str, description: &'static str) -> SeedItem {
    SeedItem {
        creator,
        title,
        description,
    }
}

const USERS: [(&str, &str); 2] = [
    ("Eli Benson", "elibenson@fake.net"),
    ("Shaun Wells", "swells@false.com"),
];

const CATALOG: &[(&str, &[SeedItem])] = &[
    (
        "Soccer",
        &[
            item(0, "Two Shinguards", "Two pairs of shinguards"),
            item(0, "Shinguards", "A pair of shinguards"),
            item(0, "Jersey", "A soccer jersey"),
            item(0, "Soccer Cleats", "A pair of soccer cleats"),
        ],
    ),
    ("Basketball", &[]),
    ("Baseball", &[item(0, "Bat", "A baseball bat")]),
    ("Frisbee", &[item(0, "Frisbee", "A frisbee")]),
    (
        "Snowboarding",
        &[
            item(
                1,
                "Goggles",
                "Snowboarding goggles used to protect the eyes from snow",
            ),
            item(1, "Snowboard", "A snowboard"),
        ],
    ),
    ("Rock Climbing", &[]),
    ("Foosball", &[]),
    ("Skating", &[]),
    ("Hockey", &[item(1, "Stick", "A hockey stick")]),
];

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub users: usize,
    pub categories: usize,
    pub items: usize,
}

/// Inserts the sample users, categories and items. A database that already
/// has categories is left alone.
pub async fn populate(db: &SqlitePool) -> anyhow::Result<SeedReport> {
    if !repo::list_categories(db).await?.is_empty() {
        warn!("catalog already has categories; skipping sample data");
        return Ok(SeedReport::default());
    }

    let mut report = SeedReport::default();
    let mut creators = Vec::with_capacity(USERS.len());
    for (name, email) in USERS {
        let user = match User::find_by_email(db, email).await? {
            Some(u) => u,
            None => {
                report.users += 1;
                User::create(
                    db,
                    NewUser {
                        name,
                        email,
                        picture: Some(DEFAULT_PICTURE),
                    },
                )
                .await
                .with_context(|| format!("seed user {}", email))?
            }
        };
        creators.push(user);
    }

    for (name, items) in CATALOG {
        let category: Category = repo::insert_category(db, name).await?;
        report.categories += 1;
        for seed in items.iter() {
            repo::insert_item(
                db,
                NewItem {
                    title: seed.title,
                    description: Some(seed.description),
                    cat_id: category.id,
                    user_id: creators[seed.creator].id,
                },
            )
            .await
            .with_context(|| format!("seed item {} in {}", seed.title, name))?;
            report.items += 1;
        }
    }

    info!(
        users = report.users,
        categories = report.categories,
        items = report.items,
        "database populated"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[tokio::test]
    async fn populates_sample_catalog() {
        let db = db::memory().await;
        let report = populate(&db).await.expect("populate");
        assert_eq!(
            report,
            SeedReport {
                users: 2,
                categories: 9,
                items: 9,
            }
        );

        let hockey = repo::find_category_by_name(&db, "Hockey")
            .await
            .unwrap()
            .expect("hockey seeded");
        let stick = repo::find_item(&db, hockey.id, "Stick")
            .await
            .unwrap()
            .expect("stick seeded");
        let shaun = User::find_by_email(&db, "swells@false.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stick.user_id, shaun.id);

        let basketball = repo::find_category_by_name(&db, "Basketball")
            .await
            .unwrap()
            .unwrap();
        assert!(repo::list_items_in_category(&db, basketball.id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn second_run_is_a_no_op() {
        let db = db::memory().await;
        populate(&db).await.unwrap();
        let again = populate(&db).await.unwrap();
        assert_eq!(again, SeedReport::default());
        assert_eq!(repo::list_categories(&db).await.unwrap().len(), 9);
    }
}
