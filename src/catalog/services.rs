use sqlx::SqlitePool;
use tracing::{info, warn};

use super::{
    dto::{CatalogJson, CategoryJson, ItemForm},
    repo,
    repo_types::{Category, Item, NewItem},
};
use crate::error::{AppError, AppResult};

/// Why an add or edit form was sent back to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemRejection {
    MissingTitle,
    DuplicateTitle,
}

impl ItemRejection {
    pub fn message(self) -> &'static str {
        match self {
            ItemRejection::MissingTitle => "Item needs a title!",
            ItemRejection::DuplicateTitle => "That item already exists in this category!",
        }
    }
}

#[derive(Debug)]
pub enum ItemOutcome {
    Saved { category: Category, item: Item },
    Rejected(ItemRejection),
}

pub async fn load_category(db: &SqlitePool, name: &str) -> AppResult<Category> {
    repo::find_category_by_name(db, name)
        .await?
        .ok_or_else(|| AppError::category_not_found(name))
}

pub async fn load_item(db: &SqlitePool, category: &str, title: &str) -> AppResult<(Category, Item)> {
    let category = load_category(db, category).await?;
    let item = repo::find_item(db, category.id, title)
        .await?
        .ok_or_else(|| AppError::item_not_found(title))?;
    Ok((category, item))
}

/// Only the creator of an item may change it. `action` is "edit" or
/// "delete".
pub fn ensure_owner(item: &Item, user_id: i64, action: &str) -> AppResult<()> {
    if item.user_id == user_id {
        return Ok(());
    }
    warn!(item_id = item.id, user_id, action, "ownership check failed");
    Err(AppError::Forbidden(format!(
        "You are not authorized to {action} this item. Please create your own item in order to {action}."
    )))
}

async fn load_category_by_id(db: &SqlitePool, id: i64) -> AppResult<Category> {
    repo::find_category_by_id(db, id)
        .await?
        .ok_or_else(|| AppError::category_not_found(&id.to_string()))
}

fn non_empty(s: &str) -> Option<&str> {
    let s = s.trim();
    (!s.is_empty()).then_some(s)
}

pub async fn create_item(db: &SqlitePool, user_id: i64, form: &ItemForm) -> AppResult<ItemOutcome> {
    let Some(title) = non_empty(&form.title) else {
        return Ok(ItemOutcome::Rejected(ItemRejection::MissingTitle));
    };
    let category = load_category_by_id(db, form.cat_id).await?;
    if repo::title_taken(db, category.id, title, None).await? {
        return Ok(ItemOutcome::Rejected(ItemRejection::DuplicateTitle));
    }

    let item = repo::insert_item(
        db,
        NewItem {
            title,
            description: non_empty(&form.description),
            cat_id: category.id,
            user_id,
        },
    )
    .await?;
    info!(item_id = item.id, cat_id = category.id, user_id, "item created");
    Ok(ItemOutcome::Saved { category, item })
}

/// Applies the edit form: a non-empty title or description replaces the
/// stored one and the item moves to the posted category. The resulting title
/// must be unique among the other items of that category.
pub async fn apply_edit(db: &SqlitePool, item: &Item, form: &ItemForm) -> AppResult<ItemOutcome> {
    let category = load_category_by_id(db, form.cat_id).await?;

    let mut edited = item.clone();
    if let Some(title) = non_empty(&form.title) {
        edited.title = title.to_string();
    }
    if let Some(description) = non_empty(&form.description) {
        edited.description = Some(description.to_string());
    }
    edited.cat_id = category.id;

    if repo::title_taken(db, edited.cat_id, &edited.title, Some(edited.id)).await? {
        return Ok(ItemOutcome::Rejected(ItemRejection::DuplicateTitle));
    }

    repo::update_item(db, &edited).await?;
    info!(item_id = edited.id, cat_id = edited.cat_id, "item edited");
    Ok(ItemOutcome::Saved {
        category,
        item: edited,
    })
}

pub async fn export_category(db: &SqlitePool, category: Category) -> anyhow::Result<CategoryJson> {
    let items = repo::list_items_in_category(db, category.id).await?;
    Ok(CategoryJson::new(category, items))
}

pub async fn export_catalog(db: &SqlitePool) -> anyhow::Result<CatalogJson> {
    let mut categories = Vec::new();
    for category in repo::list_categories(db).await? {
        categories.push(export_category(db, category).await?);
    }
    Ok(CatalogJson { categories })
}
