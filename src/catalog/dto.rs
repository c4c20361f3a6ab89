use serde::{Deserialize, Serialize};

use super::repo_types::{Category, Item};

/// Fields posted by the add and edit forms.
#[derive(Debug, Deserialize)]
pub struct ItemForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub cat_id: i64,
}

#[derive(Debug, Serialize)]
pub struct ItemJson {
    pub cat_id: i64,
    pub description: Option<String>,
    pub id: i64,
    pub title: String,
}

impl From<Item> for ItemJson {
    fn from(i: Item) -> Self {
        Self {
            cat_id: i.cat_id,
            description: i.description,
            id: i.id,
            title: i.title,
        }
    }
}

/// A category with its items; `Item` is left out when there are none.
#[derive(Debug, Serialize)]
pub struct CategoryJson {
    pub id: i64,
    pub name: String,
    #[serde(rename = "Item", skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<ItemJson>,
}

impl CategoryJson {
    pub fn new(category: Category, items: Vec<Item>) -> Self {
        Self {
            id: category.id,
            name: category.name,
            items: items.into_iter().map(ItemJson::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CatalogJson {
    #[serde(rename = "Category")]
    pub categories: Vec<CategoryJson>,
}
