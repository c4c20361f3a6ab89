use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Item {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub cat_id: i64,
    pub user_id: i64, // creator
}

impl Item {
    pub fn description_text(&self) -> &str {
        self.description.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone)]
pub struct NewItem<'a> {
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub cat_id: i64,
    pub user_id: i64,
}
