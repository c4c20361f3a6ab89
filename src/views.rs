use askama::Template;
use axum::response::Html;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};

use crate::{
    auth::extractors::Session,
    catalog::repo_types::{Category, Item},
    error::AppResult,
};

/// Percent-encodes one URL path segment.
pub fn encode_segment(s: &str) -> String {
    utf8_percent_encode(s, NON_ALPHANUMERIC).to_string()
}

pub fn category_items_path(category: &str) -> String {
    format!("/catalog/{}/items", encode_segment(category))
}

pub fn item_path(category: &str, title: &str) -> String {
    format!(
        "/catalog/{}/{}",
        encode_segment(category),
        encode_segment(title)
    )
}

mod filters {
    pub fn seg<T: std::fmt::Display>(s: T) -> ::askama::Result<String> {
        Ok(super::encode_segment(&s.to_string()))
    }
}

pub fn render<T: Template>(page: &T) -> AppResult<Html<String>> {
    Ok(Html(page.render()?))
}

/// Header data shared by every full page.
pub struct Chrome {
    pub app_name: String,
    pub logged_in: bool,
    pub username: String,
    pub picture: String,
    pub flashes: Vec<String>,
}

impl Chrome {
    /// Reads the login state and drains pending flash messages.
    pub fn new(app_name: &str, session: &Session) -> Self {
        let flashes = session.take_flashes();
        let user = session.data().user();
        Self {
            app_name: app_name.to_string(),
            logged_in: user.is_some(),
            username: user.as_ref().map(|u| u.name.clone()).unwrap_or_default(),
            picture: user.and_then(|u| u.picture).unwrap_or_default(),
            flashes,
        }
    }
}

#[derive(Template)]
#[template(path = "catalog.html")]
pub struct CatalogPage {
    pub chrome: Chrome,
    pub categories: Vec<Category>,
}

#[derive(Template)]
#[template(path = "category.html")]
pub struct CategoryPage {
    pub chrome: Chrome,
    pub categories: Vec<Category>,
    pub category: Category,
    pub items: Vec<Item>,
}

#[derive(Template)]
#[template(path = "item.html")]
pub struct ItemPage {
    pub chrome: Chrome,
    pub category: Category,
    pub item: Item,
    pub creator_name: String,
    pub creator_picture: String,
    pub is_owner: bool,
}

#[derive(Template)]
#[template(path = "add_item.html")]
pub struct AddItemPage {
    pub chrome: Chrome,
    pub categories: Vec<Category>,
}

#[derive(Template)]
#[template(path = "edit_item.html")]
pub struct EditItemPage {
    pub chrome: Chrome,
    pub categories: Vec<Category>,
    pub category: Category,
    pub item: Item,
}

#[derive(Template)]
#[template(path = "delete_item.html")]
pub struct DeleteItemPage {
    pub chrome: Chrome,
    pub category: Category,
    pub item: Item,
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginPage {
    pub chrome: Chrome,
    pub state: String,
    pub client_id: String,
}

/// Fragment returned to the login page script after a successful connect.
#[derive(Template)]
#[template(path = "welcome.html")]
pub struct WelcomeFragment {
    pub username: String,
    pub picture: String,
}
