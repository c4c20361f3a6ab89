use axum::{
    extract::{Path, State},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Form, Json, Router,
};
use tracing::{info, instrument, warn};

use super::{
    dto::{CatalogJson, CategoryJson, ItemForm, ItemJson},
    repo,
    services::{self, ItemOutcome},
};
use crate::{
    auth::{extractors::CurrentUser, extractors::Session, repo_types::User},
    error::{AppError, AppResult},
    state::AppState,
    views::{
        self, AddItemPage, CatalogPage, CategoryPage, Chrome, DeleteItemPage, EditItemPage,
        ItemPage,
    },
};

// --- public routers ---

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(show_catalog))
        .route("/catalog", get(show_catalog))
        .route("/catalog.json", get(catalog_json))
        .route("/catalog/:category_name", get(category_json))
        .route("/catalog/:category_name/items", get(show_category_items))
        .route("/catalog/:category_name/:item_title", get(show_item))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/catalog/add", get(add_item_form).post(add_item))
        .route(
            "/catalog/:category_name/:item_title/edit",
            get(edit_item_form).post(edit_item),
        )
        .route(
            "/catalog/:category_name/:item_title/delete",
            get(delete_item_form).post(delete_item),
        )
}

// --- JSON export ---

#[instrument(skip(state))]
pub async fn catalog_json(State(state): State<AppState>) -> AppResult<Json<CatalogJson>> {
    Ok(Json(services::export_catalog(&state.db).await?))
}

/// `/catalog/<name>.json`
#[instrument(skip(state))]
pub async fn category_json(
    State(state): State<AppState>,
    Path(segment): Path<String>,
) -> AppResult<Json<CategoryJson>> {
    let Some(name) = segment.strip_suffix(".json") else {
        return Err(AppError::NotFound(format!("Page {} not found", segment)));
    };
    let category = services::load_category(&state.db, name).await?;
    Ok(Json(services::export_category(&state.db, category).await?))
}

// --- pages ---

#[instrument(skip(state, session))]
pub async fn show_catalog(
    State(state): State<AppState>,
    session: Session,
) -> AppResult<Html<String>> {
    let categories = repo::list_categories(&state.db).await?;
    views::render(&CatalogPage {
        chrome: Chrome::new(&state.config.application_name, &session),
        categories,
    })
}

#[instrument(skip(state, session))]
pub async fn show_category_items(
    State(state): State<AppState>,
    session: Session,
    Path(category_name): Path<String>,
) -> AppResult<Html<String>> {
    let category = services::load_category(&state.db, &category_name).await?;
    let categories = repo::list_categories(&state.db).await?;
    let items = repo::list_items_in_category(&state.db, category.id).await?;
    views::render(&CategoryPage {
        chrome: Chrome::new(&state.config.application_name, &session),
        categories,
        category,
        items,
    })
}

/// Item page, or its JSON form when the title ends in `.json`.
#[instrument(skip(state, session))]
pub async fn show_item(
    State(state): State<AppState>,
    session: Session,
    Path((category_name, item_title)): Path<(String, String)>,
) -> AppResult<Response> {
    if let Some(title) = item_title.strip_suffix(".json") {
        let (_, item) = services::load_item(&state.db, &category_name, title).await?;
        return Ok(Json(ItemJson::from(item)).into_response());
    }

    let (category, item) = services::load_item(&state.db, &category_name, &item_title).await?;
    let creator = User::find_by_id(&state.db, item.user_id).await?;
    let viewer = session.data().user_id;
    let is_owner = viewer == Some(item.user_id);

    let (creator_name, creator_picture) = match creator {
        Some(u) => (u.name, u.picture.unwrap_or_default()),
        None => {
            warn!(item_id = item.id, user_id = item.user_id, "item creator missing");
            ("unknown".to_string(), String::new())
        }
    };

    let page = ItemPage {
        chrome: Chrome::new(&state.config.application_name, &session),
        category,
        item,
        creator_name,
        creator_picture,
        is_owner,
    };
    Ok(views::render(&page)?.into_response())
}

// --- add ---

#[instrument(skip(state, session))]
pub async fn add_item_form(
    State(state): State<AppState>,
    _user: CurrentUser,
    session: Session,
) -> AppResult<Html<String>> {
    add_page(&state, &session).await
}

#[instrument(skip(state, session, form), fields(user_id = user.id))]
pub async fn add_item(
    State(state): State<AppState>,
    user: CurrentUser,
    session: Session,
    Form(form): Form<ItemForm>,
) -> AppResult<Response> {
    match services::create_item(&state.db, user.id, &form).await? {
        ItemOutcome::Saved { item, .. } => {
            info!(item_id = item.id, by = %user.name, "item added");
            session.flash("Item sucessfully created!");
            Ok(Redirect::to("/catalog").into_response())
        }
        ItemOutcome::Rejected(reason) => {
            warn!(?reason, "add item rejected");
            session.flash(reason.message());
            Ok(add_page(&state, &session).await?.into_response())
        }
    }
}

async fn add_page(state: &AppState, session: &Session) -> AppResult<Html<String>> {
    let categories = repo::list_categories(&state.db).await?;
    views::render(&AddItemPage {
        chrome: Chrome::new(&state.config.application_name, session),
        categories,
    })
}

// --- edit ---

#[instrument(skip(state, session), fields(user_id = user.id))]
pub async fn edit_item_form(
    State(state): State<AppState>,
    user: CurrentUser,
    session: Session,
    Path((category_name, item_title)): Path<(String, String)>,
) -> AppResult<Html<String>> {
    let (category, item) = services::load_item(&state.db, &category_name, &item_title).await?;
    services::ensure_owner(&item, user.id, "edit")?;
    let categories = repo::list_categories(&state.db).await?;
    views::render(&EditItemPage {
        chrome: Chrome::new(&state.config.application_name, &session),
        categories,
        category,
        item,
    })
}

#[instrument(skip(state, session, form), fields(user_id = user.id))]
pub async fn edit_item(
    State(state): State<AppState>,
    user: CurrentUser,
    session: Session,
    Path((category_name, item_title)): Path<(String, String)>,
    Form(form): Form<ItemForm>,
) -> AppResult<Redirect> {
    let (_, item) = services::load_item(&state.db, &category_name, &item_title).await?;
    services::ensure_owner(&item, user.id, "edit")?;

    match services::apply_edit(&state.db, &item, &form).await? {
        ItemOutcome::Saved { category, item } => {
            session.flash("Item sucessfully edited!");
            Ok(Redirect::to(&views::item_path(&category.name, &item.title)))
        }
        ItemOutcome::Rejected(reason) => {
            warn!(?reason, item_id = item.id, "edit item rejected");
            session.flash(reason.message());
            Ok(Redirect::to(&format!(
                "{}/edit",
                views::item_path(&category_name, &item_title)
            )))
        }
    }
}

// --- delete ---

#[instrument(skip(state, session), fields(user_id = user.id))]
pub async fn delete_item_form(
    State(state): State<AppState>,
    user: CurrentUser,
    session: Session,
    Path((category_name, item_title)): Path<(String, String)>,
) -> AppResult<Html<String>> {
    let (category, item) = services::load_item(&state.db, &category_name, &item_title).await?;
    services::ensure_owner(&item, user.id, "delete")?;
    views::render(&DeleteItemPage {
        chrome: Chrome::new(&state.config.application_name, &session),
        category,
        item,
    })
}

#[instrument(skip(state, session), fields(user_id = user.id))]
pub async fn delete_item(
    State(state): State<AppState>,
    user: CurrentUser,
    session: Session,
    Path((category_name, item_title)): Path<(String, String)>,
) -> AppResult<Redirect> {
    let (category, item) = services::load_item(&state.db, &category_name, &item_title).await?;
    services::ensure_owner(&item, user.id, "delete")?;

    repo::delete_item(&state.db, item.id).await?;
    info!(item_id = item.id, "item deleted");
    session.flash(format!("Successfully deleted {}", item.title));
    Ok(Redirect::to(&views::category_items_path(&category.name)))
}
