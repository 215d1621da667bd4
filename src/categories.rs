use axum::extract::{Path, State};
use axum::{Extension, Json};
use rusqlite::{params, Connection};
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::db;
use crate::error::Error;
use crate::guard;
use crate::models::Category;
use crate::routes::AppState;
use crate::validation::validate_category_input;

// Global default catalog, seeded once and copied per user at registration.
const DEFAULT_CATEGORIES: &[(&str, &str, &str, &str)] = &[
    ("Alimentation", "#FFB6B6", "🥪", "EXPENSE"),
    ("Logement", "#A3CEF1", "🏠", "EXPENSE"),
    ("Transport", "#FDD85D", "🚗", "EXPENSE"),
    ("Loisirs", "#E6B6FF", "🎮", "EXPENSE"),
    ("Santé", "#FFDAAF", "💊", "EXPENSE"),
    ("Salaire", "#9FE6A0", "💰", "INCOME"),
    ("Prime", "#F4A261", "🎁", "INCOME"),
    ("Autre", "#B0B0B0", "✨", "INCOME"),
];

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryInput {
    pub name: String,
    pub color: Option<String>,
    pub icon: Option<String>,
    #[serde(rename = "type")]
    pub category_type: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryUpdateInput {
    pub name: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
}

pub async fn get_categories_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<Category>>, Error> {
    let conn = db::open(&state.db_path)?;
    Ok(Json(get_categories(&conn, user.user_id)?))
}

pub async fn create_category_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(input): Json<CategoryInput>,
) -> Result<Json<Category>, Error> {
    let conn = db::open(&state.db_path)?;
    Ok(Json(add_category(&conn, user.user_id, &input)?))
}

pub async fn update_category_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(input): Json<CategoryUpdateInput>,
) -> Result<Json<Category>, Error> {
    let conn = db::open(&state.db_path)?;
    Ok(Json(update_category(&conn, user.user_id, id, &input)?))
}

pub async fn delete_category_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<Json<bool>, Error> {
    let conn = db::open(&state.db_path)?;
    Ok(Json(delete_category(&conn, user.user_id, id)?))
}

// Own categories plus the global defaults, name ascending.
pub fn get_categories(conn: &Connection, user_id: i64) -> Result<Vec<Category>, Error> {
    let mut stmt = conn.prepare(
        "SELECT id, name, color, icon, type, user_id FROM categories
         WHERE user_id = ?1 OR user_id IS NULL ORDER BY name",
    )?;
    let rows = stmt.query_map(params![user_id], |row| {
        Ok(Category {
            id: row.get(0)?,
            name: row.get(1)?,
            color: row.get(2)?,
            icon: row.get(3)?,
            category_type: row.get(4)?,
            user_id: row.get(5)?,
        })
    })?;
    let mut categories = Vec::new();
    for category in rows {
        categories.push(category?);
    }
    Ok(categories)
}

pub fn add_category(conn: &Connection, user_id: i64, input: &CategoryInput) -> Result<Category, Error> {
    validate_category_input(Some(&input.name), Some(&input.category_type))?;
    conn.execute(
        "INSERT INTO categories (name, color, icon, type, user_id) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![input.name, input.color, input.icon, input.category_type, user_id],
    )?;
    fetch_category(conn, conn.last_insert_rowid())
}

// The type column is deliberately never updated: a category keeps its kind
// for life, so historical stats stay on the side they were recorded on.
pub fn update_category(
    conn: &Connection,
    user_id: i64,
    id: i64,
    input: &CategoryUpdateInput,
) -> Result<Category, Error> {
    validate_category_input(input.name.as_deref(), None)?;
    guard::owned_category(conn, user_id, id)?;
    conn.execute(
        "UPDATE categories SET name = COALESCE(?1, name), color = COALESCE(?2, color),
         icon = COALESCE(?3, icon) WHERE id = ?4",
        params![input.name, input.color, input.icon, id],
    )?;
    fetch_category(conn, id)
}

pub fn delete_category(conn: &Connection, user_id: i64, id: i64) -> Result<bool, Error> {
    guard::owned_category(conn, user_id, id)?;
    conn.execute("DELETE FROM categories WHERE id = ?1", params![id])?;
    Ok(true)
}

/// One-time setup for a freshly registered user: make sure the global catalog
/// exists, then hand the user an independent copy of it.
pub fn provision_user(conn: &Connection, user_id: i64) -> Result<(), Error> {
    seed_default_categories(conn)?;
    duplicate_defaults_for_user(conn, user_id)
}

// All-or-nothing seed: any existing global row means the catalog is assumed
// complete and nothing is topped up.
pub fn seed_default_categories(conn: &Connection) -> Result<(), Error> {
    let existing: i64 = conn.query_row(
        "SELECT COUNT(*) FROM categories WHERE user_id IS NULL",
        [],
        |row| row.get(0),
    )?;
    if existing > 0 {
        return Ok(());
    }
    for (name, color, icon, category_type) in DEFAULT_CATEGORIES {
        conn.execute(
            "INSERT INTO categories (name, color, icon, type, user_id) VALUES (?1, ?2, ?3, ?4, NULL)",
            params![name, color, icon, category_type],
        )?;
    }
    tracing::info!("default categories created");
    Ok(())
}

pub fn duplicate_defaults_for_user(conn: &Connection, user_id: i64) -> Result<(), Error> {
    let copied = conn.execute(
        "INSERT INTO categories (name, color, icon, type, user_id)
         SELECT name, color, icon, type, ?1 FROM categories WHERE user_id IS NULL",
        params![user_id],
    )?;
    if copied == 0 {
        tracing::warn!("no default categories found to duplicate");
        return Ok(());
    }
    tracing::info!(user_id, "{copied} default categories duplicated");
    Ok(())
}

fn fetch_category(conn: &Connection, id: i64) -> Result<Category, Error> {
    let category = conn.query_row(
        "SELECT id, name, color, icon, type, user_id FROM categories WHERE id = ?1",
        params![id],
        |row| {
            Ok(Category {
                id: row.get(0)?,
                name: row.get(1)?,
                color: row.get(2)?,
                icon: row.get(3)?,
                category_type: row.get(4)?,
                user_id: row.get(5)?,
            })
        },
    )?;
    Ok(category)
}
