use axum::extract::{Path, State};
use axum::{Extension, Json};
use chrono::Utc;
use rusqlite::{params, Connection};
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::db;
use crate::error::Error;
use crate::guard;
use crate::models::Expense;
use crate::routes::AppState;
use crate::validation::validate_record_input;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseInput {
    pub title: String,
    pub amount: f64,
    pub category_id: i64,
    pub notes: Option<String>,
    pub is_recurring: Option<bool>,
    pub show_in_stats: Option<bool>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseUpdateInput {
    pub title: Option<String>,
    pub amount: Option<f64>,
    pub category_id: Option<i64>,
    pub notes: Option<String>,
    pub is_recurring: Option<bool>,
    pub show_in_stats: Option<bool>,
}

pub async fn get_expenses_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<Expense>>, Error> {
    let conn = db::open(&state.db_path)?;
    Ok(Json(get_expenses(&conn, user.user_id)?))
}

pub async fn create_expense_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(input): Json<ExpenseInput>,
) -> Result<Json<Expense>, Error> {
    let conn = db::open(&state.db_path)?;
    let date = Utc::now().format("%Y-%m-%d").to_string();
    Ok(Json(add_expense(&conn, user.user_id, &input, &date)?))
}

pub async fn update_expense_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(input): Json<ExpenseUpdateInput>,
) -> Result<Json<Expense>, Error> {
    let conn = db::open(&state.db_path)?;
    Ok(Json(update_expense(&conn, user.user_id, id, &input)?))
}

pub async fn delete_expense_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<Json<bool>, Error> {
    let conn = db::open(&state.db_path)?;
    Ok(Json(delete_expense(&conn, user.user_id, id)?))
}

pub fn get_expenses(conn: &Connection, user_id: i64) -> Result<Vec<Expense>, Error> {
    let mut stmt = conn.prepare(
        "SELECT id, title, amount, date, notes, is_recurring, show_in_stats, user_id,
                category_id, created_at
         FROM expenses WHERE user_id = ?1 ORDER BY date DESC",
    )?;
    let rows = stmt.query_map(params![user_id], map_expense)?;
    let mut expenses = Vec::new();
    for expense in rows {
        expenses.push(expense?);
    }
    Ok(expenses)
}

pub fn add_expense(
    conn: &Connection,
    user_id: i64,
    input: &ExpenseInput,
    date: &str,
) -> Result<Expense, Error> {
    validate_record_input(
        Some(&input.title),
        Some(input.amount),
        Some(input.category_id),
        input.notes.as_deref(),
    )?;
    // Masked existence check: a foreign category reads as missing.
    guard::usable_category(conn, user_id, input.category_id)?;

    conn.execute(
        "INSERT INTO expenses (title, amount, date, notes, is_recurring, show_in_stats, user_id, category_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            input.title,
            input.amount,
            date,
            input.notes,
            input.is_recurring.unwrap_or(false),
            input.show_in_stats.unwrap_or(true),
            user_id,
            input.category_id,
        ],
    )?;
    fetch_expense(conn, conn.last_insert_rowid())
}

pub fn update_expense(
    conn: &Connection,
    user_id: i64,
    id: i64,
    input: &ExpenseUpdateInput,
) -> Result<Expense, Error> {
    validate_record_input(
        input.title.as_deref(),
        input.amount,
        input.category_id,
        input.notes.as_deref(),
    )?;
    guard::owned_record(conn, "expenses", user_id, id)?;
    if let Some(category_id) = input.category_id {
        guard::usable_category(conn, user_id, category_id)?;
    }

    conn.execute(
        "UPDATE expenses SET title = COALESCE(?1, title), amount = COALESCE(?2, amount),
         category_id = COALESCE(?3, category_id), notes = COALESCE(?4, notes),
         is_recurring = COALESCE(?5, is_recurring), show_in_stats = COALESCE(?6, show_in_stats)
         WHERE id = ?7",
        params![
            input.title,
            input.amount,
            input.category_id,
            input.notes,
            input.is_recurring,
            input.show_in_stats,
            id,
        ],
    )?;
    fetch_expense(conn, id)
}

pub fn delete_expense(conn: &Connection, user_id: i64, id: i64) -> Result<bool, Error> {
    guard::owned_record(conn, "expenses", user_id, id)?;
    conn.execute("DELETE FROM expenses WHERE id = ?1", params![id])?;
    Ok(true)
}

fn fetch_expense(conn: &Connection, id: i64) -> Result<Expense, Error> {
    let expense = conn.query_row(
        "SELECT id, title, amount, date, notes, is_recurring, show_in_stats, user_id,
                category_id, created_at
         FROM expenses WHERE id = ?1",
        params![id],
        map_expense,
    )?;
    Ok(expense)
}

fn map_expense(row: &rusqlite::Row<'_>) -> rusqlite::Result<Expense> {
    Ok(Expense {
        id: row.get(0)?,
        title: row.get(1)?,
        amount: row.get(2)?,
        date: row.get(3)?,
        notes: row.get(4)?,
        is_recurring: row.get(5)?,
        show_in_stats: row.get(6)?,
        user_id: row.get(7)?,
        category_id: row.get(8)?,
        created_at: row.get(9)?,
    })
}
