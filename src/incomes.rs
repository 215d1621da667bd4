use axum::extract::{Path, State};
use axum::{Extension, Json};
use chrono::Utc;
use rusqlite::{params, Connection};
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::db;
use crate::error::Error;
use crate::guard;
use crate::models::Income;
use crate::routes::AppState;
use crate::validation::validate_record_input;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomeInput {
    pub title: String,
    pub amount: f64,
    pub category_id: i64,
    pub notes: Option<String>,
    pub is_recurring: Option<bool>,
    pub show_in_stats: Option<bool>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomeUpdateInput {
    pub title: Option<String>,
    pub amount: Option<f64>,
    pub category_id: Option<i64>,
    pub notes: Option<String>,
    pub is_recurring: Option<bool>,
    pub show_in_stats: Option<bool>,
}

pub async fn get_incomes_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<Income>>, Error> {
    let conn = db::open(&state.db_path)?;
    Ok(Json(get_incomes(&conn, user.user_id)?))
}

pub async fn create_income_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(input): Json<IncomeInput>,
) -> Result<Json<Income>, Error> {
    let conn = db::open(&state.db_path)?;
    let date = Utc::now().format("%Y-%m-%d").to_string();
    Ok(Json(add_income(&conn, user.user_id, &input, &date)?))
}

pub async fn update_income_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(input): Json<IncomeUpdateInput>,
) -> Result<Json<Income>, Error> {
    let conn = db::open(&state.db_path)?;
    Ok(Json(update_income(&conn, user.user_id, id, &input)?))
}

pub async fn delete_income_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<Json<bool>, Error> {
    let conn = db::open(&state.db_path)?;
    Ok(Json(delete_income(&conn, user.user_id, id)?))
}

pub fn get_incomes(conn: &Connection, user_id: i64) -> Result<Vec<Income>, Error> {
    let mut stmt = conn.prepare(
        "SELECT id, title, amount, date, notes, is_recurring, show_in_stats, user_id,
                category_id, created_at
         FROM incomes WHERE user_id = ?1 ORDER BY date DESC",
    )?;
    let rows = stmt.query_map(params![user_id], map_income)?;
    let mut incomes = Vec::new();
    for income in rows {
        incomes.push(income?);
    }
    Ok(incomes)
}

pub fn add_income(
    conn: &Connection,
    user_id: i64,
    input: &IncomeInput,
    date: &str,
) -> Result<Income, Error> {
    validate_record_input(
        Some(&input.title),
        Some(input.amount),
        Some(input.category_id),
        input.notes.as_deref(),
    )?;
    guard::usable_category(conn, user_id, input.category_id)?;

    conn.execute(
        "INSERT INTO incomes (title, amount, date, notes, is_recurring, show_in_stats, user_id, category_id)
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
    fetch_income(conn, conn.last_insert_rowid())
}

pub fn update_income(
    conn: &Connection,
    user_id: i64,
    id: i64,
    input: &IncomeUpdateInput,
) -> Result<Income, Error> {
    validate_record_input(
        input.title.as_deref(),
        input.amount,
        input.category_id,
        input.notes.as_deref(),
    )?;
    guard::owned_record(conn, "incomes", user_id, id)?;
    if let Some(category_id) = input.category_id {
        guard::usable_category(conn, user_id, category_id)?;
    }

    conn.execute(
        "UPDATE incomes SET title = COALESCE(?1, title), amount = COALESCE(?2, amount),
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
    fetch_income(conn, id)
}

pub fn delete_income(conn: &Connection, user_id: i64, id: i64) -> Result<bool, Error> {
    guard::owned_record(conn, "incomes", user_id, id)?;
    conn.execute("DELETE FROM incomes WHERE id = ?1", params![id])?;
    Ok(true)
}

fn fetch_income(conn: &Connection, id: i64) -> Result<Income, Error> {
    let income = conn.query_row(
        "SELECT id, title, amount, date, notes, is_recurring, show_in_stats, user_id,
                category_id, created_at
         FROM incomes WHERE id = ?1",
        params![id],
        map_income,
    )?;
    Ok(income)
}

fn map_income(row: &rusqlite::Row<'_>) -> rusqlite::Result<Income> {
    Ok(Income {
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

#[cfg(test)]
mod tests {
    use rusqlite::Connection;

    use crate::auth::create_user;
    use crate::categories::{add_category, CategoryInput};
    use crate::db::init_db;
    use crate::error::Error;

    use super::*;

    fn setup() -> (Connection, i64, i64) {
        let conn = Connection::open_in_memory().unwrap();
        init_db(&conn).unwrap();
        let user = create_user(&conn, "claire@test.com", "hash").unwrap();
        let category = add_category(
            &conn,
            user.id,
            &CategoryInput {
                name: "Salaire".to_string(),
                color: None,
                icon: None,
                category_type: "INCOME".to_string(),
            },
        )
        .unwrap();
        (conn, user.id, category.id)
    }

    #[test]
    fn create_update_delete_cycle() {
        let (conn, user_id, category_id) = setup();
        let income = add_income(
            &conn,
            user_id,
            &IncomeInput {
                title: "Salaire mars".to_string(),
                amount: 2300.0,
                category_id,
                notes: None,
                is_recurring: Some(true),
                show_in_stats: None,
            },
            "2024-03-28",
        )
        .unwrap();
        assert!(income.is_recurring);
        assert!(income.show_in_stats);

        let updated = update_income(
            &conn,
            user_id,
            income.id,
            &IncomeUpdateInput {
                title: None,
                amount: Some(2450.0),
                category_id: None,
                notes: None,
                is_recurring: None,
                show_in_stats: None,
            },
        )
        .unwrap();
        assert_eq!(updated.amount, 2450.0);
        assert_eq!(updated.title, "Salaire mars");

        assert!(delete_income(&conn, user_id, income.id).unwrap());
        assert!(get_incomes(&conn, user_id).unwrap().is_empty());
    }

    #[test]
    fn foreign_category_reads_as_not_found() {
        let (conn, user_id, _) = setup();
        let other = create_user(&conn, "paul@test.com", "hash").unwrap();
        let foreign = add_category(
            &conn,
            other.id,
            &CategoryInput {
                name: "Prime".to_string(),
                color: None,
                icon: None,
                category_type: "INCOME".to_string(),
            },
        )
        .unwrap();

        let err = add_income(
            &conn,
            user_id,
            &IncomeInput {
                title: "Prime".to_string(),
                amount: 500.0,
                category_id: foreign.id,
                notes: None,
                is_recurring: None,
                show_in_stats: None,
            },
            "2024-03-28",
        )
        .unwrap_err();
        assert!(matches!(err, Error::NotFound("Category")));
    }
}
