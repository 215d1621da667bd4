use std::collections::HashMap;
use std::path::Path;

use axum::extract::{Query, State};
use axum::{Extension, Json};
use chrono::NaiveDate;
use rusqlite::{params, Connection};
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::db;
use crate::error::Error;
use crate::models::{CategoryTotal, MonthlyStats, YearlyStatsEntry};
use crate::routes::AppState;
use crate::validation::validate_month_year;

#[derive(Deserialize)]
pub struct MonthlyStatsQuery {
    pub month: u32,
    pub year: i32,
}

#[derive(Deserialize)]
pub struct YearlyStatsQuery {
    pub year: i32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareMonthsQuery {
    pub month_a: u32,
    pub month_b: u32,
    pub year: i32,
}

pub async fn get_monthly_stats_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<MonthlyStatsQuery>,
) -> Result<Json<MonthlyStats>, Error> {
    validate_month_year(&[query.month], query.year)?;
    let conn = db::open(&state.db_path)?;
    Ok(Json(monthly_stats(&conn, user.user_id, query.month, query.year)?))
}

pub async fn get_yearly_stats_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<YearlyStatsQuery>,
) -> Result<Json<Vec<YearlyStatsEntry>>, Error> {
    validate_month_year(&[], query.year)?;
    Ok(Json(yearly_stats(&state.db_path, user.user_id, query.year).await?))
}

pub async fn compare_months_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<CompareMonthsQuery>,
) -> Result<Json<Vec<MonthlyStats>>, Error> {
    validate_month_year(&[query.month_a, query.month_b], query.year)?;
    let conn = db::open(&state.db_path)?;
    Ok(Json(compare_months(&conn, user.user_id, query.month_a, query.month_b, query.year)))
}

/// Categorized totals and balance for one user over one calendar month.
/// A month with no qualifying records yields zero totals and empty lists.
pub fn monthly_stats(
    conn: &Connection,
    user_id: i64,
    month: u32,
    year: i32,
) -> Result<MonthlyStats, Error> {
    let (start, end) = month_window(month, year)?;

    let expense_groups = grouped_totals(conn, "expenses", user_id, &start, &end)?;
    let income_groups = grouped_totals(conn, "incomes", user_id, &start, &end)?;

    // One batched lookup for every category id seen on either side.
    let ids: Vec<i64> = expense_groups
        .iter()
        .chain(income_groups.iter())
        .map(|(id, _)| *id)
        .collect();
    let names = category_names(conn, &ids)?;

    let expense_by_category = with_names(&expense_groups, &names);
    let income_by_category = with_names(&income_groups, &names);

    let total_expense: f64 = expense_by_category.iter().map(|c| c.total).sum();
    let total_income: f64 = income_by_category.iter().map(|c| c.total).sum();

    Ok(MonthlyStats {
        total_income,
        total_expense,
        balance: total_income - total_expense,
        income_by_category,
        expense_by_category,
    })
}

/// Twelve independent monthly computations, dispatched concurrently and
/// reassembled in month order.
pub async fn yearly_stats(
    db_path: &Path,
    user_id: i64,
    year: i32,
) -> Result<Vec<YearlyStatsEntry>, Error> {
    let mut handles = Vec::with_capacity(12);
    for month in 1..=12u32 {
        let path = db_path.to_path_buf();
        handles.push(tokio::task::spawn_blocking(move || {
            let conn = db::open(&path)?;
            monthly_stats(&conn, user_id, month, year)
        }));
    }

    let mut entries = Vec::with_capacity(12);
    for (month, handle) in (1..=12u32).zip(handles) {
        let stats = handle.await.map_err(|e| Error::Internal(e.to_string()))??;
        entries.push(YearlyStatsEntry { month, stats });
    }
    Ok(entries)
}

/// Two months side by side, in argument order. If either computation fails to
/// produce a result, the comparison degrades to an empty list rather than a
/// partial one.
pub fn compare_months(
    conn: &Connection,
    user_id: i64,
    month_a: u32,
    month_b: u32,
    year: i32,
) -> Vec<MonthlyStats> {
    let stats_a = monthly_stats(conn, user_id, month_a, year);
    let stats_b = monthly_stats(conn, user_id, month_b, year);
    match (stats_a, stats_b) {
        (Ok(a), Ok(b)) => vec![a, b],
        _ => Vec::new(),
    }
}

// Inclusive window covering the whole calendar month.
fn month_window(month: u32, year: i32) -> Result<(String, String), Error> {
    let invalid = || Error::Validation("Invalid month".to_string());
    let start = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
    let next_month = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or_else(invalid)?;
    let end = next_month.pred_opt().ok_or_else(invalid)?;
    Ok((
        start.format("%Y-%m-%d").to_string(),
        end.format("%Y-%m-%d").to_string(),
    ))
}

// Per-category sums for records opted into stats, in first-appearance order.
fn grouped_totals(
    conn: &Connection,
    table: &str,
    user_id: i64,
    start: &str,
    end: &str,
) -> Result<Vec<(i64, f64)>, Error> {
    let mut stmt = conn.prepare(&format!(
        "SELECT category_id, SUM(amount) FROM {table}
         WHERE user_id = ?1 AND date BETWEEN ?2 AND ?3 AND show_in_stats = 1
         GROUP BY category_id ORDER BY MIN(id)"
    ))?;
    let rows = stmt.query_map(params![user_id, start, end], |row| {
        Ok((row.get::<_, i64>(0)?, row.get::<_, f64>(1)?))
    })?;
    let mut groups = Vec::new();
    for group in rows {
        groups.push(group?);
    }
    Ok(groups)
}

fn category_names(conn: &Connection, ids: &[i64]) -> Result<HashMap<i64, String>, Error> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let placeholders = vec!["?"; ids.len()].join(", ");
    let mut stmt = conn.prepare(&format!(
        "SELECT id, name FROM categories WHERE id IN ({placeholders})"
    ))?;
    let rows = stmt.query_map(rusqlite::params_from_iter(ids.iter()), |row| {
        Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
    })?;
    let mut names = HashMap::new();
    for row in rows {
        let (id, name) = row?;
        names.insert(id, name);
    }
    Ok(names)
}

fn with_names(groups: &[(i64, f64)], names: &HashMap<i64, String>) -> Vec<CategoryTotal> {
    groups
        .iter()
        .map(|(category_id, total)| CategoryTotal {
            category_id: *category_id,
            // A category deleted after the fact still renders, as "Unknown".
            category_name: names
                .get(category_id)
                .cloned()
                .unwrap_or_else(|| "Unknown".to_string()),
            total: *total,
        })
        .collect()
}
