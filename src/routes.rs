use std::path::PathBuf;

use axum::middleware::from_fn_with_state;
use axum::routing::{get, post, put};
use axum::Router;

use crate::{auth, categories, expenses, incomes, stats};

#[derive(Clone)]
pub struct AppState {
    pub db_path: PathBuf,
    pub jwt_secret: String,
}

pub fn app(state: AppState) -> Router {
    let protected = Router::new()
        .route(
            "/expenses",
            get(expenses::get_expenses_handler).post(expenses::create_expense_handler),
        )
        .route(
            "/expenses/:id",
            put(expenses::update_expense_handler).delete(expenses::delete_expense_handler),
        )
        .route(
            "/incomes",
            get(incomes::get_incomes_handler).post(incomes::create_income_handler),
        )
        .route(
            "/incomes/:id",
            put(incomes::update_income_handler).delete(incomes::delete_income_handler),
        )
        .route(
            "/categories",
            get(categories::get_categories_handler).post(categories::create_category_handler),
        )
        .route(
            "/categories/:id",
            put(categories::update_category_handler).delete(categories::delete_category_handler),
        )
        .route("/stats/monthly", get(stats::get_monthly_stats_handler))
        .route("/stats/yearly", get(stats::get_yearly_stats_handler))
        .route("/stats/compare", get(stats::compare_months_handler))
        .route_layer(from_fn_with_state(state.clone(), auth::require_auth));

    Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        // "me" answers null instead of 401 for a missing or stale token.
        .route("/auth/me", get(auth::me))
        .merge(protected)
        .with_state(state)
}
