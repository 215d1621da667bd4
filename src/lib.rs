mod auth;
mod categories;
mod db;
mod error;
mod expenses;
mod guard;
mod incomes;
mod models;
mod routes;
mod stats;
mod validation;

// Re-export specific types and functions from models
pub use models::{Category, CategoryTotal, Expense, Income, MonthlyStats, User, YearlyStatsEntry};

// Re-export the error type
pub use error::Error;

// Re-export database helpers
pub use db::{db_path, init_db, open};

// Re-export the router and its state
pub use routes::{app, AppState};

// Re-export auth primitives used outside the router
pub use auth::{decode_jwt, encode_jwt, hash_password, verify_password, AuthUser};

// Re-export the aggregation engine
pub use stats::{compare_months, monthly_stats, yearly_stats};

// Re-export category provisioning
pub use categories::{provision_user, seed_default_categories};
