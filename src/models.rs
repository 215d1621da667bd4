use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub email: String,
    pub created_at: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub color: Option<String>,
    pub icon: Option<String>,
    #[serde(rename = "type")]
    pub category_type: String,
    // None marks a global default category: visible to everyone, owned by no one.
    pub user_id: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    #[serde(default)]
    pub id: i64,
    pub title: String,
    pub amount: f64,
    pub date: String,
    pub notes: Option<String>,
    #[serde(default)]
    pub is_recurring: bool,
    pub show_in_stats: bool,
    pub user_id: i64,
    pub category_id: i64,
    #[serde(default)]
    pub created_at: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Income {
    #[serde(default)]
    pub id: i64,
    pub title: String,
    pub amount: f64,
    pub date: String,
    pub notes: Option<String>,
    #[serde(default)]
    pub is_recurring: bool,
    pub show_in_stats: bool,
    pub user_id: i64,
    pub category_id: i64,
    #[serde(default)]
    pub created_at: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CategoryTotal {
    pub category_id: i64,
    pub category_name: String,
    pub total: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyStats {
    pub total_income: f64,
    pub total_expense: f64,
    pub balance: f64,
    pub income_by_category: Vec<CategoryTotal>,
    pub expense_by_category: Vec<CategoryTotal>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct YearlyStatsEntry {
    pub month: u32,
    #[serde(flatten)]
    pub stats: MonthlyStats,
}
