//! Domain models for Tandem

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How an expense entered the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExpenseSource {
    /// Auto-imported from a labeled Gmail message
    Gmail,
    /// Manually entered
    #[default]
    Manual,
}

impl ExpenseSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gmail => "gmail",
            Self::Manual => "manual",
        }
    }
}

impl std::str::FromStr for ExpenseSource {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gmail" => Ok(Self::Gmail),
            "manual" => Ok(Self::Manual),
            _ => Err(format!("Unknown expense source: {}", s)),
        }
    }
}

impl std::fmt::Display for ExpenseSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A persisted expense, with the category join expanded when present
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expense {
    pub id: i64,
    pub user_id: i64,
    pub amount: f64,
    pub description: String,
    pub category_id: Option<i64>,
    /// Category name from the join (None when uncategorized)
    pub category: Option<String>,
    pub category_color: Option<String>,
    pub category_icon: Option<String>,
    pub merchant: Option<String>,
    pub date: DateTime<Utc>,
    pub source: ExpenseSource,
    /// Originating Gmail message id; dedup key for imported expenses
    pub email_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An expense draft, not yet persisted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewExpense {
    pub amount: f64,
    pub description: String,
    /// Category name; resolved to an id (or AI-suggested) at creation time
    pub category: Option<String>,
    pub merchant: Option<String>,
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub source: ExpenseSource,
    pub email_id: Option<String>,
}

/// Partial update for an expense
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExpenseUpdate {
    pub amount: Option<f64>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub merchant: Option<String>,
    pub date: Option<DateTime<Utc>>,
}

/// An expense category. `user_id` is None for shared/default categories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub color: String,
    pub icon: Option<String>,
    pub user_id: Option<i64>,
}

/// Request body for creating a custom category
#[derive(Debug, Clone, Deserialize)]
pub struct NewCategory {
    pub name: String,
    #[serde(default = "default_category_color")]
    pub color: String,
    pub icon: Option<String>,
}

fn default_category_color() -> String {
    "#6366f1".to_string()
}

/// Partial update for a category
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryUpdate {
    pub name: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
}

/// A user profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: i64,
    pub email: String,
    pub name: Option<String>,
    /// Symmetric partner link; both sides point at each other
    pub partner_id: Option<i64>,
    pub gmail_connected: bool,
    #[serde(skip_serializing)]
    pub gmail_refresh_token: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Partner invite lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InviteStatus {
    Pending,
    Accepted,
    Declined,
}

impl InviteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Declined => "declined",
        }
    }
}

impl std::str::FromStr for InviteStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "declined" => Ok(Self::Declined),
            _ => Err(format!("Unknown invite status: {}", s)),
        }
    }
}

impl std::fmt::Display for InviteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A partner invitation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartnerInvite {
    pub id: i64,
    pub inviter_id: i64,
    pub invitee_email: String,
    pub status: InviteStatus,
    /// Inviter email/name, expanded on received invites
    pub inviter_email: Option<String>,
    pub inviter_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A decoded email, produced by the Gmail client and consumed once by the
/// extractor. Never persisted.
#[derive(Debug, Clone, Default)]
pub struct ExtractedEmail {
    /// Gmail message id
    pub id: String,
    pub subject: String,
    pub from: String,
    /// Raw Date header value
    pub date: String,
    /// Decoded text body (plain preferred, HTML fallback)
    pub body: String,
    pub snippet: String,
}

/// Analysis window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    Week,
    #[default]
    Month,
    Quarter,
    Year,
}

impl Timeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Week => "week",
            Self::Month => "month",
            Self::Quarter => "quarter",
            Self::Year => "year",
        }
    }

    /// Window size in days
    pub fn days(&self) -> i64 {
        match self {
            Self::Week => 7,
            Self::Month => 30,
            Self::Quarter => 90,
            Self::Year => 365,
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One week of spending, keyed by the Monday that starts it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekBucket {
    /// ISO date of the week's Monday, "YYYY-MM-DD"
    pub week: String,
    pub amount: f64,
}

/// Structured result of an AI spending analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub summary: String,
    pub insights: Vec<String>,
    pub recommendations: Vec<String>,
    pub spending_by_category: std::collections::HashMap<String, f64>,
    pub trends: Vec<WeekBucket>,
}

/// Request body for POST /analysis
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisRequest {
    #[serde(default)]
    pub timeframe: Timeframe,
    #[serde(default)]
    pub include_partner: bool,
}

/// Per-category total with display color, for dashboard stats
#[derive(Debug, Clone, Serialize)]
pub struct CategoryTotal {
    pub name: String,
    pub color: String,
    pub amount: f64,
}

/// One month of spending for the dashboard trend
#[derive(Debug, Clone, Serialize)]
pub struct MonthBucket {
    /// Abbreviated month name, e.g. "Jan"
    pub month: String,
    pub amount: f64,
}

/// Dashboard statistics
#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub total_spent: f64,
    pub total_this_month: f64,
    pub average_daily: f64,
    pub top_categories: Vec<CategoryTotal>,
    pub recent_expenses: Vec<Expense>,
    pub monthly_trend: Vec<MonthBucket>,
}

/// One side of a partner spending comparison
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonSide {
    pub total: f64,
    /// Share of the combined total, 0..=100 (0 when combined is 0)
    pub percentage: f64,
    pub by_category: std::collections::HashMap<String, f64>,
}

/// Partner spending comparison
#[derive(Debug, Clone, Serialize)]
pub struct Comparison {
    pub user: ComparisonSide,
    pub partner: ComparisonSide,
    pub combined: CombinedSide,
}

/// Combined totals of a partner comparison
#[derive(Debug, Clone, Serialize)]
pub struct CombinedSide {
    pub total: f64,
    pub by_category: std::collections::HashMap<String, f64>,
}

/// The fixed category labels the model may choose from when suggesting a
/// category for a single expense. Order matches the seeded shared categories.
pub const CATEGORY_LABELS: [&str; 10] = [
    "Food & Dining",
    "Transportation",
    "Shopping",
    "Entertainment",
    "Bills & Utilities",
    "Healthcare",
    "Travel",
    "Groceries",
    "Subscriptions",
    "Other",
];
