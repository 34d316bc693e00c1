//! Database access layer with connection pooling and migrations
//!
//! This module is organized by domain:
//! - `profiles` - User profiles and Gmail credentials
//! - `categories` - Shared and per-user expense categories
//! - `expenses` - Expense CRUD, filtering, and dashboard stats
//! - `partners` - Partner invites and the symmetric partner link

use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use tracing::info;

use crate::error::Result;

mod categories;
mod expenses;
mod partners;
mod profiles;

pub use expenses::ExpenseFilter;
pub use partners::InviteBox;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Default shared categories seeded at migration time: (name, color, icon)
const DEFAULT_CATEGORIES: [(&str, &str, &str); 10] = [
    ("Food & Dining", "#f97316", "utensils"),
    ("Transportation", "#3b82f6", "car"),
    ("Shopping", "#ec4899", "shopping-bag"),
    ("Entertainment", "#8b5cf6", "film"),
    ("Bills & Utilities", "#eab308", "receipt"),
    ("Healthcare", "#ef4444", "heart-pulse"),
    ("Travel", "#06b6d4", "plane"),
    ("Groceries", "#22c55e", "shopping-cart"),
    ("Subscriptions", "#6366f1", "repeat"),
    ("Other", "#64748b", "circle-ellipsis"),
];

/// Parse a SQLite datetime string into a DateTime<Utc>
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    // SQLite stores as "YYYY-MM-DD HH:MM:SS" format
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.and_utc())
        .unwrap_or_else(|_| Utc::now())
}

/// Format a DateTime<Utc> the way SQLite's CURRENT_TIMESTAMP does
pub(crate) fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Database wrapper with connection pooling
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    /// Path to the database file
    db_path: String,
}

impl Database {
    /// Create a new database connection pool and run migrations
    pub fn new(path: &str) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::builder().max_size(10).build(manager)?;

        let db = Self {
            pool,
            db_path: path.to_string(),
        };
        db.run_migrations()?;

        Ok(db)
    }

    /// Get the path to the database file
    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Create a throwaway database (for testing)
    ///
    /// Uses a temporary file rather than `:memory:` so every pooled
    /// connection sees the same database.
    pub fn in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = format!(
            "{}/tandem_test_{}_{}.db",
            std::env::temp_dir().display(),
            std::process::id(),
            id
        );

        let _ = std::fs::remove_file(&path);

        Self::new(&path)
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- Enable foreign keys
            PRAGMA foreign_keys = ON;

            -- WAL mode: readers don't block writers
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;

            -- User profiles
            CREATE TABLE IF NOT EXISTS profiles (
                id INTEGER PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                name TEXT,
                partner_id INTEGER REFERENCES profiles(id),
                gmail_connected BOOLEAN NOT NULL DEFAULT 0,
                gmail_refresh_token TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_profiles_partner ON profiles(partner_id);

            -- Categories; user_id NULL = shared/default
            CREATE TABLE IF NOT EXISTS categories (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                color TEXT NOT NULL,
                icon TEXT,
                user_id INTEGER REFERENCES profiles(id),
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_categories_user ON categories(user_id);

            -- Expenses
            CREATE TABLE IF NOT EXISTS expenses (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES profiles(id),
                amount REAL NOT NULL,
                description TEXT NOT NULL,
                category_id INTEGER REFERENCES categories(id),
                merchant TEXT,
                date DATETIME NOT NULL,
                source TEXT NOT NULL DEFAULT 'manual',      -- gmail, manual
                email_id TEXT,                              -- Gmail message id (dedup key)
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_expenses_user ON expenses(user_id);
            CREATE INDEX IF NOT EXISTS idx_expenses_date ON expenses(date);
            CREATE INDEX IF NOT EXISTS idx_expenses_category ON expenses(category_id);

            -- At most one imported expense per (user, originating message)
            CREATE UNIQUE INDEX IF NOT EXISTS idx_expenses_user_email
                ON expenses(user_id, email_id) WHERE email_id IS NOT NULL;

            -- Partner invites
            CREATE TABLE IF NOT EXISTS partner_invites (
                id INTEGER PRIMARY KEY,
                inviter_id INTEGER NOT NULL REFERENCES profiles(id),
                invitee_email TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',     -- pending, accepted, declined
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_invites_inviter ON partner_invites(inviter_id);
            CREATE INDEX IF NOT EXISTS idx_invites_email ON partner_invites(invitee_email);
            "#,
        )?;

        self.seed_default_categories(&conn)?;

        info!("Database schema initialized");
        Ok(())
    }

    /// Insert the shared default categories if they are not already present
    fn seed_default_categories(&self, conn: &DbConn) -> Result<()> {
        let mut stmt = conn.prepare(
            "INSERT INTO categories (name, color, icon, user_id)
             SELECT ?1, ?2, ?3, NULL
             WHERE NOT EXISTS (
                 SELECT 1 FROM categories WHERE name = ?1 AND user_id IS NULL
             )",
        )?;

        for (name, color, icon) in DEFAULT_CATEGORIES {
            stmt.execute(rusqlite::params![name, color, icon])?;
        }

        Ok(())
    }
}
