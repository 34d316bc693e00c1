//! Expense CRUD, filtering, and dashboard stats

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Datelike, Utc};
use rusqlite::{params, OptionalExtension};

use super::{format_datetime, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{
    CategoryTotal, DashboardStats, Expense, ExpenseSource, ExpenseUpdate, MonthBucket, NewExpense,
};

const EXPENSE_COLUMNS: &str = "e.id, e.user_id, e.amount, e.description, e.category_id, \
     c.name, c.color, c.icon, e.merchant, e.date, e.source, e.email_id, e.created_at, e.updated_at";

fn row_to_expense(row: &rusqlite::Row<'_>) -> rusqlite::Result<Expense> {
    let date_str: String = row.get(9)?;
    let source_str: String = row.get(10)?;
    let created_at_str: String = row.get(12)?;
    let updated_at_str: String = row.get(13)?;

    Ok(Expense {
        id: row.get(0)?,
        user_id: row.get(1)?,
        amount: row.get(2)?,
        description: row.get(3)?,
        category_id: row.get(4)?,
        category: row.get(5)?,
        category_color: row.get(6)?,
        category_icon: row.get(7)?,
        merchant: row.get(8)?,
        date: parse_datetime(&date_str),
        source: source_str.parse().unwrap_or(ExpenseSource::Manual),
        email_id: row.get(11)?,
        created_at: parse_datetime(&created_at_str),
        updated_at: parse_datetime(&updated_at_str),
    })
}

/// Builder for expense list queries
///
/// Shared between the list endpoint and the analysis/stats paths so the
/// filtering logic lives in one place.
#[derive(Default)]
pub struct ExpenseFilter<'query> {
    /// Owners to include; partner-scoped reads pass [self, partner]
    pub user_ids: Vec<i64>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    /// Filter by category name (through the join)
    pub category: Option<&'query str>,
    pub limit: Option<i64>,
    pub offset: i64,
}

impl<'query> ExpenseFilter<'query> {
    pub fn for_users(user_ids: Vec<i64>) -> Self {
        Self {
            user_ids,
            ..Default::default()
        }
    }

    pub fn start_date(mut self, date: Option<DateTime<Utc>>) -> Self {
        self.start_date = date;
        self
    }

    pub fn end_date(mut self, date: Option<DateTime<Utc>>) -> Self {
        self.end_date = date;
        self
    }

    pub fn category(mut self, name: Option<&'query str>) -> Self {
        self.category = name;
        self
    }

    pub fn limit(mut self, limit: Option<i64>) -> Self {
        self.limit = limit;
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }

    fn build(&self) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut sql_params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if !self.user_ids.is_empty() {
            let placeholders: Vec<&str> = self.user_ids.iter().map(|_| "?").collect();
            conditions.push(format!("e.user_id IN ({})", placeholders.join(", ")));
            for id in &self.user_ids {
                sql_params.push(Box::new(*id));
            }
        }

        if let Some(start) = self.start_date {
            conditions.push("e.date >= ?".to_string());
            sql_params.push(Box::new(format_datetime(start)));
        }

        if let Some(end) = self.end_date {
            conditions.push("e.date <= ?".to_string());
            sql_params.push(Box::new(format_datetime(end)));
        }

        if let Some(name) = self.category {
            conditions.push("c.name = ?".to_string());
            sql_params.push(Box::new(name.to_string()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, sql_params)
    }
}

impl Database {
    /// Create an expense.
    ///
    /// A second insert with the same (user, email_id) pair violates the
    /// dedup index and surfaces as a conflict.
    pub fn create_expense(
        &self,
        user_id: i64,
        expense: &NewExpense,
        category_id: Option<i64>,
    ) -> Result<Expense> {
        let conn = self.conn()?;

        let date = expense.date.unwrap_or_else(Utc::now);
        let result = conn.execute(
            "INSERT INTO expenses (user_id, amount, description, category_id, merchant, date, source, email_id)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                user_id,
                expense.amount,
                expense.description,
                category_id,
                expense.merchant,
                format_datetime(date),
                expense.source.as_str(),
                expense.email_id,
            ],
        );

        match result {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                return Err(Error::Conflict(
                    "Expense for this email already imported".into(),
                ));
            }
            Err(e) => return Err(e.into()),
        }

        let id = conn.last_insert_rowid();
        drop(conn);

        self.get_expense(id)?
            .ok_or_else(|| Error::NotFound("Expense not found after creation".into()))
    }

    /// Get an expense by id
    pub fn get_expense(&self, id: i64) -> Result<Option<Expense>> {
        let conn = self.conn()?;
        let expense = conn
            .query_row(
                &format!(
                    "SELECT {} FROM expenses e
                     LEFT JOIN categories c ON e.category_id = c.id
                     WHERE e.id = ?",
                    EXPENSE_COLUMNS
                ),
                params![id],
                row_to_expense,
            )
            .optional()?;
        Ok(expense)
    }

    /// List expenses matching a filter, newest first
    pub fn list_expenses(&self, filter: &ExpenseFilter<'_>) -> Result<Vec<Expense>> {
        let conn = self.conn()?;
        let (where_clause, mut sql_params) = filter.build();

        let mut sql = format!(
            "SELECT {} FROM expenses e
             LEFT JOIN categories c ON e.category_id = c.id
             {}
             ORDER BY e.date DESC, e.id DESC",
            EXPENSE_COLUMNS, where_clause
        );

        if let Some(limit) = filter.limit {
            sql.push_str(" LIMIT ? OFFSET ?");
            sql_params.push(Box::new(limit));
            sql_params.push(Box::new(filter.offset));
        }

        let mut stmt = conn.prepare(&sql)?;
        let param_refs: Vec<&dyn rusqlite::ToSql> =
            sql_params.iter().map(|p| p.as_ref()).collect();
        let expenses = stmt
            .query_map(param_refs.as_slice(), row_to_expense)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(expenses)
    }

    /// Update an expense's editable fields
    pub fn update_expense(
        &self,
        id: i64,
        update: &ExpenseUpdate,
        category_id: Option<i64>,
    ) -> Result<Expense> {
        let conn = self.conn()?;

        // category_id only changes when the update carried a category name
        let set_category = update.category.is_some();
        conn.execute(
            "UPDATE expenses SET
                 amount = COALESCE(?, amount),
                 description = COALESCE(?, description),
                 merchant = COALESCE(?, merchant),
                 date = COALESCE(?, date),
                 category_id = CASE WHEN ? THEN ? ELSE category_id END,
                 updated_at = CURRENT_TIMESTAMP
             WHERE id = ?",
            params![
                update.amount,
                update.description,
                update.merchant,
                update.date.map(format_datetime),
                set_category,
                category_id,
                id,
            ],
        )?;

        drop(conn);
        self.get_expense(id)?
            .ok_or_else(|| Error::NotFound("Expense not found".into()))
    }

    /// Delete an expense
    pub fn delete_expense(&self, id: i64) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM expenses WHERE id = ?", params![id])?;
        Ok(())
    }

    /// Gmail message ids already imported for a user, for sync dedup
    pub fn imported_email_ids(&self, user_id: i64) -> Result<HashSet<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT email_id FROM expenses WHERE user_id = ? AND email_id IS NOT NULL",
        )?;
        let ids = stmt
            .query_map(params![user_id], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<HashSet<_>, _>>()?;
        Ok(ids)
    }

    /// Dashboard statistics over a window starting at `since`
    pub fn expense_stats(
        &self,
        user_ids: Vec<i64>,
        since: DateTime<Utc>,
    ) -> Result<DashboardStats> {
        let now = Utc::now();
        let filter = ExpenseFilter::for_users(user_ids).start_date(Some(since));
        let expenses = self.list_expenses(&filter)?;

        let total_spent: f64 = expenses.iter().map(|e| e.amount).sum();
        let days_in_range = (now - since).num_days().max(1);
        let average_daily = total_spent / days_in_range as f64;

        let month_start = now
            .date_naive()
            .with_day(1)
            .unwrap_or(now.date_naive())
            .and_hms_opt(0, 0, 0)
            .unwrap_or_default()
            .and_utc();
        let total_this_month: f64 = expenses
            .iter()
            .filter(|e| e.date >= month_start)
            .map(|e| e.amount)
            .sum();

        // Per-category totals carrying the display color
        let mut category_totals: HashMap<String, CategoryTotal> = HashMap::new();
        for expense in &expenses {
            let name = expense.category.clone().unwrap_or_else(|| "Other".into());
            let color = expense
                .category_color
                .clone()
                .unwrap_or_else(|| "#64748b".into());
            let entry = category_totals
                .entry(name.clone())
                .or_insert(CategoryTotal {
                    name,
                    color,
                    amount: 0.0,
                });
            entry.amount += expense.amount;
        }
        let mut top_categories: Vec<CategoryTotal> = category_totals.into_values().collect();
        top_categories.sort_by(|a, b| {
            b.amount
                .partial_cmp(&a.amount)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        top_categories.truncate(5);

        // Last six months, oldest first
        let mut monthly_trend = Vec::with_capacity(6);
        for i in (0..6).rev() {
            let month_date = now - chrono::Duration::days(30 * i);
            let month_key = month_date.format("%Y-%m").to_string();
            let amount: f64 = expenses
                .iter()
                .filter(|e| e.date.format("%Y-%m").to_string() == month_key)
                .map(|e| e.amount)
                .sum();
            monthly_trend.push(MonthBucket {
                month: month_date.format("%b").to_string(),
                amount,
            });
        }

        let recent_expenses = expenses.into_iter().take(10).collect();

        Ok(DashboardStats {
            total_spent,
            total_this_month,
            average_daily,
            top_categories,
            recent_expenses,
            monthly_trend,
        })
    }
}
