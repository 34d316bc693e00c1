//! Category operations
//!
//! Categories come in two scopes: shared defaults (user_id NULL) visible to
//! everyone, and per-user customs. Name uniqueness is enforced across the
//! union of both scopes for a given user.

use rusqlite::{params, OptionalExtension};

use super::Database;
use crate::error::{Error, Result};
use crate::models::{Category, CategoryUpdate, NewCategory};

fn row_to_category(row: &rusqlite::Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        color: row.get(2)?,
        icon: row.get(3)?,
        user_id: row.get(4)?,
    })
}

impl Database {
    /// List shared defaults plus this user's custom categories, by name
    pub fn list_categories(&self, user_id: i64) -> Result<Vec<Category>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, color, icon, user_id FROM categories
             WHERE user_id IS NULL OR user_id = ?
             ORDER BY name",
        )?;

        let categories = stmt
            .query_map(params![user_id], row_to_category)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(categories)
    }

    /// Get a category by id
    pub fn get_category(&self, id: i64) -> Result<Option<Category>> {
        let conn = self.conn()?;
        let category = conn
            .query_row(
                "SELECT id, name, color, icon, user_id FROM categories WHERE id = ?",
                params![id],
                row_to_category,
            )
            .optional()?;
        Ok(category)
    }

    /// Resolve a category id by name within a user's visible scope
    pub fn category_id_by_name(&self, user_id: i64, name: &str) -> Result<Option<i64>> {
        let conn = self.conn()?;
        let id = conn
            .query_row(
                "SELECT id FROM categories
                 WHERE name = ? AND (user_id IS NULL OR user_id = ?)
                 ORDER BY user_id IS NULL
                 LIMIT 1",
                params![name, user_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    /// Create a custom category for a user
    ///
    /// Rejects names that collide with a shared default or with another of
    /// the user's own categories.
    pub fn create_category(&self, user_id: i64, category: &NewCategory) -> Result<Category> {
        let conn = self.conn()?;

        let duplicate: Option<i64> = conn
            .query_row(
                "SELECT id FROM categories
                 WHERE name = ? AND (user_id IS NULL OR user_id = ?)",
                params![category.name, user_id],
                |row| row.get(0),
            )
            .optional()?;
        if duplicate.is_some() {
            return Err(Error::Conflict(
                "Category with this name already exists".into(),
            ));
        }

        conn.execute(
            "INSERT INTO categories (name, color, icon, user_id) VALUES (?, ?, ?, ?)",
            params![category.name, category.color, category.icon, user_id],
        )?;
        let id = conn.last_insert_rowid();

        drop(conn);
        self.get_category(id)?
            .ok_or_else(|| Error::NotFound("Category not found after creation".into()))
    }

    /// Update a user's own category. Shared defaults and other users'
    /// categories are off limits.
    pub fn update_category(
        &self,
        user_id: i64,
        category_id: i64,
        update: &CategoryUpdate,
    ) -> Result<Category> {
        let existing = self
            .get_category(category_id)?
            .ok_or_else(|| Error::NotFound("Category not found".into()))?;
        if existing.user_id != Some(user_id) {
            return Err(Error::Forbidden("Cannot modify this category".into()));
        }

        let conn = self.conn()?;
        conn.execute(
            "UPDATE categories SET
                 name = COALESCE(?, name),
                 color = COALESCE(?, color),
                 icon = COALESCE(?, icon)
             WHERE id = ?",
            params![update.name, update.color, update.icon, category_id],
        )?;

        drop(conn);
        self.get_category(category_id)?
            .ok_or_else(|| Error::NotFound("Category not found".into()))
    }

    /// Delete a user's own category.
    ///
    /// Expenses pointing at it are reassigned to no category (never deleted);
    /// both steps run in one transaction.
    pub fn delete_category(&self, user_id: i64, category_id: i64) -> Result<()> {
        let existing = self
            .get_category(category_id)?
            .ok_or_else(|| Error::NotFound("Category not found".into()))?;
        if existing.user_id != Some(user_id) {
            return Err(Error::Forbidden("Cannot delete this category".into()));
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "UPDATE expenses SET category_id = NULL WHERE category_id = ?",
            params![category_id],
        )?;
        tx.execute("DELETE FROM categories WHERE id = ?", params![category_id])?;
        tx.commit()?;

        Ok(())
    }
}
