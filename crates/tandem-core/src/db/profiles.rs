//! Profile operations

use rusqlite::{params, OptionalExtension};

use super::{parse_datetime, Database};
use crate::error::Result;
use crate::models::Profile;

fn row_to_profile(row: &rusqlite::Row<'_>) -> rusqlite::Result<Profile> {
    let created_at_str: String = row.get(6)?;
    Ok(Profile {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        partner_id: row.get(3)?,
        gmail_connected: row.get(4)?,
        gmail_refresh_token: row.get(5)?,
        created_at: parse_datetime(&created_at_str),
    })
}

const PROFILE_COLUMNS: &str =
    "id, email, name, partner_id, gmail_connected, gmail_refresh_token, created_at";

impl Database {
    /// Create a profile, or return the existing one for this email
    pub fn upsert_profile(&self, email: &str, name: Option<&str>) -> Result<Profile> {
        let conn = self.conn()?;

        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM profiles WHERE email = ?",
                params![email],
                |row| row.get(0),
            )
            .optional()?;

        let id = match existing {
            Some(id) => id,
            None => {
                conn.execute(
                    "INSERT INTO profiles (email, name) VALUES (?, ?)",
                    params![email, name],
                )?;
                conn.last_insert_rowid()
            }
        };

        drop(conn);
        self.get_profile(id)?
            .ok_or_else(|| crate::Error::NotFound("Profile not found after upsert".into()))
    }

    /// Get a profile by id
    pub fn get_profile(&self, id: i64) -> Result<Option<Profile>> {
        let conn = self.conn()?;
        let profile = conn
            .query_row(
                &format!("SELECT {} FROM profiles WHERE id = ?", PROFILE_COLUMNS),
                params![id],
                row_to_profile,
            )
            .optional()?;
        Ok(profile)
    }

    /// Get a profile by email
    pub fn get_profile_by_email(&self, email: &str) -> Result<Option<Profile>> {
        let conn = self.conn()?;
        let profile = conn
            .query_row(
                &format!("SELECT {} FROM profiles WHERE email = ?", PROFILE_COLUMNS),
                params![email],
                row_to_profile,
            )
            .optional()?;
        Ok(profile)
    }

    /// Store the Gmail refresh token and mark the account connected
    pub fn set_gmail_credentials(&self, user_id: i64, refresh_token: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE profiles SET gmail_connected = 1, gmail_refresh_token = ? WHERE id = ?",
            params![refresh_token, user_id],
        )?;
        Ok(())
    }

    /// Drop the Gmail refresh token and mark the account disconnected
    pub fn clear_gmail_credentials(&self, user_id: i64) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE profiles SET gmail_connected = 0, gmail_refresh_token = NULL WHERE id = ?",
            params![user_id],
        )?;
        Ok(())
    }

    /// Resolve the partner id for a user, if linked
    pub fn partner_of(&self, user_id: i64) -> Result<Option<i64>> {
        let conn = self.conn()?;
        let partner: Option<Option<i64>> = conn
            .query_row(
                "SELECT partner_id FROM profiles WHERE id = ?",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(partner.flatten())
    }
}
