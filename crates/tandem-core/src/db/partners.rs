//! Partner invites and the symmetric partner link
//!
//! Linking is always symmetric: both profiles point at each other, and the
//! writes that establish or dissolve a link run in one transaction so a
//! half-linked pair can never be observed.

use rusqlite::{params, OptionalExtension};

use super::{parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{InviteStatus, PartnerInvite};

/// Which direction of invites to list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InviteBox {
    /// Invites this user sent
    Sent,
    /// Pending invites addressed to this user's email
    Received,
}

fn row_to_invite(row: &rusqlite::Row<'_>) -> rusqlite::Result<PartnerInvite> {
    let status_str: String = row.get(3)?;
    let created_at_str: String = row.get(6)?;
    Ok(PartnerInvite {
        id: row.get(0)?,
        inviter_id: row.get(1)?,
        invitee_email: row.get(2)?,
        status: status_str.parse().unwrap_or(InviteStatus::Pending),
        inviter_email: row.get(4)?,
        inviter_name: row.get(5)?,
        created_at: parse_datetime(&created_at_str),
    })
}

impl Database {
    /// Create a partner invite from a user to an email address
    pub fn create_invite(&self, inviter_id: i64, invitee_email: &str) -> Result<PartnerInvite> {
        let inviter = self
            .get_profile(inviter_id)?
            .ok_or_else(|| Error::NotFound("Profile not found".into()))?;

        if inviter.partner_id.is_some() {
            return Err(Error::Conflict("You already have a partner".into()));
        }
        if inviter.email.eq_ignore_ascii_case(invitee_email) {
            return Err(Error::InvalidData("Cannot invite yourself".into()));
        }

        let conn = self.conn()?;

        let duplicate: Option<i64> = conn
            .query_row(
                "SELECT id FROM partner_invites
                 WHERE inviter_id = ? AND invitee_email = ? AND status = 'pending'",
                params![inviter_id, invitee_email],
                |row| row.get(0),
            )
            .optional()?;
        if duplicate.is_some() {
            return Err(Error::Conflict(
                "Invite already pending for this email".into(),
            ));
        }

        conn.execute(
            "INSERT INTO partner_invites (inviter_id, invitee_email) VALUES (?, ?)",
            params![inviter_id, invitee_email],
        )?;
        let id = conn.last_insert_rowid();

        drop(conn);
        self.get_invite(id)?
            .ok_or_else(|| Error::NotFound("Invite not found after creation".into()))
    }

    /// Get an invite by id, with inviter email/name expanded
    pub fn get_invite(&self, id: i64) -> Result<Option<PartnerInvite>> {
        let conn = self.conn()?;
        let invite = conn
            .query_row(
                "SELECT i.id, i.inviter_id, i.invitee_email, i.status,
                        p.email, p.name, i.created_at
                 FROM partner_invites i
                 JOIN profiles p ON i.inviter_id = p.id
                 WHERE i.id = ?",
                params![id],
                row_to_invite,
            )
            .optional()?;
        Ok(invite)
    }

    /// List a user's invites, newest first
    ///
    /// `Sent` returns everything the user sent regardless of status;
    /// `Received` returns only pending invites addressed to the user's email.
    pub fn list_invites(&self, user_id: i64, invite_box: InviteBox) -> Result<Vec<PartnerInvite>> {
        let conn = self.conn()?;

        let invites = match invite_box {
            InviteBox::Sent => {
                let mut stmt = conn.prepare(
                    "SELECT i.id, i.inviter_id, i.invitee_email, i.status,
                            p.email, p.name, i.created_at
                     FROM partner_invites i
                     JOIN profiles p ON i.inviter_id = p.id
                     WHERE i.inviter_id = ?
                     ORDER BY i.created_at DESC, i.id DESC",
                )?;
                let invites = stmt
                    .query_map(params![user_id], row_to_invite)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                invites
            }
            InviteBox::Received => {
                let mut stmt = conn.prepare(
                    "SELECT i.id, i.inviter_id, i.invitee_email, i.status,
                            p.email, p.name, i.created_at
                     FROM partner_invites i
                     JOIN profiles p ON i.inviter_id = p.id
                     WHERE i.invitee_email = (SELECT email FROM profiles WHERE id = ?)
                       AND i.status = 'pending'
                     ORDER BY i.created_at DESC, i.id DESC",
                )?;
                let invites = stmt
                    .query_map(params![user_id], row_to_invite)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                invites
            }
        };

        Ok(invites)
    }

    /// Accept a pending invite addressed to this user.
    ///
    /// Verifies the invite is pending and addressed to the accepting user's
    /// email, and that neither side is already linked. Both profile updates
    /// and the status change commit atomically.
    pub fn accept_invite(&self, user_id: i64, invite_id: i64) -> Result<()> {
        let user = self
            .get_profile(user_id)?
            .ok_or_else(|| Error::NotFound("Profile not found".into()))?;
        let invite = self
            .get_invite(invite_id)?
            .ok_or_else(|| Error::NotFound("Invite not found".into()))?;

        if !invite.invitee_email.eq_ignore_ascii_case(&user.email) {
            return Err(Error::Forbidden("This invite is not addressed to you".into()));
        }
        if invite.status != InviteStatus::Pending {
            return Err(Error::Conflict("Invite is no longer pending".into()));
        }
        if user.partner_id.is_some() {
            return Err(Error::Conflict("You already have a partner".into()));
        }
        let inviter = self
            .get_profile(invite.inviter_id)?
            .ok_or_else(|| Error::NotFound("Inviter profile not found".into()))?;
        if inviter.partner_id.is_some() {
            return Err(Error::Conflict("Inviter already has a partner".into()));
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "UPDATE profiles SET partner_id = ? WHERE id = ?",
            params![invite.inviter_id, user_id],
        )?;
        tx.execute(
            "UPDATE profiles SET partner_id = ? WHERE id = ?",
            params![user_id, invite.inviter_id],
        )?;
        tx.execute(
            "UPDATE partner_invites SET status = 'accepted' WHERE id = ?",
            params![invite_id],
        )?;
        tx.commit()?;

        Ok(())
    }

    /// Decline a pending invite addressed to this user
    pub fn decline_invite(&self, user_id: i64, invite_id: i64) -> Result<()> {
        let user = self
            .get_profile(user_id)?
            .ok_or_else(|| Error::NotFound("Profile not found".into()))?;
        let invite = self
            .get_invite(invite_id)?
            .ok_or_else(|| Error::NotFound("Invite not found".into()))?;

        if !invite.invitee_email.eq_ignore_ascii_case(&user.email) {
            return Err(Error::Forbidden("This invite is not addressed to you".into()));
        }
        if invite.status != InviteStatus::Pending {
            return Err(Error::Conflict("Invite is no longer pending".into()));
        }

        let conn = self.conn()?;
        conn.execute(
            "UPDATE partner_invites SET status = 'declined' WHERE id = ?",
            params![invite_id],
        )?;
        Ok(())
    }

    /// Dissolve a partner link from either side, clearing both profiles
    pub fn unlink_partners(&self, user_id: i64) -> Result<()> {
        let partner_id = self
            .partner_of(user_id)?
            .ok_or_else(|| Error::NotFound("No partner linked".into()))?;

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "UPDATE profiles SET partner_id = NULL WHERE id = ?",
            params![user_id],
        )?;
        tx.execute(
            "UPDATE profiles SET partner_id = NULL WHERE id = ?",
            params![partner_id],
        )?;
        tx.commit()?;

        Ok(())
    }
}
