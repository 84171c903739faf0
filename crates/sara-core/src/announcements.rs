//! Per-user announcements
//!
//! Announcements are staged into the batch of the operation that causes them
//! with [`announce`]; this module also serves the inbox.

use crate::auth::Principal;
use crate::context::Context;
use crate::error::SaraError;
use crate::paths;
use crate::repo;
use chrono::{DateTime, Utc};
use sara_domain::{Announcement, AnnouncementId, AnnouncementKind, UserId};
use sara_store::{Direction, Query, WriteBatch};
use serde_json::json;
use std::sync::Arc;

/// Stage an announcement for `user` in `batch`
///
/// # Errors
/// `Store` when the record cannot be encoded
pub fn announce(
    batch: &mut WriteBatch,
    user: &UserId,
    kind: AnnouncementKind,
    title: &str,
    body: String,
    related_id: Option<String>,
    now: DateTime<Utc>,
) -> Result<(), SaraError> {
    let announcement = Announcement::new(user.clone(), kind, title, body, related_id, now);
    batch.create(paths::announcement(announcement.id), &announcement)?;
    Ok(())
}

/// Inbox service
#[derive(Debug, Clone)]
pub struct AnnouncementService {
    ctx: Arc<Context>,
}

impl AnnouncementService {
    pub(crate) fn new(ctx: Arc<Context>) -> Self {
        Self { ctx }
    }

    /// Caller's announcements, newest first
    ///
    /// # Errors
    /// `Store` on read failure
    pub async fn list_for(&self, principal: &Principal, unread_only: bool) -> Result<Vec<Announcement>, SaraError> {
        let mut query = Query::collection(paths::ANNOUNCEMENTS)
            .where_eq("user_id", principal.uid.as_str())
            .order_by("created_at", Direction::Desc);
        if unread_only {
            query = query.where_eq("read", false);
        }
        let mut list: Vec<Announcement> = repo::find_values(self.ctx.store(), &query).await?;
        // ULIDs break ties between announcements created in the same instant
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(list)
    }

    /// Mark one announcement read
    ///
    /// # Errors
    /// `NotFound` when it does not exist or belongs to someone else
    pub async fn mark_read(&self, principal: &Principal, id: AnnouncementId) -> Result<Announcement, SaraError> {
        let path = paths::announcement(id);
        let current = repo::require::<Announcement>(self.ctx.store(), &path, "announcement").await?;
        if current.value.user_id != principal.uid {
            return Err(SaraError::not_found("announcement", id));
        }
        if current.value.read {
            return Ok(current.value);
        }
        let mut announcement = current.value;
        announcement.read = true;
        let mut batch = WriteBatch::new();
        batch.set_if(path, &announcement, current.revision)?;
        self.ctx.store.commit(batch).await?;
        Ok(announcement)
    }

    /// Mark every unread announcement read; returns how many changed
    ///
    /// # Errors
    /// `Store` on failure
    pub async fn mark_all_read(&self, principal: &Principal) -> Result<usize, SaraError> {
        let unread = self.list_for(principal, true).await?;
        if unread.is_empty() {
            return Ok(0);
        }
        let mut batch = WriteBatch::new();
        for a in &unread {
            batch.update(
                paths::announcement(a.id),
                json!({"read": true}),
                sara_store::Precondition::Exists,
            )?;
        }
        self.ctx.store.commit(batch).await?;
        Ok(unread.len())
    }
}
