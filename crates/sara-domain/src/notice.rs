//! Announcements, invitations and uploaded-file metadata

use crate::ids::{AnnouncementId, ContractId, FileId, InvitationId, UserId};
use crate::status::InvitationStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What an announcement is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnouncementKind {
    /// Contract lifecycle
    Contract,
    /// Payment review
    Payment,
    /// Incident thread
    Incident,
    /// Evaluation
    Evaluation,
    /// Anything else
    General,
}

/// Per-user notification written as a side effect of other operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Announcement {
    /// Identifier
    pub id: AnnouncementId,
    /// Recipient
    pub user_id: UserId,
    /// Topic
    pub kind: AnnouncementKind,
    /// Headline
    pub title: String,
    /// Body
    pub body: String,
    /// Id of the related record
    pub related_id: Option<String>,
    /// Read flag
    pub read: bool,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl Announcement {
    /// Unread announcement for `user_id`
    #[must_use]
    pub fn new(
        user_id: UserId,
        kind: AnnouncementKind,
        title: impl Into<String>,
        body: impl Into<String>,
        related_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AnnouncementId::new(),
            user_id,
            kind,
            title: title.into(),
            body: body.into(),
            related_id,
            read: false,
            created_at: now,
        }
    }
}

/// Invitation for a tenant email without an account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invitation {
    /// Identifier
    pub id: InvitationId,
    /// Contract waiting for the tenant
    pub contract_id: ContractId,
    /// Invited email, normalized
    pub email: String,
    /// Inviting landlord
    pub landlord_id: UserId,
    /// Landlord name (denormalized)
    pub landlord_name: String,
    /// Property name (denormalized)
    pub property_name: String,
    /// Status
    pub status: InvitationStatus,
    /// How many times the email was re-sent
    pub resent_count: u32,
    /// Last send time
    pub sent_at: DateTime<Utc>,
    /// Expiry
    pub expires_at: DateTime<Utc>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl Invitation {
    /// Whether it is past expiry and not yet accepted
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == InvitationStatus::Expirada
            || (self.status == InvitationStatus::Enviada && now > self.expires_at)
    }
}

/// Metadata of an uploaded blob (`userFiles` collection)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserFile {
    /// Identifier
    pub id: FileId,
    /// Uploader
    pub owner_id: UserId,
    /// Original file name
    pub name: String,
    /// MIME type
    pub content_type: String,
    /// Size in bytes
    pub size: u64,
    /// Blob key
    pub key: String,
    /// Public URL
    pub url: String,
    /// Upload time
    pub uploaded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn invitation_expiry() {
        let now = Utc::now();
        let mut inv = Invitation {
            id: InvitationId::new(),
            contract_id: ContractId::new(),
            email: "t@correo.cl".into(),
            landlord_id: UserId::from("l"),
            landlord_name: "Olga".into(),
            property_name: "Casa".into(),
            status: InvitationStatus::Enviada,
            resent_count: 0,
            sent_at: now,
            expires_at: now + Duration::days(7),
            created_at: now,
        };
        assert!(!inv.is_expired(now));
        assert!(inv.is_expired(now + Duration::days(8)));
        inv.status = InvitationStatus::Aceptada;
        assert!(!inv.is_expired(now + Duration::days(8)));
    }
}
