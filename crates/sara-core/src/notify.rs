//! Outgoing email built from templates
//!
//! Mail goes out after the triggering batch commits. A failed delivery is
//! logged and reported to the caller as [`Delivery::Failed`]; it never undoes
//! committed writes.

use crate::context::Context;
use crate::error::SaraError;
use sara_domain::Invitation;
use sara_mail::templates::{self, InvitationDetails};
use sara_mail::{MailError, MessageId, OutgoingEmail};
use serde::Serialize;
use std::sync::Arc;

/// Outcome of a post-commit email
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Delivery {
    /// Nothing to send
    Skipped,
    /// Accepted by the provider
    Sent {
        /// Provider id
        message_id: String,
    },
    /// Delivery failed after the records were saved
    Failed {
        /// Failure description
        error: String,
        /// Whether resending later may work
        retryable: bool,
    },
}

impl Delivery {
    /// Whether the message went out
    #[must_use]
    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent { .. })
    }
}

/// Sends the application's transactional emails
#[derive(Debug, Clone)]
pub struct Notifier {
    ctx: Arc<Context>,
}

impl Notifier {
    pub(crate) fn new(ctx: Arc<Context>) -> Self {
        Self { ctx }
    }

    /// Send and report instead of failing
    pub async fn deliver(&self, email: OutgoingEmail) -> Delivery {
        let subject = email.subject.clone();
        match self.ctx.mailer.send(email).await {
            Ok(id) => Delivery::Sent {
                message_id: id.to_string(),
            },
            Err(e) => {
                tracing::error!(error = %e, subject = %subject, "Mail delivery failed after commit");
                Delivery::Failed {
                    retryable: e.is_retryable(),
                    error: e.to_string(),
                }
            }
        }
    }

    fn invitation_email(&self, invitation: &Invitation, reminder: bool) -> OutgoingEmail {
        let link = self
            .ctx
            .config
            .app
            .link(&format!("registro?invitacion={}", invitation.id));
        let expires_on = invitation.expires_at.format("%d-%m-%Y").to_string();
        let details = InvitationDetails {
            landlord_name: &invitation.landlord_name,
            property_name: &invitation.property_name,
            link: &link,
            expires_on: &expires_on,
        };
        if reminder {
            templates::invitation_reminder(&invitation.email, details, invitation.resent_count)
        } else {
            templates::contract_invitation(&invitation.email, details)
        }
    }

    /// First invitation email
    pub async fn invitation(&self, invitation: &Invitation) -> Delivery {
        self.deliver(self.invitation_email(invitation, false)).await
    }

    /// Reminder for a resent invitation
    pub async fn invitation_reminder(&self, invitation: &Invitation) -> Delivery {
        self.deliver(self.invitation_email(invitation, true)).await
    }

    /// Password reset email
    ///
    /// # Errors
    /// `Mail` when the provider fails
    pub async fn password_reset(
        &self,
        to: &str,
        name: Option<&str>,
        link: &str,
    ) -> Result<MessageId, SaraError> {
        let email = templates::password_reset(to, name, link, self.ctx.config.auth.reset_code_ttl_minutes);
        Ok(self.ctx.mailer.send(email).await?)
    }

    /// Delivery check message
    ///
    /// # Errors
    /// `Mail` when the provider fails, including invalid recipients
    pub async fn test_message(&self, to: &str) -> Result<MessageId, SaraError> {
        let sent_at = self.ctx.now().format("%Y-%m-%d %H:%M:%S UTC").to_string();
        let email = templates::test_message(to, &sent_at);
        let id = self.ctx.mailer.send(email).await.map_err(|e| match e {
            MailError::InvalidAddress(addr) => SaraError::Validation(
                sara_domain::ValidationErrors::single("to", format!("{addr:?} is not an email address")),
            ),
            other => SaraError::Mail(other),
        })?;
        tracing::info!(message_id = %id, "Test email sent");
        Ok(id)
    }
}
