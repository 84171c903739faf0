//! Transactional email for S.A.R.A.
//!
//! [`Mailer`] is the delivery seam. [`HttpMailer`] posts to a JSON email API
//! with a bearer key; [`RecordingMailer`] keeps messages in memory for tests
//! and for running without a provider. [`templates`] renders the Spanish
//! messages the application sends.

pub mod error;
pub mod mailer;
pub mod message;
pub mod templates;

pub use error::MailError;
#[cfg(any(test, feature = "mock"))]
pub use mailer::MockMailer;
pub use mailer::{HttpMailer, MailConfig, Mailer, RecordingMailer};
pub use message::{plausible_address, MessageId, OutgoingEmail};
pub use templates::InvitationDetails;
