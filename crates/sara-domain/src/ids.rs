//! Document identifiers
//!
//! Every record owned by SARA is keyed by a ULID so identifiers sort by
//! creation time. User ids are opaque strings issued by the identity
//! provider.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

macro_rules! ulid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Ulid);

        impl $name {
            /// Generate a fresh identifier
            #[inline]
            #[must_use]
            pub fn new() -> Self {
                Self(Ulid::new())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ulid::DecodeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ulid::from_string(s.trim()).map(Self)
            }
        }
    };
}

ulid_id!(
    /// Property identifier (`propiedades` collection)
    PropertyId
);
ulid_id!(
    /// Contract identifier (`contracts` collection)
    ContractId
);
ulid_id!(
    /// Payment identifier (per-contract `payments` subcollection)
    PaymentId
);
ulid_id!(
    /// Incident identifier
    IncidentId
);
ulid_id!(
    /// Evaluation identifier
    EvaluationId
);
ulid_id!(
    /// Announcement identifier
    AnnouncementId
);
ulid_id!(
    /// Invitation identifier
    InvitationId
);
ulid_id!(
    /// Uploaded file identifier (`userFiles` collection)
    FileId
);
ulid_id!(
    /// Observation identifier inside a contract thread
    ObservationId
);
ulid_id!(
    /// Response identifier inside an incident thread
    ResponseId
);

/// User identifier issued by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    /// Wrap a raw uid
    #[inline]
    #[must_use]
    pub fn new(uid: impl Into<String>) -> Self {
        Self(uid.into())
    }

    /// Borrow as str
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}
