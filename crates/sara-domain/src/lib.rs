//! SARA domain model
//!
//! Records persisted by the rental-management backend, the closed status
//! enumerations they carry, the transition tables that govern those
//! statuses, and the validation rules for every submission form.
//!
//! # Example
//!
//! ```rust
//! use sara_domain::{ContractStatus, Rut};
//! use sara_domain::state_machine::validate_contract_transition;
//!
//! let status: ContractStatus = "activo".parse().unwrap();
//! assert_eq!(status, ContractStatus::Activo);
//! assert!(validate_contract_transition(ContractStatus::Pendiente, status).is_ok());
//! assert_eq!(Rut::parse("123456785").unwrap().to_string(), "12.345.678-5");
//! ```

#![warn(unreachable_pub)]

pub mod contract;
pub mod evaluation;
pub mod ids;
pub mod incident;
pub mod notice;
pub mod payment;
pub mod period;
pub mod property;
pub mod rut;
pub mod state_machine;
pub mod status;
pub mod text;
pub mod user;
pub mod validation;

pub use contract::{Contract, ContractAmendment, NewContract, Observation, ObservationResponse};
pub use evaluation::{Evaluation, EvaluationScores, EvaluationSubmission};
pub use ids::{
    AnnouncementId, ContractId, EvaluationId, FileId, IncidentId, InvitationId, ObservationId,
    PaymentId, PropertyId, ResponseId, UserId,
};
pub use incident::{Incident, IncidentResponse, NewIncident};
pub use notice::{Announcement, AnnouncementKind, Invitation, UserFile};
pub use payment::{NewPayment, Payment};
pub use period::{Period, PeriodError};
pub use property::{NewProperty, Property, PropertyUpdate};
pub use rut::{Rut, RutError};
pub use state_machine::TransitionError;
pub use status::{
    ContractStatus, EvaluationStatus, IncidentPriority, IncidentStatus, InvitationStatus,
    PaymentMethod, PaymentStatus, PropertyKind, PropertyStatus, Role, UnknownVariant,
};
pub use user::{NewAccount, UserProfile};
pub use validation::{Clp, FieldError, ValidationErrors};
