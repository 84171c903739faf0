//! Incidents (`incidents` collection)

use crate::ids::{ContractId, IncidentId, PropertyId, ResponseId, UserId};
use crate::status::{IncidentPriority, IncidentStatus};
use crate::validation::ValidationErrors;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Issue reported by a tenant on a rented property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    /// Identifier
    pub id: IncidentId,
    /// Contract the issue belongs to
    pub contract_id: ContractId,
    /// Property (denormalized)
    pub property_id: PropertyId,
    /// Property name (denormalized)
    pub property_name: String,
    /// Reporting tenant
    pub tenant_id: UserId,
    /// Responsible landlord
    pub landlord_id: UserId,
    /// Short summary
    pub title: String,
    /// Details
    pub description: String,
    /// Urgency
    pub priority: IncidentPriority,
    /// Handling status
    pub status: IncidentStatus,
    /// Uploaded photos or documents
    #[serde(default)]
    pub attachments: Vec<String>,
    /// Landlord answers
    #[serde(default)]
    pub responses: Vec<IncidentResponse>,
    /// Report time
    pub created_at: DateTime<Utc>,
    /// Last change
    pub updated_at: DateTime<Utc>,
    /// Resolution time
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Landlord answer in an incident thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentResponse {
    /// Identifier within the thread
    pub id: ResponseId,
    /// Author uid
    pub author_id: UserId,
    /// Answer
    pub text: String,
    /// Status set together with this answer
    pub status_change: Option<IncidentStatus>,
    /// Answer time
    pub created_at: DateTime<Utc>,
}

/// Incident report form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewIncident {
    /// Contract concerned
    pub contract_id: ContractId,
    /// Short summary
    pub title: String,
    /// Details
    pub description: String,
    /// Urgency
    pub priority: IncidentPriority,
}

impl NewIncident {
    /// Validate every field
    ///
    /// # Errors
    /// Every failing field
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.text("title", &self.title, 3, 120);
        errors.text("description", &self.description, 10, 4000);
        errors.into_result()
    }
}
