//! Tenant evaluations (`evaluations` collection)

use crate::ids::{ContractId, EvaluationId, UserId};
use crate::status::EvaluationStatus;
use crate::validation::ValidationErrors;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lowest score
pub const MIN_SCORE: u8 = 1;
/// Highest score
pub const MAX_SCORE: u8 = 5;

/// Per-criterion scores, each 1 to 5
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationScores {
    /// Rent paid on time
    pub payment_punctuality: u8,
    /// Care of the property
    pub property_care: u8,
    /// Responsiveness
    pub communication: u8,
    /// Respect of contract and building rules
    pub rule_compliance: u8,
}

impl EvaluationScores {
    /// Criterion names paired with their scores
    #[must_use]
    pub fn criteria(&self) -> [(&'static str, u8); 4] {
        [
            ("payment_punctuality", self.payment_punctuality),
            ("property_care", self.property_care),
            ("communication", self.communication),
            ("rule_compliance", self.rule_compliance),
        ]
    }

    /// Check every score is in range
    ///
    /// # Errors
    /// Each out-of-range criterion
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        for (name, score) in self.criteria() {
            errors.check(
                (MIN_SCORE..=MAX_SCORE).contains(&score),
                name,
                "must be between 1 and 5",
            );
        }
        errors.into_result()
    }

    /// Mean of the four criteria
    #[must_use]
    pub fn average(&self) -> f64 {
        let total: u32 = self.criteria().iter().map(|(_, s)| u32::from(*s)).sum();
        f64::from(total) / 4.0
    }
}

/// Landlord rating of a tenant for one contract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Identifier
    pub id: EvaluationId,
    /// Contract evaluated
    pub contract_id: ContractId,
    /// Property name (denormalized)
    pub property_name: String,
    /// Evaluating landlord
    pub landlord_id: UserId,
    /// Landlord name (denormalized)
    pub landlord_name: String,
    /// Evaluated tenant
    pub tenant_id: UserId,
    /// Status
    pub status: EvaluationStatus,
    /// Scores once completed
    pub scores: Option<EvaluationScores>,
    /// Landlord comment
    pub comment: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Completion time
    pub completed_at: Option<DateTime<Utc>>,
}

/// Evaluation submission form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSubmission {
    /// Scores
    pub scores: EvaluationScores,
    /// Optional comment
    #[serde(default)]
    pub comment: Option<String>,
}

impl EvaluationSubmission {
    /// Validate scores and comment
    ///
    /// # Errors
    /// Every failing field
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = match self.scores.validate() {
            Ok(()) => ValidationErrors::new(),
            Err(errors) => errors,
        };
        if let Some(comment) = &self.comment {
            errors.text("comment", comment, 0, 2000);
        }
        errors.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_of_criteria() {
        let s = EvaluationScores {
            payment_punctuality: 5,
            property_care: 4,
            communication: 4,
            rule_compliance: 3,
        };
        assert!((s.average() - 4.0).abs() < f64::EPSILON);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn out_of_range_scores() {
        let s = EvaluationScores {
            payment_punctuality: 0,
            property_care: 6,
            communication: 3,
            rule_compliance: 3,
        };
        let errors = s.validate().unwrap_err();
        assert!(errors.has("payment_punctuality"));
        assert!(errors.has("property_care"));
        assert_eq!(errors.errors().len(), 2);
    }
}
