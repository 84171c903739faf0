//! Rental contracts (`contracts` collection)
//!
//! A contract links one property, its landlord and a tenant. The tenant may
//! not have an account yet: in that case only `tenant_email` is known and an
//! invitation is outstanding until the tenant registers.

use crate::ids::{ContractId, InvitationId, ObservationId, PropertyId, UserId};
use crate::period::Period;
use crate::status::ContractStatus;
use crate::validation::{normalize_email, Clp, ValidationErrors};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Longest contract accepted, in days
pub const MAX_CONTRACT_DAYS: i64 = 366 * 10;

/// Rental contract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    /// Identifier
    pub id: ContractId,
    /// Rented property
    pub property_id: PropertyId,
    /// Property name (denormalized)
    pub property_name: String,
    /// Property address (denormalized)
    pub property_address: String,
    /// Landlord uid
    pub landlord_id: UserId,
    /// Landlord name (denormalized)
    pub landlord_name: String,
    /// Tenant uid once registered
    pub tenant_id: Option<UserId>,
    /// Tenant name once registered (denormalized)
    pub tenant_name: Option<String>,
    /// Tenant email, normalized
    pub tenant_email: String,
    /// Monthly rent
    pub rent: Clp,
    /// Guarantee deposit
    pub deposit: Clp,
    /// First day of the lease
    pub start_date: NaiveDate,
    /// Last day of the lease
    pub end_date: NaiveDate,
    /// Day of month rent is due (clamped to month length)
    pub payment_day: u8,
    /// Free-text clauses
    pub terms: String,
    /// Lifecycle status
    pub status: ContractStatus,
    /// Tenant observations and landlord answers
    #[serde(default)]
    pub observations: Vec<Observation>,
    /// Reason given when the tenant rejected
    pub rejection_reason: Option<String>,
    /// Signed document, if uploaded
    pub pdf_url: Option<String>,
    /// Outstanding invitation for an unregistered tenant
    pub invitation_id: Option<InvitationId>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last change
    pub updated_at: DateTime<Utc>,
    /// Approval time
    pub activated_at: Option<DateTime<Utc>>,
    /// Time it reached a terminal status
    pub closed_at: Option<DateTime<Utc>>,
}

impl Contract {
    /// Whether `uid` is the landlord or the tenant
    #[must_use]
    pub fn is_party(&self, uid: &UserId) -> bool {
        self.landlord_id == *uid || self.tenant_id.as_ref() == Some(uid)
    }

    /// Whether `uid` is the tenant
    #[must_use]
    pub fn is_tenant(&self, uid: &UserId) -> bool {
        self.tenant_id.as_ref() == Some(uid)
    }

    /// Rent due date within `period`
    #[must_use]
    pub fn due_date(&self, period: Period) -> NaiveDate {
        period.day_clamped(u32::from(self.payment_day))
    }

    /// Billing periods from the start month through the end month
    #[must_use]
    pub fn periods(&self) -> Vec<Period> {
        let last = Period::of(self.end_date);
        let mut current = Period::of(self.start_date);
        let mut out = Vec::new();
        while current <= last {
            out.push(current);
            current = current.next();
        }
        out
    }

    /// Whether `period` falls inside the lease
    #[must_use]
    pub fn covers(&self, period: Period) -> bool {
        period >= Period::of(self.start_date) && period <= Period::of(self.end_date)
    }

    /// Observation awaiting a landlord answer
    #[must_use]
    pub fn open_observation(&self) -> Option<&Observation> {
        self.observations.iter().find(|o| o.response.is_none())
    }

    /// Observation by id
    #[must_use]
    pub fn observation_mut(&mut self, id: ObservationId) -> Option<&mut Observation> {
        self.observations.iter_mut().find(|o| o.id == id)
    }
}

/// Contract creation form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewContract {
    /// Property to rent
    pub property_id: PropertyId,
    /// Tenant email (registered or not)
    pub tenant_email: String,
    /// Monthly rent
    pub rent: Clp,
    /// Guarantee deposit
    #[serde(default)]
    pub deposit: Clp,
    /// First day
    pub start_date: NaiveDate,
    /// Last day
    pub end_date: NaiveDate,
    /// Day of month rent is due
    pub payment_day: u8,
    /// Free-text clauses
    #[serde(default)]
    pub terms: String,
}

impl NewContract {
    /// Validate every field
    ///
    /// # Errors
    /// Every failing field
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.email("tenant_email", &self.tenant_email);
        errors.check(self.rent.is_positive(), "rent", "must be greater than zero");
        errors.check(self.deposit.amount() >= 0, "deposit", "cannot be negative");
        check_dates(&mut errors, self.start_date, self.end_date, self.payment_day);
        errors.text("terms", &self.terms, 0, 10_000);
        errors.into_result()
    }

    /// Normalized tenant email
    #[must_use]
    pub fn normalized_email(&self) -> String {
        normalize_email(&self.tenant_email)
    }
}

fn check_dates(errors: &mut ValidationErrors, start: NaiveDate, end: NaiveDate, payment_day: u8) {
    if end <= start {
        errors.push("end_date", "must be after start_date");
    } else if (end - start).num_days() > MAX_CONTRACT_DAYS {
        errors.push("end_date", "contract cannot exceed ten years");
    }
    errors.check(
        (1..=31).contains(&payment_day),
        "payment_day",
        "must be between 1 and 31",
    );
}

/// Tenant remark on a pending contract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Identifier within the thread
    pub id: ObservationId,
    /// Tenant uid
    pub author_id: UserId,
    /// Remark
    pub text: String,
    /// When it was raised
    pub created_at: DateTime<Utc>,
    /// Landlord answer, set once
    pub response: Option<ObservationResponse>,
}

/// Landlord answer to an observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationResponse {
    /// Landlord uid
    pub author_id: UserId,
    /// Answer
    pub text: String,
    /// When it was given
    pub created_at: DateTime<Utc>,
    /// Terms changed together with the answer
    pub amendment: Option<ContractAmendment>,
}

/// Terms a landlord may change while answering an observation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContractAmendment {
    /// New rent
    pub rent: Option<Clp>,
    /// New start date
    pub start_date: Option<NaiveDate>,
    /// New end date
    pub end_date: Option<NaiveDate>,
    /// New payment day
    pub payment_day: Option<u8>,
}

impl ContractAmendment {
    /// Whether nothing changes
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rent.is_none()
            && self.start_date.is_none()
            && self.end_date.is_none()
            && self.payment_day.is_none()
    }

    /// Apply onto `contract` after validating the combined terms
    ///
    /// # Errors
    /// Every failing field of the amended terms
    pub fn apply(&self, contract: &mut Contract) -> Result<(), ValidationErrors> {
        let rent = self.rent.unwrap_or(contract.rent);
        let start = self.start_date.unwrap_or(contract.start_date);
        let end = self.end_date.unwrap_or(contract.end_date);
        let day = self.payment_day.unwrap_or(contract.payment_day);
        let mut errors = ValidationErrors::new();
        errors.check(rent.is_positive(), "rent", "must be greater than zero");
        check_dates(&mut errors, start, end, day);
        errors.into_result()?;
        contract.rent = rent;
        contract.start_date = start;
        contract.end_date = end;
        contract.payment_day = day;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn form() -> NewContract {
        NewContract {
            property_id: PropertyId::new(),
            tenant_email: "Tomas@Correo.cl ".into(),
            rent: Clp(400_000),
            deposit: Clp(400_000),
            start_date: date(2024, 1, 15),
            end_date: date(2024, 12, 31),
            payment_day: 5,
            terms: String::new(),
        }
    }

    fn contract() -> Contract {
        let f = form();
        Contract {
            id: ContractId::new(),
            property_id: f.property_id,
            property_name: "Casa".into(),
            property_address: "Calle 1".into(),
            landlord_id: UserId::from("landlord"),
            landlord_name: "Olga".into(),
            tenant_id: Some(UserId::from("tenant")),
            tenant_name: Some("Tomás".into()),
            tenant_email: f.normalized_email(),
            rent: f.rent,
            deposit: f.deposit,
            start_date: f.start_date,
            end_date: f.end_date,
            payment_day: 31,
            terms: String::new(),
            status: ContractStatus::Activo,
            observations: Vec::new(),
            rejection_reason: None,
            pdf_url: None,
            invitation_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            activated_at: None,
            closed_at: None,
        }
    }

    #[test]
    fn valid_form() {
        assert!(form().validate().is_ok());
        assert_eq!(form().normalized_email(), "tomas@correo.cl");
    }

    #[test]
    fn end_before_start_rejected() {
        let mut f = form();
        f.end_date = date(2023, 12, 31);
        assert!(f.validate().unwrap_err().has("end_date"));
    }

    #[test]
    fn payment_day_bounds() {
        let mut f = form();
        f.payment_day = 0;
        assert!(f.validate().unwrap_err().has("payment_day"));
        f.payment_day = 32;
        assert!(f.validate().unwrap_err().has("payment_day"));
    }

    #[test]
    fn periods_cover_start_through_end() {
        let c = contract();
        let periods = c.periods();
        assert_eq!(periods.len(), 12);
        assert_eq!(periods[0].to_string(), "2024-01");
        assert_eq!(periods[11].to_string(), "2024-12");
    }

    #[test]
    fn due_date_clamped() {
        let c = contract();
        assert_eq!(c.due_date("2024-02".parse().unwrap()), date(2024, 2, 29));
        assert_eq!(c.due_date("2024-04".parse().unwrap()), date(2024, 4, 30));
    }

    #[test]
    fn parties() {
        let c = contract();
        assert!(c.is_party(&UserId::from("landlord")));
        assert!(c.is_tenant(&UserId::from("tenant")));
        assert!(!c.is_party(&UserId::from("stranger")));
    }

    #[test]
    fn amendment_validates_combined_terms() {
        let mut c = contract();
        let bad = ContractAmendment {
            end_date: Some(date(2023, 1, 1)),
            ..ContractAmendment::default()
        };
        assert!(bad.apply(&mut c).is_err());
        assert_eq!(c.end_date, date(2024, 12, 31));

        let good = ContractAmendment {
            rent: Some(Clp(380_000)),
            ..ContractAmendment::default()
        };
        good.apply(&mut c).unwrap();
        assert_eq!(c.rent, Clp(380_000));
    }
}
