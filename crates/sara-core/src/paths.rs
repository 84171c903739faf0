//! Collection names and document paths

use sara_domain::{
    AnnouncementId, ContractId, EvaluationId, FileId, IncidentId, InvitationId, PaymentId,
    PropertyId, UserId,
};
use sara_store::{DocPath, StoreError};

/// User profiles
pub const USERS: &str = "users";
/// Properties
pub const PROPERTIES: &str = "propiedades";
/// Contracts
pub const CONTRACTS: &str = "contracts";
/// Payment subcollection below each contract
pub const PAYMENTS: &str = "payments";
/// Incidents
pub const INCIDENTS: &str = "incidents";
/// Evaluations
pub const EVALUATIONS: &str = "evaluations";
/// Announcements
pub const ANNOUNCEMENTS: &str = "announcements";
/// Invitations
pub const INVITATIONS: &str = "invitations";
/// User files
pub const USER_FILES: &str = "userFiles";
/// Local identity credentials
pub const CREDENTIALS: &str = "credentials";
/// Email to uid index for local identities
pub const CREDENTIAL_EMAILS: &str = "credentialEmails";

/// Profile document
///
/// # Errors
/// `InvalidPath` for ids that are not a single path segment
pub fn user(id: &UserId) -> Result<DocPath, StoreError> {
    DocPath::new(USERS, id.as_str())
}

/// Property document
pub fn property(id: PropertyId) -> DocPath {
    known(PROPERTIES, id)
}

/// Contract document
pub fn contract(id: ContractId) -> DocPath {
    known(CONTRACTS, id)
}

/// Payment subcollection of a contract
pub fn payments(contract_id: ContractId) -> String {
    contract(contract_id).subcollection(PAYMENTS)
}

/// Payment document
pub fn payment(contract_id: ContractId, id: PaymentId) -> DocPath {
    known(&payments(contract_id), id)
}

/// Incident document
pub fn incident(id: IncidentId) -> DocPath {
    known(INCIDENTS, id)
}

/// Evaluation document
pub fn evaluation(id: EvaluationId) -> DocPath {
    known(EVALUATIONS, id)
}

/// Announcement document
pub fn announcement(id: AnnouncementId) -> DocPath {
    known(ANNOUNCEMENTS, id)
}

/// Invitation document
pub fn invitation(id: InvitationId) -> DocPath {
    known(INVITATIONS, id)
}

/// User file document
pub fn user_file(id: FileId) -> DocPath {
    known(USER_FILES, id)
}

/// Path for a ULID-keyed record; ULIDs are always a valid segment
fn known(collection: &str, id: impl std::fmt::Display) -> DocPath {
    match DocPath::new(collection, id.to_string()) {
        Ok(path) => path,
        Err(_) => unreachable!("ULID ids are single path segments"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_paths_nest_under_contract() {
        let c = ContractId::new();
        let p = PaymentId::new();
        let path = payment(c, p);
        assert_eq!(path.collection(), format!("contracts/{c}/payments"));
        assert_eq!(path.id(), p.to_string());
    }

    #[test]
    fn user_ids_checked() {
        assert!(user(&UserId::new("abc")).is_ok());
        assert!(user(&UserId::new("..")).is_err());
    }
}
