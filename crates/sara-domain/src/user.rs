//! User profiles (`users` collection)

use crate::ids::UserId;
use crate::rut::Rut;
use crate::status::Role;
use crate::validation::{is_valid_phone, ValidationErrors};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Minimum password length accepted at registration
pub const MIN_PASSWORD_LEN: usize = 8;

/// Profile document, keyed by the identity uid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Identity uid
    pub id: UserId,
    /// Normalized email
    pub email: String,
    /// Display name
    pub name: String,
    /// National id, when provided
    pub rut: Option<Rut>,
    /// Contact phone
    pub phone: Option<String>,
    /// Application role
    pub role: Role,
    /// Registration time
    pub created_at: DateTime<Utc>,
}

/// Self-registration form
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAccount {
    /// Login email
    pub email: String,
    /// Plain password (never stored)
    pub password: String,
    /// Display name
    pub name: String,
    /// RUT as typed
    #[serde(default)]
    pub rut: Option<String>,
    /// Phone as typed
    #[serde(default)]
    pub phone: Option<String>,
    /// Requested role
    pub role: Role,
}

impl NewAccount {
    /// Validate the form and return the parsed RUT
    ///
    /// # Errors
    /// Every failing field
    pub fn validate(&self) -> Result<Option<Rut>, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.email("email", &self.email);
        errors.check(
            self.password.chars().count() >= MIN_PASSWORD_LEN,
            "password",
            "must have at least 8 characters",
        );
        errors.text("name", &self.name, 2, 120);
        errors.check(
            self.role != Role::Admin,
            "role",
            "admin accounts cannot be self-registered",
        );
        let rut = match self.rut.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
            Some(raw) => match Rut::parse(raw) {
                Ok(rut) => Some(rut),
                Err(e) => {
                    errors.push("rut", e.to_string());
                    None
                }
            },
            None => None,
        };
        if let Some(phone) = self.phone.as_deref().filter(|p| !p.trim().is_empty()) {
            errors.check(is_valid_phone(phone), "phone", "is not a valid phone number");
        }
        errors.into_result().map(|()| rut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> NewAccount {
        NewAccount {
            email: "ana@correo.cl".into(),
            password: "secreto123".into(),
            name: "Ana Pérez".into(),
            rut: Some("12.345.678-5".into()),
            phone: Some("+56 9 1234 5678".into()),
            role: Role::Inquilino,
        }
    }

    #[test]
    fn valid_form_yields_rut() {
        let rut = form().validate().unwrap();
        assert_eq!(rut.unwrap().body(), 12_345_678);
    }

    #[test]
    fn admin_cannot_self_register() {
        let mut f = form();
        f.role = Role::Admin;
        assert!(f.validate().unwrap_err().has("role"));
    }

    #[test]
    fn reports_all_bad_fields() {
        let f = NewAccount {
            email: "bad".into(),
            password: "short".into(),
            name: String::new(),
            rut: Some("12.345.678-0".into()),
            phone: Some("abc".into()),
            role: Role::Arrendador,
        };
        let errors = f.validate().unwrap_err();
        for field in ["email", "password", "name", "rut", "phone"] {
            assert!(errors.has(field), "missing {field}");
        }
    }
}
