//! Properties (`propiedades` collection)

use crate::ids::{ContractId, PropertyId, UserId};
use crate::status::{PropertyKind, PropertyStatus};
use crate::text::squash_whitespace;
use crate::validation::{Clp, ValidationErrors};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Upper bound for bedroom and bathroom counts
pub const MAX_ROOMS: u8 = 50;

/// A rentable property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    /// Identifier
    pub id: PropertyId,
    /// Landlord uid
    pub owner_id: UserId,
    /// Landlord display name (denormalized)
    pub owner_name: String,
    /// Listing name
    pub name: String,
    /// Street address
    pub address: String,
    /// Comuna
    pub commune: String,
    /// Region
    pub region: String,
    /// Kind of property
    pub kind: PropertyKind,
    /// Bedrooms
    pub bedrooms: u8,
    /// Bathrooms
    pub bathrooms: u8,
    /// Built area in square meters
    pub area_m2: u32,
    /// Monthly asking rent
    pub rent: Clp,
    /// Free text
    pub description: String,
    /// Availability
    pub status: PropertyStatus,
    /// Contract currently binding the property
    pub current_contract_id: Option<ContractId>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last change
    pub updated_at: DateTime<Utc>,
}

/// Property creation form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProperty {
    /// Listing name
    pub name: String,
    /// Street address
    pub address: String,
    /// Comuna
    pub commune: String,
    /// Region
    pub region: String,
    /// Kind of property
    pub kind: PropertyKind,
    /// Bedrooms
    #[serde(default)]
    pub bedrooms: u8,
    /// Bathrooms
    #[serde(default)]
    pub bathrooms: u8,
    /// Built area in square meters
    #[serde(default)]
    pub area_m2: u32,
    /// Monthly asking rent
    pub rent: Clp,
    /// Free text
    #[serde(default)]
    pub description: String,
}

impl NewProperty {
    /// Validate every field
    ///
    /// # Errors
    /// Every failing field
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.text("name", &self.name, 3, 120);
        errors.text("address", &self.address, 5, 200);
        errors.text("commune", &self.commune, 2, 80);
        errors.text("region", &self.region, 2, 80);
        errors.check(self.bedrooms <= MAX_ROOMS, "bedrooms", "is out of range");
        errors.check(self.bathrooms <= MAX_ROOMS, "bathrooms", "is out of range");
        errors.check(self.area_m2 <= 1_000_000, "area_m2", "is out of range");
        errors.check(self.rent.is_positive(), "rent", "must be greater than zero");
        errors.text("description", &self.description, 0, 2000);
        errors.into_result()
    }

    /// Materialize a property owned by `owner`
    #[must_use]
    pub fn into_property(self, owner_id: UserId, owner_name: String, now: DateTime<Utc>) -> Property {
        Property {
            id: PropertyId::new(),
            owner_id,
            owner_name,
            name: squash_whitespace(&self.name),
            address: squash_whitespace(&self.address),
            commune: squash_whitespace(&self.commune),
            region: squash_whitespace(&self.region),
            kind: self.kind,
            bedrooms: self.bedrooms,
            bathrooms: self.bathrooms,
            area_m2: self.area_m2,
            rent: self.rent,
            description: self.description.trim().to_string(),
            status: PropertyStatus::Disponible,
            current_contract_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial property edit; absent fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyUpdate {
    /// Listing name
    pub name: Option<String>,
    /// Street address
    pub address: Option<String>,
    /// Comuna
    pub commune: Option<String>,
    /// Region
    pub region: Option<String>,
    /// Kind
    pub kind: Option<PropertyKind>,
    /// Bedrooms
    pub bedrooms: Option<u8>,
    /// Bathrooms
    pub bathrooms: Option<u8>,
    /// Area
    pub area_m2: Option<u32>,
    /// Rent
    pub rent: Option<Clp>,
    /// Description
    pub description: Option<String>,
}

impl PropertyUpdate {
    /// Apply onto `property` and validate the result
    ///
    /// # Errors
    /// Every failing field of the edited property
    pub fn apply(self, property: &mut Property, now: DateTime<Utc>) -> Result<(), ValidationErrors> {
        let draft = NewProperty {
            name: self.name.unwrap_or_else(|| property.name.clone()),
            address: self.address.unwrap_or_else(|| property.address.clone()),
            commune: self.commune.unwrap_or_else(|| property.commune.clone()),
            region: self.region.unwrap_or_else(|| property.region.clone()),
            kind: self.kind.unwrap_or(property.kind),
            bedrooms: self.bedrooms.unwrap_or(property.bedrooms),
            bathrooms: self.bathrooms.unwrap_or(property.bathrooms),
            area_m2: self.area_m2.unwrap_or(property.area_m2),
            rent: self.rent.unwrap_or(property.rent),
            description: self.description.unwrap_or_else(|| property.description.clone()),
        };
        draft.validate()?;
        property.name = squash_whitespace(&draft.name);
        property.address = squash_whitespace(&draft.address);
        property.commune = squash_whitespace(&draft.commune);
        property.region = squash_whitespace(&draft.region);
        property.kind = draft.kind;
        property.bedrooms = draft.bedrooms;
        property.bathrooms = draft.bathrooms;
        property.area_m2 = draft.area_m2;
        property.rent = draft.rent;
        property.description = draft.description.trim().to_string();
        property.updated_at = now;
        Ok(())
    }
}
