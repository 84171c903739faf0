//! Property management

use crate::auth::Principal;
use crate::context::Context;
use crate::error::SaraError;
use crate::paths;
use crate::repo;
use sara_domain::{
    Contract, ContractStatus, NewProperty, Property, PropertyId, PropertyStatus, PropertyUpdate,
    Role, UserId,
};
use sara_store::{Precondition, Query, Versioned, WriteBatch};
use std::sync::Arc;

/// Contract statuses that tie up a property
pub(crate) const OPEN_CONTRACT: [ContractStatus; 2] = [ContractStatus::Activo, ContractStatus::Pendiente];

/// Property service
#[derive(Debug, Clone)]
pub struct PropertyService {
    ctx: Arc<Context>,
}

impl PropertyService {
    pub(crate) fn new(ctx: Arc<Context>) -> Self {
        Self { ctx }
    }

    /// Create a property owned by the caller
    ///
    /// # Errors
    /// `Forbidden` for tenants, `Validation` for bad input
    pub async fn create(&self, principal: &Principal, new: NewProperty) -> Result<Property, SaraError> {
        principal.require(&[Role::Arrendador], "create properties")?;
        new.validate()?;
        let owner = self.ctx.require_profile(&principal.uid).await?;
        let property = new.into_property(principal.uid.clone(), owner.name, self.ctx.now());
        let mut batch = WriteBatch::new();
        batch.create(paths::property(property.id), &property)?;
        self.ctx.store.commit(batch).await?;
        tracing::info!(property_id = %property.id, owner = %principal.uid, "Property created");
        Ok(property)
    }

    /// Read one property
    ///
    /// Visible to its owner, admins, and parties of a contract on it.
    ///
    /// # Errors
    /// `NotFound` when missing or not visible
    pub async fn get(&self, principal: &Principal, id: PropertyId) -> Result<Property, SaraError> {
        let property = self.load(id).await?.value;
        if principal.is_self_or_admin(&property.owner_id) {
            return Ok(property);
        }
        let query = Query::collection(paths::CONTRACTS)
            .where_eq("property_id", id.to_string())
            .where_eq("tenant_id", principal.uid.as_str());
        if self.ctx.store.query(&query).await?.is_empty() {
            return Err(SaraError::not_found("property", id));
        }
        Ok(property)
    }

    /// Properties of `owner`, by name
    ///
    /// # Errors
    /// `Forbidden` unless the caller is the owner or an admin
    pub async fn list_for_owner(&self, principal: &Principal, owner: &UserId) -> Result<Vec<Property>, SaraError> {
        if !principal.is_self_or_admin(owner) {
            return Err(SaraError::Forbidden("cannot list another owner's properties".into()));
        }
        let query = Query::collection(paths::PROPERTIES).where_eq("owner_id", owner.as_str());
        let mut list: Vec<Property> = repo::find_values(self.ctx.store(), &query).await?;
        list.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        Ok(list)
    }

    /// Edit listing fields
    ///
    /// Name and address changes are copied into open contracts of the
    /// property in the same batch.
    ///
    /// # Errors
    /// `Forbidden` for non-owners, `Validation` for bad values
    pub async fn update(&self, principal: &Principal, id: PropertyId, update: PropertyUpdate) -> Result<Property, SaraError> {
        let current = self.owned(principal, id).await?;
        let mut property = current.value;
        update.apply(&mut property, self.ctx.now())?;

        let mut batch = WriteBatch::new();
        batch.set_if(paths::property(id), &property, current.revision)?;
        for contract in self.open_contracts(id).await? {
            let mut c = contract.value;
            if c.property_name == property.name && c.property_address == property.address {
                continue;
            }
            c.property_name = property.name.clone();
            c.property_address = property.address.clone();
            batch.set_if(paths::contract(c.id), &c, contract.revision)?;
        }
        self.ctx.store.commit(batch).await?;
        tracing::info!(property_id = %id, "Property updated");
        Ok(property)
    }

    /// Manually change availability
    ///
    /// `Arrendada` is managed by contract approval. Any manual change is
    /// refused while an active or pending contract exists.
    ///
    /// # Errors
    /// `Conflict` when the property is tied up or the status is contract-managed
    pub async fn set_status(&self, principal: &Principal, id: PropertyId, status: PropertyStatus) -> Result<Property, SaraError> {
        let current = self.owned(principal, id).await?;
        if status == PropertyStatus::Arrendada {
            return Err(SaraError::Conflict(
                "a property becomes Arrendada only through an approved contract".into(),
            ));
        }
        if current.value.status == status {
            return Ok(current.value);
        }
        self.ensure_free(id).await?;
        let mut property = current.value;
        property.status = status;
        property.current_contract_id = None;
        property.updated_at = self.ctx.now();
        let mut batch = WriteBatch::new();
        batch.set_if(paths::property(id), &property, current.revision)?;
        self.ctx.store.commit(batch).await?;
        tracing::info!(property_id = %id, status = %status, "Property status changed");
        Ok(property)
    }

    /// Delete a property without open contracts
    ///
    /// # Errors
    /// `Conflict` when an active or pending contract exists
    pub async fn delete(&self, principal: &Principal, id: PropertyId) -> Result<(), SaraError> {
        let current = self.owned(principal, id).await?;
        self.ensure_free(id).await?;
        let mut batch = WriteBatch::new();
        batch.delete(paths::property(id), Precondition::Revision(current.revision));
        self.ctx.store.commit(batch).await?;
        tracing::info!(property_id = %id, "Property deleted");
        Ok(())
    }

    pub(crate) async fn load(&self, id: PropertyId) -> Result<Versioned<Property>, SaraError> {
        repo::require(self.ctx.store(), &paths::property(id), "property").await
    }

    async fn owned(&self, principal: &Principal, id: PropertyId) -> Result<Versioned<Property>, SaraError> {
        let property = self.load(id).await?;
        if principal.is_self_or_admin(&property.value.owner_id) {
            Ok(property)
        } else {
            tracing::warn!(uid = %principal.uid, property_id = %id, "Property change by non-owner");
            Err(SaraError::Forbidden("only the owner can change this property".into()))
        }
    }

    async fn open_contracts(&self, id: PropertyId) -> Result<Vec<Versioned<Contract>>, SaraError> {
        let query = Query::collection(paths::CONTRACTS)
            .where_eq("property_id", id.to_string())
            .where_in("status", OPEN_CONTRACT.iter().map(|s| s.as_str()));
        repo::find(self.ctx.store(), &query).await
    }

    async fn ensure_free(&self, id: PropertyId) -> Result<(), SaraError> {
        let open = self.open_contracts(id).await?;
        if let Some(c) = open.first() {
            return Err(SaraError::Conflict(format!(
                "property has a {} contract ({})",
                c.value.status, c.value.id
            )));
        }
        Ok(())
    }
}
