//! Access-checked operations over the CRM records.
//!
//! Every public function takes the calling [`Principal`] explicitly and runs
//! the static permission gate first, then scope and ownership checks, and
//! only then touches the store.

pub mod activities;
pub mod categories;
pub mod client_companies;
pub mod contacts;
pub mod metrics;
pub mod opportunities;
pub mod query;
pub mod users;

use sea_orm::{DatabaseConnection, EntityTrait};

use crate::access::{OwnerPair, Principal};
use crate::db::entities::user::{self, Role};
use crate::error::{Result, ServerError};
use crate::validation;

/// Write gate on an already visible record: sales managers may change what
/// they manage, freelancers what they are assigned to.
pub(crate) fn ensure_modifiable(
    principal: &Principal,
    owners: OwnerPair,
    what: &str,
) -> Result<()> {
    let allowed = match principal.role {
        Role::Admin => true,
        Role::SalesManager => owners.sales_manager_id == principal.user_id,
        Role::FreelanceConsultant => owners.freelance_consultant_id == principal.user_id,
    };
    if allowed {
        return Ok(());
    }
    tracing::warn!(
        "Denied {} update: user {} ({}) is not the responsible owner",
        what,
        principal.user_id,
        principal.role
    );
    Err(ServerError::forbidden(format!("You cannot modify this {}", what)))
}

/// Both owner ids must be positive and name existing users
pub(crate) async fn require_owner_users(db: &DatabaseConnection, owners: &OwnerPair) -> Result<()> {
    validation::positive_id("salesManagerId", owners.sales_manager_id)?;
    validation::positive_id("freelanceConsultantId", owners.freelance_consultant_id)?;
    for (field, id) in [
        ("salesManagerId", owners.sales_manager_id),
        ("freelanceConsultantId", owners.freelance_consultant_id),
    ] {
        if user::Entity::find_by_id(id).one(db).await?.is_none() {
            return Err(ServerError::validation(format!("{} does not reference a user", field)));
        }
    }
    Ok(())
}

/// New owners for an admin reassignment: each must exist and be active.
/// The pair is not checked for team consistency.
pub(crate) async fn require_assignable_owners(db: &DatabaseConnection, owners: &OwnerPair) -> Result<()> {
    for (what, id) in [
        ("Sales manager", owners.sales_manager_id),
        ("Freelance consultant", owners.freelance_consultant_id),
    ] {
        match user::Entity::find_by_id(id).one(db).await? {
            Some(u) if u.is_active => {}
            Some(_) => return Err(ServerError::conflict(format!("{} {} is not active", what, id))),
            None => return Err(ServerError::conflict(format!("{} {} does not exist", what, id))),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_modifiable_by_role() {
        let owners = OwnerPair { sales_manager_id: 10, freelance_consultant_id: 20 };

        assert!(ensure_modifiable(&Principal::new(1, Role::Admin), owners, "contact").is_ok());
        assert!(ensure_modifiable(&Principal::new(10, Role::SalesManager), owners, "contact").is_ok());
        assert!(ensure_modifiable(&Principal::new(20, Role::FreelanceConsultant), owners, "contact").is_ok());

        // A manager whose report is the freelancer still needs to be the record's manager
        let err = ensure_modifiable(&Principal::new(11, Role::SalesManager), owners, "contact").unwrap_err();
        assert!(matches!(err, ServerError::Forbidden(_)));
        let err = ensure_modifiable(&Principal::new(10, Role::FreelanceConsultant), owners, "contact").unwrap_err();
        assert!(matches!(err, ServerError::Forbidden(_)));
    }
}
