//! Ownership consistency rules.
//!
//! A caller may only attach new records to what they already own. Each
//! entity type has one validator taking the creating principal, the parent
//! record and the proposed owners. Admins are exempt from the team rules.

use serde::Deserialize;
use thiserror::Error;

use super::Principal;
use crate::db::entities::{client_company, contact, user, user::Role};
use crate::error::ServerError;

/// Sales manager / freelance consultant owner pair carried by companies,
/// contacts and opportunities
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerPair {
    pub sales_manager_id: i32,
    pub freelance_consultant_id: i32,
}

impl OwnerPair {
    pub fn new(sales_manager_id: i32, freelance_consultant_id: i32) -> Self {
        Self { sales_manager_id, freelance_consultant_id }
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnershipViolation {
    #[error("A sales manager can only create records for themselves")]
    SalesManagerNotSelf,

    #[error("freelanceConsultantId must be the signed-in freelance consultant")]
    FreelancerNotSelf,

    #[error("Freelance consultant does not exist or is not active")]
    FreelancerUnavailable,

    #[error("Freelance consultant must belong to the sales manager's team")]
    FreelancerOutsideTeam,

    #[error("Client company belongs to another sales manager")]
    CompanyManagedElsewhere,

    #[error("Client company is assigned to another freelance consultant")]
    CompanyAssignedElsewhere,

    #[error("salesManagerId must match the client company's sales manager")]
    SalesManagerDiffersFromCompany,

    #[error("Contact belongs to another sales manager")]
    ContactManagedElsewhere,

    #[error("Contact is assigned to another freelance consultant")]
    ContactAssignedElsewhere,

    #[error("salesManagerId must match the contact's sales manager")]
    SalesManagerDiffersFromContact,
}

impl From<OwnershipViolation> for ServerError {
    fn from(violation: OwnershipViolation) -> Self {
        match violation {
            OwnershipViolation::FreelancerUnavailable => ServerError::validation(violation.to_string()),
            _ => ServerError::forbidden(violation.to_string()),
        }
    }
}

/// Client company owners. `freelancer` is the directory entry for
/// `proposed.freelance_consultant_id`, if one exists.
pub fn check_client_company(
    principal: &Principal,
    proposed: &OwnerPair,
    freelancer: Option<&user::Model>,
) -> Result<(), OwnershipViolation> {
    if principal.role == Role::SalesManager && proposed.sales_manager_id != principal.user_id {
        return Err(OwnershipViolation::SalesManagerNotSelf);
    }

    let freelancer = freelancer
        .filter(|u| u.id == proposed.freelance_consultant_id && u.is_active)
        .ok_or(OwnershipViolation::FreelancerUnavailable)?;

    match principal.role {
        Role::SalesManager if freelancer.manager_id != principal.user_id => {
            Err(OwnershipViolation::FreelancerOutsideTeam)
        }
        Role::Admin | Role::SalesManager | Role::FreelanceConsultant => Ok(()),
    }
}

/// Contact owners against the parent client company
pub fn check_contact(
    principal: &Principal,
    company: &client_company::Model,
    proposed: &OwnerPair,
) -> Result<(), OwnershipViolation> {
    let me = principal.user_id;
    match principal.role {
        Role::Admin => Ok(()),
        Role::SalesManager => {
            if company.sales_manager_id != me {
                return Err(OwnershipViolation::CompanyManagedElsewhere);
            }
            if proposed.sales_manager_id != me {
                return Err(OwnershipViolation::SalesManagerNotSelf);
            }
            Ok(())
        }
        Role::FreelanceConsultant => {
            if company.freelance_consultant_id != me {
                return Err(OwnershipViolation::CompanyAssignedElsewhere);
            }
            if proposed.freelance_consultant_id != me {
                return Err(OwnershipViolation::FreelancerNotSelf);
            }
            if proposed.sales_manager_id != company.sales_manager_id {
                return Err(OwnershipViolation::SalesManagerDiffersFromCompany);
            }
            Ok(())
        }
    }
}

/// Opportunity owners against the parent contact
pub fn check_opportunity(
    principal: &Principal,
    contact: &contact::Model,
    proposed: &OwnerPair,
) -> Result<(), OwnershipViolation> {
    let me = principal.user_id;
    match principal.role {
        Role::Admin => Ok(()),
        Role::SalesManager => {
            if contact.sales_manager_id != me {
                return Err(OwnershipViolation::ContactManagedElsewhere);
            }
            if proposed.sales_manager_id != me {
                return Err(OwnershipViolation::SalesManagerNotSelf);
            }
            Ok(())
        }
        Role::FreelanceConsultant => {
            if contact.freelance_consultant_id != me {
                return Err(OwnershipViolation::ContactAssignedElsewhere);
            }
            if proposed.freelance_consultant_id != me {
                return Err(OwnershipViolation::FreelancerNotSelf);
            }
            if proposed.sales_manager_id != contact.sales_manager_id {
                return Err(OwnershipViolation::SalesManagerDiffersFromContact);
            }
            Ok(())
        }
    }
}
