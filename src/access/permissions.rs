//! Static role -> operation allow-list.
//!
//! This gate is checked before any record is loaded and does not depend on
//! data. Record-level checks live in [`super::scope`] and
//! [`super::ownership`].

use std::fmt;

use super::Principal;
use crate::db::entities::user::Role;
use crate::error::{Result, ServerError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resource {
    /// User administration
    Directory,
    /// A sales manager's own freelancers
    Team,
    ClientCategory,
    ClientCompany,
    Contact,
    Opportunity,
    Activity,
    TeamMetrics,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Read,
    Create,
    Update,
    /// Overwrite a record's owner pair
    Reassign,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Resource::Directory => "users",
            Resource::Team => "team",
            Resource::ClientCategory => "client categories",
            Resource::ClientCompany => "client companies",
            Resource::Contact => "contacts",
            Resource::Opportunity => "opportunities",
            Resource::Activity => "activities",
            Resource::TeamMetrics => "team metrics",
        };
        f.write_str(name)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Read => "read",
            Action::Create => "create",
            Action::Update => "update",
            Action::Reassign => "reassign",
        };
        f.write_str(name)
    }
}

pub fn is_allowed(role: Role, resource: Resource, action: Action) -> bool {
    use Action::*;
    use Resource::*;

    match role {
        Role::Admin => match resource {
            Directory | ClientCategory => matches!(action, Read | Create | Update),
            Team => false,
            ClientCompany | Contact | Opportunity => true,
            Activity => matches!(action, Read | Create),
            TeamMetrics => action == Read,
        },
        Role::SalesManager => match resource {
            Directory => false,
            Team | ClientCategory | TeamMetrics => action == Read,
            ClientCompany | Contact | Opportunity => matches!(action, Read | Create | Update),
            Activity => matches!(action, Read | Create),
        },
        Role::FreelanceConsultant => match resource {
            Directory | Team | TeamMetrics => false,
            ClientCategory | ClientCompany => action == Read,
            Contact | Opportunity => matches!(action, Read | Create | Update),
            Activity => matches!(action, Read | Create),
        },
    }
}

/// Reject the call with Forbidden unless the caller's role may perform it
pub fn require(principal: &Principal, resource: Resource, action: Action) -> Result<()> {
    if is_allowed(principal.role, resource, action) {
        return Ok(());
    }
    tracing::warn!(
        "Role gate denied user {} ({}): {} {}",
        principal.user_id,
        principal.role,
        action,
        resource
    );
    Err(ServerError::forbidden(format!(
        "Role {} may not {} {}",
        principal.role, action, resource
    )))
}
