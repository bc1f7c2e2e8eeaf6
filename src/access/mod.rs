//! Access control for CRM records.
//!
//! Three layers, applied in this order by every service call:
//! 1. [`permissions`]: static role -> operation allow-list.
//! 2. [`scope`]: which users' records the caller may see.
//! 3. [`ownership`]: create-time consistency between a new record's owners
//!    and its parent's owners.

pub mod ownership;
pub mod permissions;
pub mod scope;

use serde::Serialize;

use crate::db::entities::{activity, client_company, contact, opportunity, user, user::Role};

pub use ownership::OwnerPair;
pub use permissions::{require, Action, Resource};
pub use scope::resolve_scope;

/// The authenticated caller of an operation.
///
/// Always passed explicitly; nothing in the service layer reads request
/// state on its own.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub user_id: i32,
    pub role: Role,
}

impl Principal {
    pub fn new(user_id: i32, role: Role) -> Self {
        Self { user_id, role }
    }

    /// Principal for a directory entry, using the role currently stored
    pub fn of(user: &user::Model) -> Self {
        Self::new(user.id, user.role)
    }
}

/// Records whose visibility is decided by owner user ids.
pub trait Owned {
    fn owner_ids(&self) -> Vec<i32>;
}

impl Owned for client_company::Model {
    fn owner_ids(&self) -> Vec<i32> {
        vec![self.sales_manager_id, self.freelance_consultant_id]
    }
}

impl Owned for contact::Model {
    fn owner_ids(&self) -> Vec<i32> {
        vec![self.sales_manager_id, self.freelance_consultant_id]
    }
}

impl Owned for opportunity::Model {
    fn owner_ids(&self) -> Vec<i32> {
        vec![self.sales_manager_id, self.freelance_consultant_id]
    }
}

impl Owned for activity::Model {
    fn owner_ids(&self) -> Vec<i32> {
        vec![self.user_id]
    }
}
