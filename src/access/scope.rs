//! Visibility scopes.
//!
//! Admins see everything. A sales manager sees records owned by themselves
//! or by any user whose `manager_id` points at them (one level only). A
//! freelance consultant sees their own records.

use std::collections::BTreeSet;

use sea_orm::{ColumnTrait, Condition, ConnectionTrait, EntityTrait, QueryFilter, QuerySelect};

use super::{Owned, Principal};
use crate::db::entities::user::{self, Role};
use crate::error::{Result, ServerError};

/// Set of user ids whose records are visible, or no restriction at all
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Scope {
    Unrestricted,
    Users(BTreeSet<i32>),
}

/// Resolve the caller's scope against the current directory.
///
/// Team membership is read fresh on every call, so a manager change is
/// visible on the very next request.
pub async fn resolve_scope<C: ConnectionTrait>(db: &C, principal: &Principal) -> Result<Scope> {
    match principal.role {
        Role::Admin => Ok(Scope::Unrestricted),
        Role::SalesManager => {
            let reports: Vec<i32> = user::Entity::find()
                .select_only()
                .column(user::Column::Id)
                .filter(user::Column::ManagerId.eq(principal.user_id))
                .into_tuple()
                .all(db)
                .await?;

            let mut ids: BTreeSet<i32> = reports.into_iter().collect();
            ids.insert(principal.user_id);
            Ok(Scope::Users(ids))
        }
        Role::FreelanceConsultant => Ok(Scope::Users(BTreeSet::from([principal.user_id]))),
    }
}

impl Scope {
    pub fn is_unrestricted(&self) -> bool {
        matches!(self, Scope::Unrestricted)
    }

    pub fn contains(&self, user_id: i32) -> bool {
        match self {
            Scope::Unrestricted => true,
            Scope::Users(ids) => ids.contains(&user_id),
        }
    }

    /// True if any owner of the record is in scope
    pub fn permits<R: Owned>(&self, record: &R) -> bool {
        self.is_unrestricted() || record.owner_ids().into_iter().any(|id| self.contains(id))
    }

    /// Where-clause restricting a query to rows with at least one owner
    /// column in scope. `None` when unrestricted.
    pub fn owner_condition<C: ColumnTrait>(&self, owner_columns: &[C]) -> Option<Condition> {
        match self {
            Scope::Unrestricted => None,
            Scope::Users(ids) => Some(owner_columns.iter().fold(Condition::any(), |cond, column| {
                cond.add(column.is_in(ids.iter().copied()))
            })),
        }
    }

    /// Post-fetch membership check. The record is known to exist, so a
    /// miss is Forbidden rather than NotFound.
    pub fn ensure_permits<R: Owned>(&self, principal: &Principal, record: &R, what: &str) -> Result<()> {
        if self.permits(record) {
            return Ok(());
        }
        tracing::warn!(
            "Denied {} access: user {} ({}) is outside the record's owners {:?}",
            what,
            principal.user_id,
            principal.role,
            record.owner_ids()
        );
        Err(ServerError::forbidden(format!("You do not have access to this {}", what)))
    }
}
