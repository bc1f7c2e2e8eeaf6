//! Directory administration and the sales manager's team view.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, SqlErr, TransactionTrait,
};
use serde::{Deserialize, Serialize};

use super::query::{contains_ci, fetch_page, non_blank, Page, PageRequest};
use crate::access::{require, Action, Principal, Resource};
use crate::auth::hash_password;
use crate::db::{
    self,
    entities::user::{self, Column, Role},
};
use crate::error::{Result, ServerError};
use crate::validation;

/// Public view of a directory entry; never carries the password hash
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub manager_id: i32,
    pub is_active: bool,
    pub created_at: i64,
}

impl From<user::Model> for UserView {
    fn from(user: user::Model) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            manager_id: user.manager_id,
            is_active: user.is_active,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    /// Required for freelance consultants, ignored otherwise
    pub manager_id: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
    pub manager_id: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserFilter {
    pub q: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamFilter {
    pub q: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

async fn ensure_email_free(db: &DatabaseConnection, email: &str, except: Option<i32>) -> Result<()> {
    let mut query = user::Entity::find().filter(Column::Email.eq(email));
    if let Some(id) = except {
        query = query.filter(Column::Id.ne(id));
    }
    if query.one(db).await?.is_some() {
        return Err(ServerError::conflict("Email is already registered"));
    }
    Ok(())
}

fn map_unique_email(err: DbErr) -> ServerError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => ServerError::conflict("Email is already registered"),
        _ => err.into(),
    }
}

/// A freelancer's manager must be an active sales manager
async fn require_active_manager(db: &DatabaseConnection, manager_id: i32) -> Result<()> {
    match user::Entity::find_by_id(manager_id).one(db).await? {
        Some(m) if m.role == Role::SalesManager && m.is_active => Ok(()),
        _ => Err(ServerError::validation("managerId must reference an active sales manager")),
    }
}

/// Validate and insert a directory entry. Admins and sales managers
/// reference themselves, which needs the generated id, so the insert and the
/// self-reference share one transaction.
pub(crate) async fn create_account(db: &DatabaseConnection, input: NewUser) -> Result<user::Model> {
    let name = validation::text("name", &input.name, 2, 100)?;
    let email = validation::email(&input.email)?;
    validation::password(&input.password)?;
    ensure_email_free(db, &email, None).await?;

    let manager_id = match input.role {
        Role::FreelanceConsultant => {
            let manager_id = input
                .manager_id
                .ok_or_else(|| ServerError::validation("managerId is required for freelance consultants"))?;
            require_active_manager(db, manager_id).await?;
            Some(manager_id)
        }
        Role::Admin | Role::SalesManager => None,
    };
    let password_hash = hash_password(&input.password)?;

    let txn = db.begin().await?;
    let inserted = user::ActiveModel {
        name: Set(name),
        email: Set(email),
        password_hash: Set(password_hash),
        role: Set(input.role),
        manager_id: Set(manager_id.unwrap_or(0)),
        is_active: Set(true),
        created_at: Set(db::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await
    .map_err(map_unique_email)?;

    let user = match manager_id {
        Some(_) => inserted,
        None => {
            let id = inserted.id;
            let mut active: user::ActiveModel = inserted.into();
            active.manager_id = Set(id);
            active.update(&txn).await?
        }
    };
    txn.commit().await?;

    tracing::info!("Created user {} ({}) with role {}", user.id, user.email, user.role);
    Ok(user)
}

pub async fn get_profile(db: &DatabaseConnection, principal: &Principal) -> Result<UserView> {
    user::Entity::find_by_id(principal.user_id)
        .one(db)
        .await?
        .map(UserView::from)
        .ok_or(ServerError::Unauthenticated)
}

pub async fn list_users(
    db: &DatabaseConnection,
    principal: &Principal,
    filter: &UserFilter,
) -> Result<Page<UserView>> {
    require(principal, Resource::Directory, Action::Read)?;

    let mut condition = Condition::all();
    if let Some(q) = non_blank(&filter.q) {
        condition = condition.add(
            Condition::any()
                .add(contains_ci(Column::Name, q))
                .add(contains_ci(Column::Email, q)),
        );
    }
    if let Some(role) = filter.role {
        condition = condition.add(Column::Role.eq(role));
    }
    if let Some(is_active) = filter.is_active {
        condition = condition.add(Column::IsActive.eq(is_active));
    }

    let select = user::Entity::find()
        .filter(condition)
        .order_by_desc(Column::CreatedAt)
        .order_by_desc(Column::Id);
    let page = fetch_page(db, select, PageRequest::new(filter.page, filter.page_size)).await?;
    Ok(page.map(UserView::from))
}

pub async fn create_user(db: &DatabaseConnection, principal: &Principal, input: NewUser) -> Result<UserView> {
    require(principal, Resource::Directory, Action::Create)?;
    let user = create_account(db, input).await?;
    tracing::info!("Admin {} created user {}", principal.user_id, user.id);
    Ok(user.into())
}

/// Partial update that keeps every user's `manager_id` valid for their role
pub async fn update_user(
    db: &DatabaseConnection,
    principal: &Principal,
    id: i32,
    patch: UserPatch,
) -> Result<UserView> {
    require(principal, Resource::Directory, Action::Update)?;
    let user = user::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| ServerError::not_found("User not found"))?;

    let role = patch.role.unwrap_or(user.role);
    let is_active = patch.is_active.unwrap_or(user.is_active);
    if id == principal.user_id && (role != user.role || !is_active) {
        return Err(ServerError::validation("You cannot change your own role or deactivate yourself"));
    }

    let manager_id = match role {
        Role::Admin | Role::SalesManager => {
            if patch.manager_id.is_some_and(|m| m != id) {
                return Err(ServerError::validation(
                    "Admins and sales managers must be their own manager",
                ));
            }
            id
        }
        Role::FreelanceConsultant => {
            let manager_id = match (patch.manager_id, user.role) {
                (Some(manager_id), _) => manager_id,
                (None, Role::FreelanceConsultant) => user.manager_id,
                (None, _) => {
                    return Err(ServerError::validation("managerId is required for freelance consultants"))
                }
            };
            require_active_manager(db, manager_id).await?;
            manager_id
        }
    };

    // A manager with active reports cannot stop being one
    if user.role == Role::SalesManager && (role != Role::SalesManager || !is_active) {
        let reports = user::Entity::find()
            .filter(Column::ManagerId.eq(id))
            .filter(Column::Id.ne(id))
            .filter(Column::IsActive.eq(true))
            .count(db)
            .await?;
        if reports > 0 {
            return Err(ServerError::conflict(format!(
                "Sales manager {} still has {} active freelance consultant(s)",
                id, reports
            )));
        }
    }

    let mut active: user::ActiveModel = user.into();
    if let Some(name) = patch.name {
        active.name = Set(validation::text("name", &name, 2, 100)?);
    }
    if let Some(email) = patch.email {
        let email = validation::email(&email)?;
        ensure_email_free(db, &email, Some(id)).await?;
        active.email = Set(email);
    }
    if let Some(password) = patch.password {
        validation::password(&password)?;
        active.password_hash = Set(hash_password(&password)?);
    }
    active.role = Set(role);
    active.is_active = Set(is_active);
    active.manager_id = Set(manager_id);

    let user = active.update(db).await.map_err(map_unique_email)?;
    tracing::info!(
        "Admin {} updated user {} (role={}, manager={}, active={})",
        principal.user_id,
        user.id,
        user.role,
        user.manager_id,
        user.is_active
    );
    Ok(user.into())
}

/// Active freelance consultants reporting to the calling sales manager
pub async fn list_team(
    db: &DatabaseConnection,
    principal: &Principal,
    filter: &TeamFilter,
) -> Result<Page<UserView>> {
    require(principal, Resource::Team, Action::Read)?;

    let mut condition = Condition::all()
        .add(Column::ManagerId.eq(principal.user_id))
        .add(Column::Role.eq(Role::FreelanceConsultant))
        .add(Column::IsActive.eq(true));
    if let Some(q) = non_blank(&filter.q) {
        condition = condition.add(
            Condition::any()
                .add(contains_ci(Column::Name, q))
                .add(contains_ci(Column::Email, q)),
        );
    }

    let select = user::Entity::find()
        .filter(condition)
        .order_by_asc(Column::Name)
        .order_by_asc(Column::Id);
    let page = fetch_page(db, select, PageRequest::new(filter.page, filter.page_size)).await?;
    Ok(page.map(UserView::from))
}
