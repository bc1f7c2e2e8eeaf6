//! Contacts at client companies

use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::Deserialize;

use super::query::{contains_ci, fetch_page, non_blank, Page, PageRequest};
use super::{ensure_modifiable, require_assignable_owners, require_owner_users};
use crate::access::{ownership, require, resolve_scope, Action, OwnerPair, Principal, Resource};
use crate::db::{
    self,
    entities::{
        client_company,
        contact::{self, Column},
    },
};
use crate::error::{Result, ServerError};
use crate::validation;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactFilter {
    pub q: Option<String>,
    pub client_company_id: Option<i32>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewContact {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub position: Option<String>,
    pub notes: Option<String>,
    pub client_company_id: i32,
    pub sales_manager_id: i32,
    pub freelance_consultant_id: i32,
}

/// Partial update. Empty strings clear the optional fields.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub position: Option<String>,
    pub notes: Option<String>,
    pub client_company_id: Option<i32>,
    pub sales_manager_id: Option<i32>,
    pub freelance_consultant_id: Option<i32>,
}

impl ContactPatch {
    fn touches_owners(&self) -> bool {
        self.client_company_id.is_some()
            || self.sales_manager_id.is_some()
            || self.freelance_consultant_id.is_some()
    }
}

fn owners_of(contact: &contact::Model) -> OwnerPair {
    OwnerPair::new(contact.sales_manager_id, contact.freelance_consultant_id)
}

async fn find_company(db: &DatabaseConnection, id: i32) -> Result<client_company::Model> {
    validation::positive_id("clientCompanyId", id)?;
    client_company::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| ServerError::not_found("Client company not found"))
}

pub async fn list(
    db: &DatabaseConnection,
    principal: &Principal,
    filter: &ContactFilter,
) -> Result<Page<contact::Model>> {
    require(principal, Resource::Contact, Action::Read)?;
    let scope = resolve_scope(db, principal).await?;

    // Search and scope are both required to match
    let mut condition = Condition::all();
    if let Some(q) = non_blank(&filter.q) {
        condition = condition.add(
            Condition::any()
                .add(contains_ci(Column::Name, q))
                .add(contains_ci(Column::Email, q))
                .add(contains_ci(Column::Position, q)),
        );
    }
    if let Some(company_id) = filter.client_company_id {
        condition = condition.add(Column::ClientCompanyId.eq(company_id));
    }
    if let Some(owned) = scope.owner_condition(&[Column::SalesManagerId, Column::FreelanceConsultantId]) {
        condition = condition.add(owned);
    }

    let select = contact::Entity::find()
        .filter(condition)
        .order_by_desc(Column::CreatedAt)
        .order_by_desc(Column::Id);
    fetch_page(db, select, PageRequest::new(filter.page, filter.page_size)).await
}

pub async fn get_by_id(db: &DatabaseConnection, principal: &Principal, id: i32) -> Result<contact::Model> {
    require(principal, Resource::Contact, Action::Read)?;
    let contact = contact::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| ServerError::not_found("Contact not found"))?;

    resolve_scope(db, principal)
        .await?
        .ensure_permits(principal, &contact, "contact")?;
    Ok(contact)
}

pub async fn create(db: &DatabaseConnection, principal: &Principal, input: NewContact) -> Result<contact::Model> {
    require(principal, Resource::Contact, Action::Create)?;

    let name = validation::text("name", &input.name, 2, 200)?;
    let email = validation::optional_email(input.email.as_deref())?;
    let phone = validation::optional_text("phone", input.phone.as_deref(), 50)?;
    let position = validation::optional_text("position", input.position.as_deref(), 200)?;
    let notes = validation::optional_text("notes", input.notes.as_deref(), 2000)?;

    let owners = OwnerPair::new(input.sales_manager_id, input.freelance_consultant_id);
    let company = find_company(db, input.client_company_id).await?;
    ownership::check_contact(principal, &company, &owners)?;
    require_owner_users(db, &owners).await?;

    let now = db::now();
    let contact = contact::ActiveModel {
        name: Set(name),
        email: Set(email),
        phone: Set(phone),
        position: Set(position),
        notes: Set(notes),
        client_company_id: Set(company.id),
        sales_manager_id: Set(owners.sales_manager_id),
        freelance_consultant_id: Set(owners.freelance_consultant_id),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    tracing::info!(
        "User {} created contact {} at client company {}",
        principal.user_id,
        contact.id,
        contact.client_company_id
    );
    Ok(contact)
}

pub async fn update(
    db: &DatabaseConnection,
    principal: &Principal,
    id: i32,
    patch: ContactPatch,
) -> Result<contact::Model> {
    require(principal, Resource::Contact, Action::Update)?;
    let contact = get_by_id(db, principal, id).await?;
    ensure_modifiable(principal, owners_of(&contact), "contact")?;

    if patch.touches_owners() {
        let owners = OwnerPair::new(
            patch.sales_manager_id.unwrap_or(contact.sales_manager_id),
            patch.freelance_consultant_id.unwrap_or(contact.freelance_consultant_id),
        );
        let company = find_company(db, patch.client_company_id.unwrap_or(contact.client_company_id)).await?;
        ownership::check_contact(principal, &company, &owners)?;
        require_owner_users(db, &owners).await?;
    }

    let mut active: contact::ActiveModel = contact.into();
    if let Some(name) = patch.name {
        active.name = Set(validation::text("name", &name, 2, 200)?);
    }
    if let Some(email) = patch.email {
        active.email = Set(validation::optional_email(Some(email.as_str()))?);
    }
    if let Some(phone) = patch.phone {
        active.phone = Set(validation::optional_text("phone", Some(phone.as_str()), 50)?);
    }
    if let Some(position) = patch.position {
        active.position = Set(validation::optional_text("position", Some(position.as_str()), 200)?);
    }
    if let Some(notes) = patch.notes {
        active.notes = Set(validation::optional_text("notes", Some(notes.as_str()), 2000)?);
    }
    if let Some(company_id) = patch.client_company_id {
        active.client_company_id = Set(company_id);
    }
    if let Some(sales_manager_id) = patch.sales_manager_id {
        active.sales_manager_id = Set(sales_manager_id);
    }
    if let Some(freelance_consultant_id) = patch.freelance_consultant_id {
        active.freelance_consultant_id = Set(freelance_consultant_id);
    }
    active.updated_at = Set(db::now());

    let contact = active.update(db).await?;
    tracing::info!("User {} updated contact {}", principal.user_id, contact.id);
    Ok(contact)
}

/// Admin-only owner overwrite. Repeating the same call is a no-op.
pub async fn reassign_owners(
    db: &DatabaseConnection,
    principal: &Principal,
    id: i32,
    owners: OwnerPair,
) -> Result<contact::Model> {
    require(principal, Resource::Contact, Action::Reassign)?;
    let contact = contact::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| ServerError::not_found("Contact not found"))?;
    require_assignable_owners(db, &owners).await?;

    if owners_of(&contact) == owners {
        return Ok(contact);
    }

    let mut active: contact::ActiveModel = contact.into();
    active.sales_manager_id = Set(owners.sales_manager_id);
    active.freelance_consultant_id = Set(owners.freelance_consultant_id);
    active.updated_at = Set(db::now());
    let contact = active.update(db).await?;

    tracing::info!(
        "Admin {} reassigned contact {} to sm={}, fc={}",
        principal.user_id,
        contact.id,
        owners.sales_manager_id,
        owners.freelance_consultant_id
    );
    Ok(contact)
}
