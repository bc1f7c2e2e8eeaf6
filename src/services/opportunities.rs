//! Sales opportunities

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
        client_company, contact,
        opportunity::{self, Column},
    },
};
use crate::error::{Result, ServerError};
use crate::validation;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpportunityFilter {
    pub q: Option<String>,
    pub stage: Option<String>,
    pub status: Option<String>,
    pub contact_id: Option<i32>,
    pub client_company_id: Option<i32>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOpportunity {
    pub title: String,
    pub description: Option<String>,
    pub stage: String,
    pub status: String,
    pub estimated_value: f64,
    pub currency: String,
    pub probability: f64,
    /// RFC 3339
    pub expected_close_date: Option<String>,
    pub contact_id: i32,
    pub client_company_id: Option<i32>,
    pub sales_manager_id: i32,
    pub freelance_consultant_id: i32,
}

/// Partial update. An empty `description` or `expectedCloseDate` clears it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpportunityPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub stage: Option<String>,
    pub status: Option<String>,
    pub estimated_value: Option<f64>,
    pub currency: Option<String>,
    pub probability: Option<f64>,
    pub expected_close_date: Option<String>,
    pub contact_id: Option<i32>,
    pub client_company_id: Option<i32>,
    pub sales_manager_id: Option<i32>,
    pub freelance_consultant_id: Option<i32>,
}

impl OpportunityPatch {
    fn touches_owners(&self) -> bool {
        self.contact_id.is_some() || self.sales_manager_id.is_some() || self.freelance_consultant_id.is_some()
    }
}

fn owners_of(opportunity: &opportunity::Model) -> OwnerPair {
    OwnerPair::new(opportunity.sales_manager_id, opportunity.freelance_consultant_id)
}

async fn find_contact(db: &DatabaseConnection, id: i32) -> Result<contact::Model> {
    validation::positive_id("contactId", id)?;
    contact::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| ServerError::not_found("Contact not found"))
}

async fn require_company(db: &DatabaseConnection, id: i32) -> Result<()> {
    validation::positive_id("clientCompanyId", id)?;
    if client_company::Entity::find_by_id(id).one(db).await?.is_none() {
        return Err(ServerError::not_found("Client company not found"));
    }
    Ok(())
}

pub async fn list(
    db: &DatabaseConnection,
    principal: &Principal,
    filter: &OpportunityFilter,
) -> Result<Page<opportunity::Model>> {
    require(principal, Resource::Opportunity, Action::Read)?;
    let scope = resolve_scope(db, principal).await?;

    let mut condition = Condition::all();
    if let Some(q) = non_blank(&filter.q) {
        condition = condition.add(contains_ci(Column::Title, q));
    }
    if let Some(stage) = non_blank(&filter.stage) {
        condition = condition.add(Column::Stage.eq(stage));
    }
    if let Some(status) = non_blank(&filter.status) {
        condition = condition.add(Column::Status.eq(status));
    }
    if let Some(contact_id) = filter.contact_id {
        condition = condition.add(Column::ContactId.eq(contact_id));
    }
    if let Some(company_id) = filter.client_company_id {
        condition = condition.add(Column::ClientCompanyId.eq(company_id));
    }
    if let Some(owned) = scope.owner_condition(&[Column::SalesManagerId, Column::FreelanceConsultantId]) {
        condition = condition.add(owned);
    }

    let select = opportunity::Entity::find()
        .filter(condition)
        .order_by_desc(Column::CreatedAt)
        .order_by_desc(Column::Id);
    fetch_page(db, select, PageRequest::new(filter.page, filter.page_size)).await
}

pub async fn get_by_id(db: &DatabaseConnection, principal: &Principal, id: i32) -> Result<opportunity::Model> {
    require(principal, Resource::Opportunity, Action::Read)?;
    let opportunity = opportunity::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| ServerError::not_found("Opportunity not found"))?;

    resolve_scope(db, principal)
        .await?
        .ensure_permits(principal, &opportunity, "opportunity")?;
    Ok(opportunity)
}

pub async fn create(
    db: &DatabaseConnection,
    principal: &Principal,
    input: NewOpportunity,
) -> Result<opportunity::Model> {
    require(principal, Resource::Opportunity, Action::Create)?;

    let title = validation::text("title", &input.title, 2, 200)?;
    let description = validation::optional_text("description", input.description.as_deref(), 2000)?;
    let stage = validation::required("stage", &input.stage)?;
    let status = validation::required("status", &input.status)?;
    let currency = validation::required("currency", &input.currency)?;
    let estimated_value = validation::estimated_value(input.estimated_value)?;
    let probability = validation::probability(input.probability)?;
    let expected_close_date =
        validation::optional_timestamp("expectedCloseDate", input.expected_close_date.as_deref())?;

    let owners = OwnerPair::new(input.sales_manager_id, input.freelance_consultant_id);
    let contact = find_contact(db, input.contact_id).await?;
    ownership::check_opportunity(principal, &contact, &owners)?;
    require_owner_users(db, &owners).await?;

    let client_company_id = match input.client_company_id {
        Some(id) => {
            require_company(db, id).await?;
            id
        }
        None => contact.client_company_id,
    };

    let now = db::now();
    let opportunity = opportunity::ActiveModel {
        title: Set(title),
        description: Set(description),
        stage: Set(stage),
        status: Set(status),
        estimated_value: Set(estimated_value),
        currency: Set(currency),
        probability: Set(probability),
        expected_close_date: Set(expected_close_date),
        contact_id: Set(contact.id),
        client_company_id: Set(Some(client_company_id)),
        sales_manager_id: Set(owners.sales_manager_id),
        freelance_consultant_id: Set(owners.freelance_consultant_id),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    tracing::info!(
        "User {} created opportunity {} for contact {}",
        principal.user_id,
        opportunity.id,
        opportunity.contact_id
    );
    Ok(opportunity)
}

pub async fn update(
    db: &DatabaseConnection,
    principal: &Principal,
    id: i32,
    patch: OpportunityPatch,
) -> Result<opportunity::Model> {
    require(principal, Resource::Opportunity, Action::Update)?;
    let opportunity = get_by_id(db, principal, id).await?;
    ensure_modifiable(principal, owners_of(&opportunity), "opportunity")?;

    if patch.touches_owners() {
        let owners = OwnerPair::new(
            patch.sales_manager_id.unwrap_or(opportunity.sales_manager_id),
            patch.freelance_consultant_id.unwrap_or(opportunity.freelance_consultant_id),
        );
        let contact = find_contact(db, patch.contact_id.unwrap_or(opportunity.contact_id)).await?;
        ownership::check_opportunity(principal, &contact, &owners)?;
        require_owner_users(db, &owners).await?;
    }
    if let Some(company_id) = patch.client_company_id {
        require_company(db, company_id).await?;
    }

    let mut active: opportunity::ActiveModel = opportunity.into();
    if let Some(title) = patch.title {
        active.title = Set(validation::text("title", &title, 2, 200)?);
    }
    if let Some(description) = patch.description {
        active.description = Set(validation::optional_text("description", Some(description.as_str()), 2000)?);
    }
    if let Some(stage) = patch.stage {
        active.stage = Set(validation::required("stage", &stage)?);
    }
    if let Some(status) = patch.status {
        active.status = Set(validation::required("status", &status)?);
    }
    if let Some(value) = patch.estimated_value {
        active.estimated_value = Set(validation::estimated_value(value)?);
    }
    if let Some(currency) = patch.currency {
        active.currency = Set(validation::required("currency", &currency)?);
    }
    if let Some(probability) = patch.probability {
        active.probability = Set(validation::probability(probability)?);
    }
    if let Some(date) = patch.expected_close_date {
        active.expected_close_date = Set(validation::optional_timestamp("expectedCloseDate", Some(date.as_str()))?);
    }
    if let Some(contact_id) = patch.contact_id {
        active.contact_id = Set(contact_id);
    }
    if let Some(company_id) = patch.client_company_id {
        active.client_company_id = Set(Some(company_id));
    }
    if let Some(sales_manager_id) = patch.sales_manager_id {
        active.sales_manager_id = Set(sales_manager_id);
    }
    if let Some(freelance_consultant_id) = patch.freelance_consultant_id {
        active.freelance_consultant_id = Set(freelance_consultant_id);
    }
    active.updated_at = Set(db::now());

    let opportunity = active.update(db).await?;
    tracing::info!("User {} updated opportunity {}", principal.user_id, opportunity.id);
    Ok(opportunity)
}

/// Admin-only owner overwrite. Repeating the same call is a no-op.
pub async fn reassign_owners(
    db: &DatabaseConnection,
    principal: &Principal,
    id: i32,
    owners: OwnerPair,
) -> Result<opportunity::Model> {
    require(principal, Resource::Opportunity, Action::Reassign)?;
    let opportunity = opportunity::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| ServerError::not_found("Opportunity not found"))?;
    require_assignable_owners(db, &owners).await?;

    if owners_of(&opportunity) == owners {
        return Ok(opportunity);
    }

    let mut active: opportunity::ActiveModel = opportunity.into();
    active.sales_manager_id = Set(owners.sales_manager_id);
    active.freelance_consultant_id = Set(owners.freelance_consultant_id);
    active.updated_at = Set(db::now());
    let opportunity = active.update(db).await?;

    tracing::info!(
        "Admin {} reassigned opportunity {} to sm={}, fc={}",
        principal.user_id,
        opportunity.id,
        owners.sales_manager_id,
        owners.freelance_consultant_id
    );
    Ok(opportunity)
}
