//! Client categories (Enterprise, SMB, ...)

use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::Deserialize;

use crate::access::{require, Action, Principal, Resource};
use crate::db::entities::client_category::{self, Column};
use crate::error::{Result, ServerError};
use crate::validation;

#[derive(Debug, Clone, Deserialize)]
pub struct NewCategory {
    pub name: String,
    pub description: Option<String>,
}

/// Partial update. An empty `description` clears it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryPatch {
    pub name: Option<String>,
    pub description: Option<String>,
}

async fn ensure_name_free(db: &DatabaseConnection, name: &str, except: Option<i32>) -> Result<()> {
    let mut query = client_category::Entity::find().filter(Column::Name.eq(name));
    if let Some(id) = except {
        query = query.filter(Column::Id.ne(id));
    }
    if query.one(db).await?.is_some() {
        return Err(ServerError::conflict(format!("Category '{}' already exists", name)));
    }
    Ok(())
}

pub async fn list(db: &DatabaseConnection, principal: &Principal) -> Result<Vec<client_category::Model>> {
    require(principal, Resource::ClientCategory, Action::Read)?;
    Ok(client_category::Entity::find()
        .order_by_asc(Column::Name)
        .all(db)
        .await?)
}

pub async fn create(
    db: &DatabaseConnection,
    principal: &Principal,
    input: NewCategory,
) -> Result<client_category::Model> {
    require(principal, Resource::ClientCategory, Action::Create)?;
    let name = validation::text("name", &input.name, 2, 100)?;
    let description = validation::optional_text("description", input.description.as_deref(), 500)?;
    ensure_name_free(db, &name, None).await?;

    let category = client_category::ActiveModel {
        name: Set(name),
        description: Set(description),
        ..Default::default()
    }
    .insert(db)
    .await?;

    tracing::info!("Admin {} created client category {} ({})", principal.user_id, category.id, category.name);
    Ok(category)
}

pub async fn update(
    db: &DatabaseConnection,
    principal: &Principal,
    id: i32,
    patch: CategoryPatch,
) -> Result<client_category::Model> {
    require(principal, Resource::ClientCategory, Action::Update)?;
    let category = client_category::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| ServerError::not_found("Client category not found"))?;

    let mut active: client_category::ActiveModel = category.clone().into();
    if let Some(name) = patch.name {
        let name = validation::text("name", &name, 2, 100)?;
        ensure_name_free(db, &name, Some(id)).await?;
        active.name = Set(name);
    }
    if let Some(description) = patch.description {
        active.description = Set(validation::optional_text("description", Some(description.as_str()), 500)?);
    }
    if !active.is_changed() {
        return Ok(category);
    }

    let category = active.update(db).await?;
    tracing::info!("Admin {} updated client category {}", principal.user_id, category.id);
    Ok(category)
}
