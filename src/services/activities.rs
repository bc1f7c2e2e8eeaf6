//! Activity log: notes, calls and meetings against a client company or an
//! opportunity. Entries are append-only and visible through the author's id.

use sea_orm::{ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::Deserialize;

use super::query::{fetch_page, Page, PageRequest};
use super::{client_companies, opportunities};
use crate::access::{require, resolve_scope, Action, Principal, Resource};
use crate::db::{
    self,
    entities::activity::{self, ActivityEntityType, ActivityType, Column},
};
use crate::error::{Result, ServerError};
use crate::validation;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityFilter {
    pub entity_type: Option<ActivityEntityType>,
    pub entity_id: Option<i32>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewActivity {
    pub entity_type: ActivityEntityType,
    pub entity_id: i32,
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    pub description: String,
}

pub async fn list(
    db: &DatabaseConnection,
    principal: &Principal,
    filter: &ActivityFilter,
) -> Result<Page<activity::Model>> {
    require(principal, Resource::Activity, Action::Read)?;
    let scope = resolve_scope(db, principal).await?;

    let mut condition = Condition::all();
    if let Some(entity_type) = filter.entity_type {
        condition = condition.add(Column::EntityType.eq(entity_type));
    }
    if let Some(entity_id) = filter.entity_id {
        condition = condition.add(Column::EntityId.eq(entity_id));
    }
    if let Some(owned) = scope.owner_condition(&[Column::UserId]) {
        condition = condition.add(owned);
    }

    let select = activity::Entity::find()
        .filter(condition)
        .order_by_desc(Column::CreatedAt)
        .order_by_desc(Column::Id);
    fetch_page(db, select, PageRequest::new(filter.page, filter.page_size)).await
}

pub async fn get_by_id(db: &DatabaseConnection, principal: &Principal, id: i32) -> Result<activity::Model> {
    require(principal, Resource::Activity, Action::Read)?;
    let activity = activity::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| ServerError::not_found("Activity not found"))?;

    resolve_scope(db, principal)
        .await?
        .ensure_permits(principal, &activity, "activity")?;
    Ok(activity)
}

/// Log an activity as the caller. The target must exist and be visible.
pub async fn create(db: &DatabaseConnection, principal: &Principal, input: NewActivity) -> Result<activity::Model> {
    require(principal, Resource::Activity, Action::Create)?;
    let description = validation::text("description", &input.description, 2, 1000)?;
    validation::positive_id("entityId", input.entity_id)?;

    match input.entity_type {
        ActivityEntityType::ClientCompany => {
            client_companies::get_by_id(db, principal, input.entity_id).await?;
        }
        ActivityEntityType::Opportunity => {
            opportunities::get_by_id(db, principal, input.entity_id).await?;
        }
    }

    let activity = activity::ActiveModel {
        user_id: Set(principal.user_id),
        entity_type: Set(input.entity_type),
        entity_id: Set(input.entity_id),
        activity_type: Set(input.activity_type),
        description: Set(description),
        created_at: Set(db::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    tracing::info!(
        "User {} logged {:?} activity {} on {:?} {}",
        principal.user_id,
        activity.activity_type,
        activity.id,
        activity.entity_type,
        activity.entity_id
    );
    Ok(activity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::test_support::{insert_company, insert_contact, insert_opportunity, seed_team};

    fn note(entity_type: ActivityEntityType, entity_id: i32, description: &str) -> NewActivity {
        NewActivity {
            entity_type,
            entity_id,
            activity_type: ActivityType::Note,
            description: description.into(),
        }
    }

    #[tokio::test]
    async fn test_create_requires_visible_target() {
        let db = db::connect_in_memory().await.unwrap();
        let t = seed_team(&db).await;
        let mine = insert_company(&db, "Mine", t.category.id, t.m.id, t.f1.id).await;
        let foreign = insert_company(&db, "Foreign", t.category.id, t.other.id, t.f2.id).await;
        let f1 = Principal::of(&t.f1);

        let logged = create(&db, &f1, note(ActivityEntityType::ClientCompany, mine.id, "Intro call notes"))
            .await
            .unwrap();
        assert_eq!(logged.user_id, t.f1.id);

        let err = create(&db, &f1, note(ActivityEntityType::ClientCompany, foreign.id, "Sneaky"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let err = create(&db, &f1, note(ActivityEntityType::Opportunity, 4242, "Nothing here"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = create(&db, &f1, note(ActivityEntityType::ClientCompany, mine.id, " x "))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationFailed);
    }

    #[tokio::test]
    async fn test_list_is_scoped_by_author_and_newest_first() {
        let db = db::connect_in_memory().await.unwrap();
        let t = seed_team(&db).await;
        let mine = insert_company(&db, "Mine", t.category.id, t.m.id, t.f1.id).await;
        let contact = insert_contact(&db, "Ana", &mine).await;
        let deal = insert_opportunity(&db, "Deal", &contact, "proposal", 10.0).await;
        let theirs = insert_company(&db, "Theirs", t.category.id, t.other.id, t.f2.id).await;

        let first = create(&db, &Principal::of(&t.f1), note(ActivityEntityType::ClientCompany, mine.id, "First"))
            .await
            .unwrap();
        let second = create(&db, &Principal::of(&t.f1), note(ActivityEntityType::Opportunity, deal.id, "Second"))
            .await
            .unwrap();
        create(&db, &Principal::of(&t.f2), note(ActivityEntityType::ClientCompany, theirs.id, "Other team"))
            .await
            .unwrap();

        let page = list(&db, &Principal::of(&t.f1), &ActivityFilter::default()).await.unwrap();
        let ids: Vec<_> = page.items.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);

        // Manager sees their report's entries
        assert_eq!(list(&db, &Principal::of(&t.m), &ActivityFilter::default()).await.unwrap().total, 2);
        assert_eq!(list(&db, &Principal::of(&t.admin), &ActivityFilter::default()).await.unwrap().total, 3);

        let filter = ActivityFilter {
            entity_type: Some(ActivityEntityType::Opportunity),
            entity_id: Some(deal.id),
            ..Default::default()
        };
        let page = list(&db, &Principal::of(&t.m), &filter).await.unwrap();
        assert_eq!(page.items, vec![second.clone()]);

        let err = get_by_id(&db, &Principal::of(&t.f2), second.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        assert_eq!(get_by_id(&db, &Principal::of(&t.m), second.id).await.unwrap(), second);
    }
}
