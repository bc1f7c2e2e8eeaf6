//! Client companies

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
        client_category,
        client_company::{self, Column},
        user,
    },
};
use crate::error::{Result, ServerError};
use crate::validation;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientCompanyFilter {
    pub q: Option<String>,
    pub city: Option<String>,
    pub status: Option<String>,
    pub category_id: Option<i32>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewClientCompany {
    pub name: String,
    pub industry: String,
    pub company_size: String,
    pub website: Option<String>,
    pub country: String,
    pub city: String,
    pub address: String,
    pub status: String,
    pub category_id: i32,
    pub sales_manager_id: i32,
    pub freelance_consultant_id: i32,
}

/// Partial update. An empty `website` clears it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientCompanyPatch {
    pub name: Option<String>,
    pub industry: Option<String>,
    pub company_size: Option<String>,
    pub website: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub address: Option<String>,
    pub status: Option<String>,
    pub category_id: Option<i32>,
    pub sales_manager_id: Option<i32>,
    pub freelance_consultant_id: Option<i32>,
}

impl ClientCompanyPatch {
    fn touches_owners(&self) -> bool {
        self.sales_manager_id.is_some() || self.freelance_consultant_id.is_some()
    }
}

fn owners_of(company: &client_company::Model) -> OwnerPair {
    OwnerPair::new(company.sales_manager_id, company.freelance_consultant_id)
}

async fn require_category(db: &DatabaseConnection, category_id: i32) -> Result<()> {
    validation::positive_id("categoryId", category_id)?;
    if client_category::Entity::find_by_id(category_id).one(db).await?.is_none() {
        return Err(ServerError::validation("categoryId does not reference a category"));
    }
    Ok(())
}

/// Company owners as checked at create time. Role rules run before the
/// owner ids are resolved.
async fn check_owners(db: &DatabaseConnection, principal: &Principal, owners: &OwnerPair) -> Result<()> {
    let freelancer = if owners.freelance_consultant_id > 0 {
        user::Entity::find_by_id(owners.freelance_consultant_id).one(db).await?
    } else {
        None
    };
    ownership::check_client_company(principal, owners, freelancer.as_ref())?;
    require_owner_users(db, owners).await?;
    Ok(())
}

pub async fn list(
    db: &DatabaseConnection,
    principal: &Principal,
    filter: &ClientCompanyFilter,
) -> Result<Page<client_company::Model>> {
    require(principal, Resource::ClientCompany, Action::Read)?;
    let scope = resolve_scope(db, principal).await?;

    let mut condition = Condition::all();
    if let Some(q) = non_blank(&filter.q) {
        condition = condition.add(
            Condition::any()
                .add(contains_ci(Column::Name, q))
                .add(contains_ci(Column::Industry, q)),
        );
    }
    if let Some(city) = non_blank(&filter.city) {
        condition = condition.add(contains_ci(Column::City, city));
    }
    if let Some(status) = non_blank(&filter.status) {
        condition = condition.add(Column::Status.eq(status));
    }
    if let Some(category_id) = filter.category_id {
        condition = condition.add(Column::CategoryId.eq(category_id));
    }
    if let Some(owned) = scope.owner_condition(&[Column::SalesManagerId, Column::FreelanceConsultantId]) {
        condition = condition.add(owned);
    }

    let select = client_company::Entity::find()
        .filter(condition)
        .order_by_desc(Column::CreatedAt)
        .order_by_desc(Column::Id);
    fetch_page(db, select, PageRequest::new(filter.page, filter.page_size)).await
}

pub async fn get_by_id(
    db: &DatabaseConnection,
    principal: &Principal,
    id: i32,
) -> Result<client_company::Model> {
    require(principal, Resource::ClientCompany, Action::Read)?;
    let company = client_company::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| ServerError::not_found("Client company not found"))?;

    resolve_scope(db, principal)
        .await?
        .ensure_permits(principal, &company, "client company")?;
    Ok(company)
}

pub async fn create(
    db: &DatabaseConnection,
    principal: &Principal,
    input: NewClientCompany,
) -> Result<client_company::Model> {
    require(principal, Resource::ClientCompany, Action::Create)?;

    let name = validation::text("name", &input.name, 2, 200)?;
    let industry = validation::required("industry", &input.industry)?;
    let company_size = validation::required("companySize", &input.company_size)?;
    let website = validation::optional_website(input.website.as_deref())?;
    let country = validation::required("country", &input.country)?;
    let city = validation::required("city", &input.city)?;
    let address = validation::required("address", &input.address)?;
    let status = validation::required("status", &input.status)?;
    require_category(db, input.category_id).await?;

    let owners = OwnerPair::new(input.sales_manager_id, input.freelance_consultant_id);
    check_owners(db, principal, &owners).await?;

    let now = db::now();
    let company = client_company::ActiveModel {
        name: Set(name),
        industry: Set(industry),
        company_size: Set(company_size),
        website: Set(website),
        country: Set(country),
        city: Set(city),
        address: Set(address),
        status: Set(status),
        category_id: Set(input.category_id),
        sales_manager_id: Set(owners.sales_manager_id),
        freelance_consultant_id: Set(owners.freelance_consultant_id),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    tracing::info!(
        "User {} created client company {} (sm={}, fc={})",
        principal.user_id,
        company.id,
        company.sales_manager_id,
        company.freelance_consultant_id
    );
    Ok(company)
}

pub async fn update(
    db: &DatabaseConnection,
    principal: &Principal,
    id: i32,
    patch: ClientCompanyPatch,
) -> Result<client_company::Model> {
    require(principal, Resource::ClientCompany, Action::Update)?;
    let company = get_by_id(db, principal, id).await?;
    ensure_modifiable(principal, owners_of(&company), "client company")?;

    if patch.touches_owners() {
        let owners = OwnerPair::new(
            patch.sales_manager_id.unwrap_or(company.sales_manager_id),
            patch.freelance_consultant_id.unwrap_or(company.freelance_consultant_id),
        );
        check_owners(db, principal, &owners).await?;
    }
    if let Some(category_id) = patch.category_id {
        require_category(db, category_id).await?;
    }

    let mut active: client_company::ActiveModel = company.into();
    if let Some(name) = patch.name {
        active.name = Set(validation::text("name", &name, 2, 200)?);
    }
    if let Some(industry) = patch.industry {
        active.industry = Set(validation::required("industry", &industry)?);
    }
    if let Some(company_size) = patch.company_size {
        active.company_size = Set(validation::required("companySize", &company_size)?);
    }
    if let Some(website) = patch.website {
        active.website = Set(validation::optional_website(Some(website.as_str()))?);
    }
    if let Some(country) = patch.country {
        active.country = Set(validation::required("country", &country)?);
    }
    if let Some(city) = patch.city {
        active.city = Set(validation::required("city", &city)?);
    }
    if let Some(address) = patch.address {
        active.address = Set(validation::required("address", &address)?);
    }
    if let Some(status) = patch.status {
        active.status = Set(validation::required("status", &status)?);
    }
    if let Some(category_id) = patch.category_id {
        active.category_id = Set(category_id);
    }
    if let Some(sales_manager_id) = patch.sales_manager_id {
        active.sales_manager_id = Set(sales_manager_id);
    }
    if let Some(freelance_consultant_id) = patch.freelance_consultant_id {
        active.freelance_consultant_id = Set(freelance_consultant_id);
    }
    active.updated_at = Set(db::now());

    let company = active.update(db).await?;
    tracing::info!("User {} updated client company {}", principal.user_id, company.id);
    Ok(company)
}

/// Admin-only owner overwrite. Repeating the same call is a no-op.
pub async fn reassign_owners(
    db: &DatabaseConnection,
    principal: &Principal,
    id: i32,
    owners: OwnerPair,
) -> Result<client_company::Model> {
    require(principal, Resource::ClientCompany, Action::Reassign)?;
    let company = client_company::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| ServerError::not_found("Client company not found"))?;
    require_assignable_owners(db, &owners).await?;

    if owners_of(&company) == owners {
        return Ok(company);
    }

    let mut active: client_company::ActiveModel = company.into();
    active.sales_manager_id = Set(owners.sales_manager_id);
    active.freelance_consultant_id = Set(owners.freelance_consultant_id);
    active.updated_at = Set(db::now());
    let company = active.update(db).await?;

    tracing::info!(
        "Admin {} reassigned client company {} to sm={}, fc={}",
        principal.user_id,
        company.id,
        owners.sales_manager_id,
        owners.freelance_consultant_id
    );
    Ok(company)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::entities::user::Role;
    use crate::error::ErrorKind;
    use crate::test_support::{insert_company, insert_user, seed_team};
    use sea_orm::PaginatorTrait;

    fn new_company(category_id: i32, sm: i32, fc: i32) -> NewClientCompany {
        NewClientCompany {
            name: "Acme d.o.o.".into(),
            industry: "Manufacturing".into(),
            company_size: "51-200".into(),
            website: Some("https://acme.example".into()),
            country: "Serbia".into(),
            city: "Belgrade".into(),
            address: "Knez Mihailova 1".into(),
            status: "active".into(),
            category_id,
            sales_manager_id: sm,
            freelance_consultant_id: fc,
        }
    }

    #[tokio::test]
    async fn test_freelancer_sees_only_assigned_companies() {
        let db = db::connect_in_memory().await.unwrap();
        let t = seed_team(&db).await;
        let f21 = insert_user(&db, "F21", Role::FreelanceConsultant, Some(t.m.id), true).await;
        let mine = insert_company(&db, "Mine", t.category.id, t.m.id, t.f1.id).await;
        insert_company(&db, "Sibling's", t.category.id, t.m.id, f21.id).await;

        let page = list(&db, &Principal::of(&t.f1), &ClientCompanyFilter::default()).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items, vec![mine]);
    }

    #[tokio::test]
    async fn test_admin_and_manager_listing() {
        let db = db::connect_in_memory().await.unwrap();
        let t = seed_team(&db).await;
        insert_company(&db, "Alpha", t.category.id, t.m.id, t.f1.id).await;
        insert_company(&db, "Beta", t.category.id, t.other.id, t.f2.id).await;
        // Managed elsewhere but assigned to one of m's reports
        insert_company(&db, "Gamma", t.category.id, t.other.id, t.f1.id).await;

        let all = list(&db, &Principal::of(&t.admin), &ClientCompanyFilter::default()).await.unwrap();
        assert_eq!(all.total, 3);

        let team = list(&db, &Principal::of(&t.m), &ClientCompanyFilter::default()).await.unwrap();
        let names: Vec<_> = team.items.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"Alpha") && names.contains(&"Gamma"));

        let filter = ClientCompanyFilter { q: Some("BET".into()), ..Default::default() };
        let searched = list(&db, &Principal::of(&t.m), &filter).await.unwrap();
        assert_eq!(searched.total, 0);
        let searched = list(&db, &Principal::of(&t.admin), &filter).await.unwrap();
        assert_eq!(searched.total, 1);
    }

    #[tokio::test]
    async fn test_list_pagination() {
        let db = db::connect_in_memory().await.unwrap();
        let t = seed_team(&db).await;
        for i in 0..7 {
            insert_company(&db, &format!("Company {}", i), t.category.id, t.m.id, t.f1.id).await;
        }

        let filter = ClientCompanyFilter { page: Some(2), page_size: Some(5), ..Default::default() };
        let page = list(&db, &Principal::of(&t.m), &filter).await.unwrap();
        assert_eq!((page.total, page.page, page.page_size), (7, 2, 5));
        assert_eq!(page.items.len(), 2);

        let filter = ClientCompanyFilter { page_size: Some(1000), ..Default::default() };
        let page = list(&db, &Principal::of(&t.m), &filter).await.unwrap();
        assert_eq!(page.page_size, 50);

        let filter = ClientCompanyFilter { page: Some(i64::MAX), page_size: Some(50), ..Default::default() };
        let page = list(&db, &Principal::of(&t.admin), &filter).await.unwrap();
        assert_eq!(page.total, 7);
        assert!(page.items.is_empty());
    }

    #[tokio::test]
    async fn test_get_by_id_distinguishes_missing_from_forbidden() {
        let db = db::connect_in_memory().await.unwrap();
        let t = seed_team(&db).await;
        let foreign = insert_company(&db, "Foreign", t.category.id, t.other.id, t.f2.id).await;
        let f1 = Principal::of(&t.f1);

        let err = get_by_id(&db, &f1, foreign.id + 100).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        let err = get_by_id(&db, &f1, foreign.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        assert!(get_by_id(&db, &Principal::of(&t.admin), foreign.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_create_permissions_and_team_rules() {
        let db = db::connect_in_memory().await.unwrap();
        let t = seed_team(&db).await;
        let m = Principal::of(&t.m);

        let company = create(&db, &m, new_company(t.category.id, t.m.id, t.f1.id)).await.unwrap();
        assert_eq!(company.sales_manager_id, t.m.id);

        let err = create(&db, &m, new_company(t.category.id, t.m.id, t.f2.id)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        let err = create(&db, &m, new_company(t.category.id, t.other.id, t.f1.id)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        let err = create(&db, &m, new_company(t.category.id, 9999, t.f1.id)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        let err = create(&db, &Principal::of(&t.admin), new_company(t.category.id, 9999, t.f1.id))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationFailed);

        let err = create(&db, &Principal::of(&t.f1), new_company(t.category.id, t.m.id, t.f1.id))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let err = create(&db, &m, new_company(t.category.id + 50, t.m.id, t.f1.id)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationFailed);

        let mut bad = new_company(t.category.id, t.m.id, t.f1.id);
        bad.website = Some("acme.example".into());
        let err = create(&db, &m, bad).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationFailed);

        assert_eq!(client_company::Entity::find().count(&db).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_create_rejects_inactive_freelancer() {
        let db = db::connect_in_memory().await.unwrap();
        let t = seed_team(&db).await;
        let gone = insert_user(&db, "Gone", Role::FreelanceConsultant, Some(t.m.id), false).await;

        let err = create(&db, &Principal::of(&t.admin), new_company(t.category.id, t.m.id, gone.id))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationFailed);
    }

    #[tokio::test]
    async fn test_update_rules() {
        let db = db::connect_in_memory().await.unwrap();
        let t = seed_team(&db).await;
        let company = insert_company(&db, "Acme", t.category.id, t.m.id, t.f1.id).await;
        let m = Principal::of(&t.m);

        let patch = ClientCompanyPatch { city: Some("Niš".into()), ..Default::default() };
        let updated = update(&db, &m, company.id, patch).await.unwrap();
        assert_eq!(updated.city, "Niš");
        assert_eq!(updated.name, "Acme");

        // Moving the company to a freelancer outside the team re-runs the create rules
        let patch = ClientCompanyPatch { freelance_consultant_id: Some(t.f2.id), ..Default::default() };
        let err = update(&db, &m, company.id, patch).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let patch = ClientCompanyPatch { name: Some("A".into()), ..Default::default() };
        let err = update(&db, &m, company.id, patch).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationFailed);

        let err = update(&db, &Principal::of(&t.f1), company.id, ClientCompanyPatch::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let patch = ClientCompanyPatch { sales_manager_id: Some(t.other.id), ..Default::default() };
        let moved = update(&db, &Principal::of(&t.admin), company.id, patch).await.unwrap();
        assert_eq!(moved.sales_manager_id, t.other.id);
    }

    #[tokio::test]
    async fn test_reassign_rejects_inactive_owner_and_leaves_record() {
        let db = db::connect_in_memory().await.unwrap();
        let t = seed_team(&db).await;
        let inactive = insert_user(&db, "Inactive", Role::FreelanceConsultant, Some(t.other.id), false).await;
        let company = insert_company(&db, "Acme", t.category.id, t.m.id, t.f1.id).await;
        let admin = Principal::of(&t.admin);

        let err = reassign_owners(&db, &admin, company.id, OwnerPair::new(t.other.id, inactive.id))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        let unchanged = client_company::Entity::find_by_id(company.id).one(&db).await.unwrap().unwrap();
        assert_eq!(unchanged, company);

        let err = reassign_owners(&db, &admin, company.id, OwnerPair::new(9999, t.f2.id))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let err = reassign_owners(&db, &admin, company.id + 1, OwnerPair::new(t.other.id, t.f2.id))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_reassign_is_idempotent_and_admin_only() {
        let db = db::connect_in_memory().await.unwrap();
        let t = seed_team(&db).await;
        let company = insert_company(&db, "Acme", t.category.id, t.m.id, t.f1.id).await;
        let admin = Principal::of(&t.admin);
        let owners = OwnerPair::new(t.other.id, t.f1.id);

        let first = reassign_owners(&db, &admin, company.id, owners).await.unwrap();
        let second = reassign_owners(&db, &admin, company.id, owners).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(owners_of(&second), owners);

        let err = reassign_owners(&db, &Principal::of(&t.m), company.id, owners).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }
}
