//! Fixtures for tests that need a populated database.

use std::sync::atomic::{AtomicU32, Ordering};

use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};

use crate::db::{
    self,
    entities::{client_category, client_company, contact, opportunity, user, user::Role},
};

static NEXT_EMAIL: AtomicU32 = AtomicU32::new(1);

/// Insert a directory entry. `manager: None` makes the user self-referencing.
pub async fn insert_user(
    db: &DatabaseConnection,
    name: &str,
    role: Role,
    manager: Option<i32>,
    is_active: bool,
) -> user::Model {
    let n = NEXT_EMAIL.fetch_add(1, Ordering::Relaxed);
    let inserted = user::ActiveModel {
        name: Set(name.to_string()),
        email: Set(format!("user{}@crm.test", n)),
        password_hash: Set("not-a-real-hash".to_string()),
        role: Set(role),
        manager_id: Set(manager.unwrap_or(0)),
        is_active: Set(is_active),
        created_at: Set(db::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap();

    if manager.is_some() {
        return inserted;
    }
    let id = inserted.id;
    let mut active: user::ActiveModel = inserted.into();
    active.manager_id = Set(id);
    active.update(db).await.unwrap()
}

pub async fn insert_category(db: &DatabaseConnection, name: &str) -> client_category::Model {
    client_category::ActiveModel {
        name: Set(name.to_string()),
        description: Set(None),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn insert_company(
    db: &DatabaseConnection,
    name: &str,
    category_id: i32,
    sales_manager_id: i32,
    freelance_consultant_id: i32,
) -> client_company::Model {
    let now = db::now();
    client_company::ActiveModel {
        name: Set(name.to_string()),
        industry: Set("Software".to_string()),
        company_size: Set("11-50".to_string()),
        website: Set(None),
        country: Set("Serbia".to_string()),
        city: Set("Novi Sad".to_string()),
        address: Set("Bulevar 1".to_string()),
        status: Set("active".to_string()),
        category_id: Set(category_id),
        sales_manager_id: Set(sales_manager_id),
        freelance_consultant_id: Set(freelance_consultant_id),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn insert_contact(
    db: &DatabaseConnection,
    name: &str,
    company: &client_company::Model,
) -> contact::Model {
    let now = db::now();
    contact::ActiveModel {
        name: Set(name.to_string()),
        email: Set(None),
        phone: Set(None),
        position: Set(None),
        notes: Set(None),
        client_company_id: Set(company.id),
        sales_manager_id: Set(company.sales_manager_id),
        freelance_consultant_id: Set(company.freelance_consultant_id),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn insert_opportunity(
    db: &DatabaseConnection,
    title: &str,
    contact: &contact::Model,
    stage: &str,
    estimated_value: f64,
) -> opportunity::Model {
    let now = db::now();
    opportunity::ActiveModel {
        title: Set(title.to_string()),
        description: Set(None),
        stage: Set(stage.to_string()),
        status: Set("open".to_string()),
        estimated_value: Set(estimated_value),
        currency: Set("EUR".to_string()),
        probability: Set(0.5),
        expected_close_date: Set(None),
        contact_id: Set(contact.id),
        client_company_id: Set(Some(contact.client_company_id)),
        sales_manager_id: Set(contact.sales_manager_id),
        freelance_consultant_id: Set(contact.freelance_consultant_id),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

/// The org chart used by most service tests: manager `m` with freelancer
/// `f1`, a second manager `other` with freelancer `f2`, and one admin.
pub struct Team {
    pub admin: user::Model,
    pub m: user::Model,
    pub other: user::Model,
    pub f1: user::Model,
    pub f2: user::Model,
    pub category: client_category::Model,
}

pub async fn seed_team(db: &DatabaseConnection) -> Team {
    let admin = insert_user(db, "Admin", Role::Admin, None, true).await;
    let m = insert_user(db, "Manager", Role::SalesManager, None, true).await;
    let other = insert_user(db, "Other manager", Role::SalesManager, None, true).await;
    let f1 = insert_user(db, "Freelancer one", Role::FreelanceConsultant, Some(m.id), true).await;
    let f2 = insert_user(db, "Freelancer two", Role::FreelanceConsultant, Some(other.id), true).await;
    let category = insert_category(db, "Enterprise").await;
    Team { admin, m, other, f1, f2, category }
}
