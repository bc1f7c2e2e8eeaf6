//! Sales opportunity attached to a contact

use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "opportunities")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub title: String,
    pub description: Option<String>,
    pub stage: String,
    pub status: String,
    pub estimated_value: f64,
    pub currency: String,
    /// Win probability in [0, 1]
    pub probability: f64,
    /// Unix timestamp (seconds)
    pub expected_close_date: Option<i64>,
    pub contact_id: i32,
    pub client_company_id: Option<i32>,
    pub sales_manager_id: i32,
    pub freelance_consultant_id: i32,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::contact::Entity",
        from = "Column::ContactId",
        to = "super::contact::Column::Id"
    )]
    Contact,
}

impl Related<super::contact::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Contact.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
