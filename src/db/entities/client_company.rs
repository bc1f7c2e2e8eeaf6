//! Client company entity, jointly owned by a sales manager and a freelance
//! consultant.

use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "client_companies")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
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
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::client_category::Entity",
        from = "Column::CategoryId",
        to = "super::client_category::Column::Id"
    )]
    Category,
    #[sea_orm(has_many = "super::contact::Entity")]
    Contacts,
}

impl Related<super::client_category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl Related<super::contact::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Contacts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
