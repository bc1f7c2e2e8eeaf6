//! Contact person at a client company

use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "contacts")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub position: Option<String>,
    pub notes: Option<String>,
    pub client_company_id: i32,
    pub sales_manager_id: i32,
    pub freelance_consultant_id: i32,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::client_company::Entity",
        from = "Column::ClientCompanyId",
        to = "super::client_company::Column::Id"
    )]
    ClientCompany,
    #[sea_orm(has_many = "super::opportunity::Entity")]
    Opportunities,
}

impl Related<super::client_company::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ClientCompany.def()
    }
}

impl Related<super::opportunity::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Opportunities.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
