//! Client category entity (Enterprise, SMB, ...)

use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "client_categories")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub name: String,
    pub description: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::client_company::Entity")]
    ClientCompanies,
}

impl Related<super::client_company::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ClientCompanies.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
