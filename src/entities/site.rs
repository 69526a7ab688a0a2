use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

pub const STATUS_ACTIVE: &str = "active";
pub const STATUS_INACTIVE: &str = "inactive";

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "sites")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub company_name: Option<String>,
    pub site_name: Option<String>,
    pub contact_name: Option<String>,
    pub contact_phone: Option<String>,
    #[sea_orm(unique)]
    pub emergency_link_id: String,
    pub status: String,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::emergency_alert::Entity")]
    EmergencyAlert,
}

impl Related<super::emergency_alert::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EmergencyAlert.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
