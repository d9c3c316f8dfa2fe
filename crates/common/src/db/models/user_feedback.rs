//! User-feedback entity: produced via a separate endpoint outside the core
//! query pipeline, consumed by analytics.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user_feedbacks")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub response_id: Uuid,

    pub rating: FeedbackRating,

    #[sea_orm(column_type = "Text", nullable)]
    pub comment: Option<String>,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum FeedbackRating {
    #[sea_orm(string_value = "helpful")]
    Helpful,
    #[sea_orm(string_value = "not_helpful")]
    NotHelpful,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::query_response::Entity",
        from = "Column::ResponseId",
        to = "super::query_response::Column::Id"
    )]
    QueryResponse,
}

impl Related<super::query_response::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::QueryResponse.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
