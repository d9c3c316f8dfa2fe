//! Query-response entity: one row per request recording the generated
//! answer, its citations, and the generation parameters used.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "query_responses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub query_id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub response_text: String,

    #[sea_orm(column_type = "JsonBinary")]
    pub source_references: serde_json::Value,

    #[sea_orm(column_type = "JsonBinary")]
    pub generation_params: serde_json::Value,

    pub latency_ms: i64,

    pub confidence_score: f32,

    pub refusal_triggered: bool,

    #[sea_orm(column_type = "Text", nullable)]
    pub refusal_reason: Option<String>,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::query::Entity",
        from = "Column::QueryId",
        to = "super::query::Column::Id"
    )]
    Query,

    #[sea_orm(has_many = "super::user_feedback::Entity")]
    Feedback,
}

impl Related<super::query::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Query.def()
    }
}

impl Related<super::user_feedback::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Feedback.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
