//! Retrieved-context entity: one row per request recording which chunks
//! were retrieved and under which parameters, written once after retrieval.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "retrieved_contexts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub query_id: Uuid,

    /// Parallel to `similarity_scores`; same length is an invariant enforced
    /// at write time, not by the schema.
    #[sea_orm(column_type = "JsonBinary")]
    pub chunk_ids: serde_json::Value,

    #[sea_orm(column_type = "JsonBinary")]
    pub similarity_scores: serde_json::Value,

    pub top_k: i32,

    pub similarity_threshold: f32,

    #[sea_orm(column_type = "Text", nullable)]
    pub chapter_filter: Option<String>,

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
}

impl Related<super::query::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Query.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
