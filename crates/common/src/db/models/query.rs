//! Query entity: one append-only row per accepted request, written before
//! retrieval begins.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "queries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// SHA-256 of the client's network identifier and user agent.
    pub user_id: String,

    pub ip_address_hash: String,

    #[sea_orm(column_type = "Text")]
    pub query_text: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub selected_text: Option<String>,

    /// Stored for replay/debugging; not returned in API responses.
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub query_embedding: Option<serde_json::Value>,

    pub book_id: String,

    pub chapter_number: Option<i32>,

    #[sea_orm(column_type = "Text", nullable)]
    pub page_url: Option<String>,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_one = "super::retrieved_context::Entity")]
    RetrievedContext,

    #[sea_orm(has_one = "super::query_response::Entity")]
    QueryResponse,
}

impl Related<super::retrieved_context::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RetrievedContext.def()
    }
}

impl Related<super::query_response::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::QueryResponse.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
