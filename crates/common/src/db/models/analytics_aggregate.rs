//! Analytics-aggregate entity: precomputed metric snapshots backing the
//! summary endpoint's enumerated metric names.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "analytics_aggregates")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub metric_name: MetricName,

    #[sea_orm(column_type = "Text")]
    pub metric_value: String,

    pub book_id: Option<String>,

    pub period_start: DateTimeWithTimeZone,

    pub period_end: DateTimeWithTimeZone,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum MetricName {
    #[sea_orm(string_value = "daily_query_count")]
    DailyQueryCount,
    #[sea_orm(string_value = "weekly_avg_latency")]
    WeeklyAvgLatency,
    #[sea_orm(string_value = "monthly_feedback_rate")]
    MonthlyFeedbackRate,
    #[sea_orm(string_value = "top_question_topics")]
    TopQuestionTopics,
    #[sea_orm(string_value = "hourly_concurrent_users")]
    HourlyConcurrentUsers,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
