//! SeaORM entity models
//!
//! Database entities for the query pipeline's audit trail and analytics
//! aggregates.

mod analytics_aggregate;
mod query;
mod query_response;
mod retrieved_context;
mod user_feedback;

pub use analytics_aggregate::{
    ActiveModel as AnalyticsAggregateActiveModel, Column as AnalyticsAggregateColumn,
    Entity as AnalyticsAggregateEntity, MetricName, Model as AnalyticsAggregate,
};

pub use query::{
    ActiveModel as QueryActiveModel, Column as QueryColumn, Entity as QueryEntity, Model as Query,
};

pub use retrieved_context::{
    ActiveModel as RetrievedContextActiveModel, Column as RetrievedContextColumn,
    Entity as RetrievedContextEntity, Model as RetrievedContext,
};

pub use query_response::{
    ActiveModel as QueryResponseActiveModel, Column as QueryResponseColumn,
    Entity as QueryResponseEntity, Model as QueryResponse,
};

pub use user_feedback::{
    ActiveModel as UserFeedbackActiveModel, Column as UserFeedbackColumn,
    Entity as UserFeedbackEntity, FeedbackRating, Model as UserFeedback,
};
