pub mod circuit_breaker;
pub mod generator;
pub mod prompt;
pub mod refusal;

pub use circuit_breaker::CircuitBreaker;
pub use generator::{create_generator, GenerationOutcome, GenerationParams, Generator};
pub use prompt::build_system_prompt;
pub use refusal::{
    build_refusal_message, has_external_reference, is_refusal, should_refuse, QueryMode, RefusalReason,
};
