pub mod channel_mapper;
pub mod constraint_validator;
pub mod deduplicator;
pub mod field_classifier;
pub mod rule_normalizer;
pub mod store_corrector;
pub mod text;
pub mod validators;

pub use channel_mapper::*;
pub use constraint_validator::*;
pub use deduplicator::*;
pub use field_classifier::*;
pub use rule_normalizer::*;
pub use store_corrector::*;
