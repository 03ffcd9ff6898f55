pub mod config;
pub mod loader;
pub mod models;
pub mod pipeline;
pub mod processor;
pub mod report;
pub mod storage;

pub use pipeline::MigrationPipeline;
