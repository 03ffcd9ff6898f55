pub mod channel_catalog;
pub mod migration_config;

pub use channel_catalog::{ChannelCatalog, ChannelEntry};
pub use migration_config::*;
