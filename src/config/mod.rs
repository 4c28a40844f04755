pub mod schema;

pub use schema::{
    Config, LegacyForwardingConfig, PacingConfig, ReliabilityConfig, StoreConfig, TelegramConfig,
};
