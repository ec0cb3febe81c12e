pub mod config;
pub mod delivery;

pub use config::NotificationConfig;
pub use delivery::*;
