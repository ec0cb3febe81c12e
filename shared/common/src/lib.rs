pub mod types;
pub mod error;
pub mod config;
pub mod retry;
pub mod http;

pub use types::*;
pub use error::*;
pub use config::*;
pub use retry::*;
pub use http::{cors_layer, handler_404};
