mod app_state;
mod config;
pub mod cursor;

pub use app_state::*;
pub use config::{CourierConfig, MessageDbConfig};
