//! Core types module

mod config;
mod link;
mod options;

pub use config::{TsfConfig, TsfConfigBuilder};
pub use link::{ConnectionState, InterfaceRole};
pub use options::SyncOptions;
