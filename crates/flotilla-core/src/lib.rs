pub mod config;
pub mod error;
pub mod manifest;
pub mod source;
pub mod types;

pub use config::FlotillaConfig;
pub use error::ConfigError;
pub use manifest::AppManifest;
pub use source::{EnvOverrides, GitSource};
pub use types::*;
