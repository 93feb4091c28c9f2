//! flotilla-fleet: where node groups and their members come from.
//!
//! [`FleetDirectory`] is the contract the orchestration crates consume.
//! [`FileDirectory`] keeps the directory in a TOML file;
//! [`MemoryDirectory`] keeps it in memory and records every update.

pub mod directory;
pub mod error;
pub mod file;
pub mod memory;

pub use directory::FleetDirectory;
pub use error::DirectoryError;
pub use file::FileDirectory;
pub use memory::MemoryDirectory;
